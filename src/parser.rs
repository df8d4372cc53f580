//! The parser driver.
//!
//! [`Parser`] runs the shift/reduce loop over a token stream, pulling
//! states out of the lazy [`TransitionEngine`](crate::engine) as the input
//! demands them. Two entry points are offered: [`Parser::parse`] folds the
//! input into a value through an [`Evaluator`], and [`Parser::parse_events`]
//! reports the raw shift/reduce decisions to a [`ParseListener`]. The
//! value-stack variant is layered on the event protocol.

use crate::engine::{Action, StateId, TransitionEngine};
use crate::grammar::{Grammar, PrecedenceMap, ProductionID, SymbolID, Token};

/// Builds values bottom-up out of a successful parse.
///
/// Terminals are evaluated in input order as they are shifted; a
/// production is evaluated only after every symbol of its body has been,
/// with the argument list in body order. Errors propagate out of the parse
/// unchanged, wrapped in [`ParseError::Evaluate`].
pub trait Evaluator {
    type Value;
    type Error: std::error::Error + Send + Sync + 'static;

    /// Turn a shifted token into a value (e.g. parse a `num` lexeme).
    fn evaluate_terminal(&mut self, token: &Token) -> Result<Self::Value, Self::Error>;

    /// Fold a reduced production over the values of its body symbols.
    /// `args` has exactly one entry per body symbol, in body order.
    fn evaluate_production(
        &mut self,
        production: ProductionID,
        args: Vec<Self::Value>,
    ) -> Result<Self::Value, Self::Error>;
}

/// Observes the parser's decisions as they are made. `on_reduce` fires in
/// reduction order (bottom-up); the final reduction is the augmented start
/// production.
pub trait ParseListener {
    fn on_shift(&mut self, token: &Token);
    fn on_reduce(&mut self, production: ProductionID);
}

/// Failure during a parse.
#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    /// No action exists for the current (state, token) pair.
    #[error("syntax error: unexpected token `{terminal}` (value {value:?}) in state {state}")]
    Syntax {
        terminal: String,
        value: Option<String>,
        state: StateId,
    },

    /// An [`Evaluator`] callback failed; the source is the evaluator's
    /// error, unchanged.
    #[error("evaluation failed: {0}")]
    Evaluate(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// A reduction found no goto transition for its head. Indicates an
    /// engine bug, not bad input; unreachable for verified grammars.
    #[error("no goto transition on `{nonterminal}` in state {state}")]
    MissingGoto {
        nonterminal: String,
        state: StateId,
    },

    /// A reduction tried to pop more entries than the stack holds. Also an
    /// engine bug, distinct from a syntax error.
    #[error("stack underflow while reducing `{production}`")]
    StackUnderflow { production: String },
}

/// A lazy LR(1) parser for one grammar.
///
/// The parser owns the mutable caches (canonical states, transitions,
/// actions), which grow monotonically across parses; it is therefore
/// `&mut self` per parse, while the grammar and precedence map stay
/// immutable and shareable. For concurrent parses, create one `Parser`
/// per thread over the same `Grammar`.
pub struct Parser<'g> {
    grammar: &'g Grammar,
    engine: TransitionEngine<'g>,
    initial: StateId,
}

impl<'g> Parser<'g> {
    /// Create a parser, completing `precedence` over the grammar's
    /// productions (rightmost-terminal inheritance) and materializing the
    /// initial state.
    pub fn new(grammar: &'g Grammar, precedence: &PrecedenceMap) -> Self {
        let mut engine = TransitionEngine::new(grammar, precedence.completed(grammar));
        let initial = engine.initial_state();
        Self {
            grammar,
            engine,
            initial,
        }
    }

    /// Parse `tokens` to completion and return the value computed for the
    /// start symbol.
    pub fn parse<I, E>(&mut self, tokens: I, evaluator: &mut E) -> Result<E::Value, ParseError>
    where
        I: IntoIterator<Item = Token>,
        E: Evaluator,
    {
        let mut sink = EvaluatorSink {
            grammar: self.grammar,
            evaluator,
            values: Vec::new(),
        };
        self.run(tokens, &mut sink)?;
        sink.values.pop().ok_or(ParseError::StackUnderflow {
            production: "empty value stack after acceptance".to_owned(),
        })
    }

    /// Parse `tokens` to completion, reporting every shift and reduction
    /// to `listener`.
    pub fn parse_events<I, L>(&mut self, tokens: I, listener: &mut L) -> Result<(), ParseError>
    where
        I: IntoIterator<Item = Token>,
        L: ParseListener,
    {
        let mut sink = ListenerSink { listener };
        self.run(tokens, &mut sink)
    }

    /// The shift/reduce loop shared by both entry points. The input is
    /// extended with the end-of-input token; acceptance is reducing the
    /// augmented start production.
    fn run<I, S>(&mut self, tokens: I, sink: &mut S) -> Result<(), ParseError>
    where
        I: IntoIterator<Item = Token>,
        S: EventSink,
    {
        let mut tokens = tokens.into_iter().chain(Some(Token::eoi()));
        let mut stack: Vec<StateId> = vec![self.initial];
        // The chain above guarantees at least the EOI token.
        let mut token = tokens.next().unwrap();

        loop {
            let state = *stack.last().ok_or_else(|| ParseError::StackUnderflow {
                production: "state stack exhausted".to_owned(),
            })?;

            let Some(action) = self.engine.action(state, token.terminal) else {
                return Err(ParseError::Syntax {
                    terminal: self.grammar.terminal_name(token.terminal).to_owned(),
                    value: token.value,
                    state,
                });
            };

            match action {
                Action::Shift(next) => {
                    sink.shift(&token)?;
                    stack.push(next);
                    token = match tokens.next() {
                        Some(next_token) => next_token,
                        None => Token::eoi(),
                    };
                }
                Action::Reduce(production) => {
                    sink.reduce(production)?;

                    let rule = self.grammar.production(production);
                    let arity = rule.right().len();
                    if stack.len() <= arity {
                        return Err(ParseError::StackUnderflow {
                            production: rule.name(self.grammar),
                        });
                    }
                    stack.truncate(stack.len() - arity);

                    if production == ProductionID::ACCEPT {
                        tracing::debug!("input accepted");
                        return Ok(());
                    }

                    let top = *stack.last().ok_or_else(|| ParseError::StackUnderflow {
                        production: rule.name(self.grammar),
                    })?;
                    let next = self
                        .engine
                        .goto(top, SymbolID::N(rule.left()))
                        .ok_or_else(|| ParseError::MissingGoto {
                            nonterminal: self.grammar.nonterminal_name(rule.left()).to_owned(),
                            state: top,
                        })?;
                    stack.push(next);
                }
            }
        }
    }
}

/// Internal event protocol: both public surfaces are adapters over it.
trait EventSink {
    fn shift(&mut self, token: &Token) -> Result<(), ParseError>;
    fn reduce(&mut self, production: ProductionID) -> Result<(), ParseError>;
}

struct ListenerSink<'a, L> {
    listener: &'a mut L,
}

impl<L: ParseListener> EventSink for ListenerSink<'_, L> {
    fn shift(&mut self, token: &Token) -> Result<(), ParseError> {
        self.listener.on_shift(token);
        Ok(())
    }

    fn reduce(&mut self, production: ProductionID) -> Result<(), ParseError> {
        self.listener.on_reduce(production);
        Ok(())
    }
}

struct EvaluatorSink<'a, 'g, E: Evaluator> {
    grammar: &'g Grammar,
    evaluator: &'a mut E,
    values: Vec<E::Value>,
}

impl<E: Evaluator> EventSink for EvaluatorSink<'_, '_, E> {
    fn shift(&mut self, token: &Token) -> Result<(), ParseError> {
        let value = self
            .evaluator
            .evaluate_terminal(token)
            .map_err(|e| ParseError::Evaluate(Box::new(e)))?;
        self.values.push(value);
        Ok(())
    }

    fn reduce(&mut self, production: ProductionID) -> Result<(), ParseError> {
        // The augmented start production produces no value; the start
        // symbol's value is already on top of the stack.
        if production == ProductionID::ACCEPT {
            return Ok(());
        }
        let rule = self.grammar.production(production);
        let arity = rule.right().len();
        if self.values.len() < arity {
            return Err(ParseError::StackUnderflow {
                production: rule.name(self.grammar),
            });
        }
        let args = self.values.split_off(self.values.len() - arity);
        let value = self
            .evaluator
            .evaluate_production(production, args)
            .map_err(|e| ParseError::Evaluate(Box::new(e)))?;
        self.values.push(value);
        Ok(())
    }
}
