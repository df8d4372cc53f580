//! Offline LALR(1) verification.
//!
//! [`verify`] builds the LR(0) automaton of a grammar, attaches
//! FOLLOW-based lookaheads, and applies the same precedence policy as the
//! runtime driver. Every conflict that precedence cannot settle is handed
//! to the caller's sink as a structured [`Conflict`]; the function itself
//! never fails. Run it while developing a grammar — a clean verification
//! means the lazy parser can never hit an ambiguous action at runtime.

use crate::first::{FirstSets, TerminalSet};
use crate::grammar::{Grammar, NonterminalID, PrecedenceMap, ProductionID, SymbolID, TerminalID};
use crate::types::Map;
use std::cmp::Reverse;
use std::collections::BTreeSet;

/// An unresolved conflict in the LALR(1) action table.
#[derive(Debug)]
pub struct Conflict {
    /// Index of the automaton state the conflict occurs in.
    pub state: usize,
    /// The lookahead terminal both actions compete for.
    pub terminal: TerminalID,
    pub kind: ConflictKind,
}

#[derive(Debug)]
pub enum ConflictKind {
    /// A shift and at least one reduction compete, and at least one side
    /// has no precedence assigned.
    ShiftReduce {
        shift: usize,
        reduces: Vec<ProductionID>,
    },
    /// Two or more reductions compete. The runtime would silently pick the
    /// highest-precedence production; the verifier always reports it.
    ReduceReduce { reduces: Vec<ProductionID> },
}

impl Conflict {
    /// Render a human-readable description of the conflict.
    pub fn describe(&self, g: &Grammar) -> String {
        let terminal = g.terminal_name(self.terminal);
        match &self.kind {
            ConflictKind::ShiftReduce { shift, reduces } => {
                let mut text = format!(
                    "state {}: unresolved shift/reduce conflict on `{}`: shift to state {}",
                    self.state, terminal, shift
                );
                for reduce in reduces {
                    text.push_str(" vs reduce [");
                    text.push_str(&g.production(*reduce).name(g));
                    text.push(']');
                }
                text
            }
            ConflictKind::ReduceReduce { reduces } => {
                let mut text = format!(
                    "state {}: reduce/reduce conflict on `{}`:",
                    self.state, terminal
                );
                for (i, reduce) in reduces.iter().enumerate() {
                    if i > 0 {
                        text.push_str(" vs");
                    }
                    text.push_str(" [");
                    text.push_str(&g.production(*reduce).name(g));
                    text.push(']');
                }
                text
            }
        }
    }
}

/// Check that `grammar`, under `precedence`, has no conflict the runtime
/// policy cannot resolve, reporting each offender to `sink`.
pub fn verify<F>(grammar: &Grammar, precedence: &PrecedenceMap, mut sink: F)
where
    F: FnMut(Conflict),
{
    let precedence = precedence.completed(grammar);
    let first_sets = FirstSets::new(grammar);
    let follow = follow_sets(grammar, &first_sets);
    let automaton = lr0_automaton(grammar);
    tracing::debug!(states = automaton.states.len(), "LR(0) automaton built");

    for (state, items) in automaton.states.iter().enumerate() {
        let mut pending: Map<TerminalID, PendingAction> = Map::default();

        for (symbol, target) in &automaton.transitions[state] {
            if let SymbolID::T(t) = symbol {
                pending.entry(*t).or_default().shift = Some(*target);
            }
        }

        for item in items {
            if !item.is_completed(grammar) {
                continue;
            }
            if item.production == ProductionID::ACCEPT {
                // Accept on end of input; modeled as a reduction candidate
                // so that a cyclic grammar surfaces the clash.
                push_reduce(&mut pending, TerminalID::EOI, item.production);
                continue;
            }
            let head = grammar.production(item.production).left();
            if let Some(follow) = follow.get(&head) {
                for terminal in follow.iter() {
                    push_reduce(&mut pending, terminal, item.production);
                }
            }
        }

        for (terminal, action) in pending {
            report_unresolved(state, terminal, action, &precedence, &mut sink);
        }
    }
}

#[derive(Default)]
struct PendingAction {
    shift: Option<usize>,
    reduces: Vec<ProductionID>,
}

fn push_reduce(
    pending: &mut Map<TerminalID, PendingAction>,
    terminal: TerminalID,
    production: ProductionID,
) {
    let entry = pending.entry(terminal).or_default();
    if !entry.reduces.contains(&production) {
        entry.reduces.push(production);
    }
}

fn report_unresolved<F>(
    state: usize,
    terminal: TerminalID,
    action: PendingAction,
    precedence: &PrecedenceMap,
    sink: &mut F,
) where
    F: FnMut(Conflict),
{
    let PendingAction { shift, reduces } = action;

    if reduces.len() >= 2 {
        sink(Conflict {
            state,
            terminal,
            kind: ConflictKind::ReduceReduce {
                reduces: reduces.clone(),
            },
        });
    }

    let Some(shift) = shift else { return };
    if reduces.is_empty() {
        return;
    }

    // Same arbitration as the runtime: the highest-precedence reduction
    // (declaration order on ties) is weighed against the terminal. Any
    // pair of explicit precedences settles the conflict one way or the
    // other; a missing one means the yacc shift-default would kick in,
    // which is exactly what the verifier is here to flag.
    let best = reduces
        .iter()
        .copied()
        .min_by_key(|&p| {
            let level = precedence.get(p).map_or(0, |prec| prec.level);
            (Reverse(level), p)
        })
        .unwrap();
    if precedence.get(best).is_none() || precedence.get(terminal).is_none() {
        sink(Conflict {
            state,
            terminal,
            kind: ConflictKind::ShiftReduce { shift, reduces },
        });
    }
}

// ---- FOLLOW sets ----

/// `FOLLOW(A)`: the terminals that may appear immediately after `A` in a
/// sentential form. The start symbol's set contains the end-of-input
/// marker.
fn follow_sets(grammar: &Grammar, first_sets: &FirstSets) -> Map<NonterminalID, TerminalSet> {
    let mut follow: Map<NonterminalID, TerminalSet> = Map::default();
    follow
        .entry(grammar.start_symbol())
        .or_default()
        .insert(TerminalID::EOI);

    let mut changed = true;
    while changed {
        changed = false;
        for (id, production) in grammar.productions() {
            if id == ProductionID::ACCEPT {
                continue;
            }
            let head = production.left();
            let body = production.right();
            for (i, symbol) in body.iter().enumerate() {
                let SymbolID::N(nonterminal) = symbol else {
                    continue;
                };
                let mut first_rest = first_sets.first_of_sequence(&body[i + 1..]);
                let nullable_rest = first_rest.remove(TerminalID::EPSILON);
                let head_follow = follow.get(&head).cloned().unwrap_or_default();

                let target = follow.entry(*nonterminal).or_default();
                changed |= target.union_with(&first_rest);
                if nullable_rest {
                    changed |= target.union_with(&head_follow);
                }
            }
        }
    }
    follow
}

// ---- LR(0) automaton ----

/// An LR(0) item: a production and a dot position, no lookahead.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
struct Lr0Item {
    production: ProductionID,
    dot: usize,
}

impl Lr0Item {
    fn next_symbol(&self, g: &Grammar) -> Option<SymbolID> {
        g.production(self.production).right().get(self.dot).copied()
    }

    fn is_completed(&self, g: &Grammar) -> bool {
        self.dot == g.production(self.production).right().len()
    }

    fn advanced(&self) -> Self {
        Self {
            dot: self.dot + 1,
            ..*self
        }
    }
}

type Lr0Set = BTreeSet<Lr0Item>;

struct Automaton {
    states: Vec<Lr0Set>,
    transitions: Vec<Map<SymbolID, usize>>,
}

/// Enumerate the LR(0) states by breadth-first search from the closure of
/// `[S' : . S]`.
fn lr0_automaton(grammar: &Grammar) -> Automaton {
    let initial = lr0_closure(
        [Lr0Item {
            production: ProductionID::ACCEPT,
            dot: 0,
        }]
        .into(),
        grammar,
    );

    let mut states = vec![initial.clone()];
    let mut transitions: Vec<Map<SymbolID, usize>> = vec![Map::default()];
    let mut index: Map<Lr0Set, usize> = Map::default();
    index.insert(initial, 0);

    let mut current = 0;
    while current < states.len() {
        let items = states[current].clone();

        let mut next_symbols: Vec<SymbolID> = Vec::new();
        for item in &items {
            if let Some(symbol) = item.next_symbol(grammar) {
                if !next_symbols.contains(&symbol) {
                    next_symbols.push(symbol);
                }
            }
        }

        for symbol in next_symbols {
            let next = lr0_goto(&items, symbol, grammar);
            let target = match index.get(&next) {
                Some(target) => *target,
                None => {
                    let target = states.len();
                    states.push(next.clone());
                    transitions.push(Map::default());
                    index.insert(next, target);
                    target
                }
            };
            transitions[current].insert(symbol, target);
        }

        current += 1;
    }

    Automaton {
        states,
        transitions,
    }
}

fn lr0_closure(seed: Lr0Set, grammar: &Grammar) -> Lr0Set {
    let mut closure = seed;
    let mut work: Vec<Lr0Item> = closure.iter().copied().collect();
    while let Some(item) = work.pop() {
        let Some(SymbolID::N(nonterminal)) = item.next_symbol(grammar) else {
            continue;
        };
        for &production in grammar.productions_for(nonterminal) {
            let new_item = Lr0Item { production, dot: 0 };
            if closure.insert(new_item) {
                work.push(new_item);
            }
        }
    }
    closure
}

fn lr0_goto(items: &Lr0Set, symbol: SymbolID, grammar: &Grammar) -> Lr0Set {
    let kernel: Lr0Set = items
        .iter()
        .filter(|item| item.next_symbol(grammar) == Some(symbol))
        .map(Lr0Item::advanced)
        .collect();
    lr0_closure(kernel, grammar)
}
