//! A lazy LR(1) parsing library.
//!
//! Parser states and action/goto tables are not generated ahead of time:
//! the driver materializes them on demand while the token stream is
//! consumed, and memoizes everything it touches. Declare a grammar and an
//! optional operator-precedence table, then drive a [`Parser`] with a
//! stream of [`Token`]s, receiving either a folded value through an
//! [`Evaluator`] or raw shift/reduce events through a [`ParseListener`].
//! The offline [`verify`] pass checks the same grammar/precedence pair for
//! unresolved LALR(1) conflicts before you ship it.
//!
//! ```
//! use lazuli::SymbolID::{N, T};
//! use lazuli::{
//!     Assoc, Evaluator, GrammarDef, Parser, Precedence, PrecedenceMap, ProductionID, Token,
//! };
//! use std::convert::Infallible;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let mut g = GrammarDef::new();
//! let plus = g.terminal("+")?;
//! let num = g.terminal("num")?;
//! let expr = g.nonterminal("expr")?;
//! g.start_symbol(expr);
//! let p_add = g.production(expr, [N(expr), T(plus), N(expr)])?;
//! let p_num = g.production(expr, [T(num)])?;
//! let grammar = g.build()?;
//!
//! let mut precedence = PrecedenceMap::new();
//! precedence.insert(plus, Precedence::new(10, Assoc::Left));
//!
//! struct Calc {
//!     add: ProductionID,
//!     num: ProductionID,
//! }
//! impl Evaluator for Calc {
//!     type Value = i64;
//!     type Error = Infallible;
//!     fn evaluate_terminal(&mut self, token: &Token) -> Result<i64, Infallible> {
//!         Ok(token.value.as_deref().and_then(|v| v.parse().ok()).unwrap_or(0))
//!     }
//!     fn evaluate_production(
//!         &mut self,
//!         production: ProductionID,
//!         args: Vec<i64>,
//!     ) -> Result<i64, Infallible> {
//!         if production == self.add {
//!             Ok(args[0] + args[2])
//!         } else {
//!             debug_assert_eq!(production, self.num);
//!             Ok(args[0])
//!         }
//!     }
//! }
//!
//! let mut parser = Parser::new(&grammar, &precedence);
//! let tokens = vec![Token::new(num, "1"), Token::bare(plus), Token::new(num, "2")];
//! let sum = parser.parse(
//!     tokens,
//!     &mut Calc {
//!         add: p_add,
//!         num: p_num,
//!     },
//! )?;
//! assert_eq!(sum, 3);
//! # Ok(())
//! # }
//! ```

mod engine;
pub mod first;
pub mod grammar;
pub mod parser;
mod types;
pub mod verifier;

pub use crate::engine::StateId;
pub use crate::first::{FirstSets, TerminalSet};
pub use crate::grammar::{
    Assoc, Grammar, GrammarDef, GrammarDefError, NonterminalID, Precedence, PrecedenceEntity,
    PrecedenceMap, Production, ProductionID, SymbolID, TerminalID, Token,
};
pub use crate::parser::{Evaluator, ParseError, ParseListener, Parser};
pub use crate::verifier::{verify, Conflict, ConflictKind};
