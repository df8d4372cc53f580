//! FIRST set analysis.
//!
//! `FIRST(X)` is the set of terminals that can begin a derivation from the
//! symbol `X`; it contains [`TerminalID::EPSILON`] exactly when `X` is
//! nullable. The analysis is a fixed-point iteration over the productions
//! and runs once per grammar; the result is immutable and shareable.

use crate::grammar::{Grammar, ProductionID, SymbolID, TerminalID};
use crate::types::Map;

/// A set of terminals, backed by a bit set over the dense terminal ids.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct TerminalSet {
    inner: bit_set::BitSet,
}

impl TerminalSet {
    pub fn contains(&self, id: TerminalID) -> bool {
        self.inner.contains(id.raw().into())
    }

    pub fn insert(&mut self, id: TerminalID) -> bool {
        self.inner.insert(id.raw().into())
    }

    pub fn remove(&mut self, id: TerminalID) -> bool {
        self.inner.remove(id.raw().into())
    }

    /// Insert every member of `other`; true if the receiver grew.
    pub fn union_with(&mut self, other: &Self) -> bool {
        let before = self.inner.len();
        self.inner.union_with(&other.inner);
        self.inner.len() > before
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = TerminalID> + '_ {
        self.inner
            .iter()
            .map(|raw| TerminalID::from_raw(raw as u16))
    }
}

impl FromIterator<TerminalID> for TerminalSet {
    fn from_iter<I>(iter: I) -> Self
    where
        I: IntoIterator<Item = TerminalID>,
    {
        let mut set = Self::default();
        for id in iter {
            set.insert(id);
        }
        set
    }
}

/// The FIRST sets of every symbol of a grammar.
#[derive(Debug)]
pub struct FirstSets {
    map: Map<SymbolID, TerminalSet>,
}

impl FirstSets {
    pub fn new(grammar: &Grammar) -> Self {
        let mut map: Map<SymbolID, TerminalSet> = Map::default();

        // FIRST(t) = {t} for terminals; nonterminals start empty.
        for (id, _) in grammar.terminals() {
            map.insert(SymbolID::T(id), Some(id).into_iter().collect());
        }
        for (_, production) in grammar.productions() {
            map.entry(SymbolID::N(production.left())).or_default();
        }

        let mut changed = true;
        while changed {
            changed = false;
            for (id, production) in grammar.productions() {
                if id == ProductionID::ACCEPT {
                    continue;
                }
                let added = first_of_sequence_in(&map, production.right());
                let head = map.entry(SymbolID::N(production.left())).or_default();
                changed |= head.union_with(&added);
            }
        }

        Self { map }
    }

    /// `FIRST(symbol)`. A nonterminal heading no production has an empty set.
    pub fn first(&self, symbol: SymbolID) -> TerminalSet {
        match symbol {
            SymbolID::T(t) => Some(t).into_iter().collect(),
            SymbolID::N(_) => self.map.get(&symbol).cloned().unwrap_or_default(),
        }
    }

    /// `FIRST(Y1 ... Yn)`: the terminals that can begin the sequence,
    /// plus EPSILON when every `Yi` is nullable (in particular when the
    /// sequence is empty).
    pub fn first_of_sequence(&self, symbols: &[SymbolID]) -> TerminalSet {
        first_of_sequence_in(&self.map, symbols)
    }

    /// `FIRST(suffix lookahead)`, EPSILON-free: the lookahead propagation
    /// rule used when expanding an LR(1) closure.
    pub(crate) fn first_of_suffix(
        &self,
        suffix: &[SymbolID],
        lookahead: TerminalID,
    ) -> TerminalSet {
        let mut result = self.first_of_sequence(suffix);
        if result.remove(TerminalID::EPSILON) {
            result.insert(lookahead);
        }
        result
    }

    /// Whether `symbol` derives the empty string.
    pub fn is_nullable(&self, symbol: SymbolID) -> bool {
        match symbol {
            SymbolID::T(_) => false,
            SymbolID::N(_) => self
                .map
                .get(&symbol)
                .is_some_and(|set| set.contains(TerminalID::EPSILON)),
        }
    }
}

fn first_of_sequence_in(map: &Map<SymbolID, TerminalSet>, symbols: &[SymbolID]) -> TerminalSet {
    let mut result = TerminalSet::default();
    let mut all_nullable = true;
    for symbol in symbols {
        match symbol {
            SymbolID::T(t) => {
                result.insert(*t);
                all_nullable = false;
            }
            SymbolID::N(_) => {
                let first = map.get(symbol);
                if let Some(first) = first {
                    result.union_with(first);
                }
                result.remove(TerminalID::EPSILON);
                if !first.is_some_and(|set| set.contains(TerminalID::EPSILON)) {
                    all_nullable = false;
                }
            }
        }
        if !all_nullable {
            break;
        }
    }
    if all_nullable {
        result.insert(TerminalID::EPSILON);
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grammar::SymbolID::*;
    use crate::grammar::{Grammar, NonterminalID};

    fn set(ids: impl IntoIterator<Item = TerminalID>) -> TerminalSet {
        ids.into_iter().collect()
    }

    #[test]
    fn terminal_first_is_itself() {
        let mut num = None;
        let grammar = Grammar::define(|g| {
            let t = g.terminal("num")?;
            let e = g.nonterminal("E")?;
            g.start_symbol(e);
            g.production(e, [T(t)])?;
            num = Some(t);
            Ok(())
        })
        .unwrap();
        let num = num.unwrap();

        let first = FirstSets::new(&grammar);
        assert_eq!(first.first(T(num)), set([num]));
        assert!(!first.is_nullable(T(num)));
    }

    #[test]
    fn first_propagates_through_chains() {
        // E : A, A : B, B : num
        let mut ids = None;
        let grammar = Grammar::define(|g| {
            let num = g.terminal("num")?;
            let e = g.nonterminal("E")?;
            let a = g.nonterminal("A")?;
            let b = g.nonterminal("B")?;
            g.start_symbol(e);
            g.production(e, [N(a)])?;
            g.production(a, [N(b)])?;
            g.production(b, [T(num)])?;
            ids = Some((num, e, a, b));
            Ok(())
        })
        .unwrap();
        let (num, e, a, b) = ids.unwrap();

        let first = FirstSets::new(&grammar);
        for nt in [e, a, b] {
            assert_eq!(first.first(N(nt)), set([num]));
        }
    }

    #[test]
    fn nullable_prefix_exposes_later_symbols() {
        // S : A num, A : ε | plus
        let mut ids = None;
        let grammar = Grammar::define(|g| {
            let plus = g.terminal("+")?;
            let num = g.terminal("num")?;
            let s = g.nonterminal("S")?;
            let a = g.nonterminal("A")?;
            g.start_symbol(s);
            g.production(s, [N(a), T(num)])?;
            g.production(a, [])?;
            g.production(a, [T(plus)])?;
            ids = Some((plus, num, s, a));
            Ok(())
        })
        .unwrap();
        let (plus, num, s, a) = ids.unwrap();

        let first = FirstSets::new(&grammar);
        assert!(first.is_nullable(N(a)));
        assert!(first.first(N(a)).contains(plus));
        assert!(first.first(N(a)).contains(TerminalID::EPSILON));
        // S is not nullable: `num` always follows A.
        assert!(!first.is_nullable(N(s)));
        assert_eq!(first.first(N(s)), set([plus, num]));
    }

    #[test]
    fn fully_nullable_head_contains_epsilon() {
        // S : A B, A : ε, B : ε
        let mut s = None;
        let grammar = Grammar::define(|g| {
            let start = g.nonterminal("S")?;
            let a = g.nonterminal("A")?;
            let b = g.nonterminal("B")?;
            g.start_symbol(start);
            g.production(start, [N(a), N(b)])?;
            g.production(a, [])?;
            g.production(b, [])?;
            s = Some(start);
            Ok(())
        })
        .unwrap();

        let first = FirstSets::new(&grammar);
        assert!(first.is_nullable(N(s.unwrap())));
    }

    #[test]
    fn left_recursion_converges() {
        // E : E + num | num
        let mut ids = None;
        let grammar = Grammar::define(|g| {
            let plus = g.terminal("+")?;
            let num = g.terminal("num")?;
            let e = g.nonterminal("E")?;
            g.start_symbol(e);
            g.production(e, [N(e), T(plus), T(num)])?;
            g.production(e, [T(num)])?;
            ids = Some((num, e));
            Ok(())
        })
        .unwrap();
        let (num, e) = ids.unwrap();

        let first = FirstSets::new(&grammar);
        assert_eq!(first.first(N(e)), set([num]));
    }

    #[test]
    fn sequence_first_folds_nullable_prefixes() {
        let mut ids = None;
        let grammar = Grammar::define(|g| {
            let x = g.terminal("x")?;
            let y = g.terminal("y")?;
            let s = g.nonterminal("S")?;
            let a = g.nonterminal("A")?;
            g.start_symbol(s);
            g.production(s, [N(a), T(y)])?;
            g.production(a, [])?;
            g.production(a, [T(x)])?;
            ids = Some((x, y, a));
            Ok(())
        })
        .unwrap();
        let (x, y, a) = ids.unwrap();

        let first = FirstSets::new(&grammar);
        assert_eq!(first.first_of_sequence(&[N(a), T(y)]), set([x, y]));
        assert_eq!(
            first.first_of_sequence(&[N(a)]),
            set([x, TerminalID::EPSILON])
        );
        assert_eq!(
            first.first_of_sequence(&[]),
            set([TerminalID::EPSILON])
        );
        // The suffix rule folds the parent lookahead in when nullable.
        assert_eq!(first.first_of_suffix(&[N(a)], y), set([x, y]));
        assert_eq!(first.first_of_suffix(&[T(x)], y), set([x]));
    }

    #[test]
    fn analysis_is_idempotent() {
        let grammar = Grammar::define(|g| {
            let plus = g.terminal("+")?;
            let num = g.terminal("num")?;
            let e = g.nonterminal("E")?;
            let t = g.nonterminal("T")?;
            g.start_symbol(e);
            g.production(e, [N(e), T(plus), N(t)])?;
            g.production(e, [N(t)])?;
            g.production(t, [T(num)])?;
            g.production(t, [])?;
            Ok(())
        })
        .unwrap();

        let a = FirstSets::new(&grammar);
        let b = FirstSets::new(&grammar);
        for (_, production) in grammar.productions() {
            let head = N(production.left());
            assert_eq!(a.first(head), b.first(head));
            for symbol in production.right() {
                assert_eq!(a.first(*symbol), b.first(*symbol));
            }
        }
    }

    #[test]
    fn undefined_nonterminal_has_empty_first() {
        let mut dangling = None;
        let grammar = Grammar::define(|g| {
            let num = g.terminal("num")?;
            let s = g.nonterminal("S")?;
            let u = g.nonterminal("U")?;
            g.start_symbol(s);
            g.production(s, [T(num), N(u)])?;
            dangling = Some(u);
            Ok(())
        })
        .unwrap();

        let first = FirstSets::new(&grammar);
        assert!(first.first(N(dangling.unwrap())).is_empty());
    }

    #[test]
    fn start_nonterminal_id_is_reserved() {
        let grammar = Grammar::define(|g| {
            let num = g.terminal("num")?;
            let e = g.nonterminal("E")?;
            g.start_symbol(e);
            g.production(e, [T(num)])?;
            Ok(())
        })
        .unwrap();
        assert_eq!(grammar.nonterminal_name(NonterminalID::START), "E'");
    }
}
