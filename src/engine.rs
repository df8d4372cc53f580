//! The lazy LR(1) transition engine.
//!
//! States are sets of LR(1) items. Nothing is precomputed: the engine
//! materializes a state the first time a transition reaches it, interning
//! the item set so that equal sets share one [`StateId`]. Transitions and
//! resolved actions are memoized for the lifetime of the engine, so each
//! (state, symbol) pair is computed at most once per parser.

use crate::first::FirstSets;
use crate::grammar::{Assoc, Grammar, PrecedenceMap, ProductionID, SymbolID, TerminalID};
use crate::types::Map;
use std::cmp::Reverse;
use std::collections::BTreeSet;
use std::fmt;

/// An LR(1) item: a production, a dot position inside its body, and a
/// single lookahead terminal.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub(crate) struct Item {
    pub(crate) production: ProductionID,
    pub(crate) dot: usize,
    pub(crate) lookahead: TerminalID,
}

impl Item {
    /// The symbol immediately right of the dot, if any.
    fn next_symbol(&self, g: &Grammar) -> Option<SymbolID> {
        g.production(self.production).right().get(self.dot).copied()
    }

    /// The body suffix after the symbol right of the dot.
    fn rest_after_next<'g>(&self, g: &'g Grammar) -> &'g [SymbolID] {
        let right = g.production(self.production).right();
        right.get(self.dot + 1..).unwrap_or(&[])
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

/// The canonical identity of a state is its item set; `BTreeSet` keeps
/// the items ordered by (production, dot, lookahead), which makes the
/// reduce-candidate scan deterministic by declaration order.
pub(crate) type ItemSet = BTreeSet<Item>;

/// Handle of a materialized state. Equal item sets always resolve to the
/// same id, so comparing states is comparing ids.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StateId(u32);

impl fmt::Display for StateId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

/// The move the parser makes on a (state, lookahead) pair.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub(crate) enum Action {
    Shift(StateId),
    Reduce(ProductionID),
}

pub(crate) struct TransitionEngine<'g> {
    grammar: &'g Grammar,
    first_sets: FirstSets,
    precedence: PrecedenceMap,
    states: Vec<ItemSet>,
    canonical: Map<ItemSet, StateId>,
    transitions: Map<(StateId, SymbolID), StateId>,
    actions: Map<(StateId, TerminalID), Action>,
}

impl<'g> TransitionEngine<'g> {
    /// `precedence` must already be completed over the grammar's
    /// productions.
    pub(crate) fn new(grammar: &'g Grammar, precedence: PrecedenceMap) -> Self {
        Self {
            grammar,
            first_sets: FirstSets::new(grammar),
            precedence,
            states: Vec::new(),
            canonical: Map::default(),
            transitions: Map::default(),
            actions: Map::default(),
        }
    }

    /// Materialize the initial state: the closure of `[S' : . S, $]`.
    pub(crate) fn initial_state(&mut self) -> StateId {
        let seed: ItemSet = [Item {
            production: ProductionID::ACCEPT,
            dot: 0,
            lookahead: TerminalID::EOI,
        }]
        .into();
        let closure = self.closure(seed);
        self.intern(closure)
    }

    fn items(&self, id: StateId) -> &ItemSet {
        &self.states[id.0 as usize]
    }

    /// Return the canonical id for an item set, materializing the state on
    /// first sight.
    fn intern(&mut self, items: ItemSet) -> StateId {
        if let Some(id) = self.canonical.get(&items) {
            return *id;
        }
        let id = StateId(self.states.len() as u32);
        tracing::trace!(state = %id, items = items.len(), "materialized state");
        self.states.push(items.clone());
        self.canonical.insert(items, id);
        id
    }

    /// Expand a seed item set to its LR(1) closure: whenever the dot sits
    /// before a nonterminal `B` in `[A : α . B β, a]`, add `[B : . γ, c]`
    /// for every production `B : γ` and every `c ∈ FIRST(β a)`.
    fn closure(&self, seed: ItemSet) -> ItemSet {
        let mut closure = seed;
        let mut work: Vec<Item> = closure.iter().copied().collect();
        while let Some(item) = work.pop() {
            let Some(SymbolID::N(nonterminal)) = item.next_symbol(self.grammar) else {
                continue;
            };
            let lookaheads = self
                .first_sets
                .first_of_suffix(item.rest_after_next(self.grammar), item.lookahead);
            for &production in self.grammar.productions_for(nonterminal) {
                for lookahead in lookaheads.iter() {
                    let new_item = Item {
                        production,
                        dot: 0,
                        lookahead,
                    };
                    if closure.insert(new_item) {
                        work.push(new_item);
                    }
                }
            }
        }
        closure
    }

    /// The GOTO function: the state reached by shifting `symbol` over
    /// `state`, or `None` when no item has `symbol` right of its dot.
    pub(crate) fn goto(&mut self, state: StateId, symbol: SymbolID) -> Option<StateId> {
        if let Some(next) = self.transitions.get(&(state, symbol)) {
            return Some(*next);
        }

        let kernel: ItemSet = self
            .items(state)
            .iter()
            .filter(|item| item.next_symbol(self.grammar) == Some(symbol))
            .map(Item::advanced)
            .collect();
        if kernel.is_empty() {
            return None;
        }

        let closure = self.closure(kernel);
        let next = self.intern(closure);
        self.transitions.insert((state, symbol), next);
        Some(next)
    }

    /// The action for a (state, lookahead) pair, resolved on first use and
    /// cached. `None` means a syntax error at parse time.
    pub(crate) fn action(&mut self, state: StateId, lookahead: TerminalID) -> Option<Action> {
        if let Some(action) = self.actions.get(&(state, lookahead)) {
            return Some(*action);
        }
        let action = self.resolve_action(state, lookahead)?;
        self.actions.insert((state, lookahead), action);
        Some(action)
    }

    fn resolve_action(&mut self, state: StateId, lookahead: TerminalID) -> Option<Action> {
        let candidates: Vec<ProductionID> = self
            .items(state)
            .iter()
            .filter(|item| item.is_completed(self.grammar) && item.lookahead == lookahead)
            .map(|item| item.production)
            .collect();
        let reduce = self.best_reduction(&candidates);
        let shift = self.goto(state, SymbolID::T(lookahead));

        match (reduce, shift) {
            (Some(production), Some(next)) => {
                let action = if self.should_reduce(production, lookahead) {
                    Action::Reduce(production)
                } else {
                    Action::Shift(next)
                };
                tracing::trace!(
                    state = %state,
                    lookahead = %self.grammar.terminal_name(lookahead),
                    ?action,
                    "shift/reduce conflict resolved by precedence"
                );
                Some(action)
            }
            (Some(production), None) => Some(Action::Reduce(production)),
            (None, Some(next)) => Some(Action::Shift(next)),
            (None, None) => None,
        }
    }

    /// Pick the reduce candidate with the highest precedence level; on a
    /// level tie, the production declared first wins.
    fn best_reduction(&self, candidates: &[ProductionID]) -> Option<ProductionID> {
        candidates.iter().copied().min_by_key(|&production| {
            let level = self
                .precedence
                .get(production)
                .map_or(0, |precedence| precedence.level);
            (Reverse(level), production)
        })
    }

    /// Shift/reduce arbitration: higher level wins; on a tie, left
    /// associativity reduces and right associativity shifts; a missing
    /// precedence on either side defaults to shift.
    fn should_reduce(&self, production: ProductionID, lookahead: TerminalID) -> bool {
        match (self.precedence.get(production), self.precedence.get(lookahead)) {
            (Some(rule), Some(token)) => {
                if rule.level != token.level {
                    rule.level > token.level
                } else {
                    rule.assoc == Assoc::Left
                }
            }
            _ => false,
        }
    }
}
