//! Grammar types.
//!
//! A [`Grammar`] is an immutable set of production rules over interned
//! terminal and nonterminal symbols, together with a designated start
//! symbol. Symbols and productions are identified by dense ids handed out
//! by the [`GrammarDef`] builder; two productions with identical bodies
//! still get distinct ids, which is what lets a [`PrecedenceMap`] attach a
//! precedence to one of them without leaking to the other.

use crate::types::Map;
use std::fmt;

const TERMINAL_ID_OFFSET: u16 = 2;
const NONTERMINAL_ID_OFFSET: u16 = 1;

/// Identifier of a terminal symbol interned in a [`Grammar`].
#[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TerminalID(u16);

impl TerminalID {
    /// Reserved terminal marking the end of input. Appended to every token
    /// stream by the parser; never part of a production body.
    pub const EOI: Self = Self(0);

    /// Reserved terminal for the empty string. It only ever appears as a
    /// member of FIRST sets; never in a production body or in the input.
    pub const EPSILON: Self = Self(1);

    pub(crate) const fn raw(self) -> u16 {
        self.0
    }

    pub(crate) const fn from_raw(raw: u16) -> Self {
        Self(raw)
    }
}

impl fmt::Debug for TerminalID {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            &Self::EOI => f.write_str("TerminalID(<eoi>)"),
            &Self::EPSILON => f.write_str("TerminalID(<epsilon>)"),
            _ => write!(f, "TerminalID({})", self.0),
        }
    }
}

/// Identifier of a nonterminal symbol interned in a [`Grammar`].
#[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NonterminalID(u16);

impl NonterminalID {
    /// Reserved nonterminal heading the augmented start production.
    pub const START: Self = Self(0);
}

impl fmt::Debug for NonterminalID {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            &Self::START => f.write_str("NonterminalID(<start>)"),
            _ => write!(f, "NonterminalID({})", self.0),
        }
    }
}

/// A grammar symbol: either a terminal or a nonterminal.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SymbolID {
    T(TerminalID),
    N(NonterminalID),
}

/// Identifier of a production rule.
#[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ProductionID(u16);

impl ProductionID {
    /// Reserved id of the augmented start production `S' : S`. Reducing it
    /// is how the parser accepts the input.
    pub const ACCEPT: Self = Self(u16::MAX);
}

impl fmt::Debug for ProductionID {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            &Self::ACCEPT => f.write_str("ProductionID(<accept>)"),
            _ => write!(f, "ProductionID({})", self.0),
        }
    }
}

/// A production rule `left : right`.
#[derive(Debug)]
pub struct Production {
    left: NonterminalID,
    right: Vec<SymbolID>,
}

impl Production {
    /// The head nonterminal of this production.
    pub fn left(&self) -> NonterminalID {
        self.left
    }

    /// The body of this production. May be empty (an ε-production).
    pub fn right(&self) -> &[SymbolID] {
        &self.right
    }

    /// The canonical display name of this production, e.g.
    /// `expr : expr + expr`, or `nullable : ε` for an empty body.
    pub fn name(&self, g: &Grammar) -> String {
        let mut name = format!("{} :", g.nonterminal_name(self.left));
        if self.right.is_empty() {
            name.push_str(" ε");
            return name;
        }
        for symbol in &self.right {
            name.push(' ');
            name.push_str(g.symbol_name(*symbol));
        }
        name
    }
}

/// A token delivered to the parser: the terminal it matched, plus the
/// matched text when the token source provides one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub terminal: TerminalID,
    pub value: Option<String>,
}

impl Token {
    /// A token carrying the matched text.
    pub fn new(terminal: TerminalID, value: impl Into<String>) -> Self {
        Self {
            terminal,
            value: Some(value.into()),
        }
    }

    /// A token without matched text, e.g. a punctuation or keyword token.
    pub fn bare(terminal: TerminalID) -> Self {
        Self {
            terminal,
            value: None,
        }
    }

    pub(crate) fn eoi() -> Self {
        Self::bare(TerminalID::EOI)
    }
}

/// Operator precedence: a binding level and an associativity. Levels are
/// compared numerically; associativity only matters on a tie.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct Precedence {
    pub level: u16,
    pub assoc: Assoc,
}

impl Precedence {
    pub const fn new(level: u16, assoc: Assoc) -> Self {
        Self { level, assoc }
    }
}

/// Grouping direction for operators sharing a precedence level.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum Assoc {
    /// `a - b - c` groups as `(a - b) - c`: on a level tie, reduce wins.
    Left,
    /// `a ^ b ^ c` groups as `a ^ (b ^ c)`: on a level tie, shift wins.
    Right,
}

/// The unit a [`Precedence`] can be attached to: a terminal or a specific
/// production (by id, so structurally equal productions stay independent).
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum PrecedenceEntity {
    Terminal(TerminalID),
    Production(ProductionID),
}

impl From<TerminalID> for PrecedenceEntity {
    fn from(t: TerminalID) -> Self {
        Self::Terminal(t)
    }
}

impl From<ProductionID> for PrecedenceEntity {
    fn from(p: ProductionID) -> Self {
        Self::Production(p)
    }
}

/// Precedence assignments for terminals and productions.
///
/// Productions left unassigned inherit, at parser construction, the
/// precedence of the rightmost terminal in their body, or `(0, Left)` when
/// the body contains no terminal.
#[derive(Debug, Default, Clone)]
pub struct PrecedenceMap {
    entries: Map<PrecedenceEntity, Precedence>,
}

impl PrecedenceMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, entity: impl Into<PrecedenceEntity>, precedence: Precedence) {
        self.entries.insert(entity.into(), precedence);
    }

    pub fn get(&self, entity: impl Into<PrecedenceEntity>) -> Option<Precedence> {
        self.entries.get(&entity.into()).copied()
    }

    /// Return a new map in which every production of `grammar` has a
    /// precedence, deriving missing entries from the rightmost terminal of
    /// the body. The receiver is left untouched.
    pub(crate) fn completed(&self, grammar: &Grammar) -> PrecedenceMap {
        let mut entries = self.entries.clone();
        for (id, production) in grammar.productions() {
            if id == ProductionID::ACCEPT {
                continue;
            }
            entries
                .entry(PrecedenceEntity::Production(id))
                .or_insert_with(|| {
                    production
                        .right()
                        .iter()
                        .rev()
                        .find_map(|symbol| match symbol {
                            SymbolID::T(t) => Some(*t),
                            SymbolID::N(_) => None,
                        })
                        .and_then(|t| self.entries.get(&PrecedenceEntity::Terminal(t)).copied())
                        .unwrap_or(Precedence::new(0, Assoc::Left))
                });
        }
        PrecedenceMap { entries }
    }
}

/// An immutable context-free grammar.
#[derive(Debug)]
pub struct Grammar {
    terminals: Map<TerminalID, String>,
    nonterminals: Map<NonterminalID, String>,
    productions: Map<ProductionID, Production>,
    by_head: Map<NonterminalID, Vec<ProductionID>>,
    start_symbol: NonterminalID,
}

impl Grammar {
    /// Define a grammar using the specified function.
    pub fn define<F>(f: F) -> Result<Self, GrammarDefError>
    where
        F: FnOnce(&mut GrammarDef) -> Result<(), GrammarDefError>,
    {
        let mut def = GrammarDef::new();
        f(&mut def)?;
        def.build()
    }

    /// The designated start symbol.
    pub fn start_symbol(&self) -> NonterminalID {
        self.start_symbol
    }

    /// All productions, in declaration order, with the augmented start
    /// production last.
    pub fn productions(&self) -> impl Iterator<Item = (ProductionID, &Production)> + '_ {
        self.productions.iter().map(|(id, p)| (*id, p))
    }

    /// Look up a production by id.
    pub fn production(&self, id: ProductionID) -> &Production {
        &self.productions[&id]
    }

    /// The productions headed by `nonterminal`, in declaration order. A
    /// nonterminal heading no production yields an empty slice.
    pub(crate) fn productions_for(&self, nonterminal: NonterminalID) -> &[ProductionID] {
        self.by_head
            .get(&nonterminal)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// User terminals, in declaration order.
    pub fn terminals(&self) -> impl Iterator<Item = (TerminalID, &str)> + '_ {
        self.terminals
            .iter()
            .filter(|(id, _)| id.raw() >= TERMINAL_ID_OFFSET)
            .map(|(id, name)| (*id, name.as_str()))
    }

    /// Find a terminal by name, for token sources keyed by terminal names.
    pub fn terminal_id(&self, name: &str) -> Option<TerminalID> {
        self.terminals()
            .find_map(|(id, n)| (n == name).then_some(id))
    }

    pub fn terminal_name(&self, id: TerminalID) -> &str {
        &self.terminals[&id]
    }

    pub fn nonterminal_name(&self, id: NonterminalID) -> &str {
        &self.nonterminals[&id]
    }

    pub fn symbol_name(&self, symbol: SymbolID) -> &str {
        match symbol {
            SymbolID::T(t) => self.terminal_name(t),
            SymbolID::N(n) => self.nonterminal_name(n),
        }
    }
}

impl fmt::Display for Grammar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "terminals:")?;
        for (_, name) in self.terminals() {
            write!(f, " {}", name)?;
        }
        write!(f, "\nnonterminals:")?;
        for (id, name) in &self.nonterminals {
            if *id != NonterminalID::START {
                write!(f, " {}", name)?;
            }
        }
        writeln!(
            f,
            "\nstart symbol: {}",
            self.nonterminal_name(self.start_symbol)
        )?;
        writeln!(f, "productions:")?;
        for (_, production) in self.productions() {
            writeln!(f, "  {}", production.name(self))?;
        }
        Ok(())
    }
}

/// Builder for a [`Grammar`].
#[derive(Debug)]
pub struct GrammarDef {
    terminals: Map<TerminalID, String>,
    nonterminals: Map<NonterminalID, String>,
    productions: Map<ProductionID, Production>,
    start_symbol: Option<NonterminalID>,
    next_terminal: u16,
    next_nonterminal: u16,
    next_production: u16,
}

impl GrammarDef {
    pub fn new() -> Self {
        let mut terminals = Map::default();
        terminals.insert(TerminalID::EOI, "$".to_owned());
        terminals.insert(TerminalID::EPSILON, "ε".to_owned());
        Self {
            terminals,
            nonterminals: Map::default(),
            productions: Map::default(),
            start_symbol: None,
            next_terminal: TERMINAL_ID_OFFSET,
            next_nonterminal: NONTERMINAL_ID_OFFSET,
            next_production: 0,
        }
    }

    /// Declare a terminal symbol. Declaring the same name twice returns
    /// the id of the first declaration.
    pub fn terminal(&mut self, name: &str) -> Result<TerminalID, GrammarDefError> {
        if name.is_empty() {
            return Err(GrammarDefError::EmptyName);
        }
        if self.nonterminals.values().any(|n| n.as_str() == name) {
            return Err(GrammarDefError::SymbolKindConflict {
                name: name.to_owned(),
            });
        }
        let existing = self
            .terminals
            .iter()
            .find(|(id, n)| id.raw() >= TERMINAL_ID_OFFSET && n.as_str() == name);
        if let Some((id, _)) = existing {
            return Ok(*id);
        }
        let id = TerminalID(self.next_terminal);
        self.next_terminal += 1;
        self.terminals.insert(id, name.to_owned());
        Ok(id)
    }

    /// Declare a nonterminal symbol. Declaring the same name twice returns
    /// the id of the first declaration.
    pub fn nonterminal(&mut self, name: &str) -> Result<NonterminalID, GrammarDefError> {
        if name.is_empty() {
            return Err(GrammarDefError::EmptyName);
        }
        let terminal_clash = self
            .terminals
            .iter()
            .any(|(id, n)| id.raw() >= TERMINAL_ID_OFFSET && n.as_str() == name);
        if terminal_clash {
            return Err(GrammarDefError::SymbolKindConflict {
                name: name.to_owned(),
            });
        }
        if let Some((id, _)) = self
            .nonterminals
            .iter()
            .find(|(_, n)| n.as_str() == name)
        {
            return Ok(*id);
        }
        let id = NonterminalID(self.next_nonterminal);
        self.next_nonterminal += 1;
        self.nonterminals.insert(id, name.to_owned());
        Ok(id)
    }

    /// Declare a production rule `left : right`.
    pub fn production<I>(
        &mut self,
        left: NonterminalID,
        right: I,
    ) -> Result<ProductionID, GrammarDefError>
    where
        I: IntoIterator<Item = SymbolID>,
    {
        if !self.nonterminals.contains_key(&left) {
            return Err(GrammarDefError::UnknownSymbol);
        }
        let right: Vec<SymbolID> = right.into_iter().collect();
        for symbol in &right {
            match symbol {
                SymbolID::T(t) if t.raw() < TERMINAL_ID_OFFSET => {
                    return Err(GrammarDefError::ReservedTerminalInBody {
                        name: self.terminals[t].clone(),
                    });
                }
                SymbolID::T(t) if !self.terminals.contains_key(t) => {
                    return Err(GrammarDefError::UnknownSymbol);
                }
                SymbolID::N(n) if !self.nonterminals.contains_key(n) => {
                    return Err(GrammarDefError::UnknownSymbol);
                }
                _ => {}
            }
        }
        let id = ProductionID(self.next_production);
        self.next_production += 1;
        self.productions.insert(id, Production { left, right });
        Ok(id)
    }

    /// Designate the start symbol.
    pub fn start_symbol(&mut self, start: NonterminalID) {
        self.start_symbol.replace(start);
    }

    /// Finish the definition, augmenting the grammar with the start
    /// production `S' : S`.
    pub fn build(mut self) -> Result<Grammar, GrammarDefError> {
        let start = self
            .start_symbol
            .ok_or(GrammarDefError::MissingStartSymbol)?;
        if !self.productions.values().any(|p| p.left == start) {
            return Err(GrammarDefError::StartSymbolUndefined {
                name: self.nonterminals[&start].clone(),
            });
        }

        self.nonterminals.insert(
            NonterminalID::START,
            format!("{}'", self.nonterminals[&start]),
        );
        self.productions.insert(
            ProductionID::ACCEPT,
            Production {
                left: NonterminalID::START,
                right: vec![SymbolID::N(start)],
            },
        );

        let mut by_head: Map<NonterminalID, Vec<ProductionID>> = Map::default();
        for (id, production) in &self.productions {
            by_head.entry(production.left).or_default().push(*id);
        }

        Ok(Grammar {
            terminals: self.terminals,
            nonterminals: self.nonterminals,
            productions: self.productions,
            by_head,
            start_symbol: start,
        })
    }
}

impl Default for GrammarDef {
    fn default() -> Self {
        Self::new()
    }
}

/// Precondition failure while defining a grammar.
#[derive(Debug, thiserror::Error)]
pub enum GrammarDefError {
    #[error("symbol names must not be empty")]
    EmptyName,

    #[error("no start symbol was designated")]
    MissingStartSymbol,

    #[error("start symbol `{name}` is not the head of any production")]
    StartSymbolUndefined { name: String },

    #[error("`{name}` is already declared as a symbol of the other kind")]
    SymbolKindConflict { name: String },

    #[error("reserved terminal `{name}` may not appear in a production body")]
    ReservedTerminalInBody { name: String },

    #[error("symbol does not belong to this grammar definition")]
    UnknownSymbol,
}

#[cfg(test)]
mod tests {
    use super::*;
    use SymbolID::*;

    #[test]
    fn production_display_names() {
        let grammar = Grammar::define(|g| {
            let plus = g.terminal("+")?;
            let num = g.terminal("num")?;
            let e = g.nonterminal("E")?;
            g.start_symbol(e);
            g.production(e, [N(e), T(plus), N(e)])?;
            g.production(e, [T(num)])?;
            g.production(e, [])?;
            Ok(())
        })
        .unwrap();

        let names: Vec<String> = grammar
            .productions()
            .map(|(_, p)| p.name(&grammar))
            .collect();
        assert_eq!(names, ["E : E + E", "E : num", "E : ε", "E' : E"]);
    }

    #[test]
    fn identical_bodies_get_distinct_ids() {
        let mut def = GrammarDef::new();
        let num = def.terminal("num").unwrap();
        let e = def.nonterminal("E").unwrap();
        let p1 = def.production(e, [T(num)]).unwrap();
        let p2 = def.production(e, [T(num)]).unwrap();
        assert_ne!(p1, p2);
    }

    #[test]
    fn redeclared_names_are_interned() {
        let mut def = GrammarDef::new();
        let a = def.terminal("a").unwrap();
        let b = def.terminal("a").unwrap();
        assert_eq!(a, b);
        let x = def.nonterminal("X").unwrap();
        let y = def.nonterminal("X").unwrap();
        assert_eq!(x, y);
    }

    #[test]
    fn start_symbol_must_head_a_production() {
        let err = Grammar::define(|g| {
            let a = g.terminal("a")?;
            let s = g.nonterminal("S")?;
            let other = g.nonterminal("A")?;
            g.start_symbol(s);
            g.production(other, [T(a)])?;
            Ok(())
        })
        .unwrap_err();
        assert!(matches!(err, GrammarDefError::StartSymbolUndefined { .. }));
    }

    #[test]
    fn start_symbol_is_mandatory() {
        let err = Grammar::define(|g| {
            let a = g.terminal("a")?;
            let s = g.nonterminal("S")?;
            g.production(s, [T(a)])?;
            Ok(())
        })
        .unwrap_err();
        assert!(matches!(err, GrammarDefError::MissingStartSymbol));
    }

    #[test]
    fn reserved_terminals_are_rejected_in_bodies() {
        let err = Grammar::define(|g| {
            let s = g.nonterminal("S")?;
            g.start_symbol(s);
            g.production(s, [T(TerminalID::EOI)])?;
            Ok(())
        })
        .unwrap_err();
        assert!(matches!(
            err,
            GrammarDefError::ReservedTerminalInBody { .. }
        ));
    }

    #[test]
    fn kind_conflicts_are_rejected() {
        let mut def = GrammarDef::new();
        def.terminal("x").unwrap();
        assert!(matches!(
            def.nonterminal("x"),
            Err(GrammarDefError::SymbolKindConflict { .. })
        ));
        def.nonterminal("Y").unwrap();
        assert!(matches!(
            def.terminal("Y"),
            Err(GrammarDefError::SymbolKindConflict { .. })
        ));
    }

    #[test]
    fn empty_names_are_rejected() {
        let mut def = GrammarDef::new();
        assert!(matches!(def.terminal(""), Err(GrammarDefError::EmptyName)));
        assert!(matches!(
            def.nonterminal(""),
            Err(GrammarDefError::EmptyName)
        ));
    }

    #[test]
    fn precedence_completion_inherits_rightmost_terminal() {
        let mut ids = None;
        let grammar = Grammar::define(|g| {
            let plus = g.terminal("+")?;
            let num = g.terminal("num")?;
            let e = g.nonterminal("E")?;
            g.start_symbol(e);
            let p_add = g.production(e, [N(e), T(plus), N(e)])?;
            let p_num = g.production(e, [T(num)])?;
            let p_eps = g.production(e, [])?;
            ids = Some((plus, p_add, p_num, p_eps));
            Ok(())
        })
        .unwrap();
        let (plus, p_add, p_num, p_eps) = ids.unwrap();

        let mut map = PrecedenceMap::new();
        map.insert(plus, Precedence::new(10, Assoc::Left));
        let completed = map.completed(&grammar);

        // `E : E + E` ends in a nonterminal but its rightmost terminal is `+`.
        assert_eq!(completed.get(p_add), Some(Precedence::new(10, Assoc::Left)));
        // `E : num` inherits from `num`, which has no assignment.
        assert_eq!(completed.get(p_num), Some(Precedence::new(0, Assoc::Left)));
        // An ε-body falls back to the default.
        assert_eq!(completed.get(p_eps), Some(Precedence::new(0, Assoc::Left)));
        // The caller's map is untouched.
        assert_eq!(map.get(p_add), None);
    }

    #[test]
    fn explicit_production_precedence_is_preserved() {
        let mut ids = None;
        let grammar = Grammar::define(|g| {
            let plus = g.terminal("+")?;
            let num = g.terminal("num")?;
            let e = g.nonterminal("E")?;
            g.start_symbol(e);
            let p_add = g.production(e, [N(e), T(plus), N(e)])?;
            g.production(e, [T(num)])?;
            ids = Some((plus, p_add));
            Ok(())
        })
        .unwrap();
        let (plus, p_add) = ids.unwrap();

        let mut map = PrecedenceMap::new();
        map.insert(plus, Precedence::new(10, Assoc::Left));
        map.insert(p_add, Precedence::new(42, Assoc::Right));
        let completed = map.completed(&grammar);
        assert_eq!(
            completed.get(p_add),
            Some(Precedence::new(42, Assoc::Right))
        );
    }
}
