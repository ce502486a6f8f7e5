//! Grammar model: symbols, production rules, and structural queries.

use crate::{
    types::{Map, Set},
    util::display_fn,
};
use std::fmt;

/// Reserved end-of-input marker.
pub const EOF: &str = "$eoi";

/// Reserved marker denoting the empty production.
pub const EPSILON: &str = "$epsilon";

/// Reserved dot marker. Never stored inside a production; reserved so that
/// user grammars cannot claim it for item rendering.
pub const DOT: &str = "$dot";

/// Name of the start symbol synthesized by [`Grammar::new_augmented`].
pub const AUGMENTED_START: &str = "$start";

const RESERVED: &[&str] = &[EOF, EPSILON, DOT, AUGMENTED_START];

/// An opaque symbol name. Whether it denotes a terminal or a nonterminal is
/// answered by the [`Grammar`] that owns it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(transparent)]
pub struct Symbol(Box<str>);

impl Symbol {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn eof() -> Self {
        Self::from(EOF)
    }

    pub fn epsilon() -> Self {
        Self::from(EPSILON)
    }

    pub fn augmented_start() -> Self {
        Self::from(AUGMENTED_START)
    }

    pub fn is_eof(&self) -> bool {
        &*self.0 == EOF
    }

    pub fn is_epsilon(&self) -> bool {
        &*self.0 == EPSILON
    }
}

impl From<&str> for Symbol {
    fn from(name: &str) -> Self {
        Self(name.into())
    }
}

impl From<String> for Symbol {
    fn from(name: String) -> Self {
        Self(name.into_boxed_str())
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A single token definition: the terminal name and the pattern the lexer
/// matches for it. The pattern is opaque to this crate; the tokenizer
/// collaborator interprets it.
#[derive(Debug, Clone)]
pub struct TokenSpec {
    pub name: String,
    pub pattern: String,
}

/// Token definitions grouped the way the lexer configuration groups them.
/// All three categories merge into one terminal set during construction.
#[derive(Debug, Clone, Default)]
pub struct TokenCategories {
    pub symbols: Vec<TokenSpec>,
    pub keywords: Vec<TokenSpec>,
    pub generics: Vec<TokenSpec>,
}

impl TokenCategories {
    fn iter(&self) -> impl Iterator<Item = &TokenSpec> {
        self.symbols
            .iter()
            .chain(self.keywords.iter())
            .chain(self.generics.iter())
    }
}

/// The grammar description consumed by [`Grammar::new`]. Loading this
/// structure from a configuration file is a collaborator's job, not ours.
///
/// An alternative production that is empty, or that consists of the single
/// literal [`EPSILON`] name, denotes the empty production.
#[derive(Debug, Clone)]
pub struct GrammarConfig {
    pub terminals: TokenCategories,
    pub nonterminals: Map<String, Vec<Vec<String>>>,
    pub start_symbol: String,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(transparent)]
pub struct RuleID {
    raw: u32,
}

impl RuleID {
    const fn new(raw: u32) -> Self {
        Self { raw }
    }

    pub const fn into_raw(self) -> u32 {
        self.raw
    }
}

impl fmt::Display for RuleID {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.raw, f)
    }
}

/// A production rule `lhs := rhs`, with the dense id assigned at grammar
/// construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProductionRule {
    id: RuleID,
    lhs: Symbol,
    rhs: Vec<Symbol>,
}

impl ProductionRule {
    pub fn id(&self) -> RuleID {
        self.id
    }

    pub fn lhs(&self) -> &Symbol {
        &self.lhs
    }

    pub fn rhs(&self) -> &[Symbol] {
        &self.rhs
    }

    /// Whether this is the literal empty production `lhs := $epsilon`.
    pub fn is_epsilon(&self) -> bool {
        matches!(&self.rhs[..], [s] if s.is_epsilon())
    }
}

impl fmt::Display for ProductionRule {
    // `"LHS := R1 R2 R3"`
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} :=", self.lhs)?;
        for symbol in &self.rhs {
            write!(f, " {}", symbol)?;
        }
        Ok(())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum GrammarError {
    #[error("malformed grammar configuration: {0}")]
    Config(String),

    #[error("grammar cannot redefine the reserved symbol `{0}'")]
    ReservedSymbol(String),

    #[error("unknown symbol `{0}'")]
    UnresolvedSymbol(String),

    #[error("production `{0}' maps to multiple ambiguous rule ids")]
    AmbiguousProduction(String),

    #[error("production `{0}' not found in this grammar")]
    ProductionNotFound(String),
}

/// An immutable context-free grammar with indexed production rules.
#[derive(Debug)]
pub struct Grammar {
    terminals: Set<Symbol>,
    nonterminals: Set<Symbol>,
    start_symbol: Symbol,
    rules: Map<RuleID, ProductionRule>,
    // nonterminal -> ids of its productions, in declaration order
    forward_index: Map<Symbol, Vec<RuleID>>,
    // symbol -> ids of the productions whose rhs contains it
    inverted_index: Map<Symbol, Vec<RuleID>>,
}

impl Grammar {
    /// Build a grammar from its configuration.
    pub fn new(config: &GrammarConfig) -> Result<Self, GrammarError> {
        validate_config(config)?;
        Ok(Self::build(config))
    }

    /// Build an augmented grammar: a fresh rule `$start := S` wraps the
    /// configured start symbol `S`, and `$start` becomes the start symbol.
    /// Only an augmented grammar may drive automaton construction.
    pub fn new_augmented(config: &GrammarConfig) -> Result<Self, GrammarError> {
        validate_config(config)?;

        let mut config = config.clone();
        let original_start =
            std::mem::replace(&mut config.start_symbol, AUGMENTED_START.to_owned());
        config
            .nonterminals
            .insert(AUGMENTED_START.to_owned(), vec![vec![original_start]]);

        Ok(Self::build(&config))
    }

    // Assumes `config` has passed `validate_config` (modulo the synthesized
    // `$start` entry added by `new_augmented`).
    fn build(config: &GrammarConfig) -> Self {
        let mut terminals: Set<Symbol> = config
            .terminals
            .iter()
            .map(|spec| Symbol::from(&*spec.name))
            .collect();

        // the core itself owns the epsilon and end-of-input markers
        terminals.insert(Symbol::epsilon());
        terminals.insert(Symbol::eof());

        let nonterminals: Set<Symbol> = config
            .nonterminals
            .keys()
            .map(|name| Symbol::from(&**name))
            .collect();

        // enumerate rules with dense ids, building the forward index in the
        // same pass
        let mut rules: Map<RuleID, ProductionRule> = Map::default();
        let mut forward_index: Map<Symbol, Vec<RuleID>> = Map::default();
        let mut next_id = 0;
        for (name, alternatives) in &config.nonterminals {
            let lhs = Symbol::from(&**name);
            let index = forward_index.entry(lhs.clone()).or_default();
            for alternative in alternatives {
                let id = RuleID::new(next_id);
                next_id += 1;

                let rhs: Vec<Symbol> = if alternative.is_empty() {
                    vec![Symbol::epsilon()]
                } else {
                    alternative.iter().map(|s| Symbol::from(&**s)).collect()
                };

                rules.insert(
                    id,
                    ProductionRule {
                        id,
                        lhs: lhs.clone(),
                        rhs,
                    },
                );
                index.push(id);
            }
        }

        let mut inverted_index: Map<Symbol, Vec<RuleID>> = Map::default();
        for (&id, rule) in &rules {
            for symbol in rule.rhs() {
                let index = inverted_index.entry(symbol.clone()).or_default();
                if !index.contains(&id) {
                    index.push(id);
                }
            }
        }

        Self {
            terminals,
            nonterminals,
            start_symbol: Symbol::from(&*config.start_symbol),
            rules,
            forward_index,
            inverted_index,
        }
    }

    pub fn terminals(&self) -> impl Iterator<Item = &Symbol> + '_ {
        self.terminals.iter()
    }

    pub fn nonterminals(&self) -> impl Iterator<Item = &Symbol> + '_ {
        self.nonterminals.iter()
    }

    pub fn start_symbol(&self) -> &Symbol {
        &self.start_symbol
    }

    pub fn rules(&self) -> impl Iterator<Item = (RuleID, &ProductionRule)> + '_ {
        self.rules.iter().map(|(id, rule)| (*id, rule))
    }

    pub fn rule(&self, id: RuleID) -> Option<&ProductionRule> {
        self.rules.get(&id)
    }

    pub fn is_terminal(&self, symbol: &Symbol) -> bool {
        self.terminals.contains(symbol)
    }

    pub fn is_nonterminal(&self, symbol: &Symbol) -> bool {
        self.nonterminals.contains(symbol)
    }

    /// The productions of `nonterminal`, in declaration order. A symbol with
    /// no productions yields an empty list, not an error.
    pub fn productions_of(&self, nonterminal: &Symbol) -> Vec<&ProductionRule> {
        self.forward_index
            .get(nonterminal)
            .map(|ids| ids.iter().map(|id| &self.rules[id]).collect())
            .unwrap_or_default()
    }

    /// Every production whose rhs contains `symbol` at least once.
    pub fn productions_deriving_symbol(&self, symbol: &Symbol) -> Vec<&ProductionRule> {
        self.inverted_index
            .get(symbol)
            .map(|ids| ids.iter().map(|id| &self.rules[id]).collect())
            .unwrap_or_default()
    }

    /// Resolve the id of the production `lhs := rhs` by intersecting the
    /// forward index of `lhs` with the inverted index of every rhs symbol.
    pub fn production_id(&self, lhs: &Symbol, rhs: &[Symbol]) -> Result<RuleID, GrammarError> {
        let forward = self
            .forward_index
            .get(lhs)
            .ok_or_else(|| GrammarError::UnresolvedSymbol(lhs.as_str().to_owned()))?;
        let mut candidates: Set<RuleID> = forward.iter().copied().collect();

        for symbol in rhs {
            if !self.terminals.contains(symbol) && !self.nonterminals.contains(symbol) {
                return Err(GrammarError::UnresolvedSymbol(symbol.as_str().to_owned()));
            }
            let inverted = self
                .inverted_index
                .get(symbol)
                .map_or(&[][..], Vec::as_slice);
            candidates.retain(|id| inverted.contains(id));
        }

        // the index intersection alone is insufficient: a surviving candidate
        // must also match the queried rhs exactly, or a reordering of the
        // same symbols would resolve to a wrong rule
        candidates.retain(|id| self.rules[id].rhs() == rhs);

        let display = display_fn(|f| {
            write!(f, "{} :=", lhs)?;
            for symbol in rhs {
                write!(f, " {}", symbol)?;
            }
            Ok(())
        });
        match candidates.len() {
            0 => Err(GrammarError::ProductionNotFound(display.to_string())),
            1 => Ok(candidates[0]),
            _ => Err(GrammarError::AmbiguousProduction(display.to_string())),
        }
    }

    /// Whether `symbol` is a nonterminal possessing the literal production
    /// `symbol := $epsilon`. Deliberately non-transitive: a nonterminal that
    /// is nullable only through a chain of other nullable nonterminals is
    /// not reported here, and the rest of the crate is defined relative to
    /// this exact check.
    pub fn derives_epsilon(&self, symbol: &Symbol) -> bool {
        if !self.nonterminals.contains(symbol) {
            return false;
        }
        self.productions_of(symbol)
            .iter()
            .any(|rule| rule.is_epsilon())
    }
}

impl fmt::Display for Grammar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "## terminals:")?;
        for terminal in &self.terminals {
            writeln!(f, "{}", terminal)?;
        }

        writeln!(f, "\n## nonterminals:")?;
        for nonterminal in &self.nonterminals {
            write!(f, "{}", nonterminal)?;
            if *nonterminal == self.start_symbol {
                write!(f, " (start)")?;
            }
            writeln!(f)?;
        }

        writeln!(f, "\n## rules:")?;
        for rule in self.rules.values() {
            writeln!(f, "{}", rule)?;
        }

        Ok(())
    }
}

fn validate_config(config: &GrammarConfig) -> Result<(), GrammarError> {
    let mut terminals: Set<&str> = Set::default();
    for spec in config.terminals.iter() {
        validate_name(&spec.name)?;
        terminals.insert(&spec.name);
    }

    let mut nonterminals: Set<&str> = Set::default();
    for name in config.nonterminals.keys() {
        validate_name(name)?;
        if terminals.contains(&**name) {
            return Err(GrammarError::Config(format!(
                "`{}' is declared both as a terminal and as a nonterminal",
                name
            )));
        }
        nonterminals.insert(name);
    }

    if !nonterminals.contains(&*config.start_symbol) {
        return Err(GrammarError::Config(format!(
            "start symbol `{}' is not a declared nonterminal",
            config.start_symbol
        )));
    }

    for (name, alternatives) in &config.nonterminals {
        for alternative in alternatives {
            for symbol in alternative {
                if symbol == EPSILON {
                    continue;
                }
                if !terminals.contains(&**symbol) && !nonterminals.contains(&**symbol) {
                    return Err(GrammarError::Config(format!(
                        "production of `{}' references the undeclared symbol `{}'",
                        name, symbol
                    )));
                }
            }
        }
    }

    Ok(())
}

fn validate_name(name: &str) -> Result<(), GrammarError> {
    if RESERVED.contains(&name) {
        return Err(GrammarError::ReservedSymbol(name.to_owned()));
    }
    if !is_valid_name(name) {
        return Err(GrammarError::Config(format!(
            "`{}' is not a valid symbol name",
            name
        )));
    }
    Ok(())
}

fn is_valid_name(s: &str) -> bool {
    let mut chars = s.chars();
    let Some(first) = chars.next() else {
        return false;
    };
    if first != '_' && !unicode_ident::is_xid_start(first) {
        return false;
    }
    chars.all(unicode_ident::is_xid_continue)
}

/// Build a [`GrammarConfig`] from terminal names and production lists.
#[cfg(test)]
pub(crate) fn test_config(
    terminals: &[&str],
    nonterminals: &[(&str, &[&[&str]])],
    start_symbol: &str,
) -> GrammarConfig {
    GrammarConfig {
        terminals: TokenCategories {
            generics: terminals
                .iter()
                .map(|name| TokenSpec {
                    name: (*name).to_owned(),
                    pattern: String::new(),
                })
                .collect(),
            ..TokenCategories::default()
        },
        nonterminals: nonterminals
            .iter()
            .map(|(name, alternatives)| {
                (
                    (*name).to_owned(),
                    alternatives
                        .iter()
                        .map(|alt| alt.iter().map(|s| (*s).to_owned()).collect())
                        .collect(),
                )
            })
            .collect(),
        start_symbol: start_symbol.to_owned(),
    }
}
