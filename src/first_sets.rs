//! FIRST-set computation.

use crate::{
    grammar::{Grammar, Symbol},
    types::{Map, Set},
};

/// The terminals that can begin a derivation of each grammar symbol.
///
/// `FIRST(t) = {t}` for every terminal; nonterminal sets grow monotonically
/// over full sweeps until a sweep leaves every set unchanged.
#[derive(Debug)]
pub struct FirstSets {
    map: Map<Symbol, Set<Symbol>>,
}

impl FirstSets {
    pub fn new(grammar: &Grammar) -> Self {
        let mut map: Map<Symbol, Set<Symbol>> = Map::default();
        for terminal in grammar.terminals() {
            map.insert(terminal.clone(), std::iter::once(terminal.clone()).collect());
        }
        for nonterminal in grammar.nonterminals() {
            map.insert(nonterminal.clone(), Set::default());
        }

        let mut sweeps = 0usize;
        while sweep(grammar, &mut map) {
            sweeps += 1;
        }
        tracing::debug!(sweeps, "FIRST sets stabilized");

        Self { map }
    }

    /// `FIRST(symbol)`. Panics if `symbol` does not belong to the grammar
    /// this was computed for.
    pub fn first(&self, symbol: &Symbol) -> &Set<Symbol> {
        self.map.get(symbol).expect("symbol not in this grammar")
    }

    pub fn get(&self, symbol: &Symbol) -> Option<&Set<Symbol>> {
        self.map.get(symbol)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Symbol, &Set<Symbol>)> + '_ {
        self.map.iter()
    }
}

/// One full pass over all nonterminals, recomputing each FIRST set from the
/// current state of the map. Returns whether any set grew.
fn sweep(grammar: &Grammar, map: &mut Map<Symbol, Set<Symbol>>) -> bool {
    let mut changed = false;

    for nonterminal in grammar.nonterminals() {
        let mut first = map
            .get(nonterminal)
            .expect("FIRST entry exists for every nonterminal")
            .clone();
        let before = first.len();

        for rule in grammar.productions_of(nonterminal) {
            for symbol in rule.rhs() {
                if symbol.is_epsilon() {
                    // the literal empty production contributes nothing
                    break;
                }
                if let Some(of_symbol) = map.get(symbol) {
                    first.extend(of_symbol.iter().cloned());
                }
                if grammar.is_terminal(symbol) || !grammar.derives_epsilon(symbol) {
                    // no later symbol of this production can be leading
                    break;
                }
            }
        }

        if first.len() > before {
            changed = true;
            map.insert(nonterminal.clone(), first);
        }
    }

    changed
}
