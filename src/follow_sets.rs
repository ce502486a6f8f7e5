//! FOLLOW-set computation.

use crate::{
    first_sets::FirstSets,
    grammar::{Grammar, Symbol},
    types::{Map, Set},
};

/// The terminals that can immediately follow each nonterminal in some
/// derivation. `FOLLOW(start)` seeds with the end-of-input marker; the
/// remaining sets grow monotonically over full sweeps until stable.
#[derive(Debug)]
pub struct FollowSets {
    map: Map<Symbol, Set<Symbol>>,
}

impl FollowSets {
    pub fn new(grammar: &Grammar, firsts: &FirstSets) -> Self {
        let mut map: Map<Symbol, Set<Symbol>> = Map::default();
        for nonterminal in grammar.nonterminals() {
            let follow = if nonterminal == grammar.start_symbol() {
                std::iter::once(Symbol::eof()).collect()
            } else {
                Set::default()
            };
            map.insert(nonterminal.clone(), follow);
        }

        let mut sweeps = 0usize;
        while sweep(grammar, firsts, &mut map) {
            sweeps += 1;
        }
        tracing::debug!(sweeps, "FOLLOW sets stabilized");

        Self { map }
    }

    /// `FOLLOW(nonterminal)`. Panics if `nonterminal` does not belong to the
    /// grammar this was computed for.
    pub fn follow(&self, nonterminal: &Symbol) -> &Set<Symbol> {
        self.map
            .get(nonterminal)
            .expect("nonterminal not in this grammar")
    }

    pub fn get(&self, nonterminal: &Symbol) -> Option<&Set<Symbol>> {
        self.map.get(nonterminal)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Symbol, &Set<Symbol>)> + '_ {
        self.map.iter()
    }
}

/// One full pass over all nonterminals. For nonterminal `X`, every
/// occurrence of `X` in every production deriving it contributes: the
/// lhs FOLLOW set when `X` is rightmost, otherwise FIRST of the symbol to
/// its right, plus the lhs FOLLOW set when that symbol can derive epsilon.
/// Returns whether any set grew.
fn sweep(grammar: &Grammar, firsts: &FirstSets, map: &mut Map<Symbol, Set<Symbol>>) -> bool {
    let mut changed = false;
    let epsilon = Symbol::epsilon();

    for nonterminal in grammar.nonterminals() {
        let mut follow = map
            .get(nonterminal)
            .expect("FOLLOW entry exists for every nonterminal")
            .clone();
        let before = follow.len();

        for rule in grammar.productions_deriving_symbol(nonterminal) {
            let lhs_follow = map
                .get(rule.lhs())
                .cloned()
                .expect("FOLLOW entry exists for every nonterminal");
            let rhs = rule.rhs();

            // every occurrence matters, not just the first
            for (idx, symbol) in rhs.iter().enumerate() {
                if symbol != nonterminal {
                    continue;
                }
                match rhs.get(idx + 1) {
                    None => {
                        // rightmost: whatever follows the lhs follows X
                        follow.extend(lhs_follow.iter().cloned());
                    }
                    Some(next) => {
                        follow.extend(firsts.first(next).iter().cloned());
                        if grammar.is_nonterminal(next) && grammar.derives_epsilon(next) {
                            follow.extend(lhs_follow.iter().cloned());
                        }
                    }
                }
            }
        }

        // epsilon must never appear in a FOLLOW set
        follow.swap_remove(&epsilon);

        if follow.len() > before {
            changed = true;
            map.insert(nonterminal.clone(), follow);
        }
    }

    changed
}
