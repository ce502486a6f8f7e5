//! Closure sets: the item collection of one automaton state.

use crate::{
    first_sets::FirstSets,
    grammar::{Grammar, Symbol},
    item::{lookahead, ItemCore, LR1Item},
    types::{Map, Set},
    util::display_fn,
};
use std::fmt;

/// Kernel items plus every item derivable from them, keyed by canonical
/// item identity with merged lookaheads. Mutable only while its own closure
/// expansion runs; frozen once returned.
#[derive(Debug, Clone)]
pub struct ClosureSet {
    kernel: Map<ItemCore, Set<Symbol>>,
    items: Map<ItemCore, Set<Symbol>>,
}

impl ClosureSet {
    /// Expand the closure of `seeds`. The seeds become the kernel; seeds
    /// sharing a canonical identity merge their lookaheads into one item.
    pub fn closure(
        grammar: &Grammar,
        firsts: &FirstSets,
        seeds: impl IntoIterator<Item = LR1Item>,
    ) -> Self {
        let mut kernel: Map<ItemCore, Set<Symbol>> = Map::default();
        for item in seeds {
            let (core, lookaheads) = item.into_parts();
            kernel.entry(core).or_default().extend(lookaheads);
        }
        let mut items = kernel.clone();

        let mut changed = true;
        while changed {
            changed = false;

            // candidate items derived from nonterminals after the dot
            let mut added: Map<ItemCore, Set<Symbol>> = Map::default();
            for (core, lookaheads) in &items {
                let next = match core.next_symbol() {
                    Some(symbol) if grammar.is_nonterminal(symbol) => symbol.clone(),
                    _ => continue,
                };

                let derived =
                    lookahead(grammar, firsts, core.context_after_next(), lookaheads);
                for rule in grammar.productions_of(&next) {
                    let candidate = ItemCore::new(rule.lhs().clone(), rule.rhs().to_vec(), 0)
                        .expect("dot 0 is always in range");
                    added
                        .entry(candidate)
                        .or_default()
                        .extend(derived.iter().cloned());
                }
            }

            // adding an existing identity unions lookaheads, never replaces
            for (core, lookaheads) in added {
                let slot = items.entry(core).or_insert_with(|| {
                    changed = true;
                    Set::default()
                });
                for symbol in lookaheads {
                    changed |= slot.insert(symbol);
                }
            }
        }

        Self { kernel, items }
    }

    pub fn kernel(&self) -> &Map<ItemCore, Set<Symbol>> {
        &self.kernel
    }

    pub fn items(&self) -> &Map<ItemCore, Set<Symbol>> {
        &self.items
    }

    /// The kernel as owned items, for re-closing a state after a lookahead
    /// merge.
    pub fn kernel_items(&self) -> Vec<LR1Item> {
        self.kernel
            .iter()
            .map(|(core, lookaheads)| LR1Item::from_parts(core.clone(), lookaheads.clone()))
            .collect()
    }

    /// The kernel identities in canonical order, the registry key for state
    /// de-duplication.
    pub fn kernel_cores(&self) -> Vec<ItemCore> {
        let mut cores: Vec<ItemCore> = self.kernel.keys().cloned().collect();
        cores.sort();
        cores
    }

    /// Every distinct symbol appearing after a dot, i.e. the labels of this
    /// state's outgoing transitions. Complete items contribute nothing.
    pub fn transition_symbols(&self) -> Set<Symbol> {
        self.items
            .keys()
            .filter_map(|core| core.next_symbol().cloned())
            .collect()
    }

    /// Items whose production is complete, ready to reduce.
    pub fn completed(&self) -> impl Iterator<Item = (&ItemCore, &Set<Symbol>)> + '_ {
        self.items
            .iter()
            .filter(|(core, _)| core.is_complete())
    }

    /// The kernel of the GOTO target on `symbol`: every item expecting
    /// `symbol` next, advanced over it. Not yet closed.
    pub fn goto_kernel(&self, symbol: &Symbol) -> Vec<LR1Item> {
        self.items
            .iter()
            .filter(|(core, _)| core.next_symbol() == Some(symbol))
            .map(|(core, lookaheads)| {
                let advanced = core
                    .advanced()
                    .expect("an item with a next symbol can advance");
                LR1Item::from_parts(advanced, lookaheads.clone())
            })
            .collect()
    }

    /// Kernel equality: same identities and identical lookaheads per
    /// identity. This decides whether a freshly computed state already
    /// exists in an automaton.
    pub fn is_equal(&self, other: &Self) -> bool {
        self.kernel == other.kernel
    }

    /// Union `other`'s kernel lookaheads into this kernel (and the matching
    /// closed items). Returns whether anything changed. Callers re-close the
    /// set afterwards so merged lookaheads reach derived items.
    pub fn merge_kernel_lookaheads(&mut self, other: &Self) -> bool {
        let mut changed = false;
        for (core, lookaheads) in &other.kernel {
            let slot = self.kernel.entry(core.clone()).or_default();
            for symbol in lookaheads {
                changed |= slot.insert(symbol.clone());
            }
            let item = self.items.entry(core.clone()).or_default();
            for symbol in lookaheads {
                item.insert(symbol.clone());
            }
        }
        changed
    }

    pub fn display(&self) -> impl fmt::Display + '_ {
        display_fn(|f| {
            for (core, lookaheads) in &self.items {
                write!(f, "- {}  [", core.display())?;
                for (i, symbol) in lookaheads.iter().enumerate() {
                    if i > 0 {
                        f.write_str(" ")?;
                    }
                    write!(f, "{}", symbol)?;
                }
                writeln!(f, "]")?;
            }
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grammar::test_config;

    fn sym(name: &str) -> Symbol {
        Symbol::from(name)
    }

    fn syms(names: &[&str]) -> Vec<Symbol> {
        names.iter().map(|name| sym(name)).collect()
    }

    fn set(names: &[&str]) -> Set<Symbol> {
        names.iter().map(|name| sym(name)).collect()
    }

    /// S := A,  A := a A | epsilon, augmented with $start := S.
    fn nullable_grammar() -> Grammar {
        let config = test_config(
            &["a"],
            &[("S", &[&["A"]]), ("A", &[&["a", "A"], &[]])],
            "S",
        );
        Grammar::new_augmented(&config).unwrap()
    }

    fn state0(grammar: &Grammar, firsts: &FirstSets) -> ClosureSet {
        let seed = LR1Item::new(
            Symbol::augmented_start(),
            syms(&["S"]),
            0,
            set(&["$eoi"]),
        )
        .unwrap();
        ClosureSet::closure(grammar, firsts, [seed])
    }

    #[test]
    fn closure_of_the_augmented_start_item() {
        let grammar = nullable_grammar();
        let firsts = FirstSets::new(&grammar);
        let closure = state0(&grammar, &firsts);

        assert_eq!(closure.kernel().len(), 1);
        assert_eq!(closure.items().len(), 4);

        let expect = [
            (ItemCore::new(Symbol::augmented_start(), syms(&["S"]), 0).unwrap(), set(&["$eoi"])),
            (ItemCore::new(sym("S"), syms(&["A"]), 0).unwrap(), set(&["$eoi"])),
            (ItemCore::new(sym("A"), syms(&["a", "A"]), 0).unwrap(), set(&["$eoi"])),
            (ItemCore::new(sym("A"), vec![Symbol::epsilon()], 0).unwrap(), set(&["$eoi"])),
        ];
        for (core, lookaheads) in expect {
            assert_eq!(closure.items().get(&core), Some(&lookaheads), "{}", core.display());
        }
    }

    #[test]
    fn same_core_lookaheads_collapse_into_one_item() {
        let grammar = nullable_grammar();
        let firsts = FirstSets::new(&grammar);

        let one = LR1Item::new(sym("A"), syms(&["a", "A"]), 1, set(&["$eoi"])).unwrap();
        let two = LR1Item::new(sym("A"), syms(&["a", "A"]), 1, set(&["a"])).unwrap();
        let closure = ClosureSet::closure(&grammar, &firsts, [one, two]);

        assert_eq!(closure.kernel().len(), 1);
        let core = ItemCore::new(sym("A"), syms(&["a", "A"]), 1).unwrap();
        assert_eq!(closure.kernel().get(&core), Some(&set(&["$eoi", "a"])));
    }

    #[test]
    fn closure_is_idempotent() {
        let grammar = nullable_grammar();
        let firsts = FirstSets::new(&grammar);
        let closure = state0(&grammar, &firsts);

        let reclosed = ClosureSet::closure(
            &grammar,
            &firsts,
            closure
                .items()
                .iter()
                .map(|(core, las)| LR1Item::from_parts(core.clone(), las.clone())),
        );
        assert_eq!(reclosed.items(), closure.items());
    }

    #[test]
    fn transition_symbols_exclude_complete_items() {
        let grammar = nullable_grammar();
        let firsts = FirstSets::new(&grammar);
        let closure = state0(&grammar, &firsts);

        // the epsilon item is complete and contributes no label
        assert_eq!(closure.transition_symbols(), set(&["S", "A", "a"]));
        assert_eq!(closure.completed().count(), 1);
    }

    #[test]
    fn goto_kernel_advances_matching_items() {
        let grammar = nullable_grammar();
        let firsts = FirstSets::new(&grammar);
        let closure = state0(&grammar, &firsts);

        let kernel = closure.goto_kernel(&sym("a"));
        assert_eq!(kernel.len(), 1);
        assert_eq!(
            kernel[0].core(),
            &ItemCore::new(sym("A"), syms(&["a", "A"]), 1).unwrap()
        );
        assert_eq!(kernel[0].lookaheads(), &set(&["$eoi"]));
    }

    #[test]
    fn kernel_equality_and_merging() {
        let grammar = nullable_grammar();
        let firsts = FirstSets::new(&grammar);

        let core = ItemCore::new(sym("A"), syms(&["a", "A"]), 1).unwrap();
        let mut left = ClosureSet::closure(
            &grammar,
            &firsts,
            [LR1Item::from_parts(core.clone(), set(&["$eoi"]))],
        );
        let right = ClosureSet::closure(
            &grammar,
            &firsts,
            [LR1Item::from_parts(core.clone(), set(&["a"]))],
        );

        assert!(!left.is_equal(&right));
        assert_eq!(left.kernel_cores(), right.kernel_cores());

        assert!(left.merge_kernel_lookaheads(&right));
        assert_eq!(left.kernel().get(&core), Some(&set(&["$eoi", "a"])));
        // merging again is a no-op
        assert!(!left.merge_kernel_lookaheads(&right));
    }
}
