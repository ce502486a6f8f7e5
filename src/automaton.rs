//! LR(1) automaton construction.

use crate::{
    closure::ClosureSet,
    first_sets::FirstSets,
    grammar::{Grammar, Symbol},
    item::{ItemCore, ItemError, LR1Item},
    types::{Map, Queue},
    util::display_fn,
};
use std::fmt;

#[derive(Debug, thiserror::Error)]
pub enum AutomatonError {
    #[error("an LR(1) automaton requires an augmented grammar")]
    MissingAugmentation,

    #[error(transparent)]
    Item(#[from] ItemError),
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(transparent)]
pub struct StateID {
    raw: u32,
}

impl StateID {
    pub const START: Self = Self::new(0);

    const fn new(raw: u32) -> Self {
        Self { raw }
    }

    pub const fn into_raw(self) -> u32 {
        self.raw
    }
}

impl fmt::Display for StateID {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.raw, f)
    }
}

/// One automaton state: a frozen closure set and its outgoing edges.
#[derive(Debug)]
pub struct ParserState {
    id: StateID,
    closure: ClosureSet,
    transitions: Map<Symbol, StateID>,
}

impl ParserState {
    pub fn id(&self) -> StateID {
        self.id
    }

    pub fn closure(&self) -> &ClosureSet {
        &self.closure
    }

    pub fn transitions(&self) -> impl Iterator<Item = (&Symbol, StateID)> + '_ {
        self.transitions.iter().map(|(symbol, id)| (symbol, *id))
    }

    pub fn transition(&self, symbol: &Symbol) -> Option<StateID> {
        self.transitions.get(symbol).copied()
    }
}

/// The canonical LR(1) automaton: every state reachable from the augmented
/// start item via GOTO, de-duplicated by kernel identity with lookaheads
/// merged to a fixed point.
#[derive(Debug)]
pub struct LR1Automaton<'g> {
    grammar: &'g Grammar,
    states: Map<StateID, ParserState>,
}

impl<'g> LR1Automaton<'g> {
    pub fn generate(grammar: &'g Grammar) -> Result<Self, AutomatonError> {
        // the synthetic start symbol must have exactly one production
        let start_rules = grammar.productions_of(&Symbol::augmented_start());
        let start_rule = match start_rules.as_slice() {
            [rule] => *rule,
            _ => return Err(AutomatonError::MissingAugmentation),
        };

        let first_sets = FirstSets::new(grammar);
        let seed = LR1Item::new(
            start_rule.lhs().clone(),
            start_rule.rhs().to_vec(),
            0,
            std::iter::once(Symbol::eof()).collect(),
        )?;

        let mut builder = Builder {
            grammar,
            first_sets,
            states: Map::default(),
            registry: Map::default(),
            queue: Queue::default(),
            next_id: 1,
        };

        let start = ClosureSet::closure(grammar, &builder.first_sets, [seed]);
        builder.registry.insert(start.kernel_cores(), StateID::START);
        builder.states.insert(
            StateID::START,
            ParserState {
                id: StateID::START,
                closure: start,
                transitions: Map::default(),
            },
        );
        builder.queue.push(StateID::START);
        builder.populate();

        tracing::debug!(states = builder.states.len(), "LR(1) automaton populated");
        Ok(Self {
            grammar,
            states: builder.states,
        })
    }

    pub fn grammar(&self) -> &'g Grammar {
        self.grammar
    }

    pub fn states(&self) -> impl Iterator<Item = (StateID, &ParserState)> + '_ {
        self.states.iter().map(|(id, state)| (*id, state))
    }

    pub fn state(&self, id: StateID) -> &ParserState {
        &self.states[&id]
    }

    pub fn start_state(&self) -> &ParserState {
        &self.states[&StateID::START]
    }

    pub fn display(&self) -> impl fmt::Display + '_ {
        display_fn(|f| {
            for (i, (id, state)) in self.states().enumerate() {
                if i > 0 {
                    writeln!(f)?;
                }
                writeln!(f, "#### State {:02}", id)?;
                writeln!(f, "## items")?;
                write!(f, "{}", state.closure.display())?;
                writeln!(f, "## transitions")?;
                for (symbol, target) in state.transitions() {
                    writeln!(f, "- {} -> {:02}", symbol, target)?;
                }
            }
            Ok(())
        })
    }
}

struct Builder<'g> {
    grammar: &'g Grammar,
    first_sets: FirstSets,
    states: Map<StateID, ParserState>,
    // kernel identities -> the state registered for them
    registry: Map<Vec<ItemCore>, StateID>,
    queue: Queue<StateID>,
    next_id: u32,
}

impl Builder<'_> {
    /// Work-list traversal: states and edges are appended monotonically
    /// until the queue drains. Lookahead merges re-enqueue the merged state
    /// so their effect propagates to its successors.
    fn populate(&mut self) {
        while let Some(id) = self.queue.pop() {
            let symbols = self.states[&id].closure.transition_symbols();
            for symbol in symbols {
                let kernel = self.states[&id].closure.goto_kernel(&symbol);
                let next = ClosureSet::closure(self.grammar, &self.first_sets, kernel);

                let cores = next.kernel_cores();
                let target = match self.registry.get(&cores) {
                    Some(&existing) => {
                        let state = &mut self.states[&existing];
                        if state.closure.merge_kernel_lookaheads(&next) {
                            // re-close so the merged lookaheads reach the
                            // derived items, then revisit the successors
                            let kernel = state.closure.kernel_items();
                            state.closure =
                                ClosureSet::closure(self.grammar, &self.first_sets, kernel);
                            self.queue.push(existing);
                            tracing::trace!(state = %existing, "lookaheads merged, re-enqueued");
                        }
                        existing
                    }
                    None => {
                        let fresh = StateID::new(self.next_id);
                        self.next_id += 1;
                        self.states.insert(
                            fresh,
                            ParserState {
                                id: fresh,
                                closure: next,
                                transitions: Map::default(),
                            },
                        );
                        self.registry.insert(cores, fresh);
                        self.queue.push(fresh);
                        fresh
                    }
                };

                self.states[&id].transitions.insert(symbol, target);
            }
        }
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

    #[test]
    fn requires_an_augmented_grammar() {
        let config = test_config(&["a"], &[("S", &[&["a"]])], "S");
        let grammar = Grammar::new(&config).unwrap();
        assert!(matches!(
            LR1Automaton::generate(&grammar),
            Err(AutomatonError::MissingAugmentation)
        ));
    }

    #[test]
    fn nullable_example_automaton() {
        // S := A,  A := a A | epsilon
        let config = test_config(
            &["a"],
            &[("S", &[&["A"]]), ("A", &[&["a", "A"], &[]])],
            "S",
        );
        let grammar = Grammar::new_augmented(&config).unwrap();
        let automaton = LR1Automaton::generate(&grammar).unwrap();

        let start = automaton.start_state();
        assert_eq!(start.closure().items().len(), 4);

        // shifting `a` reaches a state that loops on itself
        let shifted = start.transition(&sym("a")).unwrap();
        assert_eq!(automaton.state(shifted).transition(&sym("a")), Some(shifted));

        // every discovered state is reachable through a transition chain
        // starting at state 0; here the full set is five states
        assert_eq!(automaton.states().count(), 5);
    }

    #[test]
    fn kernel_sharing_states_merge_lookaheads() {
        // the T-kernel after `num` is reached with different lookaheads
        // from the outer and the parenthesized context
        let config = test_config(
            &["plus", "lparen", "rparen", "num"],
            &[
                ("E", &[&["E", "plus", "T"], &["T"]]),
                ("T", &[&["num"], &["lparen", "E", "rparen"]]),
            ],
            "E",
        );
        let grammar = Grammar::new_augmented(&config).unwrap();
        let automaton = LR1Automaton::generate(&grammar).unwrap();

        let core = ItemCore::new(sym("T"), syms(&["num"]), 1).unwrap();
        let mut seen = 0;
        for (_, state) in automaton.states() {
            if let Some(lookaheads) = state.closure().kernel().get(&core) {
                seen += 1;
                // a single state carries the union of every reaching context
                assert!(lookaheads.contains(&Symbol::eof()));
                assert!(lookaheads.contains(&sym("plus")));
                assert!(lookaheads.contains(&sym("rparen")));
            }
        }
        assert_eq!(seen, 1, "kernel-equal states must be de-duplicated");
    }
}
