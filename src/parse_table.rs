//! LR(1) action and goto tables.

use crate::{
    automaton::{AutomatonError, LR1Automaton, StateID},
    grammar::{Grammar, GrammarError, RuleID, Symbol},
    types::Map,
    util::display_fn,
};
use std::fmt;

/// What the driver does on seeing a terminal in a given state. A cell left
/// unset reads back as [`Action::Error`].
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Action {
    Shift(StateID),
    Reduce(RuleID),
    Accept,
    Error,
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Shift(next) => write!(f, "shift({})", next),
            Self::Reduce(rule) => write!(f, "reduce({})", rule),
            Self::Accept => f.write_str("accept"),
            Self::Error => f.write_str("error"),
        }
    }
}

/// Two actions claiming the same `(state, terminal)` cell. The grammar is
/// not LR(1); conflicts are reported, never resolved by precedence.
#[derive(Debug)]
pub enum Conflict {
    ShiftReduce {
        state: StateID,
        symbol: Symbol,
        shift: StateID,
        reduce: RuleID,
    },
    ReduceReduce {
        state: StateID,
        symbol: Symbol,
        rules: (RuleID, RuleID),
    },
}

impl fmt::Display for Conflict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ShiftReduce {
                state,
                symbol,
                shift,
                reduce,
            } => write!(
                f,
                "shift/reduce conflict in state {} on `{}`: shift({}) vs reduce({})",
                state, symbol, shift, reduce
            ),
            Self::ReduceReduce {
                state,
                symbol,
                rules,
            } => write!(
                f,
                "reduce/reduce conflict in state {} on `{}`: reduce({}) vs reduce({})",
                state, symbol, rules.0, rules.1
            ),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum TableError {
    #[error(transparent)]
    Automaton(#[from] AutomatonError),

    #[error(transparent)]
    Grammar(#[from] GrammarError),

    #[error("{0}")]
    Conflict(Conflict),
}

/// The flattened automaton: an action row per state over terminals, and a
/// goto row per state over nonterminals.
#[derive(Debug)]
pub struct ParsingTable {
    actions: Map<StateID, Map<Symbol, Action>>,
    gotos: Map<StateID, Map<Symbol, StateID>>,
}

impl ParsingTable {
    /// Build the table in one step from an augmented grammar.
    pub fn generate(grammar: &Grammar) -> Result<Self, TableError> {
        let automaton = LR1Automaton::generate(grammar)?;
        Self::from_automaton(&automaton)
    }

    pub fn from_automaton(automaton: &LR1Automaton<'_>) -> Result<Self, TableError> {
        let grammar = automaton.grammar();
        let accept_rule = grammar
            .productions_of(&Symbol::augmented_start())
            .first()
            .map(|rule| rule.id())
            .ok_or(AutomatonError::MissingAugmentation)?;

        let mut actions: Map<StateID, Map<Symbol, Action>> = Map::default();
        let mut gotos: Map<StateID, Map<Symbol, StateID>> = Map::default();

        for (id, state) in automaton.states() {
            let action_row = actions.entry(id).or_default();
            let goto_row = gotos.entry(id).or_default();

            for (symbol, target) in state.transitions() {
                if grammar.is_terminal(symbol) {
                    action_row.insert(symbol.clone(), Action::Shift(target));
                } else {
                    goto_row.insert(symbol.clone(), target);
                }
            }

            for (core, lookaheads) in state.closure().completed() {
                if core.lhs() == &Symbol::augmented_start() {
                    if lookaheads.contains(&Symbol::eof()) {
                        match action_row.get(&Symbol::eof()) {
                            Some(Action::Reduce(other)) => {
                                return Err(TableError::Conflict(Conflict::ReduceReduce {
                                    state: id,
                                    symbol: Symbol::eof(),
                                    rules: (accept_rule, *other),
                                }));
                            }
                            _ => {
                                action_row.insert(Symbol::eof(), Action::Accept);
                            }
                        }
                    }
                    continue;
                }

                let rule = grammar.production_id(core.lhs(), core.rhs())?;
                for symbol in lookaheads {
                    match action_row.get(symbol) {
                        Some(Action::Shift(shift)) => {
                            return Err(TableError::Conflict(Conflict::ShiftReduce {
                                state: id,
                                symbol: symbol.clone(),
                                shift: *shift,
                                reduce: rule,
                            }));
                        }
                        Some(Action::Reduce(other)) if *other != rule => {
                            return Err(TableError::Conflict(Conflict::ReduceReduce {
                                state: id,
                                symbol: symbol.clone(),
                                rules: (*other, rule),
                            }));
                        }
                        Some(Action::Accept) => {
                            return Err(TableError::Conflict(Conflict::ReduceReduce {
                                state: id,
                                symbol: symbol.clone(),
                                rules: (accept_rule, rule),
                            }));
                        }
                        _ => {
                            action_row.insert(symbol.clone(), Action::Reduce(rule));
                        }
                    }
                }
            }
        }

        tracing::debug!(states = actions.len(), "parsing table generated");
        Ok(Self { actions, gotos })
    }

    pub fn start_state(&self) -> StateID {
        StateID::START
    }

    /// The action for `terminal` in `state`. Missing cells are errors.
    pub fn action(&self, state: StateID, terminal: &Symbol) -> Action {
        self.actions
            .get(&state)
            .and_then(|row| row.get(terminal))
            .copied()
            .unwrap_or(Action::Error)
    }

    /// The goto target after reducing to `nonterminal` in `state`.
    pub fn goto(&self, state: StateID, nonterminal: &Symbol) -> Option<StateID> {
        self.gotos
            .get(&state)
            .and_then(|row| row.get(nonterminal))
            .copied()
    }

    pub fn display(&self) -> impl fmt::Display + '_ {
        display_fn(|f| {
            for (state, row) in &self.actions {
                writeln!(f, "#### State {:02}", state)?;
                for (symbol, action) in row {
                    writeln!(f, "- on {}: {}", symbol, action)?;
                }
                if let Some(row) = self.gotos.get(state).filter(|row| !row.is_empty()) {
                    for (symbol, target) in row {
                        writeln!(f, "- goto {}: {:02}", symbol, target)?;
                    }
                }
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

    fn arith_table() -> (Grammar, ParsingTable) {
        let config = test_config(
            &["plus", "lparen", "rparen", "num"],
            &[
                ("E", &[&["E", "plus", "T"], &["T"]]),
                ("T", &[&["num"], &["lparen", "E", "rparen"]]),
            ],
            "E",
        );
        let grammar = Grammar::new_augmented(&config).unwrap();
        let table = ParsingTable::generate(&grammar).unwrap();
        (grammar, table)
    }

    #[test]
    fn arithmetic_grammar_builds_without_conflicts() {
        let (grammar, table) = arith_table();
        let start = table.start_state();

        // state 0 shifts the tokens that can begin an expression
        assert!(matches!(table.action(start, &sym("num")), Action::Shift(_)));
        assert!(matches!(
            table.action(start, &sym("lparen")),
            Action::Shift(_)
        ));
        assert_eq!(table.action(start, &sym("plus")), Action::Error);

        // reducing to E from state 0 lands in the accepting state
        let after_e = table.goto(start, &sym("E")).unwrap();
        assert_eq!(table.action(after_e, &Symbol::eof()), Action::Accept);
        assert!(matches!(
            table.action(after_e, &sym("plus")),
            Action::Shift(_)
        ));

        // shifting `num` yields a state that only reduces T := num
        let after_num = match table.action(start, &sym("num")) {
            Action::Shift(next) => next,
            action => panic!("expected a shift, got {}", action),
        };
        let t_num = grammar.production_id(&sym("T"), &[sym("num")]).unwrap();
        for terminal in [sym("plus"), sym("rparen"), Symbol::eof()] {
            assert_eq!(table.action(after_num, &terminal), Action::Reduce(t_num));
        }
    }

    #[test]
    fn nullable_grammar_reduces_epsilon_on_eof() {
        // S := A,  A := a A | epsilon
        let config = test_config(
            &["a"],
            &[("S", &[&["A"]]), ("A", &[&["a", "A"], &[]])],
            "S",
        );
        let grammar = Grammar::new_augmented(&config).unwrap();
        let table = ParsingTable::generate(&grammar).unwrap();

        let epsilon_rule = grammar
            .production_id(&sym("A"), &[Symbol::epsilon()])
            .unwrap();
        assert_eq!(
            table.action(table.start_state(), &Symbol::eof()),
            Action::Reduce(epsilon_rule)
        );
        assert!(matches!(
            table.action(table.start_state(), &sym("a")),
            Action::Shift(_)
        ));
    }

    #[test]
    fn ambiguous_grammar_reports_shift_reduce() {
        let config = test_config(
            &["plus", "id"],
            &[("E", &[&["E", "plus", "E"], &["id"]])],
            "E",
        );
        let grammar = Grammar::new_augmented(&config).unwrap();

        match ParsingTable::generate(&grammar) {
            Err(TableError::Conflict(Conflict::ShiftReduce { symbol, .. })) => {
                assert_eq!(symbol, sym("plus"));
            }
            other => panic!("expected a shift/reduce conflict, got {:?}", other.err()),
        }
    }

    #[test]
    fn indistinguishable_reductions_report_reduce_reduce() {
        let config = test_config(
            &["a"],
            &[("S", &[&["A"], &["B"]]), ("A", &[&["a"]]), ("B", &[&["a"]])],
            "S",
        );
        let grammar = Grammar::new_augmented(&config).unwrap();

        match ParsingTable::generate(&grammar) {
            Err(TableError::Conflict(Conflict::ReduceReduce { symbol, rules, .. })) => {
                assert_eq!(symbol, Symbol::eof());
                assert_ne!(rules.0, rules.1);
            }
            other => panic!("expected a reduce/reduce conflict, got {:?}", other.err()),
        }
    }

    #[test]
    fn absent_cells_read_as_error() {
        let (_, table) = arith_table();
        assert_eq!(
            table.action(table.start_state(), &sym("rparen")),
            Action::Error
        );
        assert_eq!(table.goto(table.start_state(), &sym("nope")), None);
    }
}
