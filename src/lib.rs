//! LR(1) parser-generator core: grammar model, FIRST/FOLLOW analysis, and
//! canonical LR(1) table construction with conflict reporting.

pub mod automaton;
pub mod closure;
pub mod first_sets;
pub mod follow_sets;
pub mod grammar;
pub mod item;
pub mod parse_table;
pub mod types;
pub mod util;
