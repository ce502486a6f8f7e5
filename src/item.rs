//! LR(1) items and lookahead propagation.

use crate::{
    first_sets::FirstSets,
    grammar::{Grammar, Symbol},
    types::Set,
    util::display_fn,
};
use std::fmt;

#[derive(Debug, thiserror::Error)]
pub enum ItemError {
    #[error("dot position {dot} is out of range for a production of length {len}")]
    InvalidDotPosition { dot: usize, len: usize },

    #[error("the item's production is complete: cannot advance the dot")]
    CompleteItemAdvance,
}

/// The canonical identity of an LR(1) item: a production with a dot marking
/// parse progress. The lookahead set is deliberately not part of the
/// identity; a closure set merges lookaheads of items sharing a core.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ItemCore {
    lhs: Symbol,
    rhs: Vec<Symbol>,
    dot: usize,
}

impl ItemCore {
    pub fn new(lhs: Symbol, rhs: Vec<Symbol>, dot: usize) -> Result<Self, ItemError> {
        if dot > rhs.len() {
            return Err(ItemError::InvalidDotPosition {
                dot,
                len: rhs.len(),
            });
        }
        Ok(Self { lhs, rhs, dot })
    }

    pub fn lhs(&self) -> &Symbol {
        &self.lhs
    }

    /// The original, undotted rhs of the production.
    pub fn rhs(&self) -> &[Symbol] {
        &self.rhs
    }

    pub fn dot(&self) -> usize {
        self.dot
    }

    /// The symbol immediately after the dot, or `None` if the production is
    /// complete. An item whose next symbol is the epsilon marker is complete
    /// as well: the empty production has nothing left to consume, so epsilon
    /// never becomes a transition symbol.
    pub fn next_symbol(&self) -> Option<&Symbol> {
        match self.rhs.get(self.dot) {
            Some(symbol) if symbol.is_epsilon() => None,
            next => next,
        }
    }

    pub fn is_complete(&self) -> bool {
        self.next_symbol().is_none()
    }

    /// The rhs suffix strictly after the symbol following the dot; empty for
    /// a complete item or one with a single remaining symbol.
    pub fn context_after_next(&self) -> &[Symbol] {
        if self.is_complete() {
            &[]
        } else {
            &self.rhs[self.dot + 1..]
        }
    }

    /// A new core with the dot advanced over the next symbol.
    pub fn advanced(&self) -> Result<Self, ItemError> {
        if self.is_complete() {
            return Err(ItemError::CompleteItemAdvance);
        }
        Ok(Self {
            lhs: self.lhs.clone(),
            rhs: self.rhs.clone(),
            dot: self.dot + 1,
        })
    }

    // `"A := a . B b"`
    pub fn display(&self) -> impl fmt::Display + '_ {
        display_fn(|f| {
            write!(f, "{} :=", self.lhs)?;
            for (i, symbol) in self.rhs.iter().enumerate() {
                if i == self.dot {
                    f.write_str(" .")?;
                }
                write!(f, " {}", symbol)?;
            }
            if self.dot == self.rhs.len() {
                f.write_str(" .")?;
            }
            Ok(())
        })
    }
}

/// An [`ItemCore`] annotated with its lookahead set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LR1Item {
    core: ItemCore,
    lookaheads: Set<Symbol>,
}

impl LR1Item {
    pub fn new(
        lhs: Symbol,
        rhs: Vec<Symbol>,
        dot: usize,
        lookaheads: Set<Symbol>,
    ) -> Result<Self, ItemError> {
        Ok(Self {
            core: ItemCore::new(lhs, rhs, dot)?,
            lookaheads,
        })
    }

    pub fn from_parts(core: ItemCore, lookaheads: Set<Symbol>) -> Self {
        Self { core, lookaheads }
    }

    pub fn core(&self) -> &ItemCore {
        &self.core
    }

    pub fn lookaheads(&self) -> &Set<Symbol> {
        &self.lookaheads
    }

    pub fn into_parts(self) -> (ItemCore, Set<Symbol>) {
        (self.core, self.lookaheads)
    }

    pub fn next_symbol(&self) -> Option<&Symbol> {
        self.core.next_symbol()
    }

    pub fn is_complete(&self) -> bool {
        self.core.is_complete()
    }

    /// A new item with the dot advanced and the lookahead set carried over.
    pub fn advanced(&self) -> Result<Self, ItemError> {
        Ok(Self {
            core: self.core.advanced()?,
            lookaheads: self.lookaheads.clone(),
        })
    }
}

/// The lookahead set for items derived from a nonterminal found after the
/// dot: FIRST of the `context` that follows it in the parent production,
/// extended with the parent's `inherited` lookaheads only when the whole
/// context could derive epsilon.
pub fn lookahead(
    grammar: &Grammar,
    firsts: &FirstSets,
    context: &[Symbol],
    inherited: &Set<Symbol>,
) -> Set<Symbol> {
    match context.first() {
        None => inherited.clone(),
        Some(first) if first.is_epsilon() => inherited.clone(),
        Some(_) => {
            let mut lookaheads = Set::default();
            for symbol in context {
                if grammar.is_terminal(symbol) {
                    // a terminal is the only possible lookahead here
                    lookaheads.insert(symbol.clone());
                    return lookaheads;
                }
                lookaheads.extend(firsts.first(symbol).iter().cloned());
                if !grammar.derives_epsilon(symbol) {
                    return lookaheads;
                }
            }
            // the whole context can vanish; the parent's lookaheads apply
            lookaheads.extend(inherited.iter().cloned());
            lookaheads
        }
    }
}
