//! Property-based test generators using proptest.
//!
//! Provides strategies for nested transaction plans that keep a single
//! chain alive from its first `begin` to its last `done`.

use proptest::prelude::*;
use sessiontx_core::{LockResult, Transaction};

/// Deepest nesting a generated plan reaches.
pub const MAX_PLAN_DEPTH: usize = 16;

/// One step of a nesting plan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    /// `begin_named(label)`.
    Begin(String),
    /// `done()`.
    Done,
}

/// A balanced sequence of steps for one chain.
///
/// The depth only returns to zero on the final step, so the whole plan is a
/// single chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NestingPlan {
    /// The steps, in order.
    pub steps: Vec<Step>,
}

impl NestingPlan {
    /// Deepest nesting reached by the plan.
    ///
    /// A `Done` at depth zero leaves the depth at zero.
    pub fn max_depth(&self) -> usize {
        let mut depth = 0usize;
        let mut max = 0usize;
        for step in &self.steps {
            match step {
                Step::Begin(_) => {
                    depth += 1;
                    max = max.max(depth);
                }
                Step::Done => depth = depth.saturating_sub(1),
            }
        }
        max
    }

    /// Label of the outermost begin.
    pub fn outer_label(&self) -> Option<&str> {
        match self.steps.first() {
            Some(Step::Begin(label)) => Some(label),
            _ => None,
        }
    }

    /// Runs the plan against a transaction handle.
    ///
    /// `after_step` is called with the depth after each step.
    pub fn run<F>(&self, tx: &Transaction, mut after_step: F) -> LockResult<()>
    where
        F: FnMut(&Step, i64),
    {
        for step in &self.steps {
            match step {
                Step::Begin(label) => {
                    tx.begin_named(label)?;
                }
                Step::Done => tx.done()?,
            }
            after_step(step, tx.depth());
        }
        Ok(())
    }
}

/// Strategy for generating transaction labels.
pub fn label_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[A-Z][a-zA-Z]{0,15}").expect("Invalid regex")
}

/// Strategy for generating nesting plans.
pub fn nesting_plan_strategy() -> impl Strategy<Value = NestingPlan> {
    (
        label_strategy(),
        prop::collection::vec((any::<bool>(), label_strategy()), 0..48),
    )
        .prop_map(|(outer, moves)| {
            let mut steps = vec![Step::Begin(outer)];
            let mut depth = 1usize;
            for (deeper, label) in moves {
                if (deeper && depth < MAX_PLAN_DEPTH) || depth == 1 {
                    steps.push(Step::Begin(label));
                    depth += 1;
                } else {
                    steps.push(Step::Done);
                    depth -= 1;
                }
            }
            steps.extend(std::iter::repeat(Step::Done).take(depth));
            NestingPlan { steps }
        })
}
