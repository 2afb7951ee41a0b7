//! Batch driver running the vector-box phase over many compilation units.
//!
//! Every [`Compile`] session is owned by exactly one worker while the phase runs on
//! it, so units are processed in parallel with rayon while each unit stays
//! single-threaded.

use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc,
};

use rayon::prelude::*;

use crate::{
    compiler::{Compile, ReboxingInliner},
    vector::{PhaseVector, VectorStats},
    Error,
};

/// Outcome of one batch run.
#[derive(Debug, Default)]
pub struct BatchReport {
    /// Per-unit results, in input order.
    pub results: Vec<Result<VectorStats, Error>>,
    /// Sum of the statistics of all units that finished without error.
    pub totals: VectorStats,
    /// Units that ran out of resources.
    pub bailouts: usize,
    /// Units rejected with an error.
    pub errors: usize,
}

impl BatchReport {
    /// Returns `true` if every unit finished without error or bailout.
    #[must_use]
    pub fn all_succeeded(&self) -> bool {
        self.errors == 0 && self.bailouts == 0
    }
}

/// Runs [`PhaseVector`] over independent compilation units in parallel.
#[derive(Debug, Clone, Default)]
pub struct BatchScheduler {
    phase: PhaseVector,
}

impl BatchScheduler {
    /// Creates a scheduler using the default phase.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a scheduler whose phase inlines reboxing calls with `inliner`.
    #[must_use]
    pub fn with_inliner(inliner: Arc<dyn ReboxingInliner>) -> Self {
        Self {
            phase: PhaseVector::with_inliner(inliner),
        }
    }

    /// Runs the phase on every unit.
    ///
    /// A unit that fails does not stop the others; its error is kept in the report
    /// at the unit's position.
    pub fn run(&self, units: &mut [Compile]) -> BatchReport {
        let bailouts = AtomicUsize::new(0);
        let errors = AtomicUsize::new(0);

        let results: Vec<_> = units
            .par_iter_mut()
            .map(|unit| {
                let result = self.phase.optimize_vector_boxes(unit);
                match &result {
                    Ok(stats) if stats.bailed_out => {
                        bailouts.fetch_add(1, Ordering::Relaxed);
                    }
                    Ok(_) => {}
                    Err(_) => {
                        errors.fetch_add(1, Ordering::Relaxed);
                    }
                }
                result
            })
            .collect();

        let totals = results
            .iter()
            .flatten()
            .fold(VectorStats::default(), |acc, stats| acc.merge(stats));

        BatchReport {
            results,
            totals,
            bailouts: bailouts.load(Ordering::Relaxed),
            errors: errors.load(Ordering::Relaxed),
        }
    }
}
