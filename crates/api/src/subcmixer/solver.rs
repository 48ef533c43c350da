//! Size assignment for category constraints.
//!
//! The real balancing problem is a linear program; the solver sits
//! behind a trait so an LP implementation can be swapped in. The
//! shipped [`ProportionalSolver`] scales the requested total down to
//! the largest feasible size and assigns category sizes proportionally.

/// One category as seen by the solver.
#[derive(Debug, Clone, Copy)]
pub struct CategorySize {
    /// Required share of the mixed sub-corpus (normalized, sums to 1).
    pub ratio: f64,
    /// Positions available for this category in the corpus.
    pub available: i64,
}

pub trait MixSolver: Send + Sync {
    /// Assign a size to every category. The result has the same length
    /// and order as `categories`; an infeasible category gets 0.
    fn solve(&self, categories: &[CategorySize], requested_total: i64) -> Vec<i64>;
}

/// Proportional fit: the requested total is reduced until every
/// category fits its available data, then split by ratio.
#[derive(Debug, Default)]
pub struct ProportionalSolver;

impl MixSolver for ProportionalSolver {
    fn solve(&self, categories: &[CategorySize], requested_total: i64) -> Vec<i64> {
        let mut feasible_total = requested_total.max(0) as f64;
        for category in categories {
            if category.ratio > 0.0 {
                feasible_total = feasible_total.min(category.available as f64 / category.ratio);
            }
        }
        categories
            .iter()
            .map(|category| (category.ratio * feasible_total).floor() as i64)
            .collect()
    }
}
