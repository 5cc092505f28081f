//! Batch planning: partition the document's page range into extraction
//! batches.
//!
//! ## Why tiered batch sizes?
//!
//! One extraction call carries fixed engine overhead (process warm-up,
//! document open, range parse), so very large documents want large batches
//! to amortise it. Small documents want small batches instead: finer
//! progress granularity and a shorter wait for the first result.

use crate::error::Pdf2TablesError;
use serde::{Deserialize, Serialize};

/// One contiguous page range, processed by a single extraction call.
///
/// Pages are 1-based and inclusive at both ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Batch {
    pub index: usize,
    pub start_page: usize,
    pub end_page: usize,
}

impl Batch {
    pub fn page_count(&self) -> usize {
        self.end_page - self.start_page + 1
    }
}

/// The planner's output: the chosen batch size and the ordered batch list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchPlan {
    pub batch_size: usize,
    pub batches: Vec<Batch>,
}

/// Pages per batch by document size tier.
pub fn batch_size_for(total_pages: usize) -> usize {
    if total_pages > 10_000 {
        500
    } else if total_pages > 1_000 {
        100
    } else if total_pages > 100 {
        50
    } else {
        20
    }
}

/// Partition `[1, total_pages]` into contiguous, non-overlapping batches.
///
/// # Errors
/// `InvalidInput` when `total_pages` is zero.
pub fn plan_batches(
    total_pages: usize,
    batch_size_override: Option<usize>,
) -> Result<BatchPlan, Pdf2TablesError> {
    if total_pages == 0 {
        return Err(Pdf2TablesError::InvalidInput(
            "document has no pages".into(),
        ));
    }
    let batch_size = match batch_size_override {
        Some(0) => {
            return Err(Pdf2TablesError::InvalidInput(
                "batch size must be at least 1".into(),
            ))
        }
        Some(n) => n,
        None => batch_size_for(total_pages),
    };

    let mut batches = Vec::with_capacity(total_pages.div_ceil(batch_size));
    let mut start_page = 1;
    while start_page <= total_pages {
        let end_page = (start_page + batch_size - 1).min(total_pages);
        batches.push(Batch {
            index: batches.len(),
            start_page,
            end_page,
        });
        start_page = end_page + 1;
    }

    Ok(BatchPlan {
        batch_size,
        batches,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    /// No gaps, no overlaps, sorted by index, every batch within size.
    fn assert_exact_partition(plan: &BatchPlan, total_pages: usize) {
        assert!(!plan.batches.is_empty());
        let mut expected_start = 1;
        for (i, batch) in plan.batches.iter().enumerate() {
            assert_eq!(batch.index, i);
            assert_eq!(batch.start_page, expected_start);
            assert!(batch.end_page >= batch.start_page);
            assert!(batch.page_count() <= plan.batch_size);
            expected_start = batch.end_page + 1;
        }
        assert_eq!(expected_start, total_pages + 1);
    }

    #[test]
    fn partitions_exactly_across_sizes() {
        for total_pages in [1, 19, 20, 21, 99, 100, 101, 999, 1_000, 1_001, 10_001] {
            let plan = plan_batches(total_pages, None).unwrap();
            assert_exact_partition(&plan, total_pages);
        }
    }

    #[test]
    fn partitions_exactly_with_override() {
        for total_pages in 1..=120 {
            let plan = plan_batches(total_pages, Some(7)).unwrap();
            assert_exact_partition(&plan, total_pages);
        }
    }

    #[test]
    fn tier_boundaries() {
        assert_eq!(batch_size_for(1), 20);
        assert_eq!(batch_size_for(100), 20);
        assert_eq!(batch_size_for(101), 50);
        assert_eq!(batch_size_for(1_000), 50);
        assert_eq!(batch_size_for(1_001), 100);
        assert_eq!(batch_size_for(10_000), 100);
        assert_eq!(batch_size_for(10_001), 500);
    }

    #[test]
    fn twenty_five_pages_splits_into_two_batches() {
        let plan = plan_batches(25, None).unwrap();
        assert_eq!(plan.batch_size, 20);
        assert_eq!(plan.batches.len(), 2);
        assert_eq!((plan.batches[0].start_page, plan.batches[0].end_page), (1, 20));
        assert_eq!((plan.batches[1].start_page, plan.batches[1].end_page), (21, 25));
    }

    #[test]
    fn zero_pages_is_invalid() {
        assert!(matches!(
            plan_batches(0, None),
            Err(Pdf2TablesError::InvalidInput(_))
        ));
        assert!(matches!(
            plan_batches(10, Some(0)),
            Err(Pdf2TablesError::InvalidInput(_))
        ));
    }
}
