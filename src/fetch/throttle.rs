//! Throttle classification.
//!
//! The store refuses a query it judges too expensive with one specific
//! fault signature. Only that signature engages the range fallback; every
//! other failure, including generic server errors, propagates unchanged.

use crate::core::{FetchError, StoreFault};

/// Fault code the store uses for a cost-based refusal.
pub const QUERY_COST_CODE: &str = "ListDataTooLarge";

/// Exception type the store declares alongside [`QUERY_COST_CODE`].
pub const QUERY_COST_EXCEPTION: &str = "QueryCostExceededException";

/// Whether the error is the store's cost-based refusal. Both the code and
/// the declared exception type must match.
pub fn is_throttled(error: &FetchError) -> bool {
    match error.store_fault() {
        Some(fault) => fault.code == QUERY_COST_CODE && fault.exception == QUERY_COST_EXCEPTION,
        None => false,
    }
}

/// The fault a store raises when a query exceeds its cost threshold.
pub fn query_cost_fault(list: &str) -> StoreFault {
    StoreFault::new(
        QUERY_COST_CODE,
        QUERY_COST_EXCEPTION,
        &format!(
            "the query against list '{}' exceeds the evaluation threshold",
            list
        ),
    )
}
