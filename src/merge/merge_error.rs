//! Fatal errors of a merge.
//!
//! Only structurally invalid input aborts a merge; all other anomalies are
//! recorded in the [MergeReport](crate::merge::MergeReport) instead.

use crate::merge::report::TreeSide;
use crate::model::TreeError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum MergeError {
    #[error("{side} tree is invalid: {source}")]
    InvalidTree {
        side: TreeSide,
        #[source]
        source: TreeError,
    },
    #[error("merged tree failed validation: {0}")]
    InvalidOutput(#[source] TreeError),
    #[error("could not start worker pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
}

impl MergeError {
    pub(crate) fn invalid(side: TreeSide) -> impl FnOnce(TreeError) -> MergeError {
        move |source| MergeError::InvalidTree { side, source }
    }
}
