//! Errors raised by the dataflow passes.

use thiserror::Error;

use relift_core::{CoreError, StmtId};

#[derive(Debug, Error)]
pub enum FlowError {
    #[error(transparent)]
    Core(#[from] CoreError),

    /// A phi node survived renaming with no arguments at all.
    #[error("phi assignment {stmt} has zero definitions after rename")]
    PhiWithoutDefs { stmt: StmtId },
}
