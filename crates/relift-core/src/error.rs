//! Core error types for relift-core.
//!
//! Uses `thiserror` for structured, matchable error variants covering
//! the anticipated failure modes in the IR data model.

use thiserror::Error;

use crate::id::{Addr, BbId, ClusterId, ProcId, StmtId};

/// Errors produced by the relift-core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    /// A complete basic block already starts at this address.
    #[error("duplicate basic block head at {0}")]
    DuplicateBbHead(Addr),

    /// A basic-block id was not found in the CFG.
    #[error("basic block not found: BbId({id})")]
    BbNotFound { id: BbId },

    /// No RTL boundary exists at the requested split address.
    #[error("no statement boundary at {0} to split at")]
    NoSplitPoint(Addr),

    /// A procedure id was not found in the program.
    #[error("procedure not found: ProcId({id})")]
    ProcNotFound { id: ProcId },

    /// A statement id was not found in any block of the procedure.
    #[error("statement not found: StmtId({id})")]
    StmtNotFound { id: StmtId },

    /// A cluster id was not found in the program.
    #[error("cluster not found: ClusterId({id})")]
    ClusterNotFound { id: ClusterId },

    /// The CFG failed a well-formedness check.
    #[error("control flow graph is not well formed: {reason}")]
    NotWellFormed { reason: String },
}
