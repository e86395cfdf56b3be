pub mod dominators;
pub mod error;
pub mod propagate;
pub mod ssa;

pub use dominators::{compute_dominators, DomTree};
pub use error::FlowError;
pub use propagate::{from_ssa_form, propagate_statements, remove_unused_statements};
pub use ssa::{place_phi, rename_variables};
