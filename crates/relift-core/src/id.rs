//! Stable ID newtypes for IR entities.
//!
//! All IDs are distinct newtype wrappers over `u32`, providing type safety
//! so that a `ProcId` cannot be accidentally used where a `BbId` is expected.
//! Entities that cross-reference each other (statements and the `RefExp`s
//! naming them, basic blocks and their edges, procedures and their caller
//! sets) do so through these indices rather than pointers; the owning arena
//! resolves them in O(1).

use std::fmt;

use serde::{Deserialize, Serialize};

/// A native machine address in the binary being decompiled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Addr(pub u32);

impl Addr {
    /// The "no address" sentinel used for synthetic entities.
    pub const INVALID: Addr = Addr(u32::MAX);

    pub fn is_valid(self) -> bool {
        self != Addr::INVALID
    }
}

impl fmt::Display for Addr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

/// Procedure identity: an index into `Program::procs`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ProcId(pub u32);

/// Basic-block identity: an index into the owning `Cfg`'s block arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct BbId(pub u32);

/// Statement identity, unique within a `Program`.
///
/// `RefExp::def` and procedure caller sets name statements through this id;
/// a statement keeps its id for as long as it exists, so the references stay
/// valid across expression rewrites.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct StmtId(pub u32);

impl StmtId {
    /// Id of a statement that has not been registered with a program yet.
    pub const UNASSIGNED: StmtId = StmtId(0);
}

/// RTL identity, unique within a `Program`.
///
/// Only flag-function RTLs registered with the program carry a meaningful
/// id; RTLs inside basic blocks are addressed positionally.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RtlId(pub u32);

/// Cluster identity: an index into `Program::clusters`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ClusterId(pub u32);

// Display implementations -- just print the inner value.

impl fmt::Display for ProcId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for BbId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for StmtId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for RtlId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for ClusterId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn addr_display_is_hex() {
        assert_eq!(format!("{}", Addr(0x1000)), "0x1000");
    }

    #[test]
    fn addr_invalid_sentinel() {
        assert!(!Addr::INVALID.is_valid());
        assert!(Addr(0).is_valid());
    }

    #[test]
    fn id_display() {
        assert_eq!(format!("{}", ProcId(7)), "7");
        assert_eq!(format!("{}", BbId(3)), "3");
        assert_eq!(format!("{}", StmtId(42)), "42");
        assert_eq!(format!("{}", ClusterId(0)), "0");
    }

    #[test]
    fn serde_roundtrip() {
        let id = StmtId(42);
        let json = serde_json::to_string(&id).unwrap();
        let back: StmtId = serde_json::from_str(&json).unwrap();
        assert_eq!(id, back);

        let a = Addr(0xdeadbeef);
        let json = serde_json::to_string(&a).unwrap();
        let back: Addr = serde_json::from_str(&json).unwrap();
        assert_eq!(a, back);
    }
}
