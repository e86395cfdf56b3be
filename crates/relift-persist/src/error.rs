//! Errors raised while writing or reloading the on-disk program.

use thiserror::Error;

use relift_core::CoreError;

#[derive(Debug, Error)]
pub enum PersistError {
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Core(#[from] CoreError),

    /// The parser library rejected the document.
    #[error("XML parse error in {file} at byte {pos}: {msg}")]
    Xml { file: String, pos: u64, msg: String },

    /// A reference attribute named an id no element declared.
    #[error("unknown reference id {0}")]
    UnknownId(u32),

    /// A reference attribute resolved to the wrong kind of entity.
    #[error("reference id {id} does not name a {expected}")]
    WrongIdKind { id: u32, expected: &'static str },

    /// An `op` attribute carried a name outside the operator alphabet.
    #[error("unknown operator name '{0}'")]
    UnknownOperator(String),

    #[error("missing attribute '{attr}' on <{tag}>")]
    MissingAttr { tag: String, attr: String },

    #[error("malformed attribute '{attr}' value '{value}'")]
    MalformedAttr { attr: String, value: String },

    /// A `Ref` in the program being saved names a statement that no
    /// longer exists.
    #[error("dangling statement reference {stmt} while saving")]
    DanglingStmtRef { stmt: relift_core::StmtId },

    /// The root file held no `<prog>` element.
    #[error("no <prog> element found in {0}")]
    NoProg(String),
}
