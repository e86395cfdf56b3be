pub mod cfg;
pub mod error;
pub mod exp;
pub mod id;
pub mod operator;
pub mod proc;
pub mod prog;
pub mod rtl;
pub mod signature;
pub mod stmt;
pub mod symtab;
pub mod ty;
pub mod util;

// Re-export commonly used types
pub use cfg::{
    BasicBlock, BbType, Cfg, CondType, HllInfo, LoopType, SbbInfo, SbbType, StructType, TravKind,
    UnstructType,
};
pub use error::CoreError;
pub use exp::{ConstKind, Exp, ExpVisitor};
pub use id::{Addr, BbId, ClusterId, ProcId, RtlId, StmtId};
pub use operator::{Operator, OPER_NAMES, OP_COUNT};
pub use proc::{LibProc, Proc, ProcStatus, UserProc};
pub use prog::{Cluster, FrontEnd, Global, Program};
pub use rtl::Rtl;
pub use signature::{Convention, Parameter, Platform, Return, Signature};
pub use stmt::{
    Assign, BoolAssign, BranchKind, BranchStmt, CallStmt, CaseStmt, GotoStmt, LocationSet,
    PhiAssign, PhiDef, ReturnStmt, Statement, StmtKind, SwitchInfo,
};
pub use symtab::SymTab;
pub use ty::{Signedness, Type, ARRAY_LEN_UNKNOWN};
