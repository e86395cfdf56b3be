//! The operator alphabet for expression nodes.
//!
//! Every non-leaf expression carries an [`Operator`] as its head tag. The
//! enumeration is dense and ordered; [`OPER_NAMES`] is a parallel table
//! mapping each operator to its printable name, and that name -- never the
//! integer -- is what crosses the serialization boundary.
//!
//! The enum and the name table are maintained by hand, in lock-step. The
//! `operator_names_stay_in_lockstep` test is the guard: it checks the table
//! length against [`OP_COUNT`] and spot-checks a fixed set of operators, so
//! that inserting or reordering entries in one place but not the other
//! surfaces immediately, naming the first checkpoint at or before the skew.

use serde::{Deserialize, Serialize};

/// Head tag of an expression node.
///
/// Grouped by category; the numeric order is fixed and must match
/// [`OPER_NAMES`] entry for entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[repr(u16)]
pub enum Operator {
    // -- Integer arithmetic --
    Plus,
    Minus,
    Mult,
    Div,
    Mod,
    Mults,
    Divs,
    Mods,
    Neg,

    // -- Float arithmetic (single, double, quad) --
    FPlus,
    FMinus,
    FMult,
    FDiv,
    FPlusD,
    FMinusD,
    FMultD,
    FDivD,
    FPlusQ,
    FMinusQ,
    FMultQ,
    FDivQ,
    FMultSd,
    FMultDq,
    FNeg,
    FAbs,

    // -- Float kernels --
    Sin,
    Cos,
    Tan,
    ArcTan,
    Log2,
    Log10,
    LogE,
    Pow,
    Sqrt,
    SqrtS,
    SqrtD,
    SqrtQ,

    // -- Float conversion and stack --
    FToI,
    IToF,
    FRound,
    FTrunc,
    FSize,
    FPush,
    FPop,

    // -- Comparison --
    Equal,
    NotEqual,
    Less,
    Gtr,
    LessEq,
    GtrEq,
    LessUns,
    GtrUns,
    LessEqUns,
    GtrEqUns,

    // -- Logical and bitwise --
    And,
    Or,
    LNot,
    Not,
    BitAnd,
    BitOr,
    BitXor,

    // -- Shifts and rotates --
    ShiftL,
    ShiftR,
    ShiftRA,
    RotateL,
    RotateR,
    RotateLC,
    RotateRC,

    // -- Storage kinds --
    MemOf,
    RegOf,
    AddrOf,
    Idx,
    Temp,
    Param,
    Local,
    Global,
    PostVar,
    InitValueOf,

    // -- Size and extension --
    Size,
    SgnEx,
    ZFill,
    TruncU,
    TruncS,
    Cast,

    // -- Constant kinds --
    IntConst,
    FltConst,
    StrConst,
    FuncConst,

    // -- Composition --
    List,
    Nil,
    Tern,
    At,
    MemberAccess,
    ArrayIndex,

    // -- SSA and analysis --
    Subscript,
    Phi,
    TypedExp,
    TypeVal,
    FlagCall,
    FlagDef,
    DefineAll,

    // -- Flag terminals --
    Flags,
    FFlags,
    CF,
    ZF,
    NF,
    OF,
    DF,

    // -- Machine terminals --
    Pc,
    Afp,
    Agp,
    True,
    False,
    Anull,
    TypeOf,
    KindOf,

    // -- Machine-feature and semantics glue --
    MachFtr,
    Execute,
    TargetInst,
    ExpTable,
    NameTable,
    OpTable,

    // -- Wildcards (pattern matching only; never in a finished IR) --
    Wild,
    WildIntConst,
    WildStrConst,
    WildMemOf,
    WildRegOf,
    WildAddrOf,
}

/// Number of operators in the alphabet.
pub const OP_COUNT: usize = Operator::WildAddrOf as usize + 1;

/// Printable names, parallel to [`Operator`].
///
/// Maintained by hand. Keep in the same order as the enum; the lockstep
/// test will name the first checkpoint at or before any skew.
pub static OPER_NAMES: &[&str] = &[
    "Plus",
    "Minus",
    "Mult",
    "Div",
    "Mod",
    "Mults",
    "Divs",
    "Mods",
    "Neg",
    "FPlus",
    "FMinus",
    "FMult",
    "FDiv",
    "FPlusD",
    "FMinusD",
    "FMultD",
    "FDivD",
    "FPlusQ",
    "FMinusQ",
    "FMultQ",
    "FDivQ",
    "FMultSd",
    "FMultDq",
    "FNeg",
    "FAbs",
    "Sin",
    "Cos",
    "Tan",
    "ArcTan",
    "Log2",
    "Log10",
    "LogE",
    "Pow",
    "Sqrt",
    "SqrtS",
    "SqrtD",
    "SqrtQ",
    "FToI",
    "IToF",
    "FRound",
    "FTrunc",
    "FSize",
    "FPush",
    "FPop",
    "Equal",
    "NotEqual",
    "Less",
    "Gtr",
    "LessEq",
    "GtrEq",
    "LessUns",
    "GtrUns",
    "LessEqUns",
    "GtrEqUns",
    "And",
    "Or",
    "LNot",
    "Not",
    "BitAnd",
    "BitOr",
    "BitXor",
    "ShiftL",
    "ShiftR",
    "ShiftRA",
    "RotateL",
    "RotateR",
    "RotateLC",
    "RotateRC",
    "MemOf",
    "RegOf",
    "AddrOf",
    "Idx",
    "Temp",
    "Param",
    "Local",
    "Global",
    "PostVar",
    "InitValueOf",
    "Size",
    "SgnEx",
    "ZFill",
    "TruncU",
    "TruncS",
    "Cast",
    "IntConst",
    "FltConst",
    "StrConst",
    "FuncConst",
    "List",
    "Nil",
    "Tern",
    "At",
    "MemberAccess",
    "ArrayIndex",
    "Subscript",
    "Phi",
    "TypedExp",
    "TypeVal",
    "FlagCall",
    "FlagDef",
    "DefineAll",
    "Flags",
    "FFlags",
    "CF",
    "ZF",
    "NF",
    "OF",
    "DF",
    "Pc",
    "Afp",
    "Agp",
    "True",
    "False",
    "Anull",
    "TypeOf",
    "KindOf",
    "MachFtr",
    "Execute",
    "TargetInst",
    "ExpTable",
    "NameTable",
    "OpTable",
    "Wild",
    "WildIntConst",
    "WildStrConst",
    "WildMemOf",
    "WildRegOf",
    "WildAddrOf",
];

impl Operator {
    /// The printable name of this operator, as used on the wire.
    pub fn name(self) -> &'static str {
        OPER_NAMES[self as usize]
    }

    /// Looks an operator up by its printable name.
    ///
    /// A linear scan; the domain is small and this only runs during
    /// deserialization. Returns `None` for unrecognized names.
    pub fn from_name(name: &str) -> Option<Operator> {
        OPER_NAMES
            .iter()
            .position(|&n| n == name)
            .map(|i| Operator::from_index(i).expect("name table index in range"))
    }

    /// Converts a raw index back into an operator.
    ///
    /// The enum is dense over `0..OP_COUNT`, so any in-range index is a
    /// valid discriminant.
    pub fn from_index(i: usize) -> Option<Operator> {
        if i < OP_COUNT {
            // Dense repr(u16) enum starting at 0.
            Some(unsafe { std::mem::transmute::<u16, Operator>(i as u16) })
        } else {
            None
        }
    }

    /// Returns `true` for the comparison operators.
    pub fn is_comparison(self) -> bool {
        matches!(
            self,
            Operator::Equal
                | Operator::NotEqual
                | Operator::Less
                | Operator::Gtr
                | Operator::LessEq
                | Operator::GtrEq
                | Operator::LessUns
                | Operator::GtrUns
                | Operator::LessEqUns
                | Operator::GtrEqUns
        )
    }

    /// Returns `true` for the constant-kind operators.
    pub fn is_const_kind(self) -> bool {
        matches!(
            self,
            Operator::IntConst | Operator::FltConst | Operator::StrConst | Operator::FuncConst
        )
    }

    /// Returns `true` for the pattern wildcards.
    pub fn is_wildcard(self) -> bool {
        matches!(
            self,
            Operator::Wild
                | Operator::WildIntConst
                | Operator::WildStrConst
                | Operator::WildMemOf
                | Operator::WildRegOf
                | Operator::WildAddrOf
        )
    }

    /// Returns `true` for the condition-code flag terminals.
    pub fn is_flag_terminal(self) -> bool {
        matches!(
            self,
            Operator::Flags
                | Operator::FFlags
                | Operator::CF
                | Operator::ZF
                | Operator::NF
                | Operator::OF
                | Operator::DF
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Pairs an operator's numeric index with its stringified name.
    macro_rules! checkpoint {
        ($op:ident) => {
            (Operator::$op as usize, stringify!($op))
        };
    }

    /// Fixed spot checks spread across the alphabet. Swapping, inserting,
    /// or deleting entries in one table but not the other trips the first
    /// checkpoint at or after the skew.
    static CHECKLIST: &[(usize, &str)] = &[
        checkpoint!(Plus),
        checkpoint!(FPlusD),
        checkpoint!(SqrtD),
        checkpoint!(GtrEqUns),
        checkpoint!(RotateRC),
        checkpoint!(MemOf),
        checkpoint!(Cast),
        checkpoint!(FuncConst),
        checkpoint!(List),
        checkpoint!(Subscript),
        checkpoint!(FlagDef),
        checkpoint!(DF),
        checkpoint!(Anull),
        checkpoint!(TargetInst),
        checkpoint!(OpTable),
        checkpoint!(WildStrConst),
        checkpoint!(WildAddrOf),
    ];

    #[test]
    fn operator_names_stay_in_lockstep() {
        assert_eq!(
            OPER_NAMES.len(),
            OP_COUNT,
            "name table length differs from operator count"
        );
        for &(index, name) in CHECKLIST {
            assert_eq!(
                OPER_NAMES[index], name,
                "name table out of step at or before {}",
                name
            );
        }
    }

    #[test]
    fn name_table_matches_every_variant() {
        // The serde name of each variant is its declaration name, so any
        // swapped, inserted, or deleted table entry shows up here even
        // between checkpoints.
        for i in 0..OP_COUNT {
            let op = Operator::from_index(i).unwrap();
            let json = serde_json::to_string(&op).unwrap();
            assert_eq!(
                json,
                format!("\"{}\"", OPER_NAMES[i]),
                "name table out of step at index {}",
                i
            );
        }
    }

    #[test]
    fn names_are_unique() {
        for (i, a) in OPER_NAMES.iter().enumerate() {
            for b in &OPER_NAMES[i + 1..] {
                assert_ne!(a, b, "duplicate operator name {}", a);
            }
        }
    }

    #[test]
    fn from_name_inverts_name() {
        for i in 0..OP_COUNT {
            let op = Operator::from_index(i).unwrap();
            assert_eq!(Operator::from_name(op.name()), Some(op));
        }
        assert_eq!(Operator::from_name("NoSuchOperator"), None);
    }

    #[test]
    fn from_index_bounds() {
        assert_eq!(Operator::from_index(0), Some(Operator::Plus));
        assert_eq!(Operator::from_index(OP_COUNT), None);
        assert_eq!(
            Operator::from_index(OP_COUNT - 1),
            Some(Operator::WildAddrOf)
        );
    }

    #[test]
    fn category_predicates() {
        assert!(Operator::Equal.is_comparison());
        assert!(!Operator::Plus.is_comparison());
        assert!(Operator::IntConst.is_const_kind());
        assert!(!Operator::MemOf.is_const_kind());
        assert!(Operator::Wild.is_wildcard());
        assert!(Operator::WildMemOf.is_wildcard());
        assert!(!Operator::MemOf.is_wildcard());
        assert!(Operator::ZF.is_flag_terminal());
        assert!(!Operator::Pc.is_flag_terminal());
    }

    #[test]
    fn serde_uses_variant_names() {
        let json = serde_json::to_string(&Operator::FPlusD).unwrap();
        assert_eq!(json, "\"FPlusD\"");
        let back: Operator = serde_json::from_str(&json).unwrap();
        assert_eq!(back, Operator::FPlusD);
    }
}
