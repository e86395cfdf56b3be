//! The IR type family and the meet operation driving type inference.
//!
//! Types are a small algebraic sum closed under structural equality. They
//! are immutable by convention: analyses build new types rather than
//! editing in place, and the dataflow type-inference pass combines
//! observations with [`Type::meet`], the join of the type lattice.
//!
//! A pointer's pointee is always present here; the XML reader constructs
//! `Pointer(Void)` as a placeholder while the real pointee element is still
//! being parsed and patches it before the type is published.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::signature::Signature;

/// Signedness of an integer type.
///
/// Encoded on the wire as an integer: signed is positive, unsigned is
/// negative, unknown is zero.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
pub enum Signedness {
    Signed,
    #[default]
    Unknown,
    Unsigned,
}

impl Signedness {
    pub fn to_int(self) -> i32 {
        match self {
            Signedness::Signed => 1,
            Signedness::Unknown => 0,
            Signedness::Unsigned => -1,
        }
    }

    pub fn from_int(i: i32) -> Signedness {
        match i.signum() {
            1 => Signedness::Signed,
            -1 => Signedness::Unsigned,
            _ => Signedness::Unknown,
        }
    }

    /// Known beats unknown; conflicting known signednesses decay to unknown.
    fn meet(self, other: Signedness) -> Signedness {
        match (self, other) {
            (s, Signedness::Unknown) => s,
            (Signedness::Unknown, s) => s,
            (a, b) if a == b => a,
            _ => Signedness::Unknown,
        }
    }
}

/// Sentinel for an array whose length is not known.
pub const ARRAY_LEN_UNKNOWN: u32 = u32::MAX;

/// The IR type sum.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Type {
    Void,
    Char,
    Boolean,
    Integer { size: u16, signedness: Signedness },
    Float { size: u16 },
    /// A bare width observation with no interpretation yet.
    Size { size: u16 },
    Pointer(Box<Type>),
    Array { element: Box<Type>, length: u32 },
    Named(String),
    /// Ordered (name, type) fields.
    Compound { fields: Vec<(String, Type)> },
    Func(Box<Signature>),
}

/// Size meet: the larger known size wins; zero means unknown.
fn size_meet(a: u16, b: u16) -> u16 {
    match (a, b) {
        (0, s) | (s, 0) => s,
        (a, b) => a.max(b),
    }
}

impl Type {
    pub fn int(size: u16, signedness: Signedness) -> Type {
        Type::Integer { size, signedness }
    }

    pub fn ptr(to: Type) -> Type {
        Type::Pointer(Box::new(to))
    }

    /// Width of a value of this type in bits, where it has one.
    ///
    /// Pointers report the native word size; named and compound types
    /// report zero (resolve first).
    pub fn size_bits(&self) -> u16 {
        match self {
            Type::Void => 0,
            Type::Char => 8,
            Type::Boolean => 1,
            Type::Integer { size, .. } | Type::Float { size } | Type::Size { size } => *size,
            Type::Pointer(_) | Type::Func(_) => 32,
            Type::Array { element, length } => {
                if *length == ARRAY_LEN_UNKNOWN {
                    0
                } else {
                    element.size_bits().saturating_mul(*length as u16)
                }
            }
            Type::Named(_) | Type::Compound { .. } => 0,
        }
    }

    /// The lattice join of two type observations.
    ///
    /// Commutative and idempotent. `changed` is set (never cleared) when
    /// the result differs structurally from `self`, so callers can drive a
    /// fixed-point iteration with it.
    pub fn meet(&self, other: &Type, changed: &mut bool) -> Type {
        let result = self.meet_inner(other);
        if result != *self {
            *changed = true;
        }
        result
    }

    fn meet_inner(&self, other: &Type) -> Type {
        use Type::*;
        match (self, other) {
            // Void carries no information.
            (Void, t) | (t, Void) => t.clone(),

            (
                Integer {
                    size: s1,
                    signedness: g1,
                },
                Integer {
                    size: s2,
                    signedness: g2,
                },
            ) => Integer {
                size: size_meet(*s1, *s2),
                signedness: g1.meet(*g2),
            },

            // A bare size promotes its partner's width.
            (Size { size: s1 }, Integer { size, signedness })
            | (Integer { size, signedness }, Size { size: s1 }) => Integer {
                size: size_meet(*s1, *size),
                signedness: *signedness,
            },
            (Size { size: s1 }, Float { size: s2 }) | (Float { size: s2 }, Size { size: s1 }) => {
                Float {
                    size: size_meet(*s1, *s2),
                }
            }
            (Size { size: s1 }, Size { size: s2 }) => Size {
                size: size_meet(*s1, *s2),
            },
            // Any remaining typed partner already knows its width, so the
            // bare size observation is absorbed by it outright.
            (Size { .. }, t) | (t, Size { .. }) => t.clone(),

            (Float { size: s1 }, Float { size: s2 }) => Float {
                size: size_meet(*s1, *s2),
            },

            (Char, Char) => Char,
            // A char observation absorbs a byte-or-unknown-width integer.
            (Char, Integer { size: 0 | 8, .. }) | (Integer { size: 0 | 8, .. }, Char) => Char,

            (Boolean, Boolean) => Boolean,

            (Pointer(a), Pointer(b)) => Pointer(Box::new(a.meet_inner(b))),

            (
                Array {
                    element: e1,
                    length: l1,
                },
                Array {
                    element: e2,
                    length: l2,
                },
            ) => Array {
                element: Box::new(e1.meet_inner(e2)),
                length: match (*l1, *l2) {
                    (ARRAY_LEN_UNKNOWN, l) | (l, ARRAY_LEN_UNKNOWN) => l,
                    (a, b) => a.max(b),
                },
            },

            (Named(a), Named(b)) if a == b => Named(a.clone()),

            (Compound { fields: f1 }, Compound { fields: f2 }) if f1.len() == f2.len() => {
                let fields = f1
                    .iter()
                    .zip(f2)
                    .map(|((n1, t1), (n2, t2))| {
                        let name = if n1 == n2 { n1.clone() } else { String::new() };
                        (name, t1.meet_inner(t2))
                    })
                    .collect();
                Compound { fields }
            }

            (Func(a), Func(b)) if a == b => Func(a.clone()),

            (a, b) if a == b => a.clone(),

            // Irreconcilable observations decay to an unresolved name;
            // always a valid type.
            _ => Named("?".to_string()),
        }
    }
}

impl fmt::Display for Type {
    /// Brief form used inside statement dumps, e.g. `i32`, `u16`, `f64`,
    /// `i32*`.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Type::Void => write!(f, "v"),
            Type::Char => write!(f, "c"),
            Type::Boolean => write!(f, "b"),
            Type::Integer { size, signedness } => {
                let tag = match signedness {
                    Signedness::Signed => 'i',
                    Signedness::Unsigned => 'u',
                    Signedness::Unknown => 'j',
                };
                write!(f, "{}{}", tag, size)
            }
            Type::Float { size } => write!(f, "f{}", size),
            Type::Size { size } => write!(f, "{}", size),
            Type::Pointer(to) => write!(f, "{}*", to),
            Type::Array { element, length } => {
                if *length == ARRAY_LEN_UNKNOWN {
                    write!(f, "{}[]", element)
                } else {
                    write!(f, "{}[{}]", element, length)
                }
            }
            Type::Named(name) => write!(f, "{}", name),
            Type::Compound { fields } => {
                write!(f, "struct {{")?;
                for (i, (name, ty)) in fields.iter().enumerate() {
                    if i > 0 {
                        write!(f, "; ")?;
                    }
                    write!(f, "{} {}", ty, name)?;
                }
                write!(f, "}}")
            }
            Type::Func(sig) => write!(f, "func {}()", sig.name),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn meet_int_unknown_with_signed() {
        let mut changed = false;
        let a = Type::int(32, Signedness::Unknown);
        let b = Type::int(32, Signedness::Signed);
        let m = a.meet(&b, &mut changed);
        assert_eq!(m, Type::int(32, Signedness::Signed));
        assert!(changed);
    }

    #[test]
    fn meet_int_same_is_unchanged() {
        let mut changed = false;
        let a = Type::int(32, Signedness::Signed);
        let m = a.meet(&a.clone(), &mut changed);
        assert_eq!(m, a);
        assert!(!changed);
    }

    #[test]
    fn meet_conflicting_signedness_decays() {
        let mut changed = false;
        let a = Type::int(32, Signedness::Signed);
        let b = Type::int(32, Signedness::Unsigned);
        let m = a.meet(&b, &mut changed);
        assert_eq!(m, Type::int(32, Signedness::Unknown));
        assert!(changed);
    }

    #[test]
    fn meet_size_with_integer_widens() {
        let mut changed = false;
        let a = Type::Size { size: 32 };
        let b = Type::int(16, Signedness::Signed);
        let m = a.meet(&b, &mut changed);
        assert_eq!(m, Type::int(32, Signedness::Signed));
        assert!(changed);
    }

    #[test]
    fn meet_size_with_pointer_adopts_the_partner() {
        let mut changed = false;
        let size = Type::Size { size: 32 };
        let ptr = Type::ptr(Type::Char);
        assert_eq!(size.meet(&ptr, &mut changed), ptr);
        assert!(changed);

        changed = false;
        assert_eq!(ptr.meet(&size, &mut changed), ptr);
        assert!(!changed);
    }

    #[test]
    fn meet_size_with_other_typed_partners() {
        let size = Type::Size { size: 8 };
        let partners = [
            Type::Char,
            Type::Boolean,
            Type::Array {
                element: Box::new(Type::Char),
                length: 16,
            },
            Type::Named("FILE".into()),
            Type::Compound {
                fields: vec![("lo".into(), Type::int(16, Signedness::Unsigned))],
            },
            Type::Func(Box::new(crate::signature::Signature::new("cmp"))),
        ];
        for partner in &partners {
            let mut changed = false;
            assert_eq!(size.meet(partner, &mut changed), *partner);
            assert!(changed);
            changed = false;
            assert_eq!(partner.meet(&size, &mut changed), *partner);
            assert!(!changed);
        }
    }

    #[test]
    fn meet_pointer_recurses() {
        let mut changed = false;
        let a = Type::ptr(Type::int(32, Signedness::Unknown));
        let b = Type::ptr(Type::int(32, Signedness::Signed));
        let m = a.meet(&b, &mut changed);
        assert_eq!(m, Type::ptr(Type::int(32, Signedness::Signed)));
        assert!(changed);
    }

    #[test]
    fn meet_void_is_identity() {
        let mut changed = false;
        let t = Type::Float { size: 64 };
        assert_eq!(Type::Void.meet(&t, &mut changed), t);
        assert!(changed);
        changed = false;
        assert_eq!(t.meet(&Type::Void, &mut changed), t);
        assert!(!changed);
    }

    #[test]
    fn meet_compound_mismatched_counts_is_valid() {
        let mut changed = false;
        let a = Type::Compound {
            fields: vec![("x".into(), Type::int(32, Signedness::Signed))],
        };
        let b = Type::Compound {
            fields: vec![
                ("x".into(), Type::int(32, Signedness::Signed)),
                ("y".into(), Type::int(32, Signedness::Signed)),
            ],
        };
        let m = a.meet(&b, &mut changed);
        assert_eq!(m, Type::Named("?".into()));
    }

    #[test]
    fn size_meet_larger_known_wins() {
        assert_eq!(size_meet(0, 16), 16);
        assert_eq!(size_meet(16, 0), 16);
        assert_eq!(size_meet(16, 32), 32);
        assert_eq!(size_meet(0, 0), 0);
    }

    #[test]
    fn display_brief_forms() {
        assert_eq!(Type::int(32, Signedness::Signed).to_string(), "i32");
        assert_eq!(Type::int(16, Signedness::Unsigned).to_string(), "u16");
        assert_eq!(Type::int(8, Signedness::Unknown).to_string(), "j8");
        assert_eq!(Type::Float { size: 64 }.to_string(), "f64");
        assert_eq!(Type::ptr(Type::Char).to_string(), "c*");
    }

    #[test]
    fn signedness_int_encoding() {
        assert_eq!(Signedness::from_int(1), Signedness::Signed);
        assert_eq!(Signedness::from_int(-5), Signedness::Unsigned);
        assert_eq!(Signedness::from_int(0), Signedness::Unknown);
        assert_eq!(Signedness::Signed.to_int(), 1);
        assert_eq!(Signedness::Unsigned.to_int(), -1);
    }

    fn arb_type() -> impl Strategy<Value = Type> {
        let leaf = prop_oneof![
            Just(Type::Void),
            Just(Type::Char),
            Just(Type::Boolean),
            (prop_oneof![Just(0u16), Just(8), Just(16), Just(32), Just(64)]).prop_flat_map(|s| {
                prop_oneof![
                    Just(Type::int(s, Signedness::Signed)),
                    Just(Type::int(s, Signedness::Unsigned)),
                    Just(Type::int(s, Signedness::Unknown)),
                    Just(Type::Float { size: s }),
                    Just(Type::Size { size: s }),
                ]
            }),
        ];
        leaf.prop_recursive(3, 16, 2, |inner| {
            prop_oneof![
                inner.clone().prop_map(Type::ptr),
                (inner, 0u32..4).prop_map(|(t, l)| Type::Array {
                    element: Box::new(t),
                    length: l,
                }),
            ]
        })
    }

    proptest! {
        #[test]
        fn meet_is_commutative(a in arb_type(), b in arb_type()) {
            let mut c1 = false;
            let mut c2 = false;
            prop_assert_eq!(a.meet(&b, &mut c1), b.meet(&a, &mut c2));
        }

        #[test]
        fn meet_is_idempotent(a in arb_type()) {
            let mut changed = false;
            prop_assert_eq!(a.meet(&a.clone(), &mut changed), a);
            prop_assert!(!changed);
        }
    }
}
