//! Calling-convention-aware descriptions of procedure interfaces.

use serde::{Deserialize, Serialize};

use crate::exp::Exp;
use crate::ty::Type;

/// Target platform a signature's conventions are interpreted against.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
pub enum Platform {
    #[default]
    Generic,
    Pentium,
    Sparc,
    Ppc,
    St20,
}

impl Platform {
    pub fn name(self) -> &'static str {
        match self {
            Platform::Generic => "generic",
            Platform::Pentium => "pentium",
            Platform::Sparc => "sparc",
            Platform::Ppc => "ppc",
            Platform::St20 => "st20",
        }
    }

    pub fn from_name(name: &str) -> Option<Platform> {
        match name {
            "generic" => Some(Platform::Generic),
            "pentium" => Some(Platform::Pentium),
            "sparc" => Some(Platform::Sparc),
            "ppc" => Some(Platform::Ppc),
            "st20" => Some(Platform::St20),
            _ => None,
        }
    }
}

/// Calling convention.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
pub enum Convention {
    #[default]
    None,
    C,
    Pascal,
    ThisCall,
}

impl Convention {
    pub fn name(self) -> &'static str {
        match self {
            Convention::None => "none",
            Convention::C => "stdc",
            Convention::Pascal => "pascal",
            Convention::ThisCall => "thiscall",
        }
    }

    pub fn from_name(name: &str) -> Option<Convention> {
        match name {
            "none" => Some(Convention::None),
            "stdc" => Some(Convention::C),
            "pascal" => Some(Convention::Pascal),
            "thiscall" => Some(Convention::ThisCall),
            _ => None,
        }
    }
}

/// A formal parameter: its name, type, and the location expression it is
/// passed in.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Parameter {
    pub name: String,
    pub ty: Type,
    pub exp: Exp,
}

/// A return value: its type and the location expression it comes back in.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Return {
    pub ty: Type,
    pub exp: Exp,
}

/// The calling-convention-aware description of a procedure's parameters
/// and returns.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Signature {
    pub name: String,
    pub params: Vec<Parameter>,
    pub returns: Vec<Return>,
    pub rettype: Option<Type>,
    pub preferred_name: String,
    pub preferred_return: Option<Type>,
    pub preferred_params: Vec<usize>,
    pub ellipsis: bool,
    pub platform: Platform,
    pub convention: Convention,
}

impl Signature {
    pub fn new(name: &str) -> Signature {
        Signature {
            name: name.to_string(),
            params: Vec::new(),
            returns: Vec::new(),
            rettype: None,
            preferred_name: String::new(),
            preferred_return: None,
            preferred_params: Vec::new(),
            ellipsis: false,
            platform: Platform::Generic,
            convention: Convention::None,
        }
    }

    /// Factory: a signature for the given platform and convention. When
    /// either is unset a generic signature results.
    pub fn instantiate(platform: Platform, convention: Convention, name: &str) -> Signature {
        let mut sig = Signature::new(name);
        sig.platform = platform;
        sig.convention = convention;
        sig
    }

    pub fn add_parameter(&mut self, name: &str, ty: Type, exp: Exp) {
        self.params.push(Parameter {
            name: name.to_string(),
            ty,
            exp,
        });
    }

    pub fn add_return(&mut self, ty: Type, exp: Exp) {
        self.returns.push(Return { ty, exp });
    }

    /// Index of the named parameter, if present.
    pub fn find_param(&self, name: &str) -> Option<usize> {
        self.params.iter().position(|p| p.name == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ty::Signedness;

    #[test]
    fn instantiate_defaults_to_generic() {
        let sig = Signature::instantiate(Platform::Generic, Convention::None, "main");
        assert_eq!(sig.name, "main");
        assert_eq!(sig.platform, Platform::Generic);
        assert_eq!(sig.convention, Convention::None);
        assert!(!sig.ellipsis);
        assert!(sig.params.is_empty());
    }

    #[test]
    fn platform_names_roundtrip() {
        for p in [
            Platform::Generic,
            Platform::Pentium,
            Platform::Sparc,
            Platform::Ppc,
            Platform::St20,
        ] {
            assert_eq!(Platform::from_name(p.name()), Some(p));
        }
        assert_eq!(Platform::from_name("vax"), None);
    }

    #[test]
    fn convention_names_roundtrip() {
        for c in [
            Convention::None,
            Convention::C,
            Convention::Pascal,
            Convention::ThisCall,
        ] {
            assert_eq!(Convention::from_name(c.name()), Some(c));
        }
        assert_eq!(Convention::from_name("fastcall"), None);
    }

    #[test]
    fn params_keep_insertion_order() {
        let mut sig = Signature::new("printf");
        sig.add_parameter("fmt", Type::ptr(Type::Char), Exp::reg(24));
        sig.add_parameter("arg1", Type::int(32, Signedness::Signed), Exp::reg(25));
        sig.ellipsis = true;

        assert_eq!(sig.params.len(), 2);
        assert_eq!(sig.params[0].name, "fmt");
        assert_eq!(sig.params[0].ty, Type::ptr(Type::Char));
        assert_eq!(sig.find_param("arg1"), Some(1));
        assert_eq!(sig.find_param("argc"), None);
        assert!(sig.ellipsis);
    }
}
