//! Native function signatures.

use std::fmt;

use crate::TypeHash;
use crate::ownership::StorageKind;
use crate::primitive::PrimitiveKind;
use crate::value::NativeValue;

/// One parameter of a native signature.
#[derive(Debug, PartialEq)]
pub struct ParamSpec {
    pub name: Option<String>,
    pub ty: TypeHash,
    pub storage: StorageKind,
    /// Value used when the argument is omitted.
    pub default: Option<NativeValue>,
}

impl ParamSpec {
    pub fn new(ty: TypeHash, storage: StorageKind) -> Self {
        Self { name: None, ty, storage, default: None }
    }

    pub fn has_default(&self) -> bool {
        self.default.is_some()
    }
}

/// The declared return of a native signature.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReturnSpec {
    pub ty: TypeHash,
    pub storage: StorageKind,
}

impl Default for ReturnSpec {
    fn default() -> Self {
        Self { ty: PrimitiveKind::Void.type_hash(), storage: StorageKind::Value }
    }
}

/// A native signature: ordered parameters plus a return type.
///
/// A set of signatures sharing a name forms an overload group.
#[derive(Debug, PartialEq)]
pub struct Signature {
    pub name: String,
    pub params: Vec<ParamSpec>,
    pub ret: ReturnSpec,
    /// Methods only: the receiver is passed as a const reference.
    pub const_method: bool,
}

/// A signature considered during overload resolution.
pub type CandidateSignature = Signature;

impl Signature {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            params: Vec::new(),
            ret: ReturnSpec::default(),
            const_method: false,
        }
    }

    pub fn param(mut self, ty: TypeHash, storage: StorageKind) -> Self {
        self.params.push(ParamSpec::new(ty, storage));
        self
    }

    pub fn param_default(
        mut self,
        ty: TypeHash,
        storage: StorageKind,
        default: NativeValue,
    ) -> Self {
        self.params.push(ParamSpec { default: Some(default), ..ParamSpec::new(ty, storage) });
        self
    }

    /// Name the most recently added parameter.
    pub fn named(mut self, name: impl Into<String>) -> Self {
        if let Some(last) = self.params.last_mut() {
            last.name = Some(name.into());
        }
        self
    }

    pub fn returns(mut self, ty: TypeHash, storage: StorageKind) -> Self {
        self.ret = ReturnSpec { ty, storage };
        self
    }

    pub fn const_method(mut self) -> Self {
        self.const_method = true;
        self
    }

    /// Number of parameters without a default.
    pub fn required_params(&self) -> usize {
        self.params.iter().filter(|p| !p.has_default()).count()
    }

    pub fn accepts_arity(&self, count: usize) -> bool {
        count >= self.required_params() && count <= self.params.len()
    }

    /// Parameter types with every default substituted.
    pub fn effective_types(&self) -> Vec<TypeHash> {
        self.params.iter().map(|p| p.ty).collect()
    }

    /// Hash of this signature's name and parameter types.
    pub fn hash(&self) -> TypeHash {
        TypeHash::from_function(&self.name, &self.effective_types())
    }

    pub fn referenced_types(&self) -> Vec<TypeHash> {
        let mut refs = self.effective_types();
        refs.push(self.ret.ty);
        refs
    }

    /// Whether every default follows every required parameter.
    pub fn defaults_are_trailing(&self) -> bool {
        let mut seen_default = false;
        for param in &self.params {
            if param.has_default() {
                seen_default = true;
            } else if seen_default {
                return false;
            }
        }
        true
    }
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}(", self.name)?;
        for (i, param) in self.params.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", param.ty)?;
            if param.has_default() {
                write!(f, " = ..")?;
            }
        }
        write!(f, ")")
    }
}
