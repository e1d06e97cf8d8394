//! Type descriptors.
//!
//! A [`TypeDescriptor`] is the immutable record the registry keeps for every
//! type that can cross the boundary. Descriptors refer to each other by
//! [`TypeHash`], so composite shapes can be declared before their parts.

use std::fmt;
use std::sync::Arc;

use bitflags::bitflags;

use crate::TypeHash;
use crate::error::OwnershipError;
use crate::object::NativeObject;
use crate::ownership::StorageKind;
use crate::primitive::{IntegerPolicy, PrimitiveKind};
use crate::signature::Signature;

/// Produces an independent copy of a native object.
pub type CopyFn = Arc<dyn Fn(&NativeObject) -> Result<NativeObject, OwnershipError> + Send + Sync>;

/// Immutable description of a native type.
#[derive(Debug, Clone, PartialEq)]
pub struct TypeDescriptor {
    pub hash: TypeHash,
    pub name: String,
    pub kind: TypeKind,
}

/// The shape of a described type.
#[derive(Debug, Clone, PartialEq)]
pub enum TypeKind {
    Primitive { kind: PrimitiveKind, policy: IntegerPolicy },
    Text,
    Bytes,
    Sequence { element: TypeHash, storage: StorageKind },
    Mapping { key: TypeHash, value: TypeHash, storage: StorageKind },
    /// An aggregate with named fields, exchanged as a mapping.
    Record { fields: Vec<FieldSpec> },
    Callable(Arc<Signature>),
    Class(ClassInfo),
}

/// One field of a record type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldSpec {
    pub name: String,
    pub ty: TypeHash,
}

impl TypeDescriptor {
    pub fn primitive(kind: PrimitiveKind) -> Self {
        Self {
            hash: kind.type_hash(),
            name: kind.name().to_string(),
            kind: TypeKind::Primitive { kind, policy: IntegerPolicy::Checked },
        }
    }

    /// An 8-bit integer type that wraps instead of rejecting out-of-range values.
    ///
    /// Registration rejects wrapping descriptors of any other width.
    pub fn wrapping(name: impl Into<String>, kind: PrimitiveKind) -> Self {
        let name = name.into();
        Self {
            hash: TypeHash::from_name(&name),
            name,
            kind: TypeKind::Primitive { kind, policy: IntegerPolicy::Wrapping },
        }
    }

    pub fn text() -> Self {
        Self::named("string", TypeKind::Text)
    }

    pub fn bytes() -> Self {
        Self::named("bytes", TypeKind::Bytes)
    }

    /// A sequence whose elements are held by value.
    pub fn sequence(element: &TypeDescriptor) -> Self {
        Self::sequence_with(element, StorageKind::Value)
    }

    pub fn sequence_with(element: &TypeDescriptor, storage: StorageKind) -> Self {
        Self {
            hash: TypeHash::from_sequence(element.hash),
            name: format!("list<{}>", element.name),
            kind: TypeKind::Sequence { element: element.hash, storage },
        }
    }

    pub fn mapping(key: &TypeDescriptor, value: &TypeDescriptor) -> Self {
        Self {
            hash: TypeHash::from_mapping(key.hash, value.hash),
            name: format!("dict<{}, {}>", key.name, value.name),
            kind: TypeKind::Mapping {
                key: key.hash,
                value: value.hash,
                storage: StorageKind::Value,
            },
        }
    }

    pub fn record(
        name: impl Into<String>,
        fields: impl IntoIterator<Item = (String, TypeHash)>,
    ) -> Self {
        let fields = fields.into_iter().map(|(name, ty)| FieldSpec { name, ty }).collect();
        Self::named(name, TypeKind::Record { fields })
    }

    /// A callable type. Its name and hash are derived from the signature's shape.
    pub fn callable(signature: Signature) -> Self {
        let params: Vec<_> = signature.params.iter().map(|p| p.ty).collect();
        Self {
            hash: TypeHash::from_callable(&params, signature.ret.ty),
            name: format!("callable<{}>", signature.name),
            kind: TypeKind::Callable(Arc::new(signature)),
        }
    }

    pub fn class(name: impl Into<String>, info: ClassInfo) -> Self {
        Self::named(name, TypeKind::Class(info))
    }

    fn named(name: impl Into<String>, kind: TypeKind) -> Self {
        let name = name.into();
        Self { hash: TypeHash::from_name(&name), name, kind }
    }

    pub fn as_class(&self) -> Option<&ClassInfo> {
        match &self.kind {
            TypeKind::Class(info) => Some(info),
            _ => None,
        }
    }

    pub fn as_signature(&self) -> Option<&Arc<Signature>> {
        match &self.kind {
            TypeKind::Callable(sig) => Some(sig),
            _ => None,
        }
    }

    /// Every type hash this descriptor refers to.
    pub fn references(&self) -> Vec<TypeHash> {
        match &self.kind {
            TypeKind::Primitive { .. } | TypeKind::Text | TypeKind::Bytes => Vec::new(),
            TypeKind::Sequence { element, .. } => vec![*element],
            TypeKind::Mapping { key, value, .. } => vec![*key, *value],
            TypeKind::Record { fields } => fields.iter().map(|f| f.ty).collect(),
            TypeKind::Callable(sig) => sig.referenced_types(),
            TypeKind::Class(info) => info.bases.clone(),
        }
    }
}

bitflags! {
    /// Behaviour flags of a class descriptor.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct ClassFlags: u32 {
        /// Instances may be copied when passed by value.
        const COPYABLE = 1 << 0;
        /// Wrappers accept arbitrary attributes.
        const DYNAMIC_ATTRS = 1 << 1;
        /// The class cannot be used as a base.
        const FINAL = 1 << 2;
    }
}

/// Class-specific part of a descriptor.
#[derive(Clone, Default)]
pub struct ClassInfo {
    /// Direct bases in declaration order.
    pub bases: Vec<TypeHash>,
    pub flags: ClassFlags,
    /// Attribute names a wrapper accepts when `DYNAMIC_ATTRS` is not set.
    pub slots: Vec<String>,
    pub copy: Option<CopyFn>,
}

impl ClassInfo {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn base(mut self, base: TypeHash) -> Self {
        self.bases.push(base);
        self
    }

    pub fn flags(mut self, flags: ClassFlags) -> Self {
        self.flags |= flags;
        self
    }

    pub fn slot(mut self, name: impl Into<String>) -> Self {
        self.slots.push(name.into());
        self
    }

    /// Make the class copyable through `T::clone`.
    pub fn copyable<T>(mut self) -> Self
    where
        T: Clone + Send + Sync + 'static,
    {
        self.flags |= ClassFlags::COPYABLE;
        self.copy = Some(Arc::new(|object: &NativeObject| {
            let copy = object.with(|value: &T| value.clone())?;
            Ok(NativeObject::new(object.class(), copy))
        }));
        self
    }

    pub fn is_copyable(&self) -> bool {
        self.flags.contains(ClassFlags::COPYABLE) && self.copy.is_some()
    }

    pub fn accepts_attr(&self, name: &str) -> bool {
        self.flags.contains(ClassFlags::DYNAMIC_ATTRS) || self.slots.iter().any(|s| s == name)
    }
}

impl fmt::Debug for ClassInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClassInfo")
            .field("bases", &self.bases)
            .field("flags", &self.flags)
            .field("slots", &self.slots)
            .field("copy", &self.copy.is_some())
            .finish()
    }
}

impl PartialEq for ClassInfo {
    fn eq(&self, other: &Self) -> bool {
        let same_copy = match (&self.copy, &other.copy) {
            (Some(a), Some(b)) => Arc::ptr_eq(a, b),
            (None, None) => true,
            _ => false,
        };
        self.bases == other.bases
            && self.flags == other.flags
            && self.slots == other.slots
            && same_copy
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn primitive_descriptor_uses_kind_name() {
        let d = TypeDescriptor::primitive(PrimitiveKind::Uint16);
        assert_eq!(d.name, "uint16");
        assert_eq!(d.hash, PrimitiveKind::Uint16.type_hash());
        assert!(d.references().is_empty());
    }

    #[test]
    fn composite_names_and_references() {
        let int32 = TypeDescriptor::primitive(PrimitiveKind::Int32);
        let text = TypeDescriptor::text();
        let list = TypeDescriptor::sequence(&int32);
        assert_eq!(list.name, "list<int32>");
        assert_eq!(list.references(), vec![int32.hash]);

        let dict = TypeDescriptor::mapping(&text, &int32);
        assert_eq!(dict.name, "dict<string, int32>");
        assert_eq!(dict.references(), vec![text.hash, int32.hash]);
    }

    #[test]
    fn class_info_builder() {
        let base = TypeHash::from_name("Base");
        let info = ClassInfo::new().base(base).slot("x").flags(ClassFlags::FINAL);
        assert_eq!(info.bases, vec![base]);
        assert!(info.accepts_attr("x"));
        assert!(!info.accepts_attr("y"));
        assert!(!info.is_copyable());

        let open = ClassInfo::new().flags(ClassFlags::DYNAMIC_ATTRS);
        assert!(open.accepts_attr("anything"));
    }

    #[test]
    fn copyable_class_copies_payload() {
        let info = ClassInfo::new().copyable::<String>();
        assert!(info.is_copyable());

        let original = NativeObject::new(TypeHash::from_name("Label"), "hello".to_string());
        let copy = (info.copy.as_ref().unwrap())(&original).unwrap();
        assert_ne!(copy.token(), original.token());
        assert_eq!(copy.with(|s: &String| s.clone()).unwrap(), "hello");
    }

    #[test]
    fn class_info_equality_tracks_copy_fn_identity() {
        let a = ClassInfo::new().copyable::<u32>();
        let b = a.clone();
        let c = ClassInfo::new().copyable::<u32>();
        assert_eq!(a, b);
        assert_ne!(a, c);
    }
}
