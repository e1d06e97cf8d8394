//! Registration of type descriptors.
//!
//! Types are registered on a mutable [`TypeRegistryBuilder`] and validated
//! all at once by [`TypeRegistryBuilder::build`], which produces the
//! immutable [`TypeConverterRegistry`]. Descriptors may refer to types that
//! are registered later; references are only checked at build time.

use std::sync::Arc;

use crossbind_core::{
    ClassFlags, IntegerPolicy, PrimitiveKind, RegistrationError, TypeDescriptor, TypeHash, TypeKind,
};
use rustc_hash::{FxHashMap, FxHashSet};

use crate::converter::Converter;
use crate::converters::BuiltinConverter;
use crate::registry::{InterfaceTable, RegisteredType, TypeConverterRegistry};

/// Builder for [`TypeConverterRegistry`].
///
/// # Example
///
/// ```ignore
/// let mut builder = TypeRegistryBuilder::new();
/// let fields = [("x".into(), int32), ("y".into(), int32)];
/// let point = builder.register(TypeDescriptor::record("Point", fields))?;
/// let registry = builder.build()?;
/// ```
pub struct TypeRegistryBuilder {
    types: FxHashMap<TypeHash, RegisteredType>,
    type_names: FxHashMap<String, TypeHash>,
    /// Registration order, for deterministic validation and error order.
    order: Vec<TypeHash>,
}

impl std::fmt::Debug for TypeRegistryBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TypeRegistryBuilder")
            .field("types", &self.order.len())
            .field("type_names", &self.type_names)
            .finish()
    }
}

impl Default for TypeRegistryBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl TypeRegistryBuilder {
    /// Create a builder with the primitives, `string` and `bytes` registered.
    pub fn new() -> Self {
        let mut builder = Self {
            types: FxHashMap::default(),
            type_names: FxHashMap::default(),
            order: Vec::new(),
        };
        for kind in PrimitiveKind::all() {
            builder.insert(TypeDescriptor::primitive(kind), Arc::new(BuiltinConverter));
        }
        builder.insert(TypeDescriptor::text(), Arc::new(BuiltinConverter));
        builder.insert(TypeDescriptor::bytes(), Arc::new(BuiltinConverter));
        builder
    }

    // =========================================================================
    // Type Registration
    // =========================================================================

    /// Register a descriptor with the built-in converter for its shape.
    pub fn register(&mut self, descriptor: TypeDescriptor) -> Result<TypeHash, RegistrationError> {
        self.register_with(descriptor, Arc::new(BuiltinConverter))
    }

    /// Register a descriptor with a custom converter.
    ///
    /// Registering an identical descriptor with a converter of the same
    /// definition again is a no-op. Anything else under an existing hash or
    /// name is a [`RegistrationError::DuplicateType`].
    pub fn register_with(
        &mut self,
        descriptor: TypeDescriptor,
        converter: Arc<dyn Converter>,
    ) -> Result<TypeHash, RegistrationError> {
        check_shape(&descriptor)?;

        let hash = descriptor.hash;
        if let Some(existing) = self.types.get(&hash) {
            if *existing.descriptor == descriptor
                && existing.converter.definition_key() == converter.definition_key()
            {
                return Ok(hash);
            }
            return Err(RegistrationError::DuplicateType { name: descriptor.name });
        }
        if self.type_names.get(&descriptor.name).is_some_and(|h| *h != hash) {
            return Err(RegistrationError::DuplicateType { name: descriptor.name });
        }

        log::trace!("registered type '{}' ({})", descriptor.name, hash);
        self.insert(descriptor, converter);
        Ok(hash)
    }

    fn insert(&mut self, descriptor: TypeDescriptor, converter: Arc<dyn Converter>) {
        let hash = descriptor.hash;
        self.type_names.insert(descriptor.name.clone(), hash);
        self.order.push(hash);
        self.types.insert(hash, RegisteredType { descriptor: Arc::new(descriptor), converter });
    }

    /// Look up a type by name (useful during registration).
    pub fn lookup(&self, name: &str) -> Option<TypeHash> {
        self.type_names.get(name).copied()
    }

    /// Get a descriptor by hash (useful during registration).
    pub fn descriptor(&self, hash: TypeHash) -> Option<&TypeDescriptor> {
        self.types.get(&hash).map(|entry| &*entry.descriptor)
    }

    // =========================================================================
    // Build
    // =========================================================================

    /// Validate every registration and build the immutable registry.
    ///
    /// # Errors
    ///
    /// Returns every unresolved reference and malformed class hierarchy found.
    #[cfg_attr(feature = "profiling", profiling::function)]
    pub fn build(self) -> Result<TypeConverterRegistry, Vec<RegistrationError>> {
        let mut errors = Vec::new();

        for hash in &self.order {
            let descriptor = &self.types[hash].descriptor;
            let references = descriptor.references().into_iter();
            for missing in references.filter(|r| !self.types.contains_key(r)) {
                let owner = descriptor.name.clone();
                errors.push(RegistrationError::UnresolvedType { owner, missing });
            }
            if let Some(info) = descriptor.as_class() {
                for base in info.bases.iter().filter_map(|b| self.types.get(b)) {
                    match base.descriptor.as_class() {
                        None => {
                            let reason = format!("base '{}' is not a class", base.descriptor.name);
                            errors.push(invalid(descriptor, reason))
                        }
                        Some(base_info) if base_info.flags.contains(ClassFlags::FINAL) => {
                            let reason = format!("base '{}' is final", base.descriptor.name);
                            errors.push(invalid(descriptor, reason))
                        }
                        Some(_) => {}
                    }
                }
            }
        }
        if !errors.is_empty() {
            return Err(errors);
        }

        let mut interfaces = FxHashMap::default();
        for hash in &self.order {
            let descriptor = &self.types[hash].descriptor;
            if descriptor.as_class().is_none() {
                continue;
            }
            match self.linearize(*hash) {
                Ok(ancestors) => {
                    interfaces.insert(*hash, InterfaceTable::new(*hash, ancestors));
                }
                Err(reason) => errors.push(invalid(descriptor, reason)),
            }
        }
        if !errors.is_empty() {
            return Err(errors);
        }

        log::debug!(
            "type registry built: {} types, {} classes",
            self.types.len(),
            interfaces.len()
        );
        Ok(TypeConverterRegistry::new(self.types, self.type_names, interfaces))
    }

    /// Ancestors of `class` in lookup order: a left-to-right depth-first walk
    /// of the bases, keeping only the last occurrence of each class.
    fn linearize(&self, class: TypeHash) -> Result<Vec<TypeHash>, String> {
        let mut visited = Vec::new();
        let mut path = FxHashSet::default();
        self.walk_bases(class, &mut path, &mut visited)?;

        let mut seen = FxHashSet::default();
        let mut ancestors: Vec<TypeHash> =
            visited.into_iter().rev().filter(|h| seen.insert(*h)).collect();
        ancestors.reverse();
        Ok(ancestors)
    }

    fn walk_bases(
        &self,
        class: TypeHash,
        path: &mut FxHashSet<TypeHash>,
        visited: &mut Vec<TypeHash>,
    ) -> Result<(), String> {
        if !path.insert(class) {
            let name = self.descriptor(class).map_or_else(|| class.to_string(), |d| d.name.clone());
            return Err(format!("inheritance cycle through '{name}'"));
        }
        let bases = self
            .descriptor(class)
            .and_then(TypeDescriptor::as_class)
            .map(|info| info.bases.clone());
        for base in bases.unwrap_or_default() {
            visited.push(base);
            self.walk_bases(base, path, visited)?;
        }
        path.remove(&class);
        Ok(())
    }
}

/// Checks that need nothing but the descriptor itself.
fn check_shape(descriptor: &TypeDescriptor) -> Result<(), RegistrationError> {
    match &descriptor.kind {
        TypeKind::Primitive { kind, policy: IntegerPolicy::Wrapping } if !kind.is_byte_sized() => {
            let reason =
                format!("wrapping is only sanctioned for 8-bit integers, not {}", kind.name());
            Err(invalid(descriptor, reason))
        }
        TypeKind::Record { fields } => {
            let mut names = FxHashSet::default();
            match fields.iter().find(|f| !names.insert(f.name.as_str())) {
                Some(dup) => {
                    Err(invalid(descriptor, format!("field '{}' is declared twice", dup.name)))
                }
                None => Ok(()),
            }
        }
        TypeKind::Callable(signature) if !signature.defaults_are_trailing() => {
            Err(invalid(descriptor, "defaulted parameters must come last".to_string()))
        }
        TypeKind::Class(info) if info.bases.contains(&descriptor.hash) => {
            Err(invalid(descriptor, "a class cannot derive from itself".to_string()))
        }
        _ => Ok(()),
    }
}

fn invalid(descriptor: &TypeDescriptor, reason: String) -> RegistrationError {
    RegistrationError::InvalidDescriptor { name: descriptor.name.clone(), reason }
}
