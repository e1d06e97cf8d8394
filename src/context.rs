//! Registration phase.
//!
//! A `Context` collects type descriptors, functions and methods, then seals
//! them into an immutable [`Bridge`].
//!
//! # Example
//!
//! ```ignore
//! use crossbind::prelude::*;
//!
//! let mut ctx = Context::new();
//! let int32 = PrimitiveKind::Int32.type_hash();
//! ctx.register_function(
//!     Signature::new("twice").param(int32, StorageKind::Value).returns(int32, StorageKind::Value),
//!     |call: &mut CallContext<'_>| {
//!         let n: i32 = call.arg_as(0)?;
//!         call.set_return_value(n * 2);
//!         Ok(())
//!     },
//! )?;
//! let bridge = ctx.seal()?;
//! assert_eq!(bridge.call("twice", vec![DynamicValue::Int(4)])?, DynamicValue::Int(8));
//! ```

use std::sync::Arc;

use crossbind_core::{
    CallContext, NativeError, NativeFn, ParamSpec, RegistrationError, Signature, StorageKind,
    TypeDescriptor, TypeHash, TypeKind,
};
use crossbind_registry::{Converter, TypeConverterRegistry, TypeRegistryBuilder};
use crossbind_resolver::OverloadGroup;
use rustc_hash::FxHashMap;
use thiserror::Error;

use crate::bridge::{Bridge, FunctionEntry, MethodTable};
use crate::config::BridgeConfig;

/// Collects registrations until [`seal`](Context::seal).
pub struct Context {
    config: BridgeConfig,
    /// Consumed on seal.
    builder: Option<TypeRegistryBuilder>,
    functions: FxHashMap<String, FunctionEntry>,
    /// Registration order of function groups.
    order: Vec<String>,
    /// Classes in registration order.
    classes: Vec<TypeHash>,
    /// Method names declared directly on each class.
    methods: FxHashMap<TypeHash, Vec<String>>,
    sealed: Option<Arc<Bridge>>,
}

impl std::fmt::Debug for Context {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Context")
            .field("functions", &self.order)
            .field("classes", &self.classes.len())
            .field("sealed", &self.is_sealed())
            .finish()
    }
}

impl Context {
    pub fn new() -> Self {
        Self::with_config(BridgeConfig::default())
    }

    pub fn with_config(config: BridgeConfig) -> Self {
        Self {
            config,
            builder: Some(TypeRegistryBuilder::new()),
            functions: FxHashMap::default(),
            order: Vec::new(),
            classes: Vec::new(),
            methods: FxHashMap::default(),
            sealed: None,
        }
    }

    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }

    // =========================================================================
    // Types
    // =========================================================================

    /// Register a descriptor with the built-in converter for its shape.
    pub fn register_type(&mut self, descriptor: TypeDescriptor) -> Result<TypeHash, ContextError> {
        let is_class = matches!(descriptor.kind, TypeKind::Class(_));
        let hash = self.builder()?.register(descriptor)?;
        self.note_class(is_class, hash);
        Ok(hash)
    }

    /// Register a descriptor with a custom converter.
    pub fn register_with(
        &mut self,
        descriptor: TypeDescriptor,
        converter: Arc<dyn Converter>,
    ) -> Result<TypeHash, ContextError> {
        let is_class = matches!(descriptor.kind, TypeKind::Class(_));
        let hash = self.builder()?.register_with(descriptor, converter)?;
        self.note_class(is_class, hash);
        Ok(hash)
    }

    /// Look up a registered type by name.
    pub fn lookup(&self, name: &str) -> Option<TypeHash> {
        match (&self.builder, &self.sealed) {
            (Some(builder), _) => builder.lookup(name),
            (None, Some(bridge)) => bridge.registry().hash_of(name),
            (None, None) => None,
        }
    }

    fn note_class(&mut self, is_class: bool, hash: TypeHash) {
        if is_class && !self.classes.contains(&hash) {
            self.classes.push(hash);
        }
    }

    fn builder(&mut self) -> Result<&mut TypeRegistryBuilder, ContextError> {
        if self.sealed.is_some() {
            return Err(ContextError::AlreadySealed);
        }
        self.builder.as_mut().ok_or(ContextError::AlreadySealed)
    }

    // =========================================================================
    // Functions
    // =========================================================================

    /// Add `signature` to the overload group named after it.
    ///
    /// # Errors
    ///
    /// * [`RegistrationError::ConflictingSignature`] if the group already has
    ///   a candidate with the same effective parameter types
    /// * [`RegistrationError::InvalidDescriptor`] for a non-trailing default
    pub fn register_function<F>(
        &mut self,
        signature: Signature,
        body: F,
    ) -> Result<usize, ContextError>
    where
        F: Fn(&mut CallContext<'_>) -> Result<(), NativeError> + Send + Sync + 'static,
    {
        let body = NativeFn::new(signature.hash(), body);
        self.register_native(signature, body)
    }

    /// Add a prebuilt native function. Returns its index within the group.
    pub fn register_native(
        &mut self,
        signature: Signature,
        body: NativeFn,
    ) -> Result<usize, ContextError> {
        self.builder()?;
        let name = signature.name.clone();
        if !self.functions.contains_key(&name) {
            self.order.push(name.clone());
        }
        let entry = self
            .functions
            .entry(name.clone())
            .or_insert_with(|| FunctionEntry {
                group: OverloadGroup::new(name.clone()),
                bodies: Vec::new(),
            });
        let index = entry.group.push(signature)?;
        entry.bodies.push(body);
        log::debug!("registered overload {index} of '{name}'");
        Ok(index)
    }

    /// Add a method to `class`.
    ///
    /// The method joins the group `Class::name`, with the receiver inserted
    /// as the first parameter: a const reference for
    /// [`const_method`](Signature::const_method) signatures, a mutable one
    /// otherwise.
    pub fn register_method<F>(
        &mut self,
        class: TypeHash,
        signature: Signature,
        body: F,
    ) -> Result<usize, ContextError>
    where
        F: Fn(&mut CallContext<'_>) -> Result<(), NativeError> + Send + Sync + 'static,
    {
        let class_name = {
            let builder = self.builder()?;
            let descriptor = builder.descriptor(class).ok_or_else(|| {
                RegistrationError::UnresolvedType { owner: signature.name.clone(), missing: class }
            })?;
            if descriptor.as_class().is_none() {
                return Err(RegistrationError::InvalidDescriptor {
                    name: descriptor.name.clone(),
                    reason: format!("methods need a class, '{}' is not one", descriptor.name),
                }
                .into());
            }
            descriptor.name.clone()
        };

        let method = signature.name.clone();
        let signature = as_method(&class_name, class, signature);
        let index = self.register_function(signature, body)?;
        let declared = self.methods.entry(class).or_default();
        if !declared.contains(&method) {
            declared.push(method);
        }
        Ok(index)
    }

    // =========================================================================
    // Seal
    // =========================================================================

    /// Validate everything and build the immutable [`Bridge`].
    ///
    /// Sealing again returns the same bridge.
    ///
    /// # Errors
    ///
    /// [`ContextError::RegistryBuildFailed`] with every unresolved reference
    /// and malformed descriptor found.
    #[cfg_attr(feature = "profiling", profiling::function)]
    pub fn seal(&mut self) -> Result<Arc<Bridge>, ContextError> {
        if let Some(bridge) = &self.sealed {
            return Ok(Arc::clone(bridge));
        }
        let builder = self.builder.take().unwrap_or_default();

        let unresolved = self.unresolved_signature_types(&builder);
        if !unresolved.is_empty() {
            self.builder = Some(builder);
            return Err(ContextError::RegistryBuildFailed(unresolved));
        }

        let registry = Arc::new(builder.build().map_err(ContextError::RegistryBuildFailed)?);
        let methods = self.method_tables(&registry);
        let functions = std::mem::take(&mut self.functions);

        log::debug!(
            "sealed context: {} types, {} function groups, {} classes with methods",
            registry.len(),
            functions.len(),
            methods.len()
        );
        let bridge = Arc::new(Bridge::new(self.config.clone(), registry, functions, methods));
        self.sealed = Some(Arc::clone(&bridge));
        Ok(bridge)
    }

    pub fn is_sealed(&self) -> bool {
        self.sealed.is_some()
    }

    /// The bridge, once sealed.
    pub fn bridge(&self) -> Option<&Arc<Bridge>> {
        self.sealed.as_ref()
    }

    fn unresolved_signature_types(&self, builder: &TypeRegistryBuilder) -> Vec<RegistrationError> {
        let mut errors = Vec::new();
        for name in &self.order {
            let Some(entry) = self.functions.get(name) else { continue };
            for signature in entry.group.candidates() {
                let referenced = signature.referenced_types().into_iter();
                for missing in referenced.filter(|ty| builder.descriptor(*ty).is_none()) {
                    let owner = signature.name.clone();
                    errors.push(RegistrationError::UnresolvedType { owner, missing });
                }
            }
        }
        errors
    }

    /// Method name to group for every class, walking the class and then its
    /// ancestors so the nearest definition wins.
    fn method_tables(&self, registry: &TypeConverterRegistry) -> FxHashMap<TypeHash, MethodTable> {
        let mut tables = FxHashMap::default();
        for &class in &self.classes {
            let Some(interfaces) = registry.interfaces(class) else { continue };
            let mut table = MethodTable::default();
            for owner in interfaces.lookup_order() {
                let (Some(declared), Some(descriptor)) =
                    (self.methods.get(&owner), registry.descriptor(owner))
                else {
                    continue;
                };
                for method in declared {
                    table
                        .entry(method.clone())
                        .or_insert_with(|| format!("{}::{}", descriptor.name, method));
                }
            }
            if !table.is_empty() {
                tables.insert(class, table);
            }
        }
        tables
    }
}

impl Default for Context {
    fn default() -> Self {
        Self::new()
    }
}

/// Prefix the receiver and rename into the class's method namespace.
fn as_method(class_name: &str, class: TypeHash, mut signature: Signature) -> Signature {
    let storage = if signature.const_method { StorageKind::ConstRef } else { StorageKind::MutRef };
    signature.name = format!("{class_name}::{}", signature.name);
    let receiver = ParamSpec { name: Some("self".to_string()), ..ParamSpec::new(class, storage) };
    signature.params.insert(0, receiver);
    signature
}

/// Errors that can occur while registering or sealing.
#[derive(Debug, Error)]
pub enum ContextError {
    /// The context is sealed; nothing more can be registered.
    #[error("context is already sealed - cannot register after seal()")]
    AlreadySealed,

    /// A single registration was rejected.
    #[error(transparent)]
    Registration(#[from] RegistrationError),

    /// Sealing found inconsistent registrations.
    #[error("failed to build the type registry: {0:?}")]
    RegistryBuildFailed(Vec<RegistrationError>),
}

impl ContextError {
    /// Every registration error carried by this error.
    pub fn errors(&self) -> Vec<&RegistrationError> {
        match self {
            ContextError::Registration(err) => vec![err],
            ContextError::RegistryBuildFailed(errors) => errors.iter().collect(),
            ContextError::AlreadySealed => Vec::new(),
        }
    }
}
