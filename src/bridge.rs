//! The sealed runtime: every entry point generated glue code calls.
//!
//! A [`Bridge`] is produced by [`Context::seal`](crate::Context::seal) and is
//! immutable afterwards. All of its methods take `&self`; mutable state lives
//! in the [`InstanceBinder`] and the [`BoundaryLock`], both of which guard
//! themselves.

use std::fmt;
use std::sync::Arc;

use crossbind_core::{
    BridgeError, CallbackHandle, CallbackInvoker, CallbackTarget, ConversionError, Direction,
    DynamicCall, DynamicValue, NativeFn, NativeValue, ObjectValue, OwnershipMode, RaisedError,
    Signature, StorageKind, TypeHash, WrapperHandle,
};
use crossbind_registry::TypeConverterRegistry;
use crossbind_resolver::{OverloadGroup, OverloadResolver, Resolution};
use rustc_hash::FxHashMap;

use crate::callback::CallbackBridge;
use crate::config::BridgeConfig;
use crate::instance::{BoundInstance, InstanceBinder};
use crate::lock::BoundaryLock;

/// One overload group with a native body per candidate.
pub(crate) struct FunctionEntry {
    pub(crate) group: OverloadGroup,
    pub(crate) bodies: Vec<NativeFn>,
}

/// Method name to overload group name, per class.
pub(crate) type MethodTable = FxHashMap<String, String>;

/// Sealed conversion, resolution and invocation runtime.
pub struct Bridge {
    config: BridgeConfig,
    registry: Arc<TypeConverterRegistry>,
    resolver: OverloadResolver,
    functions: FxHashMap<String, FunctionEntry>,
    methods: FxHashMap<TypeHash, MethodTable>,
    binder: InstanceBinder,
    lock: Arc<BoundaryLock>,
}

impl fmt::Debug for Bridge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Bridge")
            .field("registry", &self.registry)
            .field("functions", &self.functions.len())
            .field("classes_with_methods", &self.methods.len())
            .field("binder", &self.binder)
            .finish()
    }
}

impl Bridge {
    pub(crate) fn new(
        config: BridgeConfig,
        registry: Arc<TypeConverterRegistry>,
        functions: FxHashMap<String, FunctionEntry>,
        methods: FxHashMap<TypeHash, MethodTable>,
    ) -> Self {
        let lock = Arc::new(BoundaryLock::new());
        Self {
            resolver: OverloadResolver::new(Arc::clone(&registry), config.resolve),
            binder: InstanceBinder::new(Arc::clone(&lock)),
            config,
            registry,
            functions,
            methods,
            lock,
        }
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }

    pub fn registry(&self) -> &Arc<TypeConverterRegistry> {
        &self.registry
    }

    pub fn resolver(&self) -> &OverloadResolver {
        &self.resolver
    }

    pub fn binder(&self) -> &InstanceBinder {
        &self.binder
    }

    pub fn lock(&self) -> &BoundaryLock {
        &self.lock
    }

    /// The overload group registered under `name`.
    pub fn group(&self, name: &str) -> Option<&OverloadGroup> {
        self.functions.get(name).map(|entry| &entry.group)
    }

    /// Registered function and method group names, sorted.
    pub fn function_names(&self) -> Vec<&str> {
        let mut names: Vec<_> = self.functions.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// The group a method call on an instance of `class` resolves to.
    pub fn method_group(&self, class: TypeHash, method: &str) -> Option<&str> {
        self.methods.get(&class)?.get(method).map(String::as_str)
    }

    // =========================================================================
    // Value conversion
    // =========================================================================

    /// Convert a dynamic value for native code holding it as `storage`.
    ///
    /// Objects keep their wrapper identity; a move detaches the wrapper.
    pub fn to_native(
        &self,
        value: &DynamicValue,
        ty: TypeHash,
        storage: StorageKind,
    ) -> Result<NativeValue, BridgeError> {
        let mode = self.plan(ty, Direction::ToNative, storage)?;
        self.lock.run_locked(|| self.registry.convert_to_native_with(value, ty, mode, &self.binder))
    }

    /// Convert a native value handed over as `storage` to the dynamic side.
    ///
    /// An object that already has a live wrapper gets that wrapper back.
    pub fn from_native(
        &self,
        value: NativeValue,
        ty: TypeHash,
        storage: StorageKind,
    ) -> Result<DynamicValue, BridgeError> {
        let mode = self.plan(ty, Direction::ToDynamic, storage)?;
        self.lock
            .run_locked(|| self.registry.convert_to_dynamic_with(value, ty, mode, &self.binder))
    }

    fn plan(
        &self,
        ty: TypeHash,
        direction: Direction,
        storage: StorageKind,
    ) -> Result<OwnershipMode, BridgeError> {
        self.registry.plan(ty, direction, storage).ok_or(BridgeError::UnknownType { hash: ty })
    }

    // =========================================================================
    // Calls
    // =========================================================================

    /// Call the overload group `name` with dynamic arguments.
    ///
    /// # Errors
    ///
    /// * [`BridgeError::UnknownFunction`] if nothing is registered as `name`
    /// * [`BridgeError::NoViableOverload`] / [`BridgeError::AmbiguousOverload`]
    /// * [`BridgeError::Native`] if the chosen body fails
    #[cfg_attr(feature = "profiling", profiling::function)]
    pub fn call(&self, name: &str, args: Vec<DynamicValue>) -> Result<DynamicValue, BridgeError> {
        self.call_at(0, name, args)
    }

    pub(crate) fn call_at(
        &self,
        depth: usize,
        name: &str,
        args: Vec<DynamicValue>,
    ) -> Result<DynamicValue, BridgeError> {
        let entry = self.function(name)?;
        let resolution =
            self.lock.run_locked(|| self.resolver.resolve(&entry.group, &args, &self.binder))?;
        let Resolution { index, args: native, .. } = resolution;
        let (signature, body) = match (entry.group.get(index), entry.bodies.get(index)) {
            (Some(signature), Some(body)) => (signature, body),
            _ => return Err(BridgeError::UnknownFunction { name: name.to_string() }),
        };

        log::debug!("calling {}", self.resolver.describe(signature));
        let ret = CallbackBridge::at_depth(self, depth).run_native(body, native)?;
        self.lock.run_locked(|| self.return_to_dynamic(signature, ret))
    }

    /// Call method `name` on `receiver`.
    ///
    /// Methods are looked up on the receiver's class first, then along its
    /// ancestors nearest first, so an override shadows its base.
    pub fn call_method(
        &self,
        receiver: &WrapperHandle,
        name: &str,
        args: Vec<DynamicValue>,
    ) -> Result<DynamicValue, BridgeError> {
        let group = self.method_group(receiver.class(), name).ok_or_else(|| {
            BridgeError::UnknownFunction { name: format!("{}::{}", receiver.class_name(), name) }
        })?;
        let mut full = Vec::with_capacity(args.len() + 1);
        full.push(DynamicValue::Object(receiver.clone()));
        full.extend(args);
        self.call_at(0, group, full)
    }

    /// Resolve a call to `name` and convert its arguments without running it.
    pub fn resolve(&self, name: &str, args: &[DynamicValue]) -> Result<Resolution, BridgeError> {
        let entry = self.function(name)?;
        self.lock.run_locked(|| self.resolver.resolve(&entry.group, args, &self.binder))
        }

        fn function(&self, name: &str) -> Result<&FunctionEntry, BridgeError> {
            self.functions
                .get(name)
                .ok_or_else(|| BridgeError::UnknownFunction { name: name.to_string() })
        }

    /// Invoke a callback from the dynamic side.
    pub fn invoke(
        &self,
        handle: &CallbackHandle,
        args: Vec<DynamicValue>,
    ) -> Result<DynamicValue, BridgeError> {
        CallbackBridge::new(self).invoke_from_dynamic(handle, args)
    }

    /// Invoke a callback from native code.
    pub fn invoke_native(
        &self,
        handle: &CallbackHandle,
        args: Vec<NativeValue>,
    ) -> Result<NativeValue, BridgeError> {
        CallbackBridge::new(self).invoke_from_native(handle, args)
    }

    // =========================================================================
    // Callables
    // =========================================================================

    /// Wrap a dynamic callable so native code can call it as `signature`.
    pub fn wrap_dynamic_callable<F>(
        &self,
        name: impl Into<String>,
        signature: Signature,
        callable: F,
    ) -> Result<CallbackHandle, BridgeError>
    where
        F: Fn(&mut DynamicCall<'_>) -> Result<DynamicValue, RaisedError> + Send + Sync + 'static,
    {
        self.check_signature(&signature)?;
        let target = CallbackTarget::Dynamic(Arc::new(callable));
        Ok(CallbackHandle::from_target(name, target, Some(Arc::new(signature))))
    }

    /// Wrap a native function so dynamic code can call it as `signature`.
    pub fn wrap_native_function(
        &self,
        body: NativeFn,
        signature: Signature,
    ) -> Result<CallbackHandle, BridgeError> {
        self.check_signature(&signature)?;
        let name = signature.name.clone();
        let target = CallbackTarget::Native(body);
        Ok(CallbackHandle::from_target(name, target, Some(Arc::new(signature))))
    }

    fn check_signature(&self, signature: &Signature) -> Result<(), BridgeError> {
        match signature.referenced_types().into_iter().find(|ty| !self.registry.contains(*ty)) {
            Some(hash) => Err(BridgeError::UnknownType { hash }),
            None => Ok(()),
        }
    }

    // =========================================================================
    // Instances
    // =========================================================================

    /// Bind a native object of class `class` to a new dynamic wrapper.
    pub fn bind(
        &self,
        object: ObjectValue,
        mode: OwnershipMode,
        class: TypeHash,
    ) -> Result<BoundInstance, BridgeError> {
        let descriptor =
            self.registry.descriptor(class).ok_or(BridgeError::UnknownType { hash: class })?;
        self.binder.bind(object, mode, descriptor)
    }

    pub fn unbind(&self, instance: &BoundInstance) {
        self.binder.unbind(instance);
    }

    // =========================================================================
    // Signature-driven conversion
    // =========================================================================

    /// Native arguments of a call into dynamic code, defaults filled in.
    pub(crate) fn args_to_dynamic(
        &self,
        signature: &Signature,
        args: Vec<NativeValue>,
    ) -> Result<Vec<DynamicValue>, BridgeError> {
        if args.len() > signature.params.len() {
            return Err(BridgeError::conversion(
                signature.name.clone(),
                ConversionError::failed(format!(
                    "expected at most {} arguments, got {}",
                    signature.params.len(),
                    args.len()
                )),
            ));
        }
        let mut supplied = args.into_iter();
        let mut out = Vec::with_capacity(signature.params.len());
        for (position, param) in signature.params.iter().enumerate() {
            let value = match supplied.next() {
                Some(value) => value,
                None => param.default.as_ref().and_then(NativeValue::try_clone).ok_or_else(|| {
                    BridgeError::conversion(
                        signature.name.clone(),
                        ConversionError::failed(format!("argument {position} is required")),
                    )
                })?,
            };
            let mode = self.plan(param.ty, Direction::ToDynamic, param.storage)?;
            log::trace!("argument {position} of {} to dynamic as {}", signature.name, mode.name());
            out.push(self.registry.convert_to_dynamic_with(value, param.ty, mode, &self.binder)?);
        }
        Ok(out)
    }

    /// Dynamic arguments of a call into native code.
    pub(crate) fn args_to_native(
        &self,
        name: &str,
        signature: &Signature,
        args: &[DynamicValue],
    ) -> Result<Vec<NativeValue>, BridgeError> {
        if !signature.accepts_arity(args.len()) {
            return Err(BridgeError::NoViableOverload {
                name: name.to_string(),
                args: DynamicValue::describe_args(args),
            });
        }
        self.resolver.materialize(signature, args, &self.binder)
    }

    pub(crate) fn return_to_native(
        &self,
        signature: &Signature,
        value: &DynamicValue,
    ) -> Result<NativeValue, BridgeError> {
        let mode = self.plan(signature.ret.ty, Direction::ToNative, signature.ret.storage)?;
        self.registry.convert_to_native_with(value, signature.ret.ty, mode, &self.binder)
    }

    pub(crate) fn return_to_dynamic(
        &self,
        signature: &Signature,
        value: NativeValue,
    ) -> Result<DynamicValue, BridgeError> {
        let mode = self.plan(signature.ret.ty, Direction::ToDynamic, signature.ret.storage)?;
        self.registry.convert_to_dynamic_with(value, signature.ret.ty, mode, &self.binder)
    }
}
