//! Callables on both sides of the boundary.
//!
//! A [`CallbackHandle`] wraps either a dynamic callable or a [`NativeFn`],
//! together with the signature used to convert arguments and results every
//! time the call crosses sides. Invocation itself goes through a
//! [`CallbackInvoker`]; the contexts handed to callables carry one, so a
//! callable can call back across the boundary at any depth.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::TypeHash;
use crate::convert::{FromNative, IntoNative};
use crate::error::{BridgeError, NativeError, RaisedError};
use crate::signature::Signature;
use crate::value::{DynamicValue, NativeValue};

static NEXT_CALLBACK: AtomicU64 = AtomicU64::new(1);

/// Identity of one wrapped callable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CallbackId(pub u64);

impl CallbackId {
    fn next() -> Self {
        CallbackId(NEXT_CALLBACK.fetch_add(1, Ordering::Relaxed))
    }
}

// ============================================================================
// Native functions
// ============================================================================

/// Type-erased native function.
///
/// Wraps any [`NativeCallable`] so functions of different shapes can be
/// stored uniformly. Cloning shares the underlying callable.
#[derive(Clone)]
pub struct NativeFn {
    pub id: TypeHash,
    inner: Arc<dyn NativeCallable + Send + Sync>,
}

impl NativeFn {
    pub fn new<F>(id: TypeHash, f: F) -> Self
    where
        F: Fn(&mut CallContext<'_>) -> Result<(), NativeError> + Send + Sync + 'static,
    {
        Self { id, inner: Arc::new(f) }
    }

    /// Wrap a callable type that is not a closure.
    pub fn from_callable<C>(id: TypeHash, callable: C) -> Self
    where
        C: NativeCallable + Send + Sync + 'static,
    {
        Self { id, inner: Arc::new(callable) }
    }

    pub fn call(&self, ctx: &mut CallContext<'_>) -> Result<(), NativeError> {
        self.inner.call(ctx)
    }
}

impl fmt::Debug for NativeFn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NativeFn").field("id", &self.id).finish_non_exhaustive()
    }
}

/// A native function body.
pub trait NativeCallable {
    fn call(&self, ctx: &mut CallContext<'_>) -> Result<(), NativeError>;
}

impl<F> NativeCallable for F
where
    F: Fn(&mut CallContext<'_>) -> Result<(), NativeError>,
{
    fn call(&self, ctx: &mut CallContext<'_>) -> Result<(), NativeError> {
        (self)(ctx)
    }
}

// ============================================================================
// Dynamic callables
// ============================================================================

/// A callable living on the dynamic side.
pub trait DynamicCallable: Send + Sync {
    fn call(&self, call: &mut DynamicCall<'_>) -> Result<DynamicValue, RaisedError>;
}

impl<F> DynamicCallable for F
where
    F: Fn(&mut DynamicCall<'_>) -> Result<DynamicValue, RaisedError> + Send + Sync,
{
    fn call(&self, call: &mut DynamicCall<'_>) -> Result<DynamicValue, RaisedError> {
        (self)(call)
    }
}

// ============================================================================
// Handles
// ============================================================================

/// Which side a wrapped callable lives on.
#[derive(Clone)]
pub enum CallbackTarget {
    Dynamic(Arc<dyn DynamicCallable>),
    Native(NativeFn),
}

struct HandleInner {
    id: CallbackId,
    name: String,
    target: CallbackTarget,
    signature: Option<Arc<Signature>>,
}

/// A callable captured for cross-boundary invocation.
///
/// Stays valid for as long as any clone is held.
#[derive(Clone)]
pub struct CallbackHandle(Arc<HandleInner>);

impl CallbackHandle {
    pub fn dynamic<F>(name: impl Into<String>, f: F) -> Self
    where
        F: Fn(&mut DynamicCall<'_>) -> Result<DynamicValue, RaisedError> + Send + Sync + 'static,
    {
        Self::from_target(name, CallbackTarget::Dynamic(Arc::new(f)), None)
    }

    pub fn native(name: impl Into<String>, f: NativeFn) -> Self {
        Self::from_target(name, CallbackTarget::Native(f), None)
    }

    pub fn from_target(
        name: impl Into<String>,
        target: CallbackTarget,
        signature: Option<Arc<Signature>>,
    ) -> Self {
        CallbackHandle(Arc::new(HandleInner {
            id: CallbackId::next(),
            name: name.into(),
            target,
            signature,
        }))
    }

    /// A new handle over the same callable, typed by `signature`.
    pub fn with_signature(&self, signature: Arc<Signature>) -> Self {
        Self::from_target(self.0.name.clone(), self.0.target.clone(), Some(signature))
    }

    pub fn id(&self) -> CallbackId {
        self.0.id
    }

    pub fn name(&self) -> &str {
        &self.0.name
    }

    pub fn target(&self) -> &CallbackTarget {
        &self.0.target
    }

    pub fn signature(&self) -> Option<&Arc<Signature>> {
        self.0.signature.as_ref()
    }

    pub fn is_dynamic(&self) -> bool {
        matches!(self.0.target, CallbackTarget::Dynamic(_))
    }
}

impl PartialEq for CallbackHandle {
    fn eq(&self, other: &Self) -> bool {
        self.0.id == other.0.id
    }
}

impl fmt::Debug for CallbackHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CallbackHandle")
            .field("id", &self.0.id)
            .field("name", &self.0.name)
            .field("dynamic", &self.is_dynamic())
            .field("signature", &self.0.signature.as_ref().map(|s| s.to_string()))
            .finish()
    }
}

/// Performs calls that may cross the boundary.
pub trait CallbackInvoker: Send + Sync {
    /// Invoke `handle` with native arguments, returning a native result.
    fn invoke_from_native(
        &self,
        handle: &CallbackHandle,
        args: Vec<NativeValue>,
    ) -> Result<NativeValue, BridgeError>;

    /// Invoke `handle` with dynamic arguments, returning a dynamic result.
    fn invoke_from_dynamic(&self, handle: &CallbackHandle, args: Vec<DynamicValue>)
    -> Result<DynamicValue, BridgeError>;

    /// Call a registered native function by name from the dynamic side.
    fn call_function(
        &self,
        name: &str,
        args: Vec<DynamicValue>,
    ) -> Result<DynamicValue, BridgeError>;
}

// ============================================================================
// Call contexts
// ============================================================================

/// Arguments and return slot of one native call.
pub struct CallContext<'a> {
    args: Vec<NativeValue>,
    ret: NativeValue,
    invoker: &'a dyn CallbackInvoker,
}

impl<'a> CallContext<'a> {
    pub fn new(args: Vec<NativeValue>, invoker: &'a dyn CallbackInvoker) -> Self {
        Self { args, ret: NativeValue::Void, invoker }
    }

    pub fn arg_count(&self) -> usize {
        self.args.len()
    }

    pub fn arg(&self, index: usize) -> Result<&NativeValue, NativeError> {
        let count = self.args.len();
        self.args
            .get(index)
            .ok_or(NativeError::ArgumentIndexOutOfBounds { index, count })
    }

    /// Take ownership of an argument, leaving `Absent` in its place.
    pub fn take_arg(&mut self, index: usize) -> Result<NativeValue, NativeError> {
        let count = self.args.len();
        let slot = self
            .args
            .get_mut(index)
            .ok_or(NativeError::ArgumentIndexOutOfBounds { index, count })?;
        Ok(std::mem::replace(slot, NativeValue::Absent))
    }

    /// Extract an argument as a Rust value.
    pub fn arg_as<T: FromNative>(&self, index: usize) -> Result<T, NativeError> {
        Ok(T::from_native(self.arg(index)?)?)
    }

    pub fn set_return(&mut self, value: NativeValue) {
        self.ret = value;
    }

    pub fn set_return_value<T: IntoNative>(&mut self, value: T) {
        self.ret = value.into_native();
    }

    pub fn take_return(&mut self) -> NativeValue {
        std::mem::take(&mut self.ret)
    }

    pub fn invoker(&self) -> &'a dyn CallbackInvoker {
        self.invoker
    }

    /// Invoke a callback from inside this native call.
    pub fn invoke(
        &self,
        handle: &CallbackHandle,
        args: Vec<NativeValue>,
    ) -> Result<NativeValue, BridgeError> {
        self.invoker.invoke_from_native(handle, args)
    }
}

/// Arguments of one dynamic-side call.
pub struct DynamicCall<'a> {
    args: Vec<DynamicValue>,
    invoker: &'a dyn CallbackInvoker,
}

impl<'a> DynamicCall<'a> {
    pub fn new(args: Vec<DynamicValue>, invoker: &'a dyn CallbackInvoker) -> Self {
        Self { args, invoker }
    }

    pub fn args(&self) -> &[DynamicValue] {
        &self.args
    }

    /// Argument at `index`, or a raised `IndexError`.
    pub fn arg(&self, index: usize) -> Result<&DynamicValue, RaisedError> {
        self.args.get(index).ok_or_else(|| {
            let message = format!("argument {index} missing, got {}", self.args.len());
            RaisedError::new("IndexError", message)
        })
    }

    pub fn invoker(&self) -> &'a dyn CallbackInvoker {
        self.invoker
    }

    /// Invoke a callback from inside this dynamic call.
    pub fn invoke(
        &self,
        handle: &CallbackHandle,
        args: Vec<DynamicValue>,
    ) -> Result<DynamicValue, BridgeError> {
        self.invoker.invoke_from_dynamic(handle, args)
    }

    /// Call a registered native function from inside this dynamic call.
    pub fn call(&self, name: &str, args: Vec<DynamicValue>) -> Result<DynamicValue, BridgeError> {
        self.invoker.call_function(name, args)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Invoker that runs targets directly without conversion.
    struct Passthrough;

    impl CallbackInvoker for Passthrough {
        fn invoke_from_native(
            &self,
            handle: &CallbackHandle,
            args: Vec<NativeValue>,
        ) -> Result<NativeValue, BridgeError> {
            match handle.target() {
                CallbackTarget::Native(f) => {
                    let mut ctx = CallContext::new(args, self);
                    f.call(&mut ctx).map_err(BridgeError::from)?;
                    Ok(ctx.take_return())
                }
                CallbackTarget::Dynamic(_) => Err(BridgeError::NotInitialized),
            }
        }

        fn invoke_from_dynamic(
            &self,
            handle: &CallbackHandle,
            args: Vec<DynamicValue>,
        ) -> Result<DynamicValue, BridgeError> {
            match handle.target() {
                CallbackTarget::Dynamic(f) => Ok(f.call(&mut DynamicCall::new(args, self))?),
                CallbackTarget::Native(_) => Err(BridgeError::NotInitialized),
            }
        }

        fn call_function(
            &self,
            name: &str,
            _args: Vec<DynamicValue>,
        ) -> Result<DynamicValue, BridgeError> {
            Err(BridgeError::UnknownFunction { name: name.to_string() })
        }
    }

    #[test]
    fn native_fn_reads_args_and_sets_return() {
        let f = NativeFn::new(TypeHash::from_name("add"), |ctx: &mut CallContext<'_>| {
            let a: i32 = ctx.arg_as(0)?;
            let b: i32 = ctx.arg_as(1)?;
            ctx.set_return_value(a + b);
            Ok(())
        });
        let handle = CallbackHandle::native("add", f);
        let result = Passthrough
            .invoke_from_native(&handle, vec![NativeValue::I32(2), NativeValue::I32(3)])
            .unwrap();
        assert_eq!(result, NativeValue::I32(5));
    }

    #[test]
    fn missing_argument_is_reported() {
        let ctx = CallContext::new(vec![], &Passthrough);
        let err = ctx.arg(2).unwrap_err();
        assert!(matches!(err, NativeError::ArgumentIndexOutOfBounds { index: 2, count: 0 }));
    }

    #[test]
    fn take_arg_leaves_absent() {
        let mut ctx = CallContext::new(vec![NativeValue::Text("x".into())], &Passthrough);
        assert_eq!(ctx.take_arg(0).unwrap(), NativeValue::Text("x".into()));
        assert_eq!(ctx.arg(0).unwrap(), &NativeValue::Absent);
    }

    #[test]
    fn dynamic_callable_receives_args() {
        let handle =
            CallbackHandle::dynamic("echo", |call: &mut DynamicCall<'_>| Ok(call.arg(0)?.clone()));
        let result = Passthrough
            .invoke_from_dynamic(&handle, vec![DynamicValue::from("hi")])
            .unwrap();
        assert_eq!(result, DynamicValue::from("hi"));
    }

    #[test]
    fn missing_dynamic_arg_raises_index_error() {
        let handle =
            CallbackHandle::dynamic("first", |call: &mut DynamicCall<'_>| Ok(call.arg(0)?.clone()));
        let err = Passthrough.invoke_from_dynamic(&handle, vec![]).unwrap_err();
        assert!(err.to_string().contains("IndexError"));
    }

    #[test]
    fn handle_identity() {
        let a = CallbackHandle::dynamic("f", |_: &mut DynamicCall<'_>| Ok(DynamicValue::None));
        let b = a.clone();
        let c = a.with_signature(Arc::new(Signature::new("f")));
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(c.name(), "f");
        assert!(c.signature().is_some());
        assert!(c.is_dynamic());
    }
}
