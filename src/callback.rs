//! Cross-boundary callback invocation.
//!
//! [`CallbackBridge`] is the [`CallbackInvoker`] handed to every native
//! [`CallContext`] and every [`DynamicCall`] the bridge creates. It carries
//! the current nesting depth, so a callback that calls back (and so on) is
//! converted independently at every crossing and stopped at the configured
//! depth.
//!
//! ## Crossing rules
//!
//! | Caller  | Target  | Arguments                  | Result             |
//! |---------|---------|----------------------------|--------------------|
//! | native  | dynamic | native to dynamic per param | dynamic to native  |
//! | dynamic | native  | dynamic to native per param | native to dynamic  |
//! | same    | same    | passed through             | passed through     |
//!
//! Every failure inside an invocation is wrapped exactly once in
//! [`BridgeError::CallbackInvocation`] naming the callback.

use std::sync::Arc;

use crossbind_core::{
    BridgeError, CallContext, CallbackHandle, CallbackInvoker, CallbackTarget, ConversionError,
    DynamicCall, DynamicValue, NativeFn, NativeValue, Signature,
};

use crate::bridge::Bridge;

/// Invoker bound to a bridge at one callback depth.
#[derive(Debug, Clone, Copy)]
pub struct CallbackBridge<'b> {
    bridge: &'b Bridge,
    depth: usize,
}

impl<'b> CallbackBridge<'b> {
    pub fn new(bridge: &'b Bridge) -> Self {
        Self::at_depth(bridge, 0)
    }

    pub(crate) fn at_depth(bridge: &'b Bridge, depth: usize) -> Self {
        Self { bridge, depth }
    }

    /// Number of callback invocations enclosing this one.
    pub fn depth(&self) -> usize {
        self.depth
    }

    fn enter(&self) -> Result<CallbackBridge<'b>, BridgeError> {
        let limit = self.bridge.config().max_callback_depth;
        if self.depth >= limit {
            return Err(BridgeError::RecursionLimit { limit });
        }
        Ok(Self::at_depth(self.bridge, self.depth + 1))
    }

    /// Run a native body with the boundary lock released.
    ///
    /// Arguments the body leaves behind are dropped before the lock is taken
    /// back.
    pub(crate) fn run_native(
        &self,
        body: &NativeFn,
        args: Vec<NativeValue>,
    ) -> Result<NativeValue, BridgeError> {
        self.bridge.lock().release_while(|| -> Result<NativeValue, BridgeError> {
            let mut ctx = CallContext::new(args, self);
            body.call(&mut ctx)?;
            Ok(ctx.take_return())
        })
    }

    fn native_to_target(
        &self,
        handle: &CallbackHandle,
        args: Vec<NativeValue>,
    ) -> Result<NativeValue, BridgeError> {
        let inner = self.enter()?;
        match handle.target() {
            CallbackTarget::Native(body) => inner.run_native(body, args),
            CallbackTarget::Dynamic(callable) => {
                let signature = require_signature(handle)?;
                self.bridge.lock().run_locked(|| -> Result<NativeValue, BridgeError> {
                    let args = self.bridge.args_to_dynamic(signature, args)?;
                    let result = callable.call(&mut DynamicCall::new(args, &inner))?;
                    self.bridge.return_to_native(signature, &result)
                })
            }
        }
    }

    fn dynamic_to_target(
        &self,
        handle: &CallbackHandle,
        args: Vec<DynamicValue>,
    ) -> Result<DynamicValue, BridgeError> {
        let inner = self.enter()?;
        let lock = self.bridge.lock();
        match handle.target() {
            CallbackTarget::Dynamic(callable) => {
                lock.run_locked(|| -> Result<DynamicValue, BridgeError> {
                    Ok(callable.call(&mut DynamicCall::new(args, &inner))?)
                })
            }
            CallbackTarget::Native(body) => {
                let signature = require_signature(handle)?;
                let native = lock.run_locked(|| {
                    self.bridge.args_to_native(handle.name(), signature, &args)
                })?;
                let ret = inner.run_native(body, native)?;
                lock.run_locked(|| self.bridge.return_to_dynamic(signature, ret))
            }
        }
    }
}

impl CallbackInvoker for CallbackBridge<'_> {
    #[cfg_attr(feature = "profiling", profiling::function)]
    fn invoke_from_native(
        &self,
        handle: &CallbackHandle,
        args: Vec<NativeValue>,
    ) -> Result<NativeValue, BridgeError> {
        log::debug!("callback '{}' from native side at depth {}", handle.name(), self.depth);
        self.native_to_target(handle, args)
            .map_err(|err| BridgeError::callback(handle.name(), err))
    }

    #[cfg_attr(feature = "profiling", profiling::function)]
    fn invoke_from_dynamic(
        &self,
        handle: &CallbackHandle,
        args: Vec<DynamicValue>,
    ) -> Result<DynamicValue, BridgeError> {
        log::debug!("callback '{}' from dynamic side at depth {}", handle.name(), self.depth);
        self.dynamic_to_target(handle, args)
            .map_err(|err| BridgeError::callback(handle.name(), err))
    }

    fn call_function(
        &self,
        name: &str,
        args: Vec<DynamicValue>,
    ) -> Result<DynamicValue, BridgeError> {
        self.bridge.call_at(self.depth, name, args)
    }
}

fn require_signature(handle: &CallbackHandle) -> Result<&Arc<Signature>, BridgeError> {
    handle.signature().ok_or_else(|| {
        BridgeError::conversion(
            handle.name(),
            ConversionError::failed("a callable crossing sides needs a signature"),
        )
    })
}
