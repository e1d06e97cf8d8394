//! Value conversion and ownership transfer across a native/dynamic boundary.
//!
//! The crate is layered:
//!
//! - [`crossbind_core`]: values, descriptors, ownership holders, errors
//! - [`crossbind_registry`]: the type converter registry
//! - [`crossbind_resolver`]: overload resolution
//! - this crate: registration ([`Context`]), the sealed runtime ([`Bridge`]),
//!   callback crossings, instance binding and the boundary lock
//!
//! Register types and functions on a [`Context`], seal it, and drive every
//! conversion and call through the resulting [`Bridge`].

pub mod bridge;
pub mod callback;
pub mod config;
pub mod context;
pub mod global;
pub mod instance;
pub mod lock;

pub use bridge::Bridge;
pub use callback::CallbackBridge;
pub use config::BridgeConfig;
pub use context::{Context, ContextError};
pub use instance::{BoundInstance, InstanceBinder};
pub use lock::{BoundaryGuard, BoundaryLock, BoundaryState};

pub use crossbind_core as core;
pub use crossbind_registry as registry;
pub use crossbind_resolver as resolver;

pub mod prelude {
    pub use crate::bridge::Bridge;
    pub use crate::callback::CallbackBridge;
    pub use crate::config::BridgeConfig;
    pub use crate::context::{Context, ContextError};
    pub use crate::global;
    pub use crate::instance::{BoundInstance, InstanceBinder};
    pub use crate::lock::{BoundaryLock, BoundaryState};
    pub use crossbind_core::{
        BridgeError, CallContext, CallbackHandle, CallbackInvoker, ClassFlags, ClassInfo,
        ConversionError, Direction, DynamicCall, DynamicValue, MapKey, NativeError, NativeFn,
        NativeObject, NativeValue, ObjectValue, OwnershipError, OwnershipMode, OwnershipTransfer,
        PrimitiveKind, RaisedError, RegistrationError, SharedObject, Signature, StorageKind,
        TypeDescriptor, TypeHash, UniqueObject, WrapperHandle,
    };
    pub use crossbind_resolver::{ResolvePolicy, TieBreak};
}
