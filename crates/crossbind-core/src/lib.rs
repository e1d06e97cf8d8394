//! Core vocabulary shared by every crossbind crate.
//!
//! This crate defines what crosses the boundary and how it is identified:
//!
//! - [`TypeHash`] and [`TypeDescriptor`]: immutable type identity
//! - [`DynamicValue`] and [`NativeValue`]: the two value models
//! - [`NativeObject`], [`UniqueObject`], [`SharedObject`]: native ownership
//! - [`WrapperHandle`]: dynamic-side wrappers around native objects
//! - [`Signature`], [`CallbackHandle`], [`NativeFn`]: callables
//! - [`BridgeError`] and the per-concern error enums

pub mod binder;
pub mod callable;
pub mod convert;
pub mod descriptor;
pub mod error;
pub mod object;
pub mod ownership;
pub mod primitive;
pub mod release;
pub mod signature;
pub mod type_hash;
pub mod value;
pub mod wrapper;

pub use binder::{DetachedBinder, ObjectBinder, holding_for};
pub use callable::{
    CallContext, CallbackHandle, CallbackId, CallbackInvoker, CallbackTarget, DynamicCall,
    DynamicCallable, NativeCallable, NativeFn,
};
pub use convert::{FromNative, IntoNative};
pub use descriptor::{ClassFlags, ClassInfo, CopyFn, FieldSpec, TypeDescriptor, TypeKind};
pub use error::{
    BridgeError, ConversionError, NativeError, OwnershipError, RaisedError, RegistrationError,
};
pub use object::{LifetimeToken, NativeObject, ObjectValue, SharedObject, UniqueObject};
pub use ownership::{Direction, OwnershipMode, OwnershipTransfer, StorageKind};
pub use primitive::{IntegerPolicy, PrimitiveKind};
pub use release::{DeferredRelease, defer_destruction, destroy_immediately};
pub use signature::{CandidateSignature, ParamSpec, ReturnSpec, Signature};
pub use type_hash::TypeHash;
pub use value::{DynamicValue, MapKey, NativeValue};
pub use wrapper::{AttrPolicy, Holding, ReleaseHook, WeakWrapper, WrapperHandle, WrapperId};
