//! Error types for the boundary layer.
//!
//! Errors are split by concern, mirroring where they originate:
//!
//! - [`ConversionError`]: a value's runtime shape does not fit a descriptor
//! - [`OwnershipError`]: an ownership rule was violated at runtime
//! - [`RegistrationError`]: descriptors or signatures are inconsistent
//! - [`NativeError`]: a native function body failed
//! - [`RaisedError`]: a dynamic callable raised
//!
//! [`BridgeError`] unifies them for callers of the runtime entry points.

use thiserror::Error;

use crate::TypeHash;
use crate::object::LifetimeToken;

// ============================================================================
// Conversion Errors
// ============================================================================

/// A value could not be converted to or from its descriptor.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConversionError {
    /// The value has the wrong runtime shape.
    #[error("type mismatch: expected {expected}, got {actual}")]
    TypeMismatch { expected: String, actual: &'static str },

    /// An integer does not fit the target type.
    #[error("integer overflow: value {value} does not fit in {target_type}")]
    IntegerOverflow { value: i128, target_type: &'static str },

    /// A float is outside the target's finite range.
    #[error("float conversion error: value {value} cannot be represented as {target_type}")]
    FloatConversion { value: f64, target_type: &'static str },

    /// An integer has no exact representation in the float target.
    #[error("integer {value} cannot be represented exactly as {target_type}")]
    InexactFloat { value: i128, target_type: &'static str },

    /// Byte data is not valid UTF-8.
    #[error("invalid UTF-8 string data")]
    InvalidUtf8,

    /// `None` was passed where a value is held by copy.
    #[error("None cannot be converted to {target_type} held by value")]
    NullValue { target_type: String },

    /// A record field is missing from the mapping.
    #[error("record '{record}' is missing field '{field}'")]
    MissingField { record: String, field: String },

    /// A mapping has a key the record does not declare.
    #[error("record '{record}' has no field '{field}'")]
    UnexpectedField { record: String, field: String },

    /// The class cannot be copied into a by-value parameter.
    #[error("class '{class}' is not copyable")]
    NotCopyable { class: String },

    /// The value is an instance of an unrelated class.
    #[error("object of class {actual} is not a '{expected}'")]
    ClassMismatch { expected: String, actual: TypeHash },

    /// An ownership rule prevented the conversion.
    #[error(transparent)]
    Ownership(#[from] OwnershipError),

    /// Generic conversion failure.
    #[error("conversion failed: {message}")]
    Failed { message: String },
}

impl ConversionError {
    pub fn mismatch(expected: impl Into<String>, actual: &'static str) -> Self {
        ConversionError::TypeMismatch { expected: expected.into(), actual }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        ConversionError::Failed { message: message.into() }
    }
}

// ============================================================================
// Ownership Errors
// ============================================================================

/// A runtime ownership rule was violated.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OwnershipError {
    /// The holder's value was moved out.
    #[error("holder is empty: its value was moved to a new owner")]
    Empty,

    /// The object has already been destroyed.
    #[error("object {token} has been destroyed")]
    Destroyed { token: LifetimeToken },

    /// Mutation was attempted through a const view.
    #[error("cannot mutate through a const reference")]
    ConstViolation,

    /// A move was requested from a holder that does not own its object.
    #[error("holder does not own its object and cannot move it")]
    NotOwned,

    /// Shared ownership was requested from a holder that is not shared.
    #[error("holder is not a shared owner")]
    NotShared,

    /// The payload is not of the requested Rust type.
    #[error("object payload is not a {expected}")]
    TypeMismatch { expected: &'static str },

    /// The object is already bound to a live wrapper under exclusive ownership.
    #[error("object {token} is already bound to a wrapper")]
    AlreadyBound { token: LifetimeToken },

    /// One call would move the same wrapper's object through two arguments.
    #[error("object {token} is moved by more than one argument")]
    MovedTwice { token: LifetimeToken },
}

// ============================================================================
// Registration Errors
// ============================================================================

/// Descriptors or signatures are inconsistent.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RegistrationError {
    /// A different definition is already registered under this type.
    #[error("type '{name}' is already registered with a different definition")]
    DuplicateType { name: String },

    /// Two overloads have identical effective parameter types.
    #[error("overload '{signature}' conflicts with '{existing}' in group '{group}'")]
    ConflictingSignature {
        group: String,
        signature: String,
        existing: String,
    },

    /// A descriptor or signature refers to an unregistered type.
    #[error("'{owner}' refers to unregistered type {missing}")]
    UnresolvedType { owner: String, missing: TypeHash },

    /// The descriptor is malformed.
    #[error("invalid descriptor '{name}': {reason}")]
    InvalidDescriptor { name: String, reason: String },
}

// ============================================================================
// Native Errors
// ============================================================================

/// Errors raised by native function bodies.
#[derive(Debug, Error)]
pub enum NativeError {
    /// Error converting arguments or return values.
    #[error("conversion error: {0}")]
    Conversion(#[from] ConversionError),

    /// An ownership rule was violated inside the body.
    #[error("ownership error: {0}")]
    Ownership(#[from] OwnershipError),

    /// Argument index out of bounds.
    #[error("argument index {index} out of bounds (function has {count} arguments)")]
    ArgumentIndexOutOfBounds { index: usize, count: usize },

    /// A nested boundary call failed and is being propagated.
    #[error(transparent)]
    Bridge(Box<BridgeError>),

    /// Generic native error.
    #[error("native error: {message}")]
    Other { message: String },
}

impl NativeError {
    pub fn other(message: impl Into<String>) -> Self {
        NativeError::Other { message: message.into() }
    }
}

impl From<BridgeError> for NativeError {
    fn from(err: BridgeError) -> Self {
        NativeError::Bridge(Box::new(err))
    }
}

// ============================================================================
// Raised Errors
// ============================================================================

/// A failure raised on the dynamic side.
#[derive(Debug, Error)]
pub enum RaisedError {
    /// An exception raised by dynamic code.
    #[error("{kind}: {message}")]
    Raised { kind: String, message: String },

    /// A nested boundary call failed and is being propagated.
    #[error(transparent)]
    Propagated(Box<BridgeError>),
}

impl RaisedError {
    pub fn new(kind: impl Into<String>, message: impl Into<String>) -> Self {
        RaisedError::Raised { kind: kind.into(), message: message.into() }
    }
}

impl From<BridgeError> for RaisedError {
    fn from(err: BridgeError) -> Self {
        RaisedError::Propagated(Box::new(err))
    }
}

// ============================================================================
// Unified Error
// ============================================================================

/// Any failure surfaced by the boundary layer.
#[derive(Debug, Error)]
pub enum BridgeError {
    /// No converter is registered for the type.
    #[error("unknown type {hash}")]
    UnknownType { hash: TypeHash },

    /// Registration failed.
    #[error(transparent)]
    Registration(#[from] RegistrationError),

    /// A value did not fit its target type.
    #[error("cannot convert to '{target}': {reason}")]
    Conversion {
        target: String,
        #[source]
        reason: ConversionError,
    },

    /// No overload accepts the arguments.
    #[error("no viable overload of '{name}' for arguments {args}")]
    NoViableOverload { name: String, args: String },

    /// Several overloads match equally well.
    #[error("ambiguous call to '{name}': {candidates}")]
    AmbiguousOverload { name: String, candidates: String },

    /// No function is registered under this name.
    #[error("unknown function '{name}'")]
    UnknownFunction { name: String },

    /// A wrapped callable failed. One layer per boundary crossing.
    #[error("callback '{callback}' failed: {cause}")]
    CallbackInvocation { callback: String, cause: Box<BridgeError> },

    /// The object is already bound under exclusive ownership.
    #[error("object {token} is already bound to a wrapper")]
    DoubleBinding { token: LifetimeToken },

    /// An ownership rule was violated.
    #[error(transparent)]
    Ownership(#[from] OwnershipError),

    /// The wrapper's class does not accept this attribute.
    #[error("'{class}' object has no attribute '{name}'")]
    UnknownAttribute { class: String, name: String },

    /// A native function body failed.
    #[error(transparent)]
    Native(NativeError),

    /// A dynamic callable raised.
    #[error(transparent)]
    Raised(RaisedError),

    /// Callbacks nested deeper than the configured limit.
    #[error("callback recursion limit of {limit} exceeded")]
    RecursionLimit { limit: usize },

    /// No bridge has been installed.
    #[error("bridge is not initialized")]
    NotInitialized,
}

impl BridgeError {
    pub fn conversion(target: impl Into<String>, reason: ConversionError) -> Self {
        BridgeError::Conversion { target: target.into(), reason }
    }

    /// Wrap `cause` as the failure of one callback crossing.
    pub fn callback(callback: impl Into<String>, cause: BridgeError) -> Self {
        BridgeError::CallbackInvocation { callback: callback.into(), cause: Box::new(cause) }
    }

    /// The original failure underneath every callback layer.
    pub fn root_cause(&self) -> &BridgeError {
        let mut current = self;
        while let BridgeError::CallbackInvocation { cause, .. } = current {
            current = cause;
        }
        current
    }

    /// Number of callback crossings the error passed through.
    pub fn crossings(&self) -> usize {
        let mut count = 0;
        let mut current = self;
        while let BridgeError::CallbackInvocation { cause, .. } = current {
            count += 1;
            current = cause;
        }
        count
    }

    pub fn is_conversion(&self) -> bool {
        matches!(self, BridgeError::Conversion { .. })
    }

    pub fn is_overload(&self) -> bool {
        matches!(self, BridgeError::NoViableOverload { .. } | BridgeError::AmbiguousOverload { .. })
    }

    pub fn is_callback(&self) -> bool {
        matches!(self, BridgeError::CallbackInvocation { .. })
    }
}

impl From<NativeError> for BridgeError {
    /// Propagated boundary errors are unwrapped so they are not wrapped twice.
    fn from(err: NativeError) -> Self {
        match err {
            NativeError::Bridge(inner) => *inner,
            other => BridgeError::Native(other),
        }
    }
}

impl From<RaisedError> for BridgeError {
    fn from(err: RaisedError) -> Self {
        match err {
            RaisedError::Propagated(inner) => *inner,
            other => BridgeError::Raised(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn conversion_error_integer_overflow() {
        let err = ConversionError::IntegerOverflow { value: 256, target_type: "int8" };
        assert!(err.to_string().contains("integer overflow"));
        assert!(err.to_string().contains("256"));
        assert!(err.to_string().contains("int8"));
    }

    #[test]
    fn conversion_error_type_mismatch() {
        let err = ConversionError::mismatch("list<int32>", "str");
        assert_eq!(err.to_string(), "type mismatch: expected list<int32>, got str");
    }

    #[test]
    fn conversion_error_from_ownership() {
        let err: ConversionError = OwnershipError::Empty.into();
        assert!(matches!(err, ConversionError::Ownership(OwnershipError::Empty)));
        assert!(err.to_string().contains("empty"));
    }

    #[test]
    fn registration_error_duplicate() {
        let err = RegistrationError::DuplicateType { name: "Widget".into() };
        assert!(err.to_string().contains("Widget"));
    }

    #[test]
    fn bridge_error_from_registration() {
        let err: BridgeError = RegistrationError::DuplicateType { name: "Widget".into() }.into();
        assert!(matches!(err, BridgeError::Registration(_)));
    }

    #[test]
    fn native_error_propagation_is_unwrapped() {
        let inner = BridgeError::UnknownFunction { name: "f".into() };
        let native: NativeError = inner.into();
        let back: BridgeError = native.into();
        assert!(matches!(back, BridgeError::UnknownFunction { .. }));

        let plain: BridgeError = NativeError::other("boom").into();
        assert!(matches!(plain, BridgeError::Native(_)));
    }

    #[test]
    fn raised_error_propagation_is_unwrapped() {
        let raised: RaisedError = BridgeError::NotInitialized.into();
        let back: BridgeError = raised.into();
        assert!(matches!(back, BridgeError::NotInitialized));

        let plain: BridgeError = RaisedError::new("ValueError", "bad").into();
        assert_eq!(plain.to_string(), "ValueError: bad");
    }

    #[test]
    fn root_cause_walks_callback_layers() {
        let root = BridgeError::Raised(RaisedError::new("RuntimeError", "deep"));
        let err = BridgeError::callback("outer", BridgeError::callback("inner", root));
        assert_eq!(err.crossings(), 2);
        assert!(matches!(err.root_cause(), BridgeError::Raised(_)));
        assert!(err.to_string().contains("outer"));
        assert!(err.to_string().contains("deep"));
    }

    #[test]
    fn classification_helpers() {
        let err = BridgeError::NoViableOverload { name: "f".into(), args: "()".into() };
        assert!(err.is_overload());
        assert!(BridgeError::conversion("int8", ConversionError::InvalidUtf8).is_conversion());
        assert!(!BridgeError::NotInitialized.is_callback());
    }
}
