//! Type converter registry.
//!
//! Maps every [`TypeHash`](crossbind_core::TypeHash) to its descriptor and a
//! [`Converter`]. Converters score dynamic values for overload resolution and
//! convert in both directions under a planned
//! [`OwnershipMode`](crossbind_core::OwnershipMode).
//!
//! ```ignore
//! let mut builder = TypeRegistryBuilder::new();
//! builder.register(TypeDescriptor::sequence(&TypeDescriptor::primitive(PrimitiveKind::Int32)))?;
//! let registry = builder.build()?;
//! ```

pub mod builder;
pub mod conversion;
pub mod converter;
pub mod converters;
pub mod registry;

pub use builder::TypeRegistryBuilder;
pub use conversion::{Conversion, ConversionKind};
pub use converter::{ConvertCx, Converter};
pub use converters::BuiltinConverter;
pub use registry::{InterfaceTable, TypeConverterRegistry};
