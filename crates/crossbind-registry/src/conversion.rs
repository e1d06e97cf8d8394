//! Conversion costs used to rank overloads.
//!
//! Each converter reports how well a dynamic value fits a descriptor as a
//! [`Conversion`]. Lower costs are better; a converter that cannot accept the
//! value reports nothing at all.

use crossbind_core::TypeHash;

/// A conversion a value needs to fit a parameter, with its cost.
#[derive(Debug, Clone, PartialEq)]
pub struct Conversion {
    pub kind: ConversionKind,
    pub cost: u32,
    /// Whether the value changes representation (anything but identity).
    pub is_implicit: bool,
}

/// The kind of conversion being performed.
#[derive(Debug, Clone, PartialEq)]
pub enum ConversionKind {
    /// The value already has the parameter's shape.
    Identity,

    /// `None` standing in for an absent pointer, reference or callable.
    NoneToAbsent,

    /// Out-of-range integer wrapped into an 8-bit type.
    WrappingNarrow,

    /// Valid UTF-8 bytes accepted as text.
    BytesToText,

    /// Text accepted as bytes.
    TextToBytes,

    /// Integer accepted as a float.
    IntToFloat,

    /// Derived class instance passed as a base.
    DerivedToBase {
        /// The base class type hash.
        base: TypeHash,
    },

    /// Mapping accepted as a record.
    MappingToRecord,

    /// Callable re-wrapped under the parameter's signature.
    CallableAdapt,

    /// Container whose elements need conversions.
    Elementwise,
}

impl Conversion {
    /// Cost for exact matches.
    pub const COST_EXACT: u32 = 0;
    /// Cost for `None` to an absent value.
    pub const COST_ABSENT: u32 = 1;
    /// Cost for sanctioned 8-bit wrapping.
    pub const COST_WRAPPING_NARROW: u32 = 5;
    /// Cost between text and bytes.
    pub const COST_TEXT_BYTES: u32 = 6;
    /// Cost for int to float.
    pub const COST_INT_TO_FLOAT: u32 = 8;
    /// Cost for derived to base.
    pub const COST_DERIVED_TO_BASE: u32 = 10;
    /// Cost for mapping to record.
    pub const COST_TO_RECORD: u32 = 12;
    /// Cost for re-wrapping a callable.
    pub const COST_CALLABLE_ADAPT: u32 = 12;
    /// Highest cost accepted by default.
    pub const COST_MAX_IMPLICIT: u32 = 12;

    pub fn identity() -> Self {
        Self { kind: ConversionKind::Identity, cost: Self::COST_EXACT, is_implicit: false }
    }

    pub fn absent() -> Self {
        Self::implicit(ConversionKind::NoneToAbsent, Self::COST_ABSENT)
    }

    pub fn implicit(kind: ConversionKind, cost: u32) -> Self {
        Self { kind, cost, is_implicit: true }
    }

    pub fn is_exact(&self) -> bool {
        matches!(self.kind, ConversionKind::Identity)
    }

    /// Combine element conversions of a container.
    ///
    /// The container costs as much as its worst element, with `floor` as a
    /// minimum when the container itself changes shape. Returns `None` if any
    /// element is not convertible.
    pub fn combine(
        parts: impl IntoIterator<Item = Option<Conversion>>,
        floor: Option<Conversion>,
    ) -> Option<Self> {
        let mut worst = floor.unwrap_or_else(Conversion::identity);
        for part in parts {
            let part = part?;
            if part.cost > worst.cost || (worst.is_exact() && !part.is_exact()) {
                let cost = worst.cost.max(part.cost);
                worst = Conversion::implicit(ConversionKind::Elementwise, cost);
            }
        }
        Some(worst)
    }
}
