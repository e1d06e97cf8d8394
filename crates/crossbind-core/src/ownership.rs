//! Ownership planning for values crossing the boundary.
//!
//! Every parameter and return conversion carries an [`OwnershipMode`]. The
//! mode is decided once, from the native storage kind and the descriptor,
//! and the converters only ever act on the mode they are handed.

use crate::descriptor::{TypeDescriptor, TypeKind};

/// How the two sides share a value after a conversion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OwnershipMode {
    /// Each side owns an independent value.
    Copy,
    /// The receiving side views the value and may not mutate it.
    BorrowConst,
    /// The receiving side views the value and may mutate it.
    BorrowMutable,
    /// Ownership is handed over and the source holder becomes empty.
    Move,
    /// Both sides keep the value alive through a shared count.
    SharedRef,
}

impl OwnershipMode {
    /// Whether `None` may stand in for an absent value under this mode.
    pub const fn accepts_absent(self) -> bool {
        !matches!(self, OwnershipMode::Copy)
    }

    pub const fn is_borrow(self) -> bool {
        matches!(self, OwnershipMode::BorrowConst | OwnershipMode::BorrowMutable)
    }

    pub const fn name(self) -> &'static str {
        match self {
            OwnershipMode::Copy => "copy",
            OwnershipMode::BorrowConst => "borrow-const",
            OwnershipMode::BorrowMutable => "borrow-mut",
            OwnershipMode::Move => "move",
            OwnershipMode::SharedRef => "shared",
        }
    }
}

/// How native code stores a parameter or return value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum StorageKind {
    /// Held by value.
    #[default]
    Value,
    ConstRef,
    MutRef,
    ConstPtr,
    MutPtr,
    /// An owning unique handle.
    Unique,
    /// A reference-counted shared handle.
    Shared,
}

/// Which way a value is travelling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    ToNative,
    ToDynamic,
}

/// Decides the ownership mode of a single conversion.
pub struct OwnershipTransfer;

impl OwnershipTransfer {
    /// Plan the ownership mode for converting a value of `descriptor` stored
    /// as `storage` in the given `direction`.
    ///
    /// A class instance returned by value hands the temporary over to the
    /// dynamic side, so it is planned as a move rather than a copy.
    pub fn plan(
        descriptor: &TypeDescriptor,
        direction: Direction,
        storage: StorageKind,
    ) -> OwnershipMode {
        match storage {
            StorageKind::Value => match (direction, &descriptor.kind) {
                (Direction::ToDynamic, TypeKind::Class(_)) => OwnershipMode::Move,
                _ => OwnershipMode::Copy,
            },
            StorageKind::ConstRef | StorageKind::ConstPtr => OwnershipMode::BorrowConst,
            StorageKind::MutRef | StorageKind::MutPtr => OwnershipMode::BorrowMutable,
            StorageKind::Unique => OwnershipMode::Move,
            StorageKind::Shared => OwnershipMode::SharedRef,
        }
    }
}
