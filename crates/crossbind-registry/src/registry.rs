//! The immutable type converter registry.
//!
//! Built once by [`TypeRegistryBuilder`](crate::TypeRegistryBuilder) and then
//! shared read-only by every conversion. Lookups go through `TypeHash` for
//! O(1) access.
//!
//! Absent values are handled here rather than in the converters: `None`
//! becomes [`NativeValue::Absent`] for pointer-like storage and callables, and
//! an absent native value always comes back as `None`.

use std::sync::Arc;

use crossbind_core::{
    BridgeError, ConversionError, DetachedBinder, Direction, DynamicValue, NativeValue,
    ObjectBinder, OwnershipMode, OwnershipTransfer, PrimitiveKind, StorageKind, TypeDescriptor,
    TypeHash, TypeKind,
};
use rustc_hash::FxHashMap;

use crate::conversion::Conversion;
use crate::converter::{ConvertCx, Converter};

pub(crate) struct RegisteredType {
    pub(crate) descriptor: Arc<TypeDescriptor>,
    pub(crate) converter: Arc<dyn Converter>,
}

/// Linearized ancestors of one class, nearest first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InterfaceTable {
    class: TypeHash,
    ancestors: Vec<TypeHash>,
}

impl InterfaceTable {
    pub(crate) fn new(class: TypeHash, ancestors: Vec<TypeHash>) -> Self {
        Self { class, ancestors }
    }

    pub fn class(&self) -> TypeHash {
        self.class
    }

    pub fn ancestors(&self) -> &[TypeHash] {
        &self.ancestors
    }

    /// The class followed by its ancestors: the order methods are looked up in.
    pub fn lookup_order(&self) -> impl Iterator<Item = TypeHash> + '_ {
        std::iter::once(self.class).chain(self.ancestors.iter().copied())
    }

    pub fn derives_from(&self, base: TypeHash) -> bool {
        self.ancestors.contains(&base)
    }
}

/// Every registered type with its converter.
pub struct TypeConverterRegistry {
    types: FxHashMap<TypeHash, RegisteredType>,
    type_names: FxHashMap<String, TypeHash>,
    interfaces: FxHashMap<TypeHash, InterfaceTable>,
}

impl std::fmt::Debug for TypeConverterRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TypeConverterRegistry")
            .field("types", &self.types.len())
            .field("classes", &self.interfaces.len())
            .finish()
    }
}

impl TypeConverterRegistry {
    pub(crate) fn new(
        types: FxHashMap<TypeHash, RegisteredType>,
        type_names: FxHashMap<String, TypeHash>,
        interfaces: FxHashMap<TypeHash, InterfaceTable>,
    ) -> Self {
        Self { types, type_names, interfaces }
    }

    // =========================================================================
    // Lookup
    // =========================================================================

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    pub fn contains(&self, hash: TypeHash) -> bool {
        self.types.contains_key(&hash)
    }

    /// Look up a descriptor by name.
    pub fn lookup(&self, name: &str) -> Option<&TypeDescriptor> {
        self.type_names.get(name).and_then(|hash| self.descriptor(*hash))
    }

    pub fn hash_of(&self, name: &str) -> Option<TypeHash> {
        self.type_names.get(name).copied()
    }

    pub fn descriptor(&self, hash: TypeHash) -> Option<&TypeDescriptor> {
        self.types.get(&hash).map(|entry| &*entry.descriptor)
    }

    /// The converter registered for `hash`.
    pub fn get(&self, hash: TypeHash) -> Option<&Arc<dyn Converter>> {
        self.types.get(&hash).map(|entry| &entry.converter)
    }

    /// The converter for `descriptor`, failing with `UnknownType` if it was never registered.
    pub fn converter(
        &self,
        descriptor: &TypeDescriptor,
    ) -> Result<&Arc<dyn Converter>, BridgeError> {
        self.get(descriptor.hash).ok_or(BridgeError::UnknownType { hash: descriptor.hash })
    }

    pub fn interfaces(&self, class: TypeHash) -> Option<&InterfaceTable> {
        self.interfaces.get(&class)
    }

    /// Whether `derived` is a strict descendant of `base`.
    pub fn is_subclass(&self, derived: TypeHash, base: TypeHash) -> bool {
        self.interfaces.get(&derived).is_some_and(|table| table.derives_from(base))
    }

    /// The ownership mode for converting a value of `ty` stored as `storage`.
    pub fn plan(
        &self,
        ty: TypeHash,
        direction: Direction,
        storage: StorageKind,
    ) -> Option<OwnershipMode> {
        self.descriptor(ty).map(|d| OwnershipTransfer::plan(d, direction, storage))
    }

    // =========================================================================
    // Conversion
    // =========================================================================

    /// Score `value` against `ty` under `mode`. Has no side effects.
    pub fn score(
        &self,
        value: &DynamicValue,
        ty: TypeHash,
        mode: OwnershipMode,
        binder: &dyn ObjectBinder,
    ) -> Option<Conversion> {
        let entry = self.types.get(&ty)?;
        if value.is_none() && absent_allowed(&entry.descriptor, mode) {
            return Some(Conversion::absent());
        }
        entry.converter.score(value, &self.cx(entry, mode, binder))
    }

    /// Convert a dynamic value to `ty` held as `storage`, without instance tracking.
    pub fn convert_to_native(
        &self,
        value: &DynamicValue,
        ty: TypeHash,
        storage: StorageKind,
    ) -> Result<NativeValue, BridgeError> {
        let mode = self
            .plan(ty, Direction::ToNative, storage)
            .ok_or(BridgeError::UnknownType { hash: ty })?;
        self.convert_to_native_with(value, ty, mode, &DetachedBinder)
    }

    #[cfg_attr(feature = "profiling", profiling::function)]
    pub fn convert_to_native_with(
        &self,
        value: &DynamicValue,
        ty: TypeHash,
        mode: OwnershipMode,
        binder: &dyn ObjectBinder,
    ) -> Result<NativeValue, BridgeError> {
        let entry = self.types.get(&ty).ok_or(BridgeError::UnknownType { hash: ty })?;
        self.native_from(entry, value, mode, binder)
            .map_err(|reason| BridgeError::conversion(entry.descriptor.name.clone(), reason))
    }

    /// Convert a native value of `ty` held as `storage`, without instance tracking.
    pub fn convert_to_dynamic(
        &self,
        value: NativeValue,
        ty: TypeHash,
        storage: StorageKind,
    ) -> Result<DynamicValue, BridgeError> {
        let mode = self
            .plan(ty, Direction::ToDynamic, storage)
            .ok_or(BridgeError::UnknownType { hash: ty })?;
        self.convert_to_dynamic_with(value, ty, mode, &DetachedBinder)
    }

    #[cfg_attr(feature = "profiling", profiling::function)]
    pub fn convert_to_dynamic_with(
        &self,
        value: NativeValue,
        ty: TypeHash,
        mode: OwnershipMode,
        binder: &dyn ObjectBinder,
    ) -> Result<DynamicValue, BridgeError> {
        let entry = self.types.get(&ty).ok_or(BridgeError::UnknownType { hash: ty })?;
        self.dynamic_from(entry, value, mode, binder)
            .map_err(|reason| BridgeError::conversion(entry.descriptor.name.clone(), reason))
    }

    // =========================================================================
    // Elements
    // =========================================================================

    /// Score a container element held as `storage`.
    pub fn element_score(
        &self,
        ty: TypeHash,
        storage: StorageKind,
        value: &DynamicValue,
        binder: &dyn ObjectBinder,
    ) -> Option<Conversion> {
        let mode = self.plan(ty, Direction::ToNative, storage)?;
        self.score(value, ty, mode, binder)
    }

    pub fn element_to_native(
        &self,
        ty: TypeHash,
        storage: StorageKind,
        value: &DynamicValue,
        binder: &dyn ObjectBinder,
    ) -> Result<NativeValue, ConversionError> {
        let entry = self.entry(ty)?;
        let mode = OwnershipTransfer::plan(&entry.descriptor, Direction::ToNative, storage);
        self.native_from(entry, value, mode, binder)
    }

    pub fn element_to_dynamic(
        &self,
        ty: TypeHash,
        storage: StorageKind,
        value: NativeValue,
        binder: &dyn ObjectBinder,
    ) -> Result<DynamicValue, ConversionError> {
        let entry = self.entry(ty)?;
        let mode = OwnershipTransfer::plan(&entry.descriptor, Direction::ToDynamic, storage);
        self.dynamic_from(entry, value, mode, binder)
    }

    fn entry(&self, ty: TypeHash) -> Result<&RegisteredType, ConversionError> {
        self.types.get(&ty).ok_or_else(|| ConversionError::failed(format!("unknown type {ty}")))
    }

    fn cx<'a>(
        &'a self,
        entry: &'a RegisteredType,
        mode: OwnershipMode,
        binder: &'a dyn ObjectBinder,
    ) -> ConvertCx<'a> {
        ConvertCx { registry: self, descriptor: &*entry.descriptor, mode, binder }
    }

    fn native_from(
        &self,
        entry: &RegisteredType,
        value: &DynamicValue,
        mode: OwnershipMode,
        binder: &dyn ObjectBinder,
    ) -> Result<NativeValue, ConversionError> {
        if value.is_none() && !is_void(&entry.descriptor) {
            if absent_allowed(&entry.descriptor, mode) {
                return Ok(NativeValue::Absent);
            }
            return Err(ConversionError::NullValue { target_type: entry.descriptor.name.clone() });
        }
        entry.converter.to_native(value, &self.cx(entry, mode, binder))
    }

    fn dynamic_from(
        &self,
        entry: &RegisteredType,
        value: NativeValue,
        mode: OwnershipMode,
        binder: &dyn ObjectBinder,
    ) -> Result<DynamicValue, ConversionError> {
        if value.is_absent() {
            return Ok(DynamicValue::None);
        }
        entry.converter.to_dynamic(value, &self.cx(entry, mode, binder))
    }
}

fn is_void(descriptor: &TypeDescriptor) -> bool {
    matches!(descriptor.kind, TypeKind::Primitive { kind: PrimitiveKind::Void, .. })
}

fn absent_allowed(descriptor: &TypeDescriptor, mode: OwnershipMode) -> bool {
    !is_void(descriptor)
        && (mode.accepts_absent() || matches!(descriptor.kind, TypeKind::Callable(_)))
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use crossbind_core::{
        ClassInfo, MapKey, NativeObject, ObjectValue, OwnershipError, Signature, UniqueObject,
    };

    use super::*;
    use crate::TypeRegistryBuilder;
    use crate::conversion::ConversionKind;

    #[derive(Debug, Clone, PartialEq)]
    struct Point {
        x: i32,
    }

    fn int32() -> TypeHash {
        PrimitiveKind::Int32.type_hash()
    }

    fn registry() -> TypeConverterRegistry {
        let mut builder = TypeRegistryBuilder::new();
        let int32 = TypeDescriptor::primitive(PrimitiveKind::Int32);
        let double = TypeDescriptor::primitive(PrimitiveKind::Double);
        let text = TypeDescriptor::text();
        builder.register(TypeDescriptor::sequence(&int32)).unwrap();
        builder.register(TypeDescriptor::sequence(&double)).unwrap();
        builder.register(TypeDescriptor::mapping(&text, &int32)).unwrap();
        let fields = [("a".to_string(), int32.hash), ("b".to_string(), text.hash)];
        builder.register(TypeDescriptor::record("Pair", fields)).unwrap();
        builder.register(TypeDescriptor::class("Base", ClassInfo::new())).unwrap();
        builder
            .register(TypeDescriptor::class(
                "Point",
                ClassInfo::new().base(TypeHash::from_name("Base")).copyable::<Point>(),
            ))
            .unwrap();
        builder
            .register(TypeDescriptor::callable(
                Signature::new("on_event").param(int32.hash, StorageKind::Value),
            ))
            .unwrap();
        builder.build().unwrap()
    }

    fn hash(registry: &TypeConverterRegistry, name: &str) -> TypeHash {
        registry.hash_of(name).unwrap()
    }

    fn score(
        registry: &TypeConverterRegistry,
        value: &DynamicValue,
        ty: TypeHash,
        mode: OwnershipMode,
    ) -> Option<Conversion> {
        registry.score(value, ty, mode, &DetachedBinder)
    }

    fn reason(err: BridgeError) -> ConversionError {
        match err {
            BridgeError::Conversion { reason, .. } => reason,
            other => panic!("not a conversion error: {other}"),
        }
    }

    // ========================================================================
    // Lookup
    // ========================================================================

    #[test]
    fn converter_lookup_reports_unknown_types() {
        let registry = registry();
        assert!(registry.converter(&TypeDescriptor::primitive(PrimitiveKind::Int32)).is_ok());
        let point = registry.lookup("Point").unwrap().clone();
        assert!(registry.converter(&point).is_ok());

        let missing = TypeDescriptor::class("Missing", ClassInfo::new());
        let err = registry.converter(&missing).err().unwrap();
        assert!(matches!(
            err,
            BridgeError::UnknownType { hash } if hash == TypeHash::from_name("Missing")
        ));
    }

    // ========================================================================
    // Absent values
    // ========================================================================

    #[test]
    fn none_by_value_is_a_null_error() {
        let registry = registry();
        let err = registry.convert_to_native(&DynamicValue::None, int32(), StorageKind::Value);
        assert!(matches!(reason(err.unwrap_err()), ConversionError::NullValue { .. }));
        assert!(score(&registry, &DynamicValue::None, int32(), OwnershipMode::Copy).is_none());
    }

    #[test]
    fn none_by_pointer_is_absent() {
        let registry = registry();
        let point = hash(&registry, "Point");
        let value =
            registry.convert_to_native(&DynamicValue::None, point, StorageKind::ConstPtr).unwrap();
        assert_eq!(value, NativeValue::Absent);
        let conv =
            score(&registry, &DynamicValue::None, point, OwnershipMode::BorrowConst).unwrap();
        assert_eq!(conv.kind, ConversionKind::NoneToAbsent);
    }

    #[test]
    fn none_callable_is_absent_even_by_value() {
        let registry = registry();
        let callable = hash(&registry, "callable<on_event>");
        let value =
            registry.convert_to_native(&DynamicValue::None, callable, StorageKind::Value).unwrap();
        assert_eq!(value, NativeValue::Absent);
    }

    #[test]
    fn absent_comes_back_as_none() {
        let registry = registry();
        let point = hash(&registry, "Point");
        let value = registry.convert_to_dynamic(NativeValue::Absent, point, StorageKind::MutPtr);
        assert_eq!(value.unwrap(), DynamicValue::None);
    }

    #[test]
    fn void_is_none() {
        let registry = registry();
        let void = PrimitiveKind::Void.type_hash();
        let native = registry.convert_to_native(&DynamicValue::None, void, StorageKind::Value);
        assert_eq!(native.unwrap(), NativeValue::Void);
        let dynamic = registry.convert_to_dynamic(NativeValue::Void, void, StorageKind::Value);
        assert_eq!(dynamic.unwrap(), DynamicValue::None);
    }

    // ========================================================================
    // Containers and records
    // ========================================================================

    #[test]
    fn sequences_convert_elementwise() {
        let registry = registry();
        let list = hash(&registry, "list<int32>");
        let value = DynamicValue::Sequence(vec![DynamicValue::Int(1), DynamicValue::Int(2)]);
        let native = registry.convert_to_native(&value, list, StorageKind::Value).unwrap();
        assert_eq!(native, NativeValue::Sequence(vec![NativeValue::I32(1), NativeValue::I32(2)]));
        assert_eq!(registry.convert_to_dynamic(native, list, StorageKind::Value).unwrap(), value);
    }

    #[test]
    fn sequence_cost_is_worst_element() {
        let registry = registry();
        let list = hash(&registry, "list<double>");
        let value = DynamicValue::Sequence(vec![DynamicValue::Float(1.0), DynamicValue::Int(2)]);
        let conv = score(&registry, &value, list, OwnershipMode::Copy).unwrap();
        assert_eq!(conv.cost, Conversion::COST_INT_TO_FLOAT);
        assert_eq!(conv.kind, ConversionKind::Elementwise);
    }

    #[test]
    fn one_bad_element_fails_the_sequence() {
        let registry = registry();
        let list = hash(&registry, "list<int32>");
        let value = DynamicValue::Sequence(vec![DynamicValue::Int(1), DynamicValue::from("x")]);
        assert!(score(&registry, &value, list, OwnershipMode::Copy).is_none());
        let err = registry.convert_to_native(&value, list, StorageKind::Value).unwrap_err();
        assert!(err.is_conversion());
    }

    #[test]
    fn mappings_convert_keys_and_values() {
        let registry = registry();
        let dict = hash(&registry, "dict<string, int32>");
        let value =
            DynamicValue::mapping([("a", DynamicValue::Int(1)), ("b", DynamicValue::Int(2))]);
        let native = registry.convert_to_native(&value, dict, StorageKind::Value).unwrap();
        let expected: BTreeMap<_, _> = [
            (MapKey::Text("a".into()), NativeValue::I32(1)),
            (MapKey::Text("b".into()), NativeValue::I32(2)),
        ]
        .into_iter()
        .collect();
        assert_eq!(native, NativeValue::Mapping(expected));
        assert_eq!(registry.convert_to_dynamic(native, dict, StorageKind::Value).unwrap(), value);
    }

    #[test]
    fn records_round_trip_in_field_order() {
        let registry = registry();
        let pair = hash(&registry, "Pair");
        let value =
            DynamicValue::mapping([("b", DynamicValue::from("x")), ("a", DynamicValue::Int(7))]);
        let native = registry.convert_to_native(&value, pair, StorageKind::Value).unwrap();
        let fields =
            vec![("a".into(), NativeValue::I32(7)), ("b".into(), NativeValue::Text("x".into()))];
        assert_eq!(native, NativeValue::Record(fields));
        assert_eq!(registry.convert_to_dynamic(native, pair, StorageKind::Value).unwrap(), value);
    }

    #[test]
    fn record_field_errors() {
        let registry = registry();
        let pair = hash(&registry, "Pair");

        let missing = DynamicValue::mapping([("a", DynamicValue::Int(7))]);
        let err = registry.convert_to_native(&missing, pair, StorageKind::Value).unwrap_err();
        assert!(matches!(reason(err), ConversionError::MissingField { .. }));

        let extra = DynamicValue::mapping([
            ("a", DynamicValue::Int(7)),
            ("b", DynamicValue::from("x")),
            ("c", DynamicValue::Int(0)),
        ]);
        let err = registry.convert_to_native(&extra, pair, StorageKind::Value).unwrap_err();
        assert!(matches!(reason(err), ConversionError::UnexpectedField { .. }));
        assert!(score(&registry, &extra, pair, OwnershipMode::Copy).is_none());
    }

    #[test]
    fn record_score_has_a_floor() {
        let registry = registry();
        let pair = hash(&registry, "Pair");
        let value =
            DynamicValue::mapping([("a", DynamicValue::Int(7)), ("b", DynamicValue::from("x"))]);
        let conv = score(&registry, &value, pair, OwnershipMode::Copy).unwrap();
        assert_eq!(conv.cost, Conversion::COST_TO_RECORD);
    }

    // ========================================================================
    // Objects
    // ========================================================================

    fn wrap_point(registry: &TypeConverterRegistry, x: i32, storage: StorageKind) -> DynamicValue {
        let point = hash(registry, "Point");
        let object = NativeObject::new(point, Point { x });
        let native = match storage {
            StorageKind::ConstRef => NativeValue::Object(ObjectValue::borrowed(object)),
            StorageKind::MutRef => NativeValue::Object(ObjectValue::borrowed_mut(object)),
            _ => NativeValue::Object(ObjectValue::Unique(UniqueObject::new(object))),
        };
        registry.convert_to_dynamic(native, point, storage).unwrap()
    }

    #[test]
    fn derived_passes_as_base() {
        let registry = registry();
        let base = hash(&registry, "Base");
        let value = wrap_point(&registry, 1, StorageKind::Value);
        let conv = score(&registry, &value, base, OwnershipMode::BorrowConst).unwrap();
        assert_eq!(conv.kind, ConversionKind::DerivedToBase { base });
        assert_eq!(conv.cost, Conversion::COST_DERIVED_TO_BASE);
    }

    #[test]
    fn base_does_not_pass_as_derived() {
        let registry = registry();
        let base = hash(&registry, "Base");
        let point = hash(&registry, "Point");
        let object = NativeObject::new(base, ());
        let native = NativeValue::Object(ObjectValue::Unique(UniqueObject::new(object)));
        let value = registry.convert_to_dynamic(native, base, StorageKind::Unique).unwrap();
        assert!(score(&registry, &value, point, OwnershipMode::BorrowConst).is_none());
        let err = registry.convert_to_native(&value, point, StorageKind::ConstRef).unwrap_err();
        assert!(matches!(reason(err), ConversionError::ClassMismatch { .. }));
    }

    #[test]
    fn copy_produces_an_independent_object() {
        let registry = registry();
        let point = hash(&registry, "Point");
        let value = wrap_point(&registry, 3, StorageKind::Value);
        let native = registry.convert_to_native(&value, point, StorageKind::Value).unwrap();
        let object = native.into_object().unwrap();
        object.with_mut(|p: &mut Point| p.x = 99).unwrap();
        assert_eq!(value.as_object().unwrap().with_object(|p: &Point| p.x).unwrap(), 3);
    }

    #[test]
    fn uncopyable_class_cannot_be_passed_by_value() {
        let registry = registry();
        let base = hash(&registry, "Base");
        let object = NativeObject::new(base, ());
        let native = NativeValue::Object(ObjectValue::Unique(UniqueObject::new(object)));
        let value = registry.convert_to_dynamic(native, base, StorageKind::Unique).unwrap();
        assert!(score(&registry, &value, base, OwnershipMode::Copy).is_none());
        let err = registry.convert_to_native(&value, base, StorageKind::Value).unwrap_err();
        assert!(matches!(reason(err), ConversionError::NotCopyable { .. }));
    }

    #[test]
    fn const_wrapper_refuses_mutable_borrow() {
        let registry = registry();
        let point = hash(&registry, "Point");
        let value = wrap_point(&registry, 1, StorageKind::ConstRef);
        assert!(score(&registry, &value, point, OwnershipMode::BorrowMutable).is_none());
        let err = registry.convert_to_native(&value, point, StorageKind::MutRef).unwrap_err();
        assert!(matches!(
            reason(err),
            ConversionError::Ownership(OwnershipError::ConstViolation)
        ));
    }

    #[test]
    fn move_empties_the_wrapper() {
        let registry = registry();
        let point = hash(&registry, "Point");
        let value = wrap_point(&registry, 5, StorageKind::Unique);
        let native = registry.convert_to_native(&value, point, StorageKind::Unique).unwrap();
        assert_eq!(native.as_object().unwrap().with(|p: &Point| p.x).unwrap(), 5);
        let wrapper = value.as_object().unwrap();
        assert!(wrapper.is_empty());
        assert_eq!(wrapper.object().unwrap_err(), OwnershipError::Empty);
        assert!(score(&registry, &value, point, OwnershipMode::BorrowConst).is_none());
    }
}
