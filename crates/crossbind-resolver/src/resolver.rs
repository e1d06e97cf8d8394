//! Overload resolution for calls from the dynamic side.
//!
//! ## Algorithm
//!
//! 1. Filter candidates by argument count, counting defaults
//! 2. Score every supplied argument with the parameter's converter under the
//!    planned ownership mode; any cost above the policy maximum rejects the
//!    candidate
//! 3. Rank viable candidates by cost, implicit conversions, declaration order
//! 4. Convert the winner's arguments and fill omitted ones from defaults
//!
//! Scoring never mutates arguments, so a move out of a wrapper only happens
//! once a candidate has been chosen. Moves are also the last arguments the
//! winner converts, and they are undone if the call still fails.

use std::sync::Arc;

use crossbind_core::{
    BridgeError, ConversionError, Direction, DynamicValue, NativeValue, ObjectBinder, ObjectValue,
    OwnershipError, OwnershipMode, Signature, TypeHash, UniqueObject, WrapperHandle,
};
use crossbind_registry::{Conversion, TypeConverterRegistry};

use crate::group::OverloadGroup;
use crate::policy::ResolvePolicy;
use crate::ranking::{OverloadMatch, Ranked, find_best_match, sort_matches};

/// The chosen candidate with its converted arguments.
#[derive(Debug)]
pub struct Resolution {
    /// Declaration index of the chosen candidate.
    pub index: usize,
    /// One native value per parameter, defaults included.
    pub args: Vec<NativeValue>,
    /// Conversions of the supplied arguments.
    pub conversions: Vec<Conversion>,
}

/// Selects and materializes overloads.
#[derive(Debug, Clone)]
pub struct OverloadResolver {
    registry: Arc<TypeConverterRegistry>,
    policy: ResolvePolicy,
}

impl OverloadResolver {
    pub fn new(registry: Arc<TypeConverterRegistry>, policy: ResolvePolicy) -> Self {
        Self { registry, policy }
    }

    pub fn policy(&self) -> &ResolvePolicy {
        &self.policy
    }

    pub fn registry(&self) -> &Arc<TypeConverterRegistry> {
        &self.registry
    }

    /// Resolve a call to `group` and convert its arguments.
    ///
    /// # Errors
    ///
    /// * [`BridgeError::NoViableOverload`] if no candidate accepts `args`
    /// * [`BridgeError::AmbiguousOverload`] if the strict tie-break finds a tie
    /// * [`BridgeError::Conversion`] if materializing the winner fails
    #[cfg_attr(feature = "profiling", profiling::function)]
    pub fn resolve(
        &self,
        group: &OverloadGroup,
        args: &[DynamicValue],
        binder: &dyn ObjectBinder,
    ) -> Result<Resolution, BridgeError> {
        let chosen = self.select(group, args, binder)?;
        let signature = group.get(chosen.index).ok_or_else(|| BridgeError::NoViableOverload {
            name: group.name().to_string(),
            args: DynamicValue::describe_args(args),
        })?;
        let native = self.materialize(signature, args, binder)?;
        log::trace!(
            "resolved {} to candidate {} ({})",
            group.name(),
            chosen.index,
            self.describe(signature)
        );
        Ok(Resolution { index: chosen.index, args: native, conversions: chosen.conversions })
    }

    /// The best candidate for `args`, without converting anything.
    pub fn select(
        &self,
        group: &OverloadGroup,
        args: &[DynamicValue],
        binder: &dyn ObjectBinder,
    ) -> Result<OverloadMatch, BridgeError> {
        let viable = self.rank(group, args, binder);
        match find_best_match(&viable, self.policy.tie_break) {
            Some(Ranked::Best(best)) => Ok(best.clone()),
            Some(Ranked::Ambiguous(tied)) => {
                let candidates: Vec<_> = tied
                    .iter()
                    .filter_map(|m| group.get(m.index))
                    .map(|sig| self.describe(sig))
                    .collect();
                Err(BridgeError::AmbiguousOverload {
                    name: group.name().to_string(),
                    candidates: candidates.join(" and "),
                })
            }
            None => Err(BridgeError::NoViableOverload {
                name: group.name().to_string(),
                args: DynamicValue::describe_args(args),
            }),
        }
    }

    /// Every viable candidate, best first.
    pub fn rank(
        &self,
        group: &OverloadGroup,
        args: &[DynamicValue],
        binder: &dyn ObjectBinder,
    ) -> Vec<OverloadMatch> {
        let mut viable: Vec<_> = group
            .candidates()
            .iter()
            .enumerate()
            .filter_map(|(index, sig)| self.match_candidate(index, sig, args, binder))
            .collect();
        sort_matches(&mut viable);
        viable
    }

    fn match_candidate(
        &self,
        index: usize,
        signature: &Signature,
        args: &[DynamicValue],
        binder: &dyn ObjectBinder,
    ) -> Option<OverloadMatch> {
        if !signature.accepts_arity(args.len()) {
            return None;
        }
        let conversions = signature
            .params
            .iter()
            .zip(args)
            .map(|(param, arg)| {
                let mode = self.registry.plan(param.ty, Direction::ToNative, param.storage)?;
                self.registry
                    .score(arg, param.ty, mode, binder)
                    .filter(|conversion| conversion.cost <= self.policy.max_cost)
            })
            .collect::<Option<Vec<_>>>()?;
        Some(OverloadMatch::new(index, conversions))
    }

    /// Convert `args` for `signature`, filling omitted parameters from defaults.
    ///
    /// Arguments that move out of a wrapper convert last, once everything
    /// else has succeeded, and no wrapper may be moved by two arguments. If a
    /// move still fails, objects already moved go back into their wrappers.
    pub fn materialize(
        &self,
        signature: &Signature,
        args: &[DynamicValue],
        binder: &dyn ObjectBinder,
    ) -> Result<Vec<NativeValue>, BridgeError> {
        let modes = signature
            .params
            .iter()
            .map(|param| {
                self.registry
                    .plan(param.ty, Direction::ToNative, param.storage)
                    .ok_or(BridgeError::UnknownType { hash: param.ty })
            })
            .collect::<Result<Vec<_>, _>>()?;
        self.check_moves(signature, args, &modes)?;

        let (moves, others): (Vec<usize>, Vec<usize>) = (0..signature.params.len())
            .partition(|&position| modes[position] == OwnershipMode::Move && position < args.len());
        let mut out: Vec<Option<NativeValue>> =
            std::iter::repeat_with(|| None).take(signature.params.len()).collect();
        for position in others.into_iter().chain(moves) {
            match self.materialize_one(signature, position, modes[position], args, binder) {
                Ok(value) => out[position] = Some(value),
                Err(err) => {
                    restore_moved(args, &modes, &mut out);
                    return Err(err);
                }
            }
        }
        Ok(out.into_iter().flatten().collect())
    }

    fn materialize_one(
        &self,
        signature: &Signature,
        position: usize,
        mode: OwnershipMode,
        args: &[DynamicValue],
        binder: &dyn ObjectBinder,
    ) -> Result<NativeValue, BridgeError> {
        let param = &signature.params[position];
        match args.get(position) {
            Some(arg) => {
                log::trace!(
                    "argument {position} of {}: {} as {} ({})",
                    signature.name,
                    arg.type_name(),
                    self.type_name(param.ty),
                    mode.name()
                );
                self.registry.convert_to_native_with(arg, param.ty, mode, binder)
            }
            None => self.default_for(signature, position),
        }
    }

    /// Refuse a call that would move one wrapper through two arguments.
    fn check_moves(
        &self,
        signature: &Signature,
        args: &[DynamicValue],
        modes: &[OwnershipMode],
    ) -> Result<(), BridgeError> {
        let mut moved: Vec<&WrapperHandle> = Vec::new();
        for position in 0..args.len() {
            let Some(wrapper) = moved_from(modes, args, position) else {
                continue;
            };
            if moved.iter().any(|seen| WrapperHandle::ptr_eq(seen, wrapper)) {
                let target = self.type_name(signature.params[position].ty);
                let reason = OwnershipError::MovedTwice { token: wrapper.token() };
                return Err(BridgeError::conversion(target, reason.into()));
            }
            moved.push(wrapper);
        }
        Ok(())
    }

    fn default_for(
        &self,
        signature: &Signature,
        position: usize,
    ) -> Result<NativeValue, BridgeError> {
        let param = &signature.params[position];
        let target = || self.type_name(param.ty);
        let default = param.default.as_ref().ok_or_else(|| {
            let reason = ConversionError::failed(format!("argument {position} is required"));
            BridgeError::conversion(target(), reason)
        })?;
        default.try_clone().ok_or_else(|| {
            let reason = ConversionError::failed("default value holds a unique owner");
            BridgeError::conversion(target(), reason)
        })
    }

    /// Render a signature with registered type names, e.g. `f(int32, string)`.
    pub fn describe(&self, signature: &Signature) -> String {
        let params: Vec<_> = signature.params.iter().map(|p| self.type_name(p.ty)).collect();
        format!("{}({})", signature.name, params.join(", "))
    }

    fn type_name(&self, ty: TypeHash) -> String {
        self.registry.descriptor(ty).map_or_else(|| ty.to_string(), |d| d.name.clone())
    }
}

/// The wrapper argument `position` moves its object out of, if any.
fn moved_from<'a>(
    modes: &[OwnershipMode],
    args: &'a [DynamicValue],
    position: usize,
) -> Option<&'a WrapperHandle> {
    match (modes.get(position), args.get(position)) {
        (Some(OwnershipMode::Move), Some(DynamicValue::Object(wrapper))) => Some(wrapper),
        _ => None,
    }
}

/// Put objects taken by `Move` arguments back into the wrappers they came from.
fn restore_moved(
    args: &[DynamicValue],
    modes: &[OwnershipMode],
    out: &mut [Option<NativeValue>],
) {
    for (position, slot) in out.iter_mut().enumerate() {
        let Some(wrapper) = moved_from(modes, args, position) else {
            continue;
        };
        if let Some(NativeValue::Object(ObjectValue::Unique(unique))) = slot {
            if let Some(object) = std::mem::take(unique).into_inner() {
                if let Err(object) = wrapper.restore_owned(object) {
                    *unique = UniqueObject::new(object);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossbind_core::{
        CallbackHandle, ClassInfo, DetachedBinder, NativeObject, ObjectValue, OwnershipMode,
        PrimitiveKind, StorageKind, TypeDescriptor, TypeHash, UniqueObject,
    };
    use crossbind_registry::TypeRegistryBuilder;

    use crate::policy::TieBreak;

    fn int32() -> TypeHash {
        PrimitiveKind::Int32.type_hash()
    }

    fn double() -> TypeHash {
        PrimitiveKind::Double.type_hash()
    }

    fn text() -> TypeHash {
        TypeDescriptor::text().hash
    }

    fn callback() -> TypeDescriptor {
        TypeDescriptor::callable(Signature::new("callback"))
    }

    fn resolver(policy: ResolvePolicy) -> OverloadResolver {
        let mut builder = TypeRegistryBuilder::new();
        builder.register(callback()).unwrap();
        builder.register(TypeDescriptor::class("Widget", ClassInfo::new())).unwrap();
        OverloadResolver::new(Arc::new(builder.build().unwrap()), policy)
    }

    fn resolve(
        resolver: &OverloadResolver,
        group: &OverloadGroup,
        args: &[DynamicValue],
    ) -> Result<Resolution, BridgeError> {
        resolver.resolve(group, args, &DetachedBinder)
    }

    fn numeric_group() -> OverloadGroup {
        OverloadGroup::builder("f")
            .candidate(Signature::new("f").param(double(), StorageKind::Value))
            .unwrap()
            .candidate(Signature::new("f").param(int32(), StorageKind::Value))
            .unwrap()
            .candidate(Signature::new("f").param(text(), StorageKind::ConstRef))
            .unwrap()
            .build()
    }

    #[test]
    fn exact_match_beats_earlier_implicit() {
        let resolver = resolver(ResolvePolicy::default());
        let resolution = resolve(&resolver, &numeric_group(), &[DynamicValue::Int(3)]).unwrap();
        assert_eq!(resolution.index, 1);
        assert_eq!(resolution.args, vec![NativeValue::I32(3)]);
    }

    #[test]
    fn resolution_is_deterministic() {
        let resolver = resolver(ResolvePolicy::default());
        let group = numeric_group();
        for _ in 0..100 {
            let resolution = resolve(&resolver, &group, &[DynamicValue::from("s")]).unwrap();
            assert_eq!(resolution.index, 2);
        }
    }

    #[test]
    fn out_of_range_falls_through_to_float() {
        let resolver = resolver(ResolvePolicy::default());
        let big = DynamicValue::Int(1i128 << 40);
        let resolution = resolve(&resolver, &numeric_group(), &[big]).unwrap();
        assert_eq!(resolution.index, 0);
        assert_eq!(resolution.args, vec![NativeValue::F64(1099511627776.0)]);

        // neither int32 nor an exact double
        let inexact = DynamicValue::Int((1i128 << 53) + 1);
        let err = resolve(&resolver, &numeric_group(), &[inexact]).unwrap_err();
        assert!(matches!(err, BridgeError::NoViableOverload { .. }));
    }

    #[test]
    fn no_viable_overload_lists_argument_shapes() {
        let resolver = resolver(ResolvePolicy::default());
        let args = [DynamicValue::None, DynamicValue::Int(1)];
        let err = resolve(&resolver, &numeric_group(), &args).unwrap_err();
        match err {
            BridgeError::NoViableOverload { name, args } => {
                assert_eq!(name, "f");
                assert_eq!(args, "(None, int)");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn max_cost_limits_viability() {
        let policy = ResolvePolicy::default().with_max_cost(Conversion::COST_TEXT_BYTES);
        let resolver = resolver(policy);
        let group = OverloadGroup::builder("g")
            .candidate(Signature::new("g").param(double(), StorageKind::Value))
            .unwrap()
            .build();
        assert!(resolve(&resolver, &group, &[DynamicValue::Int(1)]).is_err());
        assert!(resolve(&resolver, &group, &[DynamicValue::Float(1.0)]).is_ok());
    }

    #[test]
    fn default_callable_overload_wins_with_no_arguments() {
        let resolver = resolver(ResolvePolicy::default());
        let with_callback = Signature::new("Create").param_default(
            callback().hash,
            StorageKind::Value,
            NativeValue::Absent,
        );
        let group = OverloadGroup::builder("Create")
            .candidate(with_callback)
            .unwrap()
            .candidate(Signature::new("Create").param(text(), StorageKind::ConstRef))
            .unwrap()
            .build();

        let none = resolve(&resolver, &group, &[]).unwrap();
        assert_eq!(none.index, 0);
        assert_eq!(none.args, vec![NativeValue::Absent]);

        let named = resolve(&resolver, &group, &[DynamicValue::from("widget")]).unwrap();
        assert_eq!(named.index, 1);
        assert_eq!(named.args, vec![NativeValue::Text("widget".into())]);

        let cb = CallbackHandle::dynamic("cb", |_call| Ok(DynamicValue::None));
        let with_callback = resolve(&resolver, &group, &[DynamicValue::Callable(cb)]).unwrap();
        assert_eq!(with_callback.index, 0);
    }

    #[test]
    fn strict_tie_break_reports_ambiguity() {
        let resolver = resolver(ResolvePolicy::default().with_tie_break(TieBreak::Strict));
        let group = OverloadGroup::builder("h")
            .candidate(Signature::new("h").param_default(
                int32(),
                StorageKind::Value,
                NativeValue::I32(0),
            ))
            .unwrap()
            .candidate(Signature::new("h").param_default(
                text(),
                StorageKind::Value,
                NativeValue::Text(String::new()),
            ))
            .unwrap()
            .build();
        let err = resolve(&resolver, &group, &[]).unwrap_err();
        assert!(matches!(
            err,
            BridgeError::AmbiguousOverload { ref candidates, .. }
                if candidates == "h(int32) and h(string)"
        ));

        let relaxed = self::resolver(ResolvePolicy::default());
        assert_eq!(resolve(&relaxed, &group, &[]).unwrap().index, 0);
    }

    #[test]
    fn scoring_does_not_move_out_of_wrappers() {
        let resolver = resolver(ResolvePolicy::default());
        let widget = resolver.registry().hash_of("Widget").unwrap();
        let (value, _) = owned_widget(&resolver, 7);

        // the first candidate is viable by score but a later one wins
        let group = OverloadGroup::builder("take")
            .candidate(
                Signature::new("take")
                    .param(widget, StorageKind::Unique)
                    .param(double(), StorageKind::Value),
            )
            .unwrap()
            .candidate(
                Signature::new("take")
                    .param(widget, StorageKind::ConstRef)
                    .param(int32(), StorageKind::Value),
            )
            .unwrap()
            .build();
        let args = [value.clone(), DynamicValue::Int(1)];
        let resolution = resolve(&resolver, &group, &args).unwrap();
        assert_eq!(resolution.index, 1);
        assert!(!value.as_object().unwrap().is_empty());
        let mode = resolver.registry().plan(widget, Direction::ToNative, StorageKind::Unique);
        assert_eq!(mode, Some(OwnershipMode::Move));
    }

    fn owned_widget(resolver: &OverloadResolver, value: u32) -> (DynamicValue, NativeObject) {
        let widget = resolver.registry().hash_of("Widget").unwrap();
        let object = NativeObject::new(widget, value);
        let native = NativeValue::Object(ObjectValue::Unique(UniqueObject::new(object.clone())));
        let value = resolver.registry().convert_to_dynamic(native, widget, StorageKind::Unique);
        (value.unwrap(), object)
    }

    #[test]
    fn one_wrapper_cannot_be_moved_twice() {
        let resolver = resolver(ResolvePolicy::default());
        let widget = resolver.registry().hash_of("Widget").unwrap();
        let (value, object) = owned_widget(&resolver, 1);
        let group = OverloadGroup::builder("pair")
            .candidate(
                Signature::new("pair")
                    .param(widget, StorageKind::Unique)
                    .param(widget, StorageKind::Unique),
            )
            .unwrap()
            .build();

        let err = resolve(&resolver, &group, &[value.clone(), value.clone()]).unwrap_err();
        assert!(matches!(
            err,
            BridgeError::Conversion {
                reason: ConversionError::Ownership(OwnershipError::MovedTwice { token }),
                ..
            } if token == object.token()
        ));
        assert!(value.as_object().unwrap().holds_owned());
        assert!(object.is_alive());
    }

    #[test]
    fn moves_happen_after_other_arguments() {
        let resolver = resolver(ResolvePolicy::default());
        let widget = resolver.registry().hash_of("Widget").unwrap();
        let (value, object) = owned_widget(&resolver, 1);
        let signature = Signature::new("take")
            .param(widget, StorageKind::Unique)
            .param(int32(), StorageKind::Value);

        let args = [value.clone(), DynamicValue::from("x")];
        let err = resolver.materialize(&signature, &args, &DetachedBinder);
        assert!(err.unwrap_err().is_conversion());
        assert!(value.as_object().unwrap().holds_owned());
        assert!(object.is_alive());
    }

    #[test]
    fn failed_move_puts_earlier_moves_back() {
        let resolver = resolver(ResolvePolicy::default());
        let widget = resolver.registry().hash_of("Widget").unwrap();
        let (owned, object) = owned_widget(&resolver, 1);
        let borrowed = NativeValue::Object(ObjectValue::borrowed(NativeObject::new(widget, 2u32)));
        let view = resolver
            .registry()
            .convert_to_dynamic(borrowed, widget, StorageKind::ConstRef)
            .unwrap();
        let signature = Signature::new("swap")
            .param(widget, StorageKind::Unique)
            .param(widget, StorageKind::Unique);

        let args = [owned.clone(), view];
        let err = resolver.materialize(&signature, &args, &DetachedBinder).unwrap_err();
        assert!(matches!(
            err,
            BridgeError::Conversion {
                reason: ConversionError::Ownership(OwnershipError::NotOwned),
                ..
            }
        ));
        let wrapper = owned.as_object().unwrap();
        assert!(wrapper.holds_owned());
        assert!(object.is_alive());
        assert_eq!(wrapper.with_object(|v: &u32| *v).unwrap(), 1);
    }
}
