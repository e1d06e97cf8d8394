//! Integration test for the process-wide bridge slot.
//!
//! The slot is shared by every test in this binary, so the lifecycle lives in
//! a single test.

use std::sync::Arc;

use crossbind::prelude::*;

fn greeter() -> Arc<Bridge> {
    let mut ctx = Context::new();
    let text = TypeDescriptor::text().hash;
    ctx.register_function(
        Signature::new("greet")
            .param(text, StorageKind::ConstRef)
            .returns(text, StorageKind::Value),
        |call: &mut CallContext<'_>| {
            let name: String = call.arg_as(0)?;
            call.set_return_value(format!("hello {name}"));
            Ok(())
        },
    )
    .unwrap();
    ctx.seal().unwrap()
}

#[test]
fn test_global_bridge_lifecycle() {
    assert!(!global::is_initialized());
    assert!(matches!(global::bridge(), Err(BridgeError::NotInitialized)));

    let bridge = greeter();
    assert!(global::install(Arc::clone(&bridge)).is_none());
    let installed = global::bridge().unwrap();
    let greeting = installed.call("greet", vec![DynamicValue::from("ada")]).unwrap();
    assert_eq!(greeting, DynamicValue::from("hello ada"));

    // wrappers outlive the slot
    let class = {
        let mut ctx = Context::new();
        let class = ctx.register_type(TypeDescriptor::class("Handle", ClassInfo::new())).unwrap();
        let other = ctx.seal().unwrap();
        global::install(other);
        class
    };
    let holder = global::bridge().unwrap();
    let object = NativeObject::new(class, 7u32);
    let wrapper = holder
        .bind(ObjectValue::Unique(UniqueObject::new(object.clone())), OwnershipMode::Move, class)
        .unwrap();

    assert!(global::teardown().is_some());
    assert!(!global::is_initialized());
    drop(holder);
    assert_eq!(wrapper.with_object(|v: &u32| *v).unwrap(), 7);
    drop(wrapper);
    assert!(!object.is_alive());
    assert!(global::teardown().is_none());
}
