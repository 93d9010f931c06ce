mod common;

use std::sync::Arc;

use common::Call;
use metabridge::descriptor::{build_descriptor, Resolved};
use metabridge::host::{object_class, plain_object_class, MetaClassBuilder, NativeHandler};
use metabridge::wire::{DataType, ForeignHandle, ListPropertyRef, ObjectId, WireValue};
use metabridge::{
    CallbackToken, DispatchError, Engine, ErrorHandle, FieldRef, MetaCall, TypeDescriptor, Variant,
};

const HANDLE: ForeignHandle = ForeignHandle(0x77);

fn field(index: i32) -> FieldRef {
    FieldRef {
        index,
        getter: None,
        setter: None,
    }
}

#[test]
fn local_indices_partition_into_fields_and_methods() {
    let descriptor = common::gopher();
    let meta = build_descriptor(&descriptor).expect("build");
    let (f, m) = (descriptor.fields().len(), descriptor.methods().len());

    for i in 0..f {
        assert_eq!(meta.resolve(MetaCall::ReadProperty, i), Resolved::Field(i));
        assert_eq!(meta.resolve(MetaCall::WriteProperty, i), Resolved::Field(i));
        assert_eq!(meta.resolve(MetaCall::InvokeMethod, i), Resolved::ChangeSignal(i));
    }
    for i in f..f + m {
        assert_eq!(meta.resolve(MetaCall::InvokeMethod, i), Resolved::Method(i - f));
    }
    for i in f + m..f + m + 4 {
        assert_eq!(meta.resolve(MetaCall::InvokeMethod, i), Resolved::OutOfRange);
    }
    assert_eq!(meta.resolve(MetaCall::ReadProperty, f), Resolved::OutOfRange);
}

#[test]
fn out_of_range_indices_never_reach_the_runtime() {
    let (runtime, engine) = common::engine();
    let obj = engine.wrap(HANDLE, &common::gopher(), None).expect("wrap");
    let class = engine.class_of(obj).expect("class");
    runtime.clear();

    let mut slots = vec![Variant::Invalid; 4];
    let past_methods = class.method_count();
    let past_fields = class.property_count();
    assert!(matches!(
        engine.meta_call(obj, MetaCall::InvokeMethod, past_methods, &mut slots),
        Err(DispatchError::IndexOutOfRange { .. })
    ));
    assert!(matches!(
        engine.meta_call(obj, MetaCall::ReadProperty, past_fields, &mut slots),
        Err(DispatchError::IndexOutOfRange { .. })
    ));
    assert!(matches!(
        engine.meta_call(obj, MetaCall::WriteProperty, past_fields + 10, &mut slots),
        Err(DispatchError::IndexOutOfRange { .. })
    ));
    assert!(runtime.calls().is_empty());
}

#[test]
fn base_members_are_served_natively() {
    let (runtime, engine) = common::engine();
    let obj = engine.wrap(HANDLE, &common::gopher(), None).expect("wrap");
    runtime.clear();

    engine
        .set_property(obj, "objectName", Variant::from("digger"))
        .expect("set");
    assert_eq!(
        engine.property(obj, "objectName").expect("get"),
        Variant::from("digger")
    );
    assert!(runtime.calls().is_empty());
}

#[test]
fn reads_decode_the_foreign_value() {
    let (runtime, engine) = common::engine();
    let obj = engine.wrap(HANDLE, &common::gopher(), None).expect("wrap");
    runtime.set_field(HANDLE, 1, WireValue::Int(3));

    assert_eq!(engine.property(obj, "age").expect("read"), Variant::Int(3));
    assert_eq!(engine.read(obj, "age").expect("read"), WireValue::Int(3));
    assert_eq!(engine.property(obj, "name").expect("read"), Variant::Invalid);
    assert_eq!(
        runtime.calls()[0],
        Call::ReadField(HANDLE, field(1))
    );
}

#[test]
fn computed_fields_pass_getter_and_setter() {
    let descriptor = TypeDescriptor::builder("Rect")
        .field("Width", DataType::Number, 0)
        .computed_field("Area", DataType::Number, 4, Some(5))
        .build();
    let (runtime, engine) = common::engine();
    let obj = engine.wrap(HANDLE, &descriptor, None).expect("wrap");
    runtime.set_field(HANDLE, 4, WireValue::Number(12.0));

    assert_eq!(engine.property(obj, "area").expect("read"), Variant::Double(12.0));
    engine.write(obj, "area", WireValue::Number(1.0)).expect("write");

    let computed = FieldRef {
        index: -1,
        getter: Some(4),
        setter: Some(5),
    };
    assert_eq!(
        runtime.calls(),
        vec![
            Call::ReadField(HANDLE, computed),
            Call::WriteField(HANDLE, computed, WireValue::Number(1.0)),
        ]
    );
}

#[test]
fn list_fields_unwrap_into_list_properties() {
    let (runtime, engine) = common::engine();
    let obj = engine.wrap(HANDLE, &common::gopher(), None).expect("wrap");
    let list = ListPropertyRef {
        handle: HANDLE,
        field_index: 2,
        setter_index: Some(7),
    };
    runtime.set_field(HANDLE, 2, WireValue::ListProperty(list));

    assert_eq!(
        engine.property(obj, "friends").expect("read"),
        Variant::ListProperty(list)
    );
}

#[test]
#[should_panic(expected = "instead of a list property")]
fn list_fields_must_read_back_as_list_properties() {
    let (runtime, engine) = common::engine();
    let obj = engine.wrap(HANDLE, &common::gopher(), None).expect("wrap");
    runtime.set_field(HANDLE, 2, WireValue::Int(1));
    let _ = engine.property(obj, "friends");
}

#[test]
fn list_property_operations_go_through_hooks() {
    let (runtime, engine) = common::engine();
    let _owner = engine.wrap(HANDLE, &common::gopher(), None).expect("wrap");
    let friend = engine.wrap(ForeignHandle(0x78), &common::gopher(), None).expect("wrap");
    let list = ListPropertyRef {
        handle: HANDLE,
        field_index: 2,
        setter_index: Some(7),
    };

    engine.list_append(&list, friend).expect("append");
    assert_eq!(engine.list_count(&list), Ok(1));
    assert_eq!(engine.list_at(&list, 0), Ok(friend));
    assert_eq!(engine.list_contents(&list), Ok(Variant::ObjectList(vec![friend])));
    assert!(matches!(
        engine.list_at(&list, 1),
        Err(DispatchError::IndexOutOfRange { .. })
    ));

    engine.list_clear(&list).expect("clear");
    assert_eq!(engine.list_count(&list), Ok(0));

    let read_only = ListPropertyRef {
        setter_index: None,
        ..list
    };
    assert!(matches!(
        engine.list_append(&read_only, friend),
        Err(DispatchError::NotWritable { .. })
    ));
    let dangling = ListPropertyRef {
        handle: ForeignHandle(0xdead),
        ..list
    };
    assert_eq!(
        engine.list_count(&dangling),
        Err(DispatchError::UnknownHandle(ForeignHandle(0xdead)))
    );
}

#[test]
fn writes_always_fire_the_change_signal() {
    let (runtime, engine) = common::engine();
    let obj = engine.wrap(HANDLE, &common::gopher(), None).expect("wrap");
    engine
        .connect(obj, "__nameChanged", 0, CallbackToken(1))
        .expect("connect");

    engine.write(obj, "name", WireValue::string("Ann")).expect("write");
    engine.write(obj, "name", WireValue::string("Ann")).expect("write");

    assert_eq!(
        runtime.count(|c| matches!(c, Call::WriteField(_, f, _) if f.index == 0)),
        2
    );
    assert_eq!(
        runtime.count(|c| *c == Call::SignalCall(CallbackToken(1), Vec::new())),
        2
    );
}

#[test]
fn native_writes_notify_only_on_change() {
    let (runtime, engine) = common::engine();
    let obj = engine.create_object(&object_class(), None).expect("object");
    engine
        .connect(obj, "objectNameChanged", 0, CallbackToken(9))
        .expect("connect");

    engine.set_property(obj, "objectName", Variant::from("a")).expect("set");
    engine.set_property(obj, "objectName", Variant::from("a")).expect("set");
    engine.set_property(obj, "objectName", Variant::from("b")).expect("set");

    assert_eq!(runtime.count(|c| matches!(c, Call::SignalCall(..))), 2);
}

#[test]
fn property_errors_are_descriptive() {
    let (_runtime, engine) = common::engine();
    let obj = engine.create_object(&object_class(), None).expect("object");

    assert_eq!(
        engine.property(obj, "missing"),
        Err(DispatchError::NoSuchProperty {
            class: "Object".into(),
            name: "missing".into()
        })
    );
    let err = engine
        .set_property(obj, "objectName", Variant::Int(3))
        .unwrap_err();
    assert_eq!(
        err,
        DispatchError::TypeMismatch {
            name: "objectName".into(),
            expected: "String".into(),
            got: "int".into()
        }
    );
    assert_eq!(
        err.to_string(),
        "cannot set property \"objectName\" with type String to value of int"
    );

    let plain = engine.create_object(&plain_object_class(), None).expect("plain");
    assert!(matches!(
        engine.set_property(plain, "plainType", Variant::from("x")),
        Err(DispatchError::NotWritable { .. })
    ));
}

#[test]
fn methods_forward_arguments_and_results() {
    let (runtime, engine) = common::engine();
    let obj = engine.wrap(HANDLE, &common::gopher(), None).expect("wrap");
    runtime.set_result(0, WireValue::string("hole"));
    runtime.set_result(1, WireValue::string("ignored"));
    runtime.set_result(2, WireValue::list([WireValue::Int(1), WireValue::Int(2)]));
    runtime.clear();

    assert_eq!(
        engine.invoke(obj, "dig", vec![WireValue::Int(3)]),
        Ok(WireValue::string("hole"))
    );
    assert_eq!(engine.invoke(obj, "rest", Vec::new()), Ok(WireValue::Invalid));
    assert_eq!(
        engine.invoke(obj, "split", vec![WireValue::Bool(true), WireValue::Number(0.5)]),
        Ok(WireValue::list([WireValue::Int(1), WireValue::Int(2)]))
    );

    assert_eq!(
        runtime.calls(),
        vec![
            Call::CallMethod(HANDLE, 0, vec![WireValue::Int(3)]),
            Call::CallMethod(HANDLE, 1, Vec::new()),
            Call::CallMethod(HANDLE, 2, vec![WireValue::Bool(true), WireValue::Number(0.5)]),
        ]
    );
}

#[test]
fn missing_trailing_arguments_are_invalid() {
    let (runtime, engine) = common::engine();
    let obj = engine.wrap(HANDLE, &common::gopher(), None).expect("wrap");
    runtime.clear();

    engine.invoke(obj, "split", vec![WireValue::Int(1)]).expect("invoke");
    assert_eq!(
        runtime.calls(),
        vec![Call::CallMethod(HANDLE, 2, vec![WireValue::Int(1), WireValue::Invalid])]
    );
}

#[test]
fn argument_slots_must_cover_the_method() {
    let (runtime, engine) = common::engine();
    let obj = engine.wrap(HANDLE, &common::gopher(), None).expect("wrap");
    let class = engine.class_of(obj).expect("class");
    let split = (0..class.method_count())
        .find(|&i| class.method(i).is_some_and(|m| m.name == "split"))
        .expect("split");
    runtime.clear();

    let mut slots = vec![Variant::Invalid; 2];
    assert_eq!(
        engine.meta_call(obj, MetaCall::InvokeMethod, split, &mut slots),
        Err(DispatchError::ArgumentSlots {
            call: MetaCall::InvokeMethod,
            expected: 3,
            got: 2
        })
    );
    assert!(runtime.calls().is_empty());
}

fn returns(text: &'static str) -> NativeHandler {
    Arc::new(
        move |_: &Engine, _: ObjectId, _: &[Variant]| -> Result<Variant, DispatchError> {
            Ok(Variant::from(text))
        },
    )
}

#[test]
fn method_lookup_prefers_exact_arity_then_the_most_derived() {
    let mut base = MetaClassBuilder::new("Greeter", Some(object_class()));
    base.add_native_method("greet(Variant)", Some("Variant"), returns("base"))
        .expect("method");
    let base = base.build();
    let mut derived = MetaClassBuilder::new("LoudGreeter", Some(base));
    derived
        .add_native_method("greet(Variant,Variant)", Some("Variant"), returns("derived"))
        .expect("method");
    let derived = derived.build();

    let (_runtime, engine) = common::engine();
    let obj = engine.create_object(&derived, None).expect("object");
    let one = vec![WireValue::Int(1)];
    let two = vec![WireValue::Int(1), WireValue::Int(2)];

    assert_eq!(engine.invoke(obj, "greet", one), Ok(WireValue::string("base")));
    assert_eq!(engine.invoke(obj, "greet", two), Ok(WireValue::string("derived")));
    assert_eq!(engine.invoke(obj, "greet", Vec::new()), Ok(WireValue::string("derived")));
    assert_eq!(
        engine.invoke(obj, "greet", vec![WireValue::Invalid; 3]),
        Err(DispatchError::TooFewParameters {
            name: "greet".into(),
            declared: 2,
            provided: 3
        })
    );
}

#[test]
fn unknown_methods_are_reported_after_searching_every_class() {
    let (_runtime, engine) = common::engine();
    let obj = engine.wrap(HANDLE, &common::gopher(), None).expect("wrap");

    // root-class slot is still found from the proxy class
    assert_eq!(engine.invoke(obj, "deleteLater", Vec::new()), Ok(WireValue::Invalid));
    assert_eq!(
        engine.invoke(obj, "wave", Vec::new()),
        Err(DispatchError::NoSuchMethod { name: "wave".into() })
    );
    // signals are not invokable by name
    assert_eq!(
        engine.invoke(obj, "destroyed", Vec::new()),
        Err(DispatchError::NoSuchMethod {
            name: "destroyed".into()
        })
    );
}

#[test]
fn handler_failures_become_invocation_errors() {
    let mut b = MetaClassBuilder::new("Fragile", Some(object_class()));
    b.add_native_method(
        "poke()",
        None,
        Arc::new(
            |_: &Engine, obj: ObjectId, _: &[Variant]| -> Result<Variant, DispatchError> {
                Err(DispatchError::NotAProxy(obj))
            },
        ),
    )
    .expect("method");
    let class = b.build();

    let (_runtime, engine) = common::engine();
    let obj = engine.create_object(&class, None).expect("object");
    assert!(matches!(
        engine.invoke(obj, "poke", Vec::new()),
        Err(DispatchError::InvocationFailed { .. })
    ));
}

#[test]
fn foreign_mutations_fire_change_signals() {
    let (runtime, engine) = common::engine();
    let obj = engine.wrap(HANDLE, &common::gopher(), None).expect("wrap");
    engine
        .connect(obj, "__ageChanged", 0, CallbackToken(4))
        .expect("connect");

    engine.field_changed(HANDLE, 1).expect("changed");
    assert_eq!(runtime.count(|c| matches!(c, Call::SignalCall(CallbackToken(4), _))), 1);

    assert!(matches!(
        engine.field_changed(HANDLE, 10),
        Err(DispatchError::UnknownField { index: 10, .. })
    ));
    assert_eq!(
        engine.field_changed(ForeignHandle(1), 0),
        Err(DispatchError::UnknownHandle(ForeignHandle(1)))
    );
}

#[test]
fn reported_errors_reach_the_runtime() {
    let (runtime, engine) = common::engine();
    let obj = engine.create_object(&object_class(), None).expect("object");

    let result = engine.report(engine.invoke(obj, "wave", Vec::new()));
    assert_eq!(result, Err(ErrorHandle(1)));
    assert_eq!(
        runtime.errors.borrow().as_slice(),
        ["object does not expose a method \"wave\"".to_string()]
    );
}

#[test]
fn operations_on_dead_objects_fail() {
    let (_runtime, engine) = common::engine();
    let obj = engine.wrap(HANDLE, &common::gopher(), None).expect("wrap");
    engine.destroy(obj);

    assert_eq!(engine.property(obj, "name"), Err(DispatchError::NotAlive(obj)));
    assert_eq!(
        engine.invoke(obj, "dig", Vec::new()),
        Err(DispatchError::NotAlive(obj))
    );
    assert_eq!(engine.foreign_handle(obj), Err(DispatchError::NotAlive(obj)));
}
