mod common;

use std::sync::Arc;

use common::Call;
use metabridge::wire::DataType;
use metabridge::{
    build_descriptor, BuildError, DispatchError, FactoryKind, ForeignSpec, Registry,
    RegistrationError, TypeDescriptor, TypeId,
};

fn point() -> Arc<TypeDescriptor> {
    TypeDescriptor::builder("Point")
        .field("X", DataType::Number, 0)
        .field("Y", DataType::Number, 1)
        .method("Length", 0, 0, 1)
        .build()
}

#[test]
fn registered_types_are_found_by_uri_and_name() {
    let registry = Registry::new();
    let id = registry
        .register_type("geometry", 1, 0, point(), ForeignSpec(1))
        .expect("register");

    assert_eq!(registry.lookup("geometry", "Point"), Some(id));
    assert_eq!(registry.lookup("other", "Point"), None);
    let ty = registry.get(id).expect("registered");
    assert_eq!(ty.name(), "Point");
    assert_eq!(ty.version, (1, 0));
    assert_eq!(ty.kind, FactoryKind::Instance);
    assert_eq!(registry.factory(id).map(|f| f.type_id()), Some(id));
}

#[test]
fn names_are_unique_per_uri() {
    let registry = Registry::new();
    registry
        .register_type("geometry", 1, 0, point(), ForeignSpec(1))
        .expect("register");

    assert_eq!(
        registry.register_type("geometry", 1, 1, point(), ForeignSpec(2)),
        Err(RegistrationError::Duplicate {
            uri: "geometry".into(),
            name: "Point".into(),
        })
    );
    registry
        .register_type("drawing", 1, 0, point(), ForeignSpec(3))
        .expect("same name under another uri");
    assert_eq!(registry.len(), 2);
}

#[test]
fn empty_names_are_rejected() {
    let registry = Registry::new();
    let nameless = TypeDescriptor::builder("").build();
    assert_eq!(
        registry.register_type("geometry", 1, 0, nameless, ForeignSpec(1)),
        Err(RegistrationError::EmptyName)
    );
    assert!(registry.is_empty());
}

#[test]
fn failed_builds_leave_nothing_registered() {
    let registry = Registry::new();
    let clash = TypeDescriptor::builder("Clash")
        .field("Size", DataType::NumberI, 0)
        .method("Size", 0, 0, 1)
        .build();

    let err = registry
        .register_type("geometry", 1, 0, clash, ForeignSpec(1))
        .unwrap_err();
    assert_eq!(
        err,
        RegistrationError::Build {
            name: "Clash".into(),
            source: BuildError::DuplicateMember {
                type_name: "Clash".into(),
                name: "size".into(),
            },
        }
    );
    assert_eq!(registry.lookup("geometry", "Clash"), None);
    assert!(registry.is_empty());

    // the next successful registration still gets the first id
    let id = registry
        .register_type("geometry", 1, 0, point(), ForeignSpec(1))
        .expect("register");
    assert_eq!(id, TypeId(1));
}

#[test]
fn create_instantiates_through_the_factory() {
    let registry = Registry::new();
    let id = registry
        .register_type("geometry", 1, 0, point(), ForeignSpec(7))
        .expect("register");
    let (runtime, engine) = common::engine_with(registry);

    let parent = engine.root();
    let obj = engine.create(id, Some(parent)).expect("create");
    let other = engine.create(id, None).expect("create");
    assert_ne!(obj, other);

    assert_eq!(
        runtime.count(|c| *c == Call::Instantiate(ForeignSpec(7))),
        2
    );
    assert_eq!(engine.type_name(obj).as_deref(), Ok("Point"));
    assert_eq!(engine.parent(obj), Some(parent));
    let handle = engine.foreign_handle(obj).expect("proxy");
    assert_eq!(engine.object_for_handle(handle), Some(obj));
}

#[test]
fn create_rejects_unknown_types() {
    let (runtime, engine) = common::engine();
    assert_eq!(
        engine.create(TypeId(42), None),
        Err(DispatchError::UnknownType(TypeId(42)))
    );
    assert!(runtime.calls().is_empty());
}

#[test]
fn create_refuses_a_dead_parent_before_instantiating() {
    let registry = Registry::new();
    let id = registry
        .register_type("geometry", 1, 0, point(), ForeignSpec(7))
        .expect("register");
    let (runtime, engine) = common::engine_with(registry);
    let parent = engine.create(id, None).expect("create");
    engine.destroy(parent);

    assert_eq!(
        engine.create(id, Some(parent)),
        Err(DispatchError::NotAlive(parent))
    );
    assert_eq!(runtime.count(|c| matches!(c, Call::Instantiate(_))), 1);
}

#[test]
fn singletons_are_created_once_under_the_root() {
    let registry = Registry::new();
    let id = registry
        .register_singleton("geometry", 1, 0, point(), ForeignSpec(3))
        .expect("register");
    assert_eq!(registry.get(id).map(|t| t.kind), Some(FactoryKind::Singleton));
    let (runtime, engine) = common::engine_with(registry);

    let first = engine.singleton(id).expect("singleton");
    let again = engine.singleton(id).expect("singleton");
    assert_eq!(first, again);
    assert_eq!(engine.parent(first), Some(engine.root()));
    assert_eq!(runtime.count(|c| matches!(c, Call::Instantiate(_))), 1);

    // a destroyed singleton is recreated on demand
    engine.destroy(first);
    let fresh = engine.singleton(id).expect("singleton");
    assert_ne!(fresh, first);
    assert_eq!(runtime.count(|c| matches!(c, Call::Instantiate(_))), 2);
}

#[test]
fn factories_for_one_layout_differ_only_in_spec() {
    let registry = Registry::new();
    let a = registry
        .register_type("geometry", 1, 0, point(), ForeignSpec(1))
        .expect("register");
    let b = registry
        .register_type("drawing", 1, 0, point(), ForeignSpec(2))
        .expect("register");

    let stamp_a = registry.factory(a).expect("factory").stamp();
    let stamp_b = registry.factory(b).expect("factory").stamp();
    assert_eq!(stamp_a.layout, stamp_b.layout);
    assert_eq!((stamp_a.spec, stamp_b.spec), (ForeignSpec(1), ForeignSpec(2)));
}

#[test]
fn descriptors_build_once() {
    let descriptor = point();
    let first = build_descriptor(&descriptor).expect("build");
    let again = build_descriptor(&descriptor).expect("build");
    assert!(Arc::ptr_eq(&first, &again));

    let class = first.class();
    let x = class.index_of_property("x").expect("x");
    assert_eq!(x, class.property_offset());
    assert_eq!(again.class().index_of_property("y"), Some(x + 1));
    assert_eq!(first.change_signal(1), class.method_offset() + 1);
}

#[test]
fn the_registry_is_shared_between_engines() {
    let registry = Registry::new();
    let id = registry
        .register_type("geometry", 1, 0, point(), ForeignSpec(1))
        .expect("register");
    let (_r1, one) = common::engine_with(registry.clone());
    let (_r2, two) = common::engine_with(registry);

    let a = one.create(id, None).expect("create");
    let b = two.create(id, None).expect("create");
    assert_eq!(
        one.proxy(a).map(|p| p.meta().layout_hash()),
        two.proxy(b).map(|p| p.meta().layout_hash())
    );
}

#[test]
fn singleton_types_are_only_reached_through_singleton() {
    let registry = Registry::new();
    let id = registry
        .register_singleton("geometry", 1, 0, point(), ForeignSpec(3))
        .expect("register");
    let (runtime, engine) = common::engine_with(registry);

    assert_eq!(engine.create(id, None), Err(DispatchError::SingletonType(id)));
    assert_eq!(
        engine.create(id, Some(engine.root())),
        Err(DispatchError::SingletonType(id))
    );
    assert!(runtime.calls().is_empty());

    let only = engine.singleton(id).expect("singleton");
    assert_eq!(engine.create(id, None), Err(DispatchError::SingletonType(id)));
    assert_eq!(engine.singleton(id), Ok(only));
}

#[test]
fn instance_types_have_no_singleton() {
    let registry = Registry::new();
    let id = registry
        .register_type("geometry", 1, 0, point(), ForeignSpec(1))
        .expect("register");
    let (runtime, engine) = common::engine_with(registry);

    let err = engine.singleton(id).unwrap_err();
    assert_eq!(err, DispatchError::NotASingleton(id));
    assert_eq!(err.to_string(), format!("type {id} is not registered as a singleton"));
    assert!(runtime.calls().is_empty());
    assert_eq!(engine.singleton(TypeId(99)), Err(DispatchError::UnknownType(TypeId(99))));
}
