use ferrous_graph::{Constructed, Container, DiError, Instance, PluginType, Resolver, Settings};
use std::sync::Arc;

#[test]
fn test_self_circular_dependency() {
    struct SelfReferencing;

    let container = Container::new();
    container
        .add::<SelfReferencing>(Instance::factory(|ctx| {
            ctx.get::<SelfReferencing>()?;
            Ok(Arc::new(SelfReferencing))
        }))
        .unwrap();

    match container.get::<SelfReferencing>() {
        Err(DiError::CycleDetected { path }) => {
            assert_eq!(path.len(), 2);
            assert!(path.frames()[0].requested().to_string().contains("SelfReferencing"));
            assert!(path.frames()[1].requested().to_string().contains("SelfReferencing"));
        }
        other => panic!("Expected CycleDetected, got {:?}", other.map(|_| ())),
    }
}

#[test]
fn test_two_level_circular() {
    #[allow(dead_code)]
    struct A {
        b: Arc<B>,
    }

    #[allow(dead_code)]
    struct B {
        a: Arc<A>,
    }

    let container = Container::new();
    container
        .add::<A>(Constructed::new(|args| Ok(A { b: args.get("b")? })).depends_on("b", PluginType::of::<B>()))
        .unwrap();
    container
        .add::<B>(Constructed::new(|args| Ok(B { a: args.get("a")? })).depends_on("a", PluginType::of::<A>()))
        .unwrap();

    match container.get::<A>() {
        Err(DiError::CycleDetected { path }) => {
            let names: Vec<String> = path.frames().iter().map(|f| f.requested().to_string()).collect();
            assert_eq!(names.len(), 3);
            assert!(names[0].ends_with("::A"));
            assert!(names[1].ends_with("::B"));
            assert!(names[2].ends_with("::A"));
            // The rendered error shows the whole path
            let message = DiError::CycleDetected { path }.to_string();
            assert!(message.contains(" -> "));
        }
        other => panic!("Expected CycleDetected, got {:?}", other.map(|_| ())),
    }
}

#[test]
fn test_three_level_circular_through_factories() {
    struct A;
    struct B;
    struct C;

    let container = Container::new();
    container
        .add::<A>(Instance::factory(|ctx| {
            ctx.get::<B>()?;
            Ok(Arc::new(A))
        }))
        .unwrap();
    container
        .add::<B>(Instance::factory(|ctx| {
            ctx.get::<C>()?;
            Ok(Arc::new(B))
        }))
        .unwrap();
    container
        .add::<C>(Instance::factory(|ctx| {
            ctx.get::<A>()?;
            Ok(Arc::new(C))
        }))
        .unwrap();

    match container.get::<A>() {
        Err(DiError::CycleDetected { path }) => {
            assert_eq!(path.len(), 4);
            assert_eq!(path.root(), path.leaf());
        }
        other => panic!("Expected CycleDetected, got {:?}", other.map(|_| ())),
    }
}

#[test]
fn test_same_type_different_instances_is_not_a_cycle() {
    // The "wrapped" instance builds on the "inner" instance of the same family
    struct Layer {
        depth: usize,
    }

    let container = Container::new();
    let t = PluginType::of::<Layer>();
    container
        .add_instance(&t, Instance::from_fn(|| Layer { depth: 0 }).named("inner"))
        .unwrap();
    container
        .set_default(
            &t,
            Constructed::new(|args| {
                let inner = args.get::<Layer>("inner")?;
                Ok(Layer { depth: inner.depth + 1 })
            })
            .depends_on_named("inner", t.clone(), "inner")
            .named("wrapped"),
        )
        .unwrap();

    assert_eq!(container.get::<Layer>().unwrap().depth, 1);
}

#[test]
fn test_reference_loop_rejected_as_default() {
    let container = Container::new();
    let t = PluginType::of::<String>();
    container.add_instance(&t, Instance::reference("b").named("a")).unwrap();
    container.add_instance(&t, Instance::reference("a").named("b")).unwrap();

    match container.set_default_name(&t, "a") {
        Err(DiError::Configuration(message)) => assert!(message.contains("a -> b -> a")),
        other => panic!("Expected Configuration, got {:?}", other),
    }

    // Asked for by name, the loop is a cycle at build time
    assert!(matches!(
        container.get_named::<String>("a"),
        Err(DiError::CycleDetected { .. })
    ));
}

#[test]
fn test_max_depth_exceeded() {
    struct L0;
    struct L1;
    struct L2;
    struct L3;

    let container = Container::with_settings(Settings::default().with_max_depth(3));
    container
        .add::<L0>(Constructed::new(|_| Ok(L0)).depends_on("next", PluginType::of::<L1>()))
        .unwrap();
    container
        .add::<L1>(Constructed::new(|_| Ok(L1)).depends_on("next", PluginType::of::<L2>()))
        .unwrap();
    container
        .add::<L2>(Constructed::new(|_| Ok(L2)).depends_on("next", PluginType::of::<L3>()))
        .unwrap();
    container.add::<L3>(Instance::from_fn(|| L3)).unwrap();

    match container.get::<L0>() {
        Err(DiError::DepthExceeded { depth, path }) => {
            assert_eq!(depth, 3);
            assert_eq!(path.len(), 4);
            assert!(path.leaf().unwrap().requested().to_string().ends_with("L3"));
        }
        other => panic!("Expected DepthExceeded, got {:?}", other.map(|_| ())),
    }

    // Three levels fit
    assert!(container.get::<L1>().is_ok());
}

#[test]
fn test_recursion_across_sessions_hits_depth_limit() {
    struct Recursive;

    let container = Container::with_settings(Settings::default().with_max_depth(16));
    let inner = container.clone();
    container
        .add::<Recursive>(Instance::factory(move |_ctx| {
            // A new top-level call each time, so no frame repeats on one session
            inner.get::<Recursive>()?;
            Ok(Arc::new(Recursive))
        }))
        .unwrap();

    assert!(matches!(
        container.get::<Recursive>(),
        Err(DiError::DepthExceeded { depth: 16, .. })
    ));
    // The thread's depth counter is released after the failure
    container.eject_all(&PluginType::of::<Recursive>());
    container.add::<Recursive>(Instance::from_fn(|| Recursive)).unwrap();
    assert!(container.get::<Recursive>().is_ok());
}

#[test]
fn test_default_depth_limit_stops_runaway_recursion() {
    struct Node;

    // The usual 2 MiB test-thread stack
    let outcome = std::thread::Builder::new()
        .stack_size(2 * 1024 * 1024)
        .spawn(|| {
            let container = Container::new();
            let inner = container.clone();
            container
                .add::<Node>(Instance::factory(move |_ctx| {
                    inner.get::<Node>()?;
                    Ok(Arc::new(Node))
                }))
                .unwrap();
            container.get::<Node>().map(|_| ())
        })
        .unwrap()
        .join()
        .unwrap();

    match outcome {
        Err(DiError::DepthExceeded { depth, .. }) => assert_eq!(depth, Settings::default().max_depth),
        other => panic!("Expected DepthExceeded, got {:?}", other),
    }
}

#[test]
fn test_long_chain_fails_with_default_settings() {
    struct Level;

    let container = Container::new();
    let t = PluginType::of::<Level>();
    container.add_instance(&t, Instance::from_fn(|| Level).named("l0")).unwrap();
    for i in 1..1000 {
        container
            .add_instance(
                &t,
                Constructed::new(|_| Ok(Level))
                    .depends_on_named("inner", t.clone(), format!("l{}", i - 1))
                    .named(format!("l{}", i)),
            )
            .unwrap();
    }

    let limit = Settings::default().max_depth;
    match container.get_named::<Level>("l999") {
        Err(DiError::DepthExceeded { depth, path }) => {
            assert_eq!(depth, limit);
            assert_eq!(path.len(), limit + 1);
            assert_eq!(path.root().unwrap().instance(), "l999");
        }
        other => panic!("Expected DepthExceeded, got {:?}", other.map(|_| ())),
    }
    assert!(container.get_named::<Level>(&format!("l{}", limit - 1)).is_ok());
}
