use ferrous_graph::{
    Constructed, Container, DiError, Instance, Lifecycle, PluginType, Resolver, Value,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

trait Widget: Send + Sync {
    fn color(&self) -> &str;
}

#[derive(Debug, Clone)]
struct ColorWidget {
    color: String,
}

impl Widget for ColorWidget {
    fn color(&self) -> &str {
        &self.color
    }
}

fn color_widget(color: &str) -> Constructed<ColorWidget> {
    Constructed::new(|args| {
        Ok(ColorWidget {
            color: args.parse("color")?,
        })
    })
    .with_raw("color", color)
    .named(color)
}

fn widget_container() -> Container {
    let container = Container::new();
    container.register_cast::<ColorWidget, dyn Widget, _>(|w| w as Arc<dyn Widget>);
    container
}

#[test]
fn test_literal_is_shared() {
    let container = Container::new();
    container.add::<usize>(Instance::object(42usize)).unwrap();
    container.add::<String>(Instance::object("hello".to_string())).unwrap();

    let num1 = container.get_required::<usize>();
    let num2 = container.get_required::<usize>();
    let str1 = container.get_required::<String>();

    assert_eq!(*num1, 42);
    assert_eq!(*str1, "hello");
    assert!(Arc::ptr_eq(&num1, &num2));
}

#[test]
fn test_red_blue_widgets() {
    let container = widget_container();
    let widget = PluginType::of::<dyn Widget>();
    container.add_instance(&widget, color_widget("Red")).unwrap();
    container.add_instance(&widget, color_widget("Blue")).unwrap();
    container.set_default_name(&widget, "Red").unwrap();

    assert_eq!(container.get::<dyn Widget>().unwrap().color(), "Red");
    assert_eq!(container.get_named::<dyn Widget>("Blue").unwrap().color(), "Blue");

    assert_eq!(container.eject_all(&widget), 2);
    match container.get::<dyn Widget>() {
        Err(DiError::NoDefaultInstance { plugin_type, .. }) => assert!(plugin_type.contains("Widget")),
        other => panic!("expected NoDefaultInstance, got {:?}", other.map(|_| ())),
    }
}

#[test]
fn test_fallback_survives_eject_all() {
    let container = widget_container();
    let widget = PluginType::of::<dyn Widget>();
    container.add_instance(&widget, color_widget("Red")).unwrap();
    container.set_fallback(&widget, color_widget("Gray")).unwrap();

    assert_eq!(container.get::<dyn Widget>().unwrap().color(), "Red");
    container.eject_all(&widget);
    assert_eq!(container.get::<dyn Widget>().unwrap().color(), "Gray");
}

#[test]
fn test_sole_instance_is_default() {
    let container = widget_container();
    let widget = PluginType::of::<dyn Widget>();
    container.add_instance(&widget, color_widget("Green")).unwrap();
    assert_eq!(container.get::<dyn Widget>().unwrap().color(), "Green");

    container.add_instance(&widget, color_widget("Yellow")).unwrap();
    assert!(matches!(
        container.get::<dyn Widget>(),
        Err(DiError::NoDefaultInstance { .. })
    ));
}

#[test]
fn test_uncastable_instance_is_rejected() {
    let container = Container::new();
    // No cast from ColorWidget to dyn Widget registered
    let result = container.add::<dyn Widget>(color_widget("Red"));
    assert!(matches!(result, Err(DiError::Configuration(_))));
}

#[test]
fn test_constructed_with_dependencies() {
    #[derive(Debug)]
    struct Config {
        port: u16,
    }

    #[derive(Debug)]
    struct Server {
        config: Arc<Config>,
        name: String,
    }

    let container = Container::new();
    container.add::<Config>(Instance::object(Config { port: 8080 })).unwrap();
    container
        .add::<Server>(
            Constructed::new(|args| {
                Ok(Server {
                    config: args.get::<Config>("config")?,
                    name: args.parse("name")?,
                })
            })
            .depends_on("config", PluginType::of::<Config>())
            .with_raw("name", "MyServer"),
        )
        .unwrap();

    let server = container.get::<Server>().unwrap();
    assert_eq!(server.config.port, 8080);
    assert_eq!(server.name, "MyServer");
}

#[test]
fn test_named_dependency_and_inline_instance() {
    struct Pair {
        left: Arc<String>,
        right: Arc<String>,
    }

    let container = Container::new();
    container.add::<String>(Instance::object("a".to_string()).named("a")).unwrap();
    container.add::<String>(Instance::object("b".to_string()).named("b")).unwrap();
    container
        .add::<Pair>(
            Constructed::new(|args| {
                Ok(Pair {
                    left: args.get("left")?,
                    right: args.get("right")?,
                })
            })
            .depends_on_named("left", PluginType::of::<String>(), "b")
            .with_instance("right", Instance::object("inline".to_string())),
        )
        .unwrap();

    let pair = container.get::<Pair>().unwrap();
    assert_eq!(*pair.left, "b");
    assert_eq!(*pair.right, "inline");
}

#[test]
fn test_setter_injection() {
    #[derive(Default)]
    struct Client {
        retries: u32,
        endpoint: String,
    }

    let container = Container::new();
    container
        .add::<Client>(
            Constructed::new(|args| {
                Ok(Client {
                    endpoint: args.parse("endpoint")?,
                    ..Client::default()
                })
            })
            .with_raw("endpoint", "https://api")
            .setter(
                "retries",
                ferrous_graph::Dependency::Raw("3".into()),
                |client: &mut Client, args| {
                    client.retries = args.parse("retries")?;
                    Ok(())
                },
            ),
        )
        .unwrap();

    let client = container.get::<Client>().unwrap();
    assert_eq!(client.retries, 3);
    assert_eq!(client.endpoint, "https://api");
}

#[test]
fn test_bad_raw_argument() {
    struct Port(u16);

    let container = Container::new();
    container
        .add::<Port>(Constructed::new(|args| Ok(Port(args.parse("port")?))).with_raw("port", "http"))
        .unwrap();

    match container.get::<Port>() {
        Err(DiError::BadArgument { slot, path, .. }) => {
            assert_eq!(slot, "port");
            assert_eq!(path.len(), 1);
            assert!(path.root().unwrap().requested().to_string().ends_with("Port"));
        }
        other => panic!("expected BadArgument, got {:?}", other.map(|_| ())),
    }
}

#[test]
fn test_transient_factory_creates_new_instances() {
    let counter = Arc::new(Mutex::new(0));
    let counter_clone = counter.clone();

    let container = Container::new();
    container
        .add::<String>(Instance::from_fn(move || {
            let mut c = counter_clone.lock().unwrap();
            *c += 1;
            format!("instance-{}", *c)
        }))
        .unwrap();

    let a = container.get_required::<String>();
    let b = container.get_required::<String>();
    let c = container.get_required::<String>();

    assert_eq!(*a, "instance-1");
    assert_eq!(*b, "instance-2");
    assert_eq!(*c, "instance-3");
    assert!(!Arc::ptr_eq(&a, &b));
}

#[test]
fn test_prototype_copies() {
    #[derive(Clone)]
    struct Template {
        tags: Vec<String>,
    }

    let container = Container::new();
    container
        .add::<Template>(Instance::prototype(Template {
            tags: vec!["base".into()],
        }))
        .unwrap();

    let a = container.get::<Template>().unwrap();
    let b = container.get::<Template>().unwrap();
    assert!(!Arc::ptr_eq(&a, &b));
    assert_eq!(a.tags, b.tags);
}

#[test]
fn test_reference_points_at_sibling() {
    let container = Container::new();
    let t = PluginType::of::<String>();
    container
        .add_instance(&t, Instance::object("real".to_string()).named("real").singleton())
        .unwrap();
    container.set_default(&t, Instance::reference("real").named("alias")).unwrap();

    let via_alias = container.get::<String>().unwrap();
    let direct = container.get_named::<String>("real").unwrap();
    assert_eq!(*via_alias, "real");
    assert!(Arc::ptr_eq(&via_alias, &direct));
}

#[test]
fn test_factory_uses_context() {
    struct Leaf;
    struct Root {
        leaf: Arc<Leaf>,
    }

    let container = Container::new();
    container.add::<Leaf>(Instance::from_fn(|| Leaf)).unwrap();
    container
        .add::<Root>(Instance::factory(|ctx| Ok(Arc::new(Root { leaf: ctx.get::<Leaf>()? }))))
        .unwrap();

    let root = container.get::<Root>().unwrap();
    let _leaf: &Leaf = &root.leaf;
}

#[test]
fn test_try_get_and_try_resolve() {
    struct Missing;
    struct NeedsMissing;

    let container = Container::new();
    assert!(container.try_get::<Missing>().unwrap().is_none());

    container
        .add::<NeedsMissing>(Instance::factory(|ctx| {
            ctx.get::<Missing>()?;
            Ok(Arc::new(NeedsMissing))
        }))
        .unwrap();
    // A missing dependency is not "absent", it is an error
    assert!(container.try_get::<NeedsMissing>().is_err());

    let t = PluginType::of::<u8>();
    assert!(container.try_resolve(&t, Some("nope")).unwrap().is_none());
}

#[test]
fn test_optional_dependency_through_context() {
    struct Cache;
    struct Service {
        cache: Option<Arc<Cache>>,
    }

    let container = Container::new();
    container
        .add::<Service>(Instance::factory(|ctx| {
            Ok(Arc::new(Service {
                cache: ctx.try_get::<Cache>()?,
            }))
        }))
        .unwrap();

    assert!(container.get::<Service>().unwrap().cache.is_none());
}

#[test]
fn test_remove_instance_evicts_singleton() {
    let builds = Arc::new(AtomicUsize::new(0));
    let counter = builds.clone();

    let container = Container::new();
    let t = PluginType::of::<u64>();
    let make = move || {
        Instance::from_fn({
            let counter = counter.clone();
            move || counter.fetch_add(1, Ordering::SeqCst) as u64
        })
        .named("n")
        .singleton()
    };
    container.add_instance(&t, make()).unwrap();
    container.get::<u64>().unwrap();
    container.get::<u64>().unwrap();
    assert_eq!(builds.load(Ordering::SeqCst), 1);

    assert!(container.remove_instance(&t, "n"));
    assert!(!container.remove_instance(&t, "n"));
    container.add_instance(&t, make()).unwrap();
    container.get::<u64>().unwrap();
    assert_eq!(builds.load(Ordering::SeqCst), 2);
}

#[test]
fn test_concrete_recipe_synthesizes_family() {
    struct Clock {
        tz: String,
    }

    let container = Container::new();
    container
        .register_concrete(Constructed::new(|args| Ok(Clock { tz: args.parse("tz")? })).with_raw("tz", "UTC"))
        .unwrap();

    assert_eq!(container.get::<Clock>().unwrap().tz, "UTC");
    let report = container.explain(&PluginType::of::<Clock>()).unwrap();
    assert_eq!(report.derived_by.as_deref(), Some("concrete"));
}

#[test]
fn test_concrete_recipe_registered_after_first_request() {
    struct Clock(u8);

    let container = Container::new();
    assert!(container.try_get::<Clock>().unwrap().is_none());
    container.explain(&PluginType::of::<Clock>()).unwrap();

    container.register_concrete(Instance::from_fn(|| Clock(1))).unwrap();
    assert_eq!(container.get::<Clock>().unwrap().0, 1);

    // A newer recipe replaces the family synthesized from the old one
    container.register_concrete(Instance::from_fn(|| Clock(2))).unwrap();
    assert_eq!(container.get::<Clock>().unwrap().0, 2);
}

#[test]
fn test_explicit_override_does_not_leak() {
    struct Logger(&'static str);
    struct Service {
        logger: Arc<Logger>,
    }

    let container = Container::new();
    container.add::<Logger>(Instance::object(Logger("real"))).unwrap();
    container
        .add::<Service>(
            Constructed::new(|args| Ok(Service { logger: args.get("logger")? }))
                .depends_on("logger", PluginType::of::<Logger>())
                .lifecycle(Lifecycle::Singleton),
        )
        .unwrap();

    let fake = Value::new(Arc::new(Logger("fake")));
    let overridden = container
        .with_override(&PluginType::of::<Logger>(), fake)
        .get::<Service>()
        .unwrap();
    assert_eq!(overridden.logger.0, "fake");

    let normal = container.get::<Service>().unwrap();
    assert_eq!(normal.logger.0, "real");
    assert!(!Arc::ptr_eq(&overridden, &normal));
}

#[test]
fn test_explicit_session_reuses_live_singletons() {
    struct Logger(&'static str);
    struct Database;
    struct Service {
        logger: Arc<Logger>,
        db: Arc<Database>,
    }

    let builds = Arc::new(AtomicUsize::new(0));
    let counter = builds.clone();
    let container = Container::new();
    container.add::<Logger>(Instance::object(Logger("real"))).unwrap();
    container
        .add::<Database>(
            Instance::from_fn(move || {
                counter.fetch_add(1, Ordering::SeqCst);
                Database
            })
            .singleton(),
        )
        .unwrap();
    container
        .add::<Service>(
            Constructed::new(|args| {
                Ok(Service {
                    logger: args.get("logger")?,
                    db: args.get("db")?,
                })
            })
            .depends_on("logger", PluginType::of::<Logger>())
            .depends_on("db", PluginType::of::<Database>()),
        )
        .unwrap();

    let db = container.get::<Database>().unwrap();
    let service = container
        .with_override(&PluginType::of::<Logger>(), Value::new(Arc::new(Logger("fake"))))
        .get::<Service>()
        .unwrap();

    assert_eq!(service.logger.0, "fake");
    assert!(Arc::ptr_eq(&service.db, &db));
    assert_eq!(builds.load(Ordering::SeqCst), 1);
}

#[test]
fn test_explicit_slot_argument() {
    struct Greeting {
        text: String,
    }

    let container = Container::new();
    container
        .add::<Greeting>(
            Constructed::new(|args| Ok(Greeting { text: args.parse("text")? })).with_raw("text", "hello"),
        )
        .unwrap();

    let custom = container.with_arg("text", "bonjour".to_string()).get::<Greeting>().unwrap();
    assert_eq!(custom.text, "bonjour");
    assert_eq!(container.get::<Greeting>().unwrap().text, "hello");
}
