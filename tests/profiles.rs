use ferrous_graph::{Constructed, Container, DiError, Instance, PluginType, Resolver, Settings};
use std::sync::Arc;

trait Storage: Send + Sync {
    fn kind(&self) -> &'static str;
}

struct Disk;
struct Memory;
struct Cloud;

impl Storage for Disk {
    fn kind(&self) -> &'static str {
        "disk"
    }
}

impl Storage for Memory {
    fn kind(&self) -> &'static str {
        "memory"
    }
}

impl Storage for Cloud {
    fn kind(&self) -> &'static str {
        "cloud"
    }
}

fn storage(value: Arc<dyn Storage>, name: &str) -> Instance {
    Instance::literal::<dyn Storage>(value).named(name)
}

fn storage_container() -> Container {
    let container = Container::new();
    let t = PluginType::of::<dyn Storage>();
    container.set_default(&t, storage(Arc::new(Disk), "disk")).unwrap();
    container.add_instance(&t, storage(Arc::new(Memory), "memory")).unwrap();
    container
}

#[test]
fn test_profile_selects_family_instance() {
    let container = storage_container();
    let t = PluginType::of::<dyn Storage>();
    container.set_profile_default("test", &t, "memory");

    assert_eq!(container.get::<dyn Storage>().unwrap().kind(), "disk");
    assert_eq!(container.with_profile("test").get::<dyn Storage>().unwrap().kind(), "memory");
}

#[test]
fn test_profile_owned_instance_stays_out_of_the_family() {
    let container = storage_container();
    let t = PluginType::of::<dyn Storage>();
    container
        .add_profile_instance("staging", &t, storage(Arc::new(Cloud), "cloud"))
        .unwrap();

    assert_eq!(container.with_profile("staging").get::<dyn Storage>().unwrap().kind(), "cloud");

    // The family itself has no "cloud" instance
    assert!(matches!(
        container.get_named::<dyn Storage>("cloud"),
        Err(DiError::UnknownInstance { .. })
    ));
    assert_eq!(container.get_all::<dyn Storage>().unwrap().len(), 2);

    let report = container.explain(&t).unwrap();
    assert_eq!(report.profiles.len(), 1);
    assert_eq!(report.profiles[0].profile, "staging");
    assert!(report.profiles[0].owned);
}

#[test]
fn test_named_requests_ignore_profiles() {
    let container = storage_container();
    let t = PluginType::of::<dyn Storage>();
    container.set_profile_default("test", &t, "memory");

    let named = container.with_profile("test").get_named::<dyn Storage>("disk").unwrap();
    assert_eq!(named.kind(), "disk");
}

#[test]
fn test_profile_reaches_dependencies() {
    struct Service {
        storage: Arc<dyn Storage>,
    }

    let container = storage_container();
    let t = PluginType::of::<dyn Storage>();
    container.set_profile_default("test", &t, "memory");
    container
        .add::<Service>(Constructed::new(|args| Ok(Service { storage: args.get("storage")? })).depends_on("storage", t))
        .unwrap();

    let service = container.with_profile("test").get::<Service>().unwrap();
    assert_eq!(service.storage.kind(), "memory");
}

#[test]
fn test_unknown_profile_changes_nothing() {
    let container = storage_container();
    assert_eq!(container.with_profile("nobody").get::<dyn Storage>().unwrap().kind(), "disk");
}

#[test]
fn test_profile_naming_missing_instance() {
    let container = storage_container();
    let t = PluginType::of::<dyn Storage>();
    container.set_profile_default("broken", &t, "tape");

    match container.with_profile("broken").get::<dyn Storage>() {
        Err(DiError::UnknownInstance { name, .. }) => assert_eq!(name, "tape"),
        other => panic!("expected UnknownInstance, got {:?}", other.map(|_| ())),
    }
}

#[test]
fn test_profile_registered_after_context_creation() {
    let container = storage_container();
    let t = PluginType::of::<dyn Storage>();
    let context = container.with_profile("late");
    assert_eq!(context.get::<dyn Storage>().unwrap().kind(), "disk");

    container.set_profile_default("late", &t, "memory");
    assert_eq!(context.get::<dyn Storage>().unwrap().kind(), "memory");
}

#[test]
fn test_settings_profile_is_the_container_default() {
    let container = Container::with_settings(Settings::default().with_profile("test"));
    let t = PluginType::of::<dyn Storage>();
    container.set_default(&t, storage(Arc::new(Disk), "disk")).unwrap();
    container.add_instance(&t, storage(Arc::new(Memory), "memory")).unwrap();
    container.set_profile_default("test", &t, "memory");

    assert_eq!(container.get::<dyn Storage>().unwrap().kind(), "memory");
    assert_eq!(container.create_nested().profile(), Some("test"));
    assert_eq!(container.create_nested().get::<dyn Storage>().unwrap().kind(), "memory");
}

#[test]
fn test_profile_nested_container() {
    let container = storage_container();
    let t = PluginType::of::<dyn Storage>();
    container.set_profile_default("test", &t, "memory");

    let nested = container.with_profile("test").create_nested();
    assert_eq!(nested.profile(), Some("test"));
    assert_eq!(nested.get::<dyn Storage>().unwrap().kind(), "memory");
}

#[test]
fn test_profile_instance_must_be_castable() {
    let container = Container::new();
    let result = container.add_profile_instance("test", &PluginType::of::<dyn Storage>(), Instance::object(1u8));
    assert!(matches!(result, Err(DiError::Configuration(_))));
    assert!(container.graph().profile("test").is_none());
}
