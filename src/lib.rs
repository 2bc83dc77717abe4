//! # ferrous-graph
//!
//! Runtime object-graph assembly for Rust: ask for an abstract type (and
//! optionally an instance name), get back a fully wired object.
//!
//! ## Features
//!
//! - **Plugin families**: every abstract type maps to a family of named
//!   build recipes with a default, a fallback and a lifecycle
//! - **Six recipe kinds**: constructed (explicit dependency slots), literal,
//!   factory, reference, prototype and aggregate
//! - **Lifecycles**: transient, singleton, per-thread and scoped
//!   (per build session or per nested container)
//! - **On-demand families**: open generic families closed over type arguments,
//!   "all instances of T" and name-indexed lookups, derived when first requested
//! - **Profiles and explicit arguments**: swap defaults per context, or
//!   override a dependency for a single resolution
//! - **Interceptors**: observe, decorate or replace objects after they are built
//! - **Diagnostics**: every resolution error carries the build path from the
//!   original request; `explain` describes any family
//!
//! ## Quick Start
//!
//! ```rust
//! use ferrous_graph::{Constructed, Container, Instance, Lifecycle, PluginType, Resolver};
//! use std::sync::Arc;
//!
//! struct Database {
//!     connection_string: String,
//! }
//!
//! struct UserService {
//!     db: Arc<Database>,
//! }
//!
//! let container = Container::new();
//! container.add::<Database>(
//!     Instance::object(Database { connection_string: "postgres://localhost".to_string() })
//! ).unwrap();
//! container.add::<UserService>(
//!     Constructed::new(|args| Ok(UserService { db: args.get::<Database>("db")? }))
//!         .depends_on("db", PluginType::of::<Database>())
//!         .lifecycle(Lifecycle::Singleton),
//! ).unwrap();
//!
//! let user_service = container.get_required::<UserService>();
//! assert_eq!(user_service.db.connection_string, "postgres://localhost");
//! assert!(Arc::ptr_eq(&user_service, &container.get_required::<UserService>()));
//! ```
//!
//! ## Trait Families
//!
//! ```rust
//! use ferrous_graph::{Container, Instance, PluginType, Resolver};
//! use std::sync::Arc;
//!
//! trait Logger: Send + Sync {
//!     fn prefix(&self) -> &str;
//! }
//!
//! struct ConsoleLogger;
//! impl Logger for ConsoleLogger {
//!     fn prefix(&self) -> &str { "console" }
//! }
//!
//! struct FileLogger;
//! impl Logger for FileLogger {
//!     fn prefix(&self) -> &str { "file" }
//! }
//!
//! let container = Container::new();
//! let logger = PluginType::of::<dyn Logger>();
//! container.set_default(&logger, Instance::literal::<dyn Logger>(Arc::new(ConsoleLogger)).named("console")).unwrap();
//! container.add_instance(&logger, Instance::literal::<dyn Logger>(Arc::new(FileLogger)).named("file")).unwrap();
//!
//! assert_eq!(container.get::<dyn Logger>().unwrap().prefix(), "console");
//! assert_eq!(container.get_named::<dyn Logger>("file").unwrap().prefix(), "file");
//! assert_eq!(container.get_all::<dyn Logger>().unwrap().len(), 2);
//! ```
//!
//! ## Open Generic Families
//!
//! ```rust
//! use ferrous_graph::{Container, Instance, OpenInstance, OpenType, Resolver};
//! use std::sync::Arc;
//!
//! trait Repository<T>: Send + Sync { fn table(&self) -> &'static str; }
//! struct Users;
//! impl Repository<u32> for Users { fn table(&self) -> &'static str { "users" } }
//!
//! const REPOSITORY: OpenType = OpenType::new("Repository", 1);
//!
//! let container = Container::new();
//! container.register_open(
//!     REPOSITORY,
//!     OpenInstance::by_argument("sql")
//!         .when::<u32, _>(|| Instance::literal::<dyn Repository<u32>>(Arc::new(Users))),
//! );
//!
//! let closed = REPOSITORY.close::<dyn Repository<u32>>([ferrous_graph::PluginType::of::<u32>()]);
//! let repo = container.get_as::<dyn Repository<u32>>(&closed).unwrap();
//! assert_eq!(repo.table(), "users");
//! ```

pub mod cache;
pub mod container;
pub mod context;
pub mod error;
pub mod explain;
pub mod graph;
pub mod instance;
pub mod interceptor;
pub mod lifecycle;
pub mod plugin_type;
pub mod session;
pub mod settings;
pub mod traits;
pub mod value;

mod internal;

pub use cache::{CacheKey, ObjectCache, SharedCache, ThreadCache};
pub use container::{Container, Explicit, NestedContainer, ProfileContext};
pub use context::BuildContext;
pub use error::{BoxError, DiError, DiResult};
pub use explain::{FamilyReport, InstanceReport, ProfileOverride};
pub use graph::{
    AllInstances, DefaultSource, Family, FamilyPolicy, FamilyRef, GenericClosing, Lookup, NameLookup,
    PluginGraph, Profile, ProfileEntry,
};
pub use instance::{
    Aggregate, Args, Constructed, Constructor, Dependency, Instance, InstanceId, InstanceKind,
    OpenInstance, Slot,
};
pub use interceptor::Interceptor;
pub use lifecycle::Lifecycle;
pub use plugin_type::{Closing, OpenType, PluginType};
pub use session::{BuildFrame, BuildPath};
pub use settings::{ImplicitDefault, Settings};
pub use traits::{Resolver, ResolverCore};
pub use value::{Collection, Value};
