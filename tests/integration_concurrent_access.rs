/// Concurrent access integration tests
///
/// These tests verify that the container behaves correctly under concurrent
/// access: singleton identity, per-thread objects, nested container isolation
/// and registration while other threads resolve.

use ferrous_graph::{Container, Instance, Lifecycle, PluginType, Resolver};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Barrier, Mutex};
use std::thread;

// ===== Test Plugins =====

#[derive(Debug)]
pub struct CounterService {
    count: AtomicU32,
    thread_id: String,
}

impl CounterService {
    pub fn new() -> Self {
        Self {
            count: AtomicU32::new(0),
            thread_id: format!("created-by-{:?}", thread::current().id()),
        }
    }

    pub fn increment(&self) -> u32 {
        self.count.fetch_add(1, Ordering::SeqCst) + 1
    }

    pub fn get_count(&self) -> u32 {
        self.count.load(Ordering::SeqCst)
    }
}

fn counting_container(lifecycle: Lifecycle, builds: &Arc<AtomicU32>) -> Container {
    let container = Container::new();
    let builds = builds.clone();
    container
        .add::<CounterService>(
            Instance::from_fn(move || {
                builds.fetch_add(1, Ordering::SeqCst);
                CounterService::new()
            })
            .lifecycle(lifecycle),
        )
        .unwrap();
    container
}

#[test]
fn test_singleton_identity_across_threads() {
    const THREADS: usize = 8;

    let builds = Arc::new(AtomicU32::new(0));
    let container = counting_container(Lifecycle::Singleton, &builds);
    let barrier = Barrier::new(THREADS);

    let resolved: Vec<Arc<CounterService>> = crossbeam_utils::thread::scope(|s| {
        let handles: Vec<_> = (0..THREADS)
            .map(|_| {
                s.spawn(|_| {
                    barrier.wait();
                    let service = container.get_required::<CounterService>();
                    service.increment();
                    service
                })
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    })
    .unwrap();

    // First write wins: one object is handed out even if several threads built
    for service in &resolved[1..] {
        assert!(Arc::ptr_eq(&resolved[0], service));
    }
    assert_eq!(resolved[0].get_count(), THREADS as u32);
    assert!(builds.load(Ordering::SeqCst) >= 1);
}

#[test]
fn test_thread_local_objects_per_thread() {
    const THREADS: usize = 4;

    let builds = Arc::new(AtomicU32::new(0));
    let container = counting_container(Lifecycle::ThreadLocal, &builds);
    let creators = Mutex::new(Vec::new());

    crossbeam_utils::thread::scope(|s| {
        for _ in 0..THREADS {
            s.spawn(|_| {
                let a = container.get_required::<CounterService>();
                let b = container.get_required::<CounterService>();
                assert!(Arc::ptr_eq(&a, &b));
                creators.lock().unwrap().push(a.thread_id.clone());
            });
        }
    })
    .unwrap();

    let mut creators = creators.into_inner().unwrap();
    creators.sort();
    creators.dedup();
    assert_eq!(creators.len(), THREADS);
    assert_eq!(builds.load(Ordering::SeqCst), THREADS as u32);
}

#[test]
fn test_nested_containers_are_isolated() {
    const THREADS: usize = 4;

    let builds = Arc::new(AtomicU32::new(0));
    let container = counting_container(Lifecycle::Scoped, &builds);

    let handles: Vec<_> = (0..THREADS)
        .map(|_| {
            let container = container.clone();
            thread::spawn(move || {
                let scope = container.create_nested();
                let a = scope.get_required::<CounterService>();
                let b = scope.get_required::<CounterService>();
                assert!(Arc::ptr_eq(&a, &b));
                a.increment()
            })
        })
        .collect();

    for handle in handles {
        // Each scope saw only its own increment
        assert_eq!(handle.join().unwrap(), 1);
    }
    assert_eq!(builds.load(Ordering::SeqCst), THREADS as u32);
}

#[test]
fn test_registration_while_resolving() {
    trait Handler: Send + Sync {
        fn id(&self) -> usize;
    }
    struct NumberedHandler(usize);
    impl Handler for NumberedHandler {
        fn id(&self) -> usize {
            self.0
        }
    }

    let container = Container::new();
    let t = PluginType::of::<dyn Handler>();
    container
        .add_instance(&t, Instance::literal::<dyn Handler>(Arc::new(NumberedHandler(0))).named("h0"))
        .unwrap();

    crossbeam_utils::thread::scope(|s| {
        s.spawn(|_| {
            for i in 1..50 {
                container
                    .add_instance(
                        &t,
                        Instance::literal::<dyn Handler>(Arc::new(NumberedHandler(i))).named(format!("h{}", i)),
                    )
                    .unwrap();
            }
        });
        for _ in 0..4 {
            s.spawn(|_| {
                for _ in 0..50 {
                    let all = container.get_all::<dyn Handler>().unwrap();
                    // Snapshots are always a prefix of the registration order
                    for (i, handler) in all.iter().enumerate() {
                        assert_eq!(handler.id(), i);
                    }
                }
            });
        }
    })
    .unwrap();

    assert_eq!(container.get_all::<dyn Handler>().unwrap().len(), 50);
}

#[test]
fn test_thread_local_objects_drop_when_their_thread_exits() {
    const THREADS: u32 = 50;

    struct Connection(Arc<AtomicU32>);

    impl Drop for Connection {
        fn drop(&mut self) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    let dropped = Arc::new(AtomicU32::new(0));
    let counter = dropped.clone();
    let container = Container::new();
    container
        .add::<Connection>(
            Instance::from_fn(move || Connection(counter.clone())).lifecycle(Lifecycle::ThreadLocal),
        )
        .unwrap();

    for _ in 0..THREADS {
        let container = container.clone();
        thread::spawn(move || {
            container.get_required::<Connection>();
        })
        .join()
        .unwrap();
    }
    assert_eq!(dropped.load(Ordering::SeqCst), THREADS);

    // The calling thread keeps its own object until the container goes away
    container.get_required::<Connection>();
    assert_eq!(dropped.load(Ordering::SeqCst), THREADS);
    drop(container);
    assert_eq!(dropped.load(Ordering::SeqCst), THREADS + 1);
}
