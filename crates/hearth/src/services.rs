//! # Service Container
//!
//! Explicit registry of factory closures keyed by type.
//!
//! ## Lifetimes
//!
//! | Lifetime    | Instance                          | Disposed by            |
//! |-------------|-----------------------------------|------------------------|
//! | `Singleton` | one per container, built lazily   | [`ServiceContainer::dispose`] |
//! | `Scoped`    | one per [`ServiceScope`]          | [`ServiceScope::dispose`] |
//! | `Transient` | a new one per resolution          | the scope that built it |
//!
//! Factories receive a [`Resolver`] to pull their own dependencies. A factory
//! that (indirectly) asks for the service it is building gets
//! [`ServiceError::CircularDependency`] instead of recursing forever.
//!
//! ## Example
//!
//! ```rust
//! use std::sync::Arc;
//! use hearth::ServiceContainer;
//!
//! struct Clock;
//! struct Scheduler {
//!     clock: Arc<Clock>,
//! }
//!
//! let mut services = ServiceContainer::new();
//! services.register_singleton(|_| Ok(Clock));
//! services.register_transient(|r| Ok(Scheduler { clock: r.resolve::<Clock>()? }));
//!
//! let a = services.resolve::<Scheduler>().unwrap();
//! let b = services.resolve::<Scheduler>().unwrap();
//! assert!(!Arc::ptr_eq(&a, &b));
//! assert!(Arc::ptr_eq(&a.clock, &b.clock));
//! ```

use std::any::{type_name, Any, TypeId};
use std::cell::RefCell;
use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::error::{ServiceError, ServiceResult};

/// How long a resolved instance lives.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ServiceLifetime {
    /// One instance per container.
    Singleton,
    /// One instance per scope.
    Scoped,
    /// A new instance per resolution.
    Transient,
}

/// Services holding resources that must be released explicitly.
pub trait Disposable: Send + Sync {
    /// Releases the service's resources. Called once by the owning scope.
    fn dispose(&self);
}

type Instance = Arc<dyn Any + Send + Sync>;
type Factory = Arc<dyn Fn(&Resolver<'_>) -> ServiceResult<Instance> + Send + Sync>;
type Disposer = fn(Instance) -> Option<Arc<dyn Disposable>>;

fn as_disposable<T: Disposable + 'static>(instance: Instance) -> Option<Arc<dyn Disposable>> {
    instance
        .downcast::<T>()
        .ok()
        .map(|service| service as Arc<dyn Disposable>)
}

struct Registration {
    lifetime: ServiceLifetime,
    type_name: &'static str,
    factory: Factory,
    disposer: Option<Disposer>,
}

/// Instances owned by a container or a scope, plus what to dispose.
#[derive(Default)]
struct InstanceStore {
    instances: HashMap<TypeId, Instance>,
    disposables: Vec<Arc<dyn Disposable>>,
    disposed: bool,
}

impl InstanceStore {
    fn track(&mut self, disposer: Option<Disposer>, instance: &Instance) {
        if let Some(disposable) = disposer.and_then(|convert| convert(Arc::clone(instance))) {
            self.disposables.push(disposable);
        }
    }

    /// Marks the store disposed and hands back what to dispose, or `None`
    /// if it already was. Disposal runs outside the lock.
    fn close(&mut self) -> Option<Vec<Arc<dyn Disposable>>> {
        if self.disposed {
            return None;
        }
        self.disposed = true;
        self.instances.clear();
        Some(std::mem::take(&mut self.disposables))
    }
}

/// Reverse creation order. Returns the number disposed.
fn dispose_all(disposables: Vec<Arc<dyn Disposable>>) -> usize {
    let count = disposables.len();
    for disposable in disposables.into_iter().rev() {
        disposable.dispose();
    }
    count
}

/// Type registry with lazily built instances.
#[derive(Default)]
pub struct ServiceContainer {
    registrations: HashMap<TypeId, Registration>,
    singletons: Mutex<InstanceStore>,
}

impl ServiceContainer {
    /// Creates an empty container.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `factory` for `T` with the given lifetime. Replaces any
    /// previous registration for `T`.
    pub fn register<T, F>(&mut self, lifetime: ServiceLifetime, factory: F)
    where
        T: Send + Sync + 'static,
        F: Fn(&Resolver<'_>) -> ServiceResult<T> + Send + Sync + 'static,
    {
        self.insert::<T, F>(lifetime, factory, None);
    }

    /// Registers a [`Disposable`] service. Every instance it builds is
    /// disposed by its owner (scope or container).
    pub fn register_disposable<T, F>(&mut self, lifetime: ServiceLifetime, factory: F)
    where
        T: Disposable + 'static,
        F: Fn(&Resolver<'_>) -> ServiceResult<T> + Send + Sync + 'static,
    {
        self.insert::<T, F>(lifetime, factory, Some(as_disposable::<T>));
    }

    fn insert<T, F>(&mut self, lifetime: ServiceLifetime, factory: F, disposer: Option<Disposer>)
    where
        T: Send + Sync + 'static,
        F: Fn(&Resolver<'_>) -> ServiceResult<T> + Send + Sync + 'static,
    {
        let factory: Factory =
            Arc::new(move |resolver: &Resolver<'_>| factory(resolver).map(|v| Arc::new(v) as Instance));
        let registration = Registration {
            lifetime,
            type_name: type_name::<T>(),
            factory,
            disposer,
        };
        let key = TypeId::of::<T>();
        if self.registrations.insert(key, registration).is_some() {
            tracing::debug!(target: "hearth::services", service = type_name::<T>(), "registration replaced");
        }
        // A replaced singleton must not keep serving the old instance.
        self.singletons.get_mut().instances.remove(&key);
    }

    /// Registers an existing instance as a singleton.
    pub fn register_instance<T: Send + Sync + 'static>(&mut self, instance: T) {
        self.register_shared(Arc::new(instance));
    }

    /// Registers an already shared instance as a singleton. Resolution
    /// returns clones of this `Arc`.
    pub fn register_shared<T: Send + Sync + 'static>(&mut self, instance: Arc<T>) {
        let key = TypeId::of::<T>();
        let shared: Instance = instance;
        let factory: Factory = Arc::new(move |_: &Resolver<'_>| Ok(Arc::clone(&shared)));
        self.registrations.insert(
            key,
            Registration {
                lifetime: ServiceLifetime::Singleton,
                type_name: type_name::<T>(),
                factory,
                disposer: None,
            },
        );
        self.singletons.get_mut().instances.remove(&key);
    }

    /// Registers a singleton built on first resolution.
    pub fn register_singleton<T, F>(&mut self, factory: F)
    where
        T: Send + Sync + 'static,
        F: Fn(&Resolver<'_>) -> ServiceResult<T> + Send + Sync + 'static,
    {
        self.register(ServiceLifetime::Singleton, factory);
    }

    /// Registers a service built once per scope.
    pub fn register_scoped<T, F>(&mut self, factory: F)
    where
        T: Send + Sync + 'static,
        F: Fn(&Resolver<'_>) -> ServiceResult<T> + Send + Sync + 'static,
    {
        self.register(ServiceLifetime::Scoped, factory);
    }

    /// Registers a service built on every resolution.
    pub fn register_transient<T, F>(&mut self, factory: F)
    where
        T: Send + Sync + 'static,
        F: Fn(&Resolver<'_>) -> ServiceResult<T> + Send + Sync + 'static,
    {
        self.register(ServiceLifetime::Transient, factory);
    }

    /// True if `T` has a registration.
    #[must_use]
    pub fn is_registered<T: 'static>(&self) -> bool {
        self.registrations.contains_key(&TypeId::of::<T>())
    }

    /// Lifetime `T` was registered with.
    #[must_use]
    pub fn lifetime_of<T: 'static>(&self) -> Option<ServiceLifetime> {
        self.registrations
            .get(&TypeId::of::<T>())
            .map(|registration| registration.lifetime)
    }

    /// Number of registrations.
    #[must_use]
    pub fn len(&self) -> usize {
        self.registrations.len()
    }

    /// True if nothing is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.registrations.is_empty()
    }

    /// Resolves `T` from the root. Scoped services need a scope.
    pub fn resolve<T: Send + Sync + 'static>(&self) -> ServiceResult<Arc<T>> {
        Resolver::new(self, None).resolve()
    }

    /// Opens a scope for scoped services.
    #[must_use]
    pub fn create_scope(&self) -> ServiceScope<'_> {
        ServiceScope {
            container: self,
            store: Mutex::new(InstanceStore::default()),
        }
    }

    /// Disposes every disposable singleton in reverse creation order. Later
    /// resolutions fail with `AlreadyDisposed`.
    pub fn dispose(&self) -> ServiceResult<()> {
        let closed = self.singletons.lock().close();
        let disposables = closed.ok_or(ServiceError::AlreadyDisposed)?;
        let disposed = dispose_all(disposables);
        tracing::debug!(target: "hearth::services", disposed, "service container disposed");
        Ok(())
    }

    /// True after [`dispose`](Self::dispose).
    #[must_use]
    pub fn is_disposed(&self) -> bool {
        self.singletons.lock().disposed
    }
}

impl std::fmt::Debug for ServiceContainer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut names: Vec<_> = self.registrations.values().map(|r| r.type_name).collect();
        names.sort_unstable();
        f.debug_struct("ServiceContainer")
            .field("registrations", &names)
            .field("disposed", &self.is_disposed())
            .finish()
    }
}

/// Scope owning scoped instances and the disposables it built.
pub struct ServiceScope<'c> {
    container: &'c ServiceContainer,
    store: Mutex<InstanceStore>,
}

impl ServiceScope<'_> {
    /// Resolves `T` within this scope.
    pub fn resolve<T: Send + Sync + 'static>(&self) -> ServiceResult<Arc<T>> {
        if self.store.lock().disposed {
            return Err(ServiceError::AlreadyDisposed);
        }
        Resolver::new(self.container, Some(&self.store)).resolve()
    }

    /// Disposes tracked instances in reverse creation order.
    ///
    /// # Errors
    ///
    /// `AlreadyDisposed` on the second call.
    pub fn dispose(&self) -> ServiceResult<()> {
        let closed = self.store.lock().close();
        let disposables = closed.ok_or(ServiceError::AlreadyDisposed)?;
        let disposed = dispose_all(disposables);
        tracing::debug!(target: "hearth::services", disposed, "service scope disposed");
        Ok(())
    }

    /// True after [`dispose`](Self::dispose).
    #[must_use]
    pub fn is_disposed(&self) -> bool {
        self.store.lock().disposed
    }

    /// Disposable instances waiting for [`dispose`](Self::dispose).
    #[must_use]
    pub fn tracked_disposables(&self) -> usize {
        self.store.lock().disposables.len()
    }
}

impl Drop for ServiceScope<'_> {
    fn drop(&mut self) {
        if let Some(disposables) = self.store.get_mut().close() {
            dispose_all(disposables);
        }
    }
}

impl std::fmt::Debug for ServiceScope<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let store = self.store.lock();
        f.debug_struct("ServiceScope")
            .field("instances", &store.instances.len())
            .field("disposables", &store.disposables.len())
            .field("disposed", &store.disposed)
            .finish()
    }
}

/// Handed to factories to resolve their dependencies.
///
/// Tracks the chain of services under construction to detect cycles.
pub struct Resolver<'a> {
    container: &'a ServiceContainer,
    scope: Option<&'a Mutex<InstanceStore>>,
    building: RefCell<Vec<TypeId>>,
}

impl<'a> Resolver<'a> {
    fn new(container: &'a ServiceContainer, scope: Option<&'a Mutex<InstanceStore>>) -> Self {
        Self {
            container,
            scope,
            building: RefCell::new(Vec::new()),
        }
    }

    /// Resolves a dependency.
    pub fn resolve<T: Send + Sync + 'static>(&self) -> ServiceResult<Arc<T>> {
        let name = type_name::<T>();
        self.resolve_erased(TypeId::of::<T>(), name)?
            .downcast::<T>()
            .map_err(|_| ServiceError::NotRegistered { type_name: name })
    }

    fn resolve_erased(&self, key: TypeId, name: &'static str) -> ServiceResult<Instance> {
        if self.container.is_disposed() {
            return Err(ServiceError::AlreadyDisposed);
        }
        let registration = self.container.registrations.get(&key).ok_or_else(|| {
            tracing::error!(target: "hearth::services", service = name, "service not registered");
            ServiceError::NotRegistered { type_name: name }
        })?;

        match registration.lifetime {
            ServiceLifetime::Singleton => {
                let cached = self.container.singletons.lock().instances.get(&key).cloned();
                if let Some(instance) = cached {
                    return Ok(instance);
                }
                let built = self.build(key, registration)?;
                let mut singletons = self.container.singletons.lock();
                if let Some(existing) = singletons.instances.get(&key) {
                    // Another thread won the race.
                    return Ok(Arc::clone(existing));
                }
                singletons.instances.insert(key, Arc::clone(&built));
                singletons.track(registration.disposer, &built);
                Ok(built)
            }
            ServiceLifetime::Scoped => {
                let scope = self.scope.ok_or(ServiceError::ScopeRequired {
                    type_name: registration.type_name,
                })?;
                let cached = scope.lock().instances.get(&key).cloned();
                if let Some(instance) = cached {
                    return Ok(instance);
                }
                let built = self.build(key, registration)?;
                let mut store = scope.lock();
                if store.disposed {
                    return Err(ServiceError::AlreadyDisposed);
                }
                store.instances.insert(key, Arc::clone(&built));
                store.track(registration.disposer, &built);
                Ok(built)
            }
            ServiceLifetime::Transient => {
                let built = self.build(key, registration)?;
                match self.scope {
                    Some(scope) => scope.lock().track(registration.disposer, &built),
                    None if registration.disposer.is_some() => {
                        tracing::warn!(target: "hearth::services", service = registration.type_name, "disposable transient resolved outside of a scope, caller owns disposal");
                    }
                    None => {}
                }
                Ok(built)
            }
        }
    }

    fn build(&self, key: TypeId, registration: &Registration) -> ServiceResult<Instance> {
        if self.building.borrow().contains(&key) {
            tracing::error!(target: "hearth::services", service = registration.type_name, "circular dependency");
            return Err(ServiceError::CircularDependency {
                type_name: registration.type_name,
            });
        }
        self.building.borrow_mut().push(key);
        let result = (registration.factory)(self);
        self.building.borrow_mut().pop();
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Debug)]
    struct Config {
        name: &'static str,
    }

    #[derive(Debug)]
    struct Repository {
        config: Arc<Config>,
    }

    struct Connection {
        id: usize,
        log: Arc<Mutex<Vec<usize>>>,
    }

    impl Disposable for Connection {
        fn dispose(&self) {
            self.log.lock().push(self.id);
        }
    }

    #[test]
    fn test_unregistered_is_fatal() {
        let services = ServiceContainer::new();
        let err = services.resolve::<Config>().unwrap_err();
        assert!(matches!(err, ServiceError::NotRegistered { type_name } if type_name.ends_with("Config")));
    }

    #[test]
    fn test_singleton_is_shared() {
        let built = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&built);
        let mut services = ServiceContainer::new();
        services.register_singleton(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(Config { name: "main" })
        });

        let a = services.resolve::<Config>().unwrap();
        let b = services.resolve::<Config>().unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(built.load(Ordering::SeqCst), 1);
        assert_eq!(a.name, "main");
    }

    #[test]
    fn test_instance_registration() {
        let mut services = ServiceContainer::new();
        services.register_instance(Config { name: "fixed" });
        assert!(services.is_registered::<Config>());
        assert_eq!(services.lifetime_of::<Config>(), Some(ServiceLifetime::Singleton));
        assert_eq!(services.resolve::<Config>().unwrap().name, "fixed");

        let shared = Arc::new(Config { name: "shared" });
        services.register_shared(Arc::clone(&shared));
        assert!(Arc::ptr_eq(&services.resolve::<Config>().unwrap(), &shared));
    }

    #[test]
    fn test_transient_builds_every_time() {
        let mut services = ServiceContainer::new();
        services.register_instance(Config { name: "cfg" });
        services.register_transient(|r| {
            Ok(Repository {
                config: r.resolve()?,
            })
        });

        let a = services.resolve::<Repository>().unwrap();
        let b = services.resolve::<Repository>().unwrap();
        assert!(!Arc::ptr_eq(&a, &b));
        assert!(Arc::ptr_eq(&a.config, &b.config));
    }

    #[test]
    fn test_scoped_needs_scope() {
        let mut services = ServiceContainer::new();
        services.register_scoped(|_| Ok(Config { name: "scoped" }));

        assert!(matches!(
            services.resolve::<Config>(),
            Err(ServiceError::ScopeRequired { .. })
        ));

        let scope = services.create_scope();
        let a = scope.resolve::<Config>().unwrap();
        let b = scope.resolve::<Config>().unwrap();
        assert!(Arc::ptr_eq(&a, &b));

        let other = services.create_scope();
        assert!(!Arc::ptr_eq(&a, &other.resolve::<Config>().unwrap()));
    }

    #[test]
    fn test_circular_dependency_detected() {
        struct A;
        struct B;

        let mut services = ServiceContainer::new();
        services.register_transient(|r| {
            r.resolve::<B>()?;
            Ok(A)
        });
        services.register_transient(|r| {
            r.resolve::<A>()?;
            Ok(B)
        });

        assert!(matches!(
            services.resolve::<A>(),
            Err(ServiceError::CircularDependency { type_name }) if type_name.ends_with('A')
        ));
    }

    #[test]
    fn test_scope_disposes_in_reverse_order() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let next = Arc::new(AtomicUsize::new(0));

        let mut services = ServiceContainer::new();
        let (l, n) = (Arc::clone(&log), Arc::clone(&next));
        services.register_disposable(ServiceLifetime::Transient, move |_| {
            Ok(Connection {
                id: n.fetch_add(1, Ordering::SeqCst),
                log: Arc::clone(&l),
            })
        });

        let scope = services.create_scope();
        for _ in 0..3 {
            scope.resolve::<Connection>().unwrap();
        }
        assert_eq!(scope.tracked_disposables(), 3);

        scope.dispose().unwrap();
        assert_eq!(*log.lock(), [2, 1, 0]);
        assert!(scope.is_disposed());
        assert_eq!(scope.dispose(), Err(ServiceError::AlreadyDisposed));
        assert!(matches!(
            scope.resolve::<Connection>(),
            Err(ServiceError::AlreadyDisposed)
        ));
    }

    #[test]
    fn test_dropping_scope_disposes() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut services = ServiceContainer::new();
        let l = Arc::clone(&log);
        services.register_disposable(ServiceLifetime::Scoped, move |_| {
            Ok(Connection {
                id: 7,
                log: Arc::clone(&l),
            })
        });

        {
            let scope = services.create_scope();
            scope.resolve::<Connection>().unwrap();
        }
        assert_eq!(*log.lock(), [7]);
    }

    #[test]
    fn test_container_dispose() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut services = ServiceContainer::new();
        let l = Arc::clone(&log);
        services.register_disposable(ServiceLifetime::Singleton, move |_| {
            Ok(Connection {
                id: 1,
                log: Arc::clone(&l),
            })
        });
        services.resolve::<Connection>().unwrap();

        services.dispose().unwrap();
        assert_eq!(*log.lock(), [1]);
        assert_eq!(services.dispose(), Err(ServiceError::AlreadyDisposed));
        assert!(matches!(
            services.resolve::<Connection>(),
            Err(ServiceError::AlreadyDisposed)
        ));
    }

    #[test]
    fn test_reregistration_replaces_singleton() {
        let mut services = ServiceContainer::new();
        services.register_singleton(|_| Ok(Config { name: "old" }));
        assert_eq!(services.resolve::<Config>().unwrap().name, "old");

        services.register_singleton(|_| Ok(Config { name: "new" }));
        assert_eq!(services.resolve::<Config>().unwrap().name, "new");
        assert_eq!(services.len(), 1);
    }
}
