//! Bean registry and the realized application context.
//!
//! # Responsibilities
//! - Reject duplicate bean names
//! - Compute a construction order from declared dependencies
//! - Construct singletons lazily on first reference, exactly once
//! - Detect missing dependencies and cycles (declared or discovered)
//!
//! # Design Decisions
//! - Depth-first visitation with a "visiting" marker for cycle detection
//! - Lookups discovered at construction time use a creation stack,
//!   so undeclared cycles still fail instead of recursing forever
//! - Singletons live in the context; DSL objects never own instances

use std::any::{type_name, Any, TypeId};
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use dashmap::DashMap;

use crate::config::profiles::Profiles;
use crate::config::properties::PropertySource;
use crate::context::bean::{BeanDefinition, BeanError, Dependency, SharedBean};
use crate::context::events::{ApplicationEvent, EventError, ListenerRegistry};

/// Immutable set of bean definitions, indexed by name.
#[derive(Debug, Default)]
pub struct BeanRegistry {
    definitions: Vec<BeanDefinition>,
    by_name: HashMap<String, usize>,
}

#[derive(Clone, Copy, PartialEq)]
enum Visit {
    Visiting,
    Done,
}

impl BeanRegistry {
    pub fn new(definitions: Vec<BeanDefinition>) -> Result<Self, BeanError> {
        let mut by_name = HashMap::with_capacity(definitions.len());
        for (index, definition) in definitions.iter().enumerate() {
            if by_name.insert(definition.name().to_string(), index).is_some() {
                return Err(BeanError::DuplicateBean {
                    name: definition.name().to_string(),
                });
            }
        }
        Ok(Self {
            definitions,
            by_name,
        })
    }

    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<&BeanDefinition> {
        self.by_name.get(name).map(|&index| &self.definitions[index])
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.definitions.iter().map(BeanDefinition::name)
    }

    /// Names of every bean of the given type, in registration order.
    pub fn names_for_type(&self, type_id: TypeId) -> Vec<&str> {
        self.definitions
            .iter()
            .filter(|d| BeanDefinition::type_id(d) == type_id)
            .map(BeanDefinition::name)
            .collect()
    }

    /// Resolve a dependency to the single definition satisfying it.
    pub fn resolve(&self, dependency: &Dependency, requester: &str) -> Result<&BeanDefinition, BeanError> {
        let unresolved = || BeanError::UnresolvedDependency {
            bean: requester.to_string(),
            dependency: dependency.describe().to_string(),
        };

        if let Some(name) = &dependency.name {
            let definition = self.get(name).ok_or_else(unresolved)?;
            if BeanDefinition::type_id(definition) != dependency.type_id {
                return Err(BeanError::TypeMismatch {
                    name: name.clone(),
                    expected: dependency.type_name,
                });
            }
            return Ok(definition);
        }

        match self.names_for_type(dependency.type_id).as_slice() {
            [] => Err(unresolved()),
            [name] => self.get(name).ok_or_else(unresolved),
            candidates => Err(BeanError::NoUniqueBean {
                type_name: dependency.type_name,
                candidates: candidates.iter().map(|c| c.to_string()).collect(),
            }),
        }
    }

    /// Topological construction order over declared dependencies.
    ///
    /// Dependencies come before dependents; ties keep registration order.
    pub fn construction_order(&self) -> Result<Vec<&str>, BeanError> {
        let mut marks: HashMap<&str, Visit> = HashMap::with_capacity(self.len());
        let mut path: Vec<&str> = Vec::new();
        let mut order = Vec::with_capacity(self.len());

        for definition in &self.definitions {
            self.visit(definition, &mut marks, &mut path, &mut order)?;
        }
        Ok(order)
    }

    fn visit<'a>(
        &'a self,
        definition: &'a BeanDefinition,
        marks: &mut HashMap<&'a str, Visit>,
        path: &mut Vec<&'a str>,
        order: &mut Vec<&'a str>,
    ) -> Result<(), BeanError> {
        let name = definition.name();
        match marks.get(name) {
            Some(Visit::Done) => return Ok(()),
            Some(Visit::Visiting) => {
                let start = path.iter().position(|n| *n == name).unwrap_or(0);
                let mut chain: Vec<String> = path[start..].iter().map(|n| n.to_string()).collect();
                chain.push(name.to_string());
                return Err(BeanError::CyclicDependency { chain });
            }
            None => {}
        }

        marks.insert(name, Visit::Visiting);
        path.push(name);
        for dependency in definition.dependencies() {
            let target = self.resolve(dependency, name)?;
            self.visit(target, marks, path, order)?;
        }
        path.pop();
        marks.insert(name, Visit::Done);
        order.push(name);
        Ok(())
    }
}

/// The realized container: bean definitions, singletons, environment, listeners.
pub struct ApplicationContext {
    registry: BeanRegistry,
    singletons: DashMap<String, SharedBean>,
    creating: Mutex<Vec<String>>,
    profiles: Profiles,
    properties: PropertySource,
    listeners: ListenerRegistry,
}

impl ApplicationContext {
    pub fn new(
        definitions: Vec<BeanDefinition>,
        listeners: ListenerRegistry,
        profiles: Profiles,
        properties: PropertySource,
    ) -> Result<Self, BeanError> {
        Ok(Self {
            registry: BeanRegistry::new(definitions)?,
            singletons: DashMap::new(),
            creating: Mutex::new(Vec::new()),
            profiles,
            properties,
            listeners,
        })
    }

    /// Create every singleton, dependencies first.
    pub fn instantiate_all(&self) -> Result<(), BeanError> {
        let order = self.registry.construction_order()?;
        tracing::debug!(beans = order.len(), "Instantiating beans");
        for name in order {
            self.get_by_name(name)?;
        }
        Ok(())
    }

    /// Look up the single bean of type `T`.
    pub fn get<T: Any + Send + Sync>(&self) -> Result<Arc<T>, BeanError> {
        let dependency = Dependency::of::<T>();
        let name = self.registry.resolve(&dependency, "<lookup>")?.name().to_string();
        self.get_typed(&name)
    }

    /// Look up a bean of type `T` by name.
    pub fn get_named<T: Any + Send + Sync>(&self, name: &str) -> Result<Arc<T>, BeanError> {
        let dependency = Dependency::named::<T>(name);
        self.registry.resolve(&dependency, "<lookup>")?;
        self.get_typed(name)
    }

    /// Every bean of type `T`, in registration order.
    pub fn get_all<T: Any + Send + Sync>(&self) -> Result<Vec<Arc<T>>, BeanError> {
        let names: Vec<String> = self
            .registry
            .names_for_type(TypeId::of::<T>())
            .into_iter()
            .map(str::to_string)
            .collect();
        names.iter().map(|name| self.get_typed(name)).collect()
    }

    pub fn contains<T: Any>(&self) -> bool {
        !self.registry.names_for_type(TypeId::of::<T>()).is_empty()
    }

    pub fn bean_names(&self) -> Vec<&str> {
        self.registry.names().collect()
    }

    /// Whether the named singleton has already been constructed.
    pub fn is_created(&self, name: &str) -> bool {
        self.singletons.contains_key(name)
    }

    pub fn profiles(&self) -> &Profiles {
        &self.profiles
    }

    pub fn properties(&self) -> &PropertySource {
        &self.properties
    }

    pub fn publish<E: ApplicationEvent>(&self, event: &E) -> Result<usize, EventError> {
        self.listeners.publish(event, self)
    }

    fn get_typed<T: Any + Send + Sync>(&self, name: &str) -> Result<Arc<T>, BeanError> {
        self.get_by_name(name)?
            .downcast::<T>()
            .map_err(|_| BeanError::TypeMismatch {
                name: name.to_string(),
                expected: type_name::<T>(),
            })
    }

    fn get_by_name(&self, name: &str) -> Result<SharedBean, BeanError> {
        if let Some(bean) = self.singletons.get(name) {
            return Ok(bean.value().clone());
        }

        let definition = self
            .registry
            .get(name)
            .ok_or_else(|| BeanError::UnresolvedDependency {
                bean: "<lookup>".to_string(),
                dependency: name.to_string(),
            })?;

        {
            let mut creating = self.lock_creating();
            if let Some(start) = creating.iter().position(|n| n == name) {
                let mut chain = creating[start..].to_vec();
                chain.push(name.to_string());
                return Err(BeanError::CyclicDependency { chain });
            }
            creating.push(name.to_string());
        }

        tracing::debug!(bean = name, type_name = definition.type_name(), "Creating bean");
        let created = definition.create(self);
        self.lock_creating().retain(|n| n != name);

        let bean = created.map_err(|source| match source.downcast::<BeanError>() {
            Ok(nested) => *nested,
            Err(source) => BeanError::Creation {
                name: name.to_string(),
                source,
            },
        })?;

        metrics::counter!("webwire_beans_created_total").increment(1);
        let stored = self.singletons.entry(name.to_string()).or_insert(bean);
        Ok(stored.value().clone())
    }

    fn lock_creating(&self) -> MutexGuard<'_, Vec<String>> {
        self.creating.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl fmt::Debug for ApplicationContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApplicationContext")
            .field("beans", &self.registry.len())
            .field("created", &self.singletons.len())
            .field("profiles", &self.profiles)
            .field("listeners", &self.listeners.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::bean::BeansDsl;
    use crate::context::events::{ContextStarted, ListenerRegistration};
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Repo {
        id: usize,
    }

    struct Service {
        repo: Arc<Repo>,
    }

    struct A(#[allow(dead_code)] Arc<B>);
    struct B(#[allow(dead_code)] Arc<A>);

    fn context(beans: BeansDsl) -> Result<ApplicationContext, BeanError> {
        ApplicationContext::new(
            beans.into_definitions(),
            ListenerRegistry::default(),
            Profiles::default(),
            PropertySource::default(),
        )
    }

    #[test]
    fn test_singletons_created_once() {
        let created = Arc::new(AtomicUsize::new(0));
        let counter = created.clone();
        let mut beans = BeansDsl::new();
        beans
            .bean(|ctx| Ok(Service { repo: ctx.get()? }))
            .depends_on::<Repo>();
        beans.bean(move |_ctx| {
            let id = counter.fetch_add(1, Ordering::SeqCst);
            Ok(Repo { id })
        });

        let ctx = context(beans).unwrap();
        ctx.instantiate_all().unwrap();

        let service = ctx.get::<Service>().unwrap();
        let repo = ctx.get::<Repo>().unwrap();
        assert!(Arc::ptr_eq(&service.repo, &repo));
        assert_eq!(repo.id, 0);
        assert_eq!(created.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_lookup_by_type() {
        let mut beans = BeansDsl::new();
        beans.instance(1u32).named("first");
        beans.instance(2u32).named("second");
        beans.instance(String::from("only"));

        let ctx = context(beans).unwrap();
        assert_eq!(ctx.registry.names_for_type(TypeId::of::<u32>()), vec!["first", "second"]);
        assert!(ctx.registry.names_for_type(TypeId::of::<u64>()).is_empty());

        assert_eq!(*ctx.get::<String>().unwrap(), "only");
        assert_eq!(*ctx.get_named::<u32>("second").unwrap(), 2);
        assert_eq!(ctx.get_all::<u32>().unwrap().len(), 2);
        assert!(matches!(ctx.get::<u32>(), Err(BeanError::NoUniqueBean { .. })));
        assert!(matches!(
            ctx.get_named::<String>("first"),
            Err(BeanError::TypeMismatch { .. })
        ));
    }

    #[test]
    fn test_construction_order_follows_dependencies() {
        let mut beans = BeansDsl::new();
        beans
            .bean(|ctx| Ok(Service { repo: ctx.get()? }))
            .named("service")
            .depends_on::<Repo>();
        beans.bean(|_ctx| Ok(Repo { id: 1 })).named("repo");

        let ctx = context(beans).unwrap();
        assert_eq!(ctx.registry.construction_order().unwrap(), vec!["repo", "service"]);
    }

    #[test]
    fn test_duplicate_bean_names() {
        let mut beans = BeansDsl::new();
        beans.instance(Repo { id: 1 });
        beans.instance(Repo { id: 2 });
        assert!(matches!(context(beans), Err(BeanError::DuplicateBean { .. })));

        let mut beans = BeansDsl::new();
        beans.instance(Repo { id: 1 }).named("first");
        beans.instance(Repo { id: 2 }).named("second");
        let ctx = context(beans).unwrap();
        assert!(matches!(ctx.get::<Repo>(), Err(BeanError::NoUniqueBean { .. })));
        assert_eq!(ctx.get_named::<Repo>("second").unwrap().id, 2);
        assert_eq!(ctx.get_all::<Repo>().unwrap().len(), 2);
    }

    #[test]
    fn test_unresolved_dependency() {
        let mut beans = BeansDsl::new();
        beans
            .bean(|ctx| Ok(Service { repo: ctx.get()? }))
            .named("service")
            .depends_on::<Repo>();

        let ctx = context(beans).unwrap();
        match ctx.instantiate_all() {
            Err(BeanError::UnresolvedDependency { bean, .. }) => assert_eq!(bean, "service"),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn test_declared_cycle() {
        let mut beans = BeansDsl::new();
        beans.bean(|ctx| Ok(A(ctx.get()?))).named("a").depends_on::<B>();
        beans.bean(|ctx| Ok(B(ctx.get()?))).named("b").depends_on::<A>();

        let ctx = context(beans).unwrap();
        match ctx.instantiate_all() {
            Err(BeanError::CyclicDependency { chain }) => assert_eq!(chain, vec!["a", "b", "a"]),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn test_undeclared_cycle_detected_at_creation() {
        let mut beans = BeansDsl::new();
        beans.bean(|ctx| Ok(A(ctx.get()?))).named("a");
        beans.bean(|ctx| Ok(B(ctx.get()?))).named("b");

        let ctx = context(beans).unwrap();
        match ctx.instantiate_all() {
            Err(BeanError::CyclicDependency { chain }) => assert_eq!(chain, vec!["a", "b", "a"]),
            other => panic!("unexpected: {other:?}"),
        }
        assert!(!ctx.is_created("a"));
    }

    #[test]
    fn test_factory_failure_wrapped() {
        let mut beans = BeansDsl::new();
        beans.bean::<Repo, _>(|_ctx| Err("disk unavailable".into())).named("repo");

        let ctx = context(beans).unwrap();
        match ctx.instantiate_all() {
            Err(BeanError::Creation { name, source }) => {
                assert_eq!(name, "repo");
                assert_eq!(source.to_string(), "disk unavailable");
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn test_listeners_fire_in_order() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let first = seen.clone();
        let second = seen.clone();
        let listeners = ListenerRegistry::new(vec![
            ListenerRegistration::new(move |_e: &ContextStarted, _ctx| {
                first.lock().unwrap().push("first");
                Ok(())
            }),
            ListenerRegistration::new(move |_e: &ContextStarted, _ctx| {
                second.lock().unwrap().push("second");
                Ok(())
            }),
        ]);
        let ctx = ApplicationContext::new(
            Vec::new(),
            listeners,
            Profiles::default(),
            PropertySource::default(),
        )
        .unwrap();

        assert_eq!(ctx.publish(&ContextStarted).unwrap(), 2);
        assert_eq!(*seen.lock().unwrap(), vec!["first", "second"]);
    }
}
