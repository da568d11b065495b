//! Bean definitions and the `beans { }` registration DSL.

use std::any::{type_name, Any, TypeId};
use std::fmt;
use std::sync::Arc;

use crate::context::container::ApplicationContext;

/// Error type returned by bean factories and listeners.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

pub(crate) type SharedBean = Arc<dyn Any + Send + Sync>;

type Factory = dyn Fn(&ApplicationContext) -> Result<SharedBean, BoxError> + Send + Sync;

/// Failures while registering or constructing beans.
#[derive(Debug, thiserror::Error)]
pub enum BeanError {
    #[error("bean `{name}` is defined more than once")]
    DuplicateBean { name: String },

    #[error("bean `{bean}` depends on `{dependency}`, which is not defined")]
    UnresolvedDependency { bean: String, dependency: String },

    #[error("cyclic bean dependency: {}", .chain.join(" -> "))]
    CyclicDependency { chain: Vec<String> },

    #[error("expected a single bean of type `{type_name}` but found {}: {}", .candidates.len(), .candidates.join(", "))]
    NoUniqueBean {
        type_name: &'static str,
        candidates: Vec<String>,
    },

    #[error("bean `{name}` is not of type `{expected}`")]
    TypeMismatch { name: String, expected: &'static str },

    #[error("failed to create bean `{name}`: {source}")]
    Creation {
        name: String,
        #[source]
        source: BoxError,
    },
}

/// A declared dependency on another bean, by type and optionally by name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Dependency {
    pub(crate) type_id: TypeId,
    pub(crate) type_name: &'static str,
    pub(crate) name: Option<String>,
}

impl Dependency {
    pub fn of<T: Any>() -> Self {
        Self {
            type_id: TypeId::of::<T>(),
            type_name: type_name::<T>(),
            name: None,
        }
    }

    pub fn named<T: Any>(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            ..Self::of::<T>()
        }
    }

    /// Name or type used in error messages.
    pub fn describe(&self) -> &str {
        self.name.as_deref().unwrap_or(self.type_name)
    }
}

/// A deferred bean registration: type, name, declared dependencies, factory.
#[derive(Clone)]
pub struct BeanDefinition {
    name: String,
    type_id: TypeId,
    type_name: &'static str,
    dependencies: Vec<Dependency>,
    factory: Arc<Factory>,
}

impl BeanDefinition {
    /// Define a bean built by `factory` the first time it is referenced.
    ///
    /// The default name is the type name.
    pub fn new<T, F>(factory: F) -> Self
    where
        T: Send + Sync + 'static,
        F: Fn(&ApplicationContext) -> Result<T, BoxError> + Send + Sync + 'static,
    {
        Self {
            name: type_name::<T>().to_string(),
            type_id: TypeId::of::<T>(),
            type_name: type_name::<T>(),
            dependencies: Vec::new(),
            factory: Arc::new(move |ctx: &ApplicationContext| factory(ctx).map(|bean| Arc::new(bean) as SharedBean)),
        }
    }

    /// Define a bean from an already constructed value.
    pub fn instance<T: Send + Sync + 'static>(value: T) -> Self {
        let shared: SharedBean = Arc::new(value);
        Self {
            name: type_name::<T>().to_string(),
            type_id: TypeId::of::<T>(),
            type_name: type_name::<T>(),
            dependencies: Vec::new(),
            factory: Arc::new(move |_ctx: &ApplicationContext| Ok(shared.clone())),
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn depends_on(mut self, dependency: Dependency) -> Self {
        self.dependencies.push(dependency);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn type_id(&self) -> TypeId {
        self.type_id
    }

    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    pub fn dependencies(&self) -> &[Dependency] {
        &self.dependencies
    }

    pub(crate) fn create(&self, ctx: &ApplicationContext) -> Result<SharedBean, BoxError> {
        (self.factory)(ctx)
    }
}

impl fmt::Debug for BeanDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BeanDefinition")
            .field("name", &self.name)
            .field("type_name", &self.type_name)
            .field("dependencies", &self.dependencies)
            .finish()
    }
}

/// Receiver of the `beans { }` block.
#[derive(Debug, Default)]
pub struct BeansDsl {
    definitions: Vec<BeanDefinition>,
}

impl BeansDsl {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a lazily constructed bean.
    ///
    /// ```ignore
    /// beans.bean(|ctx| Ok(HtmlHandler::new(ctx.get()?, ctx.get()?)))
    ///     .depends_on::<UserRepository>()
    ///     .depends_on::<ArticleRepository>();
    /// ```
    pub fn bean<T, F>(&mut self, factory: F) -> BeanRegistration<'_>
    where
        T: Send + Sync + 'static,
        F: Fn(&ApplicationContext) -> Result<T, BoxError> + Send + Sync + 'static,
    {
        self.register(BeanDefinition::new(factory))
    }

    /// Register a bean from a ready value.
    pub fn instance<T: Send + Sync + 'static>(&mut self, value: T) -> BeanRegistration<'_> {
        self.register(BeanDefinition::instance(value))
    }

    pub fn register(&mut self, definition: BeanDefinition) -> BeanRegistration<'_> {
        self.definitions.push(definition);
        let index = self.definitions.len() - 1;
        BeanRegistration {
            definition: &mut self.definitions[index],
        }
    }

    pub(crate) fn into_definitions(self) -> Vec<BeanDefinition> {
        self.definitions
    }
}

/// Handle to refine the most recent registration.
pub struct BeanRegistration<'a> {
    definition: &'a mut BeanDefinition,
}

impl BeanRegistration<'_> {
    pub fn named(self, name: impl Into<String>) -> Self {
        self.definition.name = name.into();
        self
    }

    pub fn depends_on<D: Any>(self) -> Self {
        self.definition.dependencies.push(Dependency::of::<D>());
        self
    }

    pub fn depends_on_named<D: Any>(self, name: impl Into<String>) -> Self {
        self.definition.dependencies.push(Dependency::named::<D>(name));
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Repo;

    #[test]
    fn test_default_name_is_type_name() {
        let def = BeanDefinition::instance(Repo);
        assert_eq!(def.name(), type_name::<Repo>());
        assert_eq!(def.type_id(), TypeId::of::<Repo>());
    }

    #[test]
    fn test_registration_refines_last_definition() {
        let mut beans = BeansDsl::new();
        beans.instance(1u32);
        beans
            .bean(|_ctx| Ok(Repo))
            .named("repo")
            .depends_on::<u32>();

        let defs = beans.into_definitions();
        assert_eq!(defs.len(), 2);
        assert_eq!(defs[1].name(), "repo");
        assert_eq!(defs[1].dependencies(), &[Dependency::of::<u32>()]);
        assert!(defs[0].dependencies().is_empty());
    }
}
