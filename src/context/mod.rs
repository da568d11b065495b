//! Dependency-injection subsystem.
//!
//! # Data Flow
//! ```text
//! Declaration (configuration blocks):
//!     beans { bean(...) } → bean.rs (BeanDefinition: type, name, deps, factory)
//!     listener<E> { ... } → events.rs (ListenerRegistration)
//!
//! Realization (run):
//!     merged definitions
//!     → container.rs (duplicate names, topological order, cycle check)
//!     → singletons created lazily, dependencies first
//!     → events.rs (ContextRefreshed / ContextStarted / ContextClosed)
//! ```
//!
//! # Design Decisions
//! - Beans are keyed by name; the default name is the type name
//! - Lookup by type must be unambiguous, lookup by name must match the type
//! - The container owns every instance; handlers hold `Arc`s

pub mod bean;
pub mod container;
pub mod events;

pub use bean::{BeanDefinition, BeanError, BeanRegistration, BeansDsl, BoxError, Dependency};
pub use container::{ApplicationContext, BeanRegistry};
pub use events::{
    ApplicationEvent, ContextClosed, ContextRefreshed, ContextStarted, EventError,
    ListenerRegistration, ListenerRegistry,
};
