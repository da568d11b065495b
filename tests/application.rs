//! Application realization: composition, beans, properties, lifecycle, security.

use std::io::Write;
use std::sync::{Arc, Mutex};

use axum::body::Body;
use axum::http::Request;
use serde::Deserialize;
use webwire::config::{configuration, ApplicationType, ConfigError};
use webwire::context::{ContextClosed, ContextRefreshed, ContextStarted};
use webwire::security::{
    Authentication, DelegatingPasswordEncoder, PasswordEncoder, SecurityError, UserDetails,
};
use webwire::{application, BeanError, StartupError};

mod common;

#[derive(Debug, Deserialize)]
struct City {
    name: String,
    country: String,
}

#[tokio::test]
async fn test_configuration_properties_from_environment() {
    std::env::set_var("WWENVCITY_NAME", "Lyon");
    std::env::set_var("WWENVCITY_COUNTRY", "France");

    let app = application(ApplicationType::None, |app| {
        app.property("wwenvcity.country", "Germany");
        app.configuration_properties::<City>("wwenvcity");
    })
    .unwrap();
    let running = app.run("").await.unwrap();

    let city = running.context().get::<City>().unwrap();
    assert_eq!(city.name, "Lyon");
    assert_eq!(city.country, "France");
    running.stop().await.unwrap();
}

#[test]
fn test_property_file_overrides_code_defaults() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "[wwfilecity]\nname = \"Paris\"").unwrap();

    let app = application(ApplicationType::None, |app| {
        app.property("wwfilecity.name", "Nantes")
            .property("wwfilecity.country", "France")
            .property_file(file.path());
        app.configuration_properties::<City>("wwfilecity");
    })
    .unwrap();
    let realized = app.realize("").unwrap();

    let city = realized.context.get::<City>().unwrap();
    assert_eq!(city.name, "Paris");
    assert_eq!(city.country, "France");
}

#[test]
fn test_invalid_property_prefix_rejected() {
    let result = application(ApplicationType::None, |app| {
        app.configuration_properties::<City>("City..Name");
    });
    assert!(matches!(result, Err(ConfigError::InvalidPropertyPrefix { .. })));
}

#[test]
fn test_two_server_blocks_are_ambiguous() {
    let first = configuration(|c| {
        c.name("first").server(|s| {
            s.port(8080);
        });
    })
    .unwrap();
    let second = configuration(|c| {
        c.name("second").server(|s| {
            s.port(9090);
        });
    })
    .unwrap();

    let app = application(ApplicationType::Reactive, |app| {
        app.enable(&first).enable(&second);
    })
    .unwrap();

    match app.realize("") {
        Err(StartupError::Config(ConfigError::AmbiguousServerConfig { first, second })) => {
            assert_eq!(first, "first");
            assert_eq!(second, "second");
        }
        other => panic!("expected ambiguous server config, got {other:?}"),
    }
}

#[test]
fn test_duplicate_bean_rejected() {
    let app = application(ApplicationType::None, |app| {
        app.beans(|b| {
            b.instance(1u32);
            b.instance(2u32);
        });
    })
    .unwrap();

    assert!(matches!(
        app.realize(""),
        Err(StartupError::Bean(BeanError::DuplicateBean { .. }))
    ));
}

#[test]
fn test_unresolved_dependency_rejected() {
    let app = application(ApplicationType::None, |app| {
        app.beans(|b| {
            b.bean(|ctx| Ok(format!("{}", ctx.get::<u64>()?)))
                .depends_on::<u64>();
        });
    })
    .unwrap();

    assert!(matches!(
        app.realize(""),
        Err(StartupError::Bean(BeanError::UnresolvedDependency { .. }))
    ));
}

#[test]
fn test_cyclic_dependency_rejected() {
    let app = application(ApplicationType::None, |app| {
        app.beans(|b| {
            b.bean(|ctx| Ok(*ctx.get::<u16>()? as u32)).depends_on::<u16>();
            b.bean(|ctx| Ok(*ctx.get::<u32>()? as u16)).depends_on::<u32>();
        });
    })
    .unwrap();

    assert!(matches!(
        app.realize(""),
        Err(StartupError::Bean(BeanError::CyclicDependency { .. }))
    ));
}

#[test]
fn test_dependencies_across_enabled_blocks() {
    let data = configuration(|c| {
        c.beans(|b| {
            b.instance(String::from("repository"));
        });
    })
    .unwrap();
    let app = application(ApplicationType::None, |app| {
        app.beans(|b| {
            b.bean(|ctx| Ok(ctx.get::<String>()?.len())).depends_on::<String>();
        });
        app.enable(&data);
    })
    .unwrap();

    let realized = app.realize("").unwrap();
    assert_eq!(*realized.context.get::<usize>().unwrap(), "repository".len());
}

#[test]
fn test_profile_block_only_when_active() {
    let declare = || {
        application(ApplicationType::None, |app| {
            app.profile("dev", |c| {
                c.beans(|b| {
                    b.instance(String::from("dev only"));
                });
            });
        })
        .unwrap()
    };

    let realized = declare().realize("dev").unwrap();
    assert!(realized.context.contains::<String>());

    let realized = declare().realize("prod").unwrap();
    assert!(!realized.context.contains::<String>());
}

#[test]
fn test_port_follows_active_profile() {
    let declare = || {
        application(ApplicationType::Reactive, |app| {
            app.server(|s| {
                s.port(8080).port_for("test", 8181);
            });
        })
        .unwrap()
    };

    assert_eq!(declare().realize("test").unwrap().port, 8181);
    assert_eq!(declare().realize("").unwrap().port, 8080);
}

#[tokio::test]
async fn test_run_twice_fails() {
    let app = application(ApplicationType::None, |_app| {}).unwrap();

    let running = app.run("").await.unwrap();
    assert!(running.local_addr().is_none());
    assert!(matches!(app.run("").await, Err(StartupError::AlreadyRealized)));
    running.stop().await.unwrap();
}

#[tokio::test]
async fn test_lifecycle_events_in_order() {
    let events = Arc::new(Mutex::new(Vec::new()));
    let (refreshed, started, closed) = (events.clone(), events.clone(), events.clone());

    let app = application(ApplicationType::None, move |app| {
        app.listener(move |_e: &ContextRefreshed, _ctx| {
            refreshed.lock().unwrap().push("refreshed");
            Ok(())
        });
        app.listener(move |_e: &ContextStarted, _ctx| {
            started.lock().unwrap().push("started");
            Ok(())
        });
        app.listener(move |_e: &ContextClosed, _ctx| {
            closed.lock().unwrap().push("closed");
            Ok(())
        });
    })
    .unwrap();

    let running = app.run("").await.unwrap();
    assert_eq!(*events.lock().unwrap(), vec!["refreshed", "started"]);

    running.stop().await.unwrap();
    assert_eq!(*events.lock().unwrap(), vec!["refreshed", "started", "closed"]);
}

#[tokio::test]
async fn test_failing_listener_aborts_startup() {
    let app = application(ApplicationType::Reactive, |app| {
        app.property("server.port", "0");
        app.listener(|_e: &ContextStarted, _ctx| Err("seed failed".into()));
        app.server(|s| {
            s.host("127.0.0.1");
        });
    })
    .unwrap();

    assert!(matches!(app.run("").await, Err(StartupError::Event(_))));
}

#[test]
fn test_security_requires_authentication_source() {
    let app = application(ApplicationType::Reactive, |app| {
        app.server(|s| {
            s.security(|sec| {
                sec.permit_all("/");
            });
        });
    })
    .unwrap();

    assert!(matches!(
        app.realize(""),
        Err(StartupError::Security(SecurityError::MissingAuthentication))
    ));
}

#[tokio::test]
async fn test_basic_auth_over_socket() {
    let admin_password = DelegatingPasswordEncoder::default().encode("s3cret");

    let app = application(ApplicationType::Reactive, move |app| {
        app.property("server.port", "0");
        app.server(move |s| {
            s.host("127.0.0.1");
            s.router(|_ctx, r| {
                r.get("/public", |_req| "public");
                r.get("/private", |req: Request<Body>| {
                    req.extensions()
                        .get::<Authentication>()
                        .map(|auth| auth.principal.clone())
                        .unwrap_or_default()
                });
                r.get("/admin", |_req| "admin");
                Ok(())
            });
            s.security(|sec| {
                sec.users([
                    UserDetails::new("alice", "{noop}password").roles(["USER"]),
                    UserDetails::new("root", admin_password).roles(["ADMIN"]),
                ])
                .permit_all("/public")
                .authenticated("/private")
                .has_role("/admin", "ADMIN");
            });
        });
    })
    .unwrap();

    let running = app.run("").await.unwrap();
    let client = common::client();

    let res = client.get(common::url(&running, "/public")).send().await.unwrap();
    assert_eq!(res.status(), 200);

    let res = client.get(common::url(&running, "/private")).send().await.unwrap();
    assert_eq!(res.status(), 401);
    assert!(res.headers().contains_key("www-authenticate"));

    let res = client
        .get(common::url(&running, "/private"))
        .basic_auth("alice", Some("wrong"))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 401);

    let res = client
        .get(common::url(&running, "/private"))
        .basic_auth("alice", Some("password"))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 200);
    assert_eq!(res.text().await.unwrap(), "alice");

    let res = client
        .get(common::url(&running, "/admin"))
        .basic_auth("alice", Some("password"))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 403);

    let res = client
        .get(common::url(&running, "/admin"))
        .basic_auth("root", Some("s3cret"))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 200);

    running.stop().await.unwrap();
}
