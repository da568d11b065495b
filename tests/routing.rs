//! Route tables end to end: nesting, match order, suspending handlers.

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use tokio::sync::Notify;
use webwire::config::ApplicationType;
use webwire::{application, router, RequestExt};

mod common;

#[tokio::test]
async fn test_nested_route_is_reached_over_socket() {
    let app = application(ApplicationType::Reactive, |app| {
        app.property("server.port", "0");
        app.server(|s| {
            s.host("127.0.0.1");
            s.router(|_ctx, r| {
                r.get("/", |_req| "root");
                r.nest("/api", |r| {
                    r.get("/", |_req| "api list");
                });
                Ok(())
            });
        });
    })
    .unwrap();

    let running = app.run("").await.unwrap();
    let client = common::client();

    let res = client.get(common::url(&running, "/api/")).send().await.unwrap();
    assert_eq!(res.status(), 200);
    assert_eq!(res.text().await.unwrap(), "api list");

    let res = client.get(common::url(&running, "/")).send().await.unwrap();
    assert_eq!(res.text().await.unwrap(), "root");

    let res = client.get(common::url(&running, "/missing")).send().await.unwrap();
    assert_eq!(res.status(), 404);

    running.stop().await.unwrap();
}

#[tokio::test]
async fn test_blog_route_table_dispatches_every_route() {
    let app = application(ApplicationType::Reactive, |app| {
        app.server(|s| {
            s.router(|_ctx, r| {
                r.get("/", |_req| "index");
                r.get("/article/{id}", |req| {
                    format!("article {}", req.path_param("id").unwrap_or_default())
                });
                Ok(())
            });
            s.co_router(|_ctx, r| {
                r.nest("/api", |r| {
                    r.get("/", |_req| async { "list" });
                    r.get("/{id}", |req| {
                        let body = format!("show {}", req.path_param("id").unwrap_or_default());
                        async move { body }
                    });
                    r.post("/", |_req| async { (StatusCode::CREATED, "create") });
                    r.put("/{id}", |req| {
                        let body = format!("update {}", req.path_param("id").unwrap_or_default());
                        async move { body }
                    });
                    r.delete("/{id}", |_req| async { StatusCode::NO_CONTENT });
                });
                Ok(())
            });
        });
    })
    .unwrap();
    let realized = app.realize("").unwrap();
    assert_eq!(realized.routes.len(), 7);

    let cases = [
        (Method::GET, "/", StatusCode::OK, "index"),
        (Method::GET, "/article/7", StatusCode::OK, "article 7"),
        (Method::GET, "/api/", StatusCode::OK, "list"),
        (Method::GET, "/api/7", StatusCode::OK, "show 7"),
        (Method::POST, "/api/", StatusCode::CREATED, "create"),
        (Method::PUT, "/api/7", StatusCode::OK, "update 7"),
        (Method::DELETE, "/api/7", StatusCode::NO_CONTENT, ""),
        (Method::DELETE, "/article/7", StatusCode::NOT_FOUND, "No matching route found"),
        (Method::GET, "/api/7/comments", StatusCode::NOT_FOUND, "No matching route found"),
    ];
    for (method, path, status, body) in cases {
        let request = Request::builder()
            .method(method.clone())
            .uri(path)
            .body(Body::empty())
            .unwrap();
        let response = common::call(&realized, request).await;
        assert_eq!(response.status(), status, "{method} {path}");
        assert_eq!(common::body_string(response).await, body, "{method} {path}");
    }
}

#[tokio::test]
async fn test_head_served_by_get_route_over_socket() {
    let app = application(ApplicationType::Reactive, |app| {
        app.property("server.port", "0");
        app.server(|s| {
            s.host("127.0.0.1");
            s.router(|_ctx, r| {
                r.get("/", |_req| "index");
                Ok(())
            });
        });
    })
    .unwrap();

    let running = app.run("").await.unwrap();
    let res = common::client()
        .head(common::url(&running, "/"))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 200);
    assert!(res.bytes().await.unwrap().is_empty());

    running.stop().await.unwrap();
}

#[tokio::test]
async fn test_first_registered_route_wins() {
    let app = application(ApplicationType::Reactive, |app| {
        app.server(|s| {
            s.router(|_ctx, r| {
                r.get("/{name}", |_req| "variable");
                r.get("/fixed", |_req| "fixed");
                Ok(())
            });
        });
    })
    .unwrap();
    let realized = app.realize("").unwrap();

    let response = common::get(&realized, "/fixed").await;
    assert_eq!(common::body_string(response).await, "variable");
}

#[tokio::test]
async fn test_path_variables_reach_handler() {
    let app = application(ApplicationType::Reactive, |app| {
        app.server(|s| {
            s.router(|_ctx, r| {
                r.get("/article/{id}", |req| {
                    req.path_param("id").unwrap_or_default().to_string()
                });
                Ok(())
            });
        });
    })
    .unwrap();
    let realized = app.realize("").unwrap();

    let response = common::get(&realized, "/article/42").await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers().contains_key("x-request-id"));
    assert_eq!(common::body_string(response).await, "42");
}

#[tokio::test]
async fn test_route_table_beans_are_served() {
    let table = router(|r| {
        r.get("/from-bean", |_req| "bean");
    })
    .unwrap();
    let app = application(ApplicationType::Reactive, move |app| {
        app.beans(|b| {
            b.instance(table);
        });
        app.server(|s| {
            s.router(|_ctx, r| {
                r.get("/from-server", |_req| "server");
                Ok(())
            });
        });
    })
    .unwrap();
    let realized = app.realize("").unwrap();
    assert_eq!(realized.routes.len(), 2);

    let response = common::get(&realized, "/from-bean").await;
    assert_eq!(common::body_string(response).await, "bean");
    let response = common::get(&realized, "/from-server").await;
    assert_eq!(common::body_string(response).await, "server");
}

#[tokio::test]
async fn test_unsupported_content_type_rejected() {
    let app = application(ApplicationType::Reactive, |app| {
        app.server(|s| {
            s.codecs(|c| {
                c.json();
            });
            s.router(|_ctx, r| {
                r.post("/items", |_req| StatusCode::CREATED);
                Ok(())
            });
        });
    })
    .unwrap();
    let realized = app.realize("").unwrap();

    let text = Request::post("/items")
        .header(header::CONTENT_TYPE, "text/plain")
        .body(Body::from("hello"))
        .unwrap();
    assert_eq!(
        common::call(&realized, text).await.status(),
        StatusCode::UNSUPPORTED_MEDIA_TYPE
    );

    let json = Request::post("/items")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{}"))
        .unwrap();
    assert_eq!(common::call(&realized, json).await.status(), StatusCode::CREATED);
}

#[tokio::test]
async fn test_suspended_handler_does_not_block_others() {
    let release = Arc::new(Notify::new());
    let gate = release.clone();
    let app = application(ApplicationType::Reactive, move |app| {
        app.property("server.port", "0");
        app.server(move |s| {
            s.host("127.0.0.1");
            s.co_router(move |_ctx, r| {
                let gate = gate.clone();
                r.get("/wait", move |_req| {
                    let gate = gate.clone();
                    async move {
                        gate.notified().await;
                        "released"
                    }
                });
                r.get("/ping", |_req| async { "pong" });
                Ok(())
            });
        });
    })
    .unwrap();

    let running = app.run("").await.unwrap();
    let client = common::client();

    let pending = tokio::spawn({
        let client = client.clone();
        let url = common::url(&running, "/wait");
        async move { client.get(url).send().await.unwrap().text().await.unwrap() }
    });

    let res = client.get(common::url(&running, "/ping")).send().await.unwrap();
    assert_eq!(res.text().await.unwrap(), "pong");
    assert!(!pending.is_finished());

    release.notify_one();
    let body = tokio::time::timeout(Duration::from_secs(5), pending)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(body, "released");

    running.stop().await.unwrap();
}
