//! Blog sample: repositories seeded at startup, an HTML front page and a
//! JSON article API.
//!
//! # Data Flow
//! ```text
//! GET /, GET /article/{id}   → HtmlHandler    → TemplateEngine ("index", "article")
//! /api/...                   → ArticleHandler → ArticleRepository (Basic auth)
//! ```

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::response::{IntoResponse, Response};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};

use webwire::config::{configuration, ConfigError, ConfigurationBlock};
use webwire::context::ContextStarted;
use webwire::http::{Codecs, TemplateEngine};
use webwire::security::UserDetails;
use webwire::{application, Application, ApplicationType, LogLevel, RequestExt, ServerResponse};

const INDEX_TEMPLATE: &str = r#"<!DOCTYPE html>
<html>
<head><title>{{title}}</title></head>
<body>
<h1>{{title}}</h1>
<p>Written in {{city.name}}, {{city.country}}</p>
{{#articles}}
<article>
  <h2><a href="/article/{{id}}">{{title}}</a></h2>
  <p>{{headline}}</p>
  <small>by {{author_name}}</small>
</article>
{{/articles}}
{{^articles}}<p>No articles yet.</p>{{/articles}}
</body>
</html>
"#;

const ARTICLE_TEMPLATE: &str = r#"<!DOCTYPE html>
<html>
<head><title>{{article.title}}</title></head>
<body>
<h1>{{article.title}}</h1>
<p><em>{{article.headline}}</em></p>
<div>{{article.content}}</div>
<small>by {{author_name}}</small>
<p><a href="/">Back</a></p>
</body>
</html>
"#;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct User {
    pub login: String,
    pub first_name: String,
    pub last_name: String,
}

impl User {
    fn display_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Article {
    pub id: u64,
    pub title: String,
    pub headline: String,
    pub content: String,
    pub author: String,
}

/// Body of `POST /api/` and `PUT /api/{id}`.
#[derive(Debug, Clone, Deserialize)]
pub struct ArticleInput {
    pub title: String,
    pub headline: String,
    pub content: String,
    pub author: String,
}

/// Bound from the `city.*` properties.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct City {
    pub name: String,
    pub country: String,
}

#[derive(Debug, Default)]
pub struct UserRepository {
    users: DashMap<String, User>,
}

impl UserRepository {
    pub fn init(&self) {
        for (login, first, last) in [
            ("smaldini", "Stéphane", "Maldini"),
            ("sdeleuze", "Sébastien", "Deleuze"),
            ("bclozel", "Brian", "Clozel"),
        ] {
            self.users.insert(
                login.to_string(),
                User {
                    login: login.to_string(),
                    first_name: first.to_string(),
                    last_name: last.to_string(),
                },
            );
        }
        tracing::info!(users = self.users.len(), "User repository seeded");
    }

    pub fn find_one(&self, login: &str) -> Option<User> {
        self.users.get(login).map(|user| user.value().clone())
    }
}

#[derive(Debug, Default)]
pub struct ArticleRepository {
    articles: DashMap<u64, Article>,
    next_id: AtomicU64,
}

impl ArticleRepository {
    pub fn init(&self) {
        self.save(ArticleInput {
            title: "Reactor Bismuth is out".to_string(),
            headline: "Lorem ipsum".to_string(),
            content: "dolor sit amet".to_string(),
            author: "smaldini".to_string(),
        });
        self.save(ArticleInput {
            title: "Reactor Aluminium has landed".to_string(),
            headline: "Lorem ipsum".to_string(),
            content: "dolor sit amet".to_string(),
            author: "smaldini".to_string(),
        });
        tracing::info!(articles = self.articles.len(), "Article repository seeded");
    }

    /// All articles, oldest first.
    pub fn find_all(&self) -> Vec<Article> {
        let mut articles: Vec<Article> = self.articles.iter().map(|a| a.value().clone()).collect();
        articles.sort_by_key(|a| a.id);
        articles
    }

    pub fn find_one(&self, id: u64) -> Option<Article> {
        self.articles.get(&id).map(|a| a.value().clone())
    }

    pub fn save(&self, input: ArticleInput) -> Article {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        let article = Article {
            id,
            title: input.title,
            headline: input.headline,
            content: input.content,
            author: input.author,
        };
        self.articles.insert(id, article.clone());
        article
    }

    pub fn update(&self, id: u64, input: ArticleInput) -> Option<Article> {
        let mut entry = self.articles.get_mut(&id)?;
        entry.title = input.title;
        entry.headline = input.headline;
        entry.content = input.content;
        entry.author = input.author;
        Some(entry.value().clone())
    }

    pub fn delete(&self, id: u64) -> bool {
        self.articles.remove(&id).is_some()
    }
}

#[derive(Serialize)]
struct ArticleView {
    #[serde(flatten)]
    article: Article,
    author_name: String,
}

/// Server-side rendered pages.
pub struct HtmlHandler {
    users: Arc<UserRepository>,
    articles: Arc<ArticleRepository>,
    templates: Arc<TemplateEngine>,
    city: Arc<City>,
}

impl HtmlHandler {
    fn author_name(&self, login: &str) -> String {
        self.users
            .find_one(login)
            .map(|u| u.display_name())
            .unwrap_or_else(|| login.to_string())
    }

    pub fn blog(&self, _request: Request<Body>) -> Response {
        let articles: Vec<ArticleView> = self
            .articles
            .find_all()
            .into_iter()
            .map(|article| ArticleView {
                author_name: self.author_name(&article.author),
                article,
            })
            .collect();
        let model = serde_json::json!({
            "title": "Blog",
            "city": &*self.city,
            "articles": articles,
        });
        ServerResponse::ok().render(&self.templates, "index", &model)
    }

    pub fn article(&self, request: Request<Body>) -> Response {
        let Some(article) = article_id(&request).and_then(|id| self.articles.find_one(id)) else {
            return ServerResponse::not_found().text("Article not found");
        };
        let model = serde_json::json!({
            "author_name": self.author_name(&article.author),
            "article": article,
        });
        ServerResponse::ok().render(&self.templates, "article", &model)
    }
}

/// JSON article API.
pub struct ArticleHandler {
    articles: Arc<ArticleRepository>,
    codecs: Arc<Codecs>,
}

impl ArticleHandler {
    fn respond<T: Serialize>(&self, status: StatusCode, value: &T) -> Response {
        match self.codecs.write_json(status, value) {
            Ok(response) => response,
            Err(e) => e.into_response(),
        }
    }

    pub async fn list(&self, _request: Request<Body>) -> Response {
        self.respond(StatusCode::OK, &self.articles.find_all())
    }

    pub async fn show(&self, request: Request<Body>) -> Response {
        match article_id(&request).and_then(|id| self.articles.find_one(id)) {
            Some(article) => self.respond(StatusCode::OK, &article),
            None => ServerResponse::not_found().build(),
        }
    }

    pub async fn create(&self, request: Request<Body>) -> Response {
        match self.codecs.read_json::<ArticleInput>(request).await {
            Ok(input) => {
                let article = self.articles.save(input);
                tracing::info!(id = article.id, "Article created");
                self.respond(StatusCode::CREATED, &article)
            }
            Err(e) => e.into_response(),
        }
    }

    pub async fn update(&self, request: Request<Body>) -> Response {
        let Some(id) = article_id(&request) else {
            return ServerResponse::not_found().build();
        };
        match self.codecs.read_json::<ArticleInput>(request).await {
            Ok(input) => match self.articles.update(id, input) {
                Some(article) => self.respond(StatusCode::OK, &article),
                None => ServerResponse::not_found().build(),
            },
            Err(e) => e.into_response(),
        }
    }

    pub async fn delete(&self, request: Request<Body>) -> Response {
        match article_id(&request) {
            Some(id) if self.articles.delete(id) => ServerResponse::no_content().build(),
            _ => ServerResponse::not_found().build(),
        }
    }
}

fn article_id(request: &Request<Body>) -> Option<u64> {
    request.path_param("id")?.parse().ok()
}

/// Repositories plus the listener that seeds them once the context has started.
pub fn data_configuration() -> Result<ConfigurationBlock, ConfigError> {
    configuration(|c| {
        c.name("data").beans(|b| {
            b.instance(UserRepository::default());
            b.instance(ArticleRepository::default());
        });
        c.listener(|_event: &ContextStarted, ctx| {
            ctx.get::<UserRepository>()?.init();
            ctx.get::<ArticleRepository>()?.init();
            Ok(())
        });
    })
}

/// Handlers, routes and the server block.
pub fn web_configuration() -> Result<ConfigurationBlock, ConfigError> {
    configuration(|c| {
        c.name("web").beans(|b| {
            b.bean(|ctx| {
                Ok(HtmlHandler {
                    users: ctx.get()?,
                    articles: ctx.get()?,
                    templates: ctx.get()?,
                    city: ctx.get()?,
                })
            })
            .depends_on::<UserRepository>()
            .depends_on::<ArticleRepository>()
            .depends_on::<TemplateEngine>()
            .depends_on::<City>();
            b.bean(|ctx| {
                Ok(ArticleHandler {
                    articles: ctx.get()?,
                    codecs: ctx.get()?,
                })
            })
            .depends_on::<ArticleRepository>()
            .depends_on::<Codecs>();
        });

        c.server(|s| {
            s.port(8080).port_for("test", 8181);
            s.cors(|cors| {
                cors.origin("example.com");
            });
            s.mustache_with(|t| {
                t.template("index", INDEX_TEMPLATE)
                    .template("article", ARTICLE_TEMPLATE);
            });
            s.codecs(|codecs| {
                codecs.string().json();
            });

            s.router(|ctx, r| {
                let html = ctx.get::<HtmlHandler>()?;
                let page = html.clone();
                r.get("/", move |req| page.blog(req));
                r.get("/article/{id}", move |req| html.article(req));
                Ok(())
            });

            s.co_router(|ctx, r| {
                let api = ctx.get::<ArticleHandler>()?;
                r.nest("/api", |r| {
                    let h = api.clone();
                    r.get("/", move |req| {
                        let h = h.clone();
                        async move { h.list(req).await }
                    });
                    let h = api.clone();
                    r.get("/{id}", move |req| {
                        let h = h.clone();
                        async move { h.show(req).await }
                    });
                    let h = api.clone();
                    r.post("/", move |req| {
                        let h = h.clone();
                        async move { h.create(req).await }
                    });
                    let h = api.clone();
                    r.put("/{id}", move |req| {
                        let h = h.clone();
                        async move { h.update(req).await }
                    });
                    let h = api.clone();
                    r.delete("/{id}", move |req| {
                        let h = h.clone();
                        async move { h.delete(req).await }
                    });
                });
                Ok(())
            });

            s.security(|sec| {
                sec.users([
                    UserDetails::new("admin", "{noop}admin").roles(["ADMIN"]),
                    UserDetails::new("reader", "{noop}reader"),
                ])
                .permit_all("/")
                .permit_all("/article/{id}")
                .has_role("/api/{*rest}", "ADMIN");
            });
        });

        c.web_client(|client| {
            client.codecs(|codecs| {
                codecs.string().json();
            });
        });
    })
}

/// The blog application.
pub fn blog_application(
    property_file: Option<PathBuf>,
    metrics: Option<SocketAddr>,
) -> Result<Application, ConfigError> {
    let data = data_configuration()?;
    let web = web_configuration()?;

    application(ApplicationType::Reactive, |app| {
        app.logging(|l| {
            l.level(LogLevel::Info)
                .level_for("dev", LogLevel::Debug)
                .logger("tower_http", LogLevel::Debug);
        });
        app.property("city.name", "Lyon")
            .property("city.country", "France");
        if let Some(path) = property_file {
            app.property_file(path);
        }
        if let Some(addr) = metrics {
            app.metrics_endpoint(addr);
        }
        app.configuration_properties::<City>("city")
            .enable(&data)
            .enable(&web);
    })
}
