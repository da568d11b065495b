//! Blog demo built on webwire.
//!
//! # Architecture Overview
//!
//! ```text
//!     application(Reactive)
//!       ├── logging, properties (code < --config file < environment)
//!       ├── configuration_properties::<City>("city")
//!       ├── enable(data)  → UserRepository, ArticleRepository, seed listener
//!       └── enable(web)   → HtmlHandler, ArticleHandler, server { }, web_client { }
//!
//!     Client ──▶ trace ──▶ request id ──▶ cors ──▶ timeout ──▶ body limit
//!            ──▶ Basic auth ──▶ route table ──▶ handler
//! ```
//!
//! Run with `--profiles test` to listen on 8181 instead of 8080.

mod blog;

use std::net::SocketAddr;
use std::path::PathBuf;

use clap::Parser;

#[derive(Parser)]
#[command(name = "webwire")]
#[command(about = "Blog sample application", long_about = None)]
struct Cli {
    /// Active profiles, comma or space separated
    #[arg(short, long, default_value = "")]
    profiles: String,

    /// TOML property file layered over the built-in defaults
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Expose Prometheus metrics on this address
    #[arg(long)]
    metrics: Option<SocketAddr>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let app = blog::blog_application(cli.config, cli.metrics)?;
    let running = app.run(&cli.profiles).await?;
    if let Some(addr) = running.local_addr() {
        tracing::info!(address = %addr, "Blog ready");
    }

    running.wait().await?;
    tracing::info!("Blog stopped");
    Ok(())
}
