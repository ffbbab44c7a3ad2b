//! # Parlor - Local-First Social Network
//!
//! The main binary for Parlor.
//!
//! This application provides:
//! - HTTP REST API server (axum-based)
//! - CLI interface, one command per engine operation
//! - Refresh polling for new messages and notifications
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                      apps/parlor (THE BINARY)                   │
//! │                                                                 │
//! │  ┌─────────────┐    ┌─────────────┐    ┌──────────────────┐     │
//! │  │   CLI       │    │   HTTP API  │    │  Refresh poller  │     │
//! │  │  (clap)     │    │   (axum)    │    │  (tokio interval)│     │
//! │  └──────┬──────┘    └──────┬──────┘    └────────┬─────────┘     │
//! │         │                  │                    │               │
//! │         └──────────────────┼────────────────────┘               │
//! │                            ▼                                    │
//! │                    ┌───────────────┐                            │
//! │                    │  parlor-core  │                            │
//! │                    │ (THE LOGIC)   │                            │
//! │                    └───────────────┘                            │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```bash
//! # Start the HTTP server
//! parlor server --host 0.0.0.0 --port 8080
//!
//! # CLI operations
//! parlor register "Jane Doe" jane@example.com secret
//! parlor post "Hello network"
//! parlor feed
//! parlor watch
//! ```

use clap::Parser;
use parlor::cli;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

// =============================================================================
// APPLICATION ENTRY POINT
// =============================================================================

#[tokio::main]
async fn main() {
    // PARLOR_LOG_FORMAT=json switches to machine-parseable output.
    let log_format = std::env::var("PARLOR_LOG_FORMAT").unwrap_or_else(|_| "text".to_string());

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "parlor=info,parlor_core=info,tower_http=debug".into());

    match log_format.as_str() {
        "json" => {
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer().json())
                .init();
        }
        _ => {
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer())
                .init();
        }
    }

    let cli = cli::Cli::parse();

    if !cli.quiet && !cli.json_mode {
        print_banner();
    }

    if let Err(e) = cli::execute(cli).await {
        tracing::error!("Error: {}", e);
        std::process::exit(1);
    }
}

/// Print the Parlor startup banner.
fn print_banner() {
    println!(
        r#"
  ██████╗  █████╗ ██████╗ ██╗      ██████╗ ██████╗
  ██╔══██╗██╔══██╗██╔══██╗██║     ██╔═══██╗██╔══██╗
  ██████╔╝███████║██████╔╝██║     ██║   ██║██████╔╝
  ██╔═══╝ ██╔══██║██╔══██╗██║     ██║   ██║██╔══██╗
  ██║     ██║  ██║██║  ██║███████╗╚██████╔╝██║  ██║
  ╚═╝     ╚═╝  ╚═╝╚═╝  ╚═╝╚══════╝ ╚═════╝ ╚═╝  ╚═╝

  Local-First Social Network v{}
"#,
        env!("CARGO_PKG_VERSION")
    );
}
