//! Todo server example with live updates
//!
//! Run with: cargo run --example todo_server
//!
//! Configuration comes from the environment:
//!
//!   LIVESYNC_BIND_ADDR=127.0.0.1:8080 LIVESYNC_HEARTBEAT_SECS=5 \
//!     cargo run --example todo_server
//!
//! ## Watching a stream
//!
//! With curl:
//!   curl -N -H 'x-user-id: 1' http://localhost:8080/live/todos
//!   curl -N 'http://localhost:8080/live/todos?user=2'
//!
//! A background task plays the role of the application: it creates a todo for
//! user 1 every few seconds and broadcasts a tick on the `clock` channel.
//!
//! ## Features
//!
//! - Identity resolved from a header, falling back to a query parameter
//! - Publishing through the process-wide registry from anywhere in the app
//! - Graceful shutdown on Ctrl+C closes every open stream

use std::sync::Arc;
use std::time::Duration;

use axum::extract::Query;
use axum::http::request::Parts;
use serde::{Deserialize, Serialize};

use livesync::registry::{global, install_global};
use livesync::{Event, LiveServer, Registry, ServerConfig, StreamConfig, StreamHandler, SubscriberId};

/// Payload of a `todo.created` event
#[derive(Debug, Serialize)]
struct Todo {
    id: u64,
    title: String,
    done: bool,
}

/// Query string of a stream request
#[derive(Debug, Deserialize)]
struct UserQuery {
    user: Option<String>,
}

/// `x-user-id` header, then `?user=` query parameter
fn resolve_user(request: &Parts) -> Option<SubscriberId> {
    let header = request
        .headers
        .get("x-user-id")
        .and_then(|value| value.to_str().ok())
        .map(str::to_owned);

    let query = || {
        Query::<UserQuery>::try_from_uri(&request.uri)
            .ok()
            .and_then(|Query(query)| query.user)
    };

    let raw = header.or_else(query)?;
    match raw.parse::<i64>() {
        Ok(id) => Some(SubscriberId::from(id)),
        Err(_) if !raw.is_empty() => Some(SubscriberId::from(raw)),
        Err(_) => None,
    }
}

/// Stand-in for application code that changes data
async fn simulate_activity() {
    let mut interval = tokio::time::interval(Duration::from_secs(3));
    let mut next_id = 1;

    loop {
        interval.tick().await;

        let Some(registry) = global() else {
            continue;
        };

        let todo = Todo {
            id: next_id,
            title: format!("Todo #{}", next_id),
            done: false,
        };
        next_id += 1;

        let event = match Event::from_serialize("todo.created", &todo) {
            Ok(event) => event.with_html(format!("<li id=\"todo-{}\">{}</li>", todo.id, todo.title)),
            Err(e) => {
                tracing::error!(error = %e, "Failed to encode todo");
                continue;
            }
        };
        let delivered = registry.publish_to_subscriber("todos", 1, &event);
        tracing::info!(todo = todo.id, delivered = delivered, "Published todo");

        let tick = Event::new("clock.tick", serde_json::json!({ "todo_count": todo.id }));
        registry.publish_to_channel("clock", &tick);
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("livesync=debug".parse()?)
                .add_directive("todo_server=debug".parse()?),
        )
        .init();

    let config = ServerConfig::from_env()?;

    let registry = Arc::new(Registry::new());
    install_global(Arc::clone(&registry))?;

    let handler = StreamHandler::builder(Arc::clone(&registry))
        .identity(resolve_user)
        .config(StreamConfig::from_env()?)
        .build()?;

    println!("Starting live server on {}", config.bind_addr);
    println!();
    println!("=== Watch your todos ===");
    println!(
        "curl -N -H 'x-user-id: 1' http://localhost:{}{}/todos",
        config.bind_addr.port(),
        config.base_path
    );
    println!();

    let server = LiveServer::new(config, handler)?;
    tokio::spawn(simulate_activity());

    server
        .run_until(async {
            let _ = tokio::signal::ctrl_c().await;
            println!("\nShutting down...");
        })
        .await?;

    Ok(())
}
