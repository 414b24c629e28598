//! Demo server: exposes the resources described in a JSON file through resource-sdk.
//!
//! Run from repo root: `cargo run -p demo-server`
//! Resources come from `RESOURCES_FILE` (default `demo_server/resources.json`). With
//! `DATABASE_URL` set they are stored in PostgreSQL, otherwise in memory.

use resource_sdk::{load_resources_from_file, router, Api, ApiSettings, BackendAdapter, DocumentStore, PgBackend};
use std::sync::Arc;
use tokio::net::TcpListener;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("resource_sdk=info,demo_server=info")),
        )
        .init();

    let settings = ApiSettings::from_env();
    let resources_file =
        std::env::var("RESOURCES_FILE").unwrap_or_else(|_| "demo_server/resources.json".into());
    let configs = load_resources_from_file(&resources_file).await?;

    let pg = match std::env::var("DATABASE_URL") {
        Ok(url) => {
            let pool = sqlx::postgres::PgPoolOptions::new()
                .max_connections(5)
                .connect(&url)
                .await?;
            Some(Arc::new(PgBackend::new(pool)))
        }
        Err(_) => None,
    };
    let memory: Arc<dyn BackendAdapter> = Arc::new(DocumentStore::new());

    let mut builder = Api::builder(settings.clone());
    for config in &configs {
        let resource = resource_sdk::resolve(config, &settings)?;
        let adapter: Arc<dyn BackendAdapter> = match &pg {
            Some(pg) => {
                pg.ensure_table(&resource).await?;
                pg.clone()
            }
            None => memory.clone(),
        };
        builder.register(resource, adapter)?;
    }
    let api = builder.build()?;

    let addr = std::env::var("BIND_ADDR").unwrap_or_else(|_| "127.0.0.1:3000".into());
    let listener = TcpListener::bind(&addr).await?;
    tracing::info!(
        "demo server listening on http://{} (schema at /openapi.json)",
        listener.local_addr()?
    );
    axum::serve(listener, router(api)).await?;
    Ok(())
}
