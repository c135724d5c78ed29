use std::{sync::Arc, time::SystemTime};

use argon2::Argon2;
use axum::Router;
use clap::Parser;
use diesel_async::{
    AsyncPgConnection,
    async_connection_wrapper::AsyncConnectionWrapper,
    pooled_connection::{
        AsyncDieselConnectionManager,
        deadpool::{Object, Pool},
    },
};
use diesel_migrations::{EmbeddedMigrations, MigrationHarness, embed_migrations};
use error::Error;
use tokio::net::TcpListener;

mod api;
mod config;
mod error;
mod objects;
mod schema;
mod utils;

use config::{Config, ConfigBuilder};

type Conn = Object<AsyncPgConnection>;

pub const MIGRATIONS: EmbeddedMigrations = embed_migrations!();

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    #[arg(short, long, default_value_t = String::from("/etc/dropspot/config.toml"))]
    config: String,
}

pub struct AppState {
    pub pool: Pool<AsyncPgConnection>,
    pub cache_pool: redis::Client,
    pub config: Config,
    pub argon2: Argon2<'static>,
    pub start_time: SystemTime,
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    tracing_subscriber::fmt::init();

    let args = Args::parse();

    let config = ConfigBuilder::load(args.config).await?.build();

    let web = config.web.clone();

    let database_url = config.database.url();

    tokio::task::spawn_blocking(move || {
        use diesel::prelude::Connection;

        let mut conn = AsyncConnectionWrapper::<AsyncPgConnection>::establish(&database_url)?;

        conn.run_pending_migrations(MIGRATIONS)
            .map_err(|error| Error::MigrationError(error.to_string()))?;

        Ok::<(), Error>(())
    })
    .await??;

    let pool_config =
        AsyncDieselConnectionManager::<AsyncPgConnection>::new(config.database.url());

    // Bounded wait/create timeouts so a dead database surfaces as 503
    // instead of hanging requests
    let pool = Pool::builder(pool_config)
        .max_size(10)
        .wait_timeout(Some(std::time::Duration::from_secs(5)))
        .create_timeout(Some(std::time::Duration::from_secs(5)))
        .runtime(deadpool::Runtime::Tokio1)
        .build()?;

    let cache_pool = redis::Client::open(config.cache_database.url())?;

    let app_state = Arc::new(AppState {
        pool,
        cache_pool,
        config,
        argon2: Argon2::default(),
        start_time: SystemTime::now(),
    });

    let app = Router::new()
        .nest("/api", api::router(app_state.clone()))
        .layer(web.cors_layer())
        .with_state(app_state);

    let listener = TcpListener::bind(format!("{}:{}", web.url, web.port)).await?;

    axum::serve(listener, app).await?;

    Ok(())
}
