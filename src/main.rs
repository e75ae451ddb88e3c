use std::{error::Error, net::SocketAddr};

use foodgram::{jwt::SessionKeys, routes, Config, Context};
use sqlx::postgres::PgPoolOptions;
use tracing_subscriber::{prelude::*, EnvFilter, Registry};

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    Registry::default()
        .with(tracing_subscriber::fmt::layer())
        .with(filter)
        .init();

    let config = Config::load()?;

    let pool = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .connect(&config.database_url)
        .await?;
    sqlx::migrate!().run(&pool).await?;
    log::info!("> Database migrations applied");

    let sessions = SessionKeys::new(&config.secret_key, config.token_lifetime_hours)?;
    let ctx = Context::new(pool, sessions);

    let addr = SocketAddr::new(config.host, config.port);
    log::info!("> Listening on {addr}");
    warp::serve(routes(ctx)).run(addr).await;

    Ok(())
}
