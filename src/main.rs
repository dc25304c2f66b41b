use notes_auth::configuration::get_configuration;
use notes_auth::startup::{run, spawn_refresh_token_purge};
use notes_auth::store::Stores;
use notes_auth::telemetry::init_telemetry;
use sqlx::postgres::PgPoolOptions;
use std::net::TcpListener;
use std::time::Duration;

fn invalid_input(message: impl Into<String>) -> std::io::Error {
    std::io::Error::new(std::io::ErrorKind::InvalidInput, message.into())
}

#[tokio::main]
async fn main() -> std::io::Result<()> {
    init_telemetry();

    tracing::info!("Starting application");

    let configuration = match get_configuration() {
        Ok(config) => {
            tracing::info!("Configuration loaded successfully");
            config
        }
        Err(e) => {
            tracing::error!("Failed to read configuration: {}", e);
            return Err(invalid_input("Configuration error"));
        }
    };

    if let Err(e) = configuration.jwt.validate() {
        tracing::error!("Invalid JWT configuration: {}", e);
        return Err(invalid_input("JWT configuration error"));
    }

    let stores = if configuration.application.in_memory {
        tracing::warn!("Using the in-memory store; data is lost on shutdown");
        Stores::in_memory()
    } else {
        tracing::info!("Attempting to connect to database");
        let pool = PgPoolOptions::new()
            .max_connections(5)
            .connect(&configuration.database.connection_string())
            .await
            .map_err(|e| {
                tracing::error!("Failed to create connection pool: {}", e);
                std::io::Error::new(
                    std::io::ErrorKind::ConnectionRefused,
                    "Database connection error",
                )
            })?;

        sqlx::migrate!("./migrations").run(&pool).await.map_err(|e| {
            tracing::error!("Failed to run migrations: {}", e);
            std::io::Error::new(std::io::ErrorKind::Other, "Migration error")
        })?;

        tracing::info!("Database ready");
        Stores::postgres(pool)
    };

    let purge_every = Duration::from_secs(configuration.application.purge_interval_secs.max(1));
    spawn_refresh_token_purge(stores.refresh_tokens.clone(), purge_every);

    let address = format!(
        "{}:{}",
        configuration.application.host, configuration.application.port
    );
    let listener = TcpListener::bind(&address)?;
    tracing::info!("Server listening on: {}", address);

    let server = run(
        listener,
        stores,
        configuration.jwt,
        configuration.application.hash_cost,
    )?;

    server.await
}
