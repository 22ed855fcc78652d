use postgresql_embedded::PostgreSQL;

use super::SHARED_RUNTIME;
use crate::engine::{PostgresEngine, QueryEngine};

/// Represents a running embedded `PostgreSQL` instance.
pub struct EmbeddedPostgres {
    pub postgresql: PostgreSQL,
    pub port: u16,
    pub database_url: String,
    /// The actual working configuration with correct credentials
    pub config: deadpool_postgres::Config,
}

/// Set up an embedded `PostgreSQL` instance for testing.
///
/// The returned config carries the embedded server's host, port, and
/// credentials; only `dbname` is taken from the config passed in.
///
/// # Errors
///
/// Returns an error if the embedded server cannot be set up or started,
/// if database provisioning fails, or if the post-start connectivity
/// check fails.
pub fn setup_postgres_embedded(
    cfg: &deadpool_postgres::Config,
) -> Result<EmbeddedPostgres, Box<dyn std::error::Error>> {
    SHARED_RUNTIME.block_on(async {
        let mut postgresql = PostgreSQL::default();

        // Bundled binaries, so there is nothing to download at test time.
        postgresql.setup().await?;
        postgresql.start().await?;

        let port = postgresql.settings().port;
        let host = postgresql.settings().host.clone();
        let user = postgresql.settings().username.clone();
        let password = postgresql.settings().password.clone();

        let db_name = cfg
            .dbname
            .clone()
            .ok_or("dbname is required to provision the test database")?;
        postgresql.create_database(&db_name).await?;

        let database_url = format!("postgres://{user}:{password}@{host}:{port}/{db_name}");

        let mut final_cfg = cfg.clone();
        final_cfg.port = Some(port);
        final_cfg.host = Some(host);
        final_cfg.user = Some(user);
        final_cfg.password = Some(password);

        // Quick connectivity check through the engine itself.
        let engine = PostgresEngine::connect(final_cfg.clone()).await?;
        engine.table_exists("_connectivity_probe").await?;

        println!("PostgreSQL started on port {port}");

        Ok(EmbeddedPostgres {
            postgresql,
            port,
            database_url,
            config: final_cfg,
        })
    })
}

/// Stop a previously started embedded `PostgreSQL` instance.
pub fn stop_postgres_embedded(postgres: EmbeddedPostgres) {
    let EmbeddedPostgres { postgresql, .. } = postgres;
    SHARED_RUNTIME.block_on(async move {
        let _ = postgresql.stop().await;
    });
}
