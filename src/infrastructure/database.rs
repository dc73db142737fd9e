use crate::entities::links;
use sea_orm::{
    ConnectOptions, ConnectionTrait, Database, DatabaseBackend, DatabaseConnection, Schema,
};
use std::env;
use std::time::Duration;
use tracing::info;

pub async fn setup_database() -> anyhow::Result<DatabaseConnection> {
    let db_url = env::var("DATABASE_URL").unwrap_or_else(|_| "sqlite::memory:".to_string());

    info!("📂 Database: {}", redact(&db_url));

    let mut opt = ConnectOptions::new(&db_url);
    opt.connect_timeout(Duration::from_secs(30))
        .acquire_timeout(Duration::from_secs(30))
        .idle_timeout(Duration::from_secs(600))
        .max_lifetime(Duration::from_secs(1800))
        .sqlx_logging(true)
        .sqlx_logging_level(log::LevelFilter::Debug);

    if db_url.starts_with("sqlite:") {
        // Every pooled connection to an in-memory SQLite database is a new database
        opt.max_connections(1).min_connections(1);
    } else {
        opt.max_connections(50).min_connections(5);
    }

    let db = Database::connect(opt).await?;

    info!("✅ Database connected successfully");

    run_migrations(&db).await?;

    Ok(db)
}

pub async fn run_migrations(db: &DatabaseConnection) -> anyhow::Result<()> {
    match db.get_database_backend() {
        DatabaseBackend::Postgres => {
            info!("🔄 Running SQLx migrations for PostgreSQL...");
            sqlx::migrate!("./migrations")
                .run(db.get_postgres_connection_pool())
                .await?;
        }
        backend => {
            info!("🔄 Running SeaORM auto-migrations for {:?}...", backend);
            let schema = Schema::new(backend);
            let stmt = schema
                .create_table_from_entity(links::Entity)
                .if_not_exists()
                .to_owned();
            db.execute(backend.build(&stmt)).await?;
        }
    }

    Ok(())
}

/// Hides the password part of a connection URL before it is logged.
fn redact(db_url: &str) -> String {
    match url::Url::parse(db_url) {
        Ok(mut parsed) if parsed.password().is_some() => {
            let _ = parsed.set_password(Some("****"));
            parsed.to_string()
        }
        _ => db_url.to_string(),
    }
}
