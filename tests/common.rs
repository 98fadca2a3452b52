use encore_messaging::storage;
use sqlx::PgPool;
use std::sync::Once;

static INIT: Once = Once::new();

pub fn setup_tracing() {
    INIT.call_once(|| {
        let filter = tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| "warn".into())
            .add_directive("encore_messaging=debug".parse().unwrap())
            .add_directive("sqlx=warn".parse().unwrap())
            .add_directive("tower=warn".parse().unwrap())
            .add_directive("hyper=warn".parse().unwrap());

        tracing_subscriber::fmt().with_env_filter(filter).init();
    });
}

/// Connects to the database named by `ENCORE_TEST_DATABASE_URL` and applies
/// migrations. Returns `None` when the variable is unset so the store-backed
/// suites skip on machines without Postgres.
pub async fn try_test_pool() -> Option<PgPool> {
    setup_tracing();
    let database_url = std::env::var("ENCORE_TEST_DATABASE_URL").ok()?;

    let pool = storage::init_pool(&database_url).await.expect("Failed to connect to DB. Is Postgres running?");

    sqlx::migrate!().run(&pool).await.expect("Failed to run migrations");

    Some(pool)
}
