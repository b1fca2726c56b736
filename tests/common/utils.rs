use std::net::TcpListener;
use std::sync::Arc;
use once_cell::sync::Lazy;
use secrecy::ExposeSecret;
use sqlx::{Connection, Executor, PgConnection, PgPool};
use uuid::Uuid;

use prode_scoring::run;
use prode_scoring::config::settings::{get_config, DatabaseSettings, ScoringSettings};
use prode_scoring::db::{InMemoryScoringStore, PgScoringStore, ScoringStore};
use prode_scoring::services::ScoringService;
use prode_scoring::telemetry::{get_subscriber, init_subscriber};

// Ensure that the `tracing` stack is only initialised once using `once_cell`
static TRACING: Lazy<()> = Lazy::new(|| {
    let default_filter_level = "info".to_string();
    let subscriber_name = "test".to_string();

    if std::env::var("TEST_LOG").is_ok() {
        let subscriber = get_subscriber(
            subscriber_name,
            default_filter_level,
            std::io::stdout
        );
        init_subscriber(subscriber);
    } else {
        let subscriber = get_subscriber(
            subscriber_name,
            default_filter_level,
            std::io::sink
        );
        init_subscriber(subscriber);
    }
});

pub fn init_tracing() {
    Lazy::force(&TRACING);
}

pub struct TestApp {
    pub address: String,
    pub store: Arc<InMemoryScoringStore>,
    pub scoring: Arc<ScoringService>,
}

/// Build a scoring service over a fresh in-memory store.
pub fn scoring_service() -> (Arc<InMemoryScoringStore>, Arc<ScoringService>) {
    init_tracing();

    let store = Arc::new(InMemoryScoringStore::new());
    let dyn_store: Arc<dyn ScoringStore> = store.clone();
    let scoring = Arc::new(ScoringService::new(dyn_store, &ScoringSettings::default(), None));
    (store, scoring)
}

pub async fn spawn_app() -> TestApp {
    let (store, scoring) = scoring_service();

    let listener = TcpListener::bind("127.0.0.1:0")
        .expect("Failed to bind random port");
    // Get port assigned by the OS
    let port = listener.local_addr().unwrap().port();
    let address = format!("http://127.0.0.1:{}", port);

    let server = run(
        listener,
        scoring.clone(),
        vec!["http://localhost:3000".to_string()],
    )
        .expect("Failed to bind address");
    // Launch the server as a background task
    let _ = tokio::spawn(server);

    TestApp {
        address,
        store,
        scoring,
    }
}

pub struct TestDb {
    pub db_pool: PgPool,
    pub store: Arc<PgScoringStore>,
}

/// Fresh, migrated Postgres database per test.
pub async fn spawn_pg_store() -> TestDb {
    init_tracing();

    let mut configuration = get_config().expect("Failed to read configuration.");
    configuration.database.db_name = Uuid::new_v4().to_string();
    let db_pool = configure_db(&configuration.database).await;

    TestDb {
        store: Arc::new(PgScoringStore::new(db_pool.clone())),
        db_pool,
    }
}

pub async fn configure_db(config: &DatabaseSettings) -> PgPool {
    // Create database
    let mut connection = PgConnection::connect(&config.connection_string_without_db())
        .await
        .expect("Failed to connect to Postgres");
    connection
        .execute(format!(r#"CREATE DATABASE "{}";"#, config.db_name).as_str())
        .await
        .expect("Failed to create database.");

    // Migrate database
    let connection_pool = PgPool::connect(config.connection_string().expose_secret())
        .await
        .expect("Failed to connect to Postgres.");
    sqlx::migrate!("./migrations")
        .run(&connection_pool)
        .await
        .expect("Failed to migrate the database");

    connection_pool
}
