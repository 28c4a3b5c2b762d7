//! Shared test utilities.
//!
//! This module provides common helper functions for setting up test databases
//! and creating test entities with sensible defaults.

use crate::{
    core::{cash_box, client, credit, user},
    entities::{self, Role},
    errors::Result,
};
use sea_orm::DatabaseConnection;
use tracing_subscriber::EnvFilter;

/// Routes `tracing` output to the test harness. Safe to call repeatedly.
pub fn init_test_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug")),
        )
        .with_test_writer()
        .try_init();
}

/// Creates an in-memory `SQLite` database with all tables initialized.
/// This is the standard setup for all integration tests.
pub async fn setup_test_db() -> Result<DatabaseConnection> {
    init_test_tracing();
    let db = sea_orm::Database::connect("sqlite::memory:").await?;
    crate::config::database::create_tables(&db).await?;
    Ok(db)
}

/// Sets up a database holding a single admin named `admin`.
/// Returns (db, admin).
pub async fn setup_with_admin() -> Result<(DatabaseConnection, entities::user::Model)> {
    let db = setup_test_db().await?;
    let admin = user::bootstrap_admin(&db, "admin", "admin-password")
        .await?
        .ok_or_else(|| crate::errors::Error::validation("admin already present"))?;
    Ok((db, admin))
}

/// Creates a user through the admin path.
///
/// # Defaults
/// * password: `"secret"`
/// * no profile fields
pub async fn create_test_user(
    db: &DatabaseConnection,
    admin: &entities::user::Model,
    username: &str,
    role: Role,
    supervisor_id: Option<i64>,
) -> Result<entities::user::Model> {
    user::create_user(
        db,
        admin,
        user::NewUser {
            username: username.to_string(),
            password: "secret".to_string(),
            email: None,
            full_name: None,
            phone: None,
            zone: None,
            role,
            supervisor_id,
        },
    )
    .await
}

/// Creates a client owned by `collector_id`, acting as `actor`.
///
/// # Defaults
/// * `full_name`: `"Client <dni>"`
/// * no contact or location fields
pub async fn create_test_client(
    db: &DatabaseConnection,
    actor: &entities::user::Model,
    dni: &str,
    collector_id: i64,
) -> Result<entities::client::Model> {
    client::create_client(
        db,
        actor,
        client::NewClient {
            dni: dni.to_string(),
            full_name: format!("Client {dni}"),
            collector_id: Some(collector_id),
            ..Default::default()
        },
    )
    .await
}

/// Deposits `amount` into the base balance of `owner_id`'s box, acting as `admin`.
pub async fn fund_box(
    db: &DatabaseConnection,
    admin: &entities::user::Model,
    owner_id: i64,
    amount: f64,
) -> Result<entities::cash_box::Model> {
    cash_box::register_deposit(db, admin, owner_id, amount, Some("test funding".to_string()))
        .await
        .map(|(cash, _)| cash)
}

/// Issues a credit as `actor`.
///
/// # Defaults
/// * `insurance_amount`: 0.0
pub async fn create_test_credit(
    db: &DatabaseConnection,
    actor: &entities::user::Model,
    client_id: i64,
    amount: f64,
    interest_rate: f64,
    term_days: i32,
) -> Result<entities::credit::Model> {
    credit::create_credit(
        db,
        actor,
        credit::NewCredit {
            client_id,
            amount,
            interest_rate,
            term_days,
            insurance_amount: 0.0,
        },
    )
    .await
}

/// Full hierarchy used by most ledger tests.
pub struct Hierarchy {
    /// Database with all rows below
    pub db: DatabaseConnection,
    /// The bootstrap admin
    pub admin: entities::user::Model,
    /// Supervisor of `collector`
    pub supervisor: entities::user::Model,
    /// Collector reporting to `supervisor`
    pub collector: entities::user::Model,
    /// Collector with no supervisor
    pub outsider: entities::user::Model,
}

/// Sets up admin, one supervisor with one collector, and an unrelated collector.
pub async fn setup_hierarchy() -> Result<Hierarchy> {
    let (db, admin) = setup_with_admin().await?;
    let supervisor = create_test_user(&db, &admin, "supervisor", Role::Supervisor, None).await?;
    let collector =
        create_test_user(&db, &admin, "collector", Role::Collector, Some(supervisor.id)).await?;
    let outsider = create_test_user(&db, &admin, "outsider", Role::Collector, None).await?;
    Ok(Hierarchy {
        db,
        admin,
        supervisor,
        collector,
        outsider,
    })
}
