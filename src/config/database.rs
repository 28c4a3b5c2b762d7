//! Database configuration module.
//!
//! Opens the `SeaORM` connection and creates all tables from the entity
//! definitions with `Schema::create_table_from_entity`, so the schema always
//! matches the Rust structs without hand-written SQL.

use crate::entities::{
    BoxMovement, CashBox, CashTransaction, Client, Credit, LendingLimit, RouteGrant, User,
    route_grant,
};
use crate::errors::Result;
use sea_orm::{
    ConnectionTrait, Database, DatabaseConnection, EntityTrait, Schema, sea_query::Index,
};
use tracing::{debug, info, instrument};

/// Establishes a connection to the database at `database_url`.
#[instrument]
pub async fn create_connection(database_url: &str) -> Result<DatabaseConnection> {
    debug!("Connecting to {}", database_url);
    Database::connect(database_url).await.map_err(Into::into)
}

async fn create_table<E>(db: &DatabaseConnection, schema: &Schema, entity: E) -> Result<()>
where
    E: EntityTrait,
{
    let builder = db.get_database_backend();
    let mut statement = schema.create_table_from_entity(entity);
    statement.if_not_exists();
    db.execute(builder.build(&statement)).await?;
    Ok(())
}

/// Creates every table that does not exist yet.
///
/// Referenced tables are created before the tables pointing at them.
pub async fn create_tables(db: &DatabaseConnection) -> Result<()> {
    let schema = Schema::new(db.get_database_backend());

    create_table(db, &schema, User).await?;
    create_table(db, &schema, RouteGrant).await?;
    create_table(db, &schema, Client).await?;
    create_table(db, &schema, Credit).await?;
    create_table(db, &schema, CashTransaction).await?;
    create_table(db, &schema, CashBox).await?;
    create_table(db, &schema, BoxMovement).await?;
    create_table(db, &schema, LendingLimit).await?;

    // One grant per supervisor/account pair
    let grant_pair = Index::create()
        .if_not_exists()
        .name("idx_route_grants_pair")
        .table(RouteGrant)
        .col(route_grant::Column::SupervisorId)
        .col(route_grant::Column::GrantedUserId)
        .unique()
        .to_owned();
    db.execute(db.get_database_backend().build(&grant_pair)).await?;

    info!("Database schema ready");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use sea_orm::{EntityTrait, QuerySelect};

    #[tokio::test]
    async fn test_create_tables() -> Result<()> {
        let db = create_connection("sqlite::memory:").await?;
        create_tables(&db).await?;

        // Every table answers a query
        User::find().limit(1).all(&db).await?;
        RouteGrant::find().limit(1).all(&db).await?;
        Client::find().limit(1).all(&db).await?;
        Credit::find().limit(1).all(&db).await?;
        CashTransaction::find().limit(1).all(&db).await?;
        CashBox::find().limit(1).all(&db).await?;
        BoxMovement::find().limit(1).all(&db).await?;
        LendingLimit::find().limit(1).all(&db).await?;
        Ok(())
    }

    #[tokio::test]
    async fn test_route_grant_pair_is_unique() -> Result<()> {
        use sea_orm::{ActiveModelTrait, Set};

        let h = crate::test_utils::setup_hierarchy().await?;
        let grant = || route_grant::ActiveModel {
            supervisor_id: Set(h.supervisor.id),
            granted_user_id: Set(h.outsider.id),
            created_at: Set(chrono::Utc::now()),
            ..Default::default()
        };

        grant().insert(&h.db).await?;
        let duplicate = grant().insert(&h.db).await;
        assert!(duplicate.is_err());
        assert_eq!(RouteGrant::find().all(&h.db).await?.len(), 1);
        Ok(())
    }

    #[tokio::test]
    async fn test_create_tables_is_idempotent() -> Result<()> {
        let db = create_connection("sqlite::memory:").await?;
        create_tables(&db).await?;
        create_tables(&db).await?;
        Ok(())
    }
}
