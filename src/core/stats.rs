//! Collection statistics over the actor's scope.

use crate::{
    core::visibility::{self, Scope},
    entities::{
        CashTransaction, Client, Credit, CreditStatus, TransactionType, cash_transaction, client,
        credit, user,
    },
    errors::Result,
};
use chrono::{DateTime, Utc};
use sea_orm::{JoinType, PaginatorTrait, QuerySelect, RelationTrait, prelude::*};
use serde::{Deserialize, Serialize};
use tracing::instrument;

/// Narrowing applied on top of the actor's own scope.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub struct StatsFilter {
    /// Only this user and its downstream accounts
    pub user_id: Option<i64>,
    /// Only this supervisor's team
    pub supervisor_id: Option<i64>,
    /// Payments at or after this instant
    pub from: Option<DateTime<Utc>>,
    /// Payments at or before this instant
    pub to: Option<DateTime<Utc>>,
}

/// Aggregate figures for a scope.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct CollectionStats {
    /// Number of PAYMENT transactions
    pub payments_count: u64,
    /// Sum of PAYMENT amounts
    pub amount_collected: f64,
    /// Active clients owned inside the scope
    pub active_clients: u64,
    /// ACTIVE credits of those clients
    pub active_credits: u64,
    /// COMPLETED credits of those clients
    pub completed_credits: u64,
}

async fn narrow<C>(db: &C, scope: Scope, target: Option<i64>) -> Result<Scope>
where
    C: ConnectionTrait,
{
    let Some(target) = target else {
        return Ok(scope);
    };
    scope.ensure(target, "user")?;
    let downstream = Scope::Users(visibility::downstream_ids(db, target).await?);
    Ok(scope.intersect(&downstream))
}

async fn count_credits<C>(db: &C, scope: &Scope, status: CreditStatus) -> Result<u64>
where
    C: ConnectionTrait,
{
    let query = Credit::find()
        .join(JoinType::InnerJoin, credit::Relation::Client.def())
        .filter(credit::Column::Status.eq(status));
    match scope.restrict(query, client::Column::CollectorId) {
        Some(query) => Ok(query.count(db).await?),
        None => Ok(0),
    }
}

/// Computes collection statistics. Non-admin actors never see past their own scope.
#[instrument(skip(db, actor), fields(actor = actor.id))]
pub async fn collection_stats(
    db: &DatabaseConnection,
    actor: &user::Model,
    filter: StatsFilter,
) -> Result<CollectionStats> {
    let scope = visibility::scope_for(db, actor).await?;
    let scope = narrow(db, scope, filter.user_id).await?;
    let scope = narrow(db, scope, filter.supervisor_id).await?;

    let mut stats = CollectionStats::default();

    let payments = CashTransaction::find()
        .select_only()
        .column(cash_transaction::Column::Amount)
        .filter(cash_transaction::Column::TransactionType.eq(TransactionType::Payment));
    if let Some(mut payments) = scope.restrict(payments, cash_transaction::Column::UserId) {
        if let Some(from) = filter.from {
            payments = payments.filter(cash_transaction::Column::CreatedAt.gte(from));
        }
        if let Some(to) = filter.to {
            payments = payments.filter(cash_transaction::Column::CreatedAt.lte(to));
        }
        let amounts: Vec<f64> = payments.into_tuple().all(db).await?;
        stats.payments_count = amounts.len() as u64;
        stats.amount_collected = amounts.iter().sum();
    }

    let clients = Client::find().filter(client::Column::IsActive.eq(true));
    if let Some(clients) = scope.restrict(clients, client::Column::CollectorId) {
        stats.active_clients = clients.count(db).await?;
    }

    stats.active_credits = count_credits(db, &scope, CreditStatus::Active).await?;
    stats.completed_credits = count_credits(db, &scope, CreditStatus::Completed).await?;
    Ok(stats)
}
