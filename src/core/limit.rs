//! Per-collector lending limits.

use crate::{
    core::visibility,
    entities::{LendingLimit, Role, User, lending_limit, user},
    errors::{Error, Result},
};
use sea_orm::{Set, TransactionTrait, prelude::*};
use tracing::{info, instrument};

/// Returns the limit configured for `collector_id`, if any.
pub async fn get_lending_limit<C>(db: &C, collector_id: i64) -> Result<Option<lending_limit::Model>>
where
    C: ConnectionTrait,
{
    LendingLimit::find()
        .filter(lending_limit::Column::CollectorId.eq(collector_id))
        .one(db)
        .await
        .map_err(Into::into)
}

/// Sets (or replaces) the maximum principal `collector_id` may receive per credit.
///
/// ADMIN, or a SUPERVISOR with the collector in scope.
#[instrument(skip(db, actor), fields(actor = actor.id))]
pub async fn set_lending_limit(
    db: &DatabaseConnection,
    actor: &user::Model,
    collector_id: i64,
    max_amount: f64,
) -> Result<lending_limit::Model> {
    visibility::require_manager(actor)?;
    if !max_amount.is_finite() || max_amount <= 0.0 {
        return Err(Error::InvalidAmount { amount: max_amount });
    }

    let txn = db.begin().await?;
    visibility::scope_for(&txn, actor)
        .await?
        .ensure(collector_id, "collector")?;
    let collector = User::find_by_id(collector_id)
        .one(&txn)
        .await?
        .ok_or(Error::NotFound {
            entity: "user",
            id: collector_id,
        })?;
    if collector.role != Role::Collector {
        return Err(Error::validation(format!(
            "user {collector_id} is not a collector"
        )));
    }

    let now = chrono::Utc::now();
    let saved = match get_lending_limit(&txn, collector_id).await? {
        Some(existing) => {
            let mut model: lending_limit::ActiveModel = existing.into();
            model.max_amount = Set(max_amount);
            model.set_by_id = Set(actor.id);
            model.updated_at = Set(now);
            model.update(&txn).await?
        }
        None => {
            lending_limit::ActiveModel {
                collector_id: Set(collector_id),
                set_by_id: Set(actor.id),
                max_amount: Set(max_amount),
                updated_at: Set(now),
                ..Default::default()
            }
            .insert(&txn)
            .await?
        }
    };
    txn.commit().await?;

    info!(collector_id, max_amount, "Set lending limit");
    Ok(saved)
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    #![allow(clippy::float_cmp)]
    use super::*;
    use crate::test_utils::*;

    #[tokio::test]
    async fn test_set_and_replace_limit() -> Result<()> {
        let h = setup_hierarchy().await?;

        let first = set_lending_limit(&h.db, &h.supervisor, h.collector.id, 500.0).await?;
        assert_eq!(first.max_amount, 500.0);
        assert_eq!(first.set_by_id, h.supervisor.id);

        let second = set_lending_limit(&h.db, &h.admin, h.collector.id, 800.0).await?;
        assert_eq!(second.id, first.id);
        assert_eq!(second.max_amount, 800.0);
        assert_eq!(second.set_by_id, h.admin.id);

        let stored = get_lending_limit(&h.db, h.collector.id).await?.unwrap();
        assert_eq!(stored.max_amount, 800.0);
        Ok(())
    }

    #[tokio::test]
    async fn test_limit_permissions() -> Result<()> {
        let h = setup_hierarchy().await?;

        let own = set_lending_limit(&h.db, &h.collector, h.collector.id, 100.0).await;
        assert!(matches!(own, Err(Error::PermissionDenied { .. })));

        let foreign = set_lending_limit(&h.db, &h.supervisor, h.outsider.id, 100.0).await;
        assert!(matches!(foreign, Err(Error::PermissionDenied { .. })));

        let not_collector = set_lending_limit(&h.db, &h.admin, h.supervisor.id, 100.0).await;
        assert!(matches!(not_collector, Err(Error::Validation { .. })));

        let bad = set_lending_limit(&h.db, &h.admin, h.collector.id, 0.0).await;
        assert!(matches!(bad, Err(Error::InvalidAmount { .. })));

        assert!(get_lending_limit(&h.db, h.collector.id).await?.is_none());
        Ok(())
    }
}
