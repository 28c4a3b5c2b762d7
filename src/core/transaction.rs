//! Cash transaction log - append-only record of money handled by users.
//!
//! A PAYMENT reduces its credit's outstanding balance in the same database
//! transaction. The reduction is one conditional statement, so two payments
//! racing on the same credit cannot both spend the same balance.

use crate::{
    core::{EPSILON, Page, credit::load_visible_credit, require_positive, visibility},
    entities::{
        CashTransaction, Credit, CreditStatus, TransactionType, cash_transaction, credit, user,
    },
    errors::{Error, Result},
};
use chrono::{DateTime, Utc};
use sea_orm::{QueryOrder, QuerySelect, Set, TransactionTrait, prelude::*, sea_query::Expr};
use serde::Deserialize;
use tracing::{debug, info, instrument};

/// Input for recording a cash transaction.
#[derive(Clone, Debug, Deserialize)]
pub struct NewTransaction {
    /// Kind of movement
    pub transaction_type: TransactionType,
    /// Positive amount
    pub amount: f64,
    /// Credit this transaction belongs to; required for PAYMENT
    #[serde(default)]
    pub credit_id: Option<i64>,
    /// Free-form note
    #[serde(default)]
    pub description: Option<String>,
}

/// Filters for [`list_transactions`].
#[derive(Clone, Debug, Default)]
pub struct TransactionFilter {
    /// Only rows recorded by these users
    pub user_ids: Option<Vec<i64>>,
    /// Only rows linked to this credit
    pub credit_id: Option<i64>,
    /// Inclusive lower bound on `created_at`
    pub from: Option<DateTime<Utc>>,
    /// Inclusive upper bound on `created_at`
    pub to: Option<DateTime<Utc>>,
}

/// Posts `amount` against the credit's outstanding balance. Only ACTIVE credits accept payments.
async fn apply_payment<C>(db: &C, current: &credit::Model, amount: f64) -> Result<credit::Model>
where
    C: ConnectionTrait,
{
    let result = Credit::update_many()
        .col_expr(
            credit::Column::RemainingAmount,
            Expr::col(credit::Column::RemainingAmount).sub(amount),
        )
        .col_expr(credit::Column::UpdatedAt, Expr::value(Utc::now()))
        .filter(credit::Column::Id.eq(current.id))
        .filter(credit::Column::Status.eq(CreditStatus::Active))
        .filter(credit::Column::RemainingAmount.gte(amount - EPSILON))
        .exec(db)
        .await?;

    let updated = Credit::find_by_id(current.id)
        .one(db)
        .await?
        .ok_or(Error::NotFound {
            entity: "credit",
            id: current.id,
        })?;
    if result.rows_affected == 0 {
        ensure_accepts_payment(&updated)?;
        return Err(Error::AmountExceedsBalance {
            remaining: updated.remaining_amount,
            requested: amount,
        });
    }
    if updated.remaining_amount > EPSILON {
        return Ok(updated);
    }

    let mut model: credit::ActiveModel = updated.into();
    model.remaining_amount = Set(0.0);
    model.status = Set(CreditStatus::Completed);
    let settled = model.update(db).await?;
    info!(credit_id = settled.id, "Credit paid off");
    Ok(settled)
}

fn ensure_accepts_payment(credit: &credit::Model) -> Result<()> {
    if credit.status == CreditStatus::Active {
        Ok(())
    } else {
        Err(Error::validation(format!(
            "credit {} is {:?} and no longer accepts payments",
            credit.id, credit.status
        )))
    }
}

/// Records a cash transaction. A PAYMENT also reduces its credit's balance.
#[instrument(skip(db, actor, new_tx), fields(actor = actor.id, kind = ?new_tx.transaction_type))]
pub async fn create_transaction(
    db: &DatabaseConnection,
    actor: &user::Model,
    new_tx: NewTransaction,
) -> Result<cash_transaction::Model> {
    if new_tx.transaction_type == TransactionType::Payment && new_tx.credit_id.is_none() {
        return Err(Error::CreditRequired);
    }

    let txn = db.begin().await?;
    let linked = match new_tx.credit_id {
        Some(credit_id) => Some(load_visible_credit(&txn, actor, credit_id).await?.0),
        None => None,
    };
    require_positive(new_tx.amount)?;

    if new_tx.transaction_type == TransactionType::Payment {
        if let Some(current) = &linked {
            ensure_accepts_payment(current)?;
            if new_tx.amount > current.remaining_amount + EPSILON {
                return Err(Error::AmountExceedsBalance {
                    remaining: current.remaining_amount,
                    requested: new_tx.amount,
                });
            }
        }
    }

    let recorded = cash_transaction::ActiveModel {
        user_id: Set(actor.id),
        credit_id: Set(new_tx.credit_id),
        amount: Set(new_tx.amount),
        transaction_type: Set(new_tx.transaction_type),
        description: Set(crate::core::clean(new_tx.description)),
        created_at: Set(Utc::now()),
        ..Default::default()
    }
    .insert(&txn)
    .await?;

    if new_tx.transaction_type == TransactionType::Payment {
        if let Some(current) = &linked {
            let after = apply_payment(&txn, current, new_tx.amount).await?;
            debug!(
                credit_id = after.id,
                remaining = after.remaining_amount,
                "Applied payment"
            );
        }
    }
    txn.commit().await?;

    info!(
        transaction_id = recorded.id,
        amount = recorded.amount,
        "Recorded cash transaction"
    );
    Ok(recorded)
}

/// Fetches a transaction recorded by a user in the actor's scope.
pub async fn get_transaction(
    db: &DatabaseConnection,
    actor: &user::Model,
    transaction_id: i64,
) -> Result<cash_transaction::Model> {
    let found = CashTransaction::find_by_id(transaction_id)
        .one(db)
        .await?
        .ok_or(Error::NotFound {
            entity: "transaction",
            id: transaction_id,
        })?;
    visibility::scope_for(db, actor)
        .await?
        .ensure(found.user_id, "transaction")?;
    Ok(found)
}

/// Lists transactions in the actor's scope, newest first.
pub async fn list_transactions(
    db: &DatabaseConnection,
    actor: &user::Model,
    filter: TransactionFilter,
    page: Page,
) -> Result<Vec<cash_transaction::Model>> {
    let scope = visibility::scope_for(db, actor).await?;
    if let Some(user_ids) = &filter.user_ids {
        for user_id in user_ids {
            scope.ensure(*user_id, "user")?;
        }
    }
    if let Some(credit_id) = filter.credit_id {
        load_visible_credit(db, actor, credit_id).await?;
    }

    let Some(mut query) = scope.restrict(CashTransaction::find(), cash_transaction::Column::UserId)
    else {
        return Ok(Vec::new());
    };
    if let Some(user_ids) = filter.user_ids {
        query = query.filter(cash_transaction::Column::UserId.is_in(user_ids));
    }
    if let Some(credit_id) = filter.credit_id {
        query = query.filter(cash_transaction::Column::CreditId.eq(credit_id));
    }
    if let Some(from) = filter.from {
        query = query.filter(cash_transaction::Column::CreatedAt.gte(from));
    }
    if let Some(to) = filter.to {
        query = query.filter(cash_transaction::Column::CreatedAt.lte(to));
    }

    query
        .order_by_desc(cash_transaction::Column::CreatedAt)
        .order_by_desc(cash_transaction::Column::Id)
        .offset(page.skip)
        .limit(page.limit)
        .all(db)
        .await
        .map_err(Into::into)
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    #![allow(clippy::float_cmp)]
    use super::*;
    use crate::{
        core::credit::{CreditUpdate, get_credit, update_credit},
        test_utils::*,
    };

    fn payment(credit_id: i64, amount: f64) -> NewTransaction {
        NewTransaction {
            transaction_type: TransactionType::Payment,
            amount,
            credit_id: Some(credit_id),
            description: None,
        }
    }

    /// Collector with a funded box and one 1000 / 10% / 50 day credit (total 1100).
    async fn setup_credit() -> Result<(Hierarchy, credit::Model)> {
        let h = setup_hierarchy().await?;
        let borrower = create_test_client(&h.db, &h.collector, "1", h.collector.id).await?;
        fund_box(&h.db, &h.admin, h.collector.id, 1000.0).await?;
        let issued = create_test_credit(&h.db, &h.supervisor, borrower.id, 1000.0, 10.0, 50).await?;
        Ok((h, issued))
    }

    #[tokio::test]
    async fn test_payment_requires_credit() -> Result<()> {
        let h = setup_hierarchy().await?;
        let result = create_transaction(
            &h.db,
            &h.collector,
            NewTransaction {
                transaction_type: TransactionType::Payment,
                amount: 10.0,
                credit_id: None,
                description: None,
            },
        )
        .await;
        assert!(matches!(result, Err(Error::CreditRequired)));
        Ok(())
    }

    #[tokio::test]
    async fn test_payment_error_precedence() -> Result<()> {
        let (h, issued) = setup_credit().await?;

        let missing = create_transaction(&h.db, &h.collector, payment(999, -1.0)).await;
        assert!(matches!(missing, Err(Error::NotFound { entity: "credit", .. })));

        let foreign = create_transaction(&h.db, &h.outsider, payment(issued.id, -1.0)).await;
        assert!(matches!(foreign, Err(Error::PermissionDenied { .. })));

        let negative = create_transaction(&h.db, &h.collector, payment(issued.id, -1.0)).await;
        assert!(matches!(negative, Err(Error::InvalidAmount { .. })));

        let infinite =
            create_transaction(&h.db, &h.collector, payment(issued.id, f64::INFINITY)).await;
        assert!(matches!(infinite, Err(Error::InvalidAmount { .. })));
        Ok(())
    }

    #[tokio::test]
    async fn test_exact_payoff_completes() -> Result<()> {
        let (h, issued) = setup_credit().await?;

        create_transaction(&h.db, &h.collector, payment(issued.id, 600.0)).await?;
        let partial = get_credit(&h.db, &h.collector, issued.id).await?;
        assert!((partial.remaining_amount - 500.0).abs() < 1e-6);
        assert_eq!(partial.status, CreditStatus::Active);

        create_transaction(&h.db, &h.collector, payment(issued.id, 500.0)).await?;
        let paid = get_credit(&h.db, &h.collector, issued.id).await?;
        assert_eq!(paid.remaining_amount, 0.0);
        assert_eq!(paid.status, CreditStatus::Completed);
        Ok(())
    }

    #[tokio::test]
    async fn test_payoff_within_tolerance() -> Result<()> {
        let h = setup_hierarchy().await?;
        let borrower = create_test_client(&h.db, &h.collector, "1", h.collector.id).await?;
        fund_box(&h.db, &h.admin, h.collector.id, 1000.0).await?;
        let issued = create_test_credit(&h.db, &h.admin, borrower.id, 100.0, 0.0, 3).await?;

        for _ in 0..3 {
            create_transaction(&h.db, &h.collector, payment(issued.id, 100.0 / 3.0)).await?;
        }
        let paid = get_credit(&h.db, &h.collector, issued.id).await?;
        assert_eq!(paid.remaining_amount, 0.0);
        assert_eq!(paid.status, CreditStatus::Completed);
        Ok(())
    }

    #[tokio::test]
    async fn test_overpayment_leaves_balance_unchanged() -> Result<()> {
        let (h, issued) = setup_credit().await?;

        let result = create_transaction(&h.db, &h.collector, payment(issued.id, 1100.01)).await;
        assert!(matches!(result, Err(Error::AmountExceedsBalance { .. })));

        let unchanged = get_credit(&h.db, &h.collector, issued.id).await?;
        assert_eq!(unchanged.remaining_amount, issued.remaining_amount);
        let logged = list_transactions(
            &h.db,
            &h.admin,
            TransactionFilter::default(),
            Page::default(),
        )
        .await?;
        assert!(logged.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn test_concurrent_overspend_is_rejected_by_conditional_update() -> Result<()> {
        let (h, issued) = setup_credit().await?;
        create_transaction(&h.db, &h.collector, payment(issued.id, 1000.0)).await?;

        // A stale snapshot still believes the full balance is outstanding.
        let txn = h.db.begin().await?;
        let result = apply_payment(&txn, &issued, 500.0).await;
        assert!(matches!(result, Err(Error::AmountExceedsBalance { .. })));
        txn.rollback().await?;

        let current = get_credit(&h.db, &h.collector, issued.id).await?;
        assert!((current.remaining_amount - 100.0).abs() < 1e-6);
        Ok(())
    }

    #[tokio::test]
    async fn test_payment_on_closed_credit_rejected() -> Result<()> {
        let (h, issued) = setup_credit().await?;
        let defaulted = update_credit(
            &h.db,
            &h.supervisor,
            issued.id,
            CreditUpdate {
                status: Some(CreditStatus::Defaulted),
                ..Default::default()
            },
        )
        .await?;

        let result = create_transaction(&h.db, &h.collector, payment(issued.id, 1100.0)).await;
        assert!(matches!(result, Err(Error::Validation { .. })));

        // A payment validated while the credit was still ACTIVE.
        let txn = h.db.begin().await?;
        let result = apply_payment(&txn, &issued, 1100.0).await;
        assert!(matches!(result, Err(Error::Validation { .. })));
        txn.rollback().await?;

        let current = get_credit(&h.db, &h.collector, issued.id).await?;
        assert_eq!(current.status, CreditStatus::Defaulted);
        assert_eq!(current.remaining_amount, defaulted.remaining_amount);
        Ok(())
    }

    #[tokio::test]
    async fn test_other_types_only_check_amount() -> Result<()> {
        let (h, issued) = setup_credit().await?;

        let deposit = create_transaction(
            &h.db,
            &h.collector,
            NewTransaction {
                transaction_type: TransactionType::Deposit,
                amount: 5000.0,
                credit_id: None,
                description: Some("  office float ".to_string()),
            },
        )
        .await?;
        assert_eq!(deposit.description.as_deref(), Some("office float"));

        create_transaction(
            &h.db,
            &h.collector,
            NewTransaction {
                transaction_type: TransactionType::Disbursement,
                amount: 5000.0,
                credit_id: Some(issued.id),
                description: None,
            },
        )
        .await?;
        let untouched = get_credit(&h.db, &h.collector, issued.id).await?;
        assert_eq!(untouched.remaining_amount, issued.remaining_amount);

        let zero = create_transaction(
            &h.db,
            &h.collector,
            NewTransaction {
                transaction_type: TransactionType::Withdrawal,
                amount: 0.0,
                credit_id: None,
                description: None,
            },
        )
        .await;
        assert!(matches!(zero, Err(Error::InvalidAmount { .. })));
        Ok(())
    }

    #[tokio::test]
    async fn test_transaction_visibility() -> Result<()> {
        let (h, issued) = setup_credit().await?;
        let mine = create_transaction(&h.db, &h.collector, payment(issued.id, 10.0)).await?;
        let theirs = create_transaction(
            &h.db,
            &h.outsider,
            NewTransaction {
                transaction_type: TransactionType::Deposit,
                amount: 10.0,
                credit_id: None,
                description: None,
            },
        )
        .await?;

        assert!(matches!(
            get_transaction(&h.db, &h.collector, theirs.id).await,
            Err(Error::PermissionDenied { .. })
        ));
        assert!(matches!(
            get_transaction(&h.db, &h.collector, 999).await,
            Err(Error::NotFound { .. })
        ));
        assert_eq!(get_transaction(&h.db, &h.supervisor, mine.id).await?.id, mine.id);

        let own = list_transactions(
            &h.db,
            &h.collector,
            TransactionFilter::default(),
            Page::default(),
        )
        .await?;
        assert_eq!(own.len(), 1);
        assert_eq!(own[0].id, mine.id);

        let foreign = list_transactions(
            &h.db,
            &h.collector,
            TransactionFilter {
                user_ids: Some(vec![h.outsider.id]),
                ..Default::default()
            },
            Page::default(),
        )
        .await;
        assert!(matches!(foreign, Err(Error::PermissionDenied { .. })));
        Ok(())
    }

    #[tokio::test]
    async fn test_list_newest_first_with_filters() -> Result<()> {
        let (h, issued) = setup_credit().await?;
        let first = create_transaction(&h.db, &h.collector, payment(issued.id, 10.0)).await?;
        let second = create_transaction(&h.db, &h.collector, payment(issued.id, 20.0)).await?;
        create_transaction(
            &h.db,
            &h.collector,
            NewTransaction {
                transaction_type: TransactionType::Deposit,
                amount: 1.0,
                credit_id: None,
                description: None,
            },
        )
        .await?;

        let for_credit = list_transactions(
            &h.db,
            &h.supervisor,
            TransactionFilter {
                credit_id: Some(issued.id),
                ..Default::default()
            },
            Page::default(),
        )
        .await?;
        let ids: Vec<i64> = for_credit.iter().map(|t| t.id).collect();
        assert_eq!(ids, vec![second.id, first.id]);

        let future = list_transactions(
            &h.db,
            &h.admin,
            TransactionFilter {
                from: Some(Utc::now() + chrono::Duration::days(1)),
                ..Default::default()
            },
            Page::default(),
        )
        .await?;
        assert!(future.is_empty());

        let paged = list_transactions(
            &h.db,
            &h.admin,
            TransactionFilter::default(),
            Page { skip: 1, limit: 1 },
        )
        .await?;
        assert_eq!(paged.len(), 1);
        assert_eq!(paged[0].id, second.id);
        Ok(())
    }
}
