//! Credit ledger - issuing loans and tracking their outstanding balance.
//!
//! Issuing a credit disburses the principal out of the owning collector's
//! box in the same transaction. The payoff schedule is fixed at creation:
//!
//! * `total_amount = amount * (1 + interest_rate / 100) + insurance_amount`
//! * `daily_payment = total_amount / term_days`

use crate::{
    core::{
        EPSILON, Page, cash_box,
        cash_box::NewMovement,
        client::load_visible_client,
        limit::get_lending_limit,
        visibility,
    },
    entities::{
        BoxMovement, CashTransaction, Client, Credit, CreditStatus, MovementType, box_movement,
        cash_transaction, client, credit, user,
    },
    errors::{Error, Result},
};
use sea_orm::{
    JoinType, PaginatorTrait, QueryOrder, QuerySelect, RelationTrait, Set, TransactionTrait,
    prelude::*, sea_query::Expr,
};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};

/// Input for issuing a credit.
#[derive(Clone, Debug, Deserialize)]
pub struct NewCredit {
    /// Borrowing client
    pub client_id: i64,
    /// Principal disbursed
    pub amount: f64,
    /// Flat interest, in percent
    pub interest_rate: f64,
    /// Number of daily installments
    pub term_days: i32,
    /// Flat insurance add-on
    #[serde(default)]
    pub insurance_amount: f64,
}

/// Derived payoff schedule.
#[derive(Copy, Clone, Debug, PartialEq, Serialize)]
pub struct CreditTerms {
    /// Everything the client owes
    pub total_amount: f64,
    /// Installment per day
    pub daily_payment: f64,
}

/// Manual correction of a credit.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub struct CreditUpdate {
    /// New status
    pub status: Option<CreditStatus>,
    /// New outstanding balance, clamped to `[0, total_amount]`
    pub remaining_amount: Option<f64>,
}

/// Filters for [`list_credits`].
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub struct CreditFilter {
    /// Only credits of this client
    pub client_id: Option<i64>,
    /// Only credits in this status
    pub status: Option<CreditStatus>,
}

/// Validates the inputs and computes the payoff schedule.
pub fn compute_terms(
    amount: f64,
    interest_rate: f64,
    term_days: i32,
    insurance_amount: f64,
) -> Result<CreditTerms> {
    if !amount.is_finite() || amount <= 0.0 {
        return Err(Error::InvalidAmount { amount });
    }
    if !interest_rate.is_finite() || interest_rate < 0.0 {
        return Err(Error::validation("interest rate cannot be negative"));
    }
    if term_days <= 0 {
        return Err(Error::validation("term must be at least one day"));
    }
    if !insurance_amount.is_finite() || insurance_amount < 0.0 {
        return Err(Error::validation("insurance amount cannot be negative"));
    }

    let total_amount = amount * (1.0 + interest_rate / 100.0) + insurance_amount;
    Ok(CreditTerms {
        total_amount,
        daily_payment: total_amount / f64::from(term_days),
    })
}

/// Loads a credit together with its client, checking the client's owner
/// against the actor's scope.
pub(crate) async fn load_visible_credit<C>(
    db: &C,
    actor: &user::Model,
    credit_id: i64,
) -> Result<(credit::Model, client::Model)>
where
    C: ConnectionTrait,
{
    let found = Credit::find_by_id(credit_id)
        .one(db)
        .await?
        .ok_or(Error::NotFound {
            entity: "credit",
            id: credit_id,
        })?;
    let owner = Client::find_by_id(found.client_id)
        .one(db)
        .await?
        .ok_or(Error::NotFound {
            entity: "client",
            id: found.client_id,
        })?;
    visibility::scope_for(db, actor)
        .await?
        .ensure(owner.collector_id, "credit")?;
    Ok((found, owner))
}

/// Issues a credit and disburses its principal from the collector's box.
#[instrument(
    skip(db, actor, new_credit),
    fields(actor = actor.id, client_id = new_credit.client_id)
)]
pub async fn create_credit(
    db: &DatabaseConnection,
    actor: &user::Model,
    new_credit: NewCredit,
) -> Result<credit::Model> {
    visibility::require_manager(actor)?;
    let terms = compute_terms(
        new_credit.amount,
        new_credit.interest_rate,
        new_credit.term_days,
        new_credit.insurance_amount,
    )?;

    let txn = db.begin().await?;
    let borrower = Client::find_by_id(new_credit.client_id)
        .one(&txn)
        .await?
        .ok_or(Error::NotFound {
            entity: "client",
            id: new_credit.client_id,
        })?;
    visibility::scope_for(&txn, actor)
        .await?
        .ensure(borrower.collector_id, "client")?;
    if !borrower.is_active {
        return Err(Error::validation(format!(
            "client {} is inactive",
            borrower.id
        )));
    }

    let cash = cash_box::get_box_by_user(&txn, borrower.collector_id).await?;
    if let Some(limit) = get_lending_limit(&txn, borrower.collector_id).await? {
        if new_credit.amount > limit.max_amount + EPSILON {
            return Err(Error::validation(format!(
                "amount {:.2} exceeds the collector's lending limit of {:.2}",
                new_credit.amount, limit.max_amount
            )));
        }
    }
    if cash.base_balance < new_credit.amount {
        return Err(Error::InsufficientFunds {
            current: cash.base_balance,
            required: new_credit.amount,
        });
    }

    let now = chrono::Utc::now();
    let created = credit::ActiveModel {
        client_id: Set(borrower.id),
        amount: Set(new_credit.amount),
        interest_rate: Set(new_credit.interest_rate),
        term_days: Set(new_credit.term_days),
        insurance_amount: Set(new_credit.insurance_amount),
        total_amount: Set(terms.total_amount),
        daily_payment: Set(terms.daily_payment),
        remaining_amount: Set(terms.total_amount),
        status: Set(CreditStatus::Active),
        start_date: Set(now),
        end_date: Set(now + chrono::Duration::days(i64::from(new_credit.term_days))),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    }
    .insert(&txn)
    .await?;

    cash_box::apply_delta(&txn, cash.id, -new_credit.amount, false).await?;
    cash_box::record_movement(
        &txn,
        NewMovement {
            client_id: Some(borrower.id),
            credit_id: Some(created.id),
            ..NewMovement::base(
                cash.id,
                -new_credit.amount,
                MovementType::Disbursement,
                actor.id,
                Some(format!("Disbursement of credit {}", created.id)),
            )
        },
    )
    .await?;
    txn.commit().await?;

    info!(
        credit_id = created.id,
        total = created.total_amount,
        daily = created.daily_payment,
        "Issued credit"
    );
    Ok(created)
}

/// Fetches a credit the actor may see.
pub async fn get_credit(
    db: &DatabaseConnection,
    actor: &user::Model,
    credit_id: i64,
) -> Result<credit::Model> {
    load_visible_credit(db, actor, credit_id)
        .await
        .map(|(found, _)| found)
}

/// Lists credits whose client belongs to the actor's scope, newest first.
pub async fn list_credits(
    db: &DatabaseConnection,
    actor: &user::Model,
    filter: CreditFilter,
    page: Page,
) -> Result<Vec<credit::Model>> {
    if let Some(client_id) = filter.client_id {
        load_visible_client(db, actor, client_id).await?;
    }

    let scope = visibility::scope_for(db, actor).await?;
    let query = Credit::find().join(JoinType::InnerJoin, credit::Relation::Client.def());
    let Some(mut query) = scope.restrict(query, client::Column::CollectorId) else {
        return Ok(Vec::new());
    };
    if let Some(client_id) = filter.client_id {
        query = query.filter(credit::Column::ClientId.eq(client_id));
    }
    if let Some(status) = filter.status {
        query = query.filter(credit::Column::Status.eq(status));
    }

    query
        .order_by_desc(credit::Column::CreatedAt)
        .order_by_desc(credit::Column::Id)
        .offset(page.skip)
        .limit(page.limit)
        .all(db)
        .await
        .map_err(Into::into)
}

/// Resolves the status and balance a manual update leads to.
fn resolve_update(
    current: &credit::Model,
    update: &CreditUpdate,
) -> Result<(CreditStatus, f64)> {
    if current.status.is_terminal() {
        let changes_status = update.status.is_some_and(|s| s != current.status);
        if changes_status || update.remaining_amount.is_some() {
            return Err(Error::validation(format!(
                "credit {} is closed and cannot change",
                current.id
            )));
        }
        return Ok((current.status, current.remaining_amount));
    }

    let remaining = match update.remaining_amount {
        Some(amount) if !amount.is_finite() => return Err(Error::InvalidAmount { amount }),
        Some(amount) => amount.clamp(0.0, current.total_amount),
        None => current.remaining_amount,
    };

    if remaining <= EPSILON {
        return match update.status {
            None | Some(CreditStatus::Completed) => Ok((CreditStatus::Completed, 0.0)),
            Some(_) => Err(Error::validation(
                "a credit with nothing remaining must be COMPLETED",
            )),
        };
    }
    match update.status {
        Some(CreditStatus::Completed) => Err(Error::validation(format!(
            "cannot complete a credit with {remaining:.2} outstanding"
        ))),
        Some(status) => Ok((status, remaining)),
        None => Ok((current.status, remaining)),
    }
}

/// Manually corrects a credit's status or outstanding balance.
#[instrument(skip(db, actor, update), fields(actor = actor.id))]
pub async fn update_credit(
    db: &DatabaseConnection,
    actor: &user::Model,
    credit_id: i64,
    update: CreditUpdate,
) -> Result<credit::Model> {
    visibility::require_manager(actor)?;

    let txn = db.begin().await?;
    let (current, _) = load_visible_credit(&txn, actor, credit_id).await?;
    let (status, remaining) = resolve_update(&current, &update)?;
    let previous = current.status;

    let mut model: credit::ActiveModel = current.into();
    model.status = Set(status);
    model.remaining_amount = Set(remaining);
    model.updated_at = Set(chrono::Utc::now());
    let updated = model.update(&txn).await?;
    txn.commit().await?;

    if previous != updated.status {
        info!(credit_id, from = ?previous, to = ?updated.status, "Credit status changed");
    }
    Ok(updated)
}

/// Hard-deletes a credit. ADMIN only.
///
/// Refused while cash transactions reference it. Box movements keep their
/// row with the credit link cleared; balances are not touched.
#[instrument(skip(db, actor), fields(actor = actor.id))]
pub async fn delete_credit(
    db: &DatabaseConnection,
    actor: &user::Model,
    credit_id: i64,
) -> Result<()> {
    visibility::require_admin(actor)?;

    let txn = db.begin().await?;
    let found = Credit::find_by_id(credit_id)
        .one(&txn)
        .await?
        .ok_or(Error::NotFound {
            entity: "credit",
            id: credit_id,
        })?;

    let referencing = CashTransaction::find()
        .filter(cash_transaction::Column::CreditId.eq(credit_id))
        .count(&txn)
        .await?;
    if referencing > 0 {
        return Err(Error::conflict(format!(
            "credit {credit_id} has {referencing} cash transactions"
        )));
    }

    let detached = BoxMovement::update_many()
        .col_expr(box_movement::Column::CreditId, Expr::value(Option::<i64>::None))
        .filter(box_movement::Column::CreditId.eq(credit_id))
        .exec(&txn)
        .await?
        .rows_affected;
    found.delete(&txn).await?;
    txn.commit().await?;

    warn!(credit_id, detached, "Deleted credit");
    Ok(())
}
