//! Cash box ("caja") ledger.
//!
//! Each user owns one box with a base balance and an insurance sub-balance.
//! Balances change only through [`apply_delta`], which never lets a debit take
//! a sub-balance below zero, and every change is paired with a movement row
//! written in the same transaction.

use crate::{
    core::{EPSILON, Page, clean, require_positive, visibility},
    entities::{
        BoxMovement, CashBox, Client, MovementType, User, box_movement, cash_box, user,
    },
    errors::{Error, Result},
};
use sea_orm::{
    QueryOrder, QuerySelect, Set, TransactionTrait, prelude::*, sea_query::Expr,
};
use serde::Serialize;
use tracing::{debug, info, instrument, warn};

/// Outcome of a box count against the system balance.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CloseStatus {
    /// Counted cash equals the system balance
    Match,
    /// More cash than the system expects
    Surplus,
    /// Less cash than the system expects
    Shortage,
}

impl CloseStatus {
    /// Classifies `counted - system`.
    #[must_use]
    pub fn classify(difference: f64) -> Self {
        if difference.abs() <= EPSILON {
            Self::Match
        } else if difference > 0.0 {
            Self::Surplus
        } else {
            Self::Shortage
        }
    }
}

/// Reconciliation produced by [`close_box`].
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct BoxClosing {
    /// The CLOSE movement that was recorded
    pub movement: box_movement::Model,
    /// Base balance according to the ledger
    pub system_balance: f64,
    /// Physically counted cash
    pub counted_balance: f64,
    /// `counted_balance - system_balance`
    pub difference: f64,
    /// Classification of `difference`
    pub status: CloseStatus,
}

/// A movement to append to the audit trail.
#[derive(Clone, Debug)]
pub struct NewMovement {
    /// Box whose balance changed
    pub box_id: i64,
    /// Signed delta (counted balance for CLOSE)
    pub amount: f64,
    /// Why the balance changed
    pub movement_type: MovementType,
    /// Acting user
    pub performed_by_id: Option<i64>,
    /// Free-text note
    pub description: Option<String>,
    /// Whether the insurance sub-balance was touched
    pub is_insurance: bool,
    /// Related client
    pub client_id: Option<i64>,
    /// Related credit
    pub credit_id: Option<i64>,
}

impl NewMovement {
    /// A base-balance movement with no client or credit attached.
    #[must_use]
    pub fn base(
        box_id: i64,
        amount: f64,
        movement_type: MovementType,
        performed_by_id: i64,
        description: Option<String>,
    ) -> Self {
        Self {
            box_id,
            amount,
            movement_type,
            performed_by_id: Some(performed_by_id),
            description,
            is_insurance: false,
            client_id: None,
            credit_id: None,
        }
    }
}

/// Finds the box of `user_id`, if any.
pub async fn find_box_by_user<C>(db: &C, user_id: i64) -> Result<Option<cash_box::Model>>
where
    C: ConnectionTrait,
{
    CashBox::find()
        .filter(cash_box::Column::UserId.eq(user_id))
        .one(db)
        .await
        .map_err(Into::into)
}

/// Returns the box of `user_id` or [`Error::NotFound`].
pub async fn get_box_by_user<C>(db: &C, user_id: i64) -> Result<cash_box::Model>
where
    C: ConnectionTrait,
{
    find_box_by_user(db, user_id).await?.ok_or(Error::NotFound {
        entity: "cash box",
        id: user_id,
    })
}

/// Inserts a zeroed box. Caller owns the transaction and the existence check.
pub(crate) async fn insert_box<C>(db: &C, user_id: i64) -> Result<cash_box::Model>
where
    C: ConnectionTrait,
{
    cash_box::ActiveModel {
        user_id: Set(user_id),
        base_balance: Set(0.0),
        insurance_balance: Set(0.0),
        last_updated: Set(chrono::Utc::now()),
        ..Default::default()
    }
    .insert(db)
    .await
    .map_err(Into::into)
}

/// Reads the box of a user within the actor's scope.
pub async fn get_box(
    db: &DatabaseConnection,
    actor: &user::Model,
    owner_id: i64,
) -> Result<cash_box::Model> {
    visibility::scope_for(db, actor)
        .await?
        .ensure(owner_id, "box")?;
    get_box_by_user(db, owner_id).await
}

/// Opens a box for a user that has none. ADMIN only.
pub async fn create_box_for_user(
    db: &DatabaseConnection,
    actor: &user::Model,
    user_id: i64,
) -> Result<cash_box::Model> {
    visibility::require_admin(actor)?;

    let txn = db.begin().await?;
    User::find_by_id(user_id)
        .one(&txn)
        .await?
        .ok_or(Error::NotFound {
            entity: "user",
            id: user_id,
        })?;
    if find_box_by_user(&txn, user_id).await?.is_some() {
        return Err(Error::conflict(format!("user {user_id} already has a box")));
    }
    let created = insert_box(&txn, user_id).await?;
    txn.commit().await?;

    info!(user_id, box_id = created.id, "Opened cash box");
    Ok(created)
}

/// Opens a box for every user missing one. Returns how many were opened.
pub async fn ensure_boxes_for_all_users(db: &DatabaseConnection) -> Result<usize> {
    let txn = db.begin().await?;
    let user_ids: Vec<i64> = User::find()
        .select_only()
        .column(user::Column::Id)
        .into_tuple()
        .all(&txn)
        .await?;

    let mut opened = 0;
    for user_id in user_ids {
        if find_box_by_user(&txn, user_id).await?.is_none() {
            insert_box(&txn, user_id).await?;
            opened += 1;
        }
    }
    txn.commit().await?;

    if opened > 0 {
        warn!(opened, "Opened missing cash boxes");
    }
    Ok(opened)
}

/// Adds `amount` (negative to debit) to the selected sub-balance.
///
/// The update is a single conditional statement, so a debit that would take
/// the sub-balance below zero affects no row and fails with
/// [`Error::InsufficientFunds`].
pub async fn apply_delta<C>(
    db: &C,
    box_id: i64,
    amount: f64,
    is_insurance: bool,
) -> Result<cash_box::Model>
where
    C: ConnectionTrait,
{
    if !amount.is_finite() {
        return Err(Error::InvalidAmount { amount });
    }

    let column = if is_insurance {
        cash_box::Column::InsuranceBalance
    } else {
        cash_box::Column::BaseBalance
    };

    let mut update = CashBox::update_many()
        .col_expr(column, Expr::col(column).add(amount))
        .col_expr(cash_box::Column::LastUpdated, Expr::value(chrono::Utc::now()))
        .filter(cash_box::Column::Id.eq(box_id));
    if amount < 0.0 {
        update = update.filter(column.gte(-amount));
    }
    let result = update.exec(db).await?;

    let cash = CashBox::find_by_id(box_id).one(db).await?.ok_or(Error::NotFound {
        entity: "cash box",
        id: box_id,
    })?;
    if result.rows_affected == 0 {
        return Err(Error::InsufficientFunds {
            current: cash.balance(is_insurance),
            required: -amount,
        });
    }

    debug!(box_id, amount, is_insurance, "Applied box delta");
    Ok(cash)
}

/// Appends a movement to the audit trail.
pub async fn record_movement<C>(db: &C, movement: NewMovement) -> Result<box_movement::Model>
where
    C: ConnectionTrait,
{
    box_movement::ActiveModel {
        box_id: Set(movement.box_id),
        amount: Set(movement.amount),
        movement_type: Set(movement.movement_type),
        description: Set(movement.description),
        is_insurance: Set(movement.is_insurance),
        performed_by_id: Set(movement.performed_by_id),
        client_id: Set(movement.client_id),
        credit_id: Set(movement.credit_id),
        created_at: Set(chrono::Utc::now()),
        ..Default::default()
    }
    .insert(db)
    .await
    .map_err(Into::into)
}

/// Moves base cash from one box to another, recording TRANSFER_OUT and TRANSFER_IN.
///
/// Admins may move between any boxes; supervisors only out of their own box
/// into one in their scope.
#[instrument(skip(db, actor), fields(actor = actor.id))]
pub async fn transfer_base(
    db: &DatabaseConnection,
    actor: &user::Model,
    from_user_id: i64,
    to_user_id: i64,
    amount: f64,
) -> Result<(cash_box::Model, cash_box::Model)> {
    visibility::require_manager(actor)?;
    require_positive(amount)?;
    if from_user_id == to_user_id {
        return Err(Error::validation("cannot transfer a box to itself"));
    }
    if actor.role != crate::entities::Role::Admin && actor.id != from_user_id {
        return Err(Error::denied("supervisors may only transfer from their own box"));
    }

    let txn = db.begin().await?;
    let scope = visibility::scope_for(&txn, actor).await?;
    scope.ensure(from_user_id, "source box")?;
    scope.ensure(to_user_id, "destination box")?;

    let source = get_box_by_user(&txn, from_user_id).await?;
    let destination = get_box_by_user(&txn, to_user_id).await?;

    let source = apply_delta(&txn, source.id, -amount, false).await?;
    let destination = apply_delta(&txn, destination.id, amount, false).await?;

    record_movement(
        &txn,
        NewMovement::base(
            source.id,
            -amount,
            MovementType::TransferOut,
            actor.id,
            Some(format!("Transfer to user {to_user_id}")),
        ),
    )
    .await?;
    record_movement(
        &txn,
        NewMovement::base(
            destination.id,
            amount,
            MovementType::TransferIn,
            actor.id,
            Some(format!("Received from user {from_user_id}")),
        ),
    )
    .await?;
    txn.commit().await?;

    info!(from_user_id, to_user_id, amount, "Transferred base");
    Ok((source, destination))
}

/// Debits an operating expense from a box.
#[instrument(skip(db, actor), fields(actor = actor.id))]
pub async fn register_expense(
    db: &DatabaseConnection,
    actor: &user::Model,
    owner_id: i64,
    amount: f64,
    description: String,
) -> Result<(cash_box::Model, box_movement::Model)> {
    require_positive(amount)?;
    let description = clean(Some(description))
        .ok_or_else(|| Error::validation("an expense needs a description"))?;

    let txn = db.begin().await?;
    visibility::scope_for(&txn, actor)
        .await?
        .ensure(owner_id, "box")?;

    let cash = get_box_by_user(&txn, owner_id).await?;
    let cash = apply_delta(&txn, cash.id, -amount, false).await?;
    let movement = record_movement(
        &txn,
        NewMovement::base(cash.id, -amount, MovementType::Expense, actor.id, Some(description)),
    )
    .await?;
    txn.commit().await?;
    Ok((cash, movement))
}

/// Credits a collected insurance premium to the insurance sub-balance.
#[instrument(skip(db, actor), fields(actor = actor.id))]
pub async fn register_insurance_premium(
    db: &DatabaseConnection,
    actor: &user::Model,
    owner_id: i64,
    amount: f64,
    client_id: i64,
) -> Result<(cash_box::Model, box_movement::Model)> {
    require_positive(amount)?;

    let txn = db.begin().await?;
    let scope = visibility::scope_for(&txn, actor).await?;
    scope.ensure(owner_id, "box")?;

    let client = Client::find_by_id(client_id)
        .one(&txn)
        .await?
        .ok_or(Error::NotFound {
            entity: "client",
            id: client_id,
        })?;
    scope.ensure(client.collector_id, "client")?;

    let cash = get_box_by_user(&txn, owner_id).await?;
    let cash = apply_delta(&txn, cash.id, amount, true).await?;
    let movement = record_movement(
        &txn,
        NewMovement {
            box_id: cash.id,
            amount,
            movement_type: MovementType::Insurance,
            performed_by_id: Some(actor.id),
            description: Some("Insurance premium collected".to_string()),
            is_insurance: true,
            client_id: Some(client.id),
            credit_id: None,
        },
    )
    .await?;
    txn.commit().await?;
    Ok((cash, movement))
}

/// Adds funds to a box. ADMIN or SUPERVISOR, within scope.
#[instrument(skip(db, actor), fields(actor = actor.id))]
pub async fn register_deposit(
    db: &DatabaseConnection,
    actor: &user::Model,
    owner_id: i64,
    amount: f64,
    description: Option<String>,
) -> Result<(cash_box::Model, box_movement::Model)> {
    visibility::require_manager(actor)?;
    require_positive(amount)?;

    let txn = db.begin().await?;
    visibility::scope_for(&txn, actor)
        .await?
        .ensure(owner_id, "box")?;

    let cash = get_box_by_user(&txn, owner_id).await?;
    let cash = apply_delta(&txn, cash.id, amount, false).await?;
    let movement = record_movement(
        &txn,
        NewMovement::base(cash.id, amount, MovementType::Deposit, actor.id, clean(description)),
    )
    .await?;
    txn.commit().await?;
    Ok((cash, movement))
}

/// Takes cash out of a box. With `to_supervisor`, the owner's supervisor's box
/// receives the same amount in the same transaction.
#[instrument(skip(db, actor), fields(actor = actor.id))]
pub async fn register_withdrawal(
    db: &DatabaseConnection,
    actor: &user::Model,
    owner_id: i64,
    amount: f64,
    to_supervisor: bool,
) -> Result<(cash_box::Model, box_movement::Model)> {
    require_positive(amount)?;

    let txn = db.begin().await?;
    visibility::scope_for(&txn, actor)
        .await?
        .ensure(owner_id, "box")?;

    let owner = User::find_by_id(owner_id)
        .one(&txn)
        .await?
        .ok_or(Error::NotFound {
            entity: "user",
            id: owner_id,
        })?;

    let cash = get_box_by_user(&txn, owner_id).await?;
    let cash = apply_delta(&txn, cash.id, -amount, false).await?;
    let movement = record_movement(
        &txn,
        NewMovement::base(
            cash.id,
            -amount,
            MovementType::Withdrawal,
            actor.id,
            Some("Cash withdrawal".to_string()),
        ),
    )
    .await?;

    if to_supervisor {
        let supervisor_id = owner
            .supervisor_id
            .ok_or_else(|| Error::validation(format!("user {owner_id} has no supervisor")))?;
        let supervisor_box = get_box_by_user(&txn, supervisor_id).await?;
        apply_delta(&txn, supervisor_box.id, amount, false).await?;
        record_movement(
            &txn,
            NewMovement::base(
                supervisor_box.id,
                amount,
                MovementType::TransferIn,
                actor.id,
                Some(format!("Withdrawal handed over by user {owner_id}")),
            ),
        )
        .await?;
    }
    txn.commit().await?;
    Ok((cash, movement))
}

/// Records an end-of-day count. Balances are not changed.
#[instrument(skip(db, actor, notes), fields(actor = actor.id))]
pub async fn close_box(
    db: &DatabaseConnection,
    actor: &user::Model,
    owner_id: i64,
    counted_balance: f64,
    notes: Option<String>,
) -> Result<BoxClosing> {
    if !counted_balance.is_finite() || counted_balance < 0.0 {
        return Err(Error::InvalidAmount {
            amount: counted_balance,
        });
    }

    let txn = db.begin().await?;
    visibility::scope_for(&txn, actor)
        .await?
        .ensure(owner_id, "box")?;

    let cash = get_box_by_user(&txn, owner_id).await?;
    let movement = record_movement(
        &txn,
        NewMovement::base(
            cash.id,
            counted_balance,
            MovementType::Close,
            actor.id,
            clean(notes).or_else(|| Some("Box closing".to_string())),
        ),
    )
    .await?;
    txn.commit().await?;

    let difference = counted_balance - cash.base_balance;
    let status = CloseStatus::classify(difference);
    if status != CloseStatus::Match {
        warn!(owner_id, difference, ?status, "Box count does not match");
    }
    Ok(BoxClosing {
        movement,
        system_balance: cash.base_balance,
        counted_balance,
        difference,
        status,
    })
}

/// Lists the movements of a box, newest first.
pub async fn list_movements(
    db: &DatabaseConnection,
    actor: &user::Model,
    owner_id: i64,
    page: Page,
) -> Result<Vec<box_movement::Model>> {
    let cash = get_box(db, actor, owner_id).await?;
    BoxMovement::find()
        .filter(box_movement::Column::BoxId.eq(cash.id))
        .order_by_desc(box_movement::Column::CreatedAt)
        .order_by_desc(box_movement::Column::Id)
        .offset(page.skip)
        .limit(page.limit)
        .all(db)
        .await
        .map_err(Into::into)
}
