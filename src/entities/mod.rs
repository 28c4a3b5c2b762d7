//! Entity module - Contains all SeaORM entity definitions for the database.
//! These entities represent the database tables and their relationships.
//! Each entity has a Model struct for data and an Entity struct for operations.

pub mod box_movement;
pub mod cash_box;
pub mod cash_transaction;
pub mod client;
pub mod credit;
pub mod lending_limit;
pub mod route_grant;
pub mod user;

// Re-export specific types to avoid conflicts
pub use box_movement::{Entity as BoxMovement, MovementType};
pub use cash_box::Entity as CashBox;
pub use cash_transaction::{Entity as CashTransaction, TransactionType};
pub use client::Entity as Client;
pub use credit::{CreditStatus, Entity as Credit};
pub use lending_limit::Entity as LendingLimit;
pub use route_grant::Entity as RouteGrant;
pub use user::{Entity as User, Role};
