//! Domain entities for the balance ledger.
//!
//! This crate defines the records the ledger keeps:
//! - Account: a user's balance
//! - Order: a purchase with a status state machine
//! - Reserve: a hold on funds while an order is processed
//! - Operation: an append-only journal entry written at settlement

pub mod account;
pub mod operation;
pub mod order;
pub mod reserve;

pub use account::Account;
pub use operation::{Operation, OperationKind};
pub use order::{Order, OrderStatus};
pub use reserve::Reserve;
