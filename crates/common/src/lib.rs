//! Shared types for the balance ledger.
//!
//! This crate provides the typed identifiers and the [`Money`] amount
//! used by every other crate in the workspace.

pub mod ids;
pub mod money;

pub use ids::{AccountId, OperationId, OrderId, ProductId, ReserveId, UserId};
pub use money::Money;
