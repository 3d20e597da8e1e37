//! Shared identifier and money types for the commerce engine.

mod money;
mod types;

pub use money::Money;
pub use types::{CartId, OrderId, ProductId, UserId};
