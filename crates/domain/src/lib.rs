//! Domain layer for the commerce engine.
//!
//! This crate holds the canonical entity definitions and their rules:
//! - `Product` with its stock count
//! - `Cart` and its `CartItem` lines, the pre-checkout staging area
//! - `Order` and its `OrderItem` lines, with the order lifecycle state machine
//!
//! Nothing here performs I/O. Persistence mapping lives in the `store` crate.

pub mod cart;
pub mod order;
pub mod product;

pub use cart::{Cart, CartItem};
pub use common::{CartId, Money, OrderId, ProductId, UserId};
pub use order::{Order, OrderError, OrderItem, OrderStatus, ParseStatusError, PaymentStatus};
pub use product::Product;
