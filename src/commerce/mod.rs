//! Cart, order and account engine
//!
//! Services here hold `Arc<dyn ...>` handles to the stores and collaborators
//! they need, so they are cheap to clone into request handlers.

pub mod account;
pub mod cart;
pub mod inventory;
pub mod order;

pub use account::{AccountService, ProfileUpdate};
pub use cart::CartService;
pub use inventory::{StockAdjustment, StockLedger, StockPolicy};
pub use order::{OrderService, OrderSettings, WebhookOutcome};
