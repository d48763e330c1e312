//! Stored document types

#[macro_use]
pub mod macros;

pub mod cart;
pub mod catalog;
pub mod coupon;
pub mod order;
pub mod user;

pub use cart::{Cart, CartItem, round2};
pub use catalog::{Brand, Category, Product, Review, SubCategory};
pub use coupon::Coupon;
pub use order::{Order, OrderItem, PaymentMethod, ShippingAddress};
pub use user::{Address, AddressPatch, NewAddress, Role, User};
