//! Entities and read models shared by the services and the storage adapters.

pub mod catalog;
pub mod order;
pub mod payment;
pub mod views;

pub use catalog::{Account, Address, Product, UserProfile};
pub use order::{NewOrder, NewOrderLine, Order, OrderLine, OrderStatus, OrderStatusKind};
pub use payment::{NewPayment, Payment};
pub use views::{OrderView, PaymentView};
