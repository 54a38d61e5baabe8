pub mod error;
pub mod inventory;
pub mod order_ledger;
pub mod settlement;

pub use error::{LedgerError, LedgerResult};
pub use inventory::{reserve, Reservation};
pub use order_ledger::{OrderLedger, OrderReceipt, PlaceOrder};
pub use settlement::PaymentSettlement;
