//! Transaction construction, gas estimation and threshold-signed submission

mod envelope;
mod gas;
mod request;
mod sender;

pub use envelope::{parse_quantity, to_eip155, UnsignedFields};
pub use gas::{to_hex_quantity, GasEstimator};
pub use request::{TxRequest, DEFAULT_GAS_LIMIT, DEFAULT_GAS_PRICE};
pub use sender::{TransactionHandle, TransactionSender};
