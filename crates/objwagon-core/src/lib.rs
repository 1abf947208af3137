pub mod config;
pub mod logging;

pub mod checksum;
pub mod progress;
pub mod retry;
pub mod store;
pub mod validate;
pub mod wagon;

pub use retry::{TransferError, TransferErrorKind};
pub use wagon::{Session, Wagon};
