pub mod adapters;
pub mod config;
pub mod crypto;
pub mod protocol;
pub mod telemetry;
#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use protocol::{Error, Result, SmartIdClient};
