//! The `utils` module collects the pieces shared across `popq`: the error
//! types and the logging bootstrap.

pub mod error;
pub mod logging;

pub use error::{BrokerError, BrokerResult, StoreError, StoreResult};
