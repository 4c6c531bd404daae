pub mod config;
pub mod logging;

pub mod cache;
pub mod error;
pub mod fetch;
pub mod integrity;
pub mod lock;
pub mod parts;
pub mod remote;
pub mod retry;
pub mod snapshot;

pub use error::{HubError, Result, TransferError};
