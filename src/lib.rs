mod config;
mod error;
mod google_drive;
mod session;
mod types;

#[cfg(test)]
mod testing;

pub use config::Config;
pub use error::{ApiError, Error, Result};
pub use google_drive::*;
pub use session::*;
pub use types::*;
