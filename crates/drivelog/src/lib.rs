//! `drivelog` - A log of supervised driving sessions
//!
//! This library provides session intake with tamper-evident form tokens,
//! driver management, summary statistics and the HTTP surface serving them.

#![warn(missing_docs)]
#![warn(missing_debug_implementations)]
#![deny(unsafe_code)]

pub mod category;
pub mod cli;
pub mod config;
pub mod drivers;
pub mod error;
pub mod intake;
pub mod logging;
pub mod options;
pub mod server;
pub mod session;
pub mod storage;
pub mod summary;
pub mod token;

pub use category::Category;
pub use config::Config;
pub use error::{Error, Result};
pub use intake::{Flash, FlashLevel, IntakeError, SessionForm};
pub use logging::init_logging;
pub use options::FormOptions;
pub use session::{NewSession, SessionRecord};
pub use storage::Storage;
pub use summary::Summary;
pub use token::TokenCodec;
