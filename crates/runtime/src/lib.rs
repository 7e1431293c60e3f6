//! WebDriver server runtime for testbed.
//!
//! Locates the vendor driver executable for a [`BrowserKind`] and manages the
//! lifecycle of the server process it runs.
//!
//! [`BrowserKind`]: testbed_protocol::BrowserKind

pub mod driver;
pub mod error;
pub mod server;

pub use driver::{driver_binary_name, driver_env_var, locate_driver};
pub use error::{Error, Result};
pub use server::{DriverServer, PortChoice, wait_until_ready};
