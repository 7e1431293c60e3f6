//! Shared data types for the testbed harness.
//!
//! Everything in this crate is plain serde data: the shapes handed from the
//! harness to scenarios, and the shapes the CLI prints or writes to disk.
//!
//! - [`BrowserKind`]: the supported browser engines
//! - [`ActiveEnvironment`]: the suite-wide base URL and request defaults
//! - [`ProbeResult`]: outcome of one reachability probe
//! - [`NavigationAttempt`]: one step of a retried navigation
//! - [`ScenarioReport`] / [`SuiteReport`]: scenario outcomes

pub mod browser;
pub mod environment;
pub mod navigation;
pub mod probe;
pub mod report;

pub use browser::*;
pub use environment::*;
pub use navigation::*;
pub use probe::*;
pub use report::*;
