//! Bootstrap and resilience harness for QA suites.
//!
//! The harness picks a reachable environment from a prioritized list of base
//! URLs, keeps one live browser session per worker, and navigates with
//! bounded retries. Scenarios plug in through [`Scenario`] and receive a
//! [`ScenarioContext`] holding the environment, an HTTP client and the
//! worker's session.
//!
//! # Example
//!
//! ```ignore
//! use testbed::{HarnessConfig, Suite};
//!
//! let config = HarnessConfig::resolve(None)?;
//! let mut suite = Suite::from_config(config)?;
//! suite.add(MyScenario);
//! let report = suite.run().await?;
//! assert!(report.is_success());
//! ```

pub mod artifacts;
pub mod config;
pub mod environment;
pub mod error;
pub mod http;
pub mod navigate;
pub mod probe;
pub mod retry;
pub mod scenario;
pub mod session;
pub mod smoke;
pub mod suite;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use config::HarnessConfig;
pub use environment::{EnvironmentSelector, EnvironmentTemplate, Selection, select_environment};
pub use error::{Error, Result};
pub use http::ApiClient;
pub use navigate::{AttemptError, Navigator};
pub use probe::{HttpProber, ProbeTimeouts, Prober};
pub use retry::{Backoff, RetryError, RetryPolicy, RetryableError, Sleeper, TokioSleeper, run_with_retry};
pub use scenario::{AssertionFailed, Scenario, ScenarioContext, Skip, assertion_failed, skip};
pub use session::webdriver::{LaunchOptions, WebDriverLauncher};
pub use session::{BrowserDriver, BrowserSession, DriverError, SessionLauncher, SessionManager};
pub use suite::{Suite, write_report};
pub use testbed_protocol as protocol;
pub use testbed_protocol::{ActiveEnvironment, BrowserKind, ProbeResult};
pub use tokio_util::sync::CancellationToken;
