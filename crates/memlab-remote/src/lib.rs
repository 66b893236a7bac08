//! memlab-remote — Remote service integrations.
//!
//! Implements the `ProblemSource`, `Evaluator` and `SessionStore` traits
//! over the memlab HTTP API, plus a scripted mock backend and the client
//! configuration loader.

pub mod config;
pub mod error;
pub mod http;
pub mod mock;

pub use config::{load_config, load_config_from, MemlabConfig};
pub use error::RemoteError;
pub use http::HttpBackend;
pub use mock::{MockBackend, MockScoring};
