//! Mangonel - an HTTP load-testing service
//!
//! Mangonel keeps a catalogue of load-test *setups* (target URL, method,
//! body, headers, request rate, duration) and executes *runs* against
//! them: a paced attack loop issues requests at the configured rate for
//! the configured duration while a per-run collector aggregates latency,
//! throughput, byte and status-code statistics. Stats are readable live
//! during a run and as a final snapshot afterwards, and active runs can
//! be cancelled without losing in-flight results.
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! use mangonel::{client, Collector, Config, Repository, Runner, Service};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let cfg = Config::load();
//!     let http = client::build(&cfg.http_client)?;
//!     let repo = Arc::new(Repository::new());
//!     let collector = Arc::new(Collector::new());
//!     let runner = Runner::new(Arc::clone(&repo), collector, http);
//!     let service = Service::new(repo, runner.clone());
//!
//!     let setup = service.create_setup(
//!         "smoke".to_string(),
//!         String::new(),
//!         "GET".to_string(),
//!         "http://127.0.0.1:8080/ok".to_string(),
//!         Vec::new(),
//!         Default::default(),
//!         50,
//!         Duration::from_secs(5),
//!     )?;
//!
//!     let run = service.start_run(setup.id)?;
//!     println!("run {} started", run.id);
//!     Ok(())
//! }
//! ```

pub mod attack;
pub mod client;
pub mod collector;
pub mod config;
pub mod error;
pub mod models;
pub mod runner;
pub mod server;
pub mod service;
pub mod stats;
pub mod storage;

// Re-export the main types for library users
pub use collector::Collector;
pub use config::Config;
pub use error::Error;
pub use models::{Run, RunStats, RunStatus, Setup, SetupStatus};
pub use runner::Runner;
pub use service::Service;
pub use stats::{RequestResult, Stats};
pub use storage::Repository;
