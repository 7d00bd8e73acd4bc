//! Sentry watcher library: polls remote repositories for new commits and
//! deploys a QA recipe when they change. Split into a library so
//! integration tests can exercise the change-detection and deployment
//! engines directly, with the `sentry` binary (`main.rs`) a thin CLI shell
//! around it.

pub mod config;
pub mod deploy;
pub mod detector;
pub mod error;
pub mod group;
pub mod hosting;
pub mod model;
pub mod poller;
pub mod runner;
pub mod workspace;
