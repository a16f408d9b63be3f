#![deny(missing_docs)]
//! The deployment controller and the hosted engine.
//!
//! [`DeploymentController`] composes [`faas_source`], [`faas_resolver`] and
//! [`faas_mux`] into one gated cycle and yields a [`Deployment`]: the
//! catalog, the mount report, and an axum application built on
//! [`faas_surface`]. [`Deployment::serve`] runs it until shutdown.

mod controller;
pub mod error;
mod serve;

pub use controller::{Deployment, DeploymentController, EngineOptions};
pub use error::EngineError;
pub use serve::{run_start_script, shutdown_signal};
