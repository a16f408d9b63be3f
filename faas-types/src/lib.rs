//! # faas-types: protocol types for a function-hosting engine
//!
//! This crate defines the vocabulary every other crate in the workspace
//! speaks: what a function descriptor is, how a catalog of them is merged,
//! which handler traits a descriptor can carry, and the serving surfaces a
//! catalog is projected onto.
//!
//! ## The Handlers
//!
//! | Role | Trait | Triggered by |
//! |------|-------|--------------|
//! | Guard | [`GuardHandler`] | Every HTTP request under its prefix, before routes |
//! | Http | [`RequestHandler`] | An HTTP request matching its path and method |
//! | Event | [`EventHandler`] | A real-time message on its channel |
//! | Job | [`JobHandler`] | Its cron rule firing |
//!
//! ## The Surfaces
//!
//! | Surface | Trait | What it does |
//! |---------|-------|-------------|
//! | Router | [`HttpRouter`] | Holds guards and routes |
//! | Pub/sub | [`PubSub`] | Opens namespaces and delivers event payloads |
//! | Scheduler | [`Scheduler`] | Runs jobs on cron rules |
//!
//! ## Classification
//!
//! A [`FunctionDescriptor`] carries optional attributes; which of them are
//! present decides its roles. [`FunctionDescriptor::capabilities`] turns that
//! shape into explicit [`Capability`] values once, so mounting code never
//! inspects descriptor fields directly.
//!
//! ## Loaded code
//!
//! Descriptors come from module files read by a [`ModuleLoader`]. A loader
//! returns every export of a file; only object-shaped exports
//! ([`ExportValue::Descriptor`]) enter the catalog.

#![deny(missing_docs)]

pub mod catalog;
pub mod descriptor;
pub mod error;
pub mod event;
pub mod handler;
pub mod http;
pub mod id;
pub mod loader;
pub mod surface;

#[cfg(feature = "test-utils")]
pub mod test_utils;

// Re-exports for convenience
pub use catalog::FunctionCatalog;
pub use descriptor::{Capability, FunctionDescriptor, Role};
pub use error::{HandlerError, LoadError, MountError, PubSubError};
pub use event::{Delivery, EventRequest, EventResponse, TopicHandle};
pub use handler::{EventHandler, GuardHandler, GuardOutcome, JobHandler, RequestHandler};
pub use http::{FunctionRequest, FunctionResponse, MethodSpec, ResponseBody};
pub use id::{ConnectionId, FunctionName};
pub use loader::{ExportValue, ModuleExports, ModuleLoader};
pub use surface::{HttpRouter, NamespaceHandler, PubSub, Scheduler, Surface};
