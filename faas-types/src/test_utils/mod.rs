//! Test utilities for faas-types.
//!
//! Recording surfaces, a static module loader and closure-backed handlers.
//! Enabled by the `test-utils` feature.

mod handlers;
mod recording;
mod static_loader;

pub use handlers::{event_fn, guard_fn, job_fn, request_fn};
pub use recording::{
    RecordedDelivery, RecordingPubSub, RecordingRouter, RecordingScheduler, RouterCall,
};
pub use static_loader::StaticModuleLoader;
