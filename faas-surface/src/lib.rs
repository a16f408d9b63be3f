#![deny(missing_docs)]
//! # faas-surface: the serving surface for mounted functions
//!
//! Concrete implementations of the three surface traits from `faas-types`,
//! and the glue that turns them into one axum application.
//!
//! | Trait | Implementation | Backed by |
//! |-------|----------------|-----------|
//! | `HttpRouter` | [`RouteTable`] | express-style patterns, guards in attach order |
//! | `PubSub` | [`LocalPubSub`] | in-process queues, exposed over WebSocket |
//! | `Scheduler` | [`CronScheduler`] | one tokio task per cron rule |
//!
//! [`ServingSurface`] owns all three. Mount a catalog through
//! [`ServingSurface::surface`], then call [`ServingSurface::into_router`].

mod app;
pub mod convert;
pub mod pubsub;
pub mod route;
pub mod scheduler;
mod ws;

pub use app::ServingSurface;
pub use pubsub::{LocalPubSub, OutboundFrame};
pub use route::{RoutePattern, RouteTable, WILDCARD_PARAM};
pub use scheduler::{CronScheduler, parse_rule};
