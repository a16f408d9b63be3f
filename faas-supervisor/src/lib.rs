#![deny(missing_docs)]
//! The engine supervisor.
//!
//! [`Supervisor`] owns one engine process at a time and moves it through
//! [`SupervisorState`]:
//!
//! ```text
//! stopped ──deploy──▶ restarting ──commit──▶ starting ──listening──▶ running
//!    ▲                                          │                      │
//!    └────────────── launch failed ─────────────┘◀──── crash / stop ───┘
//! ```
//!
//! [`router`] puts it behind HTTP: `/deploy` (any method, application id
//! via the `bfast-application-id` header or `appId` query parameter) and a
//! reverse proxy to the engine for every other path.
//!
//! Engines are started through [`EngineLauncher`]; [`ChildProcessLauncher`]
//! is the real one.

pub mod config;
pub mod error;
mod http;
pub mod launcher;
mod supervisor;

pub use config::SupervisorConfig;
pub use error::{ProcessError, SupervisorError};
pub use http::{APPLICATION_ID_HEADER, APPLICATION_ID_PARAM, credential, router};
pub use launcher::{
    ChildProcessLauncher, EngineInstance, EngineLauncher, EngineProcessHandle, LaunchSpec,
    STOP_GRACE,
};
pub use supervisor::{Supervisor, SupervisorState};
