#![deny(missing_docs)]
//! Projects a [`FunctionCatalog`] onto a [`Surface`].
//!
//! Every descriptor is classified once into [`Capability`] values, then the
//! capabilities are mounted in a fixed precedence that does not depend on
//! catalog order:
//!
//! | Pass | Role | Surface call |
//! |------|------|--------------|
//! | 1 | Guard | [`HttpRouter::guard`](faas_types::HttpRouter::guard) at the prefix |
//! | 2 | Job | [`Scheduler::schedule`](faas_types::Scheduler::schedule) under the rule |
//! | 3 | Http | [`HttpRouter::route`](faas_types::HttpRouter::route) at path and method |
//! | 4 | Event | [`PubSub::open_namespace`](faas_types::PubSub::open_namespace) keyed by name |
//!
//! A failure mounts nothing for that capability and is recorded in the
//! [`MountReport`]; the rest of the catalog still mounts. The mux keeps no
//! state beyond the call.

mod channel;

use channel::EventChannel;
use faas_types::{
    Capability, FunctionCatalog, FunctionName, MethodSpec, MountError, Role, Surface,
};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// A capability that could not be mounted.
#[derive(Debug)]
pub struct MountFailure {
    /// The export it belongs to.
    pub function: FunctionName,
    /// The role that failed.
    pub role: Role,
    /// Why.
    pub error: MountError,
}

/// What one [`mount`] call did, per role.
#[derive(Debug, Default)]
pub struct MountReport {
    /// Guards attached, in mount order.
    pub guards: Vec<FunctionName>,
    /// Jobs scheduled.
    pub jobs: Vec<FunctionName>,
    /// Routes bound.
    pub routes: Vec<FunctionName>,
    /// Event channels opened.
    pub events: Vec<FunctionName>,
    /// Descriptors with no role.
    pub inert: Vec<FunctionName>,
    /// Capabilities that failed to mount.
    pub failures: Vec<MountFailure>,
}

impl MountReport {
    /// Number of capabilities mounted across all roles.
    pub fn mounted(&self) -> usize {
        self.guards.len() + self.jobs.len() + self.routes.len() + self.events.len()
    }

    fn record(&mut self, function: &FunctionName, role: Role, outcome: Result<(), MountError>) {
        match outcome {
            Ok(()) => {
                debug!(function = %function, role = %role, "mounted");
                let bucket = match role {
                    Role::Guard => &mut self.guards,
                    Role::Job => &mut self.jobs,
                    Role::Http => &mut self.routes,
                    Role::Event => &mut self.events,
                };
                bucket.push(function.clone());
            }
            Err(error) => {
                warn!(function = %function, role = %role, error = %error, "failed to mount");
                self.failures.push(MountFailure {
                    function: function.clone(),
                    role,
                    error,
                });
            }
        }
    }
}

/// Mount every capability in `catalog` onto `surface`.
pub fn mount(catalog: &FunctionCatalog, surface: Surface<'_>) -> MountReport {
    let Surface {
        router,
        pubsub,
        scheduler,
    } = surface;
    let mut report = MountReport::default();

    let mut classified: Vec<(FunctionName, Capability)> = Vec::new();
    for (name, descriptor) in catalog.iter() {
        let caps = descriptor.capabilities(name);
        if caps.is_empty() {
            report.inert.push(FunctionName::new(name));
        }
        classified.extend(caps.into_iter().map(|c| (FunctionName::new(name), c)));
    }

    for pass in [Role::Guard, Role::Job, Role::Http, Role::Event] {
        for (function, cap) in classified.iter().filter(|(_, c)| c.role() == pass) {
            let outcome = match cap {
                Capability::Guard { prefix, handler } => router.guard(prefix, handler.clone()),
                Capability::Job { rule, handler } => {
                    scheduler.schedule(function.as_str(), rule, handler.clone())
                }
                Capability::Http {
                    path,
                    method,
                    handler,
                } => MethodSpec::parse(method.as_deref())
                    .map_err(MountError::InvalidMethod)
                    .and_then(|spec| router.route(path, spec, handler.clone())),
                Capability::Event { channel, handler } => pubsub
                    .open_namespace(
                        channel,
                        Arc::new(EventChannel::new(channel, handler.clone(), &pubsub)),
                    )
                    .map_err(MountError::from),
            };
            report.record(function, pass, outcome);
        }
    }

    info!(
        guards = report.guards.len(),
        jobs = report.jobs.len(),
        routes = report.routes.len(),
        events = report.events.len(),
        inert = report.inert.len(),
        failures = report.failures.len(),
        "catalog mounted"
    );
    report
}
