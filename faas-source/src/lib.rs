#![deny(missing_docs)]
//! Fetching function source into the working directory.
//!
//! | Mode    | Plan                          | Fetch                          |
//! |---------|-------------------------------|--------------------------------|
//! | `git`   | [`SourcePlan::Git`]           | shallow clone, then install    |
//! | `url`   | [`SourcePlan::TarballUrl`]    | download, extract, flatten     |
//! | `npm`   | [`SourcePlan::TarballPackage`]| `npm pack`, extract, flatten   |
//! | `local` | [`SourcePlan::Local`]         | none, served in place          |
//!
//! Remote modes stage into a sibling directory and only replace the
//! working directory on [`StagedSource::commit`], so a failed fetch leaves
//! the last good source in place.

mod acquirer;
pub mod error;
mod fetch;
pub mod plan;

pub use acquirer::{AcquirerOptions, SourceAcquirer, StagedSource};
pub use error::AcquisitionError;
pub use fetch::validate_url;
pub use plan::{DeploymentMode, ParseModeError, SourcePlan, SourceSettings};
