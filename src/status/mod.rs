//! Structured progress reporting for hosted environments.
//!
//! A hosting process tails the combined output stream and looks for
//! `ie_us<json>ie_ue` markers carrying a [`DeploymentStatus`].

mod deployment;
mod reporter;

pub use deployment::{DeploymentState, DeploymentStatus, ReportedCodeBlock, ReportedStep};
pub use reporter::{wrap_marker, StatusReporter, MARKER_END, MARKER_START};
