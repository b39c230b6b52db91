//! Status marker emission.

use std::io::{self, Write};

use super::deployment::DeploymentStatus;
use crate::environment::Environment;

/// Start of a status marker.
pub const MARKER_START: &str = "ie_us";

/// End of a status marker.
pub const MARKER_END: &str = "ie_ue";

/// Wrap a JSON payload in status markers.
pub fn wrap_marker(json: &str) -> String {
    format!("{MARKER_START}{json}{MARKER_END}")
}

/// Writes status markers into the output stream of hosted runs.
///
/// Outside hosted environments every report is a no-op.
pub struct StatusReporter {
    environment: Environment,
    out: Box<dyn Write + Send>,
}

impl std::fmt::Debug for StatusReporter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StatusReporter").field("environment", &self.environment).finish()
    }
}

impl StatusReporter {
    pub fn new(environment: Environment, out: Box<dyn Write + Send>) -> Self {
        Self { environment, out }
    }

    /// Reporter writing to standard output.
    pub fn stdout(environment: Environment) -> Self {
        Self::new(environment, Box::new(io::stdout()))
    }

    pub fn is_enabled(&self) -> bool {
        self.environment.is_hosted()
    }

    /// Emit `status` on a line of its own.
    pub fn report(&mut self, status: &DeploymentStatus) -> io::Result<()> {
        if !self.is_enabled() {
            return Ok(());
        }
        let json = status.to_json().map_err(io::Error::other)?;
        tracing::debug!(status = ?status.status, step = status.current_step, "reporting status");
        writeln!(self.out, "{}", wrap_marker(&json))?;
        self.out.flush()
    }
}
