use std::fmt;

use anyhow::Result;

/// What `dockstep --version-info` prints.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionInfo {
    pub version: String,
    pub os: String,
    pub docker: String,
}

impl VersionInfo {
    /// Collect version details for this build and host, asking
    /// `docker_version` for the daemon's. A failure there is reported in the
    /// Docker line rather than returned.
    pub fn gather(docker_version: impl FnOnce() -> Result<String>) -> Self {
        let docker = match docker_version() {
            Ok(version) => version,
            Err(err) => {
                tracing::warn!(error = %format!("{err:#}"), "could not query the docker version");
                format!("(could not get Docker version information because {err:#})")
            }
        };

        Self {
            version: env!("CARGO_PKG_VERSION").to_string(),
            os: format!("{} ({})", std::env::consts::OS, std::env::consts::ARCH),
            docker,
        }
    }
}

impl fmt::Display for VersionInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "dockstep version:  {}", self.version)?;
        writeln!(f, "OS version:        {}", self.os)?;
        write!(f, "Docker version:    {}", self.docker)
    }
}
