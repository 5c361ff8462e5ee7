use std::process::{Command, Output, Stdio};

use anyhow::{Context, Result, bail};

/// Verify that the Docker daemon is reachable.
pub fn ensure_available() -> Result<()> {
    let status = Command::new("docker")
        .args(["version", "--format", "{{.Server.Version}}"])
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .context("failed to invoke `docker`, is it installed and on PATH?")?;

    if !status.success() {
        bail!("docker daemon is not running (exit {})", status);
    }
    Ok(())
}

const VERSION_FORMAT: &str = "{{.Server.Version}} (API version: {{.Server.APIVersion}}, \
minimum supported API version: {{.Server.MinAPIVersion}}, commit: {{.Server.GitCommit}}, \
operating system: '{{.Server.Os}}')";

/// One-line description of the Docker daemon's version.
pub fn docker_version_info() -> Result<String> {
    let output = docker_output(["version", "--format", VERSION_FORMAT])
        .context("failed to invoke `docker`, is it installed and on PATH?")?;
    if !output.status.success() {
        bail!("{}", error_text(&output));
    }
    Ok(stdout_text(&output))
}

/// Run `docker <args>` to completion and capture its output.
pub(crate) fn docker_output<I, S>(args: I) -> std::io::Result<Output>
where
    I: IntoIterator<Item = S>,
    S: AsRef<std::ffi::OsStr>,
{
    let args: Vec<S> = args.into_iter().collect();
    tracing::debug!(
        args = ?args.iter().map(|a| a.as_ref().to_string_lossy()).collect::<Vec<_>>(),
        "invoking docker"
    );
    let output = Command::new("docker")
        .args(&args)
        .stdin(Stdio::null())
        .output()?;
    if !output.status.success() {
        tracing::warn!(
            status = %output.status,
            stderr = %String::from_utf8_lossy(&output.stderr).trim(),
            "docker exited unsuccessfully"
        );
    }
    Ok(output)
}

/// Trimmed stdout of a finished docker invocation.
pub(crate) fn stdout_text(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).trim().to_string()
}

/// Trimmed stderr of a finished docker invocation, falling back to stdout
/// when stderr is empty.
pub(crate) fn error_text(output: &Output) -> String {
    let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
    if stderr.is_empty() {
        stdout_text(output)
    } else {
        stderr
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ensure_available_does_not_panic() {
        // We only assert it doesn't panic; CI may or may not have Docker.
        let _ = ensure_available();
    }

    #[cfg(unix)]
    #[test]
    fn error_text_prefers_stderr() {
        use std::os::unix::process::ExitStatusExt;

        let output = Output {
            status: std::process::ExitStatus::from_raw(256),
            stdout: b"out\n".to_vec(),
            stderr: b"  Error: No such container: abc \n".to_vec(),
        };
        assert_eq!(error_text(&output), "Error: No such container: abc");

        let quiet = Output {
            stderr: Vec::new(),
            ..output
        };
        assert_eq!(error_text(&quiet), "out");
        assert_eq!(stdout_text(&quiet), "out");
    }
}
