use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use std::process::{Command, Stdio};
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use serde::Deserialize;

use crate::model::CreateContainerRequest;

use super::client::DockerClient;
use super::engine::{docker_output, error_text, stdout_text};
use super::run::{OutputLine, stream};
use super::types::{
    DockerContainer, DockerError, DockerImage, DockerImageBuildProgress, DockerImagePullProgress,
    DockerNetwork, HealthStatus,
};

const POLL_INTERVAL: Duration = Duration::from_millis(200);

/// [`DockerClient`] backed by the `docker` command line tool.
#[derive(Debug, Clone)]
pub struct CliDockerClient {
    health_check_timeout: Duration,
}

impl CliDockerClient {
    pub fn new(health_check_timeout: Duration) -> Self {
        Self {
            health_check_timeout,
        }
    }

    fn remove_with(
        &self,
        container: &DockerContainer,
        extra_args: &[&str],
    ) -> Result<(), DockerError> {
        let mut args = vec!["rm"];
        args.extend_from_slice(extra_args);
        args.push(&container.id);

        let output = docker_output(&args)?;
        if output.status.success() {
            return Ok(());
        }

        let message = error_text(&output);
        if is_no_such_container(&message) {
            Err(DockerError::ContainerDoesNotExist(message))
        } else {
            Err(DockerError::ContainerRemovalFailed {
                container_id: container.id.clone(),
                message,
            })
        }
    }

    fn inspect_state(&self, container: &DockerContainer) -> Result<ContainerState, DockerError> {
        let output = docker_output(["inspect", "--format", "{{json .State}}", &container.id])?;
        if !output.status.success() {
            return Err(DockerError::HealthCheckFailed(error_text(&output)));
        }
        serde_json::from_slice(&output.stdout).map_err(|e| {
            DockerError::HealthCheckFailed(format!("could not parse container state: {e}"))
        })
    }
}

impl DockerClient for CliDockerClient {
    fn build(
        &self,
        build_directory: &Path,
        build_args: &BTreeMap<String, String>,
        image_tags: &BTreeSet<String>,
        on_progress: &mut dyn FnMut(DockerImageBuildProgress),
    ) -> Result<DockerImage, DockerError> {
        let mut args = vec!["build".to_string()];
        for (name, value) in build_args {
            args.push("--build-arg".into());
            args.push(format!("{name}={value}"));
        }
        for tag in image_tags {
            args.push("--tag".into());
            args.push(tag.clone());
        }
        args.push(build_directory.display().to_string());

        let mut image_id = None;
        // The classic builder prints `Step N/M : ...` lines we can follow.
        let result = stream(&args, &[("DOCKER_BUILDKIT", "0")], &mut |line| {
            if let OutputLine::Stdout(text) = line {
                if let Some(progress) = parse_build_step(text) {
                    on_progress(progress);
                } else if let Some(id) = parse_built_image_id(text) {
                    image_id = Some(id);
                }
            }
        })?;

        if !result.success {
            return Err(DockerError::ImageBuildFailed(result.log.trim().to_string()));
        }

        image_id.map(DockerImage::new).ok_or_else(|| {
            DockerError::ImageBuildFailed(format!(
                "the build finished without reporting an image ID:\n{}",
                result.log.trim()
            ))
        })
    }

    /// `docker pull` prints no byte counts when it is not attached to a
    /// terminal, so the only progress reported here is parsed from lines that
    /// happen to carry `done/total` sizes.
    fn pull(
        &self,
        image_name: &str,
        on_progress: &mut dyn FnMut(DockerImagePullProgress),
    ) -> Result<DockerImage, DockerError> {
        let args = vec!["pull".to_string(), image_name.to_string()];
        let result = stream(&args, &[], &mut |line| {
            if let OutputLine::Stdout(text) = line
                && let Some(progress) = parse_pull_progress(text)
            {
                on_progress(progress);
            }
        })?;

        if !result.success {
            return Err(DockerError::ImagePullFailed(result.log.trim().to_string()));
        }
        Ok(DockerImage::new(image_name))
    }

    fn create_new_bridge_network(&self) -> Result<DockerNetwork, DockerError> {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos())
            .unwrap_or_default();
        let name = format!("dockstep-{}-{nanos}", std::process::id());

        let output = docker_output(["network", "create", "--driver", "bridge", &name])?;
        if !output.status.success() {
            return Err(DockerError::NetworkCreationFailed(error_text(&output)));
        }
        Ok(DockerNetwork::new(stdout_text(&output)))
    }

    fn create(&self, request: &CreateContainerRequest) -> Result<DockerContainer, DockerError> {
        let output = docker_output(create_args(request))?;
        if !output.status.success() {
            return Err(DockerError::ContainerCreationFailed(error_text(&output)));
        }
        Ok(DockerContainer::new(stdout_text(&output)))
    }

    fn run(&self, container: &DockerContainer) -> Result<i32, DockerError> {
        tracing::debug!(container = %container.id, "attaching to container");
        let status = Command::new("docker")
            .args(["start", "--attach", "--interactive", &container.id])
            .stdin(Stdio::inherit())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .status()?;

        status.code().ok_or_else(|| {
            DockerError::Unexpected(format!(
                "docker was terminated while attached to container '{}'",
                container.id
            ))
        })
    }

    fn start(&self, container: &DockerContainer) -> Result<(), DockerError> {
        let output = docker_output(["start", &container.id])?;
        if !output.status.success() {
            return Err(DockerError::ContainerStartFailed {
                container_id: container.id.clone(),
                message: error_text(&output),
            });
        }
        Ok(())
    }

    fn stop(&self, container: &DockerContainer) -> Result<(), DockerError> {
        let output = docker_output(["stop", &container.id])?;
        if !output.status.success() {
            return Err(DockerError::ContainerStopFailed {
                container_id: container.id.clone(),
                message: error_text(&output),
            });
        }
        Ok(())
    }

    fn forcibly_remove(&self, container: &DockerContainer) -> Result<(), DockerError> {
        self.remove_with(container, &["--force", "--volumes"])
    }

    fn remove(&self, container: &DockerContainer) -> Result<(), DockerError> {
        self.remove_with(container, &["--volumes"])
    }

    fn wait_for_health_status(
        &self,
        container: &DockerContainer,
    ) -> Result<HealthStatus, DockerError> {
        let start = Instant::now();
        loop {
            let state = self.inspect_state(container)?;
            if let Some(status) = state.health_status() {
                return Ok(status);
            }
            if start.elapsed() > self.health_check_timeout {
                tracing::warn!(container = %container.id, "gave up waiting for health status");
                return Ok(HealthStatus::BecameUnhealthy);
            }
            std::thread::sleep(POLL_INTERVAL);
        }
    }

    fn delete_network(&self, network: &DockerNetwork) -> Result<(), DockerError> {
        let output = docker_output(["network", "rm", &network.id])?;
        if !output.status.success() {
            return Err(DockerError::NetworkDeletionFailed {
                network_id: network.id.clone(),
                message: error_text(&output),
            });
        }
        Ok(())
    }
}

/// The `State` object of `docker inspect`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ContainerState {
    running: bool,
    health: Option<HealthState>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct HealthState {
    status: String,
}

impl ContainerState {
    /// `None` while the health check is still undecided.
    fn health_status(&self) -> Option<HealthStatus> {
        let Some(health) = &self.health else {
            return Some(HealthStatus::NoHealthCheck);
        };
        if !self.running {
            return Some(HealthStatus::Exited);
        }
        match health.status.as_str() {
            "healthy" => Some(HealthStatus::BecameHealthy),
            "unhealthy" => Some(HealthStatus::BecameUnhealthy),
            _ => None,
        }
    }
}

fn create_args(request: &CreateContainerRequest) -> Vec<String> {
    let mut args = vec![
        "create".to_string(),
        "--network".into(),
        request.network.id.clone(),
        "--network-alias".into(),
        request.container.name.clone(),
        "--label".into(),
        format!("dockstep.container={}", request.container.name),
    ];
    if let Some(dir) = &request.working_directory {
        args.push("--workdir".into());
        args.push(dir.clone());
    }
    for (name, value) in &request.environment {
        args.push("--env".into());
        args.push(format!("{name}={value}"));
    }
    for volume in &request.volumes {
        args.push("--volume".into());
        args.push(volume.to_string());
    }
    for port in &request.ports {
        args.push("--publish".into());
        args.push(port.to_string());
    }
    args.push(request.image.id.clone());
    if let Some(command) = &request.command {
        args.extend(command.parsed().iter().cloned());
    }
    args
}

fn is_no_such_container(message: &str) -> bool {
    message.contains("No such container")
}

/// `Step 2/5 : COPY health-check.sh /tools/`
fn parse_build_step(line: &str) -> Option<DockerImageBuildProgress> {
    let rest = line.strip_prefix("Step ")?;
    let (counts, message) = rest.split_once(" : ")?;
    let (current, total) = counts.split_once('/')?;
    Some(DockerImageBuildProgress {
        current_step: current.trim().parse().ok()?,
        total_steps: total.trim().parse().ok()?,
        message: message.trim().to_string(),
        pull_progress: None,
    })
}

/// `Successfully built 0123456789ab`
fn parse_built_image_id(line: &str) -> Option<String> {
    let id = line.strip_prefix("Successfully built ")?.trim();
    (!id.is_empty()).then(|| id.to_string())
}

/// `abc123: Downloading 12/20` style lines: a status followed by `done/total`
/// byte counts.
fn parse_pull_progress(line: &str) -> Option<DockerImagePullProgress> {
    let (_, rest) = line.split_once(": ")?;
    let (status, counts) = rest.trim().rsplit_once(' ')?;
    let (done, total) = counts.split_once('/')?;
    Some(DockerImagePullProgress::new(
        status.trim().to_lowercase(),
        done.parse().ok()?,
        total.parse().ok()?,
    ))
}
