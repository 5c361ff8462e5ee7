use std::fmt;

use thiserror::Error;

use crate::text;

/// An image known to the daemon. For pulled images the id is the image name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DockerImage {
    pub id: String,
}

impl DockerImage {
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into() }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DockerNetwork {
    pub id: String,
}

impl DockerNetwork {
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into() }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DockerContainer {
    pub id: String,
}

impl DockerContainer {
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into() }
    }
}

/// Byte-level progress of an image layer download.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DockerImagePullProgress {
    pub status: String,
    pub bytes_done: u64,
    pub bytes_total: u64,
}

impl DockerImagePullProgress {
    pub fn new(status: impl Into<String>, bytes_done: u64, bytes_total: u64) -> Self {
        Self {
            status: status.into(),
            bytes_done,
            bytes_total,
        }
    }
}

impl fmt::Display for DockerImagePullProgress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&text::byte_progress(
            &self.status,
            self.bytes_done,
            self.bytes_total,
        ))
    }
}

/// Which build step the daemon is on, plus any base-image download detail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DockerImageBuildProgress {
    pub current_step: u32,
    pub total_steps: u32,
    pub message: String,
    pub pull_progress: Option<DockerImagePullProgress>,
}

/// Terminal result of waiting on a container's health check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HealthStatus {
    NoHealthCheck,
    BecameHealthy,
    BecameUnhealthy,
    Exited,
}

/// Faults raised by the daemon client. Each operation documents which
/// variants it may return; anything else is `Unexpected`.
#[derive(Debug, Error)]
pub enum DockerError {
    #[error("image build failed: {0}")]
    ImageBuildFailed(String),
    #[error("image pull failed: {0}")]
    ImagePullFailed(String),
    #[error("network creation failed: {0}")]
    NetworkCreationFailed(String),
    #[error("container creation failed: {0}")]
    ContainerCreationFailed(String),
    #[error("starting container '{container_id}' failed: {message}")]
    ContainerStartFailed {
        container_id: String,
        message: String,
    },
    #[error("stopping container '{container_id}' failed: {message}")]
    ContainerStopFailed {
        container_id: String,
        message: String,
    },
    #[error("removing container '{container_id}' failed: {message}")]
    ContainerRemovalFailed {
        container_id: String,
        message: String,
    },
    #[error("container does not exist: {0}")]
    ContainerDoesNotExist(String),
    #[error("health check failed: {0}")]
    HealthCheckFailed(String),
    #[error("deleting network '{network_id}' failed: {message}")]
    NetworkDeletionFailed {
        network_id: String,
        message: String,
    },
    #[error("unexpected docker failure: {0}")]
    Unexpected(String),
    #[error("failed to invoke docker: {0}")]
    Io(#[from] std::io::Error),
}
