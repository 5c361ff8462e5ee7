use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use crate::model::CreateContainerRequest;

use super::types::{
    DockerContainer, DockerError, DockerImage, DockerImageBuildProgress, DockerImagePullProgress,
    DockerNetwork, HealthStatus,
};

/// Operations the container runtime daemon offers.
///
/// Implementations must be safe to call from several threads at once. Each
/// method lists the [`DockerError`] variant it reports for an expected
/// failure; any other variant is treated as an unexpected fault by callers.
pub trait DockerClient: Send + Sync {
    /// Fails with [`DockerError::ImageBuildFailed`].
    fn build(
        &self,
        build_directory: &Path,
        build_args: &BTreeMap<String, String>,
        image_tags: &BTreeSet<String>,
        on_progress: &mut dyn FnMut(DockerImageBuildProgress),
    ) -> Result<DockerImage, DockerError>;

    /// Fails with [`DockerError::ImagePullFailed`].
    fn pull(
        &self,
        image_name: &str,
        on_progress: &mut dyn FnMut(DockerImagePullProgress),
    ) -> Result<DockerImage, DockerError>;

    /// Fails with [`DockerError::NetworkCreationFailed`].
    fn create_new_bridge_network(&self) -> Result<DockerNetwork, DockerError>;

    /// Fails with [`DockerError::ContainerCreationFailed`].
    fn create(&self, request: &CreateContainerRequest) -> Result<DockerContainer, DockerError>;

    /// Runs the container attached and returns its exit code. No failure is
    /// expected here.
    fn run(&self, container: &DockerContainer) -> Result<i32, DockerError>;

    /// Fails with [`DockerError::ContainerStartFailed`].
    fn start(&self, container: &DockerContainer) -> Result<(), DockerError>;

    /// Fails with [`DockerError::ContainerStopFailed`].
    fn stop(&self, container: &DockerContainer) -> Result<(), DockerError>;

    /// Fails with [`DockerError::ContainerRemovalFailed`] or
    /// [`DockerError::ContainerDoesNotExist`].
    fn forcibly_remove(&self, container: &DockerContainer) -> Result<(), DockerError>;

    /// Fails with [`DockerError::ContainerRemovalFailed`] or
    /// [`DockerError::ContainerDoesNotExist`].
    fn remove(&self, container: &DockerContainer) -> Result<(), DockerError>;

    /// Blocks until the health check settles. Fails with
    /// [`DockerError::HealthCheckFailed`].
    fn wait_for_health_status(
        &self,
        container: &DockerContainer,
    ) -> Result<HealthStatus, DockerError>;

    /// Fails with [`DockerError::NetworkDeletionFailed`].
    fn delete_network(&self, network: &DockerNetwork) -> Result<(), DockerError>;
}
