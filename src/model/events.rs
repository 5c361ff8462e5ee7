use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use crate::docker::{
    DockerContainer, DockerImage, DockerImageBuildProgress, DockerImagePullProgress, DockerNetwork,
};

use super::container::Container;

/// An immutable fact about the task: the outcome of a step, or progress
/// reported while one runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    TaskStarted,
    ImageBuildProgress {
        build_directory: PathBuf,
        progress: DockerImageBuildProgress,
    },
    ImageBuilt {
        build_directory: PathBuf,
        image: DockerImage,
    },
    ImageBuildFailed {
        build_directory: PathBuf,
        message: String,
    },
    ImagePullProgress {
        image_name: String,
        progress: DockerImagePullProgress,
    },
    ImagePulled {
        image: DockerImage,
    },
    ImagePullFailed {
        image_name: String,
        message: String,
    },
    TaskNetworkCreated {
        network: DockerNetwork,
    },
    TaskNetworkCreationFailed {
        message: String,
    },
    ContainerCreated {
        container: Arc<Container>,
        docker_container: DockerContainer,
    },
    ContainerCreationFailed {
        container: Arc<Container>,
        message: String,
    },
    RunningContainerExited {
        container: Arc<Container>,
        exit_code: i32,
    },
    ContainerStarted {
        container: Arc<Container>,
    },
    ContainerStartFailed {
        container: Arc<Container>,
        message: String,
    },
    ContainerStopped {
        container: Arc<Container>,
    },
    ContainerStopFailed {
        container: Arc<Container>,
        message: String,
    },
    ContainerRemoved {
        container: Arc<Container>,
    },
    ContainerRemovalFailed {
        container: Arc<Container>,
        message: String,
    },
    ContainerBecameHealthy {
        container: Arc<Container>,
    },
    ContainerDidNotBecomeHealthy {
        container: Arc<Container>,
        message: String,
    },
    TaskNetworkDeleted,
    TaskNetworkDeletionFailed {
        message: String,
    },
}

impl Event {
    /// The failure message carried by a `*Failed` event, if this is one.
    pub fn failure_message(&self) -> Option<String> {
        match self {
            Event::ImageBuildFailed { message, .. }
            | Event::ImagePullFailed { message, .. }
            | Event::TaskNetworkCreationFailed { message }
            | Event::ContainerCreationFailed { message, .. }
            | Event::ContainerStartFailed { message, .. }
            | Event::ContainerStopFailed { message, .. }
            | Event::ContainerRemovalFailed { message, .. }
            | Event::ContainerDidNotBecomeHealthy { message, .. }
            | Event::TaskNetworkDeletionFailed { message } => Some(message.clone()),
            Event::TaskStarted
            | Event::ImageBuildProgress { .. }
            | Event::ImageBuilt { .. }
            | Event::ImagePullProgress { .. }
            | Event::ImagePulled { .. }
            | Event::TaskNetworkCreated { .. }
            | Event::ContainerCreated { .. }
            | Event::RunningContainerExited { .. }
            | Event::ContainerStarted { .. }
            | Event::ContainerStopped { .. }
            | Event::ContainerRemoved { .. }
            | Event::ContainerBecameHealthy { .. }
            | Event::TaskNetworkDeleted => None,
        }
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Event::TaskStarted => f.write_str("task started"),
            Event::ImageBuildProgress {
                build_directory,
                progress,
            } => {
                write!(
                    f,
                    "image build progress (build directory: '{}', current step: {}, total steps: {}, message: '{}', pull progress: ",
                    build_directory.display(),
                    progress.current_step,
                    progress.total_steps,
                    progress.message
                )?;
                match &progress.pull_progress {
                    Some(pull) => write!(f, "'{pull}')"),
                    None => f.write_str("none)"),
                }
            }
            Event::ImageBuilt {
                build_directory,
                image,
            } => write!(
                f,
                "image built (build directory: '{}', image: '{}')",
                build_directory.display(),
                image.id
            ),
            Event::ImageBuildFailed {
                build_directory,
                message,
            } => write!(
                f,
                "image build failed (build directory: '{}', message: '{message}')",
                build_directory.display()
            ),
            Event::ImagePullProgress {
                image_name,
                progress,
            } => write!(
                f,
                "image pull progress (image: '{image_name}', progress: '{progress}')"
            ),
            Event::ImagePulled { image } => write!(f, "image pulled (image: '{}')", image.id),
            Event::ImagePullFailed {
                image_name,
                message,
            } => write!(
                f,
                "image pull failed (image: '{image_name}', message: '{message}')"
            ),
            Event::TaskNetworkCreated { network } => {
                write!(f, "task network created (network: '{}')", network.id)
            }
            Event::TaskNetworkCreationFailed { message } => {
                write!(f, "task network creation failed (message: '{message}')")
            }
            Event::ContainerCreated {
                container,
                docker_container,
            } => write!(
                f,
                "container created (container: '{}', docker container: '{}')",
                container.name, docker_container.id
            ),
            Event::ContainerCreationFailed { container, message } => write!(
                f,
                "container creation failed (container: '{}', message: '{message}')",
                container.name
            ),
            Event::RunningContainerExited {
                container,
                exit_code,
            } => write!(
                f,
                "running container exited (container: '{}', exit code: {exit_code})",
                container.name
            ),
            Event::ContainerStarted { container } => {
                write!(f, "container started (container: '{}')", container.name)
            }
            Event::ContainerStartFailed { container, message } => write!(
                f,
                "container start failed (container: '{}', message: '{message}')",
                container.name
            ),
            Event::ContainerStopped { container } => {
                write!(f, "container stopped (container: '{}')", container.name)
            }
            Event::ContainerStopFailed { container, message } => write!(
                f,
                "container stop failed (container: '{}', message: '{message}')",
                container.name
            ),
            Event::ContainerRemoved { container } => {
                write!(f, "container removed (container: '{}')", container.name)
            }
            Event::ContainerRemovalFailed { container, message } => write!(
                f,
                "container removal failed (container: '{}', message: '{message}')",
                container.name
            ),
            Event::ContainerBecameHealthy { container } => {
                write!(f, "container became healthy (container: '{}')", container.name)
            }
            Event::ContainerDidNotBecomeHealthy { container, message } => write!(
                f,
                "container did not become healthy (container: '{}', message: '{message}')",
                container.name
            ),
            Event::TaskNetworkDeleted => f.write_str("task network deleted"),
            Event::TaskNetworkDeletionFailed { message } => {
                write!(f, "task network deletion failed (message: '{message}')")
            }
        }
    }
}
