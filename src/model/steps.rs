use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use crate::docker::{DockerContainer, DockerImage, DockerNetwork};

use super::container::{Command, Container, PortMapping, VolumeMount};

/// Everything the daemon needs to create one container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateContainerRequest {
    pub container: Arc<Container>,
    pub command: Option<Command>,
    pub working_directory: Option<String>,
    pub environment: BTreeMap<String, String>,
    pub volumes: Vec<VolumeMount>,
    pub ports: Vec<PortMapping>,
    pub image: DockerImage,
    pub network: DockerNetwork,
}

impl CreateContainerRequest {
    /// Request built from the container's own configuration.
    pub fn for_container(
        container: Arc<Container>,
        command: Option<Command>,
        image: DockerImage,
        network: DockerNetwork,
    ) -> Self {
        Self {
            command: command.or_else(|| container.command.clone()),
            working_directory: container.working_directory.clone(),
            environment: container.environment.clone(),
            volumes: container.volumes.clone(),
            ports: container.ports.clone(),
            container,
            image,
            network,
        }
    }
}

/// One operation requested by the planner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    BeginTask,
    BuildImage {
        build_directory: PathBuf,
        build_args: BTreeMap<String, String>,
        image_tags: BTreeSet<String>,
    },
    PullImage {
        image_name: String,
    },
    CreateTaskNetwork,
    CreateContainer(CreateContainerRequest),
    RunContainer {
        container: Arc<Container>,
        docker_container: DockerContainer,
    },
    StartContainer {
        container: Arc<Container>,
        docker_container: DockerContainer,
    },
    StopContainer {
        container: Arc<Container>,
        docker_container: DockerContainer,
    },
    CleanUpContainer {
        container: Arc<Container>,
        docker_container: DockerContainer,
    },
    RemoveContainer {
        container: Arc<Container>,
        docker_container: DockerContainer,
    },
    WaitForContainerToBecomeHealthy {
        container: Arc<Container>,
        docker_container: DockerContainer,
    },
    DeleteTaskNetwork {
        network: DockerNetwork,
    },
    DisplayTaskFailure {
        message: String,
    },
    FinishTask {
        exit_code: i32,
    },
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Step::BeginTask => f.write_str("begin task"),
            Step::BuildImage {
                build_directory, ..
            } => write!(f, "build image (build directory: '{}')", build_directory.display()),
            Step::PullImage { image_name } => write!(f, "pull image (image: '{image_name}')"),
            Step::CreateTaskNetwork => f.write_str("create task network"),
            Step::CreateContainer(request) => write!(
                f,
                "create container (container: '{}', image: '{}', network: '{}')",
                request.container.name, request.image.id, request.network.id
            ),
            Step::RunContainer {
                container,
                docker_container,
            } => write!(f, "run container '{}' ({})", container.name, docker_container.id),
            Step::StartContainer {
                container,
                docker_container,
            } => write!(f, "start container '{}' ({})", container.name, docker_container.id),
            Step::StopContainer {
                container,
                docker_container,
            } => write!(f, "stop container '{}' ({})", container.name, docker_container.id),
            Step::CleanUpContainer {
                container,
                docker_container,
            } => write!(f, "clean up container '{}' ({})", container.name, docker_container.id),
            Step::RemoveContainer {
                container,
                docker_container,
            } => write!(f, "remove container '{}' ({})", container.name, docker_container.id),
            Step::WaitForContainerToBecomeHealthy {
                container,
                docker_container,
            } => write!(
                f,
                "wait for container '{}' ({}) to become healthy",
                container.name, docker_container.id
            ),
            Step::DeleteTaskNetwork { network } => {
                write!(f, "delete task network '{}'", network.id)
            }
            Step::DisplayTaskFailure { message } => write!(f, "display task failure: {message}"),
            Step::FinishTask { exit_code } => write!(f, "finish task (exit code: {exit_code})"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ImageSource;

    #[test]
    fn create_request_falls_back_to_configured_command() {
        let mut container = Container::new("app", ImageSource::BuildImage("/app".into()));
        container.command = Some(Command::parse("cargo test").unwrap());
        container.working_directory = Some("/code".into());
        let container = Arc::new(container);

        let request = CreateContainerRequest::for_container(
            container.clone(),
            None,
            DockerImage::new("img"),
            DockerNetwork::new("net"),
        );
        assert_eq!(request.command, container.command);
        assert_eq!(request.working_directory.as_deref(), Some("/code"));

        let overridden = CreateContainerRequest::for_container(
            container,
            Some(Command::parse("cargo build").unwrap()),
            DockerImage::new("img"),
            DockerNetwork::new("net"),
        );
        assert_eq!(
            overridden.command.map(|c| c.original().to_string()),
            Some("cargo build".to_string())
        );
    }

    #[test]
    fn step_display_is_readable() {
        let step = Step::PullImage {
            image_name: "postgres:16".into(),
        };
        assert_eq!(step.to_string(), "pull image (image: 'postgres:16')");
        assert_eq!(
            Step::FinishTask { exit_code: 3 }.to_string(),
            "finish task (exit code: 3)"
        );
    }
}
