use std::sync::Arc;

use crate::docker::{DockerClient, DockerError, HealthStatus};
use crate::model::{Container, Event, Step};

use super::sink::EventSink;

/// Executes single steps against the daemon and reports their outcome as events.
///
/// Expected failures become `*Failed` events. Any other fault from the daemon
/// (including every fault while running a container) is returned as `Err`
/// and nothing is posted for it.
#[derive(Clone)]
pub struct StepRunner {
    docker: Arc<dyn DockerClient>,
}

impl StepRunner {
    pub fn new(docker: Arc<dyn DockerClient>) -> Self {
        Self { docker }
    }

    pub fn run(&self, step: &Step, sink: &dyn EventSink) -> Result<(), DockerError> {
        match step {
            Step::BeginTask => sink.post_event(Event::TaskStarted),

            Step::BuildImage {
                build_directory,
                build_args,
                image_tags,
            } => {
                let result = self.docker.build(
                    build_directory,
                    build_args,
                    image_tags,
                    &mut |progress| {
                        sink.post_event(Event::ImageBuildProgress {
                            build_directory: build_directory.clone(),
                            progress,
                        })
                    },
                );
                match result {
                    Ok(image) => sink.post_event(Event::ImageBuilt {
                        build_directory: build_directory.clone(),
                        image,
                    }),
                    Err(DockerError::ImageBuildFailed(output)) => {
                        sink.post_event(Event::ImageBuildFailed {
                            build_directory: build_directory.clone(),
                            message: format!(
                                "Image build failed. Output from Docker was: {output}"
                            ),
                        })
                    }
                    Err(other) => return Err(other),
                }
            }

            Step::PullImage { image_name } => {
                let result = self.docker.pull(image_name, &mut |progress| {
                    sink.post_event(Event::ImagePullProgress {
                        image_name: image_name.clone(),
                        progress,
                    })
                });
                match result {
                    Ok(image) => sink.post_event(Event::ImagePulled { image }),
                    Err(DockerError::ImagePullFailed(message)) => {
                        sink.post_event(Event::ImagePullFailed {
                            image_name: image_name.clone(),
                            message,
                        })
                    }
                    Err(other) => return Err(other),
                }
            }

            Step::CreateTaskNetwork => match self.docker.create_new_bridge_network() {
                Ok(network) => sink.post_event(Event::TaskNetworkCreated { network }),
                Err(DockerError::NetworkCreationFailed(message)) => {
                    sink.post_event(Event::TaskNetworkCreationFailed { message })
                }
                Err(other) => return Err(other),
            },

            Step::CreateContainer(request) => match self.docker.create(request) {
                Ok(docker_container) => sink.post_event(Event::ContainerCreated {
                    container: request.container.clone(),
                    docker_container,
                }),
                Err(DockerError::ContainerCreationFailed(message)) => {
                    sink.post_event(Event::ContainerCreationFailed {
                        container: request.container.clone(),
                        message,
                    })
                }
                Err(other) => return Err(other),
            },

            Step::RunContainer {
                container,
                docker_container,
            } => {
                let exit_code = self.docker.run(docker_container)?;
                sink.post_event(Event::RunningContainerExited {
                    container: container.clone(),
                    exit_code,
                });
            }

            Step::StartContainer {
                container,
                docker_container,
            } => match self.docker.start(docker_container) {
                Ok(()) => sink.post_event(Event::ContainerStarted {
                    container: container.clone(),
                }),
                Err(DockerError::ContainerStartFailed { message, .. }) => {
                    sink.post_event(Event::ContainerStartFailed {
                        container: container.clone(),
                        message,
                    })
                }
                Err(other) => return Err(other),
            },

            Step::StopContainer {
                container,
                docker_container,
            } => match self.docker.stop(docker_container) {
                Ok(()) => sink.post_event(Event::ContainerStopped {
                    container: container.clone(),
                }),
                Err(DockerError::ContainerStopFailed { message, .. }) => {
                    sink.post_event(Event::ContainerStopFailed {
                        container: container.clone(),
                        message,
                    })
                }
                Err(other) => return Err(other),
            },

            Step::CleanUpContainer {
                container,
                docker_container,
            } => {
                let result = self.docker.forcibly_remove(docker_container);
                sink.post_event(removal_event(container, result)?);
            }

            Step::RemoveContainer {
                container,
                docker_container,
            } => {
                let result = self.docker.remove(docker_container);
                sink.post_event(removal_event(container, result)?);
            }

            Step::WaitForContainerToBecomeHealthy {
                container,
                docker_container,
            } => {
                let unhealthy = |message: &str| Event::ContainerDidNotBecomeHealthy {
                    container: container.clone(),
                    message: message.to_string(),
                };
                let event = match self.docker.wait_for_health_status(docker_container) {
                    Ok(HealthStatus::NoHealthCheck | HealthStatus::BecameHealthy) => {
                        Event::ContainerBecameHealthy {
                            container: container.clone(),
                        }
                    }
                    Ok(HealthStatus::BecameUnhealthy) => unhealthy(
                        "The configured health check did not report the container as healthy within the timeout period.",
                    ),
                    Ok(HealthStatus::Exited) => {
                        unhealthy("The container exited before becoming healthy.")
                    }
                    Err(DockerError::HealthCheckFailed(message)) => unhealthy(&format!(
                        "Waiting for the container's health status failed: {message}"
                    )),
                    Err(other) => return Err(other),
                };
                sink.post_event(event);
            }

            Step::DeleteTaskNetwork { network } => match self.docker.delete_network(network) {
                Ok(()) => sink.post_event(Event::TaskNetworkDeleted),
                Err(DockerError::NetworkDeletionFailed { message, .. }) => {
                    sink.post_event(Event::TaskNetworkDeletionFailed { message })
                }
                Err(other) => return Err(other),
            },

            Step::DisplayTaskFailure { .. } | Step::FinishTask { .. } => {}
        }

        Ok(())
    }
}

/// A container that is already gone counts as removed.
fn removal_event(
    container: &Arc<Container>,
    result: Result<(), DockerError>,
) -> Result<Event, DockerError> {
    match result {
        Ok(()) | Err(DockerError::ContainerDoesNotExist(_)) => Ok(Event::ContainerRemoved {
            container: container.clone(),
        }),
        Err(DockerError::ContainerRemovalFailed { message, .. }) => {
            Ok(Event::ContainerRemovalFailed {
                container: container.clone(),
                message,
            })
        }
        Err(other) => Err(other),
    }
}
