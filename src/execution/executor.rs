use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;
use std::sync::mpsc::Receiver;

use crate::docker::{DockerContainer, DockerImage, DockerNetwork};
use crate::model::{Container, CreateContainerRequest, Event, ImageSource, Step};

use super::plan::TaskPlan;
use super::runner::StepRunner;
use super::sink::EventBus;

/// How a task ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskOutcome {
    pub exit_code: i32,
    pub failure: Option<String>,
}

/// Runs every step of a plan in order, one at a time, posting through the bus.
///
/// The first failure stops startup. Whatever was created is then cleaned up,
/// and the task finishes with exit code 1.
pub struct TaskExecutor {
    runner: StepRunner,
    bus: Arc<EventBus>,
}

impl TaskExecutor {
    pub fn new(runner: StepRunner, bus: Arc<EventBus>) -> Self {
        Self { runner, bus }
    }

    pub fn execute(&self, plan: &TaskPlan) -> TaskOutcome {
        tracing::info!(task = plan.task_name(), "task starting");

        let mut run = TaskRun {
            runner: &self.runner,
            bus: &self.bus,
            events: self.bus.channel(),
            images: HashMap::new(),
            network: None,
            created: Vec::new(),
            failure: None,
        };

        let exit_code = run.start_up(plan);
        run.clean_up();

        let outcome = match run.failure.take() {
            Some(message) => {
                run.step(Step::DisplayTaskFailure {
                    message: message.clone(),
                });
                TaskOutcome {
                    exit_code: 1,
                    failure: Some(message),
                }
            }
            None => TaskOutcome {
                exit_code: exit_code.unwrap_or(1),
                failure: None,
            },
        };
        run.step(Step::FinishTask {
            exit_code: outcome.exit_code,
        });

        tracing::info!(
            task = plan.task_name(),
            exit_code = outcome.exit_code,
            "task finished"
        );
        outcome
    }
}

struct CreatedContainer {
    container: Arc<Container>,
    docker_container: DockerContainer,
    started: bool,
}

/// What makes two prepared images interchangeable: the source plus, for
/// builds, the build arguments.
type ImageKey = (ImageSource, BTreeMap<String, String>);

fn image_key(container: &Container) -> ImageKey {
    let build_args = match container.image_source {
        ImageSource::BuildImage(_) => container.build_args.clone(),
        ImageSource::PullImage(_) => BTreeMap::new(),
    };
    (container.image_source.clone(), build_args)
}

/// State for one execution of a plan.
struct TaskRun<'a> {
    runner: &'a StepRunner,
    bus: &'a EventBus,
    events: Receiver<Event>,
    images: HashMap<ImageKey, DockerImage>,
    network: Option<DockerNetwork>,
    created: Vec<CreatedContainer>,
    failure: Option<String>,
}

impl TaskRun<'_> {
    /// Runs one step and returns the events it posted, or `None` if the step
    /// failed. Only the first failure is kept.
    fn step(&mut self, step: Step) -> Option<Vec<Event>> {
        self.bus.notify_step_starting(&step);

        if let Err(err) = self.runner.run(&step, self.bus) {
            tracing::error!(%step, error = %err, "step failed unexpectedly");
            self.fail(format!(
                "An unexpected error occurred while trying to {step}: {err}"
            ));
            return None;
        }

        let events: Vec<Event> = self.events.try_iter().collect();
        if let Some(message) = events.iter().find_map(failure_text) {
            self.fail(message);
            return None;
        }
        Some(events)
    }

    fn fail(&mut self, message: String) {
        tracing::warn!(%message, "task step failed");
        if self.failure.is_none() {
            self.failure = Some(message);
        }
    }

    /// Returns the task container's exit code if it got as far as running.
    fn start_up(&mut self, plan: &TaskPlan) -> Option<i32> {
        self.step(Step::BeginTask)?;

        let network = self
            .step(Step::CreateTaskNetwork)?
            .into_iter()
            .find_map(|event| match event {
                Event::TaskNetworkCreated { network } => Some(network),
                _ => None,
            })?;
        self.network = Some(network.clone());

        for container in plan.containers() {
            let image = self.prepare_image(plan, container)?;
            let is_task = plan.is_task_container(container);
            let command = if is_task {
                plan.command().cloned()
            } else {
                None
            };

            let request = CreateContainerRequest::for_container(
                container.clone(),
                command,
                image,
                network.clone(),
            );
            let docker_container = self
                .step(Step::CreateContainer(request))?
                .into_iter()
                .find_map(|event| match event {
                    Event::ContainerCreated {
                        docker_container, ..
                    } => Some(docker_container),
                    _ => None,
                })?;
            self.created.push(CreatedContainer {
                container: container.clone(),
                docker_container: docker_container.clone(),
                started: false,
            });

            if is_task {
                return self
                    .step(Step::RunContainer {
                        container: container.clone(),
                        docker_container,
                    })?
                    .into_iter()
                    .find_map(|event| match event {
                        Event::RunningContainerExited { exit_code, .. } => Some(exit_code),
                        _ => None,
                    });
            }

            self.step(Step::StartContainer {
                container: container.clone(),
                docker_container: docker_container.clone(),
            })?;
            if let Some(created) = self.created.last_mut() {
                created.started = true;
            }
            self.step(Step::WaitForContainerToBecomeHealthy {
                container: container.clone(),
                docker_container,
            })?;
        }

        None
    }

    /// Builds or pulls the container's image, once per distinct source and
    /// set of build arguments.
    fn prepare_image(&mut self, plan: &TaskPlan, container: &Container) -> Option<DockerImage> {
        let key = image_key(container);
        if let Some(image) = self.images.get(&key) {
            return Some(image.clone());
        }

        let step = match &container.image_source {
            ImageSource::BuildImage(build_directory) => Step::BuildImage {
                build_directory: build_directory.clone(),
                build_args: container.build_args.clone(),
                image_tags: BTreeSet::from([plan.image_tag_for(container)]),
            },
            ImageSource::PullImage(image_name) => Step::PullImage {
                image_name: image_name.clone(),
            },
        };

        let image = self.step(step)?.into_iter().find_map(|event| match event {
            Event::ImageBuilt { image, .. } | Event::ImagePulled { image } => Some(image),
            _ => None,
        })?;
        self.images.insert(key, image.clone());
        Some(image)
    }

    /// Tears down in reverse creation order. After a failure, containers are
    /// forcibly removed instead of stopped.
    fn clean_up(&mut self) {
        while let Some(created) = self.created.pop() {
            let CreatedContainer {
                container,
                docker_container,
                started,
            } = created;

            let stopped = self.failure.is_none()
                && (!started
                    || self
                        .step(Step::StopContainer {
                            container: container.clone(),
                            docker_container: docker_container.clone(),
                        })
                        .is_some());

            let removal = if stopped {
                Step::RemoveContainer {
                    container,
                    docker_container,
                }
            } else {
                Step::CleanUpContainer {
                    container,
                    docker_container,
                }
            };
            self.step(removal);
        }

        if let Some(network) = self.network.take() {
            self.step(Step::DeleteTaskNetwork { network });
        }
    }
}

/// What to tell the user when `event` reports a failure.
fn failure_text(event: &Event) -> Option<String> {
    let message = event.failure_message()?;
    let text = match event {
        Event::ImageBuildFailed {
            build_directory, ..
        } => format!(
            "Could not build image from directory '{}': {message}",
            build_directory.display()
        ),
        Event::ImagePullFailed { image_name, .. } => {
            format!("Could not pull image '{image_name}': {message}")
        }
        Event::TaskNetworkCreationFailed { .. } => {
            format!("Could not create network for task: {message}")
        }
        Event::ContainerCreationFailed { container, .. } => {
            format!("Could not create container '{}': {message}", container.name)
        }
        Event::ContainerStartFailed { container, .. } => {
            format!("Could not start container '{}': {message}", container.name)
        }
        Event::ContainerStopFailed { container, .. } => {
            format!("Could not stop container '{}': {message}", container.name)
        }
        Event::ContainerRemovalFailed { container, .. } => {
            format!("Could not remove container '{}': {message}", container.name)
        }
        Event::ContainerDidNotBecomeHealthy { container, .. } => {
            format!("Container '{}' did not become healthy: {message}", container.name)
        }
        Event::TaskNetworkDeletionFailed { .. } => {
            format!("Could not delete the task network: {message}")
        }
        _ => message,
    };
    Some(text)
}
