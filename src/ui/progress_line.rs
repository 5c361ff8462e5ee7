use std::collections::BTreeSet;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::docker::{DockerImageBuildProgress, DockerImagePullProgress};
use crate::execution::TaskObserver;
use crate::model::{Command, Container, Event, ImageSource, Step};
use crate::text;

/// Coarse state of a line, used for colouring.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartupStatus {
    Waiting,
    Working,
    Running,
}

/// Everything this line has learnt so far. Every field only ever moves forward.
#[derive(Debug, Default)]
struct LineState {
    building: bool,
    build_progress: Option<DockerImageBuildProgress>,
    pulling: bool,
    pull_progress: Option<DockerImagePullProgress>,
    image_ready: bool,
    network_ready: bool,
    creating: bool,
    command: Option<Command>,
    created: bool,
    /// Indices into `ContainerStartupProgressLine::dependencies`.
    healthy_dependencies: BTreeSet<usize>,
    starting: bool,
    started: bool,
    running: bool,
    healthy: bool,
}

/// Live startup status of one container, derived from step-starting
/// notifications and posted events.
///
/// Notifications about other containers, images or build directories are
/// ignored. All state sits behind one lock, so [`print`](Self::print) never
/// sees a notification half applied.
pub struct ContainerStartupProgressLine {
    container: Arc<Container>,
    dependencies: Vec<Arc<Container>>,
    state: Mutex<LineState>,
}

impl ContainerStartupProgressLine {
    pub fn new(container: Arc<Container>, dependencies: Vec<Arc<Container>>) -> Self {
        Self {
            container,
            dependencies,
            state: Mutex::new(LineState::default()),
        }
    }

    pub fn container(&self) -> &Arc<Container> {
        &self.container
    }

    pub fn on_step_starting(&self, step: &Step) {
        let mut state = self.lock();
        match step {
            Step::BuildImage {
                build_directory, ..
            } if self.builds_from(build_directory) => state.building = true,
            Step::PullImage { image_name } if self.pulls(image_name) => state.pulling = true,
            Step::CreateContainer(request) if request.container == self.container => {
                state.creating = true;
                state.command = request.command.clone();
            }
            Step::StartContainer { container, .. } if *container == self.container => {
                state.starting = true
            }
            Step::RunContainer { container, .. } if *container == self.container => {
                state.running = true
            }
            Step::BeginTask
            | Step::BuildImage { .. }
            | Step::PullImage { .. }
            | Step::CreateTaskNetwork
            | Step::CreateContainer(_)
            | Step::RunContainer { .. }
            | Step::StartContainer { .. }
            | Step::StopContainer { .. }
            | Step::CleanUpContainer { .. }
            | Step::RemoveContainer { .. }
            | Step::WaitForContainerToBecomeHealthy { .. }
            | Step::DeleteTaskNetwork { .. }
            | Step::DisplayTaskFailure { .. }
            | Step::FinishTask { .. } => {}
        }
    }

    pub fn on_event_posted(&self, event: &Event) {
        let mut state = self.lock();
        match event {
            Event::ImageBuildProgress {
                build_directory,
                progress,
            } if self.builds_from(build_directory) => {
                state.building = true;
                state.build_progress = Some(progress.clone());
            }
            Event::ImageBuilt {
                build_directory, ..
            } if self.builds_from(build_directory) => state.image_ready = true,
            Event::ImagePullProgress {
                image_name,
                progress,
            } if self.pulls(image_name) => {
                state.pulling = true;
                state.pull_progress = Some(progress.clone());
            }
            Event::ImagePulled { image } if self.pulls(&image.id) => state.image_ready = true,
            Event::TaskNetworkCreated { .. } => state.network_ready = true,
            Event::ContainerCreated { container, .. } if *container == self.container => {
                state.created = true
            }
            Event::ContainerStarted { container } if *container == self.container => {
                state.started = true
            }
            Event::ContainerBecameHealthy { container } => {
                if *container == self.container {
                    state.healthy = true;
                } else if let Some(index) = self.dependencies.iter().position(|d| d == container)
                {
                    state.healthy_dependencies.insert(index);
                }
            }
            Event::TaskStarted
            | Event::ImageBuildProgress { .. }
            | Event::ImageBuilt { .. }
            | Event::ImageBuildFailed { .. }
            | Event::ImagePullProgress { .. }
            | Event::ImagePulled { .. }
            | Event::ImagePullFailed { .. }
            | Event::TaskNetworkCreationFailed { .. }
            | Event::ContainerCreated { .. }
            | Event::ContainerCreationFailed { .. }
            | Event::RunningContainerExited { .. }
            | Event::ContainerStarted { .. }
            | Event::ContainerStartFailed { .. }
            | Event::ContainerStopped { .. }
            | Event::ContainerStopFailed { .. }
            | Event::ContainerRemoved { .. }
            | Event::ContainerRemovalFailed { .. }
            | Event::ContainerDidNotBecomeHealthy { .. }
            | Event::TaskNetworkDeleted
            | Event::TaskNetworkDeletionFailed { .. } => {}
        }
    }

    /// `"{name}: {description}"`
    pub fn print(&self) -> String {
        format!("{}: {}", self.container.name, self.describe())
    }

    /// The status text without the container name.
    pub fn describe(&self) -> String {
        let state = self.lock();

        if state.healthy || state.running {
            return match &state.command {
                Some(command) => format!("running {command}"),
                None => "running".to_string(),
            };
        }
        if state.started {
            return "container started, waiting for it to become healthy...".to_string();
        }
        if state.starting {
            return "starting container...".to_string();
        }
        if state.created {
            return self.describe_waiting_to_start(&state);
        }
        if state.creating {
            return "creating container...".to_string();
        }
        if state.image_ready {
            let image_done = match self.container.image_source {
                ImageSource::BuildImage(_) => "image built",
                ImageSource::PullImage(_) => "image pulled",
            };
            return if state.network_ready {
                format!("{image_done}, ready to create container")
            } else {
                format!("{image_done}, waiting for network to be ready...")
            };
        }

        match &self.container.image_source {
            ImageSource::BuildImage(_) if state.building => match &state.build_progress {
                Some(progress) => describe_build_progress(progress),
                None => "building image...".to_string(),
            },
            ImageSource::PullImage(image_name) if state.pulling => match &state.pull_progress {
                Some(progress) => format!("pulling {image_name}: {progress}"),
                None => format!("pulling {image_name}..."),
            },
            ImageSource::BuildImage(_) => "ready to build image".to_string(),
            ImageSource::PullImage(_) => "ready to pull image".to_string(),
        }
    }

    pub fn status(&self) -> StartupStatus {
        let state = self.lock();
        if state.healthy || state.running {
            StartupStatus::Running
        } else if state.building || state.pulling || state.creating || state.starting {
            StartupStatus::Working
        } else {
            StartupStatus::Waiting
        }
    }

    fn describe_waiting_to_start(&self, state: &LineState) -> String {
        let remaining: Vec<&str> = self
            .dependencies
            .iter()
            .enumerate()
            .filter(|(index, _)| !state.healthy_dependencies.contains(index))
            .map(|(_, dependency)| dependency.name.as_str())
            .collect();

        if remaining.is_empty() {
            return "ready to start".to_string();
        }

        format!(
            "waiting for {} {} to be ready...",
            text::pluralize(remaining.len(), "dependency", "dependencies"),
            text::human_list(&remaining)
        )
    }

    fn builds_from(&self, build_directory: &std::path::Path) -> bool {
        matches!(&self.container.image_source, ImageSource::BuildImage(dir) if dir == build_directory)
    }

    fn pulls(&self, image_name: &str) -> bool {
        matches!(&self.container.image_source, ImageSource::PullImage(name) if name == image_name)
    }

    fn lock(&self) -> MutexGuard<'_, LineState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl TaskObserver for ContainerStartupProgressLine {
    fn on_step_starting(&self, step: &Step) {
        ContainerStartupProgressLine::on_step_starting(self, step);
    }

    fn on_event_posted(&self, event: &Event) {
        ContainerStartupProgressLine::on_event_posted(self, event);
    }
}

fn describe_build_progress(progress: &DockerImageBuildProgress) -> String {
    let mut line = format!(
        "building image: step {} of {}: {}",
        progress.current_step, progress.total_steps, progress.message
    );
    if let Some(pull) = &progress.pull_progress {
        line.push_str(&format!(": {pull}"));
    }
    line
}

#[cfg(test)]
mod tests {
    use std::collections::{BTreeMap, BTreeSet};

    use super::*;
    use crate::docker::{DockerContainer, DockerImage, DockerNetwork};
    use crate::model::CreateContainerRequest;

    const NAME: &str = "some-container";
    const BUILD_DIR: &str = "/some-image-dir";
    const OTHER_BUILD_DIR: &str = "/some-other-image-dir";

    fn dependency(name: &str) -> Arc<Container> {
        Arc::new(Container::new(name, ImageSource::PullImage(format!("{name}-image"))))
    }

    struct Fixture {
        container: Arc<Container>,
        dependencies: Vec<Arc<Container>>,
        other: Arc<Container>,
        line: ContainerStartupProgressLine,
    }

    fn fixture(source: ImageSource) -> Fixture {
        let container = Arc::new(Container::new(NAME, source));
        let dependencies = vec![
            dependency("dependency-a"),
            dependency("dependency-b"),
            dependency("dependency-c"),
        ];
        let other = Arc::new(Container::new(
            "other-container",
            ImageSource::BuildImage("/other-build-dir".into()),
        ));
        let line = ContainerStartupProgressLine::new(container.clone(), dependencies.clone());
        Fixture {
            container,
            dependencies,
            other,
            line,
        }
    }

    fn built() -> Fixture {
        fixture(ImageSource::BuildImage(BUILD_DIR.into()))
    }

    fn pulled() -> Fixture {
        fixture(ImageSource::PullImage("some-image".into()))
    }

    fn build_step(dir: &str) -> Step {
        Step::BuildImage {
            build_directory: dir.into(),
            build_args: BTreeMap::new(),
            image_tags: BTreeSet::new(),
        }
    }

    fn pull_step(image: &str) -> Step {
        Step::PullImage {
            image_name: image.into(),
        }
    }

    fn create_step(container: &Arc<Container>, command: Option<&str>) -> Step {
        Step::CreateContainer(CreateContainerRequest {
            container: container.clone(),
            command: command.map(|c| Command::parse(c).unwrap()),
            working_directory: None,
            environment: BTreeMap::new(),
            volumes: Vec::new(),
            ports: Vec::new(),
            image: DockerImage::new("some-image"),
            network: DockerNetwork::new("some-network"),
        })
    }

    fn build_progress(dir: &str, step: u32, message: &str, pull: Option<DockerImagePullProgress>) -> Event {
        Event::ImageBuildProgress {
            build_directory: dir.into(),
            progress: DockerImageBuildProgress {
                current_step: step,
                total_steps: 5,
                message: message.into(),
                pull_progress: pull,
            },
        }
    }

    fn image_built(dir: &str) -> Event {
        Event::ImageBuilt {
            build_directory: dir.into(),
            image: DockerImage::new("some-image"),
        }
    }

    fn network_created() -> Event {
        Event::TaskNetworkCreated {
            network: DockerNetwork::new("some-network"),
        }
    }

    fn created(container: &Arc<Container>) -> Event {
        Event::ContainerCreated {
            container: container.clone(),
            docker_container: DockerContainer::new("some-id"),
        }
    }

    fn healthy(container: &Arc<Container>) -> Event {
        Event::ContainerBecameHealthy {
            container: container.clone(),
        }
    }

    fn expect(line: &ContainerStartupProgressLine, description: &str) {
        assert_eq!(line.print(), format!("{NAME}: {description}"));
    }

    // ── building an image ────────────────────────────────────────────

    #[test]
    fn build_source_initial_state() {
        let f = built();
        expect(&f.line, "ready to build image");
        assert_eq!(f.line.status(), StartupStatus::Waiting);
    }

    #[test]
    fn build_starting_for_this_container() {
        let f = built();
        f.line.on_step_starting(&build_step(BUILD_DIR));
        expect(&f.line, "building image...");
        assert_eq!(f.line.status(), StartupStatus::Working);
    }

    #[test]
    fn build_starting_for_another_directory_is_ignored() {
        let f = built();
        f.line.on_step_starting(&build_step(OTHER_BUILD_DIR));
        expect(&f.line, "ready to build image");
    }

    #[test]
    fn build_progress_with_pull_detail() {
        let f = built();
        f.line.on_event_posted(&build_progress(
            BUILD_DIR,
            1,
            "FROM the-image:1.2.3",
            Some(DockerImagePullProgress::new("downloading", 12, 20)),
        ));
        expect(
            &f.line,
            "building image: step 1 of 5: FROM the-image:1.2.3: downloading 12 B of 20 B (60%)",
        );
    }

    #[test]
    fn build_progress_without_pull_detail() {
        let f = built();
        f.line
            .on_event_posted(&build_progress(BUILD_DIR, 2, "COPY health-check.sh /tools/", None));
        expect(&f.line, "building image: step 2 of 5: COPY health-check.sh /tools/");
    }

    #[test]
    fn build_progress_for_another_directory_is_ignored() {
        let f = built();
        f.line.on_event_posted(&build_progress(
            OTHER_BUILD_DIR,
            2,
            "COPY health-check.sh /tools/",
            None,
        ));
        expect(&f.line, "ready to build image");
    }

    #[test]
    fn pull_notifications_do_not_affect_a_build_source() {
        let f = built();
        f.line.on_step_starting(&pull_step("some-image"));
        f.line.on_event_posted(&Event::ImagePulled {
            image: DockerImage::new("some-image"),
        });
        expect(&f.line, "ready to build image");
    }

    #[test]
    fn image_built_with_network_ready() {
        let f = built();
        f.line.on_event_posted(&network_created());
        f.line.on_event_posted(&image_built(BUILD_DIR));
        expect(&f.line, "image built, ready to create container");
    }

    #[test]
    fn image_built_before_network() {
        let f = built();
        f.line.on_event_posted(&image_built(BUILD_DIR));
        expect(&f.line, "image built, waiting for network to be ready...");

        f.line.on_event_posted(&network_created());
        expect(&f.line, "image built, ready to create container");
    }

    #[test]
    fn image_built_for_another_directory_is_ignored() {
        let f = built();
        f.line.on_event_posted(&image_built(OTHER_BUILD_DIR));
        expect(&f.line, "ready to build image");
    }

    #[test]
    fn network_alone_does_not_advance() {
        let f = built();
        f.line.on_event_posted(&network_created());
        expect(&f.line, "ready to build image");

        f.line.on_step_starting(&build_step(BUILD_DIR));
        expect(&f.line, "building image...");
    }

    #[test]
    fn creating_container() {
        let f = built();
        f.line.on_step_starting(&create_step(&f.container, Some("some-command")));
        expect(&f.line, "creating container...");
    }

    #[test]
    fn creating_another_container_is_ignored() {
        let f = built();
        f.line.on_step_starting(&create_step(&f.other, Some("some-command")));
        expect(&f.line, "ready to build image");
    }

    #[test]
    fn created_with_no_dependencies_ready() {
        let f = built();
        f.line.on_event_posted(&created(&f.container));
        expect(
            &f.line,
            "waiting for dependencies dependency-a, dependency-b and dependency-c to be ready...",
        );
    }

    #[test]
    fn created_with_two_dependencies_outstanding() {
        let f = built();
        f.line.on_event_posted(&healthy(&f.dependencies[0]));
        f.line.on_event_posted(&created(&f.container));
        expect(
            &f.line,
            "waiting for dependencies dependency-b and dependency-c to be ready...",
        );
    }

    #[test]
    fn created_with_one_dependency_outstanding_then_all_ready() {
        let f = built();
        f.line.on_event_posted(&healthy(&f.dependencies[0]));
        f.line.on_event_posted(&healthy(&f.dependencies[1]));
        f.line.on_event_posted(&created(&f.container));
        expect(&f.line, "waiting for dependency dependency-c to be ready...");

        f.line.on_event_posted(&healthy(&f.dependencies[2]));
        expect(&f.line, "ready to start");
    }

    #[test]
    fn dependency_with_same_name_but_different_config_does_not_count() {
        let f = built();
        let impostor = Arc::new(Container::new(
            "dependency-a",
            ImageSource::BuildImage("/elsewhere".into()),
        ));
        f.line.on_event_posted(&healthy(&impostor));
        f.line.on_event_posted(&healthy(&f.dependencies[1]));
        f.line.on_event_posted(&healthy(&f.dependencies[2]));
        f.line.on_event_posted(&created(&f.container));
        expect(&f.line, "waiting for dependency dependency-a to be ready...");
    }

    #[test]
    fn created_for_another_container_is_ignored() {
        let f = built();
        f.line.on_event_posted(&created(&f.other));
        expect(&f.line, "ready to build image");
    }

    #[test]
    fn starting_and_started() {
        let f = built();
        f.line.on_step_starting(&Step::StartContainer {
            container: f.container.clone(),
            docker_container: DockerContainer::new("some-id"),
        });
        expect(&f.line, "starting container...");

        f.line.on_event_posted(&Event::ContainerStarted {
            container: f.container.clone(),
        });
        expect(&f.line, "container started, waiting for it to become healthy...");
    }

    #[test]
    fn starting_and_started_for_another_container_are_ignored() {
        let f = built();
        f.line.on_step_starting(&Step::StartContainer {
            container: f.other.clone(),
            docker_container: DockerContainer::new("some-id"),
        });
        f.line.on_event_posted(&Event::ContainerStarted {
            container: f.other.clone(),
        });
        expect(&f.line, "ready to build image");
    }

    #[test]
    fn became_healthy() {
        let f = built();
        f.line.on_event_posted(&healthy(&f.container));
        expect(&f.line, "running");
        assert_eq!(f.line.status(), StartupStatus::Running);
    }

    #[test]
    fn another_container_becoming_healthy_is_ignored() {
        let f = built();
        f.line.on_event_posted(&healthy(&f.other));
        expect(&f.line, "ready to build image");
    }

    #[test]
    fn teardown_and_failure_events_leave_the_line_alone() {
        let f = built();
        f.line.on_event_posted(&healthy(&f.container));

        let container = f.container.clone();
        for event in [
            Event::TaskStarted,
            Event::RunningContainerExited {
                container: container.clone(),
                exit_code: 0,
            },
            Event::ContainerStopped {
                container: container.clone(),
            },
            Event::ContainerStopFailed {
                container: container.clone(),
                message: "timed out".into(),
            },
            Event::ContainerRemoved {
                container: container.clone(),
            },
            Event::ContainerRemovalFailed {
                container: container.clone(),
                message: "busy".into(),
            },
            Event::ContainerDidNotBecomeHealthy {
                container,
                message: "exited".into(),
            },
            Event::TaskNetworkDeleted,
        ] {
            f.line.on_event_posted(&event);
            expect(&f.line, "running");
        }
    }

    fn run_step(container: &Arc<Container>) -> Step {
        Step::RunContainer {
            container: container.clone(),
            docker_container: DockerContainer::new("some-id"),
        }
    }

    #[test]
    fn running_without_a_command() {
        let f = built();
        f.line.on_step_starting(&create_step(&f.container, None));
        f.line.on_step_starting(&run_step(&f.container));
        expect(&f.line, "running");
    }

    #[test]
    fn running_with_a_command() {
        let f = built();
        f.line.on_step_starting(&create_step(&f.container, Some("some-command")));
        f.line.on_step_starting(&run_step(&f.container));
        expect(&f.line, "running some-command");
    }

    #[test]
    fn running_with_a_multi_line_command() {
        let f = built();
        f.line
            .on_step_starting(&create_step(&f.container, Some("some-command\ndo-stuff")));
        f.line.on_step_starting(&run_step(&f.container));
        assert!(f.line.print().ends_with("running some-command do-stuff"));
    }

    #[test]
    fn another_containers_command_is_not_shown() {
        let f = built();
        f.line.on_step_starting(&create_step(&f.other, Some("some-command")));
        f.line.on_step_starting(&run_step(&f.container));
        expect(&f.line, "running");
    }

    #[test]
    fn running_another_container_is_ignored() {
        let f = built();
        f.line.on_step_starting(&run_step(&f.other));
        expect(&f.line, "ready to build image");
    }

    // ── pulling an image ─────────────────────────────────────────────

    #[test]
    fn pull_source_initial_state() {
        expect(&pulled().line, "ready to pull image");
    }

    #[test]
    fn pull_starting() {
        let f = pulled();
        f.line.on_step_starting(&pull_step("some-image"));
        expect(&f.line, "pulling some-image...");
    }

    #[test]
    fn pull_starting_for_another_image_is_ignored() {
        let f = pulled();
        f.line.on_step_starting(&pull_step("some-other-image"));
        expect(&f.line, "ready to pull image");
    }

    #[test]
    fn pull_progress() {
        let f = pulled();
        f.line.on_step_starting(&pull_step("some-image"));
        f.line.on_event_posted(&Event::ImagePullProgress {
            image_name: "some-image".into(),
            progress: DockerImagePullProgress::new("extracting", 10, 20),
        });
        expect(&f.line, "pulling some-image: extracting 10 B of 20 B (50%)");
    }

    #[test]
    fn pull_progress_for_another_image_is_ignored() {
        let f = pulled();
        f.line.on_step_starting(&pull_step("some-image"));
        f.line.on_event_posted(&Event::ImagePullProgress {
            image_name: "some-other-image".into(),
            progress: DockerImagePullProgress::new("Doing something", 10, 20),
        });
        expect(&f.line, "pulling some-image...");
    }

    #[test]
    fn image_pulled_with_and_without_network() {
        let f = pulled();
        f.line.on_event_posted(&Event::ImagePulled {
            image: DockerImage::new("some-image"),
        });
        expect(&f.line, "image pulled, waiting for network to be ready...");

        f.line.on_event_posted(&network_created());
        expect(&f.line, "image pulled, ready to create container");
    }

    #[test]
    fn image_pulled_for_another_image_is_ignored() {
        let f = pulled();
        f.line.on_event_posted(&Event::ImagePulled {
            image: DockerImage::new("some-other-image"),
        });
        expect(&f.line, "ready to pull image");
    }

    #[test]
    fn network_created_while_pulling_keeps_progress() {
        let f = pulled();
        f.line.on_step_starting(&pull_step("some-image"));
        f.line.on_event_posted(&Event::ImagePullProgress {
            image_name: "some-image".into(),
            progress: DockerImagePullProgress::new("extracting", 10, 20),
        });
        f.line.on_event_posted(&network_created());
        expect(&f.line, "pulling some-image: extracting 10 B of 20 B (50%)");
    }

    #[test]
    fn print_is_consistent_while_notifications_arrive_concurrently() {
        let f = built();
        let line = Arc::new(f.line);
        let deps = f.dependencies.clone();

        std::thread::scope(|scope| {
            let writer = line.clone();
            let container = f.container.clone();
            scope.spawn(move || {
                writer.on_event_posted(&created(&container));
                for dep in &deps {
                    writer.on_event_posted(&healthy(dep));
                }
            });

            for _ in 0..200 {
                let printed = line.print();
                assert!(
                    printed == format!("{NAME}: ready to build image")
                        || printed.starts_with(&format!("{NAME}: waiting for dependenc"))
                        || printed == format!("{NAME}: ready to start"),
                    "unexpected line: {printed}"
                );
            }
        });

        expect(&line, "ready to start");
    }
}
