use std::sync::Arc;

use crate::model::{Command, Container};

/// The containers one task needs, in the order they should start.
///
/// The task's own container always comes last.
#[derive(Debug, Clone)]
pub struct TaskPlan {
    task_name: String,
    containers: Vec<Arc<Container>>,
    task_container: Arc<Container>,
    command: Option<Command>,
    image_tag_prefix: String,
}

impl TaskPlan {
    pub fn new(
        task_name: impl Into<String>,
        dependencies: Vec<Arc<Container>>,
        task_container: Arc<Container>,
    ) -> Self {
        let mut containers = dependencies;
        containers.push(task_container.clone());
        Self {
            task_name: task_name.into(),
            containers,
            task_container,
            command: None,
            image_tag_prefix: "dockstep".to_string(),
        }
    }

    /// Run the task container with this command instead of its configured one.
    pub fn with_command(mut self, command: Option<Command>) -> Self {
        self.command = command;
        self
    }

    pub fn with_image_tag_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.image_tag_prefix = prefix.into();
        self
    }

    pub fn task_name(&self) -> &str {
        &self.task_name
    }

    pub fn containers(&self) -> &[Arc<Container>] {
        &self.containers
    }

    pub fn task_container(&self) -> &Arc<Container> {
        &self.task_container
    }

    pub fn command(&self) -> Option<&Command> {
        self.command.as_ref()
    }

    pub fn is_task_container(&self, container: &Container) -> bool {
        *self.task_container == *container
    }

    /// Lowercase `{prefix}-{container}` tag for images built for this plan.
    pub fn image_tag_for(&self, container: &Container) -> String {
        format!("{}-{}", self.image_tag_prefix, container.name).to_lowercase()
    }

    /// The plan's configs for the dependencies `container` declares, in
    /// declaration order.
    pub fn dependencies_of(&self, container: &Container) -> Vec<Arc<Container>> {
        container
            .dependencies
            .iter()
            .filter_map(|name| self.containers.iter().find(|c| c.name == *name).cloned())
            .collect()
    }
}
