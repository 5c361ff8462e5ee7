use std::collections::BTreeSet;
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result, bail};

use crate::execution::TaskPlan;
use crate::model::Container;
use crate::text::human_list;

use super::types::Config;

pub const CONFIG_FILE_NAME: &str = "dockstep.yml";

impl Config {
    /// Load config from a `dockstep.yml` file in the given directory.
    pub fn load(dir: &Path) -> Result<Option<Self>> {
        let path = dir.join(CONFIG_FILE_NAME);
        if !path.exists() {
            return Ok(None);
        }
        Self::load_file(&path).map(Some)
    }

    pub fn load_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        let mut config: Config = serde_yaml::from_str(&contents)
            .with_context(|| format!("failed to parse {}", path.display()))?;
        config.base_dir = match path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir.to_path_buf(),
            _ => ".".into(),
        };
        tracing::debug!(path = %path.display(), containers = config.containers.len(), "config loaded");
        Ok(config)
    }

    /// The task's container plus everything it transitively depends on,
    /// dependencies first.
    pub fn resolve_task(&self, task_name: &str) -> Result<TaskPlan> {
        let Some(task) = self.tasks.get(task_name) else {
            let known: Vec<&str> = self.tasks.keys().map(String::as_str).collect();
            if known.is_empty() {
                bail!("unknown task '{task_name}': no tasks are defined");
            }
            bail!(
                "unknown task '{task_name}', available tasks are {}",
                human_list(&known)
            );
        };
        if !self.containers.contains_key(&task.run) {
            bail!(
                "task '{task_name}' runs in unknown container '{}'",
                task.run
            );
        }

        let mut order = Vec::new();
        self.visit(&task.run, &mut Vec::new(), &mut BTreeSet::new(), &mut order)?;

        let mut containers = order
            .iter()
            .map(|name| {
                self.containers[name]
                    .to_container(name, &self.base_dir)
                    .map(Arc::new)
            })
            .collect::<Result<Vec<Arc<Container>>>>()?;
        let Some(task_container) = containers.pop() else {
            bail!("task '{task_name}' has no container to run");
        };

        Ok(TaskPlan::new(task_name, containers, task_container)
            .with_command(task.command.clone())
            .with_image_tag_prefix(self.project_name()))
    }

    /// Depth-first post-order walk: each container lands after its dependencies.
    fn visit(
        &self,
        name: &str,
        path: &mut Vec<String>,
        done: &mut BTreeSet<String>,
        order: &mut Vec<String>,
    ) -> Result<()> {
        if done.contains(name) {
            return Ok(());
        }
        if let Some(start) = path.iter().position(|p| p == name) {
            let mut cycle = path[start..].to_vec();
            cycle.push(name.to_string());
            bail!("dependency cycle between containers: {}", cycle.join(" -> "));
        }

        path.push(name.to_string());
        let container = &self.containers[name];
        for dependency in &container.dependencies {
            if !self.containers.contains_key(dependency) {
                bail!("container '{name}' depends on unknown container '{dependency}'");
            }
            self.visit(dependency, path, done, order)?;
        }
        path.pop();

        done.insert(name.to_string());
        order.push(name.to_string());
        Ok(())
    }
}
