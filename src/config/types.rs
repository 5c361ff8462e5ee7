use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Result, bail};
use serde::Deserialize;

use crate::model::{Command, Container, ImageSource, PortMapping, VolumeMount};

pub const DEFAULT_HEALTH_CHECK_TIMEOUT_SECS: u64 = 60;

/// Contents of a `dockstep.yml` file.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub project_name: Option<String>,
    /// Seconds to wait for a dependency's health check.
    pub health_check_timeout: u64,
    pub containers: BTreeMap<String, ContainerConfig>,
    pub tasks: BTreeMap<String, TaskConfig>,
    /// Directory the file was loaded from; relative build directories resolve against it.
    #[serde(skip)]
    pub base_dir: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            project_name: None,
            health_check_timeout: DEFAULT_HEALTH_CHECK_TIMEOUT_SECS,
            containers: BTreeMap::new(),
            tasks: BTreeMap::new(),
            base_dir: PathBuf::from("."),
        }
    }
}

impl Config {
    pub fn health_check_timeout(&self) -> Duration {
        Duration::from_secs(self.health_check_timeout)
    }

    /// `project_name`, falling back to the name of the config file's directory.
    pub fn project_name(&self) -> String {
        if let Some(name) = &self.project_name {
            return name.clone();
        }
        self.base_dir
            .canonicalize()
            .ok()
            .and_then(|dir| dir.file_name().map(|n| n.to_string_lossy().to_lowercase()))
            .unwrap_or_else(|| "dockstep".to_string())
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ContainerConfig {
    pub image: Option<String>,
    pub build_directory: Option<PathBuf>,
    pub build_args: BTreeMap<String, String>,
    pub command: Option<Command>,
    pub working_directory: Option<String>,
    pub environment: BTreeMap<String, String>,
    pub volumes: Vec<VolumeMount>,
    pub ports: Vec<PortMapping>,
    pub dependencies: Vec<String>,
}

impl ContainerConfig {
    pub fn to_container(&self, name: &str, base_dir: &Path) -> Result<Container> {
        let image_source = match (&self.image, &self.build_directory) {
            (Some(image), None) => ImageSource::PullImage(image.clone()),
            (None, Some(dir)) => ImageSource::BuildImage(base_dir.join(dir)),
            (Some(_), Some(_)) => {
                bail!("container '{name}' must not set both 'image' and 'build_directory'")
            }
            (None, None) => bail!("container '{name}' must set either 'image' or 'build_directory'"),
        };

        Ok(Container {
            name: name.to_string(),
            image_source,
            build_args: self.build_args.clone(),
            command: self.command.clone(),
            working_directory: self.working_directory.clone(),
            environment: self.environment.clone(),
            volumes: self.volumes.clone(),
            ports: self.ports.clone(),
            dependencies: self.dependencies.clone(),
        })
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TaskConfig {
    /// Name of the container the task runs in.
    pub run: String,
    #[serde(default)]
    pub command: Option<Command>,
}
