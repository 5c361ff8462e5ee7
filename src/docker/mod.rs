// Docker daemon access: the client trait and its `docker` CLI implementation.

mod cli;
mod client;
pub mod engine;
mod run;
mod types;

pub use cli::CliDockerClient;
pub use client::DockerClient;
pub use engine::ensure_available;
pub use types::{
    DockerContainer, DockerError, DockerImage, DockerImageBuildProgress, DockerImagePullProgress,
    DockerNetwork, HealthStatus,
};
