// Steps the planner asks for, events describing what happened, and the
// container configs both refer to.

mod container;
mod events;
mod steps;

pub use container::{Command, Container, ImageSource, PortMapping, VolumeMount};
pub use events::Event;
pub use steps::{CreateContainerRequest, Step};
