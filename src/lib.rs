pub mod config;
pub mod docker;
pub mod execution;
pub mod model;
pub mod text;
pub mod ui;
pub mod version;
