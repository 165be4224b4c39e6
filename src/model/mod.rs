pub mod config;
pub mod profile;
pub mod project;
pub mod task;

pub use config::*;
pub use profile::*;
pub use project::*;
pub use task::*;
