pub mod profile;
pub mod projects;

pub use profile::*;
pub use projects::*;
