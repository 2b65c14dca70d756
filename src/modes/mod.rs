pub mod run;

pub use run::{PolicyMode, RunConfig, RunMode};
