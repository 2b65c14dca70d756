pub mod training_stats;

pub use training_stats::{ConvergenceStatus, TrainingStats};
