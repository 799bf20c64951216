//! # Optimizer Module
//!
//! Separa le responsabilità della pipeline in sottomoduli:
//! - `media_optimizer`: Orchestratore principale
//! - `task_optimizer`: Worker per singoli file
//! - `progress_tracker`: Gestione progress unificata
//! - `path_resolver`: Calcolo centralizzato dei path di sostituzione

pub mod media_optimizer;
pub mod path_resolver;
pub mod progress_tracker;
pub mod task_optimizer;

pub use media_optimizer::{KindReport, MediaNormalizer, RunReport};
pub use path_resolver::PathResolver;
pub use progress_tracker::ProgressTracker;
pub use task_optimizer::{FileOutcome, FileReport, TaskOptimizer};
