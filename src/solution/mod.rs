//! Solution and project inputs, and the staged orchestration over them.

pub mod orchestrator;
pub mod project;
pub mod resolver;
pub mod sln;

pub use orchestrator::{CancelToken, Orchestrator, ParseSummary};
pub use project::ProjectFile;
pub use resolver::{InputPlan, ModuleSource, PlannedModule};
pub use sln::{Solution, SolutionProject};
