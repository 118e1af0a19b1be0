mod control_filter;
mod control_loader;
mod procedure_judge;
mod run_metadata_generator;

pub use control_filter::{ControlFilter, FilterOutcome};
pub use control_loader::ControlLoader;
pub use procedure_judge::ProcedureJudge;
pub use run_metadata_generator::{RunMetadataGenerator, TOOL_NAME};
