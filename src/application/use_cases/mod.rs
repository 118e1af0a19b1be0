/// Use cases module containing application business logic orchestration
mod run_controls;

pub use run_controls::RunControlsUseCase;
