/// Application layer - Use cases and DTOs
///
/// This layer orchestrates the compliance domain services and coordinates
/// with infrastructure through ports.
pub mod cancellation;
pub mod dto;
pub mod factories;
pub mod read_models;
pub mod use_cases;

pub use cancellation::CancellationSignal;
