/// Data Transfer Objects for the application layer
///
/// DTOs carry data between the CLI, the use case and the adapters,
/// keeping the compliance domain isolated from invocation details.
mod output_format;
mod run_policy;
mod run_request;
mod run_response;

pub use output_format::OutputFormat;
pub use run_policy::{RunPolicy, DEFAULT_QUERY_TIMEOUT, MAX_CONCURRENCY_LIMIT};
pub use run_request::{RunRequest, RunRequestBuilder};
pub use run_response::RunResponse;
