/// Type alias for Result with anyhow::Error as the error type.
/// Fatal errors are `AuditError` values wrapped in anyhow; per-control
/// failures never travel through this type.
pub type Result<T> = std::result::Result<T, anyhow::Error>;
