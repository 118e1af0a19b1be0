pub mod control;
pub mod inputs;
pub mod outcome;
pub mod procedure;
pub mod report;
pub mod scalar;

pub use control::{
    ControlDefinition, ControlId, ControlSet, Impact, Narrative, References, SeverityCategory,
};
pub use inputs::{InputValue, Inputs};
pub use outcome::{CheckFailure, Outcome, QueryFailure, Status};
pub use procedure::{
    AbsencePolicy, Comparison, Expected, Lookup, MembershipPredicate, Operator,
    VerificationProcedure,
};
pub use report::{ReportEntry, RunMetadata, RunReport, RunReportBuilder};
pub use scalar::{Row, Scalar};
