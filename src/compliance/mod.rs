//! Compliance domain: control definitions, verification procedures, outcomes
//! and the run report, plus the pure services that operate on them.
pub mod domain;
pub mod services;
