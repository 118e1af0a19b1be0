use super::control_record::ControlRecord;
use crate::shared::Result;

/// ControlSource port for reading control catalog records
///
/// This port abstracts where control definitions come from (a directory of
/// catalog files, a single file, an embedded catalog). Records are returned
/// in a stable source order; validation is the loader's job.
pub trait ControlSource {
    /// Reads every control record from the source
    ///
    /// # Errors
    /// Returns an error if the source cannot be read or a document cannot be parsed
    fn read_controls(&self) -> Result<Vec<ControlRecord>>;

    /// Human-readable description of the source, for progress messages
    fn describe(&self) -> String;
}
