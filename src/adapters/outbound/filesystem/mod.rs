/// Filesystem adapters: control catalogs, snapshot targets and report output
mod control_source;
mod file_writer;
mod snapshot_target;

pub use control_source::FileSystemControlSource;
pub use file_writer::{FileSystemWriter, StdoutPresenter};
pub use snapshot_target::{SnapshotConnector, SnapshotSession};
