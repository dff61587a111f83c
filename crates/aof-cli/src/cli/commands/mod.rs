//! CLI command handlers, one per file.

mod inspect;
mod play;
mod record;
mod regions;

pub use inspect::run_inspect;
pub use play::run_play;
pub use record::{run_record, RecordArgs};
pub use regions::run_regions;
