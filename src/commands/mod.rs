//! CLI command implementations.
//!
//! Each command is implemented in its own module.
//! Commands orchestrate the various library components to perform user tasks.

pub mod convert;
pub mod decode;
pub mod models;
pub mod utils;

// Re-export main command functions
pub use convert::execute_convert;
pub use decode::{execute_decode, validate_args};
pub use models::{ConvertArgs, DecodeArgs, FormatChoice};
pub use utils::{display_version, inspect_cdict_file, load_thread_map, CdictOverview};
