use crate::parser::InputFormat;
use crate::utils::config::DEFAULT_CDICT_FILE;
use clap::ValueEnum;
use std::path::PathBuf;

/// Input format selection on the command line
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum FormatChoice {
    /// Detect from the first meaningful line
    #[default]
    Auto,
    /// `perf script` text output
    PerfText,
    /// JSON lines of positional payloads
    Raw,
}

impl FormatChoice {
    /// The fixed format, or `None` when it must be detected
    pub fn fixed(self) -> Option<InputFormat> {
        match self {
            Self::Auto => None,
            Self::PerfText => Some(InputFormat::PerfText),
            Self::Raw => Some(InputFormat::Raw),
        }
    }
}

/// Arguments for the decode command
///
/// **Public** - used by main.rs to construct from CLI args
#[derive(Debug, Clone)]
pub struct DecodeArgs {
    /// Trace input file
    pub input: PathBuf,

    /// cdict file to write
    pub output: PathBuf,

    /// Input format
    pub format: FormatChoice,

    /// TOML map of VM uuid to display name (optional)
    pub name_map: Option<PathBuf>,

    /// Inspect /proc to recognize qemu threads
    pub use_procfs: bool,

    /// Output path for the JSON run report (optional)
    pub report: Option<PathBuf>,

    /// Print text summary to stdout
    pub print_summary: bool,
}

impl Default for DecodeArgs {
    fn default() -> Self {
        Self {
            input: PathBuf::new(),
            output: PathBuf::from(DEFAULT_CDICT_FILE),
            format: FormatChoice::Auto,
            name_map: None,
            use_procfs: true,
            report: None,
            print_summary: false,
        }
    }
}

/// Arguments for the convert command
#[derive(Debug, Clone, Default)]
pub struct ConvertArgs {
    /// Legacy cdict file
    pub input: PathBuf,

    /// Destination, defaults to `<input stem>.v2.cdict` next to the input
    pub output: Option<PathBuf>,

    /// CSV thread map renaming threads while converting (optional)
    pub thread_map: Option<PathBuf>,
}
