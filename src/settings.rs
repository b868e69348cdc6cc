use std::path::PathBuf;

/// Settings consumed by [`configure`](crate::configure).
///
/// Loading and validating these from flags or files belongs to the
/// caller; this crate only reads them during configuration.
#[derive(Debug, Clone)]
pub struct Settings {
    /// Directory the two log files are written to. Created if missing.
    pub logs_dir: PathBuf,
    /// Toggle ANSI color in console output only.
    pub console_color_logs: bool,
}

impl Settings {
    pub fn new(logs_dir: impl Into<PathBuf>, console_color_logs: bool) -> Self {
        Self {
            logs_dir: logs_dir.into(),
            console_color_logs,
        }
    }
}
