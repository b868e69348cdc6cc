use std::{
    fs::File,
    io::{LineWriter, Write},
    path::{Path, PathBuf},
    sync::Mutex,
};

use eyre::Context;

use crate::record::Record;
use crate::{LogFormatter, LogSink};

/// Append-only file sink that survives external rotation: if the file at
/// the original path was moved or removed, the next write reopens it
/// instead of appending to a stale descriptor.
pub struct WatchedFileSink {
    file: Mutex<WatchedFile>,
    path: PathBuf,
    formatter: Box<dyn LogFormatter>,
}

struct WatchedFile {
    writer: LineWriter<File>,
    #[cfg(unix)]
    ino: u64,
    #[cfg(unix)]
    dev: u64,
}

fn open_append(path: &Path) -> eyre::Result<File> {
    std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("Failed opening or creating log file {}", path.display()))
}

impl WatchedFile {
    fn open(path: &Path) -> eyre::Result<Self> {
        let file = open_append(path)?;
        #[cfg(unix)]
        let (ino, dev) = {
            use std::os::unix::fs::MetadataExt;
            let md = file.metadata().with_context(|| {
                format!("Failed reading metadata of log file {}", path.display())
            })?;
            (md.ino(), md.dev())
        };

        Ok(Self {
            writer: LineWriter::new(file),
            #[cfg(unix)]
            ino,
            #[cfg(unix)]
            dev,
        })
    }

    #[cfg(unix)]
    fn is_stale(&self, path: &Path) -> bool {
        use std::os::unix::fs::MetadataExt;
        match std::fs::metadata(path) {
            Ok(md) => md.ino() != self.ino || md.dev() != self.dev,
            // Unlinked or renamed away.
            Err(_) => true,
        }
    }

    #[cfg(not(unix))]
    fn is_stale(&self, path: &Path) -> bool {
        std::fs::metadata(path).is_err()
    }
}

impl WatchedFileSink {
    pub fn new(path: impl Into<PathBuf>, formatter: Box<dyn LogFormatter>) -> eyre::Result<Self> {
        let path = path.into();
        let file = WatchedFile::open(&path)?;

        Ok(Self {
            file: Mutex::new(file),
            path,
            formatter,
        })
    }
}

impl LogSink for WatchedFileSink {
    fn write_log(&self, record: &Record) -> eyre::Result<()> {
        let mut file = self
            .file
            .lock()
            .map_err(|e| eyre::eyre!(e.to_string()))?;

        if file.is_stale(&self.path) {
            *file = WatchedFile::open(&self.path)?;
        }

        writeln!(file.writer, "{}", self.formatter.format(record))?;
        file.writer.flush().context("Can't flush log file")
    }

    fn flush(&self) {
        if let Ok(mut file) = self.file.lock() {
            let _ = file.writer.flush();
        }
    }
}

pub struct StdoutSink {
    handle: std::io::Stdout,
    formatter: Box<dyn LogFormatter>,
}

impl StdoutSink {
    pub fn new(formatter: Box<dyn LogFormatter>) -> Self {
        Self {
            handle: std::io::stdout(),
            formatter,
        }
    }
}

impl LogSink for StdoutSink {
    fn write_log(&self, record: &Record) -> eyre::Result<()> {
        let mut writer = self.handle.lock();

        writeln!(writer, "{}", self.formatter.format(record))?;
        writer.flush().context("Can't flush stdout")
    }

    fn flush(&self) {
        let _ = self.handle.lock().flush();
    }
}
