//! Recording output.

use std::io;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono_tz::Tz;
use stations_parser::Program;
use tokio::fs::{File, OpenOptions};
use tokio::io::{AsyncWriteExt, BufWriter};
use tracing::debug;

use crate::utils::filename::recording_filename;
use crate::utils::fs::ensure_dir_all_with_op;
use crate::{Error, Result};

/// Creates the output for one program.
#[async_trait]
pub trait SinkFactory: Send + Sync {
    async fn create(&self, station: &str, program: &Program) -> Result<Box<dyn OutputSink>>;
}

/// Destination of one recording, exclusively owned by its session.
#[async_trait]
pub trait OutputSink: Send {
    async fn write_chunk(&mut self, chunk: &[u8]) -> io::Result<()>;

    /// Flush and close. Called exactly once when the session ends.
    async fn finish(&mut self) -> io::Result<()>;

    /// Where the bytes go, for logs.
    fn describe(&self) -> String;
}

/// Writes `[<start>][<station>]<title>.<ext>` files into one directory.
pub struct FileSinkFactory {
    output_dir: PathBuf,
    extension: String,
    tz: Tz,
}

impl FileSinkFactory {
    pub fn new(output_dir: impl Into<PathBuf>, extension: impl Into<String>, tz: Tz) -> Self {
        Self {
            output_dir: output_dir.into(),
            extension: extension.into(),
            tz,
        }
    }

    /// Path for a program, before collision handling.
    pub fn path_for(&self, station: &str, program: &Program) -> PathBuf {
        self.output_dir.join(recording_filename(
            program.start(),
            station,
            program.title(),
            self.tz,
            &self.extension,
        ))
    }
}

#[async_trait]
impl SinkFactory for FileSinkFactory {
    /// Never overwrites: if the file exists (a restart in the middle of a
    /// program) a numeric suffix is added.
    async fn create(&self, station: &str, program: &Program) -> Result<Box<dyn OutputSink>> {
        ensure_dir_all_with_op("creating output directory", &self.output_dir).await?;

        let base = self.path_for(station, program);
        let mut path = base.clone();
        let mut suffix = 1;
        loop {
            match OpenOptions::new().write(true).create_new(true).open(&path).await {
                Ok(file) => {
                    debug!(path = %path.display(), "Created recording file");
                    return Ok(Box::new(FileSink {
                        path,
                        writer: BufWriter::new(file),
                    }));
                }
                Err(e) if e.kind() == io::ErrorKind::AlreadyExists && suffix < 100 => {
                    suffix += 1;
                    path = with_suffix(&base, suffix);
                }
                Err(e) => return Err(Error::io_path("creating recording file", &path, e)),
            }
        }
    }
}

fn with_suffix(base: &Path, n: u32) -> PathBuf {
    let stem = base
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    match base.extension() {
        Some(ext) => base.with_file_name(format!("{stem} ({n}).{}", ext.to_string_lossy())),
        None => base.with_file_name(format!("{stem} ({n})")),
    }
}

struct FileSink {
    path: PathBuf,
    writer: BufWriter<File>,
}

#[async_trait]
impl OutputSink for FileSink {
    async fn write_chunk(&mut self, chunk: &[u8]) -> io::Result<()> {
        self.writer.write_all(chunk).await
    }

    async fn finish(&mut self) -> io::Result<()> {
        self.writer.flush().await?;
        self.writer.get_mut().sync_all().await
    }

    fn describe(&self) -> String {
        self.path.display().to_string()
    }
}
