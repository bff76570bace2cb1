//! # Job Output
//!
//! Where printed jobs end up. A real printer burns them onto paper; the
//! emulator writes them to disk so they can be inspected.
//!
//! Files are named after the UTC time the job finished, with `:` replaced
//! by `-` so the names are valid on every filesystem:
//!
//! ```text
//! 2026-10-19T14-03-27.512.png
//! 2026-10-19T14-03-27.512-1.png
//! ```
//!
//! Jobs finishing within the same millisecond get a numeric suffix.

use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::info;

use crate::error::CloudPrntError;
use crate::protocol::DecodedImage;

/// A rendered job, ready to be stored.
#[derive(Debug, Clone, PartialEq)]
pub enum JobOutput {
    /// A decoded raster job
    Image(DecodedImage),
    /// A payload already in a standard format, stored as received
    Passthrough { media_type: String, bytes: Vec<u8> },
}

impl JobOutput {
    /// File extension for this output.
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Image(_) => "png",
            Self::Passthrough { media_type, .. } => mime_guess::get_mime_extensions_str(media_type)
                .and_then(|exts| exts.first().copied())
                .unwrap_or("bin"),
        }
    }

    /// Encoded file contents.
    pub fn to_bytes(&self) -> Result<Vec<u8>, CloudPrntError> {
        match self {
            Self::Image(image) => image.to_png(),
            Self::Passthrough { bytes, .. } => Ok(bytes.clone()),
        }
    }
}

/// Receives every successfully rendered job.
pub trait JobSink: Send + Sync {
    fn write(&self, output: &JobOutput) -> Result<(), CloudPrntError>;
}

/// Writes jobs into a directory, one timestamped file per job.
#[derive(Debug, Clone)]
pub struct FileSink {
    dir: PathBuf,
}

impl FileSink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Write `output` under a name stamped with `at`. An existing file is
    /// never replaced: clashing names get a `-1`, `-2`, ... suffix.
    fn write_at(&self, output: &JobOutput, at: DateTime<Utc>) -> Result<PathBuf, CloudPrntError> {
        let bytes = output.to_bytes()?;
        fs::create_dir_all(&self.dir)?;

        let extension = output.extension();
        let stem = file_stem(at);
        let mut seq = 0u32;
        loop {
            let name = match seq {
                0 => format!("{}.{}", stem, extension),
                n => format!("{}-{}.{}", stem, n, extension),
            };
            let path = self.dir.join(name);
            match OpenOptions::new().write(true).create_new(true).open(&path) {
                Ok(mut file) => {
                    file.write_all(&bytes)?;
                    return Ok(path);
                }
                Err(e) if e.kind() == io::ErrorKind::AlreadyExists => seq += 1,
                Err(e) => return Err(e.into()),
            }
        }
    }
}

impl JobSink for FileSink {
    fn write(&self, output: &JobOutput) -> Result<(), CloudPrntError> {
        let path = self.write_at(output, Utc::now())?;
        info!("Wrote {}", path.display());
        Ok(())
    }
}

/// Hand an output to the sink on the blocking thread pool.
///
/// PNG encoding and file writes are blocking work.
pub async fn write_blocking(sink: Arc<dyn JobSink>, output: JobOutput) -> Result<(), CloudPrntError> {
    tokio::task::spawn_blocking(move || sink.write(&output))
        .await
        .map_err(|e| CloudPrntError::Io(io::Error::other(format!("Write task failed: {}", e))))?
}

/// Timestamped output file name.
pub fn file_name(at: DateTime<Utc>, extension: &str) -> String {
    format!("{}.{}", file_stem(at), extension)
}

fn file_stem(at: DateTime<Utc>) -> String {
    at.format("%Y-%m-%dT%H:%M:%S%.3f").to_string().replace(':', "-")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::raster;
    use chrono::TimeZone;

    #[test]
    fn test_file_name_has_no_colons() {
        let at = Utc.with_ymd_and_hms(2026, 10, 19, 14, 3, 27).unwrap();
        assert_eq!(file_name(at, "png"), "2026-10-19T14-03-27.000.png");
    }

    #[test]
    fn test_extensions() {
        let image = raster::decode(&raster::encode(8, 1, &[0xFF])).unwrap();
        assert_eq!(JobOutput::Image(image).extension(), "png");

        let png = JobOutput::Passthrough {
            media_type: "image/png".to_string(),
            bytes: vec![],
        };
        assert_eq!(png.extension(), "png");

        let unknown = JobOutput::Passthrough {
            media_type: "application/x-made-up".to_string(),
            bytes: vec![],
        };
        assert_eq!(unknown.extension(), "bin");
    }

    #[test]
    fn test_file_sink_writes_png() {
        let dir = tempfile::tempdir().unwrap();
        let sink = FileSink::new(dir.path().join("out"));

        let image = raster::decode(&raster::encode(16, 4, &[0xAA; 8])).unwrap();
        sink.write(&JobOutput::Image(image)).unwrap();

        let entries: Vec<_> = fs::read_dir(sink.dir()).unwrap().collect();
        assert_eq!(entries.len(), 1);
        let path = entries[0].as_ref().unwrap().path();
        assert_eq!(path.extension().unwrap(), "png");
        assert!(fs::read(&path).unwrap().starts_with(b"\x89PNG"));
    }

    #[test]
    fn test_same_millisecond_jobs_do_not_overwrite() {
        let dir = tempfile::tempdir().unwrap();
        let sink = FileSink::new(dir.path());
        let at = Utc.with_ymd_and_hms(2026, 10, 19, 14, 3, 27).unwrap();

        let first = JobOutput::Passthrough {
            media_type: "image/png".to_string(),
            bytes: b"first".to_vec(),
        };
        let second = JobOutput::Passthrough {
            media_type: "image/png".to_string(),
            bytes: b"second".to_vec(),
        };
        let a = sink.write_at(&first, at).unwrap();
        let b = sink.write_at(&second, at).unwrap();

        assert_eq!(a.file_name().unwrap(), "2026-10-19T14-03-27.000.png");
        assert_eq!(b.file_name().unwrap(), "2026-10-19T14-03-27.000-1.png");
        assert_eq!(fs::read(a).unwrap(), b"first");
        assert_eq!(fs::read(b).unwrap(), b"second");
    }

    #[test]
    fn test_file_sink_passthrough_is_byte_identical() {
        let dir = tempfile::tempdir().unwrap();
        let sink = FileSink::new(dir.path());

        let bytes = b"\x89PNG\r\n\x1a\nnot really".to_vec();
        sink.write(&JobOutput::Passthrough {
            media_type: "image/png".to_string(),
            bytes: bytes.clone(),
        })
        .unwrap();

        let path = fs::read_dir(dir.path()).unwrap().next().unwrap().unwrap().path();
        assert_eq!(fs::read(path).unwrap(), bytes);
    }
}
