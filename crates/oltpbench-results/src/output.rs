//! Output destinations and collision-free file naming.

use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use tracing::info;

use crate::error::{ResultsError, ResultsResult};

/// Where exports go: the process's stdout, or files under a directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputTarget {
    Stdout,
    Files {
        directory: PathBuf,
        /// Prepended to every file name, e.g. a timestamp.
        prefix: String,
        base: String,
    },
}

impl OutputTarget {
    /// `"-"` selects stdout; anything else is a file base name.
    #[must_use]
    pub fn new(output: &str, directory: impl Into<PathBuf>, prefix: impl Into<String>) -> Self {
        if output == "-" {
            return Self::Stdout;
        }
        Self::Files {
            directory: directory.into(),
            prefix: prefix.into(),
            base: output.to_string(),
        }
    }

    /// Opens the export `<prefix><base><suffix>`, where the suffix carries
    /// the extension (`.csv`, `_NewOrder.res`, ...). Existing files are
    /// never overwritten.
    pub fn create(&self, suffix: &str) -> ResultsResult<Output> {
        match self {
            Self::Stdout => Ok(Output {
                path: None,
                writer: Box::new(io::stdout()),
            }),
            Self::Files {
                directory,
                prefix,
                base,
            } => {
                ensure_directory(directory)?;
                let file_name = format!("{prefix}{base}{suffix}");
                let (stem, ext) = match file_name.rsplit_once('.') {
                    Some((stem, ext)) if !stem.is_empty() => {
                        (stem.to_string(), Some(ext.to_string()))
                    }
                    _ => (file_name.clone(), None),
                };
                let path = next_filename(directory, &stem, ext.as_deref());
                info!(path = %path.display(), "Writing output");
                let file = File::create(&path)?;
                Ok(Output {
                    path: Some(path),
                    writer: Box::new(BufWriter::new(file)),
                })
            }
        }
    }
}

fn ensure_directory(directory: &Path) -> ResultsResult<()> {
    if directory.exists() && !directory.is_dir() {
        return Err(ResultsError::NotADirectory(directory.to_path_buf()));
    }
    fs::create_dir_all(directory)?;
    Ok(())
}

/// First free name among `stem.ext`, `stem.1.ext`, `stem.2.ext`, ...
#[must_use]
pub fn next_filename(directory: &Path, stem: &str, ext: Option<&str>) -> PathBuf {
    let name = |n: Option<u32>| -> PathBuf {
        let mut file = stem.to_string();
        if let Some(n) = n {
            file.push_str(&format!(".{n}"));
        }
        if let Some(ext) = ext {
            file.push('.');
            file.push_str(ext);
        }
        directory.join(file)
    };

    let first = name(None);
    if !first.exists() {
        return first;
    }
    (1..)
        .map(|n| name(Some(n)))
        .find(|candidate| !candidate.exists())
        .unwrap_or(first)
}

/// An open export.
pub struct Output {
    path: Option<PathBuf>,
    writer: Box<dyn Write>,
}

impl Output {
    /// File backing this output; `None` for stdout.
    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }
}

impl std::fmt::Debug for Output {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Output").field("path", &self.path).finish_non_exhaustive()
    }
}

impl Write for Output {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.writer.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.writer.flush()
    }
}
