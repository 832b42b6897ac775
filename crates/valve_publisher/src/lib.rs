use std::ffi::OsString;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum PublishError {
    #[error("write staging file {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("rename {staging} over {canonical}: {source}")]
    Rename {
        staging: PathBuf,
        canonical: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Publishes the admission probability to a well-known path.
///
/// Each publish writes the full value to a staging file in the same
/// directory and renames it over the canonical path, so a reader always
/// sees either the old or the new value in full. Single writer by
/// construction: only the scheduler loop holds a publisher.
#[derive(Debug)]
pub struct ValvePublisher {
    canonical: PathBuf,
    staging: PathBuf,
}

impl ValvePublisher {
    pub fn new(canonical: impl Into<PathBuf>) -> Self {
        let canonical = canonical.into();
        let staging = staging_path(&canonical);
        Self { canonical, staging }
    }

    pub fn path(&self) -> &Path {
        &self.canonical
    }

    pub fn publish(&self, probability: f64) -> Result<(), PublishError> {
        fs::write(&self.staging, format!("{probability}\n")).map_err(|source| {
            PublishError::Write {
                path: self.staging.clone(),
                source,
            }
        })?;
        fs::rename(&self.staging, &self.canonical).map_err(|source| PublishError::Rename {
            staging: self.staging.clone(),
            canonical: self.canonical.clone(),
            source,
        })
    }
}

/// `<path>.tmp` beside the canonical file; rename is only atomic within
/// one filesystem, so the staging file must share the directory.
fn staging_path(canonical: &Path) -> PathBuf {
    let mut name = OsString::from(canonical.as_os_str());
    name.push(".tmp");
    PathBuf::from(name)
}
