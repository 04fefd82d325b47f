use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use rand::Rng;
use santa_core::{Assignments, DrawError, Roster};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::fs;
use tracing::{error, info, warn};
use uuid::Uuid;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("cannot write {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("cannot encode {path}: {source}")]
    Encode {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Debug, thiserror::Error)]
pub enum EnsureError {
    #[error("draw failed: {0}")]
    Draw(#[from] DrawError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// The `{ "users": [...] }` document.
#[derive(Clone, Debug)]
pub struct RosterStore {
    path: PathBuf,
}

impl RosterStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reads the roster, seeding the default one when the document is missing.
    ///
    /// An unreadable or corrupt document yields an empty roster and is left
    /// untouched on disk.
    pub async fn load(&self) -> Roster {
        match read_json::<Roster>(&self.path).await {
            Ok(Some(roster)) => roster,
            Ok(None) => {
                let roster = Roster::seeded();
                match write_json(&self.path, &roster).await {
                    Ok(()) => info!(path = %self.path.display(), "created default roster"),
                    Err(err) => error!(%err, "could not persist default roster"),
                }
                roster
            }
            Err(err) => {
                warn!(path = %self.path.display(), %err, "roster unreadable, using empty roster");
                Roster::default()
            }
        }
    }

    pub async fn save(&self, roster: &Roster) -> Result<(), StoreError> {
        write_json(&self.path, roster).await
    }
}

/// The flat giver -> recipient document.
#[derive(Clone, Debug)]
pub struct AssignmentStore {
    path: PathBuf,
}

impl AssignmentStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn load(&self) -> Option<Assignments> {
        match read_json(&self.path).await {
            Ok(found) => found,
            Err(err) => {
                warn!(path = %self.path.display(), %err, "assignments unreadable");
                None
            }
        }
    }

    pub async fn save(&self, assignments: &Assignments) -> Result<(), StoreError> {
        write_json(&self.path, assignments).await
    }

    /// Returns the stored mapping, drawing and persisting one only when
    /// none is stored yet.
    pub async fn ensure<R>(&self, roster: &Roster, rng: &mut R) -> Result<Assignments, EnsureError>
    where
        R: Rng + ?Sized,
    {
        if let Some(existing) = self.load().await {
            return Ok(existing);
        }

        let assignments = santa_core::draw(&roster.names(), rng)?;
        self.save(&assignments).await?;
        info!(
            path = %self.path.display(),
            participants = assignments.len(),
            "drew assignments"
        );
        Ok(assignments)
    }
}

#[derive(Debug, thiserror::Error)]
enum ReadError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Decode(#[from] serde_json::Error),
}

/// `Ok(None)` when the file does not exist.
async fn read_json<T: DeserializeOwned>(path: &Path) -> Result<Option<T>, ReadError> {
    let bytes = match fs::read(path).await {
        Ok(bytes) => bytes,
        Err(err) if err.kind() == ErrorKind::NotFound => return Ok(None),
        Err(err) => return Err(err.into()),
    };
    Ok(Some(serde_json::from_slice(&bytes)?))
}

/// Writes to a sibling temp file and renames it over `path`.
async fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<(), StoreError> {
    let io_err = |source| StoreError::Io {
        path: path.to_path_buf(),
        source,
    };

    let json = serde_json::to_vec_pretty(value).map_err(|source| StoreError::Encode {
        path: path.to_path_buf(),
        source,
    })?;

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).await.map_err(io_err)?;
    }

    let tmp = temp_sibling(path);
    fs::write(&tmp, json).await.map_err(io_err)?;
    if let Err(source) = fs::rename(&tmp, path).await {
        let _ = fs::remove_file(&tmp).await;
        return Err(io_err(source));
    }
    Ok(())
}

fn temp_sibling(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(format!(".{}.tmp", Uuid::new_v4()));
    path.with_file_name(name)
}
