//! One-file-per-post archive laid out as `root/username/datestamp/"{datestamp} {id}.json"`.
//!
//! The presence of a post's file is the only record that it was processed.
//! There is no index; a file, once published, is never rewritten.

use archiver_core::{CoreError, PersistOutcome, Post, StorageError};
use std::fs;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use tempfile::Builder;
use tracing::{debug, info};

#[derive(Debug, Clone)]
pub struct ArchiveStore {
    root: PathBuf,
}

impl ArchiveStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory holding every post of one author on one day.
    pub fn dir_for(&self, post: &Post) -> Result<PathBuf, CoreError> {
        validate_component("username", &post.username)?;
        Ok(self
            .root
            .join(&post.username)
            .join(post.datestamp_string()))
    }

    pub fn path_for(&self, post: &Post) -> Result<PathBuf, CoreError> {
        validate_component("id", &post.id)?;
        Ok(self.dir_for(post)?.join(post.file_name()))
    }

    pub fn contains(&self, post: &Post) -> Result<bool, CoreError> {
        Ok(self.path_for(post)?.exists())
    }

    /// Writes `post` unless its file already exists.
    ///
    /// The record is written to a hidden temporary file next to its final
    /// location and published with a no-clobber rename, so readers never see
    /// a partial file and a file that appeared in the meantime is left alone.
    pub fn persist_if_new(&self, post: &Post) -> Result<PersistOutcome, CoreError> {
        let dir = self.dir_for(post)?;
        let file_path = self.path_for(post)?;

        info!("saving post[{}] into {}", post.id, file_path.display());
        if file_path.exists() {
            info!(
                "post[{}] already exists in {}, skip",
                post.id,
                file_path.display()
            );
            return Ok(PersistOutcome::Skipped);
        }

        fs::create_dir_all(&dir).map_err(|source| StorageError::CreateDir {
            path: dir.clone(),
            source,
        })?;

        let write_error = |source: io::Error| StorageError::Write {
            path: file_path.clone(),
            source,
        };

        let mut staged = Builder::new()
            .prefix(".")
            .suffix(".partial")
            .tempfile_in(&dir)
            .map_err(write_error)?;
        {
            let mut writer = BufWriter::new(&mut staged);
            serde_json::to_writer_pretty(&mut writer, post).map_err(|source| {
                StorageError::Encode {
                    post_id: post.id.clone(),
                    source,
                }
            })?;
            writer.write_all(b"\n").map_err(write_error)?;
            writer.flush().map_err(write_error)?;
        }
        staged.as_file().sync_all().map_err(write_error)?;
        debug!("staged post[{}] at {}", post.id, staged.path().display());

        match staged.persist_noclobber(&file_path) {
            Ok(_) => Ok(PersistOutcome::Written),
            Err(e) if e.error.kind() == io::ErrorKind::AlreadyExists => {
                // Lost a race with another writer; the staged copy is removed on drop.
                info!(
                    "post[{}] already exists in {}, skip",
                    post.id,
                    file_path.display()
                );
                Ok(PersistOutcome::Skipped)
            }
            Err(e) => Err(StorageError::Publish {
                path: file_path.clone(),
                source: e.error,
            }
            .into()),
        }
    }
}

fn validate_component(field: &str, value: &str) -> Result<(), StorageError> {
    let invalid = value.is_empty()
        || value == "."
        || value == ".."
        || value.contains(['/', '\\', '\0']);
    if invalid {
        return Err(StorageError::InvalidPathComponent {
            field: field.to_string(),
            value: value.to_string(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests;
