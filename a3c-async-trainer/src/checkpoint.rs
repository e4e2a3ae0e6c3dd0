//! Checkpoints of the shared model, keyed by global episode index.
use a3c_core::{error::A3cError, Env, Model};
use anyhow::Result;
use log::{debug, info};
use std::{
    fs,
    path::{Path, PathBuf},
};

const PREFIX: &str = "model-";
const SUFFIX: &str = ".ckpt";

/// Saves and restores model checkpoints in a directory.
///
/// Files are named `model-<episode>.ckpt`. After every save only the
/// `keep` most recent checkpoints are retained (`keep == 0` keeps all).
#[derive(Clone, Debug)]
pub struct Checkpointer {
    dir: PathBuf,
    keep: usize,
}

impl Checkpointer {
    /// Creates a checkpointer, creating `dir` if it does not exist.
    pub fn new(dir: impl Into<PathBuf>, keep: usize) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir, keep })
    }

    /// Directory the checkpoints are stored in.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the checkpoint of the given episode.
    pub fn path(&self, episode: usize) -> PathBuf {
        self.dir.join(format!("{}{}{}", PREFIX, episode, SUFFIX))
    }

    /// Saves `model` as the checkpoint of `episode` and prunes old checkpoints.
    pub fn save<E: Env, M: Model<E>>(&self, model: &M, episode: usize) -> Result<PathBuf> {
        let path = self.path(episode);
        model.save(&path)?;
        info!("Saved the model in {:?}", &path);
        self.prune()?;
        Ok(path)
    }

    /// Restores `model` from the latest checkpoint and returns its episode index.
    pub fn restore_latest<E: Env, M: Model<E>>(&self, model: &mut M) -> Result<usize> {
        let (episode, path) = self
            .latest()?
            .ok_or_else(|| A3cError::CheckpointNotFound(self.dir.display().to_string()))?;
        model.load(&path)?;
        info!("Restored the model from {:?}", &path);
        Ok(episode)
    }

    /// Returns the checkpoints in the directory, oldest first.
    pub fn list(&self) -> Result<Vec<(usize, PathBuf)>> {
        let mut checkpoints = fs::read_dir(&self.dir)?
            .filter_map(|entry| entry.ok())
            .filter_map(|entry| {
                let name = entry.file_name().into_string().ok()?;
                let episode = name
                    .strip_prefix(PREFIX)?
                    .strip_suffix(SUFFIX)?
                    .parse::<usize>()
                    .ok()?;
                Some((episode, entry.path()))
            })
            .collect::<Vec<_>>();
        checkpoints.sort_by_key(|(episode, _)| *episode);
        Ok(checkpoints)
    }

    /// Returns the most recent checkpoint, if any.
    pub fn latest(&self) -> Result<Option<(usize, PathBuf)>> {
        Ok(self.list()?.pop())
    }

    fn prune(&self) -> Result<()> {
        if self.keep == 0 {
            return Ok(());
        }
        let checkpoints = self.list()?;
        let n_remove = checkpoints.len().saturating_sub(self.keep);
        for (_, path) in checkpoints.into_iter().take(n_remove) {
            debug!("Removes old checkpoint {:?}", &path);
            fs::remove_file(path)?;
        }
        Ok(())
    }
}
