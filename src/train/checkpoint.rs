//! Checkpoint persistence.
//!
//! A checkpoint is a single file: one named MessagePack record (full
//! precision) holding the network parameters together with the
//! [`NetworkConfig`] that rebuilds the network, stored as JSON. The file is
//! written to a temporary file in the target directory, synced, renamed into
//! place and the directory synced, so a failed save leaves the previous
//! checkpoint whole and config and weights can never come from different
//! saves.

use std::fs;
use std::io::{self, Write};
use std::path::Path;

use burn::module::Module;
use burn::record::{FullPrecisionSettings, NamedMpkBytesRecorder, Record, Recorder};
use burn::tensor::backend::Backend;
use tempfile::NamedTempFile;
use tracing::{debug, warn};

use crate::config::NetworkConfig;
use crate::error::{HmlstmError, Result};
use crate::network::{HmlstmNetwork, HmlstmNetworkRecord};

type CheckpointRecorder = NamedMpkBytesRecorder<FullPrecisionSettings>;

#[derive(Record)]
struct CheckpointRecord<B: Backend> {
    /// [`NetworkConfig`] as JSON.
    config: String,
    network: HmlstmNetworkRecord<B>,
}

#[derive(Debug, Clone)]
pub struct CheckpointStore {
    /// Extra attempts after a failed write.
    retries: usize,
}

impl Default for CheckpointStore {
    fn default() -> Self {
        Self { retries: 1 }
    }
}

impl CheckpointStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_retries(mut self, retries: usize) -> Self {
        self.retries = retries;
        self
    }

    /// Persist `model` and the config it was built from. The config is saved
    /// with the model's current slope so annealing resumes where it stopped.
    pub fn save<B: Backend>(
        &self,
        path: &Path,
        model: &HmlstmNetwork<B>,
        config: &NetworkConfig,
    ) -> Result<()> {
        let config = config.clone().with_slope(model.slope());
        let record = CheckpointRecord {
            config: serde_json::to_string(&config).map_err(|e| HmlstmError::checkpoint(path, e))?,
            network: model.clone().into_record(),
        };
        let bytes = CheckpointRecorder::default()
            .record(record, ())
            .map_err(|e| HmlstmError::checkpoint(path, e))?;

        self.write_with_retry(path, || atomic_write(path, &bytes))?;
        debug!(path = %path.display(), bytes = bytes.len(), "checkpoint written");
        Ok(())
    }

    /// Rebuild the network stored at `path`.
    pub fn load<B: Backend>(
        &self,
        path: &Path,
        device: &B::Device,
    ) -> Result<(NetworkConfig, HmlstmNetwork<B>)> {
        if !path.is_file() {
            return Err(HmlstmError::checkpoint(path, "no checkpoint at this path"));
        }

        let bytes = fs::read(path).map_err(|e| HmlstmError::checkpoint(path, e))?;
        let record: CheckpointRecord<B> = CheckpointRecorder::default()
            .load(bytes, device)
            .map_err(|e| HmlstmError::checkpoint(path, e))?;
        let config: NetworkConfig = serde_json::from_str(&record.config)
            .map_err(|e| HmlstmError::checkpoint(path, format!("config: {e}")))?;

        let fresh = config.init::<B>(device)?;
        let expected = fresh.num_params();
        let model = fresh.load_record(record.network);
        if model.num_params() != expected {
            return Err(HmlstmError::checkpoint(
                path,
                format!(
                    "stored parameters ({}) do not fit the stored config ({expected})",
                    model.num_params()
                ),
            ));
        }
        Ok((config, model))
    }

    /// Run `write`, repeating it up to `retries` more times while it fails.
    fn write_with_retry<F>(&self, path: &Path, mut write: F) -> Result<()>
    where
        F: FnMut() -> io::Result<()>,
    {
        let mut attempt = 0;
        loop {
            match write() {
                Ok(()) => return Ok(()),
                Err(e) if attempt < self.retries => {
                    attempt += 1;
                    warn!(path = %path.display(), error = %e, attempt, "checkpoint write failed, retrying");
                }
                Err(e) => return Err(HmlstmError::checkpoint(path, e)),
            }
        }
    }
}

fn atomic_write(path: &Path, bytes: &[u8]) -> io::Result<()> {
    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    fs::create_dir_all(parent)?;

    let mut temp = NamedTempFile::new_in(parent)?;
    temp.write_all(bytes)?;
    temp.as_file().sync_all()?;
    temp.persist(path).map_err(|e| e.error)?;
    sync_dir(parent)
}

#[cfg(unix)]
fn sync_dir(dir: &Path) -> io::Result<()> {
    fs::File::open(dir)?.sync_all()
}

#[cfg(not(unix))]
fn sync_dir(_dir: &Path) -> io::Result<()> {
    Ok(())
}
