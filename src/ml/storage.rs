//! Model artifact persistence
//!
//! Versioned artifacts live under one data directory as bincode files, with a
//! small JSON sidecar naming the active version. Files are written to a temp
//! path and renamed into place so a crash mid-write never corrupts an
//! artifact or the active pointer.

use std::fs::{self, File};
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use super::registry::{ModelArtifact, ModelMetadata};
use crate::error::Result;

/// Name of the active-version sidecar file
const ACTIVE_FILE: &str = "active.json";

/// Model artifact store keyed by version
#[derive(Debug, Clone)]
pub struct ModelStorage {
    data_dir: PathBuf,
}

impl ModelStorage {
    pub fn new<P: AsRef<Path>>(data_dir: P) -> Self {
        Self {
            data_dir: data_dir.as_ref().to_path_buf(),
        }
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    /// Create the storage directory if missing
    pub fn init(&self) -> Result<()> {
        fs::create_dir_all(&self.data_dir)?;
        debug!("Initialized model storage at {:?}", self.data_dir);
        Ok(())
    }

    fn artifact_path(&self, version: u32) -> PathBuf {
        self.data_dir.join(format!("model.v{}.bin", version))
    }

    fn active_path(&self) -> PathBuf {
        self.data_dir.join(ACTIVE_FILE)
    }

    /// Persist an artifact under its version
    pub fn save_artifact(&self, artifact: &ModelArtifact) -> Result<()> {
        let path = self.artifact_path(artifact.version);
        let tmp = path.with_extension("bin.tmp");

        {
            let file = File::create(&tmp)?;
            let mut writer = BufWriter::new(file);
            bincode::serde::encode_into_std_write(
                artifact,
                &mut writer,
                bincode::config::standard(),
            )?;
        }
        fs::rename(&tmp, &path)?;

        info!(
            "Saved model artifact v{} ({} samples) to {:?}",
            artifact.version, artifact.sample_count, path
        );
        Ok(())
    }

    /// Point the active pointer at the given artifact metadata
    pub fn activate(&self, metadata: &ModelMetadata) -> Result<()> {
        let path = self.active_path();
        let tmp = path.with_extension("json.tmp");

        fs::write(&tmp, serde_json::to_string_pretty(metadata)?)?;
        fs::rename(&tmp, &path)?;

        info!("Activated model artifact v{}", metadata.version);
        Ok(())
    }

    /// Load a specific artifact version, if present
    pub fn load_version(&self, version: u32) -> Result<Option<ModelArtifact>> {
        let path = self.artifact_path(version);
        if !path.exists() {
            return Ok(None);
        }

        let file = File::open(&path)?;
        let mut reader = BufReader::new(file);
        let artifact: ModelArtifact =
            bincode::serde::decode_from_std_read(&mut reader, bincode::config::standard())?;

        debug!("Loaded model artifact v{} from {:?}", version, path);
        Ok(Some(artifact))
    }

    /// Read the active-pointer metadata without loading the artifact
    pub fn active_metadata(&self) -> Result<Option<ModelMetadata>> {
        let path = self.active_path();
        if !path.exists() {
            return Ok(None);
        }

        let content = fs::read_to_string(&path)?;
        Ok(Some(serde_json::from_str(&content)?))
    }

    /// Load the currently active artifact, if any
    pub fn load_active(&self) -> Result<Option<ModelArtifact>> {
        match self.active_metadata()? {
            Some(metadata) => self.load_version(metadata.version),
            None => Ok(None),
        }
    }

    /// Versions available on disk, ascending
    pub fn list_versions(&self) -> Result<Vec<u32>> {
        let mut versions = Vec::new();

        if !self.data_dir.exists() {
            return Ok(versions);
        }

        for entry in fs::read_dir(&self.data_dir)? {
            let entry = entry?;
            let name = entry.file_name();
            let name = name.to_string_lossy();
            if let Some(v) = name
                .strip_prefix("model.v")
                .and_then(|rest| rest.strip_suffix(".bin"))
                .and_then(|v| v.parse::<u32>().ok())
            {
                versions.push(v);
            }
        }

        versions.sort_unstable();
        Ok(versions)
    }

    /// Highest version present on disk
    pub fn latest_version(&self) -> Result<u32> {
        Ok(self.list_versions()?.into_iter().max().unwrap_or(0))
    }
}
