//! Run-based artifact store.
//!
//! Every training call writes into its own run directory:
//!
//! ```text
//! models_dir/
//! └── runs/
//!     ├── 20261016T081512004211Z-classical/
//!     │   ├── classifier_rf.joblib
//!     │   ├── ...
//!     │   ├── ml_report.json
//!     │   └── MANIFEST.json      <- written last
//!     └── 20261016T090230118893Z-optimizer/
//!         └── ...
//! ```
//!
//! Files are written to a temporary name, synced and renamed into place. A
//! run becomes visible only once its `MANIFEST.json` exists, so readers see
//! either the previous complete run or the new one. Resolution picks, for a
//! given artifact name, the newest complete run whose manifest lists it.
//!
//! After each commit, older complete runs whose every artifact is listed by a
//! newer complete run are deleted. The newest run of each [`RunKind`] is
//! always kept.

use crate::error::{LearningError, Result};
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs::{self, File};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

pub const MANIFEST_FILE: &str = "MANIFEST.json";
pub const REPORT_FILE: &str = "ml_report.json";
pub const OPTIMIZER_MODEL: &str = "optimizer_rf.joblib";
pub const OPTIMIZER_SCALER: &str = "optimizer_scaler.joblib";

const RUNS_DIR: &str = "runs";

/// `classifier_<name>.joblib`
pub fn classifier_artifact(name: &str) -> String {
    format!("classifier_{name}.joblib")
}

/// `regressor_<name>.joblib`
pub fn regressor_artifact(name: &str) -> String {
    format!("regressor_{name}.joblib")
}

/// Which trainer produced a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunKind {
    Classical,
    Optimizer,
}

impl RunKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunKind::Classical => "classical",
            RunKind::Optimizer => "optimizer",
        }
    }
}

/// Contents of `MANIFEST.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunManifest {
    pub run_id: String,
    pub kind: RunKind,
    pub created_at: DateTime<Utc>,
    /// Artifact file names, in write order.
    pub artifacts: Vec<String>,
}

impl RunManifest {
    pub fn contains(&self, name: &str) -> bool {
        self.artifacts.iter().any(|a| a == name)
    }
}

/// Handle on a models directory.
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    root: PathBuf,
}

impl ArtifactStore {
    pub fn new(models_dir: impl Into<PathBuf>) -> Self {
        Self {
            root: models_dir.into(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn runs_dir(&self) -> PathBuf {
        self.root.join(RUNS_DIR)
    }

    /// Create a fresh run directory.
    ///
    /// The run id is the current UTC time with microseconds plus the run
    /// kind; a numeric suffix is added if that directory already exists.
    pub fn begin_run(&self, kind: RunKind) -> Result<RunWriter> {
        let runs = self.runs_dir();
        fs::create_dir_all(&runs)?;

        let created_at = Utc::now();
        let base = format!("{}-{}", created_at.format("%Y%m%dT%H%M%S%6fZ"), kind.as_str());
        let mut run_id = base.clone();
        let mut attempt = 0u32;
        let dir = loop {
            let dir = runs.join(&run_id);
            match fs::create_dir(&dir) {
                Ok(()) => break dir,
                Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                    attempt += 1;
                    run_id = format!("{base}-{attempt:03}");
                }
                Err(e) => return Err(e.into()),
            }
        };

        debug!("Started run {}", run_id);
        Ok(RunWriter {
            store: self.clone(),
            dir,
            manifest: RunManifest {
                run_id,
                kind,
                created_at,
                artifacts: Vec::new(),
            },
            committed: false,
        })
    }

    /// Manifests of all complete runs, newest first.
    ///
    /// Directories without a manifest, or with one that cannot be decoded,
    /// are skipped; the latter with a warning.
    pub fn complete_runs(&self) -> Result<Vec<RunManifest>> {
        let entries = match fs::read_dir(self.runs_dir()) {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut manifests = Vec::new();
        for entry in entries {
            let entry = entry?;
            if !entry.file_type()?.is_dir() {
                continue;
            }
            let path = entry.path().join(MANIFEST_FILE);
            if !path.is_file() {
                continue;
            }
            match read_json::<RunManifest>(&path) {
                Ok(manifest) => manifests.push(manifest),
                Err(e) => warn!("Skipping run with unreadable manifest: {}", e),
            }
        }

        // Run ids are fixed-width timestamps, so string order is time order.
        manifests.sort_by(|a, b| b.run_id.cmp(&a.run_id));
        Ok(manifests)
    }

    /// Path of `name` in the newest complete run that lists it.
    pub fn resolve(&self, name: &str) -> Result<PathBuf> {
        let run = self
            .complete_runs()?
            .into_iter()
            .find(|m| m.contains(name))
            .ok_or_else(|| LearningError::ArtifactNotFound {
                path: self.root.join(name),
            })?;

        let path = self.runs_dir().join(&run.run_id).join(name);
        if !path.is_file() {
            return Err(LearningError::ArtifactCorrupt {
                path,
                reason: format!("listed in the manifest of run {} but missing", run.run_id),
            });
        }
        Ok(path)
    }

    /// Resolve and decode an artifact.
    pub fn load<T: DeserializeOwned>(&self, name: &str) -> Result<T> {
        let path = self.resolve(name)?;
        debug!("Loading {}", path.display());
        read_json(&path)
    }

    /// Delete complete runs that no longer serve any artifact.
    ///
    /// A run is superseded when every artifact it lists is also listed by a
    /// newer complete run. The newest run of each kind is kept regardless.
    /// Returns the ids of the deleted runs.
    pub fn prune_superseded(&self) -> Result<Vec<String>> {
        let mut covered: HashSet<String> = HashSet::new();
        let mut newest_kinds: Vec<RunKind> = Vec::new();
        let mut pruned = Vec::new();

        for manifest in self.complete_runs()? {
            let newest_of_kind = !newest_kinds.contains(&manifest.kind);
            if newest_of_kind {
                newest_kinds.push(manifest.kind);
            }

            let superseded = manifest.artifacts.iter().all(|a| covered.contains(a));
            if !newest_of_kind && superseded {
                self.remove_run(&manifest.run_id)?;
                pruned.push(manifest.run_id);
                continue;
            }
            covered.extend(manifest.artifacts);
        }

        if !pruned.is_empty() {
            info!("Pruned {} superseded run(s)", pruned.len());
        }
        Ok(pruned)
    }

    /// Hide a run by removing its manifest first, then delete its directory.
    fn remove_run(&self, run_id: &str) -> Result<()> {
        let dir = self.runs_dir().join(run_id);
        fs::remove_file(dir.join(MANIFEST_FILE))?;
        fs::remove_dir_all(&dir)?;
        debug!("Removed run {}", run_id);
        Ok(())
    }
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let bytes = fs::read(path).map_err(|e| LearningError::ArtifactCorrupt {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;
    serde_json::from_slice(&bytes).map_err(|e| LearningError::ArtifactCorrupt {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })
}

/// Write `bytes` to `dir/name` through a synced temporary file and a rename.
fn write_atomic(dir: &Path, name: &str, bytes: &[u8]) -> Result<()> {
    let tmp = dir.join(format!(".{name}.tmp"));
    let target = dir.join(name);

    let mut file = File::create(&tmp)?;
    file.write_all(bytes)?;
    file.sync_all()?;
    drop(file);

    fs::rename(&tmp, &target)?;

    #[cfg(unix)]
    File::open(dir)?.sync_all()?;

    Ok(())
}

/// An in-progress run. Nothing it writes is visible until [`commit`](Self::commit).
///
/// Dropping an uncommitted writer removes its directory.
#[derive(Debug)]
pub struct RunWriter {
    store: ArtifactStore,
    dir: PathBuf,
    manifest: RunManifest,
    committed: bool,
}

impl RunWriter {
    pub fn run_id(&self) -> &str {
        &self.manifest.run_id
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Serialize `value` as compact JSON into the run.
    pub fn write_json<T: Serialize>(&mut self, name: &str, value: &T) -> Result<()> {
        let bytes = serde_json::to_vec(value)?;
        self.write_bytes(name, &bytes)
    }

    /// Serialize `value` as indented JSON into the run.
    pub fn write_json_pretty<T: Serialize>(&mut self, name: &str, value: &T) -> Result<()> {
        let bytes = serde_json::to_vec_pretty(value)?;
        self.write_bytes(name, &bytes)
    }

    fn write_bytes(&mut self, name: &str, bytes: &[u8]) -> Result<()> {
        if name == MANIFEST_FILE {
            return Err(LearningError::InvalidConfig(format!(
                "{MANIFEST_FILE} is reserved for the run manifest"
            )));
        }
        write_atomic(&self.dir, name, bytes)?;
        debug!("Wrote {} ({} bytes)", name, bytes.len());
        if !self.manifest.contains(name) {
            self.manifest.artifacts.push(name.to_string());
        }
        Ok(())
    }

    /// Write the manifest, making the run visible to readers, then prune
    /// the runs it supersedes.
    ///
    /// A failed prune is logged; the committed run stays valid.
    pub fn commit(mut self) -> Result<RunManifest> {
        let bytes = serde_json::to_vec_pretty(&self.manifest)?;
        write_atomic(&self.dir, MANIFEST_FILE, &bytes)?;
        self.committed = true;
        if let Err(e) = self.store.prune_superseded() {
            warn!("Could not prune superseded runs: {}", e);
        }
        Ok(self.manifest.clone())
    }
}

impl Drop for RunWriter {
    fn drop(&mut self) {
        if !self.committed {
            if let Err(e) = fs::remove_dir_all(&self.dir) {
                warn!("Could not remove incomplete run {}: {}", self.dir.display(), e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    #[test]
    fn test_empty_store_has_no_runs() {
        let tmp = TempDir::new().unwrap();
        let store = ArtifactStore::new(tmp.path().join("missing"));
        assert!(store.complete_runs().unwrap().is_empty());
        assert!(store.resolve(REPORT_FILE).unwrap_err().is_not_found());
    }

    #[test]
    fn test_commit_makes_artifacts_visible() {
        let tmp = TempDir::new().unwrap();
        let store = ArtifactStore::new(tmp.path());

        let mut run = store.begin_run(RunKind::Optimizer).unwrap();
        run.write_json(OPTIMIZER_MODEL, &vec![1.0, 2.0]).unwrap();
        assert!(store.resolve(OPTIMIZER_MODEL).unwrap_err().is_not_found());

        let manifest = run.commit().unwrap();
        assert_eq!(manifest.artifacts, vec![OPTIMIZER_MODEL.to_string()]);
        let loaded: Vec<f64> = store.load(OPTIMIZER_MODEL).unwrap();
        assert_eq!(loaded, vec![1.0, 2.0]);
    }

    #[test]
    fn test_dropped_writer_leaves_nothing() {
        let tmp = TempDir::new().unwrap();
        let store = ArtifactStore::new(tmp.path());
        let dir = {
            let mut run = store.begin_run(RunKind::Classical).unwrap();
            run.write_json(REPORT_FILE, &"partial").unwrap();
            run.dir().to_path_buf()
        };
        assert!(!dir.exists());
    }

    #[test]
    fn test_newest_run_listing_the_name_wins() {
        let tmp = TempDir::new().unwrap();
        let store = ArtifactStore::new(tmp.path());

        let mut first = store.begin_run(RunKind::Classical).unwrap();
        first.write_json("a.joblib", &1).unwrap();
        first.write_json("b.joblib", &1).unwrap();
        first.commit().unwrap();

        let mut second = store.begin_run(RunKind::Classical).unwrap();
        second.write_json("a.joblib", &2).unwrap();
        second.commit().unwrap();

        assert_eq!(store.load::<i32>("a.joblib").unwrap(), 2);
        assert_eq!(store.load::<i32>("b.joblib").unwrap(), 1);
        assert_eq!(store.complete_runs().unwrap().len(), 2);
    }

    #[test]
    fn test_superseded_runs_are_pruned() {
        let tmp = TempDir::new().unwrap();
        let store = ArtifactStore::new(tmp.path());

        for value in 0..5 {
            let mut run = store.begin_run(RunKind::Classical).unwrap();
            run.write_json("a.joblib", &value).unwrap();
            run.write_json(REPORT_FILE, &value).unwrap();
            run.commit().unwrap();
        }

        let runs = store.complete_runs().unwrap();
        assert_eq!(runs.len(), 1);
        assert_eq!(store.load::<i32>("a.joblib").unwrap(), 4);
        assert_eq!(fs::read_dir(store.runs_dir()).unwrap().count(), 1);
    }

    #[test]
    fn test_newest_run_of_each_kind_survives_pruning() {
        let tmp = TempDir::new().unwrap();
        let store = ArtifactStore::new(tmp.path());

        let mut optimizer = store.begin_run(RunKind::Optimizer).unwrap();
        optimizer.write_json(REPORT_FILE, &"optimizer").unwrap();
        optimizer.commit().unwrap();

        let mut classical = store.begin_run(RunKind::Classical).unwrap();
        classical.write_json(REPORT_FILE, &"classical").unwrap();
        classical.commit().unwrap();

        let kinds: Vec<RunKind> = store.complete_runs().unwrap().iter().map(|m| m.kind).collect();
        assert_eq!(kinds, vec![RunKind::Classical, RunKind::Optimizer]);
        assert_eq!(store.load::<String>(REPORT_FILE).unwrap(), "classical");
    }

    #[test]
    fn test_prune_leaves_incomplete_runs_alone() {
        let tmp = TempDir::new().unwrap();
        let store = ArtifactStore::new(tmp.path());

        let pending = store.begin_run(RunKind::Classical).unwrap();
        let mut done = store.begin_run(RunKind::Classical).unwrap();
        done.write_json("a.joblib", &1).unwrap();
        done.commit().unwrap();

        assert!(store.prune_superseded().unwrap().is_empty());
        assert!(pending.dir().exists());
    }

    #[test]
    fn test_unreadable_manifest_is_skipped() {
        let tmp = TempDir::new().unwrap();
        let store = ArtifactStore::new(tmp.path());

        let mut run = store.begin_run(RunKind::Classical).unwrap();
        run.write_json("a.joblib", &7).unwrap();
        let good = run.commit().unwrap();

        let stray = store.runs_dir().join("99991231T235959999999Z-classical");
        fs::create_dir_all(&stray).unwrap();
        fs::write(stray.join(MANIFEST_FILE), b"{ not json").unwrap();

        let runs = store.complete_runs().unwrap();
        assert_eq!(runs.len(), 1);
        assert_eq!(runs[0].run_id, good.run_id);
        assert_eq!(store.load::<i32>("a.joblib").unwrap(), 7);
    }

    #[test]
    fn test_undecodable_artifact_is_corrupt() {
        let tmp = TempDir::new().unwrap();
        let store = ArtifactStore::new(tmp.path());
        let mut run = store.begin_run(RunKind::Classical).unwrap();
        run.write_json("x.joblib", &"text").unwrap();
        let manifest = run.commit().unwrap();

        let err = store.load::<Vec<f64>>("x.joblib").unwrap_err();
        assert!(matches!(err, LearningError::ArtifactCorrupt { .. }));
        assert!(err.to_string().contains(&manifest.run_id));
    }

    #[test]
    fn test_manifest_name_is_reserved() {
        let tmp = TempDir::new().unwrap();
        let store = ArtifactStore::new(tmp.path());
        let mut run = store.begin_run(RunKind::Classical).unwrap();
        assert!(run.write_json(MANIFEST_FILE, &0).is_err());
    }

    #[test]
    fn test_artifact_names() {
        assert_eq!(classifier_artifact("rf"), "classifier_rf.joblib");
        assert_eq!(regressor_artifact("gbr"), "regressor_gbr.joblib");
    }
}
