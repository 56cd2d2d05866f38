//! File-backed repository for project documents.
//!
//! Layout: `<data_dir>/projects/{local,hosted}/<sanitized-name>.json`, with
//! one `<sanitized-name>_assets/` directory per project for uploaded
//! binaries. The file is the state — every mutation round-trips through
//! `save`, and there is no in-memory-only persistent state.
//!
//! Filenames are a lossy sanitized derivation of the project name, so
//! `load`/`list` resolve documents by scanning file contents and matching
//! the stored `name` field, never by filename. This is O(number of
//! projects) per call by design; callers needing repeated lookups should
//! cache.

pub mod sanitize;

use crate::board::codec;
use crate::board::{Project, ProjectSummary, ProjectType};
use crate::error::StoreError;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::{debug, warn};

/// Upper bound on collision-suffix probing when distinct names sanitize to
/// the same filename.
const MAX_COLLISION_PROBES: u32 = 10_000;

/// Outcome of a delete: the document removal succeeded; asset cleanup may
/// have failed, which is reported here as a warning rather than rolled back.
#[derive(Debug, Clone, PartialEq)]
pub struct DeleteReport {
    pub assets_removed: bool,
    pub warning: Option<String>,
}

/// Minimal probe of a document used to match on the stored `name` without
/// building the full model.
#[derive(Deserialize)]
struct NameProbe {
    name: String,
}

/// Listing probe: grid names only, element bodies are never modeled.
#[derive(Deserialize)]
struct SummaryProbe {
    name: String,
    #[serde(default)]
    owner_name: String,
    #[serde(default)]
    grid: Vec<GridProbe>,
    #[serde(default, rename = "lastModified")]
    last_modified: Option<String>,
}

#[derive(Deserialize)]
struct GridProbe {
    #[serde(default, rename = "name")]
    _name: String,
}

/// Sanitized-path file repository for project aggregates with atomic saves
/// and per-project-name write serialization.
pub struct DocumentStore {
    root: PathBuf,
    /// Per-project-name write locks: "read old → mutate → write" sequences
    /// from two collaborators must not interleave bytes. Last-writer-wins,
    /// but writes are serialized.
    locks: DashMap<(ProjectType, String), Arc<Mutex<()>>>,
    /// Count of directory-scanning reads (`load` + `list`), for cache tests
    /// and diagnostics.
    read_ops: AtomicU64,
}

impl DocumentStore {
    /// Open (creating if needed) a store rooted at `<data_dir>/projects/`.
    pub fn new(data_dir: impl AsRef<Path>) -> Result<Self, StoreError> {
        let root = data_dir.as_ref().join("projects");
        for project_type in ProjectType::ALL {
            std::fs::create_dir_all(root.join(project_type.dir_name()))?;
        }
        Ok(Self {
            root,
            locks: DashMap::new(),
            read_ops: AtomicU64::new(0),
        })
    }

    /// Root of the persisted layout (`<data_dir>/projects`). Served
    /// statically so asset URLs of the form
    /// `/projects/{type}/{name}_assets/{file}` resolve.
    pub fn projects_root(&self) -> &Path {
        &self.root
    }

    /// Number of directory-scanning reads performed so far.
    pub fn read_ops(&self) -> u64 {
        self.read_ops.load(Ordering::Relaxed)
    }

    /// Cheap liveness probe: both type directories exist.
    pub fn health_check(&self) -> bool {
        ProjectType::ALL
            .iter()
            .all(|t| self.root.join(t.dir_name()).is_dir())
    }

    fn type_dir(&self, project_type: ProjectType) -> PathBuf {
        self.root.join(project_type.dir_name())
    }

    async fn lock_for(
        &self,
        project_type: ProjectType,
        name: &str,
    ) -> tokio::sync::OwnedMutexGuard<()> {
        let lock = {
            let entry = self
                .locks
                .entry((project_type, name.to_string()))
                .or_default();
            Arc::clone(entry.value())
        };
        lock.lock_owned().await
    }

    // ========================================================================
    // Save
    // ========================================================================

    /// Serialize and persist a project, returning the `lastModified` stamp
    /// written to disk.
    ///
    /// The write is atomic (temp file, fsync, rename): a crash mid-write
    /// never replaces a previously valid document with a torn one.
    /// Concurrent saves of the same logical project serialize on a
    /// per-name lock.
    pub async fn save(&self, project: &Project) -> Result<String, StoreError> {
        if project.name.trim().is_empty() {
            return Err(StoreError::Validation("project name is empty".into()));
        }
        let mut grid_names = std::collections::HashSet::new();
        for grid in &project.grids {
            if !grid_names.insert(grid.name.as_str()) {
                return Err(StoreError::Validation(format!(
                    "duplicate grid name: {:?}",
                    grid.name
                )));
            }
        }
        let _guard = self.lock_for(project.project_type, &project.name).await;

        let path = self
            .resolve_save_path(project.project_type, &project.name)
            .await?;

        let stamp = Utc::now().to_rfc3339();
        let mut stamped = project.clone();
        stamped.last_modified = Some(stamp.clone());
        let doc = codec::encode_project(&stamped);
        let bytes = serde_json::to_vec_pretty(&doc)?;

        atomic_write(&path, &bytes).await?;
        debug!(name = %project.name, path = %path.display(), "project saved");
        Ok(stamp)
    }

    /// Pick the on-disk path for a project name.
    ///
    /// Prefers the file that already holds this exact name (content match).
    /// Otherwise derives the sanitized filename, probing `_2`, `_3`, … past
    /// files owned by *different* names that collide on the same sanitized
    /// string — a collision must never overwrite the other project.
    async fn resolve_save_path(
        &self,
        project_type: ProjectType,
        name: &str,
    ) -> Result<PathBuf, StoreError> {
        if let Some(existing) = self.find_project_file(project_type, name).await? {
            return Ok(existing);
        }

        let stem = sanitize::sanitize_name(name)
            .ok_or_else(|| StoreError::Validation(format!("unsanitizable project name: {name:?}")))?;
        let dir = self.type_dir(project_type);

        for probe in 0..MAX_COLLISION_PROBES {
            let candidate = if probe == 0 {
                dir.join(format!("{stem}.json"))
            } else {
                dir.join(format!("{stem}_{}.json", probe + 1))
            };
            if !tokio::fs::try_exists(&candidate).await? {
                return Ok(candidate);
            }
        }
        Err(StoreError::Validation(format!(
            "exhausted collision suffixes for {name:?}"
        )))
    }

    // ========================================================================
    // Load / list
    // ========================================================================

    /// Load a project by its exact stored name.
    ///
    /// Linearly scans the type directory and matches on document content —
    /// the sanitized filename is not invertible and is never used as a key.
    pub async fn load(
        &self,
        name: &str,
        project_type: ProjectType,
    ) -> Result<Project, StoreError> {
        self.read_ops.fetch_add(1, Ordering::Relaxed);
        let path = self
            .find_project_file(project_type, name)
            .await?
            .ok_or_else(|| StoreError::NotFound(format!("project {name:?} ({project_type})")))?;

        let contents = tokio::fs::read_to_string(&path).await?;
        let value: serde_json::Value = serde_json::from_str(&contents)?;
        codec::decode_project(value, project_type)
    }

    /// Lightweight summaries of every project of a type.
    ///
    /// Element bodies are not modeled; a file that fails to parse is logged
    /// and skipped so one corrupt document cannot hide the rest.
    pub async fn list(
        &self,
        project_type: ProjectType,
    ) -> Result<Vec<ProjectSummary>, StoreError> {
        self.read_ops.fetch_add(1, Ordering::Relaxed);
        let mut summaries = Vec::new();

        for path in self.json_files(project_type).await? {
            let contents = match tokio::fs::read_to_string(&path).await {
                Ok(c) => c,
                Err(e) => {
                    warn!(path = %path.display(), "unreadable project file: {e}");
                    continue;
                }
            };
            let probe: SummaryProbe = match serde_json::from_str(&contents) {
                Ok(p) => p,
                Err(e) => {
                    warn!(path = %path.display(), "skipping unparsable project file: {e}");
                    continue;
                }
            };

            let last_modified = match probe.last_modified {
                Some(stamp) => Some(stamp),
                None => file_mtime_rfc3339(&path).await,
            };
            summaries.push(ProjectSummary {
                name: probe.name,
                owner_name: probe.owner_name,
                grid_count: probe.grid.len(),
                last_modified,
            });
        }

        Ok(summaries)
    }

    // ========================================================================
    // Delete
    // ========================================================================

    /// Remove a project document and, as one logical operation, its asset
    /// directory.
    ///
    /// If asset cleanup fails after the document was removed, the failure is
    /// reported in the [`DeleteReport`] — the document is not re-created,
    /// since the deletion already succeeded from the user's perspective.
    pub async fn delete(
        &self,
        name: &str,
        project_type: ProjectType,
    ) -> Result<DeleteReport, StoreError> {
        let _guard = self.lock_for(project_type, name).await;

        let path = self
            .find_project_file(project_type, name)
            .await?
            .ok_or_else(|| StoreError::NotFound(format!("project {name:?} ({project_type})")))?;

        tokio::fs::remove_file(&path).await?;

        let assets = assets_dir_of(&path);
        match tokio::fs::try_exists(&assets).await {
            Ok(false) => Ok(DeleteReport {
                assets_removed: false,
                warning: None,
            }),
            Ok(true) => match tokio::fs::remove_dir_all(&assets).await {
                Ok(()) => Ok(DeleteReport {
                    assets_removed: true,
                    warning: None,
                }),
                Err(e) => {
                    let warning =
                        format!("document deleted but asset cleanup failed: {e}");
                    warn!(assets = %assets.display(), "{warning}");
                    Ok(DeleteReport {
                        assets_removed: false,
                        warning: Some(warning),
                    })
                }
            },
            Err(e) => {
                let warning = format!("document deleted but asset probe failed: {e}");
                warn!(assets = %assets.display(), "{warning}");
                Ok(DeleteReport {
                    assets_removed: false,
                    warning: Some(warning),
                })
            }
        }
    }

    // ========================================================================
    // Assets
    // ========================================================================

    /// Store an uploaded binary in the project's asset directory and return
    /// its server-relative URL
    /// (`/projects/{type}/{sanitized_name}_assets/{file}`).
    pub async fn store_asset(
        &self,
        name: &str,
        project_type: ProjectType,
        file_name: &str,
        bytes: &[u8],
    ) -> Result<String, StoreError> {
        let _guard = self.lock_for(project_type, name).await;

        let doc_path = self
            .find_project_file(project_type, name)
            .await?
            .ok_or_else(|| StoreError::NotFound(format!("project {name:?} ({project_type})")))?;

        let safe_name = sanitize::sanitize_asset_name(file_name)
            .ok_or_else(|| StoreError::Validation(format!("unsanitizable file name: {file_name:?}")))?;

        let assets = assets_dir_of(&doc_path);
        tokio::fs::create_dir_all(&assets).await?;
        atomic_write(&assets.join(&safe_name), bytes).await?;

        let stem = doc_path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or_default();
        Ok(format!(
            "/projects/{}/{stem}_assets/{safe_name}",
            project_type.dir_name()
        ))
    }

    /// Delete a single uploaded file from the project's asset directory.
    pub async fn delete_asset(
        &self,
        name: &str,
        project_type: ProjectType,
        file_name: &str,
    ) -> Result<(), StoreError> {
        let _guard = self.lock_for(project_type, name).await;

        let doc_path = self
            .find_project_file(project_type, name)
            .await?
            .ok_or_else(|| StoreError::NotFound(format!("project {name:?} ({project_type})")))?;

        let safe_name = sanitize::sanitize_asset_name(file_name)
            .ok_or_else(|| StoreError::Validation(format!("unsanitizable file name: {file_name:?}")))?;

        let target = assets_dir_of(&doc_path).join(&safe_name);
        if !tokio::fs::try_exists(&target).await? {
            return Err(StoreError::NotFound(format!("asset {safe_name:?}")));
        }
        tokio::fs::remove_file(&target).await?;
        Ok(())
    }

    // ========================================================================
    // Scanning helpers
    // ========================================================================

    /// Find the document file whose stored `name` field equals `name`.
    async fn find_project_file(
        &self,
        project_type: ProjectType,
        name: &str,
    ) -> Result<Option<PathBuf>, StoreError> {
        for path in self.json_files(project_type).await? {
            let contents = match tokio::fs::read_to_string(&path).await {
                Ok(c) => c,
                Err(e) => {
                    warn!(path = %path.display(), "unreadable project file: {e}");
                    continue;
                }
            };
            match serde_json::from_str::<NameProbe>(&contents) {
                Ok(probe) if probe.name == name => return Ok(Some(path)),
                Ok(_) => {}
                Err(e) => {
                    warn!(path = %path.display(), "skipping unparsable project file: {e}");
                }
            }
        }
        Ok(None)
    }

    /// All `.json` documents of a type directory, in stable order.
    async fn json_files(&self, project_type: ProjectType) -> Result<Vec<PathBuf>, StoreError> {
        let dir = self.type_dir(project_type);
        let mut entries = tokio::fs::read_dir(&dir).await?;
        let mut files = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().is_some_and(|ext| ext == "json") {
                files.push(path);
            }
        }
        files.sort();
        Ok(files)
    }
}

/// Asset directory sibling of a document file: `<stem>_assets/`.
fn assets_dir_of(doc_path: &Path) -> PathBuf {
    let stem = doc_path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or_default();
    doc_path.with_file_name(format!("{stem}_assets"))
}

/// Write-to-temp, fsync, rename. Readers never observe a partial file.
async fn atomic_write(path: &Path, bytes: &[u8]) -> Result<(), StoreError> {
    let tmp = path.with_extension("tmp");
    {
        let mut file = tokio::fs::File::create(&tmp).await?;
        file.write_all(bytes).await?;
        file.sync_all().await?;
    }
    tokio::fs::rename(&tmp, path).await?;
    Ok(())
}

async fn file_mtime_rfc3339(path: &Path) -> Option<String> {
    let meta = tokio::fs::metadata(path).await.ok()?;
    let modified = meta.modified().ok()?;
    Some(DateTime::<Utc>::from(modified).to_rfc3339())
}
