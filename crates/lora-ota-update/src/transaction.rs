//! Transactional file replacement with backup-based rollback.
//!
//! Pending changes are recorded purely through sibling files:
//!
//! - `<name>.bak`: previous live content, restored on revert
//! - `<name>.del`: `<name>` did not exist before the session, removed on revert
//! - `<name>.tmp`: a write in progress, always discarded on revert
//!
//! Only `rename` is relied on for atomicity. Commit deletes the artifacts;
//! revert restores from them. Both walk the whole device root, so they also
//! work as a crash-recovery sweep after an interrupted session.

use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};

use walkdir::WalkDir;

use crate::error::{OtaError, OtaResult};
use crate::text_patch;

/// Kind of a pending-change artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ArtifactKind {
    /// `.del` creation marker
    CreatedMarker,
    /// `.bak` backup of previous content
    Backup,
    /// `.tmp` interrupted write
    Temp,
}

impl ArtifactKind {
    /// File name suffix, without the dot.
    #[must_use]
    pub fn suffix(self) -> &'static str {
        match self {
            Self::CreatedMarker => "del",
            Self::Backup => "bak",
            Self::Temp => "tmp",
        }
    }

    const ALL: [ArtifactKind; 3] = [Self::CreatedMarker, Self::Backup, Self::Temp];

    fn of(path: &Path) -> Option<(Self, PathBuf)> {
        let name = path.file_name()?.to_str()?;
        Self::ALL.into_iter().find_map(|kind| {
            let stem = name.strip_suffix(kind.suffix())?.strip_suffix('.')?;
            (!stem.is_empty()).then(|| (kind, path.with_file_name(stem)))
        })
    }
}

/// A pending-change artifact found below the device root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    /// What the artifact records
    pub kind: ArtifactKind,
    /// Path of the artifact itself
    pub path: PathBuf,
    /// Live file the artifact belongs to
    pub target: PathBuf,
}

/// What a revert did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RevertReport {
    /// Files restored from `.bak`
    pub restored: usize,
    /// Files removed because of a `.del` marker
    pub removed: usize,
    /// Stray `.tmp` files discarded
    pub discarded: usize,
    /// Artifacts that could not be reverted and were left in place
    pub failed: Vec<PathBuf>,
}

impl RevertReport {
    /// Whether the revert touched anything.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.restored == 0 && self.removed == 0 && self.discarded == 0 && self.failed.is_empty()
    }

    /// Whether every artifact was reverted.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }

    fn count(&mut self, kind: ArtifactKind) {
        let counter = match kind {
            ArtifactKind::CreatedMarker => &mut self.removed,
            ArtifactKind::Backup => &mut self.restored,
            ArtifactKind::Temp => &mut self.discarded,
        };
        *counter = counter.saturating_add(1);
    }
}

/// Applies verified patches under a device root and keeps them revertible
/// until commit.
#[derive(Debug)]
pub struct FileTransactionManager {
    root: PathBuf,
    // Names whose pre-session state is already recorded this session.
    recorded: HashSet<String>,
}

impl FileTransactionManager {
    /// Create a manager for the files below `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            recorded: HashSet::new(),
        }
    }

    /// Device root.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve a protocol filename to its live path.
    ///
    /// # Errors
    ///
    /// Returns [`OtaError::InvalidFilename`] for empty or absolute names,
    /// names with `..` or other non-plain components, and names that end in
    /// an artifact suffix.
    pub fn live_path(&self, name: &str) -> OtaResult<PathBuf> {
        let invalid = || OtaError::InvalidFilename(name.to_string());
        let path = Path::new(name);

        if name.is_empty() || name.contains('\0') {
            return Err(invalid());
        }
        if !path.components().all(|c| matches!(c, Component::Normal(_))) {
            return Err(invalid());
        }
        if ArtifactKind::of(path).is_some() {
            return Err(invalid());
        }
        Ok(self.root.join(path))
    }

    /// Whether a live file exists for `name`.
    ///
    /// # Errors
    ///
    /// Returns [`OtaError::InvalidFilename`] for names outside the root.
    pub fn exists(&self, name: &str) -> OtaResult<bool> {
        Ok(self.live_path(name)?.is_file())
    }

    /// Current content of `name`, empty if it does not exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the name is invalid or the file cannot be read.
    pub fn read_text(&self, name: &str) -> OtaResult<String> {
        let path = self.live_path(name)?;
        match fs::read_to_string(&path) {
            Ok(text) => Ok(text),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(String::new()),
            Err(e) => Err(OtaError::file_io("read", path, e)),
        }
    }

    /// Move the live file to `<name>.bak`, replacing a backup left by an
    /// older session. Does nothing if the live file is absent.
    ///
    /// If `name` already has a record in this session, the live file is
    /// removed and the original record is kept.
    ///
    /// # Errors
    ///
    /// Returns an error if the name is invalid or a rename fails.
    pub fn backup(&mut self, name: &str) -> OtaResult<()> {
        let live = self.live_path(name)?;
        if !live.is_file() {
            return Ok(());
        }
        if self.recorded.contains(name) {
            return remove_if_exists(&live);
        }

        let bak = artifact_path(&live, ArtifactKind::Backup);
        remove_if_exists(&bak)?;
        fs::rename(&live, &bak).map_err(|e| OtaError::file_io("backup", &live, e))?;

        tracing::debug!(file = %name, "backed up");
        self.recorded.insert(name.to_string());
        Ok(())
    }

    /// Record that `name` did not exist before this session.
    ///
    /// # Errors
    ///
    /// Returns an error if the name is invalid or the marker cannot be
    /// created.
    pub fn mark_created(&mut self, name: &str) -> OtaResult<()> {
        let live = self.live_path(name)?;
        let marker = artifact_path(&live, ArtifactKind::CreatedMarker);
        create_parent(&marker)?;
        fs::File::create(&marker).map_err(|e| OtaError::file_io("mark", &marker, e))?;

        tracing::debug!(file = %name, "marked as created");
        self.recorded.insert(name.to_string());
        Ok(())
    }

    /// Replace `name` with `content` so that the live file is never
    /// half-written.
    ///
    /// The content goes to `<name>.tmp` first. The first write of a name in
    /// a session records its previous state (backup or creation marker);
    /// the temp file is then renamed over the live name.
    ///
    /// # Errors
    ///
    /// Returns an error if any step fails. The temp file is removed and the
    /// live file is either untouched or already safely backed up.
    pub fn write_atomic(&mut self, name: &str, content: &str) -> OtaResult<()> {
        let live = self.live_path(name)?;
        let tmp = artifact_path(&live, ArtifactKind::Temp);

        create_parent(&tmp)?;
        if let Err(e) = fs::write(&tmp, content) {
            discard_temp(&tmp);
            return Err(OtaError::file_io("write", &tmp, e));
        }

        if !self.recorded.contains(name) {
            let recorded = if live.is_file() {
                self.backup(name)
            } else {
                self.mark_created(name)
            };
            if let Err(e) = recorded {
                discard_temp(&tmp);
                return Err(e);
            }
        }

        fs::rename(&tmp, &live).map_err(|e| {
            discard_temp(&tmp);
            OtaError::file_io("replace", &live, e)
        })
    }

    /// Apply every verified patch.
    ///
    /// All patches are parsed and applied in memory first; files are only
    /// written once every hunk of every patch has applied.
    ///
    /// # Errors
    ///
    /// Returns [`OtaError::PatchParse`] or [`OtaError::PatchApplyFailed`]
    /// before anything is written, or a file error from the write phase.
    pub fn apply_all(&mut self, patches: &BTreeMap<String, String>) -> OtaResult<usize> {
        let mut outputs = Vec::with_capacity(patches.len());

        for (name, patch_text) in patches {
            let hunks = text_patch::parse(patch_text).map_err(|e| OtaError::PatchParse {
                file: name.clone(),
                reason: e.to_string(),
            })?;
            let current = self.read_text(name)?;
            let (patched, results) = text_patch::apply(&hunks, &current);

            let failed_hunks = results.iter().filter(|ok| !**ok).count();
            if failed_hunks > 0 {
                return Err(OtaError::PatchApplyFailed {
                    file: name.clone(),
                    failed_hunks,
                    total_hunks: results.len(),
                });
            }
            outputs.push((name, patched));
        }

        for (name, patched) in &outputs {
            self.write_atomic(name, patched)?;
            tracing::info!(file = %name, "file updated");
        }
        Ok(outputs.len())
    }

    /// Make pending changes permanent by deleting every `.bak` and `.del`.
    ///
    /// # Errors
    ///
    /// Returns an error if the root cannot be walked or an artifact cannot
    /// be removed.
    pub fn commit(&mut self) -> OtaResult<usize> {
        let mut removed = 0_usize;
        for artifact in self.pending_artifacts()? {
            if artifact.kind == ArtifactKind::Temp {
                continue;
            }
            remove_if_exists(&artifact.path)?;
            removed = removed.saturating_add(1);
        }
        self.recorded.clear();
        tracing::info!(artifacts = removed, "changes committed");
        Ok(removed)
    }

    /// Restore the pre-session state.
    ///
    /// `.del` markers are processed before `.bak` restores, then stray
    /// `.tmp` files are discarded. An artifact that cannot be reverted is
    /// left in place and the sweep carries on with the rest. Running it
    /// again with no artifacts left changes nothing.
    ///
    /// # Errors
    ///
    /// Returns an error if the root cannot be walked, or
    /// [`OtaError::RevertIncomplete`] once every artifact has been tried
    /// and at least one is still pending.
    pub fn revert(&mut self) -> OtaResult<RevertReport> {
        let mut report = RevertReport::default();
        let mut first_error = None;

        for artifact in self.pending_artifacts()? {
            match revert_artifact(&artifact) {
                Ok(()) => report.count(artifact.kind),
                Err(e) => {
                    tracing::error!(
                        artifact = %artifact.path.display(),
                        error = %e,
                        "artifact not reverted"
                    );
                    report.failed.push(artifact.path);
                    first_error.get_or_insert(e);
                }
            }
        }

        self.recorded.clear();
        if !report.is_empty() {
            tracing::warn!(
                restored = report.restored,
                removed = report.removed,
                discarded = report.discarded,
                failed = report.failed.len(),
                "pending changes reverted"
            );
        }

        match first_error {
            None => Ok(report),
            Some(source) => Err(OtaError::RevertIncomplete {
                report,
                source: Box::new(source),
            }),
        }
    }

    /// Every artifact below the root, markers first, then backups, then
    /// temp files.
    ///
    /// # Errors
    ///
    /// Returns an error if the root cannot be walked.
    pub fn pending_artifacts(&self) -> OtaResult<Vec<Artifact>> {
        let mut artifacts = Vec::new();
        if !self.root.exists() {
            return Ok(artifacts);
        }

        for entry in WalkDir::new(&self.root).follow_links(false) {
            let entry = entry.map_err(|e| {
                let path = e.path().map_or_else(|| self.root.clone(), Path::to_path_buf);
                OtaError::file_io("scan", path, io::Error::other(e))
            })?;
            if !entry.file_type().is_file() {
                continue;
            }
            if let Some((kind, target)) = ArtifactKind::of(entry.path()) {
                artifacts.push(Artifact {
                    kind,
                    path: entry.into_path(),
                    target,
                });
            }
        }

        artifacts.sort_by(|a, b| a.kind.cmp(&b.kind).then_with(|| a.path.cmp(&b.path)));
        Ok(artifacts)
    }
}

fn artifact_path(live: &Path, kind: ArtifactKind) -> PathBuf {
    let mut name = live.as_os_str().to_owned();
    name.push(".");
    name.push(kind.suffix());
    PathBuf::from(name)
}

fn revert_artifact(artifact: &Artifact) -> OtaResult<()> {
    match artifact.kind {
        ArtifactKind::CreatedMarker => {
            remove_if_exists(&artifact.target)?;
            remove_if_exists(&artifact.path)
        }
        ArtifactKind::Backup => fs::rename(&artifact.path, &artifact.target)
            .map_err(|e| OtaError::file_io("restore", &artifact.target, e)),
        ArtifactKind::Temp => remove_if_exists(&artifact.path),
    }
}

fn remove_if_exists(path: &Path) -> OtaResult<()> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(OtaError::file_io("remove", path, e)),
    }
}

fn create_parent(path: &Path) -> OtaResult<()> {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => {
            fs::create_dir_all(parent).map_err(|e| OtaError::file_io("mkdir", parent, e))
        }
        _ => Ok(()),
    }
}

fn discard_temp(tmp: &Path) {
    if let Err(e) = remove_if_exists(tmp) {
        tracing::warn!(error = %e, "could not discard temp file");
    }
}
