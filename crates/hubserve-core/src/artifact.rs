//! Offline model snapshot resolution
//!
//! Locates a previously downloaded model snapshot inside a Hugging Face style
//! cache without touching the network:
//!
//! ```text
//! {cache_root}/models--{org}--{name}/refs/main        <- snapshot hash
//! {cache_root}/models--{org}--{name}/snapshots/{hash}/
//! ```
//!
//! `refs/main` is preferred. When it is absent or points at a missing
//! snapshot, the lexicographically smallest snapshot directory is used. That
//! fallback is not "most recent"; deployments that need a specific revision
//! must ship a correct `refs/main`.

use crate::error::{ArtifactError, ArtifactResult};
use std::ffi::OsString;
use std::fmt;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

/// Model identifier in `org/name` form
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ModelIdentifier {
    org: String,
    name: String,
}

impl ModelIdentifier {
    /// Parse on the first `/`. Both segments must be non-empty; the name keeps
    /// any further `/` verbatim.
    pub fn parse(model_id: &str) -> ArtifactResult<Self> {
        let (org, name) = model_id
            .split_once('/')
            .ok_or_else(|| ArtifactError::InvalidModelIdentifier(model_id.to_string()))?;

        if org.is_empty() || name.is_empty() {
            return Err(ArtifactError::InvalidModelIdentifier(model_id.to_string()));
        }

        Ok(Self {
            org: org.to_string(),
            name: name.to_string(),
        })
    }

    pub fn org(&self) -> &str {
        &self.org
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Directory name of this model inside the cache root
    pub fn cache_dir_name(&self) -> String {
        format!("models--{}--{}", self.org, self.name)
    }
}

impl fmt::Display for ModelIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.org, self.name)
    }
}

impl std::str::FromStr for ModelIdentifier {
    type Err = ArtifactError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// Which branch of the resolution algorithm produced a snapshot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolutionSource {
    /// `refs/main` named an existing snapshot
    RefsMain,
    /// First snapshot directory in byte-wise name order
    Fallback,
}

impl fmt::Display for ResolutionSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResolutionSource::RefsMain => write!(f, "refs/main"),
            ResolutionSource::Fallback => write!(f, "fallback"),
        }
    }
}

/// An absolute path to exactly one snapshot directory
///
/// Computed once at startup and held for the life of the process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedSnapshot {
    model_id: ModelIdentifier,
    path: PathBuf,
    source: ResolutionSource,
}

impl ResolvedSnapshot {
    pub fn model_id(&self) -> &ModelIdentifier {
        &self.model_id
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn source(&self) -> ResolutionSource {
        self.source
    }

    /// Snapshot hash, i.e. the final path component
    pub fn revision(&self) -> &str {
        self.path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or_default()
    }

    pub fn into_path(self) -> PathBuf {
        self.path
    }
}

/// Read-only view of a local model cache
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    cache_root: PathBuf,
}

impl ArtifactStore {
    pub fn new(cache_root: impl Into<PathBuf>) -> Self {
        Self {
            cache_root: cache_root.into(),
        }
    }

    pub fn cache_root(&self) -> &Path {
        &self.cache_root
    }

    /// Root directory of a model inside this cache
    pub fn model_root(&self, model_id: &ModelIdentifier) -> PathBuf {
        self.cache_root.join(model_id.cache_dir_name())
    }

    /// Resolve a model to one snapshot directory.
    ///
    /// # Errors
    /// - `CacheRootMissing`: the model's `snapshots` directory does not exist
    /// - `EmptyCache`: `snapshots` holds no directories
    /// - `Io`: the cache layout exists but could not be read
    pub fn resolve(&self, model_id: &ModelIdentifier) -> ArtifactResult<ResolvedSnapshot> {
        let model_root = self.model_root(model_id);
        let snapshots_dir = model_root.join("snapshots");

        tracing::info!(
            model_id = %model_id,
            model_root = %model_root.display(),
            "resolving model snapshot"
        );

        if let Some(hash) = read_main_ref(&model_root)? {
            let candidate = snapshots_dir.join(&hash);
            if candidate.is_dir() {
                return self.finish(model_id, candidate, ResolutionSource::RefsMain);
            }
            tracing::warn!(
                model_id = %model_id,
                revision = %hash,
                "refs/main points at a missing snapshot, falling back"
            );
        }

        if !snapshots_dir.is_dir() {
            return Err(ArtifactError::CacheRootMissing(snapshots_dir));
        }

        let mut versions = list_snapshot_dirs(&snapshots_dir)?;
        if versions.is_empty() {
            return Err(ArtifactError::EmptyCache(snapshots_dir));
        }

        // OsString orders by encoded bytes
        versions.sort();
        let chosen = snapshots_dir.join(&versions[0]);

        tracing::warn!(
            model_id = %model_id,
            candidates = versions.len(),
            chosen = %chosen.display(),
            "using first snapshot in name order; this is not necessarily the newest revision"
        );

        self.finish(model_id, chosen, ResolutionSource::Fallback)
    }

    fn finish(
        &self,
        model_id: &ModelIdentifier,
        path: PathBuf,
        source: ResolutionSource,
    ) -> ArtifactResult<ResolvedSnapshot> {
        let path = std::path::absolute(&path).map_err(|source| ArtifactError::Io {
            path: path.clone(),
            source,
        })?;

        tracing::info!(
            model_id = %model_id,
            snapshot = %path.display(),
            source = %source,
            "resolved model snapshot"
        );

        Ok(ResolvedSnapshot {
            model_id: model_id.clone(),
            path,
            source,
        })
    }
}

/// Parse `model_id` and resolve it under `cache_root`
pub fn resolve_snapshot(
    model_id: &str,
    cache_root: impl AsRef<Path>,
) -> ArtifactResult<ResolvedSnapshot> {
    let model_id = ModelIdentifier::parse(model_id)?;
    ArtifactStore::new(cache_root.as_ref()).resolve(&model_id)
}

/// Read `refs/main` if it is a regular file. Returns `None` when the file is
/// absent or its content cannot name a snapshot directory.
fn read_main_ref(model_root: &Path) -> ArtifactResult<Option<String>> {
    let refs_main = model_root.join("refs").join("main");
    if !refs_main.is_file() {
        return Ok(None);
    }

    let content = match std::fs::read_to_string(&refs_main) {
        Ok(content) => content,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
        Err(source) => {
            return Err(ArtifactError::Io {
                path: refs_main,
                source,
            });
        }
    };

    let hash = content.trim();
    if !is_plain_component(hash) {
        tracing::warn!(
            refs_main = %refs_main.display(),
            "refs/main does not contain a usable snapshot hash, ignoring it"
        );
        return Ok(None);
    }

    Ok(Some(hash.to_string()))
}

/// A hash must name a single directory below `snapshots/`
fn is_plain_component(hash: &str) -> bool {
    !hash.is_empty()
        && hash != "."
        && hash != ".."
        && !hash.contains(['/', '\\'])
}

/// Names of the entries of `snapshots_dir` that are directories (following
/// symlinks)
fn list_snapshot_dirs(snapshots_dir: &Path) -> ArtifactResult<Vec<OsString>> {
    let io_err = |source| ArtifactError::Io {
        path: snapshots_dir.to_path_buf(),
        source,
    };

    let mut versions = Vec::new();
    for entry in std::fs::read_dir(snapshots_dir).map_err(io_err)? {
        let entry = entry.map_err(io_err)?;
        if entry.path().is_dir() {
            versions.push(entry.file_name());
        }
    }
    Ok(versions)
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    const MODEL: &str = "microsoft/Phi-3-mini-4k-instruct";

    fn model_root(cache: &TempDir) -> PathBuf {
        cache.path().join("models--microsoft--Phi-3-mini-4k-instruct")
    }

    fn add_snapshot(cache: &TempDir, hash: &str) -> PathBuf {
        let dir = model_root(cache).join("snapshots").join(hash);
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn write_main_ref(cache: &TempDir, content: &str) {
        let refs = model_root(cache).join("refs");
        fs::create_dir_all(&refs).unwrap();
        fs::write(refs.join("main"), content).unwrap();
    }

    #[test]
    fn test_parse_splits_on_first_separator() {
        let id = ModelIdentifier::parse("org/name/extra").unwrap();
        assert_eq!(id.org(), "org");
        assert_eq!(id.name(), "name/extra");
        assert_eq!(id.cache_dir_name(), "models--org--name/extra");
        assert_eq!(id.to_string(), "org/name/extra");
    }

    #[test]
    fn test_parse_rejects_missing_separator() {
        for bad in ["phi3", "", "no-slash-here"] {
            let result = ModelIdentifier::parse(bad);
            assert!(
                matches!(result, Err(ArtifactError::InvalidModelIdentifier(ref s)) if s == bad),
                "expected InvalidModelIdentifier for {bad:?}"
            );
        }
    }

    #[test]
    fn test_parse_rejects_empty_segments() {
        assert!(ModelIdentifier::parse("/name").is_err());
        assert!(ModelIdentifier::parse("org/").is_err());
        assert!("/".parse::<ModelIdentifier>().is_err());
    }

    #[test]
    fn test_refs_main_preferred_over_other_snapshots() {
        let cache = TempDir::new().unwrap();
        add_snapshot(&cache, "aaaa");
        let expected = add_snapshot(&cache, "h1");
        add_snapshot(&cache, "zzzz");
        write_main_ref(&cache, "  h1\n");

        let snap = resolve_snapshot(MODEL, cache.path()).unwrap();
        assert_eq!(snap.path(), expected.as_path());
        assert_eq!(snap.source(), ResolutionSource::RefsMain);
        assert_eq!(snap.revision(), "h1");
    }

    #[test]
    fn test_fallback_picks_lexicographic_minimum() {
        let cache = TempDir::new().unwrap();
        for hash in ["b", "a", "c"] {
            add_snapshot(&cache, hash);
        }

        let snap = resolve_snapshot(MODEL, cache.path()).unwrap();
        assert_eq!(snap.path(), model_root(&cache).join("snapshots").join("a"));
        assert_eq!(snap.source(), ResolutionSource::Fallback);
    }

    #[test]
    fn test_fallback_when_refs_main_points_nowhere() {
        let cache = TempDir::new().unwrap();
        add_snapshot(&cache, "b");
        add_snapshot(&cache, "a");
        write_main_ref(&cache, "deadbeef");

        let snap = resolve_snapshot(MODEL, cache.path()).unwrap();
        assert_eq!(snap.revision(), "a");
        assert_eq!(snap.source(), ResolutionSource::Fallback);
    }

    #[test]
    fn test_blank_or_escaping_refs_main_is_ignored() {
        let cache = TempDir::new().unwrap();
        add_snapshot(&cache, "only");

        for content in ["", "   \n", "..", "../only", "a/b"] {
            write_main_ref(&cache, content);
            let snap = resolve_snapshot(MODEL, cache.path()).unwrap();
            assert_eq!(snap.revision(), "only", "content {content:?}");
            assert_eq!(snap.source(), ResolutionSource::Fallback);
        }
    }

    #[test]
    fn test_files_in_snapshots_are_not_candidates() {
        let cache = TempDir::new().unwrap();
        let snapshots = model_root(&cache).join("snapshots");
        fs::create_dir_all(&snapshots).unwrap();
        fs::write(snapshots.join("0-not-a-dir"), b"x").unwrap();
        add_snapshot(&cache, "f00d");

        let snap = resolve_snapshot(MODEL, cache.path()).unwrap();
        assert_eq!(snap.revision(), "f00d");
    }

    #[test]
    fn test_empty_snapshots_dir_fails() {
        let cache = TempDir::new().unwrap();
        fs::create_dir_all(model_root(&cache).join("snapshots")).unwrap();

        let result = resolve_snapshot(MODEL, cache.path());
        assert!(matches!(result, Err(ArtifactError::EmptyCache(_))));
    }

    #[test]
    fn test_only_files_counts_as_empty() {
        let cache = TempDir::new().unwrap();
        let snapshots = model_root(&cache).join("snapshots");
        fs::create_dir_all(&snapshots).unwrap();
        fs::write(snapshots.join("README"), b"x").unwrap();

        let result = resolve_snapshot(MODEL, cache.path());
        assert!(matches!(result, Err(ArtifactError::EmptyCache(_))));
    }

    #[test]
    fn test_missing_snapshots_dir_fails() {
        let cache = TempDir::new().unwrap();
        write_main_ref(&cache, "h1");

        let result = resolve_snapshot(MODEL, cache.path());
        match result {
            Err(ArtifactError::CacheRootMissing(path)) => {
                assert!(path.ends_with("snapshots"));
            }
            other => panic!("expected CacheRootMissing, got {other:?}"),
        }
    }

    #[test]
    fn test_invalid_identifier_fails_before_touching_disk() {
        let result = resolve_snapshot("phi3", "/definitely/not/here");
        assert!(matches!(
            result,
            Err(ArtifactError::InvalidModelIdentifier(_))
        ));
    }

    #[test]
    fn test_resolved_path_is_absolute() {
        let cache = TempDir::new().unwrap();
        add_snapshot(&cache, "abc");
        let snap = resolve_snapshot(MODEL, cache.path()).unwrap();
        assert!(snap.path().is_absolute());
        assert_eq!(snap.model_id().to_string(), MODEL);
    }

    #[cfg(unix)]
    #[test]
    fn test_symlinked_snapshot_dirs_count() {
        let cache = TempDir::new().unwrap();
        let real = cache.path().join("elsewhere");
        fs::create_dir_all(&real).unwrap();
        let snapshots = model_root(&cache).join("snapshots");
        fs::create_dir_all(&snapshots).unwrap();
        std::os::unix::fs::symlink(&real, snapshots.join("linked")).unwrap();

        let snap = resolve_snapshot(MODEL, cache.path()).unwrap();
        assert_eq!(snap.revision(), "linked");
    }
}
