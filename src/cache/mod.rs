//! # Content-Addressed Result Cache
//!
//! A test file's identity is the SHA-256 over the bytes of its dependency set:
//! the file itself, everything it transitively imports, and every fixture its
//! cases reference. Files are folded in sorted path order, so identical content
//! always yields an identical hash.
//!
//! A recorded outcome is reused only while the hash still matches. Whether a
//! cached *failure* may be trusted is the caller's decision; the runner never
//! trusts one.

use std::cell::RefCell;
use std::collections::{BTreeSet, HashMap};
use std::fs::File;
use std::io;
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::rc::Rc;

use sha2::{Digest, Sha256};
use tracing::{debug, warn};

use crate::errors::{panic_message, ManitestError, Result};
use crate::evaluator::{normalize_path, Evaluator, ManifestProgram};
use crate::manifest::{Expectation, TestManifest};

pub mod store;

pub use store::{CacheEntry, CacheStore, DEFAULT_CACHE_FILE};

/// Hex-encoded SHA-256 digest.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ContentHash(pub String);

impl ContentHash {
    /// Digest over the concatenated contents of `files`, in iteration order.
    pub fn of_files<'a>(files: impl IntoIterator<Item = &'a Path>) -> Result<Self> {
        let mut hasher = Sha256::new();
        for file in files {
            let mut handle = File::open(file).map_err(|e| ManitestError::io(file, e))?;
            io::copy(&mut handle, &mut hasher).map_err(|e| ManitestError::io(file, e))?;
        }
        Ok(ContentHash(format!("{:x}", hasher.finalize())))
    }

    pub fn short(&self) -> &str {
        &self.0[..self.0.len().min(8)]
    }
}

/// Computes dependency hashes and validates recorded outcomes against them.
pub struct CacheManager {
    evaluator: Rc<RefCell<dyn Evaluator>>,
    store: CacheStore,
    /// Per-run memo, test file -> hash.
    hashes: HashMap<PathBuf, ContentHash>,
}

impl CacheManager {
    pub fn new(evaluator: Rc<RefCell<dyn Evaluator>>, store: CacheStore) -> Self {
        Self {
            evaluator,
            store,
            hashes: HashMap::new(),
        }
    }

    /// The recorded success flag for `file`, if its hash is unchanged.
    pub fn lookup(&mut self, file: &Path) -> Result<Option<bool>> {
        let Some(entry) = self.store.get(file).cloned() else {
            return Ok(None);
        };
        let hash = self.compute_hash(file)?;
        if entry.hash == hash.0 {
            Ok(Some(entry.success))
        } else {
            debug!(file = %file.display(), "cache entry is stale");
            Ok(None)
        }
    }

    /// Records the outcome of `file` against its current hash.
    pub fn record(&mut self, file: &Path, success: bool) -> Result<()> {
        let hash = self.compute_hash(file)?;
        self.store.insert(
            file,
            CacheEntry {
                success,
                hash: hash.0,
            },
        );
        Ok(())
    }

    pub fn save(&self) -> Result<()> {
        self.store.save()
    }

    pub fn store(&self) -> &CacheStore {
        &self.store
    }

    /// Hash over the dependency set of `file`, memoized for the run.
    pub fn compute_hash(&mut self, file: &Path) -> Result<ContentHash> {
        if let Some(hash) = self.hashes.get(file) {
            return Ok(hash.clone());
        }
        let deps = self.dependencies(file)?;
        let hash = ContentHash::of_files(deps.iter().map(PathBuf::as_path))?;
        debug!(file = %file.display(), hash = hash.short(), files = deps.len(), "hashed dependency set");
        self.hashes.insert(file.to_path_buf(), hash.clone());
        Ok(hash)
    }

    /// The sorted, deduplicated set of files contributing to `file`'s identity.
    ///
    /// A panic inside the evaluator is recovered here and reported as
    /// [`ManitestError::DependencyDiscovery`], so one broken file cannot take
    /// the batch down.
    pub fn dependencies(&mut self, file: &Path) -> Result<BTreeSet<PathBuf>> {
        let evaluator = self.evaluator.clone();
        let discovered = panic::catch_unwind(AssertUnwindSafe(|| {
            Self::discover(&mut *evaluator.borrow_mut(), file)
        }));
        match discovered {
            Ok(result) => result,
            Err(payload) => {
                let message = panic_message(payload.as_ref());
                warn!(file = %file.display(), "evaluator panicked with {message}");
                Err(ManitestError::DependencyDiscovery {
                    file: file.to_path_buf(),
                    reason: format!("evaluator panicked: {message}"),
                })
            }
        }
    }

    fn discover(evaluator: &mut dyn Evaluator, file: &Path) -> Result<BTreeSet<PathBuf>> {
        let discovery_error = |reason: String| ManitestError::DependencyDiscovery {
            file: file.to_path_buf(),
            reason,
        };

        let mut deps = BTreeSet::new();
        deps.insert(normalize_path(file));

        let imports = evaluator
            .find_static_imports(file)
            .map_err(|e| discovery_error(e.to_string()))?;
        deps.extend(imports.iter().map(|p| normalize_path(p)));

        // Only the expectation fields are needed; `actual` is the expensive part.
        let program = evaluator.manifest_program(file, ManifestProgram::FixturesOnly);
        let value = evaluator
            .evaluate_snippet(&file.display().to_string(), &program)
            .map_err(|e| discovery_error(e.to_string()))?;
        let manifest =
            TestManifest::from_value(file, value).map_err(|e| ManitestError::SetupFailed {
                file: file.to_path_buf(),
                reason: e.to_string(),
            })?;

        for case in manifest.cases.values() {
            match &case.expectation {
                Expectation::Malformed => {
                    return Err(discovery_error(format!(
                        "unable to determine fixture of case '{}'",
                        case.name
                    )))
                }
                expectation => {
                    if let Some(fixture) = expectation.fixture_path() {
                        deps.insert(normalize_path(fixture));
                    }
                }
            }
        }
        Ok(deps)
    }
}
