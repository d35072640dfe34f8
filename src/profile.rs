//! Sandbox profile path resolution

use log::{debug, error};
use std::path::{Path, PathBuf};

/// Directory name probed for profiles
pub const PROFILE_DIR_NAME: &str = "sandbox_profiles";

/// Turns a profile name into the path handed to the sandbox tool.
///
/// An explicit override directory always wins. Otherwise the search roots are
/// probed in order and the first existing file is returned. When nothing
/// matches, the bare name is returned and the sandbox tool decides what to do
/// with it.
#[derive(Debug, Clone)]
pub struct ProfileResolver {
    override_dir: Option<PathBuf>,
    search_roots: Vec<PathBuf>,
}

impl ProfileResolver {
    /// Resolver rooted at the current working directory
    pub fn new(override_dir: Option<PathBuf>) -> Self {
        let search_roots = std::env::current_dir()
            .map(|cwd| default_search_roots(&cwd))
            .unwrap_or_default();

        Self {
            override_dir,
            search_roots,
        }
    }

    /// Resolver with explicit search roots
    pub fn with_search_roots(override_dir: Option<PathBuf>, search_roots: Vec<PathBuf>) -> Self {
        Self {
            override_dir,
            search_roots,
        }
    }

    pub fn search_roots(&self) -> &[PathBuf] {
        &self.search_roots
    }

    pub fn resolve(&self, name: &str) -> PathBuf {
        if let Some(dir) = &self.override_dir {
            return dir.join(name);
        }

        for root in &self.search_roots {
            let candidate = root.join(name);
            if candidate.is_file() {
                debug!("Resolved profile '{}' to {}", name, candidate.display());
                return candidate;
            }
        }

        error!("Could not find profile '{}', passing the bare name", name);
        PathBuf::from(name)
    }
}

/// `./sandbox_profiles`, `../sandbox_profiles`, `./sandbox-go/sandbox_profiles`
pub fn default_search_roots(cwd: &Path) -> Vec<PathBuf> {
    let mut roots = vec![cwd.join(PROFILE_DIR_NAME)];
    if let Some(parent) = cwd.parent() {
        roots.push(parent.join(PROFILE_DIR_NAME));
    }
    roots.push(cwd.join("sandbox-go").join(PROFILE_DIR_NAME));
    roots
}
