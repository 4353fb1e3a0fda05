//! Profile Store
//!
//! Profiles are opaque files under a single directory, identified by
//! basename. Which profile is "current" is a symlink in the management
//! root; reselection goes through a staging link renamed over the pointer,
//! so a reader never observes a missing pointer mid-swap.

use std::ffi::OsStr;
use std::fs;
use std::io;
use std::os::unix::fs::symlink;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::info;

/// Result type for store operations
pub type StoreResult<T> = Result<T, StoreError>;

/// Error type for store operations. Every variant except `Io` has a wire
/// representation; `Io` means the store itself is broken.
#[derive(Error, Debug)]
pub enum StoreError {
    /// Upload source path does not exist
    #[error("source path does not exist: {0}")]
    InvalidSource(PathBuf),

    /// Upload source path exists but is not a regular file
    #[error("source path is not a regular file: {0}")]
    NotAFile(PathBuf),

    /// A profile with the requested name already exists
    #[error("profile '{0}' already exists")]
    NameCollision(String),

    /// No profile with the requested name exists
    #[error("no profile named '{0}'")]
    NotFound(String),

    /// The supplied name reduces to an empty final path component
    #[error("invalid profile name {0:?}")]
    InvalidName(String),

    /// The selection pointer is missing, unreadable, or dangling
    #[error("no profile selected")]
    NoSelection,

    /// Underlying filesystem failure
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

/// Store of profile files plus the current-selection pointer.
pub struct ProfileStore {
    profiles_dir: PathBuf,
    current_link: PathBuf,
    staging_link: PathBuf,
}

impl ProfileStore {
    pub fn new(profiles_dir: PathBuf, current_link: PathBuf, staging_link: PathBuf) -> Self {
        Self {
            profiles_dir,
            current_link,
            staging_link,
        }
    }

    /// Reduce a client-supplied name to its final path component. This is
    /// the only sanitization applied to names; a name with no usable final
    /// component (empty, `.`, `..`, a bare separator) is rejected.
    pub fn sanitize_name(raw: &str) -> StoreResult<String> {
        match Path::new(raw).file_name().and_then(OsStr::to_str) {
            Some(name) => Ok(name.to_string()),
            None => Err(StoreError::InvalidName(raw.to_string())),
        }
    }

    /// Names of all stored profiles, in directory enumeration order.
    pub fn list(&self) -> StoreResult<Vec<String>> {
        let mut names = Vec::new();
        for entry in fs::read_dir(&self.profiles_dir)? {
            names.push(entry?.file_name().to_string_lossy().into_owned());
        }
        Ok(names)
    }

    /// Check that `source` is usable as an upload source.
    pub fn validate_source(&self, source: &Path) -> StoreResult<()> {
        if !source.exists() {
            return Err(StoreError::InvalidSource(source.to_path_buf()));
        }
        if !source.is_file() {
            return Err(StoreError::NotAFile(source.to_path_buf()));
        }
        Ok(())
    }

    /// Copy `source` into the store under the sanitized `desired_name`.
    /// Returns the name the profile was stored under.
    pub fn add(&self, source: &Path, desired_name: &str) -> StoreResult<String> {
        self.validate_source(source)?;
        let name = Self::sanitize_name(desired_name)?;
        let destination = self.profiles_dir.join(&name);
        if destination.exists() {
            return Err(StoreError::NameCollision(name));
        }
        fs::copy(source, &destination)?;
        info!("stored profile '{}' from {}", name, source.display());
        Ok(name)
    }

    /// Delete the named profile. Returns the sanitized name that was
    /// removed.
    pub fn remove(&self, name: &str) -> StoreResult<String> {
        let name = Self::sanitize_name(name)?;
        let path = self.profiles_dir.join(&name);
        if !path.exists() {
            return Err(StoreError::NotFound(name));
        }
        fs::remove_file(&path)?;
        info!("removed profile '{name}'");
        Ok(name)
    }

    /// Atomically repoint the selection at the named profile.
    pub fn select(&self, name: &str) -> StoreResult<String> {
        let name = Self::sanitize_name(name)?;
        let target = self.profiles_dir.join(&name);
        if !target.exists() {
            return Err(StoreError::NotFound(name));
        }
        // Build the new link at the staging path and rename it over the
        // pointer; a leftover staging link from an interrupted swap is
        // discarded first.
        if fs::symlink_metadata(&self.staging_link).is_ok() {
            fs::remove_file(&self.staging_link)?;
        }
        symlink(&target, &self.staging_link)?;
        fs::rename(&self.staging_link, &self.current_link)?;
        info!("selected profile '{name}'");
        Ok(name)
    }

    /// Name the current selection resolves to. A pointer that is missing,
    /// unreadable, or whose target no longer exists counts as no selection;
    /// the same policy applies everywhere the selection is consulted.
    pub fn resolve_current(&self) -> StoreResult<String> {
        let target = fs::read_link(&self.current_link).map_err(|_| StoreError::NoSelection)?;
        if !target.exists() {
            return Err(StoreError::NoSelection);
        }
        target
            .file_name()
            .and_then(OsStr::to_str)
            .map(str::to_string)
            .ok_or(StoreError::NoSelection)
    }

    /// Path CONNECT hands to the tunnel process. The link, not its target:
    /// the tunnel follows the indirection itself, as the original tooling
    /// did.
    pub fn current_link(&self) -> &Path {
        &self.current_link
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    struct Fixture {
        _dir: tempfile::TempDir,
        store: ProfileStore,
        source: PathBuf,
        profiles_dir: PathBuf,
    }

    fn fixture() -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let profiles_dir = dir.path().join("vpns");
        fs::create_dir(&profiles_dir).unwrap();

        let source = dir.path().join("endpoint.ovpn");
        fs::write(&source, b"remote vpn.example.com 1194\n").unwrap();

        let store = ProfileStore::new(
            profiles_dir.clone(),
            dir.path().join("current"),
            dir.path().join("current.staging"),
        );
        Fixture {
            _dir: dir,
            store,
            source,
            profiles_dir,
        }
    }

    #[test]
    fn sanitize_keeps_only_the_final_component() {
        assert_eq!(ProfileStore::sanitize_name("office").unwrap(), "office");
        assert_eq!(
            ProfileStore::sanitize_name("/etc/../office").unwrap(),
            "office"
        );
        assert_eq!(ProfileStore::sanitize_name("a/b/c").unwrap(), "c");

        for bad in ["", ".", "..", "/", "a/.."] {
            assert!(
                matches!(
                    ProfileStore::sanitize_name(bad),
                    Err(StoreError::InvalidName(_))
                ),
                "name {bad:?} should be rejected"
            );
        }
    }

    #[test]
    fn add_copies_bytes_under_sanitized_name() {
        let fx = fixture();
        let name = fx.store.add(&fx.source, "../../office").unwrap();
        assert_eq!(name, "office");

        let stored = fx.profiles_dir.join("office");
        assert_eq!(
            fs::read(&stored).unwrap(),
            fs::read(&fx.source).unwrap()
        );
        assert_eq!(fx.store.list().unwrap(), vec!["office".to_string()]);
    }

    #[test]
    fn add_rejects_bad_sources_and_collisions() {
        let fx = fixture();
        assert!(matches!(
            fx.store.add(Path::new("/no/such/file"), "x"),
            Err(StoreError::InvalidSource(_))
        ));
        assert!(matches!(
            fx.store.add(&fx.profiles_dir, "x"),
            Err(StoreError::NotAFile(_))
        ));

        fx.store.add(&fx.source, "office").unwrap();
        let before = fs::read(fx.profiles_dir.join("office")).unwrap();
        assert!(matches!(
            fx.store.add(&fx.source, "office"),
            Err(StoreError::NameCollision(_))
        ));
        // the existing profile's bytes are untouched by the rejected upload
        assert_eq!(fs::read(fx.profiles_dir.join("office")).unwrap(), before);
    }

    #[test]
    fn remove_deletes_exactly_the_named_profile() {
        let fx = fixture();
        fx.store.add(&fx.source, "office").unwrap();
        fx.store.add(&fx.source, "home").unwrap();

        assert!(matches!(
            fx.store.remove("absent"),
            Err(StoreError::NotFound(_))
        ));
        fx.store.remove("office").unwrap();
        assert_eq!(fx.store.list().unwrap(), vec!["home".to_string()]);
    }

    #[test]
    fn select_and_resolve_cycle() {
        let fx = fixture();
        fx.store.add(&fx.source, "office").unwrap();

        assert!(matches!(
            fx.store.resolve_current(),
            Err(StoreError::NoSelection)
        ));
        assert!(matches!(
            fx.store.select("absent"),
            Err(StoreError::NotFound(_))
        ));
        // a failed select leaves no pointer behind
        assert!(matches!(
            fx.store.resolve_current(),
            Err(StoreError::NoSelection)
        ));

        fx.store.select("office").unwrap();
        assert_eq!(fx.store.resolve_current().unwrap(), "office");

        // reselection over an existing pointer
        fx.store.add(&fx.source, "home").unwrap();
        fx.store.select("home").unwrap();
        assert_eq!(fx.store.resolve_current().unwrap(), "home");
    }

    #[test]
    fn dangling_pointer_counts_as_no_selection() {
        let fx = fixture();
        fx.store.add(&fx.source, "office").unwrap();
        fx.store.select("office").unwrap();

        fx.store.remove("office").unwrap();
        assert!(matches!(
            fx.store.resolve_current(),
            Err(StoreError::NoSelection)
        ));
    }

    #[test]
    fn select_recovers_from_leftover_staging_link() {
        let fx = fixture();
        fx.store.add(&fx.source, "office").unwrap();

        // simulate an interrupted earlier swap
        symlink(&fx.source, &fx.store.staging_link).unwrap();
        fx.store.select("office").unwrap();
        assert_eq!(fx.store.resolve_current().unwrap(), "office");
    }
}
