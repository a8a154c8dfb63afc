//! Code store: one directory per app holding its source file
//!
//! The directory tree is the single source of truth for which apps exist.
//! There is no in-memory registry; every read goes back to disk and is
//! cross-referenced against live container state by the reconciler.

use crate::error::{Error, Result};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Source file each app directory holds
pub const SOURCE_FILE: &str = "app.py";

/// Code a freshly created app starts with
pub const DEFAULT_APP_CODE: &str = r#"
from flask import Flask

app = Flask(__name__)

@app.route('/')
def hello_world():
    return '<h1>Hello from my new Flask App!</h1>'

if __name__ == '__main__':
    app.run(host='0.0.0.0', port=5000)
"#;

/// Filesystem-backed store of app code directories
#[derive(Debug, Clone)]
pub struct CodeStore {
    root: PathBuf,
}

impl CodeStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Create the root directory if it does not exist yet
    pub fn ensure_root(&self) -> Result<()> {
        fs::create_dir_all(&self.root)?;
        Ok(())
    }

    /// Directory holding an app's code
    pub fn app_dir(&self, app_name: &str) -> PathBuf {
        self.root.join(app_name)
    }

    /// Path to an app's source file
    pub fn code_file(&self, app_name: &str) -> PathBuf {
        self.app_dir(app_name).join(SOURCE_FILE)
    }

    /// Absolute host path of an app's directory, for the container bind
    /// mount. Fails with NotFound if the app does not exist.
    pub fn host_path(&self, app_name: &str) -> Result<PathBuf> {
        let dir = self.app_dir(app_name);
        dir.canonicalize().map_err(|e| {
            if e.kind() == ErrorKind::NotFound {
                Error::NotFound(format!("app {}", app_name))
            } else {
                Error::Io(e)
            }
        })
    }

    /// List app names, one per immediate subdirectory of the root.
    ///
    /// Order follows the underlying directory listing and is not sorted.
    pub fn list_app_dirs(&self) -> Result<Vec<String>> {
        let mut names = Vec::new();
        for entry in fs::read_dir(&self.root)? {
            let entry = entry?;
            if !entry.file_type()?.is_dir() {
                continue;
            }
            if let Ok(name) = entry.file_name().into_string() {
                names.push(name);
            }
        }
        Ok(names)
    }

    /// Create an app directory with its initial source file.
    ///
    /// Fails with AlreadyExists when a directory of that name is present,
    /// so the caller can regenerate the name and retry.
    pub fn create_app_dir(&self, app_name: &str, initial_code: &str) -> Result<()> {
        let dir = self.app_dir(app_name);
        fs::create_dir(&dir).map_err(|e| {
            if e.kind() == ErrorKind::AlreadyExists {
                Error::AlreadyExists(format!("app {}", app_name))
            } else {
                Error::Io(e)
            }
        })?;
        fs::write(self.code_file(app_name), initial_code)?;
        debug!(app = app_name, dir = %dir.display(), "Created app directory");
        Ok(())
    }

    /// Read the full content of an app's source file
    pub fn read_code(&self, app_name: &str) -> Result<String> {
        fs::read_to_string(self.code_file(app_name)).map_err(|e| {
            if e.kind() == ErrorKind::NotFound {
                Error::NotFound(format!("app {}", app_name))
            } else {
                Error::Io(e)
            }
        })
    }

    /// Replace the full content of an app's source file.
    ///
    /// Fails with NotFound when the app directory is absent rather than
    /// conjuring a directory for an app that was never created.
    pub fn write_code(&self, app_name: &str, code: &str) -> Result<()> {
        if !self.app_dir(app_name).is_dir() {
            return Err(Error::NotFound(format!("app {}", app_name)));
        }
        fs::write(self.code_file(app_name), code)?;
        Ok(())
    }

    /// Recursively remove an app directory. Absence is success.
    pub fn delete_app_dir(&self, app_name: &str) -> Result<()> {
        match fs::remove_dir_all(self.app_dir(app_name)) {
            Ok(()) => {
                debug!(app = app_name, "Removed app directory");
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(Error::Io(e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn test_store() -> (CodeStore, TempDir) {
        let tmp = TempDir::new().unwrap();
        let store = CodeStore::new(tmp.path().join("apps-code"));
        store.ensure_root().unwrap();
        (store, tmp)
    }

    #[test]
    fn test_ensure_root_is_idempotent() {
        let (store, _tmp) = test_store();
        store.ensure_root().unwrap();
        store.ensure_root().unwrap();
        assert!(store.root().is_dir());
    }

    #[test]
    fn test_create_and_read() {
        let (store, _tmp) = test_store();
        store.create_app_dir("bright-sea-123", DEFAULT_APP_CODE).unwrap();

        assert!(store.app_dir("bright-sea-123").is_dir());
        assert_eq!(store.read_code("bright-sea-123").unwrap(), DEFAULT_APP_CODE);
    }

    #[test]
    fn test_create_collision_is_already_exists() {
        let (store, _tmp) = test_store();
        store.create_app_dir("old-star-900", "x").unwrap();

        match store.create_app_dir("old-star-900", "y") {
            Err(Error::AlreadyExists(_)) => {}
            other => panic!("expected AlreadyExists, got {:?}", other),
        }
        // first write survives the failed second create
        assert_eq!(store.read_code("old-star-900").unwrap(), "x");
    }

    #[test]
    fn test_write_read_round_trip() {
        let (store, _tmp) = test_store();
        store.create_app_dir("new-wind-400", "before").unwrap();

        let code = "import os\nprint(os.environ)\n";
        store.write_code("new-wind-400", code).unwrap();
        assert_eq!(store.read_code("new-wind-400").unwrap(), code);
    }

    #[test]
    fn test_missing_app_is_not_found() {
        let (store, _tmp) = test_store();

        assert!(matches!(
            store.read_code("dark-fire-777"),
            Err(Error::NotFound(_))
        ));
        assert!(matches!(
            store.write_code("dark-fire-777", "x"),
            Err(Error::NotFound(_))
        ));
        assert!(matches!(
            store.host_path("dark-fire-777"),
            Err(Error::NotFound(_))
        ));
    }

    #[test]
    fn test_delete_is_noop_when_absent() {
        let (store, _tmp) = test_store();
        store.delete_app_dir("never-existed-000").unwrap();
    }

    #[test]
    fn test_delete_removes_directory() {
        let (store, _tmp) = test_store();
        store.create_app_dir("high-sun-256", "x").unwrap();
        store.delete_app_dir("high-sun-256").unwrap();

        assert!(!store.app_dir("high-sun-256").exists());
        assert!(store.list_app_dirs().unwrap().is_empty());
    }

    #[test]
    fn test_list_skips_plain_files() {
        let (store, _tmp) = test_store();
        store.create_app_dir("shiny-tree-512", "x").unwrap();
        std::fs::write(store.root().join("stray.txt"), "not an app").unwrap();

        let dirs = store.list_app_dirs().unwrap();
        assert_eq!(dirs, vec!["shiny-tree-512".to_string()]);
    }

    #[test]
    fn test_host_path_is_absolute() {
        let (store, _tmp) = test_store();
        store.create_app_dir("little-snow-314", "x").unwrap();
        let path = store.host_path("little-snow-314").unwrap();
        assert!(path.is_absolute());
        assert!(path.ends_with("little-snow-314"));
    }
}
