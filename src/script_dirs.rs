//! Pattern-script locations on disk.
//!
//! Scripts are discovered from three locations, in precedence order:
//!
//! 1. the system scripts directory (fixed platform path),
//! 2. the user scripts directory (platform data dir),
//! 3. a custom directory (explicit override, defaults to the current
//!    directory).
//!
//! The custom override is a plain configuration value carried by
//! [`ScriptDirs`] and handed to the catalog at construction; there is no
//! process-wide setter. A directory that does not exist simply enumerates
//! to nothing.

use std::fs;
use std::path::{Path, PathBuf};

/// File extension of pattern scripts.
pub const SCRIPT_EXTENSION: &str = "rhai";

/// One script location: a path plus the fixed file/extension filter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptDir {
    path: PathBuf,
}

impl ScriptDir {
    fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.is_dir()
    }

    /// Regular files with the script extension, sorted by file name.
    /// Missing or unreadable directories yield an empty listing.
    pub fn entries(&self) -> Vec<PathBuf> {
        let Ok(entries) = fs::read_dir(&self.path) else {
            return Vec::new();
        };
        let mut files: Vec<PathBuf> = entries
            .flatten()
            .map(|entry| entry.path())
            .filter(|path| {
                path.is_file()
                    && path.extension().and_then(|ext| ext.to_str()) == Some(SCRIPT_EXTENSION)
            })
            .collect();
        files.sort();
        files
    }
}

/// Resolved script locations for one catalog.
#[derive(Debug, Clone, Default)]
pub struct ScriptDirs {
    custom: Option<PathBuf>,
}

impl ScriptDirs {
    /// Platform defaults; the custom location falls back to the current
    /// directory.
    pub fn new() -> Self {
        Self::default()
    }

    /// Override the custom location. The path is not validated; a
    /// non-existent path enumerates to nothing.
    pub fn with_custom(path: impl Into<PathBuf>) -> Self {
        Self { custom: Some(path.into()) }
    }

    pub fn system_dir(&self) -> ScriptDir {
        ScriptDir::new(system_scripts_path())
    }

    pub fn user_dir(&self) -> ScriptDir {
        ScriptDir::new(user_scripts_path())
    }

    pub fn custom_dir(&self) -> ScriptDir {
        ScriptDir::new(self.custom.clone().unwrap_or_else(|| PathBuf::from(".")))
    }

    /// All locations in precedence order: system, user, custom.
    pub fn all(&self) -> [ScriptDir; 3] {
        [self.system_dir(), self.user_dir(), self.custom_dir()]
    }
}

fn system_scripts_path() -> PathBuf {
    if cfg!(target_os = "macos") {
        PathBuf::from("/Library/Application Support/lightscript/scripts")
    } else if cfg!(target_os = "windows") {
        PathBuf::from(r"C:\ProgramData\lightscript\scripts")
    } else {
        PathBuf::from("/usr/share/lightscript/scripts")
    }
}

fn user_scripts_path() -> PathBuf {
    directories::ProjectDirs::from("org", "lightscript", "lightscript")
        .map(|dirs| dirs.data_dir().join("scripts"))
        .unwrap_or_else(|| PathBuf::from("."))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;

    #[test]
    fn custom_dir_defaults_to_current_directory() {
        let dirs = ScriptDirs::new();
        assert_eq!(dirs.custom_dir().path(), Path::new("."));
    }

    #[test]
    fn with_custom_overrides_the_custom_location() {
        let dirs = ScriptDirs::with_custom("fixtures/patterns");
        assert!(dirs.custom_dir().path().ends_with("fixtures/patterns"));
        // The other locations are unaffected.
        assert_eq!(dirs.system_dir(), ScriptDirs::new().system_dir());
        assert_eq!(dirs.user_dir(), ScriptDirs::new().user_dir());
    }

    #[test]
    fn default_locations_end_with_the_scripts_directory() {
        let dirs = ScriptDirs::new();
        assert!(dirs.system_dir().path().ends_with("scripts"));
        assert!(dirs.user_dir().path().to_string_lossy().contains("lightscript"));
    }

    #[test]
    fn entries_filter_to_script_files_only() {
        let temp = TempDir::new().unwrap();
        for name in ["b.rhai", "a.rhai", "notes.txt", "script.rhai.bak"] {
            let mut file = std::fs::File::create(temp.path().join(name)).unwrap();
            writeln!(file, "#{{}}").unwrap();
        }
        std::fs::create_dir(temp.path().join("subdir.rhai")).unwrap();

        let dir = ScriptDirs::with_custom(temp.path()).custom_dir();
        let names: Vec<_> = dir
            .entries()
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["a.rhai", "b.rhai"]);
    }

    #[test]
    fn missing_directory_enumerates_to_nothing() {
        let dir = ScriptDirs::with_custom("/no/such/place").custom_dir();
        assert!(!dir.exists());
        assert!(dir.entries().is_empty());
    }
}
