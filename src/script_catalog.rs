//! Discovery and lookup of pattern scripts.
//!
//! Scripts are enumerated from the locator's directories in precedence
//! order (system, user, custom); a file stem already seen in an earlier
//! directory shadows later ones. File contents are read at enumeration
//! time, evaluation stays lazy, and unreadable files are skipped with a
//! warning rather than failing the enumeration.

use std::collections::HashSet;
use std::path::PathBuf;

use log::{debug, warn};

use crate::rgb_script::RgbScript;
use crate::script_dirs::{ScriptDir, ScriptDirs};

pub struct ScriptCatalog {
    dirs: ScriptDirs,
}

impl ScriptCatalog {
    pub fn new(dirs: ScriptDirs) -> Self {
        Self { dirs }
    }

    /// Catalog over the platform default locations.
    pub fn with_defaults() -> Self {
        Self::new(ScriptDirs::new())
    }

    pub fn dirs(&self) -> &ScriptDirs {
        &self.dirs
    }

    /// Every discoverable script, one instance per surviving file. The
    /// returned iterator is finite and restartable: each call re-reads the
    /// directories.
    pub fn available_scripts(&self) -> impl Iterator<Item = RgbScript> + '_ {
        self.discovered_files().into_iter().filter_map(|path| match RgbScript::load(&path) {
            Ok(script) => Some(script),
            Err(err) => {
                warn!("skipping unreadable script '{}': {err:#}", path.display());
                None
            }
        })
    }

    /// Look up a script by its metadata name (case-sensitive). Candidates
    /// are evaluated as needed to read their names. A miss returns an
    /// unbound instance — a normal result, detectable through
    /// `file_name().is_empty()` or `api_version() == 0`.
    pub fn find_by_name(&self, name: &str) -> RgbScript {
        if !name.is_empty() {
            for mut script in self.available_scripts() {
                if script.name() == name {
                    return script;
                }
            }
        }
        RgbScript::new()
    }

    fn discovered_files(&self) -> Vec<PathBuf> {
        let mut seen = HashSet::new();
        let mut files = Vec::new();
        for dir in self.dirs.all() {
            collect_dir(&dir, &mut seen, &mut files);
        }
        files
    }
}

/// Append this directory's script files, skipping stems already claimed by
/// a higher-precedence directory.
fn collect_dir(dir: &ScriptDir, seen: &mut HashSet<String>, files: &mut Vec<PathBuf>) {
    for path in dir.entries() {
        let Some(stem) = path.file_stem().map(|stem| stem.to_string_lossy().into_owned()) else {
            continue;
        };
        if seen.insert(stem) {
            files.push(path);
        } else {
            debug!("shadowed duplicate script '{}'", path.display());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rgb_map::GridSize;
    use std::fs;
    use std::path::Path;
    use tempfile::TempDir;

    fn write_script(dir: &Path, file: &str, name: &str) {
        let source = format!(
            r#"
            #{{
                apiVersion: 1,
                name: "{name}",
                author: "test",
                rgbMapStepCount: |width, height| 1,
                rgbMap: |width, height, rgb, step| [],
            }}
            "#
        );
        fs::write(dir.join(file), source).unwrap();
    }

    #[test]
    fn enumerates_scripts_in_the_custom_directory() {
        let temp = TempDir::new().unwrap();
        write_script(temp.path(), "alpha.rhai", "Alpha");
        write_script(temp.path(), "beta.rhai", "Beta");
        fs::write(temp.path().join("readme.txt"), "not a script").unwrap();

        let catalog = ScriptCatalog::new(ScriptDirs::with_custom(temp.path()));
        let scripts: Vec<_> = catalog.available_scripts().collect();
        assert_eq!(scripts.len(), 2);
        assert!(scripts.iter().all(|script| !script.contents().is_empty()));

        // Restartable: a second enumeration sees the same files.
        assert_eq!(catalog.available_scripts().count(), 2);
    }

    #[test]
    fn earlier_directories_shadow_later_ones_by_file_stem() {
        let first = TempDir::new().unwrap();
        let second = TempDir::new().unwrap();
        write_script(first.path(), "pattern.rhai", "From First");
        write_script(second.path(), "pattern.rhai", "From Second");
        write_script(second.path(), "other.rhai", "Other");

        let dirs = ScriptDirs::with_custom(first.path());
        let mut seen = HashSet::new();
        let mut files = Vec::new();
        collect_dir(&dirs.custom_dir(), &mut seen, &mut files);
        collect_dir(&ScriptDirs::with_custom(second.path()).custom_dir(), &mut seen, &mut files);

        assert_eq!(files.len(), 2);
        assert!(files[0].starts_with(first.path()));
        assert!(files[1].ends_with("other.rhai"));
    }

    #[test]
    fn find_by_name_is_case_sensitive_and_returns_unbound_on_miss() {
        let temp = TempDir::new().unwrap();
        write_script(temp.path(), "alpha.rhai", "Alpha");

        let catalog = ScriptCatalog::new(ScriptDirs::with_custom(temp.path()));

        let mut found = catalog.find_by_name("Alpha");
        assert_eq!(found.file_name(), "alpha.rhai");
        assert!(found.api_version() > 0);
        assert_eq!(found.author(), "test");

        for miss in ["alpha", "A script that should not exist", ""] {
            let mut script = catalog.find_by_name(miss);
            assert_eq!(script.file_name(), "");
            assert_eq!(script.contents(), "");
            assert_eq!(script.api_version(), 0);
            assert_eq!(script.name(), "");
            assert_eq!(script.author(), "");
            assert!(script.rgb_map(GridSize::new(5, 5), 1, 0).is_empty());
        }
    }

    #[test]
    fn invalid_scripts_are_enumerated_but_stay_inert() {
        let temp = TempDir::new().unwrap();
        write_script(temp.path(), "good.rhai", "Good");
        fs::write(temp.path().join("broken.rhai"), "( fn { return 5; } )()").unwrap();

        let catalog = ScriptCatalog::new(ScriptDirs::with_custom(temp.path()));
        let mut scripts: Vec<_> = catalog.available_scripts().collect();
        assert_eq!(scripts.len(), 2);

        let versions: Vec<_> =
            scripts.iter_mut().map(|script| script.api_version()).collect();
        assert!(versions.contains(&0));
        assert!(versions.contains(&1));
    }
}
