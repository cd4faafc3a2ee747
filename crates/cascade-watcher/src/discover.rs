//! Finding the units that make up a tree.

use crate::should_process_file;
use ignore::WalkBuilder;
use std::path::Path;
use tracing::{debug, warn};

/// Stem of a package's own source file.
const PACKAGE_STEM: &str = "mod";

/// Maps a source file under `root` to its dotted unit name.
///
/// `root/app/models.unit` is `app.models`; `root/app/mod.unit` is `app`.
pub fn unit_name_for(root: &Path, path: &Path) -> Option<String> {
    let relative = path.strip_prefix(root).ok()?.with_extension("");

    let mut segments = Vec::new();
    for component in relative.components() {
        let segment = component.as_os_str().to_str()?;
        if segment.is_empty() || segment.contains('.') {
            return None;
        }
        segments.push(segment);
    }

    if segments.last() == Some(&PACKAGE_STEM) {
        segments.pop();
    }
    if segments.is_empty() {
        return None;
    }
    Some(segments.join("."))
}

/// Names of every unit source under `root`, sorted.
///
/// Hidden directories and anything matched by ignore files are skipped.
pub fn discover_units(root: &Path, extensions: &[String]) -> Vec<String> {
    let walker = WalkBuilder::new(root)
        .hidden(true)
        .git_ignore(true)
        .ignore(true)
        .build();

    let mut units = Vec::new();
    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                warn!("Walker error: {}", e);
                continue;
            }
        };

        let path = entry.path();
        if !path.is_file() || !should_process_file(path, extensions) {
            continue;
        }

        match unit_name_for(root, path) {
            Some(name) => units.push(name),
            None => debug!("{} does not name a unit", path.display()),
        }
    }

    units.sort();
    units.dedup();
    units
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_unit_name_for() {
        let root = Path::new("/project");
        assert_eq!(
            unit_name_for(root, Path::new("/project/app/models.unit")),
            Some("app.models".to_string())
        );
        assert_eq!(
            unit_name_for(root, Path::new("/project/app/mod.unit")),
            Some("app".to_string())
        );
        assert_eq!(unit_name_for(root, Path::new("/project/mod.unit")), None);
        assert_eq!(unit_name_for(root, Path::new("/elsewhere/a.unit")), None);
        assert_eq!(unit_name_for(root, Path::new("/project/a.b.unit")), None);
    }

    #[test]
    fn test_discover_units_skips_hidden_and_foreign_files() {
        let dir = TempDir::new().unwrap();
        let root = dir.path();
        fs::create_dir_all(root.join("app")).unwrap();
        fs::create_dir_all(root.join(".cascade")).unwrap();
        fs::write(root.join("main.unit"), "import app.models").unwrap();
        fs::write(root.join("app/mod.unit"), "").unwrap();
        fs::write(root.join("app/models.unit"), "let x = 1").unwrap();
        fs::write(root.join("app/notes.txt"), "").unwrap();
        fs::write(root.join(".cascade/stale.unit"), "").unwrap();

        let units = discover_units(root, &["unit".to_string()]);
        assert_eq!(units, vec!["app", "app.models", "main"]);
    }
}
