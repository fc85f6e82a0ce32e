//! In-memory snapshot of a project's source files

use crate::error::{AstError, AstResult};
use crate::parser::is_source_file;
use std::collections::BTreeMap;
use std::path::{Component, Path, PathBuf};

const RESOLVE_EXTENSIONS: [&str; 6] = ["ts", "tsx", "mts", "cts", "js", "jsx"];

/// Every source file of a project, keyed by path
///
/// The applier mutates texts in place; the reference index is rebuilt from
/// the current texts whenever it is needed.
#[derive(Debug, Clone, Default)]
pub struct Project {
    root: Option<PathBuf>,
    files: BTreeMap<PathBuf, String>,
}

impl Project {
    pub fn from_files<I, P, S>(files: I) -> Self
    where
        I: IntoIterator<Item = (P, S)>,
        P: Into<PathBuf>,
        S: Into<String>,
    {
        Self {
            root: None,
            files: files
                .into_iter()
                .map(|(path, text)| (normalize_path(&path.into()), text.into()))
                .collect(),
        }
    }

    /// Load every source file below `root`, honouring `.gitignore`
    pub fn load(root: &Path) -> AstResult<Self> {
        if !root.is_dir() {
            return Err(AstError::analysis(format!(
                "Project root is not a directory: {}",
                root.display()
            )));
        }

        let mut files = BTreeMap::new();
        let walker = ignore::WalkBuilder::new(root)
            .hidden(false)
            .git_ignore(true)
            .filter_entry(|entry| entry.file_name() != "node_modules")
            .build();

        for entry in walker.flatten() {
            let path = entry.path();
            if !path.is_file() || !is_source_file(path) {
                continue;
            }
            match std::fs::read_to_string(path) {
                Ok(text) => {
                    files.insert(normalize_path(path), text);
                }
                Err(err) => {
                    tracing::warn!(file = %path.display(), error = %err, "Skipping unreadable file");
                }
            }
        }

        tracing::debug!(root = %root.display(), files = files.len(), "Loaded project snapshot");

        Ok(Self {
            root: Some(root.to_path_buf()),
            files,
        })
    }

    pub fn root(&self) -> Option<&Path> {
        self.root.as_deref()
    }

    pub fn get(&self, path: &Path) -> Option<&str> {
        self.files.get(&normalize_path(path)).map(String::as_str)
    }

    pub fn contains(&self, path: &Path) -> bool {
        self.files.contains_key(&normalize_path(path))
    }

    pub fn set(&mut self, path: &Path, text: String) {
        self.files.insert(normalize_path(path), text);
    }

    pub fn files(&self) -> impl Iterator<Item = (&Path, &str)> {
        self.files
            .iter()
            .map(|(path, text)| (path.as_path(), text.as_str()))
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Resolve an import specifier written in `from` to a file of the snapshot
    ///
    /// Only relative specifiers resolve; package imports return `None`.
    pub fn resolve_module(&self, from: &Path, specifier: &str) -> Option<PathBuf> {
        if !specifier.starts_with("./") && !specifier.starts_with("../") {
            return None;
        }

        let base = normalize_path(&from.parent()?.join(specifier));
        if self.files.contains_key(&base) {
            return Some(base);
        }

        // `./a.js` written for a `./a.ts` source
        if let Some(stem) = specifier
            .strip_suffix(".js")
            .or_else(|| specifier.strip_suffix(".jsx"))
        {
            if let Some(found) = self.resolve_module(from, stem) {
                return Some(found);
            }
        }

        let file_name = base.file_name()?.to_string_lossy().into_owned();
        RESOLVE_EXTENSIONS
            .iter()
            .map(|ext| base.with_file_name(format!("{}.{}", file_name, ext)))
            .chain(RESOLVE_EXTENSIONS.iter().map(|ext| base.join(format!("index.{}", ext))))
            .find(|candidate| self.files.contains_key(candidate))
    }
}

/// Lexically normalise a path, removing `.` and resolving `..` components
pub fn normalize_path(path: &Path) -> PathBuf {
    let mut normalized = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !normalized.pop() {
                    normalized.push("..");
                }
            }
            other => normalized.push(other.as_os_str()),
        }
    }
    normalized
}

#[cfg(test)]
mod tests {
    use super::*;

    fn project() -> Project {
        Project::from_files([
            ("/p/src/a.ts", "export const a = 1;"),
            ("/p/src/lib/index.ts", "export const b = 2;"),
            ("/p/src/util.tsx", "export const c = 3;"),
        ])
    }

    #[test]
    fn test_resolve_module_tries_extensions_and_index() {
        let project = project();
        let from = Path::new("/p/src/main.ts");

        assert_eq!(
            project.resolve_module(from, "./a"),
            Some(PathBuf::from("/p/src/a.ts"))
        );
        assert_eq!(
            project.resolve_module(from, "./lib"),
            Some(PathBuf::from("/p/src/lib/index.ts"))
        );
        assert_eq!(
            project.resolve_module(from, "./util.js"),
            Some(PathBuf::from("/p/src/util.tsx"))
        );
        assert_eq!(
            project.resolve_module(Path::new("/p/src/lib/index.ts"), "../a"),
            Some(PathBuf::from("/p/src/a.ts"))
        );
        assert_eq!(project.resolve_module(from, "react"), None);
        assert_eq!(project.resolve_module(from, "./missing"), None);
    }

    #[test]
    fn test_normalize_path() {
        assert_eq!(
            normalize_path(Path::new("/p/src/./lib/../a.ts")),
            PathBuf::from("/p/src/a.ts")
        );
        assert_eq!(normalize_path(Path::new("../x")), PathBuf::from("../x"));
    }

    #[test]
    fn test_load_skips_node_modules_and_other_files() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("src")).unwrap();
        std::fs::create_dir_all(dir.path().join("node_modules/pkg")).unwrap();
        std::fs::write(dir.path().join("src/a.ts"), "export {};").unwrap();
        std::fs::write(dir.path().join("src/notes.md"), "# notes").unwrap();
        std::fs::write(dir.path().join("node_modules/pkg/index.ts"), "").unwrap();

        let project = Project::load(dir.path()).unwrap();
        assert_eq!(project.len(), 1);
        assert!(project.contains(&dir.path().join("src/a.ts")));
    }
}
