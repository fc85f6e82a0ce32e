use std::fs;
use std::path::{Path, PathBuf};
use tempfile::{tempdir, TempDir};

/// Manages a temporary directory for a test scenario.
/// Cleans up automatically when dropped.
pub struct TestWorkspace {
    pub temp_dir: TempDir,
}

impl Default for TestWorkspace {
    fn default() -> Self {
        Self::new()
    }
}

impl TestWorkspace {
    /// Creates a new empty workspace.
    pub fn new() -> Self {
        Self {
            temp_dir: tempdir().expect("Failed to create temp dir"),
        }
    }

    /// Returns the root path of the workspace.
    pub fn path(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Creates a file with content within the workspace.
    /// Automatically creates parent directories.
    pub fn create_file(&self, rel_path: &str, content: &str) {
        let file_path = self.path().join(rel_path);
        if let Some(parent) = file_path.parent() {
            fs::create_dir_all(parent).unwrap_or_else(|e| {
                panic!("Failed to create parent dirs for '{}': {}", rel_path, e)
            });
        }
        fs::write(&file_path, content)
            .unwrap_or_else(|e| panic!("Failed to write file '{}': {}", file_path.display(), e));
    }

    /// Reads a file from the workspace.
    pub fn read_file(&self, rel_path: &str) -> String {
        let file_path = self.path().join(rel_path);
        fs::read_to_string(&file_path)
            .unwrap_or_else(|e| panic!("Failed to read file '{}': {}", file_path.display(), e))
    }

    /// Check if a file exists in the workspace.
    pub fn file_exists(&self, rel_path: &str) -> bool {
        self.path().join(rel_path).exists()
    }

    /// Get the absolute path to a file in the workspace.
    pub fn absolute_path(&self, rel_path: &str) -> PathBuf {
        self.path().join(rel_path)
    }

    /// Create a tsconfig.json so the workspace looks like a real project.
    pub fn create_tsconfig(&self) {
        let tsconfig = serde_json::json!({
            "compilerOptions": {
                "target": "ES2022",
                "module": "ESNext",
                "moduleResolution": "node",
                "strict": true,
                "noEmit": true
            },
            "include": ["src/**/*"],
            "exclude": ["node_modules"]
        });

        self.create_file(
            "tsconfig.json",
            &serde_json::to_string_pretty(&tsconfig).unwrap(),
        );
    }

    /// Create a TypeScript project from `(relative path, content)` pairs.
    pub fn setup_typescript_project(&self, files: &[(&str, &str)]) {
        self.create_tsconfig();
        for (rel_path, content) in files {
            self.create_file(rel_path, content);
        }
    }

    /// Write a JSON document (change descriptions, state files) into the workspace.
    pub fn create_json(&self, rel_path: &str, value: &serde_json::Value) -> PathBuf {
        self.create_file(rel_path, &serde_json::to_string_pretty(value).unwrap());
        self.absolute_path(rel_path)
    }
}
