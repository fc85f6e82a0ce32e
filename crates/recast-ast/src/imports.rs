//! Import statement synthesis

use std::path::{Component, Path};

/// Module specifier that `from_file` would use to import `to_file`
///
/// Always relative, `/`-separated and without the source extension.
pub fn relative_module_specifier(from_file: &Path, to_file: &Path) -> String {
    let from_dir = from_file.parent().unwrap_or_else(|| Path::new(""));
    let target = to_file.with_extension("");

    let relative = pathdiff::diff_paths(&target, from_dir).unwrap_or(target);
    let parts: Vec<String> = relative
        .components()
        .filter_map(|component| match component {
            Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
            Component::ParentDir => Some("..".to_string()),
            _ => None,
        })
        .collect();
    let joined = parts.join("/");

    if joined.starts_with("..") {
        joined
    } else {
        format!("./{}", joined)
    }
}

/// `import { a, b } from './x';`
pub fn render_named_import<S: AsRef<str>>(names: &[S], specifier: &str) -> String {
    let names: Vec<&str> = names.iter().map(AsRef::as_ref).collect();
    format!("import {{ {} }} from '{}';", names.join(", "), specifier)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_relative_module_specifier() {
        assert_eq!(
            relative_module_specifier(Path::new("/p/src/a.ts"), Path::new("/p/src/b.ts")),
            "./b"
        );
        assert_eq!(
            relative_module_specifier(Path::new("/p/src/a.ts"), Path::new("/p/src/lib/b.tsx")),
            "./lib/b"
        );
        assert_eq!(
            relative_module_specifier(Path::new("/p/src/lib/a.ts"), Path::new("/p/src/b.ts")),
            "../b"
        );
    }

    #[test]
    fn test_render_named_import() {
        assert_eq!(
            render_named_import(&["a", "b"], "./x"),
            "import { a, b } from './x';"
        );
    }
}
