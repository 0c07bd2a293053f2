//! Templated file generation
//!
//! Placeholders have the form `{{ name }}` with optional whitespace inside
//! the braces. Placeholders without a matching variable are left as-is.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use rayon::prelude::*;
use regex::{Captures, Regex};
use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::error::{Error, Result};

/// Variables available to a template
pub type TemplateVars = HashMap<String, String>;

/// Rendered files keyed by `/`-separated path relative to the base directory
pub type FileTree = BTreeMap<String, String>;

static PLACEHOLDER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\{\{\s*([A-Za-z_\-][A-Za-z0-9_\-]*)\s*\}\}").expect("placeholder regex is valid")
});

/// Substitutes every known placeholder in `input`.
pub fn render_template(input: &str, vars: &TemplateVars) -> String {
    let mut missing = BTreeSet::new();
    let rendered = PLACEHOLDER.replace_all(input, |caps: &Captures<'_>| match vars.get(&caps[1]) {
        Some(value) => value.clone(),
        None => {
            missing.insert(caps[1].to_string());
            caps[0].to_string()
        }
    });

    if !missing.is_empty() {
        debug!(
            target: "orbit::template",
            "The following variables weren't found: {}",
            missing.into_iter().collect::<Vec<_>>().join(", ")
        );
    }

    rendered.into_owned()
}

/// Renders a file, or every file below a directory, into a [`FileTree`].
///
/// Relative `path`s are resolved against `base`. Symbolic links are
/// followed. Keys are relative to `base`; files outside of it are keyed
/// relative to the template root instead.
pub fn apply_template(path: &Path, vars: &TemplateVars, base: &Path) -> Result<FileTree> {
    let full_path = if path.is_absolute() {
        path.to_path_buf()
    } else {
        base.join(path)
    };
    debug!(target: "orbit::template", "Reading as template: {:?}", full_path);

    let metadata = fs::metadata(&full_path).map_err(|_| Error::TemplateNotFound(full_path.clone()))?;

    let root = if metadata.is_dir() {
        full_path.clone()
    } else {
        full_path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default()
    };

    let mut files = Vec::new();
    for entry in WalkDir::new(&full_path).follow_links(true) {
        let entry = entry.map_err(|e| Error::Io(e.into()))?;
        if entry.file_type().is_file() {
            files.push(entry.into_path());
        }
    }

    files
        .par_iter()
        .map(|file| -> Result<(String, String)> {
            let bytes = fs::read(file)?;
            let content = String::from_utf8_lossy(&bytes);
            Ok((relative_key(file, base, &root), render_template(&content, vars)))
        })
        .collect()
}

/// Writes every entry of `files` below `base`, creating parent directories
/// as needed and overwriting existing files.
///
/// Files are written concurrently; the first failure is returned.
pub fn write_file_tree(files: &FileTree, base: &Path) -> Result<()> {
    files.par_iter().try_for_each(|(relative, content)| {
        let full_path = base.join(relative);
        if let Some(parent) = full_path.parent() {
            fs::create_dir_all(parent)?;
        }
        debug!(target: "orbit::template", "Writing to path {:?}", full_path);
        fs::write(&full_path, content).map_err(|e| {
            warn!("Failed to write {:?}: {}", full_path, e);
            Error::Io(e)
        })
    })
}

fn relative_key(file: &Path, base: &Path, root: &Path) -> String {
    let relative: PathBuf = file
        .strip_prefix(base)
        .or_else(|_| file.strip_prefix(root))
        .map(Path::to_path_buf)
        .unwrap_or_else(|_| file.file_name().map(PathBuf::from).unwrap_or_default());

    relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn vars(pairs: &[(&str, &str)]) -> TemplateVars {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_render_substitutes_with_whitespace_tolerance() {
        let vars = vars(&[("name", "World"), ("app-name", "demo")]);
        assert_eq!(render_template("Hello {{ name }}!", &vars), "Hello World!");
        assert_eq!(render_template("{{name}}/{{  app-name }}", &vars), "World/demo");
    }

    #[test]
    fn test_render_keeps_unknown_placeholders() {
        let vars = vars(&[("name", "World")]);
        assert_eq!(
            render_template("{{ missing }} and {{ name }}", &vars),
            "{{ missing }} and World"
        );
    }

    #[test]
    fn test_apply_template_directory() {
        let dir = TempDir::new().unwrap();
        let template = dir.path().join("template");
        fs::create_dir_all(template.join("src")).unwrap();
        fs::write(template.join("package.json"), r#"{"name": "{{ name }}"}"#).unwrap();
        fs::write(template.join("src/index.js"), "// {{ name }}").unwrap();

        let tree = apply_template(&template, &vars(&[("name", "app")]), &template).unwrap();
        assert_eq!(tree.len(), 2);
        assert_eq!(tree["package.json"], r#"{"name": "app"}"#);
        assert_eq!(tree["src/index.js"], "// app");
    }

    #[test]
    fn test_apply_template_relative_path_and_base() {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("assets")).unwrap();
        fs::write(dir.path().join("assets/README.md"), "# {{ title }}").unwrap();

        let tree = apply_template(
            Path::new("assets/README.md"),
            &vars(&[("title", "Docs")]),
            dir.path(),
        )
        .unwrap();
        assert_eq!(tree["assets/README.md"], "# Docs");
    }

    #[cfg(unix)]
    #[test]
    fn test_apply_template_follows_symlinks() {
        let dir = TempDir::new().unwrap();
        let real = dir.path().join("real");
        fs::create_dir_all(&real).unwrap();
        fs::write(real.join("a.txt"), "{{ x }}").unwrap();
        let template = dir.path().join("template");
        fs::create_dir_all(&template).unwrap();
        std::os::unix::fs::symlink(&real, template.join("linked")).unwrap();

        let tree = apply_template(&template, &vars(&[("x", "1")]), &template).unwrap();
        assert_eq!(tree["linked/a.txt"], "1");
    }

    #[test]
    fn test_apply_template_missing_path() {
        let dir = TempDir::new().unwrap();
        let err = apply_template(Path::new("nope"), &TemplateVars::new(), dir.path()).unwrap_err();
        assert!(matches!(err, Error::TemplateNotFound(_)));
    }

    #[test]
    fn test_write_file_tree_creates_dirs_and_overwrites() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("existing.txt"), "old").unwrap();

        let mut files = FileTree::new();
        files.insert("existing.txt".to_string(), "new".to_string());
        files.insert("deep/nested/file.txt".to_string(), "content".to_string());
        files.insert("deep/other.txt".to_string(), "other".to_string());

        write_file_tree(&files, dir.path()).unwrap();

        assert_eq!(fs::read_to_string(dir.path().join("existing.txt")).unwrap(), "new");
        assert_eq!(
            fs::read_to_string(dir.path().join("deep/nested/file.txt")).unwrap(),
            "content"
        );
        assert_eq!(fs::read_to_string(dir.path().join("deep/other.txt")).unwrap(), "other");
    }
}
