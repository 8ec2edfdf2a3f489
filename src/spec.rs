//! # Spec File Reading
//!
//! A small, pure reader for RPM spec files. It extracts only what the build
//! pipeline needs: the package names a project produces, its dependency
//! declarations, its sources and patches, and the `Version:` / `Release:`
//! fields. Macro handling is limited to `%global` / `%define` values and the
//! `name` / `version` built-ins, which covers dependency names and source
//! file names in practice.
//!
//! Projects whose version should come from git declare it with the
//! [`VERSION_MACRO`]:
//!
//! ```text
//! Name:    helloworld
//! Version: %{_version}
//! Release: 1%{?dist}
//! ```
//!
//! [`patch`] rewrites such a spec with the resolved version and release.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use log::{debug, warn};

use crate::error::{Error, Result};

/// Version placeholder that asks for a git derived version.
pub const VERSION_MACRO: &str = "%{_version}";

/// Release macro expanded to the number of commits in the checkout.
pub const COMMIT_COUNT_MACRO: &str = "%{_commit_count}";

/// Release macro expanded to the abbreviated commit hash.
pub const COMMIT_HASH_MACRO: &str = "%{_commit_hash}";

/// The parts of a spec file the pipeline cares about
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SpecFile {
    /// Main package name, macros expanded.
    pub name: String,
    /// `Version:` as written.
    pub version: String,
    /// `Release:` as written.
    pub release: String,
    /// Every package produced: the main package first, then subpackages.
    pub packages: Vec<String>,
    pub build_requires: Vec<String>,
    pub requires: Vec<String>,
    /// `SourceN:` values as written.
    pub sources: Vec<String>,
    /// `PatchN:` values as written.
    pub patches: Vec<String>,
    /// `%global` and `%define` values.
    pub globals: HashMap<String, String>,
}

impl SpecFile {
    /// True when the version is taken from git instead of the spec.
    pub fn uses_version_macro(&self) -> bool {
        self.version.trim() == VERSION_MACRO
    }

    /// True when the release is templated from git.
    pub fn uses_commit_macros(&self) -> bool {
        self.release.contains(COMMIT_COUNT_MACRO) || self.release.contains(COMMIT_HASH_MACRO)
    }

    /// Declared version with spec macros expanded.
    pub fn expanded_version(&self) -> String {
        self.expand(&self.version, None)
    }

    /// Every dependency name, build and runtime, deduplicated in order.
    pub fn dependencies(&self) -> Vec<&str> {
        let mut deps: Vec<&str> = Vec::new();
        for dep in self.build_requires.iter().chain(self.requires.iter()) {
            if !deps.contains(&dep.as_str()) {
                deps.push(dep);
            }
        }
        deps
    }

    /// Expand `%{name}`, `%{version}` and spec globals in `text`.
    ///
    /// `version` overrides the declared version, for specs using the version
    /// macro. Unknown macros are left untouched, except conditional ones
    /// (`%{?foo}`) which expand to nothing.
    pub fn expand(&self, text: &str, version: Option<&str>) -> String {
        let mut values: HashMap<&str, String> = self
            .globals
            .iter()
            .map(|(k, v)| (k.as_str(), v.clone()))
            .collect();
        values.insert("name", self.name.clone());
        match version {
            Some(v) => {
                values.insert("version", v.to_string());
                values.insert("_version", v.to_string());
            }
            None if !self.uses_version_macro() => {
                values.insert("version", self.version.clone());
            }
            None => {}
        }
        expand_macros(text, &values)
    }
}

fn expand_macros(text: &str, values: &HashMap<&str, String>) -> String {
    let mut current = text.to_string();
    // Globals may reference each other; a few passes settle nested values.
    for _ in 0..4 {
        let next = expand_once(&current, values);
        if next == current {
            break;
        }
        current = next;
    }
    current
}

fn expand_once(text: &str, values: &HashMap<&str, String>) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(pos) = rest.find('%') {
        out.push_str(&rest[..pos]);
        let after = &rest[pos + 1..];

        if let Some(inner) = after.strip_prefix('{') {
            if let Some(end) = inner.find('}') {
                let body = &inner[..end];
                let (conditional, key) = match body.strip_prefix('?') {
                    Some(key) => (true, key),
                    None => (false, body),
                };
                if is_macro_name(key) {
                    match values.get(key) {
                        Some(value) => out.push_str(value),
                        None if conditional => {}
                        None => out.push_str(&rest[pos..pos + end + 3]),
                    }
                    rest = &inner[end + 1..];
                    continue;
                }
            }
        } else {
            let len = after
                .find(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
                .unwrap_or(after.len());
            let key = &after[..len];
            if let Some(value) = values.get(key).filter(|_| is_macro_name(key)) {
                out.push_str(value);
                rest = &after[len..];
                continue;
            }
        }

        out.push('%');
        rest = after;
    }
    out.push_str(rest);
    out
}

fn is_macro_name(key: &str) -> bool {
    key.chars()
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        && key.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Parse spec file content; `path` only labels errors.
///
/// Fails when the main package name is missing or declared after a
/// subpackage, or when `Version:` or `Release:` is missing.
pub fn parse(path: &Path, content: &str) -> Result<SpecFile> {
    let fail = |message: String| Error::Spec {
        path: path.to_path_buf(),
        message,
    };

    let mut spec = SpecFile::default();
    let mut subpackages: Vec<(bool, String)> = Vec::new();
    let mut in_preamble = true;

    for line in content.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        if let Some((name, value)) = parse_global(line) {
            spec.globals.insert(name, value);
            continue;
        }

        if let Some(rest) = line.strip_prefix("%package") {
            if spec.name.is_empty() {
                return Err(fail("subpackage defined before the Name: tag".to_string()));
            }
            subpackages.push(parse_subpackage(rest).map_err(fail)?);
            in_preamble = true;
            continue;
        }

        if line.starts_with('%') {
            // Scriptlet and %files sections end a preamble; only %package
            // starts a new one.
            if is_section_start(line) {
                in_preamble = false;
            }
            continue;
        }

        if !in_preamble {
            continue;
        }

        let Some((tag, value)) = parse_tag(line) else {
            continue;
        };
        match tag.as_str() {
            "name" if spec.name.is_empty() => spec.name = value,
            "version" if spec.version.is_empty() => spec.version = value,
            "release" if spec.release.is_empty() => spec.release = value,
            "buildrequires" => spec.build_requires.extend(split_dependencies(&value)),
            "requires" => spec.requires.extend(split_dependencies(&value)),
            "source" => spec.sources.push(value),
            "patch" => spec.patches.push(value),
            _ => {}
        }
    }

    if spec.name.is_empty() {
        return Err(fail("no Name: tag".to_string()));
    }
    if spec.version.is_empty() {
        return Err(fail("no Version: tag".to_string()));
    }
    if spec.release.is_empty() {
        return Err(fail("no Release: tag".to_string()));
    }

    let name = spec.expand(&spec.name, None);
    spec.name = name;
    spec.packages.push(spec.name.clone());
    for (full_name, sub) in subpackages {
        let package = if full_name {
            spec.expand(&sub, None)
        } else {
            format!("{}-{}", spec.name, spec.expand(&sub, None))
        };
        if !spec.packages.contains(&package) {
            spec.packages.push(package);
        }
    }

    let build_requires: Vec<String> = spec
        .build_requires
        .iter()
        .map(|d| spec.expand(d, None))
        .collect();
    let requires: Vec<String> = spec.requires.iter().map(|d| spec.expand(d, None)).collect();
    spec.build_requires = build_requires;
    spec.requires = requires;

    debug!("Read spec {}: packages {:?}", path.display(), spec.packages);
    Ok(spec)
}

/// `%global name value` or `%define name value`.
fn parse_global(line: &str) -> Option<(String, String)> {
    let rest = line
        .strip_prefix("%global")
        .or_else(|| line.strip_prefix("%define"))?;
    if !rest.starts_with(char::is_whitespace) {
        return None;
    }
    let rest = rest.trim_start();
    let (name, value) = rest.split_once(char::is_whitespace)?;
    is_macro_name(name).then(|| (name.to_string(), value.trim().to_string()))
}

/// `Source0: foo.tar.gz` yields `("source", "foo.tar.gz")`. Numeric suffixes
/// and qualifiers such as `Requires(post)` are dropped from the tag.
fn parse_tag(line: &str) -> Option<(String, String)> {
    let (tag, value) = line.split_once(':')?;
    let tag = tag.trim_end();
    let tag = match tag.find('(') {
        Some(open) if tag.ends_with(')') => &tag[..open],
        Some(_) => return None,
        None => tag,
    };
    let tag = tag.trim_end_matches(|c: char| c.is_ascii_digit());
    if tag.is_empty() || !tag.chars().all(|c| c.is_ascii_alphabetic()) {
        return None;
    }
    Some((tag.to_ascii_lowercase(), value.trim().to_string()))
}

fn is_section_start(line: &str) -> bool {
    const SECTIONS: &[&str] = &[
        "%description",
        "%prep",
        "%build",
        "%install",
        "%check",
        "%clean",
        "%files",
        "%changelog",
        "%pre",
        "%post",
        "%preun",
        "%postun",
        "%posttrans",
        "%pretrans",
        "%trigger",
        "%verifyscript",
    ];
    let word = line.split_whitespace().next().unwrap_or_default();
    SECTIONS.contains(&word) || word.starts_with("%trigger")
}

/// `%package foo` yields `(false, "foo")`, `%package -n foo` yields `(true, "foo")`.
fn parse_subpackage(rest: &str) -> std::result::Result<(bool, String), String> {
    let words: Vec<&str> = rest.split_whitespace().collect();
    match words.as_slice() {
        ["-n", name, ..] => Ok((true, (*name).to_string())),
        [name, ..] if !name.starts_with('-') => Ok((false, (*name).to_string())),
        _ => Err(format!("cannot read subpackage name from '%package{}'", rest)),
    }
}

/// Split a dependency list, dropping version constraints.
///
/// `foo >= 1.2, bar baz` yields `["foo", "bar", "baz"]`.
pub fn split_dependencies(value: &str) -> Vec<String> {
    let mut deps = Vec::new();
    let mut skip_next = false;
    for token in value
        .split(|c: char| c == ',' || c.is_whitespace())
        .filter(|t| !t.is_empty())
    {
        if skip_next {
            skip_next = false;
            continue;
        }
        if matches!(token, "<" | "<=" | "=" | "==" | ">=" | ">") {
            skip_next = true;
            continue;
        }
        // Rich dependencies and file paths are not package names.
        if token.starts_with('(') || token.starts_with('/') {
            continue;
        }
        deps.push(token.to_string());
    }
    deps
}

/// Rewrite `Version:` and `Release:` of spec content.
///
/// The version is also defined as the `_version` macro so that sources
/// written as `%{name}-%{_version}.tar.gz` keep resolving. Comment lines are
/// left untouched.
pub fn patch(content: &str, version: &str, release: &str) -> String {
    let mut out = format!("%define _version {}\n", version);
    let mut version_done = false;
    let mut release_done = false;
    for line in content.lines() {
        let trimmed = line.trim_start();
        let lower = trimmed.to_ascii_lowercase();
        if !trimmed.starts_with('#') && !version_done && lower.starts_with("version:") {
            out.push_str(&format!("Version: {}\n", version));
            version_done = true;
        } else if !trimmed.starts_with('#') && !release_done && lower.starts_with("release:") {
            out.push_str(&format!("Release: {}\n", release));
            release_done = true;
        } else {
            out.push_str(line);
            out.push('\n');
        }
    }
    out
}

/// Find the spec file of a project directory.
///
/// With `name` set, that file must exist. Otherwise the directory must hold
/// exactly one `*.spec` file at its top level.
pub fn locate(directory: &Path, name: Option<&str>) -> Result<PathBuf> {
    if let Some(name) = name {
        let path = directory.join(name);
        if !name.ends_with(".spec") {
            return Err(Error::Spec {
                path,
                message: "spec file name must end with .spec".to_string(),
            });
        }
        if !path.is_file() {
            return Err(Error::Spec {
                path,
                message: "spec file not found".to_string(),
            });
        }
        return Ok(path);
    }

    let pattern = directory.join("*.spec");
    let mut found: Vec<PathBuf> = glob::glob(&pattern.to_string_lossy())?
        .filter_map(|entry| entry.ok())
        .filter(|p| p.is_file())
        .collect();
    found.sort();

    match found.len() {
        0 => Err(Error::Spec {
            path: directory.to_path_buf(),
            message: "no spec file available".to_string(),
        }),
        1 => {
            debug!("Found spec file {}", found[0].display());
            Ok(found.remove(0))
        }
        _ => {
            warn!(
                "{} has {} spec files; set 'spec' for the project",
                directory.display(),
                found.len()
            );
            Err(Error::Spec {
                path: directory.to_path_buf(),
                message: "multiple spec files, cannot decide which one to use".to_string(),
            })
        }
    }
}

/// Read and parse a spec file from disk.
pub fn from_file(path: &Path) -> Result<SpecFile> {
    let content = fs::read_to_string(path).map_err(|e| Error::Spec {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;
    parse(path, &content)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const HELLO: &str = r#"
%global upstream hello
Name:           helloworld
Version:        %{_version}
Release:        1%{?dist}
Summary:        Says hello
License:        Apache-2.0
Source0:        %{name}-%{_version}.tar.gz
Patch0:         fix-greeting.patch
BuildRequires:  gcc, make
BuildRequires:  libgreet-devel >= 1.2
Requires:       libgreet

%description
Requires: not-a-real-dependency

%package devel
Summary: Headers
Requires: %{name} = %{version}-%{release}

%package -n python3-%{upstream}
Summary: Bindings

%prep
%setup -q

%files
%files devel
"#;

    #[test]
    fn test_parse_basic_fields() {
        let spec = parse(Path::new("hello.spec"), HELLO).unwrap();
        assert_eq!(spec.name, "helloworld");
        assert_eq!(spec.version, "%{_version}");
        assert_eq!(spec.release, "1%{?dist}");
        assert!(spec.uses_version_macro());
        assert!(!spec.uses_commit_macros());
        assert_eq!(spec.sources, vec!["%{name}-%{_version}.tar.gz"]);
        assert_eq!(spec.patches, vec!["fix-greeting.patch"]);
        assert_eq!(spec.globals.get("upstream").map(String::as_str), Some("hello"));
    }

    #[test]
    fn test_parse_packages_and_subpackages() {
        let spec = parse(Path::new("hello.spec"), HELLO).unwrap();
        assert_eq!(
            spec.packages,
            vec!["helloworld", "helloworld-devel", "python3-hello"]
        );
    }

    #[test]
    fn test_parse_dependencies_strip_constraints() {
        let spec = parse(Path::new("hello.spec"), HELLO).unwrap();
        assert_eq!(spec.build_requires, vec!["gcc", "make", "libgreet-devel"]);
        assert_eq!(spec.requires, vec!["libgreet", "helloworld"]);
        assert!(!spec
            .dependencies()
            .contains(&"not-a-real-dependency"));
    }

    #[test]
    fn test_subpackage_before_name_rejected() {
        let err = parse(Path::new("x.spec"), "%package devel\nName: x\nVersion: 1\nRelease: 1\n").unwrap_err();
        assert!(err.to_string().contains("before the Name"));
    }

    #[test]
    fn test_missing_release_rejected() {
        let err = parse(Path::new("x.spec"), "Name: x\nVersion: 1\n").unwrap_err();
        assert!(err.to_string().contains("Release"));
    }

    #[test]
    fn test_expand_with_resolved_version() {
        let spec = parse(Path::new("hello.spec"), HELLO).unwrap();
        assert_eq!(
            spec.expand(&spec.sources[0], Some("1.0.c2.gad96bc2")),
            "helloworld-1.0.c2.gad96bc2.tar.gz"
        );
    }

    #[test]
    fn test_literal_version_expands_globals() {
        let spec =
            parse(Path::new("tool.spec"), "%global major 2\nName: tool\nVersion: %{major}.4\nRelease: 3\n").unwrap();
        assert!(!spec.uses_version_macro());
        assert_eq!(spec.expanded_version(), "2.4");
    }

    #[test]
    fn test_commit_macros_detected() {
        let spec = parse(Path::new("x.spec"), "Name: x\nVersion: %{_version}\nRelease: %{_commit_count}.g%{_commit_hash}\n")
            .unwrap();
        assert!(spec.uses_commit_macros());
    }

    #[test]
    fn test_split_dependencies() {
        assert_eq!(split_dependencies("a, b >= 1.0 c"), vec!["a", "b", "c"]);
        assert_eq!(split_dependencies("/usr/bin/python3 foo"), vec!["foo"]);
        assert!(split_dependencies("").is_empty());
    }

    #[test]
    fn test_patch_replaces_version_and_release() {
        let content = "# Version: keep me\nName: x\nVersion: %{_version}\nRelease: 1%{?dist}\n";
        let patched = patch(content, "1.0.c2.gad96bc2", "3%{?dist}");
        assert!(patched.starts_with("%define _version 1.0.c2.gad96bc2\n"));
        assert!(patched.contains("# Version: keep me\n"));
        assert!(patched.contains("\nVersion: 1.0.c2.gad96bc2\n"));
        assert!(patched.contains("\nRelease: 3%{?dist}\n"));
        assert!(!patched.contains("Release: 1%{?dist}"));
    }

    #[test]
    fn test_locate_single_spec() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("hello.spec"), HELLO).unwrap();
        let path = locate(dir.path(), None).unwrap();
        assert_eq!(path, dir.path().join("hello.spec"));
    }

    #[test]
    fn test_locate_multiple_specs_fails() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("a.spec"), HELLO).unwrap();
        fs::write(dir.path().join("b.spec"), HELLO).unwrap();
        let err = locate(dir.path(), None).unwrap_err();
        assert!(err.to_string().contains("multiple spec files"));
        assert_eq!(
            locate(dir.path(), Some("b.spec")).unwrap(),
            dir.path().join("b.spec")
        );
    }

    #[test]
    fn test_locate_missing_named_spec() {
        let dir = TempDir::new().unwrap();
        let err = locate(dir.path(), Some("nothere.spec")).unwrap_err();
        assert!(err.to_string().contains("not found"));
    }

    #[test]
    fn test_from_file_reports_path() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("broken.spec");
        fs::write(&path, "Version: 1\n").unwrap();
        let err = from_file(&path).unwrap_err();
        assert!(err.to_string().contains("broken.spec"));
        assert!(err.to_string().contains("Name"));
    }
}
