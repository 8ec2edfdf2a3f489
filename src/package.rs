//! Package file names and release numbering.

use std::env;
use std::fs;
use std::path::Path;

use log::debug;

use crate::defaults::BUILD_NUMBER_ENV;
use crate::error::{Error, Result};

/// A parsed `<name>-<version>-<release>.<arch>.rpm` file name
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageFile {
    pub name: String,
    pub version: String,
    pub release: String,
    pub arch: String,
}

impl PackageFile {
    /// Parse a package file name; `None` for anything else.
    pub fn parse(file_name: &str) -> Option<Self> {
        let stem = file_name.strip_suffix(".rpm")?;
        let (nvr, arch) = stem.rsplit_once('.')?;
        let (nv, release) = nvr.rsplit_once('-')?;
        let (name, version) = nv.rsplit_once('-')?;
        if [name, version, release, arch].iter().any(|s| s.is_empty()) {
            return None;
        }
        Some(Self {
            name: name.to_string(),
            version: version.to_string(),
            release: release.to_string(),
            arch: arch.to_string(),
        })
    }

    pub fn file_name(&self) -> String {
        format!(
            "{}-{}-{}.{}.rpm",
            self.name, self.version, self.release, self.arch
        )
    }

    pub fn is_source(&self) -> bool {
        self.arch == "src"
    }

    /// Leading number of the release, `3` for `3.el7`.
    pub fn release_number(&self) -> Option<u64> {
        split_release(&self.release).0
    }
}

/// Split a release into its leading number and the rest.
fn split_release(release: &str) -> (Option<u64>, &str) {
    let digits = release
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(release.len());
    (release[..digits].parse().ok(), &release[digits..])
}

/// True for binary package files (source packages excluded).
pub fn is_binary_package(path: &Path) -> bool {
    path.is_file()
        && path
            .file_name()
            .and_then(|n| n.to_str())
            .and_then(PackageFile::parse)
            .is_some_and(|p| !p.is_source())
}

/// True for source package files.
pub fn is_source_package(path: &Path) -> bool {
    path.is_file()
        && path
            .file_name()
            .and_then(|n| n.to_str())
            .and_then(PackageFile::parse)
            .is_some_and(|p| p.is_source())
}

/// Highest release number of binary packages `name`-`version` among
/// `files`.
pub fn latest_release_of<'a>(
    files: impl IntoIterator<Item = &'a str>,
    name: &str,
    version: &str,
) -> Option<u64> {
    files
        .into_iter()
        .filter_map(PackageFile::parse)
        .filter(|p| !p.is_source() && p.name == name && p.version == version)
        .filter_map(|p| {
            let number = p.release_number()?;
            debug!("Found previous build {}", p.file_name());
            Some(number)
        })
        .max()
}

/// Release for the next build of `name`-`version`, given the package files
/// already built.
///
/// One more than the highest release among `files`. The non-numeric suffix
/// of the spec's release (such as `%{?dist}`) is kept. Without a previous
/// package `seed` gives the number, otherwise the release starts at 1.
pub fn next_release_of<'a>(
    files: impl IntoIterator<Item = &'a str>,
    name: &str,
    version: &str,
    spec_release: &str,
    seed: Option<u64>,
) -> Result<String> {
    let suffix = match split_release(spec_release.trim()) {
        (Some(_), suffix) => suffix,
        (None, _) => "",
    };
    let number = match latest_release_of(files, name, version) {
        Some(latest) => latest.checked_add(1).ok_or_else(|| Error::Release {
            package: name.to_string(),
            version: version.to_string(),
            message: format!("release {} is the highest possible", latest),
        })?,
        None => seed.unwrap_or(1),
    };
    Ok(format!("{}{}", number, suffix))
}

/// Highest release number of binary packages `name`-`version` in `dir`.
pub fn latest_release(dir: &Path, name: &str, version: &str) -> Result<Option<u64>> {
    let files = package_files(dir)?;
    Ok(latest_release_of(files.iter().map(String::as_str), name, version))
}

/// Release for the next build of `name`-`version` from the packages in
/// `dir`, seeded by the `BUILD_NUMBER` environment variable.
pub fn next_release(dir: &Path, name: &str, version: &str, spec_release: &str) -> Result<String> {
    let files = package_files(dir)?;
    next_release_of(
        files.iter().map(String::as_str),
        name,
        version,
        spec_release,
        build_number(),
    )
}

/// File names in `dir`, none when it does not exist.
fn package_files(dir: &Path) -> Result<Vec<String>> {
    if !dir.is_dir() {
        return Ok(Vec::new());
    }
    let mut files = Vec::new();
    for entry in fs::read_dir(dir)? {
        if let Some(name) = entry?.file_name().to_str() {
            files.push(name.to_string());
        }
    }
    Ok(files)
}

fn build_number() -> Option<u64> {
    let value = env::var(BUILD_NUMBER_ENV).ok()?;
    let number = value.trim().parse().ok().filter(|n| *n > 0);
    if number.is_some() {
        debug!("Seeding release from {}={}", BUILD_NUMBER_ENV, value);
    }
    number
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use tempfile::TempDir;

    fn touch(dir: &Path, name: &str) {
        fs::write(dir.join(name), b"").unwrap();
    }

    #[test]
    fn test_parse_package_file() {
        let p = PackageFile::parse("helloworld-1.0.c2.gad96bc2-1.el7.x86_64.rpm").unwrap();
        assert_eq!(p.name, "helloworld");
        assert_eq!(p.version, "1.0.c2.gad96bc2");
        assert_eq!(p.release, "1.el7");
        assert_eq!(p.arch, "x86_64");
        assert_eq!(p.release_number(), Some(1));
        assert_eq!(
            p.file_name(),
            "helloworld-1.0.c2.gad96bc2-1.el7.x86_64.rpm"
        );
    }

    #[test]
    fn test_parse_dashed_name_and_source() {
        let p = PackageFile::parse("python3-hello-devel-2.1-4.src.rpm").unwrap();
        assert_eq!(p.name, "python3-hello-devel");
        assert!(p.is_source());
        assert!(PackageFile::parse("README.md").is_none());
        assert!(PackageFile::parse("noversion.x86_64.rpm").is_none());
    }

    const BUILT: [&str; 6] = [
        "hello-1.0-1.el7.x86_64.rpm",
        "hello-1.0-3.el7.x86_64.rpm",
        "hello-1.0-9.el7.src.rpm",
        "hello-2.0-7.el7.x86_64.rpm",
        "hello-devel-1.0-8.el7.x86_64.rpm",
        "repodata",
    ];
    const NONE: [&str; 0] = [];

    #[test]
    fn test_next_release_increments_highest() {
        assert_eq!(latest_release_of(BUILT, "hello", "1.0"), Some(3));
        assert_eq!(
            next_release_of(BUILT, "hello", "1.0", "1%{?dist}", None).unwrap(),
            "4%{?dist}"
        );
        assert_eq!(
            next_release_of(BUILT, "hello", "1.0", "1", Some(42)).unwrap(),
            "4"
        );
        assert_eq!(
            next_release_of(BUILT, "hello-devel", "1.0", "1", None).unwrap(),
            "9"
        );
    }

    #[test]
    fn test_next_release_without_previous_package() {
        assert_eq!(
            next_release_of(NONE, "hello", "1.0", "1%{?dist}", None).unwrap(),
            "1%{?dist}"
        );
        assert_eq!(
            next_release_of(BUILT, "hello", "3.0", "5", Some(42)).unwrap(),
            "42"
        );
        // A release without a leading number keeps no suffix
        assert_eq!(
            next_release_of(NONE, "hello", "1.0", "%{?dist}", None).unwrap(),
            "1"
        );
    }

    #[test]
    fn test_next_release_at_highest_number_fails() {
        let files = ["hello-1.0-18446744073709551615.el7.x86_64.rpm"];
        let err = next_release_of(files, "hello", "1.0", "1%{?dist}", None).unwrap_err();
        assert!(matches!(err, Error::Release { .. }));
        assert!(err.to_string().contains("hello-1.0"));
    }

    #[test]
    #[serial]
    fn test_next_release_reads_directory_and_build_number() {
        let temp = TempDir::new().unwrap();
        env::set_var(BUILD_NUMBER_ENV, "42");
        let seeded = next_release(temp.path(), "hello", "1.0", "1%{?dist}").unwrap();
        let missing = next_release(&temp.path().join("missing"), "hello", "1.0", "1").unwrap();
        touch(temp.path(), "hello-1.0-2.el7.x86_64.rpm");
        let incremented = next_release(temp.path(), "hello", "1.0", "1%{?dist}").unwrap();
        env::remove_var(BUILD_NUMBER_ENV);

        assert_eq!(seeded, "42%{?dist}");
        assert_eq!(missing, "42");
        assert_eq!(incremented, "3%{?dist}");
        assert_eq!(latest_release(temp.path(), "hello", "1.0").unwrap(), Some(2));
    }

    #[test]
    fn test_package_kind_checks() {
        let temp = TempDir::new().unwrap();
        touch(temp.path(), "hello-1.0-1.x86_64.rpm");
        touch(temp.path(), "hello-1.0-1.src.rpm");
        assert!(is_binary_package(&temp.path().join("hello-1.0-1.x86_64.rpm")));
        assert!(!is_binary_package(&temp.path().join("hello-1.0-1.src.rpm")));
        assert!(is_source_package(&temp.path().join("hello-1.0-1.src.rpm")));
        assert!(!is_source_package(&temp.path().join("missing-1.0-1.src.rpm")));
    }
}
