//! # Builder Invoker
//!
//! Turns one project checkout into packages:
//!
//! 1. **Spec**: a spec using the version macro gets a patched copy with the
//!    resolved version and the next release number.
//! 2. **Sources**: remote sources are downloaded with `spectool`, local ones
//!    copied from the checkout; a missing source archive is created from the
//!    checkout itself.
//! 3. **Mock**: for every root, `mock --buildsrpm` then `mock --rebuild`.
//! 4. **Publish**: when every root succeeded, the packages are stored in the
//!    build repository and its metadata is regenerated.
//!
//! Nothing is published for a project that failed in any root.

use std::cell::RefCell;
use std::collections::HashSet;
use std::fs::{self, File};
use std::path::{Path, PathBuf};

use flate2::write::GzEncoder;
use flate2::Compression;
use log::{debug, info, warn};
use walkdir::WalkDir;

use crate::error::{Error, Result};
use crate::mock::{BuildTools, MockEnvironment, MockOptions};
use crate::package;
use crate::project::ProjectPaths;
use crate::repository::{PackageRepository, RepoIndexer};
use crate::spec::{self, SpecFile, COMMIT_COUNT_MACRO, COMMIT_HASH_MACRO};

/// Everything needed to build one project
#[derive(Debug, Clone)]
pub struct BuildRequest<'a> {
    pub project: &'a str,
    /// Root of the project sources.
    pub source_dir: &'a Path,
    /// Spec file inside `source_dir`.
    pub spec_path: &'a Path,
    pub spec: &'a SpecFile,
    /// Version resolved from git.
    pub version: &'a str,
    /// Commit count and abbreviated hash, for the git release macros.
    pub commit: Option<(u64, String)>,
}

/// Packages produced for one project
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuildOutput {
    pub version: String,
    pub release: String,
    /// Binary packages as stored in the build repository.
    pub rpms: Vec<PathBuf>,
    /// Source packages as stored in the build repository.
    pub srpms: Vec<PathBuf>,
    /// Non-fatal problems, such as failed metadata updates.
    pub warnings: Vec<String>,
}

/// Drives the build tools for a workspace
pub struct Builder<'a> {
    workspace: &'a Path,
    env: &'a MockEnvironment,
    options: &'a MockOptions,
    tools: &'a dyn BuildTools,
    indexer: &'a dyn RepoIndexer,
    repository: &'a PackageRepository,
    initialised: RefCell<HashSet<String>>,
}

impl<'a> Builder<'a> {
    pub fn new(
        workspace: &'a Path,
        env: &'a MockEnvironment,
        options: &'a MockOptions,
        tools: &'a dyn BuildTools,
        indexer: &'a dyn RepoIndexer,
        repository: &'a PackageRepository,
    ) -> Self {
        Self {
            workspace,
            env,
            options,
            tools,
            indexer,
            repository,
            initialised: RefCell::new(HashSet::new()),
        }
    }

    /// Build a project in every mock root and publish the packages.
    pub fn build(&self, request: &BuildRequest<'_>) -> Result<BuildOutput> {
        let paths = ProjectPaths::new(self.workspace, request.project);
        let spec = request.spec;

        let (spec_file, version, release) = self.prepare_spec(request, &paths)?;
        info!(
            "Building {} version {} release {}",
            request.project, version, release
        );

        self.gather_sources(request, &spec_file, &version, &paths.sources)?;

        let mut produced: Vec<(String, Vec<PathBuf>)> = Vec::new();
        for root in self.env.root_names() {
            let packages = self.build_in_root(request.project, root, &spec_file, &paths)?;
            produced.push((root.to_string(), packages));
        }

        let mut output = BuildOutput {
            version,
            release,
            ..Default::default()
        };
        for (root, packages) in produced {
            let (stored, warning) = self.repository.publish(&root, &packages, self.indexer)?;
            for path in stored {
                if package::is_source_package(&path) {
                    output.srpms.push(path);
                } else {
                    output.rpms.push(path);
                }
            }
            if let Some(e) = warning {
                output.warnings.push(e.to_string());
            }
        }

        debug!(
            "{} produced {} binary and {} source packages of {}",
            request.project,
            output.rpms.len(),
            output.srpms.len(),
            spec.name
        );
        Ok(output)
    }

    /// Write the spec handed to mock; returns its path, version and release.
    fn prepare_spec(
        &self,
        request: &BuildRequest<'_>,
        paths: &ProjectPaths,
    ) -> Result<(PathBuf, String, String)> {
        let spec = request.spec;
        if !spec.uses_version_macro() && !spec.uses_commit_macros() {
            debug!("{} declares version {}", request.project, spec.version);
            return Ok((
                request.spec_path.to_path_buf(),
                spec.expanded_version(),
                spec.release.clone(),
            ));
        }

        let version = if spec.uses_version_macro() {
            request.version.to_string()
        } else {
            spec.expanded_version()
        };

        let release = if spec.uses_commit_macros() {
            let (count, hash) = request.commit.clone().unwrap_or_else(|| {
                warn!(
                    "{} uses git release macros but has no git history",
                    request.project
                );
                (0, "0".to_string())
            });
            spec.release
                .replace(COMMIT_COUNT_MACRO, &count.to_string())
                .replace(COMMIT_HASH_MACRO, &hash)
        } else {
            let first_root = self.env.first_root().unwrap_or_default();
            package::next_release(
                &self.repository.rpm_dir(first_root),
                &spec.name,
                &version,
                &spec.release,
            )?
        };

        let content = fs::read_to_string(request.spec_path).map_err(|e| Error::Spec {
            path: request.spec_path.to_path_buf(),
            message: e.to_string(),
        })?;
        let patched_version = if spec.uses_version_macro() {
            version.clone()
        } else {
            spec.version.clone()
        };
        let patched = spec::patch(&content, &patched_version, &release);

        fs::create_dir_all(&paths.spec)?;
        let file_name = request
            .spec_path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| format!("{}.spec", request.project).into());
        let target = paths.spec.join(file_name);
        fs::write(&target, patched)?;
        debug!("Patched spec written to {}", target.display());

        Ok((target, version, release))
    }

    /// Fill the sources directory handed to mock.
    fn gather_sources(
        &self,
        request: &BuildRequest<'_>,
        spec_file: &Path,
        version: &str,
        sources_dir: &Path,
    ) -> Result<()> {
        let spec = request.spec;
        clean_directory(sources_dir)?;

        let mut remote = false;
        for source in &spec.sources {
            let expanded = spec.expand(source, Some(version));
            if is_remote(&expanded) {
                remote = true;
                continue;
            }
            let file_name = base_name(&expanded);
            match find_source_file(request.source_dir, file_name) {
                Some(found) => {
                    fs::copy(&found, sources_dir.join(file_name))?;
                }
                None if is_tarball(file_name) => {
                    create_source_archive(request.source_dir, &sources_dir.join(file_name))?;
                }
                None => {
                    return Err(Error::Spec {
                        path: request.spec_path.to_path_buf(),
                        message: format!("source {} not found in the checkout", file_name),
                    });
                }
            }
        }

        for patch in &spec.patches {
            let expanded = spec.expand(patch, Some(version));
            let file_name = base_name(&expanded);
            let found = find_source_file(request.source_dir, file_name).ok_or_else(|| {
                Error::Spec {
                    path: request.spec_path.to_path_buf(),
                    message: format!("patch {} not found in the checkout", file_name),
                }
            })?;
            fs::copy(&found, sources_dir.join(file_name))?;
        }

        if remote {
            info!("Downloading remote sources of {}", request.project);
            self.tools
                .download_sources(request.project, spec_file, sources_dir)?;
        }
        Ok(())
    }

    /// Build source and binary packages in one root; returns every package
    /// produced.
    fn build_in_root(
        &self,
        project: &str,
        root: &str,
        spec_file: &Path,
        paths: &ProjectPaths,
    ) -> Result<Vec<PathBuf>> {
        if self.options.init && !self.initialised.borrow().contains(root) {
            fs::create_dir_all(&paths.root)?;
            self.tools.init_chroot(self.env, root, &paths.root)?;
            self.initialised.borrow_mut().insert(root.to_string());
        }

        let srpm_dir = paths.srpm_for_root(root);
        let rpm_dir = paths.rpm_for_root(root);
        clean_directory(&srpm_dir)?;
        clean_directory(&rpm_dir)?;

        let local_repo = self.repository.rpm_dir(root);
        let local_repo = self
            .repository
            .has_metadata(root)
            .then_some(local_repo.as_path());

        let result = self
            .tools
            .build_srpm(
                self.env,
                project,
                root,
                spec_file,
                &paths.sources,
                &srpm_dir,
                local_repo,
            )
            .and_then(|()| {
                let srpm = single_source_package(project, root, &srpm_dir)?;
                self.tools
                    .rebuild(self.env, project, root, &srpm, &rpm_dir, local_repo)?;
                Ok(srpm)
            });

        let srpm = match result {
            Ok(srpm) => srpm,
            Err(e) => {
                if self.options.scrub {
                    if let Err(scrub) = self.tools.scrub_chroot(self.env, root) {
                        warn!("{}", scrub);
                    }
                }
                return Err(e);
            }
        };

        let rpms = list_packages(&rpm_dir, package::is_binary_package)?;
        if rpms.is_empty() {
            return Err(Error::BuildTool {
                project: project.to_string(),
                root: root.to_string(),
                message: format!("no binary packages in {}", rpm_dir.display()),
            });
        }

        let mut packages = rpms;
        packages.push(srpm);
        Ok(packages)
    }
}

fn single_source_package(project: &str, root: &str, dir: &Path) -> Result<PathBuf> {
    list_packages(dir, package::is_source_package)?
        .into_iter()
        .next()
        .ok_or_else(|| Error::BuildTool {
            project: project.to_string(),
            root: root.to_string(),
            message: format!("no source package in {}", dir.display()),
        })
}

fn list_packages(dir: &Path, keep: fn(&Path) -> bool) -> Result<Vec<PathBuf>> {
    let pattern = dir.join("*.rpm");
    let mut found: Vec<PathBuf> = glob::glob(&pattern.to_string_lossy())?
        .filter_map(|entry| entry.ok())
        .filter(|p| keep(p))
        .collect();
    found.sort();
    Ok(found)
}

/// Make sure `dir` exists and is empty.
fn clean_directory(dir: &Path) -> Result<()> {
    if dir.exists() {
        fs::remove_dir_all(dir)?;
    }
    fs::create_dir_all(dir)?;
    Ok(())
}

fn is_remote(source: &str) -> bool {
    ["http://", "https://", "ftp://"]
        .iter()
        .any(|scheme| source.starts_with(scheme))
}

fn is_tarball(file_name: &str) -> bool {
    file_name.ends_with(".tar.gz") || file_name.ends_with(".tgz")
}

fn base_name(source: &str) -> &str {
    source.rsplit('/').next().unwrap_or(source)
}

/// Look for a source file in the checkout root, then in `SOURCES/`.
fn find_source_file(source_dir: &Path, file_name: &str) -> Option<PathBuf> {
    [
        source_dir.join(file_name),
        source_dir.join("SOURCES").join(file_name),
    ]
    .into_iter()
    .find(|p| p.is_file())
}

/// Archive the checkout as `<archive>` with top directory named after the
/// archive (`hello-1.0.tar.gz` contains `hello-1.0/`). Git metadata and spec
/// files are left out.
pub fn create_source_archive(source_dir: &Path, archive: &Path) -> Result<()> {
    let file_name = archive
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    let top = file_name
        .strip_suffix(".tar.gz")
        .or_else(|| file_name.strip_suffix(".tgz"))
        .unwrap_or(&file_name)
        .to_string();
    info!("Creating source archive {}", archive.display());

    let encoder = GzEncoder::new(File::create(archive)?, Compression::default());
    let mut tar = tar::Builder::new(encoder);
    tar.follow_symlinks(false);

    let walker = WalkDir::new(source_dir)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| e.file_name() != ".git");
    for entry in walker {
        let entry = entry?;
        let path = entry.path();
        let Ok(relative) = path.strip_prefix(source_dir) else {
            continue;
        };
        let name = Path::new(&top).join(relative);
        if entry.file_type().is_dir() {
            tar.append_dir(&name, path)?;
        } else if path.extension().is_some_and(|ext| ext == "spec") {
            debug!("Leaving {} out of the archive", path.display());
        } else {
            tar.append_path_with_name(path, &name)?;
        }
    }

    tar.into_inner()?.finish()?;
    Ok(())
}
