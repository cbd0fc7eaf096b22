//! Per-container build paths.
//!
//! Every container gets its own out-of-tree kernel build directory, derived
//! from where the kernel source sits in the project:
//!
//! ```text
//! <project>/conts/linux      ->  <build root>/cont0/linux
//!                                <build root>/cont1/linux
//! ```

use std::ffi::OsStr;
use std::path::{Component, Path, PathBuf};

use anyhow::Result;
use tracing::warn;

use crate::error::ConfigError;

/// Path segment that is replaced by `cont<id>` in the build directory.
pub const CONTAINERS_SEGMENT: &str = "conts";

pub(crate) fn resolve_repo_path(repo_root: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        repo_root.join(path)
    }
}

/// Resolve `.` and `..` components without touching the filesystem.
///
/// `..` at the root stays at the root; leading `..` of a relative path are
/// kept.
pub fn normalize_lexically(path: &Path) -> PathBuf {
    let mut parts: Vec<Component> = Vec::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => match parts.last() {
                Some(Component::Normal(_)) => {
                    parts.pop();
                }
                Some(Component::RootDir) | Some(Component::Prefix(_)) => {}
                _ => parts.push(component),
            },
            other => parts.push(other),
        }
    }

    if parts.is_empty() {
        return PathBuf::from(".");
    }
    parts.iter().map(|c| c.as_os_str()).collect()
}

/// Map a source directory under `project_root` to its build directory for
/// container `id`.
///
/// Each `conts` segment of the project-relative source path becomes
/// `cont<id>`; the result is placed under `build_root`.
pub fn source_to_builddir(
    project_root: &Path,
    build_root: &Path,
    source_dir: &Path,
    id: u32,
) -> Result<PathBuf> {
    let relative = source_dir
        .strip_prefix(project_root)
        .map_err(|_| ConfigError::Layout {
            kernel_dir: source_dir.to_path_buf(),
            project_root: project_root.to_path_buf(),
        })?;

    let container_segment = format!("cont{}", id);
    let mut replaced = false;
    let mut mapped = PathBuf::new();
    for component in relative.components() {
        let part = component.as_os_str();
        if part == OsStr::new(CONTAINERS_SEGMENT) {
            mapped.push(&container_segment);
            replaced = true;
        } else {
            mapped.push(part);
        }
    }

    if !replaced {
        warn!(
            source = %source_dir.display(),
            "source dir has no '{}' segment; build dir is shared by all containers",
            CONTAINERS_SEGMENT
        );
    }

    Ok(build_root.join(mapped))
}

/// Lexical path from directory `from` to `to`, using `..` where needed.
///
/// Both paths should be absolute (or both relative to the same base); no
/// filesystem access or symlink resolution takes place.
pub fn relative_path(from: &Path, to: &Path) -> PathBuf {
    let from: Vec<Component> = from.components().filter(|c| *c != Component::CurDir).collect();
    let to: Vec<Component> = to.components().filter(|c| *c != Component::CurDir).collect();

    let common = from
        .iter()
        .zip(to.iter())
        .take_while(|(a, b)| a == b)
        .count();

    let mut relative = PathBuf::new();
    for _ in common..from.len() {
        relative.push("..");
    }
    for component in &to[common..] {
        relative.push(component.as_os_str());
    }

    if relative.as_os_str().is_empty() {
        PathBuf::from(".")
    } else {
        relative
    }
}

/// All paths involved in building one container's kernel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildPaths {
    pub kernel_dir: PathBuf,
    pub build_dir: PathBuf,
    pub lds_in: PathBuf,
    pub lds_out: PathBuf,
    pub stub_in: PathBuf,
    pub stub_out: PathBuf,
    pub image: PathBuf,
    /// Raw kernel image relative to `kernel_dir`; the boot stub includes it
    /// from there, since the toolchain runs inside the kernel tree.
    pub raw_image_rel: PathBuf,
}

impl BuildPaths {
    pub fn new(
        project_root: &Path,
        build_root: &Path,
        kernel_dir: &Path,
        arch: &str,
        container_id: u32,
    ) -> Result<Self> {
        let build_dir = source_to_builddir(project_root, build_root, kernel_dir, container_id)?;
        let raw_image_rel = relative_path(kernel_dir, &build_dir)
            .join("arch")
            .join(arch)
            .join("boot/Image");

        Ok(Self {
            kernel_dir: kernel_dir.to_path_buf(),
            lds_in: kernel_dir.join("linux.lds.in"),
            lds_out: build_dir.join("linux.lds"),
            stub_in: kernel_dir.join("linux.S.in"),
            stub_out: build_dir.join("linux.S"),
            image: build_dir.join("linux.elf"),
            build_dir,
            raw_image_rel,
        })
    }
}
