//! Build record written next to the kernel image.
//!
//! The boot-image packaging step reads this to find the image for a
//! container without recomputing the build layout.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Serialize;

use crate::container::Container;
use crate::kernel::params::PatchReport;

pub const MANIFEST_FILENAME: &str = "kernel-image.json";

#[derive(Debug, Serialize)]
pub struct BuildManifest<'a> {
    pub container: &'a Container,
    pub kernel_image: &'a Path,
    pub patches: &'a PatchReport,
}

pub fn manifest_path(build_dir: &Path) -> PathBuf {
    build_dir.join(MANIFEST_FILENAME)
}

pub fn write_manifest(build_dir: &Path, manifest: &BuildManifest<'_>) -> Result<PathBuf> {
    let path = manifest_path(build_dir);
    let json = serde_json::to_vec_pretty(manifest).context("serializing build manifest")?;
    fs::write(&path, json)
        .with_context(|| format!("writing build manifest '{}'", path.display()))?;
    Ok(path)
}
