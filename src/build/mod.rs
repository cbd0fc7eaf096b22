//! Per-container kernel build.
//!
//! # Usage
//!
//! ```rust,ignore
//! use cont_kernel_builder::{build::KernelBuilder, BuildConfig};
//!
//! let config = BuildConfig::load_default()?;
//! let mut builder = KernelBuilder::new(&config)?;
//! let image = builder.build()?;
//! ```
//!
//! The build mutates the kernel source tree in place (see
//! [`crate::kernel::params`]), so only one build may run against a given
//! tree at a time.

pub mod manifest;
pub mod template;

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use tracing::info;

use crate::config::{BuildConfig, PatchPolicy, ToolchainConfig};
use crate::container::Container;
use crate::kernel::board::VERSATILE;
use crate::kernel::params::{KernelParamUpdater, PatchReport};
use crate::paths::BuildPaths;
use crate::preflight;
use crate::process::Cmd;

use manifest::BuildManifest;

/// Builds and cleans one container's kernel.
pub struct KernelBuilder {
    container: Container,
    paths: BuildPaths,
    toolchain: ToolchainConfig,
    patch: PatchPolicy,
    updater: KernelParamUpdater,
    kernel_image: Option<PathBuf>,
}

impl KernelBuilder {
    /// Derive the build layout for `config`. Touches nothing on disk.
    ///
    /// The project root must be absolute: the toolchain runs from inside the
    /// kernel tree, where relative paths would resolve elsewhere.
    pub fn new(config: &BuildConfig) -> Result<Self> {
        if !config.project_root.is_absolute() {
            bail!(
                "project root '{}' must be an absolute path",
                config.project_root.display()
            );
        }
        let paths = BuildPaths::new(
            &config.project_root,
            &config.build_root,
            &config.kernel_dir,
            &config.toolchain.arch,
            config.container.id,
        )?;
        let updater = KernelParamUpdater::new(
            &config.kernel_dir,
            &config.container,
            &VERSATILE,
            &config.patch.switches,
        )?;

        Ok(Self {
            container: config.container,
            paths,
            toolchain: config.toolchain.clone(),
            patch: config.patch.clone(),
            updater,
            kernel_image: None,
        })
    }

    pub fn container_id(&self) -> u32 {
        self.container.id
    }

    pub fn build_dir(&self) -> &Path {
        &self.paths.build_dir
    }

    /// Final image, once [`build`](Self::build) has succeeded.
    pub fn kernel_image(&self) -> Option<&Path> {
        self.kernel_image.as_deref()
    }

    /// Patch the source tree for this container only.
    pub fn update_kernel_params(&self) -> Result<PatchReport> {
        self.updater
            .apply_all(self.patch.strict)
            .with_context(|| format!("patching kernel parameters for container {}", self.container.id))
    }

    /// Patch, configure, compile and link the container kernel.
    ///
    /// Returns the path of the final `linux.elf`.
    pub fn build(&mut self) -> Result<PathBuf> {
        info!(
            container = self.container.id,
            kernel = %self.paths.kernel_dir.display(),
            "building linux kernel"
        );

        preflight::check_toolchain(&self.toolchain)?;

        let report = self.update_kernel_params()?;

        let build_dir = &self.paths.build_dir;
        if !build_dir.exists() {
            fs::create_dir_all(build_dir)
                .with_context(|| format!("creating build directory '{}'", build_dir.display()))?;
        }

        self.configure()?;
        self.compile()?;
        self.write_boot_stub()?;
        self.preprocess_linker_script()?;
        self.link()?;

        let image = self.paths.image.clone();
        if !image.is_file() {
            bail!("linker reported success but '{}' was not produced", image.display());
        }

        manifest::write_manifest(
            build_dir,
            &BuildManifest {
                container: &self.container,
                kernel_image: &image,
                patches: &report,
            },
        )?;

        info!(image = %image.display(), "kernel image ready");
        self.kernel_image = Some(image.clone());
        Ok(image)
    }

    /// Remove this container's build directory, if any.
    ///
    /// Returns whether a directory was removed.
    pub fn clean(&self) -> Result<bool> {
        let build_dir = &self.paths.build_dir;
        info!(dir = %build_dir.display(), "cleaning linux kernel build");

        if !build_dir.exists() {
            return Ok(false);
        }
        fs::remove_dir_all(build_dir)
            .with_context(|| format!("removing build directory '{}'", build_dir.display()))?;
        Ok(true)
    }

    fn out_of_tree_arg(&self) -> String {
        format!("O={}", self.paths.build_dir.display())
    }

    fn configure(&self) -> Result<()> {
        info!(defconfig = %self.toolchain.defconfig, "configuring kernel");
        Cmd::new(&self.toolchain.make)
            .arg(&self.toolchain.defconfig)
            .arg(format!("ARCH={}", self.toolchain.arch))
            .arg(self.out_of_tree_arg())
            .dir(&self.paths.kernel_dir)
            .error_msg("kernel configuration failed")
            .run_interactive()?;
        Ok(())
    }

    fn compile(&self) -> Result<()> {
        let jobs = self.toolchain.jobs();
        info!(jobs, "compiling kernel");
        Cmd::new(&self.toolchain.make)
            .arg(format!("ARCH={}", self.toolchain.arch))
            .arg(format!("CROSS_COMPILE={}", self.toolchain.cross_compile))
            .arg(self.out_of_tree_arg())
            .arg(format!("-j{}", jobs))
            .dir(&self.paths.kernel_dir)
            .error_msg("kernel build failed")
            .run_interactive()?;
        Ok(())
    }

    fn write_boot_stub(&self) -> Result<()> {
        let stub_in = &self.paths.stub_in;
        let template = fs::read_to_string(stub_in)
            .with_context(|| format!("reading boot stub template '{}'", stub_in.display()))?;

        let image = self.paths.raw_image_rel.to_string_lossy();
        let stub = template::render(&template, &image)
            .with_context(|| format!("rendering boot stub template '{}'", stub_in.display()))?;

        fs::write(&self.paths.stub_out, stub).with_context(|| {
            format!("writing boot stub '{}'", self.paths.stub_out.display())
        })?;
        Ok(())
    }

    fn preprocess_linker_script(&self) -> Result<()> {
        let output = Cmd::new(self.toolchain.cpp())
            .arg("-P")
            .arg_path(&self.paths.lds_in)
            .dir(&self.paths.kernel_dir)
            .error_msg("preprocessing linker script failed")
            .run()?;

        fs::write(&self.paths.lds_out, &output.stdout).with_context(|| {
            format!("writing linker script '{}'", self.paths.lds_out.display())
        })?;
        Ok(())
    }

    fn link(&self) -> Result<()> {
        info!("linking kernel image");
        Cmd::new(self.toolchain.gcc())
            .arg("-nostdlib")
            .arg("-o")
            .arg_path(&self.paths.image)
            .arg(format!("-T{}", self.paths.lds_out.display()))
            .arg_path(&self.paths.stub_out)
            .dir(&self.paths.kernel_dir)
            .error_msg("linking kernel image failed")
            .run()?;
        Ok(())
    }
}
