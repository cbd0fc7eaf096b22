//! Patches and cross-builds the Linux guest kernel of a microkernel container.
//!
//! Each container of the hypervisor project runs its own copy of the Linux
//! kernel inside a fixed physical memory window. The kernel sources hard-code
//! that window in a handful of places, so before every build the tree is
//! rewritten for the target container, then configured and compiled out of
//! tree, and finally wrapped together with a boot stub into `linux.elf`.
//!
//! - **Patching** - declarative line rules ([`patch`]) and the per-container
//!   rule set ([`kernel::params`])
//! - **Build** - per-container build layout ([`paths`]) and the toolchain
//!   driver ([`build::KernelBuilder`])
//! - **Host checks** - toolchain discovery before anything is modified
//!   ([`preflight`])
//!
//! # Architecture
//!
//! ```text
//! cont-kernel.toml ──> BuildConfig
//!                          │
//!                          ├── Container ──> KernelParamUpdater ──> PatchRule × N
//!                          │                         │
//!                          │                  source tree rewritten in place
//!                          │
//!                          └── BuildPaths ──> KernelBuilder
//!                                                 ├── make <defconfig> O=<build dir>
//!                                                 ├── make -jN
//!                                                 ├── linux.S.in  -> linux.S
//!                                                 ├── linux.lds.in -> linux.lds (cpp)
//!                                                 └── gcc -> linux.elf + kernel-image.json
//! ```
//!
//! # Example
//!
//! ```rust,ignore
//! use cont_kernel_builder::{BuildConfig, KernelBuilder};
//!
//! let config = BuildConfig::load_default()?;
//! let mut builder = KernelBuilder::new(&config)?;
//! let image = builder.build()?;
//! println!("kernel image at {}", image.display());
//! ```

pub mod build;
pub mod config;
pub mod container;
pub mod error;
pub mod kernel;
pub mod logging;
pub mod patch;
pub mod paths;
pub mod preflight;
pub mod process;

pub use build::KernelBuilder;
pub use config::{BuildConfig, PatchPolicy, ToolchainConfig};
pub use container::Container;
pub use error::{ConfigError, PatchError, ToolError};
pub use kernel::{KernelParamUpdater, PatchReport};
pub use patch::switch::{ConfigSwitch, SwitchAction};
pub use patch::{PatchOutcome, PatchRule};
pub use paths::BuildPaths;
