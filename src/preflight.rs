//! Preflight checks for the cross toolchain.
//!
//! Validates that every program the build invokes can be found before any
//! kernel source file is patched. This prevents a half-patched tree followed
//! by a cryptic spawn error.
//!
//! # Example
//!
//! ```rust,ignore
//! use cont_kernel_builder::preflight::{command_exists, check_required_tools};
//!
//! if !command_exists("arm-none-linux-gnueabi-gcc") {
//!     println!("cross compiler not installed");
//! }
//!
//! let tools = [("make", "make"), ("arm-none-linux-gnueabi-gcc", "ARM cross toolchain")];
//! check_required_tools(&tools)?;
//! ```

use anyhow::{bail, Result};

use crate::config::ToolchainConfig;

/// Check if a command exists on the host system.
///
/// Accepts either a bare name (searched in `PATH`) or a path to an
/// executable.
pub fn command_exists(cmd: &str) -> bool {
    which::which(cmd).is_ok()
}

/// Check that specific tools are available.
///
/// # Arguments
///
/// * `tools` - Slice of (command, package) tuples
///
/// # Returns
///
/// * `Ok(())` if all tools are found
/// * `Err` with list of missing tools and their packages
pub fn check_required_tools<S: AsRef<str>>(tools: &[(S, S)]) -> Result<()> {
    let mut missing = Vec::new();

    for (tool, package) in tools {
        if !command_exists(tool.as_ref()) {
            missing.push((tool.as_ref(), package.as_ref()));
        }
    }

    if !missing.is_empty() {
        let msg = missing
            .iter()
            .map(|(t, p)| format!("  {} (install: {})", t, p))
            .collect::<Vec<_>>()
            .join("\n");
        bail!("Missing required host tools:\n{}", msg);
    }

    Ok(())
}

/// Programs the kernel build runs, with where to get them.
pub fn toolchain_tools(toolchain: &ToolchainConfig) -> Vec<(String, String)> {
    let cross = format!("cross toolchain ({}*)", toolchain.cross_compile);
    vec![
        (toolchain.make.clone(), "make".to_string()),
        (toolchain.cpp(), cross.clone()),
        (toolchain.gcc(), cross),
    ]
}

/// Check that the configured toolchain is complete.
pub fn check_toolchain(toolchain: &ToolchainConfig) -> Result<()> {
    check_required_tools(&toolchain_tools(toolchain))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_exists() {
        // 'sh' should exist on any Unix system
        assert!(command_exists("sh"));
        assert!(command_exists("/bin/sh"));
        assert!(!command_exists("definitely_not_a_real_command_12345"));
    }

    #[test]
    fn test_check_required_tools_success() {
        let tools = [("sh", "coreutils"), ("cat", "coreutils")];
        assert!(check_required_tools(&tools).is_ok());
    }

    #[test]
    fn test_check_required_tools_failure_lists_packages() {
        let tools = [("nonexistent_command_xyz", "fake-package")];
        let err = check_required_tools(&tools).unwrap_err();
        assert!(err
            .to_string()
            .contains("nonexistent_command_xyz (install: fake-package)"));
    }

    #[test]
    fn test_toolchain_tools_use_cross_prefix() {
        let toolchain = ToolchainConfig {
            cross_compile: "arm-linux-".to_string(),
            ..ToolchainConfig::default()
        };
        let names: Vec<String> = toolchain_tools(&toolchain)
            .into_iter()
            .map(|(tool, _)| tool)
            .collect();
        assert_eq!(names, ["make", "arm-linux-cpp", "arm-linux-gcc"]);
    }
}
