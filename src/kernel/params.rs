//! Translate a [`Container`] into the patch rules for its memory window.
//!
//! Every replacement line here is matched byte-for-byte by the guest kernel's
//! build, so field separators (tabs vs. spaces) and macro wrapping follow
//! what each file already uses.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Serialize;
use tracing::info;

use crate::container::Container;
use crate::error::{ConfigError, PatchError};
use crate::kernel::board::Board;
use crate::patch::switch::ConfigSwitch;
use crate::patch::{PatchOutcome, PatchResult, PatchRule};

/// Boot tags are placed this far above the container's physical base.
pub const ATAGS_OFFSET: u64 = 0x100;

const COMPRESSED_MAKEFILE: &str = "arch/arm/boot/compressed/Makefile";
const ARCH_KCONFIG: &str = "arch/arm/Kconfig";
const HEAD_S: &str = "arch/arm/kernel/head.S";
const VMSPLIT_2G_DEFAULT: &str = "\tdefault 0x80000000 if VMSPLIT_2G";

/// Format an address the way the kernel sources spell it: `0x` + uppercase hex.
pub fn format_hex(value: u64) -> String {
    format!("0x{:X}", value)
}

/// Options forced on in every container kernel.
pub fn default_switches() -> Vec<ConfigSwitch> {
    vec![
        ConfigSwitch::enable("MAGIC_SYSRQ"),
        ConfigSwitch::enable("DEBUG_KERNEL"),
    ]
}

/// One applied rule, as reported after [`KernelParamUpdater::apply_all`].
#[derive(Debug, Clone, Serialize)]
pub struct PatchRecord {
    pub file: PathBuf,
    pub line: String,
    pub outcome: PatchOutcome,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct PatchReport {
    pub records: Vec<PatchRecord>,
}

impl PatchReport {
    pub fn count(&self, outcome: PatchOutcome) -> usize {
        self.records.iter().filter(|r| r.outcome == outcome).count()
    }

    pub fn is_complete(&self) -> bool {
        self.count(PatchOutcome::NotFound) == 0
    }
}

/// The fixed patch set for one container.
///
/// Building the updater only computes rules; nothing is written until
/// [`apply_all`](Self::apply_all) is called.
#[derive(Debug, Clone)]
pub struct KernelParamUpdater {
    kernel_dir: PathBuf,
    rules: Vec<PatchRule>,
}

impl KernelParamUpdater {
    pub fn new(
        kernel_dir: &Path,
        container: &Container,
        board: &Board,
        switches: &[ConfigSwitch],
    ) -> Result<Self> {
        let rules = build_rules(kernel_dir, container, board, switches)
            .with_context(|| format!("building kernel patch rules for container {}", container.id))?;

        Ok(Self {
            kernel_dir: kernel_dir.to_path_buf(),
            rules,
        })
    }

    pub fn rules(&self) -> &[PatchRule] {
        &self.rules
    }

    /// Apply every rule in order.
    ///
    /// An unmatched rule is a warning and the run continues, unless `strict`
    /// is set, in which case it aborts with [`PatchError::PatternNotFound`].
    pub fn apply_all(&self, strict: bool) -> PatchResult<PatchReport> {
        let mut report = PatchReport::default();

        for rule in &self.rules {
            let outcome = rule.apply()?;
            if strict && outcome == PatchOutcome::NotFound {
                return Err(PatchError::PatternNotFound {
                    path: rule.file_path().to_path_buf(),
                    pattern: rule.locator_pattern().to_string(),
                });
            }

            let file = rule
                .file_path()
                .strip_prefix(&self.kernel_dir)
                .unwrap_or(rule.file_path())
                .to_path_buf();
            report.records.push(PatchRecord {
                file,
                line: rule.replacement_line().to_string(),
                outcome,
            });
        }

        info!(
            applied = report.count(PatchOutcome::Applied),
            unchanged = report.count(PatchOutcome::Unchanged),
            not_found = report.count(PatchOutcome::NotFound),
            "kernel parameters updated"
        );

        Ok(report)
    }
}

fn build_rules(
    kernel_dir: &Path,
    container: &Container,
    board: &Board,
    switches: &[ConfigSwitch],
) -> Result<Vec<PatchRule>> {
    let phys = format_hex(container.linux_phys_offset);
    let atags = container
        .linux_phys_offset
        .checked_add(ATAGS_OFFSET)
        .ok_or(ConfigError::Overflow {
            field: "linux_phys_offset",
            value: container.linux_phys_offset,
            offset: ATAGS_OFFSET,
        })?;

    let mach = format!("arch/arm/{}", board.mach_dir);
    let head_s = kernel_dir.join(HEAD_S);

    let mut rules = vec![
        PatchRule::new(
            kernel_dir.join(COMPRESSED_MAKEFILE),
            "ZTEXTADDR\t:= 0",
            format!("ZTEXTADDR\t:= {}", phys),
        )?,
        PatchRule::new(
            kernel_dir.join(&mach).join("include/mach/memory.h"),
            "#define PHYS_OFFSET",
            format!("#define PHYS_OFFSET     UL({})", phys),
        )?,
        PatchRule::new(
            kernel_dir.join(ARCH_KCONFIG),
            r"\tdefault ",
            format!("\tdefault {}", format_hex(container.linux_page_offset)),
        )?
        .with_anchor(VMSPLIT_2G_DEFAULT),
        PatchRule::new(
            kernel_dir.join(&mach).join("Makefile.boot"),
            r"\s{3}zreladdr-y\t:= ",
            format!("   zreladdr-y\t:= {}", format_hex(container.linux_zreladdr)),
        )?,
        PatchRule::new(
            &head_s,
            "cpuid:",
            format!("cpuid:  .word   {}", format_hex(board.cpu_id.into())),
        )?,
        PatchRule::new(
            &head_s,
            "archid:",
            format!("archid: .word   {}", format_hex(board.arch_id.into())),
        )?,
        PatchRule::new(
            &head_s,
            "atags:",
            format!("atags:  .word   {}", format_hex(atags)),
        )?,
    ];

    let defconfig = kernel_dir.join("arch/arm/configs").join(board.defconfig);
    for switch in switches {
        rules.push(switch.rule(&defconfig)?);
    }

    Ok(rules)
}
