//! Line-oriented patching of kernel source and config files.
//!
//! A [`PatchRule`] names one line in one file: the first line whose text
//! matches a locator pattern (optionally only when the line before it equals
//! an anchor) is rewritten to a literal replacement. Rules are plain values,
//! so a new kernel revision only needs new rule data.
//!
//! # Example
//!
//! ```rust,ignore
//! use cont_kernel_builder::patch::{PatchOutcome, PatchRule};
//!
//! let rule = PatchRule::new(
//!     "linux/arch/arm/Kconfig",
//!     r"\tdefault ",
//!     "\tdefault 0xC0000000",
//! )?
//! .with_anchor("\tdefault 0x80000000 if VMSPLIT_2G");
//!
//! match rule.apply()? {
//!     PatchOutcome::Applied => println!("rewritten"),
//!     PatchOutcome::Unchanged => println!("already up to date"),
//!     PatchOutcome::NotFound => println!("no such line"),
//! }
//! ```

pub mod switch;

use std::fmt;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use regex::Regex;
use serde::Serialize;
use tracing::{debug, warn};

use crate::error::PatchError;

/// Result type for patching operations.
pub type PatchResult<T> = std::result::Result<T, PatchError>;

/// What applying a rule did to its target file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PatchOutcome {
    /// The matched line was rewritten.
    Applied,
    /// The matched line already had the replacement text; nothing was written.
    Unchanged,
    /// No line satisfied the rule; the file was left as is.
    NotFound,
}

impl fmt::Display for PatchOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            PatchOutcome::Applied => "applied",
            PatchOutcome::Unchanged => "unchanged",
            PatchOutcome::NotFound => "not found",
        };
        f.write_str(label)
    }
}

/// A single line rewrite.
///
/// The locator is matched at the start of each line. The line terminator
/// (`\n` or `\r\n`) is never part of the text compared and is kept as is on
/// the rewritten line. Anchor and replacement are literal line
/// text without a terminator.
#[derive(Debug, Clone)]
pub struct PatchRule {
    file_path: PathBuf,
    pattern: String,
    locator: Regex,
    anchor_line: Option<String>,
    replacement_line: String,
}

impl PatchRule {
    /// Build a rule. Fails only if `locator_pattern` is not a valid regex.
    pub fn new(
        file_path: impl Into<PathBuf>,
        locator_pattern: &str,
        replacement_line: impl Into<String>,
    ) -> PatchResult<Self> {
        let locator = Regex::new(&format!("^(?:{})", locator_pattern)).map_err(|source| {
            PatchError::InvalidPattern {
                pattern: locator_pattern.to_string(),
                source,
            }
        })?;

        Ok(Self {
            file_path: file_path.into(),
            pattern: locator_pattern.to_string(),
            locator,
            anchor_line: None,
            replacement_line: replacement_line.into(),
        })
    }

    /// Require the line immediately before the match to equal `anchor_line`.
    ///
    /// An empty anchor means "match anywhere", same as no anchor.
    pub fn with_anchor(mut self, anchor_line: impl Into<String>) -> Self {
        let anchor_line = anchor_line.into();
        self.anchor_line = if anchor_line.is_empty() {
            None
        } else {
            Some(anchor_line)
        };
        self
    }

    pub fn file_path(&self) -> &Path {
        &self.file_path
    }

    pub fn locator_pattern(&self) -> &str {
        &self.pattern
    }

    pub fn anchor_line(&self) -> Option<&str> {
        self.anchor_line.as_deref()
    }

    pub fn replacement_line(&self) -> &str {
        &self.replacement_line
    }

    /// Index of the line this rule targets in `content`, if any.
    pub fn find_in(&self, content: &str) -> Option<usize> {
        let mut previous: Option<&str> = None;

        for (index, line) in content.split_inclusive('\n').enumerate() {
            let text = strip_terminator(line);
            let anchored = match &self.anchor_line {
                Some(anchor) => previous == Some(anchor.as_str()),
                None => true,
            };
            if anchored && self.locator.is_match(text) {
                return Some(index);
            }
            previous = Some(text);
        }

        None
    }

    /// Apply the rule to `content` in memory.
    ///
    /// Returns the outcome and, for [`PatchOutcome::Applied`], the new content.
    pub fn apply_to(&self, content: &str) -> (PatchOutcome, Option<String>) {
        let Some(target) = self.find_in(content) else {
            return (PatchOutcome::NotFound, None);
        };

        let mut patched = String::with_capacity(content.len() + self.replacement_line.len());
        for (index, line) in content.split_inclusive('\n').enumerate() {
            if index != target {
                patched.push_str(line);
                continue;
            }
            if strip_terminator(line) == self.replacement_line {
                return (PatchOutcome::Unchanged, None);
            }
            patched.push_str(&self.replacement_line);
            patched.push_str(&line[strip_terminator(line).len()..]);
        }

        (PatchOutcome::Applied, Some(patched))
    }

    /// Apply the rule to its file.
    ///
    /// An unmatched rule is logged as a warning and reported as
    /// [`PatchOutcome::NotFound`]; only I/O failures are errors. The file is
    /// written only when its content actually changes, so unchanged sources
    /// keep their timestamps and do not trigger a rebuild.
    pub fn apply(&self) -> PatchResult<PatchOutcome> {
        let content = fs::read_to_string(&self.file_path).map_err(|source| PatchError::Io {
            path: self.file_path.clone(),
            source,
        })?;

        let (outcome, patched) = self.apply_to(&content);
        if let Some(patched) = patched {
            rewrite(&self.file_path, &patched)?;
            debug!(
                file = %self.file_path.display(),
                line = %self.replacement_line,
                "patched"
            );
        } else if outcome == PatchOutcome::NotFound {
            warn!(
                file = %self.file_path.display(),
                pattern = %self.pattern,
                "no match found for kernel parameter"
            );
        } else {
            debug!(file = %self.file_path.display(), "already patched");
        }

        Ok(outcome)
    }
}

/// Line text without its `\n` or `\r\n` terminator.
fn strip_terminator(line: &str) -> &str {
    line.strip_suffix("\r\n")
        .or_else(|| line.strip_suffix('\n'))
        .unwrap_or(line)
}

/// Truncate and rewrite `path` in full.
///
/// The replacement may be shorter than the original line, so the old tail
/// must not survive.
fn rewrite(path: &Path, content: &str) -> PatchResult<()> {
    let io_err = |source| PatchError::Io {
        path: path.to_path_buf(),
        source,
    };

    let mut file = OpenOptions::new()
        .write(true)
        .truncate(true)
        .open(path)
        .map_err(io_err)?;
    file.write_all(content.as_bytes()).map_err(io_err)?;
    file.flush().map_err(io_err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write_file(dir: &TempDir, name: &str, content: &str) -> PathBuf {
        let path = dir.path().join(name);
        fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn test_apply_rewrites_first_match() {
        let temp = TempDir::new().unwrap();
        let path = write_file(
            &temp,
            "memory.h",
            "#ifndef __MEMORY_H\n#define PHYS_OFFSET\tUL(0x00000000)\n#define PHYS_OFFSET\tUL(0x1)\n#endif\n",
        );

        let rule = PatchRule::new(
            &path,
            "#define PHYS_OFFSET",
            "#define PHYS_OFFSET     UL(0x80000000)",
        )
        .unwrap();

        assert_eq!(rule.apply().unwrap(), PatchOutcome::Applied);
        assert_eq!(
            fs::read_to_string(&path).unwrap(),
            "#ifndef __MEMORY_H\n#define PHYS_OFFSET     UL(0x80000000)\n#define PHYS_OFFSET\tUL(0x1)\n#endif\n"
        );
    }

    #[test]
    fn test_apply_is_idempotent() {
        let temp = TempDir::new().unwrap();
        let path = write_file(&temp, "head.S", "__INIT\natags:  .word   0x00000100\n\tb 1f\n");
        let rule = PatchRule::new(&path, "atags:", "atags:  .word   0x80000100").unwrap();

        assert_eq!(rule.apply().unwrap(), PatchOutcome::Applied);
        let after_first = fs::read_to_string(&path).unwrap();
        let mtime_first = fs::metadata(&path).unwrap().modified().unwrap();

        assert_eq!(rule.apply().unwrap(), PatchOutcome::Unchanged);
        assert_eq!(fs::read_to_string(&path).unwrap(), after_first);
        assert_eq!(fs::metadata(&path).unwrap().modified().unwrap(), mtime_first);
    }

    #[test]
    fn test_anchor_disambiguates_matches() {
        let temp = TempDir::new().unwrap();
        let kconfig = "config PAGE_OFFSET\n\
                       \thex\n\
                       \tdefault 0x40000000 if VMSPLIT_1G\n\
                       \tdefault 0x80000000 if VMSPLIT_2G\n\
                       \tdefault 0xC0000000\n";
        let path = write_file(&temp, "Kconfig", kconfig);

        let rule = PatchRule::new(&path, r"\tdefault ", "\tdefault 0xB0000000")
            .unwrap()
            .with_anchor("\tdefault 0x80000000 if VMSPLIT_2G");

        assert_eq!(rule.apply().unwrap(), PatchOutcome::Applied);
        let patched = fs::read_to_string(&path).unwrap();
        assert!(patched.contains("\tdefault 0x40000000 if VMSPLIT_1G\n"));
        assert!(patched.contains("\tdefault 0x80000000 if VMSPLIT_2G\n"));
        assert!(patched.ends_with("\tdefault 0xB0000000\n"));
    }

    #[test]
    fn test_anchor_targets_position_not_first_identical_text() {
        let content = "\tdefault 0xC0000000\n\
                       \tdefault 0x80000000 if VMSPLIT_2G\n\
                       \tdefault 0xC0000000\n";
        let rule = PatchRule::new("Kconfig", r"\tdefault ", "\tdefault 0xB0000000")
            .unwrap()
            .with_anchor("\tdefault 0x80000000 if VMSPLIT_2G");

        let (outcome, patched) = rule.apply_to(content);
        assert_eq!(outcome, PatchOutcome::Applied);
        assert_eq!(
            patched.unwrap(),
            "\tdefault 0xC0000000\n\tdefault 0x80000000 if VMSPLIT_2G\n\tdefault 0xB0000000\n"
        );
    }

    #[test]
    fn test_no_match_leaves_file_untouched() {
        let temp = TempDir::new().unwrap();
        let original = "zreladdr-y := 0x00008000\nparams_phys-y := 0x00000100\n";
        let path = write_file(&temp, "Makefile.boot", original);

        let rule = PatchRule::new(&path, r"\s{3}zreladdr-y\t:= ", "   zreladdr-y\t:= 0x80008000")
            .unwrap();

        assert_eq!(rule.apply().unwrap(), PatchOutcome::NotFound);
        assert_eq!(fs::read(&path).unwrap(), original.as_bytes());
    }

    #[test]
    fn test_locator_matches_at_line_start_only() {
        let rule = PatchRule::new("head.S", "cpuid:", "cpuid:  .word   0x41069265").unwrap();
        let (outcome, _) = rule.apply_to("\tldr r1, cpuid:\n");
        assert_eq!(outcome, PatchOutcome::NotFound);
    }

    #[test]
    fn test_last_line_without_newline() {
        let rule = PatchRule::new("defconfig", "# CONFIG_MAGIC_SYSRQ", "CONFIG_MAGIC_SYSRQ=y").unwrap();
        let (outcome, patched) = rule.apply_to("CONFIG_EXPERIMENTAL=y\n# CONFIG_MAGIC_SYSRQ is not set");
        assert_eq!(outcome, PatchOutcome::Applied);
        assert_eq!(patched.unwrap(), "CONFIG_EXPERIMENTAL=y\nCONFIG_MAGIC_SYSRQ=y");
    }

    #[test]
    fn test_crlf_lines_keep_their_terminator() {
        let content = "config PAGE_OFFSET\r\n\
                       \tdefault 0x80000000 if VMSPLIT_2G\r\n\
                       \tdefault 0xC0000000\r\n\
                       # CONFIG_MAGIC_SYSRQ is not set\r\n";

        let anchored = PatchRule::new("Kconfig", r"\tdefault ", "\tdefault 0xB0000000")
            .unwrap()
            .with_anchor("\tdefault 0x80000000 if VMSPLIT_2G");
        let (outcome, patched) = anchored.apply_to(content);
        assert_eq!(outcome, PatchOutcome::Applied);
        let patched = patched.unwrap();
        assert!(patched.contains("\r\n\tdefault 0xB0000000\r\n#"));

        let switch = PatchRule::new(
            "defconfig",
            r"(?:# CONFIG_MAGIC_SYSRQ is not set|CONFIG_MAGIC_SYSRQ=.*)$",
            "CONFIG_MAGIC_SYSRQ=y",
        )
        .unwrap();
        let (outcome, patched) = switch.apply_to(&patched);
        assert_eq!(outcome, PatchOutcome::Applied);
        let patched = patched.unwrap();
        assert!(patched.ends_with("\r\nCONFIG_MAGIC_SYSRQ=y\r\n"));
        assert_eq!(switch.apply_to(&patched).0, PatchOutcome::Unchanged);
    }

    #[test]
    fn test_shorter_replacement_truncates_file() {
        let temp = TempDir::new().unwrap();
        let path = write_file(
            &temp,
            "Makefile",
            "ZTEXTADDR\t:= 0x0000000000000000000000\nZBSSADDR\t:= ALIGN(8)\n",
        );
        let rule = PatchRule::new(&path, "ZTEXTADDR\t:= 0", "ZTEXTADDR\t:= 0x80000000").unwrap();

        assert_eq!(rule.apply().unwrap(), PatchOutcome::Applied);
        assert_eq!(
            fs::read_to_string(&path).unwrap(),
            "ZTEXTADDR\t:= 0x80000000\nZBSSADDR\t:= ALIGN(8)\n"
        );
    }

    #[test]
    fn test_empty_anchor_matches_anywhere() {
        let rule = PatchRule::new("f", "b", "B").unwrap().with_anchor("");
        assert!(rule.anchor_line().is_none());
        assert_eq!(rule.find_in("a\nb\n"), Some(1));
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let temp = TempDir::new().unwrap();
        let rule = PatchRule::new(temp.path().join("absent"), "x", "y").unwrap();
        assert!(matches!(rule.apply(), Err(PatchError::Io { .. })));
    }

    #[test]
    fn test_invalid_pattern() {
        let err = PatchRule::new("f", "(unclosed", "x").unwrap_err();
        assert!(matches!(err, PatchError::InvalidPattern { .. }));
    }
}
