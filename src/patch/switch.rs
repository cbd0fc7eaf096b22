//! Boolean kernel options in a defconfig file.

use std::path::Path;

use regex::escape;
use serde::Serialize;

use super::{PatchResult, PatchRule};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SwitchAction {
    Enable,
    Disable,
}

/// A `CONFIG_<name>` option to force on or off.
///
/// `name` is given without the `CONFIG_` prefix, e.g. `MAGIC_SYSRQ`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConfigSwitch {
    pub name: String,
    pub action: SwitchAction,
}

impl ConfigSwitch {
    pub fn enable(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            action: SwitchAction::Enable,
        }
    }

    pub fn disable(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            action: SwitchAction::Disable,
        }
    }

    pub fn symbol(&self) -> String {
        format!("CONFIG_{}", self.name)
    }

    /// `# CONFIG_X is not set`
    pub fn disabled_line(&self) -> String {
        format!("# {} is not set", self.symbol())
    }

    /// `CONFIG_X=y`
    pub fn enabled_line(&self) -> String {
        format!("{}=y", self.symbol())
    }

    /// Rule that turns either textual form into the one `action` asks for.
    ///
    /// The locator accepts both forms, so a defconfig that already has the
    /// wanted form resolves to [`super::PatchOutcome::Unchanged`] instead of
    /// an unmatched rule.
    pub fn rule(&self, defconfig: &Path) -> PatchResult<PatchRule> {
        let symbol = escape(&self.symbol());
        let locator = format!(r"(?:# {symbol} is not set|{symbol}=.*)$");
        let replacement = match self.action {
            SwitchAction::Enable => self.enabled_line(),
            SwitchAction::Disable => self.disabled_line(),
        };
        PatchRule::new(defconfig, &locator, replacement)
    }
}
