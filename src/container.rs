//! Container descriptor handed over by the host configuration layer.

use serde::{Deserialize, Serialize};

/// Memory window assigned to one guest container.
///
/// All addresses are physical/virtual byte addresses as computed by the host
/// configuration; they are consumed read-only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct Container {
    pub id: u32,
    pub linux_phys_offset: u64,
    pub linux_page_offset: u64,
    pub linux_zreladdr: u64,
}
