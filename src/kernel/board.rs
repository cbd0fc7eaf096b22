/// Fixed properties of the board the guest kernel is built for.
///
/// The kernel's entry code checks the processor and machine ids it is handed,
/// so a container has to present the values of a board the kernel supports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Board {
    /// Directory under `arch/arm/` holding the machine support code.
    pub mach_dir: &'static str,
    /// Defconfig file under `arch/arm/configs/`.
    pub defconfig: &'static str,
    pub cpu_id: u32,
    pub arch_id: u32,
}

/// ARM Versatile (ARM926EJ-S).
pub const VERSATILE: Board = Board {
    mach_dir: "mach-versatile",
    defconfig: "versatile_defconfig",
    cpu_id: 0x4106_9265,
    arch_id: 0x183,
};
