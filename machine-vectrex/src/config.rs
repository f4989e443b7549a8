//! Machine configuration and the single fault surface of the core.

use thiserror::Error;

/// The Vectrex runs at 1.5 MHz (a quarter of the 6 MHz crystal).
pub const CLOCK_FREQ: u32 = 1_500_000;

/// The screen is refreshed at 50 Hz; a frame is 30 000 CPU cycles.
pub const FRAME_RATE: u32 = 50;

/// PSG output rate in Hz.
pub const SAMPLE_RATE: u32 = 22_050;

/// The system ROM (Mine Storm plus the Executive) is exactly 8 KiB.
pub const SYSTEM_ROM_SIZE: usize = 0x2000;

/// Cartridge images occupy the bottom of the address space, up to 32 KiB.
pub const CARTRIDGE_MAX_SIZE: usize = 0x8000;

/// Configuration for creating a Vectrex instance.
pub struct VectrexConfig {
    /// System ROM image. Must be exactly 8,192 bytes.
    pub system_rom: Vec<u8>,
    /// Optional cartridge image, mapped from address 0. At most 32 KiB.
    pub cartridge: Option<Vec<u8>>,
}

/// Initialisation faults. Nothing inside the cycle loop can fail; these are
/// the only errors the core produces.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("system ROM must be {SYSTEM_ROM_SIZE} bytes, got {0}")]
    SystemRomSize(usize),

    #[error("cartridge image is empty")]
    CartridgeEmpty,

    #[error("cartridge image exceeds {CARTRIDGE_MAX_SIZE} bytes, got {0}")]
    CartridgeTooLarge(usize),
}
