//! Vectrex memory decoding.
//!
//! The address space is described by a 65,536-entry table of chip selects,
//! one per address, built once at construction. Partial decoding shadows the
//! 1 KiB RAM twice across `C800-CFFF` and the VIA 128 times across
//! `D000-D7FF`; in `D800-DFFF` both chips respond at once.
//!
//! | Range       | Select                                  |
//! |-------------|-----------------------------------------|
//! | `0000-7FFF` | cartridge ROM (unconnected when absent) |
//! | `8000-C7FF` | unconnected                             |
//! | `C800-CFFF` | 1K RAM, mirrored                        |
//! | `D000-D7FF` | 6522 VIA, mirrored                      |
//! | `D800-DFFF` | RAM and VIA together                    |
//! | `E000-FFFF` | 8K system ROM                           |

use crate::config::{ConfigError, CARTRIDGE_MAX_SIZE, SYSTEM_ROM_SIZE};

const RAM_SIZE: usize = 0x0400;

/// Which chip (or chips) answer at a given address.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChipSelect {
    /// Nothing drives the bus: reads return 0, writes vanish.
    Unconnected,
    /// Cartridge ROM at the bottom of the address space.
    Cartridge,
    /// The 1 KiB work RAM.
    Ram,
    /// The 6522 VIA register file (low four address bits select).
    Via,
    /// Partially decoded region where RAM and VIA both respond: reads AND
    /// the two chips together, writes reach both.
    RamVia,
    /// The 8 KiB system ROM.
    Rom,
}

/// RAM, ROM and cartridge storage plus the chip-select table. VIA accesses
/// are dispatched by the owner of both (see `VectrexBus`).
pub struct Memory {
    chip_map: Box<[ChipSelect; 0x10000]>,
    ram: [u8; RAM_SIZE],
    rom: [u8; SYSTEM_ROM_SIZE],
    cartridge: Vec<u8>,
}

impl Memory {
    /// Build the memory system around an 8 KiB system ROM image.
    pub fn new(system_rom: &[u8]) -> Result<Self, ConfigError> {
        if system_rom.len() != SYSTEM_ROM_SIZE {
            return Err(ConfigError::SystemRomSize(system_rom.len()));
        }
        let mut rom = [0u8; SYSTEM_ROM_SIZE];
        rom.copy_from_slice(system_rom);

        let mut chip_map = Box::new([ChipSelect::Unconnected; 0x10000]);
        for (addr, select) in chip_map.iter_mut().enumerate() {
            *select = match addr {
                0x0000..=0xC7FF => ChipSelect::Unconnected,
                0xC800..=0xCFFF => ChipSelect::Ram,
                0xD000..=0xD7FF => ChipSelect::Via,
                0xD800..=0xDFFF => ChipSelect::RamVia,
                _ => ChipSelect::Rom,
            };
        }

        // RAM powers up with a characteristic stripe pattern.
        let mut ram = [0u8; RAM_SIZE];
        for (offset, cell) in ram.iter_mut().enumerate() {
            *cell = if offset & 128 != 0 { 0xFF } else { 0x00 };
        }

        Ok(Self {
            chip_map,
            ram,
            rom,
            cartridge: Vec::new(),
        })
    }

    /// Install a cartridge image over `[0, len)`.
    pub fn load_cartridge(&mut self, data: &[u8]) -> Result<(), ConfigError> {
        if data.is_empty() {
            return Err(ConfigError::CartridgeEmpty);
        }
        if data.len() > CARTRIDGE_MAX_SIZE {
            return Err(ConfigError::CartridgeTooLarge(data.len()));
        }
        self.cartridge = data.to_vec();
        for select in &mut self.chip_map[..data.len()] {
            *select = ChipSelect::Cartridge;
        }
        log::info!("cartridge installed: {} bytes", data.len());
        Ok(())
    }

    /// The chip select for an address. Total over the 16-bit space.
    #[must_use]
    pub fn select(&self, address: u16) -> ChipSelect {
        self.chip_map[usize::from(address)]
    }

    #[must_use]
    pub fn ram_read(&self, address: u16) -> u8 {
        self.ram[usize::from(address) % RAM_SIZE]
    }

    pub fn ram_write(&mut self, address: u16, value: u8) {
        self.ram[usize::from(address) % RAM_SIZE] = value;
    }

    #[must_use]
    pub fn rom_read(&self, address: u16) -> u8 {
        self.rom[usize::from(address) % SYSTEM_ROM_SIZE]
    }

    #[must_use]
    pub fn cartridge_read(&self, address: u16) -> u8 {
        self.cartridge[usize::from(address) % self.cartridge.len()]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn memory() -> Memory {
        let mut rom = vec![0u8; SYSTEM_ROM_SIZE];
        for (i, byte) in rom.iter_mut().enumerate() {
            *byte = (i & 0xFF) as u8;
        }
        Memory::new(&rom).unwrap()
    }

    #[test]
    fn rejects_wrong_rom_size() {
        assert!(matches!(
            Memory::new(&[0u8; 0x1000]),
            Err(ConfigError::SystemRomSize(0x1000))
        ));
    }

    #[test]
    fn every_address_has_a_select() {
        let memory = memory();
        for addr in 0..=0xFFFFu16 {
            // The table is total; the match in the bus covers every variant.
            let _ = memory.select(addr);
        }
    }

    #[test]
    fn decode_matches_the_hardware_map() {
        let memory = memory();
        assert_eq!(memory.select(0x0000), ChipSelect::Unconnected);
        assert_eq!(memory.select(0x7FFF), ChipSelect::Unconnected);
        assert_eq!(memory.select(0x8000), ChipSelect::Unconnected);
        assert_eq!(memory.select(0xC7FF), ChipSelect::Unconnected);
        assert_eq!(memory.select(0xC800), ChipSelect::Ram);
        assert_eq!(memory.select(0xCFFF), ChipSelect::Ram);
        assert_eq!(memory.select(0xD000), ChipSelect::Via);
        assert_eq!(memory.select(0xD7FF), ChipSelect::Via);
        assert_eq!(memory.select(0xD800), ChipSelect::RamVia);
        assert_eq!(memory.select(0xDFFF), ChipSelect::RamVia);
        assert_eq!(memory.select(0xE000), ChipSelect::Rom);
        assert_eq!(memory.select(0xFFFF), ChipSelect::Rom);
    }

    #[test]
    fn ram_is_shadowed_across_the_region() {
        let mut memory = memory();
        memory.ram_write(0xC800, 0x42);
        assert_eq!(memory.ram_read(0xCC00), 0x42);
        assert_eq!(memory.ram_read(0xD800), 0x42);
    }

    #[test]
    fn ram_power_on_pattern() {
        let memory = memory();
        assert_eq!(memory.ram_read(0xC800), 0x00);
        assert_eq!(memory.ram_read(0xC800 + 128), 0xFF);
        assert_eq!(memory.ram_read(0xC800 + 255), 0xFF);
        assert_eq!(memory.ram_read(0xC800 + 256), 0x00);
    }

    #[test]
    fn rom_reads_shadow_the_image() {
        let memory = memory();
        for addr in [0xE000u16, 0xE123, 0xFFFF] {
            assert_eq!(
                memory.rom_read(addr),
                ((usize::from(addr) - 0xE000) & 0xFF) as u8
            );
        }
    }

    #[test]
    fn cartridge_install_remaps_low_addresses() {
        let mut memory = memory();
        memory.load_cartridge(&[0xAA, 0xBB, 0xCC]).unwrap();
        assert_eq!(memory.select(0x0000), ChipSelect::Cartridge);
        assert_eq!(memory.select(0x0002), ChipSelect::Cartridge);
        assert_eq!(memory.select(0x0003), ChipSelect::Unconnected);
        assert_eq!(memory.cartridge_read(0x0001), 0xBB);
        // Addresses reduce modulo the image length.
        assert_eq!(memory.cartridge_read(0x0004), 0xBB);
    }

    #[test]
    fn cartridge_size_limits() {
        let mut memory = memory();
        assert!(matches!(
            memory.load_cartridge(&[]),
            Err(ConfigError::CartridgeEmpty)
        ));
        let oversized = vec![0u8; CARTRIDGE_MAX_SIZE + 1];
        assert!(matches!(
            memory.load_cartridge(&oversized),
            Err(ConfigError::CartridgeTooLarge(_))
        ));
        let full = vec![0u8; CARTRIDGE_MAX_SIZE];
        assert!(memory.load_cartridge(&full).is_ok());
        assert_eq!(memory.select(0x7FFF), ChipSelect::Cartridge);
    }
}
