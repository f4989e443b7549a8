//! Vectrex bus: memory and chip routing.
//!
//! Implements `emu_core::Bus`. Owns the memory system, the VIA and the
//! controller; the CPU touches everything through the bus, and the other
//! subsystems reach the chips as plain fields.

use emu_core::Bus;
use mos_via_6522::Via6522;

use crate::config::{ConfigError, VectrexConfig};
use crate::joystick::Joystick;
use crate::memory::{ChipSelect, Memory};

/// The Vectrex bus, implementing `emu_core::Bus`.
pub struct VectrexBus {
    pub memory: Memory,
    pub via: Via6522,
    pub joystick: Joystick,
}

impl VectrexBus {
    /// Build the bus from a machine configuration.
    pub fn new(config: &VectrexConfig) -> Result<Self, ConfigError> {
        let mut memory = Memory::new(&config.system_rom)?;
        if let Some(cartridge) = &config.cartridge {
            memory.load_cartridge(cartridge)?;
        }
        Ok(Self {
            memory,
            via: Via6522::new(),
            joystick: Joystick::new(),
        })
    }
}

impl Bus for VectrexBus {
    fn read(&mut self, address: u16) -> u8 {
        match self.memory.select(address) {
            ChipSelect::Unconnected => 0,
            ChipSelect::Cartridge => self.memory.cartridge_read(address),
            ChipSelect::Ram => self.memory.ram_read(address),
            ChipSelect::Via => self.via.read(address as u8),
            // Both chips answer and the open bus wire-ANDs them.
            ChipSelect::RamVia => self.memory.ram_read(address) & self.via.read(address as u8),
            ChipSelect::Rom => self.memory.rom_read(address),
        }
    }

    fn write(&mut self, address: u16, value: u8) {
        match self.memory.select(address) {
            ChipSelect::Unconnected | ChipSelect::Cartridge | ChipSelect::Rom => {}
            ChipSelect::Ram => self.memory.ram_write(address, value),
            ChipSelect::Via => self.via.write(address as u8, value),
            ChipSelect::RamVia => {
                self.memory.ram_write(address, value);
                self.via.write(address as u8, value);
            }
        }
    }
}
