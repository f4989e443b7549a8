//! GCE Vectrex emulation core.
//!
//! The Vectrex has no frame buffer and no video chip: an MC6809 drives a
//! 6522 VIA, whose ports steer an 8-bit DAC through a multiplexer into
//! analog integrators that move the electron gun directly. This crate wires
//! the VIA, the vector board, the AY-3-8912 sound generator and the memory
//! map into a machine that runs in lock-step at 1.5 MHz, with a lock-free
//! phosphor trail shared with a renderer thread.
//!
//! The 6809 itself is a black box behind [`emu_core::Cpu`]; the core
//! resets it, ticks it, and drives its IRQ input from the VIA.

mod audio;
mod bus;
mod config;
mod frame;
mod joystick;
mod machine;
mod memory;
mod phosphors;
mod runner;
mod video;

pub use audio::AudioOutput;
pub use bus::VectrexBus;
pub use config::{
    ConfigError, VectrexConfig, CARTRIDGE_MAX_SIZE, CLOCK_FREQ, FRAME_RATE, SAMPLE_RATE,
    SYSTEM_ROM_SIZE,
};
pub use frame::FrameLatch;
pub use joystick::Joystick;
pub use machine::{FrameView, Machine};
pub use memory::{ChipSelect, Memory};
pub use phosphors::{phosphor_ring, Phosphor, PhosphorConsumer, PhosphorProducer, PHOSPHOR_CAPACITY};
pub use runner::MachineRunner;
pub use video::{VectorVideo, CYCLES_PER_FRAME, MAX_X, MAX_Y};
