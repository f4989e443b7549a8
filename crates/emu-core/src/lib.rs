//! Core traits and types for cycle-accurate emulation.
//!
//! Everything ticks at the master crystal frequency. All component timing
//! derives from this. No exceptions.

mod bus;
mod clock;
mod cpu;
mod keycode;

pub use bus::Bus;
pub use clock::MasterClock;
pub use cpu::Cpu;
pub use keycode::KeyCode;
