//! The Vectrex machine: all chips wired together in lock-step.
//!
//! One tick is one 1.5 MHz cycle, and the ordering inside a tick is fixed:
//! the video board samples the VIA pins first, then the CPU runs (seeing
//! the VIA state as it was left the previous cycle), then the VIA advances,
//! then the PSG decodes its bus. This matches the hardware property that a
//! register write becomes visible to the chip on the following cycle.

use std::sync::Arc;

use emu_core::Cpu;
use gi_ay_3_8912::Ay38912;

use crate::bus::VectrexBus;
use crate::config::{ConfigError, VectrexConfig, CLOCK_FREQ, SAMPLE_RATE};
use crate::frame::FrameLatch;
use crate::joystick::Joystick;
use crate::phosphors::{phosphor_ring, PhosphorConsumer, PHOSPHOR_CAPACITY};
use crate::video::VectorVideo;

/// Renderer-side view of the machine: the phosphor trail plus the frame
/// heartbeat. Handed out once, then owned by the render thread.
pub struct FrameView {
    pub phosphors: PhosphorConsumer,
    pub latch: Arc<FrameLatch>,
}

impl FrameView {
    /// Non-blocking check for a newly finished frame.
    pub fn try_frame(&self) -> Option<u64> {
        self.latch.try_consume()
    }
}

/// The composed machine, generic over the 6809 implementation.
pub struct Machine<C: Cpu> {
    cpu: C,
    bus: VectrexBus,
    video: VectorVideo,
    psg: Ay38912,
    frame_latch: Arc<FrameLatch>,
    frame_view: Option<FrameView>,
    frame_count: u64,
    paused: bool,
}

impl<C: Cpu> Machine<C> {
    /// Wire up a machine around the given CPU. Fails only on a malformed
    /// system ROM or cartridge image.
    pub fn new(mut cpu: C, config: &VectrexConfig) -> Result<Self, ConfigError> {
        let bus = VectrexBus::new(config)?;
        let (producer, consumer) = phosphor_ring(PHOSPHOR_CAPACITY);
        let frame_latch = Arc::new(FrameLatch::new());
        let frame_view = FrameView {
            phosphors: consumer,
            latch: Arc::clone(&frame_latch),
        };

        cpu.reset();
        log::info!(
            "vectrex initialised: cartridge {}",
            if config.cartridge.is_some() { "present" } else { "absent" }
        );

        Ok(Self {
            cpu,
            bus,
            video: VectorVideo::new(producer),
            psg: Ay38912::new(CLOCK_FREQ, SAMPLE_RATE),
            frame_latch,
            frame_view: Some(frame_view),
            frame_count: 0,
            paused: false,
        })
    }

    /// Take the renderer-side view. Available exactly once.
    pub fn take_frame_view(&mut self) -> Option<FrameView> {
        self.frame_view.take()
    }

    /// Reset every chip; memory contents survive, as on the real machine.
    pub fn reset(&mut self) {
        self.bus.via.reset();
        self.psg.reset();
        self.video.reset();
        self.cpu.reset();
    }

    /// Run a single machine cycle. Returns true when the video board
    /// reports the 50 Hz frame boundary.
    pub fn emulate_cycle(&mut self, warp_speed: bool) -> bool {
        let frame_done = self
            .video
            .emulate_cycle(&self.bus.via, &mut self.bus.joystick);
        self.bus.via.set_compare(self.bus.joystick.compare());

        self.cpu.signal_irq(self.bus.via.irq_asserted());
        self.cpu.emulate_cycle(&mut self.bus);

        self.bus.via.emulate_cycle();

        if !warp_speed {
            self.psg.set_io_port_a(self.bus.joystick.button_state());
            let port_b = self.bus.via.port_b_pins();
            let port_a = self.bus.via.port_a_pins();
            if let Some(value) = self.psg.emulate_cycle(port_b, port_a) {
                self.bus.via.set_port_a_pins(value);
            }
        }

        if frame_done {
            self.frame_count += 1;
            self.frame_latch.publish(self.frame_count);
        }
        frame_done
    }

    /// Run until the video board completes a frame. Returns the frame
    /// number just finished.
    pub fn run_until_frame(&mut self, warp_speed: bool) -> u64 {
        while !self.emulate_cycle(warp_speed) {}
        self.frame_count
    }

    /// Drain the PSG's finished samples (mono 16-bit, 22,050 Hz).
    pub fn take_audio(&mut self) -> Vec<i16> {
        self.psg.take_samples()
    }

    pub fn joystick(&mut self) -> &mut Joystick {
        &mut self.bus.joystick
    }

    pub fn cpu(&mut self) -> &mut C {
        &mut self.cpu
    }

    pub fn bus(&mut self) -> &mut VectrexBus {
        &mut self.bus
    }

    pub fn set_paused(&mut self, paused: bool) {
        self.paused = paused;
    }

    #[must_use]
    pub fn is_paused(&self) -> bool {
        self.paused
    }

    /// Frames completed since power-on.
    #[must_use]
    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }
}
