//! Background emulation thread.
//!
//! The machine runs in its own thread, one frame at a time, throttled to
//! 50 Hz wall-clock. The render thread keeps its own pace; the phosphor
//! ring and frame latch carry everything across. Pausing parks the thread
//! on a condition variable; stopping is cooperative and takes effect at
//! the next frame boundary.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use emu_core::Cpu;

use crate::audio::AudioOutput;
use crate::config::{FRAME_RATE, SAMPLE_RATE};
use crate::machine::Machine;

/// Shared thread controls.
struct Control {
    state: Mutex<ControlState>,
    resumed: Condvar,
    frames_last_second: AtomicU32,
}

struct ControlState {
    paused: bool,
    warp_speed: bool,
    exit: bool,
}

/// Handle to the emulation thread.
pub struct MachineRunner {
    control: Arc<Control>,
    handle: Option<JoinHandle<()>>,
}

impl MachineRunner {
    /// Spawn the emulation thread around a machine. The thread starts
    /// paused; call `resume` to begin emulation. The audio device is
    /// acquired inside the thread and released when it exits.
    pub fn spawn<C: Cpu + Send + 'static>(mut machine: Machine<C>) -> Self {
        let control = Arc::new(Control {
            state: Mutex::new(ControlState {
                paused: true,
                warp_speed: false,
                exit: false,
            }),
            resumed: Condvar::new(),
            frames_last_second: AtomicU32::new(0),
        });

        let thread_control = Arc::clone(&control);
        let handle = std::thread::Builder::new()
            .name("vectrex-emulation".into())
            .spawn(move || {
                let samples_per_frame = (SAMPLE_RATE / FRAME_RATE) as usize;
                let mut audio = AudioOutput::new(SAMPLE_RATE, samples_per_frame);
                if audio.is_none() {
                    log::warn!("no audio device available, sound disabled");
                }

                let frame_duration = Duration::from_nanos(1_000_000_000 / u64::from(FRAME_RATE));
                let mut next_frame = Instant::now();
                let mut second_start = Instant::now();
                let mut frames_this_second = 0u32;

                loop {
                    let warp_speed = {
                        let mut state = thread_control.state.lock().unwrap();
                        while state.paused && !state.exit {
                            state = thread_control.resumed.wait(state).unwrap();
                            // Timing is meaningless after an unknown pause.
                            next_frame = Instant::now();
                            second_start = Instant::now();
                            frames_this_second = 0;
                        }
                        if state.exit {
                            break;
                        }
                        state.warp_speed
                    };

                    machine.run_until_frame(warp_speed);

                    // Drain the PSG either way; in silent mode the samples
                    // are simply discarded.
                    let samples = machine.take_audio();
                    if let Some(audio) = audio.as_mut() {
                        audio.push_samples(&samples);
                    }

                    if warp_speed {
                        next_frame = Instant::now();
                    } else {
                        next_frame += frame_duration;
                        let now = Instant::now();
                        if next_frame > now {
                            std::thread::sleep(next_frame - now);
                        }
                    }

                    frames_this_second += 1;
                    if second_start.elapsed() >= Duration::from_secs(1) {
                        thread_control
                            .frames_last_second
                            .store(frames_this_second, Ordering::Relaxed);
                        frames_this_second = 0;
                        second_start = Instant::now();
                    }
                }

                log::info!("emulation thread exiting");
            })
            .expect("failed to spawn emulation thread");

        Self {
            control,
            handle: Some(handle),
        }
    }

    /// Pause the emulation at the next frame boundary.
    pub fn pause(&self) {
        self.control.state.lock().unwrap().paused = true;
    }

    /// Resume a paused emulation.
    pub fn resume(&self) {
        let mut state = self.control.state.lock().unwrap();
        state.paused = false;
        self.control.resumed.notify_all();
    }

    /// Toggle warp speed. At warp the throttle is bypassed and the PSG is
    /// skipped.
    pub fn toggle_warp_speed(&self) {
        let mut state = self.control.state.lock().unwrap();
        state.warp_speed = !state.warp_speed;
    }

    /// True when running at warp speed.
    #[must_use]
    pub fn is_warp_speed(&self) -> bool {
        self.control.state.lock().unwrap().warp_speed
    }

    /// Frames completed during the last wall-clock second.
    #[must_use]
    pub fn frames_last_second(&self) -> u32 {
        self.control.frames_last_second.load(Ordering::Relaxed)
    }

    /// Stop the thread and wait for it to exit. Wakes a paused thread; the
    /// loop leaves at the next frame boundary.
    pub fn stop(&mut self) {
        {
            let mut state = self.control.state.lock().unwrap();
            state.exit = true;
            state.paused = false;
            self.control.resumed.notify_all();
        }
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for MachineRunner {
    fn drop(&mut self) {
        self.stop();
    }
}
