//! Vectrex controller: digital directions, analog pots and four buttons.
//!
//! The pots are read through the same multiplexer that routes the vector
//! DAC: the BIOS performs a successive-approximation conversion by writing
//! candidate values to the DAC and sampling the COMPARE output on VIA Port B
//! bit 5. The buttons arrive through the PSG's I/O port, active low.

use emu_core::KeyCode;

/// Analog axis centre position (0 V on the pot).
const CENTRE: u8 = 128;

/// Touch-pad dead zone before a digital direction registers.
const DEAD_ZONE: f32 = 0.3;

/// Vectrex controller state.
pub struct Joystick {
    left: bool,
    right: bool,
    up: bool,
    down: bool,
    /// Pot values for mux channels 0-3: player one X/Y, player two X/Y.
    /// 0-255 with 128 at centre.
    axes: [u8; 4],
    /// Button nibble, active low (bit clear = pressed), buttons 1-4 in
    /// bits 0-3.
    buttons: u8,
    /// Comparator output: selected pot above the current DAC level.
    compare: bool,
}

impl Joystick {
    #[must_use]
    pub fn new() -> Self {
        Self {
            left: false,
            right: false,
            up: false,
            down: false,
            axes: [CENTRE; 4],
            buttons: 0x0F,
            compare: false,
        }
    }

    /// Update the COMPARE output for the currently selected mux channel and
    /// DAC level. Both sides are biased bytes; the comparison happens in
    /// signed volt space.
    pub fn process_mux(&mut self, channel: u8, dac: u8) {
        let pot = i16::from(self.axes[usize::from(channel & 0x03)]) - i16::from(CENTRE);
        self.compare = pot > i16::from(dac as i8);
    }

    /// Current comparator level, mirrored onto VIA Port B bit 5.
    #[must_use]
    pub fn compare(&self) -> bool {
        self.compare
    }

    /// Button nibble as seen by the PSG I/O port: active low in bits 0-3,
    /// upper bits pulled high.
    #[must_use]
    pub fn button_state(&self) -> u8 {
        0xF0 | self.buttons
    }

    /// Handle a key press.
    pub fn key_down(&mut self, key: KeyCode) {
        match key {
            KeyCode::ArrowLeft => {
                self.left = true;
                self.axes[0] = 0;
            }
            KeyCode::ArrowRight => {
                self.right = true;
                self.axes[0] = 255;
            }
            KeyCode::ArrowUp => {
                self.up = true;
                self.axes[1] = 255;
            }
            KeyCode::ArrowDown => {
                self.down = true;
                self.axes[1] = 0;
            }
            KeyCode::KeyA => self.buttons &= !0x01,
            KeyCode::KeyS => self.buttons &= !0x02,
            KeyCode::KeyD => self.buttons &= !0x04,
            KeyCode::KeyF | KeyCode::Space => self.buttons &= !0x08,
            _ => {}
        }
    }

    /// Handle a key release. Axes recentre unless the opposite direction is
    /// still held.
    pub fn key_up(&mut self, key: KeyCode) {
        match key {
            KeyCode::ArrowLeft => {
                self.left = false;
                self.axes[0] = if self.right { 255 } else { CENTRE };
            }
            KeyCode::ArrowRight => {
                self.right = false;
                self.axes[0] = if self.left { 0 } else { CENTRE };
            }
            KeyCode::ArrowUp => {
                self.up = false;
                self.axes[1] = if self.down { 0 } else { CENTRE };
            }
            KeyCode::ArrowDown => {
                self.down = false;
                self.axes[1] = if self.up { 255 } else { CENTRE };
            }
            KeyCode::KeyA => self.buttons |= 0x01,
            KeyCode::KeyS => self.buttons |= 0x02,
            KeyCode::KeyD => self.buttons |= 0x04,
            KeyCode::KeyF | KeyCode::Space => self.buttons |= 0x08,
            _ => {}
        }
    }

    /// Feed an analog touch pad position, both coordinates in -1..1.
    /// Directions register outside the dead zone; the pots track the pad
    /// proportionally.
    pub fn touch_pad(&mut self, x: f32, y: f32) {
        self.right = x > DEAD_ZONE;
        self.left = x < -DEAD_ZONE;
        self.up = y > DEAD_ZONE;
        self.down = y < -DEAD_ZONE;
        self.axes[0] = pad_to_pot(x);
        self.axes[1] = pad_to_pot(y);
    }

    /// Digital direction state as (left, right, up, down).
    #[must_use]
    pub fn directions(&self) -> (bool, bool, bool, bool) {
        (self.left, self.right, self.up, self.down)
    }
}

impl Default for Joystick {
    fn default() -> Self {
        Self::new()
    }
}

fn pad_to_pot(value: f32) -> u8 {
    let scaled = (f32::from(CENTRE) + value * 127.0).clamp(0.0, 255.0);
    scaled as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn centred_pot_compares_against_dac_sign() {
        let mut joystick = Joystick::new();
        // DAC below centre: pot (0) > dac (-32).
        joystick.process_mux(0, 0xE0); // 0xE0 as i8 = -32
        assert!(joystick.compare());
        // DAC above centre: pot (0) < dac (+32).
        joystick.process_mux(0, 0x20);
        assert!(!joystick.compare());
    }

    #[test]
    fn direction_keys_drive_axis_rails() {
        let mut joystick = Joystick::new();
        joystick.key_down(KeyCode::ArrowRight);
        joystick.process_mux(0, 0x7E); // +126
        assert!(joystick.compare());

        joystick.key_up(KeyCode::ArrowRight);
        joystick.process_mux(0, 0x7E);
        assert!(!joystick.compare());
    }

    #[test]
    fn opposite_direction_survives_release() {
        let mut joystick = Joystick::new();
        joystick.key_down(KeyCode::ArrowLeft);
        joystick.key_down(KeyCode::ArrowRight);
        joystick.key_up(KeyCode::ArrowLeft);
        let (left, right, _, _) = joystick.directions();
        assert!(!left);
        assert!(right);
        joystick.process_mux(0, 0x7E);
        assert!(joystick.compare());
    }

    #[test]
    fn second_player_pots_stay_centred() {
        let mut joystick = Joystick::new();
        joystick.key_down(KeyCode::ArrowRight);
        joystick.process_mux(2, 0x01); // +1: centre pot reads below
        assert!(!joystick.compare());
        joystick.process_mux(2, 0xFF); // -1: centre pot reads above
        assert!(joystick.compare());
    }

    #[test]
    fn buttons_are_active_low() {
        let mut joystick = Joystick::new();
        assert_eq!(joystick.button_state(), 0xFF);
        joystick.key_down(KeyCode::KeyA);
        joystick.key_down(KeyCode::KeyD);
        assert_eq!(joystick.button_state(), 0xFA);
        joystick.key_up(KeyCode::KeyA);
        assert_eq!(joystick.button_state(), 0xFB);
    }

    #[test]
    fn touch_pad_dead_zone() {
        let mut joystick = Joystick::new();
        joystick.touch_pad(0.2, -0.2);
        let (left, right, up, down) = joystick.directions();
        assert!(!left && !right && !up && !down);

        joystick.touch_pad(0.8, -0.9);
        let (left, right, up, down) = joystick.directions();
        assert!(right && down);
        assert!(!left && !up);
    }

    #[test]
    fn touch_pad_drives_pots_proportionally() {
        let mut joystick = Joystick::new();
        joystick.touch_pad(1.0, 0.0);
        joystick.process_mux(0, 0x7E); // +126
        assert!(joystick.compare());
        joystick.process_mux(1, 0x01); // +1 against centred Y
        assert!(!joystick.compare());
    }
}
