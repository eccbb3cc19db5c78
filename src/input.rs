//! Decoders for raw keyboard, joypad and mouse samples.
//!
//! Each state is fed one raw sample per frame and keeps whatever history the
//! edge detection needs. Nothing here touches hardware.

use bitflags::bitflags;
use bitvec::prelude::*;

pub const KEY_COUNT: usize = 128;
/// Ticks after a click during which a second click counts as a double click.
pub const DOUBLE_CLICK_TICKS: u16 = 15;

const KEY_RELEASED: u8 = 0x80;
const KEY_MASK: u8 = 0x7F;

type KeyBits = BitArr!(for KEY_COUNT, in u32);

/// Scancode state with per-key "processed" latches.
pub struct KeyboardState {
    current_key: u8,
    previous_key: u8,
    keys: KeyBits,
    down: KeyBits,
    processed: KeyBits,
}

impl KeyboardState {
    pub fn new() -> Self {
        Self {
            current_key: 0,
            previous_key: 0,
            keys: BitArray::ZERO,
            down: BitArray::ZERO,
            processed: BitArray::ZERO,
        }
    }

    /// Apply one scancode. Bit 7 set means the key was released.
    pub fn feed(&mut self, raw: Option<u8>) {
        let Some(code) = raw else {
            return;
        };
        let key = (code & KEY_MASK) as usize;
        if code & KEY_RELEASED != 0 {
            self.keys.set(key, false);
            self.down.set(key, false);
            self.processed.set(key, false);
        } else {
            self.keys.set(key, true);
            self.down.set(key, true);
            self.previous_key = self.current_key;
            self.current_key = code;
        }
    }

    pub fn current_key(&self) -> u8 {
        self.current_key
    }

    pub fn previous_key(&self) -> u8 {
        self.previous_key
    }

    /// Key is held.
    pub fn is_down(&self, key: u8) -> bool {
        let key = (key & KEY_MASK) as usize;
        self.keys[key] && self.down[key]
    }

    /// Key is held and has not been handled since it went down.
    pub fn pressed(&self, key: u8) -> bool {
        let key = (key & KEY_MASK) as usize;
        self.keys[key] && !self.processed[key]
    }

    /// Latch the key as handled until it is released.
    pub fn mark_processed(&mut self, key: u8) {
        self.processed.set((key & KEY_MASK) as usize, true);
    }

    pub fn keys_down(&self) -> usize {
        self.down.count_ones()
    }
}

impl Default for KeyboardState {
    fn default() -> Self {
        Self::new()
    }
}

bitflags! {
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub struct JoypadButtons: u16 {
        const RIGHT     = 0x8000;
        const LEFT      = 0x4000;
        const DOWN      = 0x2000;
        const UP        = 0x1000;
        const START     = 0x0400;
        const BACK      = 0x0200;
        const TR        = 0x0100;
        const TL        = 0x0080;
        const BR        = 0x0040;
        const BL        = 0x0020;
        const Y         = 0x0010;
        const X         = 0x0008;
        const B         = 0x0004;
        const A         = 0x0002;
        const CONNECTED = 0x0001;
    }
}

pub struct JoypadState {
    buttons: JoypadButtons,
    actioned: JoypadButtons,
    pub dx: i8,
    pub dy: i8,
}

impl JoypadState {
    pub fn new() -> Self {
        Self {
            buttons: JoypadButtons::empty(),
            actioned: JoypadButtons::empty(),
            dx: 0,
            dy: 0,
        }
    }

    /// Decode the 16-bit pad word. Right wins over left and down over up.
    pub fn decode(&mut self, raw: u16) {
        self.buttons = JoypadButtons::from_bits_truncate(raw);
        self.dx = if self.buttons.contains(JoypadButtons::RIGHT) {
            1
        } else if self.buttons.contains(JoypadButtons::LEFT) {
            -1
        } else {
            0
        };
        self.dy = if self.buttons.contains(JoypadButtons::DOWN) {
            1
        } else if self.buttons.contains(JoypadButtons::UP) {
            -1
        } else {
            0
        };
    }

    pub fn held(&self, button: JoypadButtons) -> bool {
        self.buttons.contains(button)
    }

    /// True once per press of `button`. The latch rearms when it is released.
    pub fn take_press(&mut self, button: JoypadButtons) -> bool {
        let held = self.held(button);
        if held && !self.actioned.contains(button) {
            self.actioned |= button;
            return true;
        }
        if !held {
            self.actioned -= button;
        }
        false
    }
}

impl Default for JoypadState {
    fn default() -> Self {
        Self::new()
    }
}

bitflags! {
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub struct MouseEvents: u16 {
        const LEFT_CLICK          = 0x0001;
        const RIGHT_CLICK         = 0x0002;
        const MIDDLE_CLICK        = 0x0004;
        const LEFT_DOUBLE_CLICK   = 0x0008;
        const RIGHT_DOUBLE_CLICK  = 0x0010;
        const MIDDLE_DOUBLE_CLICK = 0x0020;
        const LEFT_DOWN           = 0x0040;
        const RIGHT_DOWN          = 0x0080;
        const MIDDLE_DOWN         = 0x0100;
    }
}

/// One poll of the mouse hardware.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct MouseSample {
    /// Free-running 8-bit counters.
    pub x: i8,
    pub y: i8,
    pub left: bool,
    pub right: bool,
    pub middle: bool,
}

#[derive(Clone, Copy, Debug, Default)]
struct ButtonTracker {
    was_down: bool,
    countdown: u16,
}

impl ButtonTracker {
    fn update(&mut self, down: bool, events: [MouseEvents; 3]) -> MouseEvents {
        let [click, double, held] = events;
        let mut out = MouseEvents::empty();
        self.countdown = self.countdown.saturating_sub(1);
        if self.was_down && !down {
            if self.countdown == 0 {
                out |= click;
                self.countdown = DOUBLE_CLICK_TICKS;
            } else {
                out |= double;
            }
        }
        if down {
            out |= held;
        }
        self.was_down = down;
        out
    }
}

/// Pointer position and click detection from counter deltas.
pub struct MouseState {
    last: (i8, i8),
    pointer: (i32, i32),
    max: (i32, i32),
    delta: (i32, i32),
    events: MouseEvents,
    buttons: [ButtonTracker; 3],
}

impl MouseState {
    pub fn new(max_x: i32, max_y: i32) -> Self {
        Self {
            last: (0, 0),
            pointer: (max_x / 2, max_y / 2),
            max: (max_x, max_y),
            delta: (0, 0),
            events: MouseEvents::empty(),
            buttons: [ButtonTracker::default(); 3],
        }
    }

    fn counter_delta(now: i8, old: i8) -> i32 {
        let mut delta = now as i32 - old as i32;
        if delta < -128 {
            delta += 256;
        }
        if delta > 128 {
            delta -= 256;
        }
        delta
    }

    fn clamp_axis(pointer: i32, delta: i32, max: i32) -> i32 {
        let moved = pointer + delta;
        if moved < 1 {
            1
        } else if moved > max {
            max - 1
        } else {
            moved
        }
    }

    pub fn update(&mut self, sample: MouseSample) -> MouseEvents {
        self.delta = (
            Self::counter_delta(sample.x, self.last.0),
            Self::counter_delta(sample.y, self.last.1),
        );
        self.last = (sample.x, sample.y);
        if self.delta != (0, 0) {
            self.pointer = (
                Self::clamp_axis(self.pointer.0, self.delta.0, self.max.0),
                Self::clamp_axis(self.pointer.1, self.delta.1, self.max.1),
            );
        }

        self.events = self.buttons[0].update(
            sample.left,
            [
                MouseEvents::LEFT_CLICK,
                MouseEvents::LEFT_DOUBLE_CLICK,
                MouseEvents::LEFT_DOWN,
            ],
        ) | self.buttons[1].update(
            sample.right,
            [
                MouseEvents::RIGHT_CLICK,
                MouseEvents::RIGHT_DOUBLE_CLICK,
                MouseEvents::RIGHT_DOWN,
            ],
        ) | self.buttons[2].update(
            sample.middle,
            [
                MouseEvents::MIDDLE_CLICK,
                MouseEvents::MIDDLE_DOUBLE_CLICK,
                MouseEvents::MIDDLE_DOWN,
            ],
        );
        self.events
    }

    pub fn pointer(&self) -> (i32, i32) {
        self.pointer
    }

    pub fn set_pointer(&mut self, x: i32, y: i32) {
        self.pointer = (x.clamp(1, self.max.0 - 1), y.clamp(1, self.max.1 - 1));
    }

    pub fn delta(&self) -> (i32, i32) {
        self.delta
    }

    pub fn events(&self) -> MouseEvents {
        self.events
    }
}
