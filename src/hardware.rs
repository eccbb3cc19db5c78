//! Display service.
//!
//! The game renders into 8-bit indexed surfaces: a triple-buffered screen, a
//! working back screen the scroll window is copied from, and a reference back
//! screen the terrain is built into. [`Display`] is the seam a real video
//! backend plugs into; [`HeadlessDisplay`] keeps everything in memory.

use log::debug;

use crate::core::Framebuffer;

pub const PALETTE_SIZE: usize = 256;
const SCREEN_BUFFERS: usize = 3;

/// Which surface [`Display::surface`] hands out.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ScreenMode {
    /// The screen buffer being drawn this frame.
    Game,
    /// Working back screen.
    Back,
    /// Reference back screen, rebuilt with each new map.
    Reference,
}

pub trait Display {
    fn set_screen_mode(&mut self, mode: ScreenMode);
    fn screen_mode(&self) -> ScreenMode;

    /// Surface selected by the current screen mode.
    fn surface(&mut self) -> &mut Framebuffer;

    /// The screen buffer being drawn and the working back screen, together.
    fn screen_and_back(&mut self) -> (&mut Framebuffer, &Framebuffer);

    /// Copy the reference back screen over the working one.
    fn copy_reference_to_back(&mut self);

    fn wait_vbl(&mut self);

    /// Show the buffer just drawn and start drawing into the next one.
    fn flip(&mut self);

    /// Clear the screen buffer being drawn.
    fn clear(&mut self);

    /// Load up to 256 `0x00RRGGBB` entries. Returns how many were taken.
    fn set_palette(&mut self, palette: &[u32]) -> usize;
}

/// In-memory [`Display`].
pub struct HeadlessDisplay {
    screens: [Framebuffer; SCREEN_BUFFERS],
    drawing: usize,
    shown: usize,
    back: Framebuffer,
    reference: Framebuffer,
    mode: ScreenMode,
    palette: [u32; PALETTE_SIZE],
    vbl_count: u64,
    flips: u64,
}

impl HeadlessDisplay {
    pub fn new(
        screen_width: usize,
        screen_height: usize,
        back_width: usize,
        back_height: usize,
    ) -> Self {
        Self {
            screens: std::array::from_fn(|_| Framebuffer::new(screen_width, screen_height)),
            drawing: 1,
            shown: 0,
            back: Framebuffer::new(back_width, back_height),
            reference: Framebuffer::new(back_width, back_height),
            mode: ScreenMode::Game,
            palette: [0; PALETTE_SIZE],
            vbl_count: 0,
            flips: 0,
        }
    }

    /// The buffer last presented by [`Display::flip`].
    pub fn shown(&self) -> &Framebuffer {
        &self.screens[self.shown]
    }

    pub fn drawing(&self) -> &Framebuffer {
        &self.screens[self.drawing]
    }

    pub fn back(&self) -> &Framebuffer {
        &self.back
    }

    pub fn reference(&self) -> &Framebuffer {
        &self.reference
    }

    pub fn palette(&self) -> &[u32; PALETTE_SIZE] {
        &self.palette
    }

    pub fn vbl_count(&self) -> u64 {
        self.vbl_count
    }

    pub fn flips(&self) -> u64 {
        self.flips
    }
}

impl Display for HeadlessDisplay {
    fn set_screen_mode(&mut self, mode: ScreenMode) {
        self.mode = mode;
    }

    fn screen_mode(&self) -> ScreenMode {
        self.mode
    }

    fn surface(&mut self) -> &mut Framebuffer {
        match self.mode {
            ScreenMode::Game => &mut self.screens[self.drawing],
            ScreenMode::Back => &mut self.back,
            ScreenMode::Reference => &mut self.reference,
        }
    }

    fn screen_and_back(&mut self) -> (&mut Framebuffer, &Framebuffer) {
        (&mut self.screens[self.drawing], &self.back)
    }

    fn copy_reference_to_back(&mut self) {
        self.back.clone_from(&self.reference);
    }

    fn wait_vbl(&mut self) {
        self.vbl_count += 1;
    }

    fn flip(&mut self) {
        self.shown = self.drawing;
        self.drawing = (self.drawing + 1) % SCREEN_BUFFERS;
        self.flips += 1;
    }

    fn clear(&mut self) {
        self.screens[self.drawing].fill(0);
    }

    fn set_palette(&mut self, palette: &[u32]) -> usize {
        let count = palette.len().min(PALETTE_SIZE);
        self.palette[..count].copy_from_slice(&palette[..count]);
        debug!("palette: {} entries loaded", count);
        count
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn display() -> HeadlessDisplay {
        HeadlessDisplay::new(16, 8, 48, 24)
    }

    #[test]
    fn surface_follows_screen_mode() {
        let mut d = display();
        assert_eq!(d.surface().width(), 16);
        d.set_screen_mode(ScreenMode::Reference);
        d.surface().set_pixel(0, 0, 5);
        assert_eq!(d.surface().width(), 48);
        assert_eq!(d.reference().pixel(0, 0), Some(5));
        assert_eq!(d.back().pixel(0, 0), Some(0));

        d.copy_reference_to_back();
        assert_eq!(d.back().pixel(0, 0), Some(5));
        assert_eq!(d.screen_mode(), ScreenMode::Reference);
    }

    #[test]
    fn flip_cycles_three_buffers() {
        let mut d = display();
        d.surface().fill(1);
        d.flip();
        assert_eq!(d.shown().pixel(0, 0), Some(1));
        assert_eq!(d.drawing().pixel(0, 0), Some(0));

        d.surface().fill(2);
        d.flip();
        d.surface().fill(3);
        d.flip();
        // back to the first buffer drawn
        assert_eq!(d.drawing().pixel(0, 0), Some(1));
        assert_eq!(d.shown().pixel(0, 0), Some(3));
        assert_eq!(d.flips(), 3);
    }

    #[test]
    fn clear_only_touches_the_drawing_buffer() {
        let mut d = display();
        d.surface().fill(7);
        d.flip();
        d.surface().fill(8);
        d.clear();
        assert!(d.drawing().pixels().iter().all(|&p| p == 0));
        assert_eq!(d.shown().pixel(3, 3), Some(7));
    }

    #[test]
    fn palette_upload_is_capped() {
        let mut d = display();
        let colours: Vec<u32> = (0..300).collect();
        assert_eq!(d.set_palette(&colours), PALETTE_SIZE);
        assert_eq!(d.palette()[255], 255);
        assert_eq!(d.set_palette(&[0xFF_FFFF]), 1);
        assert_eq!(d.palette()[0], 0xFF_FFFF);
        assert_eq!(d.palette()[1], 1);
    }

    #[test]
    fn vbl_counts() {
        let mut d = display();
        d.wait_vbl();
        d.wait_vbl();
        assert_eq!(d.vbl_count(), 2);
    }
}
