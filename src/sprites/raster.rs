//! Software sprite rasterizer.
//!
//! Draws frames from a [`BankStore`] into a [`Framebuffer`], clipped against a
//! configurable rectangle. Palette index 0 is never written.

use log::warn;

use super::bank::{BankId, BankStore, Encoding, SpriteBank};
use super::SpriteError;
use crate::core::Framebuffer;

/// Map mode keeps one pixel in three along both axes.
pub const MAP_SCALE: i32 = 3;

/// Half-open clip rectangle in screen coordinates.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ClipRect {
    pub left: i32,
    pub top: i32,
    pub right: i32,
    pub bottom: i32,
}

impl ClipRect {
    pub fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self {
            left: x,
            top: y,
            right: x.saturating_add(width),
            bottom: y.saturating_add(height),
        }
    }

    pub fn contains(&self, x: i32, y: i32) -> bool {
        x >= self.left && x < self.right && y >= self.top && y < self.bottom
    }

    pub fn is_empty(&self) -> bool {
        self.left >= self.right || self.top >= self.bottom
    }

    fn within(&self, target: &Framebuffer) -> Self {
        Self {
            left: self.left.max(0),
            top: self.top.max(0),
            right: self.right.min(target.width() as i32),
            bottom: self.bottom.min(target.height() as i32),
        }
    }
}

/// Sub-rectangle of a frame, in frame pixels.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SourceRect {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct DrawMode {
    flipped: bool,
    step: i32,
}

const NORMAL: DrawMode = DrawMode {
    flipped: false,
    step: 1,
};

pub struct Rasterizer {
    clip: ClipRect,
    overwrite_colour: u8,
    map_scale: i32,
}

impl Rasterizer {
    /// Rasterizer clipping to a full `width` x `height` screen.
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            clip: ClipRect::new(0, 0, width as i32, height as i32),
            overwrite_colour: 0,
            map_scale: MAP_SCALE,
        }
    }

    /// Reduction used by the map draws. Values below 1 are treated as 1.
    pub fn set_map_scale(&mut self, scale: i32) {
        self.map_scale = scale.max(1);
    }

    pub fn map_scale(&self) -> i32 {
        self.map_scale
    }

    /// Restrict drawing to the given rectangle.
    pub fn set_clip_area(&mut self, x: i32, y: i32, width: i32, height: i32) {
        self.clip = ClipRect::new(x, y, width, height);
    }

    pub fn set_clip_rect(&mut self, clip: ClipRect) {
        self.clip = clip;
    }

    pub fn clip_area(&self) -> ClipRect {
        self.clip
    }

    /// Paint every opaque pixel with `colour` instead of its own index. 0 disables.
    pub fn set_overwrite_colour(&mut self, colour: u8) {
        self.overwrite_colour = colour;
    }

    pub fn overwrite_colour(&self) -> u8 {
        self.overwrite_colour
    }

    /// Draw a frame with its top-left corner at `(x, y)`.
    pub fn draw(
        &self,
        banks: &BankStore,
        target: &mut Framebuffer,
        bank: BankId,
        frame: u32,
        x: i32,
        y: i32,
    ) -> Result<(), SpriteError> {
        self.render(banks, target, bank, frame, x, y, NORMAL)
    }

    /// Draw a frame mirrored about its vertical axis.
    pub fn draw_flipped(
        &self,
        banks: &BankStore,
        target: &mut Framebuffer,
        bank: BankId,
        frame: u32,
        x: i32,
        y: i32,
    ) -> Result<(), SpriteError> {
        let mode = DrawMode {
            flipped: true,
            ..NORMAL
        };
        self.render(banks, target, bank, frame, x, y, mode)
    }

    /// Draw a frame reduced by the map scale, one third by default.
    pub fn draw_map(
        &self,
        banks: &BankStore,
        target: &mut Framebuffer,
        bank: BankId,
        frame: u32,
        x: i32,
        y: i32,
    ) -> Result<(), SpriteError> {
        let mode = DrawMode {
            flipped: false,
            step: self.map_scale,
        };
        self.render(banks, target, bank, frame, x, y, mode)
    }

    pub fn draw_map_flipped(
        &self,
        banks: &BankStore,
        target: &mut Framebuffer,
        bank: BankId,
        frame: u32,
        x: i32,
        y: i32,
    ) -> Result<(), SpriteError> {
        let mode = DrawMode {
            flipped: true,
            step: self.map_scale,
        };
        self.render(banks, target, bank, frame, x, y, mode)
    }

    /// Draw only the `part` of a frame, placing its top-left corner at `(x, y)`.
    #[allow(clippy::too_many_arguments)]
    pub fn draw_part(
        &self,
        banks: &BankStore,
        target: &mut Framebuffer,
        bank: BankId,
        frame: u32,
        part: SourceRect,
        x: i32,
        y: i32,
    ) -> Result<(), SpriteError> {
        let sprite = banks.get(bank)?;
        sprite.check_frame(frame)?;

        let window = ClipRect::new(x, y, part.width, part.height);
        let clip = ClipRect {
            left: self.clip.left.max(window.left),
            top: self.clip.top.max(window.top),
            right: self.clip.right.min(window.right),
            bottom: self.clip.bottom.min(window.bottom),
        }
        .within(target);
        if clip.is_empty() {
            return Ok(());
        }
        // an origin that overflows is far outside any surface
        let (Some(ox), Some(oy)) = (x.checked_sub(part.x), y.checked_sub(part.y)) else {
            return Ok(());
        };
        self.render_clipped(sprite, target, frame, ox, oy, NORMAL, clip)
    }

    #[allow(clippy::too_many_arguments)]
    fn render(
        &self,
        banks: &BankStore,
        target: &mut Framebuffer,
        bank: BankId,
        frame: u32,
        x: i32,
        y: i32,
        mode: DrawMode,
    ) -> Result<(), SpriteError> {
        let sprite = banks.get(bank)?;
        sprite.check_frame(frame)?;

        let clip = self.clip.within(target);
        // Scaled compressed frames keep rows 0, step, 2*step.., so round up.
        let out_w = (sprite.width() as i32 + mode.step - 1) / mode.step;
        let out_h = (sprite.height() as i32 + mode.step - 1) / mode.step;
        if clip.is_empty()
            || x >= clip.right
            || y >= clip.bottom
            || x + out_w <= clip.left
            || y + out_h <= clip.top
        {
            return Ok(());
        }
        self.render_clipped(sprite, target, frame, x, y, mode, clip)
    }

    #[allow(clippy::too_many_arguments)]
    fn render_clipped(
        &self,
        sprite: &SpriteBank,
        target: &mut Framebuffer,
        frame: u32,
        x: i32,
        y: i32,
        mode: DrawMode,
        clip: ClipRect,
    ) -> Result<(), SpriteError> {
        let result = match sprite.encoding() {
            Encoding::Raw => self.raw(sprite, target, frame, x, y, mode, clip),
            Encoding::Compressed => self.compressed(sprite, target, frame, x, y, mode, clip),
        };
        if let Err(e) = &result {
            warn!("draw of bank {} frame {} failed: {}", sprite.id(), frame, e);
        }
        result
    }

    #[inline]
    fn plot(&self, target: &mut Framebuffer, clip: &ClipRect, x: i32, y: i32, index: u8) {
        if index == 0 || !clip.contains(x, y) {
            return;
        }
        let colour = if self.overwrite_colour != 0 {
            self.overwrite_colour
        } else {
            index
        };
        let stride = target.stride();
        target.pixels_mut()[y as usize * stride + x as usize] = colour;
    }

    #[allow(clippy::too_many_arguments)]
    fn raw(
        &self,
        sprite: &SpriteBank,
        target: &mut Framebuffer,
        frame: u32,
        x: i32,
        y: i32,
        mode: DrawMode,
        clip: ClipRect,
    ) -> Result<(), SpriteError> {
        let pixels = sprite.raw_frame(frame).ok_or(SpriteError::FrameOutOfRange {
            bank: sprite.id(),
            frame,
        })?;
        let width = sprite.width() as i32;
        let out_w = width / mode.step;
        let out_h = sprite.height() as i32 / mode.step;

        let x0 = x.max(clip.left);
        let x1 = (x + out_w).min(clip.right);
        let y0 = y.max(clip.top);
        let y1 = (y + out_h).min(clip.bottom);

        for dy in y0..y1 {
            let row = ((dy - y) * mode.step * width) as usize;
            for dx in x0..x1 {
                let offset = dx - x;
                let column = if mode.flipped {
                    out_w - 1 - offset
                } else {
                    offset
                };
                let index = pixels[row + (column * mode.step) as usize];
                self.plot(target, &clip, dx, dy, index);
            }
        }
        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    fn compressed(
        &self,
        sprite: &SpriteBank,
        target: &mut Framebuffer,
        frame: u32,
        x: i32,
        y: i32,
        mode: DrawMode,
        clip: ClipRect,
    ) -> Result<(), SpriteError> {
        let data = sprite.data();
        let out_w = sprite.width() as i32 / mode.step;
        let malformed = |source| SpriteError::Malformed {
            bank: sprite.id(),
            source,
        };
        let column = |offset: i32| {
            if mode.flipped {
                x + out_w - 1 - offset
            } else {
                x + offset
            }
        };

        if mode.step == 1 {
            for segment in sprite.segments(frame)? {
                let segment = segment.map_err(malformed)?;
                let py = y + segment.row as i32;
                if py < clip.top || py >= clip.bottom {
                    continue;
                }
                for (i, &index) in data[segment.pixels].iter().enumerate() {
                    self.plot(target, &clip, column(segment.x + i as i32), py, index);
                }
            }
            return Ok(());
        }

        // Scaled: every `step`th row, skips and runs divided by `step`, sampling
        // the first byte of each group of `step`.
        let step = mode.step as u32;
        let mut current_row = u32::MAX;
        let mut cursor = 0;
        for segment in sprite.segments(frame)? {
            let segment = segment.map_err(malformed)?;
            if segment.row % step != 0 {
                continue;
            }
            if segment.row != current_row {
                current_row = segment.row;
                cursor = 0;
            }
            cursor += segment.skip as i32 / mode.step;
            let run = &data[segment.pixels];
            let kept = run.len() as i32 / mode.step;
            let py = y + (segment.row / step) as i32;
            for k in 0..kept {
                let index = run[(k * mode.step) as usize];
                self.plot(target, &clip, column(cursor + k), py, index);
            }
            cursor += kept;
        }
        Ok(())
    }
}
