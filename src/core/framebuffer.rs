/// Flat 8-bit palette-indexed surface, row-major, stride = width.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Framebuffer {
    width: usize,
    height: usize,
    pixels: Vec<u8>,
}

impl Framebuffer {
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            pixels: vec![0; width * height],
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    /// Row stride in bytes.
    pub fn stride(&self) -> usize {
        self.width
    }

    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    pub fn pixels_mut(&mut self) -> &mut [u8] {
        &mut self.pixels
    }

    fn index(&self, x: i32, y: i32) -> Option<usize> {
        if x < 0 || y < 0 {
            return None;
        }
        let (x, y) = (x as usize, y as usize);
        (x < self.width && y < self.height).then(|| y * self.width + x)
    }

    /// Read a pixel; `None` outside the surface.
    pub fn pixel(&self, x: i32, y: i32) -> Option<u8> {
        self.index(x, y).map(|i| self.pixels[i])
    }

    /// Write a pixel; writes outside the surface are ignored.
    pub fn set_pixel(&mut self, x: i32, y: i32, value: u8) {
        if let Some(i) = self.index(x, y) {
            self.pixels[i] = value;
        }
    }

    pub fn fill(&mut self, value: u8) {
        self.pixels.fill(value);
    }

    /// Fill a rectangle, clipped to the surface.
    pub fn fill_rect(&mut self, x: i32, y: i32, w: i32, h: i32, value: u8) {
        let x0 = x.max(0);
        let y0 = y.max(0);
        let x1 = x.saturating_add(w).min(self.width as i32);
        let y1 = y.saturating_add(h).min(self.height as i32);
        if x0 >= x1 || y0 >= y1 {
            return;
        }
        for row in y0..y1 {
            let start = row as usize * self.width;
            self.pixels[start + x0 as usize..start + x1 as usize].fill(value);
        }
    }

    /// Copy a `w`x`h` window of `src` at (`src_x`, `src_y`) to (`dst_x`, `dst_y`).
    ///
    /// The window is clipped against both surfaces, so a scroll offset near the
    /// edge of the back screen simply copies less.
    #[allow(clippy::too_many_arguments)]
    pub fn blit_from(
        &mut self,
        src: &Framebuffer,
        src_x: i32,
        src_y: i32,
        w: i32,
        h: i32,
        dst_x: i32,
        dst_y: i32,
    ) {
        // shift the window so that both origins are non-negative
        let lead_x = (-src_x).max(-dst_x).max(0);
        let lead_y = (-src_y).max(-dst_y).max(0);
        let (sx, sy) = (src_x + lead_x, src_y + lead_y);
        let (dx, dy) = (dst_x + lead_x, dst_y + lead_y);

        let cols = (w - lead_x)
            .min(src.width as i32 - sx)
            .min(self.width as i32 - dx);
        let rows = (h - lead_y)
            .min(src.height as i32 - sy)
            .min(self.height as i32 - dy);
        if cols <= 0 || rows <= 0 {
            return;
        }

        let cols = cols as usize;
        for row in 0..rows as usize {
            let s = (sy as usize + row) * src.width + sx as usize;
            let d = (dy as usize + row) * self.width + dx as usize;
            self.pixels[d..d + cols].copy_from_slice(&src.pixels[s..s + cols]);
        }
    }

    /// Nearest-neighbour reduction of the whole of `src` by `factor`, placed at
    /// (`dst_x`, `dst_y`). Used for the map overview.
    pub fn downscale_from(&mut self, src: &Framebuffer, factor: usize, dst_x: i32, dst_y: i32) {
        if factor == 0 {
            return;
        }
        let out_w = src.width / factor;
        let out_h = src.height / factor;
        for oy in 0..out_h {
            let ty = dst_y + oy as i32;
            if ty < 0 || ty as usize >= self.height {
                continue;
            }
            let src_row = oy * factor * src.width;
            for ox in 0..out_w {
                let tx = dst_x + ox as i32;
                if tx < 0 || tx as usize >= self.width {
                    continue;
                }
                self.pixels[ty as usize * self.width + tx as usize] =
                    src.pixels[src_row + ox * factor];
            }
        }
    }
}
