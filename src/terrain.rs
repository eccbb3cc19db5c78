//! Terrain scene assembly.
//!
//! Turns a heightmap and a theme's texture banks into the back screen, places
//! spawn points on the surface, and copies the scrolled or shrunk back screen
//! onto the display.

use log::{debug, info};
use rand::Rng;
use thiserror::Error;

use crate::config::{EngineConfig, Viewport};
use crate::core::Framebuffer;
use crate::resources::ResourceGroups;
use crate::sprites::{BankId, BankStore, Rasterizer, SpriteError};

/// Horizontal spacing of the sky gradient strips.
const GRADIENT_STEP: usize = 8;
/// Spawn columns stay this far from either edge.
const SPAWN_MARGIN: usize = 15;
/// Spawn points sit this far below the surface row.
const SPAWN_DROP: i32 = 30;
/// Spawn points deeper than `water_line + SPAWN_WATER_SLACK` are rerolled.
const SPAWN_WATER_SLACK: i32 = 10;
const SPAWN_ATTEMPTS: usize = 1000;

/// Water strip tiles repeat this far apart across the back screen.
const WATER_TILE: i32 = 256;
/// Water strips sit this far above the bottom of the back screen.
const WATER_LIFT: i32 = 30;
/// Animation frames in a water strip.
const WATER_FRAMES: u32 = 12;
/// Height of the band the overview water is clipped to.
const OVERVIEW_WATER_BAND: i32 = 12;
const OVERVIEW_WATER_DROP: i32 = 4;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TerrainError {
    #[error(transparent)]
    Sprite(#[from] SpriteError),
    #[error("bank {0} is compressed, terrain textures must be raw")]
    NotRaw(BankId),
    #[error("heightmap has {actual} columns but the back screen is {needed} wide")]
    HeightmapTooShort { needed: usize, actual: usize },
}

/// The banks a terrain theme is drawn from.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TerrainTheme {
    pub gradient: BankId,
    pub soil: BankId,
    pub back: BankId,
    pub grass: BankId,
    pub water_colour: u8,
}

impl TerrainTheme {
    pub const GRADIENT: u32 = 0;
    pub const SOIL: u32 = 1;
    pub const BACK: u32 = 2;
    pub const GRASS: u32 = 3;

    /// Theme whose banks are the first four of `group`.
    pub fn from_group(groups: &ResourceGroups, group: usize, water_colour: u8) -> Option<Self> {
        Some(Self {
            gradient: groups.bank(group, Self::GRADIENT)?,
            soil: groups.bank(group, Self::SOIL)?,
            back: groups.bank(group, Self::BACK)?,
            grass: groups.bank(group, Self::GRASS)?,
            water_colour,
        })
    }
}

fn raw_texture(banks: &BankStore, id: BankId) -> Result<(&[u8], usize, usize), TerrainError> {
    let bank = banks.get(id)?;
    let pixels = bank.raw_frame(0).ok_or(TerrainError::NotRaw(id))?;
    Ok((pixels, bank.width() as usize, bank.height() as usize))
}

/// Paint the whole back screen for one map.
///
/// Layers, bottom to top: sky gradient, background strip resting on the water
/// line, soil below each column's surface with a grass fringe above it, and
/// the water band from the water line down.
pub fn build_back_screen(
    target: &mut Framebuffer,
    banks: &BankStore,
    theme: &TerrainTheme,
    heights: &[i32],
    config: &EngineConfig,
) -> Result<(), TerrainError> {
    let width = target.width();
    let height = target.height();
    if heights.len() < width {
        return Err(TerrainError::HeightmapTooShort {
            needed: width,
            actual: heights.len(),
        });
    }
    let (soil, soil_w, soil_h) = raw_texture(banks, theme.soil)?;
    let (grass, grass_w, grass_h) = raw_texture(banks, theme.grass)?;
    let grass_rows = grass_h / 2;

    let raster = Rasterizer::new(width, height);
    for x in (0..width).step_by(GRADIENT_STEP) {
        raster.draw(banks, target, theme.gradient, 0, x as i32, 0)?;
    }
    let back_w = banks.width(theme.back) as usize;
    if back_w > 0 {
        let y = config.water_line - banks.height(theme.back) as i32;
        for x in (0..width).step_by(back_w) {
            raster.draw(banks, target, theme.back, 0, x as i32, y)?;
        }
    }

    if soil_w > 0 && soil_h > 0 && grass_w > 0 {
        for (column, &h) in heights.iter().take(width).enumerate() {
            let x = column as i32;
            let surface = h - config.surface_bias;

            for row in 0..grass_rows {
                let pixel = grass[row * grass_w + column % grass_w];
                if pixel != 0 {
                    target.set_pixel(x, surface - grass_rows as i32 + row as i32, pixel);
                }
            }
            for y in surface.max(0)..height as i32 {
                let texel = soil[(y as usize % soil_h) * soil_w + column % soil_w];
                target.set_pixel(x, y, texel);
            }
        }
    }

    target.fill_rect(
        0,
        config.water_line,
        width as i32,
        height as i32 - config.water_line,
        theme.water_colour,
    );

    info!(
        "back screen rebuilt: {}x{}, soil bank {}, grass bank {}",
        width, height, theme.soil, theme.grass
    );
    Ok(())
}

/// A random surface point above the water, as `(column, row)`.
pub fn spawn_position<R: Rng>(
    rng: &mut R,
    heights: &[i32],
    config: &EngineConfig,
) -> Option<(i32, i32)> {
    if heights.len() <= SPAWN_MARGIN * 2 {
        return None;
    }
    let floor = config.water_line + SPAWN_WATER_SLACK;
    for _ in 0..SPAWN_ATTEMPTS {
        let x = rng.random_range(SPAWN_MARGIN..heights.len() - SPAWN_MARGIN);
        let y = heights[x] - config.surface_bias + SPAWN_DROP;
        if y <= floor {
            return Some((x as i32, y));
        }
    }
    debug!("no dry spawn point after {} attempts", SPAWN_ATTEMPTS);
    None
}

/// Copy the back screen window at `scroll` into the viewport.
pub fn present(screen: &mut Framebuffer, back: &Framebuffer, scroll: (i32, i32), viewport: &Viewport) {
    screen.blit_from(
        back,
        scroll.0,
        scroll.1,
        viewport.width,
        viewport.height,
        viewport.x,
        viewport.y,
    );
}

/// Shrink the whole back screen by `scale` and place it at row `top`.
pub fn present_overview(screen: &mut Framebuffer, back: &Framebuffer, scale: i32, top: i32) {
    if scale > 0 {
        screen.downscale_from(back, scale as usize, 0, top);
    }
}

/// Outline, on the overview, the part of the world the viewport shows.
pub fn draw_viewport_marker(
    screen: &mut Framebuffer,
    scroll: (i32, i32),
    viewport: &Viewport,
    scale: i32,
    top: i32,
    colour: u8,
) {
    if scale <= 0 {
        return;
    }
    let x = scroll.0 / scale;
    let y = scroll.1 / scale + top;
    let w = viewport.width / scale;
    let h = viewport.height / scale - 1;

    screen.fill_rect(x, y, w, 1, colour);
    screen.fill_rect(x, y + h, w, 1, colour);
    screen.fill_rect(x, y, 1, h, colour);
    screen.fill_rect(x + w, y, 1, h, colour);
}

/// The animated water strip drawn over the water line.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct WaterStrip {
    pub bank: BankId,
    frame: u32,
}

impl WaterStrip {
    pub fn new(bank: BankId) -> Self {
        Self { bank, frame: 0 }
    }

    pub fn frame(&self) -> u32 {
        self.frame
    }

    /// Step the animation every fourth game frame.
    pub fn advance(&mut self, frame_counter: u64, banks: &BankStore) {
        if frame_counter & 3 != 0 {
            return;
        }
        let frames = banks.frame_count(self.bank).clamp(1, WATER_FRAMES);
        self.frame = (self.frame + 1) % frames;
    }

    /// Tile the strip across the scrolled view. Clipping is the caller's.
    pub fn draw(
        &self,
        raster: &Rasterizer,
        banks: &BankStore,
        target: &mut Framebuffer,
        scroll: (i32, i32),
        config: &EngineConfig,
    ) -> Result<(), SpriteError> {
        let strip_h = banks.height(self.bank) as i32;
        let y = config.back_height as i32 - WATER_LIFT - strip_h / 4 - scroll.1;
        for x in (0..config.back_width as i32).step_by(WATER_TILE as usize) {
            raster.draw(banks, target, self.bank, self.frame, x - scroll.0, y)?;
        }
        Ok(())
    }

    /// Tile the strip, at map scale, along the overview's water line.
    pub fn draw_overview(
        &self,
        raster: &mut Rasterizer,
        banks: &BankStore,
        target: &mut Framebuffer,
        top: i32,
        config: &EngineConfig,
    ) -> Result<(), SpriteError> {
        let scale = config.map_scale.max(1);
        let strip_h = banks.height(self.bank) as i32;
        let y = top + config.water_line / scale + OVERVIEW_WATER_DROP - strip_h / 4;
        let saved = raster.clip_area();
        raster.set_clip_area(0, y, config.screen_width as i32, OVERVIEW_WATER_BAND);

        let step = (WATER_TILE / scale).max(1) as usize;
        let mut result = Ok(());
        for x in (0..config.screen_width as i32).step_by(step) {
            result = raster.draw_map(banks, target, self.bank, self.frame, x, y);
            if result.is_err() {
                break;
            }
        }
        raster.set_clip_rect(saved);
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sprites::BankInfo;
    use crate::sprites::codec::encode_frames;
    use pretty_assertions::assert_eq;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    const GRADIENT: BankId = 0;
    const SOIL: BankId = 1;
    const BACK: BankId = 2;
    const GRASS: BankId = 3;
    const WATER: BankId = 4;

    fn small_config() -> EngineConfig {
        EngineConfig {
            back_width: 64,
            back_height: 48,
            water_line: 40,
            surface_bias: 100,
            ..EngineConfig::new()
        }
    }

    fn theme() -> TerrainTheme {
        TerrainTheme {
            gradient: GRADIENT,
            soil: SOIL,
            back: BACK,
            grass: GRASS,
            water_colour: 0xD3,
        }
    }

    fn store() -> BankStore {
        let mut banks = BankStore::new();
        banks
            .register(GRADIENT, BankInfo::raw(8, 4, 1), vec![1; 32])
            .unwrap();
        let soil: Vec<u8> = (0..16).map(|i| 10 + i as u8).collect();
        banks.register(SOIL, BankInfo::raw(4, 4, 1), soil).unwrap();
        banks
            .register(BACK, BankInfo::raw(16, 4, 1), vec![2; 64])
            .unwrap();
        let grass = vec![0, 5, 5, 5, 6, 6, 6, 6, 0, 0, 0, 0, 0, 0, 0, 0];
        banks.register(GRASS, BankInfo::raw(4, 4, 1), grass).unwrap();
        banks
    }

    #[test]
    fn back_screen_layers() {
        let banks = store();
        let config = small_config();
        let mut heights = vec![150; 64];
        // surface row 20 on the right half
        heights[32..].fill(120);
        let mut back = Framebuffer::new(64, 48);

        build_back_screen(&mut back, &banks, &theme(), &heights, &config).unwrap();

        assert_eq!(back.pixel(0, 0), Some(1));
        // background strip rests on the water line where there is no ground
        assert_eq!(back.pixel(5, 37), Some(2));
        assert_eq!(back.pixel(5, 20), Some(0));
        // soil texture wraps on both axes
        assert_eq!(back.pixel(41, 25), Some(10 + 4 + 1));
        assert_eq!(back.pixel(40, 20), Some(10));
        // grass fringe, transparent where the texture is 0
        assert_eq!(back.pixel(40, 18), Some(0));
        assert_eq!(back.pixel(41, 18), Some(5));
        assert_eq!(back.pixel(42, 19), Some(6));
        // water band covers everything from the water line down
        assert_eq!(back.pixel(5, 45), Some(0xD3));
        assert_eq!(back.pixel(40, 40), Some(0xD3));
        assert_eq!(back.pixel(63, 47), Some(0xD3));
    }

    #[test]
    fn compressed_textures_are_refused() {
        let mut banks = store();
        banks.unregister(SOIL);
        let pixels = [3u8; 16];
        banks
            .register(SOIL, BankInfo::compressed(4, 4, 1), encode_frames(4, 4, &[&pixels[..]]))
            .unwrap();
        let mut back = Framebuffer::new(64, 48);
        let err = build_back_screen(&mut back, &banks, &theme(), &[150; 64], &small_config());
        assert_eq!(err, Err(TerrainError::NotRaw(SOIL)));
    }

    #[test]
    fn short_heightmap_is_refused() {
        let banks = store();
        let mut back = Framebuffer::new(64, 48);
        let err = build_back_screen(&mut back, &banks, &theme(), &[150; 10], &small_config());
        assert_eq!(
            err,
            Err(TerrainError::HeightmapTooShort {
                needed: 64,
                actual: 10
            })
        );
    }

    #[test]
    fn missing_bank_surfaces_as_sprite_error() {
        let mut banks = store();
        banks.unregister(GRASS);
        let mut back = Framebuffer::new(64, 48);
        let err = build_back_screen(&mut back, &banks, &theme(), &[150; 64], &small_config());
        assert_eq!(
            err,
            Err(TerrainError::Sprite(SpriteError::BankNotRegistered(GRASS)))
        );
    }

    #[test]
    fn theme_from_group() {
        let mut groups = ResourceGroups::new();
        groups.add_group("worms", 5).unwrap();
        let beach = groups.add_group("beach", 4).unwrap();
        let tiny = groups.add_group("tiny", 2).unwrap();

        let theme = TerrainTheme::from_group(&groups, beach, 0xD3).unwrap();
        assert_eq!(theme.gradient, 5);
        assert_eq!(theme.soil, 6);
        assert_eq!(theme.back, 7);
        assert_eq!(theme.grass, 8);
        assert_eq!(TerrainTheme::from_group(&groups, tiny, 0xD3), None);
    }

    #[test]
    fn spawn_points_stay_dry_and_inside() {
        let config = EngineConfig::new();
        let mut heights = vec![1500; 1920];
        // only a few dry columns
        for x in 600..620 {
            heights[x] = 1000;
        }
        let mut rng = StdRng::seed_from_u64(9);
        for _ in 0..20 {
            let (x, y) = spawn_position(&mut rng, &heights, &config).unwrap();
            assert!((600..620).contains(&x));
            assert_eq!(y, 1000 - 350 + 30);
        }
    }

    #[test]
    fn spawn_gives_up_when_everything_is_flooded() {
        let config = EngineConfig::new();
        let mut rng = StdRng::seed_from_u64(1);
        assert_eq!(spawn_position(&mut rng, &vec![1500; 1920], &config), None);
        assert_eq!(spawn_position(&mut rng, &[1000; 20], &config), None);
    }

    #[test]
    fn present_copies_the_scroll_window() {
        let mut back = Framebuffer::new(32, 16);
        for (i, p) in back.pixels_mut().iter_mut().enumerate() {
            *p = (i % 251) as u8;
        }
        let mut screen = Framebuffer::new(20, 12);
        let viewport = Viewport {
            x: 2,
            y: 3,
            width: 8,
            height: 4,
        };
        present(&mut screen, &back, (5, 6), &viewport);

        assert_eq!(screen.pixel(2, 3), back.pixel(5, 6));
        assert_eq!(screen.pixel(9, 6), back.pixel(12, 9));
        assert_eq!(screen.pixel(10, 3), Some(0));
        assert_eq!(screen.pixel(1, 3), Some(0));
    }

    #[test]
    fn overview_and_marker() {
        let mut back = Framebuffer::new(30, 15);
        back.fill(4);
        let mut screen = Framebuffer::new(20, 20);
        present_overview(&mut screen, &back, 3, 2);
        assert_eq!(screen.pixel(0, 2), Some(4));
        assert_eq!(screen.pixel(9, 6), Some(4));
        assert_eq!(screen.pixel(10, 6), Some(0));
        assert_eq!(screen.pixel(0, 7), Some(0));

        let viewport = Viewport {
            x: 0,
            y: 0,
            width: 12,
            height: 9,
        };
        let mut screen = Framebuffer::new(20, 20);
        draw_viewport_marker(&mut screen, (6, 3), &viewport, 3, 2, 0x0F);
        // 4 wide, 2 tall, top-left at (2, 3)
        assert_eq!(screen.pixel(2, 3), Some(0x0F));
        assert_eq!(screen.pixel(5, 3), Some(0x0F));
        assert_eq!(screen.pixel(6, 4), Some(0x0F));
        assert_eq!(screen.pixel(2, 5), Some(0x0F));
        assert_eq!(screen.pixel(3, 4), Some(0));
    }

    #[test]
    fn water_animation_wraps() {
        let mut banks = BankStore::new();
        banks
            .register(WATER, BankInfo::raw(4, 4, 14), vec![7; 16 * 14])
            .unwrap();
        let mut water = WaterStrip::new(WATER);
        for tick in 0..4 {
            water.advance(tick, &banks);
        }
        assert_eq!(water.frame(), 1);

        for tick in 4..48 {
            water.advance(tick, &banks);
        }
        // twelve steps wrap back to the first frame
        assert_eq!(water.frame(), 0);
    }

    #[test]
    fn water_tiles_across_the_view() {
        let mut banks = BankStore::new();
        banks
            .register(WATER, BankInfo::raw(4, 8, 1), vec![7; 32])
            .unwrap();
        let config = EngineConfig::new();
        let water = WaterStrip::new(WATER);
        let raster = Rasterizer::new(640, 480);
        let mut screen = Framebuffer::new(640, 480);
        water
            .draw(&raster, &banks, &mut screen, (200, 500), &config)
            .unwrap();
        // tiles at world x 256 and 512, row 960 - 30 - 2
        let y = 928 - 500;
        assert_eq!(screen.pixel(56, y), Some(7));
        assert_eq!(screen.pixel(312, y + 7), Some(7));
        assert_eq!(screen.pixel(60, y), Some(0));
    }

    #[test]
    fn overview_water_is_banded_and_restores_clip() {
        let mut banks = BankStore::new();
        banks
            .register(WATER, BankInfo::raw(9, 9, 1), vec![7; 81])
            .unwrap();
        let config = EngineConfig::new();
        let water = WaterStrip::new(WATER);
        let mut raster = Rasterizer::new(640, 480);
        let mut screen = Framebuffer::new(640, 480);
        water
            .draw_overview(&mut raster, &banks, &mut screen, 70, &config)
            .unwrap();

        let y = 70 + 300 + 4 - 2;
        assert_eq!(screen.pixel(0, y), Some(7));
        assert_eq!(screen.pixel(85, y + 2), Some(7));
        assert_eq!(screen.pixel(3, y), Some(0));
        assert_eq!(raster.clip_area(), Rasterizer::new(640, 480).clip_area());
    }

    #[test]
    fn overview_water_survives_a_huge_scale() {
        let mut banks = BankStore::new();
        banks
            .register(WATER, BankInfo::raw(9, 9, 1), vec![7; 81])
            .unwrap();
        let config = EngineConfig {
            map_scale: 300,
            ..EngineConfig::new()
        };
        let water = WaterStrip::new(WATER);
        let mut raster = Rasterizer::new(640, 480);
        let mut screen = Framebuffer::new(640, 480);
        water
            .draw_overview(&mut raster, &banks, &mut screen, 70, &config)
            .unwrap();

        // tiles one pixel apart cover the whole band
        let y = 70 + 900 / 300 + 4 - 2;
        assert_eq!(screen.pixel(100, y), Some(7));
        assert_eq!(screen.pixel(639, y), Some(7));
    }
}
