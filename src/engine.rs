//! Frame-stepped game engine.
//!
//! Owns every subsystem and drives one tick at a time: input is turned into
//! camera moves and commands, sprites are updated, then the scene is drawn
//! and presented.

use bitflags::bitflags;
use log::{debug, info, warn};
use rand::Rng;
use thiserror::Error;

use crate::config::{ConfigError, EngineConfig};
use crate::hardware::{Display, ScreenMode};
use crate::input::{JoypadButtons, JoypadState, KeyboardState, MouseEvents, MouseState};
use crate::manager::{AnimType, ManagerError, RenderMode, SpriteFlags, SpriteHandle, SpriteManager};
use crate::noise::{HeightmapParams, PerlinNoise};
use crate::sprites::{BankId, BankStore, Rasterizer};
use crate::terrain::{self, TerrainError, TerrainTheme, WaterStrip};

pub const KEY_ESC: u8 = 0x45;
pub const KEY_1: u8 = 0x01;
pub const KEY_2: u8 = 0x02;
pub const KEY_3: u8 = 0x03;
pub const KEY_UP: u8 = 0x4C;
pub const KEY_DOWN: u8 = 0x4D;
pub const KEY_RIGHT: u8 = 0x4E;
pub const KEY_LEFT: u8 = 0x4F;

/// Camera position when the engine starts.
const START_SCROLL: (i32, i32) = (400, 300);
/// Screen row the map overview starts on.
pub const OVERVIEW_TOP: i32 = 70;
/// The overview clip stops short of the viewport bottom by this much.
const OVERVIEW_CLIP_TRIM: i32 = 12;
const MARKER_COLOUR: u8 = 0x0F;
/// Clicking the overview centres the camera this far right and down of the click.
const MAP_PICK_OFFSET: (i32, i32) = (320, 160);
/// Blank frames shown while switching theme.
const THEME_SWITCH_CLEARS: usize = 3;

bitflags! {
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub struct Commands: u8 {
        const QUIT       = 0x01;
        const TOGGLE_MAP = 0x02;
        const NEW_MAP    = 0x04;
        const NEXT_THEME = 0x08;
    }
}

#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Terrain(#[from] TerrainError),
    #[error(transparent)]
    Manager(#[from] ManagerError),
    #[error("no terrain themes are loaded")]
    NoThemes,
}

struct Theme {
    terrain: TerrainTheme,
    palette: Vec<u32>,
}

pub struct Engine {
    config: EngineConfig,
    pub banks: BankStore,
    pub raster: Rasterizer,
    pub sprites: SpriteManager,
    noise: PerlinNoise,
    heights: Vec<i32>,
    themes: Vec<Theme>,
    theme: usize,
    water: Option<WaterStrip>,
    scroll: (i32, i32),
    mode: RenderMode,
    frame_count: u64,
    last_drawn: usize,
    maps_built: u32,
}

impl Engine {
    pub fn new(config: EngineConfig) -> Result<Self, EngineError> {
        config.validate()?;

        let mut raster = Rasterizer::new(config.screen_width, config.screen_height);
        raster.set_clip_rect(config.viewport.clip());
        raster.set_map_scale(config.map_scale);
        let mut sprites = SpriteManager::with_capacity(config.sprite_capacity);
        sprites.set_overview_origin(config.overview_origin.0, config.overview_origin.1);
        sprites.set_map_scale(config.map_scale);

        let mut engine = Self {
            banks: BankStore::with_capacity(config.bank_capacity),
            raster,
            sprites,
            noise: PerlinNoise::new(config.noise_seed),
            heights: Vec::new(),
            themes: Vec::new(),
            theme: 0,
            water: None,
            scroll: (0, 0),
            mode: RenderMode::Normal,
            frame_count: 0,
            last_drawn: 0,
            maps_built: 0,
            config,
        };
        engine.set_scroll(START_SCROLL.0, START_SCROLL.1);
        Ok(engine)
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Register a terrain theme and the palette shown with it.
    pub fn add_theme(&mut self, terrain: TerrainTheme, palette: Vec<u32>) -> usize {
        self.themes.push(Theme { terrain, palette });
        self.themes.len() - 1
    }

    pub fn theme(&self) -> usize {
        self.theme
    }

    pub fn set_water(&mut self, bank: BankId) {
        self.water = Some(WaterStrip::new(bank));
    }

    pub fn heights(&self) -> &[i32] {
        &self.heights
    }

    pub fn scroll(&self) -> (i32, i32) {
        self.scroll
    }

    /// Move the camera, keeping the viewport inside the back screen.
    pub fn set_scroll(&mut self, x: i32, y: i32) {
        let (max_x, max_y) = self.config.max_scroll();
        self.scroll = (x.clamp(0, max_x), y.clamp(0, max_y));
    }

    pub fn mode(&self) -> RenderMode {
        self.mode
    }

    pub fn toggle_map(&mut self) {
        self.mode = match self.mode {
            RenderMode::Normal => RenderMode::MapOverview,
            RenderMode::MapOverview => RenderMode::Normal,
        };
        debug!("render mode {:?}", self.mode);
    }

    /// Generate a fresh heightmap and paint the back screens from it.
    pub fn new_map<D: Display, R: Rng>(&mut self, display: &mut D, rng: &mut R) -> Result<(), EngineError> {
        let theme = self.themes.get(self.theme).ok_or(EngineError::NoThemes)?.terrain;

        let params = HeightmapParams {
            base: self.config.heightmap_base,
            amplitude: self.config.heightmap_amplitude,
            octaves: self.config.octaves,
            ..HeightmapParams::new()
        }
        .randomize(rng);
        self.heights = self.noise.generate_heightmap(self.config.back_width, &params);

        display.set_screen_mode(ScreenMode::Reference);
        let built = terrain::build_back_screen(
            display.surface(),
            &self.banks,
            &theme,
            &self.heights,
            &self.config,
        );
        display.set_screen_mode(ScreenMode::Game);
        built?;
        display.copy_reference_to_back();

        self.raster.set_clip_rect(self.config.viewport.clip());
        self.maps_built += 1;
        Ok(())
    }

    /// Switch to the next theme, blanking the screen while the map is rebuilt.
    pub fn next_theme<D: Display, R: Rng>(&mut self, display: &mut D, rng: &mut R) -> Result<(), EngineError> {
        if self.themes.is_empty() {
            return Err(EngineError::NoThemes);
        }
        self.theme = (self.theme + 1) % self.themes.len();
        info!("theme {}", self.theme);

        for _ in 0..THEME_SWITCH_CLEARS {
            display.clear();
            display.wait_vbl();
            display.flip();
        }
        self.new_map(display, rng)?;
        display.wait_vbl();
        display.set_palette(&self.themes[self.theme].palette);
        Ok(())
    }

    /// Place `count` looping, world-space sprites of `bank` on dry ground.
    pub fn spawn_team<R: Rng>(
        &mut self,
        rng: &mut R,
        bank: BankId,
        count: usize,
    ) -> Result<Vec<SpriteHandle>, EngineError> {
        let mut team = Vec::with_capacity(count);
        for _ in 0..count {
            let Some((x, y)) = terrain::spawn_position(rng, &self.heights, &self.config) else {
                warn!("no spawn point for bank {}", bank);
                break;
            };
            let Some(handle) = self.sprites.add(&self.banks, bank, x, y, 0, 0, None) else {
                break;
            };
            self.sprites.flip_sprite(handle, rng.random_bool(0.5))?;
            let frames = self.sprites.total_frames(&self.banks, handle);
            if frames > 0 {
                let frames = frames.min(u16::MAX as u32) as u16;
                self.sprites
                    .add_animation(handle, 1, AnimType::Loop, frames, None)?;
            }
            self.sprites.set_flags(handle, SpriteFlags::WORLD_SPRITE)?;
            team.push(handle);
        }
        Ok(team)
    }

    /// Turn this tick's input into camera moves and commands.
    ///
    /// Scrolling and the map toggle are applied here. Map and theme changes
    /// need the display and are left to [`Engine::perform`].
    pub fn apply_input(
        &mut self,
        keyboard: &mut KeyboardState,
        joypad: &mut JoypadState,
        mouse: &MouseState,
    ) -> Commands {
        let mut commands = Commands::empty();
        let step = self.config.scroll_step;
        let (mut x, mut y) = self.scroll;

        x += joypad.dx as i32 * step;
        y += joypad.dy as i32 * step;

        for (key, command) in [
            (KEY_ESC, Commands::QUIT),
            (KEY_1, Commands::TOGGLE_MAP),
            (KEY_2, Commands::NEW_MAP),
            (KEY_3, Commands::NEXT_THEME),
        ] {
            if keyboard.pressed(key) {
                keyboard.mark_processed(key);
                commands |= command;
            }
        }
        if keyboard.is_down(KEY_UP) {
            y -= step;
        }
        if keyboard.is_down(KEY_DOWN) {
            y += step;
        }
        if keyboard.is_down(KEY_LEFT) {
            x -= step;
        }
        if keyboard.is_down(KEY_RIGHT) {
            x += step;
        }

        if joypad.take_press(JoypadButtons::A) {
            commands |= Commands::NEW_MAP;
        }
        if joypad.held(JoypadButtons::B) {
            commands |= Commands::QUIT;
        }
        if joypad.take_press(JoypadButtons::X) {
            commands |= Commands::TOGGLE_MAP;
        }
        if mouse.events().contains(MouseEvents::RIGHT_CLICK) {
            commands |= Commands::NEXT_THEME;
        }
        self.set_scroll(x, y);

        if commands.contains(Commands::TOGGLE_MAP) {
            self.toggle_map();
        }

        let left_down = mouse.events().contains(MouseEvents::LEFT_DOWN);
        match self.mode {
            RenderMode::MapOverview if left_down => self.pick_on_map(mouse.pointer()),
            RenderMode::Normal if !left_down => self.edge_scroll(mouse.pointer()),
            _ => {}
        }
        commands
    }

    fn pick_on_map(&mut self, (mx, my): (i32, i32)) {
        let vp = self.config.viewport;
        let x = (mx as f32 * self.config.back_width as f32 / vp.width as f32) as i32;
        let y = (my as f32 * self.config.back_height as f32 / vp.height as f32) as i32;
        self.set_scroll(x - MAP_PICK_OFFSET.0, y - MAP_PICK_OFFSET.1);
    }

    /// Scroll when the pointer rests near a viewport edge, faster the closer it is.
    fn edge_scroll(&mut self, (mx, my): (i32, i32)) {
        let area = self.config.edge_scroll_area;
        let speed = self.config.edge_scroll_speed;
        let (w, h) = (
            self.config.viewport.width as f32,
            self.config.viewport.height as f32,
        );
        let (mx, my) = (mx as f32, my as f32);
        let (mut x, mut y) = self.scroll;

        if mx < area {
            x -= (speed * (area - mx) / area) as i32;
        }
        if mx > w - area {
            x += (speed * (mx - (w - area)) / area) as i32;
        }
        if my < area {
            y -= (speed * (area - my) / area) as i32;
        }
        if my > h - area {
            y += (speed * (my - (h - area)) / area) as i32;
        }
        self.set_scroll(x, y);
    }

    /// Carry out the commands [`Engine::apply_input`] deferred. Returns true
    /// when the game should quit.
    pub fn perform<D: Display, R: Rng>(
        &mut self,
        commands: Commands,
        display: &mut D,
        rng: &mut R,
    ) -> Result<bool, EngineError> {
        if commands.contains(Commands::NEW_MAP) {
            self.new_map(display, rng)?;
        }
        if commands.contains(Commands::NEXT_THEME) {
            self.next_theme(display, rng)?;
        }
        Ok(commands.contains(Commands::QUIT))
    }

    /// One tick: update sprites, draw the scene, then present it.
    pub fn step_frame<D: Display>(&mut self, display: &mut D) {
        self.frame_count += 1;
        self.sprites.update();

        display.set_screen_mode(ScreenMode::Game);
        match self.mode {
            RenderMode::Normal => self.draw_game(display),
            RenderMode::MapOverview => self.draw_overview(display),
        }
        if let Some(water) = self.water.as_mut() {
            water.advance(self.frame_count, &self.banks);
        }

        display.wait_vbl();
        display.flip();
    }

    pub fn run_frames<D: Display>(&mut self, display: &mut D, num_frames: u64) {
        for _ in 0..num_frames {
            self.step_frame(display);
        }
    }

    fn draw_game<D: Display>(&mut self, display: &mut D) {
        let vp = self.config.viewport;
        let (screen, back) = display.screen_and_back();
        terrain::present(screen, back, self.scroll, &vp);

        self.raster.set_clip_rect(vp.clip());
        // world coordinates map onto the viewport, not the screen origin
        let camera = (self.scroll.0 - vp.x, self.scroll.1 - vp.y);
        self.last_drawn = self
            .sprites
            .draw(&self.raster, &self.banks, screen, camera, RenderMode::Normal);

        if let Some(water) = &self.water {
            if let Err(err) = water.draw(&self.raster, &self.banks, screen, camera, &self.config) {
                warn!("water strip: {}", err);
            }
        }
    }

    fn draw_overview<D: Display>(&mut self, display: &mut D) {
        let vp = self.config.viewport;
        let scale = self.config.map_scale;
        let (screen, back) = display.screen_and_back();
        screen.fill_rect(vp.x, vp.y, vp.width, vp.height, 0);
        terrain::present_overview(screen, back, scale, OVERVIEW_TOP);

        self.raster
            .set_clip_area(vp.x, vp.y, vp.width, vp.height - OVERVIEW_CLIP_TRIM);
        self.last_drawn = self.sprites.draw(
            &self.raster,
            &self.banks,
            screen,
            self.scroll,
            RenderMode::MapOverview,
        );
        if let Some(water) = &self.water {
            if let Err(err) =
                water.draw_overview(&mut self.raster, &self.banks, screen, OVERVIEW_TOP, &self.config)
            {
                warn!("overview water strip: {}", err);
            }
        }
        terrain::draw_viewport_marker(screen, self.scroll, &vp, scale, OVERVIEW_TOP, MARKER_COLOUR);
        self.raster.set_clip_rect(vp.clip());
    }

    pub fn stats(&self) -> EngineStats {
        EngineStats {
            frame_count: self.frame_count,
            active_sprites: self.sprites.count(),
            sprites_drawn: self.last_drawn,
            maps_built: self.maps_built,
            theme: self.theme,
            scroll: self.scroll,
            map_mode: self.mode == RenderMode::MapOverview,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct EngineStats {
    pub frame_count: u64,
    pub active_sprites: usize,
    /// Sprites drawn in the last frame.
    pub sprites_drawn: usize,
    pub maps_built: u32,
    pub theme: usize,
    pub scroll: (i32, i32),
    pub map_mode: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hardware::HeadlessDisplay;
    use crate::input::MouseSample;
    use crate::sprites::BankInfo;
    use pretty_assertions::assert_eq;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    const WORM: BankId = 40;
    const WATER: BankId = 41;

    fn register_theme(engine: &mut Engine, first: BankId, colour: u8) -> usize {
        let banks = &mut engine.banks;
        banks
            .register(first, BankInfo::raw(8, 16, 1), vec![colour; 128])
            .unwrap();
        banks
            .register(first + 1, BankInfo::raw(16, 16, 1), vec![colour + 1; 256])
            .unwrap();
        banks
            .register(first + 2, BankInfo::raw(64, 32, 1), vec![colour + 2; 2048])
            .unwrap();
        banks
            .register(first + 3, BankInfo::raw(16, 8, 1), vec![colour + 3; 128])
            .unwrap();
        let theme = TerrainTheme {
            gradient: first,
            soil: first + 1,
            back: first + 2,
            grass: first + 3,
            water_colour: 0xD3,
        };
        engine.add_theme(theme, vec![colour as u32; 256])
    }

    fn engine() -> Engine {
        let mut engine = Engine::new(EngineConfig::new()).unwrap();
        register_theme(&mut engine, 0, 10);
        register_theme(&mut engine, 4, 20);
        engine
            .banks
            .register(WORM, BankInfo::raw(4, 4, 6), vec![9; 96])
            .unwrap();
        engine
            .banks
            .register(WATER, BankInfo::raw(8, 8, 12), vec![0xD4; 768])
            .unwrap();
        engine.set_water(WATER);
        engine
    }

    fn display() -> HeadlessDisplay {
        HeadlessDisplay::new(640, 480, 1920, 960)
    }

    #[test]
    fn starts_at_the_default_camera() {
        let engine = engine();
        let stats = engine.stats();
        assert_eq!(stats.scroll, (400, 300));
        assert_eq!(stats.frame_count, 0);
        assert!(!stats.map_mode);
        assert_eq!(engine.raster.clip_area(), engine.config().viewport.clip());
    }

    #[test]
    fn invalid_config_is_refused() {
        let config = EngineConfig {
            map_scale: 0,
            ..EngineConfig::new()
        };
        assert!(matches!(Engine::new(config), Err(EngineError::Config(_))));
    }

    #[test]
    fn scroll_is_clamped() {
        let mut engine = engine();
        engine.set_scroll(-10, 5000);
        assert_eq!(engine.scroll(), (0, 600));
        engine.set_scroll(5000, -1);
        assert_eq!(engine.scroll(), (1280, 0));
    }

    #[test]
    fn new_map_paints_both_back_screens() {
        let mut engine = engine();
        let mut display = display();
        let mut rng = StdRng::seed_from_u64(3);
        engine.new_map(&mut display, &mut rng).unwrap();

        assert_eq!(engine.heights().len(), 1920);
        assert_eq!(display.back(), display.reference());
        assert_eq!(display.back().pixel(0, 0), Some(10));
        assert_eq!(display.back().pixel(100, 950), Some(0xD3));
        assert_eq!(display.screen_mode(), ScreenMode::Game);
        assert_eq!(engine.stats().maps_built, 1);
    }

    #[test]
    fn new_map_without_themes_fails() {
        let mut engine = Engine::new(EngineConfig::new()).unwrap();
        let mut rng = StdRng::seed_from_u64(3);
        let err = engine.new_map(&mut display(), &mut rng).unwrap_err();
        assert!(matches!(err, EngineError::NoThemes));
    }

    #[test]
    fn next_theme_wraps_and_loads_its_palette() {
        let mut engine = engine();
        let mut display = display();
        let mut rng = StdRng::seed_from_u64(4);
        engine.next_theme(&mut display, &mut rng).unwrap();
        assert_eq!(engine.theme(), 1);
        assert_eq!(display.palette()[0], 20);
        assert_eq!(display.back().pixel(0, 0), Some(20));
        assert_eq!(display.flips(), 3);

        engine.next_theme(&mut display, &mut rng).unwrap();
        assert_eq!(engine.theme(), 0);
    }

    #[test]
    fn team_spawns_on_dry_ground() {
        let mut engine = engine();
        let mut display = display();
        let mut rng = StdRng::seed_from_u64(5);
        engine.new_map(&mut display, &mut rng).unwrap();

        let team = engine.spawn_team(&mut rng, WORM, 4).unwrap();
        assert_eq!(team.len(), 4);
        for handle in team {
            let sprite = engine.sprites.get(handle).unwrap();
            assert!(sprite.flags().contains(SpriteFlags::WORLD_SPRITE | SpriteFlags::ANIMATED));
            assert!(sprite.world_y as i32 <= 910);
            assert!((15..1905).contains(&(sprite.world_x as i32)));
            assert_eq!(sprite.animation().map(|a| a.frame_count), Some(6));
        }
    }

    #[test]
    fn keys_fire_once_per_press() {
        let mut engine = engine();
        let mut keyboard = KeyboardState::new();
        let mut joypad = JoypadState::new();
        let mouse = MouseState::new(640, 360);

        keyboard.feed(Some(KEY_1));
        let commands = engine.apply_input(&mut keyboard, &mut joypad, &mouse);
        assert_eq!(commands, Commands::TOGGLE_MAP);
        assert_eq!(engine.mode(), RenderMode::MapOverview);

        // still held
        let commands = engine.apply_input(&mut keyboard, &mut joypad, &mouse);
        assert_eq!(commands, Commands::empty());
        assert_eq!(engine.mode(), RenderMode::MapOverview);

        keyboard.feed(Some(KEY_1 | 0x80));
        keyboard.feed(Some(KEY_ESC));
        let commands = engine.apply_input(&mut keyboard, &mut joypad, &mouse);
        assert_eq!(commands, Commands::QUIT);
    }

    #[test]
    fn arrows_and_joypad_scroll() {
        let mut engine = engine();
        let mut keyboard = KeyboardState::new();
        let mut joypad = JoypadState::new();
        let mouse = MouseState::new(640, 360);

        keyboard.feed(Some(KEY_RIGHT));
        engine.apply_input(&mut keyboard, &mut joypad, &mouse);
        assert_eq!(engine.scroll(), (404, 300));

        keyboard.feed(Some(KEY_RIGHT | 0x80));
        joypad.decode((JoypadButtons::UP | JoypadButtons::LEFT).bits());
        engine.apply_input(&mut keyboard, &mut joypad, &mouse);
        assert_eq!(engine.scroll(), (400, 296));
    }

    #[test]
    fn joypad_buttons_map_to_commands() {
        let mut engine = engine();
        let mut keyboard = KeyboardState::new();
        let mut joypad = JoypadState::new();
        let mouse = MouseState::new(640, 360);

        joypad.decode((JoypadButtons::A | JoypadButtons::X).bits());
        let commands = engine.apply_input(&mut keyboard, &mut joypad, &mouse);
        assert_eq!(commands, Commands::NEW_MAP | Commands::TOGGLE_MAP);
        let commands = engine.apply_input(&mut keyboard, &mut joypad, &mouse);
        assert_eq!(commands, Commands::empty());

        joypad.decode(JoypadButtons::B.bits());
        let commands = engine.apply_input(&mut keyboard, &mut joypad, &mouse);
        assert_eq!(commands, Commands::QUIT);
    }

    #[test]
    fn pointer_at_the_edge_scrolls() {
        let mut engine = engine();
        let mut keyboard = KeyboardState::new();
        let mut joypad = JoypadState::new();
        let mut mouse = MouseState::new(640, 360);

        mouse.set_pointer(0, 180);
        engine.apply_input(&mut keyboard, &mut joypad, &mouse);
        // pointer clamps to 1: 12 * 49 / 50
        assert_eq!(engine.scroll(), (400 - 11, 300));

        mouse.set_pointer(320, 180);
        engine.apply_input(&mut keyboard, &mut joypad, &mouse);
        assert_eq!(engine.scroll(), (389, 300));
    }

    #[test]
    fn clicking_the_map_moves_the_camera() {
        let mut engine = engine();
        let mut keyboard = KeyboardState::new();
        let mut joypad = JoypadState::new();
        let mut mouse = MouseState::new(640, 360);
        engine.toggle_map();

        mouse.set_pointer(320, 180);
        mouse.update(MouseSample {
            left: true,
            ..MouseSample::default()
        });
        engine.apply_input(&mut keyboard, &mut joypad, &mouse);
        assert_eq!(engine.scroll(), (960 - 320, 480 - 160));
    }

    #[test]
    fn right_click_requests_the_next_theme() {
        let mut engine = engine();
        let mut display = display();
        let mut rng = StdRng::seed_from_u64(6);
        let mut keyboard = KeyboardState::new();
        let mut joypad = JoypadState::new();
        let mut mouse = MouseState::new(640, 360);

        mouse.update(MouseSample {
            right: true,
            ..MouseSample::default()
        });
        mouse.update(MouseSample::default());
        let commands = engine.apply_input(&mut keyboard, &mut joypad, &mouse);
        assert!(commands.contains(Commands::NEXT_THEME));

        let quit = engine.perform(commands, &mut display, &mut rng).unwrap();
        assert!(!quit);
        assert_eq!(engine.theme(), 1);
    }

    #[test]
    fn frames_draw_terrain_sprites_and_water() {
        let mut engine = engine();
        let mut display = display();
        let mut rng = StdRng::seed_from_u64(7);
        engine.new_map(&mut display, &mut rng).unwrap();
        let handle = engine
            .sprites
            .add(&engine.banks, WORM, 0, 0, 0, 0, None)
            .unwrap();
        engine.sprites.set_position(handle, 100, 100).unwrap();

        engine.run_frames(&mut display, 5);
        let stats = engine.stats();
        assert_eq!(stats.frame_count, 5);
        assert_eq!(stats.sprites_drawn, 1);
        assert_eq!(display.flips(), 5);
        assert_eq!(display.vbl_count(), 5);

        let shown = display.shown();
        // terrain in the viewport, nothing above it
        assert_eq!(shown.pixel(0, 42), display.back().pixel(400, 300));
        assert_eq!(shown.pixel(0, 0), Some(0));
        // screen sprite centred on its position
        assert_eq!(shown.pixel(98, 98), Some(9));
    }

    #[test]
    fn overview_frame_draws_the_marker() {
        let mut engine = engine();
        let mut display = display();
        let mut rng = StdRng::seed_from_u64(8);
        engine.new_map(&mut display, &mut rng).unwrap();
        engine.toggle_map();

        engine.step_frame(&mut display);
        assert!(engine.stats().map_mode);
        let shown = display.shown();
        let (sx, sy) = (400 / 3, 300 / 3 + OVERVIEW_TOP);
        assert_eq!(shown.pixel(sx, sy), Some(MARKER_COLOUR));
        assert_eq!(shown.pixel(sx + 212, sy), Some(MARKER_COLOUR));
        assert_eq!(shown.pixel(sx, sy + 118), Some(MARKER_COLOUR));
        assert_eq!(engine.raster.clip_area(), engine.config().viewport.clip());
    }

    #[test]
    fn overview_sprites_follow_the_map_scale() {
        let config = EngineConfig {
            map_scale: 2,
            overview_origin: (0, OVERVIEW_TOP),
            ..EngineConfig::new()
        };
        let mut engine = Engine::new(config).unwrap();
        register_theme(&mut engine, 0, 10);
        engine
            .banks
            .register(WORM, BankInfo::raw(4, 4, 1), vec![9; 16])
            .unwrap();
        let handle = engine
            .sprites
            .add(&engine.banks, WORM, 600, 600, 0, 0, None)
            .unwrap();
        engine
            .sprites
            .set_flags(handle, SpriteFlags::WORLD_SPRITE)
            .unwrap();
        assert_eq!(engine.raster.map_scale(), 2);

        let mut display = display();
        engine.toggle_map();
        engine.step_frame(&mut display);

        // the world point sits at (600 / 2, 600 / 2 + top) like the terrain under it
        let shown = display.shown();
        assert_eq!(shown.pixel(299, 369), Some(9));
        assert_eq!(shown.pixel(300, 370), Some(9));
        assert_eq!(shown.pixel(301, 371), Some(0));
    }
}
