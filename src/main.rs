// Copyright (C) 2025 Dayton Fishell
// AmiWorms Sprite Engine
// This file is part of AmiWorms.
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version. See the LICENSE file in the project root for details.
// SPDX-License-Identifier: GPL-3.0-or-later

// Headless demo: synthetic sprite groups, a team of worms on generated
// terrain, and a scripted run through the game and map views.
use amiworms_core::engine::{KEY_1, KEY_3, KEY_ESC, KEY_RIGHT};
use amiworms_core::sprites::codec::encode_frames;
use amiworms_core::{
    BankId, BankInfo, Display, Engine, EngineConfig, HeadlessDisplay, JoypadState, KeyboardState,
    MouseState, ResourceGroups, TerrainTheme,
};
use anyhow::{Context, Result, anyhow};
use rand::SeedableRng;
use rand::rngs::StdRng;

const THEMES: usize = 3;
const TEAM_SIZE: usize = 4;
const WORM_FRAMES: usize = 6;
const WORM_SIZE: usize = 16;
const WATER_FRAMES: u32 = 12;
const DEMO_FRAMES: u64 = 600;
const GAME_SEED: u64 = 654_321;

fn load_config() -> Result<EngineConfig> {
    #[cfg(feature = "serde-spec")]
    if let Some(path) = std::env::args().nth(1) {
        let text =
            std::fs::read_to_string(&path).with_context(|| format!("reading config {path}"))?;
        let config = if path.ends_with(".json") {
            EngineConfig::from_json_str(&text)
        } else {
            EngineConfig::from_yaml_str(&text)
        }
        .with_context(|| format!("parsing config {path}"))?;
        return Ok(config);
    }
    Ok(EngineConfig::default())
}

/// One frame of a round worm, shaded from the outline inwards.
fn worm_frame(phase: usize) -> Vec<u8> {
    let c = WORM_SIZE as i32 / 2;
    let mut pixels = vec![0u8; WORM_SIZE * WORM_SIZE];
    for y in 0..WORM_SIZE as i32 {
        for x in 0..WORM_SIZE as i32 {
            let d = (x - c) * (x - c) + (y - c - phase as i32 % 2) * (y - c - phase as i32 % 2);
            if d < 36 {
                pixels[(y as usize) * WORM_SIZE + x as usize] = 0x40 + (d / 6) as u8;
            }
        }
    }
    pixels
}

fn theme_palette(theme: usize) -> Vec<u32> {
    (0..256u32)
        .map(|i| {
            let tint = (theme as u32 * 40) & 0xFF;
            (i << 16) | (((i + tint) & 0xFF) << 8) | (255 - i)
        })
        .collect()
}

fn load_assets(engine: &mut Engine, groups: &mut ResourceGroups) -> Result<BankId> {
    let worms = groups.add_group("Worms", 1)?;
    let worm_bank = groups
        .group_start(worms)
        .ok_or_else(|| anyhow!("worm group has no banks"))?;
    let frames: Vec<Vec<u8>> = (0..WORM_FRAMES).map(worm_frame).collect();
    let frame_refs: Vec<&[u8]> = frames.iter().map(Vec::as_slice).collect();
    engine
        .banks
        .register(
            worm_bank,
            BankInfo::compressed(WORM_SIZE as u16, WORM_SIZE as u16, WORM_FRAMES as u32),
            encode_frames(WORM_SIZE, WORM_SIZE, &frame_refs),
        )
        .context("registering worm bank")?;
    engine.banks.remap(worm_bank, 0x10)?;

    let water = groups.add_group("Water", 1)?;
    let water_bank = groups
        .group_start(water)
        .ok_or_else(|| anyhow!("water group has no banks"))?;
    let mut strip = Vec::with_capacity(256 * 16 * WATER_FRAMES as usize);
    for frame in 0..WATER_FRAMES as usize {
        for y in 0..16 {
            for x in 0..256 {
                let wave = ((x + frame * 4) / 16 + y) % 3;
                strip.push(if y < 4 && wave == 0 { 0 } else { 0xD0 + wave as u8 });
            }
        }
    }
    engine
        .banks
        .register(water_bank, BankInfo::raw(256, 16, WATER_FRAMES), strip)
        .context("registering water bank")?;
    engine.set_water(water_bank);

    for theme in 0..THEMES {
        let group = groups.add_group(&format!("Terrain{:02}", theme + 1), 4)?;
        let terrain = TerrainTheme::from_group(groups, group, engine.config().water_colour)
            .ok_or_else(|| anyhow!("terrain group {group} is incomplete"))?;
        let base = 0x20 + theme as u8 * 0x20;

        let gradient: Vec<u8> = (0..960).flat_map(|y| [base + (y / 64) as u8; 8]).collect();
        let soil: Vec<u8> = (0..256 * 256)
            .map(|i| base + 0x10 + ((i % 256) ^ (i / 256)) as u8 % 8)
            .collect();
        let back: Vec<u8> = (0..64 * 128)
            .map(|i| if (i % 128) < 64 - (i / 128) % 64 { 0 } else { base + 0x18 })
            .collect();
        let grass: Vec<u8> = (0..16 * 64)
            .map(|i| if (i % 64) % 3 == 0 && i / 64 < 4 { 0 } else { 0x0A })
            .collect();

        let banks = &mut engine.banks;
        banks.register(terrain.gradient, BankInfo::raw(8, 960, 1), gradient)?;
        banks.register(terrain.soil, BankInfo::raw(256, 256, 1), soil)?;
        banks.register(terrain.back, BankInfo::raw(128, 64, 1), back)?;
        banks.register(terrain.grass, BankInfo::raw(64, 16, 1), grass)?;
        engine.add_theme(terrain, theme_palette(theme));
    }
    Ok(worm_bank)
}

fn main() -> Result<()> {
    env_logger::init();

    println!("AmiWorms Sprite Engine v0.1.0");
    println!("=============================");
    println!();

    let config = load_config()?;
    let mut display = HeadlessDisplay::new(
        config.screen_width,
        config.screen_height,
        config.back_width,
        config.back_height,
    );
    let mut engine = Engine::new(config).context("starting engine")?;
    let mut groups = ResourceGroups::with_limit(engine.config().bank_capacity as u32);
    let worm_bank = load_assets(&mut engine, &mut groups)?;
    println!("Loaded {} banks in {} groups", groups.total(), groups.len());

    let mut rng = StdRng::seed_from_u64(GAME_SEED);
    engine.new_map(&mut display, &mut rng).context("building first map")?;
    display.set_palette(&theme_palette(0));
    let team = engine.spawn_team(&mut rng, worm_bank, TEAM_SIZE)?;
    println!("Spawned {} worms", team.len());
    for handle in &team {
        if let Some(worm) = engine.sprites.get(*handle) {
            println!("  worm at ({:4}, {:3})", worm.world_x, worm.world_y);
        }
    }
    println!();

    let mut keyboard = KeyboardState::new();
    let mut joypad = JoypadState::new();
    // the pointer starts centred, away from the scroll edges
    let mouse = MouseState::new(engine.config().viewport.width, engine.config().viewport.height);

    println!("Running {} frames...", DEMO_FRAMES);
    for frame in 0..DEMO_FRAMES {
        // scripted keys: scroll right, switch theme, show the map, quit
        let key = match frame {
            0 => Some(KEY_RIGHT),
            200 => Some(KEY_RIGHT | 0x80),
            300 => Some(KEY_3),
            301 => Some(KEY_3 | 0x80),
            400 => Some(KEY_1),
            401 => Some(KEY_1 | 0x80),
            f if f == DEMO_FRAMES - 1 => Some(KEY_ESC),
            _ => None,
        };
        keyboard.feed(key);
        joypad.decode(0);

        let commands = engine.apply_input(&mut keyboard, &mut joypad, &mouse);
        if engine.perform(commands, &mut display, &mut rng)? {
            break;
        }
        engine.step_frame(&mut display);
    }

    let stats = engine.stats();
    println!("Run complete!");
    println!();
    println!("Final state:");
    println!("  Frames:          {}", stats.frame_count);
    println!("  Active sprites:  {}", stats.active_sprites);
    println!("  Drawn last frame:{:3}", stats.sprites_drawn);
    println!("  Maps built:      {}", stats.maps_built);
    println!("  Theme:           {}", stats.theme);
    println!("  Scroll:          ({}, {})", stats.scroll.0, stats.scroll.1);
    println!("  Map mode:        {}", stats.map_mode);
    println!("  Display flips:   {}", display.flips());

    Ok(())
}
