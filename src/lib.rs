// Copyright (C) 2025 Dayton Fishell
// AmiWorms Sprite Engine
// This file is part of AmiWorms.
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version. See the LICENSE file in the project root for details.
// SPDX-License-Identifier: GPL-3.0-or-later

//! AmiWorms 2D sprite engine
//!
//! Software rendering for an 8-bit indexed display: sprite banks in raw or
//! run-length encoded form, a clipped rasterizer, a pooled sprite manager,
//! Perlin terrain generation and the frame loop that ties them together.

pub mod config;
pub mod core;
pub mod engine;
pub mod hardware;
pub mod input;
pub mod manager;
pub mod noise;
pub mod resources;
pub mod sprites;
pub mod terrain;

// Re-export commonly used types
pub use config::{ConfigError, EngineConfig, Viewport};
pub use core::Framebuffer;
pub use engine::{Commands, Engine, EngineError, EngineStats};
pub use hardware::{Display, HeadlessDisplay, ScreenMode};
pub use input::{JoypadState, KeyboardState, MouseState};
pub use manager::{AnimType, RenderMode, SpriteFlags, SpriteHandle, SpriteManager};
pub use noise::{HeightmapParams, PerlinNoise};
pub use resources::ResourceGroups;
pub use sprites::{BankId, BankInfo, BankStore, Rasterizer, SpriteError};
pub use terrain::TerrainTheme;
