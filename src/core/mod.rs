// Copyright (C) 2025 Dayton Fishell
// AmiWorms Sprite Engine
// This file is part of AmiWorms.
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version. See the LICENSE file in the project root for details.
// SPDX-License-Identifier: GPL-3.0-or-later

pub mod framebuffer;

// Re-export commonly used core types here
pub use framebuffer::Framebuffer;

/// Reverse the byte order of a 32-bit value.
pub const fn swap_long(value: u32) -> u32 {
    value.swap_bytes()
}

/// Decode a frame offset as stored in a compressed bank's offset table.
///
/// Offsets are stored little-endian. A big-endian read followed by
/// [`swap_long`] gives the same value.
pub fn read_stored_offset(bytes: [u8; 4]) -> u32 {
    u32::from_le_bytes(bytes)
}
