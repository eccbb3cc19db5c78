//! Sprite instance manager.
//!
//! A fixed pool of sprite instances, addressed by [`SpriteHandle`]s. Handles
//! go through a separate handle table so the table can be compacted without
//! invalidating the handles callers hold.

use bitflags::bitflags;
use log::{debug, warn};
use thiserror::Error;

use crate::core::Framebuffer;
use crate::sprites::{BankId, BankStore, Rasterizer, SpriteError};
use crate::sprites::raster::MAP_SCALE;

/// Default pool size.
pub const MAX_SPRITES: usize = 256;

bitflags! {
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub struct SpriteFlags: u32 {
        const ACTIVE       = 0x8000_0000;
        const ON_SCREEN    = 0x4000_0000;
        const PAUSED       = 0x2000_0000;
        const DELETE_ME    = 0x1000_0000;
        const COLLIDABLE   = 0x0800_0000;
        const VISIBLE      = 0x0400_0000;
        const ANIMATED     = 0x0200_0000;
        const FLIPPED      = 0x0100_0000;
        const WORLD_SPRITE = 0x0080_0000;
    }
}

bitflags! {
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub struct HandleFlags: u16 {
        const INITIALIZED = 0x0001;
        const ASSIGNED    = 0x0002;
        const LOCKED      = 0x0004;
    }
}

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum ManagerError {
    #[error("handle {0:?} no longer refers to a sprite")]
    StaleHandle(SpriteHandle),
    #[error("sprite {0} is not active")]
    InactiveSprite(u16),
    #[error("handle {0:?} is locked")]
    HandleLocked(SpriteHandle),
    #[error("animation needs at least one frame")]
    EmptyAnimation,
    #[error("animation has {frame_count} steps but only {table_len} frame entries")]
    FrameTableTooShort { frame_count: u16, table_len: usize },
}

/// Caller-held reference to a pooled sprite.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SpriteHandle {
    key: u16,
    generation: u32,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AnimType {
    None,
    Loop,
    PingPong,
    Once,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Animation {
    pub id: u16,
    pub kind: AnimType,
    pub frame_count: u16,
    pub current: u16,
    forward: bool,
    frames: Option<Vec<u16>>,
}

impl Animation {
    fn advance(&mut self) {
        let last = self.frame_count.saturating_sub(1);
        match self.kind {
            AnimType::None => {}
            AnimType::Loop => {
                self.current += 1;
                if self.current >= self.frame_count {
                    self.current = 0;
                }
            }
            AnimType::PingPong => {
                if last == 0 {
                    self.current = 0;
                } else if self.forward {
                    if self.current >= last {
                        self.forward = false;
                        self.current = last - 1;
                    } else {
                        self.current += 1;
                    }
                } else if self.current == 0 {
                    self.forward = true;
                    self.current = 1;
                } else {
                    self.current -= 1;
                }
            }
            AnimType::Once => {
                if self.current < last {
                    self.current += 1;
                }
            }
        }
    }

    /// Bank frame for the current step.
    pub fn frame(&self) -> u16 {
        match &self.frames {
            Some(table) => table.get(self.current as usize).copied().unwrap_or(0),
            None => self.current,
        }
    }
}

/// One pooled sprite.
#[derive(Clone, Debug)]
pub struct SpriteInstance {
    id: u16,
    flags: SpriteFlags,
    key: Option<u16>,
    animation: Option<Animation>,
    pub bank: BankId,
    pub frame: u16,
    pub group: u16,
    pub z: u8,
    pub screen_x: i32,
    pub screen_y: i32,
    pub world_x: f32,
    pub world_y: f32,
    pub width: u16,
    pub height: u16,
}

impl SpriteInstance {
    fn empty(id: u16) -> Self {
        Self {
            id,
            flags: SpriteFlags::empty(),
            key: None,
            animation: None,
            bank: 0,
            frame: 0,
            group: 0,
            z: 0,
            screen_x: 0,
            screen_y: 0,
            world_x: 0.0,
            world_y: 0.0,
            width: 0,
            height: 0,
        }
    }

    /// Pool slot this sprite occupies.
    pub fn id(&self) -> u16 {
        self.id
    }

    pub fn flags(&self) -> SpriteFlags {
        self.flags
    }

    /// Set flags. `ACTIVE` is owned by the manager and ignored here.
    pub fn insert_flags(&mut self, flags: SpriteFlags) {
        self.flags |= flags - SpriteFlags::ACTIVE;
    }

    /// Clear flags. `ACTIVE` is owned by the manager and ignored here.
    pub fn remove_flags(&mut self, flags: SpriteFlags) {
        self.flags &= !(flags - SpriteFlags::ACTIVE);
    }

    pub fn is_active(&self) -> bool {
        self.flags.contains(SpriteFlags::ACTIVE)
    }

    pub fn animation(&self) -> Option<&Animation> {
        self.animation.as_ref()
    }

    pub fn set_position(&mut self, x: i32, y: i32) {
        self.screen_x = x;
        self.screen_y = y;
        self.world_x = x as f32;
        self.world_y = y as f32;
    }
}

/// Per-frame behaviour attached to a sprite.
pub trait SpriteControl {
    fn control(&mut self, sprite: &mut SpriteInstance);
}

impl<F> SpriteControl for F
where
    F: FnMut(&mut SpriteInstance),
{
    fn control(&mut self, sprite: &mut SpriteInstance) {
        self(sprite)
    }
}

/// Which render target the pool is drawn to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RenderMode {
    Normal,
    MapOverview,
}

#[derive(Clone, Copy, Debug)]
struct HandleRecord {
    flags: HandleFlags,
    key: u16,
    sprite: u16,
}

#[derive(Clone, Copy, Debug, Default)]
struct KeyEntry {
    generation: u32,
    record: Option<u16>,
}

pub struct SpriteManager {
    sprites: Vec<SpriteInstance>,
    controls: Vec<Option<Box<dyn SpriteControl>>>,
    handles: Vec<HandleRecord>,
    keys: Vec<KeyEntry>,
    count: usize,
    overview_origin: (i32, i32),
    map_scale: i32,
}

impl SpriteManager {
    pub fn new() -> Self {
        Self::with_capacity(MAX_SPRITES)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.min(u16::MAX as usize);
        Self {
            sprites: (0..capacity as u16).map(SpriteInstance::empty).collect(),
            controls: (0..capacity).map(|_| None).collect(),
            handles: (0..capacity as u16)
                .map(|key| HandleRecord {
                    flags: HandleFlags::INITIALIZED,
                    key,
                    sprite: 0,
                })
                .collect(),
            keys: vec![KeyEntry::default(); capacity],
            count: 0,
            overview_origin: (20, 76),
            map_scale: MAP_SCALE,
        }
    }

    pub fn capacity(&self) -> usize {
        self.sprites.len()
    }

    /// Number of active sprites.
    pub fn count(&self) -> usize {
        self.count
    }

    /// Screen position the top-left of the world maps to in overview mode.
    pub fn set_overview_origin(&mut self, x: i32, y: i32) {
        self.overview_origin = (x, y);
    }

    /// Position divisor for overview drawing. Keep it equal to the
    /// rasterizer's map scale. Values below 1 are treated as 1.
    pub fn set_map_scale(&mut self, scale: i32) {
        self.map_scale = scale.max(1);
    }

    /// Place a sprite in the first free slot. `None` when the pool is full.
    #[allow(clippy::too_many_arguments)]
    pub fn add(
        &mut self,
        banks: &BankStore,
        bank: BankId,
        x: i32,
        y: i32,
        group: u16,
        z: u8,
        control: Option<Box<dyn SpriteControl>>,
    ) -> Option<SpriteHandle> {
        if self.count >= self.capacity() {
            warn!("sprite pool full ({} sprites), dropping bank {}", self.count, bank);
            return None;
        }
        let slot = self.sprites.iter().position(|s| !s.is_active())?;
        let record = self
            .handles
            .iter()
            .position(|h| !h.flags.contains(HandleFlags::ASSIGNED))?;
        let key = self.keys.iter().position(|k| k.record.is_none())?;

        let sprite = &mut self.sprites[slot];
        *sprite = SpriteInstance::empty(slot as u16);
        sprite.bank = bank;
        sprite.group = group;
        sprite.z = z;
        sprite.set_position(x, y);
        sprite.width = banks.width(bank);
        sprite.height = banks.height(bank);
        sprite.flags = SpriteFlags::ACTIVE | SpriteFlags::ON_SCREEN | SpriteFlags::VISIBLE;
        sprite.key = Some(key as u16);
        self.controls[slot] = control;
        self.count += 1;

        self.handles[record] = HandleRecord {
            flags: HandleFlags::INITIALIZED | HandleFlags::ASSIGNED,
            key: key as u16,
            sprite: slot as u16,
        };
        let entry = &mut self.keys[key];
        entry.record = Some(record as u16);

        Some(SpriteHandle {
            key: key as u16,
            generation: entry.generation,
        })
    }

    fn record(&self, handle: SpriteHandle) -> Result<usize, ManagerError> {
        let entry = self
            .keys
            .get(handle.key as usize)
            .ok_or(ManagerError::StaleHandle(handle))?;
        match entry.record {
            Some(record) if entry.generation == handle.generation => Ok(record as usize),
            _ => Err(ManagerError::StaleHandle(handle)),
        }
    }

    fn slot(&self, handle: SpriteHandle) -> Result<usize, ManagerError> {
        let record = self.handles[self.record(handle)?];
        let slot = record.sprite as usize;
        if !self.sprites[slot].is_active() {
            return Err(ManagerError::InactiveSprite(record.sprite));
        }
        Ok(slot)
    }

    pub fn get(&self, handle: SpriteHandle) -> Option<&SpriteInstance> {
        let slot = self.slot(handle).ok()?;
        Some(&self.sprites[slot])
    }

    pub fn get_mut(&mut self, handle: SpriteHandle) -> Option<&mut SpriteInstance> {
        let slot = self.slot(handle).ok()?;
        Some(&mut self.sprites[slot])
    }

    fn with_sprite<F>(&mut self, handle: SpriteHandle, f: F) -> Result<(), ManagerError>
    where
        F: FnOnce(&mut SpriteInstance),
    {
        let slot = self.slot(handle)?;
        f(&mut self.sprites[slot]);
        Ok(())
    }

    /// Attach an animation. With `frames`, step `n` draws bank frame `frames[n]`.
    pub fn add_animation(
        &mut self,
        handle: SpriteHandle,
        id: u16,
        kind: AnimType,
        frame_count: u16,
        frames: Option<Vec<u16>>,
    ) -> Result<(), ManagerError> {
        if frame_count == 0 {
            return Err(ManagerError::EmptyAnimation);
        }
        if let Some(table) = &frames {
            if table.len() < frame_count as usize {
                return Err(ManagerError::FrameTableTooShort {
                    frame_count,
                    table_len: table.len(),
                });
            }
        }
        self.with_sprite(handle, |sprite| {
            let animation = Animation {
                id,
                kind,
                frame_count,
                current: 0,
                forward: true,
                frames,
            };
            sprite.frame = animation.frame();
            sprite.animation = Some(animation);
            sprite.flags |= SpriteFlags::ANIMATED;
        })
    }

    /// Advance animations, run control callbacks, then remove sprites flagged
    /// `DELETE_ME`. Returns the number of active sprites visited.
    pub fn update(&mut self) -> usize {
        let mut visited = 0;
        for slot in 0..self.sprites.len() {
            if visited == self.count {
                break;
            }
            let sprite = &mut self.sprites[slot];
            if !sprite.is_active() {
                continue;
            }
            visited += 1;

            if sprite.flags.contains(SpriteFlags::ANIMATED)
                && !sprite.flags.contains(SpriteFlags::PAUSED)
            {
                if let Some(animation) = sprite.animation.as_mut() {
                    animation.advance();
                    sprite.frame = animation.frame();
                }
            }
            if let Some(control) = self.controls[slot].as_mut() {
                control.control(sprite);
            }
        }

        let doomed: Vec<usize> = self
            .sprites
            .iter()
            .enumerate()
            .filter(|(_, s)| s.is_active() && s.flags.contains(SpriteFlags::DELETE_ME))
            .map(|(slot, _)| slot)
            .collect();
        for slot in doomed {
            if self.owner_locked(slot) {
                debug!("sprite {} flagged for deletion but its handle is locked", slot);
                continue;
            }
            self.release(slot);
        }

        visited
    }

    fn owner_locked(&self, slot: usize) -> bool {
        self.sprites[slot]
            .key
            .and_then(|key| self.keys[key as usize].record)
            .is_some_and(|record| self.handles[record as usize].flags.contains(HandleFlags::LOCKED))
    }

    fn release(&mut self, slot: usize) {
        if let Some(key) = self.sprites[slot].key.take() {
            let entry = &mut self.keys[key as usize];
            if let Some(record) = entry.record.take() {
                self.handles[record as usize].flags = HandleFlags::INITIALIZED;
            }
            entry.generation = entry.generation.wrapping_add(1);
        }
        self.sprites[slot].flags = SpriteFlags::empty();
        self.sprites[slot].animation = None;
        self.controls[slot] = None;
        self.count -= 1;
    }

    /// Deactivate the sprite and free its slot and handle.
    pub fn remove(&mut self, handle: SpriteHandle) -> Result<(), ManagerError> {
        let record = self.record(handle)?;
        if self.handles[record].flags.contains(HandleFlags::LOCKED) {
            return Err(ManagerError::HandleLocked(handle));
        }
        let slot = self.slot(handle)?;
        self.release(slot);
        Ok(())
    }

    pub fn lock(&mut self, handle: SpriteHandle) -> Result<(), ManagerError> {
        let record = self.record(handle)?;
        self.handles[record].flags |= HandleFlags::LOCKED;
        Ok(())
    }

    pub fn unlock(&mut self, handle: SpriteHandle) -> Result<(), ManagerError> {
        let record = self.record(handle)?;
        self.handles[record].flags -= HandleFlags::LOCKED;
        Ok(())
    }

    pub fn handle_flags(&self, handle: SpriteHandle) -> Option<HandleFlags> {
        let record = self.record(handle).ok()?;
        Some(self.handles[record].flags)
    }

    /// Draw every active, visible sprite in ascending z order, centred on its
    /// position. Returns how many were drawn.
    pub fn draw(
        &self,
        raster: &Rasterizer,
        banks: &BankStore,
        target: &mut Framebuffer,
        scroll: (i32, i32),
        mode: RenderMode,
    ) -> usize {
        let mut order: Vec<&SpriteInstance> = self
            .sprites
            .iter()
            .filter(|s| s.is_active() && s.flags.contains(SpriteFlags::VISIBLE))
            .collect();
        order.sort_by_key(|s| s.z);

        let mut drawn = 0;
        for sprite in order {
            let world = sprite.flags.contains(SpriteFlags::WORLD_SPRITE);
            let flipped = sprite.flags.contains(SpriteFlags::FLIPPED);
            let frame = sprite.frame as u32;

            let result: Result<(), SpriteError> = match mode {
                RenderMode::Normal => {
                    let (x, y) = if world {
                        (
                            (sprite.world_x - scroll.0 as f32) as i32,
                            (sprite.world_y - scroll.1 as f32) as i32,
                        )
                    } else {
                        (sprite.screen_x, sprite.screen_y)
                    };
                    let x = x.saturating_sub(sprite.width as i32 / 2);
                    let y = y.saturating_sub(sprite.height as i32 / 2);
                    if flipped {
                        raster.draw_flipped(banks, target, sprite.bank, frame, x, y)
                    } else {
                        raster.draw(banks, target, sprite.bank, frame, x, y)
                    }
                }
                RenderMode::MapOverview => {
                    let (x, y) = if world {
                        (sprite.world_x as i32, sprite.world_y as i32)
                    } else {
                        (sprite.screen_x, sprite.screen_y)
                    };
                    let scale = self.map_scale;
                    let x = (x / scale)
                        .saturating_add(self.overview_origin.0)
                        .saturating_sub(sprite.width as i32 / scale / 2);
                    let y = (y / scale)
                        .saturating_add(self.overview_origin.1)
                        .saturating_sub(sprite.height as i32 / scale / 2);
                    if flipped {
                        raster.draw_map_flipped(banks, target, sprite.bank, frame, x, y)
                    } else {
                        raster.draw_map(banks, target, sprite.bank, frame, x, y)
                    }
                }
            };
            if result.is_ok() {
                drawn += 1;
            }
        }
        drawn
    }

    pub fn set_position(&mut self, handle: SpriteHandle, x: i32, y: i32) -> Result<(), ManagerError> {
        self.with_sprite(handle, |sprite| sprite.set_position(x, y))
    }

    pub fn flip_sprite(&mut self, handle: SpriteHandle, flipped: bool) -> Result<(), ManagerError> {
        self.with_sprite(handle, |sprite| sprite.flags.set(SpriteFlags::FLIPPED, flipped))
    }

    pub fn set_flags(&mut self, handle: SpriteHandle, flags: SpriteFlags) -> Result<(), ManagerError> {
        self.with_sprite(handle, |sprite| sprite.insert_flags(flags))
    }

    pub fn clear_flags(&mut self, handle: SpriteHandle, flags: SpriteFlags) -> Result<(), ManagerError> {
        self.with_sprite(handle, |sprite| sprite.remove_flags(flags))
    }

    /// Frame count of the sprite's bank, 0 for a stale handle.
    pub fn total_frames(&self, banks: &BankStore, handle: SpriteHandle) -> u32 {
        self.get(handle)
            .map(|sprite| banks.frame_count(sprite.bank))
            .unwrap_or(0)
    }

    /// Slide assigned handle records to the front of the table, keeping order.
    pub fn compress_handles(&mut self) {
        let mut next = 0;
        let mut moved = 0;
        for i in 0..self.handles.len() {
            let record = self.handles[i];
            if !record.flags.contains(HandleFlags::ASSIGNED) {
                continue;
            }
            if i != next {
                self.handles[next] = record;
                self.handles[i].flags = HandleFlags::INITIALIZED;
                self.keys[record.key as usize].record = Some(next as u16);
                moved += 1;
            }
            next += 1;
        }
        debug!("compacted handle table: {} live, {} moved", next, moved);
    }

    /// Active sprites in slot order.
    pub fn iter(&self) -> impl Iterator<Item = &SpriteInstance> {
        self.sprites.iter().filter(|s| s.is_active())
    }
}

impl Default for SpriteManager {
    fn default() -> Self {
        Self::new()
    }
}
