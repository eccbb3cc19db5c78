use log::{debug, warn};

use super::codec::{CompressedLayout, Segments};
use super::{MAX_SPRITE_BANKS, SpriteError};

/// Index into the bank table.
pub type BankId = u32;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Encoding {
    /// `width * height` palette bytes per frame, frames back to back.
    Raw,
    /// Run-length rows behind a header and offset table.
    Compressed,
}

/// Shape of a bank, supplied at registration.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BankInfo {
    pub encoding: Encoding,
    pub resource_id: u32,
    pub frame_count: u32,
    pub width: u16,
    pub height: u16,
}

impl BankInfo {
    pub fn raw(width: u16, height: u16, frame_count: u32) -> Self {
        Self {
            encoding: Encoding::Raw,
            resource_id: 0,
            frame_count,
            width,
            height,
        }
    }

    pub fn compressed(width: u16, height: u16, frame_count: u32) -> Self {
        Self {
            encoding: Encoding::Compressed,
            ..Self::raw(width, height, frame_count)
        }
    }

    pub fn with_resource_id(mut self, resource_id: u32) -> Self {
        self.resource_id = resource_id;
        self
    }

    fn raw_frame_len(&self) -> usize {
        self.width as usize * self.height as usize
    }
}

/// Tight box around the opaque pixels of a frame. Edges are inclusive.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FrameBounds {
    pub left: i32,
    pub top: i32,
    pub right: i32,
    pub bottom: i32,
}

impl FrameBounds {
    fn point(x: i32, y: i32) -> Self {
        Self {
            left: x,
            top: y,
            right: x,
            bottom: y,
        }
    }

    fn include(&mut self, x: i32, y: i32) {
        self.left = self.left.min(x);
        self.right = self.right.max(x);
        self.top = self.top.min(y);
        self.bottom = self.bottom.max(y);
    }

    pub fn width(&self) -> i32 {
        self.right - self.left + 1
    }

    pub fn height(&self) -> i32 {
        self.bottom - self.top + 1
    }
}

/// A registered bank of same-sized frames.
#[derive(Clone, Debug)]
pub struct SpriteBank {
    id: BankId,
    info: BankInfo,
    data: Vec<u8>,
    layout: Option<CompressedLayout>,
}

impl SpriteBank {
    pub fn id(&self) -> BankId {
        self.id
    }

    pub fn encoding(&self) -> Encoding {
        self.info.encoding
    }

    pub fn resource_id(&self) -> u32 {
        self.info.resource_id
    }

    pub fn width(&self) -> u16 {
        self.info.width
    }

    pub fn height(&self) -> u16 {
        self.info.height
    }

    pub fn frame_count(&self) -> u32 {
        self.info.frame_count
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub(crate) fn check_frame(&self, frame: u32) -> Result<(), SpriteError> {
        if frame >= self.info.frame_count {
            return Err(SpriteError::FrameOutOfRange {
                bank: self.id,
                frame,
            });
        }
        Ok(())
    }

    /// Palette bytes of one frame of a raw bank.
    pub fn raw_frame(&self, frame: u32) -> Option<&[u8]> {
        if self.info.encoding != Encoding::Raw || frame >= self.info.frame_count {
            return None;
        }
        let len = self.info.raw_frame_len();
        let start = frame as usize * len;
        self.data.get(start..start + len)
    }

    /// Row segments of one frame of a compressed bank.
    pub fn segments(&self, frame: u32) -> Result<Segments<'_>, SpriteError> {
        self.check_frame(frame)?;
        let start = self
            .layout
            .as_ref()
            .and_then(|layout| layout.frame_start(frame as usize))
            .ok_or(SpriteError::FrameOutOfRange {
                bank: self.id,
                frame,
            })?;
        Ok(Segments::new(&self.data, start))
    }

    fn malformed(&self, source: super::CodecError) -> SpriteError {
        SpriteError::Malformed {
            bank: self.id,
            source,
        }
    }

    fn bounds(&self, frame: u32) -> Result<Option<FrameBounds>, SpriteError> {
        self.check_frame(frame)?;
        let mut bounds: Option<FrameBounds> = None;
        let mut include = |x: i32, y: i32| match bounds.as_mut() {
            Some(b) => b.include(x, y),
            None => bounds = Some(FrameBounds::point(x, y)),
        };

        match self.info.encoding {
            Encoding::Raw => {
                let width = self.info.width as usize;
                let pixels = self.raw_frame(frame).ok_or(SpriteError::FrameOutOfRange {
                    bank: self.id,
                    frame,
                })?;
                if width == 0 {
                    return Ok(None);
                }
                for (row, line) in pixels.chunks_exact(width).enumerate() {
                    for (col, &p) in line.iter().enumerate() {
                        if p != 0 {
                            include(col as i32, row as i32);
                        }
                    }
                }
            }
            Encoding::Compressed => {
                for segment in self.segments(frame)? {
                    let segment = segment.map_err(|e| self.malformed(e))?;
                    let run = &self.data[segment.pixels];
                    for (i, &p) in run.iter().enumerate() {
                        if p != 0 {
                            include(segment.x + i as i32, segment.row as i32);
                        }
                    }
                }
            }
        }

        Ok(bounds)
    }

    fn remap(&mut self, shift: u8) -> Result<(), SpriteError> {
        match self.info.encoding {
            Encoding::Raw => {
                let end = self.info.raw_frame_len() * self.info.frame_count as usize;
                for p in self.data[..end].iter_mut().filter(|p| **p != 0) {
                    *p = p.wrapping_add(shift);
                }
            }
            Encoding::Compressed => {
                let starts = self
                    .layout
                    .as_ref()
                    .map(CompressedLayout::distinct_starts)
                    .unwrap_or_default();
                let mut runs = Vec::new();
                for start in starts {
                    for segment in Segments::new(&self.data, start) {
                        runs.push(segment.map_err(|e| self.malformed(e))?.pixels);
                    }
                }
                for run in runs {
                    for p in self.data[run].iter_mut().filter(|p| **p != 0) {
                        *p = p.wrapping_add(shift);
                    }
                }
            }
        }
        Ok(())
    }
}

/// Fixed-capacity table of sprite banks, addressed by [`BankId`].
pub struct BankStore {
    banks: Vec<Option<SpriteBank>>,
}

impl BankStore {
    pub fn new() -> Self {
        Self::with_capacity(MAX_SPRITE_BANKS)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            banks: vec![None; capacity],
        }
    }

    pub fn capacity(&self) -> usize {
        self.banks.len()
    }

    /// Register `data` under `id`. The bank takes ownership of the bytes.
    pub fn register(&mut self, id: BankId, info: BankInfo, data: Vec<u8>) -> Result<(), SpriteError> {
        let slot = self
            .banks
            .get(id as usize)
            .ok_or(SpriteError::BankOutOfRange(id))?;
        if slot.is_some() {
            return Err(SpriteError::AlreadyRegistered(id));
        }
        if data.is_empty() {
            return Err(SpriteError::EmptyData(id));
        }

        let layout = match info.encoding {
            Encoding::Raw => {
                let needed = info.raw_frame_len() * info.frame_count as usize;
                if data.len() < needed {
                    return Err(SpriteError::DataTooShort {
                        bank: id,
                        needed,
                        actual: data.len(),
                    });
                }
                None
            }
            Encoding::Compressed => Some(
                CompressedLayout::parse(&data, info.frame_count as usize)
                    .map_err(|source| SpriteError::Malformed { bank: id, source })?,
            ),
        };

        debug!(
            "registered bank {} ({:?}, {}x{}, {} frames, {} bytes)",
            id,
            info.encoding,
            info.width,
            info.height,
            info.frame_count,
            data.len()
        );
        self.banks[id as usize] = Some(SpriteBank {
            id,
            info,
            data,
            layout,
        });
        Ok(())
    }

    /// Drop a bank, returning its data.
    pub fn unregister(&mut self, id: BankId) -> Option<Vec<u8>> {
        self.banks
            .get_mut(id as usize)
            .and_then(Option::take)
            .map(|bank| bank.data)
    }

    pub fn is_registered(&self, id: BankId) -> bool {
        matches!(self.banks.get(id as usize), Some(Some(_)))
    }

    pub fn get(&self, id: BankId) -> Result<&SpriteBank, SpriteError> {
        self.banks
            .get(id as usize)
            .ok_or(SpriteError::BankOutOfRange(id))?
            .as_ref()
            .ok_or(SpriteError::BankNotRegistered(id))
    }

    fn get_mut(&mut self, id: BankId) -> Result<&mut SpriteBank, SpriteError> {
        self.banks
            .get_mut(id as usize)
            .ok_or(SpriteError::BankOutOfRange(id))?
            .as_mut()
            .ok_or(SpriteError::BankNotRegistered(id))
    }

    /// Declared frame width, or 0 for an unknown bank.
    pub fn width(&self, id: BankId) -> u16 {
        self.get(id).map(SpriteBank::width).unwrap_or(0)
    }

    /// Declared frame height, or 0 for an unknown bank.
    pub fn height(&self, id: BankId) -> u16 {
        self.get(id).map(SpriteBank::height).unwrap_or(0)
    }

    pub fn frame_count(&self, id: BankId) -> u32 {
        self.get(id).map(SpriteBank::frame_count).unwrap_or(0)
    }

    /// Opaque bounding box of a frame. `Ok(None)` for a fully transparent frame.
    pub fn frame_dimensions(&self, id: BankId, frame: u32) -> Result<Option<FrameBounds>, SpriteError> {
        self.get(id)?.bounds(frame)
    }

    /// Add `shift` (mod 256) to every opaque palette index in the bank.
    pub fn remap(&mut self, id: BankId, shift: u8) -> Result<(), SpriteError> {
        let bank = self.get_mut(id)?;
        if let Err(e) = bank.remap(shift) {
            warn!("remap of bank {} failed: {}", id, e);
            return Err(e);
        }
        debug!("remapped bank {} by {}", id, shift);
        Ok(())
    }

    /// Registered banks in id order.
    pub fn iter(&self) -> impl Iterator<Item = &SpriteBank> {
        self.banks.iter().flatten()
    }
}

impl Default for BankStore {
    fn default() -> Self {
        Self::new()
    }
}
