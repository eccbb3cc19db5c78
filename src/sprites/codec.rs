//! Compressed sprite bank format.
//!
//! A compressed bank is laid out as
//!
//! ```text
//! [12-byte preamble] ... ':' [frame_count x u32 offsets] [frame streams ...]
//! ```
//!
//! Each offset is relative to the end of the offset table. A frame stream is a
//! sequence of row segments: a skip byte (cursor advance before the run), a run
//! length byte and that many palette bytes. `0xC9` in the skip position starts
//! the next row, `0xFF` ends the frame. Palette index 0 is transparent.

use std::ops::Range;

use thiserror::Error;

use crate::core::read_stored_offset;

/// Skip-byte value that moves the cursor to the start of the next row.
pub const ROW_BREAK: u8 = 0xC9;
/// Skip-byte value that terminates a frame stream.
pub const END_OF_FRAME: u8 = 0xFF;
/// Fixed preamble before the search for the header delimiter starts.
pub const HEADER_PREAMBLE: usize = 12;
/// Separates the header from the offset table.
pub const HEADER_DELIMITER: u8 = b':';

const PREAMBLE_TAG: &[u8; HEADER_PREAMBLE] = b"AMIWORMS-SPR";
/// Largest skip that can be stored without colliding with the control bytes.
const MAX_SKIP: usize = ROW_BREAK as usize - 1;
const MAX_RUN: usize = u8::MAX as usize;

/// Structural problems found in a compressed bank.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CodecError {
    #[error("data too short: need {needed} bytes, have {actual}")]
    DataTooShort { needed: usize, actual: usize },
    #[error("header delimiter ':' not found")]
    MissingHeaderDelimiter,
    #[error("frame {frame} offset {offset:#x} points outside the bank")]
    OffsetOutOfRange { frame: usize, offset: u32 },
    #[error("stream overruns the bank at byte {position}")]
    StreamOverrun { position: usize },
}

/// Bounds-checked cursor over an encoded byte stream.
pub struct StreamReader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> StreamReader<'a> {
    pub fn new(data: &'a [u8], pos: usize) -> Self {
        Self { data, pos }
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn at_end(&self) -> bool {
        self.pos >= self.data.len()
    }

    pub fn peek_byte(&self) -> Result<u8, CodecError> {
        self.data
            .get(self.pos)
            .copied()
            .ok_or(CodecError::StreamOverrun { position: self.pos })
    }

    pub fn read_byte(&mut self) -> Result<u8, CodecError> {
        let value = self.peek_byte()?;
        self.pos += 1;
        Ok(value)
    }

    /// Step over `count` bytes, returning the range stepped over.
    pub fn skip(&mut self, count: usize) -> Result<Range<usize>, CodecError> {
        let end = self.pos + count;
        if end > self.data.len() {
            return Err(CodecError::StreamOverrun {
                position: self.data.len(),
            });
        }
        let range = self.pos..end;
        self.pos = end;
        Ok(range)
    }
}

/// One run of literal palette bytes within a frame.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Segment {
    /// Row within the frame, counted in row breaks.
    pub row: u32,
    /// Raw skip byte that preceded the run.
    pub skip: u8,
    /// Column of the first byte of the run, relative to the sprite's left edge.
    pub x: i32,
    /// Location of the run's palette bytes within the bank data.
    pub pixels: Range<usize>,
}

/// Iterator over the segments of one frame stream.
///
/// Stops after the `0xFF` terminator, or after yielding a single error.
pub struct Segments<'a> {
    reader: StreamReader<'a>,
    row: u32,
    x: i32,
    done: bool,
}

impl<'a> Segments<'a> {
    pub fn new(data: &'a [u8], start: usize) -> Self {
        Self {
            reader: StreamReader::new(data, start),
            row: 0,
            x: 0,
            done: false,
        }
    }

    fn next_segment(&mut self) -> Result<Option<Segment>, CodecError> {
        loop {
            match self.reader.read_byte()? {
                END_OF_FRAME => return Ok(None),
                ROW_BREAK => {
                    self.row += 1;
                    self.x = 0;
                }
                skip => {
                    self.x += skip as i32;
                    let count = self.reader.read_byte()? as usize;
                    let pixels = self.reader.skip(count)?;
                    let segment = Segment {
                        row: self.row,
                        skip,
                        x: self.x,
                        pixels,
                    };
                    self.x += count as i32;
                    return Ok(Some(segment));
                }
            }
        }
    }
}

impl Iterator for Segments<'_> {
    type Item = Result<Segment, CodecError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        let item = self.next_segment().transpose();
        if !matches!(item, Some(Ok(_))) {
            self.done = true;
        }
        item
    }
}

/// Decoded offset table of a compressed bank.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CompressedLayout {
    frame_starts: Vec<usize>,
}

impl CompressedLayout {
    /// Locate every frame stream and check that each one terminates inside `data`.
    pub fn parse(data: &[u8], frame_count: usize) -> Result<Self, CodecError> {
        if data.len() <= HEADER_PREAMBLE {
            return Err(CodecError::DataTooShort {
                needed: HEADER_PREAMBLE + 1,
                actual: data.len(),
            });
        }
        let delimiter = data[HEADER_PREAMBLE..]
            .iter()
            .position(|&b| b == HEADER_DELIMITER)
            .ok_or(CodecError::MissingHeaderDelimiter)?;
        let table = HEADER_PREAMBLE + delimiter + 1;
        let table_end = table + frame_count * 4;
        if table_end > data.len() {
            return Err(CodecError::DataTooShort {
                needed: table_end,
                actual: data.len(),
            });
        }

        let mut frame_starts = Vec::with_capacity(frame_count);
        for (frame, entry) in data[table..table_end].chunks_exact(4).enumerate() {
            let offset = read_stored_offset([entry[0], entry[1], entry[2], entry[3]]);
            let start = table_end + offset as usize;
            if start >= data.len() {
                return Err(CodecError::OffsetOutOfRange { frame, offset });
            }
            for segment in Segments::new(data, start) {
                segment?;
            }
            frame_starts.push(start);
        }

        Ok(Self { frame_starts })
    }

    pub fn frame_count(&self) -> usize {
        self.frame_starts.len()
    }

    /// Byte position of a frame's stream.
    pub fn frame_start(&self, frame: usize) -> Option<usize> {
        self.frame_starts.get(frame).copied()
    }

    /// Distinct stream positions, for passes that must touch each stream once.
    pub fn distinct_starts(&self) -> Vec<usize> {
        let mut starts = self.frame_starts.clone();
        starts.sort_unstable();
        starts.dedup();
        starts
    }
}

/// Encode row-major palette frames into the compressed bank format.
///
/// Every frame must hold `width * height` bytes. Runs longer than 255 bytes and
/// skips that would collide with the control bytes are split.
pub fn encode_frames(width: usize, height: usize, frames: &[&[u8]]) -> Vec<u8> {
    let mut streams = Vec::new();
    let mut offsets = Vec::with_capacity(frames.len());

    for frame in frames {
        offsets.push(streams.len() as u32);
        for row in 0..height {
            if row > 0 {
                streams.push(ROW_BREAK);
            }
            let pixels = &frame[row * width..(row + 1) * width];
            encode_row(pixels, &mut streams);
        }
        streams.push(END_OF_FRAME);
    }

    let mut out = Vec::with_capacity(HEADER_PREAMBLE + 1 + offsets.len() * 4 + streams.len());
    out.extend_from_slice(PREAMBLE_TAG);
    out.push(HEADER_DELIMITER);
    for offset in offsets {
        out.extend_from_slice(&offset.to_le_bytes());
    }
    out.extend_from_slice(&streams);
    out
}

fn encode_row(pixels: &[u8], out: &mut Vec<u8>) {
    let mut cursor = 0;
    let mut x = 0;
    while x < pixels.len() {
        if pixels[x] == 0 {
            x += 1;
            continue;
        }
        let run_start = x;
        while x < pixels.len() && pixels[x] != 0 && x - run_start < MAX_RUN {
            x += 1;
        }

        let mut skip = run_start - cursor;
        while skip > MAX_SKIP {
            out.extend_from_slice(&[MAX_SKIP as u8, 0]);
            skip -= MAX_SKIP;
        }
        out.push(skip as u8);
        out.push((x - run_start) as u8);
        out.extend_from_slice(&pixels[run_start..x]);
        cursor = x;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn header(offsets: &[u32]) -> Vec<u8> {
        let mut data = b"0123456789AB".to_vec();
        data.push(HEADER_DELIMITER);
        for o in offsets {
            data.extend_from_slice(&o.to_le_bytes());
        }
        data
    }

    #[test]
    fn reader_is_bounds_checked() {
        let data = [1, 2, 3];
        let mut reader = StreamReader::new(&data, 0);
        assert_eq!(reader.peek_byte(), Ok(1));
        assert_eq!(reader.read_byte(), Ok(1));
        assert_eq!(reader.skip(2), Ok(1..3));
        assert!(reader.at_end());
        assert_eq!(
            reader.read_byte(),
            Err(CodecError::StreamOverrun { position: 3 })
        );
    }

    #[test]
    fn segments_track_rows_and_cursor() {
        // row 0: skip 1, run [5, 6]; skip 2, run [7]
        // row 1: skip 0, run [8]
        let mut data = header(&[0]);
        let base = data.len();
        data.extend_from_slice(&[1, 2, 5, 6, 2, 1, 7, ROW_BREAK, 0, 1, 8, END_OF_FRAME]);

        let segments: Vec<Segment> = Segments::new(&data, base)
            .collect::<Result<_, _>>()
            .unwrap();

        assert_eq!(
            segments,
            vec![
                Segment { row: 0, skip: 1, x: 1, pixels: base + 2..base + 4 },
                Segment { row: 0, skip: 2, x: 5, pixels: base + 6..base + 7 },
                Segment { row: 1, skip: 0, x: 0, pixels: base + 10..base + 11 },
            ]
        );
    }

    #[test]
    fn zero_length_run_yields_empty_segment() {
        let mut data = header(&[0]);
        let base = data.len();
        data.extend_from_slice(&[4, 0, 1, 1, 9, END_OF_FRAME]);

        let segments: Vec<Segment> = Segments::new(&data, base)
            .collect::<Result<_, _>>()
            .unwrap();
        assert_eq!(segments.len(), 2);
        assert!(segments[0].pixels.is_empty());
        assert_eq!(segments[1].x, 5);
    }

    #[test]
    fn missing_terminator_is_an_overrun() {
        let mut data = header(&[0]);
        let base = data.len();
        data.extend_from_slice(&[0, 3, 1, 2]);

        let result: Result<Vec<_>, _> = Segments::new(&data, base).collect();
        assert!(matches!(result, Err(CodecError::StreamOverrun { .. })));
        assert!(matches!(
            CompressedLayout::parse(&data, 1),
            Err(CodecError::StreamOverrun { .. })
        ));
    }

    #[test]
    fn layout_requires_delimiter() {
        let data = vec![0u8; 20];
        assert_eq!(
            CompressedLayout::parse(&data, 1),
            Err(CodecError::MissingHeaderDelimiter)
        );
    }

    #[test]
    fn layout_rejects_offsets_past_the_end() {
        let mut data = header(&[0, 400]);
        data.push(END_OF_FRAME);
        assert_eq!(
            CompressedLayout::parse(&data, 2),
            Err(CodecError::OffsetOutOfRange { frame: 1, offset: 400 })
        );
    }

    #[test]
    fn layout_rejects_truncated_offset_table() {
        let data = header(&[0]);
        assert!(matches!(
            CompressedLayout::parse(&data, 3),
            Err(CodecError::DataTooShort { .. })
        ));
    }

    #[test]
    fn encoded_frames_parse_back() {
        let a: [u8; 8] = [0, 3, 3, 0, 0, 0, 4, 0];
        let b: [u8; 8] = [1, 0, 0, 2, 0, 0, 0, 0];
        let data = encode_frames(4, 2, &[&a[..], &b[..]]);
        let layout = CompressedLayout::parse(&data, 2).unwrap();
        assert_eq!(layout.frame_count(), 2);

        let start = layout.frame_start(1).unwrap();
        let opaque: Vec<(u32, i32, Vec<u8>)> = Segments::new(&data, start)
            .map(|s| s.unwrap())
            .map(|s| (s.row, s.x, data[s.pixels].to_vec()))
            .collect();
        assert_eq!(opaque, vec![(0, 0, vec![1]), (0, 3, vec![2])]);
    }

    #[test]
    fn long_skips_are_split_below_row_break() {
        let mut row = vec![0u8; 300];
        row[299] = 7;
        let data = encode_frames(300, 1, &[&row[..]]);
        let layout = CompressedLayout::parse(&data, 1).unwrap();
        let segments: Vec<Segment> = Segments::new(&data, layout.frame_start(0).unwrap())
            .collect::<Result<_, _>>()
            .unwrap();
        assert!(segments.iter().all(|s| s.skip < ROW_BREAK));
        let last = segments.last().unwrap();
        assert_eq!(last.x, 299);
        assert_eq!(data[last.pixels.clone()], [7]);
    }
}
