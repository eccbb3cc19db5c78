//! Sprite banks and the software rasterizer that draws them.

pub mod bank;
pub mod codec;
pub mod raster;

use thiserror::Error;

pub use bank::{BankId, BankInfo, BankStore, Encoding, FrameBounds, SpriteBank};
pub use codec::CodecError;
pub use raster::{ClipRect, Rasterizer, SourceRect};

/// Size of the bank table.
pub const MAX_SPRITE_BANKS: usize = 2000;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SpriteError {
    #[error("bank {0} is outside the bank table")]
    BankOutOfRange(BankId),
    #[error("bank {0} is not registered")]
    BankNotRegistered(BankId),
    #[error("bank {0} is already registered")]
    AlreadyRegistered(BankId),
    #[error("bank {0} was registered without data")]
    EmptyData(BankId),
    #[error("bank {bank} needs {needed} bytes of pixel data, got {actual}")]
    DataTooShort {
        bank: BankId,
        needed: usize,
        actual: usize,
    },
    #[error("bank {bank} has no frame {frame}")]
    FrameOutOfRange { bank: BankId, frame: u32 },
    #[error("bank {bank} is malformed: {source}")]
    Malformed {
        bank: BankId,
        #[source]
        source: CodecError,
    },
}
