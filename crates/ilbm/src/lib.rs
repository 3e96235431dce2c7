//! # ilbm
//!
//! A 100% Rust library for reading DeluxePaint LBM/ILBM images and exporting
//! them as indexed-color PNG.
//!
//! ## Features
//!
//! - **Decoder**: IFF container parsing, ByteRun1 decompression and
//!   interleaved mask-plane reconstruction
//! - **Encoder**: Minimal indexed-color PNG writer (PLTE/tRNS, zlib scanlines)
//! - **Report**: serde-serializable description of the decoded image
//!   (palette, pixels, color-cycle metadata)
//!
//! ## Quick Start
//!
//! ### Decoding an LBM file
//!
//! ```ignore
//! use ilbm::lbm_decode;
//!
//! let data = std::fs::read("BRUSH.LBM")?;
//! let image = lbm_decode(&data)?;
//! // image.pixels holds one palette index per pixel
//! println!("{}x{}, {} colors", image.header.width, image.header.height, image.palette.len());
//! ```
//!
//! ### Exporting as PNG
//!
//! ```ignore
//! use ilbm::{lbm_decode, png_encode};
//!
//! let image = lbm_decode(&std::fs::read("BRUSH.LBM")?)?;
//! std::fs::write("brush.png", png_encode(&image)?)?;
//! ```

use thiserror::Error;

pub mod decoder;
pub mod encoder;
pub mod iff;

pub use decoder::{
    byterun1_pack, byterun1_unpack, lbm_decode, BitmapHeader, Compression, CycleRange, ImageReport,
    LbmImage, Masking, PixelData, Rgb,
};
pub use encoder::png_encode;
pub use iff::{Chunk, ChunkTag, Form};

/// Errors that can occur while decoding LBM data or encoding PNG output.
#[derive(Debug, Error)]
pub enum LbmError {
    /// Input is not an IFF FORM container
    #[error("not an IFF FORM container")]
    InvalidForm,

    /// A chunk header or payload extends past the end of the input
    #[error("truncated {tag} chunk")]
    TruncatedChunk { tag: ChunkTag },

    /// A required chunk (BMHD or BODY) was not found
    #[error("missing required {tag} chunk")]
    MissingChunk { tag: ChunkTag },

    /// A ByteRun1 literal or repeat run reads past the end of the BODY payload
    #[error("malformed ByteRun1 data at offset {offset}")]
    MalformedCompressedData { offset: usize },

    /// PNG encoding was requested but the image carries no palette
    #[error("image has no palette (missing or empty CMAP)")]
    EmptyPalette,

    /// Pixel buffer size doesn't match the image dimensions
    #[error("pixel buffer size mismatch: expected {expected} bytes, got {actual}")]
    BufferSizeMismatch { expected: usize, actual: usize },

    /// Invalid image dimensions (width or height is zero)
    #[error("invalid dimensions: {width}x{height}")]
    InvalidDimensions { width: u32, height: u32 },

    /// Underlying I/O failure
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for LBM operations.
pub type Result<T> = core::result::Result<T, LbmError>;

// Fixed-size chunk records; shorter payloads are truncated files.
pub(crate) const BMHD_SIZE: usize = 20;
pub(crate) const CRNG_SIZE: usize = 8;
