//! Self-describing compressed blocks
//!
//! Every block starts with a 5-byte header naming its format and uncompressed size, so any block
//! can be decoded by [`uncompress_any`] without side information. Formats:
//!
//! * stored ([`compress_none`])
//! * run-length ([`compress_rl`])
//! * LZ77 with a 4 KiB window ([`compress_lz`])
//! * FastLZ level 1 and 2 ([`compress_fastlz`])
//! * canonical Huffman over bytes or nibbles ([`compress_huff`])
//!
//! Any of these may carry delta-filtered data ([`filter_diff`]), which decoders undo on their own.
//!
//! Encoders report [`CompressOutcome::NotSmaller`] when a block would not beat the input size;
//! store the data with [`compress_none`] then. Decoders come in one-shot form and as incremental
//! contexts implementing [`UncompContext`], which accept the block in arbitrary pieces.

#![no_std]

#[cfg(feature = "alloc")]
extern crate alloc;

mod diff;
mod dispatch;
mod error;
mod fastlz;
mod header;
mod huffman;
mod lz;
mod none;
mod packed;
mod rl;
mod util;

pub use diff::{filter_diff, filter_diff_in_place, unfilter_diff, unfilter_diff_in_place};
#[cfg(feature = "alloc")]
pub use dispatch::{compress_to_vec, uncompress_to_vec};
pub use dispatch::{compress_any, uncompress_any, AnyContext, CompressOptions};
pub use error::{CompressError, CompressOutcome, DecompressError};
pub use fastlz::{
    compress_bound, compress_fastlz, uncompress_fastlz, CompressState, CompressionLevel,
    FastLzContext,
};
pub use header::{
    get_compression_type, get_uncompressed_size, CompressionHeader, CompressionType, DIFF_FLAG,
    HEADER_SIZE, TYPE_EX_MASK, TYPE_MASK,
};
pub use huffman::{compress_huff, uncompress_huff, HuffContext};
pub use lz::{compress_lz, uncompress_lz, LzCompressState, LzContext, LzParse};
pub use none::{compress_none, uncompress_none, NoneContext};
pub use packed::{get_packed_value, packed_len, set_packed_value};
pub use rl::{compress_rl, uncompress_rl, RlContext};
pub use util::UncompContext;
