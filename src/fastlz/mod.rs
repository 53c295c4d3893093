//! FastLZ blocks
//!
//! The payload is a plain FastLZ level 1 or level 2 stream; the level lives in the top bits of the
//! first payload byte, so decoders pick it up on their own.

mod compress;
mod decompress;

pub use compress::{compress_bound, compress_fastlz, CompressState, CompressionLevel};
pub use decompress::{uncompress_fastlz, FastLzContext};
