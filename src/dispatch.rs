//! Picking a codec from a header, or from caller options

use crate::fastlz::{compress_fastlz, CompressionLevel, FastLzContext};
use crate::header::{CompressionHeader, CompressionType, DIFF_FLAG};
use crate::huffman::{compress_huff, HuffContext};
use crate::lz::{compress_lz, LzContext, LzParse};
use crate::none::{compress_none, NoneContext};
use crate::rl::{compress_rl, RlContext};
use crate::util::decode_all;
use crate::{CompressError, CompressOutcome, DecompressError, UncompContext};

/// Codec selection for [`compress_any`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompressOptions {
    pub kind: CompressionType,
    /// Only used by LZ
    pub lz_parse: LzParse,
    /// Only used by FastLZ
    pub fastlz_level: CompressionLevel,
    /// Tag the block as holding delta-filtered bytes
    pub diff_filter: bool,
}

impl Default for CompressOptions {
    fn default() -> Self {
        Self {
            kind: CompressionType::Rl,
            lz_parse: LzParse::default(),
            fastlz_level: CompressionLevel::default(),
            diff_filter: false,
        }
    }
}

/// Compresses `src` with the codec named in `opts`
///
/// With `diff_filter` set, `src` must already have been run through
/// [`filter_diff`](crate::filter_diff); only the header flag is added here. A `None` kind always
/// stores.
pub fn compress_any(
    src: &[u8],
    dst: &mut [u8],
    opts: &CompressOptions,
) -> Result<CompressOutcome, CompressError> {
    let outcome = match opts.kind {
        CompressionType::None => CompressOutcome::Compressed(compress_none(src, dst)?),
        CompressionType::Lz { extended } => compress_lz(src, dst, extended, opts.lz_parse)?,
        CompressionType::Huffman { four_bit } => compress_huff(src, dst, four_bit)?,
        CompressionType::Rl => compress_rl(src, dst)?,
        CompressionType::FastLz => compress_fastlz(src, dst, opts.fastlz_level)?,
    };
    if opts.diff_filter && outcome != CompressOutcome::NotSmaller {
        dst[0] |= DIFF_FLAG;
    }
    Ok(outcome)
}

/// Decodes any block into `dst`, returning the number of bytes produced
///
/// `dst` must hold at least [`get_uncompressed_size`](crate::get_uncompressed_size) bytes.
/// Nothing is written past that size, even for corrupt input.
pub fn uncompress_any(src: &[u8], dst: &mut [u8]) -> Result<usize, DecompressError> {
    let res = CompressionHeader::parse(src)
        .and_then(|header| decode_all(AnyContext::new(dst, &header)?, src));
    if let Err(e) = &res {
        log::warn!("rejecting compressed block: {}", e);
    }
    res
}

/// Incremental decoder for whichever format a header names
pub enum AnyContext<'a> {
    None(NoneContext<'a>),
    Lz(LzContext<'a>),
    Huffman(HuffContext<'a>),
    Rl(RlContext<'a>),
    FastLz(FastLzContext<'a>),
}

impl<'a> AnyContext<'a> {
    pub fn new(dst: &'a mut [u8], header: &CompressionHeader) -> Result<Self, DecompressError> {
        Ok(match header.kind {
            CompressionType::None => AnyContext::None(NoneContext::new(dst, header)?),
            CompressionType::Lz { .. } => AnyContext::Lz(LzContext::new(dst, header)?),
            CompressionType::Huffman { .. } => AnyContext::Huffman(HuffContext::new(dst, header)?),
            CompressionType::Rl => AnyContext::Rl(RlContext::new(dst, header)?),
            CompressionType::FastLz => AnyContext::FastLz(FastLzContext::new(dst, header)?),
        })
    }

    fn inner(&self) -> &dyn UncompContext {
        match self {
            AnyContext::None(ctx) => ctx,
            AnyContext::Lz(ctx) => ctx,
            AnyContext::Huffman(ctx) => ctx,
            AnyContext::Rl(ctx) => ctx,
            AnyContext::FastLz(ctx) => ctx,
        }
    }

    fn inner_mut(&mut self) -> &mut dyn UncompContext {
        match self {
            AnyContext::None(ctx) => ctx,
            AnyContext::Lz(ctx) => ctx,
            AnyContext::Huffman(ctx) => ctx,
            AnyContext::Rl(ctx) => ctx,
            AnyContext::FastLz(ctx) => ctx,
        }
    }
}

impl<'a> UncompContext for AnyContext<'a> {
    fn feed(&mut self, chunk: &[u8]) -> Result<usize, DecompressError> {
        self.inner_mut().feed(chunk)
    }

    fn is_finished(&self) -> bool {
        self.inner().is_finished()
    }

    fn produced(&self) -> usize {
        self.inner().produced()
    }
}

#[cfg(feature = "alloc")]
mod owned {
    use alloc::vec;
    use alloc::vec::Vec;

    use super::*;
    use crate::diff::filter_diff_in_place;
    use crate::fastlz::compress_bound;
    use crate::header::HEADER_SIZE;

    /// Compresses `src` into a new block, storing it when the codec cannot shrink it
    ///
    /// Unlike [`compress_any`], this applies the delta filter itself when `diff_filter` is set.
    pub fn compress_to_vec(src: &[u8], opts: &CompressOptions) -> Result<Vec<u8>, CompressError> {
        let mut filtered = Vec::new();
        let inp = if opts.diff_filter {
            filtered.extend_from_slice(src);
            filter_diff_in_place(&mut filtered);
            &filtered[..]
        } else {
            src
        };

        let mut out = vec![0u8; compress_bound(inp.len())];
        let len = match compress_any(inp, &mut out, opts)? {
            CompressOutcome::Compressed(n) => n,
            CompressOutcome::NotSmaller => {
                log::trace!("{:?} did not shrink {} bytes, storing", opts.kind, inp.len());
                compress_none(inp, &mut out)?
            }
        };
        if opts.diff_filter {
            out[0] |= DIFF_FLAG;
        }
        out.truncate(len);
        Ok(out)
    }

    /// Decodes a block into a new buffer sized from its header
    ///
    /// Headers declaring more output than the payload could possibly produce are rejected before
    /// anything is allocated, and a failed allocation is an error rather than an abort.
    pub fn uncompress_to_vec(src: &[u8]) -> Result<Vec<u8>, DecompressError> {
        let header = CompressionHeader::parse(src)?;
        let size = header.size();
        let payload = src.len() - HEADER_SIZE;
        if size > payload.saturating_mul(header.kind.max_expansion()) {
            log::warn!("{:?} block of {} bytes cannot hold {} bytes", header.kind, payload, size);
            return Err(DecompressError::InputTruncated);
        }

        let mut out = Vec::new();
        out.try_reserve_exact(size)
            .map_err(|_| DecompressError::OutputAllocFailed(size))?;
        out.resize(size, 0);
        uncompress_any(src, &mut out)?;
        Ok(out)
    }
}
#[cfg(feature = "alloc")]
pub use owned::{compress_to_vec, uncompress_to_vec};
