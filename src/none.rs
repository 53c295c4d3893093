//! Stored blocks: header plus the bytes verbatim

use crate::header::{CompressionHeader, CompressionType, HEADER_SIZE};
use crate::util::{decode_all, impl_uncomp_context, DecodeStream, OutputSink};
use crate::{CompressError, DecompressError};

/// Stores `src` verbatim behind a header
///
/// Always succeeds given `src.len() + HEADER_SIZE` bytes of output; this is the fallback when a
/// real codec reports [`NotSmaller`](crate::CompressOutcome::NotSmaller).
pub fn compress_none(src: &[u8], dst: &mut [u8]) -> Result<usize, CompressError> {
    let size = u32::try_from(src.len()).map_err(|_| CompressError::InputTooLarge)?;
    let total = HEADER_SIZE + src.len();
    let dst = dst.get_mut(..total).ok_or(CompressError::OutputTooSmall)?;
    let header = CompressionHeader::new(CompressionType::None, size);
    dst[..HEADER_SIZE].copy_from_slice(&header.to_bytes());
    dst[HEADER_SIZE..].copy_from_slice(src);
    Ok(total)
}

/// Copies a stored block's payload into `dst`
pub fn uncompress_none(src: &[u8], dst: &mut [u8]) -> Result<usize, DecompressError> {
    let header = CompressionHeader::parse(src)?;
    decode_all(NoneContext::new(dst, &header)?, src)
}

/// Incremental decoder for stored blocks
pub struct NoneContext<'a> {
    stream: DecodeStream<'a>,
}

impl<'a> NoneContext<'a> {
    pub fn new(dst: &'a mut [u8], header: &CompressionHeader) -> Result<Self, DecompressError> {
        if header.kind != CompressionType::None {
            return Err(DecompressError::TypeMismatch);
        }
        Ok(Self {
            stream: DecodeStream::new(dst, header)?,
        })
    }

    fn step<'c>(&mut self, chunk: &'c [u8]) -> Result<&'c [u8], DecompressError> {
        let out = &mut self.stream.out;
        let n = usize::min(chunk.len(), out.buf.len() - out.pos);
        out.put_lits(&chunk[..n])?;
        Ok(&chunk[n..])
    }
}
impl_uncomp_context!(NoneContext);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::UncompContext;

    #[test]
    fn test_stored_layout() {
        let mut out = [0u8; 8];
        assert_eq!(compress_none(&[1, 2, 3], &mut out), Ok(8));
        assert_eq!(out, [0x00, 3, 0, 0, 0, 1, 2, 3]);

        let mut back = [0u8; 3];
        assert_eq!(uncompress_none(&out, &mut back), Ok(3));
        assert_eq!(back, [1, 2, 3]);
    }

    #[test]
    fn test_stored_errors() {
        let mut out = [0u8; 7];
        assert_eq!(
            compress_none(&[1, 2, 3], &mut out),
            Err(CompressError::OutputTooSmall)
        );

        let mut back = [0u8; 3];
        assert_eq!(
            uncompress_none(&[0x00, 3, 0, 0, 0, 1, 2], &mut back),
            Err(DecompressError::InputTruncated)
        );
        assert_eq!(
            uncompress_none(&[0x00, 4, 0, 0, 0, 1, 2, 3, 4], &mut back),
            Err(DecompressError::OutputTooSmall)
        );
        assert_eq!(
            uncompress_none(&[0x30, 3, 0, 0, 0, 1, 2, 3], &mut back),
            Err(DecompressError::TypeMismatch)
        );
    }

    #[test]
    fn test_stored_streaming() {
        let block = [0x00, 4, 0, 0, 0, 9, 8, 7, 6, 0xee];
        let mut out = [0u8; 4];
        let mut ctx =
            NoneContext::new(&mut out, &CompressionHeader::parse(&block).unwrap()).unwrap();
        assert_eq!(ctx.feed(&block[..6]).unwrap(), 1);
        assert!(!ctx.is_finished());
        assert_eq!(ctx.feed(&[]).unwrap(), 0);
        // trailing byte is ignored
        assert_eq!(ctx.feed(&block[6..]).unwrap(), 3);
        assert!(ctx.is_finished());
        assert_eq!(ctx.feed(&[1, 2]).unwrap(), 0);
        drop(ctx);
        assert_eq!(out, [9, 8, 7, 6]);
    }

    #[test]
    fn test_stored_diff() {
        let block = [0x80, 4, 0, 0, 0, 10, 1, 1, 0xfe];
        let mut out = [0u8; 4];
        assert_eq!(uncompress_none(&block, &mut out), Ok(4));
        assert_eq!(out, [10, 11, 12, 10]);

        // unfinished output is still filtered
        let header = CompressionHeader::parse(&block).unwrap();
        let mut out = [0u8; 4];
        let mut ctx = NoneContext::new(&mut out, &header).unwrap();
        assert_eq!(ctx.feed(&block[..8]).unwrap(), 3);
        assert_eq!(ctx.produced(), 3);
        assert!(!ctx.is_finished());
        drop(ctx);
        assert_eq!(out, [10, 1, 1, 0]);

        let mut out = [0u8; 4];
        let mut ctx = NoneContext::new(&mut out, &header).unwrap();
        assert_eq!(ctx.feed(&block[..8]).unwrap(), 3);
        assert_eq!(ctx.feed(&block[8..]).unwrap(), 1);
        assert!(ctx.is_finished());
        drop(ctx);
        assert_eq!(out, [10, 11, 12, 10]);
    }
}
