use crate::diff::unfilter_diff_in_place;
use crate::header::{CompressionHeader, HEADER_SIZE};
use crate::{CompressError, CompressOutcome, DecompressError};

/// Internal abstraction for LZ-style token streams
///
/// Encoders implement this to serialize tokens; [`BufOutput`] implements it to materialize them.
pub(crate) trait OutputSink<ErrTy> {
    /// Add the given literal run to the output
    fn put_lits(&mut self, lits: &[u8]) -> Result<(), ErrTy>;
    /// Add a backreference to the output
    ///
    /// A `disp` of 0 means the current position minus 1.
    /// Increasing `disp` means further backwards
    ///
    /// Copy `len` bytes, which as usual for LZ77 may exceed `disp`.
    fn put_backref(&mut self, disp: usize, len: usize) -> Result<(), ErrTy>;
}

/// A write cursor over a caller-supplied buffer
///
/// Note for all functions: we guarantee writing all the way up to the limit
pub(crate) struct BufOutput<'a> {
    pub pos: usize,
    pub buf: &'a mut [u8],
}
impl<'a> From<&'a mut [u8]> for BufOutput<'a> {
    fn from(buf: &'a mut [u8]) -> Self {
        Self { pos: 0, buf }
    }
}

impl<'a> BufOutput<'a> {
    pub fn is_full(&self) -> bool {
        self.pos == self.buf.len()
    }

    pub fn putc(&mut self, c: u8) -> Result<(), CompressError> {
        if self.pos < self.buf.len() {
            self.buf[self.pos] = c;
            self.pos += 1;
            Ok(())
        } else {
            Err(CompressError::OutputTooSmall)
        }
    }

    pub fn put_buf(&mut self, buf: &[u8]) -> Result<(), CompressError> {
        self.copy_clamped(buf)
            .then_some(())
            .ok_or(CompressError::OutputTooSmall)
    }

    /// Repeat `value` `len` times
    pub fn put_run(&mut self, value: u8, len: usize) -> Result<(), DecompressError> {
        let n = self.room(len);
        self.buf[self.pos..self.pos + n].fill(value);
        self.pos += n;
        overrun_if(n < len)
    }

    fn room(&self, len: usize) -> usize {
        usize::min(len, self.buf.len() - self.pos)
    }

    /// Copies as much of `src` as fits, returning whether all of it did
    fn copy_clamped(&mut self, src: &[u8]) -> bool {
        let n = self.room(src.len());
        self.buf[self.pos..self.pos + n].copy_from_slice(&src[..n]);
        self.pos += n;
        n == src.len()
    }
}

fn overrun_if(cut: bool) -> Result<(), DecompressError> {
    if cut {
        Err(DecompressError::OutputOverrun)
    } else {
        Ok(())
    }
}

impl<'a> OutputSink<DecompressError> for BufOutput<'a> {
    fn put_lits(&mut self, lits: &[u8]) -> Result<(), DecompressError> {
        overrun_if(!self.copy_clamped(lits))
    }

    fn put_backref(&mut self, disp: usize, len: usize) -> Result<(), DecompressError> {
        if disp >= self.pos {
            return Err(DecompressError::InvalidBackreference);
        }
        // byte by byte, since the source may overlap what is being written
        let n = self.room(len);
        let from = self.pos - disp - 1;
        for i in 0..n {
            self.buf[self.pos + i] = self.buf[from + i];
        }
        self.pos += n;
        overrun_if(n < len)
    }
}

/// Writes `header` followed by the payload produced by `body`
///
/// The block may use at most `src.len() - 1` bytes; running out of that budget means the
/// encoding is not smaller, while running out of `dst` first is an error.
pub(crate) fn encode_block(
    src: &[u8],
    dst: &mut [u8],
    mut header: CompressionHeader,
    body: impl FnOnce(&mut BufOutput<'_>) -> Result<(), CompressError>,
) -> Result<CompressOutcome, CompressError> {
    header.uncompressed_size =
        u32::try_from(src.len()).map_err(|_| CompressError::InputTooLarge)?;

    let budget = src.len().saturating_sub(1);
    let cap = usize::min(budget, dst.len());
    let not_smaller = |e| {
        if cap == budget && e == CompressError::OutputTooSmall {
            log::trace!("{:?}: {} bytes do not shrink", header.kind, src.len());
            Ok(CompressOutcome::NotSmaller)
        } else {
            Err(e)
        }
    };

    if cap < HEADER_SIZE {
        return not_smaller(CompressError::OutputTooSmall);
    }
    dst[..HEADER_SIZE].copy_from_slice(&header.to_bytes());

    let mut outp: BufOutput = (&mut dst[HEADER_SIZE..cap]).into();
    match body(&mut outp) {
        Ok(()) => {
            let total = HEADER_SIZE + outp.pos;
            log::debug!("{:?}: {} -> {} bytes", header.kind, src.len(), total);
            Ok(CompressOutcome::Compressed(total))
        }
        Err(e) => not_smaller(e),
    }
}

/// Bookkeeping shared by every incremental decoder
///
/// Owns the output cursor, skips the block header as it arrives, and undoes the Dif filter once
/// the last byte has been produced.
pub(crate) struct DecodeStream<'a> {
    pub out: BufOutput<'a>,
    header_left: usize,
    diff_filtered: bool,
}

impl<'a> DecodeStream<'a> {
    pub fn new(dst: &'a mut [u8], header: &CompressionHeader) -> Result<Self, DecompressError> {
        let size = header.size();
        if dst.len() < size {
            return Err(DecompressError::OutputTooSmall);
        }
        Ok(Self {
            out: (&mut dst[..size]).into(),
            header_left: HEADER_SIZE,
            diff_filtered: header.diff_filtered,
        })
    }

    /// Strips any header bytes from the front of `chunk`
    pub fn skip_header<'c>(&mut self, chunk: &'c [u8]) -> &'c [u8] {
        let n = usize::min(self.header_left, chunk.len());
        self.header_left -= n;
        &chunk[n..]
    }

    pub fn in_payload(&self) -> bool {
        self.header_left == 0
    }

    pub fn is_finished(&self) -> bool {
        self.in_payload() && self.out.is_full()
    }

    /// Call after each step that may have produced the final byte
    pub fn complete_if_full(&mut self, before: usize) {
        if self.out.is_full() && before < self.out.pos {
            if self.diff_filtered {
                unfilter_diff_in_place(self.out.buf);
            }
            log::trace!("block complete, {} bytes", self.out.pos);
        }
    }
}

/// Streaming decoders
///
/// Feed the complete block, header included, in as many pieces as convenient. Feeding the bytes
/// in any chunking produces the same output as feeding them all at once.
///
/// For blocks with the Dif flag, the destination holds filtered bytes until the last one
/// arrives and is only unfiltered then. Their output is final once [`is_finished`] is true.
///
/// [`is_finished`]: UncompContext::is_finished
pub trait UncompContext {
    /// Consumes `chunk` and returns the number of bytes produced by this call
    ///
    /// Running out of input is not an error; the context resumes on the next call. Input past the
    /// end of the block is ignored. Bytes from a Dif-flagged block are still filtered until the
    /// call that finishes it.
    fn feed(&mut self, chunk: &[u8]) -> Result<usize, DecompressError>;
    /// Whether the whole declared size has been produced
    fn is_finished(&self) -> bool;
    /// Total bytes produced so far
    ///
    /// For a Dif-flagged block that is not finished, these bytes are still filtered.
    fn produced(&self) -> usize;
}

/// Runs a context over a fully resident block
pub(crate) fn decode_all<C: UncompContext>(
    mut ctx: C,
    src: &[u8],
) -> Result<usize, DecompressError> {
    ctx.feed(src)?;
    if ctx.is_finished() {
        Ok(ctx.produced())
    } else {
        Err(DecompressError::InputTruncated)
    }
}

/// Implements [`UncompContext`] for a context with a `stream` field and a `step` method
///
/// `step` consumes a prefix of the payload and returns what remains.
macro_rules! impl_uncomp_context {
    ($ty:ident) => {
        impl<'a> $crate::UncompContext for $ty<'a> {
            fn feed(&mut self, chunk: &[u8]) -> Result<usize, $crate::DecompressError> {
                let start = self.stream.out.pos;
                let mut chunk = self.stream.skip_header(chunk);
                while !chunk.is_empty() && self.stream.in_payload() && !self.stream.out.is_full() {
                    chunk = self.step(chunk)?;
                }
                self.stream.complete_if_full(start);
                Ok(self.stream.out.pos - start)
            }

            fn is_finished(&self) -> bool {
                self.stream.is_finished()
            }

            fn produced(&self) -> usize {
                self.stream.out.pos
            }
        }
    };
}
pub(crate) use impl_uncomp_context;
