use core::mem;

use crate::header::{CompressionHeader, CompressionType, HEADER_SIZE};
use crate::util::{encode_block, BufOutput, OutputSink};
use crate::{CompressError, CompressOutcome};

const HTAB_LOG2: usize = 13;
const HTAB_SZ: usize = 1 << HTAB_LOG2;

pub(super) const MAX_L1_DISP: usize = 8191;
pub(super) const MAX_L2_DISP: usize = 8191 + 65535;

struct L1Output<'o, 'a>(&'o mut BufOutput<'a>);
struct L2Output<'o, 'a>(&'o mut BufOutput<'a>);

fn put_lit_runs(out: &mut BufOutput, mut lits: &[u8]) -> Result<(), CompressError> {
    while lits.len() > 32 {
        out.putc(31)?;
        out.put_buf(&lits[..32])?;
        lits = &lits[32..];
    }

    debug_assert!(!lits.is_empty());
    debug_assert!(lits.len() <= 32);

    out.putc((lits.len() - 1) as u8)?;
    out.put_buf(lits)
}

impl<'o, 'a> OutputSink<CompressError> for L1Output<'o, 'a> {
    fn put_lits(&mut self, lits: &[u8]) -> Result<(), CompressError> {
        put_lit_runs(self.0, lits)
    }

    fn put_backref(&mut self, disp: usize, mut len: usize) -> Result<(), CompressError> {
        debug_assert!(disp <= MAX_L1_DISP);
        debug_assert!(len >= 3);

        // split long matches into 262 byte pieces at the same distance, always leaving at
        // least 3 for the final piece
        while len > 0xff + 9 {
            self.0.putc(0b111_00000 | ((disp >> 8) as u8))?;
            self.0.putc(0xff - 2)?;
            self.0.putc(disp as u8)?;
            len -= 0xff - 2 + 9;
        }

        if len <= 8 {
            // short form
            self.0.putc((((len - 2) << 5) | (disp >> 8)) as u8)?;
            self.0.putc(disp as u8)
        } else {
            // length byte form
            self.0.putc(0b111_00000 | ((disp >> 8) as u8))?;
            self.0.putc((len - 9) as u8)?;
            self.0.putc(disp as u8)
        }
    }
}

impl<'o, 'a> OutputSink<CompressError> for L2Output<'o, 'a> {
    fn put_lits(&mut self, lits: &[u8]) -> Result<(), CompressError> {
        put_lit_runs(self.0, lits)
    }

    fn put_backref(&mut self, disp: usize, mut len: usize) -> Result<(), CompressError> {
        debug_assert!(disp <= MAX_L2_DISP);
        debug_assert!(len >= 3);

        let earlydisp = usize::min(disp, MAX_L1_DISP);
        len -= 2;
        let earlylen = usize::min(len, 7);

        self.0.putc(((earlylen << 5) | (earlydisp >> 8)) as u8)?;

        if earlylen == 7 {
            len -= earlylen;
            loop {
                let blen = usize::min(len, 0xff) as u8;
                self.0.putc(blen)?;
                if blen != 0xff {
                    break;
                }
                len -= blen as usize;
            }
        }

        self.0.putc(earlydisp as u8)?;
        if earlydisp == MAX_L1_DISP {
            let moredisp = disp - earlydisp;
            self.0.putc((moredisp >> 8) as u8)?;
            self.0.putc(moredisp as u8)?;
        }

        Ok(())
    }
}

trait CompressSink {
    const MAX_DISP: usize;
    const IS_LEVEL2: bool;
    /// Marks the stream as level 2 in the top bits of its first byte
    fn poke_l2(&mut self);
}
impl<'o, 'a> CompressSink for L1Output<'o, 'a> {
    const MAX_DISP: usize = MAX_L1_DISP;
    const IS_LEVEL2: bool = false;
    fn poke_l2(&mut self) {}
}
impl<'o, 'a> CompressSink for L2Output<'o, 'a> {
    const MAX_DISP: usize = MAX_L2_DISP;
    const IS_LEVEL2: bool = true;
    fn poke_l2(&mut self) {
        self.0.buf[0] |= 0b001_00000;
    }
}

/// Compression level
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CompressionLevel {
    /// Level 1 below 64 KiB of input, level 2 from there on
    #[default]
    Default,
    /// Level 1
    Level1,
    /// Level 2
    Level2,
}

impl CompressionLevel {
    fn resolve(self, len: usize) -> Self {
        match self {
            CompressionLevel::Default if len < 65536 => CompressionLevel::Level1,
            CompressionLevel::Default => CompressionLevel::Level2,
            level => level,
        }
    }
}

fn fastlz_hash(v: u32) -> usize {
    (v & 0xffffff).wrapping_mul(2654435769) as usize >> (32 - HTAB_LOG2)
}

/// Four bytes at `pos`, if the input has that many left
fn word_at(src: &[u8], pos: usize) -> Option<u32> {
    Some(u32::from_le_bytes(*src.get(pos..)?.first_chunk::<4>()?))
}

/// Worst-case block size for `len` bytes of input
///
/// Incompressible input grows by one opcode per 32 literals; the encoder itself never writes
/// past `len - 1` bytes and reports [`NotSmaller`](CompressOutcome::NotSmaller) instead.
pub const fn compress_bound(len: usize) -> usize {
    len + len / 20 + 1 + HEADER_SIZE
}

/// Reusable FastLZ encoder
///
/// The 32 KiB hash table lives here so callers can keep it off the stack or reuse it.
pub struct CompressState {
    htab: [u32; HTAB_SZ],
}

impl Default for CompressState {
    fn default() -> Self {
        Self::new()
    }
}

impl CompressState {
    pub fn new() -> Self {
        Self { htab: [0; HTAB_SZ] }
    }

    fn compress_impl<L: OutputSink<CompressError> + CompressSink>(
        &mut self,
        src: &[u8],
        outp: &mut L,
    ) -> Result<(), CompressError> {
        if src.is_empty() {
            return Ok(());
        }
        self.htab.fill(0);

        let mut anchor = 0;
        // the first byte is always a literal
        let mut pos = 1;

        while let Some(word) = word_at(src, pos) {
            let cand = mem::replace(&mut self.htab[fastlz_hash(word)], pos as u32) as usize;
            debug_assert!(pos > cand);
            let disp = pos - cand - 1;
            let far = L::IS_LEVEL2 && disp >= MAX_L1_DISP;

            if disp > L::MAX_DISP || src[pos..pos + 3] != src[cand..cand + 3] {
                pos += 1;
                continue;
            }
            if far {
                // far references cost two more bytes, so want 5 matching
                if src.len() - pos < 5 {
                    break;
                }
                if src[pos + 3..pos + 5] != src[cand + 3..cand + 5] {
                    pos += 1;
                    continue;
                }
            }

            let mut len = 3 + src[pos + 3..]
                .iter()
                .zip(&src[cand + 3..])
                .take_while(|(a, b)| a == b)
                .count();
            // level 2 cannot end a block with a far reference
            if far && pos + len == src.len() {
                len -= 1;
            }

            if anchor < pos {
                outp.put_lits(&src[anchor..pos])?;
            }
            outp.put_backref(disp, len)?;
            pos += len;
            anchor = pos;

            // rehash the last two positions covered by the match
            let Some(tail) = word_at(src, pos - 2) else {
                break;
            };
            self.htab[fastlz_hash(tail)] = (pos - 2) as u32;
            self.htab[fastlz_hash(tail >> 8)] = (pos - 1) as u32;
        }

        if anchor < src.len() {
            outp.put_lits(&src[anchor..])?;
        }
        outp.poke_l2();
        Ok(())
    }

    fn compress_level(
        &mut self,
        inp: &[u8],
        outp: &mut BufOutput,
        level: CompressionLevel,
    ) -> Result<(), CompressError> {
        if level.resolve(inp.len()) == CompressionLevel::Level1 {
            self.compress_impl(inp, &mut L1Output(outp))
        } else {
            self.compress_impl(inp, &mut L2Output(outp))
        }
    }

    /// Writes a complete FastLZ block, header included, into `outp`
    pub fn compress_to_buf(
        &mut self,
        inp: &[u8],
        outp: &mut [u8],
        level: CompressionLevel,
    ) -> Result<CompressOutcome, CompressError> {
        let header = CompressionHeader::new(CompressionType::FastLz, 0);
        encode_block(inp, outp, header, |outp| {
            self.compress_level(inp, outp, level)
        })
    }
}

/// FastLZ-compresses `src` into `dst`
pub fn compress_fastlz(
    src: &[u8],
    dst: &mut [u8],
    level: CompressionLevel,
) -> Result<CompressOutcome, CompressError> {
    CompressState::new().compress_to_buf(src, dst, level)
}
