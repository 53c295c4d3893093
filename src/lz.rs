//! Sliding-window LZ77
//!
//! Tokens come in groups of up to eight, each group led by a flag byte read from the most
//! significant bit down: 0 is a literal byte, 1 a back-reference. Back-references hold the
//! distance minus one in 12 bits (a 4 KiB window). The plain format stores the length in the
//! remaining 4 bits (3..=18); the extended format spends an extra byte or two on longer matches
//! (up to 65808).

use crate::header::{CompressionHeader, CompressionType};
use crate::util::{
    decode_all, encode_block, impl_uncomp_context, BufOutput, DecodeStream, OutputSink,
};
use crate::{CompressError, CompressOutcome, DecompressError};

const WINDOW: usize = 4096;
const MIN_MATCH: usize = 3;
const MAX_PLAIN_MATCH: usize = 0xf + MIN_MATCH;
const MAX_EXTENDED_MATCH: usize = 0xffff + 0x111;

const HTAB_LOG2: usize = 12;
const HTAB_SZ: usize = 1 << HTAB_LOG2;

/// How hard the encoder looks for matches
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LzParse {
    /// Greedy, following at most a handful of candidates per position
    #[default]
    Fast,
    /// Deeper candidate search plus one step of lazy matching
    Better,
}

impl LzParse {
    fn max_probes(self) -> usize {
        match self {
            LzParse::Fast => 16,
            LzParse::Better => 1024,
        }
    }
}

fn lz_hash(inp: &[u8], pos: usize) -> usize {
    let v = u32::from_le_bytes([inp[pos], inp[pos + 1], inp[pos + 2], 0]);
    let h = v.wrapping_mul(2654435769);
    (h >> (32 - HTAB_LOG2)) as usize
}

struct LzOutput<'o, 'a> {
    out: &'o mut BufOutput<'a>,
    extended: bool,
    flag_pos: usize,
    flags_left: u8,
}

impl<'o, 'a> LzOutput<'o, 'a> {
    fn new(out: &'o mut BufOutput<'a>, extended: bool) -> Self {
        Self {
            out,
            extended,
            flag_pos: 0,
            flags_left: 0,
        }
    }

    /// Claims the next flag bit, starting a new group when needed
    fn token(&mut self, is_backref: bool) -> Result<(), CompressError> {
        if self.flags_left == 0 {
            self.flag_pos = self.out.pos;
            self.out.putc(0)?;
            self.flags_left = 8;
        }
        self.flags_left -= 1;
        if is_backref {
            self.out.buf[self.flag_pos] |= 1 << self.flags_left;
        }
        Ok(())
    }
}

impl<'o, 'a> OutputSink<CompressError> for LzOutput<'o, 'a> {
    fn put_lits(&mut self, lits: &[u8]) -> Result<(), CompressError> {
        for &c in lits {
            self.token(false)?;
            self.out.putc(c)?;
        }
        Ok(())
    }

    fn put_backref(&mut self, disp: usize, len: usize) -> Result<(), CompressError> {
        debug_assert!(disp < WINDOW);
        debug_assert!(len >= MIN_MATCH);

        self.token(true)?;
        let disp_hi = disp >> 8;
        if !self.extended {
            debug_assert!(len <= MAX_PLAIN_MATCH);
            self.out.putc(((len - MIN_MATCH) << 4 | disp_hi) as u8)?;
        } else if len <= 0x10 {
            self.out.putc(((len - 1) << 4 | disp_hi) as u8)?;
        } else if len <= 0x110 {
            let len = len - 0x11;
            self.out.putc((len >> 4) as u8)?;
            self.out.putc(((len & 0xf) << 4 | disp_hi) as u8)?;
        } else {
            debug_assert!(len <= MAX_EXTENDED_MATCH);
            let len = len - 0x111;
            self.out.putc((0x10 | len >> 12) as u8)?;
            self.out.putc((len >> 4) as u8)?;
            self.out.putc(((len & 0xf) << 4 | disp_hi) as u8)?;
        }
        self.out.putc(disp as u8)
    }
}

/// Holds state for performing compression operations
///
/// Hash chains over 3-byte prefixes: `head` maps a hash to the latest position (plus one), and
/// `prev` links each position in the window to the previous one with the same hash.
pub struct LzCompressState {
    head: [u32; HTAB_SZ],
    prev: [u32; WINDOW],
}

impl Default for LzCompressState {
    fn default() -> Self {
        Self::new()
    }
}

impl LzCompressState {
    pub fn new() -> Self {
        Self {
            head: [0; HTAB_SZ],
            prev: [0; WINDOW],
        }
    }

    fn insert(&mut self, inp: &[u8], pos: usize) {
        if pos + MIN_MATCH <= inp.len() {
            let hash = lz_hash(inp, pos);
            self.prev[pos % WINDOW] = self.head[hash];
            self.head[hash] = pos as u32 + 1;
        }
    }

    /// Longest match for `pos` as `(disp, len)`; equal lengths keep the nearest candidate
    fn find(
        &self,
        inp: &[u8],
        pos: usize,
        max_len: usize,
        probes: usize,
    ) -> Option<(usize, usize)> {
        if pos + MIN_MATCH > inp.len() {
            return None;
        }
        let max_len = usize::min(max_len, inp.len() - pos);
        let want = &inp[pos..pos + max_len];

        let mut best = None;
        let mut best_len = MIN_MATCH - 1;
        let mut cand = self.head[lz_hash(inp, pos)] as usize;
        for _ in 0..probes {
            if cand == 0 {
                break;
            }
            let cand_pos = cand - 1;
            let dist = pos - cand_pos;
            if dist > WINDOW {
                break;
            }

            if inp[cand_pos + best_len] == want[best_len] {
                let len = inp[cand_pos..]
                    .iter()
                    .zip(want)
                    .take_while(|(a, b)| a == b)
                    .count();
                if len > best_len {
                    best_len = len;
                    best = Some((dist - 1, len));
                    if len == max_len {
                        break;
                    }
                }
            }

            cand = self.prev[cand_pos % WINDOW] as usize;
        }
        best
    }

    fn compress_impl<L: OutputSink<CompressError>>(
        &mut self,
        inp: &[u8],
        outp: &mut L,
        max_len: usize,
        parse: LzParse,
    ) -> Result<(), CompressError> {
        self.head.fill(0);
        self.prev.fill(0);

        let probes = parse.max_probes();
        let mut hashed = 0;
        let mut pos = 0;

        while pos < inp.len() {
            while hashed < pos {
                self.insert(inp, hashed);
                hashed += 1;
            }

            let Some((disp, len)) = self.find(inp, pos, max_len, probes) else {
                outp.put_lits(&inp[pos..pos + 1])?;
                pos += 1;
                continue;
            };

            if parse == LzParse::Better {
                // would starting one byte later pay off?
                self.insert(inp, pos);
                hashed = pos + 1;
                if let Some((_, next_len)) = self.find(inp, pos + 1, max_len, probes) {
                    if next_len > len {
                        outp.put_lits(&inp[pos..pos + 1])?;
                        pos += 1;
                        continue;
                    }
                }
            }

            outp.put_backref(disp, len)?;
            pos += len;
        }

        Ok(())
    }

    /// Compress the input into a preallocated buffer, header included
    pub fn compress_to_buf(
        &mut self,
        inp: &[u8],
        outp: &mut [u8],
        extended: bool,
        parse: LzParse,
    ) -> Result<CompressOutcome, CompressError> {
        let max_len = if extended {
            MAX_EXTENDED_MATCH
        } else {
            MAX_PLAIN_MATCH
        };
        let header = CompressionHeader::new(CompressionType::Lz { extended }, 0);
        encode_block(inp, outp, header, |outp| {
            self.compress_impl(inp, &mut LzOutput::new(outp, extended), max_len, parse)
        })
    }
}

/// LZ77-compresses `src` into `dst`
///
/// `parse` trades speed for ratio; neither mode searches exhaustively.
pub fn compress_lz(
    src: &[u8],
    dst: &mut [u8],
    extended: bool,
    parse: LzParse,
) -> Result<CompressOutcome, CompressError> {
    LzCompressState::new().compress_to_buf(src, dst, extended, parse)
}

/// Decodes a whole LZ77 block into `dst`
pub fn uncompress_lz(src: &[u8], dst: &mut [u8]) -> Result<usize, DecompressError> {
    let header = CompressionHeader::parse(src)?;
    decode_all(LzContext::new(dst, &header)?, src)
}

/// Incremental LZ77 decoder
///
/// The window is the destination itself, so a back-reference may reach into output produced by
/// any earlier call.
pub struct LzContext<'a> {
    stream: DecodeStream<'a>,
    extended: bool,
    flags: u8,
    flags_left: u8,
    token: [u8; 4],
    token_len: usize,
}

impl<'a> LzContext<'a> {
    pub fn new(dst: &'a mut [u8], header: &CompressionHeader) -> Result<Self, DecompressError> {
        let CompressionType::Lz { extended } = header.kind else {
            return Err(DecompressError::TypeMismatch);
        };
        Ok(Self {
            stream: DecodeStream::new(dst, header)?,
            extended,
            flags: 0,
            flags_left: 0,
            token: [0; 4],
            token_len: 0,
        })
    }

    fn token_size(&self) -> usize {
        if !self.extended {
            return 2;
        }
        match self.token[0] >> 4 {
            0 => 3,
            1 => 4,
            _ => 2,
        }
    }

    /// `(disp, len)` of the buffered back-reference
    fn decode_token(&self) -> (usize, usize) {
        let t = self.token.map(|b| b as usize);
        if !self.extended {
            return ((t[0] & 0xf) << 8 | t[1], (t[0] >> 4) + MIN_MATCH);
        }
        match t[0] >> 4 {
            0 => ((t[1] & 0xf) << 8 | t[2], ((t[0] & 0xf) << 4 | t[1] >> 4) + 0x11),
            1 => (
                (t[2] & 0xf) << 8 | t[3],
                ((t[0] & 0xf) << 12 | t[1] << 4 | t[2] >> 4) + 0x111,
            ),
            n => ((t[0] & 0xf) << 8 | t[1], n + 1),
        }
    }

    fn next_flag(&mut self) {
        self.flags <<= 1;
        self.flags_left -= 1;
    }

    fn step<'c>(&mut self, chunk: &'c [u8]) -> Result<&'c [u8], DecompressError> {
        let (&c, rest) = chunk.split_first().ok_or(DecompressError::InputTruncated)?;

        if self.flags_left == 0 {
            self.flags = c;
            self.flags_left = 8;
            return Ok(rest);
        }

        if self.flags & 0x80 == 0 {
            self.stream.out.put_lits(&[c])?;
            self.next_flag();
            return Ok(rest);
        }

        // back-reference bytes may arrive across several calls
        self.token[self.token_len] = c;
        self.token_len += 1;
        if self.token_len == self.token_size() {
            self.token_len = 0;
            let (disp, len) = self.decode_token();
            self.stream.out.put_backref(disp, len)?;
            self.next_flag();
        }
        Ok(rest)
    }
}
impl_uncomp_context!(LzContext);
