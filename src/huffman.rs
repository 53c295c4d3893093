//! Canonical Huffman coding over bytes or nibbles
//!
//! The payload starts with one 4-bit code length per symbol, packed with
//! [`set_packed_value`]. The coded symbols follow as a bit stream; each code is written most
//! significant bit first, and stream bits fill each byte starting from bit 0. In 4-bit mode the low
//! nibble of every byte is coded before the high nibble.
//!
//! Code lengths come from a two-queue Huffman tree build. Leaves are ordered by
//! `(frequency, symbol)` and win ties against merged nodes, so the table is reproducible. Codes
//! longer than 15 bits are avoided by halving the frequencies and building again.

use crate::header::{CompressionHeader, CompressionType};
use crate::packed::{get_packed_value, packed_len, set_packed_value};
use crate::util::{
    decode_all, encode_block, impl_uncomp_context, BufOutput, DecodeStream, OutputSink,
};
use crate::{CompressError, CompressOutcome, DecompressError};

const MAX_SYMBOLS: usize = 256;
const MAX_CODE_LEN: usize = 15;
const LEN_BITS: u32 = 4;
const MAX_TABLE_BYTES: usize = packed_len(LEN_BITS, MAX_SYMBOLS);
const MAX_NODES: usize = 2 * MAX_SYMBOLS - 1;

const fn num_symbols(four_bit: bool) -> usize {
    if four_bit {
        16
    } else {
        MAX_SYMBOLS
    }
}

fn symbols(src: &[u8], four_bit: bool) -> impl Iterator<Item = u8> + '_ {
    src.iter().flat_map(move |&b| {
        let (pair, n) = if four_bit {
            ([b & 0xf, b >> 4], 2)
        } else {
            ([b, 0], 1)
        };
        pair.into_iter().take(n)
    })
}

/// Takes the lighter head of the leaf queue and the merged-node queue
fn pop_min(
    weight: &[u64],
    leaves: usize,
    leaf: &mut usize,
    merged: &mut usize,
    next: usize,
) -> usize {
    if *leaf < leaves && (*merged == next || weight[*leaf] <= weight[*merged]) {
        *leaf += 1;
        *leaf - 1
    } else {
        *merged += 1;
        *merged - 1
    }
}

/// Plain Huffman code lengths for `freqs`; returns the longest
fn tree_lengths(freqs: &[u64], lengths: &mut [u8]) -> usize {
    lengths.fill(0);

    let mut sorted = [(0u64, 0u16); MAX_SYMBOLS];
    let mut n = 0;
    for (sym, &f) in freqs.iter().enumerate().filter(|&(_, &f)| f > 0) {
        sorted[n] = (f, sym as u16);
        n += 1;
    }
    let sorted = &mut sorted[..n];
    sorted.sort_unstable();

    match &*sorted {
        [] => return 0,
        [(_, sym)] => {
            lengths[*sym as usize] = 1;
            return 1;
        }
        _ => {}
    }

    // nodes 0..n are the sorted leaves, merged nodes follow in creation order
    let mut weight = [0u64; MAX_NODES];
    let mut parent = [0u16; MAX_NODES];
    for (w, &(f, _)) in weight.iter_mut().zip(sorted.iter()) {
        *w = f;
    }

    let root = 2 * n - 2;
    let (mut leaf, mut merged) = (0, n);
    for next in n..=root {
        let a = pop_min(&weight, n, &mut leaf, &mut merged, next);
        let b = pop_min(&weight, n, &mut leaf, &mut merged, next);
        weight[next] = weight[a] + weight[b];
        parent[a] = next as u16;
        parent[b] = next as u16;
    }

    // parents always come after their children
    let mut depth = [0u8; MAX_NODES];
    for node in (0..root).rev() {
        depth[node] = depth[parent[node] as usize] + 1;
    }

    let mut longest = 0;
    for (&d, &(_, sym)) in depth.iter().zip(sorted.iter()) {
        lengths[sym as usize] = d;
        longest = usize::max(longest, d as usize);
    }
    longest
}

/// Code lengths limited to [`MAX_CODE_LEN`] bits
fn build_lengths(freqs: &[u64], lengths: &mut [u8]) {
    let mut scaled = [0u64; MAX_SYMBOLS];
    let scaled = &mut scaled[..freqs.len()];
    scaled.copy_from_slice(freqs);

    while tree_lengths(scaled, lengths) > MAX_CODE_LEN {
        for f in scaled.iter_mut().filter(|f| **f > 0) {
            *f = (*f + 1) / 2;
        }
        log::trace!("huffman: code too long, rescaling frequencies");
    }
}

/// Assigns canonical codes: shorter codes first, equal lengths in symbol order
fn canonical_codes(lengths: &[u8], codes: &mut [u16]) {
    let mut bl_count = [0u16; MAX_CODE_LEN + 1];
    for &len in lengths {
        bl_count[len as usize] += 1;
    }
    bl_count[0] = 0;

    let mut next_code = [0u16; MAX_CODE_LEN + 1];
    let mut code = 0u16;
    for bits in 1..=MAX_CODE_LEN {
        code = (code + bl_count[bits - 1]) << 1;
        next_code[bits] = code;
    }

    for (c, &len) in codes.iter_mut().zip(lengths) {
        if len != 0 {
            *c = next_code[len as usize];
            next_code[len as usize] += 1;
        }
    }
}

/// Accumulates codes into bytes, filling each byte from bit 0
struct BitWriter<'o, 'a> {
    out: &'o mut BufOutput<'a>,
    acc: u8,
    nbits: u32,
}

impl<'o, 'a> BitWriter<'o, 'a> {
    fn new(out: &'o mut BufOutput<'a>) -> Self {
        Self {
            out,
            acc: 0,
            nbits: 0,
        }
    }

    fn put_code(&mut self, code: u16, len: u8) -> Result<(), CompressError> {
        for i in (0..len).rev() {
            self.acc |= (((code >> i) & 1) as u8) << self.nbits;
            self.nbits += 1;
            if self.nbits == u8::BITS {
                self.out.putc(self.acc)?;
                self.acc = 0;
                self.nbits = 0;
            }
        }
        Ok(())
    }

    fn flush(self) -> Result<(), CompressError> {
        if self.nbits > 0 {
            self.out.putc(self.acc)?;
        }
        Ok(())
    }
}

fn compress_impl(inp: &[u8], outp: &mut BufOutput, four_bit: bool) -> Result<(), CompressError> {
    let nsyms = num_symbols(four_bit);

    let mut freqs = [0u64; MAX_SYMBOLS];
    for sym in symbols(inp, four_bit) {
        freqs[sym as usize] += 1;
    }

    let mut lengths = [0u8; MAX_SYMBOLS];
    build_lengths(&freqs[..nsyms], &mut lengths[..nsyms]);

    let mut table = [0u8; MAX_TABLE_BYTES];
    for (sym, &len) in lengths[..nsyms].iter().enumerate() {
        set_packed_value(&mut table, LEN_BITS, sym, len as u32);
    }
    outp.put_buf(&table[..packed_len(LEN_BITS, nsyms)])?;

    let mut codes = [0u16; MAX_SYMBOLS];
    canonical_codes(&lengths[..nsyms], &mut codes[..nsyms]);

    let mut bits = BitWriter::new(outp);
    for sym in symbols(inp, four_bit) {
        bits.put_code(codes[sym as usize], lengths[sym as usize])?;
    }
    bits.flush()
}

/// Huffman-codes `src` into `dst`, over nibbles if `four_bit` and bytes otherwise
pub fn compress_huff(
    src: &[u8],
    dst: &mut [u8],
    four_bit: bool,
) -> Result<CompressOutcome, CompressError> {
    let header = CompressionHeader::new(CompressionType::Huffman { four_bit }, 0);
    encode_block(src, dst, header, |outp| compress_impl(src, outp, four_bit))
}

/// Decodes a whole Huffman block into `dst`
pub fn uncompress_huff(src: &[u8], dst: &mut [u8]) -> Result<usize, DecompressError> {
    let header = CompressionHeader::parse(src)?;
    decode_all(HuffContext::new(dst, &header)?, src)
}

/// Symbols grouped by code length, enough to walk a canonical code bit by bit
struct DecodeTable {
    counts: [u16; MAX_CODE_LEN + 1],
    symbols: [u8; MAX_SYMBOLS],
}

impl DecodeTable {
    const EMPTY: Self = Self {
        counts: [0; MAX_CODE_LEN + 1],
        symbols: [0; MAX_SYMBOLS],
    };

    fn new(packed: &[u8], nsyms: usize) -> Result<Self, DecompressError> {
        let len_of = |sym| get_packed_value(packed, LEN_BITS, sym) as usize;

        let mut counts = [0u16; MAX_CODE_LEN + 1];
        for sym in 0..nsyms {
            counts[len_of(sym)] += 1;
        }
        counts[0] = 0;
        if counts.iter().all(|&c| c == 0) {
            return Err(DecompressError::InvalidCodeTable);
        }

        // incomplete codes are fine, over-subscribed ones are not
        let mut left = 1i32;
        for &count in &counts[1..] {
            left = (left << 1) - count as i32;
            if left < 0 {
                return Err(DecompressError::InvalidCodeTable);
            }
        }

        let mut offs = [0u16; MAX_CODE_LEN + 1];
        for len in 1..MAX_CODE_LEN {
            offs[len + 1] = offs[len] + counts[len];
        }
        let mut symbols = [0u8; MAX_SYMBOLS];
        for sym in 0..nsyms {
            let len = len_of(sym);
            if len != 0 {
                symbols[offs[len] as usize] = sym as u8;
                offs[len] += 1;
            }
        }

        Ok(Self { counts, symbols })
    }
}

/// Progress through the code currently being read
#[derive(Debug, Clone, Copy, Default)]
struct BitState {
    code: u32,
    first: u32,
    index: u32,
    len: usize,
}

impl BitState {
    fn push_bit(&mut self, bit: u32, table: &DecodeTable) -> Result<Option<u8>, DecompressError> {
        self.code |= bit;
        self.len += 1;
        let count = table.counts[self.len] as u32;
        if self.code < self.first + count {
            let sym = table.symbols[(self.index + self.code - self.first) as usize];
            *self = Self::default();
            return Ok(Some(sym));
        }
        if self.len == MAX_CODE_LEN {
            return Err(DecompressError::InvalidCode);
        }
        self.index += count;
        self.first = (self.first + count) << 1;
        self.code <<= 1;
        Ok(None)
    }
}

/// Incremental Huffman decoder
///
/// Buffers the code length table until it is complete, then decodes one payload byte per step.
/// A code may span any number of calls.
pub struct HuffContext<'a> {
    stream: DecodeStream<'a>,
    four_bit: bool,
    lengths: [u8; MAX_TABLE_BYTES],
    lengths_got: usize,
    table: DecodeTable,
    bits: BitState,
    low_nibble: Option<u8>,
}

impl<'a> HuffContext<'a> {
    pub fn new(dst: &'a mut [u8], header: &CompressionHeader) -> Result<Self, DecompressError> {
        let CompressionType::Huffman { four_bit } = header.kind else {
            return Err(DecompressError::TypeMismatch);
        };
        Ok(Self {
            stream: DecodeStream::new(dst, header)?,
            four_bit,
            lengths: [0; MAX_TABLE_BYTES],
            lengths_got: 0,
            table: DecodeTable::EMPTY,
            bits: BitState::default(),
            low_nibble: None,
        })
    }

    fn emit(&mut self, sym: u8) -> Result<(), DecompressError> {
        if !self.four_bit {
            return self.stream.out.put_lits(&[sym]);
        }
        match self.low_nibble.take() {
            None => {
                self.low_nibble = Some(sym);
                Ok(())
            }
            Some(low) => self.stream.out.put_lits(&[low | sym << 4]),
        }
    }

    fn step<'c>(&mut self, chunk: &'c [u8]) -> Result<&'c [u8], DecompressError> {
        let nsyms = num_symbols(self.four_bit);
        let table_len = packed_len(LEN_BITS, nsyms);
        if self.lengths_got < table_len {
            let n = usize::min(table_len - self.lengths_got, chunk.len());
            self.lengths[self.lengths_got..self.lengths_got + n].copy_from_slice(&chunk[..n]);
            self.lengths_got += n;
            if self.lengths_got == table_len {
                self.table = DecodeTable::new(&self.lengths[..table_len], nsyms)?;
            }
            return Ok(&chunk[n..]);
        }

        let (&c, rest) = chunk.split_first().ok_or(DecompressError::InputTruncated)?;
        for i in 0..u8::BITS {
            let bit = ((c >> i) & 1) as u32;
            if let Some(sym) = self.bits.push_bit(bit, &self.table)? {
                self.emit(sym)?;
                // the rest of the final byte is padding
                if self.stream.out.is_full() {
                    break;
                }
            }
        }
        Ok(rest)
    }
}
impl_uncomp_context!(HuffContext);
