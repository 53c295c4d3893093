//! Run-length coding
//!
//! The payload is a sequence of units, each starting with a flag byte. With bit 7 clear the
//! unit is `(flag & 0x7f) + 1` literal bytes; with bit 7 set it is a single value byte repeated
//! `(flag & 0x7f) + 3` times.

use crate::header::{CompressionHeader, CompressionType};
use crate::util::{
    decode_all, encode_block, impl_uncomp_context, BufOutput, DecodeStream, OutputSink,
};
use crate::{CompressError, CompressOutcome, DecompressError};

const RUN_FLAG: u8 = 0x80;
/// Shortest run worth a repeat unit
const MIN_RUN: usize = 3;
const MAX_RUN: usize = 0x7f + MIN_RUN;
const MAX_LITS: usize = 0x7f + 1;

fn put_lits(outp: &mut BufOutput, lits: &[u8]) -> Result<(), CompressError> {
    for chunk in lits.chunks(MAX_LITS) {
        outp.putc((chunk.len() - 1) as u8)?;
        outp.put_buf(chunk)?;
    }
    Ok(())
}

fn compress_impl(inp: &[u8], outp: &mut BufOutput) -> Result<(), CompressError> {
    let mut lits_start = 0;
    let mut pos = 0;

    while pos < inp.len() {
        let value = inp[pos];
        let run = inp[pos..]
            .iter()
            .take(MAX_RUN)
            .take_while(|&&b| b == value)
            .count();

        if run >= MIN_RUN {
            put_lits(outp, &inp[lits_start..pos])?;
            outp.putc(RUN_FLAG | (run - MIN_RUN) as u8)?;
            outp.putc(value)?;
            pos += run;
            lits_start = pos;
        } else {
            pos += 1;
        }
    }

    put_lits(outp, &inp[lits_start..])
}

/// Run-length encodes `src` into `dst`
pub fn compress_rl(src: &[u8], dst: &mut [u8]) -> Result<CompressOutcome, CompressError> {
    let header = CompressionHeader::new(CompressionType::Rl, 0);
    encode_block(src, dst, header, |outp| compress_impl(src, outp))
}

/// Decodes a whole run-length block into `dst`
pub fn uncompress_rl(src: &[u8], dst: &mut [u8]) -> Result<usize, DecompressError> {
    let header = CompressionHeader::parse(src)?;
    decode_all(RlContext::new(dst, &header)?, src)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RlState {
    Flag,
    Literal { left: usize },
    Repeat { len: usize },
}

/// Incremental run-length decoder
pub struct RlContext<'a> {
    stream: DecodeStream<'a>,
    state: RlState,
}

impl<'a> RlContext<'a> {
    pub fn new(dst: &'a mut [u8], header: &CompressionHeader) -> Result<Self, DecompressError> {
        if header.kind != CompressionType::Rl {
            return Err(DecompressError::TypeMismatch);
        }
        Ok(Self {
            stream: DecodeStream::new(dst, header)?,
            state: RlState::Flag,
        })
    }

    fn step<'c>(&mut self, chunk: &'c [u8]) -> Result<&'c [u8], DecompressError> {
        let out = &mut self.stream.out;
        match self.state {
            RlState::Flag => {
                let flag = chunk[0] as usize;
                self.state = if flag & RUN_FLAG as usize != 0 {
                    RlState::Repeat {
                        len: (flag & 0x7f) + MIN_RUN,
                    }
                } else {
                    RlState::Literal {
                        left: (flag & 0x7f) + 1,
                    }
                };
                Ok(&chunk[1..])
            }
            RlState::Literal { left } => {
                let n = usize::min(left, chunk.len());
                out.put_lits(&chunk[..n])?;
                self.state = if n == left {
                    RlState::Flag
                } else {
                    RlState::Literal { left: left - n }
                };
                Ok(&chunk[n..])
            }
            RlState::Repeat { len } => {
                out.put_run(chunk[0], len)?;
                self.state = RlState::Flag;
                Ok(&chunk[1..])
            }
        }
    }
}
impl_uncomp_context!(RlContext);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::UncompContext;
    extern crate std;
    use std::vec;
    use std::vec::Vec;

    fn compress(inp: &[u8]) -> Vec<u8> {
        let mut out = vec![0u8; inp.len() + 16];
        match compress_rl(inp, &mut out).unwrap() {
            CompressOutcome::Compressed(n) => out.truncate(n),
            CompressOutcome::NotSmaller => panic!("expected to compress"),
        }
        out
    }

    #[test]
    fn test_single_run() {
        let inp = [b'a'; 64];
        let block = compress(&inp);
        assert_eq!(block, [0x30, 64, 0, 0, 0, 0x80 | 61, b'a']);

        let mut out = [0u8; 64];
        assert_eq!(uncompress_rl(&block, &mut out), Ok(64));
        assert_eq!(out, inp);
    }

    #[test]
    fn test_mixed_units() {
        let mut inp = vec![1, 2];
        inp.extend([7; 12]);
        inp.extend([3, 3, 4]);
        inp.extend([5; 10]);
        inp.extend(1..=10);
        let block = compress(&inp);
        assert_eq!(
            block[5..],
            [
                0x01, 1, 2, // lits
                0x89, 7, // run of 12
                0x02, 3, 3, 4, // pairs stay literal
                0x87, 5, // run of 10
                0x09, 1, 2, 3, 4, 5, 6, 7, 8, 9, 10
            ]
        );
        let mut out = [0u8; 37];
        uncompress_rl(&block, &mut out).unwrap();
        assert_eq!(out[..], inp[..]);
    }

    #[test]
    fn test_long_units() {
        let mut inp = vec![0x55u8; 300];
        inp.extend((0..200).map(|i| (i * 7 + 1) as u8));
        let block = compress(&inp);
        // 130 + 130 + 40, then 128 + 72 literals
        assert_eq!(block[5..9], [0xff, 0x55, 0xff, 0x55]);
        assert_eq!(block[9..11], [0x80 | 37, 0x55]);
        assert_eq!(block[11], 0x7f);
        assert_eq!(block[11 + 129], 71);
        assert_eq!(block.len(), 5 + 6 + 129 + 73);

        let mut out = vec![0u8; inp.len()];
        uncompress_rl(&block, &mut out).unwrap();
        assert_eq!(out, inp);
    }

    #[test]
    fn test_not_smaller() {
        let inp = [
            0x3b, 0xd2, 0x91, 0x07, 0xee, 0x45, 0x6a, 0xc8, 0x19, 0xf3, 0x82, 0x5d, 0xa0, 0x2e,
            0x74, 0xbf,
        ];
        let mut out = [0u8; 32];
        assert_eq!(compress_rl(&inp, &mut out), Ok(CompressOutcome::NotSmaller));
        assert_eq!(compress_rl(&[], &mut out), Ok(CompressOutcome::NotSmaller));
        // exactly as big as the input is still not smaller
        assert_eq!(
            compress_rl(&[1, 1, 1, 1, 1, 1, 1], &mut out),
            Ok(CompressOutcome::NotSmaller)
        );
        assert_eq!(
            compress_rl(&[1, 1, 1, 1, 1, 1, 1, 1], &mut out),
            Ok(CompressOutcome::Compressed(7))
        );
    }

    #[test]
    fn test_streaming_bytewise() {
        let mut inp = vec![9u8; 40];
        inp.extend_from_slice(b"run-length streaming");
        inp.extend([0u8; 17]);
        let block = compress(&inp);

        let mut out = vec![0u8; inp.len()];
        let header = CompressionHeader::parse(&block).unwrap();
        let mut ctx = RlContext::new(&mut out, &header).unwrap();
        let mut total = 0;
        for b in block.chunks(1) {
            assert!(!ctx.is_finished());
            total += ctx.feed(b).unwrap();
        }
        assert!(ctx.is_finished());
        assert_eq!(total, inp.len());
        drop(ctx);
        assert_eq!(out, inp);
    }

    #[test]
    fn test_streaming_every_split() {
        let inp = b"aaaaaaaaaabcbcbcbcddddddddddddddddddddddddxyz".to_vec();
        let block = compress(&inp);
        let header = CompressionHeader::parse(&block).unwrap();
        for split in 0..=block.len() {
            let mut out = vec![0u8; inp.len()];
            let mut ctx = RlContext::new(&mut out, &header).unwrap();
            let a = ctx.feed(&block[..split]).unwrap();
            let b = ctx.feed(&block[split..]).unwrap();
            assert_eq!(a + b, inp.len());
            assert!(ctx.is_finished());
            drop(ctx);
            assert_eq!(out, inp, "split at {}", split);
        }
    }

    #[test]
    fn test_starved_mid_repeat() {
        let block = [0x30, 5, 0, 0, 0, 0x82];
        let mut out = [0u8; 5];
        let mut ctx = RlContext::new(&mut out, &CompressionHeader::parse(&block).unwrap()).unwrap();
        assert_eq!(ctx.feed(&block), Ok(0));
        assert!(!ctx.is_finished());
        assert_eq!(ctx.feed(&[0x44]), Ok(5));
        assert!(ctx.is_finished());
    }

    #[test]
    fn test_corrupt() {
        let mut out = [0u8; 4];
        // repeat longer than the declared size
        assert_eq!(
            uncompress_rl(&[0x30, 4, 0, 0, 0, 0x82, 1], &mut out),
            Err(DecompressError::OutputOverrun)
        );
        // literal run longer than the declared size
        assert_eq!(
            uncompress_rl(&[0x30, 4, 0, 0, 0, 0x05, 1, 2, 3, 4, 5, 6], &mut out),
            Err(DecompressError::OutputOverrun)
        );
        // ends mid-unit
        assert_eq!(
            uncompress_rl(&[0x30, 4, 0, 0, 0, 0x03, 1, 2], &mut out),
            Err(DecompressError::InputTruncated)
        );
    }
}
