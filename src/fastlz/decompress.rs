use super::compress::MAX_L1_DISP;
use super::CompressionLevel;
use crate::header::{CompressionHeader, CompressionType};
use crate::util::{decode_all, impl_uncomp_context, DecodeStream, OutputSink};
use crate::DecompressError;

/// Opcode length field meaning "more length bytes follow"
const LONG_MATCH: usize = 6;
const FAR_OFS: usize = 31 << 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MatchStep {
    Len,
    Disp,
    FarHi,
    FarLo { hi: usize },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Op,
    Literal { left: usize },
    Match { len: usize, ofs: usize, step: MatchStep },
}

/// Decodes a whole FastLZ block into `dst`
pub fn uncompress_fastlz(src: &[u8], dst: &mut [u8]) -> Result<usize, DecompressError> {
    let header = CompressionHeader::parse(src)?;
    decode_all(FastLzContext::new(dst, &header)?, src)
}

/// Incremental FastLZ decoder
///
/// The level is only known once the first payload byte arrives.
pub struct FastLzContext<'a> {
    stream: DecodeStream<'a>,
    level: Option<CompressionLevel>,
    state: State,
}

impl<'a> FastLzContext<'a> {
    pub fn new(dst: &'a mut [u8], header: &CompressionHeader) -> Result<Self, DecompressError> {
        if header.kind != CompressionType::FastLz {
            return Err(DecompressError::TypeMismatch);
        }
        Ok(Self {
            stream: DecodeStream::new(dst, header)?,
            level: None,
            state: State::Op,
        })
    }

    fn is_level2(&self) -> bool {
        self.level == Some(CompressionLevel::Level2)
    }

    fn backref(&mut self, disp: usize, len: usize) -> Result<(), DecompressError> {
        self.state = State::Op;
        self.stream.out.put_backref(disp, len + 3)
    }

    fn step<'c>(&mut self, chunk: &'c [u8]) -> Result<&'c [u8], DecompressError> {
        let (&c, rest) = chunk.split_first().ok_or(DecompressError::InputTruncated)?;

        match self.state {
            State::Op => {
                let mut ctrl = c as usize;
                if self.level.is_none() {
                    self.level = Some(match c >> 5 {
                        0 => CompressionLevel::Level1,
                        1 => CompressionLevel::Level2,
                        marker => return Err(DecompressError::InvalidLevel(marker)),
                    });
                    ctrl &= 31;
                }

                self.state = if ctrl < 32 {
                    State::Literal { left: ctrl + 1 }
                } else {
                    let len = (ctrl >> 5) - 1;
                    let step = if len == LONG_MATCH {
                        MatchStep::Len
                    } else {
                        MatchStep::Disp
                    };
                    State::Match {
                        len,
                        ofs: (ctrl & 31) << 8,
                        step,
                    }
                };
                Ok(rest)
            }
            State::Literal { left } => {
                let n = usize::min(left, chunk.len());
                self.stream.out.put_lits(&chunk[..n])?;
                self.state = if n == left {
                    State::Op
                } else {
                    State::Literal { left: left - n }
                };
                Ok(&chunk[n..])
            }
            State::Match { len, ofs, step } => {
                match step {
                    MatchStep::Len => {
                        // level 2 chains length bytes while they are saturated
                        let step = if self.is_level2() && c == 0xff {
                            MatchStep::Len
                        } else {
                            MatchStep::Disp
                        };
                        self.state = State::Match {
                            len: len + c as usize,
                            ofs,
                            step,
                        };
                    }
                    MatchStep::Disp => {
                        if self.is_level2() && c == 0xff && ofs == FAR_OFS {
                            self.state = State::Match {
                                len,
                                ofs,
                                step: MatchStep::FarHi,
                            };
                        } else {
                            self.backref(ofs + c as usize, len)?;
                        }
                    }
                    MatchStep::FarHi => {
                        self.state = State::Match {
                            len,
                            ofs,
                            step: MatchStep::FarLo {
                                hi: (c as usize) << 8,
                            },
                        };
                    }
                    MatchStep::FarLo { hi } => {
                        self.backref(MAX_L1_DISP + hi + c as usize, len)?;
                    }
                }
                Ok(rest)
            }
        }
    }
}
impl_uncomp_context!(FastLzContext);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fastlz::{compress_bound, compress_fastlz};
    use crate::{CompressOutcome, UncompContext};
    extern crate std;
    use std::vec;
    use std::vec::Vec;

    fn compress(inp: &[u8], level: CompressionLevel) -> Vec<u8> {
        let mut out = vec![0u8; compress_bound(inp.len())];
        match compress_fastlz(inp, &mut out, level).unwrap() {
            CompressOutcome::Compressed(n) => out.truncate(n),
            CompressOutcome::NotSmaller => panic!("expected to compress"),
        }
        out
    }

    /// Text with plenty of short and long repeats plus a few noisy bytes
    fn sample(len: usize) -> Vec<u8> {
        let mut state = 0x1234_5678u32;
        let mut out = vec![b'x'; 40];
        while out.len() < len {
            state = state.wrapping_mul(1103515245).wrapping_add(12345);
            match state >> 29 {
                0 => out.extend_from_slice(b"lorem ipsum dolor sit amet "),
                1 => out.extend([(state >> 8) as u8; 40]),
                2 | 3 => out.push((state >> 16) as u8),
                _ => out.extend_from_slice(b"fastlz "),
            }
        }
        out.truncate(len);
        out
    }

    #[test]
    fn test_handmade_lv1() {
        let block = [0x40, 5, 0, 0, 0, 0x00, 1, 0x40, 0x00];
        let mut out = [0u8; 5];
        assert_eq!(uncompress_fastlz(&block, &mut out), Ok(5));
        assert_eq!(out, [1; 5]);
    }

    #[test]
    fn test_handmade_lv2_far() {
        let mut block = vec![0x40, 0, 0, 0, 0];
        block[1..5].copy_from_slice(&9004u32.to_le_bytes());
        // one literal, then a 9000 byte run
        block.extend([0x20, 7, 0xe0]);
        block.extend([0xff; 35]);
        block.extend([66, 0x00]);
        // far reference at distance 8193
        block.extend([0x3f, 0xff, 0x00, 0x01]);

        let mut out = vec![0u8; 9004];
        assert_eq!(uncompress_fastlz(&block, &mut out), Ok(9004));
        assert!(out.iter().all(|&b| b == 7));

        // byte at a time, through every length and distance extension byte
        let mut out2 = vec![0u8; 9004];
        let mut ctx =
            FastLzContext::new(&mut out2, &CompressionHeader::parse(&block).unwrap()).unwrap();
        let total: usize = block.chunks(1).map(|b| ctx.feed(b).unwrap()).sum();
        assert_eq!(total, 9004);
        assert!(ctx.is_finished());
        drop(ctx);
        assert_eq!(out, out2);
    }

    #[test]
    fn test_round_trip() {
        for len in [100, 5000, 70000] {
            let inp = sample(len);
            for level in [
                CompressionLevel::Default,
                CompressionLevel::Level1,
                CompressionLevel::Level2,
            ] {
                let block = compress(&inp, level);
                let mut out = vec![0u8; len];
                assert_eq!(uncompress_fastlz(&block, &mut out), Ok(len));
                assert_eq!(out, inp, "len {} {:?}", len, level);
            }
        }
    }

    #[test]
    fn test_streaming_every_split() {
        let inp = sample(400);
        for level in [CompressionLevel::Level1, CompressionLevel::Level2] {
            let block = compress(&inp, level);
            let header = CompressionHeader::parse(&block).unwrap();
            for split in 0..=block.len() {
                let mut out = vec![0u8; inp.len()];
                let mut ctx = FastLzContext::new(&mut out, &header).unwrap();
                let a = ctx.feed(&block[..split]).unwrap();
                let b = ctx.feed(&block[split..]).unwrap();
                assert_eq!(a + b, inp.len());
                assert!(ctx.is_finished());
                drop(ctx);
                assert_eq!(out, inp, "split at {}", split);
            }
        }
    }

    #[test]
    fn test_corrupt() {
        let mut out = [0u8; 5];
        // level marker 2
        assert_eq!(
            uncompress_fastlz(&[0x40, 5, 0, 0, 0, 0x40, 1], &mut out),
            Err(DecompressError::InvalidLevel(2))
        );
        // reference before the start
        assert_eq!(
            uncompress_fastlz(&[0x40, 5, 0, 0, 0, 0x00, 1, 0x40, 0x01], &mut out),
            Err(DecompressError::InvalidBackreference)
        );
        // reference past the declared size
        assert_eq!(
            uncompress_fastlz(&[0x40, 5, 0, 0, 0, 0x00, 1, 0x60, 0x00], &mut out),
            Err(DecompressError::OutputOverrun)
        );
        // ends inside an opcode
        assert_eq!(
            uncompress_fastlz(&[0x40, 5, 0, 0, 0, 0x00, 1, 0x40], &mut out),
            Err(DecompressError::InputTruncated)
        );
        assert_eq!(
            uncompress_fastlz(&[0x10, 5, 0, 0, 0, 0x00, 1, 0x40, 0x00], &mut out),
            Err(DecompressError::TypeMismatch)
        );
    }
}
