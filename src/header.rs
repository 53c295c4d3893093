use crate::DecompressError;

/// Size of the header that starts every block
pub const HEADER_SIZE: usize = 5;

/// Isolates the base format (and the Dif flag) in the tag byte
pub const TYPE_MASK: u8 = 0xf0;
/// Covers the whole tag byte, including the format flags
pub const TYPE_EX_MASK: u8 = 0xff;
/// Set in the tag byte when the payload decodes to delta-filtered bytes
pub const DIFF_FLAG: u8 = 0x80;

const TAG_NONE: u8 = 0x00;
const TAG_LZ: u8 = 0x10;
const TAG_LZ_EXTENDED: u8 = 0x11;
const TAG_HUFF_4BIT: u8 = 0x24;
const TAG_HUFF_8BIT: u8 = 0x28;
const TAG_RL: u8 = 0x30;
const TAG_FASTLZ: u8 = 0x40;

/// Format of a block's payload
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CompressionType {
    /// Stored verbatim
    None,
    /// Sliding-window LZ77
    Lz {
        /// Uses the wider length encoding
        extended: bool,
    },
    /// Canonical Huffman
    Huffman {
        /// Codes nibbles (16 symbols) instead of bytes (256 symbols)
        four_bit: bool,
    },
    /// Run-length
    Rl,
    /// FastLZ level 1 or 2
    FastLz,
}

impl CompressionType {
    /// The tag byte for this format, without the Dif flag
    pub const fn tag(self) -> u8 {
        match self {
            CompressionType::None => TAG_NONE,
            CompressionType::Lz { extended: false } => TAG_LZ,
            CompressionType::Lz { extended: true } => TAG_LZ_EXTENDED,
            CompressionType::Huffman { four_bit: true } => TAG_HUFF_4BIT,
            CompressionType::Huffman { four_bit: false } => TAG_HUFF_8BIT,
            CompressionType::Rl => TAG_RL,
            CompressionType::FastLz => TAG_FASTLZ,
        }
    }

    /// Most output a single payload byte can produce in this format
    ///
    /// Reached by the longest token each format has: a 4-byte extended LZ match, a 2-byte RL
    /// run, a chained FastLZ level 2 length, or 1-bit Huffman codes.
    pub(crate) const fn max_expansion(self) -> usize {
        match self {
            CompressionType::None => 1,
            CompressionType::Lz { extended: false } => 9,
            CompressionType::Lz { extended: true } => 16452,
            CompressionType::Huffman { .. } => 8,
            CompressionType::Rl => 65,
            CompressionType::FastLz => 256,
        }
    }

    /// Parses a tag byte with the Dif flag already stripped
    pub const fn from_tag(tag: u8) -> Option<Self> {
        Some(match tag {
            TAG_NONE => CompressionType::None,
            TAG_LZ => CompressionType::Lz { extended: false },
            TAG_LZ_EXTENDED => CompressionType::Lz { extended: true },
            TAG_HUFF_4BIT => CompressionType::Huffman { four_bit: true },
            TAG_HUFF_8BIT => CompressionType::Huffman { four_bit: false },
            TAG_RL => CompressionType::Rl,
            TAG_FASTLZ => CompressionType::FastLz,
            _ => return None,
        })
    }
}

/// The self-describing prefix of every block
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CompressionHeader {
    pub kind: CompressionType,
    /// Payload decodes to delta-filtered bytes, see [`unfilter_diff`](crate::unfilter_diff)
    pub diff_filtered: bool,
    /// Size of the original data; callers size their destination from this
    pub uncompressed_size: u32,
}

impl CompressionHeader {
    pub const fn new(kind: CompressionType, uncompressed_size: u32) -> Self {
        Self {
            kind,
            diff_filtered: false,
            uncompressed_size,
        }
    }

    /// Reads the header at the start of `src`
    pub fn parse(src: &[u8]) -> Result<Self, DecompressError> {
        let bytes = src
            .first_chunk::<HEADER_SIZE>()
            .ok_or(DecompressError::InputTruncated)?;
        let tag = bytes[0];
        let kind =
            CompressionType::from_tag(tag & !DIFF_FLAG).ok_or(DecompressError::UnknownType(tag))?;
        let uncompressed_size = u32::from_le_bytes([bytes[1], bytes[2], bytes[3], bytes[4]]);
        Ok(Self {
            kind,
            diff_filtered: tag & DIFF_FLAG != 0,
            uncompressed_size,
        })
    }

    pub fn to_bytes(&self) -> [u8; HEADER_SIZE] {
        let mut tag = self.kind.tag();
        if self.diff_filtered {
            tag |= DIFF_FLAG;
        }
        let size = self.uncompressed_size.to_le_bytes();
        [tag, size[0], size[1], size[2], size[3]]
    }

    pub(crate) fn size(&self) -> usize {
        self.uncompressed_size as usize
    }
}

/// Reads the format of the block at the start of `src`
///
/// Unknown tags are an error, never a guess.
pub fn get_compression_type(src: &[u8]) -> Result<CompressionType, DecompressError> {
    CompressionHeader::parse(src).map(|h| h.kind)
}

/// Reads the original size of the block at the start of `src`
pub fn get_uncompressed_size(src: &[u8]) -> Result<u32, DecompressError> {
    CompressionHeader::parse(src).map(|h| h.uncompressed_size)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tags() {
        let all = [
            CompressionType::None,
            CompressionType::Lz { extended: false },
            CompressionType::Lz { extended: true },
            CompressionType::Huffman { four_bit: true },
            CompressionType::Huffman { four_bit: false },
            CompressionType::Rl,
            CompressionType::FastLz,
        ];
        for kind in all {
            assert_eq!(CompressionType::from_tag(kind.tag()), Some(kind));
            assert_eq!(kind.tag() & DIFF_FLAG, 0);
        }
        assert_eq!(CompressionType::Rl.tag() & TYPE_MASK, 0x30);
        assert_eq!(CompressionType::from_tag(0x20), None);
        assert_eq!(CompressionType::from_tag(0x12), None);
        assert_eq!(CompressionType::from_tag(0x50), None);
        assert_eq!(CompressionType::from_tag(0x31), None);
    }

    #[test]
    fn test_layout() {
        let header = CompressionHeader {
            kind: CompressionType::Huffman { four_bit: false },
            diff_filtered: true,
            uncompressed_size: 0x0102_0304,
        };
        let bytes = header.to_bytes();
        assert_eq!(bytes, [0xa8, 0x04, 0x03, 0x02, 0x01]);
        assert_eq!(CompressionHeader::parse(&bytes), Ok(header));
    }

    #[test]
    fn test_introspection() {
        let block = [0x11, 0x40, 0x00, 0x00, 0x00, 0xaa];
        assert_eq!(
            get_compression_type(&block),
            Ok(CompressionType::Lz { extended: true })
        );
        assert_eq!(get_uncompressed_size(&block), Ok(64));
    }

    #[test]
    fn test_bad_headers() {
        assert_eq!(
            CompressionHeader::parse(&[0x30, 1, 0, 0]),
            Err(DecompressError::InputTruncated)
        );
        assert_eq!(
            get_compression_type(&[0x70, 1, 0, 0, 0]),
            Err(DecompressError::UnknownType(0x70))
        );
        assert_eq!(
            get_compression_type(&[0xf0, 1, 0, 0, 0]),
            Err(DecompressError::UnknownType(0xf0))
        );
    }
}
