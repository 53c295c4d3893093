/// Decompression errors
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[non_exhaustive]
pub enum DecompressError {
    /// The input ended before the declared output size was produced.
    #[error("input was truncated")]
    InputTruncated,
    /// A back-reference points before the start of the output.
    #[error("invalid backreference")]
    InvalidBackreference,
    /// The destination is shorter than the size declared in the header.
    #[error("output buffer was insufficient")]
    OutputTooSmall,
    /// The payload describes more output than the header declared.
    #[error("compressed data overruns the declared size")]
    OutputOverrun,
    /// The tag byte names no known format.
    #[error("unknown compression type {0:#04x}")]
    UnknownType(u8),
    /// A decoder was handed a header for a different format.
    #[error("header does not match this decoder")]
    TypeMismatch,
    /// The serialized Huffman code lengths do not form a usable code.
    #[error("invalid huffman code table")]
    InvalidCodeTable,
    /// The Huffman bit stream contains a sequence matching no code.
    #[error("invalid huffman code")]
    InvalidCode,
    /// The FastLZ level marker is neither level 1 nor level 2.
    #[error("invalid fastlz level {0}")]
    InvalidLevel(u8),
    /// The buffer for the declared output size could not be allocated.
    #[error("could not allocate {0} bytes of output")]
    OutputAllocFailed(usize),
}

/// Compression errors
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[non_exhaustive]
pub enum CompressError {
    /// The output buffer was too small to hold all the output.
    ///
    /// The output that has been written *is* valid, but has been truncated.
    #[error("output buffer was insufficient")]
    OutputTooSmall,
    /// The input does not fit the 32-bit size field of the header.
    #[error("input exceeds the maximum block size")]
    InputTooLarge,
}

/// Successful result of a `compress_*` call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompressOutcome {
    /// A block of this many bytes (header included) was written.
    Compressed(usize),
    /// The encoding would not be smaller than the input; store it with
    /// [`compress_none`](crate::compress_none) instead.
    NotSmaller,
}

impl CompressOutcome {
    /// The single-integer form: the block size, or 0 when not smaller.
    pub fn legacy_size(self) -> usize {
        match self {
            CompressOutcome::Compressed(n) => n,
            CompressOutcome::NotSmaller => 0,
        }
    }
}
