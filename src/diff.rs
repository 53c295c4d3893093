//! Byte-wise delta filter
//!
//! Slowly varying data (sample streams, gradients) turns into runs of small values once each
//! byte is replaced by its difference from the previous one, which the real codecs then shrink.
//! The first byte is kept as is; all arithmetic wraps.

use crate::{CompressError, DecompressError};

/// Replaces each byte with its difference from the previous input byte
///
/// Returns the number of bytes written, which is `src.len()`.
pub fn filter_diff(src: &[u8], dst: &mut [u8]) -> Result<usize, CompressError> {
    let dst = dst
        .get_mut(..src.len())
        .ok_or(CompressError::OutputTooSmall)?;
    let mut prev = 0u8;
    for (d, &s) in dst.iter_mut().zip(src) {
        *d = s.wrapping_sub(prev);
        prev = s;
    }
    Ok(src.len())
}

/// Inverse of [`filter_diff`]: each output byte is the running sum of the input so far
pub fn unfilter_diff(src: &[u8], dst: &mut [u8]) -> Result<usize, DecompressError> {
    let dst = dst
        .get_mut(..src.len())
        .ok_or(DecompressError::OutputTooSmall)?;
    let mut acc = 0u8;
    for (d, &s) in dst.iter_mut().zip(src) {
        acc = acc.wrapping_add(s);
        *d = acc;
    }
    Ok(src.len())
}

pub fn filter_diff_in_place(buf: &mut [u8]) {
    let mut prev = 0u8;
    for b in buf {
        let cur = *b;
        *b = cur.wrapping_sub(prev);
        prev = cur;
    }
}

pub fn unfilter_diff_in_place(buf: &mut [u8]) {
    let mut acc = 0u8;
    for b in buf {
        acc = acc.wrapping_add(*b);
        *b = acc;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filter() {
        let mut out = [0u8; 5];
        assert_eq!(filter_diff(&[10, 11, 13, 12, 0], &mut out), Ok(5));
        assert_eq!(out, [10, 1, 2, 0xff, 0xf4]);
    }

    #[test]
    fn test_unfilter() {
        let mut out = [0u8; 6];
        assert_eq!(unfilter_diff(&[10, 1, 2, 0xff, 0xf4], &mut out), Ok(5));
        assert_eq!(out, [10, 11, 13, 12, 0, 0]);
    }

    #[test]
    fn test_in_place() {
        let orig = [200u8, 201, 202, 3, 3, 255, 0];
        let mut buf = orig;
        filter_diff_in_place(&mut buf);
        assert_eq!(buf, [200, 1, 1, 57, 0, 252, 1]);
        unfilter_diff_in_place(&mut buf);
        assert_eq!(buf, orig);
    }

    #[test]
    fn test_short_output() {
        let mut out = [0u8; 2];
        assert_eq!(
            unfilter_diff(&[1, 2, 3], &mut out),
            Err(DecompressError::OutputTooSmall)
        );
        assert_eq!(
            filter_diff(&[1, 2, 3], &mut out),
            Err(CompressError::OutputTooSmall)
        );
        assert_eq!(filter_diff(&[], &mut []), Ok(0));
    }
}
