//! Arrays of fixed-width unsigned integers packed without padding
//!
//! Element `i` of width `bits` occupies stream bits `bits * i .. bits * (i + 1)`, where stream bit
//! `n` is bit `n % 8` of byte `n / 8` (least significant bit first). There is no header; the
//! caller supplies `bits` on every access.

/// Number of bytes needed to hold `count` values of `bits` bits each
pub const fn packed_len(bits: u32, count: usize) -> usize {
    (bits as usize * count + 7) / 8
}

fn check_bits(bits: u32) {
    assert!(
        (1..=32).contains(&bits),
        "packed value width must be 1..=32 bits"
    );
}

/// Reads the `index`th `bits`-wide value from `buf`
///
/// # Panics
///
/// Panics if `bits` is not in `1..=32` or the value lies past the end of `buf`.
pub fn get_packed_value(buf: &[u8], bits: u32, index: usize) -> u32 {
    check_bits(bits);

    let mut bitpos = bits as usize * index;
    let mut done = 0;
    let mut value = 0u32;
    while done < bits {
        let shift = (bitpos % 8) as u32;
        let take = u32::min(8 - shift, bits - done);
        let mask = ((1u16 << take) - 1) as u8;
        let chunk = (buf[bitpos / 8] >> shift) & mask;
        value |= (chunk as u32) << done;
        done += take;
        bitpos += take as usize;
    }
    value
}

/// Writes `value`, truncated to `bits` bits, as the `index`th value of `buf`
///
/// Bits belonging to neighbouring values are left untouched.
///
/// # Panics
///
/// Panics if `bits` is not in `1..=32` or the value lies past the end of `buf`.
pub fn set_packed_value(buf: &mut [u8], bits: u32, index: usize, value: u32) {
    check_bits(bits);

    let mut bitpos = bits as usize * index;
    let mut done = 0;
    while done < bits {
        let shift = (bitpos % 8) as u32;
        let take = u32::min(8 - shift, bits - done);
        let mask = (((1u16 << take) - 1) as u8) << shift;
        let chunk = ((value >> done) as u8) << shift;
        let byte = &mut buf[bitpos / 8];
        *byte = (*byte & !mask) | (chunk & mask);
        done += take;
        bitpos += take as usize;
    }
}
