use std::io::{Read, Write};

use crate::ofp_error::Result;

/// Set bit `bit` of `x` on if `toggle` is true, otherwise off.
pub fn bit(bit: u64, x: u64, toggle: bool) -> u64 {
    if toggle {
        x | (1 << bit)
    } else {
        x & !(1 << bit)
    }
}

/// Test whether bit `bit` of `x` is set.
pub fn test_bit(bit: u64, x: u64) -> bool {
    (x >> bit) & 1 == 1
}

/// Round `len` up to the next multiple of 8.
pub fn pad_to_8(len: usize) -> usize {
    (len + 7) / 8 * 8
}

/// Number of zero bytes needed after `len` bytes to reach an 8-byte boundary.
pub fn padding_for(len: usize) -> usize {
    pad_to_8(len) - len
}

pub fn write_padding_bytes(bytes: &mut Vec<u8>, count: usize) {
    bytes.resize(bytes.len() + count, 0);
}

pub fn bytes_of_mac(addr: u64) -> [u8; 6] {
    let mut arr = [0; 6];
    for (i, b) in arr.iter_mut().enumerate() {
        *b = ((addr >> (8 * (5 - i))) & 0xff) as u8;
    }
    arr
}

pub fn mac_of_bytes(addr: [u8; 6]) -> u64 {
    addr.iter().fold(0, |acc, b| (acc << 8) | *b as u64)
}

/// Length of the contiguous prefix of a network mask, computed by population count.
pub fn prefix_len(mask: u32) -> u32 {
    mask.count_ones()
}

/// Network mask for a prefix of `len` bits (`len` is clamped to 32).
pub fn mask_of_prefix(len: u32) -> u32 {
    match len {
        0 => 0,
        l if l >= 32 => 0xffff_ffff,
        l => !0u32 << (32 - l),
    }
}

/// Read a fixed-width, NUL padded string field.
pub fn read_fixed_size_string<R: Read>(bytes: &mut R, width: usize) -> Result<String> {
    let mut arr = vec![0; width];
    bytes.read_exact(&mut arr)?;
    let end = arr.iter().position(|b| *b == 0).unwrap_or(width);
    Ok(String::from_utf8_lossy(&arr[..end]).into_owned())
}

/// Write `s` into a fixed-width field, truncating and NUL padding as needed.
pub fn write_fixed_size_string<W: Write>(bytes: &mut W, s: &str, width: usize) -> Result<()> {
    let mut arr = vec![0; width];
    let raw = s.as_bytes();
    let n = raw.len().min(width.saturating_sub(1));
    arr[..n].copy_from_slice(&raw[..n]);
    bytes.write_all(&arr)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn padding() {
        assert_eq!(pad_to_8(0), 0);
        assert_eq!(pad_to_8(1), 8);
        assert_eq!(pad_to_8(8), 8);
        assert_eq!(pad_to_8(14), 16);
        assert_eq!(padding_for(10), 6);
        assert_eq!(padding_for(16), 0);
    }

    #[test]
    fn bits_toggle() {
        assert_eq!(bit(3, 0, true), 8);
        assert_eq!(bit(3, 0xff, false), 0xf7);
        assert!(test_bit(21, 1 << 21));
        assert!(!test_bit(20, 1 << 21));
    }

    #[test]
    fn mac_conversion() {
        let mac = [0x00, 0x11, 0x22, 0x33, 0x44, 0x55];
        assert_eq!(mac_of_bytes(mac), 0x0011_2233_4455);
        assert_eq!(bytes_of_mac(0x0011_2233_4455), mac);
    }

    #[test]
    fn prefixes() {
        assert_eq!(prefix_len(0xffff_ff00), 24);
        assert_eq!(mask_of_prefix(24), 0xffff_ff00);
        assert_eq!(mask_of_prefix(0), 0);
        assert_eq!(mask_of_prefix(40), 0xffff_ffff);
    }

    #[test]
    fn fixed_strings() {
        let mut v = vec![];
        write_fixed_size_string(&mut v, "eth0", 16).unwrap();
        assert_eq!(v.len(), 16);
        let mut cursor = std::io::Cursor::new(v);
        assert_eq!(read_fixed_size_string(&mut cursor, 16).unwrap(), "eth0");
    }
}
