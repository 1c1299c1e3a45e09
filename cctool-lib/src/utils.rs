use crate::{Error, Result};
use crc::{CRC_32_ISO_HDLC, Crc};

const CRC32: Crc<u32> = Crc::<u32>::new(&CRC_32_ISO_HDLC);

pub struct Utils;

impl Utils {
    /// Parses a number with an optional `0x`/`0b`/`0o` prefix and an
    /// optional `k`/`m` suffix (KiB/MiB).
    pub fn str_to_u32(s: &str) -> Result<u32> {
        let s = s.trim();

        let (num_str, multiplier) = match s.chars().last() {
            Some('k') | Some('K') => (&s[..s.len() - 1], 1024u32),
            Some('m') | Some('M') => (&s[..s.len() - 1], 1024 * 1024),
            _ => (s, 1),
        };

        let unsigned: u32 = if let Some(hex) = num_str
            .strip_prefix("0x")
            .or_else(|| num_str.strip_prefix("0X"))
        {
            u32::from_str_radix(hex, 16)?
        } else if let Some(bin) = num_str.strip_prefix("0b") {
            u32::from_str_radix(bin, 2)?
        } else if let Some(oct) = num_str.strip_prefix("0o") {
            u32::from_str_radix(oct, 8)?
        } else {
            num_str.parse()?
        };

        unsigned
            .checked_mul(multiplier)
            .ok_or_else(|| Error::invalid_input(format!("'{}' does not fit in 32 bits", s)))
    }

    pub fn str_to_usize(s: &str) -> Result<usize> {
        Ok(Self::str_to_u32(s)? as usize)
    }

    /// CRC-32 (IEEE), same as zlib/`crc32` tools
    pub fn crc32(data: &[u8]) -> u32 {
        CRC32.checksum(data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_numbers() {
        assert_eq!(Utils::str_to_u32("0x8000").unwrap(), 0x8000);
        assert_eq!(Utils::str_to_u32(" 32k ").unwrap(), 32 * 1024);
        assert_eq!(Utils::str_to_u32("0b101").unwrap(), 5);
        assert_eq!(Utils::str_to_u32("0o17").unwrap(), 15);
        assert_eq!(Utils::str_to_u32("1M").unwrap(), 0x10_0000);
        assert!(Utils::str_to_u32("zz").is_err());
        assert!(Utils::str_to_u32("8192M").is_err());
    }

    #[test]
    fn test_crc32_check_value() {
        assert_eq!(Utils::crc32(b"123456789"), 0xCBF4_3926);
    }
}
