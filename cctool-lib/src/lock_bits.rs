//! 锁定字节编解码
//!
//! 锁定/信息页中的一个字节保存了启动区保护、受保护页数和调试接口使能。

use crate::{Error, Result};
use std::fmt;

/// 受保护页数字段只有 3 位
const MAX_FIELD_PAGES: usize = 7;

bitfield::bitfield! {
    #[derive(Clone, Copy, PartialEq, Eq)]
    pub struct LockBits(u8);
    impl Debug;
    pub debug_disabled, set_debug_disabled: 0;
    /// Protected page count, stored inverted
    pub u8, size_field, set_size_field: 3, 1;
    pub boot_disabled, set_boot_disabled: 4;
}

/// Decoded lock configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LockConfig {
    pub boot: bool,
    /// Protected flash in bytes, a multiple of the page size
    pub protected_size: usize,
    pub debug_enabled: bool,
}

impl LockConfig {
    pub fn encode(&self, page_size: usize) -> Result<u8> {
        encode(self.boot, self.protected_size, self.debug_enabled, page_size)
    }
}

impl fmt::Display for LockConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "boot: {}, protected: 0x{:X} bytes, debug: {}",
            if self.boot { "enabled" } else { "disabled" },
            self.protected_size,
            if self.debug_enabled {
                "enabled"
            } else {
                "disabled"
            }
        )
    }
}

/// Encodes the lock byte.
///
/// `protected_size` must be a whole number of pages and no more than eight
/// pages. The page count lands in bits 3..1 XOR 7, so fewer protected pages
/// give a larger field value, matching the silicon.
pub fn encode(
    boot: bool,
    protected_size: usize,
    debug_enabled: bool,
    page_size: usize,
) -> Result<u8> {
    if page_size == 0 {
        return Err(Error::config("flash page size must be non-zero"));
    }
    if protected_size % page_size != 0 {
        return Err(Error::config(format!(
            "lock size 0x{:X} is not a multiple of the 0x{:X} byte page size",
            protected_size, page_size
        )));
    }
    if protected_size > page_size * 8 {
        return Err(Error::config(format!(
            "lock size 0x{:X} exceeds 8 pages (0x{:X} bytes)",
            protected_size,
            page_size * 8
        )));
    }

    let page_count = protected_size / page_size;
    if page_count > MAX_FIELD_PAGES {
        return Err(Error::config(format!(
            "lock size of {} pages does not fit the 3-bit page count field",
            page_count
        )));
    }

    let mut bits = LockBits(0);
    bits.set_boot_disabled(!boot);
    bits.set_size_field(page_count as u8 ^ 7);
    bits.set_debug_disabled(!debug_enabled);
    Ok(bits.0)
}

/// 解析锁定字节，高 3 位忽略
pub fn decode(byte: u8, page_size: usize) -> LockConfig {
    let bits = LockBits(byte);
    LockConfig {
        boot: !bits.boot_disabled(),
        protected_size: (bits.size_field() ^ 7) as usize * page_size,
        debug_enabled: !bits.debug_disabled(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_encodings() {
        assert_eq!(encode(true, 0, true, 1024).unwrap(), 0x0E);
        assert_eq!(encode(false, 1024, false, 1024).unwrap(), 0x1D);
        assert_eq!(encode(true, 7 * 2048, true, 2048).unwrap(), 0x00);
    }

    #[test]
    fn test_bitfield_layout() {
        let bits = LockBits(0x1D);
        assert!(bits.boot_disabled());
        assert!(bits.debug_disabled());
        assert_eq!(bits.size_field(), 6);
    }

    #[test]
    fn test_decode_ignores_upper_bits() {
        assert_eq!(decode(0xEE, 1024), decode(0x0E, 1024));
    }
}
