//! 调试状态寄存器解析

use std::fmt;
use strum::{Display, EnumIter, IntoEnumIterator};

/// Status register bits, most significant bit first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumIter)]
pub enum StatusFlag {
    #[strum(serialize = "CHIP_ERASE_DONE")]
    ChipEraseDone,
    #[strum(serialize = "PCON_IDLE")]
    PconIdle,
    #[strum(serialize = "CPU_HALTED")]
    CpuHalted,
    #[strum(serialize = "POWER_MODE_0")]
    PowerMode0,
    #[strum(serialize = "HALT_STATUS")]
    HaltStatus,
    #[strum(serialize = "DEBUG_LOCKED")]
    DebugLocked,
    #[strum(serialize = "OSCILLATOR_STABLE")]
    OscillatorStable,
    #[strum(serialize = "STACK_OVERFLOW")]
    StackOverflow,
}

impl StatusFlag {
    pub fn mask(self) -> u8 {
        0x80 >> (self as u8)
    }
}

/// 解析状态字节，返回所有置位的标志（高位在前）
pub fn decode(status: u8) -> Vec<StatusFlag> {
    StatusFlag::iter()
        .filter(|flag| status & flag.mask() != 0)
        .collect()
}

/// Raw status register value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusFlags(pub u8);

impl StatusFlags {
    pub fn flags(&self) -> Vec<StatusFlag> {
        decode(self.0)
    }

    pub fn contains(&self, flag: StatusFlag) -> bool {
        self.0 & flag.mask() != 0
    }
}

impl fmt::Display for StatusFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<String> = self.flags().iter().map(ToString::to_string).collect();
        write!(f, "0x{:02x} [{}]", self.0, names.join(", "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_bits() {
        assert_eq!(decode(0x80), vec![StatusFlag::ChipEraseDone]);
        assert_eq!(decode(0x01), vec![StatusFlag::StackOverflow]);
        assert_eq!(decode(0x04), vec![StatusFlag::DebugLocked]);
    }

    #[test]
    fn test_empty_and_full() {
        assert!(decode(0x00).is_empty());
        let all = decode(0xFF);
        assert_eq!(all.len(), 8);
        assert_eq!(all, StatusFlag::iter().collect::<Vec<_>>());
    }

    #[test]
    fn test_display_matches_status_line() {
        let status = StatusFlags(0xA2);
        assert!(status.contains(StatusFlag::CpuHalted));
        assert!(!status.contains(StatusFlag::PconIdle));
        assert_eq!(
            status.to_string(),
            "0xa2 [CHIP_ERASE_DONE, CPU_HALTED, OSCILLATOR_STABLE]"
        );
        assert_eq!(StatusFlags(0).to_string(), "0x00 []");
    }
}
