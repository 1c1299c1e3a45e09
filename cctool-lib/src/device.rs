//! 芯片描述表
//!
//! 根据调试接口读出的 chip id 查找芯片的 Flash 参数。查不到不是错误，
//! 由调用方显示为 "Unknown"。

use phf::phf_map;
use std::fmt;

/// 单个芯片型号的 Flash 参数
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceDescriptor {
    pub chip_id: u8,
    pub name: &'static str,
    /// 擦除粒度
    pub flash_page_size: usize,
    /// 单次写入的最大长度
    pub write_block_size: usize,
    pub flash_size: usize,
    /// 调试接口可直接寻址的代码空间大小
    pub code_size: usize,
    /// 共用同一个 chip id 的 Flash 容量（F8/F16/F32 等）
    pub flash_size_variants: &'static [usize],
}

const KIB: usize = 1024;

pub static DEVICES: phf::Map<u8, DeviceDescriptor> = phf_map! {
    0x01u8 => DeviceDescriptor {
        chip_id: 0x01,
        name: "CC1110",
        flash_page_size: KIB,
        write_block_size: KIB,
        flash_size: 32 * KIB,
        code_size: 32 * KIB,
        flash_size_variants: &[8 * KIB, 16 * KIB, 32 * KIB],
    },
    0x11u8 => DeviceDescriptor {
        chip_id: 0x11,
        name: "CC1111",
        flash_page_size: KIB,
        write_block_size: KIB,
        flash_size: 32 * KIB,
        code_size: 32 * KIB,
        flash_size_variants: &[8 * KIB, 16 * KIB, 32 * KIB],
    },
    0x81u8 => DeviceDescriptor {
        chip_id: 0x81,
        name: "CC2510",
        flash_page_size: KIB,
        write_block_size: KIB,
        flash_size: 32 * KIB,
        code_size: 32 * KIB,
        flash_size_variants: &[8 * KIB, 16 * KIB, 32 * KIB],
    },
    0x91u8 => DeviceDescriptor {
        chip_id: 0x91,
        name: "CC2511",
        flash_page_size: KIB,
        write_block_size: KIB,
        flash_size: 32 * KIB,
        code_size: 32 * KIB,
        flash_size_variants: &[8 * KIB, 16 * KIB, 32 * KIB],
    },
    0x85u8 => DeviceDescriptor {
        chip_id: 0x85,
        name: "CC2430",
        flash_page_size: 2 * KIB,
        write_block_size: KIB,
        flash_size: 128 * KIB,
        code_size: 32 * KIB,
        flash_size_variants: &[32 * KIB, 64 * KIB, 128 * KIB],
    },
    0x89u8 => DeviceDescriptor {
        chip_id: 0x89,
        name: "CC2431",
        flash_page_size: 2 * KIB,
        write_block_size: KIB,
        flash_size: 128 * KIB,
        code_size: 32 * KIB,
        flash_size_variants: &[128 * KIB],
    },
};

/// 按 chip id 查找芯片描述
pub fn lookup(chip_id: u8) -> Option<&'static DeviceDescriptor> {
    DEVICES.get(&chip_id)
}

/// 调试接口读出的芯片身份
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Identity {
    pub chip_id: u8,
    pub revision: u8,
    pub device: Option<&'static DeviceDescriptor>,
}

impl Identity {
    pub fn name(&self) -> &'static str {
        self.device.map_or("Unknown", |d| d.name)
    }

    /// Flash sizes that share this chip id.
    ///
    /// The debug interface cannot tell them apart; telling an F8 from an F32
    /// part requires probing on-chip memory, which is not done here.
    pub fn flash_size_variants(&self) -> &'static [usize] {
        self.device.map(|d| d.flash_size_variants).unwrap_or(&[])
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Id:{:X} [{}] Rev:{}",
            self.chip_id,
            self.name(),
            self.revision
        )
    }
}

/// 组合查表结果与芯片版本号
pub fn identify(chip_id: u8, revision: u8) -> Identity {
    let device = lookup(chip_id);
    if device.is_none() {
        tracing::warn!("Unknown chip id 0x{:02X}", chip_id);
    }
    Identity {
        chip_id,
        revision,
        device,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_chip() {
        let id = identify(0x81, 4);
        assert_eq!(id.name(), "CC2510");
        assert_eq!(id.to_string(), "Id:81 [CC2510] Rev:4");
        assert_eq!(id.flash_size_variants().len(), 3);
    }

    #[test]
    fn test_unknown_chip_is_not_an_error() {
        assert!(lookup(0x42).is_none());
        let id = identify(0x42, 1);
        assert_eq!(id.to_string(), "Id:42 [Unknown] Rev:1");
        assert!(id.flash_size_variants().is_empty());
    }

    #[test]
    fn test_table_invariants() {
        for (id, dev) in DEVICES.entries() {
            assert_eq!(*id, dev.chip_id);
            assert!(dev.flash_page_size.is_power_of_two());
            assert!(dev.write_block_size.is_power_of_two());
            assert!(dev.write_block_size <= dev.flash_page_size);
            assert!(dev.code_size <= dev.flash_size);
        }
    }
}
