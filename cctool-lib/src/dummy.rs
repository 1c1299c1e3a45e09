//! 内存模拟的目标芯片
//!
//! 实现 [`DebugSession`]，不需要真实硬件即可跑通擦除、写入、校验流程。
//! 测试中用它记录调用顺序，并注入写入错误。

use crate::device;
use crate::session::{AddressSpace, DebugSession};
use crate::status::StatusFlag;
use crate::{Error, Result};

/// Geometry of the emulated chip
#[derive(Debug, Clone)]
pub struct DummyConfig {
    pub chip_id: u8,
    pub revision: u8,
    pub flash_size: usize,
    pub page_size: usize,
}

impl Default for DummyConfig {
    fn default() -> Self {
        Self::for_chip(0x81, 0x04)
    }
}

impl DummyConfig {
    /// Takes flash geometry from the device table, falling back to a 32 KiB
    /// part with 1 KiB pages for unknown ids.
    pub fn for_chip(chip_id: u8, revision: u8) -> Self {
        let (flash_size, page_size) = device::lookup(chip_id)
            .map(|d| (d.code_size, d.flash_page_size))
            .unwrap_or((32 * 1024, 1024));
        Self {
            chip_id,
            revision,
            flash_size,
            page_size,
        }
    }
}

/// One recorded call on the session
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionCall {
    Connect,
    ClockInit,
    Disconnect,
    ChipErase,
    ErasePage(u32),
    ReadCode { address: u32, len: usize },
    WriteFlash { address: u32, len: usize },
    SetConfig(u8),
    GetStatus,
    GetChipId,
}

pub struct DummySession {
    config: DummyConfig,
    flash: Vec<u8>,
    lock_page: Vec<u8>,
    selector: u8,
    connected: bool,
    clock_ready: bool,
    chip_erased: bool,
    corrupt_at: Vec<u32>,
    clock_failures: usize,
    calls: Vec<SessionCall>,
}

impl Default for DummySession {
    fn default() -> Self {
        Self::new(DummyConfig::default())
    }
}

impl DummySession {
    pub fn new(config: DummyConfig) -> Self {
        Self {
            flash: vec![0xFF; config.flash_size],
            lock_page: vec![0xFF; config.page_size],
            config,
            selector: AddressSpace::Code.selector(),
            connected: false,
            clock_ready: false,
            chip_erased: false,
            corrupt_at: Vec::new(),
            clock_failures: 0,
            calls: Vec::new(),
        }
    }

    /// Overwrites code memory at `address` without going through the write
    /// path.
    pub fn preload(&mut self, address: u32, data: &[u8]) {
        let start = address as usize;
        self.flash[start..start + data.len()].copy_from_slice(data);
    }

    /// Makes every later write that covers `address` store a corrupted byte
    /// there.
    pub fn corrupt_writes_at(&mut self, address: u32) {
        self.corrupt_at.push(address);
    }

    /// Makes the next `count` calls to `clock_init` fail.
    pub fn fail_clock_init(&mut self, count: usize) {
        self.clock_failures = count;
    }

    pub fn flash(&self) -> &[u8] {
        &self.flash
    }

    pub fn lock_page(&self) -> &[u8] {
        &self.lock_page
    }

    pub fn selector(&self) -> u8 {
        self.selector
    }

    pub fn calls(&self) -> &[SessionCall] {
        &self.calls
    }

    pub fn clear_calls(&mut self) {
        self.calls.clear();
    }

    pub fn is_connected(&self) -> bool {
        self.connected
    }

    fn require_ready(&self) -> Result<()> {
        if !self.connected {
            return Err(Error::protocol("target is not in debug mode"));
        }
        if !self.clock_ready {
            return Err(Error::protocol("target clock is not initialised"));
        }
        Ok(())
    }

    fn space_mut(&mut self) -> &mut Vec<u8> {
        if self.selector == AddressSpace::Lock.selector() {
            &mut self.lock_page
        } else {
            &mut self.flash
        }
    }

    fn space_len(&self) -> usize {
        if self.selector == AddressSpace::Lock.selector() {
            self.lock_page.len()
        } else {
            self.flash.len()
        }
    }

    fn range(&self, address: u32, len: usize) -> Result<std::ops::Range<usize>> {
        let size = self.space_len();
        let start = address as usize;
        match start.checked_add(len) {
            Some(end) if end <= size => Ok(start..end),
            _ => Err(Error::protocol(format!(
                "access 0x{:08X}+0x{:X} outside of 0x{:X} byte space",
                address, len, size
            ))),
        }
    }
}

impl DebugSession for DummySession {
    fn connect(&mut self) -> Result<()> {
        self.calls.push(SessionCall::Connect);
        if self.connected {
            return Err(Error::protocol("target is already in debug mode"));
        }
        self.connected = true;
        Ok(())
    }

    fn clock_init(&mut self) -> Result<()> {
        self.calls.push(SessionCall::ClockInit);
        if !self.connected {
            return Err(Error::protocol("target is not in debug mode"));
        }
        if self.clock_failures > 0 {
            self.clock_failures -= 1;
            return Err(Error::timeout("waiting for the oscillator to stabilise"));
        }
        self.clock_ready = true;
        Ok(())
    }

    fn disconnect(&mut self) -> Result<()> {
        self.calls.push(SessionCall::Disconnect);
        self.connected = false;
        self.clock_ready = false;
        Ok(())
    }

    fn chip_erase(&mut self) -> Result<()> {
        self.calls.push(SessionCall::ChipErase);
        self.require_ready()?;
        self.flash.fill(0xFF);
        self.lock_page.fill(0xFF);
        self.chip_erased = true;
        Ok(())
    }

    fn erase_page(&mut self, address: u32) -> Result<()> {
        self.calls.push(SessionCall::ErasePage(address));
        self.require_ready()?;
        let page_size = self.config.page_size;
        let start = (address as usize / page_size) * page_size;
        let range = self.range(start as u32, page_size.min(self.space_len()))?;
        self.space_mut()[range].fill(0xFF);
        Ok(())
    }

    fn read_code(&mut self, address: u32, len: usize) -> Result<Vec<u8>> {
        self.calls.push(SessionCall::ReadCode { address, len });
        self.require_ready()?;
        let range = self.range(address, len)?;
        Ok(self.space_mut()[range].to_vec())
    }

    fn write_flash(&mut self, address: u32, data: &[u8]) -> Result<()> {
        self.calls.push(SessionCall::WriteFlash {
            address,
            len: data.len(),
        });
        self.require_ready()?;
        let range = self.range(address, data.len())?;
        let corrupt: Vec<usize> = if self.selector == AddressSpace::Code.selector() {
            self.corrupt_at
                .iter()
                .map(|&a| a as usize)
                .filter(|a| range.contains(a))
                .collect()
        } else {
            Vec::new()
        };

        let space = self.space_mut();
        // Flash 编程只能把 1 写成 0
        for (cell, byte) in space[range].iter_mut().zip(data) {
            *cell &= *byte;
        }
        for a in corrupt {
            space[a] ^= 0x5A;
            tracing::debug!("Dummy target corrupted byte at 0x{:08X}", a);
        }
        Ok(())
    }

    fn set_config(&mut self, selector: u8) -> Result<()> {
        self.calls.push(SessionCall::SetConfig(selector));
        if selector > AddressSpace::Lock.selector() {
            return Err(Error::protocol(format!(
                "invalid address space selector {}",
                selector
            )));
        }
        self.selector = selector;
        Ok(())
    }

    fn get_status(&mut self) -> Result<u8> {
        self.calls.push(SessionCall::GetStatus);
        if !self.connected {
            return Err(Error::protocol("target is not in debug mode"));
        }
        let mut status = StatusFlag::CpuHalted.mask() | StatusFlag::HaltStatus.mask();
        if self.clock_ready {
            status |= StatusFlag::OscillatorStable.mask();
        }
        if self.chip_erased {
            status |= StatusFlag::ChipEraseDone.mask();
        }
        // 锁定字节 bit0 置位表示调试接口被关闭
        if self.lock_page.first().is_some_and(|b| b & 0x01 != 0 && *b != 0xFF) {
            status |= StatusFlag::DebugLocked.mask();
        }
        Ok(status)
    }

    fn get_chip_id(&mut self) -> Result<(u8, u8)> {
        self.calls.push(SessionCall::GetChipId);
        if !self.connected {
            return Err(Error::protocol("target is not in debug mode"));
        }
        Ok((self.config.chip_id, self.config.revision))
    }
}
