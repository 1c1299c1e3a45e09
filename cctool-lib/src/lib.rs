pub mod device;
pub mod dummy;
pub mod erase_flash;
pub mod error;
pub mod flasher;
pub mod format;
pub mod image;
pub mod lock;
pub mod lock_bits;
pub mod progress;
pub mod read_flash;
pub mod session;
pub mod status;
pub mod utils;
pub mod write_flash;

pub use crate::device::{DeviceDescriptor, Identity};
pub use crate::error::{Error, Result};
pub use crate::image::{MemoryImage, Segment};
pub use crate::lock_bits::LockConfig;
pub use crate::session::{AddressSpace, AddressSpaceGuard, DebugSession};
pub use crate::status::{StatusFlag, StatusFlags};

use crate::progress::{ProgressCallbackArc, ProgressHelper, ProgressOperation, ProgressStatus};
use std::time::Duration;

/// 写入前的擦除方式
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "cli", derive(clap::ValueEnum))]
pub enum EraseMode {
    /// Keep existing flash content
    #[default]
    #[cfg_attr(feature = "cli", clap(name = "none"))]
    None,
    /// Erase the whole chip first
    #[cfg_attr(feature = "cli", clap(name = "chip"))]
    Chip,
    /// Erase only the pages the image touches
    #[cfg_attr(feature = "cli", clap(name = "pages"))]
    Pages,
}

#[derive(Debug, Clone)]
pub struct CcToolBase {
    /// Debug clock in kHz, passed to the transport
    pub frequency_khz: u32,
    /// Number of attempts to connect, negative or 0 for infinite
    pub connect_attempts: i8,
    /// Overrides the write block size from the device table
    pub block_size: Option<usize>,
    /// Overrides the page size from the device table
    pub page_size: Option<usize>,
    pub quiet: bool,
}

impl Default for CcToolBase {
    fn default() -> Self {
        Self {
            frequency_khz: 100,
            connect_attempts: 3,
            block_size: None,
            page_size: None,
            quiet: false,
        }
    }
}

#[derive(Debug, Clone)]
pub struct WriteFlashParams {
    pub image: MemoryImage,
    pub erase: EraseMode,
}

#[derive(Debug, Clone, Default)]
pub struct ReadFlashParams {
    pub address: u32,
    /// Defaults to the code memory size of the connected chip
    pub size: Option<usize>,
}

#[derive(Debug, Clone)]
pub struct WriteLockParams {
    pub config: LockConfig,
    /// Erase the lock page before writing the lock byte
    pub erase: bool,
}

const CONNECT_RETRY_DELAY: Duration = Duration::from_millis(500);

/// 调试会话之上的编程工具
///
/// 独占一个会话，负责连接生命周期，并缓存已连接芯片的描述。
pub struct CcTool {
    session: Box<dyn DebugSession>,
    base: CcToolBase,
    progress: ProgressHelper,
    identity: Option<Identity>,
    connected: bool,
}

impl CcTool {
    pub fn new(
        session: Box<dyn DebugSession>,
        base: CcToolBase,
        progress_callback: ProgressCallbackArc,
    ) -> Self {
        let callback = if base.quiet {
            progress::no_op_progress_callback()
        } else {
            progress_callback
        };
        Self {
            session,
            base,
            progress: ProgressHelper::new(callback, 0),
            identity: None,
            connected: false,
        }
    }

    pub fn base(&self) -> &CcToolBase {
        &self.base
    }

    pub fn progress(&self) -> &ProgressHelper {
        &self.progress
    }

    pub fn session(&mut self) -> &mut dyn DebugSession {
        self.session.as_mut()
    }

    pub fn is_connected(&self) -> bool {
        self.connected
    }

    /// Enters debug mode, starts the clock and identifies the chip.
    pub fn connect(&mut self) -> Result<Identity> {
        if let (true, Some(identity)) = (self.connected, self.identity) {
            return Ok(identity);
        }

        let infinite_attempts = self.base.connect_attempts <= 0;
        let mut remaining_attempts = self.base.connect_attempts;

        loop {
            let spinner = self.progress.create_spinner(ProgressOperation::Connect);
            match self.try_connect() {
                Ok(identity) => {
                    spinner.finish(ProgressStatus::Success);
                    tracing::info!("Connected to {}", identity);
                    return Ok(identity);
                }
                Err(e) => {
                    spinner.finish_with_message("Failed to connect to the chip, retrying...");
                    tracing::warn!("Connect attempt failed: {}", e);
                    // 下一次尝试前先退出调试模式
                    if let Err(e) = self.disconnect() {
                        tracing::warn!("Failed to leave debug mode: {}", e);
                    }
                    if !infinite_attempts {
                        remaining_attempts -= 1;
                        if remaining_attempts <= 0 {
                            return Err(e);
                        }
                    }
                    std::thread::sleep(CONNECT_RETRY_DELAY);
                }
            }
        }
    }

    fn try_connect(&mut self) -> Result<Identity> {
        tracing::debug!("Entering debug mode at {} kHz", self.base.frequency_khz);
        self.session.connect()?;
        self.connected = true;
        self.session.clock_init()?;
        let (chip_id, revision) = self.session.get_chip_id()?;
        let identity = device::identify(chip_id, revision);
        self.identity = Some(identity);
        Ok(identity)
    }

    pub fn disconnect(&mut self) -> Result<()> {
        if !self.connected {
            return Ok(());
        }
        self.connected = false;
        self.identity = None;
        self.session.disconnect()
    }

    /// 读取芯片 ID 与版本号
    pub fn identify(&mut self) -> Result<Identity> {
        if !self.connected {
            return self.connect();
        }
        let (chip_id, revision) = self.session.get_chip_id()?;
        let identity = device::identify(chip_id, revision);
        self.identity = Some(identity);
        Ok(identity)
    }

    pub fn status(&mut self) -> Result<StatusFlags> {
        self.connect()?;
        let status = StatusFlags(self.session.get_status()?);
        tracing::debug!("Status: {}", status);
        Ok(status)
    }

    pub fn device(&self) -> Option<&'static DeviceDescriptor> {
        self.identity.and_then(|i| i.device)
    }

    pub(crate) fn block_size(&self) -> Result<usize> {
        match self.base.block_size {
            Some(0) => Err(Error::invalid_input("block size must be non-zero")),
            Some(size) => Ok(size),
            None => self
                .device()
                .map(|d| d.write_block_size)
                .ok_or_else(|| self.unknown_chip("write block size")),
        }
    }

    pub(crate) fn page_size(&self) -> Result<usize> {
        match self.base.page_size {
            Some(0) => Err(Error::invalid_input("page size must be non-zero")),
            Some(size) => Ok(size),
            None => self
                .device()
                .map(|d| d.flash_page_size)
                .ok_or_else(|| self.unknown_chip("flash page size")),
        }
    }

    pub(crate) fn code_size(&self) -> Result<usize> {
        self.device()
            .map(|d| d.code_size)
            .ok_or_else(|| self.unknown_chip("code memory size"))
    }

    fn unknown_chip(&self, what: &str) -> Error {
        let id = self
            .identity
            .map(|i| format!("0x{:02X}", i.chip_id))
            .unwrap_or_else(|| "unidentified chip".to_string());
        Error::UnsupportedChip(format!("{} of {} is unknown, specify it explicitly", what, id))
    }
}

impl Drop for CcTool {
    fn drop(&mut self) {
        if let Err(e) = self.disconnect() {
            tracing::warn!("Failed to leave debug mode: {}", e);
        }
    }
}
