//! 锁定/信息页的读写
//!
//! 所有访问都在 [`AddressSpaceGuard`] 内进行，出错时也会切回代码空间。

use crate::flasher::FlashWriter;
use crate::lock_bits;
use crate::progress::{ProgressOperation, ProgressStatus};
use crate::{
    AddressSpace, AddressSpaceGuard, CcTool, Error, LockConfig, MemoryImage, Result,
    WriteLockParams,
};

/// 锁定字节在锁定/信息页中的地址
pub const LOCK_BYTE_ADDRESS: u32 = 0x0000;

pub trait LockTrait {
    /// Returns the raw lock byte and its decoded form.
    fn read_lock(&mut self) -> Result<(u8, LockConfig)>;

    /// Encodes, writes and verifies the lock byte. Returns the byte written.
    fn write_lock(&mut self, params: &WriteLockParams) -> Result<u8>;
}

impl LockTrait for CcTool {
    fn read_lock(&mut self) -> Result<(u8, LockConfig)> {
        self.connect()?;
        let page_size = self.page_size()?;
        let progress = self.progress().clone();
        let spinner = progress.create_spinner(ProgressOperation::ReadLock);

        let mut guard = AddressSpaceGuard::acquire(self.session(), AddressSpace::Lock)?;
        let data = guard.read_code(LOCK_BYTE_ADDRESS, 1)?;
        guard.release()?;

        let byte = *data
            .first()
            .ok_or_else(|| Error::protocol("empty response when reading lock byte"))?;
        spinner.finish(ProgressStatus::Success);

        let config = lock_bits::decode(byte, page_size);
        tracing::info!("Lock byte 0x{:02X} ({})", byte, config);
        Ok((byte, config))
    }

    fn write_lock(&mut self, params: &WriteLockParams) -> Result<u8> {
        self.connect()?;
        let page_size = self.page_size()?;
        // 参数错误必须在写入前发现
        let value = params.config.encode(page_size)?;
        tracing::info!("Writing lock byte 0x{:02X} ({})", value, params.config);

        let progress = self.progress().clone();
        let spinner = progress.create_spinner(ProgressOperation::WriteLock { value });

        let mut guard = AddressSpaceGuard::acquire(self.session(), AddressSpace::Lock)?;
        if params.erase {
            guard.erase_page(LOCK_BYTE_ADDRESS)?;
        }
        let image = MemoryImage::single(LOCK_BYTE_ADDRESS, vec![value]);
        FlashWriter::write_image(&mut *guard, &image, 1, &progress)?;
        guard.release()?;

        spinner.finish(ProgressStatus::Success);
        Ok(value)
    }
}
