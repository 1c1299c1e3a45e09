use crate::flasher::FlashReader;
use crate::utils::Utils;
use crate::{CcTool, Error, MemoryImage, ReadFlashParams, Result};

pub trait ReadFlashTrait {
    fn read_flash(&mut self, params: &ReadFlashParams) -> Result<MemoryImage>;
}

impl ReadFlashTrait for CcTool {
    fn read_flash(&mut self, params: &ReadFlashParams) -> Result<MemoryImage> {
        self.connect()?;
        let size = match params.size {
            Some(size) => size,
            None => self.code_size()?,
        };
        // 未知芯片且未指定块大小时按整段读取
        let block_size = match self.block_size() {
            Ok(block_size) => block_size,
            Err(Error::UnsupportedChip(_)) => size.max(1),
            Err(e) => return Err(e),
        };

        tracing::info!("Reading memory (0x{:X} bytes at 0x{:08X})", size, params.address);
        let progress = self.progress().clone();
        let image =
            FlashReader::read_image(self.session(), params.address, size, block_size, &progress)?;

        if let Some(segment) = image.segments().first() {
            tracing::info!("Read CRC32 0x{:08X}", Utils::crc32(&segment.data));
        }
        Ok(image)
    }
}
