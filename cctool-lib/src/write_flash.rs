use crate::flasher::FlashWriter;
use crate::utils::Utils;
use crate::{CcTool, EraseMode, Result, WriteFlashParams};

pub trait WriteFlashTrait {
    fn write_flash(&mut self, params: &WriteFlashParams) -> Result<()>;
}

impl WriteFlashTrait for CcTool {
    fn write_flash(&mut self, params: &WriteFlashParams) -> Result<()> {
        self.connect()?;
        let block_size = self.block_size()?;

        // 先合并，镜像有问题时不会动到芯片
        let combined = params.image.combine()?;
        tracing::info!(
            "Writing program memory (0x{:X} bytes in {} segments, CRC32 0x{:08X})",
            params.image.data_len(),
            params.image.segments().len(),
            Utils::crc32(&combined.data)
        );

        match params.erase {
            EraseMode::None => {}
            EraseMode::Chip => {
                let progress = self.progress().clone();
                FlashWriter::erase_chip(self.session(), &progress)?;
            }
            EraseMode::Pages => {
                let page_size = self.page_size()?;
                let progress = self.progress().clone();
                let pages = FlashWriter::erase_pages_for(
                    self.session(),
                    &params.image,
                    page_size,
                    &progress,
                )?;
                tracing::debug!("Erased {} pages before writing", pages.len());
            }
        }

        let progress = self.progress().clone();
        FlashWriter::write_combined(self.session(), &combined, block_size, &progress)
    }
}
