use crate::flasher::FlashWriter;
use crate::{CcTool, Error, Result};

pub trait EraseFlashTrait {
    fn erase_chip(&mut self) -> Result<()>;
    fn erase_pages(&mut self, addresses: &[u32]) -> Result<()>;
}

impl EraseFlashTrait for CcTool {
    fn erase_chip(&mut self) -> Result<()> {
        self.connect()?;
        let progress = self.progress().clone();
        FlashWriter::erase_chip(self.session(), &progress)
    }

    /// 擦除给定地址所在的页，同一页只擦一次
    fn erase_pages(&mut self, addresses: &[u32]) -> Result<()> {
        if addresses.is_empty() {
            return Err(Error::invalid_input("no page address given"));
        }
        self.connect()?;
        let page_size = self.page_size()? as u32;

        let mut pages: Vec<u32> = addresses.iter().map(|a| a - a % page_size).collect();
        pages.sort_unstable();
        pages.dedup();

        let progress = self.progress().clone();
        FlashWriter::erase_pages(self.session(), &pages, &progress)
    }
}
