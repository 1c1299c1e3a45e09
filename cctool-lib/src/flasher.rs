//! Flash 编程引擎
//!
//! 把合并后的镜像按芯片写入块大小分块，每写一块立即读回比较。任何一块校验
//! 失败都立刻终止，不重试，后续块不再写入。
//!
//! 擦除是独立的操作，`write_image` 不会隐式擦除。

use crate::image::{CombinedImage, MemoryImage};
use crate::progress::{ProgressHelper, ProgressOperation, ProgressStatus};
use crate::session::DebugSession;
use crate::{Error, Result};
use std::collections::BTreeSet;

pub struct FlashWriter;

impl FlashWriter {
    /// Combines `image` and writes it block by block, verifying each block
    /// before the next one is issued.
    pub fn write_image<S>(
        session: &mut S,
        image: &MemoryImage,
        block_size: usize,
        progress: &ProgressHelper,
    ) -> Result<()>
    where
        S: DebugSession + ?Sized,
    {
        if block_size == 0 {
            return Err(Error::invalid_input("write block size must be non-zero"));
        }
        let combined = image.combine()?;
        Self::write_combined(session, &combined, block_size, progress)
    }

    pub fn write_combined<S>(
        session: &mut S,
        combined: &CombinedImage<'_>,
        block_size: usize,
        progress: &ProgressHelper,
    ) -> Result<()>
    where
        S: DebugSession + ?Sized,
    {
        if block_size == 0 {
            return Err(Error::invalid_input("write block size must be non-zero"));
        }
        let origin = combined.origin;
        let data = &combined.data[..];
        if origin as u64 + data.len() as u64 > u32::MAX as u64 + 1 {
            return Err(Error::invalid_input(format!(
                "image at 0x{:08X} with 0x{:X} bytes exceeds the address space",
                origin,
                data.len()
            )));
        }

        let bar = progress.create_bar(
            data.len() as u64,
            ProgressOperation::WriteFlash {
                address: origin,
                size: data.len() as u64,
            },
        );

        for (index, block) in data.chunks(block_size).enumerate() {
            let address = origin + (index * block_size) as u32;

            tracing::debug!("Writing block 0x{:08X} (0x{:X} bytes)", address, block.len());
            session.write_flash(address, block)?;

            let written = session.read_code(address, block.len())?;
            if let Some(offset) = first_mismatch(block, &written) {
                tracing::error!(
                    "Verification failed at 0x{:08X} in block 0x{:08X}",
                    address + offset as u32,
                    address
                );
                bar.finish(ProgressStatus::Failed);
                return Err(Error::Verification {
                    block_address: address,
                    address: address + offset as u32,
                    expected: block.to_vec(),
                    actual: written,
                });
            }

            bar.inc(block.len() as u64);
        }

        bar.finish(ProgressStatus::Success);
        tracing::info!(
            "Wrote and verified 0x{:X} bytes at 0x{:08X}",
            data.len(),
            origin
        );
        Ok(())
    }

    /// 擦除整片 Flash
    pub fn erase_chip<S>(session: &mut S, progress: &ProgressHelper) -> Result<()>
    where
        S: DebugSession + ?Sized,
    {
        let spinner = progress.create_spinner(ProgressOperation::ChipErase);
        session.chip_erase()?;
        spinner.finish(ProgressStatus::Success);
        tracing::info!("Chip erased");
        Ok(())
    }

    /// Erases every page touched by a segment of `image`, each page once, in
    /// ascending order. Returns the page start addresses.
    pub fn erase_pages_for<S>(
        session: &mut S,
        image: &MemoryImage,
        page_size: usize,
        progress: &ProgressHelper,
    ) -> Result<Vec<u32>>
    where
        S: DebugSession + ?Sized,
    {
        let pages = Self::pages_for(image, page_size)?;
        Self::erase_pages(session, &pages, progress)?;
        Ok(pages)
    }

    pub fn erase_pages<S>(session: &mut S, pages: &[u32], progress: &ProgressHelper) -> Result<()>
    where
        S: DebugSession + ?Sized,
    {
        let bar = progress.create_bar(
            pages.len() as u64,
            ProgressOperation::ErasePages { count: pages.len() },
        );
        for &page in pages {
            tracing::debug!("Erasing page 0x{:08X}", page);
            session.erase_page(page)?;
            bar.inc(1);
        }
        bar.finish(ProgressStatus::Success);
        Ok(())
    }

    /// 计算镜像覆盖的所有页起始地址
    pub fn pages_for(image: &MemoryImage, page_size: usize) -> Result<Vec<u32>> {
        if page_size == 0 {
            return Err(Error::invalid_input("flash page size must be non-zero"));
        }
        let page_size = page_size as u64;
        let mut pages = BTreeSet::new();
        for segment in image.segments().iter().filter(|s| !s.data.is_empty()) {
            let first = segment.address as u64 / page_size;
            let last = (segment.end() - 1) / page_size;
            for page in first..=last {
                let address = u32::try_from(page * page_size).map_err(|_| {
                    Error::invalid_input(format!(
                        "segment at 0x{:08X} exceeds the address space",
                        segment.address
                    ))
                })?;
                pages.insert(address);
            }
        }
        Ok(pages.into_iter().collect())
    }
}

pub struct FlashReader;

impl FlashReader {
    /// Reads `len` bytes from `address` in chunks of `block_size` into a
    /// single-segment image.
    pub fn read_image<S>(
        session: &mut S,
        address: u32,
        len: usize,
        block_size: usize,
        progress: &ProgressHelper,
    ) -> Result<MemoryImage>
    where
        S: DebugSession + ?Sized,
    {
        if block_size == 0 {
            return Err(Error::invalid_input("read block size must be non-zero"));
        }
        if address as u64 + len as u64 > u32::MAX as u64 + 1 {
            return Err(Error::invalid_input(format!(
                "read of 0x{:X} bytes at 0x{:08X} exceeds the address space",
                len, address
            )));
        }

        let bar = progress.create_bar(
            len as u64,
            ProgressOperation::ReadFlash {
                address,
                size: len as u64,
            },
        );

        let mut data = Vec::with_capacity(len);
        let mut offset = 0usize;
        while offset < len {
            let chunk_len = block_size.min(len - offset);
            let chunk_address = address + offset as u32;
            let chunk = session.read_code(chunk_address, chunk_len)?;
            if chunk.len() != chunk_len {
                return Err(Error::protocol(format!(
                    "short read at 0x{:08X}: expected 0x{:X} bytes, got 0x{:X}",
                    chunk_address,
                    chunk_len,
                    chunk.len()
                )));
            }
            data.extend_from_slice(&chunk);
            offset += chunk_len;
            bar.inc(chunk_len as u64);
        }

        bar.finish(ProgressStatus::Success);
        Ok(MemoryImage::single(address, data))
    }
}

fn first_mismatch(expected: &[u8], actual: &[u8]) -> Option<usize> {
    expected
        .iter()
        .zip(actual)
        .position(|(a, b)| a != b)
        .or_else(|| (expected.len() != actual.len()).then(|| expected.len().min(actual.len())))
}
