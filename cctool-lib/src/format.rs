//! 镜像文件格式
//!
//! 支持读取 bin / Intel HEX / ELF，写出 bin / Intel HEX。格式错误总是在
//! 访问芯片之前报告。

use crate::image::{MemoryImage, Segment};
use crate::{Error, Result};
use goblin::elf::Elf;
use goblin::elf::program_header::PT_LOAD;
use ihex::Record;
use memmap2::Mmap;
use std::fs::File;
use std::path::Path;
use strum::{Display, EnumString};

const HEX_RECORD_LEN: usize = 16;
const ELF_MAGIC: &[u8] = b"\x7fELF";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString)]
#[strum(ascii_case_insensitive)]
#[cfg_attr(feature = "cli", derive(clap::ValueEnum))]
pub enum ImageFormat {
    #[strum(to_string = "bin", serialize = "binary")]
    Bin,
    #[strum(to_string = "hex", serialize = "ihex", serialize = "intelhex")]
    Hex,
    #[strum(to_string = "elf", serialize = "axf")]
    Elf,
}

impl ImageFormat {
    /// 根据扩展名判断格式
    pub fn from_extension(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "bin" => Some(ImageFormat::Bin),
            "hex" | "ihex" | "ihx" => Some(ImageFormat::Hex),
            "elf" | "axf" => Some(ImageFormat::Elf),
            _ => None,
        }
    }

    /// Picks the format from the file extension, then from the content.
    pub fn detect(path: &Path, content: &[u8]) -> Result<Self> {
        if let Some(format) = Self::from_extension(path) {
            return Ok(format);
        }
        if content.starts_with(ELF_MAGIC) {
            return Ok(ImageFormat::Elf);
        }
        if content.first() == Some(&b':') {
            return Ok(ImageFormat::Hex);
        }
        Err(Error::format(format!(
            "cannot determine file format of '{}'",
            path.display()
        )))
    }

    /// 输出时只能根据扩展名判断
    pub fn detect_output(path: &Path) -> Result<Self> {
        Self::from_extension(path).ok_or_else(|| {
            Error::format(format!(
                "cannot determine file format of '{}'",
                path.display()
            ))
        })
    }
}

/// Loads an image file.
///
/// `base_address` only applies to raw binaries, the other formats carry
/// their own addresses.
pub fn load_image(
    path: impl AsRef<Path>,
    format: Option<ImageFormat>,
    base_address: u32,
) -> Result<MemoryImage> {
    let path = path.as_ref();
    let file = File::open(path)?;
    if file.metadata()?.len() == 0 {
        return Err(Error::format(format!("'{}' is empty", path.display())));
    }
    // SAFETY: 文件只读映射，解析期间不会被本进程修改
    let mmap = unsafe { Mmap::map(&file)? };

    let format = match format {
        Some(format) => format,
        None => ImageFormat::detect(path, &mmap)?,
    };
    tracing::debug!("Loading '{}' as {}", path.display(), format);

    let image = parse_image(&mmap, format, base_address)?;
    tracing::info!(
        "Loaded {} segments (0x{:X} bytes) from '{}'",
        image.segments().len(),
        image.data_len(),
        path.display()
    );
    Ok(image)
}

pub fn parse_image(content: &[u8], format: ImageFormat, base_address: u32) -> Result<MemoryImage> {
    match format {
        ImageFormat::Bin => Ok(MemoryImage::single(base_address, content)),
        ImageFormat::Hex => {
            let text = std::str::from_utf8(content)
                .map_err(|_| Error::format("Intel HEX file is not valid text"))?;
            parse_hex(text)
        }
        ImageFormat::Elf => parse_elf(content),
    }
}

/// 解析 Intel HEX，地址连续的数据记录合并为一段
pub fn parse_hex(text: &str) -> Result<MemoryImage> {
    let mut segments: Vec<Segment> = Vec::new();
    let mut base: u32 = 0;

    for record in ihex::Reader::new(text) {
        match record? {
            Record::Data { offset, value } => {
                let address = base.checked_add(offset as u32).ok_or_else(|| {
                    Error::format(format!(
                        "data record at 0x{:04X} overflows the address space",
                        offset
                    ))
                })?;
                match segments.last_mut() {
                    Some(last) if last.end() == address as u64 => {
                        last.data.extend_from_slice(&value)
                    }
                    _ => segments.push(Segment::new(address, value)),
                }
            }
            Record::ExtendedSegmentAddress(segment) => base = (segment as u32) << 4,
            Record::ExtendedLinearAddress(upper) => base = (upper as u32) << 16,
            Record::StartSegmentAddress { .. } | Record::StartLinearAddress(_) => {}
            Record::EndOfFile => break,
        }
    }

    if segments.is_empty() {
        return Err(Error::format("Intel HEX file contains no data records"));
    }
    Ok(MemoryImage::from_segments(segments))
}

/// 每个有文件内容的 PT_LOAD 段对应一段，地址取物理地址
pub fn parse_elf(content: &[u8]) -> Result<MemoryImage> {
    let elf = Elf::parse(content)?;
    let mut image = MemoryImage::new();

    for header in elf
        .program_headers
        .iter()
        .filter(|h| h.p_type == PT_LOAD && h.p_filesz > 0)
    {
        let start = header.p_offset as usize;
        let data = start
            .checked_add(header.p_filesz as usize)
            .and_then(|end| content.get(start..end))
            .ok_or_else(|| {
                Error::format(format!(
                    "ELF segment at file offset 0x{:X} is truncated",
                    header.p_offset
                ))
            })?;
        let address = u32::try_from(header.p_paddr).map_err(|_| {
            Error::format(format!(
                "ELF segment address 0x{:X} does not fit in 32 bits",
                header.p_paddr
            ))
        })?;
        image.push(address, data);
    }

    if image.is_empty() {
        return Err(Error::format("ELF file has no loadable segments"));
    }
    Ok(image)
}

/// Writes an image file. Binaries get the combined image, so the origin
/// address is not stored.
pub fn save_image(
    path: impl AsRef<Path>,
    format: ImageFormat,
    image: &MemoryImage,
) -> Result<()> {
    let path = path.as_ref();
    let content = match format {
        ImageFormat::Bin => image.combine()?.data.into_owned(),
        ImageFormat::Hex => to_hex(image)?.into_bytes(),
        ImageFormat::Elf => {
            return Err(Error::format("writing ELF images is not supported"));
        }
    };
    std::fs::write(path, content)?;
    tracing::info!("Saved 0x{:X} bytes to '{}'", image.data_len(), path.display());
    Ok(())
}

/// 生成 Intel HEX 文本，数据记录不跨 64 KiB 边界
pub fn to_hex(image: &MemoryImage) -> Result<String> {
    let mut records = Vec::new();
    let mut upper: Option<u16> = None;

    for segment in image.segments() {
        let mut offset = 0usize;
        while offset < segment.data.len() {
            let address = u32::try_from(segment.address as u64 + offset as u64).map_err(|_| {
                Error::format(format!(
                    "segment at 0x{:08X} exceeds the 32-bit address space",
                    segment.address
                ))
            })?;

            let high = (address >> 16) as u16;
            if upper != Some(high) {
                // 地址低于 64 KiB 时省略第一条扩展地址记录
                if upper.is_some() || high != 0 {
                    records.push(Record::ExtendedLinearAddress(high));
                }
                upper = Some(high);
            }

            let room = 0x1_0000 - (address & 0xFFFF) as usize;
            let len = HEX_RECORD_LEN.min(room).min(segment.data.len() - offset);
            records.push(Record::Data {
                offset: address as u16,
                value: segment.data[offset..offset + len].to_vec(),
            });
            offset += len;
        }
    }
    records.push(Record::EndOfFile);

    Ok(ihex::create_object_file_representation(&records)?)
}
