use anyhow::{Context, Result, bail};
use cctool_lib::erase_flash::EraseFlashTrait;
use cctool_lib::format::{self, ImageFormat};
use cctool_lib::lock::LockTrait;
use cctool_lib::read_flash::ReadFlashTrait;
use cctool_lib::utils::Utils;
use cctool_lib::write_flash::WriteFlashTrait;
use cctool_lib::{
    CcTool, EraseMode, LockConfig, MemoryImage, ReadFlashParams, WriteFlashParams,
    WriteLockParams,
};
use std::path::Path;

pub fn execute_identify(tool: &mut CcTool) -> Result<()> {
    let identity = tool.identify().context("Failed to identify the chip")?;
    println!("{}", identity);
    if let Some(device) = identity.device {
        println!(
            "Flash: 0x{:X} bytes, code memory: 0x{:X} bytes, page: 0x{:X}, write block: 0x{:X}",
            device.flash_size, device.code_size, device.flash_page_size, device.write_block_size
        );
        let variants = identity.flash_size_variants();
        if variants.len() > 1 {
            let variants: Vec<String> = variants
                .iter()
                .map(|size| format!("{}K", size / 1024))
                .collect();
            println!("Flash size variants: {}", variants.join(", "));
        }
    }
    Ok(())
}

pub fn execute_status(tool: &mut CcTool) -> Result<()> {
    let status = tool.status().context("Failed to read the status register")?;
    println!("{}", status);
    Ok(())
}

/// 读取所有文件并合并为一个镜像，文件之间不允许重叠
pub fn load_images(
    files: &[(String, Option<u32>)],
    image_format: Option<ImageFormat>,
) -> Result<MemoryImage> {
    let mut segments = Vec::new();
    for (path, address) in files {
        let image = format::load_image(path, image_format, address.unwrap_or(0))
            .with_context(|| format!("Failed to load '{}'", path))?;
        segments.extend(image.segments().iter().cloned());
    }
    Ok(MemoryImage::from_segments(segments))
}

pub fn execute_write(
    tool: &mut CcTool,
    files: &[(String, Option<u32>)],
    image_format: Option<ImageFormat>,
    erase: EraseMode,
) -> Result<()> {
    let image = load_images(files, image_format)?;
    // 镜像问题要在连接芯片前暴露
    image.combine().context("Invalid image")?;

    tool.write_flash(&WriteFlashParams { image, erase })
        .context("Failed to write flash")
}

pub fn execute_read(
    tool: &mut CcTool,
    path: &str,
    address: u32,
    size: Option<usize>,
    image_format: Option<ImageFormat>,
) -> Result<()> {
    let image_format = match image_format {
        Some(image_format) => image_format,
        None => ImageFormat::detect_output(Path::new(path))?,
    };
    let image = tool
        .read_flash(&ReadFlashParams { address, size })
        .context("Failed to read flash")?;
    format::save_image(path, image_format, &image)
        .with_context(|| format!("Failed to save '{}'", path))
}

pub fn execute_read_lock(tool: &mut CcTool) -> Result<()> {
    let (byte, config) = tool.read_lock().context("Failed to read the lock byte")?;
    println!("Lock byte: 0x{:02X}", byte);
    println!("{}", config);
    Ok(())
}

pub fn execute_write_lock(
    tool: &mut CcTool,
    lock_boot: bool,
    size: usize,
    lock_debug: bool,
    erase: bool,
) -> Result<()> {
    let config = LockConfig {
        boot: !lock_boot,
        protected_size: size,
        debug_enabled: !lock_debug,
    };
    let value = tool
        .write_lock(&WriteLockParams { config, erase })
        .context("Failed to write the lock byte")?;
    println!("Lock byte 0x{:02X} written", value);
    Ok(())
}

pub fn execute_erase(tool: &mut CcTool, pages: &[u32]) -> Result<()> {
    if pages.is_empty() {
        tool.erase_chip().context("Failed to erase the chip")
    } else {
        tool.erase_pages(pages).context("Failed to erase pages")
    }
}

pub fn parse_addresses(values: &[String]) -> Result<Vec<u32>> {
    values
        .iter()
        .map(|v| Utils::str_to_u32(v).with_context(|| format!("Invalid address '{}'", v)))
        .collect()
}

pub fn parse_format(value: Option<&str>) -> Result<Option<ImageFormat>> {
    match value {
        None => Ok(None),
        Some(v) => match v.parse() {
            Ok(image_format) => Ok(Some(image_format)),
            Err(_) => bail!("Invalid image format '{}'", v),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_overlapping_files_fail_before_connecting() {
        let dir = tempfile::tempdir().unwrap();
        let first = dir.path().join("a.bin");
        let second = dir.path().join("b.bin");
        std::fs::File::create(&first).unwrap().write_all(&[0; 16]).unwrap();
        std::fs::File::create(&second).unwrap().write_all(&[1; 16]).unwrap();

        let files = vec![
            (first.to_string_lossy().into_owned(), Some(0x00)),
            (second.to_string_lossy().into_owned(), Some(0x08)),
        ];
        let image = load_images(&files, None).unwrap();
        assert_eq!(image.segments().len(), 2);
        assert!(image.combine().is_err());
    }

    #[test]
    fn test_format_names() {
        assert_eq!(parse_format(Some("ihex")).unwrap(), Some(ImageFormat::Hex));
        assert_eq!(parse_format(None).unwrap(), None);
        assert!(parse_format(Some("srec")).is_err());
    }
}
