use anyhow::{Context, Result, anyhow, bail};
use cctool_lib::{CcTool, EraseMode};
use clap::ValueEnum;

use crate::config::CcToolConfig;
use crate::ops;

fn parse_erase_mode(value: &str) -> Result<EraseMode> {
    EraseMode::from_str(value, true).map_err(|_| {
        anyhow!(
            "Invalid erase mode '{}'. Must be one of: none, chip, pages",
            value
        )
    })
}

/// Execute command from config file
pub fn execute_config_command(config: &CcToolConfig, tool: &mut CcTool) -> Result<()> {
    let result = if config.identify.is_some() {
        ops::execute_identify(tool)
    } else if config.status.is_some() {
        ops::execute_status(tool)
    } else if let Some(ref read_flash) = config.read_flash {
        let address = match &read_flash.address {
            Some(address) => address.to_u32()?,
            None => 0,
        };
        let size = read_flash.size.as_ref().map(|s| s.to_usize()).transpose()?;
        let image_format = ops::parse_format(read_flash.format.as_deref())?;
        ops::execute_read(tool, &read_flash.path, address, size, image_format)
    } else if let Some(ref write_flash) = config.write_flash {
        let mut files = Vec::new();
        for file in &write_flash.files {
            let address = file.address.as_ref().map(|a| a.to_u32()).transpose()?;
            files.push((file.path.clone(), address));
        }
        if files.is_empty() {
            bail!("write_flash needs at least one file");
        }
        let erase = parse_erase_mode(&write_flash.erase)?;
        let image_format = ops::parse_format(write_flash.format.as_deref())?;
        ops::execute_write(tool, &files, image_format, erase)
    } else if config.read_lock.is_some() {
        ops::execute_read_lock(tool)
    } else if let Some(ref write_lock) = config.write_lock {
        let size = match &write_lock.size {
            Some(size) => size.to_usize()?,
            None => 0,
        };
        ops::execute_write_lock(
            tool,
            write_lock.lock_boot,
            size,
            write_lock.lock_debug,
            write_lock.erase,
        )
    } else if let Some(ref erase) = config.erase {
        let mut pages = Vec::new();
        for page in &erase.pages {
            pages.push(page.to_u32()?);
        }
        ops::execute_erase(tool, &pages)
    } else {
        bail!("No valid command found in config file.")
    };
    result.context("Failed to execute config file command")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_erase_modes() {
        assert_eq!(parse_erase_mode("Chip").unwrap(), EraseMode::Chip);
        assert_eq!(parse_erase_mode("pages").unwrap(), EraseMode::Pages);
        assert!(parse_erase_mode("all").is_err());
    }
}
