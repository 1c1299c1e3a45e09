use anyhow::{Context, Result, bail};
use cctool_lib::CcToolBase;
use cctool_lib::EraseMode;
use cctool_lib::format::ImageFormat;
use cctool_lib::utils::Utils;
use clap::{Parser, Subcommand, ValueEnum};
use std::str::FromStr;
use strum::{Display, EnumString};

use crate::config::CcToolConfig;

/// 调试接口后端
#[derive(EnumString, Display, Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
#[strum(ascii_case_insensitive)]
pub enum Backend {
    /// In-memory emulated CC2510, nothing leaves the process
    #[clap(name = "dummy")]
    #[strum(serialize = "dummy")]
    Dummy,
}

#[derive(Parser, Debug)]
#[command(author, version, about = "Chipcon CC111x/CC251x/CC243x flash programmer", long_about = None)]
pub struct Cli {
    /// JSON configuration file path
    #[arg(long = "config", short = 'f')]
    pub config: Option<String>,

    /// Debug interface backend (default: dummy)
    #[arg(short = 'B', long = "backend", value_enum)]
    pub backend: Option<Backend>,

    /// Debug clock frequency in kHz (default: 100)
    #[arg(long = "frequency")]
    pub frequency: Option<u32>,

    /// Number of attempts to connect, negative or 0 for infinite (default: 3)
    #[arg(long = "connect-attempts")]
    pub connect_attempts: Option<i8>,

    /// Override the flash write block size of the chip, e.g. 0x400 or 1k
    #[arg(long = "block-size")]
    pub block_size: Option<String>,

    /// Override the flash page size of the chip, e.g. 0x800 or 2k
    #[arg(long = "page-size")]
    pub page_size: Option<String>,

    /// Suppress progress bar output (default: false)
    #[arg(short = 'q', long = "quiet")]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Print chip id, revision and flash geometry
    #[command(name = "identify")]
    Identify,

    /// Print the debug status register
    #[command(name = "status")]
    Status,

    /// Read program memory into a file
    #[command(name = "read")]
    Read(ReadFlash),

    /// Write image files to program memory, verifying every block
    #[command(name = "write")]
    Write(WriteFlash),

    /// Read and decode the lock byte
    #[command(name = "read-lock")]
    ReadLock,

    /// Write the lock byte
    #[command(name = "write-lock")]
    WriteLock(WriteLock),

    /// Erase the whole chip, or the pages containing the given addresses
    #[command(name = "erase")]
    Erase(Erase),
}

#[derive(Parser, Debug, Clone)]
pub struct WriteFlash {
    /// How to erase before writing
    #[arg(short = 'e', long = "erase", value_enum, default_value = "pages")]
    pub erase: EraseMode,

    /// Input format, detected from extension or content when omitted
    #[arg(long = "format", value_enum)]
    pub format: Option<ImageFormat>,

    /// Image files (format: <filename[@address]>, the address only applies to raw binaries)
    #[arg(required = true)]
    pub files: Vec<String>,
}

#[derive(Parser, Debug, Clone)]
pub struct ReadFlash {
    /// Output file
    #[arg(required = true)]
    pub file: String,

    /// Start address
    #[arg(short = 'a', long = "address", default_value = "0")]
    pub address: String,

    /// Number of bytes, defaults to the code memory size of the chip
    #[arg(short = 's', long = "size")]
    pub size: Option<String>,

    /// Output format, taken from the extension when omitted
    #[arg(long = "format", value_enum)]
    pub format: Option<ImageFormat>,
}

#[derive(Parser, Debug, Clone)]
pub struct WriteLock {
    /// Protect the boot block
    #[arg(long = "lock-boot")]
    pub lock_boot: bool,

    /// Bytes of flash to protect, a whole number of pages (at most 7)
    #[arg(short = 's', long = "size", default_value = "0")]
    pub size: String,

    /// Disable the debug interface. Only a chip erase undoes this.
    #[arg(long = "lock-debug")]
    pub lock_debug: bool,

    /// Erase the lock page first, needed when clearing lock bits
    #[arg(short = 'e', long = "erase")]
    pub erase: bool,
}

#[derive(Parser, Debug, Clone)]
pub struct Erase {
    /// Page addresses; erase the whole chip when none are given
    pub addresses: Vec<String>,
}

/// 写入文件参数 `<filename[@address]>`
pub fn parse_file_arg(arg: &str) -> Result<(String, Option<u32>)> {
    match arg.rsplit_once('@') {
        Some((path, address)) if !path.is_empty() => {
            let address = Utils::str_to_u32(address)
                .with_context(|| format!("Invalid address in '{}'", arg))?;
            Ok((path.to_string(), Some(address)))
        }
        _ => Ok((arg.to_string(), None)),
    }
}

fn parse_size(value: Option<&str>, what: &str) -> Result<Option<usize>> {
    value
        .map(|v| Utils::str_to_usize(v).with_context(|| format!("Invalid {} '{}'", what, v)))
        .transpose()
}

/// Merge CLI arguments with configuration file, CLI args take precedence
pub fn merge_config(args: &Cli, config: Option<&CcToolConfig>) -> Result<(Backend, CcToolBase)> {
    let defaults = CcToolConfig::with_defaults();
    let base_config = config.unwrap_or(&defaults);

    let backend = match args.backend {
        Some(backend) => backend,
        None => <Backend as FromStr>::from_str(&base_config.backend)
            .with_context(|| format!("Invalid backend in config: {}", base_config.backend))?,
    };

    let block_size = match parse_size(args.block_size.as_deref(), "block size")? {
        Some(size) => Some(size),
        None => base_config.block_size()?,
    };
    let page_size = match parse_size(args.page_size.as_deref(), "page size")? {
        Some(size) => Some(size),
        None => base_config.page_size()?,
    };
    if block_size == Some(0) || page_size == Some(0) {
        bail!("Block and page sizes must be non-zero");
    }

    let base = CcToolBase {
        frequency_khz: args.frequency.unwrap_or(base_config.frequency),
        connect_attempts: args
            .connect_attempts
            .unwrap_or(base_config.connect_attempts),
        block_size,
        page_size,
        quiet: args.quiet || base_config.quiet,
    };
    Ok((backend, base))
}

/// Determine which command to execute from CLI args or config file
#[derive(Debug)]
pub enum CommandSource {
    Cli(Commands),
    Config(CcToolConfig),
}

pub fn get_command_source(args: &Cli, config: Option<CcToolConfig>) -> Result<CommandSource> {
    match (&args.command, config) {
        (Some(cmd), _) => Ok(CommandSource::Cli(cmd.clone())),
        (None, Some(cfg)) => Ok(CommandSource::Config(cfg)),
        (None, None) => {
            bail!("No command specified. Use a subcommand or provide a config file with a command.")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("cctool").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn test_file_argument_with_address() {
        assert_eq!(
            parse_file_arg("app.bin@0x400").unwrap(),
            ("app.bin".to_string(), Some(0x400))
        );
        assert_eq!(parse_file_arg("app.hex").unwrap(), ("app.hex".to_string(), None));
        assert!(parse_file_arg("app.bin@zz").is_err());
    }

    #[test]
    fn test_cli_overrides_config() {
        let args = parse(&["--block-size", "256", "--connect-attempts", "1", "status"]);
        let mut config = CcToolConfig::with_defaults();
        config.frequency = 250;
        config.connect_attempts = 5;

        let (backend, base) = merge_config(&args, Some(&config)).unwrap();
        assert_eq!(backend, Backend::Dummy);
        assert_eq!(base.frequency_khz, 250);
        assert_eq!(base.connect_attempts, 1);
        assert_eq!(base.block_size, Some(256));
        assert_eq!(base.page_size, None);
    }

    #[test]
    fn test_zero_block_size_is_rejected() {
        let args = parse(&["--block-size", "0", "status"]);
        assert!(merge_config(&args, None).is_err());
    }

    #[test]
    fn test_write_defaults_to_page_erase() {
        let args = parse(&["write", "fw.hex"]);
        match args.command {
            Some(Commands::Write(write)) => {
                assert_eq!(write.erase, EraseMode::Pages);
                assert_eq!(write.files, vec!["fw.hex".to_string()]);
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }
}
