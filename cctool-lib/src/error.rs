use thiserror::Error;

/// Convenient result type for `cctool-lib`.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("Intel HEX parse error: {0}")]
    IntelHex(#[from] ihex::ReaderError),

    #[error("Intel HEX write error: {0}")]
    IntelHexWrite(#[from] ihex::WriterError),

    #[error("ELF parse error: {0}")]
    Elf(#[from] goblin::error::Error),

    #[error("integer parse error: {0}")]
    ParseInt(#[from] std::num::ParseIntError),

    #[error("image format error: {0}")]
    Format(String),

    #[error("debug transport error: {0}")]
    Transport(String),

    #[error("protocol error: {0}")]
    Protocol(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("timeout while {0}")]
    Timeout(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("unsupported chip: {0}")]
    UnsupportedChip(String),

    #[error("regions at 0x{first:08X} and 0x{second:08X} overlap")]
    OverlappingRegions { first: u32, second: u32 },

    #[error(
        "verification failed at address 0x{address:08X} (block 0x{block_address:08X}): {} != {}",
        hex(.expected),
        hex(.actual)
    )]
    Verification {
        block_address: u32,
        address: u32,
        expected: Vec<u8>,
        actual: Vec<u8>,
    },
}

impl Error {
    pub fn protocol(msg: impl Into<String>) -> Self {
        Self::Protocol(msg.into())
    }

    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    pub fn timeout(msg: impl Into<String>) -> Self {
        Self::Timeout(msg.into())
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    pub fn format(msg: impl Into<String>) -> Self {
        Self::Format(msg.into())
    }

    pub fn transport(msg: impl Into<String>) -> Self {
        Self::Transport(msg.into())
    }
}

fn hex(data: &[u8]) -> String {
    data.iter().map(|b| format!("{:02x}", b)).collect()
}
