use anyhow::{Context, Result};
use cctool_lib::utils::Utils;
use serde::{Deserialize, Serialize};

/// 应用程序的默认配置值
pub struct Defaults;

impl Defaults {
    pub const BACKEND: &'static str = "dummy";
    pub const FREQUENCY: u32 = 100;
    pub const CONNECT_ATTEMPTS: i8 = 3;
    pub const ERASE: &'static str = "pages";
}

/// 数值字符串，例如 "0x400"、"32k"
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NumString(pub String);

impl NumString {
    pub fn to_u32(&self) -> Result<u32> {
        Utils::str_to_u32(&self.0).with_context(|| format!("Invalid number '{}'", self.0))
    }

    pub fn to_usize(&self) -> Result<usize> {
        Ok(self.to_u32()? as usize)
    }
}

/// 写入文件配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WriteFlashFileConfig {
    pub path: String,
    /// 仅对 bin 文件有效
    pub address: Option<NumString>,
}

/// 写入命令配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WriteFlashCommandConfig {
    #[serde(default = "default_erase")]
    pub erase: String,
    pub format: Option<String>,
    pub files: Vec<WriteFlashFileConfig>,
}

/// 读取命令配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReadFlashCommandConfig {
    pub path: String,
    pub address: Option<NumString>,
    pub size: Option<NumString>,
    pub format: Option<String>,
}

/// 锁定字节命令配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WriteLockCommandConfig {
    #[serde(default)]
    pub lock_boot: bool,
    pub size: Option<NumString>,
    #[serde(default)]
    pub lock_debug: bool,
    #[serde(default)]
    pub erase: bool,
}

/// 擦除命令配置，`pages` 为空时整片擦除
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EraseCommandConfig {
    #[serde(default)]
    pub pages: Vec<NumString>,
}

/// 无参数的命令
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EmptyCommandConfig {}

/// JSON 配置文件的根结构
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CcToolConfig {
    #[serde(default = "default_backend")]
    pub backend: String,
    #[serde(default = "default_frequency")]
    pub frequency: u32,
    #[serde(default = "default_connect_attempts")]
    pub connect_attempts: i8,
    pub block_size: Option<NumString>,
    pub page_size: Option<NumString>,
    #[serde(default)]
    pub quiet: bool,

    // 命令 - 只能存在其中一个
    pub identify: Option<EmptyCommandConfig>,
    pub status: Option<EmptyCommandConfig>,
    pub read_flash: Option<ReadFlashCommandConfig>,
    pub write_flash: Option<WriteFlashCommandConfig>,
    pub read_lock: Option<EmptyCommandConfig>,
    pub write_lock: Option<WriteLockCommandConfig>,
    pub erase: Option<EraseCommandConfig>,
}

fn default_backend() -> String {
    Defaults::BACKEND.to_string()
}
fn default_frequency() -> u32 {
    Defaults::FREQUENCY
}
fn default_connect_attempts() -> i8 {
    Defaults::CONNECT_ATTEMPTS
}
fn default_erase() -> String {
    Defaults::ERASE.to_string()
}

impl CcToolConfig {
    /// 从 JSON 文件加载配置
    pub fn from_file(path: &str) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file '{}'", path))?;
        Self::from_json(&content).with_context(|| format!("Failed to parse config file '{}'", path))
    }

    pub fn from_json(content: &str) -> Result<Self> {
        Ok(serde_json::from_str(content)?)
    }

    /// 创建一个具有所有默认值的配置
    pub fn with_defaults() -> Self {
        Self {
            backend: Defaults::BACKEND.to_string(),
            frequency: Defaults::FREQUENCY,
            connect_attempts: Defaults::CONNECT_ATTEMPTS,
            block_size: None,
            page_size: None,
            quiet: false,
            identify: None,
            status: None,
            read_flash: None,
            write_flash: None,
            read_lock: None,
            write_lock: None,
            erase: None,
        }
    }

    pub fn block_size(&self) -> Result<Option<usize>> {
        self.block_size.as_ref().map(NumString::to_usize).transpose()
    }

    pub fn page_size(&self) -> Result<Option<usize>> {
        self.page_size.as_ref().map(NumString::to_usize).transpose()
    }

    fn command_count(&self) -> usize {
        [
            self.identify.is_some(),
            self.status.is_some(),
            self.read_flash.is_some(),
            self.write_flash.is_some(),
            self.read_lock.is_some(),
            self.write_lock.is_some(),
            self.erase.is_some(),
        ]
        .iter()
        .filter(|&&x| x)
        .count()
    }

    /// 验证配置的有效性
    ///
    /// 命令可以省略（由命令行给出），但最多只能有一个。
    pub fn validate(&self) -> Result<()> {
        if self.command_count() > 1 {
            anyhow::bail!(
                "Configuration must contain at most one command (identify, status, read_flash, write_flash, read_lock, write_lock or erase)"
            );
        }

        self.block_size().context("Invalid block_size")?;
        self.page_size().context("Invalid page_size")?;

        if let Some(ref write_flash) = self.write_flash {
            for file in &write_flash.files {
                if let Some(ref address) = file.address {
                    address
                        .to_u32()
                        .with_context(|| format!("Invalid address for '{}'", file.path))?;
                }
            }
        }

        if let Some(ref read_flash) = self.read_flash {
            if let Some(ref address) = read_flash.address {
                address.to_u32().context("Invalid read_flash address")?;
            }
            if let Some(ref size) = read_flash.size {
                size.to_usize().context("Invalid read_flash size")?;
            }
        }

        if let Some(ref write_lock) = self.write_lock
            && let Some(ref size) = write_lock.size
        {
            size.to_usize().context("Invalid write_lock size")?;
        }

        if let Some(ref erase) = self.erase {
            for page in &erase.pages {
                page.to_u32().context("Invalid erase page address")?;
            }
        }

        Ok(())
    }

    pub fn has_command(&self) -> bool {
        self.command_count() > 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_fill_missing_fields() {
        let config = CcToolConfig::from_json(r#"{ "status": {} }"#).unwrap();
        assert_eq!(config.backend, "dummy");
        assert_eq!(config.frequency, 100);
        assert_eq!(config.connect_attempts, 3);
        assert!(config.status.is_some());
        config.validate().unwrap();
    }

    #[test]
    fn test_more_than_one_command_is_invalid() {
        let config = CcToolConfig::from_json(r#"{ "status": {}, "read_lock": {} }"#).unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_numbers_accept_suffixes() {
        let config = CcToolConfig::from_json(
            r#"{
                "block_size": "1k",
                "write_flash": {
                    "files": [{ "path": "fw.bin", "address": "0x400" }]
                }
            }"#,
        )
        .unwrap();
        config.validate().unwrap();
        assert_eq!(config.block_size().unwrap(), Some(1024));
        let write_flash = config.write_flash.unwrap();
        assert_eq!(write_flash.erase, "pages");
        assert_eq!(write_flash.files[0].address.as_ref().unwrap().to_u32().unwrap(), 0x400);
    }

    #[test]
    fn test_bad_number_is_reported() {
        let config = CcToolConfig::from_json(r#"{ "erase": { "pages": ["0xZZ"] } }"#).unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_file_is_read() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        std::io::Write::write_all(&mut file, br#"{ "frequency": 500, "identify": {} }"#).unwrap();
        let config = CcToolConfig::from_file(file.path().to_str().unwrap()).unwrap();
        assert_eq!(config.frequency, 500);
        assert!(config.has_command());
    }
}
