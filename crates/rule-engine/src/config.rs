//! 配置管理模块
//!
//! 命令行工具的配置从配置文件和环境变量加载，库本身不读取任何配置。

use crate::parser::JsonFormat;
use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::path::Path;

const CONFIG_NAME: &str = "rule-engine";

/// 命令行工具配置
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub log_level: String,
    /// 日志输出为 JSON（结构化）或人类可读格式
    pub json_logs: bool,
    /// `convert` 未指定格式时使用的输出格式
    pub output_format: JsonFormat,
    /// 输出 JSON 时是否缩进
    pub pretty: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            log_level: "warn".to_string(),
            json_logs: false,
            output_format: JsonFormat::Simplified,
            pretty: true,
        }
    }
}

impl EngineConfig {
    /// 从配置文件和环境变量加载配置
    ///
    /// 加载顺序（后加载的会覆盖先加载的同名配置项）：
    /// 1. config/default.toml
    /// 2. config/rule-engine.toml
    /// 3. 环境变量（RULE_ENGINE_ 前缀，如 RULE_ENGINE_LOG_LEVEL -> log_level）
    ///
    /// 配置目录可通过 CONFIG_DIR 环境变量覆盖。
    pub fn load() -> Result<Self, ConfigError> {
        let config_dir = std::env::var("CONFIG_DIR").unwrap_or_else(|_| "config".to_string());
        Self::load_from(Path::new(&config_dir))
    }

    pub fn load_from(config_dir: &Path) -> Result<Self, ConfigError> {
        Config::builder()
            .add_source(File::from(config_dir.join("default.toml")).required(false))
            .add_source(
                File::from(config_dir.join(format!("{}.toml", CONFIG_NAME))).required(false),
            )
            .add_source(
                Environment::with_prefix("RULE_ENGINE")
                    .prefix_separator("_")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()
    }
}
