//! 规则引擎命令行工具
//!
//! 对 JSON 数据评估 JSON 规则、转换规则格式、调试路径解析。

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use rule_engine::config::EngineConfig;
use rule_engine::{Engine, JsonFormat, Rule, observability, path};
use serde::Serialize;
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::{debug, info};

#[derive(Parser, Debug)]
#[command(name = "rule-engine", version, about, long_about = None)]
struct Cli {
    /// 单行输出 JSON（覆盖配置中的 pretty）
    #[arg(long, global = true)]
    compact: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// 对数据评估规则，不匹配时以退出码 1 结束
    Evaluate {
        #[arg(long)]
        rule: PathBuf,
        #[arg(long)]
        data: PathBuf,
    },

    /// 以指定格式重新输出规则
    Convert {
        #[arg(long)]
        rule: PathBuf,
        /// simplified 或 structured，缺省时使用配置
        #[arg(long)]
        format: Option<JsonFormat>,
    },

    /// 按路径解析数据中的事实，未定义时以退出码 1 结束
    Resolve {
        #[arg(long)]
        data: PathBuf,
        #[arg(long)]
        path: String,
    },

    /// 列出已注册的操作符
    Operators,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = EngineConfig::load().unwrap_or_else(|e| {
        eprintln!("Failed to load config, using defaults: {}", e);
        EngineConfig::default()
    });

    if let Err(e) = observability::init(&config) {
        eprintln!("Failed to initialize logging: {}", e);
    }

    match run(cli, &config) {
        Ok(code) => code,
        Err(e) => {
            tracing::error!("{e:#}");
            eprintln!("error: {e:#}");
            ExitCode::from(2)
        }
    }
}

fn run(cli: Cli, config: &EngineConfig) -> Result<ExitCode> {
    let pretty = config.pretty && !cli.compact;
    let engine = Engine::new();

    match cli.command {
        Commands::Evaluate { rule, data } => {
            let rule = load_rule(&rule, &engine)?;
            let data = read_json(&data)?;

            let evaluation = rule.evaluate(&data).context("规则评估失败")?;
            info!(result = evaluation.result, "规则评估完成");
            print_json(&evaluation, pretty)?;

            Ok(if evaluation.result {
                ExitCode::SUCCESS
            } else {
                ExitCode::from(1)
            })
        }
        Commands::Convert { rule, format } => {
            let rule = load_rule(&rule, &engine)?;
            let format = format.unwrap_or(config.output_format);
            print_json(&rule.to_json(format), pretty)?;
            Ok(ExitCode::SUCCESS)
        }
        Commands::Resolve { data, path: fact_path } => {
            let data = read_json(&data)?;
            let fact = path::resolve(&data, &fact_path);
            debug!(path = %fact_path, undefined = fact.is_undefined(), "路径解析完成");

            if fact.is_undefined() {
                return Ok(ExitCode::from(1));
            }
            print_json(&fact, pretty)?;
            Ok(ExitCode::SUCCESS)
        }
        Commands::Operators => {
            for name in engine.operator_names() {
                println!("{}", name);
            }
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn read_json(path: &Path) -> Result<Value> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("无法读取文件: {}", path.display()))?;
    serde_json::from_str(&content).with_context(|| format!("JSON 格式错误: {}", path.display()))
}

fn load_rule(path: &Path, engine: &Engine) -> Result<Rule> {
    let value = read_json(path)?;
    Rule::from_value(value, engine).with_context(|| format!("规则无效: {}", path.display()))
}

fn print_json<T: Serialize>(value: &T, pretty: bool) -> Result<()> {
    let output = if pretty {
        serde_json::to_string_pretty(value)?
    } else {
        serde_json::to_string(value)?
    };
    println!("{}", output);
    Ok(())
}
