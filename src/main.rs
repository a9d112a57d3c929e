use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{value_parser, Arg, Command};
use taskhub::common::{init_logging, wait_for_shutdown_signal};
use taskhub::{AppMode, Application, ShutdownManager};
use taskhub_config::{AppConfig, OutputFormat};
use tracing::{error, info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    // 解析命令行参数
    let matches = Command::new("taskhub")
        .version("1.0.0")
        .about("按优先级分道的任务分发与缓存读模型")
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .help("配置文件路径（默认查找 config/taskhub.toml）"),
        )
        .arg(
            Arg::new("mode")
                .short('m')
                .long("mode")
                .value_name("MODE")
                .help("运行模式")
                .value_parser(["demo", "serve"])
                .default_value("demo"),
        )
        .arg(
            Arg::new("log-level")
                .short('l')
                .long("log-level")
                .value_name("LEVEL")
                .help("日志级别，覆盖配置文件")
                .value_parser(["trace", "debug", "info", "warn", "error"]),
        )
        .arg(
            Arg::new("log-format")
                .long("log-format")
                .value_name("FORMAT")
                .help("日志格式，覆盖配置文件")
                .value_parser(["json", "pretty"]),
        )
        .arg(
            Arg::new("seed")
                .long("seed")
                .value_name("COUNT")
                .help("启动时写入的演示任务数量")
                .value_parser(value_parser!(usize)),
        )
        .get_matches();

    let config_path = matches.get_one::<String>("config").map(String::as_str);
    let mode_str = matches
        .get_one::<String>("mode")
        .map(String::as_str)
        .unwrap_or("demo");

    // 加载配置
    let mut config = AppConfig::load(config_path).with_context(|| match config_path {
        Some(path) => format!("加载配置文件失败: {path}"),
        None => "加载配置失败".to_string(),
    })?;

    if let Some(seed) = matches.get_one::<usize>("seed") {
        config.fixtures.seed_count = *seed;
    }

    let log_level = matches
        .get_one::<String>("log-level")
        .cloned()
        .unwrap_or_else(|| config.observability.log_level.to_string());
    let log_format = match matches.get_one::<String>("log-format") {
        Some(format) => format
            .parse::<OutputFormat>()
            .map_err(|e| anyhow::anyhow!(e))?,
        None => config.observability.log_format,
    };

    // 初始化日志系统
    init_logging(&log_level, log_format)?;

    info!("启动 taskhub");
    info!("运行模式: {mode_str}");

    let app_mode: AppMode = mode_str.parse()?;
    let app = Arc::new(Application::new(config, app_mode).await?);

    // 创建优雅关闭管理器
    let shutdown_manager = ShutdownManager::new();

    // 启动应用
    let mut app_handle = {
        let shutdown_rx = shutdown_manager.subscribe().await;
        let app = Arc::clone(&app);
        tokio::spawn(async move { app.run(shutdown_rx).await })
    };

    // 演示模式自行结束；否则等待关闭信号
    tokio::select! {
        result = &mut app_handle => {
            result.context("应用任务异常退出")??;
            info!("taskhub 已退出");
            return Ok(());
        }
        _ = wait_for_shutdown_signal() => {
            info!("收到关闭信号，开始优雅关闭...");
        }
    }

    shutdown_manager.shutdown().await;

    // 等待应用关闭，设置超时
    match tokio::time::timeout(Duration::from_secs(30), app_handle).await {
        Ok(Ok(Ok(()))) => info!("应用已优雅关闭"),
        Ok(Ok(Err(e))) => error!("应用运行失败: {e:#}"),
        Ok(Err(e)) => error!("应用关闭时发生错误: {e}"),
        Err(_) => warn!("应用关闭超时，强制退出"),
    }

    info!("taskhub 已退出");
    Ok(())
}
