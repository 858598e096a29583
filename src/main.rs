//! Bank Notification Bridge CLI
//!
//! 用目录模拟宿主系统，驱动整条通知管道

use anyhow::{Context, Result};
use bank_notification_bridge::{
    BridgeConfig, FileHost, HostSignal, JsonLinesSink, NotificationEvent, NotificationHost,
    NotificationListenerPlugin, RawEvent,
};
use clap::{Parser, Subcommand};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{info, warn};
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser)]
#[command(name = "bnb")]
#[command(about = "Bank Notification Bridge - 捕获银行应用通知")]
#[command(version)]
struct Cli {
    /// 宿主目录（active.json、enabled_listeners 所在位置）
    #[arg(long, global = true)]
    host_dir: Option<PathBuf>,

    /// 配置文件路径
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// 显示权限、队列和活跃通知状态
    Status,
    /// 检查权限，未开启时打开设置
    Permission,
    /// 把 JSONL 文件中的原始通知依次投递给监听服务
    Replay {
        /// 每行一个原始通知
        path: PathBuf,
    },
    /// 取出并清空待处理队列
    Pending {
        /// 输出 JSON 格式
        #[arg(long)]
        json: bool,
    },
    /// 检查漏收的银行通知
    Missed {
        /// 输出 JSON 格式
        #[arg(long)]
        json: bool,
    },
    /// 强制重处理所有活跃通知
    Reprocess,
    /// 列出所有活跃通知（调试用）
    Active {
        /// 输出 JSON 格式
        #[arg(long)]
        json: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // 通过 RUST_LOG 环境变量控制日志级别，默认为 info
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("bank_notification_bridge=info,bnb=info"));

    fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .init();

    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => BridgeConfig::load_from(path)?,
        None => BridgeConfig::load()?,
    };
    let host_dir = cli
        .host_dir
        .clone()
        .unwrap_or_else(|| config.data_dir().join("host"));
    let host = Arc::new(FileHost::new(host_dir));
    let plugin = NotificationListenerPlugin::new(config, host.clone(), Arc::new(JsonLinesSink::stdout()));

    match cli.command {
        Commands::Status => {
            let enabled = plugin.is_enabled().await;
            let pending = plugin.queue().len()?;
            let active = host.active_notifications()?.len();

            println!("监听组件: {}", plugin.config().listener_component);
            println!("权限: {}", if enabled { "已开启" } else { "未开启" });
            println!("队列: {} ({} 条待处理)", plugin.queue().path().display(), pending);
            println!("活跃通知: {} 条", active);
        }
        Commands::Permission => {
            if plugin.request_permission() {
                println!("通知监听权限已开启");
            } else {
                println!(
                    "通知监听权限未开启，请把 {} 写入 {}",
                    plugin.config().listener_component,
                    host.enabled_listeners_path().display()
                );
            }
        }
        Commands::Replay { path } => {
            replay(plugin, &host, &path).await?;
        }
        Commands::Pending { json } => {
            let events = plugin.get_pending_notifications()?;
            print_events(&events, json)?;
        }
        Commands::Missed { json } => {
            let _listener = plugin.create_listener();
            let events = plugin.check_missed_notifications();
            print_events(&events, json)?;
        }
        Commands::Reprocess => {
            let _listener = plugin.create_listener();
            let summary = plugin.reprocess_active_notifications()?;
            eprintln!(
                "已重处理 {} 条银行通知（共 {} 条活跃通知）",
                summary.reprocessed, summary.total
            );
        }
        Commands::Active { json } => {
            let _listener = plugin.create_listener();
            let active = plugin.get_all_active_notifications()?;
            if json {
                println!("{}", serde_json::to_string_pretty(&active)?);
            } else {
                println!("发现 {} 条活跃通知:\n", active.len());
                for notification in active {
                    println!("  {} | {} | {}", notification.source_id, notification.title, notification.text);
                    println!("    key: {} | 字段: {}", notification.key, notification.payload_keys.join(", "));
                }
            }
        }
    }

    Ok(())
}

/// 读取 JSONL 原始通知，写入宿主活跃列表后逐条投递
async fn replay(plugin: NotificationListenerPlugin, host: &FileHost, path: &Path) -> Result<()> {
    let content =
        fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))?;

    let mut raws = Vec::new();
    for (index, line) in content.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str::<RawEvent>(line) {
            Ok(raw) => raws.push(raw),
            Err(e) => warn!(line = index + 1, error = %e, "Skipping invalid raw notification"),
        }
    }

    let mut active = host.active_notifications()?;
    active.retain(|existing| !raws.iter().any(|raw| raw.key == existing.key));
    active.extend(raws.iter().cloned());
    host.set_active(&active)?;

    let bridge = plugin.load();
    let (tx, rx) = mpsc::channel(raws.len().max(1) + 2);
    let listener = plugin.create_listener().spawn(rx);

    tx.send(HostSignal::Connected).await?;
    for raw in raws {
        tx.send(HostSignal::Posted(raw)).await?;
    }
    tx.send(HostSignal::Destroyed).await?;
    drop(tx);
    listener.await?;

    // 释放插件持有的发送端后桥接任务才会结束
    drop(plugin);
    let delivered = bridge.await?;
    info!(delivered, "Replay finished");
    Ok(())
}

fn print_events(events: &[NotificationEvent], json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(events)?);
        return Ok(());
    }

    println!("发现 {} 条银行通知:\n", events.len());
    for event in events {
        println!("  [{}] {} | {}", event.label, event.title, event.text);
        println!("    来源: {} | 时间: {}", event.source_id, event.timestamp_millis);
    }
    Ok(())
}
