use anyhow::Result;
use clap::{Parser, Subcommand};
use serde_json::json;

use cortex::core::agent::NewsAgent;
use cortex::core::config::load_config;
use cortex::core::llm::{ChatModel, LlmClient};
use cortex::core::mode::Mode;

/// 新闻时间链生成命令行工具
#[derive(Parser, Debug)]
#[command(name = "cortex")]
#[command(version)]
struct Args {
    /// 配置文件路径
    #[arg(short, long, default_value = "config.toml")]
    config: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// 生成时间链，可选同时生成知识图谱
    Timeline {
        keyword: String,

        /// fast, deepsearch 或 balanced
        #[arg(short, long, default_value = "fast")]
        mode: String,

        #[arg(long)]
        graph: bool,
    },
    /// 澄清搜索关键词
    Clarify { keyword: String },
    /// 直接向 DeepSeek 发送一条消息
    Chat { message: String },
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();

    let args = Args::parse();
    let config = load_config(&args.config)?;
    config.validate()?;

    match args.command {
        Command::Timeline { keyword, mode, graph } => {
            let agent = NewsAgent::from_config(&config);
            let timeline = agent.generate_timeline(&keyword, Mode::parse(&mode)).await;
            let output = if graph {
                let graph = agent.generate_graph(&timeline).await;
                json!({ "timeline": timeline, "graph": graph })
            } else {
                serde_json::to_value(&timeline)?
            };
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
        Command::Clarify { keyword } => {
            let agent = NewsAgent::from_config(&config);
            let clarified = agent.clarify_keyword(&keyword).await;
            println!("{}", json!({ "original": keyword, "clarified": clarified }));
        }
        Command::Chat { message } => {
            let client = LlmClient::new(config.deepseek.clone());
            let response = client.complete("", &message).await?;
            println!(
                "{}",
                serde_json::to_string_pretty(&json!({
                    "response": response.content,
                    "model": response.model,
                    "usage": response.usage,
                }))?
            );
        }
    }

    Ok(())
}
