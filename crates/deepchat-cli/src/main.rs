mod config;

use anyhow::Context;
use deepchat_llm::{ChatSession, ClientConfig, DeepSeekClient, WriterSink};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::{Config, LoggingConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file
    dotenvy::dotenv().ok();

    let config = Config::load()
        .map_err(|e| anyhow::anyhow!("Failed to load configuration: {}", e))?;

    init_logging(&config.logging);

    tracing::info!(
        "Starting deepchat: model={}, base_url={}",
        config.llm.model,
        config.llm.base_url
    );

    let api_key = config
        .credential
        .resolve()
        .await
        .context("Failed to resolve API key")?;

    let client = DeepSeekClient::from_config(
        ClientConfig::new(api_key).with_base_url(config.llm.base_url.clone()),
    )?;

    let mut session = ChatSession::builder(Arc::new(client))
        .model(config.llm.model.clone())
        .options(config.llm.options())
        .sink(WriterSink::stdout().with_prefix(config.llm.prefix.clone()))
        .persona(config.persona.clone())
        .build();

    let questions: Vec<String> = std::env::args().skip(1).collect();
    if questions.is_empty() {
        run_interactive(&mut session, &config).await
    } else {
        run_script(&mut session, &config, &questions).await;
        Ok(())
    }
}

/// Ask each question in turn, like a scripted multi-round conversation
async fn run_script(session: &mut ChatSession, config: &Config, questions: &[String]) {
    for (round, question) in questions.iter().enumerate() {
        println!("\nRound {}:", round + 1);
        println!("Question: {}", question);
        ask(session, config, question).await;
    }
}

async fn run_interactive(session: &mut ChatSession, config: &Config) -> anyhow::Result<()> {
    println!("Type a question. /clear starts over, /quit exits.");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();

    loop {
        stdout.write_all(b"> ").await?;
        stdout.flush().await?;

        let Some(line) = lines.next_line().await? else {
            break;
        };

        match line.trim() {
            "" => continue,
            "/quit" | "/exit" => break,
            "/clear" => {
                session.reset();
                println!("Conversation cleared.");
            }
            question => ask(session, config, question).await,
        }
    }

    Ok(())
}

async fn ask(session: &mut ChatSession, config: &Config, question: &str) {
    match session.ask(question, config.llm.stream).await {
        Ok(answer) => {
            if !config.llm.stream {
                println!("{}{}", config.llm.prefix, answer);
            }
        }
        Err(e) => {
            tracing::error!("Request failed: {}", e);
            eprintln!("Error: {}", e.hint());
        }
    }
}

fn init_logging(config: &LoggingConfig) {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.level))
        .unwrap_or_else(|_| EnvFilter::new("warn"));

    let registry = tracing_subscriber::registry().with(env_filter);

    // stderr keeps logs out of the streamed answer on stdout
    match config.format.as_str() {
        "json" => {
            registry
                .with(
                    tracing_subscriber::fmt::layer()
                        .json()
                        .with_writer(std::io::stderr),
                )
                .init();
        }
        _ => {
            registry
                .with(
                    tracing_subscriber::fmt::layer()
                        .pretty()
                        .with_writer(std::io::stderr),
                )
                .init();
        }
    }
}
