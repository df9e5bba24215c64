use deepchat_llm::{ChatSession, CredentialSource, DeepSeekClient, WriterSink};
use std::sync::Arc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let api_key = CredentialSource::default().resolve().await?;
    let client = DeepSeekClient::new(api_key)?;

    let mut session = ChatSession::builder(Arc::new(client))
        .sink(WriterSink::stdout().with_prefix("DeepSeek: "))
        .build();

    for question in ["Hello, please introduce yourself", "What is Rust?"] {
        println!("Question: {}", question);
        session.ask(question, true).await?;

        if let Some(stats) = session.last_stream_stats() {
            println!(
                "({} fragments, {} skipped frames)\n",
                stats.fragments, stats.skipped_frames
            );
        }
    }

    Ok(())
}
