use deepchat_llm::{ChatSession, CredentialSource, DeepSeekClient};
use std::sync::Arc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let api_key = CredentialSource::default().resolve().await?;
    let client = DeepSeekClient::new(api_key)?;
    let mut session = ChatSession::new(Arc::new(client), "deepseek-chat");

    let answer = session.ask("What is the capital of France?", false).await?;
    println!("Response: {}", answer);

    let answer = session.ask("And its population?", false).await?;
    println!("Response: {}", answer);

    Ok(())
}
