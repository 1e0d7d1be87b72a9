//! Basic OpenAI client usage example

use openai_client::{ChatRequest, Message, OpenAIClient};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize from environment
    let client = OpenAIClient::from_env()?;

    println!("=== Chat Completion ===");
    let response = client
        .chat_completion(
            ChatRequest::new("gpt-3.5-turbo")
                .message(Message::user("What is Rust in one sentence?"))
                .temperature(0.0)
                .max_tokens(100),
        )
        .await?;
    println!("{}", response.content);

    println!("\n=== Embedding ===");
    match client
        .create_embedding("Rust is a systems language.", "text-embedding-ada-002")
        .await
    {
        Ok(embedding) => println!("{} dimensions", embedding.len()),
        Err(e) if e.is_context_length_exceeded() => println!("input too long: {}", e),
        Err(e) => return Err(e.into()),
    }

    Ok(())
}
