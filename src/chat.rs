//! Domain-restricted chat pipeline.
//!
//! assemble → stream → fold → commit. The bounded conversation memory is
//! owned by the caller and passed in explicitly; it is only appended to
//! after the response stream has completed, so a dropped or failed
//! stream leaves the history exactly as it was.

use anyhow::Result;
use std::io::Write;
use std::sync::Arc;

use crate::app::AppContext;
use crate::error::CoreResult;
use crate::memory::ConversationMemory;
use crate::models::{ChatRequest, Role};
use crate::prompt::{chat_messages, chat_user_turn};

/// Run the chat pipeline against the caller's memory. Chunks are folded
/// in arrival order; the user and assistant turns are committed together
/// once the full response exists.
pub async fn chat(
    ctx: &Arc<AppContext>,
    memory: &mut ConversationMemory,
    request: ChatRequest,
) -> CoreResult<String> {
    request.validate()?;

    let user_turn = chat_user_turn(&request.question, request.context.as_deref());
    let messages = chat_messages(memory, &user_turn);

    let stream = ctx.generator.stream(&messages).await?;
    let response = stream.collect().await?;

    memory.append(Role::User, user_turn);
    memory.append(Role::Assistant, response.clone());
    Ok(response)
}

/// CLI entry point: one-shot question against a throwaway memory,
/// printing chunks as they arrive.
pub async fn run_chat(ctx: &Arc<AppContext>, question: &str, context: Option<String>) -> Result<()> {
    let request = ChatRequest {
        question: question.to_string(),
        context,
    };
    request.validate()?;

    let mut memory = ConversationMemory::new(ctx.config.chat.memory_capacity);
    let user_turn = chat_user_turn(&request.question, request.context.as_deref());
    let messages = chat_messages(&memory, &user_turn);

    let mut stream = ctx.generator.stream(&messages).await?;
    let mut response = String::new();
    while let Some(chunk) = stream.next_chunk().await? {
        print!("{}", chunk);
        std::io::stdout().flush()?;
        response.push_str(&chunk);
    }
    println!();

    memory.append(Role::User, user_turn);
    memory.append(Role::Assistant, response);
    Ok(())
}
