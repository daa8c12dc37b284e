//! Conversational agent command implementation

use std::path::Path;

use anyhow::{Context, Result};

use chit_core::ai::{AnthropicCompatBackend, ExpenseAgent};

use super::open_db;

pub async fn cmd_ask(db_path: &Path, question: &str, user: &str, no_encrypt: bool) -> Result<()> {
    let question = question.trim();
    if question.is_empty() {
        anyhow::bail!("Question cannot be empty");
    }

    let db = open_db(db_path, no_encrypt)?;

    let backend = AnthropicCompatBackend::from_env();
    if !backend.health_check().await {
        anyhow::bail!(
            "Model backend at {} is not responding. Start Ollama or set \
             ANTHROPIC_COMPATIBLE_HOST to a reachable endpoint.",
            backend.host()
        );
    }

    println!("🤖 Asking {} ...", backend.model());
    let agent = ExpenseAgent::new(backend, db);

    let result = agent
        .answer(question, user, Vec::new())
        .await
        .context("Agent query failed")?;

    println!();
    println!("{}", result.response);

    if !result.tool_calls.is_empty() {
        println!();
        for call in &result.tool_calls {
            let status = if call.success { "ok" } else { "failed" };
            let input = serde_json::to_string(&call.input).unwrap_or_default();
            println!("   🔧 {} {} [{}]", call.name, input, status);
        }
        println!(
            "   ({} tool call(s), {} model round trip(s))",
            result.tool_calls.len(),
            result.iterations
        );
    }

    Ok(())
}
