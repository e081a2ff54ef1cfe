use anyhow::{anyhow, bail};
use futures::StreamExt;
use mittai::{
    Capability, CapabilitySet, ChatInput, ChatMessage, ChatResult, EmbeddingsInput,
    EnvCredentials, MittwaldProvider, OperationType, RequestOptions, SettingsManager,
};
use std::io::Write;
use std::path::PathBuf;

pub fn provider(settings: Option<PathBuf>) -> MittwaldProvider {
    let settings = settings
        .map(SettingsManager::new)
        .unwrap_or_else(SettingsManager::default_path);
    MittwaldProvider::builder()
        .settings(settings)
        .credentials(EnvCredentials)
        .build()
}

fn parse_capabilities(names: &[String]) -> anyhow::Result<CapabilitySet> {
    names
        .iter()
        .map(|n| Capability::parse(n).ok_or_else(|| anyhow!("Unknown capability: {}", n)))
        .collect()
}

pub async fn list_models(
    provider: &MittwaldProvider,
    operation: &str,
    capabilities: &[String],
) -> anyhow::Result<()> {
    let Some(op) = OperationType::parse(operation) else {
        bail!("Unknown operation type: {}", operation);
    };
    let caps = parse_capabilities(capabilities)?;
    let models = provider.get_configured_models(op, &caps).await?;
    if models.is_empty() {
        println!("No models available for {}.", op);
    }
    for m in models {
        println!("{}", m);
    }
    Ok(())
}

pub async fn chat(
    provider: &MittwaldProvider,
    model: &str,
    system: Option<String>,
    stream: bool,
    prompt: String,
) -> anyhow::Result<()> {
    let mut input = ChatInput::new(vec![ChatMessage::user(prompt)]);
    if let Some(s) = system {
        input = input.with_system_prompt(s);
    }
    let options = if stream {
        RequestOptions::streamed()
    } else {
        RequestOptions::default()
    };

    let output = match provider.chat(input, model, options).await? {
        ChatResult::Complete(out) => {
            println!("{}", out.message.text);
            out
        }
        ChatResult::Streamed(mut s) => {
            let mut stdout = std::io::stdout();
            while let Some(chunk) = s.next().await {
                if let Some(text) = chunk?.content {
                    print!("{}", text);
                    stdout.flush()?;
                }
            }
            println!();
            s.into_output().await?
        }
    };

    for call in &output.message.tool_calls {
        println!("tool call {} {}({})", call.id, call.name, call.arguments);
    }
    let u = output.usage;
    eprintln!(
        "finish={} input={} output={} reasoning={} cached={}",
        output.finish_reason.as_deref().unwrap_or("-"),
        u.input,
        u.output,
        u.reasoning,
        u.cached
    );
    Ok(())
}

pub async fn embed(provider: &MittwaldProvider, model: &str, text: String) -> anyhow::Result<()> {
    let out = provider
        .embeddings(EmbeddingsInput::new(text), model, RequestOptions::default())
        .await?;
    let expected = provider.embeddings_vector_size(model);
    println!("dimensions: {}", out.vector.len());
    if expected != 0 && expected != out.vector.len() {
        println!("warning: {} usually returns {} dimensions", model, expected);
    }
    println!("tokens: {}", out.usage.input);
    Ok(())
}
