use anyhow::{Context, Result};
use bat::PrettyPrinter;
use clap::Parser;
use cliclack::{input, spinner};
use console::style;
use std::sync::Arc;

use areachat::gateway::{ChatGateway, GatewayConfig};
use areachat::models::message::ChatMessage;
use areachat::providers::configs::{OpenAiProviderConfig, OPENAI_HOST, OPENAI_MODEL};
use areachat::providers::openai::OpenAiProvider;
use areachat::store::{PostgresAreaStore, PostgresAreaStoreConfig};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// API key for the chat model
    #[arg(short, long, env = "AREACHAT_PROVIDER__API_KEY", hide_env_values = true)]
    api_key: String,

    /// Model to use
    #[arg(short, long, env = "AREACHAT_PROVIDER__MODEL", default_value = OPENAI_MODEL)]
    model: String,

    /// Base URL of an OpenAI compatible API
    #[arg(long, env = "AREACHAT_PROVIDER__HOST", default_value = OPENAI_HOST)]
    host: String,

    /// Postgres connection string for the areas directory
    #[arg(short, long, env = "AREACHAT_DATABASE__URL")]
    database_url: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut provider_config = OpenAiProviderConfig::new(cli.api_key);
    provider_config.host = cli.host;
    provider_config.model = cli.model;

    let provider = OpenAiProvider::new(provider_config)?;
    let store = PostgresAreaStore::new(PostgresAreaStoreConfig::new(cli.database_url))?;
    let gateway = ChatGateway::new(Box::new(provider), Arc::new(store), GatewayConfig::default());

    println!(
        "areachat {} {}",
        style(gateway.model()).cyan(),
        style("- type \"exit\" to end the session").dim()
    );
    println!("\n");

    let mut history: Vec<ChatMessage> = Vec::new();
    loop {
        let message_text: String = input("Message:").placeholder("").multiline().interact()?;

        if message_text.trim().eq_ignore_ascii_case("exit") {
            break;
        }

        history.push(ChatMessage::user(message_text));

        let spin = spinner();
        spin.start("awaiting reply");
        let result = gateway.reply(&history).await;
        spin.stop("");

        match result {
            Ok(reply) => {
                render(&reply.message)?;
                println!(
                    "\n{}",
                    style(format!("{} · {} tokens", reply.model, reply.tokens_used)).dim()
                );
                history.push(ChatMessage::assistant(reply.message));
            }
            Err(err) => {
                // Keep the history valid for the next attempt
                history.pop();
                println!("{}", style(format!("error: {}", err)).red());
            }
        }
        println!("\n");
    }
    Ok(())
}

fn render(content: &str) -> Result<()> {
    PrettyPrinter::new()
        .input_from_bytes(content.as_bytes())
        .language("markdown")
        .print()
        .context("failed to render reply")?;
    Ok(())
}
