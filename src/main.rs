//! llmping - stream a completion from a local LLM server to the terminal.
//!
//! Sends one prompt to an OpenAI-style /v1/completions endpoint and prints
//! tokens as they arrive. Meant for smoke-testing a locally running
//! completion server without pulling in a full SDK.

mod client;
mod config;
mod decoder;

use std::io::Write;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::debug;
use tracing_subscriber::EnvFilter;

/// Prompt used when no arguments are given.
const DEFAULT_PROMPT: &str = "public static void main(String[] ";

#[derive(Parser)]
#[command(name = "llmping")]
#[command(about = "Stream a completion from a local LLM server")]
struct Cli {
    /// Free-text prompt; all arguments are joined with spaces
    #[arg(
        value_name = "PROMPT",
        trailing_var_arg = true,
        allow_hyphen_values = true
    )]
    prompt: Vec<String>,
}

impl Cli {
    fn resolve_prompt(&self) -> String {
        if self.prompt.is_empty() {
            DEFAULT_PROMPT.to_string()
        } else {
            self.prompt.join(" ")
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Logs go to stderr; stdout is reserved for the streamed completion.
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::from_default_env()
                .add_directive("llmping=warn".parse().unwrap())
                .add_directive("reqwest=warn".parse().unwrap()),
        )
        .init();

    let cli = Cli::parse();
    let prompt = cli.resolve_prompt();

    let config = config::Config::from_env();
    debug!(url = %config.url, model = %config.model, "resolved configuration");

    let client = client::CompletionClient::new(config)?;

    // Echo the prompt unterminated so the completion reads as its
    // continuation.
    let mut stdout = std::io::stdout();
    write!(stdout, "{}", prompt)?;
    stdout.flush().context("Failed to write prompt to stdout")?;

    client.stream_completion(&prompt, &mut stdout).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prompt_joins_arguments_with_spaces() {
        let cli = Cli {
            prompt: vec!["foo".to_string(), "bar".to_string()],
        };
        assert_eq!(cli.resolve_prompt(), "foo bar");
    }

    #[test]
    fn test_default_prompt_when_no_arguments() {
        let cli = Cli { prompt: vec![] };
        assert_eq!(cli.resolve_prompt(), DEFAULT_PROMPT);
    }
}
