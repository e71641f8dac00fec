use std::io::Read;

use anyhow::{bail, Context, Result};
use tracing::info;
use tracing_subscriber::EnvFilter;

use mistral_adapter::{load_from_env_config, MistralConfig, MistralModel, ProcessEnv};

fn print_help() {
    println!(
        "\
mistral-adapter v{}

Sends one prompt to the Mistral chat API and prints the reply.

USAGE:
    mistral-adapter [OPTIONS] [PROMPT...]

ARGUMENTS:
    PROMPT    Text to send [default: read from stdin]

OPTIONS:
    -c, --config <PATH>    Load settings from a TOML file instead of the environment
        --blocking         Use the blocking client instead of the async one
    -h, --help             Print this help message and exit
    -V, --version          Print version and exit

ENVIRONMENT VARIABLES:
    MISTRAL_API_KEY        API key (required unless --config is given)
    MISTRAL_MODEL          Model name [default: mistral-large-latest]
    MISTRAL_TEMPERATURE    Sampling temperature, 0.0 to 1.5 [default: 0.1]
    MISTRAL_ENDPOINT       API base URL [default: https://api.mistral.ai/v1]
    RUST_LOG               Log level filter for tracing
                           (e.g. debug, mistral_adapter=debug,warn)

    A config file may reference variables via ${{VAR_NAME}} syntax.

EXAMPLES:
    mistral-adapter \"Say hello in Breton\"
    echo \"Translate: good morning\" | mistral-adapter
    mistral-adapter -c mistral.toml --blocking \"hi\"",
        env!("CARGO_PKG_VERSION"),
    );
}

#[derive(Debug, Default, PartialEq)]
struct Args {
    config_path: Option<String>,
    blocking: bool,
    prompt: Vec<String>,
}

enum Command {
    Run(Args),
    Help,
    Version,
}

fn parse_args(args: impl IntoIterator<Item = String>) -> Result<Command> {
    let mut parsed = Args::default();
    let mut args = args.into_iter();
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--version" | "-V" => return Ok(Command::Version),
            "--help" | "-h" => return Ok(Command::Help),
            "--blocking" => parsed.blocking = true,
            "--config" | "-c" => match args.next() {
                Some(path) => parsed.config_path = Some(path),
                None => bail!("{arg} requires a path"),
            },
            "--" => {
                parsed.prompt.extend(args.by_ref());
            }
            other if other.starts_with('-') && other.len() > 1 => bail!("unknown option: {other}"),
            other => parsed.prompt.push(other.to_string()),
        }
    }
    Ok(Command::Run(parsed))
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = match parse_args(std::env::args().skip(1))? {
        Command::Version => {
            println!("mistral-adapter v{}", env!("CARGO_PKG_VERSION"));
            return Ok(());
        }
        Command::Help => {
            print_help();
            return Ok(());
        }
        Command::Run(args) => args,
    };

    // Logs go to stderr so stdout carries only the reply
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("mistral_adapter=info")),
        )
        .init();

    let config = match &args.config_path {
        Some(path) => {
            info!("Loading configuration from {path}");
            MistralConfig::load(path, &ProcessEnv)?
        }
        None => load_from_env_config(&ProcessEnv)?,
    };
    info!(
        "LLM: mistral ({}, temperature {})",
        config.model_name, config.temperature
    );

    let prompt = if args.prompt.is_empty() {
        let mut input = String::new();
        std::io::stdin()
            .read_to_string(&mut input)
            .context("failed to read prompt from stdin")?;
        input
    } else {
        args.prompt.join(" ")
    };
    if prompt.trim().is_empty() {
        bail!("empty prompt");
    }

    let model = MistralModel::new(config);
    let reply = if args.blocking {
        // The adapter, and its blocking HTTP client, stay on the blocking pool
        tokio::task::spawn_blocking(move || model.run(&prompt)).await??
    } else {
        model.async_run(&prompt).await?
    };

    println!("{reply}");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Command {
        parse_args(args.iter().map(|a| a.to_string())).unwrap()
    }

    fn run_args(args: &[&str]) -> Args {
        match parse(args) {
            Command::Run(args) => args,
            _ => panic!("expected Command::Run"),
        }
    }

    #[test]
    fn test_prompt_words_are_collected() {
        let args = run_args(&["Say", "hello"]);
        assert_eq!(args.prompt, vec!["Say", "hello"]);
        assert!(!args.blocking);
        assert!(args.config_path.is_none());
    }

    #[test]
    fn test_options() {
        let args = run_args(&["-c", "mistral.toml", "--blocking", "hi"]);
        assert_eq!(
            args,
            Args {
                config_path: Some("mistral.toml".to_string()),
                blocking: true,
                prompt: vec!["hi".to_string()],
            }
        );
    }

    #[test]
    fn test_double_dash_ends_options() {
        let args = run_args(&["--", "--blocking", "-c"]);
        assert!(!args.blocking);
        assert_eq!(args.prompt, vec!["--blocking", "-c"]);
    }

    #[test]
    fn test_help_and_version() {
        assert!(matches!(parse(&["--help"]), Command::Help));
        assert!(matches!(parse(&["hi", "-V"]), Command::Version));
    }

    #[test]
    fn test_config_without_path_fails() {
        assert!(parse_args(vec!["--config".to_string()]).is_err());
    }

    #[test]
    fn test_unknown_option_fails() {
        assert!(parse_args(vec!["--stream".to_string()]).is_err());
    }
}
