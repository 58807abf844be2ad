use std::io::Write;
use std::time::Duration;

use clap::Parser;
use infer_cli::{InferenceClient, DEFAULT_URL};
use infer_engine::GenerationConfig;
use tracing_subscriber::EnvFilter;

/// Command line client for the infer job server
#[derive(Parser)]
#[command(name = "infer-cli", version)]
struct Cli {
    /// Base URL of the server.
    #[arg(long, env = "INFER_URL", default_value = DEFAULT_URL, global = true)]
    url: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(clap::Subcommand)]
enum Command {
    /// Start a job, print text as it is generated, then claim the result.
    Generate {
        /// Input prompt text.
        #[arg(short, long)]
        prompt: String,

        /// Maximum number of new tokens.
        #[arg(short, long)]
        max_new_tokens: Option<usize>,

        /// Sampling temperature.
        #[arg(short, long)]
        temperature: Option<f64>,

        /// Milliseconds between status polls.
        #[arg(long, default_value_t = 200)]
        poll_ms: u64,
    },
    /// Print the current job status as JSON.
    Status,
    /// Claim the generated text of a finished job.
    Fetch,
    /// Ask the running job to stop.
    Stop,
}

#[tokio::main]
async fn main() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let client = InferenceClient::new(cli.url);

    if let Err(e) = run(&client, cli.command).await {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}

async fn run(client: &InferenceClient, command: Command) -> Result<(), Box<dyn std::error::Error>> {
    match command {
        Command::Generate {
            prompt,
            max_new_tokens,
            temperature,
            poll_ms,
        } => {
            let mut config = GenerationConfig::default();
            if let Some(max_new_tokens) = max_new_tokens {
                config.max_new_tokens = max_new_tokens;
            }
            if let Some(temperature) = temperature {
                config.temperature = temperature;
            }
            config.validate()?;

            let mut stdout = std::io::stdout();
            client
                .generate_to_completion(&prompt, config, Duration::from_millis(poll_ms), |piece| {
                    // Progress is best effort; the claimed result is authoritative.
                    let _ = write!(stdout, "{piece}");
                    let _ = stdout.flush();
                })
                .await?;
            println!();
        }
        Command::Status => {
            let snapshot = client.status().await?;
            println!("{}", serde_json::to_string_pretty(&snapshot)?);
        }
        Command::Fetch => {
            println!("{}", client.get_generated().await?);
        }
        Command::Stop => {
            client.stop().await?;
        }
    }
    Ok(())
}
