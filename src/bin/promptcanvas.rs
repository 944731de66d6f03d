//! CLI for PromptCanvas - styled text-to-image generation.

use clap::{Args, Parser, Subcommand};
use promptcanvas::composer::ComposerClient;
use promptcanvas::{
    Config, FileSurface, ImageProviderKind, Orchestrator, RemoteBoundary, StyleKey, StyleTable,
    WaitController, WaitState,
};
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "promptcanvas")]
#[command(about = "Turn a short description and an art style into an image")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output as JSON
    #[arg(long, global = true)]
    json: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the HTTP generation endpoint
    Serve,

    /// Generate an image and save it to a file
    Generate(GenerateArgs),

    /// List available styles
    Styles,

    /// List providers and whether they are configured
    Providers,
}

#[derive(Args)]
struct GenerateArgs {
    /// Description of the image
    prompt: String,

    /// Art style
    #[arg(short, long, default_value = "realistic")]
    style: String,

    /// Output file path
    #[arg(short, long)]
    output: PathBuf,

    /// Submit to a running server instead of calling the provider in-process
    #[arg(long, conflicts_with = "standalone")]
    endpoint: Option<String>,

    /// Build a Direct-URL reference locally, without any server
    #[arg(long)]
    standalone: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Serve => {
            let config = Config::from_env()?;
            promptcanvas::server::serve(&config).await?;
        }
        Commands::Generate(args) => {
            generate(args, cli.json).await?;
        }
        Commands::Styles => {
            list_styles(cli.json)?;
        }
        Commands::Providers => {
            list_providers(cli.json)?;
        }
    }

    Ok(())
}

fn client_for(args: &GenerateArgs, http: &reqwest::Client) -> anyhow::Result<ComposerClient> {
    let styles = Arc::new(StyleTable::builtin());

    if args.standalone {
        let provider = Config::from_env()?.direct_url_provider()?;
        return Ok(ComposerClient::standalone(styles, provider));
    }

    if let Some(endpoint) = &args.endpoint {
        let boundary = RemoteBoundary::new(endpoint).with_http_client(http.clone());
        return Ok(ComposerClient::delegating(styles, Arc::new(boundary)));
    }

    let config = Config::from_env()?;
    let orchestrator = Orchestrator::from_config(&config, Arc::clone(&styles));
    Ok(ComposerClient::delegating(styles, Arc::new(orchestrator)))
}

async fn generate(args: GenerateArgs, json_output: bool) -> anyhow::Result<()> {
    let http = reqwest::Client::new();
    let client = client_for(&args, &http)?;
    let surface = FileSurface::new(args.output.clone()).with_http_client(http);
    let mut controller = WaitController::new();

    let mut updates = controller.subscribe();
    let ticker = tokio::spawn(async move {
        while updates.changed().await.is_ok() {
            let snapshot = updates.borrow_and_update().clone();
            if snapshot.state == WaitState::AwaitingRender && !json_output {
                eprint!("\rRendering... {}s", snapshot.elapsed_secs);
                let _ = std::io::stderr().flush();
            }
        }
    });

    let state = controller
        .run(&client, &surface, &args.prompt, &args.style)
        .await;
    ticker.abort();

    let snapshot = controller.snapshot();
    if json_output {
        let result = serde_json::json!({
            "success": state == WaitState::Ready,
            "state": state,
            "output": args.output.display().to_string(),
            "image": snapshot.image.as_ref().map(|image| image.to_string()),
            "elapsed_secs": snapshot.elapsed_secs,
            "notice": snapshot.notice,
        });
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else if snapshot.elapsed_secs > 0 {
        eprintln!();
    }

    match state {
        WaitState::Ready => {
            if !json_output {
                println!(
                    "Generated image: {} in {}s",
                    args.output.display(),
                    snapshot.elapsed_secs
                );
            }
            Ok(())
        }
        other => {
            let notice = snapshot.notice;
            let message = notice
                .as_ref()
                .map(|n| n.message.as_str())
                .unwrap_or("generation did not complete");
            match notice.as_ref().and_then(|n| n.detail.as_deref()) {
                Some(detail) => anyhow::bail!("{message} ({other:?}: {detail})"),
                None => anyhow::bail!("{message} ({other:?})"),
            }
        }
    }
}

fn list_styles(json_output: bool) -> anyhow::Result<()> {
    #[derive(serde::Serialize)]
    struct StyleInfo<'a> {
        key: &'static str,
        label: &'static str,
        modifier: &'a str,
    }

    let table = StyleTable::builtin();
    let styles: Vec<StyleInfo<'_>> = StyleKey::ALL
        .iter()
        .map(|key| StyleInfo {
            key: key.as_str(),
            label: key.label(),
            modifier: table.modifier_for(*key),
        })
        .collect();

    if json_output {
        println!("{}", serde_json::to_string_pretty(&styles)?);
    } else {
        println!("Available styles:\n");
        for s in &styles {
            let marker = if s.key == table.default_style().as_str() {
                " (default)"
            } else {
                ""
            };
            println!("  {} - {}{}", s.key, s.label, marker);
            println!("    {}", s.modifier);
        }
    }

    Ok(())
}

fn list_providers(json_output: bool) -> anyhow::Result<()> {
    #[derive(serde::Serialize)]
    struct ProviderInfo {
        kind: &'static str,
        name: Option<String>,
        env_var: Option<&'static str>,
        model: Option<String>,
        configured: bool,
        selected: bool,
    }

    let config = Config::from_env()?;
    let providers: Vec<ProviderInfo> = ImageProviderKind::ALL
        .iter()
        .map(|kind| {
            let candidate = Config {
                provider: *kind,
                ..config.clone()
            };
            let built = candidate.build_provider().ok();
            ProviderInfo {
                kind: kind.as_str(),
                name: built.as_ref().map(|p| p.name().to_string()),
                env_var: candidate.credential_env(),
                model: built.as_ref().map(|p| p.model().to_string()),
                configured: built.is_some(),
                selected: *kind == config.provider,
            }
        })
        .collect();

    if json_output {
        println!("{}", serde_json::to_string_pretty(&providers)?);
    } else {
        println!("Providers:\n");
        for p in &providers {
            let status = if p.configured { "✓" } else { "✗" };
            let selected = if p.selected { " [selected]" } else { "" };
            match &p.name {
                Some(name) => println!("  {} {} ({}){}", status, name, p.kind, selected),
                None => println!("  {} {}{}", status, p.kind, selected),
            }
            if let Some(model) = &p.model {
                println!("    Model: {}", model);
            }
            match p.env_var {
                Some(env) => println!("    API key: {}", env),
                None => println!("    API key: not required"),
            }
        }
    }

    Ok(())
}
