//! sync-post - Publish one post to every configured social account at once

use std::io::{IsTerminal, Read};
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use libsocialsync::{
    AccountStore, Config, Content, Publication, PublishEngine, PublishReport, SocialSyncError,
};

#[derive(Parser, Debug)]
#[command(name = "sync-post")]
#[command(version, about = "Publish a post to Mastodon, Pixelfed, Bluesky and Threads at once")]
#[command(long_about = r#"Publish a post to several social accounts concurrently.

EXAMPLES:
    # Post to every stored account
    sync-post "Hello everyone"

    # Read the text from stdin
    echo "Hello from a pipe" | sync-post

    # Attach an image with alt text
    sync-post "Sunset" --image sunset.jpg --alt "Orange sky over the sea"

    # Only some accounts
    sync-post "Hi" --account mastodon:alice --account bluesky:alice.bsky.social
    sync-post "Hi" --account mastodon:alice,threads:alice

    # JSON results for scripting
    sync-post "Hi" --format json | jq 'to_entries[] | select(.value.ok == false)'

    # Show stored accounts
    sync-post --list-accounts

OUTPUT:
    Progress lines are written to stderr, final results to stdout.

EXIT CODES:
    0 - Published to every account
    1 - At least one account failed, or a runtime error
    2 - Configuration error
    3 - Invalid input (no content, no accounts, unknown account)
"#)]
struct Cli {
    /// Text to post (reads from stdin if not provided)
    content: Option<String>,

    /// Image file to attach
    #[arg(short, long, value_name = "PATH")]
    image: Option<PathBuf>,

    /// Alt text for the image
    #[arg(long, value_name = "TEXT", requires = "image")]
    alt: Option<String>,

    /// Target account(s) as platform:username (repeatable or comma-separated)
    #[arg(short, long = "account", value_name = "KEY", value_delimiter = ',')]
    accounts: Vec<String>,

    /// Configuration file (default: ~/.config/socialsync/config.toml)
    #[arg(short, long, value_name = "PATH", env = "SOCIALSYNC_CONFIG")]
    config: Option<PathBuf>,

    /// Accounts file, overriding the configured path
    #[arg(long, value_name = "PATH")]
    accounts_file: Option<PathBuf>,

    /// Output format
    #[arg(short, long, default_value = "text", value_name = "FORMAT")]
    #[arg(value_parser = ["text", "json"])]
    format: String,

    /// List stored accounts and exit
    #[arg(long)]
    list_accounts: bool,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    libsocialsync::logging::from_env(cli.verbose).init();

    match run(cli).await {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            eprintln!("Error: {:#}", e);
            std::process::exit(exit_code(&e));
        }
    }
}

/// Exit code for an error, following the library's error kinds
fn exit_code(error: &anyhow::Error) -> i32 {
    error
        .chain()
        .find_map(|cause| cause.downcast_ref::<SocialSyncError>())
        .map(SocialSyncError::exit_code)
        .unwrap_or(1)
}

async fn run(cli: Cli) -> Result<i32> {
    let config = match &cli.config {
        Some(path) if path.exists() => Config::load_from_path(path)?,
        Some(path) => {
            tracing::debug!("No config file at {}, using defaults", path.display());
            Config::default()
        }
        None => Config::load()?,
    };

    let accounts_path = match &cli.accounts_file {
        Some(path) => path.clone(),
        None => config.accounts.resolved_path()?,
    };
    let store = AccountStore::load(&accounts_path)?;

    if cli.list_accounts {
        print_accounts(&store, &cli.format)?;
        return Ok(0);
    }

    let text = match cli.content {
        Some(text) => text,
        None => read_stdin()?,
    };
    let mut content = Content::text(text);
    if let Some(image) = cli.image {
        content = content.with_image(image, cli.alt.unwrap_or_default());
    }

    if content.is_empty() {
        return Err(SocialSyncError::InvalidInput(
            "Nothing to post: provide text or --image".to_string(),
        )
        .into());
    }

    let accounts = store.select(&cli.accounts)?;
    if accounts.is_empty() {
        return Err(SocialSyncError::InvalidInput(format!(
            "No accounts configured in {}",
            store.path().display()
        ))
        .into());
    }

    let engine = PublishEngine::from_config(&config)?;
    let publication = engine.publish(accounts, content).await?;
    let report = follow(publication).await?;

    match cli.format.as_str() {
        "json" => {
            let json = serde_json::to_string_pretty(&report)
                .context("Failed to serialize results")?;
            println!("{}", json);
        }
        _ => print_report(&report),
    }
    eprintln!("{}", report.summary());

    Ok(if report.all_succeeded() { 0 } else { 1 })
}

/// Print progress to stderr until every account finished, then return the
/// report.
async fn follow(publication: Publication) -> Result<PublishReport> {
    let Publication {
        mut progress,
        report,
    } = publication;

    while let Some(event) = progress.recv().await {
        eprintln!("{:<40} {}", event.account_key, event.status);
    }

    Ok(report.await?)
}

fn print_report(report: &PublishReport) {
    for (key, result) in report.iter() {
        match (&result.url, &result.error) {
            (Some(url), _) if result.ok => println!("ok\t{}\t{}", key, url),
            (_, error) => println!(
                "failed\t{}\t{}",
                key,
                error.as_deref().unwrap_or("unknown error")
            ),
        }
    }
}

fn print_accounts(store: &AccountStore, format: &str) -> Result<()> {
    if format == "json" {
        let json = serde_json::to_string_pretty(&store.keys())
            .context("Failed to serialize accounts")?;
        println!("{}", json);
        return Ok(());
    }

    if store.is_empty() {
        eprintln!("No accounts configured in {}", store.path().display());
    }
    for key in store.keys() {
        println!("{}", key);
    }
    Ok(())
}

fn read_stdin() -> Result<String> {
    let stdin = std::io::stdin();
    if stdin.is_terminal() {
        return Ok(String::new());
    }

    let mut buffer = String::new();
    stdin
        .lock()
        .read_to_string(&mut buffer)
        .context("Failed to read content from stdin")?;
    Ok(buffer.trim_end_matches(['\n', '\r']).to_string())
}
