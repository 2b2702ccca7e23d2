//! letssmime - Main entry point
//!
//! Obtains a free S/MIME email certificate. Re-running with the same email
//! address resumes an interrupted run at its first missing artifact.

mod prompt;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use tracing::info;

use letssmime_issuance::{
    run_status, Applicant, ArtifactStore, CollectionPasswordSource, ComodoClient,
    FixedCollectionPassword, FsArtifactStore, IssuanceConfig, IssuanceRequest, Issuer,
    OpensslBundler, RunId, RunStatus,
};

use crate::prompt::{value_or_prompt, PromptCollectionPassword};

/// letssmime - free S/MIME certificates from an SPKAC-based authority
#[derive(Parser, Debug)]
#[command(name = "letssmime")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Configuration file path (TOML)
    #[arg(short = 'c', long = "config", env = "LETSSMIME_CONFIG", global = true)]
    config: Option<PathBuf>,

    /// Directory holding one artifact directory per email address
    #[arg(long = "storage-root", env = "LETSSMIME_STORAGE_ROOT", global = true)]
    storage_root: Option<PathBuf>,

    /// Enable verbose logging (debug level)
    #[arg(long = "verbose", global = true)]
    verbose: bool,

    /// Log output format
    #[arg(long = "log-format", value_enum, default_value_t = LogFormat::Text, global = true)]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Obtain a certificate, resuming any earlier run (default)
    Issue(IssueArgs),
    /// Show which artifacts of a run exist
    Status {
        /// Email address the run belongs to
        #[arg(long = "email-address")]
        email_address: Option<String>,

        /// Print machine-readable JSON
        #[arg(long = "json")]
        json: bool,
    },
}

#[derive(Args, Debug, Default)]
struct IssueArgs {
    #[arg(long = "first-name")]
    first_name: Option<String>,

    #[arg(long = "last-name")]
    last_name: Option<String>,

    #[arg(long = "email-address")]
    email_address: Option<String>,

    /// Authority country code; defaults to the configured one (1224, United States)
    #[arg(long = "country")]
    country: Option<String>,

    /// Revocation password; a random one is generated if omitted
    #[arg(long = "revocation-password", env = "LETSSMIME_REVOCATION_PASSWORD")]
    revocation_password: Option<String>,

    /// Collection password from the authority's email; prompted for if omitted
    #[arg(long = "collection-password", env = "LETSSMIME_COLLECTION_PASSWORD")]
    collection_password: Option<String>,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
enum LogFormat {
    Text,
    Json,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_tracing(cli.verbose, cli.log_format);

    let mut config = load_config(cli.config.as_deref())?;
    if let Some(storage_root) = cli.storage_root {
        config.storage_root = storage_root;
    }

    match cli.command {
        Some(Commands::Issue(args)) => issue(config, args).await,
        Some(Commands::Status {
            email_address,
            json,
        }) => status(config, email_address, json),
        None => issue(config, IssueArgs::default()).await,
    }
}

/// Initialize logging on stderr, keeping stdout for prompts and results
fn init_tracing(verbose: bool, format: LogFormat) {
    let log_level = if verbose { "debug" } else { "info" };
    let builder = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level)),
        )
        .with_target(false)
        .with_writer(std::io::stderr);

    match format {
        LogFormat::Text => builder.init(),
        LogFormat::Json => builder.json().init(),
    }
}

fn load_config(path: Option<&std::path::Path>) -> Result<IssuanceConfig> {
    match path {
        Some(path) => {
            info!("Loading configuration from: {}", path.display());
            IssuanceConfig::from_file(path)
                .with_context(|| format!("Failed to load configuration file {}", path.display()))
        }
        None => Ok(IssuanceConfig::default()),
    }
}

/// Run (or resume) the issuance pipeline
async fn issue(config: IssuanceConfig, args: IssueArgs) -> Result<()> {
    let applicant = Applicant {
        first_name: value_or_prompt(args.first_name, "First name")?,
        last_name: value_or_prompt(args.last_name, "Last name")?,
        email: value_or_prompt(args.email_address, "Email address")?,
        country: args.country.unwrap_or_else(|| config.country.clone()),
    };

    let request = IssuanceRequest::new(applicant, args.revocation_password)
        .context("Invalid email address")?;

    let store = FsArtifactStore::new(&config.storage_root).with_context(|| {
        format!(
            "Failed to open artifact store at {}",
            config.storage_root.display()
        )
    })?;

    let passwords: Arc<dyn CollectionPasswordSource> = match args.collection_password {
        Some(password) => Arc::new(FixedCollectionPassword::new(password)),
        None => Arc::new(PromptCollectionPassword),
    };

    let issuer = Issuer::new(
        store,
        Arc::new(ComodoClient::new(
            config.authority.clone(),
            config.http_timeout(),
        )),
        passwords,
        Arc::new(OpensslBundler::new(&config.openssl)),
    )
    .with_key_bits(config.key_bits);

    let report = issuer.run(&request).await?;

    println!("Done! Your files are in {}", report.location.display());
    Ok(())
}

/// Report the persisted progress of a run
fn status(config: IssuanceConfig, email_address: Option<String>, json: bool) -> Result<()> {
    let run = RunId::new(value_or_prompt(email_address, "Email address")?)
        .context("Invalid email address")?;
    let store = FsArtifactStore::new(&config.storage_root)?;

    let status = run_status(&store, &run)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&status)?);
    } else {
        print!("{}", render_status(&store, &status));
    }
    Ok(())
}

fn render_status(store: &impl ArtifactStore, status: &RunStatus) -> String {
    let mut out = format!("{} ({})\n", status.run, status.location.display());

    for state in &status.artifacts {
        let mark = if state.present { 'x' } else { ' ' };
        out.push_str(&format!(
            "  [{mark}] {:<20} {}\n",
            state.artifact.name(),
            store.path(&status.run, state.artifact).display()
        ));
    }

    match status.next_step() {
        Some(step) => out.push_str(&format!("next: {}\n", step.description)),
        None => out.push_str("complete\n"),
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;
    use letssmime_issuance::ArtifactKey;
    use tempfile::TempDir;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_issue_flags() {
        let cli = Cli::try_parse_from([
            "letssmime",
            "--storage-root",
            "/tmp/certs",
            "issue",
            "--first-name",
            "Alice",
            "--email-address",
            "alice@example.com",
            "--country",
            "1250",
        ])
        .unwrap();

        assert_eq!(cli.storage_root, Some(PathBuf::from("/tmp/certs")));
        match cli.command {
            Some(Commands::Issue(args)) => {
                assert_eq!(args.first_name.as_deref(), Some("Alice"));
                assert_eq!(args.email_address.as_deref(), Some("alice@example.com"));
                assert_eq!(args.country.as_deref(), Some("1250"));
                assert!(args.last_name.is_none());
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_no_subcommand_means_issue() {
        let cli = Cli::try_parse_from(["letssmime", "--verbose"]).unwrap();
        assert!(cli.command.is_none());
        assert!(cli.verbose);
        assert_eq!(cli.log_format, LogFormat::Text);
    }

    #[test]
    fn test_render_status() {
        let temp_dir = TempDir::new().unwrap();
        let store = FsArtifactStore::new(temp_dir.path()).unwrap();
        let run = RunId::new("alice@example.com").unwrap();
        store.write(&run, ArtifactKey::PrivateKey, b"k").unwrap();

        let rendered = render_status(&store, &run_status(&store, &run).unwrap());

        assert!(rendered.starts_with("alice@example.com ("));
        assert!(rendered.contains("[x] private-key"));
        assert!(rendered.contains("[ ] revocation-password"));
        assert!(rendered.ends_with("next: Sending application to the certificate authority\n"));
    }
}
