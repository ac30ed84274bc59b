//! sget - sign scripts keylessly, and only run the ones that verify

use clap::{Args, Parser, Subcommand};
use sget::{DEFAULT_STORE_ROOT, EXIT_FAILURE};
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

mod commands;

#[derive(Parser)]
#[command(name = "sget", version)]
#[command(about = "Sign, verify and safely run distributed shell scripts")]
struct Cli {
    /// Log debug output to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Sign a script with a short-lived certificate
    Sign(SignArgs),
    /// Verify a script without running it
    Verify(VerifyArgs),
    /// Verify a released script and run it
    Install(InstallArgs),
}

#[derive(Args)]
struct SignArgs {
    /// Script to sign
    artifact: PathBuf,

    /// Certificate authority URL
    #[arg(long, env = "SGET_FULCIO_URL")]
    fulcio_url: Option<String>,

    /// Transparency log URL
    #[arg(long, env = "SGET_REKOR_URL")]
    rekor_url: Option<String>,

    /// OIDC issuer URL
    #[arg(long, env = "SGET_OIDC_ISSUER")]
    oidc_issuer: Option<String>,

    /// OIDC client ID
    #[arg(long, env = "SGET_OIDC_CLIENT_ID")]
    oidc_client_id: Option<String>,

    /// OIDC client secret
    #[arg(long, env = "SGET_OIDC_CLIENT_SECRET", hide_env_values = true)]
    oidc_client_secret: Option<String>,

    /// Identity token to use instead of logging in
    #[arg(long, env = "SGET_IDENTITY_TOKEN", hide_env_values = true)]
    identity_token: Option<String>,

    /// Use the staging instances
    #[arg(long)]
    staging: bool,

    /// Directory the signature and certificate are written under
    #[arg(long, default_value = DEFAULT_STORE_ROOT)]
    store_root: PathBuf,

    #[command(flatten)]
    publish: PublishArgs,
}

/// Where the signed materials should be proposed; publishing is skipped
/// unless both `--owner` and `--repo` are given
#[derive(Args)]
struct PublishArgs {
    /// Owner of the repository receiving the commit
    #[arg(long, requires = "repo")]
    owner: Option<String>,

    /// Repository receiving the commit
    #[arg(long, requires = "owner")]
    repo: Option<String>,

    /// Branch the commit branch starts from
    #[arg(long, default_value = "main")]
    base_branch: String,

    /// Branch for the new commit
    #[arg(long)]
    commit_branch: Option<String>,

    /// Commit message
    #[arg(long)]
    commit_message: Option<String>,

    /// Owner of the repository the pull request targets
    #[arg(long)]
    merge_repo_owner: Option<String>,

    /// Repository the pull request targets
    #[arg(long)]
    merge_repo: Option<String>,

    /// Branch the pull request merges into
    #[arg(long, default_value = "main")]
    merge_branch: String,

    /// Pull request title
    #[arg(long)]
    pr_title: Option<String>,

    /// Pull request description
    #[arg(long, default_value = "")]
    pr_text: String,

    /// Commit author name
    #[arg(long, default_value = "sigstore")]
    author_name: String,

    /// Commit author email
    #[arg(long, default_value = "sign@sigstore.dev")]
    author_email: String,
}

#[derive(Args)]
struct ReleaseArgs {
    /// Owner of the repository publishing the script
    #[arg(long)]
    owner: Option<String>,

    /// Repository publishing the script
    #[arg(long)]
    repo: Option<String>,

    /// Release tag
    #[arg(long, default_value = sget::release::LATEST)]
    tag: String,

    /// Release hosting API URL
    #[arg(long, env = "SGET_API_URL", default_value = "https://api.github.com")]
    api_url: String,

    /// Token for the release hosting API
    #[arg(long, env = "GITHUB_TOKEN", hide_env_values = true)]
    github_token: Option<String>,
}

#[derive(Args)]
struct VerifyArgs {
    #[command(flatten)]
    release: ReleaseArgs,

    /// Local script to verify instead of a release
    #[arg(long, requires_all = ["certificate", "signature"], conflicts_with_all = ["owner", "repo"])]
    script: Option<PathBuf>,

    /// PEM certificate for --script
    #[arg(long, requires = "script")]
    certificate: Option<PathBuf>,

    /// Signature container for --script
    #[arg(long, requires = "script")]
    signature: Option<PathBuf>,
}

#[derive(Args)]
struct InstallArgs {
    #[command(flatten)]
    release: ReleaseArgs,

    /// Interpreter the script is run with
    #[arg(long, default_value = "bash")]
    interpreter: PathBuf,
}

fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() {
    // Usage errors exit 1, keeping 2 for rejected signatures
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            let _ = e.print();
            std::process::exit(if e.use_stderr() { EXIT_FAILURE } else { 0 });
        }
    };
    init_tracing(cli.verbose);

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("interrupted, cancelling");
            on_interrupt.cancel();
        }
    });

    let code = match cli.command {
        Commands::Sign(args) => commands::sign(args, &cancel).await,
        Commands::Verify(args) => commands::verify(args, &cancel).await,
        Commands::Install(args) => commands::install(args, &cancel).await,
    };

    std::process::exit(code);
}
