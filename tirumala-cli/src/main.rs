//! Tirumala CLI - command-line front-end for the session client
//!
//! Signs in against the backend, keeps the session on disk and reports who is
//! logged in.

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tirumala_core::{
    init_logging, log_operation_error, log_operation_start, log_operation_success, Account,
    IdentityService, TirumalaConfig, UserRecord,
};
use tirumala_session::{HttpIdentityService, Session, SessionManager};
use tracing::info;

#[derive(Parser)]
#[command(name = "tirumala")]
#[command(about = "Session client for the Tirumala agricultural consultation service")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file path
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Override the directory holding stored credentials
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Sign in with email and password and store the session
    Login {
        /// Account email
        #[arg(short, long)]
        email: String,

        /// Account password
        #[arg(short, long)]
        password: String,
    },

    /// End the stored session
    Logout,

    /// Show the logged-in user after revalidating the stored session
    Whoami {
        /// Print the raw user document as JSON
        #[arg(long)]
        json: bool,
    },

    /// Re-fetch the user record for the stored session
    Refresh,

    /// Print AUTHENTICATED or UNAUTHENTICATED
    Status,

    /// Manage configuration
    Config {
        /// Show current configuration
        #[arg(long)]
        show: bool,

        /// Initialize default configuration
        #[arg(long)]
        init: bool,

        /// Validate current configuration
        #[arg(long)]
        validate: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // `config` loads (and may create) the file itself
    if let Commands::Config {
        show,
        init,
        validate,
    } = cli.command
    {
        init_cli_logging(&TirumalaConfig::default(), cli.verbose)?;
        return handle_config(show, init, validate, cli.config.as_deref());
    }

    let mut config = TirumalaConfig::load(cli.config.as_deref())
        .context("Failed to load configuration")?;
    if let Some(data_dir) = &cli.data_dir {
        config.storage.data_dir = data_dir.to_string_lossy().to_string();
    }
    init_cli_logging(&config, cli.verbose)?;

    info!("Starting Tirumala CLI v{}", env!("CARGO_PKG_VERSION"));

    match cli.command {
        Commands::Login { email, password } => handle_login(&email, &password, &config).await,
        Commands::Logout => handle_logout(&config).await,
        Commands::Whoami { json } => handle_whoami(json, &config).await,
        Commands::Refresh => handle_refresh(&config).await,
        Commands::Status => handle_status(&config).await,
        Commands::Config { .. } => Ok(()),
    }
}

fn init_cli_logging(config: &TirumalaConfig, verbose: bool) -> anyhow::Result<()> {
    let logging_config = if verbose {
        config.logging.clone().verbose()
    } else {
        config.logging.clone()
    };
    init_logging(&logging_config)
        .map_err(|e| anyhow::anyhow!("Failed to initialize logging: {}", e))
}

async fn handle_login(
    email: &str,
    password: &str,
    config: &TirumalaConfig,
) -> anyhow::Result<()> {
    log_operation_start!("login", email = %email);

    let identity = HttpIdentityService::new(config.api.clone())?;
    let signed_in = identity.sign_in(email, password).await.map_err(|e| {
        log_operation_error!("login", e, email = %email);
        e
    })?;

    let manager = SessionManager::from_config(config)?;
    manager.restore_cached().await;
    manager.login(signed_in.token, signed_in.user).await?;

    let session = manager.session();
    if let Some(user) = session.user() {
        println!("Logged in as {}", describe_user(user));
    }

    log_operation_success!("login", email = %email);
    Ok(())
}

async fn handle_logout(config: &TirumalaConfig) -> anyhow::Result<()> {
    let manager = SessionManager::from_config(config)?;
    manager.restore_cached().await;
    let was_authenticated = manager.session().is_authenticated();

    manager.logout().await?;
    if was_authenticated {
        println!("Logged out");
    } else {
        println!("No active session");
    }
    Ok(())
}

async fn handle_whoami(json: bool, config: &TirumalaConfig) -> anyhow::Result<()> {
    let manager = SessionManager::from_config(config)?;
    manager.restore().await;

    let session = manager.session();
    let Some(user) = session.user() else {
        bail!("Not logged in. Run 'tirumala login' first.");
    };

    if json {
        println!("{}", serde_json::to_string_pretty(user.document())?);
    } else {
        print_user(user);
    }
    Ok(())
}

async fn handle_refresh(config: &TirumalaConfig) -> anyhow::Result<()> {
    let manager = SessionManager::from_config(config)?;
    manager.restore_cached().await;
    if !manager.session().is_authenticated() {
        bail!("Not logged in. Run 'tirumala login' first.");
    }

    log_operation_start!("refresh");
    manager.refresh().await.map_err(|e| {
        log_operation_error!("refresh", e);
        anyhow::Error::new(e).context("Could not reach the identity service; session kept")
    })?;

    match manager.session().user() {
        Some(user) => {
            log_operation_success!("refresh");
            println!("Session refreshed for {}", describe_user(user));
        }
        None => println!("Session was rejected by the server; logged out"),
    }
    Ok(())
}

async fn handle_status(config: &TirumalaConfig) -> anyhow::Result<()> {
    let manager = SessionManager::from_config(config)?;
    manager.restore().await;
    print_status(&manager.session());
    Ok(())
}

fn handle_config(
    show: bool,
    init: bool,
    validate: bool,
    explicit_path: Option<&Path>,
) -> anyhow::Result<()> {
    if init {
        let config_path = match explicit_path {
            Some(path) => path.to_path_buf(),
            None => default_config_path()?,
        };
        if config_path.exists() {
            bail!("Configuration already exists at {:?}", config_path);
        }
        TirumalaConfig::default().save_to_file(&config_path)?;
        println!("Configuration initialized at: {:?}", config_path);
    }

    if show || validate {
        let config = TirumalaConfig::load_unchecked(explicit_path)
            .context("Failed to read configuration")?;

        if show {
            println!("{}", toml::to_string_pretty(&config)?);
        }

        if validate {
            config
                .validate()
                .context("Configuration validation failed")?;
            println!("Configuration is valid");
        }
    }

    if !(init || show || validate) {
        println!("Nothing to do. Use --init, --show or --validate.");
    }
    Ok(())
}

/// Get the default configuration file path
fn default_config_path() -> anyhow::Result<PathBuf> {
    let config_dir = dirs::config_dir()
        .or_else(|| dirs::home_dir().map(|d| d.join(".config")))
        .context("Could not determine a configuration directory")?;
    Ok(config_dir.join("tirumala").join("config.toml"))
}

fn print_status(session: &Session) {
    println!("{}", session.state());
}

fn describe_user(user: &UserRecord) -> String {
    let name = user.display_name().unwrap_or("unknown user");
    match user.role() {
        Some(role) => format!("{} ({})", name, role),
        None => name.to_string(),
    }
}

fn print_user(user: &UserRecord) {
    println!("User:   {}", describe_user(user));
    if let Some(id) = user.id() {
        println!("Id:     {}", id);
    }
    if let Some(email) = user.email() {
        println!("Email:  {}", email);
    }
    match user.account() {
        Account::Farmer(Some(profile)) => {
            if let Some(village) = &profile.village {
                println!("Village: {}", village);
            }
            if let Some(crops) = &profile.crops {
                println!("Crops:  {}", crops);
            }
        }
        Account::Expert(Some(profile)) => {
            if let Some(title) = &profile.title {
                println!("Title:  {}", title);
            }
        }
        _ => {}
    }
    if let Some(wallet) = user.wallet() {
        println!("Wallet: ₹{:.2}", wallet.balance);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;
    use serde_json::json;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_login() {
        let cli = Cli::try_parse_from([
            "tirumala",
            "--verbose",
            "login",
            "--email",
            "farmer@demo.com",
            "--password",
            "Farmer@123",
        ])
        .unwrap();
        assert!(cli.verbose);
        match cli.command {
            Commands::Login { email, password } => {
                assert_eq!(email, "farmer@demo.com");
                assert_eq!(password, "Farmer@123");
            }
            _ => panic!("Expected login command"),
        }
    }

    #[test]
    fn test_config_init_creates_file_at_explicit_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fresh").join("config.toml");

        let cli = Cli::try_parse_from([
            "tirumala",
            "--config",
            path.to_str().unwrap(),
            "config",
            "--init",
        ])
        .unwrap();
        let Commands::Config {
            show,
            init,
            validate,
        } = cli.command
        else {
            panic!("Expected config command");
        };

        handle_config(show, init, validate, cli.config.as_deref()).unwrap();

        let written = TirumalaConfig::from_file(&path).unwrap();
        assert_eq!(written.storage.token_key, "auth_token");
        assert!(handle_config(false, true, false, Some(&path)).is_err());
    }

    #[test]
    fn test_config_validate_reports_invalid_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            "[storage]\ntoken_key = \"same\"\nuser_key = \"same\"\n",
        )
        .unwrap();

        let err = handle_config(false, false, true, Some(&path)).unwrap_err();
        let message = format!("{:#}", err);
        assert!(message.starts_with("Configuration validation failed"));
        assert!(message.contains("must be distinct"));

        // showing an invalid file still works
        handle_config(true, false, false, Some(&path)).unwrap();
    }

    #[test]
    fn test_describe_user() {
        let expert = UserRecord::from_value(json!({
            "id": 1,
            "role": "EXPERT",
            "expertProfile": { "name": "Dr. Lakshmi" }
        }))
        .unwrap();
        assert_eq!(describe_user(&expert), "Dr. Lakshmi (EXPERT)");

        let bare = UserRecord::from_value(json!({ "id": 2, "email": "a@x.com" })).unwrap();
        assert_eq!(describe_user(&bare), "a@x.com");
    }
}
