//! tenantgate - command line client for property-management sessions.
//!
//! Logs in against the community backend, keeps the bearer token in the OS
//! keychain (or a cache file), and sends authenticated requests with it.

use std::io;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use tenantgate_core::auth::{decode, Claims};
use tenantgate_core::config::TokenBackend;
use tenantgate_core::{
    Config, GatewayError, GuardPolicy, LoginRequest, NavigationDecision, NavigationGuard,
    RouteTable, Session, SessionGateway, SessionState, TokenInspector,
};

/// Directory for rolling log files, when set
const ENV_LOG_DIR: &str = "TENANTGATE_LOG_DIR";

#[derive(Parser)]
#[command(name = "tenantgate", version, about = "Session client for the community property platform")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Log in and store the session token
    Login {
        /// Username, or phone number with --phone
        account: String,
        #[arg(long)]
        phone: bool,
    },
    /// End the session and remove the stored token
    Logout,
    /// Show session state and token expiry
    Status,
    /// Decode a token's claims without storing or verifying it
    Inspect { token: String },
    /// Send authenticated GET requests and print the JSON responses
    Get {
        #[arg(required = true)]
        paths: Vec<String>,
    },
    /// Show the configuration, updating and saving any given settings
    Config {
        #[arg(long)]
        api_url: Option<String>,
        #[arg(long)]
        timeout_ms: Option<u64>,
        #[arg(long)]
        expiry_threshold_minutes: Option<i64>,
        #[arg(long, value_enum)]
        backend: Option<Backend>,
    },
    /// Check whether a route is reachable with the current session
    Route {
        path: String,
        /// Also redirect when the stored token has expired
        #[arg(long)]
        strict: bool,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum Backend {
    Keyring,
    File,
}

impl From<Backend> for TokenBackend {
    fn from(backend: Backend) -> Self {
        match backend {
            Backend::Keyring => TokenBackend::Keyring,
            Backend::File => TokenBackend::File,
        }
    }
}

/// Initialize the tracing subscriber for logging
fn init_tracing() -> Option<tracing_appender::non_blocking::WorkerGuard> {
    // Use RUST_LOG env var to control log level (e.g., RUST_LOG=debug)
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    let (file_layer, guard) = match std::env::var(ENV_LOG_DIR) {
        Ok(dir) => {
            let appender = tracing_appender::rolling::daily(dir, "tenantgate.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            (Some(fmt::layer().with_ansi(false).with_writer(writer)), Some(guard))
        }
        Err(_) => (None, None),
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr))
        .with(file_layer)
        .with(filter)
        .init();

    guard
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();
    let _log_guard = init_tracing();

    let cli = Cli::parse();

    match cli.command {
        Command::Config {
            api_url,
            timeout_ms,
            expiry_threshold_minutes,
            backend,
        } => configure(api_url, timeout_ms, expiry_threshold_minutes, backend),
        Command::Login { account, phone } => {
            let (config, session) = open_session()?;
            login(&config, session, &account, phone).await
        }
        Command::Logout => {
            let (config, session) = open_session()?;
            SessionGateway::new(&config, session)?.logout().await?;
            println!("Logged out");
            Ok(ExitCode::SUCCESS)
        }
        Command::Status => {
            let (config, session) = open_session()?;
            status(&config, &session)
        }
        Command::Inspect { token } => inspect(&load_config()?, &token),
        Command::Get { paths } => {
            let (config, session) = open_session()?;
            fetch(&config, session, &paths).await
        }
        Command::Route { path, strict } => {
            let (_, session) = open_session()?;
            route(session, &path, strict)
        }
    }
}

/// Saved configuration with environment overrides applied
fn load_config() -> Result<Config> {
    let mut config = Config::load()?;
    config.apply_env();
    Ok(config)
}

fn open_session() -> Result<(Config, Session)> {
    let config = load_config()?;
    let session = Session::new(config.open_store()?);
    Ok((config, session))
}

fn configure(
    api_url: Option<String>,
    timeout_ms: Option<u64>,
    expiry_threshold_minutes: Option<i64>,
    backend: Option<Backend>,
) -> Result<ExitCode> {
    // Saved settings only; environment overrides are not persisted
    let mut config = Config::load()?;
    let changed = api_url.is_some()
        || timeout_ms.is_some()
        || expiry_threshold_minutes.is_some()
        || backend.is_some();

    if let Some(url) = api_url {
        config.api_base_url = url;
    }
    if let Some(ms) = timeout_ms.filter(|ms| *ms > 0) {
        config.request_timeout_ms = ms;
    }
    if let Some(minutes) = expiry_threshold_minutes {
        config.expiry_threshold_minutes = minutes;
    }
    if let Some(backend) = backend {
        config.token_backend = backend.into();
    }

    if changed {
        let path = config.save()?;
        info!(path = %path.display(), "Configuration saved");
        println!("Saved {}", path.display());
    }
    println!("{}", serde_json::to_string_pretty(&config)?);
    Ok(ExitCode::SUCCESS)
}

async fn login(config: &Config, session: Session, account: &str, phone: bool) -> Result<ExitCode> {
    let password = rpassword::prompt_password("Password: ").context("Failed to read password")?;
    let request = if phone {
        LoginRequest::with_phone(account, &password)
    } else {
        LoginRequest::with_username(account, &password)
    };

    let gateway = SessionGateway::new(config, session)?;
    match gateway.login(&request).await {
        Ok(response) => {
            info!(user_id = ?response.user_id, "Logged in");
            println!(
                "Logged in as {}",
                response.username.as_deref().unwrap_or(account)
            );
            Ok(ExitCode::SUCCESS)
        }
        Err(GatewayError::Unauthorized) => {
            eprintln!("Login failed: wrong account or password");
            Ok(ExitCode::FAILURE)
        }
        Err(e) => Err(e.into()),
    }
}

fn status(config: &Config, session: &Session) -> Result<ExitCode> {
    match session.state() {
        SessionState::Anonymous => {
            println!("Not logged in");
            return Ok(ExitCode::FAILURE);
        }
        SessionState::Authenticated => println!("Logged in"),
    }

    let Some(token) = session.token()? else {
        return Ok(ExitCode::FAILURE);
    };
    let inspector = TokenInspector::new();
    match inspector.expires_in(&token) {
        Some(remaining) if remaining <= chrono::Duration::zero() => {
            println!("Token expired {} minutes ago", -remaining.num_minutes());
        }
        Some(remaining) => {
            println!("Token expires in {} minutes", remaining.num_minutes());
            if inspector.is_expiring_within(&token, config.expiry_threshold()) {
                println!("Token is expiring soon, log in again to renew it");
            }
        }
        None => println!("Token carries no expiry"),
    }
    if let Ok(claims) = decode(&token) {
        print_claims(&claims)?;
    }
    Ok(ExitCode::SUCCESS)
}

fn inspect(config: &Config, token: &str) -> Result<ExitCode> {
    let claims = match decode(token) {
        Ok(claims) => claims,
        Err(e) => {
            eprintln!("Could not decode token: {}", e);
            return Ok(ExitCode::FAILURE);
        }
    };
    print_claims(&claims)?;

    let inspector = TokenInspector::new();
    if let Some(exp) = claims.expires_at() {
        if let Some(at) = chrono::DateTime::from_timestamp(exp, 0) {
            println!("Expires: {}", at.to_rfc3339());
        }
        if inspector.is_expired(token) {
            println!("Status: EXPIRED");
        } else if inspector.is_expiring_within(token, config.expiry_threshold()) {
            println!("Status: EXPIRING SOON");
        } else {
            println!("Status: VALID (unverified)");
        }
    } else {
        println!("Status: NO EXPIRY");
    }
    Ok(ExitCode::SUCCESS)
}

fn print_claims(claims: &Claims) -> Result<()> {
    println!("Claims:");
    println!("{}", serde_json::to_string_pretty(claims.as_map())?);
    Ok(())
}

async fn fetch(config: &Config, session: Session, paths: &[String]) -> Result<ExitCode> {
    let gateway = SessionGateway::new(config, session)?;
    let requests = paths.iter().map(|path| {
        let gateway = gateway.clone();
        async move { (path, gateway.get::<serde_json::Value>(path).await) }
    });
    let results = futures::future::join_all(requests).await;

    let mut code = ExitCode::SUCCESS;
    let mut rejected = false;
    for (path, result) in results {
        match result {
            Ok(body) => println!("{}\n{}", path, serde_json::to_string_pretty(&body)?),
            Err(e) if e.is_auth_rejection() => {
                rejected = true;
                code = ExitCode::FAILURE;
            }
            Err(e) => {
                eprintln!("{}: {}", path, e);
                code = ExitCode::FAILURE;
            }
        }
    }
    if rejected {
        eprintln!("Session expired. Run `tenantgate login <account>` to sign in again.");
    }
    Ok(code)
}

fn route(session: Session, path: &str, strict: bool) -> Result<ExitCode> {
    let policy = if strict {
        GuardPolicy::RejectExpired
    } else {
        GuardPolicy::PresenceOnly
    };
    let guard = NavigationGuard::new(session, RouteTable::community_default()).with_policy(policy);

    match guard.check(path) {
        NavigationDecision::Allow => {
            println!("allow {}", path);
            Ok(ExitCode::SUCCESS)
        }
        NavigationDecision::RedirectToLogin => {
            println!("redirect {} -> {}", path, guard.login_path());
            Ok(ExitCode::FAILURE)
        }
    }
}
