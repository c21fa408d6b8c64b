//! Command line and resolved configuration for both processes.
//!
//! Every flag can also be set through a `PUSH_RELAY_*` environment variable.
//! Validation happens once at startup; any [`ConfigError`] is fatal.

use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::{Args, Parser, Subcommand};
use reqwest::Url;
use thiserror::Error;

use crate::dispatch::{BasicAuth, JobMap, JobMapError};
use crate::http::HttpClientConfig;
use crate::ingest::OwnerAllowList;
use crate::poller::PollConfig;

/// Path of the liveness endpoint. Configured routes may not shadow it.
pub const HEALTH_PATH: &str = "/health";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("no repository owners configured; pass --owners or set PUSH_RELAY_OWNERS")]
    NoOwners,

    #[error("HOME is not set; pass --data-dir or set PUSH_RELAY_DATA_DIR")]
    NoDataDir,

    #[error("invalid {field} {value:?}: {reason}")]
    InvalidRoute {
        field: &'static str,
        value: String,
        reason: &'static str,
    },

    #[error("--status-path and --webhook-path are both {0:?}")]
    RouteConflict(String),

    #[error("invalid {field} {value:?}: {reason}")]
    InvalidUrl {
        field: &'static str,
        value: String,
        reason: String,
    },

    #[error("--password requires --user")]
    PasswordWithoutUser,

    #[error("{field} must be at least one second")]
    ZeroDuration { field: &'static str },

    #[error(transparent)]
    JobMap(#[from] JobMapError),
}

#[derive(Debug, Parser)]
#[command(name = "push-relay", version)]
#[command(about = "Records repository pushes and triggers the mapped build jobs")]
pub struct Cli {
    /// Log at debug level (RUST_LOG overrides)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Receive push webhooks and publish the aggregate status
    Serve(ServeArgs),
    /// Poll the published status and trigger builds for changed branches
    Poll(PollArgs),
}

#[derive(Debug, Args)]
pub struct ServeArgs {
    /// Address to listen on
    #[arg(long, env = "PUSH_RELAY_HOST", default_value = "0.0.0.0")]
    pub host: String,

    /// Port to listen on
    #[arg(long, env = "PUSH_RELAY_PORT", default_value_t = 8081)]
    pub port: u16,

    /// Directory holding commit records and the aggregate status file
    /// [default: $HOME/jenkins-webhook/data]
    #[arg(long, env = "PUSH_RELAY_DATA_DIR")]
    pub data_dir: Option<PathBuf>,

    /// Comma-separated repository owners allowed to push
    #[arg(long, env = "PUSH_RELAY_OWNERS")]
    pub owners: String,

    /// Route serving the aggregate status
    #[arg(long, env = "PUSH_RELAY_STATUS_PATH", default_value = "/status")]
    pub status_path: String,

    /// Route receiving push webhooks
    #[arg(long, env = "PUSH_RELAY_WEBHOOK_PATH", default_value = "/github")]
    pub webhook_path: String,
}

#[derive(Debug, Args)]
pub struct PollArgs {
    /// Job Map file: one `<owner/repo/branch> <job>` per line
    #[arg(long, env = "PUSH_RELAY_JOB_MAP")]
    pub job_map: PathBuf,

    /// Directory holding the poller state file
    /// [default: $HOME/jenkins-webhook/data]
    #[arg(long, env = "PUSH_RELAY_DATA_DIR")]
    pub data_dir: Option<PathBuf>,

    /// URL of the receiver's status endpoint
    #[arg(long, env = "PUSH_RELAY_STATUS_URL", default_value = "http://localhost:8081/status")]
    pub status_url: String,

    /// Jenkins base URL
    #[arg(long, env = "PUSH_RELAY_JENKINS_URL", default_value = "http://localhost:8080")]
    pub jenkins_url: String,

    /// Remote-trigger token passed as `?token=`
    #[arg(long, env = "PUSH_RELAY_JENKINS_TOKEN", hide_env_values = true)]
    pub jenkins_token: Option<String>,

    /// Jenkins user for basic auth
    #[arg(long, env = "PUSH_RELAY_JENKINS_USER")]
    pub user: Option<String>,

    /// Jenkins password or API token for basic auth
    #[arg(long, env = "PUSH_RELAY_JENKINS_PASSWORD", hide_env_values = true)]
    pub password: Option<String>,

    /// Do not verify TLS certificates
    #[arg(long, alias = "nosslcertverify")]
    pub insecure: bool,

    /// Seconds between poll cycles
    #[arg(long, env = "PUSH_RELAY_INTERVAL_SECS", default_value_t = 60)]
    pub interval_secs: u64,

    /// Seconds before an unfinished cycle is abandoned
    #[arg(long, env = "PUSH_RELAY_CYCLE_TIMEOUT_SECS", default_value_t = 300)]
    pub cycle_timeout_secs: u64,

    /// Seconds before a single HTTP request is abandoned
    #[arg(long, env = "PUSH_RELAY_REQUEST_TIMEOUT_SECS", default_value_t = 30)]
    pub request_timeout_secs: u64,

    /// Run a single cycle and exit
    #[arg(long)]
    pub once: bool,
}

/// Resolved receiver configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub data_dir: PathBuf,
    pub owners: OwnerAllowList,
    pub status_path: String,
    pub webhook_path: String,
}

impl ServerConfig {
    pub fn from_args(args: ServeArgs) -> Result<Self, ConfigError> {
        let owners = OwnerAllowList::parse(&args.owners);
        if owners.is_empty() {
            return Err(ConfigError::NoOwners);
        }

        let status_path = normalize_route("--status-path", &args.status_path)?;
        let webhook_path = normalize_route("--webhook-path", &args.webhook_path)?;
        if status_path == webhook_path {
            return Err(ConfigError::RouteConflict(status_path));
        }

        Ok(ServerConfig {
            host: args.host,
            port: args.port,
            data_dir: resolve_data_dir(args.data_dir, std::env::var_os("HOME").as_deref())?,
            owners,
            status_path,
            webhook_path,
        })
    }
}

/// Resolved poller configuration.
#[derive(Debug, Clone)]
pub struct PollerConfig {
    pub job_map_path: PathBuf,
    /// Job Map as loaded at startup.
    pub job_map: JobMap,
    pub data_dir: PathBuf,
    pub status_url: Url,
    pub jenkins_url: Url,
    pub jenkins_token: Option<String>,
    pub auth: Option<BasicAuth>,
    pub http: HttpClientConfig,
    pub poll: PollConfig,
    pub once: bool,
}

impl PollerConfig {
    /// Resolves poller flags. Loads the Job Map, so an unreadable or
    /// malformed map fails here.
    pub fn from_args(args: PollArgs) -> Result<Self, ConfigError> {
        let status_url = parse_url("--status-url", &args.status_url)?;
        let jenkins_url = parse_url("--jenkins-url", &args.jenkins_url)?;

        let auth = match (args.user, args.password) {
            (Some(user), password) => Some(BasicAuth { user, password }),
            (None, Some(_)) => return Err(ConfigError::PasswordWithoutUser),
            (None, None) => None,
        };

        let job_map = JobMap::load(&args.job_map)?;

        Ok(PollerConfig {
            job_map_path: args.job_map,
            job_map,
            data_dir: resolve_data_dir(args.data_dir, std::env::var_os("HOME").as_deref())?,
            status_url,
            jenkins_url,
            jenkins_token: args.jenkins_token.filter(|t| !t.is_empty()),
            auth,
            http: HttpClientConfig::new()
                .with_request_timeout(seconds("--request-timeout-secs", args.request_timeout_secs)?)
                .with_insecure(args.insecure),
            poll: PollConfig::new()
                .with_interval(seconds("--interval-secs", args.interval_secs)?)
                .with_cycle_timeout(seconds("--cycle-timeout-secs", args.cycle_timeout_secs)?),
            once: args.once,
        })
    }
}

fn resolve_data_dir(
    explicit: Option<PathBuf>,
    home: Option<&std::ffi::OsStr>,
) -> Result<PathBuf, ConfigError> {
    match (explicit, home) {
        (Some(dir), _) => Ok(dir),
        (None, Some(home)) if !home.is_empty() => {
            Ok(Path::new(home).join("jenkins-webhook").join("data"))
        }
        (None, _) => Err(ConfigError::NoDataDir),
    }
}

/// Normalizes a configured route: leading slash added, trailing slashes
/// dropped. `/status/` and `status` both become `/status`.
pub fn normalize_route(field: &'static str, raw: &str) -> Result<String, ConfigError> {
    let invalid = |reason| ConfigError::InvalidRoute {
        field,
        value: raw.to_string(),
        reason,
    };

    let trimmed = raw.trim().trim_matches('/');
    if trimmed.is_empty() {
        return Err(invalid("must name a path below /"));
    }
    if trimmed.contains(['{', '}', '*', ':', '?', '#']) || trimmed.contains(char::is_whitespace) {
        return Err(invalid("must be a literal path"));
    }

    let route = format!("/{}", trimmed);
    if route == HEALTH_PATH {
        return Err(invalid("reserved for the health check"));
    }
    Ok(route)
}

fn parse_url(field: &'static str, value: &str) -> Result<Url, ConfigError> {
    let url = Url::parse(value).map_err(|e| ConfigError::InvalidUrl {
        field,
        value: value.to_string(),
        reason: e.to_string(),
    })?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(ConfigError::InvalidUrl {
            field,
            value: value.to_string(),
            reason: "scheme must be http or https".to_string(),
        });
    }
    Ok(url)
}

fn seconds(field: &'static str, secs: u64) -> Result<Duration, ConfigError> {
    if secs == 0 {
        return Err(ConfigError::ZeroDuration { field });
    }
    Ok(Duration::from_secs(secs))
}
