use std::path::PathBuf;
use std::time::Duration;

use anyhow::{anyhow, Result};
use clap::{Parser, Subcommand};

use crate::api::{DEFAULT_DASHBOARD_DAYS, DEFAULT_DASHBOARD_TOP_LIMIT};
use crate::query_cache::FetchPolicy;
use crate::types::EntityType;

pub const DEFAULT_API_BASE_URL: &str = "http://localhost:8000/api/v1";

/// platdex - platform directory client
///
/// Browse, submit and review platforms against the directory API.
/// Configuration priority: CLI args > Environment variables (.env included) > Defaults
#[derive(Parser, Debug)]
#[command(name = "platdex")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Platform directory client", long_about = None)]
pub struct CliArgs {
    /// API root, e.g. http://localhost:8000/api/v1
    #[arg(long, env = "API_BASE_URL", global = true)]
    pub api_base_url: Option<String>,

    /// Platforms per listing page (1-100)
    #[arg(long, env = "PAGE_SIZE", global = true)]
    pub page_size: Option<u32>,

    /// HTTP request timeout in milliseconds (1000-60000)
    #[arg(long, env = "HTTP_TIMEOUT_MS", global = true)]
    pub timeout_ms: Option<u64>,

    /// Transparent retries for transient failures (0-1)
    #[arg(long, env = "HTTP_RETRIES", global = true)]
    pub retries: Option<u8>,

    /// Delay before a view is reported, in milliseconds (0-5000)
    #[arg(long, env = "VIEW_DELAY_MS", global = true)]
    pub view_delay_ms: Option<u64>,

    /// Age after which a cached listing is refreshed in the background (0-600000)
    #[arg(long, env = "STALE_AFTER_MS", global = true)]
    pub stale_after_ms: Option<u64>,

    /// CAPTCHA token forwarded with submissions
    #[arg(long, env = "RECAPTCHA_TOKEN", global = true, hide_env_values = true)]
    pub recaptcha_token: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Command {
    /// List platforms with optional search and filters
    Browse {
        #[arg(short, long)]
        search: Option<String>,
        /// Category id (repeatable)
        #[arg(short, long = "category")]
        categories: Vec<i64>,
        /// Tag id (repeatable)
        #[arg(short, long = "tag")]
        tags: Vec<i64>,
        #[arg(short, long)]
        page: Option<u32>,
        /// Read filter commands from stdin (s <text>, c <id>, t <id>, n, p, g <page>, x, o <slug>, q)
        #[arg(short, long)]
        interactive: bool,
    },
    /// Show one platform
    Platform { slug: String },
    /// Record a click on a platform or collection
    Visit {
        #[arg(value_parser = clap::value_parser!(EntityType))]
        entity: EntityType,
        id: i64,
        /// key=value metadata (repeatable)
        #[arg(long = "meta", value_parser = parse_key_value)]
        metadata: Vec<(String, String)>,
    },
    /// List collections
    Collections {
        #[arg(long)]
        featured: bool,
        #[arg(long)]
        limit: Option<u32>,
    },
    /// Show one collection
    Collection {
        slug: String,
        /// Open one of the collection's platforms (by slug), recording the click
        #[arg(long)]
        open: Option<String>,
    },
    /// Propose a new platform
    Submit(SubmitArgs),
    /// Admin pages (session cookie via /admin/login)
    Admin {
        #[arg(long, env = "ADMIN_USERNAME")]
        username: Option<String>,
        #[arg(long, env = "ADMIN_PASSWORD", hide_env_values = true)]
        password: Option<String>,
        #[command(subcommand)]
        action: AdminCommand,
    },
}

#[derive(clap::Args, Debug, Clone, PartialEq, Default)]
pub struct SubmitArgs {
    #[arg(long)]
    pub name: String,
    #[arg(long)]
    pub email: String,
    #[arg(long)]
    pub platform: String,
    #[arg(long)]
    pub description: Option<String>,
    #[arg(long)]
    pub website: Option<String>,
    #[arg(long)]
    pub ios: Option<String>,
    #[arg(long)]
    pub android: Option<String>,
    #[arg(long)]
    pub web: Option<String>,
    /// Screenshot file, uploaded before the submission is sent
    #[arg(long)]
    pub screenshot: Option<PathBuf>,
    /// Content type of the screenshot; guessed from the extension when absent
    #[arg(long)]
    pub content_type: Option<String>,
    #[arg(long, hide = true, default_value = "")]
    pub honeypot: String,
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum AdminCommand {
    /// List submissions
    Submissions,
    /// Approve a pending submission
    Approve { id: i64 },
    /// Reject a pending submission; an empty reason aborts
    Reject {
        id: i64,
        #[arg(long)]
        reason: Option<String>,
    },
    /// Views and clicks over the last days
    Dashboard {
        #[arg(long, default_value_t = DEFAULT_DASHBOARD_DAYS)]
        days: u32,
        #[arg(long, default_value_t = DEFAULT_DASHBOARD_TOP_LIMIT)]
        top_limit: u32,
    },
}

#[derive(Clone, Debug)]
pub struct Config {
    pub api_base_url: String,
    pub page_size: u32,
    pub timeout_ms: u64,
    pub retries: u8,
    pub view_delay_ms: u64,
    pub stale_after_ms: u64,
    pub recaptcha_token: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            page_size: 12,
            timeout_ms: 8000,
            retries: 1,
            view_delay_ms: 200,
            stale_after_ms: 0,
            recaptcha_token: None,
        }
    }
}

impl Config {
    pub fn fetch_policy(&self) -> FetchPolicy {
        FetchPolicy {
            stale_after: Duration::from_millis(self.stale_after_ms),
            retries: self.retries,
        }
    }

    pub fn view_delay(&self) -> Duration {
        Duration::from_millis(self.view_delay_ms)
    }

    pub fn print_summary(&self) {
        eprintln!("platdex configuration:");
        eprintln!("  API: {}", self.api_base_url);
        eprintln!("  Page size: {}", self.page_size);
        eprintln!("  Timeout: {}ms (retries: {})", self.timeout_ms, self.retries);
        eprintln!("  View delay: {}ms", self.view_delay_ms);
        eprintln!("  Stale after: {}ms", self.stale_after_ms);
        if self.recaptcha_token.is_some() {
            eprintln!("  CAPTCHA token: configured");
        }
    }
}

/// Validate that a value is within a given range (inclusive)
fn validate_in_range<T>(val: T, min: T, max: T, name: &str) -> Result<T>
where
    T: PartialOrd + std::fmt::Display + Copy,
{
    if val < min || val > max {
        Err(anyhow!("{name} must be in range [{min}, {max}], got {val}"))
    } else {
        Ok(val)
    }
}

fn validate_url(url: &str, name: &str) -> Result<()> {
    if url.is_empty() {
        return Err(anyhow!("{name} cannot be empty"));
    }
    if url.starts_with("http://") || url.starts_with("https://") {
        Ok(())
    } else {
        Err(anyhow!("{name} must start with http:// or https://"))
    }
}

fn parse_key_value(s: &str) -> std::result::Result<(String, String), String> {
    let (k, v) = s
        .split_once('=')
        .ok_or_else(|| format!("expected key=value, got '{s}'"))?;
    if k.trim().is_empty() {
        return Err(format!("empty key in '{s}'"));
    }
    Ok((k.trim().to_string(), v.trim().to_string()))
}

/// Load configuration from CLI args and environment variables.
pub fn load() -> Result<(Config, Command)> {
    from_args(CliArgs::parse())
}

pub fn from_args(args: CliArgs) -> Result<(Config, Command)> {
    let defaults = Config::default();

    let api_base_url = args.api_base_url.unwrap_or(defaults.api_base_url);
    validate_url(&api_base_url, "API_BASE_URL")?;

    let page_size = validate_in_range(args.page_size.unwrap_or(defaults.page_size), 1, 100, "PAGE_SIZE")?;
    let timeout_ms = validate_in_range(args.timeout_ms.unwrap_or(defaults.timeout_ms), 1000, 60000, "HTTP_TIMEOUT_MS")?;
    let retries = validate_in_range(args.retries.unwrap_or(defaults.retries), 0, 1, "HTTP_RETRIES")?;
    let view_delay_ms = validate_in_range(args.view_delay_ms.unwrap_or(defaults.view_delay_ms), 0, 5000, "VIEW_DELAY_MS")?;
    let stale_after_ms = validate_in_range(
        args.stale_after_ms.unwrap_or(defaults.stale_after_ms),
        0,
        600_000,
        "STALE_AFTER_MS",
    )?;

    let config = Config {
        api_base_url,
        page_size,
        timeout_ms,
        retries,
        view_delay_ms,
        stale_after_ms,
        recaptcha_token: args.recaptcha_token.filter(|t| !t.trim().is_empty()),
    };
    Ok((config, args.command))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(argv: &[&str]) -> Result<(Config, Command)> {
        from_args(CliArgs::try_parse_from(argv)?)
    }

    #[test]
    fn explicit_flags_are_validated() {
        let (cfg, cmd) = parse(&[
            "platdex",
            "--api-base-url",
            "https://dir.example.com/api/v1",
            "--page-size",
            "24",
            "--stale-after-ms",
            "30000",
            "browse",
            "-s",
            "translate",
            "-c",
            "3",
            "-c",
            "1",
        ])
        .unwrap();
        assert_eq!(cfg.api_base_url, "https://dir.example.com/api/v1");
        assert_eq!(cfg.page_size, 24);
        assert_eq!(cfg.fetch_policy().stale_after, Duration::from_secs(30));
        match cmd {
            Command::Browse { search, categories, .. } => {
                assert_eq!(search.as_deref(), Some("translate"));
                assert_eq!(categories, vec![3, 1]);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn out_of_range_is_rejected() {
        let err = parse(&["platdex", "--page-size", "0", "browse"]).unwrap_err();
        assert!(err.to_string().contains("PAGE_SIZE"));
        let err = parse(&["platdex", "--retries", "3", "browse"]).unwrap_err();
        assert!(err.to_string().contains("HTTP_RETRIES"));
        let err = parse(&["platdex", "--api-base-url", "localhost:8000", "browse"]).unwrap_err();
        assert!(err.to_string().contains("http://"));
    }

    #[test]
    fn visit_metadata_pairs() {
        let (_, cmd) = parse(&["platdex", "visit", "collection", "7", "--meta", "source=card"]).unwrap();
        assert_eq!(
            cmd,
            Command::Visit {
                entity: EntityType::Collection,
                id: 7,
                metadata: vec![("source".into(), "card".into())],
            }
        );
        assert!(parse(&["platdex", "visit", "user", "7"]).is_err());
    }

    #[test]
    fn collection_open_flag() {
        let (_, cmd) = parse(&["platdex", "collection", "ai-picks", "--open", "papago"]).unwrap();
        assert_eq!(
            cmd,
            Command::Collection {
                slug: "ai-picks".into(),
                open: Some("papago".into()),
            }
        );
    }

    #[test]
    fn dashboard_defaults() {
        let (_, cmd) = parse(&["platdex", "admin", "dashboard"]).unwrap();
        match cmd {
            Command::Admin { action, .. } => assert_eq!(
                action,
                AdminCommand::Dashboard {
                    days: 14,
                    top_limit: 5
                }
            ),
            other => panic!("unexpected command {other:?}"),
        }
    }
}
