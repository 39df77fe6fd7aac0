use std::fmt::Display;
use std::path::PathBuf;
use std::str::FromStr;

use anyhow::{Context, bail};
use chrono::Duration;
use tracing::info;

/// Placeholder JWT secrets that MUST NOT be used.
const PLACEHOLDER_SECRETS: &[&str] = &[
    "change-me-to-a-random-string",
    "dev-secret-change-me",
    "your_jwt_secret",
];

/// Where uploaded images are kept.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BlobBackend {
    /// A directory on disk, served back under `/uploads`.
    Local { dir: PathBuf },
    /// A remote HTTP blob service.
    Remote { endpoint: String, token: String },
}

#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub db_path: PathBuf,
    pub jwt_secret: String,
    pub jwt_ttl: Duration,
    pub max_file_size: usize,
    pub frontend_url: Option<String>,
    pub public_url: String,
    pub blob_backend: BlobBackend,
    pub reconcile_interval_secs: u64,
    pub orphan_grace_secs: u64,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the config from any key lookup. Empty values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let jwt_secret = var("GALLERY_JWT_SECRET").unwrap_or_default();
        if jwt_secret.is_empty() || PLACEHOLDER_SECRETS.contains(&jwt_secret.as_str()) {
            bail!("GALLERY_JWT_SECRET is unset or still a placeholder");
        }

        let host = var("GALLERY_HOST").unwrap_or_else(|| "0.0.0.0".into());
        let port: u16 = parse_or("GALLERY_PORT", var("GALLERY_PORT"), 5000)?;

        let jwt_ttl = match var("GALLERY_JWT_EXPIRATION") {
            Some(raw) => parse_ttl(&raw)
                .with_context(|| format!("Invalid GALLERY_JWT_EXPIRATION: {}", raw))?,
            None => Duration::days(7),
        };

        let public_url = var("GALLERY_PUBLIC_URL")
            .unwrap_or_else(|| format!("http://localhost:{}", port))
            .trim_end_matches('/')
            .to_string();

        let blob_backend = match var("GALLERY_BLOB_BACKEND").as_deref().unwrap_or("local") {
            "local" => BlobBackend::Local {
                dir: var("GALLERY_UPLOAD_DIR")
                    .unwrap_or_else(|| "./uploads".into())
                    .into(),
            },
            "remote" => BlobBackend::Remote {
                endpoint: var("GALLERY_BLOB_URL")
                    .context("GALLERY_BLOB_URL is required for the remote blob backend")?,
                token: var("GALLERY_BLOB_TOKEN")
                    .context("GALLERY_BLOB_TOKEN is required for the remote blob backend")?,
            },
            other => bail!("Unknown GALLERY_BLOB_BACKEND '{}' (expected local or remote)", other),
        };

        let max_file_size: usize =
            parse_or("GALLERY_MAX_FILE_SIZE", var("GALLERY_MAX_FILE_SIZE"), 10 * 1024 * 1024)?;
        if max_file_size == 0 {
            bail!("GALLERY_MAX_FILE_SIZE must be greater than zero");
        }

        Ok(Self {
            host,
            port,
            db_path: var("GALLERY_DB_PATH")
                .unwrap_or_else(|| "gallery.db".into())
                .into(),
            jwt_secret,
            jwt_ttl,
            max_file_size,
            frontend_url: var("GALLERY_FRONTEND_URL"),
            public_url,
            blob_backend,
            reconcile_interval_secs: parse_or(
                "GALLERY_RECONCILE_INTERVAL_SECS",
                var("GALLERY_RECONCILE_INTERVAL_SECS"),
                3600,
            )?,
            orphan_grace_secs: parse_or(
                "GALLERY_ORPHAN_GRACE_SECS",
                var("GALLERY_ORPHAN_GRACE_SECS"),
                3600,
            )?,
        })
    }
}

fn parse_or<T>(key: &str, raw: Option<String>, default: T) -> anyhow::Result<T>
where
    T: FromStr + Display,
    T::Err: Display,
{
    match raw {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|e| anyhow::anyhow!("Invalid {} value '{}': {}", key, raw, e)),
        None => {
            info!("{key} not set, using default: {default}");
            Ok(default)
        }
    }
}

/// Parse a token lifetime such as `7d`, `12h`, `30m`, `45s` or plain seconds.
pub fn parse_ttl(raw: &str) -> anyhow::Result<Duration> {
    let raw = raw.trim();
    let (digits, unit) = match raw.char_indices().last() {
        Some((i, c)) if c.is_ascii_alphabetic() => (&raw[..i], c.to_ascii_lowercase()),
        _ => (raw, 's'),
    };
    let value: i64 = digits.trim().parse().context("expected a number")?;
    if value <= 0 {
        bail!("lifetime must be positive");
    }

    let ttl = match unit {
        's' => Duration::try_seconds(value),
        'm' => Duration::try_minutes(value),
        'h' => Duration::try_hours(value),
        'd' => Duration::try_days(value),
        other => bail!("unknown unit '{}'", other),
    };
    ttl.context("lifetime out of range")
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn config(pairs: &[(&str, &str)]) -> anyhow::Result<Config> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn ttl_units() {
        assert_eq!(parse_ttl("7d").unwrap(), Duration::days(7));
        assert_eq!(parse_ttl("12h").unwrap(), Duration::hours(12));
        assert_eq!(parse_ttl("30m").unwrap(), Duration::minutes(30));
        assert_eq!(parse_ttl("45s").unwrap(), Duration::seconds(45));
        assert_eq!(parse_ttl("3600").unwrap(), Duration::seconds(3600));
        assert_eq!(parse_ttl(" 2D ").unwrap(), Duration::days(2));
    }

    #[test]
    fn ttl_rejects_garbage() {
        assert!(parse_ttl("").is_err());
        assert!(parse_ttl("d").is_err());
        assert!(parse_ttl("7w").is_err());
        assert!(parse_ttl("-1h").is_err());
        assert!(parse_ttl("0").is_err());
        assert!(parse_ttl("soon").is_err());
    }

    #[test]
    fn defaults() {
        let cfg = config(&[("GALLERY_JWT_SECRET", "s3cret")]).unwrap();
        assert_eq!(cfg.host, "0.0.0.0");
        assert_eq!(cfg.port, 5000);
        assert_eq!(cfg.db_path, PathBuf::from("gallery.db"));
        assert_eq!(cfg.jwt_ttl, Duration::days(7));
        assert_eq!(cfg.max_file_size, 10 * 1024 * 1024);
        assert_eq!(cfg.frontend_url, None);
        assert_eq!(cfg.public_url, "http://localhost:5000");
        assert_eq!(
            cfg.blob_backend,
            BlobBackend::Local {
                dir: PathBuf::from("./uploads")
            }
        );
        assert_eq!(cfg.reconcile_interval_secs, 3600);
        assert_eq!(cfg.orphan_grace_secs, 3600);
    }

    #[test]
    fn secret_is_required() {
        assert!(config(&[]).is_err());
        assert!(config(&[("GALLERY_JWT_SECRET", "  ")]).is_err());
        assert!(config(&[("GALLERY_JWT_SECRET", "dev-secret-change-me")]).is_err());
    }

    #[test]
    fn remote_backend_needs_url_and_token() {
        let base = ("GALLERY_JWT_SECRET", "s3cret");
        assert!(config(&[base, ("GALLERY_BLOB_BACKEND", "remote")]).is_err());

        let cfg = config(&[
            base,
            ("GALLERY_BLOB_BACKEND", "remote"),
            ("GALLERY_BLOB_URL", "https://blob.example.com"),
            ("GALLERY_BLOB_TOKEN", "tok"),
        ])
        .unwrap();
        assert_eq!(
            cfg.blob_backend,
            BlobBackend::Remote {
                endpoint: "https://blob.example.com".into(),
                token: "tok".into()
            }
        );

        assert!(config(&[base, ("GALLERY_BLOB_BACKEND", "s3")]).is_err());
    }

    #[test]
    fn overrides() {
        let cfg = config(&[
            ("GALLERY_JWT_SECRET", "s3cret"),
            ("GALLERY_PORT", "8080"),
            ("GALLERY_JWT_EXPIRATION", "12h"),
            ("GALLERY_PUBLIC_URL", "https://photos.example.com/"),
            ("GALLERY_FRONTEND_URL", "https://app.example.com"),
            ("GALLERY_RECONCILE_INTERVAL_SECS", "0"),
        ])
        .unwrap();
        assert_eq!(cfg.port, 8080);
        assert_eq!(cfg.jwt_ttl, Duration::hours(12));
        assert_eq!(cfg.public_url, "https://photos.example.com");
        assert_eq!(cfg.frontend_url.as_deref(), Some("https://app.example.com"));
        assert_eq!(cfg.reconcile_interval_secs, 0);

        assert!(config(&[("GALLERY_JWT_SECRET", "s"), ("GALLERY_PORT", "http")]).is_err());
        assert!(config(&[("GALLERY_JWT_SECRET", "s"), ("GALLERY_MAX_FILE_SIZE", "0")]).is_err());
    }
}
