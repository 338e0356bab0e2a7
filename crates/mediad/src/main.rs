//! mediad - media cache administration CLI

mod handler;

use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use mediacache::{CacheConfig, CacheManager, JsonCodec};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use crate::handler::{Command, CommandHandler, JsonCache};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Cache directory
    #[arg(short = 'd', long, env = "MEDIAD_CACHE_DIR")]
    cache_dir: Option<PathBuf>,

    /// JSON configuration file; flags override its values
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Memory entry budget
    #[arg(long, env = "MEDIAD_MEMORY_ITEMS")]
    memory_items: Option<usize>,

    /// Memory byte budget
    #[arg(long, env = "MEDIAD_MEMORY_BYTES")]
    memory_bytes: Option<usize>,

    /// Disk entry budget
    #[arg(long, env = "MEDIAD_DISK_ENTRIES")]
    disk_entries: Option<usize>,

    /// Disk time-to-live in seconds
    #[arg(long, env = "MEDIAD_DISK_TTL")]
    disk_ttl: Option<u64>,

    /// Log at debug level unless RUST_LOG says otherwise
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

impl Args {
    /// Configuration file (if any) with flag and environment overrides applied
    fn cache_config(&self) -> Result<CacheConfig> {
        let mut config = match &self.config {
            Some(path) => {
                let raw = fs::read_to_string(path)
                    .with_context(|| format!("Failed to read config file {}", path.display()))?;
                serde_json::from_str(&raw)
                    .with_context(|| format!("Invalid config file {}", path.display()))?
            }
            None => CacheConfig::default(),
        };

        if let Some(dir) = &self.cache_dir {
            config.cache_dir = dir.clone();
        }
        if let Some(items) = self.memory_items {
            config.memory_max_items = items;
        }
        if let Some(bytes) = self.memory_bytes {
            config.memory_max_bytes = bytes;
        }
        if let Some(entries) = self.disk_entries {
            config.disk_max_entries = entries;
        }
        if let Some(ttl) = self.disk_ttl {
            config.disk_ttl = Duration::from_secs(ttl);
        }

        Ok(config)
    }
}

fn main() -> Result<()> {
    let args = Args::parse();

    // Logs go to stderr so stdout stays valid JSON
    let default_level = if args.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    let config = args.cache_config()?;
    debug!(?config, "Resolved cache configuration");

    let cache: JsonCache = CacheManager::open(config, JsonCodec::new())
        .context("Failed to open cache directory")?;
    info!("mediad v{}", env!("CARGO_PKG_VERSION"));

    let result = CommandHandler::new(&cache).handle(&args.command);
    cache.stop();

    let report = result?;
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_flags_build_config() {
        let args = Args::try_parse_from([
            "mediad",
            "--cache-dir",
            "/tmp/media",
            "--memory-items",
            "10",
            "--disk-ttl",
            "60",
            "stats",
        ])
        .unwrap();

        let config = args.cache_config().unwrap();
        assert_eq!(config.cache_dir, PathBuf::from("/tmp/media"));
        assert_eq!(config.memory_max_items, 10);
        assert_eq!(config.disk_ttl, Duration::from_secs(60));
        assert_eq!(args.command, Command::Stats);
    }

    #[test]
    fn test_flags_override_config_file() {
        let mut file = NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"cache_dir": "/srv/cache", "memory_max_items": 5, "disk_max_entries": 7}}"#
        )
        .unwrap();

        let path = file.path().to_str().unwrap();
        let args =
            Args::try_parse_from(["mediad", "--config", path, "--memory-items", "9", "clear"])
                .unwrap();

        let config = args.cache_config().unwrap();
        assert_eq!(config.cache_dir, PathBuf::from("/srv/cache"));
        assert_eq!(config.memory_max_items, 9);
        assert_eq!(config.disk_max_entries, 7);
    }

    #[test]
    fn test_put_arguments() {
        let args = Args::try_parse_from([
            "mediad", "put", "prompt_cat", "a cat", "--tag", "image", "--tag", "hd",
        ])
        .unwrap();

        assert_eq!(
            args.command,
            Command::Put {
                key: "prompt_cat".into(),
                value: "a cat".into(),
                tags: vec!["image".into(), "hd".into()],
            }
        );
    }

    #[test]
    fn test_memory_only_flag_is_rejected() {
        let result = Args::try_parse_from(["mediad", "put", "k", "v", "--memory-only"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_bad_config_file_is_reported() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "not json").unwrap();

        let path = file.path().to_str().unwrap();
        let args = Args::try_parse_from(["mediad", "--config", path, "stats"]).unwrap();
        assert!(args.cache_config().is_err());
    }
}
