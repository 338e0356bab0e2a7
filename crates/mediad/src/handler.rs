//! Command handler for the cache CLI

use anyhow::{Context, Result};
use clap::Subcommand;
use mediacache::{CacheManager, JsonCodec, PutOptions};
use serde_json::{json, Map, Value};

/// Cache holding JSON payloads
pub type JsonCache = CacheManager<Value, JsonCodec<Value>>;

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Print memory, disk and preload statistics
    Stats,

    /// Print the value stored under a key
    Get {
        /// Cache key
        key: String,
    },

    /// Store a value (parsed as JSON, otherwise stored as a string)
    Put {
        /// Cache key
        key: String,
        /// Value to store
        value: String,
        /// Tag to attach; repeatable
        #[arg(long = "tag")]
        tags: Vec<String>,
    },

    /// Remove a key from both tiers
    Remove {
        /// Cache key
        key: String,
    },

    /// Remove every entry
    Clear,

    /// Remove expired entries now
    Cleanup,

    /// List the disk index
    Entries,
}

pub struct CommandHandler<'a> {
    cache: &'a JsonCache,
}

impl<'a> CommandHandler<'a> {
    pub fn new(cache: &'a JsonCache) -> Self {
        Self { cache }
    }

    /// Run one command and return its JSON report
    pub fn handle(&self, command: &Command) -> Result<Value> {
        match command {
            Command::Stats => self.handle_stats(),
            Command::Get { key } => Ok(self.handle_get(key)),
            Command::Put { key, value, tags } => Ok(self.handle_put(key, value, tags)),
            Command::Remove { key } => Ok(json!({"key": key, "removed": self.cache.remove(key)})),
            Command::Clear => {
                self.cache.clear();
                Ok(json!({"cleared": true}))
            }
            Command::Cleanup => {
                serde_json::to_value(self.cache.cleanup()).context("Failed to encode cleanup report")
            }
            Command::Entries => self.handle_entries(),
        }
    }

    fn handle_stats(&self) -> Result<Value> {
        serde_json::to_value(self.cache.stats()).context("Failed to encode statistics")
    }

    fn handle_get(&self, key: &str) -> Value {
        match self.cache.get(key) {
            Some(value) => json!({"key": key, "found": true, "value": value}),
            None => json!({"key": key, "found": false}),
        }
    }

    fn handle_put(&self, key: &str, raw: &str, tags: &[String]) -> Value {
        // the process exits after one command, so only the disk tier outlives it
        let options = PutOptions::default().with_tags(tags.iter().cloned());

        let stored = self.cache.put_with(key, parse_value(raw), options);
        json!({"key": key, "stored": stored})
    }

    fn handle_entries(&self) -> Result<Value> {
        let mut listing = Map::new();
        for (key, entry) in self.cache.disk().entries() {
            let entry = serde_json::to_value(entry).context("Failed to encode index entry")?;
            listing.insert(key, entry);
        }
        Ok(Value::Object(listing))
    }
}

/// JSON if it parses, otherwise the raw text as a JSON string
fn parse_value(raw: &str) -> Value {
    serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use mediacache::CacheConfig;
    use tempfile::TempDir;

    fn open(dir: &TempDir) -> JsonCache {
        let config = CacheConfig::new(dir.path()).with_preload(false);
        CacheManager::open(config, JsonCodec::new()).unwrap()
    }

    fn put(key: &str, value: &str) -> Command {
        Command::Put {
            key: key.into(),
            value: value.into(),
            tags: vec!["cli".into()],
        }
    }

    #[test]
    fn test_parse_value() {
        assert_eq!(parse_value(r#"{"url": "x"}"#), json!({"url": "x"}));
        assert_eq!(parse_value("42"), json!(42));
        assert_eq!(parse_value("a cat on a mat"), json!("a cat on a mat"));
    }

    #[test]
    fn test_put_and_get() {
        let dir = TempDir::new().unwrap();
        let cache = open(&dir);
        let handler = CommandHandler::new(&cache);

        let report = handler.handle(&put("prompt_cat", r#"{"url": "https://cdn/cat.png"}"#)).unwrap();
        assert_eq!(report["stored"], true);

        let report = handler.handle(&Command::Get { key: "prompt_cat".into() }).unwrap();
        assert_eq!(report["found"], true);
        assert_eq!(report["value"]["url"], "https://cdn/cat.png");

        let report = handler.handle(&Command::Get { key: "absent".into() }).unwrap();
        assert_eq!(report["found"], false);
    }

    #[test]
    fn test_persists_across_processes() {
        let dir = TempDir::new().unwrap();
        {
            let cache = open(&dir);
            CommandHandler::new(&cache).handle(&put("k", "v")).unwrap();
            cache.stop();
        }

        let cache = open(&dir);
        let handler = CommandHandler::new(&cache);
        let entries = handler.handle(&Command::Entries).unwrap();
        assert_eq!(entries["k"]["tags"], json!(["cli"]));

        let report = handler.handle(&Command::Get { key: "k".into() }).unwrap();
        assert_eq!(report["value"], "v");
    }

    #[test]
    fn test_put_lists_tags_in_index() {
        let dir = TempDir::new().unwrap();
        let cache = open(&dir);
        let handler = CommandHandler::new(&cache);

        handler
            .handle(&Command::Put {
                key: "k".into(),
                value: "v".into(),
                tags: vec!["image".into(), "hd".into()],
            })
            .unwrap();

        let entries = handler.handle(&Command::Entries).unwrap();
        assert_eq!(entries["k"]["tags"], json!(["image", "hd"]));
    }

    #[test]
    fn test_remove_clear_and_stats() {
        let dir = TempDir::new().unwrap();
        let cache = open(&dir);
        let handler = CommandHandler::new(&cache);

        handler.handle(&put("a", "1")).unwrap();
        handler.handle(&put("b", "2")).unwrap();

        let report = handler.handle(&Command::Remove { key: "a".into() }).unwrap();
        assert_eq!(report["removed"], true);
        let report = handler.handle(&Command::Remove { key: "a".into() }).unwrap();
        assert_eq!(report["removed"], false);

        let stats = handler.handle(&Command::Stats).unwrap();
        assert_eq!(stats["disk"]["size"], 1);
        assert_eq!(stats["memory"]["size"], 1);

        handler.handle(&Command::Clear).unwrap();
        let stats = handler.handle(&Command::Stats).unwrap();
        assert_eq!(stats["disk"]["size"], 0);

        let report = handler.handle(&Command::Cleanup).unwrap();
        assert_eq!(report, json!({"memory": 0, "disk": 0}));
    }
}
