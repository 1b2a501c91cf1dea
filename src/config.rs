use serde::Deserialize;
use std::collections::HashSet;
use std::fs;
use std::path::Path;
use log::error;

use crate::circular_buffer::DEFAULT_CAPACITY;
use crate::error::Error;

#[derive(Debug, Deserialize, Default, Clone)]
pub struct Config {
    #[serde(default, rename = "channel")]
    pub channels: Vec<ChannelEntry>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChannelEntry {
    pub id: String,
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_capacity")]
    pub capacity: usize,
    #[serde(default = "default_delimiter")]
    pub delimiter: String,
    #[serde(default = "default_chunk")]
    pub chunk: usize,
    #[serde(default)]
    pub timeout_ms: u64,
    #[serde(default)]
    pub wrap_aware: bool,
    pub source: SourceConfig,
    #[serde(default, rename = "field")]
    pub fields: Vec<FieldEntry>,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct SourceConfig {
    #[serde(default)]
    pub path: Option<String>,
    /// Inline bytes to replay instead of reading a file.
    #[serde(default)]
    pub data: Option<String>,
    #[serde(default, rename = "loop")]
    pub loop_: Option<bool>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct FieldEntry {
    pub name: String,
    pub kind: String,
    pub start: String,
    #[serde(default)]
    pub finish: Option<String>,
    #[serde(default = "default_field_size")]
    pub size: usize,
}

fn default_capacity() -> usize {
    DEFAULT_CAPACITY
}

fn default_delimiter() -> String {
    "\r\n".to_string()
}

fn default_chunk() -> usize {
    16
}

fn default_field_size() -> usize {
    32
}

/// How a field is pulled out of a completed frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldRule {
    /// Text from the start of `pattern` up to the end of the line.
    Match { name: String, pattern: Vec<u8>, size: usize },
    /// Text between `start` and the `finish` byte.
    Between { name: String, start: Vec<u8>, finish: u8, size: usize },
}

impl FieldRule {
    pub fn name(&self) -> &str {
        match self {
            FieldRule::Match { name, .. } | FieldRule::Between { name, .. } => name,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ChannelConfig {
    pub id: String,
    pub capacity: usize,
    pub delimiter: Vec<u8>,
    pub chunk: usize,
    pub timeout_ms: u64,
    pub wrap_aware: bool,
    pub source: SourceConfig,
    pub fields: Vec<FieldRule>,
}

pub struct FlattenedConfig {
    pub channels: Vec<ChannelConfig>,
}

pub fn load_config(path: &str) -> Result<FlattenedConfig, Error> {
    if !Path::new(path).exists() {
        return Err(Error::Config(format!("Config file not found: {}", path)));
    }

    let content = fs::read_to_string(path)?;
    let cfg = parse_config(&content)?;

    log::info!("Config loaded from: {}", path);
    Ok(cfg)
}

pub fn parse_config(content: &str) -> Result<FlattenedConfig, Error> {
    let cfg: Config = toml::from_str(content)?;

    log::info!("Found {} channels in config", cfg.channels.len());

    let mut channels = Vec::new();
    let mut seen_ids: HashSet<String> = HashSet::new();
    for entry in cfg.channels.into_iter().filter(|c| c.enabled) {
        if !is_valid_id(&entry.id) {
            error!("Invalid channel id '{}'. Use [a-z0-9][a-z0-9_-]*", entry.id);
            continue;
        }
        if !seen_ids.insert(entry.id.clone()) {
            error!("Duplicate channel id '{}' - skipping", entry.id);
            continue;
        }
        match validate_channel(entry) {
            Ok(channel) => channels.push(channel),
            Err(msg) => error!("{} - skipping", msg),
        }
    }

    log::info!("Enabled channels: {}", channels.len());
    if channels.is_empty() {
        log::warn!("No enabled channels found in config - nothing to scan");
    }

    Ok(FlattenedConfig { channels })
}

fn validate_channel(entry: ChannelEntry) -> Result<ChannelConfig, String> {
    let id = entry.id;
    if entry.capacity < 2 {
        return Err(format!("Channel '{}': capacity must be at least 2", id));
    }
    if entry.delimiter.is_empty() {
        return Err(format!("Channel '{}': delimiter must not be empty", id));
    }
    if entry.delimiter.len() >= entry.capacity {
        return Err(format!(
            "Channel '{}': delimiter of {} bytes does not fit capacity {}",
            id,
            entry.delimiter.len(),
            entry.capacity
        ));
    }
    if entry.chunk == 0 {
        return Err(format!("Channel '{}': chunk must be positive", id));
    }
    match (&entry.source.path, &entry.source.data) {
        (Some(_), None) | (None, Some(_)) => {}
        _ => {
            return Err(format!(
                "Channel '{}': source needs exactly one of 'path' or 'data'",
                id
            ))
        }
    }

    let mut fields = Vec::with_capacity(entry.fields.len());
    for field in entry.fields {
        fields.push(validate_field(&id, field)?);
    }

    Ok(ChannelConfig {
        id,
        capacity: entry.capacity,
        delimiter: entry.delimiter.into_bytes(),
        chunk: entry.chunk,
        timeout_ms: entry.timeout_ms,
        wrap_aware: entry.wrap_aware,
        source: entry.source,
        fields,
    })
}

fn validate_field(channel: &str, field: FieldEntry) -> Result<FieldRule, String> {
    if field.size == 0 {
        return Err(format!(
            "Channel '{}': field '{}' needs a positive size",
            channel, field.name
        ));
    }
    if field.kind.eq_ignore_ascii_case("match") {
        return Ok(FieldRule::Match {
            name: field.name,
            pattern: field.start.into_bytes(),
            size: field.size,
        });
    }
    if field.kind.eq_ignore_ascii_case("between") {
        let finish = match field.finish.as_deref().map(str::as_bytes) {
            Some([byte]) => *byte,
            _ => {
                return Err(format!(
                    "Channel '{}': field '{}' needs a single-byte 'finish'",
                    channel, field.name
                ))
            }
        };
        return Ok(FieldRule::Between {
            name: field.name,
            start: field.start.into_bytes(),
            finish,
            size: field.size,
        });
    }
    Err(format!(
        "Channel '{}': field '{}' has unknown kind '{}'",
        channel, field.name, field.kind
    ))
}

fn is_valid_id(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if is_lc_alnum(c) => {},
        _ => return false,
    }
    for c in chars {
        if !(is_lc_alnum(c) || c == '-' || c == '_') { return false; }
    }
    true
}

fn is_lc_alnum(c: char) -> bool {
    matches!(c, 'a'..='z' | '0'..='9')
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
[[channel]]
id = "uart1"
enabled = true
capacity = 32
timeout_ms = 50

[channel.source]
data = "T=21;\r\n"

[[channel.field]]
name = "temp"
kind = "between"
start = "T="
finish = ";"
size = 8

[[channel.field]]
name = "line"
kind = "match"
start = "T="

[[channel]]
id = "gps"
enabled = false

[channel.source]
path = "/dev/ttyUSB1"
"#;

    #[test]
    fn test_parse_sample() {
        let cfg = parse_config(SAMPLE).unwrap();
        assert_eq!(cfg.channels.len(), 1);

        let ch = &cfg.channels[0];
        assert_eq!(ch.id, "uart1");
        assert_eq!(ch.capacity, 32);
        assert_eq!(ch.delimiter, b"\r\n");
        assert_eq!(ch.chunk, 16);
        assert_eq!(ch.timeout_ms, 50);
        assert!(!ch.wrap_aware);
        assert_eq!(ch.source.data.as_deref(), Some("T=21;\r\n"));
        assert_eq!(
            ch.fields,
            vec![
                FieldRule::Between {
                    name: "temp".into(),
                    start: b"T=".to_vec(),
                    finish: b';',
                    size: 8,
                },
                FieldRule::Match {
                    name: "line".into(),
                    pattern: b"T=".to_vec(),
                    size: 32,
                },
            ]
        );
    }

    #[test]
    fn test_skips_invalid_channels() {
        let cfg = parse_config(
            r#"
[[channel]]
id = "Bad-Id"
enabled = true
[channel.source]
data = "x"

[[channel]]
id = "dup"
enabled = true
[channel.source]
data = "x"

[[channel]]
id = "dup"
enabled = true
[channel.source]
data = "y"

[[channel]]
id = "tiny"
enabled = true
capacity = 1
[channel.source]
data = "x"

[[channel]]
id = "nosource"
enabled = true
[channel.source]

[[channel]]
id = "badfield"
enabled = true
[channel.source]
data = "x"
[[channel.field]]
name = "f"
kind = "between"
start = "A"
finish = "::"
"#,
        )
        .unwrap();
        let ids: Vec<_> = cfg.channels.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, vec!["dup"]);
        assert_eq!(cfg.channels[0].source.data.as_deref(), Some("x"));
    }

    #[test]
    fn test_unknown_field_kind_skips_channel() {
        let cfg = parse_config(
            r#"
[[channel]]
id = "a"
enabled = true
[channel.source]
data = "x"
[[channel.field]]
name = "f"
kind = "regex"
start = "A"
"#,
        )
        .unwrap();
        assert!(cfg.channels.is_empty());
    }

    #[test]
    fn test_missing_file() {
        let err = load_config("/nonexistent/ringscan.toml").err().unwrap();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_bad_toml() {
        let err = parse_config("[[channel]\nid =").err().unwrap();
        assert!(matches!(err, Error::Toml(_)));
    }

    #[test]
    fn test_is_valid_id() {
        assert!(is_valid_id("uart1"));
        assert!(is_valid_id("0a_b-c"));
        assert!(!is_valid_id("_a"));
        assert!(!is_valid_id("Upper"));
        assert!(!is_valid_id(""));
    }
}
