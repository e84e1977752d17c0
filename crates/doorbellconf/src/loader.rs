//! Config file discovery, loading, and environment variable overlay.

use crate::{ConfigError, DoorbellConfig, TriggerKind};
use std::env;
use std::path::{Path, PathBuf};

/// Information about where config values came from.
#[derive(Debug, Clone, Default)]
pub struct ConfigSources {
    /// Config files that were loaded (in order)
    pub files: Vec<PathBuf>,
    /// Environment variables that overrode config values
    pub env_overrides: Vec<String>,
}

/// Discover config files, optionally with a CLI override path.
///
/// If `cli_path` is provided and exists, it replaces the local override.
/// Returns paths in load order (system, user, local/cli).
pub fn discover_config_files_with_override(cli_path: Option<&Path>) -> Vec<PathBuf> {
    let mut files = Vec::new();

    let system = PathBuf::from("/etc/sound-mqtt-doorbell/config.toml");
    if system.exists() {
        files.push(system);
    }

    // XDG_CONFIG_HOME or ~/.config
    if let Some(config_dir) = directories::BaseDirs::new().map(|d| d.config_dir().to_path_buf()) {
        let user = config_dir.join("sound-mqtt-doorbell/config.toml");
        if user.exists() {
            files.push(user);
        }
    }

    if let Some(path) = cli_path {
        if path.exists() {
            files.push(path.to_path_buf());
            return files;
        }
    }

    let local = PathBuf::from("doorbell.toml");
    if local.exists() {
        files.push(local);
    }

    files
}

/// Read a TOML file and layer its values over `config`.
pub fn apply_file(config: &mut DoorbellConfig, path: &Path) -> Result<(), ConfigError> {
    let contents = std::fs::read_to_string(path).map_err(|e| ConfigError::FileRead {
        path: path.to_path_buf(),
        source: e,
    })?;

    apply_toml(config, &contents, path)
}

/// Layer the keys present in a TOML document over `config`.
///
/// Keys that are absent keep whatever an earlier layer set, so a user file
/// that only names a topic does not reset the system file's broker URI.
fn apply_toml(config: &mut DoorbellConfig, contents: &str, path: &Path) -> Result<(), ConfigError> {
    let parse_err = |message: String| ConfigError::Parse {
        path: path.to_path_buf(),
        message,
    };

    let table: toml::Table = contents
        .parse()
        .map_err(|e: toml::de::Error| parse_err(e.to_string()))?;

    if let Some(broker) = table.get("broker").and_then(|v| v.as_table()) {
        if let Some(v) = broker.get("uri").and_then(|v| v.as_str()) {
            config.broker.uri = v.to_string();
        }
        if let Some(v) = broker.get("client_id").and_then(|v| v.as_str()) {
            config.broker.client_id = v.to_string();
        }
        if let Some(v) = broker.get("topic").and_then(|v| v.as_str()) {
            config.broker.topic = v.to_string();
        }
        if let Some(v) = broker.get("qos").and_then(|v| v.as_integer()) {
            config.broker.qos = u8::try_from(v)
                .map_err(|_| parse_err(format!("broker.qos out of range: {}", v)))?;
        }
        if let Some(v) = broker.get("keep_alive_secs").and_then(|v| v.as_integer()) {
            config.broker.keep_alive_secs = non_negative(v, "broker.keep_alive_secs", path)?;
        }
        if let Some(v) = broker.get("connect_timeout_ms").and_then(|v| v.as_integer()) {
            config.broker.connect_timeout_ms =
                non_negative(v, "broker.connect_timeout_ms", path)?;
        }
        if let Some(v) = broker.get("connect_attempts").and_then(|v| v.as_integer()) {
            config.broker.connect_attempts = u32::try_from(v)
                .map_err(|_| parse_err(format!("broker.connect_attempts out of range: {}", v)))?;
        }
    }

    if let Some(sound) = table.get("sound").and_then(|v| v.as_table()) {
        if let Some(v) = sound.get("path").and_then(|v| v.as_str()) {
            config.sound.path = expand_path(v);
        }
        if let Some(v) = sound.get("trigger").and_then(|v| v.as_str()) {
            config.sound.trigger = v
                .parse::<TriggerKind>()
                .map_err(|e| parse_err(e.to_string()))?;
        }
        if let Some(v) = sound.get("activate_payload").and_then(|v| v.as_str()) {
            config.sound.activate_payload = v.to_string();
        }
        if let Some(v) = sound.get("queue_capacity").and_then(|v| v.as_integer()) {
            config.sound.queue_capacity = usize::try_from(v)
                .map_err(|_| parse_err(format!("sound.queue_capacity out of range: {}", v)))?;
        }
    }

    if let Some(pipeline) = table.get("pipeline").and_then(|v| v.as_table()) {
        if let Some(v) = pipeline.get("converter").and_then(|v| v.as_str()) {
            config.pipeline.converter = v.to_string();
        }
        if let Some(v) = pipeline.get("player").and_then(|v| v.as_str()) {
            config.pipeline.player = v.to_string();
        }
        if let Some(v) = pipeline.get("normalize").and_then(|v| v.as_bool()) {
            config.pipeline.normalize = v;
        }
        if let Some(v) = pipeline.get("normalize_filter").and_then(|v| v.as_str()) {
            config.pipeline.normalize_filter = v.to_string();
        }
    }

    if let Some(telemetry) = table.get("telemetry").and_then(|v| v.as_table()) {
        if let Some(v) = telemetry.get("log_level").and_then(|v| v.as_str()) {
            config.telemetry.log_level = v.to_string();
        }
    }

    Ok(())
}

fn non_negative(value: i64, key: &str, path: &Path) -> Result<u64, ConfigError> {
    u64::try_from(value).map_err(|_| ConfigError::Parse {
        path: path.to_path_buf(),
        message: format!("{} must not be negative: {}", key, value),
    })
}

/// Apply environment variable overrides to config.
pub fn apply_env_overrides(config: &mut DoorbellConfig, sources: &mut ConfigSources) {
    apply_overrides_from(config, sources, |key| env::var(key).ok());
}

/// Apply overrides using an arbitrary variable lookup.
pub fn apply_overrides_from<F>(config: &mut DoorbellConfig, sources: &mut ConfigSources, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    let mut take = |key: &str| {
        let value = lookup(key)?;
        sources.env_overrides.push(key.to_string());
        Some(value)
    };

    if let Some(v) = take("DOORBELL_BROKER_URI") {
        config.broker.uri = v;
    }
    if let Some(v) = take("DOORBELL_CLIENT_ID") {
        config.broker.client_id = v;
    }
    if let Some(v) = take("DOORBELL_TOPIC") {
        config.broker.topic = v;
    }

    if let Some(v) = take("DOORBELL_SOUND_PATH") {
        config.sound.path = expand_path(&v);
    }
    if let Some(v) = take("DOORBELL_ACTIVATE_PAYLOAD") {
        config.sound.activate_payload = v;
    }

    if let Some(v) = take("DOORBELL_CONVERTER") {
        config.pipeline.converter = v;
    }
    if let Some(v) = take("DOORBELL_PLAYER") {
        config.pipeline.player = v;
    }

    if let Some(v) = take("DOORBELL_LOG_LEVEL") {
        config.telemetry.log_level = v;
    }
    // Also support RUST_LOG
    if let Some(v) = take("RUST_LOG") {
        config.telemetry.log_level = v;
    }

    // Only recorded when it parses; an unknown trigger leaves the config alone
    if let Some(trigger) = lookup("DOORBELL_TRIGGER").and_then(|v| v.parse::<TriggerKind>().ok())
    {
        config.sound.trigger = trigger;
        sources.env_overrides.push("DOORBELL_TRIGGER".to_string());
    }
}

/// Expand ~ and environment variables in a path.
pub fn expand_path(path: &str) -> PathBuf {
    if let Some(stripped) = path.strip_prefix("~/") {
        if let Some(home) = directories::BaseDirs::new().map(|d| d.home_dir().to_path_buf()) {
            home.join(stripped)
        } else {
            PathBuf::from(path)
        }
    } else if let Some(stripped) = path.strip_prefix('$') {
        // Handle $VAR/rest/of/path
        if let Some(slash_pos) = stripped.find('/') {
            let var_name = &stripped[..slash_pos];
            if let Ok(var_value) = env::var(var_name) {
                PathBuf::from(var_value).join(&stripped[slash_pos + 1..])
            } else {
                PathBuf::from(path)
            }
        } else {
            env::var(stripped)
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from(path))
        }
    } else {
        PathBuf::from(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    #[test]
    fn test_expand_path_tilde() {
        let expanded = expand_path("~/sounds/doorbell");
        assert!(!expanded.to_string_lossy().starts_with('~'));
        assert!(expanded.to_string_lossy().ends_with("sounds/doorbell"));
    }

    #[test]
    fn test_expand_path_absolute() {
        let expanded = expand_path("/absolute/path");
        assert_eq!(expanded, PathBuf::from("/absolute/path"));
    }

    #[test]
    fn test_parse_minimal_toml() {
        let toml = r#"
[broker]
topic = "home/door"
"#;
        let mut config = DoorbellConfig::default();
        apply_toml(&mut config, toml, Path::new("test.toml")).unwrap();
        assert_eq!(config.broker.topic, "home/door");
        // Other values should be defaults
        assert_eq!(config.broker.uri, "mqtt://127.0.0.1:1883");
        assert_eq!(config.sound.activate_payload, "ON");
    }

    #[test]
    fn test_parse_full_toml() {
        let toml = r#"
[broker]
uri = "mqtt://bell:pw@broker.lan:1884"
client_id = "frontdoor"
topic = "home/frontdoor"
qos = 0
keep_alive_secs = 10
connect_timeout_ms = 500
connect_attempts = 3

[sound]
path = "/srv/chimes"
trigger = "press"
activate_payload = "pressed"
queue_capacity = 4

[pipeline]
converter = "/usr/local/bin/ffmpeg"
player = "pw-play"
normalize = false

[telemetry]
log_level = "debug"
"#;
        let mut config = DoorbellConfig::default();
        apply_toml(&mut config, toml, Path::new("test.toml")).unwrap();

        assert_eq!(config.broker.uri, "mqtt://bell:pw@broker.lan:1884");
        assert_eq!(config.broker.client_id, "frontdoor");
        assert_eq!(config.broker.qos, 0);
        assert_eq!(config.broker.keep_alive_secs, 10);
        assert_eq!(config.broker.connect_timeout_ms, 500);
        assert_eq!(config.broker.connect_attempts, 3);
        assert_eq!(config.sound.path, PathBuf::from("/srv/chimes"));
        assert_eq!(config.sound.trigger, TriggerKind::Press);
        assert_eq!(config.sound.activate_payload, "pressed");
        assert_eq!(config.sound.queue_capacity, 4);
        assert_eq!(config.pipeline.converter, "/usr/local/bin/ffmpeg");
        assert_eq!(config.pipeline.player, "pw-play");
        assert!(!config.pipeline.normalize);
        assert_eq!(config.telemetry.log_level, "debug");
    }

    #[test]
    fn test_parse_rejects_bad_trigger() {
        let toml = r#"
[sound]
trigger = "toggle"
"#;
        let mut config = DoorbellConfig::default();
        let err = apply_toml(&mut config, toml, Path::new("bad.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[test]
    fn test_later_files_layer_over_earlier() {
        let dir = tempfile::tempdir().unwrap();
        let system = dir.path().join("system.toml");
        let user = dir.path().join("user.toml");
        std::fs::File::create(&system)
            .unwrap()
            .write_all(b"[broker]\nuri = \"mqtt://system:1883\"\ntopic = \"system\"\n")
            .unwrap();
        std::fs::File::create(&user)
            .unwrap()
            .write_all(b"[broker]\ntopic = \"user\"\n")
            .unwrap();

        let mut config = DoorbellConfig::default();
        apply_file(&mut config, &system).unwrap();
        apply_file(&mut config, &user).unwrap();

        assert_eq!(config.broker.uri, "mqtt://system:1883");
        assert_eq!(config.broker.topic, "user");
    }

    #[test]
    fn test_env_overrides() {
        let vars: HashMap<&str, &str> = [
            ("DOORBELL_TOPIC", "env/topic"),
            ("DOORBELL_TRIGGER", "press"),
            ("DOORBELL_SOUND_PATH", "/env/sounds"),
            ("RUST_LOG", "doorbell=trace"),
        ]
        .into_iter()
        .collect();

        let mut config = DoorbellConfig::default();
        let mut sources = ConfigSources::default();
        apply_overrides_from(&mut config, &mut sources, |k| {
            vars.get(k).map(|v| v.to_string())
        });

        assert_eq!(config.broker.topic, "env/topic");
        assert_eq!(config.sound.trigger, TriggerKind::Press);
        assert_eq!(config.sound.path, PathBuf::from("/env/sounds"));
        assert_eq!(config.telemetry.log_level, "doorbell=trace");
        assert_eq!(sources.env_overrides.len(), 4);
    }

    #[test]
    fn test_unknown_env_trigger_is_not_recorded() {
        let vars: HashMap<&str, &str> = [("DOORBELL_TRIGGER", "toggle"), ("DOORBELL_TOPIC", "t")]
            .into_iter()
            .collect();

        let mut config = DoorbellConfig::default();
        let mut sources = ConfigSources::default();
        apply_overrides_from(&mut config, &mut sources, |k| {
            vars.get(k).map(|v| v.to_string())
        });

        assert_eq!(config.sound.trigger, TriggerKind::State);
        assert_eq!(sources.env_overrides, vec!["DOORBELL_TOPIC".to_string()]);
    }
}
