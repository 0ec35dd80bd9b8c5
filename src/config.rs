//! Server configuration.
//!
//! Configuration is layered: compiled-in defaults, then an optional YAML
//! file, then environment overrides (`SYSMCP_TRANSPORT`, `SYSMCP_HOST`,
//! `PORT`). Allow-lists and probe paths live here so deployments can
//! tighten or relax them without a rebuild.

use std::path::Path;

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

use crate::exec::{ExitPolicy, DEFAULT_EXEC_TIMEOUT_SECS};
use crate::transport::TransportKind;

/// Prefixes that keep the package-query tool read-only.
static DEFAULT_ALLOWED_PREFIXES: Lazy<Vec<String>> = Lazy::new(|| {
    ["-Q", "-h", "--help", "--query"]
        .into_iter()
        .map(String::from)
        .collect()
});

// ---------------------------------------------------------------------------
// Sections
// ---------------------------------------------------------------------------

/// Settings for the `pacman_query` tool.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PacmanConfig {
    /// Command invoked by the tool. Overridable for testing.
    #[serde(default = "default_pacman_command")]
    pub command: String,
    /// Allow-listed first-argument prefixes.
    #[serde(default = "default_allowed_prefixes")]
    pub allowed_prefixes: Vec<String>,
    /// How a non-zero exit is interpreted. Lenient by default: pacman
    /// signals "no results" through the exit code with empty stderr.
    #[serde(default = "default_pacman_exit_policy")]
    pub exit_policy: ExitPolicy,
}

impl Default for PacmanConfig {
    fn default() -> Self {
        Self {
            command: default_pacman_command(),
            allowed_prefixes: default_allowed_prefixes(),
            exit_policy: default_pacman_exit_policy(),
        }
    }
}

/// Settings for the built-in system resources and prompts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProbeConfig {
    #[serde(default = "default_os_release_path")]
    pub os_release_path: String,
    #[serde(default = "default_meminfo_path")]
    pub meminfo_path: String,
    #[serde(default = "default_pacman_log_path")]
    pub pacman_log_path: String,
    /// Tail length for the pacman log resource.
    #[serde(default = "default_pacman_log_lines")]
    pub pacman_log_lines: usize,
    /// Command used for journal reads.
    #[serde(default = "default_journal_command")]
    pub journal_command: String,
    /// Tail length for the journal resource.
    #[serde(default = "default_journal_lines")]
    pub journal_lines: usize,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            os_release_path: default_os_release_path(),
            meminfo_path: default_meminfo_path(),
            pacman_log_path: default_pacman_log_path(),
            pacman_log_lines: default_pacman_log_lines(),
            journal_command: default_journal_command(),
            journal_lines: default_journal_lines(),
        }
    }
}

// ---------------------------------------------------------------------------
// ServerConfig
// ---------------------------------------------------------------------------

/// Top-level server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Server name reported during the handshake.
    #[serde(default = "default_name")]
    pub name: String,
    /// Transport binding to start.
    #[serde(default = "default_transport")]
    pub transport: TransportKind,
    /// Bind host for the SSE transport.
    #[serde(default = "default_host")]
    pub host: String,
    /// Bind port for the SSE transport.
    #[serde(default = "default_port")]
    pub port: u16,
    /// Bounded wait for guarded commands, in seconds.
    #[serde(default = "default_exec_timeout_secs")]
    pub exec_timeout_secs: u64,
    #[serde(default)]
    pub pacman: PacmanConfig,
    #[serde(default)]
    pub probes: ProbeConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            name: default_name(),
            transport: default_transport(),
            host: default_host(),
            port: default_port(),
            exec_timeout_secs: default_exec_timeout_secs(),
            pacman: PacmanConfig::default(),
            probes: ProbeConfig::default(),
        }
    }
}

impl ServerConfig {
    /// Load configuration from a YAML file, then apply env overrides.
    pub fn load(path: Option<&Path>) -> Result<Self, anyhow::Error> {
        let mut config = match path {
            Some(path) => {
                let text = std::fs::read_to_string(path)?;
                serde_yaml::from_str(&text)?
            }
            None => Self::default(),
        };
        config.apply_env_from(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Apply environment overrides through an injectable lookup.
    pub fn apply_env_from(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(value) = lookup("SYSMCP_TRANSPORT") {
            if let Some(kind) = TransportKind::from_str_opt(&value) {
                self.transport = kind;
            } else {
                log::warn!("ignoring unrecognized SYSMCP_TRANSPORT: {}", value);
            }
        }
        if let Some(value) = lookup("SYSMCP_HOST") {
            self.host = value;
        }
        if let Some(value) = lookup("PORT") {
            match value.parse() {
                Ok(port) => self.port = port,
                Err(_) => log::warn!("ignoring unparseable PORT: {}", value),
            }
        }
    }

    /// Bind address for the SSE transport.
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

// ---------------------------------------------------------------------------
// Defaults
// ---------------------------------------------------------------------------

fn default_name() -> String {
    "sysmcp".to_string()
}

fn default_transport() -> TransportKind {
    TransportKind::Stdio
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8000
}

fn default_exec_timeout_secs() -> u64 {
    DEFAULT_EXEC_TIMEOUT_SECS
}

fn default_pacman_command() -> String {
    "pacman".to_string()
}

fn default_allowed_prefixes() -> Vec<String> {
    DEFAULT_ALLOWED_PREFIXES.clone()
}

fn default_pacman_exit_policy() -> ExitPolicy {
    ExitPolicy::LenientOnEmptyStderr
}

fn default_os_release_path() -> String {
    "/etc/os-release".to_string()
}

fn default_meminfo_path() -> String {
    "/proc/meminfo".to_string()
}

fn default_pacman_log_path() -> String {
    "/var/log/pacman.log".to_string()
}

fn default_pacman_log_lines() -> usize {
    100
}

fn default_journal_command() -> String {
    "journalctl".to_string()
}

fn default_journal_lines() -> usize {
    50
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn test_defaults() {
        let config = ServerConfig::default();
        assert_eq!(config.name, "sysmcp");
        assert_eq!(config.transport, TransportKind::Stdio);
        assert_eq!(config.bind_addr(), "127.0.0.1:8000");
        assert_eq!(config.pacman.command, "pacman");
        assert!(config
            .pacman
            .allowed_prefixes
            .contains(&"-Q".to_string()));
        assert_eq!(config.probes.journal_lines, 50);
    }

    #[test]
    fn test_partial_yaml_fills_defaults() {
        let config: ServerConfig = serde_yaml::from_str(
            "transport: sse\nport: 9000\npacman:\n  command: fakepac\n",
        )
        .unwrap();
        assert_eq!(config.transport, TransportKind::Sse);
        assert_eq!(config.port, 9000);
        assert_eq!(config.pacman.command, "fakepac");
        // Untouched sections keep their defaults.
        assert_eq!(config.host, "127.0.0.1");
        assert_eq!(config.probes.pacman_log_lines, 100);
        assert_eq!(config.pacman.exit_policy, ExitPolicy::LenientOnEmptyStderr);
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "name: custom\nhost: 0.0.0.0").unwrap();
        let config = ServerConfig::load(Some(file.path())).unwrap();
        assert_eq!(config.name, "custom");
        assert_eq!(config.host, "0.0.0.0");
    }

    #[test]
    fn test_env_overrides() {
        let mut config = ServerConfig::default();
        config.apply_env_from(|key| match key {
            "SYSMCP_TRANSPORT" => Some("sse".to_string()),
            "PORT" => Some("9100".to_string()),
            _ => None,
        });
        assert_eq!(config.transport, TransportKind::Sse);
        assert_eq!(config.port, 9100);
    }

    #[test]
    fn test_bad_env_values_are_ignored() {
        let mut config = ServerConfig::default();
        config.apply_env_from(|key| match key {
            "SYSMCP_TRANSPORT" => Some("carrier-pigeon".to_string()),
            "PORT" => Some("not-a-port".to_string()),
            _ => None,
        });
        assert_eq!(config.transport, TransportKind::Stdio);
        assert_eq!(config.port, 8000);
    }

    #[test]
    fn test_exit_policy_round_trips_through_yaml() {
        let yaml = "pacman:\n  exit_policy: strict\n";
        let config: ServerConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.pacman.exit_policy, ExitPolicy::Strict);
    }
}
