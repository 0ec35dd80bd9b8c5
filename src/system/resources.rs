//! Built-in system resources — read-only data sources addressed by URI.
//!
//! Three static resources read local files; the templated
//! `system://journal/{service}` resource probes the journal through the
//! execution guard with the strict exit policy, so a failed probe surfaces
//! its stderr instead of an empty payload.

use std::sync::Arc;

use serde_json::Value;

use crate::capability::{Arguments, CapabilityDescriptor, CapabilityOutput, FnHandler};
use crate::config::ProbeConfig;
use crate::error::ServerError;
use crate::exec::{CommandRunner, ExitPolicy};
use crate::registry::RegistryBuilder;

/// Register the built-in resources.
pub fn register(
    builder: &mut RegistryBuilder,
    probes: &ProbeConfig,
    runner: &CommandRunner,
) -> Result<(), ServerError> {
    builder.register(file_resource(
        "os-release",
        "system://os-release",
        "Current OS identity — contents of /etc/os-release.",
        probes.os_release_path.clone(),
        None,
    ))?;
    builder.register(file_resource(
        "meminfo",
        "system://meminfo",
        "Current memory usage — contents of /proc/meminfo.",
        probes.meminfo_path.clone(),
        None,
    ))?;
    builder.register(file_resource(
        "pacman-log",
        "system://pacman-log",
        "Tail of the package manager log.",
        probes.pacman_log_path.clone(),
        Some(probes.pacman_log_lines),
    ))?;
    builder.register(journal_resource(probes, runner))?;
    Ok(())
}

/// A static resource backed by a local file, optionally tailed.
fn file_resource(
    name: &str,
    uri: &str,
    description: &str,
    path: String,
    tail: Option<usize>,
) -> CapabilityDescriptor {
    CapabilityDescriptor::resource(
        name,
        uri,
        description,
        Arc::new(FnHandler::new(Arc::new(move |_args: Arguments| {
            let path = path.clone();
            Box::pin(async move {
                let text = tokio::fs::read_to_string(&path).await.map_err(|e| {
                    ServerError::Execution {
                        stderr: format!("could not read {}: {}", path, e),
                    }
                })?;
                let text = match tail {
                    Some(lines) => tail_lines(&text, lines),
                    None => text,
                };
                Ok(CapabilityOutput::Text(text))
            })
        }))),
    )
}

/// The templated journal resource: last N lines for a systemd unit.
fn journal_resource(probes: &ProbeConfig, runner: &CommandRunner) -> CapabilityDescriptor {
    let command = probes.journal_command.clone();
    let lines = probes.journal_lines;
    let runner = runner.clone();

    CapabilityDescriptor::resource(
        "journal",
        "system://journal/{service}",
        "Recent log lines for a systemd service, e.g. system://journal/sshd.",
        Arc::new(FnHandler::new(Arc::new(move |args: Arguments| {
            let command = command.clone();
            let runner = runner.clone();
            Box::pin(async move {
                let service = args
                    .get("service")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string();
                let probe_args = vec![
                    "-u".to_string(),
                    service,
                    "-n".to_string(),
                    lines.to_string(),
                    "--no-pager".to_string(),
                ];
                let output = runner.run(&command, &probe_args).await?;
                output
                    .into_payload(ExitPolicy::Strict)
                    .map(CapabilityOutput::Text)
            })
        }))),
    )
}

/// Last `n` lines of `text`, joined with newlines.
pub(crate) fn tail_lines(text: &str, n: usize) -> String {
    let lines: Vec<&str> = text.lines().collect();
    let start = lines.len().saturating_sub(n);
    lines[start..].join("\n")
}
