//! Built-in capability set: the tools, resources, and prompts this server
//! ships with.
//!
//! Everything here goes through the execution guard or plain file reads;
//! nothing holds mutable state, so the whole set is safe to share across
//! sessions once registered.

pub mod pacman;
pub mod prompts;
pub mod resources;

use std::time::Duration;

use crate::config::ServerConfig;
use crate::error::ServerError;
use crate::exec::CommandRunner;
use crate::registry::{CapabilityRegistry, RegistryBuilder};

/// Register the full built-in capability set.
pub fn register_all(builder: &mut RegistryBuilder, config: &ServerConfig) -> Result<(), ServerError> {
    let runner = CommandRunner::new().with_timeout(Duration::from_secs(config.exec_timeout_secs));
    pacman::register(builder, &config.pacman, &runner)?;
    resources::register(builder, &config.probes, &runner)?;
    prompts::register(builder, &config.probes, &runner)?;
    Ok(())
}

/// Build a frozen registry holding the built-in capability set.
pub fn build_registry(config: &ServerConfig) -> Result<CapabilityRegistry, ServerError> {
    let mut builder = RegistryBuilder::new();
    register_all(&mut builder, config)?;
    Ok(builder.build())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capability::CapabilityKind;

    #[test]
    fn test_build_registry_registers_all_kinds() {
        let registry = build_registry(&ServerConfig::default()).unwrap();

        let tools: Vec<&str> = registry
            .list(CapabilityKind::Tool)
            .map(|d| d.name.as_str())
            .collect();
        assert_eq!(tools, vec!["pacman_query", "greet", "add"]);

        let resources: Vec<&str> = registry
            .list(CapabilityKind::Resource)
            .map(|d| d.name.as_str())
            .collect();
        assert_eq!(
            resources,
            vec!["os-release", "meminfo", "pacman-log", "journal"]
        );

        let prompts: Vec<&str> = registry
            .list(CapabilityKind::Prompt)
            .map(|d| d.name.as_str())
            .collect();
        assert_eq!(prompts, vec!["system_health", "disk_audit", "troubleshoot"]);
    }
}
