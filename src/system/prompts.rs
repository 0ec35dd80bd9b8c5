//! Built-in prompts — reusable conversation starters pre-loaded with live
//! system context.
//!
//! Each prompt gathers its probes at call time, so the conversation always
//! opens with current data; nothing is cached between calls. A probe that
//! fails degrades to a placeholder rather than failing the whole prompt.
//! Probing and rendering are split so the message assembly is testable
//! without a live system.

use std::sync::Arc;

use serde_json::Value;

use crate::capability::{
    Arguments, CapabilityDescriptor, CapabilityOutput, FnHandler, Message, ParamSpec, ParamType,
};
use crate::config::ProbeConfig;
use crate::error::ServerError;
use crate::exec::CommandRunner;
use crate::registry::RegistryBuilder;

const UNAVAILABLE: &str = "(unavailable)";

/// `df` columns shared by the health and disk prompts.
const DF_ARGS: &[&str] = &[
    "-h",
    "--output=source,size,used,avail,pcent,target",
    "-x",
    "tmpfs",
    "-x",
    "devtmpfs",
];

/// Register the built-in prompts.
pub fn register(
    builder: &mut RegistryBuilder,
    probes: &ProbeConfig,
    runner: &CommandRunner,
) -> Result<(), ServerError> {
    builder.register(system_health_descriptor(runner))?;
    builder.register(disk_audit_descriptor(probes, runner))?;
    builder.register(troubleshoot_descriptor(probes, runner))?;
    Ok(())
}

fn args(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| s.to_string()).collect()
}

// ---------------------------------------------------------------------------
// system_health
// ---------------------------------------------------------------------------

fn system_health_descriptor(runner: &CommandRunner) -> CapabilityDescriptor {
    let runner = runner.clone();
    CapabilityDescriptor::prompt(
        "system_health",
        "Snapshot current system health — uptime, load, memory, disk, and \
         failed services — and ask for anything concerning to be flagged.",
        vec![],
        Arc::new(FnHandler::new(Arc::new(move |_args: Arguments| {
            let runner = runner.clone();
            Box::pin(async move {
                let uptime_args = args(&["-p"]);
                let load_args = args(&["/proc/loadavg"]);
                let memory_args = args(&["-h"]);
                let disk_args = args(DF_ARGS);
                let failed_args = args(&["--failed", "--no-pager"]);
                let (uptime, load, memory, disk, failed) = tokio::join!(
                    runner.run_or("uptime", &uptime_args, UNAVAILABLE),
                    runner.run_or("cat", &load_args, UNAVAILABLE),
                    runner.run_or("free", &memory_args, UNAVAILABLE),
                    runner.run_or("df", &disk_args, UNAVAILABLE),
                    runner.run_or("systemctl", &failed_args, "None"),
                );
                Ok(CapabilityOutput::Messages(render_system_health(
                    &uptime, &load, &memory, &disk, &failed,
                )))
            })
        }))),
    )
}

fn render_system_health(
    uptime: &str,
    load: &str,
    memory: &str,
    disk: &str,
    failed: &str,
) -> Vec<Message> {
    let context = format!(
        "Here is the current state of my Linux system:\n\n\
         ## Uptime\n{uptime}\n\n\
         ## Load Average (1m 5m 15m / running/total / last-pid)\n{load}\n\n\
         ## Memory\n{memory}\n\n\
         ## Disk\n{disk}\n\n\
         ## Failed systemd Services\n{failed}\n"
    );
    vec![
        Message::user(context),
        Message::assistant("I have your system snapshot. Let me analyse it."),
        Message::user("What looks concerning? Flag anything that needs attention, ordered by severity."),
    ]
}

// ---------------------------------------------------------------------------
// disk_audit
// ---------------------------------------------------------------------------

fn disk_audit_descriptor(probes: &ProbeConfig, runner: &CommandRunner) -> CapabilityDescriptor {
    let runner = runner.clone();
    let journal_command = probes.journal_command.clone();
    CapabilityDescriptor::prompt(
        "disk_audit",
        "Audit disk usage — filesystems, home directory, package cache, and \
         journal size. Use when disk is filling up.",
        vec![],
        Arc::new(FnHandler::new(Arc::new(move |_args: Arguments| {
            let runner = runner.clone();
            let journal_command = journal_command.clone();
            Box::pin(async move {
                let home = std::env::var("HOME").unwrap_or_else(|_| "/root".to_string());
                let df_args = args(DF_ARGS);
                let home_args = args(&["-sh", &home]);
                let cache_args = args(&["-sh", "/var/cache/pacman/pkg"]);
                let journal_args = args(&["--disk-usage"]);
                let (df, home_usage, cache, journal) = tokio::join!(
                    runner.run_or("df", &df_args, UNAVAILABLE),
                    runner.run_or("du", &home_args, UNAVAILABLE),
                    runner.run_or("du", &cache_args, UNAVAILABLE),
                    runner.run_or(&journal_command, &journal_args, UNAVAILABLE),
                );
                Ok(CapabilityOutput::Messages(render_disk_audit(
                    &df,
                    &home_usage,
                    &cache,
                    &journal,
                )))
            })
        }))),
    )
}

fn render_disk_audit(df: &str, home: &str, cache: &str, journal: &str) -> Vec<Message> {
    let context = format!(
        "I want to audit disk usage on my Linux machine.\n\n\
         ## Filesystem Overview\n{df}\n\n\
         ## Home Directory\n{home}\n\n\
         ## Package Cache\n{cache}\n\n\
         ## systemd Journal Size\n{journal}\n"
    );
    vec![
        Message::user(context),
        Message::assistant("I can see your disk usage breakdown. Let me identify where space is going."),
        Message::user("Where should I clean up first? Give me concrete, safe commands I can run."),
    ]
}

// ---------------------------------------------------------------------------
// troubleshoot
// ---------------------------------------------------------------------------

fn troubleshoot_descriptor(probes: &ProbeConfig, runner: &CommandRunner) -> CapabilityDescriptor {
    let runner = runner.clone();
    let journal_command = probes.journal_command.clone();
    CapabilityDescriptor::prompt(
        "troubleshoot",
        "Structured troubleshooting session. Describe a symptom and get a \
         debug conversation pre-loaded with recent errors, failed services, \
         top processes, and load.",
        vec![ParamSpec::required("symptom", ParamType::String).with_description(
            "What you're experiencing, e.g. \"system feels sluggish\" or \"wifi keeps dropping\"",
        )],
        Arc::new(FnHandler::new(Arc::new(move |prompt_args: Arguments| {
            let runner = runner.clone();
            let journal_command = journal_command.clone();
            Box::pin(async move {
                let symptom = prompt_args
                    .get("symptom")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string();
                let errors_args = args(&["-p", "err..emerg", "-n", "40", "--no-pager"]);
                let failed_args = args(&["--failed", "--no-pager"]);
                let cpu_args = args(&["aux", "--sort=-%cpu"]);
                let mem_args = args(&["aux", "--sort=-%mem"]);
                let memory_args = args(&["-h"]);
                let (errors, failed, cpu_top, mem_top, load, memory) = tokio::join!(
                    runner.run_or(&journal_command, &errors_args, UNAVAILABLE),
                    runner.run_or("systemctl", &failed_args, "None"),
                    runner.run_or("ps", &cpu_args, UNAVAILABLE),
                    runner.run_or("ps", &mem_args, UNAVAILABLE),
                    runner.run_or("uptime", &[], UNAVAILABLE),
                    runner.run_or("free", &memory_args, UNAVAILABLE),
                );
                Ok(CapabilityOutput::Messages(render_troubleshoot(
                    &symptom,
                    &load,
                    &memory,
                    &errors,
                    &failed,
                    // Header line plus the top ten processes.
                    &head_lines(&cpu_top, 11),
                    &head_lines(&mem_top, 11),
                )))
            })
        }))),
    )
}

#[allow(clippy::too_many_arguments)]
fn render_troubleshoot(
    symptom: &str,
    load: &str,
    memory: &str,
    errors: &str,
    failed: &str,
    cpu_top: &str,
    mem_top: &str,
) -> Vec<Message> {
    let context = format!(
        "I'm troubleshooting an issue on my Linux machine.\n\n\
         ## Symptom\n{symptom}\n\n\
         ## System Load\n{load}\n\n\
         ## Memory\n{memory}\n\n\
         ## Recent Errors (journal)\n{errors}\n\n\
         ## Failed systemd Services\n{failed}\n\n\
         ## Top Processes by CPU\n{cpu_top}\n\n\
         ## Top Processes by Memory\n{mem_top}\n"
    );
    vec![
        Message::user(context),
        Message::assistant(
            "I have the system context. Based on the symptom and the data above, \
             let me work through what's likely causing this.",
        ),
        Message::user("What's causing the issue and what should I do to fix it?"),
    ]
}

/// First `n` lines of `text`.
fn head_lines(text: &str, n: usize) -> String {
    text.lines().take(n).collect::<Vec<&str>>().join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capability::Role;
    use crate::dispatch::{Dispatcher, Request, Response};
    use crate::session::Session;
    use crate::transport::TransportKind;

    #[test]
    fn test_render_system_health_structure() {
        let messages = render_system_health("up 2 days", "0.5 0.4 0.3", "mem", "disk", "None");
        assert_eq!(messages.len(), 3);
        assert_eq!(messages[0].role, Role::User);
        assert_eq!(messages[1].role, Role::Assistant);
        assert!(messages[0].content.contains("## Uptime\nup 2 days"));
        assert!(messages[0].content.contains("## Failed systemd Services\nNone"));
    }

    #[test]
    fn test_render_troubleshoot_includes_symptom() {
        let messages =
            render_troubleshoot("wifi drops", "load", "mem", "errs", "None", "cpu", "memtop");
        assert!(messages[0].content.contains("## Symptom\nwifi drops"));
        assert_eq!(messages[2].content, "What's causing the issue and what should I do to fix it?");
    }

    #[test]
    fn test_render_disk_audit_sections() {
        let messages = render_disk_audit("df", "12G /root", "2G cache", "500M journal");
        assert!(messages[0].content.contains("## Home Directory\n12G /root"));
        assert!(messages[0].content.contains("## systemd Journal Size\n500M journal"));
    }

    #[test]
    fn test_head_lines() {
        let text = (1..=20).map(|i| format!("p{}", i)).collect::<Vec<_>>().join("\n");
        let head = head_lines(&text, 11);
        assert_eq!(head.lines().count(), 11);
        assert!(head.ends_with("p11"));
        assert_eq!(head_lines("a\nb", 11), "a\nb");
    }

    #[tokio::test]
    async fn test_prompts_survive_missing_probe_commands() {
        // Probes degrade to placeholders; the prompt itself must succeed
        // even on a host with none of the probe commands installed.
        let mut builder = RegistryBuilder::new();
        register(&mut builder, &ProbeConfig::default(), &CommandRunner::new()).unwrap();
        let dispatcher = Dispatcher::new(Arc::new(builder.build()));

        let response = dispatcher
            .dispatch(
                &Session::new(TransportKind::Stdio),
                Request::get_prompt("system_health", Arguments::new()),
            )
            .await
            .unwrap();
        match response {
            Response::Messages(messages) => {
                assert_eq!(messages.len(), 3);
                assert!(messages[0].content.contains("## Uptime"));
            }
            other => panic!("unexpected response: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_troubleshoot_requires_symptom() {
        let mut builder = RegistryBuilder::new();
        register(&mut builder, &ProbeConfig::default(), &CommandRunner::new()).unwrap();
        let dispatcher = Dispatcher::new(Arc::new(builder.build()));

        let err = dispatcher
            .dispatch(
                &Session::new(TransportKind::Stdio),
                Request::get_prompt("troubleshoot", Arguments::new()),
            )
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "validation");
        assert!(err.to_string().contains("symptom"));
    }
}
