//! Package-manager query tool, plus two tiny smoke tools.
//!
//! `pacman_query` is the server's canonical guarded tool: it forwards an
//! argument list to the configured package-manager command, restricted by
//! an allow-list to read-only query operations. The allow-list runs in the
//! dispatcher's validating stage, so nothing is ever spawned for a
//! disallowed operation.

use std::sync::Arc;

use serde_json::Value;

use crate::capability::{
    Arguments, CapabilityDescriptor, CapabilityOutput, FnHandler, ParamSpec, ParamType,
};
use crate::config::PacmanConfig;
use crate::error::ServerError;
use crate::exec::CommandRunner;
use crate::registry::RegistryBuilder;
use crate::validate::{AllowedPrefixRule, RuleSet};

/// Register `pacman_query`, `greet`, and `add`.
pub fn register(
    builder: &mut RegistryBuilder,
    config: &PacmanConfig,
    runner: &CommandRunner,
) -> Result<(), ServerError> {
    builder.register(query_descriptor(config, runner))?;
    builder.register(greet_descriptor())?;
    builder.register(add_descriptor())?;
    Ok(())
}

fn query_descriptor(config: &PacmanConfig, runner: &CommandRunner) -> CapabilityDescriptor {
    let command = config.command.clone();
    let policy = config.exit_policy;
    let runner = runner.clone();

    CapabilityDescriptor::tool(
        "pacman_query",
        "Run a read-only package query and return the output. Only query \
         operations are permitted — no installs, removals, or syncs. \
         Common usage: [\"-Q\"] lists installed packages, [\"-Qs\", \"<term>\"] \
         searches them, [\"-Qi\", \"<package>\"] shows details, [\"-Ql\", \
         \"<package>\"] lists owned files, [\"-Qo\", \"<path>\"] finds the \
         owning package, [\"-Qdt\"] lists orphans.",
        vec![ParamSpec::required("args", ParamType::StringList)
            .with_description("pacman arguments as a list, e.g. [\"-Qi\", \"git\"]")],
        Arc::new(FnHandler::new(Arc::new(move |args: Arguments| {
            let command = command.clone();
            let runner = runner.clone();
            Box::pin(async move {
                let list = string_list(&args, "args");
                let output = runner.run(&command, &list).await?;
                output.into_payload(policy).map(CapabilityOutput::Text)
            })
        }))),
    )
    .with_rules(RuleSet::new().with_rule(AllowedPrefixRule::new(
        "args",
        config.allowed_prefixes.iter().cloned(),
    )))
}

fn greet_descriptor() -> CapabilityDescriptor {
    CapabilityDescriptor::tool(
        "greet",
        "Greet a person by name. Returns a friendly greeting message.",
        vec![ParamSpec::required("name", ParamType::String)],
        Arc::new(FnHandler::new(Arc::new(|args: Arguments| {
            Box::pin(async move {
                let name = args
                    .get("name")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string();
                Ok(CapabilityOutput::Text(format!(
                    "Hello, {}! This response came from a local process on your machine.",
                    name
                )))
            })
        }))),
    )
}

fn add_descriptor() -> CapabilityDescriptor {
    CapabilityDescriptor::tool(
        "add",
        "Add two numbers together and return the result.",
        vec![
            ParamSpec::required("a", ParamType::Number),
            ParamSpec::required("b", ParamType::Number),
        ],
        Arc::new(FnHandler::new(Arc::new(|args: Arguments| {
            Box::pin(async move {
                let a = args.get("a").and_then(Value::as_f64).unwrap_or_default();
                let b = args.get("b").and_then(Value::as_f64).unwrap_or_default();
                let sum = a + b;
                // Render integers without a trailing ".0".
                let text = if sum.fract() == 0.0 && sum.abs() < 1e15 {
                    format!("{}", sum as i64)
                } else {
                    format!("{}", sum)
                };
                Ok(CapabilityOutput::Text(text))
            })
        }))),
    )
}

fn string_list(args: &Arguments, name: &str) -> Vec<String> {
    args.get(name)
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(Value::as_str)
                .map(String::from)
                .collect()
        })
        .unwrap_or_default()
}
