//! Validation rules applied before a capability handler runs.
//!
//! Two layers, both pure: a schema check that every declared required
//! parameter is present and type-correct, and capability-specific rules
//! composed by short-circuiting conjunction. Failure messages always name
//! the offending value verbatim so the caller can see exactly what was
//! rejected.

use std::collections::BTreeSet;

use serde_json::Value;

use crate::capability::{Arguments, ParamSpec};
use crate::error::ServerError;

// ---------------------------------------------------------------------------
// Schema check
// ---------------------------------------------------------------------------

/// Check arguments against a declared parameter schema.
///
/// Required parameters must be present; present parameters must inhabit
/// their declared type. Undeclared extra arguments are rejected — a typo'd
/// parameter name should fail loudly rather than be ignored.
pub fn check_arguments(params: &[ParamSpec], args: &Arguments) -> Result<(), ServerError> {
    for param in params {
        match args.get(&param.name) {
            None if param.required => {
                return Err(ServerError::validation(format!(
                    "missing required parameter '{}'",
                    param.name
                )));
            }
            Some(value) if !param.ty.matches(value) => {
                return Err(ServerError::validation(format!(
                    "parameter '{}' must be a {}, got: {}",
                    param.name,
                    param.ty.name(),
                    value
                )));
            }
            _ => {}
        }
    }
    for name in args.keys() {
        if !params.iter().any(|p| &p.name == name) {
            return Err(ServerError::validation(format!(
                "unknown parameter '{}'",
                name
            )));
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// ValidationRule
// ---------------------------------------------------------------------------

/// A pure predicate over a proposed invocation's arguments.
pub trait ValidationRule: Send + Sync {
    fn check(&self, args: &Arguments) -> Result<(), ServerError>;
}

/// Rules composed by short-circuiting conjunction; the first failing rule
/// wins.
#[derive(Default)]
pub struct RuleSet {
    rules: Vec<Box<dyn ValidationRule>>,
}

impl RuleSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_rule(mut self, rule: impl ValidationRule + 'static) -> Self {
        self.rules.push(Box::new(rule));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

impl ValidationRule for RuleSet {
    fn check(&self, args: &Arguments) -> Result<(), ServerError> {
        for rule in &self.rules {
            rule.check(args)?;
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// AllowedPrefixRule
// ---------------------------------------------------------------------------

/// Restrict a string-list argument to operations whose first element starts
/// with an allow-listed prefix.
///
/// This is how read-only tools stay read-only: `pacman_query` accepts
/// `["-Qi", "git"]` but rejects `["-S", "git"]` before anything is spawned.
#[derive(Debug, Clone)]
pub struct AllowedPrefixRule {
    /// Name of the string-list parameter this rule inspects.
    param: String,
    /// Allowed prefixes, ordered for deterministic diagnostics.
    prefixes: BTreeSet<String>,
}

impl AllowedPrefixRule {
    pub fn new(param: impl Into<String>, prefixes: impl IntoIterator<Item = String>) -> Self {
        Self {
            param: param.into(),
            prefixes: prefixes.into_iter().collect(),
        }
    }
}

impl ValidationRule for AllowedPrefixRule {
    fn check(&self, args: &Arguments) -> Result<(), ServerError> {
        let list = args
            .get(&self.param)
            .and_then(Value::as_array)
            .map(|items| {
                items
                    .iter()
                    .filter_map(Value::as_str)
                    .collect::<Vec<&str>>()
            })
            .unwrap_or_default();

        let first = match list.first() {
            Some(first) => *first,
            None => return Err(ServerError::validation("no arguments provided")),
        };

        if self.prefixes.iter().any(|p| first.starts_with(p.as_str())) {
            Ok(())
        } else {
            Err(ServerError::validation(format!(
                "disallowed operation: {}",
                first
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capability::ParamType;

    fn string_list_args(name: &str, items: &[&str]) -> Arguments {
        let mut args = Arguments::new();
        args.insert(name.to_string(), serde_json::json!(items));
        args
    }

    fn query_rule() -> AllowedPrefixRule {
        AllowedPrefixRule::new(
            "args",
            ["-Q", "-h", "--help", "--query"].map(String::from),
        )
    }

    #[test]
    fn test_allowed_prefix_accepts_listed_operations() {
        let rule = query_rule();
        assert!(rule.check(&string_list_args("args", &["-Qi", "git"])).is_ok());
        assert!(rule.check(&string_list_args("args", &["--query"])).is_ok());
    }

    #[test]
    fn test_allowed_prefix_names_offending_value() {
        let rule = query_rule();
        let err = rule
            .check(&string_list_args("args", &["-S", "git"]))
            .unwrap_err();
        assert_eq!(err.to_string(), "disallowed operation: -S");
        assert_eq!(err.kind(), "validation");
    }

    #[test]
    fn test_allowed_prefix_rejects_empty_list() {
        let rule = query_rule();
        let err = rule.check(&string_list_args("args", &[])).unwrap_err();
        assert_eq!(err.to_string(), "no arguments provided");
    }

    #[test]
    fn test_allowed_prefix_rejects_missing_param() {
        let rule = query_rule();
        let err = rule.check(&Arguments::new()).unwrap_err();
        assert_eq!(err.to_string(), "no arguments provided");
    }

    #[test]
    fn test_rule_set_short_circuits_on_first_failure() {
        struct AlwaysFail(&'static str);
        impl ValidationRule for AlwaysFail {
            fn check(&self, _args: &Arguments) -> Result<(), ServerError> {
                Err(ServerError::validation(self.0))
            }
        }

        let rules = RuleSet::new()
            .with_rule(AlwaysFail("first"))
            .with_rule(AlwaysFail("second"));
        let err = rules.check(&Arguments::new()).unwrap_err();
        assert_eq!(err.to_string(), "first");
    }

    #[test]
    fn test_check_arguments_missing_required() {
        let params = vec![ParamSpec::required("symptom", ParamType::String)];
        let err = check_arguments(&params, &Arguments::new()).unwrap_err();
        assert_eq!(err.to_string(), "missing required parameter 'symptom'");
    }

    #[test]
    fn test_check_arguments_wrong_type_names_value() {
        let params = vec![ParamSpec::required("args", ParamType::StringList)];
        let mut args = Arguments::new();
        args.insert("args".into(), serde_json::json!("-Qi git"));
        let err = check_arguments(&params, &args).unwrap_err();
        assert!(err.to_string().contains("list of strings"));
        assert!(err.to_string().contains("-Qi git"));
    }

    #[test]
    fn test_check_arguments_rejects_unknown_parameter() {
        let params = vec![ParamSpec::required("name", ParamType::String)];
        let mut args = Arguments::new();
        args.insert("name".into(), serde_json::json!("Ada"));
        args.insert("nmae".into(), serde_json::json!("typo"));
        let err = check_arguments(&params, &args).unwrap_err();
        assert_eq!(err.to_string(), "unknown parameter 'nmae'");
    }

    #[test]
    fn test_check_arguments_optional_may_be_absent() {
        let params = vec![ParamSpec::optional("verbose", ParamType::Boolean)];
        assert!(check_arguments(&params, &Arguments::new()).is_ok());
    }
}
