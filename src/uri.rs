//! Resource URI templates and resolution.
//!
//! Resources declare URIs of the shape `scheme://seg/{param}/seg`. A static
//! pattern matches only its exact string; a templated pattern matches when
//! every literal segment matches exactly and each `{param}` placeholder
//! captures one non-empty path segment (no `/`). When several patterns
//! match one URI, the longest literal prefix wins, so an exact static URI
//! always beats a same-shaped template.
//!
//! Patterns are parsed once at registration; malformed templates are a
//! startup failure, never a request-time one.

use std::collections::HashMap;

use crate::error::ServerError;

// ---------------------------------------------------------------------------
// ResourcePattern
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Param(String),
}

/// A parsed resource URI template.
#[derive(Debug, Clone)]
pub struct ResourcePattern {
    template: String,
    scheme: String,
    segments: Vec<Segment>,
}

impl ResourcePattern {
    /// Parse a URI template.
    ///
    /// # Errors
    ///
    /// `InvalidPattern` when the scheme separator is missing, a placeholder
    /// is unbalanced or empty, braces appear mid-segment, or two
    /// placeholders share a name.
    pub fn parse(template: &str) -> Result<Self, ServerError> {
        let invalid = |reason: &str| ServerError::InvalidPattern {
            pattern: template.to_string(),
            reason: reason.to_string(),
        };

        let (scheme, path) = template
            .split_once("://")
            .ok_or_else(|| invalid("missing '://' scheme separator"))?;
        if scheme.is_empty() {
            return Err(invalid("empty scheme"));
        }
        if path.is_empty() {
            return Err(invalid("empty path"));
        }

        let mut segments = Vec::new();
        let mut seen_params: Vec<&str> = Vec::new();
        for raw in path.split('/') {
            if let Some(inner) = raw.strip_prefix('{') {
                let name = inner
                    .strip_suffix('}')
                    .ok_or_else(|| invalid("unbalanced braces in placeholder"))?;
                if name.is_empty() {
                    return Err(invalid("empty placeholder name"));
                }
                if name.contains('{') || name.contains('}') {
                    return Err(invalid("nested braces in placeholder"));
                }
                if seen_params.contains(&name) {
                    return Err(invalid("duplicate placeholder name"));
                }
                seen_params.push(name);
                segments.push(Segment::Param(name.to_string()));
            } else {
                if raw.contains('{') || raw.contains('}') {
                    return Err(invalid("braces outside a full-segment placeholder"));
                }
                segments.push(Segment::Literal(raw.to_string()));
            }
        }

        Ok(Self {
            template: template.to_string(),
            scheme: scheme.to_string(),
            segments,
        })
    }

    /// The original template string.
    pub fn template(&self) -> &str {
        &self.template
    }

    /// Placeholder names, in template order.
    pub fn param_names(&self) -> Vec<&str> {
        self.segments
            .iter()
            .filter_map(|s| match s {
                Segment::Param(name) => Some(name.as_str()),
                Segment::Literal(_) => None,
            })
            .collect()
    }

    /// Whether the pattern has no placeholders.
    pub fn is_static(&self) -> bool {
        self.segments
            .iter()
            .all(|s| matches!(s, Segment::Literal(_)))
    }

    /// Number of leading literal segments (scheme included), used as the
    /// tie-break weight between overlapping patterns.
    fn literal_prefix_len(&self) -> usize {
        1 + self
            .segments
            .iter()
            .take_while(|s| matches!(s, Segment::Literal(_)))
            .count()
    }

    /// Match a request URI against this pattern, extracting placeholder
    /// bindings on success.
    pub fn match_uri(&self, uri: &str) -> Option<HashMap<String, String>> {
        let (scheme, path) = uri.split_once("://")?;
        if scheme != self.scheme {
            return None;
        }
        let parts: Vec<&str> = path.split('/').collect();
        if parts.len() != self.segments.len() {
            return None;
        }

        let mut extracted = HashMap::new();
        for (segment, part) in self.segments.iter().zip(&parts) {
            match segment {
                Segment::Literal(literal) => {
                    if literal != part {
                        return None;
                    }
                }
                Segment::Param(name) => {
                    if part.is_empty() {
                        return None;
                    }
                    extracted.insert(name.clone(), part.to_string());
                }
            }
        }
        Some(extracted)
    }
}

// ---------------------------------------------------------------------------
// UriResolver
// ---------------------------------------------------------------------------

/// Resolves request URIs against the registered resource patterns.
///
/// Built once alongside the registry; read-only afterwards.
#[derive(Debug, Default)]
pub struct UriResolver {
    /// `(pattern, resource name)` in registration order.
    patterns: Vec<(ResourcePattern, String)>,
}

/// A successful resolution: the owning resource's name plus any extracted
/// placeholder bindings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedUri {
    pub resource: String,
    pub params: HashMap<String, String>,
}

impl UriResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a pattern owned by the named resource.
    pub fn register(&mut self, pattern: ResourcePattern, resource: impl Into<String>) {
        self.patterns.push((pattern, resource.into()));
    }

    /// Resolve a request URI.
    ///
    /// Scans all patterns; among matches the longest literal prefix wins,
    /// with registration order breaking exact ties, so resolution is
    /// deterministic.
    ///
    /// # Errors
    ///
    /// `NotFound` when no pattern matches.
    pub fn resolve(&self, uri: &str) -> Result<ResolvedUri, ServerError> {
        let mut best: Option<(usize, ResolvedUri)> = None;
        for (pattern, resource) in &self.patterns {
            if let Some(params) = pattern.match_uri(uri) {
                let weight = pattern.literal_prefix_len();
                let better = match &best {
                    Some((best_weight, _)) => weight > *best_weight,
                    None => true,
                };
                if better {
                    best = Some((
                        weight,
                        ResolvedUri {
                            resource: resource.clone(),
                            params,
                        },
                    ));
                }
            }
        }
        best.map(|(_, resolved)| resolved)
            .ok_or_else(|| ServerError::not_found(uri))
    }
}
