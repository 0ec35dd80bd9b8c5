//! Capability registry — the single, immutable catalog of everything the
//! server exposes.
//!
//! Registration happens only through [`RegistryBuilder`] during startup;
//! [`RegistryBuilder::build`] freezes the result into a
//! [`CapabilityRegistry`] before the first request is dispatched. Because
//! the frozen registry is never mutated, concurrent sessions read it with
//! no locking at all.
//!
//! Listings are stable: capabilities come back in registration order, so
//! repeated list calls are idempotent.

use std::collections::HashMap;

use crate::capability::{CapabilityDescriptor, CapabilityKind, ParamSpec, ParamType};
use crate::error::ServerError;
use crate::uri::{ResolvedUri, ResourcePattern, UriResolver};

// ---------------------------------------------------------------------------
// RegistryBuilder
// ---------------------------------------------------------------------------

/// Mutable registry under construction. Registration-time failures
/// (`DuplicateName`, `InvalidPattern`) indicate a programming error in the
/// capability set and should abort startup.
#[derive(Debug, Default)]
pub struct RegistryBuilder {
    descriptors: Vec<CapabilityDescriptor>,
    index: HashMap<(CapabilityKind, String), usize>,
    resolver: UriResolver,
}

impl RegistryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register one capability.
    ///
    /// For resources, the declared URI is parsed here; placeholders the
    /// descriptor does not already declare as parameters are added as
    /// required strings, keeping placeholder names a subset of the
    /// handler's declared parameters.
    ///
    /// # Errors
    ///
    /// * `DuplicateName` if `(kind, name)` is already registered.
    /// * `InvalidPattern` if a resource URI template is malformed or a
    ///   resource descriptor carries no URI.
    pub fn register(&mut self, mut descriptor: CapabilityDescriptor) -> Result<(), ServerError> {
        let key = (descriptor.kind, descriptor.name.clone());
        if self.index.contains_key(&key) {
            return Err(ServerError::DuplicateName {
                kind: descriptor.kind.to_string(),
                name: descriptor.name,
            });
        }

        if descriptor.kind == CapabilityKind::Resource {
            let uri = descriptor
                .uri
                .as_deref()
                .ok_or_else(|| ServerError::InvalidPattern {
                    pattern: descriptor.name.clone(),
                    reason: "resource descriptor declares no URI".to_string(),
                })?;
            let pattern = ResourcePattern::parse(uri)?;
            for placeholder in pattern.param_names() {
                if !descriptor.params.iter().any(|p| p.name == placeholder) {
                    descriptor
                        .params
                        .push(ParamSpec::required(placeholder, ParamType::String));
                }
            }
            self.resolver.register(pattern, descriptor.name.clone());
        }

        self.index.insert(key, self.descriptors.len());
        self.descriptors.push(descriptor);
        Ok(())
    }

    /// Freeze the registry. No further registration is possible.
    pub fn build(self) -> CapabilityRegistry {
        CapabilityRegistry {
            descriptors: self.descriptors,
            index: self.index,
            resolver: self.resolver,
        }
    }
}

// ---------------------------------------------------------------------------
// CapabilityRegistry
// ---------------------------------------------------------------------------

/// Frozen, read-only capability catalog shared by every session.
#[derive(Debug)]
pub struct CapabilityRegistry {
    descriptors: Vec<CapabilityDescriptor>,
    index: HashMap<(CapabilityKind, String), usize>,
    resolver: UriResolver,
}

impl CapabilityRegistry {
    /// Look up a capability by kind and exact name.
    ///
    /// # Errors
    ///
    /// `NotFound` if no such capability is registered.
    pub fn lookup(&self, kind: CapabilityKind, name: &str) -> Result<&CapabilityDescriptor, ServerError> {
        self.index
            .get(&(kind, name.to_string()))
            .map(|&i| &self.descriptors[i])
            .ok_or_else(|| ServerError::not_found(format!("{} '{}'", kind, name)))
    }

    /// Iterate capabilities of one kind in registration order. The iterator
    /// is restartable — calling `list` again yields the same sequence.
    pub fn list(&self, kind: CapabilityKind) -> impl Iterator<Item = &CapabilityDescriptor> {
        self.descriptors.iter().filter(move |d| d.kind == kind)
    }

    /// Resolve a resource request URI to its descriptor and any extracted
    /// placeholder bindings.
    ///
    /// # Errors
    ///
    /// `NotFound` if no registered pattern matches.
    pub fn resolve_uri(
        &self,
        uri: &str,
    ) -> Result<(&CapabilityDescriptor, ResolvedUri), ServerError> {
        let resolved = self.resolver.resolve(uri)?;
        let descriptor = self.lookup(CapabilityKind::Resource, &resolved.resource)?;
        Ok((descriptor, resolved))
    }

    /// Total number of registered capabilities across all kinds.
    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }
}
