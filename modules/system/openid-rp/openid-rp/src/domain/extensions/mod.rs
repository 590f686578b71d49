//! Extension bindings and the built-in extension readers.

pub mod ax;
pub mod sreg;

use std::collections::HashSet;
use std::sync::Arc;

use openid_rp_sdk::protocol::keys;
use openid_rp_sdk::{ClientScriptExtension, Parameters};

pub use ax::AttributeExchange;
pub use sreg::SimpleRegistration;

use super::error::DomainError;
use crate::config::{ExtensionConfig, ExtensionReader};

/// One extension reader bound to a result property of the waiting page.
#[derive(Clone)]
pub struct ExtensionBinding {
    extension: Arc<dyn ClientScriptExtension>,
    property: String,
}

impl ExtensionBinding {
    #[must_use]
    pub fn extension(&self) -> &dyn ClientScriptExtension {
        self.extension.as_ref()
    }

    #[must_use]
    pub fn property(&self) -> &str {
        &self.property
    }
}

/// Registered bindings, in registration order.
///
/// At most one binding per extension kind and at most one kind per property.
#[derive(Clone, Default)]
pub struct ExtensionBindings {
    bindings: Vec<ExtensionBinding>,
}

impl ExtensionBindings {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Bindings for the built-in readers named in configuration.
    ///
    /// # Errors
    ///
    /// Same as [`ExtensionBindings::register`].
    pub fn from_config(extensions: &[ExtensionConfig]) -> Result<Self, DomainError> {
        let mut bindings = Self::new();
        for ext in extensions {
            let reader: Arc<dyn ClientScriptExtension> = match ext.kind {
                ExtensionReader::Sreg => Arc::new(SimpleRegistration),
                ExtensionReader::Ax => Arc::new(AttributeExchange),
            };
            bindings.register(reader, ext.property.clone())?;
        }
        Ok(bindings)
    }

    /// Bind `extension` to `property`.
    ///
    /// # Errors
    ///
    /// - [`DomainError::InvalidArgument`] if `property` is blank
    /// - [`DomainError::RegistrationConflict`] if the kind or the property is
    ///   already bound
    pub fn register(
        &mut self,
        extension: Arc<dyn ClientScriptExtension>,
        property: impl Into<String>,
    ) -> Result<(), DomainError> {
        let property = property.into();
        if property.trim().is_empty() {
            return Err(DomainError::InvalidArgument(
                "extension property name must not be empty".to_owned(),
            ));
        }
        let kind = extension.kind();
        if let Some(existing) = self.bindings.iter().find(|b| b.extension.kind() == kind) {
            return Err(DomainError::RegistrationConflict(format!(
                "extension '{kind}' is already bound to '{}'",
                existing.property
            )));
        }
        if let Some(existing) = self.bindings.iter().find(|b| b.property == property) {
            return Err(DomainError::RegistrationConflict(format!(
                "property '{property}' is already bound to extension '{}'",
                existing.extension.kind()
            )));
        }
        self.bindings.push(ExtensionBinding {
            extension,
            property,
        });
        Ok(())
    }

    pub fn iter(&self) -> impl Iterator<Item = &ExtensionBinding> {
        self.bindings.iter()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }
}

/// Alias an extension namespace is declared under, e.g. `sreg` for
/// `openid.ns.sreg`. Falls back to `legacy_alias` when no namespace is
/// declared but keys with that alias are present (1.x messages).
fn find_alias(raw: &Parameters, namespaces: &[&str], legacy_alias: &str) -> Option<String> {
    let declared = raw.iter().find_map(|(key, value)| {
        key.strip_prefix("openid.ns.")
            .filter(|_| namespaces.contains(&value.as_str()))
            .map(str::to_owned)
    });
    if declared.is_some() {
        return declared;
    }
    let prefix = format!("{}{legacy_alias}.", keys::PREFIX);
    raw.keys()
        .any(|key| key.starts_with(&prefix))
        .then(|| legacy_alias.to_owned())
}

/// Field names covered by `openid.signed`.
fn signed_fields(raw: &Parameters) -> HashSet<&str> {
    raw.get(keys::SIGNED)
        .map(|list| list.split(',').collect())
        .unwrap_or_default()
}

/// Signed `openid.<alias>.*` fields, keyed by the part after the alias.
fn signed_extension_fields<'a>(
    raw: &'a Parameters,
    alias: &str,
) -> Vec<(&'a str, &'a str)> {
    let signed = signed_fields(raw);
    let prefix = format!("{}{alias}.", keys::PREFIX);
    raw.iter()
        .filter_map(|(key, value)| {
            let field = key.strip_prefix(&prefix)?;
            let wire = key.strip_prefix(keys::PREFIX)?;
            signed
                .contains(wire)
                .then_some((field, value.as_str()))
        })
        .collect()
}
