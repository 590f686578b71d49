//! Simple Registration (sreg 1.0 / 1.1) response reader.

use openid_rp_sdk::{ClientScriptExtension, ExtensionKind, Parameters};
use serde_json::{Map, Value};

use super::{find_alias, signed_extension_fields};

pub const SREG_10_NS: &str = "http://openid.net/sreg/1.0";
pub const SREG_11_NS: &str = "http://openid.net/extensions/sreg/1.1";

const FIELDS: [&str; 9] = [
    "nickname", "email", "fullname", "dob", "gender", "postcode", "country", "language",
    "timezone",
];

/// Reads the profile fields a provider returned, e.g.
/// `{"nickname": "alice", "email": "alice@example.org"}`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SimpleRegistration;

impl SimpleRegistration {
    pub const KIND: ExtensionKind = ExtensionKind::new("sreg");
}

impl ClientScriptExtension for SimpleRegistration {
    fn kind(&self) -> ExtensionKind {
        Self::KIND
    }

    fn extract(&self, raw: &Parameters) -> Option<Value> {
        let alias = find_alias(raw, &[SREG_10_NS, SREG_11_NS], "sreg")?;
        let profile: Map<String, Value> = signed_extension_fields(raw, &alias)
            .into_iter()
            .filter(|(field, _)| FIELDS.contains(field))
            .map(|(field, value)| (field.to_owned(), Value::String(value.to_owned())))
            .collect();
        (!profile.is_empty()).then_some(Value::Object(profile))
    }
}
