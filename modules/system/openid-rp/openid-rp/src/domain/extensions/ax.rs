//! Attribute Exchange fetch-response reader.

use std::collections::BTreeMap;

use openid_rp_sdk::{ClientScriptExtension, ExtensionKind, Parameters};
use serde_json::Value;

use super::{find_alias, signed_extension_fields};

pub const AX_NS: &str = "http://openid.net/srv/ax/1.0";

/// Reads attribute values keyed by type URI, e.g.
/// `{"http://axschema.org/contact/email": ["alice@example.org"]}`.
///
/// Values are always arrays, since one attribute may carry several.
#[derive(Debug, Clone, Copy, Default)]
pub struct AttributeExchange;

impl AttributeExchange {
    pub const KIND: ExtensionKind = ExtensionKind::new("ax");
}

impl ClientScriptExtension for AttributeExchange {
    fn kind(&self) -> ExtensionKind {
        Self::KIND
    }

    fn extract(&self, raw: &Parameters) -> Option<Value> {
        let alias = find_alias(raw, &[AX_NS], "ax")?;
        let fields: BTreeMap<&str, &str> = signed_extension_fields(raw, &alias)
            .into_iter()
            .collect();
        if fields.get("mode") != Some(&"fetch_response") {
            return None;
        }

        let mut attributes = serde_json::Map::new();
        for (field, type_uri) in &fields {
            let Some(name) = field.strip_prefix("type.") else {
                continue;
            };
            attributes.insert(
                (*type_uri).to_owned(),
                Value::Array(values_of(&fields, name)),
            );
        }
        (!attributes.is_empty()).then_some(Value::Object(attributes))
    }
}

/// `value.<name>` or, with `count.<name>`, the `value.<name>.N` fields present
/// for `N` in `1..=count`, in index order.
fn values_of(fields: &BTreeMap<&str, &str>, name: &str) -> Vec<Value> {
    let Some(count) = fields
        .get(format!("count.{name}").as_str())
        .and_then(|c| c.parse::<usize>().ok())
    else {
        return fields
            .get(format!("value.{name}").as_str())
            .map(|v| Value::String((*v).to_owned()))
            .into_iter()
            .collect();
    };

    let prefix = format!("value.{name}.");
    let mut indexed: Vec<(usize, &str)> = fields
        .iter()
        .filter_map(|(field, value)| {
            let i = field.strip_prefix(&prefix)?.parse::<usize>().ok()?;
            (1..=count).contains(&i).then_some((i, *value))
        })
        .collect();
    indexed.sort_unstable_by_key(|(i, _)| *i);
    indexed
        .into_iter()
        .map(|(_, v)| Value::String(v.to_owned()))
        .collect()
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;

    fn raw(pairs: &[(&str, &str)]) -> Parameters {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
            .collect()
    }

    #[test]
    fn single_and_counted_values_are_read() {
        let params = raw(&[
            ("openid.ns.ax", AX_NS),
            (
                "openid.signed",
                "ax.mode,ax.type.email,ax.value.email,ax.type.lang,ax.count.lang,ax.value.lang.1,ax.value.lang.2",
            ),
            ("openid.ax.mode", "fetch_response"),
            ("openid.ax.type.email", "http://axschema.org/contact/email"),
            ("openid.ax.value.email", "alice@example.org"),
            ("openid.ax.type.lang", "http://axschema.org/pref/language"),
            ("openid.ax.count.lang", "2"),
            ("openid.ax.value.lang.1", "en"),
            ("openid.ax.value.lang.2", "fr"),
        ]);

        assert_eq!(
            AttributeExchange.extract(&params),
            Some(serde_json::json!({
                "http://axschema.org/contact/email": ["alice@example.org"],
                "http://axschema.org/pref/language": ["en", "fr"],
            }))
        );
    }

    #[test]
    fn store_responses_are_not_fetch_data() {
        let params = raw(&[
            ("openid.ns.ax", AX_NS),
            ("openid.signed", "ax.mode"),
            ("openid.ax.mode", "store_response_success"),
        ]);
        assert_eq!(AttributeExchange.extract(&params), None);
    }

    #[test]
    fn huge_count_reads_only_present_values() {
        let params = raw(&[
            ("openid.ns.ax", AX_NS),
            (
                "openid.signed",
                "ax.mode,ax.type.e,ax.count.e,ax.value.e.2,ax.value.e.10,ax.value.e.0",
            ),
            ("openid.ax.mode", "fetch_response"),
            ("openid.ax.type.e", "http://axschema.org/contact/email"),
            ("openid.ax.count.e", "18446744073709551615"),
            ("openid.ax.value.e.2", "b@example.org"),
            ("openid.ax.value.e.10", "j@example.org"),
            ("openid.ax.value.e.0", "ignored@example.org"),
        ]);

        assert_eq!(
            AttributeExchange.extract(&params),
            Some(serde_json::json!({
                "http://axschema.org/contact/email": ["b@example.org", "j@example.org"],
            }))
        );
    }
}
