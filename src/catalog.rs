//! The standard network-incident field catalog.
//!
//! [`standard_layer`] declares every canonical incident key; applications
//! stack their own layers on top of it (see [`DataSpec::extend`]).
//!
//! [`DataSpec::extend`]: crate::DataSpec::extend

use crate::error::BuildError;
use crate::field::{Field, FieldBuilder, FieldType};
use crate::spec::Layer;
use crate::types::Presence::{Optional, Required};

/// Name of the layer built by [`standard_layer`].
pub const STANDARD_LAYER_NAME: &str = "standard";

/// Incident data access restriction levels.
pub const RESTRICTION: &[&str] = &["public", "need-to-know", "internal"];

/// Incident data confidence qualifiers.
pub const CONFIDENCE: &[&str] = &["low", "medium", "high"];

/// Incident category labels.
pub const CATEGORY: &[&str] = &[
    "amplifier",
    "bots",
    "backdoor",
    "cnc",
    "dns-query",
    "dos-attacker",
    "dos-victim",
    "flow",
    "flow-anomaly",
    "fraud",
    "leak",
    "malurl",
    "phish",
    "proxy",
    "sandbox-url",
    "scanning",
    "server-exploit",
    "spam",
    "spam-url",
    "tor",
    "vulnerable",
    "webinject",
    "other",
];

/// Layer-4 protocol labels.
pub const PROTO: &[&str] = &["tcp", "udp", "icmp"];

/// Incident origin labels.
pub const ORIGIN: &[&str] = &[
    "c2",
    "dropzone",
    "proxy",
    "p2p-crawler",
    "p2p-drone",
    "sinkhole",
    "sandbox",
    "honeypot",
    "darknet",
    "av",
    "ids",
    "waf",
];

/// Blacklist item status qualifiers.
pub const STATUS: &[&str] = &["active", "delisted", "expired", "replaced"];

fn param_and_result(t: FieldType) -> FieldBuilder {
    Field::builder(t).in_params(Optional).in_result(Optional)
}

fn limited(max_length: usize) -> FieldBuilder {
    param_and_result(FieldType::LimitedText).max_length(max_length)
}

fn enumerated(values: &[&str]) -> FieldBuilder {
    Field::builder(FieldType::EnumText)
        .in_params(Optional)
        .enum_values(values.iter().copied())
}

fn result_only(t: FieldType) -> FieldBuilder {
    Field::builder(t).in_result(Optional)
}

fn param_only(t: FieldType) -> FieldBuilder {
    Field::builder(t).in_params(Optional)
}

/// A field carrying the `min`, `max` and `until` single-value time bounds.
fn with_time_bounds(builder: FieldBuilder) -> Result<Field, BuildError> {
    let bound = || param_only(FieldType::DateTime).single_param(true).build();
    builder
        .extra_param("min", bound()?)
        .extra_param("max", bound()?)
        .extra_param("until", bound()?)
        .build()
}

/// Build the standard incident layer.
pub fn standard_layer() -> Result<Layer, BuildError> {
    let layer = Layer::named(STANDARD_LAYER_NAME)
        // identification, categorization and other event metadata
        .field(
            "id",
            param_only(FieldType::LimitedText)
                .in_result(Required)
                .max_length(64)
                .build()?,
        )
        .field("source", param_only(FieldType::Source).in_result(Required).build()?)
        .field("restriction", enumerated(RESTRICTION).in_result(Required).build()?)
        .field("confidence", enumerated(CONFIDENCE).in_result(Required).build()?)
        .field("category", enumerated(CATEGORY).in_result(Required).build()?)
        .field(
            "time",
            with_time_bounds(Field::builder(FieldType::DateTime).in_result(Required))?,
        )
        .field("modified", with_time_bounds(result_only(FieldType::DateTime))?)
        .field("origin", enumerated(ORIGIN).in_result(Optional).build()?)
        .field("name", limited(255).build()?)
        .field("target", limited(100).build()?)
        // address items hold ip or ipv6 plus asn, cc, dir, rdns
        .field("address", result_only(FieldType::ExtendedAddress).build()?)
        // query params matching components of address items
        .field(
            "ip",
            param_only(FieldType::Ipv4)
                .extra_param("net", param_only(FieldType::Ipv4Net).build()?)
                .build()?,
        )
        .field(
            "ipv6",
            param_only(FieldType::Ipv6)
                .extra_param("net", param_only(FieldType::Ipv6Net).build()?)
                .build()?,
        )
        .field("asn", param_only(FieldType::Asn).build()?)
        .field("cc", param_only(FieldType::CountryCode).build()?)
        // other technical properties
        .field(
            "url",
            param_and_result(FieldType::Url)
                .extra_param("sub", param_only(FieldType::UrlSubstring).build()?)
                .build()?,
        )
        .field(
            "fqdn",
            param_and_result(FieldType::DomainName)
                .extra_param("sub", param_only(FieldType::DomainNameSubstring).build()?)
                .build()?,
        )
        .field("proto", enumerated(PROTO).in_result(Optional).build()?)
        .field("sport", param_and_result(FieldType::Port).build()?)
        .field("dport", param_and_result(FieldType::Port).build()?)
        .field("dip", param_and_result(FieldType::Ipv4).build()?)
        .field("adip", result_only(FieldType::AnonymizedIpv4).build()?)
        .field("md5", param_and_result(FieldType::Md5).build()?)
        .field("sha1", param_and_result(FieldType::Sha1).build()?)
        .field("injects", result_only(FieldType::ListOfDicts).build()?)
        .field("registrar", limited(100).build()?)
        .field("url_pattern", limited(255).build()?)
        .field("username", limited(64).build()?)
        .field("x509fp_sha1", param_and_result(FieldType::Sha1).build()?)
        // others
        .field("email", param_and_result(FieldType::Email).build()?)
        .field("iban", param_and_result(FieldType::Iban).build()?)
        .field("phone", limited(20).build()?)
        .field("expires", result_only(FieldType::DateTime).build()?)
        .field("active", with_time_bounds(Field::builder(FieldType::Base))?)
        .field("status", enumerated(STATUS).in_result(Optional).build()?)
        .field("replaces", limited(64).build()?)
        .field("until", result_only(FieldType::DateTime).build()?)
        .field(
            "count",
            result_only(FieldType::Integer)
                .min_value(0)
                .max_value((1 << 15) - 1)
                .build()?,
        );
    Ok(layer)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spec::DataSpec;
    use crate::types::Presence;

    #[test]
    fn standard_keys() {
        let spec = DataSpec::from_layers(vec![standard_layer().unwrap()]).unwrap();
        let params = spec.all_param_keys();
        for key in [
            "id", "time.min", "time.max", "time.until", "modified.until", "active.min",
            "ip", "ip.net", "ipv6.net", "url.sub", "fqdn.sub", "asn", "cc",
        ] {
            assert!(params.contains(key), "{key}");
        }
        for key in ["time", "modified", "address", "active", "adip", "injects", "count"] {
            assert!(!params.contains(key), "{key}");
        }

        let results = spec.all_result_keys();
        for key in ["address", "adip", "injects", "count", "expires", "until"] {
            assert!(results.contains(key), "{key}");
        }
        for key in ["ip", "ipv6", "asn", "cc", "active", "time.min", "url.sub"] {
            assert!(!results.contains(key), "{key}");
        }

        assert_eq!(
            spec.required_result_keys().into_iter().collect::<Vec<_>>(),
            ["category", "confidence", "id", "restriction", "source", "time"]
        );
        assert!(spec.required_param_keys().is_empty());
        assert!(spec.field("active").is_some());
    }

    #[test]
    fn time_bounds_are_single_value() {
        let spec = DataSpec::from_layers(vec![standard_layer().unwrap()]).unwrap();
        let single = spec.param_field_specs(crate::Which::All, false, true);
        assert_eq!(single.len(), 9);
        assert!(single.keys().all(|k| k.ends_with(".min")
            || k.ends_with(".max")
            || k.ends_with(".until")));
        assert_eq!(spec.field("count").unwrap().in_result(), Presence::Optional);
    }
}
