//! Field types, the constructor arguments each one accepts, and the
//! translation of (defaults + arguments) into cleaning rules.

use std::collections::BTreeSet;
use std::fmt;

use regex::Regex;
use serde::Serialize;

use super::composite::{DictRules, ListRules};
use super::number::IntegerRules;
use super::text::{Case, HexDigest, Ipv6Form, TextRules};
use super::{ArgValue, Args, Field, Rules};
use crate::encoding::ByteDecoding;
use crate::error::BuildError;
use crate::regexes;
use crate::types::Presence;

/// Arguments every field type accepts.
pub const COMMON_ARGS: &[&str] = &[
    "in_result",
    "in_params",
    "single_param",
    "extra_params",
    "custom_info",
];

const TEXT_ARGS: &[&str] = &["encoding_errors"];
const LIMITED_ARGS: &[&str] = &["encoding_errors", "max_length", "checking_bytes_length"];
const ENUM_ARGS: &[&str] = &["encoding_errors", "enum_values"];
const REGEX_ARGS: &[&str] = &["encoding_errors", "regex", "error_msg_template"];
const LIMITED_REGEX_ARGS: &[&str] = &[
    "encoding_errors",
    "max_length",
    "checking_bytes_length",
    "regex",
    "error_msg_template",
];
const IPV6_ARGS: &[&str] = &[
    "encoding_errors",
    "max_length",
    "checking_bytes_length",
    "error_msg_template",
];
const HEX_ARGS: &[&str] = &["encoding_errors", "num_of_characters", "hash_algo_descr"];
const LIMITED_LIST_ARGS: &[&str] = &[
    "encoding_errors",
    "max_length",
    "checking_bytes_length",
    "allow_empty",
];
const INTEGER_ARGS: &[&str] = &["min_value", "max_value", "error_msg_template"];
const LIST_ARGS: &[&str] = &["allow_empty"];

/// The concrete kind of a field: determines its defaults, the constructor
/// arguments it accepts, and how values are cleaned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldType {
    /// Identity passthrough.
    Base,
    Text,
    LimitedText,
    EnumText,
    RegexText,
    Source,
    Ipv4,
    AnonymizedIpv4,
    Ipv4Net,
    Ipv6,
    Ipv6Net,
    CountryCode,
    UrlSubstring,
    Url,
    DomainNameSubstring,
    DomainName,
    HexDigest,
    Md5,
    Sha1,
    Email,
    Iban,
    LimitedTextList,
    DateTime,
    Integer,
    Asn,
    Port,
    Address,
    ExtendedAddress,
    ListOfDicts,
}

impl FieldType {
    pub const ALL: &'static [FieldType] = &[
        FieldType::Base,
        FieldType::Text,
        FieldType::LimitedText,
        FieldType::EnumText,
        FieldType::RegexText,
        FieldType::Source,
        FieldType::Ipv4,
        FieldType::AnonymizedIpv4,
        FieldType::Ipv4Net,
        FieldType::Ipv6,
        FieldType::Ipv6Net,
        FieldType::CountryCode,
        FieldType::UrlSubstring,
        FieldType::Url,
        FieldType::DomainNameSubstring,
        FieldType::DomainName,
        FieldType::HexDigest,
        FieldType::Md5,
        FieldType::Sha1,
        FieldType::Email,
        FieldType::Iban,
        FieldType::LimitedTextList,
        FieldType::DateTime,
        FieldType::Integer,
        FieldType::Asn,
        FieldType::Port,
        FieldType::Address,
        FieldType::ExtendedAddress,
        FieldType::ListOfDicts,
    ];

    /// The snake_case name used in declaration files.
    pub fn name(&self) -> &'static str {
        match self {
            FieldType::Base => "base",
            FieldType::Text => "text",
            FieldType::LimitedText => "limited_text",
            FieldType::EnumText => "enum_text",
            FieldType::RegexText => "regex_text",
            FieldType::Source => "source",
            FieldType::Ipv4 => "ipv4",
            FieldType::AnonymizedIpv4 => "anonymized_ipv4",
            FieldType::Ipv4Net => "ipv4_net",
            FieldType::Ipv6 => "ipv6",
            FieldType::Ipv6Net => "ipv6_net",
            FieldType::CountryCode => "country_code",
            FieldType::UrlSubstring => "url_substring",
            FieldType::Url => "url",
            FieldType::DomainNameSubstring => "domain_name_substring",
            FieldType::DomainName => "domain_name",
            FieldType::HexDigest => "hex_digest",
            FieldType::Md5 => "md5",
            FieldType::Sha1 => "sha1",
            FieldType::Email => "email",
            FieldType::Iban => "iban",
            FieldType::LimitedTextList => "limited_text_list",
            FieldType::DateTime => "date_time",
            FieldType::Integer => "integer",
            FieldType::Asn => "asn",
            FieldType::Port => "port",
            FieldType::Address => "address",
            FieldType::ExtendedAddress => "extended_address",
            FieldType::ListOfDicts => "list_of_dicts",
        }
    }

    /// Look a type up by its declaration-file name.
    pub fn parse(name: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|t| t.name() == name)
    }

    /// Type-specific constructor arguments (on top of [`COMMON_ARGS`]).
    pub fn type_args(&self) -> &'static [&'static str] {
        match self {
            FieldType::Base | FieldType::DateTime => &[],
            FieldType::Text => TEXT_ARGS,
            FieldType::LimitedText
            | FieldType::UrlSubstring
            | FieldType::Url
            | FieldType::DomainNameSubstring => LIMITED_ARGS,
            FieldType::EnumText => ENUM_ARGS,
            FieldType::RegexText => REGEX_ARGS,
            FieldType::Source
            | FieldType::Ipv4
            | FieldType::AnonymizedIpv4
            | FieldType::Ipv4Net
            | FieldType::CountryCode
            | FieldType::DomainName
            | FieldType::Email
            | FieldType::Iban => LIMITED_REGEX_ARGS,
            FieldType::Ipv6 | FieldType::Ipv6Net => IPV6_ARGS,
            FieldType::HexDigest | FieldType::Md5 | FieldType::Sha1 => HEX_ARGS,
            FieldType::LimitedTextList => LIMITED_LIST_ARGS,
            FieldType::Integer | FieldType::Asn | FieldType::Port => INTEGER_ARGS,
            FieldType::Address | FieldType::ExtendedAddress | FieldType::ListOfDicts => {
                LIST_ARGS
            }
        }
    }

    /// True if `arg` may be passed to this type's constructor.
    pub fn accepts(&self, arg: &str) -> bool {
        COMMON_ARGS.contains(&arg) || self.type_args().contains(&arg)
    }

    /// True for types whose values are never accepted as query parameters.
    pub fn is_result_only(&self) -> bool {
        matches!(
            self,
            FieldType::Address | FieldType::ExtendedAddress | FieldType::ListOfDicts
        )
    }

    /// Arguments this type cannot be built without. A type default may
    /// supply them, but masking one away is a build error.
    pub fn required_args(&self) -> Vec<&'static str> {
        let defaults = text_defaults(*self);
        let mut args = Vec::new();
        if defaults.limited {
            args.push("max_length");
        }
        if defaults.needs_enum {
            args.push("enum_values");
        }
        if defaults.needs_regex {
            args.push("regex");
        }
        if defaults.hex.is_some() {
            args.extend(["num_of_characters", "hash_algo_descr"]);
        }
        args
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Typed access to a field's constructor arguments.
pub(crate) struct ArgReader<'a> {
    pub field_type: FieldType,
    pub args: &'a Args,
}

impl<'a> ArgReader<'a> {
    fn type_error(&self, arg: &str, expected: &'static str, actual: &ArgValue) -> BuildError {
        BuildError::InvalidArgumentType {
            field_type: self.field_type,
            arg: arg.to_string(),
            expected,
            actual: actual.type_name().to_string(),
        }
    }

    pub fn presence(&self, arg: &str) -> Result<Presence, BuildError> {
        match self.args.get(arg) {
            None => Ok(Presence::Absent),
            Some(ArgValue::Presence(p)) => Ok(*p),
            Some(ArgValue::Text(s)) => {
                Presence::parse(s).ok_or_else(|| BuildError::InvalidArgumentValue {
                    field_type: self.field_type,
                    arg: arg.to_string(),
                    message: format!(
                        "\"{}\" is not one of: required, optional, absent",
                        s
                    ),
                })
            }
            Some(other) => Err(self.type_error(arg, "presence", other)),
        }
    }

    pub fn bool(&self, arg: &str) -> Result<Option<bool>, BuildError> {
        match self.args.get(arg) {
            None => Ok(None),
            Some(ArgValue::Bool(b)) => Ok(Some(*b)),
            Some(other) => Err(self.type_error(arg, "boolean", other)),
        }
    }

    pub fn int(&self, arg: &str) -> Result<Option<i64>, BuildError> {
        match self.args.get(arg) {
            None => Ok(None),
            Some(ArgValue::Int(n)) => Ok(Some(*n)),
            Some(other) => Err(self.type_error(arg, "integer", other)),
        }
    }

    pub fn text(&self, arg: &str) -> Result<Option<String>, BuildError> {
        match self.args.get(arg) {
            None => Ok(None),
            Some(ArgValue::Text(s)) => Ok(Some(s.clone())),
            Some(other) => Err(self.type_error(arg, "string", other)),
        }
    }

    pub fn text_list(&self, arg: &str) -> Result<Option<Vec<String>>, BuildError> {
        match self.args.get(arg) {
            None => Ok(None),
            Some(ArgValue::TextList(items)) => Ok(Some(items.clone())),
            Some(other) => Err(self.type_error(arg, "list of strings", other)),
        }
    }

    fn positive(&self, arg: &str) -> Result<Option<usize>, BuildError> {
        match self.int(arg)? {
            None => Ok(None),
            Some(n) if n >= 1 => Ok(usize::try_from(n).ok()),
            Some(n) => Err(BuildError::InvalidArgumentValue {
                field_type: self.field_type,
                arg: arg.to_string(),
                message: format!("should not be lesser than 1 ({} given)", n),
            }),
        }
    }

    fn decoding(&self, default: ByteDecoding) -> Result<ByteDecoding, BuildError> {
        match self.text("encoding_errors")? {
            None => Ok(default),
            Some(name) => {
                ByteDecoding::parse(&name).ok_or_else(|| BuildError::InvalidArgumentValue {
                    field_type: self.field_type,
                    arg: "encoding_errors".to_string(),
                    message: format!("\"{}\" is not one of: strict, escape", name),
                })
            }
        }
    }
}

/// Type-level defaults of the text family, before arguments are applied.
#[derive(Default)]
struct TextDefaults {
    decoding: ByteDecoding,
    idna: bool,
    case: Option<Case>,
    limited: bool,
    max_length: Option<usize>,
    regex: Option<&'static str>,
    needs_regex: bool,
    error_msg_template: Option<&'static str>,
    needs_enum: bool,
    hex: Option<(Option<usize>, Option<&'static str>)>,
    numeric_tld_check: bool,
    ipv6: Option<Ipv6Form>,
}

fn text_defaults(field_type: FieldType) -> TextDefaults {
    let limited_regex = |regex, template, max_length| TextDefaults {
        limited: true,
        max_length: Some(max_length),
        regex: Some(regex),
        needs_regex: true,
        error_msg_template: Some(template),
        ..TextDefaults::default()
    };
    match field_type {
        FieldType::LimitedText | FieldType::LimitedTextList => TextDefaults {
            limited: true,
            ..TextDefaults::default()
        },
        FieldType::EnumText => TextDefaults {
            needs_enum: true,
            ..TextDefaults::default()
        },
        FieldType::RegexText => TextDefaults {
            needs_regex: true,
            error_msg_template: Some("\"{}\" is not a valid value"),
            ..TextDefaults::default()
        },
        FieldType::Source => limited_regex(
            regexes::SOURCE,
            "\"{}\" is not a valid source specification",
            32,
        ),
        FieldType::Ipv4 => limited_regex(
            regexes::IPV4_STRICT_DECIMAL,
            "\"{}\" is not a valid IPv4 address",
            15,
        ),
        FieldType::AnonymizedIpv4 => TextDefaults {
            case: Some(Case::Lower),
            ..limited_regex(
                regexes::IPV4_ANONYMIZED,
                "\"{}\" is not a valid anonymized IPv4 address",
                13,
            )
        },
        FieldType::Ipv4Net => limited_regex(
            regexes::IPV4_CIDR_NETWORK,
            "\"{}\" is not a valid CIDR IPv4 network specification",
            18,
        ),
        FieldType::Ipv6 => TextDefaults {
            limited: true,
            max_length: Some(39),
            error_msg_template: Some("\"{}\" is not a valid IPv6 address"),
            ipv6: Some(Ipv6Form::Address),
            ..TextDefaults::default()
        },
        FieldType::Ipv6Net => TextDefaults {
            limited: true,
            max_length: Some(43),
            error_msg_template: Some("\"{}\" is not a valid CIDR IPv6 network specification"),
            ipv6: Some(Ipv6Form::Network),
            ..TextDefaults::default()
        },
        FieldType::CountryCode => TextDefaults {
            case: Some(Case::Upper),
            ..limited_regex(
                regexes::CC_SIMPLE,
                "\"{}\" is not a valid 2-character country code",
                2,
            )
        },
        FieldType::UrlSubstring | FieldType::Url => TextDefaults {
            decoding: ByteDecoding::Escape,
            limited: true,
            max_length: Some(2048),
            ..TextDefaults::default()
        },
        FieldType::DomainNameSubstring => TextDefaults {
            idna: true,
            limited: true,
            max_length: Some(255),
            ..TextDefaults::default()
        },
        FieldType::DomainName => TextDefaults {
            idna: true,
            numeric_tld_check: true,
            ..limited_regex(
                regexes::DOMAIN_ASCII_LOWERCASE,
                "\"{}\" is not a valid domain name",
                255,
            )
        },
        FieldType::HexDigest => TextDefaults {
            case: Some(Case::Lower),
            hex: Some((None, None)),
            ..TextDefaults::default()
        },
        FieldType::Md5 => TextDefaults {
            case: Some(Case::Lower),
            hex: Some((Some(32), Some("MD5"))),
            ..TextDefaults::default()
        },
        FieldType::Sha1 => TextDefaults {
            case: Some(Case::Lower),
            hex: Some((Some(40), Some("SHA1"))),
            ..TextDefaults::default()
        },
        FieldType::Email => limited_regex(
            regexes::EMAIL_SIMPLIFIED,
            "\"{}\" is not a valid e-mail address",
            254,
        ),
        FieldType::Iban => TextDefaults {
            case: Some(Case::Upper),
            ..limited_regex(regexes::IBAN, "\"{}\" is not a valid IBAN", 34)
        },
        _ => TextDefaults::default(),
    }
}

fn text_rules(reader: &ArgReader<'_>) -> Result<TextRules, BuildError> {
    let field_type = reader.field_type;
    let defaults = text_defaults(field_type);

    let max_length = match reader.positive("max_length")? {
        Some(n) => Some(n),
        None => defaults.max_length,
    };
    if defaults.limited && max_length.is_none() {
        return Err(BuildError::MissingArgument {
            field_type,
            arg: "max_length",
        });
    }

    let enum_values = reader.text_list("enum_values")?;
    if defaults.needs_enum && enum_values.is_none() {
        return Err(BuildError::MissingArgument {
            field_type,
            arg: "enum_values",
        });
    }

    let pattern = reader
        .text("regex")?
        .or_else(|| defaults.regex.map(String::from));
    if defaults.needs_regex && pattern.is_none() {
        return Err(BuildError::MissingArgument {
            field_type,
            arg: "regex",
        });
    }
    let regex = pattern
        .map(|p| Regex::new(&p))
        .transpose()
        .map_err(|e| BuildError::InvalidRegex {
            field_type,
            message: e.to_string(),
        })?;

    let hex_digest = match defaults.hex {
        None => None,
        Some((default_chars, default_descr)) => {
            let num_of_characters = reader
                .positive("num_of_characters")?
                .or(default_chars)
                .ok_or(BuildError::MissingArgument {
                    field_type,
                    arg: "num_of_characters",
                })?;
            let hash_algo_descr = reader
                .text("hash_algo_descr")?
                .or_else(|| default_descr.map(String::from))
                .ok_or(BuildError::MissingArgument {
                    field_type,
                    arg: "hash_algo_descr",
                })?;
            Some(HexDigest {
                num_of_characters,
                hash_algo_descr,
            })
        }
    };

    Ok(TextRules {
        decoding: reader.decoding(defaults.decoding)?,
        idna: defaults.idna,
        case: defaults.case,
        ipv6: defaults.ipv6,
        max_length: if defaults.limited { max_length } else { None },
        checking_bytes_length: reader.bool("checking_bytes_length")?.unwrap_or(false),
        enum_values,
        regex,
        error_msg_template: reader
            .text("error_msg_template")?
            .or_else(|| defaults.error_msg_template.map(String::from))
            .unwrap_or_else(|| "\"{}\" is not a valid value".to_string()),
        hex_digest,
        numeric_tld_check: defaults.numeric_tld_check,
    })
}

fn integer_rules(reader: &ArgReader<'_>) -> Result<IntegerRules, BuildError> {
    let (min_value, max_value, template, asn_notation) = match reader.field_type {
        FieldType::Asn => (
            Some(0),
            Some((1_i64 << 32) - 1),
            Some("\"{}\" is not a valid Autonomous System Number"),
            true,
        ),
        FieldType::Port => (
            Some(0),
            Some((1_i64 << 16) - 1),
            Some("\"{}\" is not a valid port number"),
            false,
        ),
        _ => (None, None, None, false),
    };
    Ok(IntegerRules {
        min_value: reader.int("min_value")?.or(min_value),
        max_value: reader.int("max_value")?.or(max_value),
        error_msg_template: reader
            .text("error_msg_template")?
            .or_else(|| template.map(String::from)),
        asn_notation,
    })
}

fn list_rules(reader: &ArgReader<'_>) -> Result<ListRules, BuildError> {
    Ok(ListRules {
        allow_empty: reader.bool("allow_empty")?.unwrap_or(false),
    })
}

fn address_rules(extended: bool) -> Result<DictRules, BuildError> {
    let mut subfields = vec![
        ("ip", Field::builder(FieldType::Ipv4).build()?),
        ("cc", Field::builder(FieldType::CountryCode).build()?),
        ("asn", Field::builder(FieldType::Asn).build()?),
    ];
    if !extended {
        return Ok(DictRules::new(subfields, &["ip"], None));
    }
    subfields.push(("ipv6", Field::builder(FieldType::Ipv6).build()?));
    subfields.push((
        "dir",
        Field::builder(FieldType::EnumText)
            .enum_values(["src", "dst"])
            .build()?,
    ));
    subfields.push(("rdns", Field::builder(FieldType::DomainName).build()?));
    Ok(DictRules::new(subfields, &[], Some(("ip", "ipv6"))))
}

/// Resolve the cleaning rules for a field from its type defaults and
/// constructor arguments.
pub(crate) fn build_rules(reader: &ArgReader<'_>) -> Result<Rules, BuildError> {
    let rules = match reader.field_type {
        FieldType::Base => Rules::Passthrough,
        FieldType::DateTime => Rules::DateTime,
        FieldType::Integer | FieldType::Asn | FieldType::Port => {
            Rules::Integer(integer_rules(reader)?)
        }
        FieldType::Ipv4Net | FieldType::Ipv6Net => Rules::Network(text_rules(reader)?),
        FieldType::LimitedTextList => Rules::TextList(list_rules(reader)?, text_rules(reader)?),
        FieldType::Address => Rules::Dicts(list_rules(reader)?, Some(address_rules(false)?)),
        FieldType::ExtendedAddress => {
            Rules::Dicts(list_rules(reader)?, Some(address_rules(true)?))
        }
        FieldType::ListOfDicts => Rules::Dicts(list_rules(reader)?, None),
        _ => Rules::Text(text_rules(reader)?),
    };
    Ok(rules)
}

/// Sub-field names of a field's `extra_params` must be usable as the last
/// part of a dotted key.
pub(crate) fn check_subname(name: &str) -> Result<(), BuildError> {
    if name.is_empty() || !name.is_ascii() || name.contains('.') {
        return Err(BuildError::InvalidKey {
            key: name.to_string(),
            message: "extra-param names must be non-empty ASCII without dots".to_string(),
        });
    }
    Ok(())
}

/// Names of the keys an address-like dictionary may contain.
pub(crate) fn dict_keys(rules: &Rules) -> Option<BTreeSet<&str>> {
    match rules {
        Rules::Dicts(_, Some(dict)) => Some(dict.keys()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_round_trip() {
        for t in FieldType::ALL {
            assert_eq!(FieldType::parse(t.name()), Some(*t));
        }
        assert_eq!(FieldType::parse("unicode"), None);
    }

    #[test]
    fn accepted_arguments() {
        assert!(FieldType::Url.accepts("max_length"));
        assert!(FieldType::Url.accepts("in_params"));
        assert!(!FieldType::Url.accepts("regex"));
        assert!(FieldType::Source.accepts("regex"));
        assert!(FieldType::Port.accepts("min_value"));
        assert!(!FieldType::DateTime.accepts("max_length"));
    }

    #[test]
    fn result_only_types() {
        assert!(FieldType::Address.is_result_only());
        assert!(!FieldType::Ipv4.is_result_only());
    }

    #[test]
    fn subname_check() {
        assert!(check_subname("min").is_ok());
        assert!(check_subname("").is_err());
        assert!(check_subname("a.b").is_err());
        assert!(check_subname("mín").is_err());
    }
}
