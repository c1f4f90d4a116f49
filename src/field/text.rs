//! Cleaning of text values: decoding, normalization and validation.

use std::net::Ipv6Addr;

use regex::Regex;

use super::FieldId;
use super::kind::FieldType;
use crate::encoding::{ascii_repr, ascii_str, decode_escaped, encode_escaped, ByteDecoding};
use crate::error::{FieldError, FieldValueError};
use crate::types::Value;

/// IPv6 normalization applied after decoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Ipv6Form {
    Address,
    Network,
}

/// Case folding applied after decoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Case {
    Lower,
    Upper,
}

#[derive(Debug, Clone)]
pub(crate) struct HexDigest {
    pub num_of_characters: usize,
    pub hash_algo_descr: String,
}

/// Everything a text-family field checks, resolved from its type defaults
/// and constructor arguments.
#[derive(Debug, Clone)]
pub(crate) struct TextRules {
    pub decoding: ByteDecoding,
    pub idna: bool,
    pub case: Option<Case>,
    pub ipv6: Option<Ipv6Form>,
    pub max_length: Option<usize>,
    pub checking_bytes_length: bool,
    pub enum_values: Option<Vec<String>>,
    pub regex: Option<Regex>,
    pub error_msg_template: String,
    pub hex_digest: Option<HexDigest>,
    pub numeric_tld_check: bool,
}

/// Identity of the field running the checks, attached to too-long errors.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Owner {
    pub id: FieldId,
    pub field_type: FieldType,
}

pub(crate) fn fill_template(template: &str, value: &str) -> String {
    template.replacen("{}", value, 1)
}

impl TextRules {
    pub fn clean_param(&self, owner: Owner, value: &Value) -> Result<String, FieldError> {
        if !value.is_text() {
            return Err(FieldError::type_error(format!(
                "{} is not a str/unicode instance",
                ascii_repr(value)
            )));
        }
        self.clean(owner, value)
    }

    pub fn clean_result(&self, owner: Owner, value: &Value) -> Result<String, FieldError> {
        if !value.is_text() {
            return Err(FieldError::type_error(format!(
                "{} is not a str/unicode instance",
                ascii_repr(value)
            )));
        }
        self.clean(owner, value)
    }

    fn clean(&self, owner: Owner, value: &Value) -> Result<String, FieldError> {
        let fixed = self.fix(value)?;
        self.validate(owner, &fixed)?;
        Ok(fixed)
    }

    pub fn template_error(&self, value: &str) -> FieldError {
        FieldValueError::new(fill_template(&self.error_msg_template, &ascii_str(value))).into()
    }

    fn decode(&self, value: &Value) -> Result<String, FieldError> {
        match value {
            Value::Str(s) => Ok(s.clone()),
            Value::Bytes(bytes) => match self.decoding {
                ByteDecoding::Escape => Ok(decode_escaped(bytes)),
                ByteDecoding::Strict => String::from_utf8(bytes.clone()).map_err(|_| {
                    FieldValueError::new(format!(
                        "\"{}\" cannot be decoded with the UTF-8 encoding",
                        ascii_str(&decode_escaped(bytes))
                    ))
                    .into()
                }),
            },
            other => Err(FieldError::type_error(format!(
                "{} is not a str/unicode instance",
                ascii_repr(other)
            ))),
        }
    }

    fn fix(&self, value: &Value) -> Result<String, FieldError> {
        let mut text = self.decode(value)?;
        if self.idna {
            text = idna_encode(&text)?;
        }
        match self.case {
            Some(Case::Lower) => text = text.to_lowercase(),
            Some(Case::Upper) => text = text.to_uppercase(),
            None => {}
        }
        if let Some(form) = self.ipv6 {
            text = normalize_ipv6(&text, form).ok_or_else(|| self.template_error(&text))?;
        }
        Ok(text)
    }

    fn validate(&self, owner: Owner, value: &str) -> Result<(), FieldError> {
        if let Some(regex) = &self.regex {
            if !regex.is_match(value) {
                return Err(self.template_error(value));
            }
        }
        if self.numeric_tld_check && has_numeric_tld(value) {
            return Err(self.template_error(value));
        }
        if let Some(max_length) = self.max_length {
            self.check_length(owner, value, max_length)?;
        }
        if let Some(enum_values) = &self.enum_values {
            if !enum_values.iter().any(|v| v == value) {
                let allowed = enum_values
                    .iter()
                    .map(|v| format!("\"{}\"", ascii_str(v)))
                    .collect::<Vec<_>>()
                    .join(", ");
                return Err(FieldValueError::new(format!(
                    "\"{}\" is not one of: {}",
                    ascii_str(value),
                    allowed
                ))
                .into());
            }
        }
        if let Some(hex) = &self.hex_digest {
            let valid = value.len() == hex.num_of_characters
                && value.chars().all(|c| c.is_ascii_hexdigit());
            if !valid {
                return Err(FieldValueError::new(format!(
                    "\"{}\" is not a valid {} hash",
                    ascii_str(value),
                    hex.hash_algo_descr
                ))
                .into());
            }
        }
        Ok(())
    }

    fn check_length(&self, owner: Owner, value: &str, max_length: usize) -> Result<(), FieldError> {
        let (length, checked_value) = if self.checking_bytes_length {
            let encoded = encode_escaped(value);
            (encoded.len(), Value::Bytes(encoded))
        } else {
            (value.chars().count(), Value::Str(value.to_string()))
        };
        if length > max_length {
            return Err(FieldValueError::TooLong {
                field: owner.id,
                field_type: owner.field_type,
                checked_value,
                max_length,
                public_message: format!(
                    "Length of \"{}\" is greater than {}",
                    ascii_str(value),
                    max_length
                ),
            }
            .into());
        }
        Ok(())
    }
}

fn idna_encode(value: &str) -> Result<String, FieldError> {
    let err = || {
        FieldError::from(FieldValueError::new(format!(
            "\"{}\" could not be encoded using the IDNA encoding",
            ascii_str(value)
        )))
    };
    if value.is_empty() {
        return Ok(String::new());
    }
    let encoded = idna::domain_to_ascii(value).map_err(|_| err())?;
    let labels: Vec<&str> = encoded.split('.').collect();
    let last = labels.len() - 1;
    for (i, label) in labels.iter().enumerate() {
        // a single trailing dot is allowed
        let trailing = i == last && i > 0;
        if (label.is_empty() && !trailing) || label.len() > 63 {
            return Err(err());
        }
    }
    Ok(encoded.to_lowercase())
}

fn has_numeric_tld(domain: &str) -> bool {
    domain
        .rsplit('.')
        .next()
        .is_some_and(|tld| !tld.is_empty() && tld.chars().all(|c| c.is_ascii_digit()))
}

/// Normalize an IPv6 address, or an address followed by `/prefix`.
fn normalize_ipv6(value: &str, form: Ipv6Form) -> Option<String> {
    match (form, value.split_once('/')) {
        (Ipv6Form::Address, None) => value.parse::<Ipv6Addr>().ok().map(|ip| ip.to_string()),
        (Ipv6Form::Address, Some(_)) | (Ipv6Form::Network, None) => None,
        (Ipv6Form::Network, Some((ip, prefix))) => {
            let ip = ip.parse::<Ipv6Addr>().ok()?;
            if prefix.is_empty() || !prefix.chars().all(|c| c.is_ascii_digit()) {
                return None;
            }
            let prefix: u8 = prefix.parse().ok()?;
            (prefix <= 128).then(|| format!("{}/{}", ip, prefix))
        }
    }
}

/// Split a cleaned network specification into address and prefix length.
pub(crate) fn split_network(value: &str) -> Option<(String, u8)> {
    let (ip, prefix) = value.split_once('/')?;
    Some((ip.to_string(), prefix.parse().ok()?))
}
