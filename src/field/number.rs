//! Integer-valued fields: plain integers, AS numbers and ports.

use crate::encoding::{ascii_repr, decode_escaped};
use crate::error::{FieldError, FieldValueError};
use crate::types::Value;

use super::text::fill_template;

#[derive(Debug, Clone)]
pub(crate) struct IntegerRules {
    pub min_value: Option<i64>,
    pub max_value: Option<i64>,
    /// Replaces the message of any value error this field raises.
    pub error_msg_template: Option<String>,
    /// Accept the `high.low` AS number notation.
    pub asn_notation: bool,
}

impl IntegerRules {
    pub fn clean_param(&self, value: &Value) -> Result<i64, FieldError> {
        if !value.is_text() {
            return Err(FieldError::type_error(format!(
                "{} is not a str/unicode instance",
                ascii_repr(value)
            )));
        }
        self.clean(value)
    }

    pub fn clean_result(&self, value: &Value) -> Result<i64, FieldError> {
        self.clean(value)
    }

    fn clean(&self, value: &Value) -> Result<i64, FieldError> {
        let number = self.coerce(value).map_err(|e| self.override_message(e, value))?;
        self.check_range(number)
            .map_err(|e| self.override_message(e, &Value::Int(number)))?;
        Ok(number)
    }

    fn override_message(&self, error: FieldValueError, shown: &Value) -> FieldError {
        match &self.error_msg_template {
            Some(template) => {
                FieldValueError::new(fill_template(template, &ascii_repr(shown))).into()
            }
            None => error.into(),
        }
    }

    fn coerce(&self, value: &Value) -> Result<i64, FieldValueError> {
        let not_integer = || {
            FieldValueError::new(format!(
                "\"{}\" cannot be interpreted as an integer number",
                ascii_repr(value)
            ))
        };
        match value {
            Value::Int(n) => Ok(*n),
            Value::Str(s) => self.parse(s).ok_or_else(not_integer),
            Value::Bytes(b) => self.parse(&decode_escaped(b)).ok_or_else(not_integer),
            Value::Float(f) if !self.asn_notation => {
                let integral = f.is_finite() && f.fract() == 0.0;
                if integral && *f >= i64::MIN as f64 && *f < i64::MAX as f64 {
                    Ok(*f as i64)
                } else {
                    Err(not_integer())
                }
            }
            _ => Err(not_integer()),
        }
    }

    fn parse(&self, s: &str) -> Option<i64> {
        let s = s.trim();
        if self.asn_notation {
            if let Some((high, low)) = s.split_once('.') {
                return parse_asn_dotted(high, low);
            }
        }
        s.parse().ok()
    }

    fn check_range(&self, number: i64) -> Result<(), FieldValueError> {
        if let Some(min) = self.min_value {
            if number < min {
                return Err(FieldValueError::new(format!(
                    "{} is lesser than {}",
                    number, min
                )));
            }
        }
        if let Some(max) = self.max_value {
            if number > max {
                return Err(FieldValueError::new(format!(
                    "{} is greater than {}",
                    number, max
                )));
            }
        }
        Ok(())
    }
}

/// `high.low` notation: `high * 65536 + low`, `low` in 0..=65535.
fn parse_asn_dotted(high: &str, low: &str) -> Option<i64> {
    let high: i64 = high.trim().parse().ok()?;
    let low: i64 = low.trim().parse().ok()?;
    if !(0..=0xFFFF).contains(&low) {
        return None;
    }
    high.checked_mul(0x1_0000)?.checked_add(low)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plain() -> IntegerRules {
        IntegerRules {
            min_value: Some(-10),
            max_value: Some(10),
            error_msg_template: None,
            asn_notation: false,
        }
    }

    fn asn() -> IntegerRules {
        IntegerRules {
            min_value: Some(0),
            max_value: Some(0xFFFF_FFFF),
            error_msg_template: Some("\"{}\" is not a valid Autonomous System Number".into()),
            asn_notation: true,
        }
    }

    #[test]
    fn plain_integers() {
        let rules = plain();
        assert_eq!(rules.clean_param(&Value::from(" -7 ")).unwrap(), -7);
        assert_eq!(rules.clean_result(&Value::Float(3.0)).unwrap(), 3);
        assert_eq!(
            rules.clean_result(&Value::Float(3.5)).unwrap_err().to_string(),
            "\"3.5\" cannot be interpreted as an integer number"
        );
        assert_eq!(
            rules.clean_param(&Value::from("11")).unwrap_err().to_string(),
            "11 is greater than 10"
        );
        assert_eq!(
            rules.clean_param(&Value::from("-11")).unwrap_err().to_string(),
            "-11 is lesser than -10"
        );
    }

    #[test]
    fn param_must_be_text() {
        let err = plain().clean_param(&Value::Int(1)).unwrap_err();
        assert!(matches!(err, FieldError::Type { .. }));
    }

    #[test]
    fn asn_dotted_notation() {
        let rules = asn();
        assert_eq!(rules.clean_param(&Value::from("1.1")).unwrap(), 65537);
        assert_eq!(rules.clean_param(&Value::from("65535.65535")).unwrap(), 0xFFFF_FFFF);
        assert_eq!(
            rules.clean_param(&Value::from("1.65536")).unwrap_err().to_string(),
            "\"1.65536\" is not a valid Autonomous System Number"
        );
        assert_eq!(
            rules.clean_result(&Value::Float(5.0)).unwrap_err().to_string(),
            "\"5\" is not a valid Autonomous System Number"
        );
        assert_eq!(
            rules.clean_param(&Value::from("65536.0")).unwrap_err().to_string(),
            "\"4294967296\" is not a valid Autonomous System Number"
        );
    }

    #[test]
    fn dotted_overflow_is_rejected() {
        assert_eq!(parse_asn_dotted("9223372036854775807", "1"), None);
    }
}
