//! Regular expression patterns used by the built-in field types.
//!
//! Patterns are plain strings; each field compiles its own copy when it is
//! constructed, so a custom layer can swap one in through an Ext.

/// Two-character country code.
pub const CC_SIMPLE: &str = r"^[A-Z][A-Z12]$";

/// Domain name, underscore allowed. The "top-level label is not all digits"
/// rule is checked by the domain name field itself.
pub const DOMAIN_ASCII_LOWERCASE: &str = r"^(?:[\-0-9a-z_]{1,63}\.)*[\-0-9a-z_]{1,63}$";

/// IPv4 address in decimal dotted-quad notation.
pub const IPV4_STRICT_DECIMAL: &str =
    r"^(?:(?:25[0-5]|2[0-4][0-9]|1[0-9][0-9]|[1-9]?[0-9])\.){3}(?:25[0-5]|2[0-4][0-9]|1[0-9][0-9]|[1-9]?[0-9])$";

/// Anonymized IPv4 address: the first octet (and possibly others) is `x`.
pub const IPV4_ANONYMIZED: &str =
    r"^x(?:\.(?:(?:25[0-5]|2[0-4][0-9]|1[0-9][0-9]|[1-9]?[0-9])|x)){3}$";

/// IPv4 network in CIDR notation.
pub const IPV4_CIDR_NETWORK: &str =
    r"^(?:(?:25[0-5]|2[0-4][0-9]|1[0-9][0-9]|[1-9]?[0-9])\.){3}(?:25[0-5]|2[0-4][0-9]|1[0-9][0-9]|[1-9]?[0-9])/(?:3[0-2]|[12]?[0-9])$";

/// Dot-separated source specification, e.g. `my-org.type`.
pub const SOURCE: &str = r"^[\-0-9a-z]+\.[\-0-9a-z]+$";

/// E-mail address (very rough validation).
pub const EMAIL_SIMPLIFIED: &str = r"^[^@\s]+@[^@\s]+$";

/// International Bank Account Number.
pub const IBAN: &str = r"^[A-Z]{2}[0-9]{2}[0-9A-Z]{8,30}$";

/// ISO-8601 date + time. Ranges are checked by the parser, not here.
///
/// Digits are ASCII only; `\d` would also match other Unicode digits.
pub const ISO_DATETIME: &str = r"(?x)
    ^
    (?P<year>[0-9]{4})
    -?
    (?:
        (?P<month>[0-9]{2}) -? (?P<day>[0-9]{2})
    |
        W (?P<isoweek>[0-9]{2}) -? (?P<isoweekday>[0-9])
    |
        (?P<ordinalday>[0-9]{3})
    )
    [T\s]
    (?P<hour>[0-9]{2})
    :?
    (?P<minute>[0-9]{2})
    (?:
        :?
        (?P<second>[0-9]{2})
        (?: \. (?P<secondfraction>[0-9]+) )?
    )?
    (?:
        Z
    |
        (?P<tzhour>[+-][0-9]{2})
        (?: :? (?P<tzminute>[0-9]{2}) )?
    )?
    $
";
