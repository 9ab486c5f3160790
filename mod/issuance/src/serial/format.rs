use stamp_core::ServiceError;

/// Highest sequence number the fixed-width 6-digit suffix can carry.
/// Allocation past this is refused; widening the format is an open
/// policy question for the issuing authority.
pub const SUFFIX_MAX: u64 = 999_999;

/// A serial number split into its three fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedSerial {
    pub prefix: String,
    pub year: i32,
    pub suffix: u64,
}

/// Render a serial number as `PREFIX-YYYY-NNNNNN`.
pub fn format_serial(prefix: &str, year: i32, suffix: u64) -> Result<String, ServiceError> {
    if prefix.is_empty() || prefix.contains('-') {
        return Err(ServiceError::Validation(format!(
            "invalid serial prefix {prefix:?}"
        )));
    }
    if !(1000..=9999).contains(&year) {
        return Err(ServiceError::Validation(format!(
            "serial year {year} out of range"
        )));
    }
    if suffix == 0 || suffix > SUFFIX_MAX {
        return Err(ServiceError::Validation(format!(
            "serial sequence {suffix} exhausts the 6-digit suffix for year {year}"
        )));
    }
    Ok(format!("{prefix}-{year:04}-{suffix:06}"))
}

/// Parse `PREFIX-YYYY-NNNNNN` back into its fields.
pub fn parse_serial(serial: &str) -> Result<ParsedSerial, ServiceError> {
    let invalid = || ServiceError::Validation(format!("invalid serial number {serial:?}"));

    let mut parts = serial.rsplitn(3, '-');
    let suffix_part = parts.next().ok_or_else(invalid)?;
    let year_part = parts.next().ok_or_else(invalid)?;
    let prefix = parts.next().ok_or_else(invalid)?;

    if prefix.is_empty() || suffix_part.len() != 6 || year_part.len() != 4 {
        return Err(invalid());
    }
    let year: i32 = year_part.parse().map_err(|_| invalid())?;
    let suffix: u64 = suffix_part.parse().map_err(|_| invalid())?;
    if suffix == 0 || suffix > SUFFIX_MAX {
        return Err(invalid());
    }

    Ok(ParsedSerial {
        prefix: prefix.to_string(),
        year,
        suffix,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_zero_pads_suffix() {
        assert_eq!(format_serial("KBS", 2026, 1).unwrap(), "KBS-2026-000001");
        assert_eq!(
            format_serial("KBS", 2026, 999_999).unwrap(),
            "KBS-2026-999999"
        );
    }

    #[test]
    fn format_rejects_exhausted_suffix() {
        assert!(format_serial("KBS", 2026, 1_000_000).is_err());
        assert!(format_serial("KBS", 2026, 0).is_err());
    }

    #[test]
    fn format_rejects_bad_prefix() {
        assert!(format_serial("", 2026, 1).is_err());
        assert!(format_serial("K-BS", 2026, 1).is_err());
    }

    #[test]
    fn parse_roundtrip() {
        let parsed = parse_serial("KBS-2026-002500").unwrap();
        assert_eq!(
            parsed,
            ParsedSerial {
                prefix: "KBS".into(),
                year: 2026,
                suffix: 2500,
            }
        );
    }

    #[test]
    fn parse_rejects_malformed() {
        assert!(parse_serial("KBS-2026").is_err());
        assert!(parse_serial("KBS-26-000001").is_err());
        assert!(parse_serial("KBS-2026-1").is_err());
        assert!(parse_serial("KBS-2026-00000X").is_err());
        assert!(parse_serial("-2026-000001").is_err());
    }
}
