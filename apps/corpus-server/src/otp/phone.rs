// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Phone number normalization.
//!
//! Accepts E.164-shaped input (`+` optional, first digit 1-9, 2 to 15
//! digits) after stripping spaces, dashes and parentheses. Numbers without
//! a `+` are only accepted when the country code can be inferred:
//!
//! - 12 digits starting with `91` → `+91…`
//! - 10 digits → `+91` prepended

use super::OtpError;

const DEFAULT_COUNTRY_CODE: &str = "+91";

/// Normalize a user-supplied phone number.
pub fn normalize_phone(input: &str) -> Result<String, OtpError> {
    let cleaned: String = input
        .chars()
        .filter(|c| !c.is_whitespace() && !matches!(c, '-' | '(' | ')'))
        .collect();

    let (has_plus, digits) = match cleaned.strip_prefix('+') {
        Some(rest) => (true, rest),
        None => (false, cleaned.as_str()),
    };

    let well_formed = (2..=15).contains(&digits.len())
        && digits.chars().all(|c| c.is_ascii_digit())
        && !digits.starts_with('0');
    if !well_formed {
        return Err(OtpError::InvalidPhone("Invalid phone number format".to_string()));
    }

    if has_plus {
        Ok(cleaned)
    } else if digits.len() == 12 && digits.starts_with("91") {
        Ok(format!("+{digits}"))
    } else if digits.len() == 10 {
        Ok(format!("{DEFAULT_COUNTRY_CODE}{digits}"))
    } else {
        Err(OtpError::InvalidPhone(
            "Phone number must include country code".to_string(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keeps_international_numbers() {
        assert_eq!(normalize_phone("+919177980938").unwrap(), "+919177980938");
        assert_eq!(normalize_phone("+1 (415) 555-0100").unwrap(), "+14155550100");
    }

    #[test]
    fn infers_indian_country_code() {
        assert_eq!(normalize_phone("919177980938").unwrap(), "+919177980938");
        assert_eq!(normalize_phone("91779 80938").unwrap(), "+919177980938");
    }

    #[test]
    fn rejects_missing_country_code() {
        let err = normalize_phone("14155550100").unwrap_err();
        assert!(err.to_string().contains("country code"));
    }

    #[test]
    fn rejects_malformed_input() {
        for bad in ["", "+", "+0123456789", "phone", "+1234567890123456", "12a4567890"] {
            assert!(normalize_phone(bad).is_err(), "{bad} should be rejected");
        }
    }
}
