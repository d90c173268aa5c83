//! Offline mint-entry validation.

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex_lite::Regex;

use super::traits::MintValidator;

/// Token amounts carry nine decimal places.
pub const AMOUNT_DECIMALS: u32 = 9;

static ADDRESS_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^B62[1-9A-HJ-NP-Za-km-z]{52}$").expect("address pattern is valid")
});

/// Convert a decimal amount string to base units.
///
/// Returns `None` for anything that is not a plain positive decimal with at
/// most [`AMOUNT_DECIMALS`] fractional digits that fits in a `u64`.
pub fn parse_amount(amount: &str) -> Option<u64> {
    let amount = amount.trim();
    let (whole, frac) = match amount.split_once('.') {
        Some((w, f)) => (w, f),
        None => (amount, ""),
    };
    if whole.is_empty() && frac.is_empty() {
        return None;
    }
    if !whole.bytes().all(|b| b.is_ascii_digit()) || !frac.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    if frac.len() > AMOUNT_DECIMALS as usize {
        return None;
    }

    let scale = 10u64.pow(AMOUNT_DECIMALS);
    let whole: u64 = if whole.is_empty() { 0 } else { whole.parse().ok()? };
    let frac_units: u64 = if frac.is_empty() {
        0
    } else {
        let padded = format!("{:0<width$}", frac, width = AMOUNT_DECIMALS as usize);
        padded.parse().ok()?
    };

    let units = whole.checked_mul(scale)?.checked_add(frac_units)?;
    (units > 0).then_some(units)
}

/// Render base units as a decimal string without trailing fractional zeros.
pub fn format_amount(units: u64) -> String {
    let scale = 10u64.pow(AMOUNT_DECIMALS);
    let whole = units / scale;
    let frac = units % scale;
    if frac == 0 {
        return whole.to_string();
    }
    let frac = format!("{:0>width$}", frac, width = AMOUNT_DECIMALS as usize);
    format!("{}.{}", whole, frac.trim_end_matches('0'))
}

/// Checks amounts and address shape without contacting the chain.
#[derive(Debug, Clone, Default)]
pub struct AddressValidator;

impl AddressValidator {
    pub fn new() -> Self {
        Self
    }

    pub fn is_valid_address(address: &str) -> bool {
        ADDRESS_RE.is_match(address)
    }
}

#[async_trait]
impl MintValidator for AddressValidator {
    async fn is_valid_mint_entry(&self, amount: &str, to: &str) -> bool {
        parse_amount(amount).is_some() && Self::is_valid_address(to.trim())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ADDRESS: &str = "B62qobAYQBkpC8wVnRzydrtCgWdkYTqsfXTcaLdGq1imtqtKgAHN29K";

    #[test]
    fn test_format_amount() {
        assert_eq!(format_amount(1_000_000_000_000), "1000");
        assert_eq!(format_amount(500_000_000), "0.5");
        assert_eq!(format_amount(1_000_000_001), "1.000000001");
        assert_eq!(format_amount(parse_amount("007.250").unwrap()), "7.25");
    }

    #[test]
    fn test_parse_amount_whole_and_fraction() {
        assert_eq!(parse_amount("1000"), Some(1_000_000_000_000));
        assert_eq!(parse_amount("0.5"), Some(500_000_000));
        assert_eq!(parse_amount("1.000000001"), Some(1_000_000_001));
        assert_eq!(parse_amount(".25"), Some(250_000_000));
        assert_eq!(parse_amount("  2 "), Some(2_000_000_000));
    }

    #[test]
    fn test_parse_amount_rejects_invalid() {
        assert_eq!(parse_amount(""), None);
        assert_eq!(parse_amount("."), None);
        assert_eq!(parse_amount("0"), None);
        assert_eq!(parse_amount("0.000"), None);
        assert_eq!(parse_amount("-5"), None);
        assert_eq!(parse_amount("1e3"), None);
        assert_eq!(parse_amount("abc"), None);
        assert_eq!(parse_amount("0.0000000001"), None);
        assert_eq!(parse_amount("99999999999999999999"), None);
    }

    #[test]
    fn test_address_shape() {
        assert!(AddressValidator::is_valid_address(ADDRESS));
        assert!(!AddressValidator::is_valid_address(""));
        assert!(!AddressValidator::is_valid_address("B62qshort"));
        // '0' and 'l' are outside the base58 alphabet
        assert!(!AddressValidator::is_valid_address(
            "B62qobAYQBkpC8wVnRzydrtCgWdkYTqsfXTcaLdGq1imtqtKgAHN290"
        ));
        assert!(!AddressValidator::is_valid_address(
            "X62qobAYQBkpC8wVnRzydrtCgWdkYTqsfXTcaLdGq1imtqtKgAHN29K"
        ));
    }

    #[tokio::test]
    async fn test_validator_contract() {
        let validator = AddressValidator::new();
        assert!(validator.is_valid_mint_entry("1000", ADDRESS).await);
        assert!(!validator.is_valid_mint_entry("0", ADDRESS).await);
        assert!(!validator.is_valid_mint_entry("10", "not-an-address").await);
    }
}
