//! Address Validator
//!
//! Syntax checks and display helpers for EVM account identifiers.
//! Everything here is pure: no network access, no allocation beyond the
//! returned strings.

use std::str::FromStr;

use alloy_primitives::Address;
use thiserror::Error;

/// Number of hex digits after the `0x` prefix
pub const ADDRESS_HEX_LEN: usize = 40;

/// Prefix every account identifier carries
pub const ADDRESS_PREFIX: &str = "0x";

/// Default number of visible characters on each side of a shortened address
pub const SHORT_ADDRESS_CHARS: usize = 4;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AddressError {
    #[error("address must start with 0x")]
    MissingPrefix,

    #[error("expected 40 hex characters, got {0}")]
    InvalidLength(usize),

    #[error("address contains non-hex characters")]
    InvalidCharacter,
}

/// True iff `s` is `0x` followed by exactly 40 hex digits (either case).
pub fn is_valid_address(s: &str) -> bool {
    check_syntax(s).is_ok()
}

/// Parse a syntactically valid address into its typed form.
pub fn parse_address(s: &str) -> Result<Address, AddressError> {
    check_syntax(s)?;
    Address::from_str(s).map_err(|_| AddressError::InvalidCharacter)
}

/// EIP-55 mixed-case rendering, for display only.
pub fn checksum(address: &Address) -> String {
    address.to_checksum(None)
}

fn check_syntax(s: &str) -> Result<(), AddressError> {
    let hex_part = s
        .strip_prefix(ADDRESS_PREFIX)
        .ok_or(AddressError::MissingPrefix)?;

    let len = hex_part.chars().count();
    if len != ADDRESS_HEX_LEN {
        return Err(AddressError::InvalidLength(len));
    }

    if !hex_part.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(AddressError::InvalidCharacter);
    }

    Ok(())
}

/// Shorten an address to `0x1234...abcd` form.
///
/// Keeps `visible_chars + 2` leading characters (the prefix plus
/// `visible_chars` digits) and `visible_chars` trailing ones. Empty input
/// yields an empty string. Slicing is done on chars so arbitrary input never
/// panics. Purely cosmetic: never compare shortened addresses.
pub fn shorten_address(s: &str, visible_chars: usize) -> String {
    if s.is_empty() {
        return String::new();
    }

    let chars: Vec<char> = s.chars().collect();
    let head_len = (visible_chars + 2).min(chars.len());
    let tail_len = visible_chars.min(chars.len());

    let head: String = chars[..head_len].iter().collect();
    let tail: String = chars[chars.len() - tail_len..].iter().collect();
    format!("{head}...{tail}")
}

/// [`shorten_address`] with the default of four visible characters.
pub fn shorten_address_default(s: &str) -> String {
    shorten_address(s, SHORT_ADDRESS_CHARS)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::distributions::{Alphanumeric, Uniform};
    use rand::Rng;
    use regex::Regex;

    const HEX_DIGITS: &[u8] = b"0123456789abcdefABCDEF";

    fn random_hex(rng: &mut impl Rng, len: usize) -> String {
        let dist = Uniform::from(0..HEX_DIGITS.len());
        (0..len).map(|_| HEX_DIGITS[rng.sample(dist)] as char).collect()
    }

    #[test]
    fn test_accepts_known_addresses() {
        assert!(is_valid_address("0x000000000000000000000000000000000000dEaD"));
        assert!(is_valid_address("0xd8da6bf26964af9d7eed9e03e53415d37aa96045"));
        assert!(is_valid_address("0xD8DA6BF26964AF9D7EED9E03E53415D37AA96045"));
    }

    #[test]
    fn test_rejects_malformed_addresses() {
        assert!(!is_valid_address(""));
        assert!(!is_valid_address("0x"));
        assert!(!is_valid_address("d8da6bf26964af9d7eed9e03e53415d37aa96045"));
        assert!(!is_valid_address("0xd8da6bf26964af9d7eed9e03e53415d37aa9604"));
        assert!(!is_valid_address("0xd8da6bf26964af9d7eed9e03e53415d37aa960455"));
        assert!(!is_valid_address("0xg8da6bf26964af9d7eed9e03e53415d37aa96045"));
        assert!(!is_valid_address(" 0xd8da6bf26964af9d7eed9e03e53415d37aa96045"));
    }

    #[test]
    fn test_property_valid_iff_prefix_and_forty_hex() {
        let mut rng = rand::thread_rng();

        for _ in 0..500 {
            let len = rng.gen_range(0..60);
            let candidate = format!("0x{}", random_hex(&mut rng, len));
            assert_eq!(is_valid_address(&candidate), len == ADDRESS_HEX_LEN, "{candidate}");
        }

        for _ in 0..500 {
            let mut digits = random_hex(&mut rng, ADDRESS_HEX_LEN).into_bytes();
            let pos = rng.gen_range(0..digits.len());
            digits[pos] = b"ghxyzGHXYZ!-_ "[rng.gen_range(0..14)];
            let candidate = format!("0x{}", String::from_utf8(digits).unwrap());
            assert!(!is_valid_address(&candidate), "{candidate}");
        }

        for _ in 0..200 {
            let junk: String = (&mut rng)
                .sample_iter(&Alphanumeric)
                .take(42)
                .map(char::from)
                .collect();
            let expected = junk.starts_with("0x")
                && junk[2..].chars().all(|c| c.is_ascii_hexdigit());
            assert_eq!(is_valid_address(&junk), expected, "{junk}");
        }
    }

    #[test]
    fn test_parse_address_errors() {
        assert_eq!(parse_address("abc"), Err(AddressError::MissingPrefix));
        assert_eq!(parse_address("0x1234"), Err(AddressError::InvalidLength(4)));
        assert_eq!(
            parse_address("0xzz00000000000000000000000000000000000000"),
            Err(AddressError::InvalidCharacter)
        );
    }

    #[test]
    fn test_parse_and_checksum() {
        let addr = parse_address("0xd8da6bf26964af9d7eed9e03e53415d37aa96045").unwrap();
        assert_eq!(checksum(&addr), "0xd8dA6BF26964aF9D7eEd9e03E53415D37aA96045");
    }

    #[test]
    fn test_shorten_address_shape() {
        let shape = Regex::new(r"^0x[0-9a-fA-F]{4}\.\.\.[0-9a-fA-F]{4}$").unwrap();
        let mut rng = rand::thread_rng();

        for _ in 0..100 {
            let addr = format!("0x{}", random_hex(&mut rng, ADDRESS_HEX_LEN));
            let short = shorten_address_default(&addr);
            assert!(shape.is_match(&short), "{short}");
        }

        assert_eq!(
            shorten_address_default("0xd8da6bf26964af9d7eed9e03e53415d37aa96045"),
            "0xd8da...6045"
        );
    }

    #[test]
    fn test_shorten_address_empty_and_idempotent() {
        assert_eq!(shorten_address_default(""), "");

        let once = shorten_address_default("0xd8da6bf26964af9d7eed9e03e53415d37aa96045");
        let twice = shorten_address_default(&once);
        assert_eq!(once, twice);
    }

    #[test]
    fn test_shorten_address_short_and_unicode_input() {
        assert_eq!(shorten_address("0x1", 4), "0x1...0x1");
        assert_eq!(shorten_address("ééééééééééé", 2), "éééé...éé");
        assert_eq!(shorten_address("0xabcdef", 0), "0x...");
    }
}
