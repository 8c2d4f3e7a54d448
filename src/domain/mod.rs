//! Domain Layer - Core types for goldmint
//!
//! Pure types and logic with no I/O. All chain interaction happens through
//! the ports layer.

pub mod address;
pub mod units;
pub mod snapshot;
pub mod purchase;

pub use address::{
    checksum, is_valid_address, parse_address, shorten_address, shorten_address_default,
    AddressError, SHORT_ADDRESS_CHARS,
};
pub use units::{format_fixed, format_units, parse_units, UnitsError, ETHER_DECIMALS};
pub use snapshot::{TokenSnapshot, DEFAULT_TOKEN_DECIMALS, DISPLAY_DECIMALS};
pub use purchase::{
    parse_native_amount, InvalidPurchase, MintSource, MintSplit, PurchasePhase, PurchaseRequest, ValidatedPurchase,
    BPS_DENOMINATOR, DEFAULT_PROFIT_BPS,
};
