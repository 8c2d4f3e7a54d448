//! Minimal ABI encoding for the token contract.
//!
//! Just enough to build the view calls and the purchase call, and to decode
//! their return values, without a full ABI parser.

use alloy_primitives::{keccak256, Address, B256, U256};

use super::error::RpcError;
use super::types::RpcLog;
use crate::domain::MintSplit;

pub const NAME_SIGNATURE: &str = "name()";
pub const SYMBOL_SIGNATURE: &str = "symbol()";
pub const DECIMALS_SIGNATURE: &str = "decimals()";
pub const TOTAL_SUPPLY_SIGNATURE: &str = "totalSupply()";
pub const BALANCE_OF_SIGNATURE: &str = "balanceOf(address)";
pub const BUY_GOLD_SIGNATURE: &str = "buyGold(address)";
pub const GOLD_PURCHASED_EVENT: &str = "GoldPurchased(address,uint256,uint256,uint256)";

const WORD: usize = 32;

/// First four bytes of the keccak hash of a function signature
pub fn selector(signature: &str) -> [u8; 4] {
    let hash = keccak256(signature.as_bytes());
    let mut out = [0u8; 4];
    out.copy_from_slice(&hash[..4]);
    out
}

/// Topic 0 of an event
pub fn event_topic(signature: &str) -> B256 {
    keccak256(signature.as_bytes())
}

/// `selector || word(args[0]) || word(args[1]) || ...`, every argument an
/// address left-padded to one 32-byte word
pub fn encode_call(signature: &str, args: &[Address]) -> Vec<u8> {
    let mut data = Vec::with_capacity(4 + args.len() * WORD);
    data.extend_from_slice(&selector(signature));
    for addr in args {
        let mut word = [0u8; WORD];
        word[12..].copy_from_slice(addr.as_slice());
        data.extend_from_slice(&word);
    }
    data
}

pub fn encode_balance_of(owner: Address) -> Vec<u8> {
    encode_call(BALANCE_OF_SIGNATURE, &[owner])
}

pub fn encode_buy_gold(profit_recipient: Address) -> Vec<u8> {
    encode_call(BUY_GOLD_SIGNATURE, &[profit_recipient])
}

fn word_at(data: &[u8], index: usize) -> Result<&[u8], RpcError> {
    let start = index * WORD;
    data.get(start..start + WORD).ok_or_else(|| {
        RpcError::Decode(format!(
            "expected at least {} bytes, got {}",
            start + WORD,
            data.len()
        ))
    })
}

/// Single uint256 return value
pub fn decode_uint256(data: &[u8]) -> Result<U256, RpcError> {
    Ok(U256::from_be_slice(word_at(data, 0)?))
}

/// uint8 return value, still padded to a full word
pub fn decode_uint8(data: &[u8]) -> Result<u8, RpcError> {
    let value = decode_uint256(data)?;
    u8::try_from(value).map_err(|_| RpcError::Decode(format!("{value} does not fit in uint8")))
}

/// String return value.
///
/// Accepts the standard dynamic encoding and the legacy `bytes32` form
/// some older tokens use for `name()` and `symbol()`.
pub fn decode_string(data: &[u8]) -> Result<String, RpcError> {
    if data.len() == WORD {
        return decode_bytes32_string(data);
    }

    let offset = word_to_usize(word_at(data, 0)?)?;
    let len_word = data
        .get(offset..offset + WORD)
        .ok_or_else(|| RpcError::Decode(format!("string offset {offset} out of range")))?;
    let len = word_to_usize(len_word)?;
    let start = offset + WORD;
    let bytes = data
        .get(start..start + len)
        .ok_or_else(|| RpcError::Decode(format!("string length {len} out of range")))?;

    String::from_utf8(bytes.to_vec()).map_err(|e| RpcError::Decode(format!("invalid utf-8: {e}")))
}

fn decode_bytes32_string(word: &[u8]) -> Result<String, RpcError> {
    let end = word.iter().position(|b| *b == 0).unwrap_or(word.len());
    String::from_utf8(word[..end].to_vec()).map_err(|e| RpcError::Decode(format!("invalid utf-8: {e}")))
}

fn word_to_usize(word: &[u8]) -> Result<usize, RpcError> {
    let value = U256::from_be_slice(word);
    usize::try_from(value).map_err(|_| RpcError::Decode(format!("offset {value} too large")))
}

/// Mint amounts from the first `GoldPurchased` log emitted by `contract`.
///
/// `userTokens` and `profitTokens` are the last two data words whether or
/// not `buyer` is indexed.
pub fn decode_gold_purchased(logs: &[RpcLog], contract: Address) -> Option<MintSplit> {
    let topic = event_topic(GOLD_PURCHASED_EVENT);
    let log = logs
        .iter()
        .find(|log| log.address == contract && log.topics.first() == Some(&topic))?;

    let words = log.data.len() / WORD;
    if words < 2 {
        tracing::debug!("GoldPurchased log with {} data bytes, ignoring", log.data.len());
        return None;
    }
    let user_tokens = U256::from_be_slice(word_at(&log.data, words - 2).ok()?);
    let profit_tokens = U256::from_be_slice(word_at(&log.data, words - 1).ok()?);

    Some(MintSplit {
        user_tokens,
        profit_tokens,
    })
}
