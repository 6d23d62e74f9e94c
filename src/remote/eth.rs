//! ERC-20 token transfers over an Ethereum JSON-RPC node.
//!
//! The funding account must be unlocked on the node: transfers are sent with
//! `eth_sendTransaction` and signed node-side.

use super::{RemoteLedger, RemoteTransferStatus, TransferHandle};
use crate::amount::Amount;
use crate::config::PayoutConfig;
use crate::error::RemoteError;
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicU64, Ordering};

/// `transfer(address,uint256)`
const TRANSFER_SELECTOR: &str = "a9059cbb";
/// `balanceOf(address)`
const BALANCE_OF_SELECTOR: &str = "70a08231";
/// `symbol()`
const SYMBOL_SELECTOR: &str = "95d89b41";

#[derive(Debug, Serialize)]
struct RpcRequest<'a> {
    jsonrpc: &'static str,
    id: u64,
    method: &'a str,
    params: Value,
}

#[derive(Debug, Deserialize)]
struct RpcResponse {
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<RpcErrorObject>,
}

#[derive(Debug, Deserialize)]
struct RpcErrorObject {
    code: i64,
    message: String,
}

/// Client for one ERC-20 token contract on one node.
pub struct EthTokenClient {
    http: reqwest::blocking::Client,
    rpc_url: String,
    token_contract: String,
    decimals: u32,
    gas_limit: u64,
    gas_price_wei: u128,
    next_id: AtomicU64,
}

impl EthTokenClient {
    pub fn new(config: &PayoutConfig) -> Result<Self, RemoteError> {
        let http = reqwest::blocking::Client::builder()
            .timeout(config.rpc_timeout)
            .build()?;

        Ok(EthTokenClient {
            http,
            rpc_url: config.rpc_url.clone(),
            token_contract: config.token_contract.clone(),
            decimals: config.token_decimals,
            gas_limit: config.gas_limit,
            gas_price_wei: config.gas_price_wei,
            next_id: AtomicU64::new(1),
        })
    }

    /// Accounts managed (and unlocked) by the node.
    pub fn accounts(&self) -> Result<Vec<String>, RemoteError> {
        let result = self.call("eth_accounts", json!([]))?;
        serde_json::from_value(result)
            .map_err(|e| RemoteError::Malformed(format!("eth_accounts: {}", e)))
    }

    /// The token's ticker symbol.
    pub fn token_symbol(&self) -> Result<String, RemoteError> {
        let data = self.eth_call(&format!("0x{}", SYMBOL_SELECTOR))?;
        decode_abi_string(&data)
    }

    fn eth_call(&self, data: &str) -> Result<String, RemoteError> {
        let result = self.call(
            "eth_call",
            json!([{ "to": self.token_contract, "data": data }, "latest"]),
        )?;
        result
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| RemoteError::Malformed(format!("eth_call returned {}", result)))
    }

    fn call(&self, method: &str, params: Value) -> Result<Value, RemoteError> {
        let request = RpcRequest {
            jsonrpc: "2.0",
            id: self.next_id.fetch_add(1, Ordering::Relaxed),
            method,
            params,
        };
        debug!("RPC {} -> {}", method, self.rpc_url);

        let response: RpcResponse = self
            .http
            .post(&self.rpc_url)
            .json(&request)
            .send()?
            .error_for_status()?
            .json()?;

        if let Some(err) = response.error {
            return Err(RemoteError::Rpc {
                code: err.code,
                message: err.message,
            });
        }
        Ok(response.result.unwrap_or(Value::Null))
    }

    fn lookup(&self, handle: &TransferHandle) -> Result<RemoteTransferStatus, RemoteError> {
        let tx = self.call("eth_getTransactionByHash", json!([handle.as_str()]))?;
        if tx.is_null() {
            return Ok(RemoteTransferStatus::Dropped);
        }
        if tx.get("blockNumber").map_or(true, Value::is_null) {
            return Ok(RemoteTransferStatus::Pending);
        }

        let receipt = self.call("eth_getTransactionReceipt", json!([handle.as_str()]))?;
        if receipt.is_null() {
            return Ok(RemoteTransferStatus::Pending);
        }
        receipt_status(&receipt)
    }
}

impl RemoteLedger for EthTokenClient {
    fn current_balance(&self, account: &str) -> Result<Amount, RemoteError> {
        let data = balance_of_calldata(account)?;
        let units = parse_quantity(&self.eth_call(&data)?)?;
        Amount::from_base_units(units, self.decimals)
            .ok_or_else(|| RemoteError::Amount(format!("balance {} out of range", units)))
    }

    fn submit_transfer(
        &self,
        from: &str,
        to: &str,
        amount: Amount,
    ) -> Result<TransferHandle, RemoteError> {
        let units = transfer_units(amount, self.decimals)?;

        let tx = json!({
            "from": from,
            "to": self.token_contract,
            "gas": format!("0x{:x}", self.gas_limit),
            "gasPrice": format!("0x{:x}", self.gas_price_wei),
            "data": transfer_calldata(to, units)?,
        });

        let result = self.call("eth_sendTransaction", json!([tx]))?;
        match result.as_str() {
            Some(hash) if !hash.is_empty() => Ok(TransferHandle::new(hash)),
            _ => Err(RemoteError::Rejected(format!(
                "node returned no transaction hash: {}",
                result
            ))),
        }
    }

    fn query_transfer(&self, handle: &TransferHandle) -> RemoteTransferStatus {
        match self.lookup(handle) {
            Ok(status) => status,
            Err(e) => RemoteTransferStatus::LookupFailed {
                reason: e.to_string(),
            },
        }
    }
}

/// Scales a transfer amount to base units. A positive amount below one base
/// unit rounds to zero; that still goes out, but is worth a warning.
fn transfer_units(amount: Amount, decimals: u32) -> Result<u128, RemoteError> {
    let units = amount.to_base_units(decimals).ok_or_else(|| {
        RemoteError::Amount(format!("{} cannot be expressed in base units", amount))
    })?;
    if units == 0 && amount.is_positive() {
        warn!(
            "Amount {} is below one base unit at {} decimals, transferring 0",
            amount, decimals
        );
    }
    Ok(units)
}

fn receipt_status(receipt: &Value) -> Result<RemoteTransferStatus, RemoteError> {
    match receipt.get("status").and_then(Value::as_str) {
        Some("0x1") => Ok(RemoteTransferStatus::Confirmed),
        Some("0x0") => Ok(RemoteTransferStatus::Reverted),
        // pre-Byzantium receipts have no status field
        None => Ok(RemoteTransferStatus::Confirmed),
        Some(other) => Err(RemoteError::Malformed(format!(
            "unexpected receipt status {}",
            other
        ))),
    }
}

/// Left-pads a 20-byte address into a 32-byte ABI word.
fn address_word(address: &str) -> Result<String, RemoteError> {
    let hex_part = address
        .strip_prefix("0x")
        .or_else(|| address.strip_prefix("0X"))
        .unwrap_or(address);
    if hex_part.len() != 40 || hex::decode(hex_part).is_err() {
        return Err(RemoteError::Malformed(format!("bad address {}", address)));
    }
    Ok(format!("{:0>64}", hex_part.to_ascii_lowercase()))
}

fn balance_of_calldata(owner: &str) -> Result<String, RemoteError> {
    Ok(format!("0x{}{}", BALANCE_OF_SELECTOR, address_word(owner)?))
}

fn transfer_calldata(to: &str, units: u128) -> Result<String, RemoteError> {
    Ok(format!("0x{}{}{:064x}", TRANSFER_SELECTOR, address_word(to)?, units))
}

/// Parses a hex quantity or 32-byte word into a `u128`.
fn parse_quantity(raw: &str) -> Result<u128, RemoteError> {
    let digits = raw.strip_prefix("0x").unwrap_or(raw).trim_start_matches('0');
    if digits.is_empty() {
        return Ok(0);
    }
    if digits.len() > 32 {
        return Err(RemoteError::Amount(format!("{} exceeds 128 bits", raw)));
    }
    u128::from_str_radix(digits, 16)
        .map_err(|e| RemoteError::Malformed(format!("bad quantity {}: {}", raw, e)))
}

/// Decodes an ABI-encoded `string` return value. Falls back to a
/// NUL-padded `bytes32`, which some older tokens return from `symbol()`.
fn decode_abi_string(raw: &str) -> Result<String, RemoteError> {
    let bytes = hex::decode(raw.strip_prefix("0x").unwrap_or(raw))
        .map_err(|e| RemoteError::Malformed(format!("bad hex: {}", e)))?;

    if bytes.len() == 32 {
        let end = bytes.iter().position(|&b| b == 0).unwrap_or(32);
        return String::from_utf8(bytes[..end].to_vec())
            .map_err(|e| RemoteError::Malformed(e.to_string()));
    }

    let word = |at: usize| -> Result<usize, RemoteError> {
        let slice = at
            .checked_add(32)
            .and_then(|end| bytes.get(at..end))
            .ok_or_else(|| RemoteError::Malformed("truncated ABI string".to_string()))?;
        let value = parse_quantity(&hex::encode(slice))?;
        usize::try_from(value).map_err(|e| RemoteError::Malformed(e.to_string()))
    };

    let offset = word(0)?;
    let len = word(offset)?;
    let start = offset.saturating_add(32);
    let data = start
        .checked_add(len)
        .and_then(|end| bytes.get(start..end))
        .ok_or_else(|| RemoteError::Malformed("truncated ABI string".to_string()))?;
    String::from_utf8(data.to_vec()).map_err(|e| RemoteError::Malformed(e.to_string()))
}
