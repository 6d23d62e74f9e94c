//! Runtime configuration read from the environment.
//!
//! | Variable                  | Default                                      |
//! |---------------------------|----------------------------------------------|
//! | `PAYOUT_RPC_URL`          | `http://localhost:8545`                      |
//! | `PAYOUT_TOKEN_CONTRACT`   | `0xb64ef51c888972c908cfacf59b47c1afbc0ab8ac` |
//! | `PAYOUT_TOKEN_DECIMALS`   | `8`                                          |
//! | `PAYOUT_GAS_LIMIT`        | `250000`                                     |
//! | `PAYOUT_GAS_PRICE_GWEI`   | `4`                                          |
//! | `PAYOUT_RPC_TIMEOUT_SECS` | `30`                                         |

use crate::error::{PayoutError, Result};
use crate::request::is_valid_address;
use std::str::FromStr;
use std::time::Duration;

const DEFAULT_RPC_URL: &str = "http://localhost:8545";
const DEFAULT_TOKEN_CONTRACT: &str = "0xb64ef51c888972c908cfacf59b47c1afbc0ab8ac";
const MAX_TOKEN_DECIMALS: u32 = 18;
const WEI_PER_GWEI: u128 = 1_000_000_000;

#[derive(Debug, Clone)]
pub struct PayoutConfig {
    pub rpc_url: String,
    pub token_contract: String,
    pub token_decimals: u32,
    pub gas_limit: u64,
    pub gas_price_wei: u128,
    pub rpc_timeout: Duration,
}

impl PayoutConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from any key/value source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let rpc_url = lookup("PAYOUT_RPC_URL").unwrap_or_else(|| DEFAULT_RPC_URL.to_string());
        let token_contract = lookup("PAYOUT_TOKEN_CONTRACT")
            .unwrap_or_else(|| DEFAULT_TOKEN_CONTRACT.to_string());
        if !is_valid_address(&token_contract) {
            return Err(PayoutError::Config(format!(
                "PAYOUT_TOKEN_CONTRACT is not an address: {}",
                token_contract
            )));
        }

        let token_decimals: u32 = parse_var(&lookup, "PAYOUT_TOKEN_DECIMALS", 8)?;
        if token_decimals > MAX_TOKEN_DECIMALS {
            return Err(PayoutError::Config(format!(
                "PAYOUT_TOKEN_DECIMALS must be at most {}, got {}",
                MAX_TOKEN_DECIMALS, token_decimals
            )));
        }

        let gas_limit = parse_var(&lookup, "PAYOUT_GAS_LIMIT", 250_000)?;
        let gas_price_gwei: u64 = parse_var(&lookup, "PAYOUT_GAS_PRICE_GWEI", 4)?;
        let timeout_secs = parse_var(&lookup, "PAYOUT_RPC_TIMEOUT_SECS", 30)?;

        Ok(PayoutConfig {
            rpc_url,
            token_contract,
            token_decimals,
            gas_limit,
            gas_price_wei: u128::from(gas_price_gwei) * WEI_PER_GWEI,
            rpc_timeout: Duration::from_secs(timeout_secs),
        })
    }
}

fn parse_var<F, T>(lookup: &F, key: &str, default: T) -> Result<T>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(key) {
        None => Ok(default),
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|e| PayoutError::Config(format!("{}={:?}: {}", key, raw, e))),
    }
}
