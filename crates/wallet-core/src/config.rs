//! Wallet configuration.
//!
//! Defaults target a local development chain; deployments override via
//! environment variables, mirroring how the UI layer supplies its
//! contract address.

use std::time::Duration;

use alloy_primitives::U256;

use chain_eth::address;

use crate::error::WalletError;

pub const RPC_URL_VAR: &str = "WALLET_RPC_URL";
pub const CHAIN_ID_VAR: &str = "WALLET_CHAIN_ID";
pub const CONTRACT_ADDRESS_VAR: &str = "WALLET_CONTRACT_ADDRESS";

#[derive(Debug, Clone)]
pub struct Config {
    pub rpc_url: String,
    pub chain_id: u64,
    /// Token-sale contract, canonical form.
    pub contract_address: String,
    /// Sale price of one whole token, in wei.
    pub token_price_wei: U256,
    /// Headroom required on top of the purchase cost to cover gas.
    pub gas_reserve_wei: U256,
    /// Gas limit attached to every contract transaction.
    pub gas_limit: u64,
    /// How long Confirming waits for a receipt before giving up.
    pub confirm_timeout: Duration,
    /// Delay between receipt polls.
    pub receipt_poll_interval: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            rpc_url: "http://127.0.0.1:8545".into(),
            chain_id: 1337,
            contract_address: String::new(),
            // 0.00001 ETH per token.
            token_price_wei: U256::from(10_000_000_000_000u64),
            // 0.001 ETH held back for gas.
            gas_reserve_wei: U256::from(1_000_000_000_000_000u64),
            gas_limit: 200_000,
            confirm_timeout: Duration::from_secs(120),
            receipt_poll_interval: Duration::from_secs(2),
        }
    }
}

impl Config {
    /// Loads overrides from the environment on top of the defaults.
    pub fn from_env() -> Result<Self, WalletError> {
        let mut config = Self::default();

        if let Ok(url) = std::env::var(RPC_URL_VAR) {
            config.rpc_url = url;
        }

        if let Ok(chain_id) = std::env::var(CHAIN_ID_VAR) {
            config.chain_id = chain_id
                .parse()
                .map_err(|e| WalletError::Config(format!("{CHAIN_ID_VAR}: {e}")))?;
        }

        if let Ok(addr) = std::env::var(CONTRACT_ADDRESS_VAR) {
            config.contract_address = address::normalize(&addr)
                .map_err(|e| WalletError::Config(format!("{CONTRACT_ADDRESS_VAR}: {e}")))?;
        }

        Ok(config)
    }
}
