//! The build→sign→broadcast→confirm state machine.
//!
//! One pipeline instance serves one wallet; a busy flag rejects a second
//! in-flight operation so nonces never collide and the key material is
//! never decrypted twice concurrently. The decrypted scalar exists only
//! between Decrypting and the final Signing step and is zeroed on every
//! exit path.
//!
//! The sell flow is an ordered, non-atomic two-step sequence
//! (approve, then transfer). If the transfer fails after the approve was
//! broadcast, the on-chain allowance remains in effect; there is no
//! compensating action. This window is inherent to the contract's
//! interface and is surfaced in the logs rather than hidden.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, PoisonError};

use alloy_primitives::U256;
use async_trait::async_trait;
use secrecy::SecretString;
use thiserror::Error;
use tokio::time::{sleep, Instant};
use tracing::{debug, info, warn};

use chain_client::{ChainRpc, Receipt, RpcError};
use chain_eth::transaction::{self, Transaction};
use chain_eth::{abi, token};

use crate::config::Config;
use crate::error::WalletError;
use crate::keystore;
use crate::session::Wallet;

/// Observable position of the state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    Idle,
    Validating,
    AwaitingPassword,
    Decrypting,
    Building,
    Signing,
    Broadcasting,
    Confirming,
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PipelineState::Idle => "idle",
            PipelineState::Validating => "validating",
            PipelineState::AwaitingPassword => "awaiting-password",
            PipelineState::Decrypting => "decrypting",
            PipelineState::Building => "building",
            PipelineState::Signing => "signing",
            PipelineState::Broadcasting => "broadcasting",
            PipelineState::Confirming => "confirming",
        };
        f.write_str(name)
    }
}

/// Classification of a terminal failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    Validation,
    InvalidPassword,
    NotDeployed,
    ExecutionReverted,
    Network,
    /// No receipt arrived within the configured window. The transaction
    /// may still be mined later; this is a reporting state, not proof of
    /// failure.
    Unconfirmed,
    CorruptKeystore,
}

/// Terminal result of one pipeline run.
#[derive(Debug)]
pub enum Outcome {
    Succeeded(Receipt),
    /// The user declined the password prompt. Nothing was decrypted,
    /// signed, or broadcast.
    Cancelled,
    Failed { kind: FailureKind, reason: String },
}

impl Outcome {
    pub fn failure_kind(&self) -> Option<FailureKind> {
        match self {
            Outcome::Failed { kind, .. } => Some(*kind),
            _ => None,
        }
    }
}

/// A second operation was requested while one is in flight.
#[derive(Debug, Error)]
#[error("another wallet operation is already in flight")]
pub struct PipelineBusy;

/// Passphrase source injected by the host; `None` means the user
/// cancelled.
#[async_trait]
pub trait PasswordProvider: Send + Sync {
    async fn request_password(&self) -> Option<SecretString>;
}

#[async_trait]
impl<T: PasswordProvider + ?Sized> PasswordProvider for std::sync::Arc<T> {
    async fn request_password(&self) -> Option<SecretString> {
        (**self).request_password().await
    }
}

/// One signed-and-broadcast unit of work within an operation.
struct Step {
    /// ETH attached to the call, in wei.
    value: U256,
    data: Vec<u8>,
}

pub struct TransactionPipeline<C, P> {
    config: Config,
    chain: C,
    passwords: P,
    busy: AtomicBool,
    state: Mutex<PipelineState>,
}

impl<C: ChainRpc, P: PasswordProvider> TransactionPipeline<C, P> {
    pub fn new(config: Config, chain: C, passwords: P) -> Self {
        Self {
            config,
            chain,
            passwords,
            busy: AtomicBool::new(false),
            state: Mutex::new(PipelineState::Idle),
        }
    }

    /// Current state, for host UIs that surface progress.
    pub fn state(&self) -> PipelineState {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Buys `count` whole tokens from the sale contract.
    ///
    /// The attached value is `count * token_price_wei`; validation
    /// requires the wallet to also hold the configured gas reserve.
    pub async fn buy_tokens(&self, wallet: &Wallet, count: u64) -> Result<Outcome, PipelineBusy> {
        let _flight = self.acquire()?;
        Ok(self.run_buy(wallet, count).await)
    }

    /// Sells `count` whole tokens back to the contract: an `approve`
    /// broadcast followed by a `transfer`.
    pub async fn sell_tokens(&self, wallet: &Wallet, count: u64) -> Result<Outcome, PipelineBusy> {
        let _flight = self.acquire()?;
        Ok(self.run_sell(wallet, count).await)
    }

    /// Native balance of `address`, outside the state machine.
    pub async fn eth_balance(&self, address: &str) -> Result<U256, WalletError> {
        Ok(self.chain.get_balance(address).await?)
    }

    /// Token balance of `owner`, outside the state machine.
    pub async fn token_balance(&self, owner: &str) -> Result<U256, WalletError> {
        let call = token::balance_of(owner)?;
        let raw = self.chain.call(&self.config.contract_address, &call).await?;
        Ok(token::decode_uint(&raw)?)
    }

    async fn run_buy(&self, wallet: &Wallet, count: u64) -> Outcome {
        self.enter(PipelineState::Validating);

        if count == 0 {
            return fail(FailureKind::Validation, "token amount must be greater than zero");
        }

        let contract = self.config.contract_address.clone();

        match self.contract_code(&contract).await {
            Ok(()) => {}
            Err(outcome) => return outcome,
        }

        let stock = match self.read_token_balance(&contract).await {
            Ok(balance) => balance,
            Err(outcome) => return outcome,
        };
        if stock.is_zero() {
            return fail(FailureKind::Validation, "no tokens available in the contract");
        }

        let cost = match U256::from(count).checked_mul(self.config.token_price_wei) {
            Some(cost) => cost,
            None => {
                return fail(
                    FailureKind::Validation,
                    "token amount overflows the price calculation",
                )
            }
        };
        let required = cost.saturating_add(self.config.gas_reserve_wei);

        let balance = match self.chain.get_balance(&wallet.address).await {
            Ok(balance) => balance,
            Err(e) => return network_fail(e),
        };
        if balance < required {
            return fail(
                FailureKind::Validation,
                format!(
                    "insufficient funds: need {required} wei including the gas reserve, \
                     have {balance} wei"
                ),
            );
        }

        // Snapshot the gas price during validation; Building reuses the
        // same observation.
        let gas_price = match self.chain.get_gas_price().await {
            Ok(price) => price,
            Err(e) => return network_fail(e),
        };

        let steps = vec![Step {
            value: cost,
            data: token::buy_token(),
        }];
        self.execute(wallet, gas_price, steps).await
    }

    async fn run_sell(&self, wallet: &Wallet, count: u64) -> Outcome {
        self.enter(PipelineState::Validating);

        if count == 0 {
            return fail(FailureKind::Validation, "token amount must be greater than zero");
        }

        let contract = self.config.contract_address.clone();

        match self.contract_code(&contract).await {
            Ok(()) => {}
            Err(outcome) => return outcome,
        }

        let holdings = match self.read_token_balance(&wallet.address).await {
            Ok(balance) => balance,
            Err(outcome) => return outcome,
        };
        let amount = token::to_base_units(count);
        if holdings < amount {
            return fail(
                FailureKind::Validation,
                format!("insufficient token balance: have {holdings} base units, need {amount}"),
            );
        }

        let gas_price = match self.chain.get_gas_price().await {
            Ok(price) => price,
            Err(e) => return network_fail(e),
        };

        let approve = match token::approve(&contract, amount) {
            Ok(data) => data,
            Err(e) => return fail(FailureKind::Validation, e.to_string()),
        };
        let transfer = match token::transfer(&contract, amount) {
            Ok(data) => data,
            Err(e) => return fail(FailureKind::Validation, e.to_string()),
        };

        let steps = vec![
            Step {
                value: U256::ZERO,
                data: approve,
            },
            Step {
                value: U256::ZERO,
                data: transfer,
            },
        ];
        self.execute(wallet, gas_price, steps).await
    }

    /// Runs the AwaitingPassword→Confirming span over an ordered step
    /// sequence. Step N+1 is built and signed only after step N has been
    /// broadcast; only the final step's receipt is awaited.
    async fn execute(&self, wallet: &Wallet, gas_price: U256, steps: Vec<Step>) -> Outcome {
        self.enter(PipelineState::AwaitingPassword);
        let password = match self.passwords.request_password().await {
            Some(password) => password,
            None => {
                debug!("password prompt cancelled; no side effects");
                return Outcome::Cancelled;
            }
        };

        self.enter(PipelineState::Decrypting);
        let keypair = match keystore::decrypt(&wallet.keystore, &password) {
            Ok(keypair) => keypair,
            Err(e) => return decrypt_fail(e),
        };
        drop(password);

        let sender = keypair.address().to_string();
        let mut nonce = match self.chain.get_transaction_count(&sender).await {
            Ok(nonce) => nonce,
            Err(e) => return network_fail(e),
        };

        let Some((final_step, earlier)) = steps.split_last() else {
            return fail(FailureKind::Validation, "no transaction steps to execute");
        };
        let total = steps.len();

        for (index, step) in earlier.iter().enumerate() {
            let (_, signed) = match self.build_and_sign(step, nonce, gas_price, &keypair) {
                Ok(pair) => pair,
                Err(outcome) => return outcome,
            };
            nonce += 1;

            self.enter(PipelineState::Broadcasting);
            match self.chain.send_raw_transaction(&signed.raw).await {
                Ok(hash) => {
                    info!(step = index + 1, total, %hash, "intermediate transaction broadcast");
                }
                Err(e) => return network_fail(e),
            }
        }

        let (final_tx, signed) = match self.build_and_sign(final_step, nonce, gas_price, &keypair)
        {
            Ok(pair) => pair,
            Err(outcome) => return outcome,
        };

        // The scalar is no longer needed; clear it before any further
        // network waits.
        drop(keypair);

        self.enter(PipelineState::Broadcasting);
        let hash = match self.chain.send_raw_transaction(&signed.raw).await {
            Ok(hash) => hash,
            Err(e) => {
                if total > 1 {
                    warn!(
                        "final step failed to broadcast; earlier steps are already on chain \
                         and the token approval remains in effect"
                    );
                }
                return network_fail(e);
            }
        };
        info!(step = total, total, %hash, "transaction broadcast");

        self.enter(PipelineState::Confirming);
        let outcome = self.confirm(&hash, &final_tx).await;
        if total > 1 && outcome.failure_kind().is_some() {
            warn!(
                "sequence failed after earlier steps succeeded; the token approval \
                 remains in effect on chain"
            );
        }
        outcome
    }

    fn build_and_sign(
        &self,
        step: &Step,
        nonce: u64,
        gas_price: U256,
        keypair: &crate::keypair::KeyPair,
    ) -> Result<(Transaction, transaction::SignedTransaction), Outcome> {
        self.enter(PipelineState::Building);
        let tx = transaction::build_contract_call(
            self.config.chain_id,
            nonce,
            &self.config.contract_address,
            step.value,
            step.data.clone(),
            gas_price,
            self.config.gas_limit,
        )
        .map_err(|e| fail(FailureKind::Validation, e.to_string()))?;

        self.enter(PipelineState::Signing);
        let signed = transaction::sign(&tx, keypair.secret_bytes())
            .map_err(|e| fail(FailureKind::CorruptKeystore, format!("signing failed: {e}")))?;

        Ok((tx, signed))
    }

    /// Polls for a receipt until the configured timeout. A reverted
    /// receipt triggers a read-only replay of the calldata to recover the
    /// revert reason.
    async fn confirm(&self, hash: &str, tx: &Transaction) -> Outcome {
        let deadline = Instant::now() + self.config.confirm_timeout;

        loop {
            match self.chain.get_transaction_receipt(hash).await {
                Ok(Some(receipt)) => {
                    if receipt.status {
                        info!(%hash, "transaction confirmed");
                        return Outcome::Succeeded(receipt);
                    }
                    let reason = self.revert_reason(tx).await;
                    return fail(FailureKind::ExecutionReverted, reason);
                }
                Ok(None) => {}
                Err(e) => return network_fail(e),
            }

            if Instant::now() >= deadline {
                return fail(
                    FailureKind::Unconfirmed,
                    format!(
                        "no receipt for {hash} within {:?}; the transaction may still be mined",
                        self.config.confirm_timeout
                    ),
                );
            }

            sleep(self.config.receipt_poll_interval).await;
        }
    }

    async fn revert_reason(&self, tx: &Transaction) -> String {
        match self.chain.call(&tx.to, &tx.data).await {
            Err(e) => match e.revert_data() {
                Some(data) => abi::decode_revert_reason(data),
                None => format!("execution reverted: {e}"),
            },
            // The replay ran against newer state and no longer reverts;
            // nothing more specific to report.
            Ok(_) => "execution reverted".into(),
        }
    }

    async fn contract_code(&self, contract: &str) -> Result<(), Outcome> {
        match self.chain.get_code(contract).await {
            Ok(code) if code.is_empty() => Err(fail(
                FailureKind::NotDeployed,
                format!("no contract deployed at {contract}"),
            )),
            Ok(_) => Ok(()),
            Err(e) => Err(network_fail(e)),
        }
    }

    async fn read_token_balance(&self, owner: &str) -> Result<U256, Outcome> {
        let call = token::balance_of(owner)
            .map_err(|e| fail(FailureKind::Validation, e.to_string()))?;
        let raw = self
            .chain
            .call(&self.config.contract_address, &call)
            .await
            .map_err(network_fail)?;
        token::decode_uint(&raw).map_err(|e| network_fail_str(e.to_string()))
    }

    fn acquire(&self) -> Result<FlightGuard<'_>, PipelineBusy> {
        if self
            .busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(PipelineBusy);
        }
        Ok(FlightGuard {
            busy: &self.busy,
            state: &self.state,
        })
    }

    fn enter(&self, next: PipelineState) {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        let current = *state;
        debug!(from = %current, to = %next, "pipeline state");
        *state = next;
    }
}

/// Releases the busy flag and resets the observable state, on every exit
/// path including panics.
struct FlightGuard<'a> {
    busy: &'a AtomicBool,
    state: &'a Mutex<PipelineState>,
}

impl Drop for FlightGuard<'_> {
    fn drop(&mut self) {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        *state = PipelineState::Idle;
        self.busy.store(false, Ordering::Release);
    }
}

fn fail(kind: FailureKind, reason: impl Into<String>) -> Outcome {
    let reason = reason.into();
    debug!(?kind, %reason, "pipeline failed");
    Outcome::Failed { kind, reason }
}

fn network_fail(e: RpcError) -> Outcome {
    fail(FailureKind::Network, e.to_string())
}

fn network_fail_str(reason: String) -> Outcome {
    fail(FailureKind::Network, reason)
}

fn decrypt_fail(e: WalletError) -> Outcome {
    let kind = match e {
        WalletError::InvalidPassword => FailureKind::InvalidPassword,
        // Malformed and unsupported records also terminate as corrupt:
        // the stored keystore cannot produce a usable key.
        _ => FailureKind::CorruptKeystore,
    };
    fail(kind, e.to_string())
}
