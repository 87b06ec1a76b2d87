//! Cross-crate integration tests exercising the full pipeline:
//! create wallet -> validate -> decrypt -> build -> sign -> broadcast ->
//! confirm, against a scripted in-memory chain.
//!
//! These tests use the public API of wallet_core to catch regressions at
//! crate boundaries.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use alloy_primitives::U256;
use async_trait::async_trait;
use secrecy::SecretString;
use tokio::sync::Notify;

use chain_client::{ChainRpc, Receipt, RpcError};
use chain_eth::token;
use wallet_core::pipeline::PasswordProvider;
use wallet_core::{
    create_wallet, Config, FailureKind, Outcome, PipelineState, ScryptParams,
    TransactionPipeline, Wallet,
};

const PASSWORD: &str = "hunter2";
const CONTRACT: &str = "0x00000000000000000000000000000000000000aa";

const BALANCE_OF_SELECTOR: [u8; 4] = [0x70, 0xa0, 0x82, 0x31];

fn fast_params() -> ScryptParams {
    ScryptParams {
        n: 4,
        r: 8,
        p: 1,
        dklen: 32,
    }
}

fn test_wallet() -> Wallet {
    create_wallet(&SecretString::from(PASSWORD), &fast_params()).unwrap()
}

fn test_config() -> Config {
    Config {
        contract_address: CONTRACT.into(),
        confirm_timeout: Duration::from_millis(200),
        receipt_poll_interval: Duration::from_millis(10),
        ..Config::default()
    }
}

/// Wei for a count of thousandths of an ETH.
fn milli_eth(count: u64) -> U256 {
    U256::from(count) * U256::from(1_000_000_000_000_000u64)
}

/// Builds a standard `Error(string)` revert payload.
fn revert_payload(reason: &str) -> Vec<u8> {
    let mut data = vec![0x08, 0xc3, 0x79, 0xa0];
    data.extend_from_slice(&U256::from(32).to_be_bytes::<32>());
    data.extend_from_slice(&U256::from(reason.len()).to_be_bytes::<32>());
    data.extend_from_slice(reason.as_bytes());
    let pad = (32 - reason.len() % 32) % 32;
    data.extend(std::iter::repeat(0u8).take(pad));
    data
}

// ─── Scripted chain ─────────────────────────────────────────────────

struct MockChain {
    code: Mutex<Vec<u8>>,
    gas_price: U256,
    eth_balances: Mutex<HashMap<String, U256>>,
    token_balances: Mutex<HashMap<String, U256>>,
    allowance: Mutex<U256>,
    /// Allowance granted when the first broadcast (an approve) lands.
    approve_grant: Mutex<Option<U256>>,
    broadcasts: Mutex<Vec<Vec<u8>>>,
    /// Receipt status per broadcast, in order; missing entries succeed.
    statuses: Mutex<VecDeque<bool>>,
    receipts: Mutex<HashMap<String, bool>>,
    /// When set, receipts never appear.
    withhold_receipts: Mutex<bool>,
    /// Node error data returned when a state-changing call is replayed.
    revert_data: Mutex<Option<Vec<u8>>>,
    /// When set, balance queries fail at the transport level.
    fail_balance: Mutex<bool>,
}

impl MockChain {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            code: Mutex::new(vec![0x60, 0x80, 0x60, 0x40]),
            gas_price: U256::from(20_000_000_000u64),
            eth_balances: Mutex::new(HashMap::new()),
            token_balances: Mutex::new(HashMap::new()),
            allowance: Mutex::new(U256::ZERO),
            approve_grant: Mutex::new(None),
            broadcasts: Mutex::new(Vec::new()),
            statuses: Mutex::new(VecDeque::new()),
            receipts: Mutex::new(HashMap::new()),
            withhold_receipts: Mutex::new(false),
            revert_data: Mutex::new(None),
            fail_balance: Mutex::new(false),
        })
    }

    fn lock<'a, T>(mutex: &'a Mutex<T>) -> std::sync::MutexGuard<'a, T> {
        mutex.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn fund_eth(&self, address: &str, amount: U256) {
        Self::lock(&self.eth_balances).insert(address.to_string(), amount);
    }

    fn fund_tokens(&self, owner: &str, amount: U256) {
        Self::lock(&self.token_balances).insert(owner.to_string(), amount);
    }

    fn script_statuses(&self, statuses: &[bool]) {
        *Self::lock(&self.statuses) = statuses.iter().copied().collect();
    }

    fn broadcast_count(&self) -> usize {
        Self::lock(&self.broadcasts).len()
    }

    fn allowance(&self) -> U256 {
        *Self::lock(&self.allowance)
    }

    fn node_error(&self) -> RpcError {
        RpcError::Node {
            code: 3,
            message: "execution reverted".into(),
            data: Self::lock(&self.revert_data).clone(),
        }
    }
}

#[async_trait]
impl ChainRpc for MockChain {
    async fn is_connected(&self) -> bool {
        true
    }

    async fn get_balance(&self, address: &str) -> Result<U256, RpcError> {
        if *Self::lock(&self.fail_balance) {
            return Err(RpcError::Node {
                code: -32000,
                message: "connection refused".into(),
                data: None,
            });
        }
        Ok(Self::lock(&self.eth_balances)
            .get(address)
            .copied()
            .unwrap_or(U256::ZERO))
    }

    async fn get_gas_price(&self) -> Result<U256, RpcError> {
        Ok(self.gas_price)
    }

    async fn get_transaction_count(&self, _address: &str) -> Result<u64, RpcError> {
        Ok(self.broadcast_count() as u64)
    }

    async fn get_code(&self, _address: &str) -> Result<Vec<u8>, RpcError> {
        Ok(Self::lock(&self.code).clone())
    }

    async fn call(&self, _to: &str, data: &[u8]) -> Result<Vec<u8>, RpcError> {
        if data.len() >= 36 && data[..4] == BALANCE_OF_SELECTOR {
            let owner = format!("0x{}", hex::encode(&data[16..36]));
            let balance = Self::lock(&self.token_balances)
                .get(&owner)
                .copied()
                .unwrap_or(U256::ZERO);
            return Ok(balance.to_be_bytes::<32>().to_vec());
        }

        // Any state-changing calldata replayed read-only reports the
        // scripted revert.
        Err(self.node_error())
    }

    async fn send_raw_transaction(&self, raw: &[u8]) -> Result<String, RpcError> {
        let index = {
            let mut broadcasts = Self::lock(&self.broadcasts);
            broadcasts.push(raw.to_vec());
            broadcasts.len()
        };

        if index == 1 {
            if let Some(grant) = Self::lock(&self.approve_grant).take() {
                *Self::lock(&self.allowance) = grant;
            }
        }

        let status = Self::lock(&self.statuses).pop_front().unwrap_or(true);
        let hash = format!("0x{index:064x}");
        Self::lock(&self.receipts).insert(hash.clone(), status);
        Ok(hash)
    }

    async fn get_transaction_receipt(&self, hash: &str) -> Result<Option<Receipt>, RpcError> {
        if *Self::lock(&self.withhold_receipts) {
            return Ok(None);
        }

        Ok(Self::lock(&self.receipts).get(hash).map(|&status| Receipt {
            transaction_hash: hash.to_string(),
            status,
            logs: Vec::new(),
        }))
    }
}

// ─── Password providers ─────────────────────────────────────────────

struct StaticPassword {
    password: &'static str,
    calls: AtomicUsize,
}

impl StaticPassword {
    fn correct() -> Arc<Self> {
        Arc::new(Self {
            password: PASSWORD,
            calls: AtomicUsize::new(0),
        })
    }

    fn wrong() -> Arc<Self> {
        Arc::new(Self {
            password: "letmein",
            calls: AtomicUsize::new(0),
        })
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PasswordProvider for StaticPassword {
    async fn request_password(&self) -> Option<SecretString> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Some(SecretString::from(self.password))
    }
}

struct Cancelling;

#[async_trait]
impl PasswordProvider for Cancelling {
    async fn request_password(&self) -> Option<SecretString> {
        None
    }
}

/// Blocks the password prompt until released, to hold a pipeline mid
/// flight.
struct Gated {
    release: Notify,
}

#[async_trait]
impl PasswordProvider for Gated {
    async fn request_password(&self) -> Option<SecretString> {
        self.release.notified().await;
        Some(SecretString::from(PASSWORD))
    }
}

// ─── Buy flow ───────────────────────────────────────────────────────

#[tokio::test]
async fn buy_flow_succeeds_end_to_end() {
    let chain = MockChain::new();
    let provider = StaticPassword::correct();
    let wallet = test_wallet();

    chain.fund_eth(&wallet.address, milli_eth(1000)); // 1 ETH
    chain.fund_tokens(CONTRACT, token::to_base_units(10_000));

    let pipeline = TransactionPipeline::new(test_config(), chain.clone(), provider.clone());
    let outcome = pipeline.buy_tokens(&wallet, 100).await.unwrap();

    match outcome {
        Outcome::Succeeded(receipt) => assert!(receipt.status),
        other => panic!("expected success, got {other:?}"),
    }
    assert_eq!(chain.broadcast_count(), 1);
    assert_eq!(provider.calls(), 1);
    assert_eq!(pipeline.state(), PipelineState::Idle);
}

#[tokio::test]
async fn buy_with_insufficient_funds_fails_before_password_prompt() {
    let chain = MockChain::new();
    let provider = StaticPassword::correct();
    let wallet = test_wallet();

    // 0.0005 ETH cannot cover a 0.001 ETH purchase plus the gas reserve.
    chain.fund_eth(&wallet.address, milli_eth(1) / U256::from(2));
    chain.fund_tokens(CONTRACT, token::to_base_units(10_000));

    let pipeline = TransactionPipeline::new(test_config(), chain.clone(), provider.clone());
    let outcome = pipeline.buy_tokens(&wallet, 100).await.unwrap();

    assert_eq!(outcome.failure_kind(), Some(FailureKind::Validation));
    assert_eq!(provider.calls(), 0, "password must not be requested");
    assert_eq!(chain.broadcast_count(), 0);
}

#[tokio::test]
async fn buy_with_empty_contract_stock_builds_nothing() {
    let chain = MockChain::new();
    let provider = StaticPassword::correct();
    let wallet = test_wallet();

    chain.fund_eth(&wallet.address, milli_eth(1000));
    // Contract holds zero tokens.

    let pipeline = TransactionPipeline::new(test_config(), chain.clone(), provider.clone());
    let outcome = pipeline.buy_tokens(&wallet, 1).await.unwrap();

    assert_eq!(outcome.failure_kind(), Some(FailureKind::Validation));
    assert_eq!(provider.calls(), 0);
    assert_eq!(chain.broadcast_count(), 0);
}

#[tokio::test]
async fn buy_against_undeployed_contract_fails() {
    let chain = MockChain::new();
    *MockChain::lock(&chain.code) = Vec::new();
    let wallet = test_wallet();

    let pipeline = TransactionPipeline::new(test_config(), chain.clone(), StaticPassword::correct());
    let outcome = pipeline.buy_tokens(&wallet, 1).await.unwrap();

    assert_eq!(outcome.failure_kind(), Some(FailureKind::NotDeployed));
    assert_eq!(chain.broadcast_count(), 0);
}

#[tokio::test]
async fn buy_zero_tokens_is_rejected() {
    let chain = MockChain::new();
    let wallet = test_wallet();

    let pipeline = TransactionPipeline::new(test_config(), chain, StaticPassword::correct());
    let outcome = pipeline.buy_tokens(&wallet, 0).await.unwrap();

    assert_eq!(outcome.failure_kind(), Some(FailureKind::Validation));
}

#[tokio::test]
async fn buy_with_wrong_password_discards_all_state() {
    let chain = MockChain::new();
    let provider = StaticPassword::wrong();
    let wallet = test_wallet();

    chain.fund_eth(&wallet.address, milli_eth(1000));
    chain.fund_tokens(CONTRACT, token::to_base_units(10_000));

    let pipeline = TransactionPipeline::new(test_config(), chain.clone(), provider);
    let outcome = pipeline.buy_tokens(&wallet, 10).await.unwrap();

    assert_eq!(outcome.failure_kind(), Some(FailureKind::InvalidPassword));
    assert_eq!(chain.broadcast_count(), 0);
}

#[tokio::test]
async fn buy_cancelled_at_password_prompt_has_no_side_effects() {
    let chain = MockChain::new();
    let wallet = test_wallet();

    chain.fund_eth(&wallet.address, milli_eth(1000));
    chain.fund_tokens(CONTRACT, token::to_base_units(10_000));

    let pipeline = TransactionPipeline::new(test_config(), chain.clone(), Cancelling);
    let outcome = pipeline.buy_tokens(&wallet, 10).await.unwrap();

    assert!(matches!(outcome, Outcome::Cancelled));
    assert_eq!(chain.broadcast_count(), 0);
}

#[tokio::test]
async fn buy_without_receipt_reports_unconfirmed() {
    let chain = MockChain::new();
    *MockChain::lock(&chain.withhold_receipts) = true;
    let wallet = test_wallet();

    chain.fund_eth(&wallet.address, milli_eth(1000));
    chain.fund_tokens(CONTRACT, token::to_base_units(10_000));

    let pipeline = TransactionPipeline::new(test_config(), chain.clone(), StaticPassword::correct());
    let outcome = pipeline.buy_tokens(&wallet, 10).await.unwrap();

    assert_eq!(outcome.failure_kind(), Some(FailureKind::Unconfirmed));
    // The transaction was broadcast; unconfirmed is not "not sent".
    assert_eq!(chain.broadcast_count(), 1);
}

#[tokio::test]
async fn buy_with_unreachable_node_is_a_network_failure() {
    let chain = MockChain::new();
    *MockChain::lock(&chain.fail_balance) = true;
    let wallet = test_wallet();

    chain.fund_tokens(CONTRACT, token::to_base_units(10_000));

    let pipeline = TransactionPipeline::new(test_config(), chain.clone(), StaticPassword::correct());
    let outcome = pipeline.buy_tokens(&wallet, 10).await.unwrap();

    assert_eq!(outcome.failure_kind(), Some(FailureKind::Network));
    assert_eq!(chain.broadcast_count(), 0);
}

// ─── Sell flow ──────────────────────────────────────────────────────

#[tokio::test]
async fn sell_flow_broadcasts_approve_then_transfer() {
    let chain = MockChain::new();
    let wallet = test_wallet();

    chain.fund_eth(&wallet.address, milli_eth(1000));
    chain.fund_tokens(&wallet.address, token::to_base_units(500));

    let pipeline = TransactionPipeline::new(test_config(), chain.clone(), StaticPassword::correct());
    let outcome = pipeline.sell_tokens(&wallet, 50).await.unwrap();

    assert!(matches!(outcome, Outcome::Succeeded(_)));
    assert_eq!(chain.broadcast_count(), 2);
}

#[tokio::test]
async fn sell_transfer_revert_leaves_approval_in_effect() {
    let chain = MockChain::new();
    let wallet = test_wallet();
    let amount = token::to_base_units(50);

    chain.fund_eth(&wallet.address, milli_eth(1000));
    chain.fund_tokens(&wallet.address, token::to_base_units(500));
    *MockChain::lock(&chain.approve_grant) = Some(amount);
    // Approve lands, transfer reverts on chain.
    chain.script_statuses(&[true, false]);
    *MockChain::lock(&chain.revert_data) = Some(revert_payload("No tokens available"));

    let pipeline = TransactionPipeline::new(test_config(), chain.clone(), StaticPassword::correct());
    let outcome = pipeline.sell_tokens(&wallet, 50).await.unwrap();

    match outcome {
        Outcome::Failed { kind, reason } => {
            assert_eq!(kind, FailureKind::ExecutionReverted);
            assert_eq!(reason, "No tokens available");
        }
        other => panic!("expected ExecutionReverted, got {other:?}"),
    }

    // The documented inconsistency window: step 1 stands.
    assert_eq!(chain.broadcast_count(), 2);
    assert_eq!(chain.allowance(), amount);
    assert!(!chain.allowance().is_zero());
}

#[tokio::test]
async fn sell_with_insufficient_token_balance_fails_validation() {
    let chain = MockChain::new();
    let provider = StaticPassword::correct();
    let wallet = test_wallet();

    chain.fund_eth(&wallet.address, milli_eth(1000));
    chain.fund_tokens(&wallet.address, token::to_base_units(10));

    let pipeline = TransactionPipeline::new(test_config(), chain.clone(), provider.clone());
    let outcome = pipeline.sell_tokens(&wallet, 50).await.unwrap();

    assert_eq!(outcome.failure_kind(), Some(FailureKind::Validation));
    assert_eq!(provider.calls(), 0);
    assert_eq!(chain.broadcast_count(), 0);
}

// ─── Single-flight ──────────────────────────────────────────────────

#[tokio::test]
async fn second_concurrent_operation_is_rejected() {
    let chain = MockChain::new();
    let gate = Arc::new(Gated {
        release: Notify::new(),
    });
    let wallet = test_wallet();

    chain.fund_eth(&wallet.address, milli_eth(1000));
    chain.fund_tokens(CONTRACT, token::to_base_units(10_000));

    let pipeline = Arc::new(TransactionPipeline::new(
        test_config(),
        chain.clone(),
        gate.clone(),
    ));

    let first = {
        let pipeline = pipeline.clone();
        let wallet = wallet.clone();
        tokio::spawn(async move { pipeline.buy_tokens(&wallet, 10).await })
    };

    // Let the first operation park at the password prompt.
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(pipeline.state(), PipelineState::AwaitingPassword);

    let second = pipeline.buy_tokens(&wallet, 10).await;
    assert!(second.is_err(), "second in-flight operation must be rejected");

    gate.release.notify_one();
    let outcome = first.await.unwrap().unwrap();
    assert!(matches!(outcome, Outcome::Succeeded(_)));
    assert_eq!(chain.broadcast_count(), 1);
}

// ─── Read-only helpers ──────────────────────────────────────────────

#[tokio::test]
async fn balance_helpers_report_integer_base_units() {
    let chain = MockChain::new();
    let wallet = test_wallet();

    chain.fund_eth(&wallet.address, milli_eth(1500));
    chain.fund_tokens(&wallet.address, token::to_base_units(42));

    let pipeline = TransactionPipeline::new(test_config(), chain, StaticPassword::correct());

    let eth = pipeline.eth_balance(&wallet.address).await.unwrap();
    assert_eq!(eth.to_string(), "1500000000000000000");

    let tokens = pipeline.token_balance(&wallet.address).await.unwrap();
    assert_eq!(tokens, token::to_base_units(42));
}
