//! Scripted wallet and backend used across integration tests.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use alloy::primitives::{Address, B256, Bytes};
use alloy::rpc::types::{Filter, Log, TransactionRequest};
use alloy::sol_types::SolCall;
use async_trait::async_trait;
use serde_json::{Value, json};
use tokio::sync::Notify;
use vault_runtime::backend::ContractBackend;
use vault_runtime::events::{ListenerId, SubscriberRegistry};
use vault_runtime::wallet::{WalletEvent, WalletListener, WalletProvider, methods};
use vault_runtime::{ProviderError, TransactionOutcome};

pub const ALICE: Address = Address::new([0xa1; 20]);
pub const BOB: Address = Address::new([0xb0; 20]);
pub const VAULT: Address = Address::new([0x01; 20]);
pub const MANAGER: Address = Address::new([0x02; 20]);

type CallKey = (Address, [u8; 4]);

// ── Backend ─────────────────────────────────────────────────────────────

pub struct MockBackend {
    account: Option<Address>,
    responses: Mutex<HashMap<CallKey, Result<Bytes, ProviderError>>>,
    call_log: Mutex<Vec<CallKey>>,
    gas_estimate: Mutex<Result<u64, ProviderError>>,
    send_result: Mutex<Result<Option<TransactionOutcome>, ProviderError>>,
    sent: Mutex<Vec<TransactionRequest>>,
    logs: Mutex<Vec<Log>>,
    head: Mutex<u64>,
    filters: Mutex<Vec<Filter>>,
}

impl MockBackend {
    pub fn new(account: Option<Address>) -> Self {
        Self {
            account,
            responses: Mutex::new(HashMap::new()),
            call_log: Mutex::new(Vec::new()),
            gas_estimate: Mutex::new(Ok(100_000)),
            send_result: Mutex::new(Ok(Some(success_outcome()))),
            sent: Mutex::new(Vec::new()),
            logs: Mutex::new(Vec::new()),
            head: Mutex::new(100),
            filters: Mutex::new(Vec::new()),
        }
    }

    pub fn read_only() -> Self {
        Self::new(None)
    }

    pub fn signing(account: Address) -> Self {
        Self::new(Some(account))
    }

    /// Answer calls of `C` to `to` with `value`.
    pub fn respond<C: SolCall>(&self, to: Address, value: C::Return) {
        let encoded = Bytes::from(C::abi_encode_returns(&value));
        self.responses
            .lock()
            .unwrap()
            .insert((to, C::SELECTOR), Ok(encoded));
    }

    /// Fail calls of `C` to `to` with `message`.
    pub fn fail<C: SolCall>(&self, to: Address, message: &str) {
        self.responses
            .lock()
            .unwrap()
            .insert((to, C::SELECTOR), Err(ProviderError::new(message)));
    }

    pub fn set_gas_estimate(&self, result: Result<u64, ProviderError>) {
        *self.gas_estimate.lock().unwrap() = result;
    }

    pub fn set_send_result(&self, result: Result<Option<TransactionOutcome>, ProviderError>) {
        *self.send_result.lock().unwrap() = result;
    }

    pub fn set_logs(&self, logs: Vec<Log>) {
        *self.logs.lock().unwrap() = logs;
    }

    pub fn set_head(&self, block: u64) {
        *self.head.lock().unwrap() = block;
    }

    pub fn calls_to<C: SolCall>(&self, to: Address) -> usize {
        self.call_log
            .lock()
            .unwrap()
            .iter()
            .filter(|key| **key == (to, C::SELECTOR))
            .count()
    }

    pub fn total_calls(&self) -> usize {
        self.call_log.lock().unwrap().len()
    }

    pub fn sent(&self) -> Vec<TransactionRequest> {
        self.sent.lock().unwrap().clone()
    }

    pub fn filters(&self) -> Vec<Filter> {
        self.filters.lock().unwrap().clone()
    }
}

pub fn success_outcome() -> TransactionOutcome {
    TransactionOutcome {
        tx_hash: B256::repeat_byte(0xee),
        block_number: Some(101),
        gas_used: 85_000,
        success: true,
    }
}

fn call_key(tx: &TransactionRequest) -> Option<CallKey> {
    let to = tx.to.and_then(|kind| kind.to().copied())?;
    let input = tx.input.input()?;
    let selector: [u8; 4] = input.get(..4)?.try_into().ok()?;
    Some((to, selector))
}

#[async_trait]
impl ContractBackend for MockBackend {
    fn account(&self) -> Option<Address> {
        self.account
    }

    async fn call(&self, tx: TransactionRequest) -> Result<Bytes, ProviderError> {
        let key = call_key(&tx).ok_or_else(|| ProviderError::new("malformed call"))?;
        self.call_log.lock().unwrap().push(key);
        // Let sibling futures interleave like real round trips.
        tokio::task::yield_now().await;
        self.responses
            .lock()
            .unwrap()
            .get(&key)
            .cloned()
            .unwrap_or_else(|| Err(ProviderError::new("execution reverted")))
    }

    async fn estimate_gas(&self, _tx: TransactionRequest) -> Result<u64, ProviderError> {
        self.gas_estimate.lock().unwrap().clone()
    }

    async fn send_and_confirm(
        &self,
        tx: TransactionRequest,
    ) -> Result<Option<TransactionOutcome>, ProviderError> {
        self.sent.lock().unwrap().push(tx);
        self.send_result.lock().unwrap().clone()
    }

    async fn get_logs(&self, filter: Filter) -> Result<Vec<Log>, ProviderError> {
        self.filters.lock().unwrap().push(filter);
        Ok(std::mem::take(&mut *self.logs.lock().unwrap()))
    }

    async fn block_number(&self) -> Result<u64, ProviderError> {
        Ok(*self.head.lock().unwrap())
    }
}

// ── Wallet ──────────────────────────────────────────────────────────────

pub struct MockWallet {
    accounts: Mutex<Vec<Address>>,
    chain_hex: Mutex<String>,
    requests: Mutex<Vec<(String, Value)>>,
    listeners: SubscriberRegistry<WalletEvent>,
    /// When set, `eth_requestAccounts` waits for `release_prompt()`.
    gated: AtomicBool,
    gate: Notify,
    reject_prompt: AtomicBool,
    reject_switch: AtomicBool,
    refuse_signer: AtomicBool,
}

impl MockWallet {
    pub fn new(accounts: Vec<Address>, chain_hex: &str) -> Self {
        Self {
            accounts: Mutex::new(accounts),
            chain_hex: Mutex::new(chain_hex.to_string()),
            requests: Mutex::new(Vec::new()),
            listeners: SubscriberRegistry::new(),
            gated: AtomicBool::new(false),
            gate: Notify::new(),
            reject_prompt: AtomicBool::new(false),
            reject_switch: AtomicBool::new(false),
            refuse_signer: AtomicBool::new(false),
        }
    }

    pub fn hold_prompt(&self) {
        self.gated.store(true, Ordering::SeqCst);
    }

    pub fn release_prompt(&self) {
        self.gate.notify_one();
    }

    pub fn reject_prompt(&self) {
        self.reject_prompt.store(true, Ordering::SeqCst);
    }

    pub fn reject_switch(&self) {
        self.reject_switch.store(true, Ordering::SeqCst);
    }

    /// Make every later `signer()` call fail.
    pub fn refuse_signer(&self) {
        self.refuse_signer.store(true, Ordering::SeqCst);
    }

    pub fn emit(&self, event: WalletEvent) {
        self.listeners.emit(&event);
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }

    pub fn request_count(&self, method: &str) -> usize {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .filter(|(m, _)| m == method)
            .count()
    }

    pub fn requests(&self) -> Vec<(String, Value)> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl WalletProvider for MockWallet {
    async fn request(&self, method: &str, params: Value) -> Result<Value, ProviderError> {
        self.requests
            .lock()
            .unwrap()
            .push((method.to_string(), params));

        match method {
            methods::REQUEST_ACCOUNTS => {
                if self.gated.load(Ordering::SeqCst) {
                    self.gate.notified().await;
                }
                if self.reject_prompt.swap(false, Ordering::SeqCst) {
                    return Err(ProviderError::with_code(4001, "user rejected the request"));
                }
                let accounts: Vec<String> = self
                    .accounts
                    .lock()
                    .unwrap()
                    .iter()
                    .map(|a| a.to_string())
                    .collect();
                Ok(json!(accounts))
            }
            methods::CHAIN_ID => Ok(json!(self.chain_hex.lock().unwrap().clone())),
            methods::SWITCH_CHAIN => {
                if self.reject_switch.load(Ordering::SeqCst) {
                    Err(ProviderError::with_code(4902, "Unrecognized chain ID"))
                } else {
                    Ok(Value::Null)
                }
            }
            other => Err(ProviderError::with_code(4200, format!("Unsupported method: {other}"))),
        }
    }

    fn subscribe(&self, listener: WalletListener) -> ListenerId {
        self.listeners.insert(listener)
    }

    fn unsubscribe(&self, id: ListenerId) -> bool {
        self.listeners.remove(id)
    }

    fn signer(&self, account: Address) -> Result<Arc<dyn ContractBackend>, ProviderError> {
        if self.refuse_signer.load(Ordering::SeqCst) {
            return Err(ProviderError::new("No RPC endpoint for chain"));
        }
        Ok(Arc::new(MockBackend::signing(account)))
    }
}
