use std::{
    future::{Future, IntoFuture},
    sync::{Mutex, OnceLock},
    time::Duration,
};

use alloy_primitives::{keccak256, Address, B256, U256};
use alloy_provider::{Provider, RootProvider};
use alloy_rpc_types::{BlockId, BlockNumberOrTag, BlockTransactionsKind};
use alloy_transport::{TransportError, TransportErrorKind};
use alloy_transport_http::Http;
use reqwest::Client;
use revm::primitives::Bytecode;
use tokio::{
    runtime::{Handle, Runtime},
    task,
};
use tracing::debug;

use crate::{AccountBasic, EvmAccount, Storage};

use super::{BlockHashes, Bytecodes, ChainState, EvmCode, ForkState};

type RpcProvider = RootProvider<Http<Client>>;

/// The block a fork is pinned to, with the header fields needed to
/// continue the chain locally.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ForkPoint {
    /// Chain id reported by the node.
    pub chain_id: u64,
    /// Pinned block number.
    pub number: u64,
    /// Timestamp of the pinned block.
    pub timestamp: u64,
    /// Gas limit of the pinned block.
    pub gas_limit: U256,
    /// Base fee of the pinned block, zero before London.
    pub base_fee: U256,
}

/// A storage that fetches state data via RPC for execution.
#[derive(Debug)]
pub struct RpcStorage {
    provider: RpcProvider,
    block_id: BlockId,
    /// `OnceLock` is used to lazy-initialize a Tokio multi-threaded runtime if no
    /// runtime is available already.
    ///
    /// This is needed because some futures should be executed synchronously to
    /// comply with some traits
    runtime: OnceLock<Runtime>,
    // Every response is cached so the pre-state can be snapshotted to disk and
    // the same slot is never fetched twice in a run.
    // Using a [Mutex] so we don't propagate mutability requirements back
    // to our [Storage] trait.
    cache_accounts: Mutex<ChainState>,
    cache_bytecodes: Mutex<Bytecodes>,
    cache_block_hashes: Mutex<BlockHashes>,
}

impl RpcStorage {
    /// Create a new RPC Storage
    pub fn new(provider: RpcProvider, block_id: BlockId) -> Self {
        Self {
            provider,
            block_id,
            runtime: OnceLock::new(),
            cache_accounts: Mutex::default(),
            cache_bytecodes: Mutex::default(),
            cache_block_hashes: Mutex::default(),
        }
    }

    /// Create an RPC Storage pinned to `block_number`, or to the latest block
    /// when none is given, and return the fork point it is pinned to.
    pub fn at_block(
        provider: RpcProvider,
        block_number: Option<u64>,
    ) -> Result<(Self, ForkPoint), TransportError> {
        let block_id = block_number.map_or_else(BlockId::latest, BlockId::number);
        let mut storage = Self::new(provider, block_id);

        let (chain_id, block) = storage.block_on(async {
            tokio::join!(
                storage.fetch(|| storage.provider.get_chain_id()),
                storage.fetch(|| {
                    storage
                        .provider
                        .get_block(block_id, BlockTransactionsKind::Hashes)
                }),
            )
        });
        let chain_id = chain_id?;
        let block = block?.ok_or_else(|| {
            TransportErrorKind::custom_str(&format!("No block found for ID: {block_id:?}"))
        })?;

        let header = &block.header;
        let fork_point = ForkPoint {
            chain_id,
            number: header.number,
            timestamp: header.timestamp,
            gas_limit: U256::from(header.gas_limit),
            base_fee: header
                .base_fee_per_gas
                .map(U256::from)
                .unwrap_or_default(),
        };
        // Pin "latest" so every later read sees the same state.
        storage.block_id = BlockId::number(fork_point.number);
        storage
            .cache_block_hashes
            .lock()
            .unwrap()
            .insert(header.number, header.hash);
        Ok((storage, fork_point))
    }

    /// Seed the caches with a previously saved state of the same fork block.
    pub fn with_state(self, state: ForkState) -> Self {
        *self.cache_accounts.lock().unwrap() = state.accounts;
        *self.cache_bytecodes.lock().unwrap() = state.bytecodes;
        *self.cache_block_hashes.lock().unwrap() = state.block_hashes;
        self
    }

    /// `block_on` is a helper method since `RpcStorage` only works in synchronous
    /// code or a Tokio multi-thread runtime.
    pub fn block_on<F: Future>(&self, future: F) -> F::Output {
        if let Ok(handle) = Handle::try_current() {
            task::block_in_place(|| handle.block_on(future))
        } else {
            self.runtime
                .get_or_init(|| Runtime::new().expect("Failed to create Tokio runtime"))
                .block_on(future)
        }
    }

    /// Send a request and retry many times if needed.
    /// This util is made to avoid error 429 Too Many Requests
    /// <https://en.wikipedia.org/wiki/Exponential_backoff>
    async fn fetch<T, E, R: IntoFuture<Output = Result<T, E>>>(
        &self,
        request: impl Fn() -> R,
    ) -> Result<T, E> {
        const RETRY_LIMIT: usize = 8;
        const INITIAL_DELAY_MILLIS: u64 = 125;

        let mut lives = RETRY_LIMIT;
        let mut delay = Duration::from_millis(INITIAL_DELAY_MILLIS);

        loop {
            let result = request().await;
            if lives > 0 && result.is_err() {
                debug!(?delay, lives, "retrying RPC request");
                tokio::time::sleep(delay).await;
                lives -= 1;
                delay *= 2;
            } else {
                return result;
            }
        }
    }

    /// Get a snapshot of everything fetched so far
    pub fn snapshot(&self) -> ForkState {
        let block_number = match self.block_id {
            BlockId::Number(BlockNumberOrTag::Number(number)) => number,
            _ => 0,
        };
        ForkState {
            block_number,
            accounts: self.cache_accounts.lock().unwrap().clone(),
            bytecodes: self.cache_bytecodes.lock().unwrap().clone(),
            block_hashes: self.cache_block_hashes.lock().unwrap().clone(),
        }
    }
}

impl Storage for RpcStorage {
    type Error = TransportError;

    fn basic(&self, address: &Address) -> Result<Option<AccountBasic>, Self::Error> {
        if let Some(account) = self.cache_accounts.lock().unwrap().get(address) {
            return Ok(Some(AccountBasic {
                balance: account.balance,
                nonce: account.nonce,
            }));
        }

        let (nonce, balance, code) = self.block_on(async {
            tokio::join!(
                self.fetch(|| {
                    self.provider
                        .get_transaction_count(*address)
                        .block_id(self.block_id)
                }),
                self.fetch(|| self.provider.get_balance(*address).block_id(self.block_id)),
                self.fetch(|| self.provider.get_code_at(*address).block_id(self.block_id)),
            )
        });
        let nonce = nonce?;
        let balance = balance?;
        let code = code?;

        // An untouched address stays empty so CREATE can still target it.
        if balance.is_zero() && nonce == 0 && code.is_empty() {
            return Ok(None);
        }
        let code_hash = if code.is_empty() {
            None
        } else {
            let code = EvmCode::from(Bytecode::new_raw(code));
            let code_hash = code.hash();
            self.cache_bytecodes.lock().unwrap().insert(code_hash, code);
            Some(code_hash)
        };
        self.cache_accounts.lock().unwrap().insert(
            *address,
            EvmAccount {
                balance,
                nonce,
                code_hash,
                code: None,
                storage: Default::default(),
            },
        );
        Ok(Some(AccountBasic { balance, nonce }))
    }

    fn code_hash(&self, address: &Address) -> Result<Option<B256>, Self::Error> {
        self.basic(address)?;
        Ok(self
            .cache_accounts
            .lock()
            .unwrap()
            .get(address)
            .and_then(|account| account.code_hash))
    }

    fn code_by_hash(&self, code_hash: &B256) -> Result<Option<EvmCode>, Self::Error> {
        Ok(self.cache_bytecodes.lock().unwrap().get(code_hash).cloned())
    }

    fn storage(&self, address: &Address, index: &U256) -> Result<U256, Self::Error> {
        if let Some(account) = self.cache_accounts.lock().unwrap().get(address) {
            if let Some(value) = account.storage.get(index) {
                return Ok(*value);
            }
        }
        let value = self.block_on(self.fetch(|| {
            self.provider
                .get_storage_at(*address, *index)
                .block_id(self.block_id)
        }))?;
        // We only cache if the pre-state account is non-empty. Else this
        // could be a false alarm that results in the default 0.
        self.basic(address)?;
        if let Some(account) = self.cache_accounts.lock().unwrap().get_mut(address) {
            account.storage.insert(*index, value);
        }

        Ok(value)
    }

    fn block_hash(&self, number: &u64) -> Result<B256, Self::Error> {
        if let Some(&block_hash) = self.cache_block_hashes.lock().unwrap().get(number) {
            return Ok(block_hash);
        }

        let block = self.block_on(self.fetch(|| {
            self.provider
                .get_block_by_number(BlockNumberOrTag::Number(*number), false)
        }))?;
        // Blocks mined locally past the fork point do not exist upstream.
        let block_hash = match block {
            Some(block) => block.header.hash,
            None => keccak256(number.to_string().as_bytes()),
        };

        self.cache_block_hashes
            .lock()
            .unwrap()
            .insert(*number, block_hash);

        Ok(block_hash)
    }
}
