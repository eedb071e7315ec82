use std::sync::Arc;

use ahash::AHashSet;
use alloy_primitives::{Address, Bytes, U256};
use revm::{
    db::{AccountState, CacheDB, DbAccount, WrapDatabaseRef},
    primitives::{BlockEnv, TransactTo},
    DatabaseCommit, DatabaseRef,
};
use tracing::{debug, trace};

use crate::{
    primitives::{fork_block_env, tx_env, BLOCK_INTERVAL},
    vm::{evm_error, execute_tx, into_receipt},
    ForkChain, ForkPoint, Receipt, Storage, StorageWrapper,
};

/// Errors when interacting with the simulated chain.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ForkError {
    /// A transaction was sent from an address that is not impersonated.
    #[error("{0} is not impersonated")]
    NotImpersonated(Address),
    /// The EVM rejected the transaction before executing it.
    #[error("EVM error: {0}")]
    Evm(String),
    /// The transaction reverted.
    #[error("execution reverted: {}", reason.as_deref().unwrap_or("<no reason>"))]
    Reverted {
        /// Decoded revert reason, if the output is a standard error.
        reason: Option<String>,
        /// Raw revert data.
        output: Bytes,
    },
    /// The transaction halted, like running out of gas.
    #[error("execution halted: {0}")]
    Halted(String),
    /// A creation succeeded without yielding an address.
    #[error("contract creation returned no address")]
    MissingContractAddress,
    /// The underlying storage failed to provide state.
    #[error("storage error: {0}")]
    Storage(String),
    /// Reverting to a snapshot that was never taken or already reverted.
    #[error("snapshot {0:?} does not exist")]
    UnknownSnapshot(SnapshotId),
}

/// The right to sign transactions as an address, handed out by
/// [Fork::impersonate].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Signer {
    address: Address,
}

impl Signer {
    /// The address transactions are sent from.
    pub fn address(&self) -> Address {
        self.address
    }
}

/// Identifies a saved fork state, see [Fork::snapshot].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SnapshotId(usize);

#[derive(Debug)]
struct Snapshot<S: Storage> {
    db: CacheDB<StorageWrapper<S>>,
    block_env: BlockEnv,
}

/// A simulated chain layered over a [Storage].
///
/// Reads fall through to the storage, every write stays in a local cache.
/// Each sent transaction is mined in its own block.
#[derive(Debug)]
pub struct Fork<S: Storage> {
    db: CacheDB<StorageWrapper<S>>,
    chain: ForkChain,
    block_env: BlockEnv,
    impersonated: AHashSet<Address>,
    snapshots: Vec<Snapshot<S>>,
}

impl<S: Storage> Fork<S> {
    /// Continue `chain` from `fork_point` on top of `storage`.
    pub fn new(storage: S, chain: ForkChain, fork_point: &ForkPoint) -> Self {
        Self {
            db: CacheDB::new(StorageWrapper(Arc::new(storage))),
            chain,
            block_env: fork_block_env(fork_point),
            impersonated: AHashSet::new(),
            snapshots: Vec::new(),
        }
    }

    /// The rules of the forked chain.
    pub fn chain(&self) -> &ForkChain {
        &self.chain
    }

    /// The underlying storage, to snapshot what was fetched.
    pub fn storage(&self) -> &S {
        &self.db.db.0
    }

    /// Number of the latest block.
    pub fn block_number(&self) -> u64 {
        self.block_env.number.saturating_to()
    }

    /// Timestamp of the latest block.
    pub fn timestamp(&self) -> u64 {
        self.block_env.timestamp.saturating_to()
    }

    /// Allow sending transactions as `address` without its key.
    pub fn impersonate(&mut self, address: Address) -> Signer {
        if self.impersonated.insert(address) {
            debug!(%address, "impersonating account");
        }
        Signer { address }
    }

    /// Stop signing as `address`. Outstanding [Signer]s are rejected from now on.
    pub fn stop_impersonating(&mut self, address: Address) {
        self.impersonated.remove(&address);
    }

    /// Whether transactions from `address` are accepted.
    pub fn is_impersonated(&self, address: &Address) -> bool {
        self.impersonated.contains(address)
    }

    /// Execute a read-only call against the latest block.
    pub fn call(&self, from: Address, to: Address, data: Bytes) -> Result<Bytes, ForkError> {
        let tx = tx_env(from, TransactTo::Call(to), U256::ZERO, data);
        let result_and_state = execute_tx(
            WrapDatabaseRef(&self.db),
            &self.chain,
            &self.block_env,
            tx,
        )
        .map_err(evm_error)?;
        into_receipt(result_and_state.result, self.block_number()).map(|receipt| receipt.output)
    }

    /// Mine a transaction calling `to` with `data`.
    pub fn send(&mut self, signer: Signer, to: Address, data: Bytes) -> Result<Receipt, ForkError> {
        self.transact(signer, TransactTo::Call(to), U256::ZERO, data)
    }

    /// Mine a transaction sending `value` native tokens to `to`.
    pub fn transfer(
        &mut self,
        signer: Signer,
        to: Address,
        value: U256,
    ) -> Result<Receipt, ForkError> {
        self.transact(signer, TransactTo::Call(to), value, Bytes::new())
    }

    /// Mine a creation transaction and return the new contract's address.
    pub fn deploy(&mut self, signer: Signer, init_code: Bytes) -> Result<Address, ForkError> {
        let receipt = self.transact(signer, TransactTo::Create, U256::ZERO, init_code)?;
        let address = receipt
            .contract_address
            .ok_or(ForkError::MissingContractAddress)?;
        debug!(%address, deployer = %signer.address, "deployed contract");
        Ok(address)
    }

    fn transact(
        &mut self,
        signer: Signer,
        transact_to: TransactTo,
        value: U256,
        data: Bytes,
    ) -> Result<Receipt, ForkError> {
        if !self.is_impersonated(&signer.address) {
            return Err(ForkError::NotImpersonated(signer.address));
        }
        self.mine(1);
        let tx = tx_env(signer.address, transact_to, value, data);
        let result_and_state =
            execute_tx(&mut self.db, &self.chain, &self.block_env, tx).map_err(evm_error)?;
        // Reverted transactions still pay gas & bump the nonce, like on chain.
        self.db.commit(result_and_state.state);
        let receipt = into_receipt(result_and_state.result, self.block_number());
        trace!(from = %signer.address, block = self.block_number(), ?receipt, "mined transaction");
        receipt
    }

    /// Read a storage slot.
    pub fn storage_at(&self, address: Address, slot: U256) -> Result<U256, ForkError> {
        self.db
            .storage_ref(address, slot)
            .map_err(|err| ForkError::Storage(err.to_string()))
    }

    /// Overwrite a storage slot, like `hardhat_setStorageAt`.
    pub fn set_storage_at(
        &mut self,
        address: Address,
        slot: U256,
        value: U256,
    ) -> Result<(), ForkError> {
        self.load_account_mut(address)?.storage.insert(slot, value);
        Ok(())
    }

    /// Native balance of an account.
    pub fn balance(&self, address: Address) -> Result<U256, ForkError> {
        Ok(self
            .db
            .basic_ref(address)
            .map_err(|err| ForkError::Storage(err.to_string()))?
            .map(|info| info.balance)
            .unwrap_or_default())
    }

    /// Overwrite the native balance of an account.
    pub fn set_balance(&mut self, address: Address, balance: U256) -> Result<(), ForkError> {
        self.load_account_mut(address)?.info.balance = balance;
        Ok(())
    }

    // Overrides must be visible to the EVM even for accounts that do not
    // exist yet, which the cache otherwise reports as missing.
    fn load_account_mut(&mut self, address: Address) -> Result<&mut DbAccount, ForkError> {
        let account = self
            .db
            .load_account(address)
            .map_err(|err| ForkError::Storage(err.to_string()))?;
        if matches!(account.account_state, AccountState::NotExisting) {
            account.account_state = AccountState::Touched;
        }
        Ok(account)
    }

    /// Runtime code of an account, empty for externally owned accounts.
    pub fn code_at(&self, address: Address) -> Result<Bytes, ForkError> {
        let Some(info) = self
            .db
            .basic_ref(address)
            .map_err(|err| ForkError::Storage(err.to_string()))?
        else {
            return Ok(Bytes::new());
        };
        Ok(match info.code {
            Some(code) => code.original_bytes(),
            None => self
                .db
                .code_by_hash_ref(info.code_hash)
                .map_err(|err| ForkError::Storage(err.to_string()))?
                .original_bytes(),
        })
    }

    /// Move the clock forward and mine a block at the new time, like
    /// `evm_increaseTime` followed by `evm_mine`.
    pub fn increase_time(&mut self, seconds: u64) {
        self.block_env.timestamp += U256::from(seconds);
        self.block_env.number += U256::from(1);
        debug!(
            seconds,
            block = self.block_number(),
            timestamp = self.timestamp(),
            "increased time"
        );
    }

    /// Mine empty blocks, one [BLOCK_INTERVAL] apart.
    pub fn mine(&mut self, blocks: u64) {
        self.block_env.number += U256::from(blocks);
        self.block_env.timestamp += U256::from(blocks * BLOCK_INTERVAL);
    }

    /// Save the current state and block.
    pub fn snapshot(&mut self) -> SnapshotId {
        self.snapshots.push(Snapshot {
            db: self.db.clone(),
            block_env: self.block_env.clone(),
        });
        SnapshotId(self.snapshots.len() - 1)
    }

    /// Restore a saved state. The snapshot and every later one are consumed,
    /// like `evm_revert`.
    pub fn revert(&mut self, id: SnapshotId) -> Result<(), ForkError> {
        if id.0 >= self.snapshots.len() {
            return Err(ForkError::UnknownSnapshot(id));
        }
        let Snapshot { db, block_env } = self.snapshots.swap_remove(id.0);
        self.snapshots.truncate(id.0);
        self.db = db;
        self.block_env = block_env;
        debug!(block = self.block_number(), "reverted to snapshot");
        Ok(())
    }
}
