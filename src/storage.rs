use std::{
    collections::HashMap,
    fmt::Display,
    fs::File,
    io::{BufReader, BufWriter},
    path::Path,
    sync::Arc,
};

use ahash::AHashMap;
use alloy_consensus::constants::KECCAK_EMPTY;
use alloy_primitives::{keccak256, Address, Bytes, B256, U256};
use flate2::{bufread::GzDecoder, write::GzEncoder, Compression};
use revm::{
    primitives::{AccountInfo, Bytecode},
    DatabaseRef,
};
use serde::{Deserialize, Serialize};

use crate::BuildSuffixHasher;

/// An EVM account.
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvmAccount {
    /// The account's balance.
    pub balance: U256,
    /// The account's nonce.
    pub nonce: u64,
    /// The optional code hash of the account.
    pub code_hash: Option<B256>,
    /// The account's optional code.
    pub code: Option<EvmCode>,
    /// The account's storage.
    pub storage: AHashMap<U256, U256>,
}

impl EvmAccount {
    /// An account holding contract code with empty storage.
    pub fn with_code(code: impl Into<Bytes>) -> Self {
        let code = EvmCode(code.into());
        Self {
            code_hash: Some(code.hash()),
            code: Some(code),
            ..Self::default()
        }
    }
}

/// Basic information of an account
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct AccountBasic {
    /// The balance of the account.
    pub balance: U256,
    /// The nonce of the account.
    pub nonce: u64,
}

/// Raw runtime bytecode of an account.
///
/// Forked contracts come from `eth_getCode` unanalyzed, so we keep the raw
/// bytes and let REVM analyze them on load.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvmCode(pub Bytes);

impl EvmCode {
    /// The keccak hash of the code, [KECCAK_EMPTY] for empty code.
    pub fn hash(&self) -> B256 {
        if self.0.is_empty() {
            KECCAK_EMPTY
        } else {
            keccak256(&self.0)
        }
    }
}

impl From<Bytes> for EvmCode {
    fn from(bytes: Bytes) -> Self {
        Self(bytes)
    }
}

impl From<EvmCode> for Bytecode {
    fn from(code: EvmCode) -> Self {
        Bytecode::new_raw(code.0)
    }
}

impl From<Bytecode> for EvmCode {
    fn from(code: Bytecode) -> Self {
        Self(code.original_bytes())
    }
}

/// Mapping from address to [EvmAccount]
pub type ChainState = HashMap<Address, EvmAccount, BuildSuffixHasher>;

/// Mapping from code hashes to [EvmCode]s
pub type Bytecodes = HashMap<B256, EvmCode, BuildSuffixHasher>;

/// Mapping from block numbers to block hashes
pub type BlockHashes = AHashMap<u64, B256>;

/// An interface to provide chain state to the fork for transaction execution.
/// Staying close to the underlying REVM's Database trait while not leaking
/// its primitives to library users.
pub trait Storage {
    /// Errors when querying data from storage.
    type Error: Display;

    /// Get basic account information.
    fn basic(&self, address: &Address) -> Result<Option<AccountBasic>, Self::Error>;

    /// Get the code hash of an account.
    fn code_hash(&self, address: &Address) -> Result<Option<B256>, Self::Error>;

    /// Get account code by its hash.
    fn code_by_hash(&self, code_hash: &B256) -> Result<Option<EvmCode>, Self::Error>;

    /// Get storage value of address at index.
    fn storage(&self, address: &Address, index: &U256) -> Result<U256, Self::Error>;

    /// Get block hash by block number.
    fn block_hash(&self, number: &u64) -> Result<B256, Self::Error>;
}

/// A Storage wrapper that implements REVM's [DatabaseRef] for ease of
/// integration. Shared so the fork's cache layer can be cloned for snapshots.
#[derive(Debug)]
pub struct StorageWrapper<S: Storage>(pub Arc<S>);

impl<S: Storage> Clone for StorageWrapper<S> {
    fn clone(&self) -> Self {
        Self(Arc::clone(&self.0))
    }
}

impl<S: Storage> DatabaseRef for StorageWrapper<S> {
    type Error = S::Error;

    fn basic_ref(&self, address: Address) -> Result<Option<AccountInfo>, Self::Error> {
        Ok(if let Some(basic) = self.0.basic(&address)? {
            let code_hash = self.0.code_hash(&address)?;
            let code = if let Some(code_hash) = &code_hash {
                self.0.code_by_hash(code_hash)?.map(Bytecode::from)
            } else {
                None
            };
            Some(AccountInfo {
                balance: basic.balance,
                nonce: basic.nonce,
                code_hash: code_hash.unwrap_or(KECCAK_EMPTY),
                code,
            })
        } else {
            None
        })
    }

    fn code_by_hash_ref(&self, code_hash: B256) -> Result<Bytecode, Self::Error> {
        self.0
            .code_by_hash(&code_hash)
            .map(|code| code.map(Bytecode::from).unwrap_or_default())
    }

    fn storage_ref(&self, address: Address, index: U256) -> Result<U256, Self::Error> {
        self.0.storage(&address, &index)
    }

    fn block_hash_ref(&self, number: u64) -> Result<B256, Self::Error> {
        self.0.block_hash(&number)
    }
}

/// Chain state loaded so far, persisted between runs so a rerun at the
/// same fork block does not refetch it.
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForkState {
    /// The block the state was read at.
    pub block_number: u64,
    /// Accounts with the storage slots read so far. Code lives in `bytecodes`.
    pub accounts: ChainState,
    /// Contract code by hash.
    pub bytecodes: Bytecodes,
    /// Block hashes read by `BLOCKHASH`.
    pub block_hashes: BlockHashes,
}

/// Errors when persisting or restoring a [ForkState].
#[derive(Debug, thiserror::Error)]
pub enum ForkStateError {
    /// Cannot open or create the state file.
    #[error("cannot access fork state file: {0}")]
    Io(#[from] std::io::Error),
    /// The file is not a valid compressed state.
    #[error("invalid fork state encoding: {0}")]
    Encoding(#[from] bincode::Error),
}

impl ForkState {
    /// Write the state as gzip-compressed bincode.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ForkStateError> {
        let file = File::create(path)?;
        let mut encoder = GzEncoder::new(BufWriter::new(file), Compression::default());
        bincode::serialize_into(&mut encoder, self)?;
        encoder.finish()?;
        Ok(())
    }

    /// Read a state written by [ForkState::save].
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ForkStateError> {
        let file = File::open(path)?;
        Ok(bincode::deserialize_from(GzDecoder::new(BufReader::new(
            file,
        )))?)
    }
}

mod in_memory;
pub use in_memory::InMemoryStorage;
mod rpc;
pub use rpc::{ForkPoint, RpcStorage};
