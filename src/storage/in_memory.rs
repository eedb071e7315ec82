use std::convert::Infallible;

use alloy_primitives::{keccak256, Address, B256, U256};

use super::{BlockHashes, Bytecodes, ChainState, EvmCode, ForkState};
use crate::{AccountBasic, EvmAccount, Storage};

/// A storage that stores chain data in memory.
#[derive(Debug, Default, Clone)]
pub struct InMemoryStorage {
    accounts: ChainState,
    bytecodes: Bytecodes,
    block_hashes: BlockHashes,
}

impl InMemoryStorage {
    /// Construct a new [InMemoryStorage]. Code attached to the accounts is
    /// indexed by hash.
    pub fn new(
        accounts: impl IntoIterator<Item = (Address, EvmAccount)>,
        block_hashes: impl IntoIterator<Item = (u64, B256)>,
    ) -> Self {
        let mut bytecodes = Bytecodes::default();
        let accounts = accounts
            .into_iter()
            .map(|(address, mut account)| {
                if let Some(code) = account.code.take() {
                    let code_hash = *account.code_hash.get_or_insert_with(|| code.hash());
                    bytecodes.insert(code_hash, code);
                }
                (address, account)
            })
            .collect();
        InMemoryStorage {
            accounts,
            bytecodes,
            block_hashes: block_hashes.into_iter().collect(),
        }
    }
}

impl From<ForkState> for InMemoryStorage {
    fn from(state: ForkState) -> Self {
        InMemoryStorage {
            accounts: state.accounts,
            bytecodes: state.bytecodes,
            block_hashes: state.block_hashes,
        }
    }
}

impl Storage for InMemoryStorage {
    type Error = Infallible;

    fn basic(&self, address: &Address) -> Result<Option<AccountBasic>, Self::Error> {
        Ok(self.accounts.get(address).map(|account| AccountBasic {
            balance: account.balance,
            nonce: account.nonce,
        }))
    }

    fn code_hash(&self, address: &Address) -> Result<Option<B256>, Self::Error> {
        Ok(self
            .accounts
            .get(address)
            .and_then(|account| account.code_hash))
    }

    fn code_by_hash(&self, code_hash: &B256) -> Result<Option<EvmCode>, Self::Error> {
        Ok(self.bytecodes.get(code_hash).cloned())
    }

    fn storage(&self, address: &Address, index: &U256) -> Result<U256, Self::Error> {
        Ok(self
            .accounts
            .get(address)
            .and_then(|account| account.storage.get(index))
            .copied()
            .unwrap_or_default())
    }

    fn block_hash(&self, number: &u64) -> Result<B256, Self::Error> {
        Ok(self
            .block_hashes
            .get(number)
            .copied()
            // Matching REVM's [EmptyDB] for now
            .unwrap_or_else(|| keccak256(number.to_string().as_bytes())))
    }
}
