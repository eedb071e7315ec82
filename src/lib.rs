//! Fork-simulation harness for globe vaults, their controller and
//! yield strategies.
//!
//! The harness forks chain state lazily over RPC into an in-process EVM,
//! impersonates the accounts that own the contracts, overwrites token
//! balances and then walks every configured strategy through the same
//! deposit, withdraw and harvest scenario.

use std::hash::{BuildHasherDefault, Hasher};

/// We use the last 8 bytes of an existing hash like address
/// or code hash instead of rehashing it.
#[derive(Debug, Default)]
pub struct SuffixHasher(u64);
impl Hasher for SuffixHasher {
    fn write(&mut self, bytes: &[u8]) {
        let mut suffix = [0u8; 8];
        let start = bytes.len().saturating_sub(8);
        suffix[8 - (bytes.len() - start)..].copy_from_slice(&bytes[start..]);
        self.0 = u64::from_be_bytes(suffix);
    }
    fn finish(&self) -> u64 {
        self.0
    }
}

/// Build a suffix hasher
pub type BuildSuffixHasher = BuildHasherDefault<SuffixHasher>;

pub mod artifact;
pub mod assertion;
pub mod chain;
pub use chain::ForkChain;
pub mod contracts;
mod fork;
pub use fork::{Fork, ForkError, Signer, SnapshotId};
mod primitives;
pub use primitives::{BLOCK_INTERVAL, TX_GAS_LIMIT};
pub mod scenario;
mod storage;
pub use storage::{
    AccountBasic, BlockHashes, Bytecodes, ChainState, EvmAccount, EvmCode, ForkPoint, ForkState,
    ForkStateError, InMemoryStorage, RpcStorage, Storage, StorageWrapper,
};
pub mod token_balance;
mod vm;
pub use vm::Receipt;
