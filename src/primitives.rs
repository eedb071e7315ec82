use alloy_primitives::{Address, Bytes, U256};
use revm::primitives::{BlockEnv, TransactTo, TxEnv};

use crate::ForkPoint;

/// Gas limit of every simulated transaction. Strategy deployments and
/// leveraged harvests are far more expensive than usual transfers.
pub const TX_GAS_LIMIT: u64 = 30_000_000;

/// Seconds between two consecutively mined blocks.
pub const BLOCK_INTERVAL: u64 = 1;

/// Build the block env that continues the chain from a fork point.
pub(crate) fn fork_block_env(fork_point: &ForkPoint) -> BlockEnv {
    BlockEnv {
        number: U256::from(fork_point.number),
        timestamp: U256::from(fork_point.timestamp),
        // The block must fit one of our transactions.
        gas_limit: fork_point.gas_limit.max(U256::from(TX_GAS_LIMIT)),
        basefee: fork_point.base_fee,
        ..BlockEnv::default()
    }
}

/// Build the env of a zero-priced transaction.
pub(crate) fn tx_env(caller: Address, transact_to: TransactTo, value: U256, data: Bytes) -> TxEnv {
    TxEnv {
        caller,
        gas_limit: TX_GAS_LIMIT,
        gas_price: U256::ZERO,
        transact_to,
        value,
        data,
        ..TxEnv::default()
    }
}
