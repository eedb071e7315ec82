use std::fmt::Display;

use alloy_primitives::{Address, Bytes};
use alloy_sol_types::{Panic, Revert, SolError};
use revm::{
    primitives::{BlockEnv, EVMError, ExecutionResult, Log, ResultAndState, TxEnv},
    Database, Evm,
};

use crate::{ForkChain, ForkError};

/// The outcome of a committed transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Receipt {
    /// Block the transaction was mined in.
    pub block_number: u64,
    /// Gas used after refunds.
    pub gas_used: u64,
    /// Logs emitted during execution.
    pub logs: Vec<Log>,
    /// Return data, or the runtime code for a creation.
    pub output: Bytes,
    /// Address of the created contract, if any.
    pub contract_address: Option<Address>,
}

// Execute a transaction on top of `db` without committing it.
// Zero-priced transactions from contracts must pass validation, as the
// roles we impersonate are often multisigs & timelocks.
pub(crate) fn execute_tx<DB: Database>(
    db: DB,
    chain: &ForkChain,
    block_env: &BlockEnv,
    tx: TxEnv,
) -> Result<ResultAndState, EVMError<DB::Error>> {
    let mut evm = Evm::builder()
        .with_db(db)
        .with_spec_id(chain.spec_id())
        .modify_cfg_env(|cfg| {
            cfg.chain_id = chain.id();
            cfg.disable_eip3607 = true;
            cfg.disable_base_fee = true;
        })
        .with_block_env(block_env.clone())
        .with_tx_env(tx)
        .build();
    evm.transact()
}

pub(crate) fn evm_error<E: Display>(err: EVMError<E>) -> ForkError {
    match err {
        EVMError::Database(err) => ForkError::Storage(err.to_string()),
        err => ForkError::Evm(err.to_string()),
    }
}

// Contracts revert with `Error(string)` from `require` and `Panic(uint256)`
// from failed asserts & arithmetic. Anything else is a custom error we have
// no ABI for here.
fn revert_reason(output: &[u8]) -> Option<String> {
    if let Ok(revert) = Revert::abi_decode(output, true) {
        return Some(revert.reason);
    }
    Panic::abi_decode(output, true)
        .ok()
        .map(|panic| format!("panic code {:#x}", panic.code))
}

// Successful executions become receipts, reverts & halts become errors
// carrying as much as the EVM told us.
pub(crate) fn into_receipt(
    result: ExecutionResult,
    block_number: u64,
) -> Result<Receipt, ForkError> {
    match result {
        ExecutionResult::Success {
            gas_used,
            logs,
            output,
            ..
        } => Ok(Receipt {
            block_number,
            gas_used,
            logs,
            contract_address: output.address().copied(),
            output: output.into_data(),
        }),
        ExecutionResult::Revert { output, .. } => Err(ForkError::Reverted {
            reason: revert_reason(&output),
            output,
        }),
        ExecutionResult::Halt { reason, .. } => Err(ForkError::Halted(format!("{reason:?}"))),
    }
}
