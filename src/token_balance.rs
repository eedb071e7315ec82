//! Overwriting ERC20 balances straight in storage.
//!
//! A token keeps `balanceOf` in a mapping whose slot index depends on its
//! storage layout. We find that index by writing a sentinel to candidate
//! slots until `balanceOf` reports it, then write balances directly.

use ahash::AHashMap;
use alloy_primitives::{keccak256, Address, U256};
use alloy_sol_types::SolValue;
use serde::Deserialize;
use tracing::{debug, trace};

use crate::{
    contracts::{call_from, ContractError, IERC20},
    Fork, ForkError, Storage,
};

/// Mapping slots probed when looking for a token's balances.
pub const MAX_PROBED_SLOT: u64 = 100;

// Unlikely to be anyone's real balance.
const SENTINEL: U256 = U256::from_limbs([0x5e17_1e15_5e17_1e15, 0x0ba1_a9ce, 0, 0]);

/// How a compiler lays out `mapping(address => uint256)` entries.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MappingLayout {
    /// `keccak256(abi.encode(key, slot))`
    #[default]
    Solidity,
    /// `keccak256(abi.encode(slot, key))`
    Vyper,
}

/// The storage slot of a token's balance mapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
pub struct BalanceSlot {
    /// Slot index of the mapping.
    pub index: u64,
    /// Layout the token was compiled with.
    #[serde(default)]
    pub layout: MappingLayout,
}

impl BalanceSlot {
    /// A mapping at `index` compiled by Solidity.
    pub fn solidity(index: u64) -> Self {
        Self {
            index,
            layout: MappingLayout::Solidity,
        }
    }

    /// A mapping at `index` compiled by Vyper.
    pub fn vyper(index: u64) -> Self {
        Self {
            index,
            layout: MappingLayout::Vyper,
        }
    }

    /// The storage key holding `holder`'s balance.
    pub fn storage_key(&self, holder: Address) -> U256 {
        let index = U256::from(self.index);
        let hash = match self.layout {
            MappingLayout::Solidity => keccak256((holder, index).abi_encode()),
            MappingLayout::Vyper => keccak256((index, holder).abi_encode()),
        };
        U256::from_be_bytes(hash.0)
    }
}

/// Errors when overwriting a token balance.
#[derive(Debug, thiserror::Error)]
pub enum OverwriteError {
    /// No probed slot holds the token's balances.
    #[error("no balance mapping of {0} found in slots 0..{MAX_PROBED_SLOT}")]
    SlotNotFound(Address),
    /// `balanceOf` failed while probing.
    #[error(transparent)]
    Contract(#[from] ContractError),
    /// Reading or writing the token's storage failed.
    #[error(transparent)]
    Fork(#[from] ForkError),
}

/// Overwrites token balances, remembering each token's balance slot.
#[derive(Debug, Default, Clone)]
pub struct TokenBalances {
    slots: AHashMap<Address, BalanceSlot>,
}

impl TokenBalances {
    /// Create with no known slots.
    pub fn new() -> Self {
        Self::default()
    }

    /// Use `slot` for `token` instead of probing for it.
    pub fn set_slot(&mut self, token: Address, slot: BalanceSlot) {
        self.slots.insert(token, slot);
    }

    /// The known balance slot of `token`.
    pub fn slot(&self, token: &Address) -> Option<BalanceSlot> {
        self.slots.get(token).copied()
    }

    /// Set `holder`'s balance of `token` to exactly `amount`, like
    /// `overwriteTokenAmount`.
    pub fn overwrite<S: Storage>(
        &mut self,
        fork: &mut Fork<S>,
        token: Address,
        holder: Address,
        amount: U256,
    ) -> Result<BalanceSlot, OverwriteError> {
        let slot = match self.slot(&token) {
            Some(slot) => slot,
            None => {
                let slot = find_balance_slot(fork, token, holder)?;
                debug!(%token, index = slot.index, layout = ?slot.layout, "found balance slot");
                self.slots.insert(token, slot);
                slot
            }
        };
        fork.set_storage_at(token, slot.storage_key(holder), amount)?;
        debug!(%token, %holder, %amount, "overwrote token balance");
        Ok(slot)
    }
}

/// Probe slots below [MAX_PROBED_SLOT] in both layouts for `token`'s
/// balance mapping. Every probed slot is restored.
pub fn find_balance_slot<S: Storage>(
    fork: &mut Fork<S>,
    token: Address,
    holder: Address,
) -> Result<BalanceSlot, OverwriteError> {
    for index in 0..MAX_PROBED_SLOT {
        for slot in [BalanceSlot::solidity(index), BalanceSlot::vyper(index)] {
            let key = slot.storage_key(holder);
            let original = fork.storage_at(token, key)?;
            fork.set_storage_at(token, key, SENTINEL)?;
            let balance = balance_of(fork, token, holder);
            fork.set_storage_at(token, key, original)?;
            trace!(%token, index, layout = ?slot.layout, "probed balance slot");
            if balance? == SENTINEL {
                return Ok(slot);
            }
        }
    }
    Err(OverwriteError::SlotNotFound(token))
}

fn balance_of<S: Storage>(
    fork: &Fork<S>,
    token: Address,
    holder: Address,
) -> Result<U256, ContractError> {
    Ok(call_from(fork, holder, token, IERC20::balanceOfCall { account: holder })?._0)
}

#[cfg(test)]
mod tests {
    use alloy_primitives::{address, b256, B256};

    use super::*;

    #[test]
    fn solidity_key() {
        // balanceOf[holder] of a mapping at slot 0, as `cast index` computes it.
        let holder = address!("0000000000000000000000000000000000000001");
        let key = BalanceSlot::solidity(0).storage_key(holder);
        let expected: B256 = b256!("ada5013122d395ba3c54772283fb069b10426056ef8ca54750cb9bb552a59e7d");
        assert_eq!(key, U256::from_be_bytes(expected.0));
    }

    #[test]
    fn layouts_differ() {
        let holder = address!("00000000000000000000000000000000000a11ce");
        assert_ne!(
            BalanceSlot::solidity(3).storage_key(holder),
            BalanceSlot::vyper(3).storage_key(holder)
        );
        assert_ne!(
            BalanceSlot::solidity(3).storage_key(holder),
            BalanceSlot::solidity(4).storage_key(holder)
        );
    }
}
