use alloy_primitives::{Address, U256};

use super::{Contract, ContractError, IStrategy};
use crate::{Fork, Receipt, Signer, Storage};

/// A yield strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Strategy(Contract);

impl Strategy {
    /// Bind to the strategy at `address` as `signer`.
    pub fn new(address: Address, signer: Signer) -> Self {
        Self(Contract::new(address, signer))
    }

    /// The strategy's address.
    pub fn address(&self) -> Address {
        self.0.address()
    }

    /// The same strategy bound to another signer.
    pub fn connect(&self, signer: Signer) -> Self {
        Self(self.0.connect(signer))
    }

    /// Assets the strategy manages, net of any leverage.
    pub fn balance_of<S: Storage>(&self, fork: &Fork<S>) -> Result<U256, ContractError> {
        Ok(self.0.call(fork, IStrategy::balanceOfCall {})?._0)
    }

    /// Realize accrued rewards into the strategy's balance.
    pub fn harvest<S: Storage>(&self, fork: &mut Fork<S>) -> Result<Receipt, ContractError> {
        self.0.send(fork, IStrategy::harvestCall {})
    }

    /// Unwind leverage down to the minimum.
    pub fn deleverage_to_min<S: Storage>(
        &self,
        fork: &mut Fork<S>,
    ) -> Result<Receipt, ContractError> {
        self.0.send(fork, IStrategy::deleverageToMinCall {})
    }

    /// Allow `harvester` to call [Strategy::harvest].
    pub fn whitelist_harvester<S: Storage>(
        &self,
        fork: &mut Fork<S>,
        harvester: Address,
    ) -> Result<Receipt, ContractError> {
        self.0
            .send(fork, IStrategy::whitelistHarvesterCall { harvester })
    }

    /// The asset the strategy farms with.
    pub fn want<S: Storage>(&self, fork: &Fork<S>) -> Result<Address, ContractError> {
        Ok(self.0.call(fork, IStrategy::wantCall {})?._0)
    }
}
