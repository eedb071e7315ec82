use alloy_primitives::{Address, U256};

use super::{Contract, ContractError, IGlobe};
use crate::{Fork, Receipt, Signer, Storage};

/// A globe vault. Depositors receive shares of the asset it holds and
/// `earn` pushes idle assets to the active strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Globe(Contract);

impl Globe {
    /// Bind to the globe at `address` as `signer`.
    pub fn new(address: Address, signer: Signer) -> Self {
        Self(Contract::new(address, signer))
    }

    /// The globe's address.
    pub fn address(&self) -> Address {
        self.0.address()
    }

    /// The same globe bound to another signer.
    pub fn connect(&self, signer: Signer) -> Self {
        Self(self.0.connect(signer))
    }

    /// Shares held by `account`.
    pub fn balance_of<S: Storage>(
        &self,
        fork: &Fork<S>,
        account: Address,
    ) -> Result<U256, ContractError> {
        Ok(self.0.call(fork, IGlobe::balanceOfCall { account })?._0)
    }

    /// Assets managed by the globe, idle or in the strategy.
    pub fn balance<S: Storage>(&self, fork: &Fork<S>) -> Result<U256, ContractError> {
        Ok(self.0.call(fork, IGlobe::balanceCall {})?._0)
    }

    /// The asset the globe accepts.
    pub fn token<S: Storage>(&self, fork: &Fork<S>) -> Result<Address, ContractError> {
        Ok(self.0.call(fork, IGlobe::tokenCall {})?._0)
    }

    /// Deposit `amount` of the signer's assets.
    pub fn deposit<S: Storage>(
        &self,
        fork: &mut Fork<S>,
        amount: U256,
    ) -> Result<Receipt, ContractError> {
        self.0.send(fork, IGlobe::depositCall { amount })
    }

    /// Deposit all of the signer's assets.
    pub fn deposit_all<S: Storage>(&self, fork: &mut Fork<S>) -> Result<Receipt, ContractError> {
        self.0.send(fork, IGlobe::depositAllCall {})
    }

    /// Redeem all of the signer's shares.
    pub fn withdraw_all<S: Storage>(&self, fork: &mut Fork<S>) -> Result<Receipt, ContractError> {
        self.0.send(fork, IGlobe::withdrawAllCall {})
    }

    /// Move idle assets into the strategy.
    pub fn earn<S: Storage>(&self, fork: &mut Fork<S>) -> Result<Receipt, ContractError> {
        self.0.send(fork, IGlobe::earnCall {})
    }
}
