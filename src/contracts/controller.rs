use alloy_primitives::Address;

use super::{Contract, ContractError, IController};
use crate::{Fork, Receipt, Signer, Storage};

/// The controller mapping assets to globes and strategies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Controller(Contract);

impl Controller {
    /// Bind to the controller at `address` as `signer`.
    pub fn new(address: Address, signer: Signer) -> Self {
        Self(Contract::new(address, signer))
    }

    /// The controller's address.
    pub fn address(&self) -> Address {
        self.0.address()
    }

    /// The same controller bound to another signer.
    pub fn connect(&self, signer: Signer) -> Self {
        Self(self.0.connect(signer))
    }

    /// The globe registered for `asset`.
    pub fn globes<S: Storage>(
        &self,
        fork: &Fork<S>,
        asset: Address,
    ) -> Result<Address, ContractError> {
        Ok(self.0.call(fork, IController::globesCall { asset })?._0)
    }

    /// The active strategy for `asset`.
    pub fn strategies<S: Storage>(
        &self,
        fork: &Fork<S>,
        asset: Address,
    ) -> Result<Address, ContractError> {
        Ok(self.0.call(fork, IController::strategiesCall { asset })?._0)
    }

    /// Approve `strategy` for `asset`. Only the timelock may.
    pub fn approve_strategy<S: Storage>(
        &self,
        fork: &mut Fork<S>,
        asset: Address,
        strategy: Address,
    ) -> Result<Receipt, ContractError> {
        self.0
            .send(fork, IController::approveStrategyCall { asset, strategy })
    }

    /// Make an approved `strategy` the active one for `asset`.
    pub fn set_strategy<S: Storage>(
        &self,
        fork: &mut Fork<S>,
        asset: Address,
        strategy: Address,
    ) -> Result<Receipt, ContractError> {
        self.0
            .send(fork, IController::setStrategyCall { asset, strategy })
    }
}
