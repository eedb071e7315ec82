use alloy_primitives::{Address, U256};

use super::{Contract, ContractError, IERC20};
use crate::{Fork, Receipt, Signer, Storage};

/// An ERC20 token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Erc20(Contract);

impl Erc20 {
    /// Bind to the token at `address` as `signer`.
    pub fn new(address: Address, signer: Signer) -> Self {
        Self(Contract::new(address, signer))
    }

    /// The token's address.
    pub fn address(&self) -> Address {
        self.0.address()
    }

    /// The same token bound to another signer.
    pub fn connect(&self, signer: Signer) -> Self {
        Self(self.0.connect(signer))
    }

    /// Token balance of `account`.
    pub fn balance_of<S: Storage>(
        &self,
        fork: &Fork<S>,
        account: Address,
    ) -> Result<U256, ContractError> {
        Ok(self.0.call(fork, IERC20::balanceOfCall { account })?._0)
    }

    /// Allow `spender` to move `amount` of the signer's tokens.
    pub fn approve<S: Storage>(
        &self,
        fork: &mut Fork<S>,
        spender: Address,
        amount: U256,
    ) -> Result<Receipt, ContractError> {
        self.0.send(fork, IERC20::approveCall { spender, amount })
    }

    /// Amount `spender` may still move on behalf of `owner`.
    pub fn allowance<S: Storage>(
        &self,
        fork: &Fork<S>,
        owner: Address,
        spender: Address,
    ) -> Result<U256, ContractError> {
        Ok(self.0.call(fork, IERC20::allowanceCall { owner, spender })?._0)
    }

    /// Number of decimals of the token's native precision.
    pub fn decimals<S: Storage>(&self, fork: &Fork<S>) -> Result<u8, ContractError> {
        Ok(self.0.call(fork, IERC20::decimalsCall {})?._0)
    }
}
