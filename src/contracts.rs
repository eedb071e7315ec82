//! Signer-scoped handles to the contracts a scenario drives.

use alloy_primitives::{Address, Bytes};
use alloy_sol_types::{sol, SolCall};

use crate::{Fork, ForkError, Receipt, Signer, Storage};

sol! {
    /// The subset of ERC20 the harness needs.
    #[derive(Debug)]
    interface IERC20 {
        function balanceOf(address account) external view returns (uint256);
        function approve(address spender, uint256 amount) external returns (bool);
        function allowance(address owner, address spender) external view returns (uint256);
        function decimals() external view returns (uint8);
    }

    /// A globe vault holding a single asset.
    interface IGlobe {
        function balanceOf(address account) external view returns (uint256);
        function balance() external view returns (uint256);
        function token() external view returns (address);
        function deposit(uint256 amount) external;
        function depositAll() external;
        function withdrawAll() external;
        function earn() external;
    }

    /// Routes each asset to its globe and active strategy.
    interface IController {
        function globes(address asset) external view returns (address);
        function strategies(address asset) external view returns (address);
        function approveStrategy(address asset, address strategy) external;
        function setStrategy(address asset, address strategy) external;
    }

    /// A (possibly leveraged) yield strategy.
    interface IStrategy {
        function balanceOf() external view returns (uint256);
        function harvest() external;
        function deleverageToMin() external;
        function whitelistHarvester(address harvester) external;
        function want() external view returns (address);
    }
}

/// Errors when calling a contract method.
#[derive(Debug, thiserror::Error)]
pub enum ContractError {
    /// The call or transaction failed on the fork.
    #[error("{method} failed: {source}")]
    Call {
        /// Solidity signature of the method.
        method: &'static str,
        /// The underlying fork error.
        source: ForkError,
    },
    /// The return data does not match the method's outputs.
    #[error("cannot decode the return of {method}: {source}")]
    Decode {
        /// Solidity signature of the method.
        method: &'static str,
        /// The underlying ABI error.
        source: alloy_sol_types::Error,
    },
}

/// A contract at an address, sending transactions as one signer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Contract {
    address: Address,
    signer: Signer,
}

impl Contract {
    /// Bind to the contract at `address` as `signer`.
    pub fn new(address: Address, signer: Signer) -> Self {
        Self { address, signer }
    }

    /// The contract's address.
    pub fn address(&self) -> Address {
        self.address
    }

    /// The signer transactions are sent from.
    pub fn signer(&self) -> Signer {
        self.signer
    }

    /// The same contract bound to another signer.
    pub fn connect(&self, signer: Signer) -> Self {
        Self { signer, ..*self }
    }

    /// Query a method without committing anything.
    pub fn call<S: Storage, C: SolCall>(
        &self,
        fork: &Fork<S>,
        call: C,
    ) -> Result<C::Return, ContractError> {
        call_from(fork, self.signer.address(), self.address, call)
    }

    /// Send a transaction calling a method. Return data is not decoded, as
    /// tokens like USDT return nothing where the standard says `bool`.
    pub fn send<S: Storage, C: SolCall>(
        &self,
        fork: &mut Fork<S>,
        call: C,
    ) -> Result<Receipt, ContractError> {
        fork.send(self.signer, self.address, Bytes::from(call.abi_encode()))
            .map_err(|source| ContractError::Call {
                method: C::SIGNATURE,
                source,
            })
    }
}

/// Query a method of the contract at `to` as `from`, who needs no
/// impersonation as nothing is committed.
pub fn call_from<S: Storage, C: SolCall>(
    fork: &Fork<S>,
    from: Address,
    to: Address,
    call: C,
) -> Result<C::Return, ContractError> {
    let output = fork
        .call(from, to, Bytes::from(call.abi_encode()))
        .map_err(|source| ContractError::Call {
            method: C::SIGNATURE,
            source,
        })?;
    C::abi_decode_returns(&output, true).map_err(|source| ContractError::Decode {
        method: C::SIGNATURE,
        source,
    })
}

mod controller;
pub use controller::Controller;
mod erc20;
pub use erc20::Erc20;
mod globe;
pub use globe::Globe;
mod strategy;
pub use strategy::Strategy;
