//! Chain specific utils

use alloy_chains::NamedChain;
use revm::primitives::SpecId;

/// The rules a forked network executes with: its chain id for `CHAINID`
/// and the EVM spec its blocks run under.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ForkChain {
    id: u64,
    spec_id: SpecId,
}

impl ForkChain {
    /// Avalanche C-Chain, where the globes are deployed.
    pub fn avalanche() -> Self {
        Self {
            id: NamedChain::Avalanche.into(),
            // Durango activated Shanghai; Cancun came later with Etna.
            spec_id: SpecId::SHANGHAI,
        }
    }

    /// Ethereum Mainnet
    pub fn mainnet() -> Self {
        Self {
            id: NamedChain::Mainnet.into(),
            spec_id: SpecId::CANCUN,
        }
    }

    /// Pick the rules of a chain from the id reported by the node. Unknown
    /// chains run with the latest Ethereum rules.
    pub fn from_id(id: u64) -> Self {
        match NamedChain::try_from(id) {
            Ok(NamedChain::Avalanche) | Ok(NamedChain::AvalancheFuji) => Self {
                id,
                ..Self::avalanche()
            },
            _ => Self {
                id,
                ..Self::mainnet()
            },
        }
    }

    /// Override the EVM spec.
    pub fn with_spec_id(self, spec_id: SpecId) -> Self {
        Self { spec_id, ..self }
    }

    /// Get chain id.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Get the EVM spec.
    pub fn spec_id(&self) -> SpecId {
        self.spec_id
    }
}
