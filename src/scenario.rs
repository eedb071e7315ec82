//! The globe & strategy scenario: setup, then seven ordered steps.

use alloy_primitives::{uint, Address, U256};
use alloy_sol_types::SolValue;
use tracing::{info, warn};

use crate::{
    artifact::{ArtifactError, InterfaceDescription},
    assertion::{ensure_eq, ensure_gt, ensure_lt, ensure_ne, AssertionFailure},
    contracts::{ContractError, Controller, Erc20, Globe, Strategy},
    token_balance::{OverwriteError, TokenBalances},
    Fork, ForkError, Signer, Storage,
};

mod config;
pub use config::{ConfigError, PartialRoles, Roles, ScenarioConfig, ScenarioFile};
mod report;
pub use report::{ScenarioReport, Step, StepOutcome, StepReport};

/// Time between depositing and harvesting.
///
/// The steps expecting growth assume strategies accrue a positive yield over
/// this window. That is a property of the strategies & market at the fork
/// block, not something the harness can guarantee.
pub const HARVEST_DELAY: u64 = 60 * 60 * 24 * 15;

/// Allowance granted to the globe before depositing everything.
pub const MAX_ALLOWANCE: U256 = uint!(2_500_000_000_000_000_000_000_000_000_U256);

const GLOBE_FUNCTIONS: &[&str] = &["balanceOf", "deposit", "depositAll", "withdrawAll", "earn"];
const STRATEGY_FUNCTIONS: &[&str] = &["balanceOf", "harvest", "whitelistHarvester"];

/// Errors failing a scenario's setup or step.
#[derive(Debug, thiserror::Error)]
pub enum ScenarioError {
    /// Fork error
    #[error(transparent)]
    Fork(#[from] ForkError),
    /// Contract error
    #[error(transparent)]
    Contract(#[from] ContractError),
    /// Balance overwrite error
    #[error(transparent)]
    Overwrite(#[from] OverwriteError),
    /// Interface description error
    #[error(transparent)]
    Artifact(#[from] ArtifactError),
    /// A check did not hold
    #[error(transparent)]
    Assertion(#[from] AssertionFailure),
}

/// Signers for every role.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Actors {
    /// See [Roles::wallet].
    pub wallet: Signer,
    /// See [Roles::timelock].
    pub timelock: Signer,
    /// See [Roles::strategist].
    pub strategist: Signer,
    /// See [Roles::controller].
    pub controller: Signer,
    /// See [Roles::governance].
    pub governance: Signer,
}

impl Actors {
    /// Impersonate every role, like `setupSigners`.
    pub fn impersonate<S: Storage>(fork: &mut Fork<S>, roles: &Roles) -> Self {
        Self {
            wallet: fork.impersonate(roles.wallet),
            timelock: fork.impersonate(roles.timelock),
            strategist: fork.impersonate(roles.strategist),
            controller: fork.impersonate(roles.controller),
            governance: fork.impersonate(roles.governance),
        }
    }
}

/// A scenario after setup, ready to run its steps.
#[derive(Debug, Clone)]
pub struct Scenario {
    name: String,
    txn_amount: U256,
    actors: Actors,
    asset: Erc20,
    globe: Globe,
    controller: Controller,
    strategy: Strategy,
}

impl Scenario {
    /// Impersonate the roles, fund the wallet and install the strategy
    /// under test, deploying it when none is configured.
    pub fn setup<S: Storage>(
        fork: &mut Fork<S>,
        config: &ScenarioConfig,
        roles: &Roles,
        balances: &mut TokenBalances,
    ) -> Result<Self, ScenarioError> {
        let globe_description = InterfaceDescription::load(&config.globe_abi)?;
        globe_description.require_functions(GLOBE_FUNCTIONS)?;
        let strategy_description = InterfaceDescription::load(&config.strategy_abi)?;
        strategy_description.require_functions(STRATEGY_FUNCTIONS)?;

        let actors = Actors::impersonate(fork, roles);
        if let Some(slot) = config.balance_slot {
            balances.set_slot(config.asset, slot);
        }
        balances.overwrite(fork, config.asset, roles.wallet, config.txn_amount)?;

        let asset = Erc20::new(config.asset, actors.wallet);
        let controller = Controller::new(roles.controller, actors.governance);
        let globe = Globe::new(config.globe, actors.governance);
        let strategy = match config.strategy {
            Some(strategy) => Strategy::new(strategy, actors.governance),
            None => {
                strategy_description.require_functions(&["deleverageToMin"])?;
                let init_code = strategy_description.deploy_code(
                    &(
                        roles.governance,
                        roles.strategist,
                        roles.controller,
                        roles.timelock,
                    )
                        .abi_encode_params(),
                )?;

                let current = controller.strategies(fork, config.asset)?;
                info!(
                    scenario = %config.name,
                    strategy = %current,
                    "deleveraging the current strategy before deploying a new one"
                );
                Strategy::new(current, actors.governance).deleverage_to_min(fork)?;

                let deployed = fork.deploy(actors.governance, init_code)?;
                let timelocked = controller.connect(actors.timelock);
                timelocked.approve_strategy(fork, config.asset, deployed)?;
                timelocked.set_strategy(fork, config.asset, deployed)?;
                info!(
                    scenario = %config.name,
                    strategy = %deployed,
                    "installed new strategy"
                );
                Strategy::new(deployed, actors.governance)
            }
        };
        strategy.whitelist_harvester(fork, roles.wallet)?;

        Ok(Self {
            name: config.name.clone(),
            txn_amount: config.txn_amount,
            actors,
            asset,
            globe,
            controller,
            strategy,
        })
    }

    /// The strategy under test, deployed or configured.
    pub fn strategy(&self) -> Strategy {
        self.strategy
    }

    /// Run one step against the state the previous steps left.
    pub fn run_step<S: Storage>(
        &self,
        fork: &mut Fork<S>,
        balances: &mut TokenBalances,
        step: Step,
    ) -> Result<(), ScenarioError> {
        match step {
            Step::WalletFunded => self.wallet_funded(fork),
            Step::GlobeStartsEmpty => self.globe_starts_empty(fork),
            Step::ControllerConfigured => self.controller_configured(fork),
            Step::DepositWithdraw => self.deposit_withdraw(fork),
            Step::HarvestIncreasesBalance => self.harvest_increases_balance(fork),
            Step::StrategyLoaded => self.strategy_loaded(fork),
            Step::UsersEarn => self.users_earn(fork, balances),
        }
    }

    fn wallet(&self) -> Address {
        self.actors.wallet.address()
    }

    fn wallet_funded<S: Storage>(&self, fork: &Fork<S>) -> Result<(), ScenarioError> {
        ensure_eq(
            "wallet asset balance",
            self.asset.balance_of(fork, self.wallet())?,
            self.txn_amount,
        )?;
        Ok(())
    }

    fn globe_starts_empty<S: Storage>(&self, fork: &Fork<S>) -> Result<(), ScenarioError> {
        ensure_eq(
            "wallet globe balance",
            self.globe.balance_of(fork, self.wallet())?,
            U256::ZERO,
        )?;
        Ok(())
    }

    fn controller_configured<S: Storage>(&self, fork: &Fork<S>) -> Result<(), ScenarioError> {
        let asset = self.asset.address();
        ensure_eq(
            "controller globe for the asset",
            self.controller.globes(fork, asset)?,
            self.globe.address(),
        )?;
        ensure_eq(
            "controller strategy for the asset",
            self.controller.strategies(fork, asset)?,
            self.strategy.address(),
        )?;
        Ok(())
    }

    fn deposit_withdraw<S: Storage>(&self, fork: &mut Fork<S>) -> Result<(), ScenarioError> {
        let globe = self.globe.connect(self.actors.wallet);
        self.asset.approve(fork, globe.address(), MAX_ALLOWANCE)?;
        let globe_before = self.asset.balance_of(fork, globe.address())?;

        globe.deposit_all(fork)?;
        ensure_eq(
            "wallet asset balance after depositAll",
            self.asset.balance_of(fork, self.wallet())?,
            U256::ZERO,
        )?;
        ensure_lt(
            "globe asset balance before vs after depositAll",
            globe_before,
            self.asset.balance_of(fork, globe.address())?,
        )?;

        globe.withdraw_all(fork)?;
        ensure_gt(
            "wallet asset balance after withdrawAll",
            self.asset.balance_of(fork, self.wallet())?,
            U256::ZERO,
        )?;
        Ok(())
    }

    fn harvest_increases_balance<S: Storage>(
        &self,
        fork: &mut Fork<S>,
    ) -> Result<(), ScenarioError> {
        let globe = self.globe.connect(self.actors.wallet);
        self.asset.approve(fork, globe.address(), MAX_ALLOWANCE)?;
        globe.deposit_all(fork)?;
        globe.earn(fork)?;
        fork.increase_time(HARVEST_DELAY);

        let initial = self.strategy.balance_of(fork)?;
        self.strategy.connect(self.actors.wallet).harvest(fork)?;
        ensure_gt(
            "strategy balance after vs before harvest",
            self.strategy.balance_of(fork)?,
            initial,
        )?;
        Ok(())
    }

    fn strategy_loaded<S: Storage>(&self, fork: &Fork<S>) -> Result<(), ScenarioError> {
        ensure_ne(
            "strategy balance",
            self.strategy.balance_of(fork)?,
            U256::ZERO,
        )?;
        Ok(())
    }

    fn users_earn<S: Storage>(
        &self,
        fork: &mut Fork<S>,
        balances: &mut TokenBalances,
    ) -> Result<(), ScenarioError> {
        balances.overwrite(fork, self.asset.address(), self.wallet(), self.txn_amount)?;
        let amount = self.asset.balance_of(fork, self.wallet())?;

        let globe = self.globe.connect(self.actors.wallet);
        self.asset.approve(fork, globe.address(), amount)?;
        globe.deposit(fork, amount)?;
        globe.earn(fork)?;
        fork.increase_time(HARVEST_DELAY);
        self.strategy.connect(self.actors.wallet).harvest(fork)?;
        info!(scenario = %self.name, "harvest successful");
        globe.withdraw_all(fork)?;

        let returned = self.asset.balance_of(fork, self.wallet())?;
        let doubled = amount.saturating_mul(U256::from(2));
        ensure_lt(
            "twice the deposit vs wallet balance after withdrawAll",
            doubled,
            returned,
        )?;
        info!(
            scenario = %self.name,
            profit = %(returned - doubled),
            "the user just made a profit in two weeks"
        );
        Ok(())
    }
}

/// Set up `config` and run its steps in order, stopping at the first
/// failure. State changes stay on the fork.
pub fn run_scenario<S: Storage>(
    fork: &mut Fork<S>,
    config: &ScenarioConfig,
    roles: &Roles,
    balances: &mut TokenBalances,
) -> ScenarioReport {
    info!(scenario = %config.name, block = fork.block_number(), "setting up scenario");
    let scenario = match Scenario::setup(fork, config, roles, balances) {
        Ok(scenario) => scenario,
        Err(err) => {
            warn!(scenario = %config.name, %err, "setup failed");
            return ScenarioReport::setup_failed(&config.name, err);
        }
    };
    let report = ScenarioReport::run_steps(&config.name, |step| {
        let result = scenario.run_step(fork, balances, step);
        if let Err(err) = &result {
            warn!(scenario = %config.name, ?step, %err, "step failed");
        }
        result
    });
    info!(scenario = %config.name, success = report.is_success(), "finished scenario");
    report
}

/// Like [run_scenario], then restore the fork to its state before the run
/// so scenarios do not see each other's changes.
pub fn run_isolated<S: Storage>(
    fork: &mut Fork<S>,
    config: &ScenarioConfig,
    roles: &Roles,
    balances: &mut TokenBalances,
) -> Result<ScenarioReport, ForkError> {
    let snapshot = fork.snapshot();
    let report = run_scenario(fork, config, roles, balances);
    fork.revert(snapshot)?;
    Ok(report)
}
