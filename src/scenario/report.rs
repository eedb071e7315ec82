use std::fmt::{self, Display};

/// The ordered checks of a scenario. Each relies on the chain state the
/// previous ones left behind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Step {
    /// The wallet holds exactly the overwritten amount.
    WalletFunded,
    /// The wallet holds no globe shares before depositing.
    GlobeStartsEmpty,
    /// The controller routes the asset to the globe and strategy under test.
    ControllerConfigured,
    /// Depositing everything empties the wallet, withdrawing refills it.
    DepositWithdraw,
    /// A harvest after 15 days grows the strategy.
    HarvestIncreasesBalance,
    /// The strategy holds funds after harvesting.
    StrategyLoaded,
    /// A second deposit, harvest & withdrawal returns more than twice the
    /// deposit.
    UsersEarn,
}

impl Step {
    /// Every step, in execution order.
    pub const ALL: [Step; 7] = [
        Step::WalletFunded,
        Step::GlobeStartsEmpty,
        Step::ControllerConfigured,
        Step::DepositWithdraw,
        Step::HarvestIncreasesBalance,
        Step::StrategyLoaded,
        Step::UsersEarn,
    ];

    /// Human readable title.
    pub fn description(&self) -> &'static str {
        match self {
            Step::WalletFunded => "user wallet contains asset balance",
            Step::GlobeStartsEmpty => "globe initialized with zero balance for user",
            Step::ControllerConfigured => "should be able to be configured correctly",
            Step::DepositWithdraw => "should be able to deposit/withdraw money into globe",
            Step::HarvestIncreasesBalance => "harvests should make some money",
            Step::StrategyLoaded => "strategy loaded with initial balance",
            Step::UsersEarn => "users should earn some money",
        }
    }
}

/// How a step ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepOutcome {
    /// Every check held.
    Passed,
    /// A check or call failed, with the error.
    Failed(String),
    /// Not run as setup or an earlier step failed.
    Skipped,
}

/// The outcome of one step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepReport {
    /// The step.
    pub step: Step,
    /// How it ended.
    pub outcome: StepOutcome,
}

/// The outcome of a whole scenario.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScenarioReport {
    /// Name of the scenario.
    pub name: String,
    /// Why setup failed, if it did.
    pub setup_error: Option<String>,
    /// Every step in order.
    pub steps: Vec<StepReport>,
}

impl ScenarioReport {
    /// A scenario whose setup failed, so no step ran.
    pub fn setup_failed(name: impl Into<String>, error: impl Display) -> Self {
        Self {
            name: name.into(),
            setup_error: Some(error.to_string()),
            steps: Step::ALL
                .into_iter()
                .map(|step| StepReport {
                    step,
                    outcome: StepOutcome::Skipped,
                })
                .collect(),
        }
    }

    /// Run the steps in order. The first failure skips the rest.
    pub fn run_steps<E: Display>(
        name: impl Into<String>,
        mut run: impl FnMut(Step) -> Result<(), E>,
    ) -> Self {
        let mut failed = false;
        let steps = Step::ALL
            .into_iter()
            .map(|step| {
                let outcome = if failed {
                    StepOutcome::Skipped
                } else {
                    match run(step) {
                        Ok(()) => StepOutcome::Passed,
                        Err(err) => {
                            failed = true;
                            StepOutcome::Failed(err.to_string())
                        }
                    }
                };
                StepReport { step, outcome }
            })
            .collect();
        Self {
            name: name.into(),
            setup_error: None,
            steps,
        }
    }

    /// Whether setup and every step passed.
    pub fn is_success(&self) -> bool {
        self.setup_error.is_none()
            && self
                .steps
                .iter()
                .all(|report| report.outcome == StepOutcome::Passed)
    }
}

impl Display for ScenarioReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let status = if self.is_success() { "ok" } else { "FAILED" };
        writeln!(f, "{}: {status}", self.name)?;
        if let Some(error) = &self.setup_error {
            writeln!(f, "  setup failed: {error}")?;
        }
        for StepReport { step, outcome } in &self.steps {
            match outcome {
                StepOutcome::Passed => writeln!(f, "  ok      {}", step.description())?,
                StepOutcome::Failed(error) => {
                    writeln!(f, "  FAILED  {}: {error}", step.description())?
                }
                StepOutcome::Skipped => writeln!(f, "  skipped {}", step.description())?,
            }
        }
        Ok(())
    }
}
