use std::{
    fs,
    path::{Path, PathBuf},
    str::FromStr,
};

use alloy_primitives::{Address, U256};
use serde::{de, Deserialize, Deserializer};

use crate::token_balance::BalanceSlot;

/// Errors when loading scenarios.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Cannot read the scenario file.
    #[error("cannot read {path}: {source}")]
    Io {
        /// The file path.
        path: String,
        /// The underlying IO error.
        source: std::io::Error,
    },
    /// The scenario file is malformed.
    #[error("invalid scenario file: {0}")]
    Json(#[from] serde_json::Error),
    /// A role address is neither in the file nor overridden.
    #[error("no address configured for the {0} role")]
    MissingRole(&'static str),
    /// A scenario would move no tokens.
    #[error("scenario {0} has a zero txn_amount")]
    ZeroAmount(String),
    /// `--only` names no configured scenario.
    #[error("no scenario named {0}")]
    UnknownScenario(String),
}

/// The addresses every scenario impersonates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Roles {
    /// The depositor & harvester.
    pub wallet: Address,
    /// May approve and set strategies on the controller.
    pub timelock: Address,
    /// Strategist of deployed strategies.
    pub strategist: Address,
    /// The controller contract itself.
    pub controller: Address,
    /// Governs the controller, globes and strategies.
    pub governance: Address,
}

/// Roles as configured in one place, to be layered over others.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PartialRoles {
    /// See [Roles::wallet].
    pub wallet: Option<Address>,
    /// See [Roles::timelock].
    pub timelock: Option<Address>,
    /// See [Roles::strategist].
    pub strategist: Option<Address>,
    /// See [Roles::controller].
    pub controller: Option<Address>,
    /// See [Roles::governance].
    pub governance: Option<Address>,
}

impl PartialRoles {
    /// Fill the roles missing here from `fallback`.
    pub fn or(self, fallback: PartialRoles) -> Self {
        Self {
            wallet: self.wallet.or(fallback.wallet),
            timelock: self.timelock.or(fallback.timelock),
            strategist: self.strategist.or(fallback.strategist),
            controller: self.controller.or(fallback.controller),
            governance: self.governance.or(fallback.governance),
        }
    }

    /// Require every role to be configured.
    pub fn resolve(&self) -> Result<Roles, ConfigError> {
        Ok(Roles {
            wallet: self.wallet.ok_or(ConfigError::MissingRole("wallet"))?,
            timelock: self.timelock.ok_or(ConfigError::MissingRole("timelock"))?,
            strategist: self
                .strategist
                .ok_or(ConfigError::MissingRole("strategist"))?,
            controller: self
                .controller
                .ok_or(ConfigError::MissingRole("controller"))?,
            governance: self
                .governance
                .ok_or(ConfigError::MissingRole("governance"))?,
        })
    }
}

/// One globe & strategy pair to test.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ScenarioConfig {
    /// Shown in logs & reports.
    pub name: String,
    /// The token the globe accepts.
    pub asset: Address,
    /// The globe under test.
    pub globe: Address,
    /// The strategy under test. A new one is deployed when absent or empty.
    #[serde(default, deserialize_with = "deserialize_strategy")]
    pub strategy: Option<Address>,
    /// Interface description of the globe.
    pub globe_abi: PathBuf,
    /// Interface description of the strategy, an artifact with bytecode
    /// when deploying.
    pub strategy_abi: PathBuf,
    /// Amount the wallet deposits, at the token's native precision.
    #[serde(deserialize_with = "deserialize_amount")]
    pub txn_amount: U256,
    /// Balance slot of the asset, probed for when absent.
    #[serde(default, deserialize_with = "deserialize_balance_slot")]
    pub balance_slot: Option<BalanceSlot>,
}

/// A file of scenarios sharing their roles.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ScenarioFile {
    /// Roles, possibly overridden from the command line & environment.
    #[serde(default)]
    pub roles: PartialRoles,
    /// Scenarios in the order they run.
    pub scenarios: Vec<ScenarioConfig>,
}

impl ScenarioFile {
    /// Load a scenario file. Interface paths are relative to the file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let json = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::parse(&json, path.parent().unwrap_or(Path::new("")))
    }

    /// Parse scenarios, resolving interface paths against `base_dir`.
    pub fn parse(json: &str, base_dir: &Path) -> Result<Self, ConfigError> {
        let mut file: Self = serde_json::from_str(json)?;
        for scenario in &mut file.scenarios {
            if scenario.txn_amount.is_zero() {
                return Err(ConfigError::ZeroAmount(scenario.name.clone()));
            }
            scenario.globe_abi = base_dir.join(&scenario.globe_abi);
            scenario.strategy_abi = base_dir.join(&scenario.strategy_abi);
        }
        Ok(file)
    }

    /// All scenarios, or only the one named `only`.
    pub fn select(&self, only: Option<&str>) -> Result<Vec<&ScenarioConfig>, ConfigError> {
        let Some(only) = only else {
            return Ok(self.scenarios.iter().collect());
        };
        let selected: Vec<_> = self
            .scenarios
            .iter()
            .filter(|scenario| scenario.name == only)
            .collect();
        if selected.is_empty() {
            return Err(ConfigError::UnknownScenario(only.to_string()));
        }
        Ok(selected)
    }
}

fn deserialize_strategy<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Option<Address>, D::Error> {
    match Option::<String>::deserialize(deserializer)? {
        Some(address) if !address.trim().is_empty() => Address::from_str(address.trim())
            .map(Some)
            .map_err(de::Error::custom),
        _ => Ok(None),
    }
}

// Amounts overflow JSON numbers quickly at 18 decimals, so strings are
// accepted too.
#[derive(Deserialize)]
#[serde(untagged)]
enum AmountJson {
    Integer(u64),
    Text(String),
}

fn deserialize_amount<'de, D: Deserializer<'de>>(deserializer: D) -> Result<U256, D::Error> {
    match AmountJson::deserialize(deserializer)? {
        AmountJson::Integer(amount) => Ok(U256::from(amount)),
        AmountJson::Text(amount) => U256::from_str(amount.trim()).map_err(de::Error::custom),
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum BalanceSlotJson {
    Index(u64),
    Slot(BalanceSlot),
}

fn deserialize_balance_slot<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Option<BalanceSlot>, D::Error> {
    Ok(
        Option::<BalanceSlotJson>::deserialize(deserializer)?.map(|slot| match slot {
            BalanceSlotJson::Index(index) => BalanceSlot::solidity(index),
            BalanceSlotJson::Slot(slot) => slot,
        }),
    )
}

#[cfg(test)]
mod tests {
    use alloy_primitives::address;

    use super::*;
    use crate::token_balance::MappingLayout;

    const WAVAX: Address = address!("b31f66aa3c1e785363f0875a1b74e27b85fd66c7");
    const GLOBE: Address = address!("7b2525a502800e496d2e656e5b1188723e547012");

    fn scenario(fields: &str) -> String {
        format!(
            r#"{{"scenarios": [{{
                "name": "BenqiAvax",
                "asset": "{WAVAX}",
                "globe": "{GLOBE}",
                "globe_abi": "abi/SnowGlobeBenqi.json",
                "strategy_abi": "artifacts/StrategyBenqiAvax.json"
                {fields}
            }}]}}"#
        )
    }

    #[test]
    fn amounts() {
        for (json, expected) in [
            (r#""1000000000000000000000""#, U256::from(10).pow(U256::from(21))),
            (r#""0x3e8""#, U256::from(1000)),
            ("1000", U256::from(1000)),
        ] {
            let file = ScenarioFile::parse(
                &scenario(&format!(r#", "txn_amount": {json}"#)),
                Path::new(""),
            )
            .unwrap();
            assert_eq!(file.scenarios[0].txn_amount, expected);
        }
    }

    #[test]
    fn zero_amount_is_rejected() {
        assert!(matches!(
            ScenarioFile::parse(&scenario(r#", "txn_amount": "0""#), Path::new("")),
            Err(ConfigError::ZeroAmount(name)) if name == "BenqiAvax"
        ));
        assert!(matches!(
            ScenarioFile::parse(&scenario(r#", "txn_amount": "1.5""#), Path::new("")),
            Err(ConfigError::Json(_))
        ));
    }

    #[test]
    fn empty_strategy_means_deploy() {
        let file = ScenarioFile::parse(
            &scenario(r#", "txn_amount": 1, "strategy": """#),
            Path::new(""),
        )
        .unwrap();
        assert_eq!(file.scenarios[0].strategy, None);

        let file = ScenarioFile::parse(&scenario(r#", "txn_amount": 1"#), Path::new("")).unwrap();
        assert_eq!(file.scenarios[0].strategy, None);

        let file = ScenarioFile::parse(
            &scenario(&format!(r#", "txn_amount": 1, "strategy": "{GLOBE}""#)),
            Path::new(""),
        )
        .unwrap();
        assert_eq!(file.scenarios[0].strategy, Some(GLOBE));
    }

    #[test]
    fn paths_are_relative_to_the_file() {
        let file = ScenarioFile::parse(
            &scenario(r#", "txn_amount": 1"#),
            Path::new("/fixtures/avalanche"),
        )
        .unwrap();
        assert_eq!(
            file.scenarios[0].globe_abi,
            PathBuf::from("/fixtures/avalanche/abi/SnowGlobeBenqi.json")
        );
        assert_eq!(
            file.scenarios[0].strategy_abi,
            PathBuf::from("/fixtures/avalanche/artifacts/StrategyBenqiAvax.json")
        );
    }

    #[test]
    fn balance_slots() {
        let file = ScenarioFile::parse(
            &scenario(r#", "txn_amount": 1, "balance_slot": 3"#),
            Path::new(""),
        )
        .unwrap();
        assert_eq!(file.scenarios[0].balance_slot, Some(BalanceSlot::solidity(3)));

        let file = ScenarioFile::parse(
            &scenario(r#", "txn_amount": 1, "balance_slot": {"index": 4, "layout": "vyper"}"#),
            Path::new(""),
        )
        .unwrap();
        assert_eq!(
            file.scenarios[0].balance_slot,
            Some(BalanceSlot {
                index: 4,
                layout: MappingLayout::Vyper
            })
        );
    }

    #[test]
    fn role_overrides() {
        let from_file = PartialRoles {
            wallet: Some(Address::repeat_byte(1)),
            timelock: Some(Address::repeat_byte(2)),
            strategist: Some(Address::repeat_byte(3)),
            controller: Some(Address::repeat_byte(4)),
            governance: None,
        };
        assert!(matches!(
            from_file.resolve(),
            Err(ConfigError::MissingRole("governance"))
        ));

        let overrides = PartialRoles {
            wallet: Some(Address::repeat_byte(9)),
            governance: Some(Address::repeat_byte(5)),
            ..PartialRoles::default()
        };
        let roles = overrides.or(from_file).resolve().unwrap();
        assert_eq!(roles.wallet, Address::repeat_byte(9));
        assert_eq!(roles.timelock, Address::repeat_byte(2));
        assert_eq!(roles.governance, Address::repeat_byte(5));
    }

    #[test]
    fn select_by_name() {
        let file = ScenarioFile::parse(&scenario(r#", "txn_amount": 1"#), Path::new("")).unwrap();
        assert_eq!(file.select(None).unwrap().len(), 1);
        assert_eq!(file.select(Some("BenqiAvax")).unwrap().len(), 1);
        assert!(matches!(
            file.select(Some("AaveDai")),
            Err(ConfigError::UnknownScenario(name)) if name == "AaveDai"
        ));
    }
}
