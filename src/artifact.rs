//! Contract interface descriptions: an ABI and, for contracts we deploy,
//! their creation bytecode.

use std::{fs, path::Path};

use alloy_json_abi::JsonAbi;
use alloy_primitives::{hex, Bytes};
use serde::Deserialize;

/// Errors when loading or using an interface description.
#[derive(Debug, thiserror::Error)]
pub enum ArtifactError {
    /// Cannot read the description file.
    #[error("cannot read {path}: {source}")]
    Io {
        /// The file path.
        path: String,
        /// The underlying IO error.
        source: std::io::Error,
    },
    /// The file is neither an ABI nor a build artifact.
    #[error("invalid interface description {name}: {source}")]
    Json {
        /// Name of the description.
        name: String,
        /// The underlying JSON error.
        source: serde_json::Error,
    },
    /// The creation bytecode is not plain hex, like unlinked libraries.
    #[error("invalid bytecode in {name}: {source}")]
    Bytecode {
        /// Name of the description.
        name: String,
        /// The underlying hex error.
        source: hex::FromHexError,
    },
    /// A function the harness calls is missing from the ABI.
    #[error("{name} has no function {function}")]
    MissingFunction {
        /// Name of the description.
        name: String,
        /// The missing function.
        function: String,
    },
    /// Deploying needs creation bytecode, which raw ABIs lack.
    #[error("{0} carries no creation bytecode")]
    MissingBytecode(String),
}

// Raw ABIs are JSON arrays. Hardhat artifacts store the bytecode as a hex
// string, Foundry ones under `bytecode.object`.
#[derive(Deserialize)]
#[serde(untagged)]
enum DescriptionJson {
    Abi(JsonAbi),
    Artifact {
        #[serde(default, rename = "contractName")]
        contract_name: Option<String>,
        abi: JsonAbi,
        #[serde(default)]
        bytecode: Option<BytecodeJson>,
    },
}

#[derive(Deserialize)]
#[serde(untagged)]
enum BytecodeJson {
    Hex(String),
    Object { object: String },
}

/// The interface of a contract, optionally with its creation bytecode.
#[derive(Debug, Clone, PartialEq)]
pub struct InterfaceDescription {
    /// Contract name, from the artifact or the file name.
    pub name: String,
    /// The contract's ABI.
    pub abi: JsonAbi,
    /// Creation bytecode, without constructor arguments.
    pub bytecode: Option<Bytes>,
}

impl InterfaceDescription {
    /// Load a raw ABI, a Hardhat artifact or a Foundry artifact.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ArtifactError> {
        let path = path.as_ref();
        let json = fs::read_to_string(path).map_err(|source| ArtifactError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let name = path
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_default();
        Self::parse(name, &json)
    }

    /// Parse a description from JSON. The artifact's own contract name wins
    /// over `name`.
    pub fn parse(name: impl Into<String>, json: &str) -> Result<Self, ArtifactError> {
        let name = name.into();
        let description = serde_json::from_str(json).map_err(|source| ArtifactError::Json {
            name: name.clone(),
            source,
        })?;
        Ok(match description {
            DescriptionJson::Abi(abi) => Self {
                name,
                abi,
                bytecode: None,
            },
            DescriptionJson::Artifact {
                contract_name,
                abi,
                bytecode,
            } => {
                let name = contract_name.unwrap_or(name);
                let bytecode = match bytecode {
                    Some(BytecodeJson::Hex(code)) | Some(BytecodeJson::Object { object: code }) => {
                        let code = hex::decode(code.trim()).map_err(|source| {
                            ArtifactError::Bytecode {
                                name: name.clone(),
                                source,
                            }
                        })?;
                        // Interfaces & abstract contracts compile to "0x".
                        (!code.is_empty()).then(|| Bytes::from(code))
                    }
                    None => None,
                };
                Self {
                    name,
                    abi,
                    bytecode,
                }
            }
        })
    }

    /// Fail unless the ABI declares every function in `functions`.
    pub fn require_functions(&self, functions: &[&str]) -> Result<(), ArtifactError> {
        match functions
            .iter()
            .find(|function| self.abi.function(function).is_none())
        {
            Some(function) => Err(ArtifactError::MissingFunction {
                name: self.name.clone(),
                function: function.to_string(),
            }),
            None => Ok(()),
        }
    }

    /// Creation code with ABI-encoded constructor arguments appended.
    pub fn deploy_code(&self, constructor_args: &[u8]) -> Result<Bytes, ArtifactError> {
        let bytecode = self
            .bytecode
            .as_ref()
            .ok_or_else(|| ArtifactError::MissingBytecode(self.name.clone()))?;
        let mut code = Vec::with_capacity(bytecode.len() + constructor_args.len());
        code.extend_from_slice(bytecode);
        code.extend_from_slice(constructor_args);
        Ok(code.into())
    }
}
