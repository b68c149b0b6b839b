//! Compiled contract artifacts.
//!
//! Artifacts are read from `<root>/<Contract>.json`. Both the Truffle layout
//! (`"bytecode": "0x..."`) and the Foundry layout (`"bytecode": { "object": "0x..." }`)
//! are accepted.

use std::path::{Path, PathBuf};

use alloy_core::primitives::Bytes;
use serde::Deserialize;

use crate::{ContractId, SubmitError};

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum BytecodeField {
    Hex(String),
    Object { object: String },
}

#[derive(Debug, Deserialize)]
struct ArtifactFile {
    bytecode: BytecodeField,
}

/// Creation code of a contract.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    pub contract: ContractId,
    pub bytecode: Bytes,
}

/// Directory of compiled artifacts.
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    root: PathBuf,
}

impl ArtifactStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn path_for(&self, contract: &ContractId) -> PathBuf {
        self.root.join(format!("{contract}.json"))
    }

    /// Load and decode the creation code of `contract`.
    pub fn load(&self, contract: &ContractId) -> Result<Artifact, SubmitError> {
        let path = self.path_for(contract);
        if !path.exists() {
            return Err(SubmitError::UnknownContract(contract.clone()));
        }

        let invalid = |reason: String| SubmitError::InvalidArtifact {
            contract: contract.clone(),
            reason,
        };

        let content = std::fs::read_to_string(&path)
            .map_err(|e| invalid(format!("failed to read {}: {e}", path.display())))?;
        let file: ArtifactFile = serde_json::from_str(&content)
            .map_err(|e| invalid(format!("failed to parse {}: {e}", path.display())))?;

        let hex_code = match &file.bytecode {
            BytecodeField::Hex(code) => code,
            BytecodeField::Object { object } => object,
        };
        let bytecode = decode_bytecode(hex_code).map_err(invalid)?;

        tracing::debug!(
            contract = %contract,
            path = %path.display(),
            size = bytecode.len(),
            "Loaded artifact"
        );

        Ok(Artifact {
            contract: contract.clone(),
            bytecode,
        })
    }
}

fn decode_bytecode(code: &str) -> Result<Bytes, String> {
    let code = code.trim().trim_start_matches("0x");

    if code.is_empty() {
        return Err("empty bytecode (abstract contract or interface?)".to_string());
    }
    if code.contains("__") {
        return Err("bytecode contains unlinked library placeholders".to_string());
    }

    hex::decode(code)
        .map(Bytes::from)
        .map_err(|e| format!("bytecode is not valid hex: {e}"))
}

#[cfg(test)]
mod tests {
    use tempdir::TempDir;

    use super::*;

    fn write(dir: &TempDir, name: &str, content: &str) {
        std::fs::write(dir.path().join(name), content).unwrap();
    }

    #[test]
    fn test_load_truffle_artifact() {
        let dir = TempDir::new("steep-artifacts").unwrap();
        write(
            &dir,
            "ProductToken.json",
            r#"{"contractName": "ProductToken", "abi": [], "bytecode": "0x6080604052"}"#,
        );

        let artifact = ArtifactStore::new(dir.path())
            .load(&ContractId::from("ProductToken"))
            .unwrap();
        assert_eq!(artifact.bytecode.as_ref(), &[0x60, 0x80, 0x60, 0x40, 0x52]);
    }

    #[test]
    fn test_load_foundry_artifact() {
        let dir = TempDir::new("steep-artifacts").unwrap();
        write(
            &dir,
            "Exchange.json",
            r#"{"abi": [], "bytecode": {"object": "0x6001", "linkReferences": {}}}"#,
        );

        let artifact = ArtifactStore::new(dir.path())
            .load(&ContractId::from("Exchange"))
            .unwrap();
        assert_eq!(artifact.bytecode.as_ref(), &[0x60, 0x01]);
    }

    #[test]
    fn test_missing_artifact() {
        let dir = TempDir::new("steep-artifacts").unwrap();
        let err = ArtifactStore::new(dir.path())
            .load(&ContractId::from("Nope"))
            .unwrap_err();
        assert!(matches!(err, SubmitError::UnknownContract(_)));
    }

    #[test]
    fn test_rejects_unusable_bytecode() {
        assert!(decode_bytecode("0x").is_err());
        assert!(decode_bytecode("0x6080__$a1b2$__6040").is_err());
        assert!(decode_bytecode("0xzz").is_err());
    }
}
