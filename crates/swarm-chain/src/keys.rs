//! Account roster loading.
//!
//! Keys are hex strings (with or without `0x`), one per line. Blank lines and
//! lines starting with `#` are skipped. Raw key bytes are zeroized after the
//! signer is built.

use std::collections::HashSet;
use std::path::PathBuf;

use alloy::signers::local::PrivateKeySigner;
use serde::{Deserialize, Serialize};
use zeroize::Zeroizing;

use crate::error::KeyError;

/// Where to read the roster from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "source", rename_all = "snake_case")]
pub enum KeySource {
    /// Environment variable holding newline-separated keys (development).
    EnvVar { var_name: String },
    /// File with one key per line (production, recommend 0600 permissions).
    File { path: PathBuf },
}

impl KeySource {
    /// Load every signer in the roster.
    ///
    /// # Errors
    /// Missing variable or file, bad hex, invalid key, duplicate address, or an
    /// empty roster.
    pub fn load(&self) -> Result<Vec<PrivateKeySigner>, KeyError> {
        let content = Zeroizing::new(match self {
            Self::EnvVar { var_name } => std::env::var(var_name)
                .map_err(|_| KeyError::EnvVarNotFound(var_name.clone()))?,
            Self::File { path } => std::fs::read_to_string(path)?,
        });
        parse_roster(&content)
    }
}

/// Parse newline-separated hex keys.
pub fn parse_roster(content: &str) -> Result<Vec<PrivateKeySigner>, KeyError> {
    let mut signers = Vec::new();
    let mut seen = HashSet::new();

    for (idx, raw) in content.lines().enumerate() {
        let line = idx + 1;
        let trimmed = raw.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }

        let hex_key = trimmed.trim_start_matches("0x");
        let secret = Zeroizing::new(
            hex::decode(hex_key).map_err(|source| KeyError::HexDecode { line, source })?,
        );
        let signer = PrivateKeySigner::from_slice(&secret).map_err(|e| KeyError::InvalidKey {
            line,
            reason: e.to_string(),
        })?;

        if !seen.insert(signer.address()) {
            return Err(KeyError::Duplicate(signer.address()));
        }
        signers.push(signer);
    }

    if signers.is_empty() {
        return Err(KeyError::Empty);
    }
    Ok(signers)
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::primitives::address;

    const KEY_ONE: &str = "0x0000000000000000000000000000000000000000000000000000000000000001";
    const KEY_TWO: &str = "0000000000000000000000000000000000000000000000000000000000000002";

    #[test]
    fn test_parse_roster_skips_comments_and_blanks() {
        let content = format!("# accounts\n{KEY_ONE}\n\n  {KEY_TWO}  \n");
        let signers = parse_roster(&content).unwrap();
        assert_eq!(signers.len(), 2);
        assert_eq!(
            signers[0].address(),
            address!("7E5F4552091A69125d5DfCb7b8C2659029395Bdf")
        );
        assert_eq!(
            signers[1].address(),
            address!("2B5AD5c4795c026514f8317c7a215E218DcCD6cF")
        );
    }

    #[test]
    fn test_parse_roster_errors() {
        assert!(matches!(parse_roster("# nothing\n"), Err(KeyError::Empty)));
        assert!(matches!(
            parse_roster("zz"),
            Err(KeyError::HexDecode { line: 1, .. })
        ));
        assert!(matches!(
            parse_roster(&format!("{KEY_ONE}\n{KEY_ONE}")),
            Err(KeyError::Duplicate(_))
        ));
        // Zero is not a valid secp256k1 scalar.
        let zero = "00".repeat(32);
        assert!(matches!(
            parse_roster(&format!("{KEY_ONE}\n{zero}")),
            Err(KeyError::InvalidKey { line: 2, .. })
        ));
    }

    #[test]
    fn test_load_from_file() {
        let path = std::env::temp_dir().join(format!("swarm-keys-{}.txt", std::process::id()));
        std::fs::write(&path, format!("{KEY_ONE}\n")).unwrap();

        let signers = KeySource::File { path: path.clone() }.load().unwrap();
        assert_eq!(signers.len(), 1);
        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn test_load_missing_env_var() {
        let source = KeySource::EnvVar {
            var_name: "SWARM_TEST_KEYS_THAT_DO_NOT_EXIST".to_string(),
        };
        assert!(matches!(source.load(), Err(KeyError::EnvVarNotFound(_))));
    }

    #[test]
    fn test_key_source_from_toml() {
        let source: KeySource = toml::from_str("source = \"file\"\npath = \"keys.txt\"").unwrap();
        assert_eq!(
            source,
            KeySource::File {
                path: PathBuf::from("keys.txt")
            }
        );
    }
}
