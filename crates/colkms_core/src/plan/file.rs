//! JSON plan files.
//!
//! ```json
//! {
//!   "footerKey": "footer_key",
//!   "columnKeys": { "orderid_key": ["orderId"], "productid_key": ["productId"] },
//!   "algorithm": "AES_GCM_V1",
//!   "dataKeyLengthBits": 128,
//!   "plaintextFooter": false,
//!   "uniformEncryption": false,
//!   "cacheLifetimeSecs": 120,
//!   "columns": ["orderId", "productId", "price", "vat"],
//!   "sensitiveColumns": ["orderId"]
//! }
//! ```
//!
//! Fields other than `columns` are optional and fall back to the
//! [`KmsConfig`] the file is loaded with.

use super::builder::{EncryptionPlan, EncryptionPlanBuilder};
use super::schema::TableSchema;
use crate::config::KmsConfig;
use crate::error::{KmsError, KmsResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

/// Serialized form of an [`EncryptionPlan`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct PlanFile {
    /// Footer master key.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub footer_key: Option<String>,
    /// Master key identifier to the columns it protects.
    #[serde(default)]
    pub column_keys: BTreeMap<String, Vec<String>>,
    /// Algorithm name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub algorithm: Option<String>,
    /// Data key length in bits.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_key_length_bits: Option<u32>,
    /// Leave the footer unencrypted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plaintext_footer: Option<bool>,
    /// Encrypt every column with the footer key.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub uniform_encryption: bool,
    /// Cache lifetime in seconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cache_lifetime_secs: Option<u64>,
    /// Columns of the target schema.
    pub columns: Vec<String>,
    /// Columns that must be encrypted.
    #[serde(default)]
    pub sensitive_columns: Vec<String>,
}

impl PlanFile {
    /// Parses a plan file from JSON text.
    ///
    /// # Errors
    ///
    /// Returns [`KmsError::InvalidConfig`] if the text is not a plan file.
    pub fn from_json(text: &str) -> KmsResult<Self> {
        serde_json::from_str(text).map_err(|e| KmsError::invalid_config(e.to_string()))
    }

    /// Reads and parses a plan file.
    ///
    /// # Errors
    ///
    /// Returns [`KmsError::InvalidConfig`] if the file cannot be read or parsed.
    pub fn load(path: &Path) -> KmsResult<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            KmsError::invalid_config(format!("cannot read {}: {e}", path.display()))
        })?;
        Self::from_json(&text)
    }

    /// Serializes the plan file as pretty-printed JSON.
    ///
    /// # Errors
    ///
    /// Returns [`KmsError::InvalidConfig`] if serialization fails.
    pub fn to_json(&self) -> KmsResult<String> {
        serde_json::to_string_pretty(self).map_err(|e| KmsError::invalid_config(e.to_string()))
    }

    /// The schema described by `columns` and `sensitiveColumns`.
    ///
    /// Sensitive columns missing from `columns` are appended.
    #[must_use]
    pub fn schema(&self) -> TableSchema {
        let schema = TableSchema::from_columns(self.columns.iter().cloned());
        self.sensitive_columns
            .iter()
            .fold(schema, |schema, column| schema.sensitive_column(column.clone()))
    }

    /// Validates the file into a plan, using `config` for omitted fields.
    ///
    /// # Errors
    ///
    /// Returns [`KmsError::InvalidConfig`] if no columns are listed, or
    /// [`KmsError::InvalidPlan`] if validation fails.
    pub fn to_plan(&self, config: &KmsConfig) -> KmsResult<EncryptionPlan> {
        if self.columns.is_empty() {
            return Err(KmsError::invalid_config("plan file lists no columns"));
        }

        let mut builder = EncryptionPlanBuilder::with_config(self.schema(), config);
        if let Some(footer_key) = &self.footer_key {
            builder = builder.footer_key(footer_key.clone());
        }
        for (master_key_id, columns) in &self.column_keys {
            builder = builder.column_key(master_key_id.clone(), columns.iter().cloned());
        }
        if let Some(name) = &self.algorithm {
            builder = builder.algorithm_name(name);
        }
        if let Some(bits) = self.data_key_length_bits {
            builder = builder.data_key_length_bits(bits);
        }
        if let Some(plaintext) = self.plaintext_footer {
            builder = builder.plaintext_footer(plaintext);
        }
        if self.uniform_encryption {
            builder = builder.uniform(true);
        }
        if let Some(secs) = self.cache_lifetime_secs {
            builder = builder.cache_lifetime(Duration::from_secs(secs));
        }
        builder.build()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PlanViolation;
    use crate::types::KeyLength;

    const DEMO: &str = r#"{
        "footerKey": "footer_key",
        "columnKeys": {"orderid_key": ["orderId"], "productid_key": ["productId"]},
        "algorithm": "AES_GCM_V1",
        "dataKeyLengthBits": 128,
        "plaintextFooter": false,
        "cacheLifetimeSecs": 120,
        "columns": ["orderId", "productId", "price", "vat"]
    }"#;

    #[test]
    fn demo_plan_file_loads() {
        let plan = PlanFile::from_json(DEMO)
            .unwrap()
            .to_plan(&KmsConfig::default())
            .unwrap();
        assert_eq!(plan.roles().len(), 3);
        assert_eq!(plan.column_keys()["orderId"], "orderid_key");
    }

    #[test]
    fn omitted_fields_come_from_config() {
        let file = PlanFile::from_json(r#"{"footerKey": "K1", "columns": ["a"]}"#).unwrap();
        let config = KmsConfig::new().data_key_length(KeyLength::Bits256);
        let plan = file.to_plan(&config).unwrap();
        assert_eq!(plan.data_key_length(), KeyLength::Bits256);
        assert!(!plan.is_uniform());
    }

    #[test]
    fn uniform_encryption_must_be_requested() {
        let file = PlanFile::from_json(
            r#"{"footerKey": "K1", "uniformEncryption": true, "columns": ["a", "b"]}"#,
        )
        .unwrap();
        let plan = file.to_plan(&KmsConfig::default()).unwrap();
        assert!(plan.is_uniform());
        assert_eq!(
            plan.master_key_for(&crate::types::EncryptionRole::column("b")),
            Some("K1")
        );
        assert!(file.to_json().unwrap().contains("\"uniformEncryption\": true"));
    }

    #[test]
    fn invalid_files_are_rejected() {
        assert!(matches!(
            PlanFile::from_json("{\"footerKey\": 3}"),
            Err(KmsError::InvalidConfig { .. })
        ));
        assert!(matches!(
            PlanFile::from_json(r#"{"columns": ["a"], "wrappingMode": "double"}"#),
            Err(KmsError::InvalidConfig { .. })
        ));
        assert!(matches!(
            PlanFile::default().to_plan(&KmsConfig::default()),
            Err(KmsError::InvalidConfig { .. })
        ));

        let unknown = PlanFile::from_json(
            r#"{"footerKey": "K1", "columnKeys": {"K2": ["total"]}, "columns": ["a"]}"#,
        )
        .unwrap();
        assert!(matches!(
            unknown.to_plan(&KmsConfig::default()),
            Err(KmsError::InvalidPlan(PlanViolation::UnknownColumn { .. }))
        ));
    }

    #[test]
    fn load_reads_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("plan.json");
        let written = PlanFile::from_json(DEMO).unwrap();
        std::fs::write(&path, written.to_json().unwrap()).unwrap();

        assert_eq!(PlanFile::load(&path).unwrap(), written);
        assert!(PlanFile::load(&dir.path().join("missing.json")).is_err());
    }
}
