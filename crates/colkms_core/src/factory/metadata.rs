//! Key material the codec persists alongside footer and column metadata.

use crate::error::{KmsError, KmsResult};
use crate::types::{EncryptionRole, WrappedKey};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Identifies the key material layout.
pub const KEY_MATERIAL_TYPE: &str = "CKMT1";

/// One role's wrapped data key and the master key that wraps it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct KeyMaterial {
    /// Layout identifier, always [`KEY_MATERIAL_TYPE`].
    #[serde(rename = "keyMaterialType")]
    pub key_material_type: String,

    /// Whether this material belongs to the footer key.
    #[serde(rename = "isFooterKey")]
    pub is_footer_key: bool,

    /// Master key the data key was wrapped under.
    #[serde(rename = "masterKeyID")]
    pub master_key_id: String,

    /// Base64 of the wrapped data key.
    #[serde(rename = "wrappedDEK")]
    pub wrapped_dek: String,
}

impl KeyMaterial {
    /// Creates material for `role`.
    #[must_use]
    pub fn new(role: &EncryptionRole, master_key_id: impl Into<String>, wrapped: &WrappedKey) -> Self {
        Self {
            key_material_type: KEY_MATERIAL_TYPE.to_string(),
            is_footer_key: role.is_footer(),
            master_key_id: master_key_id.into(),
            wrapped_dek: wrapped.to_base64(),
        }
    }

    /// Decodes the wrapped data key.
    ///
    /// # Errors
    ///
    /// Returns [`KmsError::CorruptWrappedKey`] if the field is not base64.
    pub fn wrapped_key(&self) -> KmsResult<WrappedKey> {
        WrappedKey::from_base64(&self.wrapped_dek)
    }

    /// Checks that the material has the expected layout and matches `role`.
    ///
    /// # Errors
    ///
    /// Returns [`KmsError::Metadata`] on any inconsistency.
    pub fn validate_for(&self, role: &EncryptionRole) -> KmsResult<()> {
        if self.key_material_type != KEY_MATERIAL_TYPE {
            return Err(KmsError::metadata(format!(
                "unsupported key material type '{}'",
                self.key_material_type
            )));
        }
        if self.is_footer_key != role.is_footer() {
            return Err(KmsError::metadata(format!(
                "key material for {role} has isFooterKey={}",
                self.is_footer_key
            )));
        }
        if self.master_key_id.is_empty() {
            return Err(KmsError::metadata(format!(
                "key material for {role} has an empty master key identifier"
            )));
        }
        Ok(())
    }

    /// Serializes to JSON.
    ///
    /// # Errors
    ///
    /// Returns [`KmsError::Metadata`] if serialization fails.
    pub fn to_json(&self) -> KmsResult<String> {
        serde_json::to_string(self).map_err(|e| KmsError::metadata(e.to_string()))
    }

    /// Parses JSON.
    ///
    /// # Errors
    ///
    /// Returns [`KmsError::Metadata`] if the text is not key material.
    pub fn from_json(text: &str) -> KmsResult<Self> {
        parse_object(text)
    }
}

/// All key material for one file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FileKeyMetadata {
    /// Footer key material, absent for plaintext-footer files without a footer key.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub footer: Option<KeyMaterial>,

    /// Column name to key material.
    #[serde(default)]
    pub columns: BTreeMap<String, KeyMaterial>,

    /// Every column is encrypted with the footer key.
    #[serde(default)]
    pub uniform: bool,
}

impl FileKeyMetadata {
    /// Creates empty metadata.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records the material for `role`, replacing any previous entry.
    pub fn insert(&mut self, role: &EncryptionRole, material: KeyMaterial) {
        match role {
            EncryptionRole::Footer => self.footer = Some(material),
            EncryptionRole::Column(name) => {
                self.columns.insert(name.clone(), material);
            }
        }
    }

    /// Material recorded for `role`.
    #[must_use]
    pub fn get(&self, role: &EncryptionRole) -> Option<&KeyMaterial> {
        match role {
            EncryptionRole::Footer => self.footer.as_ref(),
            EncryptionRole::Column(name) => self.columns.get(name),
        }
    }

    /// Every role with material, footer first.
    pub fn entries(&self) -> impl Iterator<Item = (EncryptionRole, &KeyMaterial)> {
        self.footer
            .iter()
            .map(|m| (EncryptionRole::Footer, m))
            .chain(
                self.columns
                    .iter()
                    .map(|(name, m)| (EncryptionRole::column(name.clone()), m)),
            )
    }

    /// Number of roles with material.
    #[must_use]
    pub fn len(&self) -> usize {
        usize::from(self.footer.is_some()) + self.columns.len()
    }

    /// Returns true if no role has material.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Serializes to JSON.
    ///
    /// # Errors
    ///
    /// Returns [`KmsError::Metadata`] if serialization fails.
    pub fn to_json(&self) -> KmsResult<String> {
        serde_json::to_string(self).map_err(|e| KmsError::metadata(e.to_string()))
    }

    /// Parses JSON.
    ///
    /// # Errors
    ///
    /// Returns [`KmsError::Metadata`] if the text is not file key metadata.
    pub fn from_json(text: &str) -> KmsResult<Self> {
        parse_object(text)
    }
}

/// Parses `text` as a JSON object. The sequence form of a struct is rejected.
fn parse_object<T: DeserializeOwned>(text: &str) -> KmsResult<T> {
    let value: serde_json::Value =
        serde_json::from_str(text).map_err(|e| KmsError::metadata(e.to_string()))?;
    if !value.is_object() {
        return Err(KmsError::metadata("key metadata must be a JSON object"));
    }
    serde_json::from_value(value).map_err(|e| KmsError::metadata(e.to_string()))
}
