//! Per-file key contexts handed to the codec layer.

use super::metadata::{FileKeyMetadata, KeyMaterial};
use super::state::{KeyOperation, OperationState};
use crate::crypto::PageCipher;
use crate::error::{KmsError, KmsResult};
use crate::plan::{EncryptionPlan, TableSchema};
use crate::types::{DataKey, EncryptionAlgorithm, EncryptionRole, WrappedKey};
use std::collections::BTreeMap;

/// A resolved data key for one role.
#[derive(Debug)]
pub struct RoleKey {
    role: EncryptionRole,
    master_key_id: String,
    dek: DataKey,
    wrapped: WrappedKey,
}

impl RoleKey {
    pub(crate) fn new(
        role: EncryptionRole,
        master_key_id: impl Into<String>,
        dek: DataKey,
        wrapped: WrappedKey,
    ) -> Self {
        Self {
            role,
            master_key_id: master_key_id.into(),
            dek,
            wrapped,
        }
    }

    /// The role this key protects.
    #[must_use]
    pub fn role(&self) -> &EncryptionRole {
        &self.role
    }

    /// The master key the data key is wrapped under.
    #[must_use]
    pub fn master_key_id(&self) -> &str {
        &self.master_key_id
    }

    /// The data key.
    #[must_use]
    pub fn dek(&self) -> &DataKey {
        &self.dek
    }

    /// The wrapped data key.
    #[must_use]
    pub fn wrapped(&self) -> &WrappedKey {
        &self.wrapped
    }

    /// A page cipher keyed with this data key.
    ///
    /// # Errors
    ///
    /// Returns an error if the cipher cannot be initialised.
    pub fn cipher(&self) -> KmsResult<PageCipher> {
        PageCipher::new(&self.dek)
    }
}

/// Role keys shared by the write and read contexts.
#[derive(Debug, Default)]
struct RoleKeys {
    footer: Option<RoleKey>,
    columns: BTreeMap<String, RoleKey>,
    uniform: bool,
}

impl RoleKeys {
    fn insert(&mut self, key: RoleKey) {
        match key.role.clone() {
            EncryptionRole::Footer => self.footer = Some(key),
            EncryptionRole::Column(name) => {
                self.columns.insert(name, key);
            }
        }
    }

    /// Key for `role`; uniform files use the footer key for every column
    /// `covers` accepts.
    fn get(&self, role: &EncryptionRole, covers: impl Fn(&str) -> bool) -> Option<&RoleKey> {
        match role {
            EncryptionRole::Footer => self.footer.as_ref(),
            EncryptionRole::Column(name) if self.uniform => {
                if covers(name) {
                    self.footer.as_ref()
                } else {
                    None
                }
            }
            EncryptionRole::Column(name) => self.columns.get(name),
        }
    }

    fn len(&self) -> usize {
        usize::from(self.footer.is_some()) + self.columns.len()
    }
}

/// Data keys for writing one file.
///
/// Every role's key is resolved before the context exists, so a codec that
/// holds a context can encrypt every page of the file.
#[derive(Debug)]
pub struct FileEncryptionContext {
    operation: KeyOperation,
    schema: TableSchema,
    algorithm: EncryptionAlgorithm,
    plaintext_footer: bool,
    keys: RoleKeys,
    metadata: FileKeyMetadata,
}

impl FileEncryptionContext {
    pub(crate) fn new(operation: KeyOperation, plan: &EncryptionPlan) -> Self {
        Self {
            operation,
            schema: plan.schema().clone(),
            algorithm: plan.algorithm(),
            plaintext_footer: plan.plaintext_footer(),
            keys: RoleKeys {
                uniform: plan.is_uniform(),
                ..RoleKeys::default()
            },
            metadata: FileKeyMetadata {
                uniform: plan.is_uniform(),
                ..FileKeyMetadata::default()
            },
        }
    }

    pub(crate) fn insert(&mut self, key: RoleKey) {
        self.metadata.insert(
            &key.role,
            KeyMaterial::new(&key.role, key.master_key_id.clone(), &key.wrapped),
        );
        self.keys.insert(key);
    }

    pub(crate) fn operation_mut(&mut self) -> &mut KeyOperation {
        &mut self.operation
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> OperationState {
        self.operation.state()
    }

    /// Algorithm the codec applies.
    #[must_use]
    pub fn algorithm(&self) -> EncryptionAlgorithm {
        self.algorithm
    }

    /// Whether the footer is left in plaintext.
    #[must_use]
    pub fn plaintext_footer(&self) -> bool {
        self.plaintext_footer
    }

    /// Returns true if every column shares the footer key.
    #[must_use]
    pub fn is_uniform(&self) -> bool {
        self.keys.uniform
    }

    /// The footer key, if the plan has one.
    #[must_use]
    pub fn footer_key(&self) -> Option<&RoleKey> {
        self.keys.footer.as_ref()
    }

    /// The key for `role`, or `None` if it is written in plaintext.
    #[must_use]
    pub fn key_for(&self, role: &EncryptionRole) -> Option<&RoleKey> {
        self.keys.get(role, |name| self.schema.contains(name))
    }

    /// Returns true if `column` is encrypted.
    #[must_use]
    pub fn is_encrypted(&self, column: &str) -> bool {
        self.key_for(&EncryptionRole::column(column)).is_some()
    }

    /// Number of distinct data keys.
    #[must_use]
    pub fn key_count(&self) -> usize {
        self.keys.len()
    }

    /// Key material to persist with the file.
    #[must_use]
    pub fn key_metadata(&self) -> &FileKeyMetadata {
        &self.metadata
    }

    /// Encrypts a footer or page buffer for `role`.
    ///
    /// # Errors
    ///
    /// Returns [`KmsError::NoMasterKeyForRole`] if `role` is not encrypted.
    pub fn encrypt(&self, role: &EncryptionRole, plaintext: &[u8]) -> KmsResult<Vec<u8>> {
        let key = self
            .key_for(role)
            .ok_or_else(|| KmsError::NoMasterKeyForRole { role: role.clone() })?;
        key.cipher()?.encrypt(plaintext, &role.module_aad())
    }

    /// Ends the write. The data keys are dropped (and zeroized); the key
    /// metadata is returned for the codec to persist.
    ///
    /// # Errors
    ///
    /// Returns [`KmsError::InvalidState`] if keys were never resolved.
    pub fn finish(mut self) -> KmsResult<FileKeyMetadata> {
        self.operation.finalize()?;
        tracing::debug!(roles = self.keys.len(), "file encryption context finished");
        Ok(self.metadata)
    }
}

/// Data keys recovered for reading one file.
#[derive(Debug)]
pub struct FileDecryptionContext {
    operation: KeyOperation,
    keys: RoleKeys,
}

impl FileDecryptionContext {
    pub(crate) fn new(operation: KeyOperation, uniform: bool) -> Self {
        Self {
            operation,
            keys: RoleKeys {
                uniform,
                ..RoleKeys::default()
            },
        }
    }

    pub(crate) fn insert(&mut self, key: RoleKey) {
        self.keys.insert(key);
    }

    pub(crate) fn operation_mut(&mut self) -> &mut KeyOperation {
        &mut self.operation
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> OperationState {
        self.operation.state()
    }

    /// Returns true if every column shares the footer key.
    #[must_use]
    pub fn is_uniform(&self) -> bool {
        self.keys.uniform
    }

    /// The footer key, if the file has one.
    #[must_use]
    pub fn footer_key(&self) -> Option<&RoleKey> {
        self.keys.footer.as_ref()
    }

    /// The key for `role`, or `None` if it was written in plaintext.
    #[must_use]
    pub fn key_for(&self, role: &EncryptionRole) -> Option<&RoleKey> {
        self.keys.get(role, |_| true)
    }

    /// Number of distinct data keys.
    #[must_use]
    pub fn key_count(&self) -> usize {
        self.keys.len()
    }

    /// Decrypts a footer or page buffer for `role`.
    ///
    /// # Errors
    ///
    /// Returns [`KmsError::NoMasterKeyForRole`] if `role` has no key, or a
    /// cipher error if the buffer does not authenticate.
    pub fn decrypt(&self, role: &EncryptionRole, ciphertext: &[u8]) -> KmsResult<Vec<u8>> {
        let key = self
            .key_for(role)
            .ok_or_else(|| KmsError::NoMasterKeyForRole { role: role.clone() })?;
        key.cipher()?.decrypt(ciphertext, &role.module_aad())
    }

    /// Ends the read, dropping the data keys.
    ///
    /// # Errors
    ///
    /// Returns [`KmsError::InvalidState`] if keys were never resolved.
    pub fn finish(mut self) -> KmsResult<()> {
        self.operation.finalize()
    }
}

/// How the read path finds the master key for each role.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum MasterKeyLookup {
    /// Use the identifier recorded in each role's key material.
    #[default]
    FromMetadata,
    /// Use the caller's identifiers. Every listed role must have key
    /// material, and every role with key material must be listed.
    Explicit(BTreeMap<EncryptionRole, String>),
}

impl MasterKeyLookup {
    /// An explicit lookup from `(role, master key)` pairs.
    pub fn explicit<I, S>(entries: I) -> Self
    where
        I: IntoIterator<Item = (EncryptionRole, S)>,
        S: Into<String>,
    {
        Self::Explicit(
            entries
                .into_iter()
                .map(|(role, id)| (role, id.into()))
                .collect(),
        )
    }

    /// An explicit lookup with the role mapping of `plan`.
    #[must_use]
    pub fn from_plan(plan: &EncryptionPlan) -> Self {
        Self::explicit(plan.roles())
    }

    /// Master key for `role`, whose persisted material is `material`.
    ///
    /// # Errors
    ///
    /// Returns [`KmsError::NoMasterKeyForRole`] if an explicit lookup has no
    /// entry for `role`.
    pub fn master_key_for<'a>(
        &'a self,
        role: &EncryptionRole,
        material: &'a KeyMaterial,
    ) -> KmsResult<&'a str> {
        match self {
            Self::FromMetadata => Ok(&material.master_key_id),
            Self::Explicit(map) => map
                .get(role)
                .map(String::as_str)
                .ok_or_else(|| KmsError::NoMasterKeyForRole { role: role.clone() }),
        }
    }

    /// Roles the caller requires, if explicit.
    pub(crate) fn required_roles(&self) -> impl Iterator<Item = &EncryptionRole> {
        let roles = match self {
            Self::FromMetadata => None,
            Self::Explicit(map) => Some(map.keys()),
        };
        roles.into_iter().flatten()
    }
}
