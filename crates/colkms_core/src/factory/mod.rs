//! Orchestration of plans, key wrapping and caching.
//!
//! The [`CryptoFactory`] is the entry point for the codec layer:
//!
//! - [`file_encryption_context`](CryptoFactory::file_encryption_context)
//!   turns a validated plan into per-role data keys plus the key metadata
//!   to persist
//! - [`file_decryption_context`](CryptoFactory::file_decryption_context)
//!   turns persisted key metadata back into data keys
//!
//! Both paths resolve every role before returning. A failure for any role
//! fails the whole call, so the codec never sees a partial key set.

mod context;
mod metadata;
mod state;

pub use context::{FileDecryptionContext, FileEncryptionContext, MasterKeyLookup, RoleKey};
pub use metadata::{FileKeyMetadata, KeyMaterial, KEY_MATERIAL_TYPE};
pub use state::{KeyOperation, OperationKind, OperationState};

use crate::cache::{CacheKey, CachedKey, CacheStats, KeyCache};
use crate::config::KmsConfig;
use crate::crypto::KeyWrapper;
use crate::error::{KmsError, KmsResult};
use crate::plan::{EncryptionPlan, EncryptionPlanBuilder, TableSchema};
use crate::types::{DataKey, EncryptionRole};
use colkms_store::MasterKeyStore;
use std::sync::Arc;

/// Produces encryption and decryption contexts for files.
///
/// Cloning is cheap; clones share the master key store and the key cache.
#[derive(Debug, Clone)]
pub struct CryptoFactory {
    wrapper: KeyWrapper,
    cache: Arc<KeyCache>,
    config: KmsConfig,
}

impl CryptoFactory {
    /// Creates a factory over `store` with default configuration.
    pub fn new<S>(store: S) -> Self
    where
        S: MasterKeyStore + 'static,
    {
        Self::with_config(store, KmsConfig::default())
    }

    /// Creates a factory over `store` with `config`.
    pub fn with_config<S>(store: S, config: KmsConfig) -> Self
    where
        S: MasterKeyStore + 'static,
    {
        Self {
            wrapper: KeyWrapper::new(Arc::new(store)),
            cache: Arc::new(KeyCache::new(config.cache_lifetime)),
            config,
        }
    }

    /// The factory configuration.
    #[must_use]
    pub fn config(&self) -> &KmsConfig {
        &self.config
    }

    /// The shared key cache.
    #[must_use]
    pub fn cache(&self) -> &KeyCache {
        &self.cache
    }

    /// The key wrapper over this factory's store.
    #[must_use]
    pub fn wrapper(&self) -> &KeyWrapper {
        &self.wrapper
    }

    /// Starts a plan for `schema` seeded from the factory configuration.
    #[must_use]
    pub fn plan_builder(&self, schema: TableSchema) -> EncryptionPlanBuilder {
        EncryptionPlanBuilder::with_config(schema, &self.config)
    }

    /// Resolves a data key and wrapped key for every role of `plan`.
    ///
    /// Keys come from the cache when a live entry exists for the same role,
    /// master key and key length; otherwise a fresh key is generated and
    /// wrapped. The plan is consumed: one plan, one file.
    ///
    /// # Errors
    ///
    /// Returns [`KmsError::WrapFailure`] if any role's master key cannot be
    /// used. No context is returned in that case.
    pub fn file_encryption_context(&self, plan: EncryptionPlan) -> KmsResult<FileEncryptionContext> {
        let mut operation = KeyOperation::new(OperationKind::Write);
        // EncryptionPlan can only be obtained through its validating builder.
        operation.plan_validated()?;

        let mut context = FileEncryptionContext::new(operation, &plan);
        let length = plan.data_key_length();
        let lifetime = plan.cache_lifetime();

        for (role, master_key_id) in plan.roles() {
            let key = CacheKey::wrap(role.clone(), master_key_id, length);
            let cached = self.cache.get_or_create_with(key, lifetime, || {
                let dek = DataKey::generate(length);
                let wrapped = self.wrapper.wrap(&dek, master_key_id)?;
                Ok(CachedKey::new(dek, wrapped))
            })?;

            let (dek, wrapped) = cached.into_parts();
            tracing::debug!(%role, master_key_id, dek = %dek.fingerprint(), "resolved encryption key");
            context.insert(RoleKey::new(role, master_key_id, dek, wrapped));
        }

        context.operation_mut().keys_resolved()?;
        tracing::info!(
            roles = context.key_count(),
            algorithm = %plan.algorithm(),
            uniform = plan.is_uniform(),
            plaintext_footer = plan.plaintext_footer(),
            "created file encryption context"
        );
        Ok(context)
    }

    /// Recovers the data key of every role recorded in `metadata`.
    ///
    /// Each wrapped key is checked against the master key `lookup` names
    /// for its role. Unwrapped keys are cached by master key and token
    /// digest, so rereading a file skips the store.
    ///
    /// # Errors
    ///
    /// Returns [`KmsError::DecryptionKeyUnavailable`] naming the first role
    /// whose key could not be recovered. Its source is the underlying
    /// [`KmsError::CorruptWrappedKey`], [`KmsError::KeyMismatch`],
    /// [`KmsError::UnknownKeyIdentifier`] or metadata error.
    pub fn file_decryption_context(
        &self,
        metadata: &FileKeyMetadata,
        lookup: &MasterKeyLookup,
    ) -> KmsResult<FileDecryptionContext> {
        let mut operation = KeyOperation::new(OperationKind::Read);
        Self::validate_metadata(metadata, lookup)?;
        operation.plan_validated()?;

        let mut context = FileDecryptionContext::new(operation, metadata.uniform);
        for (role, material) in metadata.entries() {
            let key = self
                .unwrap_role(&role, material, lookup)
                .map_err(|e| KmsError::decryption_key_unavailable(role.clone(), e))?;
            context.insert(key);
        }

        context.operation_mut().keys_resolved()?;
        tracing::info!(
            roles = context.key_count(),
            uniform = metadata.uniform,
            "created file decryption context"
        );
        Ok(context)
    }

    fn validate_metadata(metadata: &FileKeyMetadata, lookup: &MasterKeyLookup) -> KmsResult<()> {
        if metadata.uniform && metadata.footer.is_none() {
            return Err(KmsError::decryption_key_unavailable(
                EncryptionRole::Footer,
                KmsError::metadata("uniform encryption without footer key material"),
            ));
        }
        for (role, material) in metadata.entries() {
            material
                .validate_for(&role)
                .map_err(|e| KmsError::decryption_key_unavailable(role.clone(), e))?;
        }
        if let Some(role) = lookup
            .required_roles()
            .find(|role| metadata.get(role).is_none())
        {
            return Err(KmsError::decryption_key_unavailable(
                role.clone(),
                KmsError::metadata(format!("no key material recorded for {role}")),
            ));
        }
        Ok(())
    }

    fn unwrap_role(
        &self,
        role: &EncryptionRole,
        material: &KeyMaterial,
        lookup: &MasterKeyLookup,
    ) -> KmsResult<RoleKey> {
        let master_key_id = lookup.master_key_for(role, material)?;
        let wrapped = material.wrapped_key()?;

        let key = CacheKey::unwrap(master_key_id, &wrapped);
        let cached = self
            .cache
            .get_or_create_with(key, self.config.cache_lifetime, || {
                let dek = self.wrapper.unwrap(&wrapped, master_key_id)?;
                Ok(CachedKey::new(dek, wrapped.clone()))
            })?;

        let (dek, wrapped) = cached.into_parts();
        tracing::debug!(%role, master_key_id, dek = %dek.fingerprint(), "resolved decryption key");
        Ok(RoleKey::new(role.clone(), master_key_id, dek, wrapped))
    }

    /// Drops every cached key that depends on `master_key_id`.
    ///
    /// Call after rotating or revoking a master key. Returns the number of
    /// cache entries removed.
    pub fn invalidate(&self, master_key_id: &str) -> usize {
        self.cache.invalidate(master_key_id)
    }

    /// Cache activity counters.
    #[must_use]
    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }
}
