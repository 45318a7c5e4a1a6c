//! Validated encryption plans.

use super::schema::TableSchema;
use crate::config::KmsConfig;
use crate::error::{KmsResult, PlanViolation};
use crate::types::{EncryptionAlgorithm, EncryptionRole, KeyLength};
use std::collections::BTreeMap;
use std::time::Duration;

/// Which master key protects each role of one file write.
///
/// A plan is built once per write and consumed by
/// [`CryptoFactory::file_encryption_context`](crate::CryptoFactory::file_encryption_context).
/// It is not `Clone`: each file gets its own plan and its own data keys.
#[derive(Debug, PartialEq, Eq)]
pub struct EncryptionPlan {
    schema: TableSchema,
    footer_key: Option<String>,
    column_keys: BTreeMap<String, String>,
    algorithm: EncryptionAlgorithm,
    data_key_length: KeyLength,
    plaintext_footer: bool,
    uniform: bool,
    cache_lifetime: Duration,
}

impl EncryptionPlan {
    /// Starts a plan for `schema` with default settings.
    #[must_use]
    pub fn builder(schema: TableSchema) -> EncryptionPlanBuilder {
        EncryptionPlanBuilder::new(schema)
    }

    /// The schema the plan was validated against.
    #[must_use]
    pub fn schema(&self) -> &TableSchema {
        &self.schema
    }

    /// Master key for the footer, if the footer has one.
    #[must_use]
    pub fn footer_key(&self) -> Option<&str> {
        self.footer_key.as_deref()
    }

    /// Column name to master key identifier.
    #[must_use]
    pub fn column_keys(&self) -> &BTreeMap<String, String> {
        &self.column_keys
    }

    /// Master key for `role`. In uniform mode every column resolves to the
    /// footer key.
    #[must_use]
    pub fn master_key_for(&self, role: &EncryptionRole) -> Option<&str> {
        match role {
            EncryptionRole::Footer => self.footer_key(),
            EncryptionRole::Column(name) if self.is_uniform() => {
                if self.schema.contains(name) {
                    self.footer_key()
                } else {
                    None
                }
            }
            EncryptionRole::Column(name) => self.column_keys.get(name).map(String::as_str),
        }
    }

    /// Roles that need their own data key, footer first.
    ///
    /// In uniform mode only the footer is listed; columns share its key.
    #[must_use]
    pub fn roles(&self) -> Vec<(EncryptionRole, &str)> {
        self.footer_key
            .iter()
            .map(|id| (EncryptionRole::Footer, id.as_str()))
            .chain(
                self.column_keys
                    .iter()
                    .map(|(column, id)| (EncryptionRole::column(column.clone()), id.as_str())),
            )
            .collect()
    }

    /// Returns true if every column is encrypted with the footer key.
    #[must_use]
    pub fn is_uniform(&self) -> bool {
        self.uniform
    }

    /// Algorithm the codec applies.
    #[must_use]
    pub fn algorithm(&self) -> EncryptionAlgorithm {
        self.algorithm
    }

    /// Length of generated data keys.
    #[must_use]
    pub fn data_key_length(&self) -> KeyLength {
        self.data_key_length
    }

    /// Whether the footer is left in plaintext.
    #[must_use]
    pub fn plaintext_footer(&self) -> bool {
        self.plaintext_footer
    }

    /// How long generated keys may be reused across plans.
    #[must_use]
    pub fn cache_lifetime(&self) -> Duration {
        self.cache_lifetime
    }
}

/// Collects plan settings and validates them in [`build`](Self::build).
///
/// Setters never fail; every problem is reported by `build` so no key
/// material is generated for a plan that would be rejected.
#[derive(Debug)]
pub struct EncryptionPlanBuilder {
    schema: TableSchema,
    footer_key: Option<String>,
    column_keys: Vec<(String, String)>,
    algorithm: Result<EncryptionAlgorithm, PlanViolation>,
    data_key_length_bits: u32,
    plaintext_footer: bool,
    uniform: bool,
    cache_lifetime: Duration,
}

impl EncryptionPlanBuilder {
    /// Creates a builder for `schema` with default settings.
    #[must_use]
    pub fn new(schema: TableSchema) -> Self {
        Self::with_config(schema, &KmsConfig::default())
    }

    /// Creates a builder for `schema` seeded from `config`.
    #[must_use]
    pub fn with_config(schema: TableSchema, config: &KmsConfig) -> Self {
        Self {
            schema,
            footer_key: None,
            column_keys: Vec::new(),
            algorithm: Ok(config.algorithm),
            data_key_length_bits: config.data_key_length.bits(),
            plaintext_footer: config.plaintext_footer,
            uniform: false,
            cache_lifetime: config.cache_lifetime,
        }
    }

    /// Sets the footer master key.
    #[must_use]
    pub fn footer_key(mut self, master_key_id: impl Into<String>) -> Self {
        self.footer_key = Some(master_key_id.into());
        self
    }

    /// Maps `columns` to the master key `master_key_id`.
    #[must_use]
    pub fn column_key<I, S>(mut self, master_key_id: impl Into<String>, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let master_key_id = master_key_id.into();
        self.column_keys.extend(
            columns
                .into_iter()
                .map(|column| (column.into(), master_key_id.clone())),
        );
        self
    }

    /// Sets the encryption algorithm.
    #[must_use]
    pub fn algorithm(mut self, algorithm: EncryptionAlgorithm) -> Self {
        self.algorithm = Ok(algorithm);
        self
    }

    /// Sets the encryption algorithm by name, e.g. `"AES_GCM_V1"`.
    #[must_use]
    pub fn algorithm_name(mut self, name: &str) -> Self {
        self.algorithm = name.parse();
        self
    }

    /// Sets the data key length in bits.
    #[must_use]
    pub fn data_key_length_bits(mut self, bits: u32) -> Self {
        self.data_key_length_bits = bits;
        self
    }

    /// Leaves the footer unencrypted.
    #[must_use]
    pub fn plaintext_footer(mut self, value: bool) -> Self {
        self.plaintext_footer = value;
        self
    }

    /// Encrypts every schema column with the footer key.
    ///
    /// A uniform plan needs a footer key and takes no column keys.
    #[must_use]
    pub fn uniform(mut self, value: bool) -> Self {
        self.uniform = value;
        self
    }

    /// Sets how long generated keys stay cached.
    #[must_use]
    pub fn cache_lifetime(mut self, lifetime: Duration) -> Self {
        self.cache_lifetime = lifetime;
        self
    }

    /// Validates the settings and produces the plan.
    ///
    /// # Errors
    ///
    /// Returns [`KmsError::InvalidPlan`](crate::KmsError::InvalidPlan) with
    /// the first violation found.
    pub fn build(self) -> KmsResult<EncryptionPlan> {
        let algorithm = self.algorithm?;
        let data_key_length = KeyLength::from_bits(self.data_key_length_bits)?;

        if self.cache_lifetime.is_zero() {
            return Err(PlanViolation::ZeroCacheLifetime.into());
        }

        let mentioned = self
            .footer_key
            .iter()
            .chain(self.column_keys.iter().map(|(_, id)| id));
        for id in mentioned {
            if id.is_empty() {
                return Err(PlanViolation::EmptyMasterKeyId.into());
            }
        }

        if self.footer_key.is_none() && self.column_keys.is_empty() {
            return Err(PlanViolation::EmptyPlan.into());
        }
        if self.footer_key.is_none() && (self.uniform || !self.plaintext_footer) {
            return Err(PlanViolation::MissingFooterKey.into());
        }
        if self.uniform && !self.column_keys.is_empty() {
            return Err(PlanViolation::UniformWithColumnKeys.into());
        }

        let mut column_keys: BTreeMap<String, String> = BTreeMap::new();
        for (column, master_key_id) in self.column_keys {
            if !self.schema.contains(&column) {
                return Err(PlanViolation::UnknownColumn {
                    column,
                    master_key_id,
                }
                .into());
            }
            match column_keys.get(&column) {
                Some(first) if *first == master_key_id => {}
                Some(first) => {
                    return Err(PlanViolation::ConflictingColumnKeys {
                        first: first.clone(),
                        column,
                        second: master_key_id,
                    }
                    .into());
                }
                None => {
                    column_keys.insert(column, master_key_id);
                }
            }
        }

        if !self.uniform {
            if let Some(column) = self
                .schema
                .sensitive_columns()
                .find(|column| !column_keys.contains_key(*column))
            {
                return Err(PlanViolation::UnmappedSensitiveColumn {
                    column: column.to_string(),
                }
                .into());
            }
        }

        Ok(EncryptionPlan {
            schema: self.schema,
            footer_key: self.footer_key,
            column_keys,
            algorithm,
            data_key_length,
            plaintext_footer: self.plaintext_footer,
            uniform: self.uniform,
            cache_lifetime: self.cache_lifetime,
        })
    }
}
