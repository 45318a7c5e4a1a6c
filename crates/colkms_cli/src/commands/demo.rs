//! Demo command implementation.
//!
//! Writes a four-column order table with the footer and the identifier
//! columns under separate master keys, then reads it back from the
//! persisted key metadata and checks every column.

use colkms_core::{
    CryptoFactory, EncryptionPlan, EncryptionRole, FileKeyMetadata, KmsError, KmsResult,
    MasterKeyLookup, PlanFile, TableSchema,
};
use colkms_store::{FileKeyStore, InMemoryKeyStore, MasterKeyStore};
use serde::Serialize;
use std::path::Path;
use std::sync::Arc;

const DEMO_KEYS: [(&str, &str); 3] = [
    ("footer_key", "012footer_secret"),
    ("orderid_key", "column_secret001"),
    ("productid_key", "column_secret002"),
];

const DEMO_ROWS: [(&str, &str, &str, &str); 3] = [
    ("1001", "152", "3.25", "0.0"),
    ("1002", "268", "6.48", "0.2"),
    ("1003", "6548", "2.12", "0.05"),
];

/// Outcome of the demo run.
#[derive(Debug, Serialize)]
pub struct DemoReport {
    /// Keys resolved for the write.
    pub roles: Vec<RoleReport>,
    /// Whether the footer was encrypted.
    pub footer_encrypted: bool,
    /// Per-column results.
    pub columns: Vec<ColumnReport>,
    /// Key metadata as persisted.
    pub key_metadata: serde_json::Value,
    /// Cache hits during the run.
    pub cache_hits: u64,
    /// Cache misses during the run.
    pub cache_misses: u64,
}

/// One role's key.
#[derive(Debug, Serialize)]
pub struct RoleReport {
    /// Role name.
    pub role: String,
    /// Master key identifier.
    pub master_key_id: String,
    /// Data key fingerprint.
    pub dek_fingerprint: String,
}

/// One column's round trip.
#[derive(Debug, Serialize)]
pub struct ColumnReport {
    /// Column name.
    pub name: String,
    /// Whether the page was encrypted.
    pub encrypted: bool,
    /// Stored page size in bytes.
    pub stored_len: usize,
    /// Whether the read returned the written bytes.
    pub verified: bool,
}

impl DemoReport {
    fn is_ok(&self) -> bool {
        self.columns.iter().all(|c| c.verified)
    }
}

/// Runs the demo command.
pub fn run(
    key_file: Option<&Path>,
    plan_file: Option<&Path>,
    format: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let store: Arc<dyn MasterKeyStore> = match key_file {
        Some(path) => Arc::new(FileKeyStore::open(path)?),
        None => Arc::new(InMemoryKeyStore::with_keys(
            DEMO_KEYS
                .iter()
                .map(|(id, secret)| (*id, secret.as_bytes().to_vec())),
        )),
    };
    let factory = CryptoFactory::new(store);
    let plan = match plan_file {
        Some(path) => PlanFile::load(path)?.to_plan(factory.config())?,
        None => demo_plan(&factory)?,
    };

    let report = run_demo(&factory, plan)?;
    match format {
        "json" => println!("{}", serde_json::to_string_pretty(&report)?),
        _ => print_report(&report),
    }

    if report.is_ok() {
        Ok(())
    } else {
        Err("Demo round trip failed".into())
    }
}

fn demo_plan(factory: &CryptoFactory) -> KmsResult<EncryptionPlan> {
    factory
        .plan_builder(demo_schema())
        .footer_key("footer_key")
        .column_key("orderid_key", ["orderId"])
        .column_key("productid_key", ["productId"])
        .build()
}

fn demo_schema() -> TableSchema {
    TableSchema::from_columns(["orderId", "productId", "price", "vat"])
}

fn column_page(index: usize) -> Vec<u8> {
    DEMO_ROWS
        .iter()
        .map(|row| match index {
            0 => row.0,
            1 => row.1,
            2 => row.2,
            _ => row.3,
        })
        .collect::<Vec<_>>()
        .join(",")
        .into_bytes()
}

/// Writes the demo table under `plan` and reads it back.
pub fn run_demo(factory: &CryptoFactory, plan: EncryptionPlan) -> KmsResult<DemoReport> {
    let columns: Vec<String> = plan
        .schema()
        .columns()
        .iter()
        .map(|c| c.name.clone())
        .collect();
    let footer_bytes = serde_json::to_vec(&columns).map_err(|e| KmsError::metadata(e.to_string()))?;

    let writer = factory.file_encryption_context(plan)?;
    let roles = writer
        .key_metadata()
        .entries()
        .filter_map(|(role, _)| {
            writer.key_for(&role).map(|key| RoleReport {
                role: role.to_string(),
                master_key_id: key.master_key_id().to_string(),
                dek_fingerprint: key.dek().fingerprint(),
            })
        })
        .collect();

    let footer_encrypted = !writer.plaintext_footer() && writer.footer_key().is_some();
    let stored_footer = if footer_encrypted {
        writer.encrypt(&EncryptionRole::Footer, &footer_bytes)?
    } else {
        footer_bytes.clone()
    };

    let mut pages = Vec::with_capacity(columns.len());
    for (index, name) in columns.iter().enumerate() {
        let role = EncryptionRole::column(name.clone());
        let plaintext = column_page(index);
        let encrypted = writer.key_for(&role).is_some();
        let stored = if encrypted {
            writer.encrypt(&role, &plaintext)?
        } else {
            plaintext.clone()
        };
        pages.push((role, plaintext, encrypted, stored));
    }
    let metadata_json = writer.finish()?.to_json()?;

    // Read side: only the persisted metadata crosses over.
    let metadata = FileKeyMetadata::from_json(&metadata_json)?;
    let reader = factory.file_decryption_context(&metadata, &MasterKeyLookup::FromMetadata)?;

    let footer = if footer_encrypted {
        reader.decrypt(&EncryptionRole::Footer, &stored_footer)?
    } else {
        stored_footer
    };
    if footer != footer_bytes {
        return Err(KmsError::metadata("footer did not round trip"));
    }

    let mut column_reports = Vec::with_capacity(pages.len());
    for (role, plaintext, encrypted, stored) in pages {
        let recovered = if encrypted {
            reader.decrypt(&role, &stored)?
        } else {
            stored.clone()
        };
        let EncryptionRole::Column(name) = role else {
            continue;
        };
        column_reports.push(ColumnReport {
            name,
            encrypted,
            stored_len: stored.len(),
            verified: recovered == plaintext,
        });
    }
    reader.finish()?;

    let stats = factory.cache_stats();
    let key_metadata =
        serde_json::from_str(&metadata_json).map_err(|e| KmsError::metadata(e.to_string()))?;
    Ok(DemoReport {
        roles,
        footer_encrypted,
        columns: column_reports,
        key_metadata,
        cache_hits: stats.hits,
        cache_misses: stats.misses,
    })
}

fn print_report(report: &DemoReport) {
    println!("Data keys");
    println!("{:<24} {:<16} FINGERPRINT", "ROLE", "MASTER KEY");
    for role in &report.roles {
        println!(
            "{:<24} {:<16} {}",
            role.role, role.master_key_id, role.dek_fingerprint
        );
    }
    println!();
    println!(
        "Footer: {}",
        if report.footer_encrypted {
            "encrypted"
        } else {
            "plaintext"
        }
    );
    println!();
    println!("{:<12} {:<10} {:>8}  ROUND TRIP", "COLUMN", "MODE", "BYTES");
    for column in &report.columns {
        println!(
            "{:<12} {:<10} {:>8}  {}",
            column.name,
            if column.encrypted { "encrypted" } else { "plaintext" },
            column.stored_len,
            if column.verified { "✓" } else { "✗" }
        );
    }
    println!();
    println!(
        "Key cache: {} hits, {} misses",
        report.cache_hits, report.cache_misses
    );
}
