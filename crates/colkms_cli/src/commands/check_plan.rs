//! Check-plan command implementation.

use colkms_core::{EncryptionRole, KmsConfig, KmsResult, PlanFile};
use std::path::Path;

/// A validated plan, as printed.
#[derive(Debug)]
pub struct PlanSummary {
    /// `(role, master key)` pairs, footer first.
    pub roles: Vec<(String, String)>,
    /// Algorithm name.
    pub algorithm: String,
    /// Data key length in bits.
    pub bits: u32,
    /// Footer left in plaintext.
    pub plaintext_footer: bool,
    /// Every column shares the footer key.
    pub uniform: bool,
    /// Columns written in plaintext.
    pub plaintext_columns: Vec<String>,
}

/// Runs the check-plan command.
pub fn run(path: &Path) -> Result<(), Box<dyn std::error::Error>> {
    println!("Checking plan at {:?}", path);
    println!();

    match check(path) {
        Ok(summary) => {
            println!("Algorithm:         {}", summary.algorithm);
            println!("Data key length:   {} bits", summary.bits);
            println!("Plaintext footer:  {}", summary.plaintext_footer);
            if summary.uniform {
                println!("Uniform encryption: every column uses the footer key");
            }
            println!();
            println!("{:<24} MASTER KEY", "ROLE");
            for (role, master_key) in &summary.roles {
                println!("{:<24} {}", role, master_key);
            }
            if !summary.plaintext_columns.is_empty() {
                println!();
                println!("Plaintext columns: {}", summary.plaintext_columns.join(", "));
            }
            println!();
            println!("✓ Plan is valid");
            Ok(())
        }
        Err(e) => {
            println!("✗ Plan is invalid: {e}");
            Err(e.into())
        }
    }
}

/// Loads and validates the plan file at `path`.
pub fn check(path: &Path) -> KmsResult<PlanSummary> {
    let plan = PlanFile::load(path)?.to_plan(&KmsConfig::default())?;

    let roles = plan
        .roles()
        .into_iter()
        .map(|(role, id)| (role.to_string(), id.to_string()))
        .collect();
    let plaintext_columns = plan
        .schema()
        .columns()
        .iter()
        .filter(|c| plan.master_key_for(&EncryptionRole::column(c.name.clone())).is_none())
        .map(|c| c.name.clone())
        .collect();

    Ok(PlanSummary {
        roles,
        algorithm: plan.algorithm().to_string(),
        bits: plan.data_key_length().bits(),
        plaintext_footer: plan.plaintext_footer(),
        uniform: plan.is_uniform(),
        plaintext_columns,
    })
}
