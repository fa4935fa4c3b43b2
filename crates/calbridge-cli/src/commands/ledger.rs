//! Ledger inspection and repair.

use clap::Subcommand;

use calbridge_core::{Config, LedgerStore};

#[derive(Subcommand)]
pub enum LedgerAction {
    /// List all ledger records
    Show,
    /// Print the ledger file location
    Path,
    /// Drop a record by source id (the event is treated as new on the
    /// next run; does not touch the target store)
    Forget {
        /// Source id to drop
        source_id: String,
    },
}

pub fn run(action: LedgerAction) -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::load()?;
    let store = LedgerStore::new(config.ledger_path()?);

    match action {
        LedgerAction::Show => {
            let ledger = store.load()?;
            if ledger.is_empty() {
                println!("ledger is empty (no prior runs)");
                return Ok(());
            }
            for record in ledger.iter() {
                println!(
                    "{}  ->  {}  (modified {})",
                    record.source_id,
                    record.target_ref,
                    record.modified_at.to_rfc3339(),
                );
            }
            println!("\n{} record(s)", ledger.len());
        }
        LedgerAction::Path => {
            println!("{}", store.path().display());
        }
        LedgerAction::Forget { source_id } => {
            let ledger = store.load()?;
            if !ledger.contains(&source_id) {
                eprintln!("no ledger record for '{source_id}'");
                std::process::exit(1);
            }
            store.remove(&source_id)?;
            println!("dropped '{source_id}'");
        }
    }

    Ok(())
}
