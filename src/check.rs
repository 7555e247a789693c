//! `readnest check`: storage health report.
//!
//! Probes the primary store, then inspects the fallback directory and each
//! collection file. Fallback files are only read:
//!
//! ```text
//! STORE            STATUS
//! primary          OK
//! fallback         OK
//! journals         3 records
//! feed_subscriptions MISSING
//! articles         CORRUPT: expected value at line 1 column 1
//! documents        0 records
//! ```

use anyhow::{bail, Result};

use readnest_core::models::EntityKind;
use readnest_core::StoreError;

use crate::config::Config;
use crate::db;
use crate::hybrid::HybridStore;
use crate::json_store::JsonFileStore;

pub async fn run_check(config: &Config) -> Result<()> {
    let pool = db::connect_lazy(config)?;
    let store = HybridStore::from_config(config, pool.clone());
    let fallback = JsonFileStore::new(&config.fallback.dir);

    let primary_ok = store.probe().await.is_ok();
    pool.close().await;
    let fallback_ok = fallback.dir().is_dir();

    println!("{:<18} STATUS", "STORE");
    println!(
        "{:<18} {}",
        "primary",
        if primary_ok { "OK" } else { "UNREACHABLE" }
    );
    println!(
        "{:<18} {}",
        "fallback",
        if fallback_ok { "OK" } else { "NO DIRECTORY" }
    );

    let mut corrupt = 0;
    for kind in EntityKind::ALL {
        let status = if !fallback.collection_path(kind).exists() {
            "MISSING".to_string()
        } else {
            match fallback.load(kind).await {
                Ok(records) => format!("{} records", records.len()),
                Err(StoreError::LocalStoreCorrupt { reason, .. }) => {
                    corrupt += 1;
                    format!("CORRUPT: {reason}")
                }
                Err(err) => format!("UNREADABLE: {err}"),
            }
        };
        println!("{:<18} {}", kind.collection(), status);
    }

    if !primary_ok && corrupt > 0 {
        bail!("primary store is unreachable and {corrupt} fallback file(s) are corrupt");
    }

    Ok(())
}
