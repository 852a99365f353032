use super::config::BridgeConfig;
use std::time::{Duration, UNIX_EPOCH};
use wabridge::messaging::{CredentialStore, SqliteCredentialStore};

/// Show whether a device identity is stored and where things live
pub async fn execute(config: &BridgeConfig) -> Result<(), Box<dyn std::error::Error>> {
    println!("📊 wabridge Status");
    println!();
    println!("Store: {}", config.store.path.display());
    println!("HTTP trigger: {}", config.http.listen);

    if !config.store.path.exists() {
        println!();
        println!("❌ Not paired (no store yet). Run 'wabridge pair'.");
        return Ok(());
    }

    let store = SqliteCredentialStore::open(&config.store.path).await?;
    let identity = store.load_identity().await?;
    store.close().await;

    println!();
    match identity {
        Some(identity) => {
            let paired_at = UNIX_EPOCH + Duration::from_secs(identity.paired_at);
            println!("✅ Paired as {}", identity.jid);
            println!("   Since: {}", humantime::format_rfc3339_seconds(paired_at));
        }
        None => println!("❌ Not paired. Run 'wabridge pair'."),
    }

    Ok(())
}
