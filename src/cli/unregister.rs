use super::config::BridgeConfig;
use std::io::{self, Write};
use wabridge::messaging::{CredentialStore, SqliteCredentialStore};

/// Forget the stored device identity
///
/// The next start pairs again. The phone still lists this device until it is
/// removed there as well.
pub async fn execute(config: &BridgeConfig, yes: bool) -> Result<(), Box<dyn std::error::Error>> {
    if !config.store.path.exists() {
        return Err(format!(
            "Store not found at: {}\nNothing to unregister.",
            config.store.path.display()
        )
        .into());
    }

    let store = SqliteCredentialStore::open(&config.store.path).await?;
    let Some(identity) = store.load_identity().await? else {
        println!("Nothing to unregister: no identity stored.");
        return Ok(());
    };

    println!();
    println!("⚠️  WARNING: You are about to remove the stored identity {}", identity.jid);
    println!();
    println!("After this, the next start prints a new pairing code. To fully unlink,");
    println!("also remove the device on the phone: Settings → Linked Devices.");
    println!();

    if !yes && !confirm_action("Type 'UNLINK' to confirm: ", "UNLINK")? {
        println!("Aborted.");
        return Ok(());
    }

    store.clear_identity().await?;
    store.close().await;

    println!("✅ Local identity removed.");
    Ok(())
}

/// Parse user confirmation input against expected string
///
/// Handles whitespace trimming and exact string matching.
pub fn parse_confirmation(input: &str, expected: &str) -> bool {
    input.trim() == expected
}

/// Prompt user for confirmation with a specific expected input
fn confirm_action(prompt: &str, expected: &str) -> Result<bool, Box<dyn std::error::Error>> {
    print!("{}", prompt);
    io::stdout().flush()?;

    let mut input = String::new();
    io::stdin().read_line(&mut input)?;

    Ok(parse_confirmation(&input, expected))
}
