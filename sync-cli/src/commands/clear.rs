//! Clear synced operations, or wipe the whole store.

use anyhow::Result;
use sync_engine::{LocalStore, SyncEngine};

/// What to clear.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    /// Synced operations of one user.
    Synced,
    /// Every entity, operation and conflict of every user.
    All,
}

/// Run the clear command.
pub async fn run(engine: &SyncEngine, user_id: &str, scope: Scope, confirmed: bool) -> Result<()> {
    match scope {
        Scope::Synced => {
            let removed = engine.queue().clear_synced_operations(user_id).await?;
            println!("Removed {removed} synced operation(s).");
        }
        Scope::All => {
            if !confirmed {
                anyhow::bail!("Refusing to wipe the local store without --yes");
            }
            engine.store().clear_all().await?;
            println!("Local store cleared.");
        }
    }
    Ok(())
}
