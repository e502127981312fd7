//! Active world listing.

use worldfleet_id::{Location, WorldKey};
use worldfleet_reconcile::SessionStatus;

use crate::models::WorldSession;
use crate::registry::{Registry, RegistryResult};

/// Every active world in `location`, across all registry pages.
pub async fn list_active_worlds(
    registry: &dyn Registry,
    location: &Location,
    page_size: u32,
) -> RegistryResult<Vec<WorldSession>> {
    let mut worlds = Vec::new();
    let mut after: Option<WorldKey> = None;

    loop {
        let page = registry
            .query_location(location, Some(SessionStatus::Active), after.as_ref(), page_size)
            .await?;
        worlds.extend(page.items);
        match page.next {
            Some(next) => after = Some(next),
            None => break,
        }
    }

    Ok(worlds)
}
