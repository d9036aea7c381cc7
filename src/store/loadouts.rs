//! Player progression: hero choice, unlocks and purchased tech upgrades

use serde::Deserialize;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::game::abilities::HeroId;
use crate::game::catalog::{TowerKind, UnitKind};
use crate::game::economy::{Loadout, TechUpgrade};

use super::supabase::{SupabaseClient, SupabaseError};

/// Row of the `player_loadouts` table
#[derive(Debug, Clone, Deserialize)]
pub struct LoadoutRow {
    pub user_id: Uuid,
    #[serde(default)]
    pub hero: Option<HeroId>,
    #[serde(default)]
    pub unlocked_units: Vec<String>,
    #[serde(default)]
    pub unlocked_towers: Vec<String>,
}

impl LoadoutRow {
    /// Build the match loadout. Unknown kind names are skipped.
    pub fn into_loadout(self, upgrades: Vec<TechUpgrade>) -> Loadout {
        Loadout {
            player_id: self.user_id,
            hero: self.hero.unwrap_or_default(),
            unlocked_units: self
                .unlocked_units
                .iter()
                .filter_map(|name| name.parse::<UnitKind>().ok())
                .collect(),
            unlocked_towers: self
                .unlocked_towers
                .iter()
                .filter_map(|name| name.parse::<TowerKind>().ok())
                .collect(),
            upgrades,
        }
    }
}

/// Loadout store operations
#[derive(Clone)]
pub struct LoadoutStore {
    client: SupabaseClient,
}

impl LoadoutStore {
    pub fn new(client: SupabaseClient) -> Self {
        Self { client }
    }

    /// Fetch a player's loadout. `None` if the player has no loadout row.
    pub async fn get_loadout(&self, user_id: Uuid) -> Result<Option<Loadout>, SupabaseError> {
        let Some(row) = self.client.fetch_loadout_row(user_id).await? else {
            return Ok(None);
        };
        let upgrades = self.get_upgrades(user_id).await?;
        Ok(Some(row.into_loadout(upgrades)))
    }

    /// Tech upgrades the player has purchased
    pub async fn get_upgrades(&self, user_id: Uuid) -> Result<Vec<TechUpgrade>, SupabaseError> {
        self.client.fetch_tech_upgrades(user_id).await
    }

    /// Loadout for a match; a missing row or a store failure falls back to the starter kit
    pub async fn resolve_loadout(&self, user_id: Uuid) -> Loadout {
        match self.get_loadout(user_id).await {
            Ok(Some(loadout)) => loadout,
            Ok(None) => {
                debug!(user_id = %user_id, "No loadout stored, using starter kit");
                Loadout::starter(user_id, HeroId::default())
            }
            Err(e) => {
                warn!(user_id = %user_id, error = %e, "Failed to fetch loadout, using starter kit");
                Loadout::starter(user_id, HeroId::default())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::economy::{TechMode, TechStat};

    #[test]
    fn rows_parse_into_loadouts() {
        let row: LoadoutRow = serde_json::from_str(
            r#"{
                "user_id": "6f1c1f7e-98a5-4d63-9a8c-3c1f0b5e2a11",
                "hero": "fogweaver",
                "unlocked_units": ["knight", "dragon", "elite"],
                "unlocked_towers": ["frost", "catapult"]
            }"#,
        )
        .unwrap();

        let upgrades = vec![TechUpgrade {
            stat: TechStat::TowerDamage,
            mode: TechMode::Multiply,
            value: 1.1,
        }];
        let loadout = row.into_loadout(upgrades);

        assert_eq!(loadout.hero, HeroId::Fogweaver);
        assert_eq!(loadout.unlocked_units, vec![UnitKind::Knight, UnitKind::Elite]);
        assert_eq!(loadout.unlocked_towers, vec![TowerKind::Frost]);
        assert_eq!(loadout.upgrades.len(), 1);
        // Elite is never deployable even when stored as unlocked
        assert!(!loadout.unit_unlocks().contains(&UnitKind::Elite));
    }

    #[test]
    fn missing_columns_default() {
        let row: LoadoutRow =
            serde_json::from_str(r#"{"user_id": "6f1c1f7e-98a5-4d63-9a8c-3c1f0b5e2a11"}"#).unwrap();
        let loadout = row.into_loadout(Vec::new());
        assert_eq!(loadout.hero, HeroId::default());
        assert!(loadout.unlocked_units.is_empty());
    }
}
