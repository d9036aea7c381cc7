//! Game simulation modules

pub mod abilities;
pub mod actions;
pub mod catalog;
pub mod combat;
pub mod economy;
pub mod r#match;
pub mod snapshot;
pub mod state;
pub mod waves;

pub use actions::{ActionError, ActionOk, ActionReply, ActionResult};
pub use economy::{CodingSubmission, Loadout};
pub use r#match::{GameMatch, MatchHandle, MatchRegistry, RegistryError};
pub use state::{Match, MatchSettings, MatchStatus, Side, Vec2};

#[cfg(test)]
pub(crate) mod testing {
    use uuid::Uuid;

    use super::abilities::HeroId;
    use super::economy::Loadout;
    use super::state::{Match, MatchSettings};

    /// Warlord (side A) vs Phantom (side B) with starter loadouts and no waves
    pub fn test_match() -> Match {
        let a = Loadout::starter(Uuid::new_v4(), HeroId::Warlord);
        let b = Loadout::starter(Uuid::new_v4(), HeroId::Phantom);
        let settings = MatchSettings {
            first_wave_delay_ms: 1_000_000.0,
            ..Default::default()
        };
        Match::new(Uuid::new_v4(), &a, &b, settings, 7)
    }
}
