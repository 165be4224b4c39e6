//! Cached user profile with save-through mutation helpers.
//!
//! The profile is loaded lazily on first access and created on the spot
//! for users that never had one. Mutations apply to the cache and save
//! through the store immediately; profile writes are small and rare, so
//! they do not go through the pending-write queue.

use chrono::{DateTime, Utc};
use log::debug;

use crate::model::{Profile, display_name_from_email};
use crate::store::{ProfileStore, StoreError, UserAccount};

/// Lazily loaded profile for the signed-in (or anonymous local) user
#[derive(Debug, Default)]
pub struct ProfileState {
    current: Option<Profile>,
}

impl ProfileState {
    pub fn new() -> Self {
        ProfileState { current: None }
    }

    /// The cached profile, if it has been loaded
    pub fn get(&self) -> Option<&Profile> {
        self.current.as_ref()
    }

    /// Load the account's profile, creating and persisting a fresh one on
    /// first use. The display name of a fresh profile comes from the
    /// account email's local part.
    pub fn load_or_create<S: ProfileStore + ?Sized>(
        &mut self,
        store: &mut S,
        account: &UserAccount,
        now: DateTime<Utc>,
    ) -> Result<&Profile, StoreError> {
        let profile = match self.current.take() {
            Some(profile) => profile,
            None => match store.load_profile(account.id)? {
                Some(profile) => profile,
                None => {
                    debug!("creating profile for {}", account.id);
                    let name = display_name_from_email(account.email.as_deref());
                    store.save_profile(&Profile::new(account.id, name, now))?
                }
            },
        };
        Ok(self.current.insert(profile))
    }

    /// Add experience points and save. A no-op when nothing is loaded.
    pub fn add_xp<S: ProfileStore + ?Sized>(
        &mut self,
        store: &mut S,
        amount: u32,
        now: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let Some(profile) = self.current.as_mut() else {
            debug!("no profile loaded; dropping {amount} xp");
            return Ok(());
        };
        profile.add_xp(amount, now);
        *profile = store.save_profile(profile)?;
        Ok(())
    }

    /// Grant a badge by identifier. Returns whether it was newly earned.
    pub fn award_badge<S: ProfileStore + ?Sized>(
        &mut self,
        store: &mut S,
        badge: &str,
        now: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        let Some(profile) = self.current.as_mut() else {
            return Ok(false);
        };
        if !profile.award_badge(badge, now) {
            return Ok(false);
        }
        *profile = store.save_profile(profile)?;
        Ok(true)
    }

    /// Add focused minutes to the lifetime total and save
    pub fn add_focus_minutes<S: ProfileStore + ?Sized>(
        &mut self,
        store: &mut S,
        minutes: u32,
        now: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        if minutes == 0 {
            return Ok(());
        }
        let Some(profile) = self.current.as_mut() else {
            debug!("no profile loaded; dropping {minutes} focus minutes");
            return Ok(());
        };
        profile.add_focus_minutes(minutes, now);
        *profile = store.save_profile(profile)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::local::LocalStore;
    use chrono::TimeZone;
    use tempfile::TempDir;
    use uuid::Uuid;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap()
    }

    fn account() -> UserAccount {
        UserAccount {
            id: Uuid::nil(),
            email: None,
        }
    }

    #[test]
    fn test_first_access_creates_and_persists_a_profile() {
        let tmp = TempDir::new().unwrap();
        let id;
        {
            let mut store = LocalStore::open(tmp.path()).unwrap();
            let mut state = ProfileState::new();
            let profile = state.load_or_create(&mut store, &account(), now()).unwrap();
            assert_eq!(profile.display_name, "Developer");
            assert_eq!(profile.level, 1);
            assert_eq!(profile.xp, 0);
            id = profile.id;
        }
        let mut store = LocalStore::open(tmp.path()).unwrap();
        let mut state = ProfileState::new();
        let profile = state.load_or_create(&mut store, &account(), now()).unwrap();
        assert_eq!(profile.id, id);
    }

    #[test]
    fn test_display_name_comes_from_the_email() {
        let tmp = TempDir::new().unwrap();
        let mut store = LocalStore::open(tmp.path()).unwrap();
        let account = UserAccount {
            id: Uuid::nil(),
            email: Some("dana@university.edu".into()),
        };
        let mut state = ProfileState::new();
        let profile = state.load_or_create(&mut store, &account, now()).unwrap();
        assert_eq!(profile.display_name, "dana");
    }

    #[test]
    fn test_xp_and_focus_save_through() {
        let tmp = TempDir::new().unwrap();
        let mut store = LocalStore::open(tmp.path()).unwrap();
        let mut state = ProfileState::new();
        state.load_or_create(&mut store, &account(), now()).unwrap();

        state.add_xp(&mut store, 25, now()).unwrap();
        state.add_focus_minutes(&mut store, 10, now()).unwrap();
        assert_eq!(state.get().unwrap().xp, 25);
        assert_eq!(state.get().unwrap().total_focus_time, 10);

        let stored = store.load_profile(Uuid::nil()).unwrap().unwrap();
        assert_eq!(stored.xp, 25);
        assert_eq!(stored.total_focus_time, 10);
    }

    #[test]
    fn test_badges_are_awarded_once() {
        let tmp = TempDir::new().unwrap();
        let mut store = LocalStore::open(tmp.path()).unwrap();
        let mut state = ProfileState::new();
        state.load_or_create(&mut store, &account(), now()).unwrap();

        assert!(state.award_badge(&mut store, "first_task", now()).unwrap());
        assert!(!state.award_badge(&mut store, "first_task", now()).unwrap());
        assert_eq!(state.get().unwrap().badges, ["first_task"]);
    }

    #[test]
    fn test_mutations_without_a_profile_are_dropped() {
        let tmp = TempDir::new().unwrap();
        let mut store = LocalStore::open(tmp.path()).unwrap();
        let mut state = ProfileState::new();
        state.add_xp(&mut store, 25, now()).unwrap();
        assert!(state.get().is_none());
        assert!(store.load_profile(Uuid::nil()).unwrap().is_none());
    }
}
