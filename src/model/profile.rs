use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Identifier of an account owning projects and a profile.
/// The nil UUID denotes the anonymous local-mode owner.
pub type UserId = Uuid;

/// Display name used when the identity provider has no email to derive from.
pub const FALLBACK_DISPLAY_NAME: &str = "Developer";

/// Per-user gamification record, created lazily on first access
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    pub id: Uuid,
    pub user_id: UserId,
    pub display_name: String,
    /// Accumulated experience, only ever increases
    pub xp: u32,
    /// Current level; stored, never derived by this core
    pub level: u32,
    /// Badge identifiers in award order
    pub badges: Vec<String>,
    /// Total focused minutes across all tasks
    pub total_focus_time: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Profile {
    pub fn new(user_id: UserId, display_name: impl Into<String>, now: DateTime<Utc>) -> Self {
        Profile {
            id: Uuid::new_v4(),
            user_id,
            display_name: display_name.into(),
            xp: 0,
            level: 1,
            badges: Vec::new(),
            total_focus_time: 0,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn add_xp(&mut self, amount: u32, now: DateTime<Utc>) {
        if amount == 0 {
            return;
        }
        self.xp = self.xp.saturating_add(amount);
        self.updated_at = now;
    }

    pub fn add_focus_minutes(&mut self, minutes: u32, now: DateTime<Utc>) {
        if minutes == 0 {
            return;
        }
        self.total_focus_time = self.total_focus_time.saturating_add(minutes);
        self.updated_at = now;
    }

    pub fn has_badge(&self, badge: &str) -> bool {
        self.badges.iter().any(|b| b == badge)
    }

    /// Append a badge if not already held. Returns whether it was added.
    pub fn award_badge(&mut self, badge: impl Into<String>, now: DateTime<Utc>) -> bool {
        let badge = badge.into();
        if self.has_badge(&badge) {
            return false;
        }
        self.badges.push(badge);
        self.updated_at = now;
        true
    }
}

/// Derive a display name from an identity email: the local part before `@`,
/// or the fixed fallback when no email is known.
pub fn display_name_from_email(email: Option<&str>) -> String {
    email
        .and_then(|e| e.split('@').next())
        .filter(|local| !local.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| FALLBACK_DISPLAY_NAME.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, d, 8, 0, 0).unwrap()
    }

    #[test]
    fn test_award_badge_skips_duplicates() {
        let mut profile = Profile::new(Uuid::new_v4(), "ada", at(1));
        assert!(profile.award_badge("first_task", at(2)));
        assert!(!profile.award_badge("first_task", at(3)));
        assert_eq!(profile.badges, vec!["first_task"]);
        assert_eq!(profile.updated_at, at(2));
    }

    #[test]
    fn test_display_name_derivation() {
        assert_eq!(display_name_from_email(Some("ada@example.com")), "ada");
        assert_eq!(display_name_from_email(Some("@example.com")), "Developer");
        assert_eq!(display_name_from_email(None), "Developer");
    }

    #[test]
    fn test_zero_amounts_do_not_touch_updated_at() {
        let mut profile = Profile::new(Uuid::new_v4(), "ada", at(1));
        profile.add_xp(0, at(5));
        profile.add_focus_minutes(0, at(5));
        assert_eq!(profile.updated_at, at(1));

        profile.add_xp(10, at(6));
        assert_eq!(profile.xp, 10);
        assert_eq!(profile.updated_at, at(6));
    }
}
