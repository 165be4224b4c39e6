//! Level and badge arithmetic, derived entirely from a profile's stored
//! experience and level. Nothing here advances a level; levels are data.

/// Known badge ids with display metadata. The id space is open; anything
/// else renders with its id as the title.
pub const FIRST_TASK: &str = "first_task";
pub const STREAK_3: &str = "streak_3";
pub const FOCUS_MASTER: &str = "focus_master";

/// How many badges are shown before the overflow counter takes over
pub const BADGE_DISPLAY_LIMIT: usize = 6;

/// Experience required to reach `level`. Level 0 requires nothing.
pub fn level_threshold(level: u32) -> u64 {
    let level = level as u64;
    level * level * 100
}

/// Position within the current level, for progress display
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LevelProgress {
    /// Experience gained past the current level's floor
    pub current: u64,
    /// Experience span between the floor and the next threshold
    pub needed: u64,
}

impl LevelProgress {
    /// Fill ratio clamped to [0, 1]
    pub fn ratio(&self) -> f64 {
        if self.needed == 0 {
            return 1.0;
        }
        (self.current as f64 / self.needed as f64).clamp(0.0, 1.0)
    }

    pub fn percent(&self) -> u8 {
        (self.ratio() * 100.0).round() as u8
    }
}

/// Progress of `xp` through stored level `level`.
///
/// The span runs from `level_threshold(level - 1)` to
/// `level_threshold(level)`; experience beyond the span is reported as-is
/// (levels do not auto-advance) and only the ratio clamps.
pub fn level_progress(xp: u32, level: u32) -> LevelProgress {
    let level = level.max(1);
    let floor = level_threshold(level - 1);
    let ceiling = level_threshold(level);
    LevelProgress {
        current: (xp as u64).saturating_sub(floor),
        needed: ceiling - floor,
    }
}

/// The badge strip: the first few ids in award order, plus how many more
/// there are. No sorting, no deduplication.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BadgeDisplay<'a> {
    pub shown: &'a [String],
    pub overflow: usize,
}

pub fn badge_display(badges: &[String]) -> BadgeDisplay<'_> {
    let cut = badges.len().min(BADGE_DISPLAY_LIMIT);
    BadgeDisplay {
        shown: &badges[..cut],
        overflow: badges.len() - cut,
    }
}

/// Title and icon for a badge id
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BadgeMeta<'a> {
    pub title: &'a str,
    pub icon: &'a str,
}

pub fn badge_meta(id: &str) -> BadgeMeta<'_> {
    match id {
        FIRST_TASK => BadgeMeta {
            title: "First Task",
            icon: "🎯",
        },
        STREAK_3 => BadgeMeta {
            title: "On Fire",
            icon: "🔥",
        },
        FOCUS_MASTER => BadgeMeta {
            title: "Focus Master",
            icon: "🧘",
        },
        other => BadgeMeta {
            title: other,
            icon: "🏆",
        },
    }
}
