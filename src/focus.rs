use chrono::{DateTime, Utc};

/// Work session length in seconds (25 minutes)
pub const WORK_SECS: u32 = 1500;
pub const SHORT_BREAK_SECS: u32 = 300;
pub const LONG_BREAK_SECS: u32 = 900;
/// Every nth completed work session earns the long break
const LONG_BREAK_EVERY: u32 = 4;

/// Which half of the work/break cycle the timer is in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Work,
    Break,
}

/// What a tick or stop reported back to the caller. Minutes carried here
/// are deltas: the caller adds them to the focused task, never overwrites.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerReport {
    /// A work session ran to completion (always the full 25 minutes)
    WorkComplete { minutes: u32 },
    /// A break ran out; the timer is back in the work phase
    BreakComplete,
    /// Manual stop partway through a work session
    Stopped { minutes: u32 },
}

impl TimerReport {
    /// Focused minutes this report contributes, if any
    pub fn minutes(&self) -> Option<u32> {
        match self {
            TimerReport::WorkComplete { minutes } | TimerReport::Stopped { minutes } => {
                Some(*minutes)
            }
            TimerReport::BreakComplete => None,
        }
    }
}

/// Countdown state machine for focused work on a single task.
///
/// Driven from outside: one `tick()` per elapsed second while running.
/// Pausing halts ticks; the remaining time is preserved exactly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FocusTimer {
    phase: Phase,
    running: bool,
    remaining: u32,
    sessions_completed: u32,
    started_at: Option<DateTime<Utc>>,
}

impl Default for FocusTimer {
    fn default() -> Self {
        FocusTimer::new()
    }
}

impl FocusTimer {
    /// A paused timer at the start of a full work session
    pub fn new() -> Self {
        FocusTimer {
            phase: Phase::Work,
            running: false,
            remaining: WORK_SECS,
            sessions_completed: 0,
            started_at: None,
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn remaining_secs(&self) -> u32 {
        self.remaining
    }

    pub fn sessions_completed(&self) -> u32 {
        self.sessions_completed
    }

    /// Start or resume the countdown, recording the wall-clock instant.
    pub fn start(&mut self, now: DateTime<Utc>) {
        self.running = true;
        self.started_at = Some(now);
    }

    /// Halt the countdown, preserving the remaining time.
    pub fn pause(&mut self) {
        self.running = false;
    }

    /// Advance one second. Returns a report when a phase runs out.
    pub fn tick(&mut self) -> Option<TimerReport> {
        if !self.running || self.remaining == 0 {
            return None;
        }
        self.remaining -= 1;
        if self.remaining > 0 {
            return None;
        }

        self.running = false;
        self.started_at = None;
        match self.phase {
            Phase::Work => {
                self.sessions_completed += 1;
                let long = self.sessions_completed % LONG_BREAK_EVERY == 0;
                self.phase = Phase::Break;
                self.remaining = if long { LONG_BREAK_SECS } else { SHORT_BREAK_SECS };
                Some(TimerReport::WorkComplete {
                    minutes: WORK_SECS / 60,
                })
            }
            Phase::Break => {
                self.phase = Phase::Work;
                self.remaining = WORK_SECS;
                Some(TimerReport::BreakComplete)
            }
        }
    }

    /// Abandon the current phase and reset to a full work session.
    ///
    /// A stop during a started work phase reports whole elapsed wall-clock
    /// minutes, measured from the last start instant; time before an
    /// intervening pause is not accumulated. Stops under one minute and
    /// stops during a break report nothing.
    pub fn stop(&mut self, now: DateTime<Utc>) -> Option<TimerReport> {
        let was_work = self.phase == Phase::Work;
        let started_at = self.started_at.take();

        self.phase = Phase::Work;
        self.running = false;
        self.remaining = WORK_SECS;

        if !was_work {
            return None;
        }
        let started = started_at?;
        let minutes = (now - started).num_minutes().max(0) as u32;
        if minutes == 0 {
            return None;
        }
        Some(TimerReport::Stopped { minutes })
    }
}
