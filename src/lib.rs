//! State core of a gamified kanban task tracker.
//!
//! The crate is the engine an embedding UI drives: a [`session::Session`]
//! owns the optimistic project collection, the user profile, and a store
//! adapter (local JSON slots or a remote CRUD backend), and reconciles
//! every mutation against the store. Around it sit the pure pieces: the
//! drag-and-drop board engine ([`board`]), level and badge arithmetic
//! ([`xp`]), the pomodoro-style countdown ([`focus`]), and AI-assisted
//! task decomposition ([`breakdown`]).
//!
//! No binary ships with this crate and no logger is installed; output
//! goes through the `log` facade.

pub mod board;
pub mod breakdown;
pub mod focus;
pub mod model;
pub mod session;
pub mod state;
pub mod store;
pub mod xp;
