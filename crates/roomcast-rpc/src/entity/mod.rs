//! Session / User / Room entity graph.
//!
//! Ownership runs downward through `Arc`s held in registries: the
//! [`UserDirectory`] and each [`Room`] own their [`User`]s, each user owns
//! its live [`Session`]s. Upward links (user → room, user → directory) are
//! `Weak`. A session holds a strong link to its user only while attached;
//! [`Session::close`] breaks it.
//!
//! Lock order: room members → user sessions → directory. No lock is held
//! across an `.await`.

mod directory;
mod room;
mod session;
mod store;
mod user;

pub use directory::UserDirectory;
pub use room::{BroadcastReport, Room};
pub use session::{OutboundError, Session};
pub use store::Store;
pub use user::User;
