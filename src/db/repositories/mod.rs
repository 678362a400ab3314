//! Repository layer
//!
//! Trait-based data access. Each repository acquires the shared pool from
//! the gateway per operation, so store outages surface as typed errors
//! instead of panics, and service recovers as soon as the store returns.

pub mod artwork;
pub mod comment;
pub mod like;
pub mod session;
pub mod user;

pub use artwork::{ArtworkRepository, SqlxArtworkRepository};
pub use comment::{CommentRepository, SqlxCommentRepository};
pub use like::{LikeRepository, SqlxLikeRepository};
pub use session::{SessionRepository, SqlxSessionRepository};
pub use user::{SqlxUserRepository, UserRepository};
