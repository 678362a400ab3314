//! Data models
//!
//! Typed entities for everything the store persists, plus the input and
//! wire-form structs the API exchanges. Storage and wire representations
//! are mapped explicitly; no loose JSON maps travel through handlers.

mod artwork;
mod comment;
mod image;
mod like;
mod session;
mod user;

pub use artwork::{
    generate_slug, Artwork, ArtworkFilter, ArtworkWithMeta, CreateArtworkInput, PagedResult,
    UpdateArtworkInput,
};
pub use comment::{Comment, CommentWithAuthor, CreateCommentInput};
pub use image::{Image, ImageInput};
pub use like::{Like, LikeStatus};
pub use session::Session;
pub use user::{ArtistSummary, AuthorSummary, UpdateProfileInput, User, UserRole};
