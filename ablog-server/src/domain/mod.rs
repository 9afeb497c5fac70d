pub mod comment;
pub mod error;
pub mod post;
pub mod slug;
pub mod taxonomy;
pub mod user;

pub use comment::Comment;
pub use error::DomainError;
pub use post::{Post, PostStatus};
pub use taxonomy::{Category, Tag};
pub use user::User;
