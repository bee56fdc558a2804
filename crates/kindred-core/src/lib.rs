pub mod document;
pub mod error;
pub mod events;
pub mod id;
pub mod model;
pub mod time;

pub use document::{Document, DocumentPath, Fields, Value};
pub use error::{CoreError, Result};
pub use id::generate_id;
pub use model::{ChatBatch, Counter, Friendship, FriendshipStatus, Interest, User};
pub use time::{Timestamp, now_utc};
