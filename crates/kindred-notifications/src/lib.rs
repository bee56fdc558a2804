pub mod adapters;
pub mod composer;
pub mod error;
pub mod templates;
pub mod types;

pub use adapters::{FcmAdapter, FcmConfig, LogGateway, PushGateway, SendResult};
pub use composer::{Composer, Composition, SkipReason};
pub use error::NotificationError;
pub use templates::{RenderedContent, Template, TemplateRenderer};
pub use types::{NotificationKind, PushMessage, PushNotification};

/// Shareable gateway handle.
pub type DynGateway = std::sync::Arc<dyn PushGateway>;
