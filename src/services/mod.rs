//! Services layer - Business logic
//!
//! Services implement the site's rules on top of the repositories:
//! - `content` answers the public listing, search and detail views
//! - `contact` runs the contact form pipeline
//! - `moderation` backs the admin API

pub mod contact;
pub mod content;
pub mod markdown;
pub mod moderation;
pub mod notifier;
pub mod rate_limiter;
pub mod slug;
pub mod user;

pub use contact::{ContactError, ContactService};
pub use content::{ContentError, ContentService, Landing, PageDetail, Sidebar};
pub use markdown::MarkdownRenderer;
pub use moderation::{
    AssignAuthorOnCreate, InvalidateSidebar, ModerationError, ModerationService, SaveContext,
    SaveHook,
};
pub use notifier::{notifier_from_config, NoopNotifier, Notifier, SmtpNotifier};
pub use rate_limiter::ContactRateLimiter;
pub use slug::{generate_slug, validate_slug};
pub use user::UserService;
