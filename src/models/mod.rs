//! Data models
//!
//! Database entities (User, Category, Tag, Page, Contact), the query and
//! pagination types used to list pages, and the inputs accepted by the
//! moderation API and the contact form.

mod category;
mod contact;
mod page;
mod tag;
mod user;

pub use category::{Category, CategoryInput};
pub use contact::{
    Contact, ContactFilter, ContactForm, ContactSubmission, FieldErrors, HONEYPOT_MESSAGE,
    INVALID_EMAIL_MESSAGE, REQUIRED_MESSAGE,
};
pub use page::{CategoryFilter, ListParams, Page, PageInput, PageQuery, PagedResult, Pagination, DEFAULT_PER_PAGE};
pub use tag::{Tag, TagInput};
pub use user::User;
