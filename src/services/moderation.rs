//! Moderation service
//!
//! Admin-side operations: reviewing contact submissions and saving content.
//!
//! Content saves run through [`SaveHook`]s. Pre-save hooks may adjust the
//! entity before it is written; post-save hooks see the stored entity. The
//! defaults assign the acting user as author of new pages and drop cached
//! navigation after any content change.
//!
//! Contact submissions can only be created by visitors. `create_contact`
//! always fails, and there is no update path for `created_at` or
//! `ip_address`.

use crate::db::repositories::{CategoryRepository, ContactRepository, PageRepository, TagRepository};
use crate::models::{
    Category, CategoryInput, Contact, ContactFilter, FieldErrors, ListParams, Page,
    PageInput, PagedResult, Tag, TagInput, User, REQUIRED_MESSAGE,
};
use crate::services::content::ContentService;
use crate::services::markdown::MarkdownRenderer;
use crate::services::slug::{generate_slug, validate_slug};
use async_trait::async_trait;
use chrono::Utc;
use std::collections::BTreeSet;
use std::sync::Arc;

const TITLE_MAX_LEN: usize = 200;
const CATEGORY_NAME_MAX_LEN: usize = 100;
const TAG_NAME_MAX_LEN: usize = 50;
const META_DESCRIPTION_MAX_LEN: usize = 300;

const INVALID_SLUG_MESSAGE: &str =
    "Enter a valid slug consisting of lowercase letters, numbers or hyphens.";
const INVALID_CHOICE_MESSAGE: &str = "Select a valid choice.";

#[derive(Debug, thiserror::Error)]
pub enum ModerationError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Contact submissions cannot be added by moderators")]
    AddNotPermitted,

    #[error("Validation failed")]
    Validation(FieldErrors),

    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

/// Who is saving, and whether the entity is new
#[derive(Debug, Clone, Copy)]
pub struct SaveContext<'a> {
    pub actor: &'a User,
    pub is_new: bool,
}

#[async_trait]
pub trait SaveHook<T: Send + Sync + 'static>: Send + Sync {
    async fn pre_save(&self, _item: &mut T, _ctx: &SaveContext<'_>) -> anyhow::Result<()> {
        Ok(())
    }

    async fn post_save(&self, _item: &T, _ctx: &SaveContext<'_>) -> anyhow::Result<()> {
        Ok(())
    }
}

/// Make the acting user the author of pages they create
pub struct AssignAuthorOnCreate;

#[async_trait]
impl SaveHook<Page> for AssignAuthorOnCreate {
    async fn pre_save(&self, page: &mut Page, ctx: &SaveContext<'_>) -> anyhow::Result<()> {
        if ctx.is_new {
            page.author_id = ctx.actor.id;
        }
        Ok(())
    }
}

/// Clear cached sidebar and landing context after a save
pub struct InvalidateSidebar {
    content: Arc<ContentService>,
}

impl InvalidateSidebar {
    pub fn new(content: Arc<ContentService>) -> Self {
        Self { content }
    }
}

#[async_trait]
impl<T: Send + Sync + 'static> SaveHook<T> for InvalidateSidebar {
    async fn post_save(&self, _item: &T, _ctx: &SaveContext<'_>) -> anyhow::Result<()> {
        self.content.invalidate_sidebar().await;
        Ok(())
    }
}

pub struct ModerationService {
    contacts: Arc<dyn ContactRepository>,
    pages: Arc<dyn PageRepository>,
    categories: Arc<dyn CategoryRepository>,
    tags: Arc<dyn TagRepository>,
    content: Arc<ContentService>,
    renderer: MarkdownRenderer,
    page_hooks: Vec<Arc<dyn SaveHook<Page>>>,
    category_hooks: Vec<Arc<dyn SaveHook<Category>>>,
    tag_hooks: Vec<Arc<dyn SaveHook<Tag>>>,
}

impl ModerationService {
    /// Build the service with the default hooks installed
    pub fn new(
        contacts: Arc<dyn ContactRepository>,
        pages: Arc<dyn PageRepository>,
        categories: Arc<dyn CategoryRepository>,
        tags: Arc<dyn TagRepository>,
        content: Arc<ContentService>,
    ) -> Self {
        let invalidate = Arc::new(InvalidateSidebar::new(content.clone()));
        let assign_author: Arc<dyn SaveHook<Page>> = Arc::new(AssignAuthorOnCreate);
        let page_invalidate: Arc<dyn SaveHook<Page>> = invalidate.clone();
        let category_invalidate: Arc<dyn SaveHook<Category>> = invalidate.clone();
        let tag_invalidate: Arc<dyn SaveHook<Tag>> = invalidate;
        Self {
            contacts,
            pages,
            categories,
            tags,
            content,
            renderer: MarkdownRenderer::new(),
            page_hooks: vec![assign_author, page_invalidate],
            category_hooks: vec![category_invalidate],
            tag_hooks: vec![tag_invalidate],
        }
    }

    /// Append a hook that runs after the defaults
    pub fn with_page_hook(mut self, hook: Arc<dyn SaveHook<Page>>) -> Self {
        self.page_hooks.push(hook);
        self
    }

    // ------------------------------------------------------------------
    // Contacts
    // ------------------------------------------------------------------

    pub async fn list_contacts(
        &self,
        filter: &ContactFilter,
        params: &ListParams,
    ) -> Result<PagedResult<Contact>, ModerationError> {
        let total = self.contacts.count(filter).await?;
        let items = self.contacts.list(filter, params).await?;
        Ok(PagedResult::new(items, total, params))
    }

    pub async fn get_contact(&self, id: i64) -> Result<Contact, ModerationError> {
        self.contacts
            .get_by_id(id)
            .await?
            .ok_or_else(|| ModerationError::NotFound(format!("contact {}", id)))
    }

    /// Returns how many existing submissions were matched
    pub async fn mark_read(&self, ids: &[i64]) -> Result<u64, ModerationError> {
        let updated = self.contacts.set_read(ids, true).await?;
        tracing::info!("{} contact submission(s) marked as read", updated);
        Ok(updated)
    }

    pub async fn mark_unread(&self, ids: &[i64]) -> Result<u64, ModerationError> {
        let updated = self.contacts.set_read(ids, false).await?;
        tracing::info!("{} contact submission(s) marked as unread", updated);
        Ok(updated)
    }

    pub async fn delete_contact(&self, id: i64) -> Result<(), ModerationError> {
        if !self.contacts.delete(id).await? {
            return Err(ModerationError::NotFound(format!("contact {}", id)));
        }
        Ok(())
    }

    /// Always refused: submissions come only from the public form
    pub async fn create_contact(&self) -> Result<Contact, ModerationError> {
        Err(ModerationError::AddNotPermitted)
    }

    pub async fn unread_count(&self) -> Result<i64, ModerationError> {
        let filter = ContactFilter {
            is_read: Some(false),
            search: None,
        };
        Ok(self.contacts.count(&filter).await?)
    }

    // ------------------------------------------------------------------
    // Pages
    // ------------------------------------------------------------------

    /// Create a page, or update page `existing_id`
    pub async fn save_page(
        &self,
        input: PageInput,
        actor: &User,
        existing_id: Option<i64>,
    ) -> Result<Page, ModerationError> {
        let existing = match existing_id {
            Some(id) => Some(
                self.pages
                    .get_by_id(id)
                    .await?
                    .ok_or_else(|| ModerationError::NotFound(format!("page {}", id)))?,
            ),
            None => None,
        };

        let mut errors = FieldErrors::new();
        let title = input.title.trim().to_string();
        check_required(&mut errors, "title", &title, TITLE_MAX_LEN);
        if input.meta_description.chars().count() > META_DESCRIPTION_MAX_LEN {
            let message = too_long(META_DESCRIPTION_MAX_LEN, &input.meta_description);
            push_error(&mut errors, "meta_description", message);
        }

        let slug = resolve_slug(input.slug.as_deref(), &title);
        if !validate_slug(&slug) {
            push_error(&mut errors, "slug", INVALID_SLUG_MESSAGE.to_string());
        } else if self.pages.slug_exists(&slug, existing_id).await? {
            push_error(&mut errors, "slug", "Page with this slug already exists.".to_string());
        }

        if let Some(category_id) = input.category_id {
            if self.categories.get_by_id(category_id).await?.is_none() {
                push_error(&mut errors, "category_id", INVALID_CHOICE_MESSAGE.to_string());
            }
        }

        let tag_ids: Vec<i64> = input
            .tag_ids
            .iter()
            .copied()
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        if self.tags.list_by_ids(&tag_ids).await?.len() != tag_ids.len() {
            push_error(&mut errors, "tag_ids", INVALID_CHOICE_MESSAGE.to_string());
        }

        if !errors.is_empty() {
            return Err(ModerationError::Validation(errors));
        }

        let now = Utc::now();
        let mut page = match &existing {
            Some(existing) => Page {
                updated_at: now,
                ..existing.clone()
            },
            None => Page::new(String::new(), String::new(), String::new()),
        };
        page.title = title;
        page.slug = slug;
        page.content_html = self.renderer.render(&input.content);
        page.content = input.content;
        page.meta_description = input.meta_description;
        page.category_id = input.category_id;
        page.is_published = input.is_published;

        let ctx = SaveContext {
            actor,
            is_new: existing.is_none(),
        };
        for hook in &self.page_hooks {
            hook.pre_save(&mut page, &ctx).await?;
        }

        let page = if ctx.is_new {
            self.pages.create(&page).await?
        } else {
            self.pages.update(&page).await?
        };
        self.pages.set_tags(page.id, &tag_ids).await?;

        for hook in &self.page_hooks {
            hook.post_save(&page, &ctx).await?;
        }

        tracing::info!(
            "Page '{}' {} by {}",
            page.slug,
            if ctx.is_new { "created" } else { "updated" },
            actor.username
        );
        Ok(page)
    }

    pub async fn delete_page(&self, id: i64) -> Result<(), ModerationError> {
        if !self.pages.delete(id).await? {
            return Err(ModerationError::NotFound(format!("page {}", id)));
        }
        self.content.invalidate_sidebar().await;
        Ok(())
    }

    // ------------------------------------------------------------------
    // Categories and tags
    // ------------------------------------------------------------------

    pub async fn save_category(
        &self,
        input: CategoryInput,
        actor: &User,
        existing_id: Option<i64>,
    ) -> Result<Category, ModerationError> {
        let existing = match existing_id {
            Some(id) => Some(
                self.categories
                    .get_by_id(id)
                    .await?
                    .ok_or_else(|| ModerationError::NotFound(format!("category {}", id)))?,
            ),
            None => None,
        };

        let mut errors = FieldErrors::new();
        let name = input.name.trim().to_string();
        check_required(&mut errors, "name", &name, CATEGORY_NAME_MAX_LEN);
        if !name.is_empty() && self.categories.name_exists(&name, existing_id).await? {
            push_error(&mut errors, "name", "Category with this name already exists.".to_string());
        }

        let slug = resolve_slug(input.slug.as_deref(), &name);
        if !validate_slug(&slug) {
            push_error(&mut errors, "slug", INVALID_SLUG_MESSAGE.to_string());
        } else if self.categories.slug_exists(&slug, existing_id).await? {
            push_error(&mut errors, "slug", "Category with this slug already exists.".to_string());
        }

        if !errors.is_empty() {
            return Err(ModerationError::Validation(errors));
        }

        let description = input
            .description
            .map(|d| d.trim().to_string())
            .filter(|d| !d.is_empty());
        let mut category = match existing {
            Some(existing) => Category {
                name,
                slug,
                description,
                ..existing
            },
            None => Category::new(name, slug, description),
        };

        let ctx = SaveContext {
            actor,
            is_new: existing_id.is_none(),
        };
        for hook in &self.category_hooks {
            hook.pre_save(&mut category, &ctx).await?;
        }
        let category = if ctx.is_new {
            self.categories.create(&category).await?
        } else {
            self.categories.update(&category).await?
        };
        for hook in &self.category_hooks {
            hook.post_save(&category, &ctx).await?;
        }

        Ok(category)
    }

    pub async fn save_tag(
        &self,
        input: TagInput,
        actor: &User,
        existing_id: Option<i64>,
    ) -> Result<Tag, ModerationError> {
        let existing = match existing_id {
            Some(id) => Some(
                self.tags
                    .get_by_id(id)
                    .await?
                    .ok_or_else(|| ModerationError::NotFound(format!("tag {}", id)))?,
            ),
            None => None,
        };

        let mut errors = FieldErrors::new();
        let name = input.name.trim().to_string();
        check_required(&mut errors, "name", &name, TAG_NAME_MAX_LEN);

        let slug = resolve_slug(input.slug.as_deref(), &name);
        if !validate_slug(&slug) {
            push_error(&mut errors, "slug", INVALID_SLUG_MESSAGE.to_string());
        } else if self.tags.slug_exists(&slug, existing_id).await? {
            push_error(&mut errors, "slug", "Tag with this slug already exists.".to_string());
        }

        if !errors.is_empty() {
            return Err(ModerationError::Validation(errors));
        }

        let mut tag = match existing {
            Some(existing) => Tag {
                name,
                slug,
                ..existing
            },
            None => Tag::new(name, slug),
        };

        let ctx = SaveContext {
            actor,
            is_new: existing_id.is_none(),
        };
        for hook in &self.tag_hooks {
            hook.pre_save(&mut tag, &ctx).await?;
        }
        let tag = if ctx.is_new {
            self.tags.create(&tag).await?
        } else {
            self.tags.update(&tag).await?
        };
        for hook in &self.tag_hooks {
            hook.post_save(&tag, &ctx).await?;
        }

        Ok(tag)
    }
}

/// Explicit slug when given, otherwise one derived from `source`
fn resolve_slug(explicit: Option<&str>, source: &str) -> String {
    match explicit.map(str::trim).filter(|s| !s.is_empty()) {
        Some(slug) => slug.to_string(),
        None => generate_slug(source),
    }
}

fn push_error(errors: &mut FieldErrors, field: &str, message: String) {
    errors.entry(field.to_string()).or_default().push(message);
}

fn too_long(max: usize, value: &str) -> String {
    format!(
        "Ensure this value has at most {} characters (it has {}).",
        max,
        value.chars().count()
    )
}

fn check_required(errors: &mut FieldErrors, field: &str, value: &str, max: usize) {
    if value.is_empty() {
        push_error(errors, field, REQUIRED_MESSAGE.to_string());
    } else if value.chars().count() > max {
        push_error(errors, field, too_long(max, value));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::create_cache;
    use crate::config::CacheConfig;
    use crate::db::repositories::{
        SqlxCategoryRepository, SqlxContactRepository, SqlxPageRepository, SqlxTagRepository,
        SqlxUserRepository, UserRepository,
    };
    use crate::db::{create_test_pool, migrations};
    use crate::models::ContactSubmission;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Fixture {
        service: ModerationService,
        content: Arc<ContentService>,
        contacts: Arc<dyn ContactRepository>,
        pages: Arc<dyn PageRepository>,
        admin: User,
        editor: User,
    }

    async fn setup() -> Fixture {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        migrations::run_migrations(&pool)
            .await
            .expect("Failed to run migrations");

        let users = SqlxUserRepository::new(pool.clone());
        let admin = users
            .create(&User::new("admin".to_string(), "admin@example.com".to_string()))
            .await
            .unwrap();
        let editor = users
            .create(&User::new("editor".to_string(), "editor@example.com".to_string()))
            .await
            .unwrap();

        let contacts = SqlxContactRepository::boxed(pool.clone());
        let pages = SqlxPageRepository::boxed(pool.clone());
        let categories = SqlxCategoryRepository::boxed(pool.clone());
        let tags = SqlxTagRepository::boxed(pool.clone());
        let cache = create_cache(&CacheConfig::default()).expect("Failed to create cache");
        let content = Arc::new(ContentService::new(
            pages.clone(),
            categories.clone(),
            tags.clone(),
            cache,
        ));
        let service = ModerationService::new(
            contacts.clone(),
            pages.clone(),
            categories,
            tags,
            content.clone(),
        );

        Fixture {
            service,
            content,
            contacts,
            pages,
            admin,
            editor,
        }
    }

    fn page_input(title: &str) -> PageInput {
        PageInput {
            title: title.to_string(),
            content: "Some **markdown** body".to_string(),
            is_published: true,
            ..PageInput::default()
        }
    }

    async fn store_contact(fx: &Fixture, subject: &str) -> Contact {
        let submission = ContactSubmission {
            name: "Visitor".to_string(),
            email: "visitor@example.com".to_string(),
            subject: subject.to_string(),
            message: "Hello there, moderators.".to_string(),
        };
        fx.contacts
            .create(&Contact::from_submission(submission, Some("10.0.0.1".to_string())))
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_create_contact_is_refused() {
        let fx = setup().await;
        let result = fx.service.create_contact().await;
        assert!(matches!(result, Err(ModerationError::AddNotPermitted)));
    }

    #[tokio::test]
    async fn test_mark_read_and_unread_report_counts() {
        let fx = setup().await;
        let a = store_contact(&fx, "First question").await;
        let b = store_contact(&fx, "Second question").await;
        assert_eq!(fx.service.unread_count().await.unwrap(), 2);

        assert_eq!(fx.service.mark_read(&[a.id, b.id]).await.unwrap(), 2);
        assert_eq!(fx.service.unread_count().await.unwrap(), 0);
        assert_eq!(fx.service.mark_unread(&[a.id]).await.unwrap(), 1);
        assert_eq!(fx.service.unread_count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_list_filter_and_delete_contacts() {
        let fx = setup().await;
        let a = store_contact(&fx, "Billing issue").await;
        store_contact(&fx, "General question").await;
        fx.service.mark_read(&[a.id]).await.unwrap();

        let read = ContactFilter {
            is_read: Some(true),
            search: None,
        };
        let result = fx
            .service
            .list_contacts(&read, &ListParams::default())
            .await
            .unwrap();
        assert_eq!(result.total, 1);
        assert_eq!(result.items[0].id, a.id);

        fx.service.delete_contact(a.id).await.unwrap();
        assert!(matches!(
            fx.service.get_contact(a.id).await,
            Err(ModerationError::NotFound(_))
        ));
        assert!(matches!(
            fx.service.delete_contact(a.id).await,
            Err(ModerationError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_save_page_prepopulates_slug_and_renders() {
        let fx = setup().await;
        let page = fx
            .service
            .save_page(page_input("Hello, World!"), &fx.admin, None)
            .await
            .unwrap();

        assert_eq!(page.slug, "hello-world");
        assert!(page.content_html.contains("<strong>markdown</strong>"));
        assert_eq!(page.author_id, fx.admin.id);
    }

    #[tokio::test]
    async fn test_author_assigned_only_on_create() {
        let fx = setup().await;
        let page = fx
            .service
            .save_page(page_input("Owned"), &fx.admin, None)
            .await
            .unwrap();

        let mut input = page_input("Owned, edited");
        input.slug = Some("owned".to_string());
        let updated = fx
            .service
            .save_page(input, &fx.editor, Some(page.id))
            .await
            .unwrap();

        assert_eq!(updated.id, page.id);
        assert_eq!(updated.title, "Owned, edited");
        assert_eq!(updated.author_id, fx.admin.id);
        assert_eq!(
            fx.pages.get_by_id(page.id).await.unwrap().unwrap().author_id,
            fx.admin.id
        );
    }

    #[tokio::test]
    async fn test_save_page_validation() {
        let fx = setup().await;
        fx.service
            .save_page(page_input("Taken"), &fx.admin, None)
            .await
            .unwrap();

        let mut input = page_input("Taken");
        input.category_id = Some(999);
        input.tag_ids = vec![42];
        match fx.service.save_page(input, &fx.admin, None).await {
            Err(ModerationError::Validation(errors)) => {
                assert!(errors.contains_key("slug"));
                assert!(errors.contains_key("category_id"));
                assert!(errors.contains_key("tag_ids"));
            }
            other => panic!("expected validation error, got {:?}", other),
        }

        let mut input = page_input("   ");
        input.slug = Some("Bad Slug".to_string());
        match fx.service.save_page(input, &fx.admin, None).await {
            Err(ModerationError::Validation(errors)) => {
                assert_eq!(errors["title"], vec![REQUIRED_MESSAGE]);
                assert_eq!(errors["slug"], vec![INVALID_SLUG_MESSAGE]);
            }
            other => panic!("expected validation error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_save_page_with_tags() {
        let fx = setup().await;
        let rust = fx
            .service
            .save_tag(TagInput { name: "Rust".to_string(), slug: None }, &fx.admin, None)
            .await
            .unwrap();

        let mut input = page_input("Tagged");
        input.tag_ids = vec![rust.id, rust.id];
        let page = fx.service.save_page(input, &fx.admin, None).await.unwrap();

        let detail = fx.content.get_published(&page.slug).await.unwrap();
        assert_eq!(detail.tags.len(), 1);
        assert_eq!(detail.tags[0].slug, "rust");
    }

    #[tokio::test]
    async fn test_saving_invalidates_sidebar() {
        let fx = setup().await;
        assert!(fx.content.sidebar().await.unwrap().recent_pages.is_empty());

        fx.service
            .save_page(page_input("Fresh"), &fx.admin, None)
            .await
            .unwrap();
        assert_eq!(fx.content.sidebar().await.unwrap().recent_pages.len(), 1);

        fx.service
            .save_category(
                CategoryInput {
                    name: "News".to_string(),
                    ..CategoryInput::default()
                },
                &fx.admin,
                None,
            )
            .await
            .unwrap();
        assert_eq!(fx.content.sidebar().await.unwrap().categories.len(), 1);
    }

    #[tokio::test]
    async fn test_delete_page() {
        let fx = setup().await;
        let page = fx
            .service
            .save_page(page_input("Doomed"), &fx.admin, None)
            .await
            .unwrap();

        fx.service.delete_page(page.id).await.unwrap();
        assert!(fx.pages.get_by_id(page.id).await.unwrap().is_none());
        assert!(matches!(
            fx.service.delete_page(page.id).await,
            Err(ModerationError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_category_uniqueness_and_update() {
        let fx = setup().await;
        let input = CategoryInput {
            name: "Rust Lang".to_string(),
            slug: None,
            description: Some("  ".to_string()),
        };
        let category = fx
            .service
            .save_category(input.clone(), &fx.admin, None)
            .await
            .unwrap();
        assert_eq!(category.slug, "rust-lang");
        assert!(category.description.is_none());

        match fx.service.save_category(input.clone(), &fx.admin, None).await {
            Err(ModerationError::Validation(errors)) => {
                assert!(errors.contains_key("name"));
                assert!(errors.contains_key("slug"));
            }
            other => panic!("expected validation error, got {:?}", other),
        }

        // Saving the same values over itself is allowed
        let updated = fx
            .service
            .save_category(input, &fx.admin, Some(category.id))
            .await
            .unwrap();
        assert_eq!(updated.id, category.id);
    }

    #[tokio::test]
    async fn test_custom_page_hook_runs() {
        struct CountSaves(AtomicUsize);

        #[async_trait]
        impl SaveHook<Page> for CountSaves {
            async fn post_save(&self, _page: &Page, _ctx: &SaveContext<'_>) -> anyhow::Result<()> {
                self.0.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
        }

        let fx = setup().await;
        let counter = Arc::new(CountSaves(AtomicUsize::new(0)));
        let service = fx.service.with_page_hook(counter.clone());

        service
            .save_page(page_input("Counted"), &fx.admin, None)
            .await
            .unwrap();
        assert_eq!(counter.0.load(Ordering::SeqCst), 1);
    }
}
