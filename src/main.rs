//! Leafpress - pages, a blog and a contact form

use anyhow::Result;
use std::net::SocketAddr;
use std::path::Path;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use leafpress::{
    api::{self, AppState},
    config::Config,
    db,
    theme::ThemeEngine,
};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "leafpress=info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting Leafpress...");

    let config = Config::load_with_env(Path::new("config.yml"))?;
    tracing::info!("Configuration loaded");

    let pool = db::create_pool(&config.database).await?;
    tracing::info!("Database connected: {:?}", config.database.driver);

    db::migrations::run_migrations(&pool).await?;
    tracing::info!("Database migrations completed");

    let theme_engine = ThemeEngine::new(&config.theme)?;

    let state = AppState::from_config(&config, pool, theme_engine).await?;
    tracing::info!("Services initialized");

    #[cfg(feature = "demo")]
    seed_demo_content(&state).await?;

    let app = api::build_router(state);

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on http://{}", addr);

    // Peer addresses feed the contact rate limit when no proxy header is set
    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>()).await?;

    Ok(())
}

/// Demo mode: give an empty site a category and a few pages
#[cfg(feature = "demo")]
async fn seed_demo_content(state: &AppState) -> Result<()> {
    use leafpress::models::{CategoryInput, ListParams, PageInput};

    let existing = state.content.list_published(&ListParams::first(1)).await?;
    if !existing.is_empty() {
        return Ok(());
    }

    tracing::info!("Demo mode: seeding sample content");
    let category = state
        .moderation
        .save_category(
            CategoryInput {
                name: "Getting Started".to_string(),
                description: Some("First steps with Leafpress".to_string()),
                ..Default::default()
            },
            &state.admin_user,
            None,
        )
        .await?;

    for (title, content) in [
        ("Welcome", "Leafpress serves **pages**, a blog and a contact form."),
        ("Writing Pages", "Pages are written in Markdown and saved through the admin API."),
        ("Getting in Touch", "Visit the [contact page](/contact/) to send a message."),
    ] {
        let input = PageInput {
            title: title.to_string(),
            content: content.to_string(),
            category_id: Some(category.id),
            is_published: true,
            ..Default::default()
        };
        state.moderation.save_page(input, &state.admin_user, None).await?;
    }
    Ok(())
}
