use dotenvy::dotenv;
use lendbook::{
    api::{self, AppState},
    config::{self, database},
    core::{cash_box, user},
    errors::Result,
};
use std::{env, sync::Arc};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    // 1. Initialize tracing (as early as possible)
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // 2. Load .env file; env vars can also be set externally
    dotenv().ok();

    // 3. Load the application configuration
    let app_config = config::load_app_configuration()
        .inspect_err(|e| error!("Failed to load configuration: {}", e))?;

    // 4. Connect and make sure the schema exists
    let db = database::create_connection(&app_config.database_url)
        .await
        .inspect_err(|e| error!("Failed to connect to database: {}", e))?;
    database::create_tables(&db).await?;

    // 5. First admin, read directly from the environment and never stored in AppConfig
    if let (Ok(username), Ok(password)) = (
        env::var("LENDBOOK_ADMIN_USERNAME"),
        env::var("LENDBOOK_ADMIN_PASSWORD"),
    ) {
        match user::bootstrap_admin(&db, &username, &password).await? {
            Some(admin) => info!(admin_id = admin.id, "Created initial admin {}", admin.username),
            None => info!("Admin already present, skipping bootstrap"),
        }
    }

    // 6. Open boxes for any account that predates box creation
    cash_box::ensure_boxes_for_all_users(&db).await?;

    // 7. Serve
    let bind_addr = app_config.bind_addr.clone();
    let app = api::router(AppState {
        db: Arc::new(db),
        config: Arc::new(app_config),
    });
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    info!("Listening on {}", bind_addr);
    axum::serve(listener, app).await?;

    Ok(())
}
