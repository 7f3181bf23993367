pub mod commands;
pub mod db;
pub mod events;
pub mod migrations;
pub mod pricebook;
pub mod seed;
pub mod ticker;
pub mod types;

use tauri::Manager;
use tracing_subscriber::EnvFilter;

/// Initialize structured logging with tracing.
/// Respects RUST_LOG env var; defaults to `info` level for pricewatch crate.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("pricewatch=info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .init();
}

#[cfg_attr(mobile, tauri::mobile_entry_point)]
pub fn run() {
    init_tracing();

    // Load .env from project root (parent of src-tauri/)
    let manifest_dir = std::path::Path::new(env!("CARGO_MANIFEST_DIR"));
    let project_root = manifest_dir.parent().unwrap_or(manifest_dir);
    let env_path = project_root.join(".env");
    dotenvy::from_path(&env_path).ok();

    let data_dir = db::pricewatch_data_dir();
    let db_path = data_dir.join("state").join("pricewatch.sqlite");
    let pool = db::create_pool(&db_path).expect("Failed to create database pool");
    db::init_db(&pool).expect("Failed to initialize database");
    migrations::run_pending(&pool).expect("Failed to run migrations");
    seed::seed_demo_catalog(&pool).expect("Failed to seed demo catalog");

    tauri::Builder::default()
        .plugin(tauri_plugin_opener::init())
        .plugin(tauri_plugin_notification::init())
        .manage(pool)
        .manage(ticker::PriceTicker::new())
        .setup(|app| {
            // Start the simulated price feed with the stored settings
            let pool = app.state::<db::DbPool>().inner().clone();
            let config = ticker::TickerConfig::load(&pool);
            let price_ticker = app.state::<ticker::PriceTicker>();
            if let Err(e) = price_ticker.spawn(app.handle().clone(), pool, config) {
                tracing::warn!(error = %e, "Price ticker failed to start");
            }
            Ok(())
        })
        .invoke_handler(tauri::generate_handler![
            commands::products::products_list,
            commands::products::products_get,
            commands::products::source_update_price,
            commands::history::price_history_list,
            commands::auth::auth_sign_up,
            commands::auth::auth_sign_in,
            commands::auth::auth_sign_out,
            commands::auth::auth_session,
            commands::config::config_get,
            commands::config::config_update,
            commands::ticker::ticker_start,
            commands::ticker::ticker_stop,
            commands::ticker::ticker_status,
        ])
        .run(tauri::generate_context!())
        .expect("error while running tauri application");
}
