use crate::db::DbPool;
use crate::ticker::{PriceTicker, TickerConfig};
use crate::types::ticker::TickerStatus;

#[tauri::command]
pub fn ticker_start(
    app: tauri::AppHandle,
    pool: tauri::State<'_, DbPool>,
    ticker: tauri::State<'_, PriceTicker>,
) -> Result<TickerStatus, String> {
    let config = TickerConfig::load(&pool);
    ticker.spawn(app, pool.inner().clone(), config)?;
    Ok(ticker.status())
}

#[tauri::command]
pub fn ticker_stop(ticker: tauri::State<'_, PriceTicker>) -> Result<TickerStatus, String> {
    ticker.stop()?;
    Ok(ticker.status())
}

#[tauri::command]
pub fn ticker_status(ticker: tauri::State<'_, PriceTicker>) -> TickerStatus {
    ticker.status()
}
