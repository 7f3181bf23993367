use crate::db::DbPool;
use crate::pricebook;
use crate::ticker::PriceTicker;
use crate::types::catalog::{PriceSource, Product, ProductWithSources};

/// Load the catalog with nested sources, ordered by product name. The
/// optional query applies the case-insensitive substring filter.
pub fn products_list_db(
    pool: &DbPool,
    query: Option<&str>,
) -> Result<Vec<ProductWithSources>, String> {
    let conn = pool.get().map_err(|e| e.to_string())?;
    let mut stmt = conn
        .prepare("SELECT id, name, category, image_url FROM products ORDER BY name")
        .map_err(|e| e.to_string())?;
    let products: Vec<Product> = stmt
        .query_map([], |row| {
            Ok(Product {
                id: row.get(0)?,
                name: row.get(1)?,
                category: row.get(2)?,
                image_url: row.get(3)?,
            })
        })
        .map_err(|e| e.to_string())?
        .filter_map(|r| r.ok())
        .collect();

    let mut stmt = conn
        .prepare(
            "SELECT id, product_id, source_name, source_url, price, currency, in_stock, updated_at
             FROM product_sources WHERE product_id = ?1 ORDER BY id",
        )
        .map_err(|e| e.to_string())?;

    let mut result = Vec::with_capacity(products.len());
    for product in products {
        let sources: Vec<PriceSource> = stmt
            .query_map([product.id], |row| {
                Ok(PriceSource {
                    id: row.get(0)?,
                    product_id: row.get(1)?,
                    source_name: row.get(2)?,
                    source_url: row.get(3)?,
                    price: row.get(4)?,
                    currency: row.get(5)?,
                    in_stock: row.get::<_, i64>(6)? != 0,
                    updated_at: row.get(7)?,
                })
            })
            .map_err(|e| e.to_string())?
            .filter_map(|r| r.ok())
            .collect();

        let best_price = pricebook::best_price(&sources);
        result.push(ProductWithSources {
            product,
            sources,
            best_price,
        });
    }

    Ok(match query {
        Some(q) => pricebook::filter_products(result, q),
        None => result,
    })
}

pub fn products_get_db(pool: &DbPool, product_id: i64) -> Result<ProductWithSources, String> {
    products_list_db(pool, None)?
        .into_iter()
        .find(|p| p.product.id == product_id)
        .ok_or_else(|| format!("Unknown product: {}", product_id))
}

// ---------------------------------------------------------------------------
// Tauri command wrappers
// ---------------------------------------------------------------------------

#[tauri::command]
pub fn products_list(
    pool: tauri::State<'_, DbPool>,
    query: Option<String>,
) -> Result<Vec<ProductWithSources>, String> {
    products_list_db(&pool, query.as_deref())
}

#[tauri::command]
pub fn products_get(
    pool: tauri::State<'_, DbPool>,
    product_id: i64,
) -> Result<ProductWithSources, String> {
    products_get_db(&pool, product_id)
}

/// Externally delivered row update for a price source: persists the change
/// and pushes it through the same update/alert path as simulated ticks.
#[tauri::command]
pub fn source_update_price(
    app: tauri::AppHandle,
    pool: tauri::State<'_, DbPool>,
    ticker: tauri::State<'_, PriceTicker>,
    source_id: i64,
    price: f64,
) -> Result<(), String> {
    let change = ticker.apply_external(&pool, source_id, price)?;
    let config = crate::ticker::TickerConfig::load(&pool);
    crate::ticker::publish_change(&app, &change, config.notifications_enabled);
    Ok(())
}
