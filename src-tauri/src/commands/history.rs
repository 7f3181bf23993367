use crate::db::DbPool;
use crate::types::catalog::PricePoint;

const DEFAULT_LIMIT: u32 = 50;

/// Recorded prices for a source, newest first.
pub fn price_history_list_db(
    pool: &DbPool,
    source_id: i64,
    limit: Option<u32>,
) -> Result<Vec<PricePoint>, String> {
    let conn = pool.get().map_err(|e| e.to_string())?;
    let mut stmt = conn
        .prepare(
            "SELECT price, recorded_at FROM price_history
             WHERE source_id = ?1 ORDER BY recorded_at DESC, id DESC LIMIT ?2",
        )
        .map_err(|e| e.to_string())?;
    let points = stmt
        .query_map(
            rusqlite::params![source_id, limit.unwrap_or(DEFAULT_LIMIT)],
            |row| {
                Ok(PricePoint {
                    price: row.get(0)?,
                    recorded_at: row.get(1)?,
                })
            },
        )
        .map_err(|e| e.to_string())?
        .filter_map(|r| r.ok())
        .collect();
    Ok(points)
}

#[tauri::command]
pub fn price_history_list(
    pool: tauri::State<'_, DbPool>,
    source_id: i64,
    limit: Option<u32>,
) -> Result<Vec<PricePoint>, String> {
    price_history_list_db(&pool, source_id, limit)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;
    use crate::migrations;
    use crate::seed;

    fn test_pool() -> DbPool {
        let dir = tempfile::tempdir().unwrap();
        let pool = db::create_pool(&dir.path().join("test.sqlite")).unwrap();
        db::init_db(&pool).unwrap();
        migrations::run_pending(&pool).unwrap();
        seed::seed_demo_catalog(&pool).unwrap();
        pool
    }

    fn any_source_id(pool: &DbPool) -> i64 {
        let conn = pool.get().unwrap();
        conn.query_row("SELECT id FROM product_sources LIMIT 1", [], |r| r.get(0))
            .unwrap()
    }

    #[test]
    fn seeded_source_has_initial_history() {
        let pool = test_pool();
        let source_id = any_source_id(&pool);
        let points = price_history_list_db(&pool, source_id, None).unwrap();
        assert_eq!(points.len(), 1);
    }

    #[test]
    fn newest_point_comes_first() {
        let pool = test_pool();
        let source_id = any_source_id(&pool);
        let conn = pool.get().unwrap();
        conn.execute(
            "INSERT INTO price_history (source_id, price, recorded_at)
             VALUES (?1, 111.0, datetime('now', '+1 hour'))",
            [source_id],
        )
        .unwrap();

        let points = price_history_list_db(&pool, source_id, None).unwrap();
        assert_eq!(points[0].price, 111.0);
    }

    #[test]
    fn limit_caps_returned_points() {
        let pool = test_pool();
        let source_id = any_source_id(&pool);
        let conn = pool.get().unwrap();
        for i in 0..10 {
            conn.execute(
                "INSERT INTO price_history (source_id, price) VALUES (?1, ?2)",
                rusqlite::params![source_id, 100.0 + i as f64],
            )
            .unwrap();
        }
        let points = price_history_list_db(&pool, source_id, Some(3)).unwrap();
        assert_eq!(points.len(), 3);
    }

    #[test]
    fn unknown_source_returns_empty() {
        let pool = test_pool();
        let points = price_history_list_db(&pool, 424242, None).unwrap();
        assert!(points.is_empty());
    }
}
