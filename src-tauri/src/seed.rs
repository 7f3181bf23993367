use crate::db::DbPool;

struct SeedSource {
    source_name: &'static str,
    source_url: &'static str,
    price: f64,
}

struct SeedProduct {
    name: &'static str,
    category: &'static str,
    image_url: &'static str,
    sources: &'static [SeedSource],
}

/// Demo catalog used to prime an empty store on first launch.
fn demo_catalog() -> &'static [SeedProduct] {
    &[
        SeedProduct {
            name: "iPhone 15 Pro",
            category: "Smartphones",
            image_url: "https://images.pricewatch.dev/iphone-15-pro.jpg",
            sources: &[
                SeedSource {
                    source_name: "Amazon",
                    source_url: "https://amazon.in/dp/iphone-15-pro",
                    price: 99999.00,
                },
                SeedSource {
                    source_name: "Flipkart",
                    source_url: "https://flipkart.com/iphone-15-pro",
                    price: 98999.00,
                },
                SeedSource {
                    source_name: "Croma",
                    source_url: "https://croma.com/iphone-15-pro",
                    price: 101999.00,
                },
            ],
        },
        SeedProduct {
            name: "Samsung Galaxy S24 Ultra",
            category: "Smartphones",
            image_url: "https://images.pricewatch.dev/galaxy-s24-ultra.jpg",
            sources: &[
                SeedSource {
                    source_name: "Amazon",
                    source_url: "https://amazon.in/dp/galaxy-s24-ultra",
                    price: 121999.00,
                },
                SeedSource {
                    source_name: "Flipkart",
                    source_url: "https://flipkart.com/galaxy-s24-ultra",
                    price: 119999.00,
                },
            ],
        },
        SeedProduct {
            name: "Sony WH-1000XM5",
            category: "Audio",
            image_url: "https://images.pricewatch.dev/sony-wh1000xm5.jpg",
            sources: &[
                SeedSource {
                    source_name: "Amazon",
                    source_url: "https://amazon.in/dp/sony-wh1000xm5",
                    price: 26990.00,
                },
                SeedSource {
                    source_name: "Croma",
                    source_url: "https://croma.com/sony-wh1000xm5",
                    price: 27990.00,
                },
                SeedSource {
                    source_name: "Reliance Digital",
                    source_url: "https://reliancedigital.in/sony-wh1000xm5",
                    price: 26490.00,
                },
            ],
        },
        SeedProduct {
            name: "MacBook Air M3",
            category: "Laptops",
            image_url: "https://images.pricewatch.dev/macbook-air-m3.jpg",
            sources: &[
                SeedSource {
                    source_name: "Amazon",
                    source_url: "https://amazon.in/dp/macbook-air-m3",
                    price: 114900.00,
                },
                SeedSource {
                    source_name: "Flipkart",
                    source_url: "https://flipkart.com/macbook-air-m3",
                    price: 112990.00,
                },
            ],
        },
        SeedProduct {
            name: "Dell XPS 13",
            category: "Laptops",
            image_url: "https://images.pricewatch.dev/dell-xps-13.jpg",
            sources: &[
                SeedSource {
                    source_name: "Dell Store",
                    source_url: "https://dell.co.in/xps-13",
                    price: 139990.00,
                },
                SeedSource {
                    source_name: "Amazon",
                    source_url: "https://amazon.in/dp/dell-xps-13",
                    price: 134990.00,
                },
            ],
        },
    ]
}

/// Seed the demo catalog into an empty store. Each source also gets an
/// initial price_history row. No-op when any product already exists.
pub fn seed_demo_catalog(pool: &DbPool) -> Result<bool, String> {
    let mut conn = pool.get().map_err(|e| e.to_string())?;

    let count: i64 = conn
        .query_row("SELECT COUNT(*) FROM products", [], |row| row.get(0))
        .map_err(|e| e.to_string())?;
    if count > 0 {
        return Ok(false);
    }

    let tx = conn.transaction().map_err(|e| e.to_string())?;
    for product in demo_catalog() {
        tx.execute(
            "INSERT INTO products (name, category, image_url) VALUES (?1, ?2, ?3)",
            rusqlite::params![product.name, product.category, product.image_url],
        )
        .map_err(|e| e.to_string())?;
        let product_id = tx.last_insert_rowid();

        for source in product.sources {
            tx.execute(
                "INSERT INTO product_sources (product_id, source_name, source_url, price, currency, in_stock)
                 VALUES (?1, ?2, ?3, ?4, 'INR', 1)",
                rusqlite::params![product_id, source.source_name, source.source_url, source.price],
            )
            .map_err(|e| e.to_string())?;
            let source_id = tx.last_insert_rowid();
            tx.execute(
                "INSERT INTO price_history (source_id, price) VALUES (?1, ?2)",
                rusqlite::params![source_id, source.price],
            )
            .map_err(|e| e.to_string())?;
        }
    }
    tx.commit().map_err(|e| e.to_string())?;
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;
    use crate::migrations;

    fn test_pool() -> DbPool {
        let dir = tempfile::tempdir().unwrap();
        let pool = db::create_pool(&dir.path().join("test.sqlite")).unwrap();
        db::init_db(&pool).unwrap();
        migrations::run_pending(&pool).unwrap();
        pool
    }

    #[test]
    fn seed_populates_empty_store() {
        let pool = test_pool();
        assert!(seed_demo_catalog(&pool).unwrap());

        let conn = pool.get().unwrap();
        let products: i64 = conn
            .query_row("SELECT COUNT(*) FROM products", [], |r| r.get(0))
            .unwrap();
        let sources: i64 = conn
            .query_row("SELECT COUNT(*) FROM product_sources", [], |r| r.get(0))
            .unwrap();
        let history: i64 = conn
            .query_row("SELECT COUNT(*) FROM price_history", [], |r| r.get(0))
            .unwrap();
        assert_eq!(products, 5);
        assert!(sources > products);
        assert_eq!(history, sources); // one initial history row per source
    }

    #[test]
    fn seed_is_noop_on_populated_store() {
        let pool = test_pool();
        assert!(seed_demo_catalog(&pool).unwrap());
        assert!(!seed_demo_catalog(&pool).unwrap());

        let conn = pool.get().unwrap();
        let products: i64 = conn
            .query_row("SELECT COUNT(*) FROM products", [], |r| r.get(0))
            .unwrap();
        assert_eq!(products, 5);
    }

    #[test]
    fn seeded_iphone_has_expected_source_prices() {
        let pool = test_pool();
        seed_demo_catalog(&pool).unwrap();

        let conn = pool.get().unwrap();
        let min: f64 = conn
            .query_row(
                "SELECT MIN(s.price) FROM product_sources s
                 JOIN products p ON p.id = s.product_id
                 WHERE p.name = 'iPhone 15 Pro'",
                [],
                |r| r.get(0),
            )
            .unwrap();
        assert_eq!(min, 98999.00);
    }
}
