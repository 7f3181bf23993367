use crate::db::DbPool;

pub struct Migration {
    pub name: &'static str,
    pub sql: &'static str,
}

pub fn all_migrations() -> Vec<Migration> {
    vec![
        Migration {
            name: "001_initial_schema",
            sql: "-- catalog schema created by init_db, this is a placeholder
                  SELECT 1;",
        },
        Migration {
            name: "002_auth_tables",
            sql: "CREATE TABLE IF NOT EXISTS users (
                      id INTEGER PRIMARY KEY AUTOINCREMENT,
                      email TEXT NOT NULL UNIQUE,
                      password_hash TEXT NOT NULL,
                      salt TEXT NOT NULL,
                      confirmed INTEGER NOT NULL DEFAULT 0,
                      created_at TEXT NOT NULL DEFAULT (datetime('now'))
                  );

                  CREATE TABLE IF NOT EXISTS sessions (
                      token TEXT PRIMARY KEY,
                      user_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                      created_at TEXT NOT NULL DEFAULT (datetime('now')),
                      expires_at TEXT NOT NULL
                  );

                  CREATE INDEX IF NOT EXISTS idx_sessions_user ON sessions(user_id);",
        },
        Migration {
            name: "003_default_settings",
            sql: "INSERT INTO config (key, value)
                  SELECT 'settings', '{\"tickIntervalMs\":10000,\"tickProbability\":0.35,\"notificationsEnabled\":true}'
                  WHERE NOT EXISTS (SELECT 1 FROM config WHERE key = 'settings');",
        },
    ]
}

pub fn run_pending(pool: &DbPool) -> Result<Vec<String>, Box<dyn std::error::Error>> {
    let conn = pool.get()?;
    let applied_set: std::collections::HashSet<String> = conn
        .prepare("SELECT name FROM migrations ORDER BY id")?
        .query_map([], |row| row.get::<_, String>(0))?
        .filter_map(|r| r.ok())
        .collect();

    let mut newly_applied = Vec::new();

    for migration in all_migrations() {
        if !applied_set.contains(migration.name) {
            conn.execute_batch(migration.sql)?;
            conn.execute(
                "INSERT INTO migrations (name) VALUES (?1)",
                [migration.name],
            )?;
            newly_applied.push(migration.name.to_string());
        }
    }

    Ok(newly_applied)
}

pub fn applied(pool: &DbPool) -> Result<Vec<String>, Box<dyn std::error::Error>> {
    let conn = pool.get()?;
    let names: Vec<String> = conn
        .prepare("SELECT name FROM migrations ORDER BY id")?
        .query_map([], |row| row.get(0))?
        .filter_map(|r| r.ok())
        .collect();
    Ok(names)
}
