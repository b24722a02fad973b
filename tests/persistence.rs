//! Snapshot persistence across simulated restarts

use pesadb::{Catalog, DatabaseState, DurabilityLevel, EngineConfig, QueryResult, Value};
use tempfile::TempDir;

fn config(dir: &TempDir) -> EngineConfig {
    EngineConfig {
        durability: DurabilityLevel::NoSync,
        ..EngineConfig::with_data_dir(dir.path())
    }
}

fn rows(catalog: &Catalog, db: &str, sql: &str) -> Vec<Vec<Value>> {
    match catalog.execute(db, sql).unwrap() {
        QueryResult::Select { rows, .. } => rows,
        other => panic!("expected rows, got {:?}", other),
    }
}

#[test]
fn reload_reproduces_tables_schemas_and_indexes() {
    let dir = TempDir::new().unwrap();

    {
        let catalog = Catalog::new(config(&dir));
        catalog
            .execute("ledger", "CREATE TABLE categories (id INT PRIMARY KEY, name STRING)")
            .unwrap();
        catalog
            .execute(
                "ledger",
                "CREATE TABLE transactions (id STRING PRIMARY KEY, amount FLOAT, \
                 category_id INT REFERENCES categories(id), note STRING)",
            )
            .unwrap();
        catalog
            .execute("ledger", "CREATE INDEX idx_cat ON transactions (category_id)")
            .unwrap();
        catalog
            .execute("ledger", "INSERT INTO categories (id, name) VALUES (1, 'food')")
            .unwrap();
        for (id, amount, cat) in [("a", 10.0, 1), ("b", 20.5, 2), ("c", 30.0, 1)] {
            catalog
                .execute(
                    "ledger",
                    &format!(
                        "INSERT INTO transactions (id, amount, category_id, note) \
                         VALUES ('{}', {}, {}, '{{\"sms\": \"ok\"}}')",
                        id, amount, cat
                    ),
                )
                .unwrap();
        }
        catalog
            .execute("ledger", "DELETE FROM transactions WHERE id = 'b'")
            .unwrap();
    }

    assert!(dir.path().join("ledger.json").exists());

    let catalog = Catalog::new(config(&dir));
    assert_eq!(catalog.database_state("ledger"), None);

    let schema = catalog.table_schema("ledger", "transactions").unwrap();
    assert_eq!(catalog.database_state("ledger"), Some(DatabaseState::Ready));
    assert_eq!(
        schema.column_names(),
        vec!["id", "amount", "category_id", "note"]
    );
    assert_eq!(schema.primary_key().name, "id");
    let fk = schema.column("category_id").and_then(|c| c.references.clone()).unwrap();
    assert_eq!((fk.table.as_str(), fk.column.as_str()), ("categories", "id"));
    assert!(schema.find_index("idx_cat").is_some());

    assert_eq!(
        rows(&catalog, "ledger", "SELECT id, note FROM transactions WHERE category_id = 1"),
        vec![
            vec![Value::Text("a".into()), Value::Text("{\"sms\": \"ok\"}".into())],
            vec![Value::Text("c".into()), Value::Text("{\"sms\": \"ok\"}".into())],
        ]
    );
    assert!(rows(&catalog, "ledger", "SELECT * FROM transactions WHERE id = 'b'").is_empty());
    assert_eq!(
        rows(&catalog, "ledger", "SELECT name FROM categories WHERE id = 1"),
        vec![vec![Value::Text("food".into())]]
    );

    // New writes after reload keep the rebuilt index consistent
    catalog
        .execute(
            "ledger",
            "INSERT INTO transactions (id, amount, category_id, note) VALUES ('d', 5, 1, NULL)",
        )
        .unwrap();
    assert_eq!(
        rows(&catalog, "ledger", "SELECT COUNT(*) AS n FROM transactions WHERE category_id = 1"),
        vec![vec![Value::Integer(3)]]
    );
}

#[test]
fn databases_are_isolated_files() {
    let dir = TempDir::new().unwrap();
    let catalog = Catalog::new(config(&dir));

    catalog
        .execute("alpha", "CREATE TABLE t (id INT PRIMARY KEY)")
        .unwrap();
    catalog
        .execute("beta", "CREATE TABLE t (id INT PRIMARY KEY)")
        .unwrap();
    catalog
        .execute("alpha", "INSERT INTO t (id) VALUES (1)")
        .unwrap();

    assert_eq!(rows(&catalog, "alpha", "SELECT * FROM t").len(), 1);
    assert!(rows(&catalog, "beta", "SELECT * FROM t").is_empty());
    assert_eq!(catalog.list_databases(), vec!["alpha", "beta"]);
    assert!(dir.path().join("alpha.json").exists());
    assert!(dir.path().join("beta.json").exists());
}

#[test]
fn failed_statement_does_not_touch_snapshot() {
    let dir = TempDir::new().unwrap();
    let catalog = Catalog::new(config(&dir));
    catalog
        .execute("pesa", "CREATE TABLE t (id INT PRIMARY KEY)")
        .unwrap();
    let path = dir.path().join("pesa.json");
    let before = std::fs::read_to_string(&path).unwrap();

    assert!(catalog.execute("pesa", "INSERT INTO t (id) VALUES ('x')").is_err());
    assert!(catalog.execute("pesa", "DROP TABLE missing").is_err());

    assert_eq!(std::fs::read_to_string(&path).unwrap(), before);
    assert_eq!(catalog.flush_all().unwrap(), 0);
}

#[test]
fn stale_temp_file_does_not_shadow_snapshot() {
    let dir = TempDir::new().unwrap();
    {
        let catalog = Catalog::new(config(&dir));
        catalog
            .execute("pesa", "CREATE TABLE users (id STRING PRIMARY KEY, pin_hash STRING)")
            .unwrap();
        catalog
            .execute("pesa", "INSERT INTO users (id, pin_hash) VALUES ('u1', 'abc')")
            .unwrap();
    }

    // A write interrupted before its rename leaves a truncated temp file behind
    let tmp = dir.path().join("pesa.json.tmp");
    std::fs::write(&tmp, "{\"tables\": {\"users\": {\"columns\": [").unwrap();

    let catalog = Catalog::new(config(&dir));
    assert_eq!(
        rows(&catalog, "pesa", "SELECT * FROM users"),
        vec![vec![Value::Text("u1".into()), Value::Text("abc".into())]]
    );

    // The next write replaces the stale temp file and leaves none behind
    catalog
        .execute("pesa", "INSERT INTO users (id, pin_hash) VALUES ('u2', 'def')")
        .unwrap();
    assert!(!tmp.exists());

    let reloaded = Catalog::new(config(&dir));
    assert_eq!(rows(&reloaded, "pesa", "SELECT id FROM users").len(), 2);
}
