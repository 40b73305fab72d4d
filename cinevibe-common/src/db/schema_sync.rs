//! Declarative schema self-healing
//!
//! Each table declares the columns it must have ([`TableSchema`]). On startup
//! the live table is read with `PRAGMA table_info`, compared to the
//! declaration, and every missing column is added with
//! `ALTER TABLE ... ADD COLUMN`. Type and constraint drift is only reported:
//! SQLite cannot change either without rebuilding the table.
//!
//! Startup order:
//! 1. `CREATE TABLE IF NOT EXISTS` for every table (`init.rs`)
//! 2. Column sync (this module)
//! 3. Seed data (`seed.rs`)
//!
//! ```rust,ignore
//! pub struct WatchlistTableSchema;
//!
//! impl TableSchema for WatchlistTableSchema {
//!     fn table_name() -> &'static str { "watchlist" }
//!
//!     fn expected_columns() -> Vec<ColumnDefinition> {
//!         vec![
//!             ColumnDefinition::new("id", "INTEGER").primary_key(),
//!             ColumnDefinition::new("user_id", "INTEGER").not_null(),
//!             ColumnDefinition::new("note", "TEXT"), // added on next startup
//!         ]
//!     }
//! }
//!
//! SchemaSync::sync_table::<WatchlistTableSchema>(&pool).await?;
//! ```

use crate::Result;
use sqlx::{Row, SqlitePool};
use tracing::{debug, info, warn};

/// Column definition with SQL constraints
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnDefinition {
    pub name: String,
    /// SQL type (`TEXT`, `INTEGER`, `REAL`, `TIMESTAMP`)
    pub sql_type: String,
    pub not_null: bool,
    pub primary_key: bool,
    pub unique: bool,
    /// DEFAULT clause as SQL text (`'USER'`, `0`, `CURRENT_TIMESTAMP`)
    pub default_value: Option<String>,
}

impl ColumnDefinition {
    pub fn new(name: impl Into<String>, sql_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            sql_type: sql_type.into(),
            not_null: false,
            primary_key: false,
            unique: false,
            default_value: None,
        }
    }

    pub fn primary_key(mut self) -> Self {
        self.primary_key = true;
        self
    }

    pub fn not_null(mut self) -> Self {
        self.not_null = true;
        self
    }

    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    pub fn default(mut self, value: impl Into<String>) -> Self {
        self.default_value = Some(value.into());
        self
    }

    /// Column clause usable in `ALTER TABLE ADD COLUMN`
    ///
    /// SQLite rejects PRIMARY KEY and UNIQUE there, and NOT NULL needs a
    /// default, so those are dropped (with a warning) when they cannot apply.
    fn add_column_clause(&self, table: &str) -> String {
        let mut sql = format!("{} {}", self.name, self.sql_type);

        if self.primary_key {
            warn!(
                "  ⚠ {}.{} declared PRIMARY KEY; added without it (requires table rebuild)",
                table, self.name
            );
        }
        if self.unique {
            warn!(
                "  ⚠ {}.{} declared UNIQUE; added without it (requires table rebuild)",
                table, self.name
            );
        }

        if self.backfill_expression().is_some() {
            // ALTER TABLE only accepts constant defaults; the caller backfills
            return sql;
        }

        match (&self.default_value, self.not_null) {
            (Some(default), true) => sql.push_str(&format!(" NOT NULL DEFAULT {}", default)),
            (Some(default), false) => sql.push_str(&format!(" DEFAULT {}", default)),
            (None, true) => warn!(
                "  ⚠ {}.{} declared NOT NULL without DEFAULT; added as nullable",
                table, self.name
            ),
            (None, false) => {}
        }

        sql
    }

    /// Non-constant DEFAULT (e.g. `CURRENT_TIMESTAMP`) that must be applied
    /// to existing rows with an UPDATE after the column is added
    fn backfill_expression(&self) -> Option<&str> {
        let default = self.default_value.as_deref()?;
        let constant = default.starts_with('\'')
            || default.eq_ignore_ascii_case("NULL")
            || default.parse::<f64>().is_ok();
        (!constant).then_some(default)
    }
}

/// Column as reported by `PRAGMA table_info`
#[derive(Debug, Clone)]
pub struct ActualColumn {
    pub cid: i32,
    pub name: String,
    pub type_name: String,
    pub not_null: bool,
    pub default_value: Option<String>,
    pub pk: bool,
}

/// Difference between the declared and the live schema
#[derive(Debug, Clone)]
pub enum SchemaDrift {
    /// Column missing from database (fixable)
    MissingColumn {
        table: String,
        column: ColumnDefinition,
    },
    /// Column type differs in affinity (reported only)
    TypeMismatch {
        table: String,
        column: String,
        expected: String,
        actual: String,
    },
    /// NOT NULL / PRIMARY KEY missing on an existing column (reported only)
    ConstraintMismatch {
        table: String,
        column: String,
        constraint: String,
    },
}

/// Expected schema of one table
pub trait TableSchema {
    fn table_name() -> &'static str;

    fn expected_columns() -> Vec<ColumnDefinition>;

    /// Hook run after the columns were synced
    fn validate_schema(_pool: &SqlitePool) -> Result<()> {
        Ok(())
    }
}

/// Reads the live schema
pub struct SchemaIntrospector;

impl SchemaIntrospector {
    /// Columns of `table_name` ordered by position
    pub async fn introspect_table(pool: &SqlitePool, table_name: &str) -> Result<Vec<ActualColumn>> {
        let query = format!("PRAGMA table_info({})", table_name);
        let rows = sqlx::query(&query).fetch_all(pool).await?;

        let mut columns: Vec<ActualColumn> = rows
            .iter()
            .map(|row| ActualColumn {
                cid: row.get("cid"),
                name: row.get("name"),
                type_name: row.get("type"),
                not_null: row.get::<i32, _>("notnull") != 0,
                default_value: row.get("dflt_value"),
                pk: row.get::<i32, _>("pk") != 0,
            })
            .collect();

        columns.sort_by_key(|c| c.cid);
        Ok(columns)
    }

    pub async fn table_exists(pool: &SqlitePool, table_name: &str) -> Result<bool> {
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = ?)",
        )
        .bind(table_name)
        .fetch_one(pool)
        .await?;

        Ok(exists)
    }
}

/// Compares declared and live columns
pub struct SchemaDiff;

impl SchemaDiff {
    pub fn compare(
        table_name: &str,
        expected: &[ColumnDefinition],
        actual: &[ActualColumn],
    ) -> Vec<SchemaDrift> {
        let mut drift = Vec::new();

        for expected_col in expected {
            let Some(actual_col) = actual
                .iter()
                .find(|c| c.name.eq_ignore_ascii_case(&expected_col.name))
            else {
                drift.push(SchemaDrift::MissingColumn {
                    table: table_name.to_string(),
                    column: expected_col.clone(),
                });
                continue;
            };

            if !Self::types_compatible(&expected_col.sql_type, &actual_col.type_name) {
                drift.push(SchemaDrift::TypeMismatch {
                    table: table_name.to_string(),
                    column: expected_col.name.clone(),
                    expected: expected_col.sql_type.clone(),
                    actual: actual_col.type_name.clone(),
                });
            }

            if expected_col.not_null && !actual_col.not_null && !actual_col.pk {
                drift.push(SchemaDrift::ConstraintMismatch {
                    table: table_name.to_string(),
                    column: expected_col.name.clone(),
                    constraint: "NOT NULL".to_string(),
                });
            }

            if expected_col.primary_key && !actual_col.pk {
                drift.push(SchemaDrift::ConstraintMismatch {
                    table: table_name.to_string(),
                    column: expected_col.name.clone(),
                    constraint: "PRIMARY KEY".to_string(),
                });
            }
        }

        drift
    }

    /// SQLite affinity comparison
    ///
    /// TIMESTAMP columns have NUMERIC affinity but hold ISO strings here, so
    /// they are treated as compatible with the text family.
    fn types_compatible(expected: &str, actual: &str) -> bool {
        let exp = Self::affinity(expected);
        let act = Self::affinity(actual);
        exp == act
    }

    fn affinity(sql_type: &str) -> &'static str {
        let t = sql_type.to_uppercase();
        if t.contains("INT") {
            "INTEGER"
        } else if t.contains("CHAR") || t.contains("CLOB") || t.contains("TEXT") || t.contains("JSON") {
            "TEXT"
        } else if t.contains("TIMESTAMP") || t.contains("DATE") {
            "TEXT"
        } else if t.contains("REAL") || t.contains("FLOA") || t.contains("DOUB") {
            "REAL"
        } else if t.is_empty() || t.contains("BLOB") {
            "BLOB"
        } else {
            "NUMERIC"
        }
    }
}

/// Applies missing columns
pub struct SchemaSync;

impl SchemaSync {
    /// Detect drift for `T` and add missing columns
    ///
    /// Returns how many columns were added.
    pub async fn sync_table<T: TableSchema>(pool: &SqlitePool) -> Result<usize> {
        let table_name = T::table_name();
        debug!("Schema sync: checking table '{}'", table_name);

        if !SchemaIntrospector::table_exists(pool, table_name).await? {
            warn!(
                "  Table '{}' does not exist, it must be created before column sync",
                table_name
            );
            return Ok(0);
        }

        let actual = SchemaIntrospector::introspect_table(pool, table_name).await?;
        let drift = SchemaDiff::compare(table_name, &T::expected_columns(), &actual);

        let mut added = 0;
        for change in drift {
            match change {
                SchemaDrift::MissingColumn { table, column } => {
                    Self::add_column(pool, &table, &column).await?;
                    added += 1;
                }
                SchemaDrift::TypeMismatch { table, column, expected, actual } => {
                    warn!(
                        "  ⚠ Type mismatch in {}.{}: expected '{}', found '{}'",
                        table, column, expected, actual
                    );
                }
                SchemaDrift::ConstraintMismatch { table, column, constraint } => {
                    warn!("  ⚠ {}.{} is missing constraint '{}'", table, column, constraint);
                }
            }
        }

        if added > 0 {
            info!("  ✓ Added {} column(s) to '{}'", added, table_name);
        }

        T::validate_schema(pool)?;
        Ok(added)
    }

    async fn add_column(pool: &SqlitePool, table: &str, column: &ColumnDefinition) -> Result<()> {
        let sql = format!("ALTER TABLE {} ADD COLUMN {}", table, column.add_column_clause(table));
        info!("  ✓ Adding column: {}.{} ({})", table, column.name, column.sql_type);

        match sqlx::query(&sql).execute(pool).await {
            Ok(_) => {
                if let Some(expr) = column.backfill_expression() {
                    let backfill = format!(
                        "UPDATE {} SET {} = {} WHERE {} IS NULL",
                        table, column.name, expr, column.name
                    );
                    sqlx::query(&backfill).execute(pool).await?;
                }
                Ok(())
            }
            Err(sqlx::Error::Database(db_err)) if db_err.message().contains("duplicate column") => {
                // Another connection got there first
                debug!("  Column {}.{} already present", table, column.name);
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::sqlite::SqlitePoolOptions;

    async fn setup_test_db() -> SqlitePool {
        SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap()
    }

    struct RatingsSchema;

    impl TableSchema for RatingsSchema {
        fn table_name() -> &'static str {
            "ratings"
        }

        fn expected_columns() -> Vec<ColumnDefinition> {
            vec![
                ColumnDefinition::new("id", "INTEGER").primary_key(),
                ColumnDefinition::new("score", "REAL").not_null().default("0"),
                ColumnDefinition::new("label", "TEXT").default("'n/a'"),
                ColumnDefinition::new("slug", "TEXT").unique(),
            ]
        }
    }

    #[test]
    fn test_column_definition_builder() {
        let col = ColumnDefinition::new("role", "TEXT")
            .not_null()
            .unique()
            .default("'USER'");

        assert_eq!(col.name, "role");
        assert!(col.not_null);
        assert!(col.unique);
        assert_eq!(col.default_value.as_deref(), Some("'USER'"));
    }

    #[test]
    fn test_add_column_clause_drops_unsupported_constraints() {
        let col = ColumnDefinition::new("slug", "TEXT").unique().not_null();
        assert_eq!(col.add_column_clause("t"), "slug TEXT");

        let col = ColumnDefinition::new("score", "REAL").not_null().default("0");
        assert_eq!(col.add_column_clause("t"), "score REAL NOT NULL DEFAULT 0");

        let col = ColumnDefinition::new("created_at", "TIMESTAMP")
            .not_null()
            .default("CURRENT_TIMESTAMP");
        assert_eq!(col.add_column_clause("t"), "created_at TIMESTAMP");
        assert_eq!(col.backfill_expression(), Some("CURRENT_TIMESTAMP"));
    }

    #[test]
    fn test_types_compatible() {
        assert!(SchemaDiff::types_compatible("TEXT", "text"));
        assert!(SchemaDiff::types_compatible("INTEGER", "INT"));
        assert!(SchemaDiff::types_compatible("TEXT", "VARCHAR(255)"));
        assert!(SchemaDiff::types_compatible("REAL", "DOUBLE"));
        assert!(SchemaDiff::types_compatible("TIMESTAMP", "DATETIME"));
        assert!(SchemaDiff::types_compatible("TEXT", "TIMESTAMP"));

        assert!(!SchemaDiff::types_compatible("TEXT", "INTEGER"));
        assert!(!SchemaDiff::types_compatible("REAL", "TEXT"));
    }

    #[tokio::test]
    async fn test_introspect_table() {
        let pool = setup_test_db().await;
        sqlx::query("CREATE TABLE t (id INTEGER PRIMARY KEY, name TEXT NOT NULL, value REAL)")
            .execute(&pool)
            .await
            .unwrap();

        let columns = SchemaIntrospector::introspect_table(&pool, "t").await.unwrap();

        assert_eq!(columns.len(), 3);
        assert!(columns[0].pk);
        assert_eq!(columns[1].name, "name");
        assert!(columns[1].not_null);
        assert_eq!(columns[2].type_name, "REAL");
    }

    #[tokio::test]
    async fn test_detect_missing_and_mismatched_columns() {
        let pool = setup_test_db().await;
        sqlx::query("CREATE TABLE ratings (id INTEGER PRIMARY KEY, score TEXT)")
            .execute(&pool)
            .await
            .unwrap();

        let actual = SchemaIntrospector::introspect_table(&pool, "ratings").await.unwrap();
        let drift = SchemaDiff::compare("ratings", &RatingsSchema::expected_columns(), &actual);

        let missing: Vec<&str> = drift
            .iter()
            .filter_map(|d| match d {
                SchemaDrift::MissingColumn { column, .. } => Some(column.name.as_str()),
                _ => None,
            })
            .collect();
        assert_eq!(missing, vec!["label", "slug"]);

        assert!(drift.iter().any(|d| matches!(
            d,
            SchemaDrift::TypeMismatch { column, .. } if column == "score"
        )));
    }

    #[tokio::test]
    async fn test_sync_adds_columns_and_is_idempotent() {
        let pool = setup_test_db().await;
        sqlx::query("CREATE TABLE ratings (id INTEGER PRIMARY KEY)")
            .execute(&pool)
            .await
            .unwrap();
        sqlx::query("INSERT INTO ratings (id) VALUES (1)")
            .execute(&pool)
            .await
            .unwrap();

        let added = SchemaSync::sync_table::<RatingsSchema>(&pool).await.unwrap();
        assert_eq!(added, 3);

        let added_again = SchemaSync::sync_table::<RatingsSchema>(&pool).await.unwrap();
        assert_eq!(added_again, 0);

        // Existing row picks up the declared defaults
        let (score, label): (f64, String) =
            sqlx::query_as("SELECT score, label FROM ratings WHERE id = 1")
                .fetch_one(&pool)
                .await
                .unwrap();
        assert_eq!(score, 0.0);
        assert_eq!(label, "n/a");
    }

    #[tokio::test]
    async fn test_sync_skips_missing_table() {
        let pool = setup_test_db().await;
        let added = SchemaSync::sync_table::<RatingsSchema>(&pool).await.unwrap();
        assert_eq!(added, 0);
        assert!(!SchemaIntrospector::table_exists(&pool, "ratings").await.unwrap());
    }
}
