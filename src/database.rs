use anyhow::{Context, Result};
use libsql::{Builder, Connection};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::sync::{OnceCell, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::config::DatabaseConfig;
use crate::constants::*;

const CREATE_ADMIN_USERS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS admin_users (
    id             TEXT    PRIMARY KEY,
    username       TEXT    UNIQUE NOT NULL,
    password_hash  TEXT    NOT NULL,
    created_at     TEXT    NOT NULL DEFAULT CURRENT_TIMESTAMP
);
"#;

const CREATE_WAREHOUSES_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS warehouses (
    id        TEXT    PRIMARY KEY,
    name      TEXT    UNIQUE NOT NULL,
    location  TEXT    NOT NULL DEFAULT ''
);
"#;

const CREATE_PRODUCTS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS products (
    id            TEXT    PRIMARY KEY,
    sku           TEXT    UNIQUE NOT NULL,
    name          TEXT    NOT NULL,
    description   TEXT    NOT NULL DEFAULT '',
    price_cents   INTEGER NOT NULL CHECK (price_cents >= 0),
    ebay_item_id  TEXT,
    created_at    TEXT    NOT NULL DEFAULT CURRENT_TIMESTAMP
);
"#;

const CREATE_PRODUCT_STOCK_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS product_stock (
    product_id    TEXT    NOT NULL,
    warehouse_id  TEXT    NOT NULL,
    quantity      INTEGER NOT NULL DEFAULT 0 CHECK (quantity >= 0),
    PRIMARY KEY (product_id, warehouse_id),
    FOREIGN KEY (product_id) REFERENCES products(id) ON DELETE CASCADE,
    FOREIGN KEY (warehouse_id) REFERENCES warehouses(id) ON DELETE CASCADE
);
"#;

const CREATE_ORDERS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS orders (
    id              TEXT    PRIMARY KEY,
    customer_email  TEXT    NOT NULL,
    status          TEXT    NOT NULL DEFAULT 'pending',
    total_cents     INTEGER NOT NULL CHECK (total_cents >= 0),
    coupon_code     TEXT,
    created_at      TEXT    NOT NULL DEFAULT CURRENT_TIMESTAMP,
    FOREIGN KEY (coupon_code) REFERENCES coupons(code)
);
"#;

const CREATE_ORDER_ITEMS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS order_items (
    id                TEXT    PRIMARY KEY,
    order_id          TEXT    NOT NULL,
    product_id        TEXT    NOT NULL,
    quantity          INTEGER NOT NULL CHECK (quantity > 0),
    unit_price_cents  INTEGER NOT NULL CHECK (unit_price_cents >= 0),
    FOREIGN KEY (order_id) REFERENCES orders(id) ON DELETE CASCADE,
    FOREIGN KEY (product_id) REFERENCES products(id)
);
"#;

const CREATE_COUPONS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS coupons (
    code              TEXT    PRIMARY KEY,
    discount_percent  INTEGER NOT NULL CHECK (discount_percent BETWEEN 1 AND 100),
    active            BOOLEAN NOT NULL DEFAULT TRUE,
    expires_at        TEXT
);
"#;

const CREATE_SETTINGS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS settings (
    key    TEXT    PRIMARY KEY,
    value  TEXT    NOT NULL
);
"#;

const CREATE_ORDER_ITEMS_INDEX: &str = r#"
CREATE INDEX IF NOT EXISTS idx_order_items_order_id ON order_items(order_id);
"#;

const CREATE_PRODUCTS_EBAY_INDEX: &str = r#"
CREATE INDEX IF NOT EXISTS idx_products_ebay_item_id ON products(ebay_item_id);
"#;

// Referenced tables come first.
const SCHEMA: [&str; 10] = [
    CREATE_ADMIN_USERS_TABLE,
    CREATE_WAREHOUSES_TABLE,
    CREATE_PRODUCTS_TABLE,
    CREATE_PRODUCT_STOCK_TABLE,
    CREATE_COUPONS_TABLE,
    CREATE_ORDERS_TABLE,
    CREATE_ORDER_ITEMS_TABLE,
    CREATE_SETTINGS_TABLE,
    CREATE_ORDER_ITEMS_INDEX,
    CREATE_PRODUCTS_EBAY_INDEX,
];

/// Callers only ever see this; the underlying cause goes to the server log.
#[derive(Debug, Error)]
pub enum DatabaseError {
    #[error("{}", ERR_DATABASE_UNAVAILABLE)]
    Unavailable,
}

/// The storefront's one live connection.
///
/// Neither `Clone` nor `Deserialize`. The only way to get one is
/// [`ConnectionManager::instance`], which hands out shared references.
pub struct Database {
    path: PathBuf,
    conn: RwLock<Connection>,
}

impl Database {
    async fn open(path: &Path) -> Result<Self, DatabaseError> {
        Self::try_open(path).await.map_err(|e| {
            tracing::error!(path = %path.display(), error = %format!("{e:#}"), "failed to open database");
            DatabaseError::Unavailable
        })
    }

    async fn try_open(path: &Path) -> Result<Self> {
        if let Some(dir) = path.parent().filter(|dir| !dir.as_os_str().is_empty()) {
            ensure_directory(dir).await?;
        }

        let db = Builder::new_local(path)
            .build()
            .await
            .with_context(|| format!("opening {}", path.display()))?;
        let conn = db.connect().context("connecting")?;

        conn.execute("PRAGMA foreign_keys = ON", ())
            .await
            .context("enabling foreign keys")?;

        for statement in SCHEMA {
            conn.execute(statement, ())
                .await
                .context("creating schema")?;
        }

        tracing::info!(path = %path.display(), "database opened");

        Ok(Self {
            path: path.to_path_buf(),
            conn: RwLock::new(conn),
        })
    }

    pub async fn read(&self) -> RwLockReadGuard<'_, Connection> {
        self.conn.read().await
    }

    pub async fn write(&self) -> RwLockWriteGuard<'_, Connection> {
        self.conn.write().await
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

async fn ensure_directory(dir: &Path) -> Result<()> {
    if let Ok(meta) = tokio::fs::metadata(dir).await {
        if meta.is_dir() {
            return Ok(());
        }
    }

    tokio::fs::create_dir_all(dir)
        .await
        .with_context(|| format!("creating directory {}", dir.display()))?;

    // Set explicitly so the result does not depend on the process umask.
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        tokio::fs::set_permissions(dir, std::fs::Permissions::from_mode(DATABASE_DIR_MODE))
            .await
            .with_context(|| format!("setting permissions on {}", dir.display()))?;
    }

    Ok(())
}

/// Lazily opens the database on first use and hands the same handle to every
/// caller afterwards. Concurrent first calls wait on a single construction.
pub struct ConnectionManager {
    path: PathBuf,
    instance: OnceCell<Database>,
}

impl ConnectionManager {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            instance: OnceCell::new(),
        }
    }

    pub fn from_config(config: &DatabaseConfig) -> Self {
        Self::new(config.path.clone())
    }

    /// Returns the shared connection, opening it on the first call.
    ///
    /// A failed open leaves the manager empty, so a later call tries again.
    pub async fn instance(&self) -> Result<&Database, DatabaseError> {
        self.instance
            .get_or_try_init(|| Database::open(&self.path))
            .await
    }

    pub fn is_initialized(&self) -> bool {
        self.instance.initialized()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}
