/// Current schema version, tracked in `PRAGMA user_version`
pub const SCHEMA_VERSION: i32 = 2;

/// Version 1: the orders collection and its query indexes.
///
/// Timestamps are integers so range queries on `order_date` compare
/// numerically.
pub const SCHEMA_V1: &str = r#"
CREATE TABLE IF NOT EXISTS orders (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    order_date INTEGER NOT NULL,
    products TEXT NOT NULL,
    buyer_name TEXT NOT NULL,
    platform TEXT NOT NULL,
    courier TEXT NOT NULL,
    status TEXT NOT NULL DEFAULT 'pending'
        CHECK (status IN ('pending', 'completed', 'cancelled')),
    created_at INTEGER NOT NULL,
    updated_at INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_orders_order_date ON orders(order_date);
CREATE INDEX IF NOT EXISTS idx_orders_buyer_name ON orders(buyer_name);
CREATE INDEX IF NOT EXISTS idx_orders_platform ON orders(platform);
CREATE INDEX IF NOT EXISTS idx_orders_courier ON orders(courier);
CREATE INDEX IF NOT EXISTS idx_orders_status ON orders(status);
"#;

/// Version 2: timestamps move from Unix milliseconds to nanoseconds so they
/// round-trip at full precision.
pub const SCHEMA_V2: &str = r#"
UPDATE orders SET
    order_date = order_date * 1000000,
    created_at = created_at * 1000000,
    updated_at = updated_at * 1000000;
"#;
