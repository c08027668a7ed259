// Server configuration
pub const DEFAULT_HOST: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 3000;
pub const DEFAULT_CONFIG_PATH: &str = "config/default.toml";
pub const DEFAULT_DATABASE_PATH: &str = "data/flipnstrip.db";

// Session configuration
pub const SESSION_NAME: &str = "flipnstrip_session";
pub const SESSION_EXPIRY_DAYS: i64 = 30;
pub const MAX_SESSION_EXPIRY_DAYS: i64 = 3650;
pub const MIN_SESSION_SECRET_LENGTH: usize = 64;

// Session keys
pub const SESSION_KEY_CSRF_TOKEN: &str = "csrf_token";
pub const SESSION_KEY_ADMIN_USERNAME: &str = "admin_username";
pub const SESSION_KEY_ADMIN_ID: &str = "admin_id";

// CSRF protection
pub const CSRF_FIELD_NAME: &str = "csrf_token";
pub const CSRF_TOKEN_BYTES: usize = 32;
pub const CSRF_ERROR_BODY: &str = "Invalid CSRF token";
pub const MAX_FORM_BODY_BYTES: usize = 64 * 1024;

// eBay sync log
pub const DEFAULT_SYNC_LOG_PATH: &str = "logs/ebay_sync.log";
pub const SYNC_LOG_BANNER: &str =
    "================================================================================";
pub const MAX_LOGGED_RESPONSE_CHARS: usize = 2000;
pub const SYNC_LOG_TAIL_LINES: usize = 200;
pub const SYNC_LOG_TAIL_CHUNK_BYTES: u64 = 8 * 1024;
pub const SYNC_LOG_TAIL_MAX_BYTES: u64 = 1024 * 1024;

// Database directory permissions (owner rwx, group/other rx)
pub const DATABASE_DIR_MODE: u32 = 0o755;

// Validation limits
pub const MAX_USERNAME_LENGTH: usize = 50;
pub const MIN_USERNAME_LENGTH: usize = 4;
pub const MIN_PASSWORD_LENGTH: usize = 8;

// PayPal modes
pub const PAYPAL_MODE_SANDBOX: &str = "sandbox";
pub const PAYPAL_MODE_LIVE: &str = "live";

// Error messages
pub const ERR_DATABASE_UNAVAILABLE: &str = "Database connection failed";
pub const ERR_DATABASE_OPERATION: &str = "Database operation failed";
pub const ERR_INVALID_SESSION: &str = "Invalid session";
pub const ERR_UNAUTHORIZED: &str = "Not logged in";
pub const ERR_INVALID_CREDENTIALS: &str = "Invalid username or password";
