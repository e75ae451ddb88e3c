pub const NAME_MAX_LENGTH: usize = 200;
pub const USER_NAME_MAX_LENGTH: usize = 150;
pub const EMAIL_MAX_LENGTH: usize = 254;
pub const COLOR_MAX_LENGTH: usize = 7;

pub const PASSWORD_MIN_LENGTH: usize = 8;

pub const HEX_COLOR_PATTERN: &str = r"^#(?:[0-9a-fA-F]{3}){1,2}$";
pub const SLUG_PATTERN: &str = r"^[-a-zA-Z0-9_]+$";
pub const USERNAME_PATTERN: &str = r"^[\w.@+-]+$";
pub const EMAIL_PATTERN: &str = r"^[^@\s]+@[^@\s]+\.[^@\s]+$";

pub const TOKEN_KEYWORDS: &[&str] = &["Token", "Bearer"];

pub const SHOPPING_LIST_FILENAME: &str = "shopping_list.txt";

/// Upper bound for JSON request bodies; recipe images arrive inline.
pub const MAX_BODY_SIZE: u64 = 1024 * 1024 * 16;
