pub const JSON_BODY_LIMIT: u64 = 1024 * 16;

pub const NAME_MAX_LENGTH: usize = 255;
pub const TITLE_MAX_LENGTH: usize = 255;
pub const LINK_MAX_LENGTH: usize = 255;
pub const PASSWORD_MIN_LENGTH: usize = 5;

/// Largest value a `NUMERIC(5, 2)` price column accepts, in cents.
pub const PRICE_MAX_CENTS: i64 = 99_999;
pub const PRICE_DECIMAL_PLACES: u32 = 2;

pub const RECIPE_IMAGE_DIR: &str = "uploads/recipe";
pub const RECIPE_IMAGE_FIELD: &str = "image";
pub const MEDIA_URL_PREFIX: &str = "media";

pub const ASSIGNED_ONLY_PARAM: &str = "assigned_only";
pub const TAG_FILTER_PARAM: &str = "tag";
pub const INGREDIENT_FILTER_PARAM: &str = "ingredient";
