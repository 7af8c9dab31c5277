/// Smallest accepted `cooking_time`, in minutes. The boundary value itself
/// is valid.
pub const MIN_RECIPE_COOKING_TIME: i32 = 1;

/// Smallest accepted ingredient amount within a recipe line.
pub const MIN_INGREDIENTS_AMOUNT: i32 = 1;

pub const RECIPE_COUNT_PER_PAGE: i64 = 6;
pub const USER_COUNT_PER_PAGE: i64 = 6;

pub const MAX_NAME_LENGTH: usize = 200;
pub const MAX_USERNAME_LENGTH: usize = 150;
pub const MAX_EMAIL_LENGTH: usize = 254;

/// Usernames that collide with routing (`/users/me`) or the `author=me`
/// recipe filter.
pub const RESERVED_USERNAMES: &[&str] = &["me"];

pub const SHOPPING_LIST_FILENAME: &str = "shopping_list.pdf";
pub const PDF_CONTENT_TYPE: &str = "application/pdf";
