//! User-facing messages returned by the API.
//!
//! Field validation messages live next to the request types that use them.

pub const VALIDATION_FAILED: &str = "Request validation failed";
pub const INVALID_ID: &str = "Invalid id";
pub const STORAGE_ERROR: &str = "The request could not be completed";
pub const TOO_MANY_REQUESTS: &str = "Too many requests. Please try again later.";

pub const EMAIL_TAKEN: &str = "An account with this email already exists";
pub const SIGNUP_DISABLED: &str = "Registration is disabled";
pub const INVALID_CREDENTIALS: &str = "Wrong email or password";
pub const ACCOUNT_NOT_FOUND: &str = "Account not found";
pub const REFRESH_TOKEN_REQUIRED: &str = "Refresh token is required";
pub const REFRESH_TOKEN_NOT_FOUND: &str = "Refresh token not found";

pub const ARTICLE_NOT_FOUND: &str = "Article not found";
pub const UNKNOWN_CATEGORY: &str = "Unknown category";
pub const DATE_FORMAT: &str = "Enter the date in ISO 8601 format";

pub const CATEGORY_TAKEN: &str = "A category with this title already exists";

pub const COMMENT_NOT_FOUND: &str = "Comment not found";
pub const UNKNOWN_ARTICLE: &str = "Article does not exist";
