pub mod auth;

pub use auth::{authenticated, guarded, issue_token, logout_cookie, protect, restrict_to, token_cookie, Claims, CurrentUser};
