pub mod auth;
pub mod codes;
pub mod responses;
pub mod router;
pub mod staff;
pub mod state;
pub mod student;
pub mod templates;

pub use auth::{Account, Role, SESSION_COOKIE, SESSION_TTL_DAYS};
pub use responses::{ApiMessage, is_ajax, json_error};
pub use state::AppState;
pub use templates::escape_html;
