pub mod auth_handlers;
pub mod digest_handlers;
pub mod inbound_handlers;
pub mod post_handlers;
pub mod settings_handlers;

pub use auth_handlers::{send_link_handler, signup_handler, verify_link_handler};
pub use digest_handlers::{
    digest_status, generate_digest_handler, list_digests_handler, send_digests_handler,
};
pub use inbound_handlers::{inbound_status, receive_inbound};
pub use post_handlers::list_posts_handler;
pub use settings_handlers::{get_settings_handler, update_settings_handler};

use axum::response::Json;
use serde_json::{json, Value};

pub async fn health_check() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}
