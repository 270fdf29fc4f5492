pub mod auth;
pub mod health;
pub mod root;

pub use auth::login_post;
pub use health::health_get;
pub use root::root_get;
