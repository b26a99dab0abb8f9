pub mod app;
pub mod auth;
pub mod config;
pub mod cookie;
pub mod csrf;
pub mod exception;
pub mod forms;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod param;
pub mod recover;
pub mod request;
pub mod response;
pub mod router;
pub mod routes;
pub mod server;
pub mod session;
pub mod store;
pub mod templates;
pub mod tls;
pub mod util;
pub mod validator;

pub use app::Application;
pub use config::Config;
pub use exception::Exception;
pub use middleware::{BoxHandler, Chain, Handler, Layer, Next};
pub use param::{HttpEncoding, HttpRequestMethod, HttpVersion};
pub use request::Request;
pub use response::Response;
pub use util::HtmlBuilder;
