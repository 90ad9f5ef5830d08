pub mod handlers;
pub mod images;
pub mod routes;

pub use routes::routes;
