mod handlers;
mod routes;

pub use routes::create_redirect_router;
