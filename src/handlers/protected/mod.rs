// Protected handlers: bearer token required (see middleware::auth), scope
// checked per route
pub mod resources;
