pub mod analytics;
pub mod answers;
pub mod config;
pub mod error;
pub mod flow;
pub mod handlers;
pub mod paths;
pub mod routes;
pub mod services;
pub mod session;
pub mod state;
pub mod uploads;
pub mod validation;

#[cfg(test)]
pub mod testing;
