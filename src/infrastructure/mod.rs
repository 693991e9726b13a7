pub mod gateway;
pub mod models;
pub mod order_repo;
pub mod session_store;
