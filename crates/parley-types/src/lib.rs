pub mod api;
pub mod element;
pub mod models;
