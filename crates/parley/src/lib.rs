pub mod adapter;
pub mod chat;
pub mod context;
pub mod errors;
pub mod knowledge;
pub mod memory;
pub mod models;
pub mod providers;
pub mod render;
pub mod render_loop;
pub mod steps;
pub mod surface;
