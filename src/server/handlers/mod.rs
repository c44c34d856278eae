pub mod chat;
pub mod documents;
pub mod health;
mod utils;
