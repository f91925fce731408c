pub mod config;
pub mod logger;
pub mod server;
pub mod text_utils;
pub mod record;
pub mod meta;
pub mod optimistic;
pub mod persistence;
pub mod board;
pub mod moderation;
pub mod cards;
pub mod editor;
mod query_string;
mod view;
mod test_data;
