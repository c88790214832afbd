pub mod client;
pub mod config;
mod feed;
mod record;

pub static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("../migrations");
