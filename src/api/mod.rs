pub mod client;
pub mod models;
pub mod notice;

pub use client::ApiClient;
pub use notice::Notice;
