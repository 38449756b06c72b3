pub mod reddit;
pub mod rss;
