pub mod client;
pub mod page;

pub use client::{ClientSettings, HttpClient};
pub use page::{Listing, Page};
