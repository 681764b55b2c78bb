pub mod client;
pub mod types;

pub use client::{GitHubClient, RateLimit};
pub use types::ApiRepository;
