//! Remote repository gateway: git transport and hosting API.

pub mod client;
pub mod github;

pub use client::GitClient;
pub use github::GitHubClient;
