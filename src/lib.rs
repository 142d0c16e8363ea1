//! Incremental GitHub user search: a paging search client plus the
//! controller that keeps a visible result list consistent while the
//! query changes mid-flight.

pub mod client;
pub mod controller;
pub mod models;

pub use client::{FetchError, GithubClient, SearchClient};
pub use controller::{Phase, ResultsController, WeakController};
pub use models::{PageToken, ResultPage, User};
