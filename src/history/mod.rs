pub mod client;
pub mod controller;
pub mod error;
pub mod normalize;
pub mod types;

pub use client::{HistoryClient, SpotifyHistoryClient};
pub use controller::{HistoryView, LoadOutcome, PaginationController};
pub use error::{ErrorNotice, FetchError, FetchErrorKind};
pub use types::{PAGE_SIZE, Page, PlayRecord};
