//! Feed fetching: download every configured feed and parse it into items.

mod fetcher;
pub mod parse;

pub use fetcher::{RssFetcher, FEED_CONCURRENCY};
pub use parse::parse_feed;
