//! Service layer for the crawler application.
//!
//! - Portal access (`PortalClient` behind the `ShopDirectory` trait)
//! - Hierarchy traversal (`ShopCrawler`)

mod portal;
mod shops;

pub use portal::{PortalClient, ShopDirectory, parse_shops};
pub use shops::{CrawlOutcome, ShopCrawler};
