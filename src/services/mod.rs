//! Service layer for the crawler application.
//!
//! This module contains the business logic for:
//! - Proxy management (`ProxyPool`)
//! - Page fetching with proxy rotation (`ResilientFetcher`)
//! - Match and listing page parsing (`MatchPageParser`, `ListingPageParser`)
//! - Category tree discovery (`CategoryDiscovery`)

#[cfg(feature = "map")]
mod discovery;
mod fetcher;
mod parser;
mod proxy;

#[cfg(feature = "map")]
pub use discovery::{CategoryDiscovery, CountryLink, LeagueLink};
pub use fetcher::{Headers, HttpTransport, PageFetcher, ReqwestTransport, ResilientFetcher};
pub use parser::{ListingPageParser, MatchLink, MatchPageParser, ParseOutcome, is_postponed};
pub use proxy::{
    FileSource, ProxyPool, ProxySource, StaticSource, UrlSource, parse_proxy_list,
    source_from_config,
};
