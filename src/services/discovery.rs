// src/services/discovery.rs

//! Category tree discovery.
//!
//! Builds `group → country → league → season` trees from the site. The front
//! page lists countries under one block per group, a per-country XHR resource
//! lists leagues, and every league page carries a season selector whose
//! options become leaf listing URLs. Each discovery request is followed by
//! the configured politeness pause.

use std::sync::Arc;
use std::time::Duration;

use futures::{StreamExt, stream};
use scraper::{ElementRef, Html, Selector};
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::error::{AppError, Result};
use crate::models::{CategoryNode, CrawlerConfig, SiteConfig};
use crate::services::{Headers, PageFetcher};
use crate::utils::url::append_suffix;
use crate::utils::{clean_text, resolve_url};

/// A country link on the front page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CountryLink {
    pub name: String,
    pub id: String,
}

/// A league link from a country's competitions resource.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LeagueLink {
    pub name: String,
    pub url: String,
}

/// Discovers the category tree with bounded concurrency.
pub struct CategoryDiscovery {
    fetcher: Arc<dyn PageFetcher>,
    site: SiteConfig,
    workers: usize,
    delay: Duration,
    groups: Vec<(String, Selector)>,
    competition_headers: Vec<(String, String)>,
    competition_link: Selector,
    season_option: Selector,
}

fn parse_selector(s: &str) -> Result<Selector> {
    Selector::parse(s).map_err(|e| AppError::selector(s, format!("{e:?}")))
}

impl CategoryDiscovery {
    pub fn new(
        fetcher: Arc<dyn PageFetcher>,
        site: &SiteConfig,
        crawler: &CrawlerConfig,
    ) -> Result<Self> {
        let selectors = &site.selectors;
        let groups = selectors
            .country_groups
            .iter()
            .map(|group| Ok((group.label.clone(), parse_selector(&group.selector)?)))
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            fetcher,
            site: site.clone(),
            workers: crawler.discovery_workers.max(1),
            delay: Duration::from_millis(crawler.listing_delay_ms),
            groups,
            competition_headers: site
                .competitions_headers
                .iter()
                .map(|(name, value)| (name.clone(), value.clone()))
                .collect(),
            competition_link: parse_selector(&selectors.competition_link)?,
            season_option: parse_selector(&selectors.season_option)?,
        })
    }

    /// Discover one tree per country group, in configured group order.
    /// Groups without any season are left out.
    pub async fn discover(&self, token: &CancellationToken) -> Result<Vec<CategoryNode>> {
        let base = Url::parse(&self.site.base_url)?;
        let countries_url = resolve_url(&base, &self.site.countries_path);

        crate::utils::log::step(1, 3, "Fetching countries");
        let html = self.fetch(&countries_url, &[], token).await?;
        let groups: Vec<(&str, Vec<CountryLink>)> = self
            .groups
            .iter()
            .map(|(label, selector)| (label.as_str(), self.parse_countries(&html, selector)))
            .collect();

        let countries: Vec<&CountryLink> = groups.iter().flat_map(|(_, c)| c).collect();
        if countries.is_empty() {
            return Err(AppError::discovery(format!(
                "no countries found at {countries_url}"
            )));
        }
        crate::utils::log::sub_item(&format!("Found {} countries", countries.len()));

        crate::utils::log::step(2, 3, "Fetching leagues");
        let leagues: Vec<Vec<LeagueLink>> = stream::iter(countries)
            .map(|country| async move { self.leagues_of(country, token).await })
            .buffered(self.workers)
            .collect::<Vec<_>>()
            .await
            .into_iter()
            .collect::<Result<_>>()?;

        let league_total: usize = leagues.iter().map(Vec::len).sum();
        crate::utils::log::sub_item(&format!("Found {league_total} leagues"));

        // Flatten so one bounded stream covers every league page.
        crate::utils::log::step(3, 3, "Fetching seasons");
        let flat: Vec<&LeagueLink> = leagues.iter().flatten().collect();
        let mut seasons = stream::iter(flat)
            .map(|league| async move { self.seasons_of(league, token).await })
            .buffered(self.workers)
            .collect::<Vec<_>>()
            .await
            .into_iter()
            .collect::<Result<Vec<_>>>()?
            .into_iter();

        let mut leagues = leagues.iter();
        let mut roots = Vec::new();
        for (label, group_countries) in &groups {
            let mut country_nodes = Vec::new();
            for country in group_countries {
                let country_leagues = leagues.next().map(Vec::as_slice).unwrap_or(&[]);
                let league_nodes: Vec<CategoryNode> = country_leagues
                    .iter()
                    .filter_map(|league| {
                        let leaves = seasons.next().unwrap_or_default();
                        (!leaves.is_empty()).then(|| CategoryNode::branch(&league.name, leaves))
                    })
                    .collect();
                if league_nodes.is_empty() {
                    log::debug!("Country {} has no seasons, skipping", country.name);
                    continue;
                }
                country_nodes.push(CategoryNode::branch(&country.name, league_nodes));
            }
            if country_nodes.is_empty() {
                log::warn!("Group {} has no seasons", label);
                continue;
            }
            roots.push(CategoryNode::branch(*label, country_nodes));
        }

        crate::utils::log::summary(
            "Discovery",
            &[
                ("Groups", roots.len().to_string()),
                (
                    "Countries",
                    roots.iter().map(|r| r.children.len()).sum::<usize>().to_string(),
                ),
                ("Leagues", league_total.to_string()),
                (
                    "Seasons",
                    roots.iter().map(CategoryNode::leaf_count).sum::<usize>().to_string(),
                ),
            ],
        );
        Ok(roots)
    }

    /// Fetch a page, then pause before the next discovery request.
    async fn fetch(&self, url: &str, headers: &Headers, token: &CancellationToken) -> Result<String> {
        let result = self.fetcher.fetch(url, headers, token).await;
        if !self.delay.is_zero() {
            tokio::select! {
                _ = tokio::time::sleep(self.delay) => {}
                _ = token.cancelled() => return Err(AppError::Cancelled),
            }
        }
        result
    }

    /// Leagues of one country. Fetch failures skip the country.
    async fn leagues_of(
        &self,
        country: &CountryLink,
        token: &CancellationToken,
    ) -> Result<Vec<LeagueLink>> {
        let base = Url::parse(&self.site.base_url)?;
        let path = self.site.competitions_path.replace("{id}", &country.id);
        let url = resolve_url(&base, &path);

        match self.fetch(&url, &self.competition_headers, token).await {
            Ok(html) => Ok(self.parse_leagues(&html, &url)),
            Err(e) if e.is_cancelled() => Err(e),
            Err(e) => {
                log::error!("Failed to load leagues of {}: {}", country.name, e);
                Ok(Vec::new())
            }
        }
    }

    /// Season leaves of one league. Fetch failures skip the league.
    async fn seasons_of(
        &self,
        league: &LeagueLink,
        token: &CancellationToken,
    ) -> Result<Vec<CategoryNode>> {
        match self.fetch(&league.url, &[], token).await {
            Ok(html) => Ok(self.parse_seasons(&html, &league.url)),
            Err(e) if e.is_cancelled() => Err(e),
            Err(e) => {
                log::error!("Failed to load seasons of {}: {}", league.name, e);
                Ok(Vec::new())
            }
        }
    }

    /// Countries matched by `selector` with their numeric ids, in page order.
    /// The id is read from the link itself or from its parent element.
    pub fn parse_countries(&self, html: &str, selector: &Selector) -> Vec<CountryLink> {
        let document = Html::parse_document(html);
        let id_attr = self.site.selectors.country_id_attr.as_str();

        document
            .select(selector)
            .filter_map(|a| {
                let id = a
                    .value()
                    .attr(id_attr)
                    .or_else(|| {
                        a.parent()
                            .and_then(ElementRef::wrap)
                            .and_then(|parent| parent.value().attr(id_attr))
                    })?
                    .trim();
                if id.is_empty() || !id.chars().all(|c| c.is_ascii_digit()) {
                    return None;
                }
                let name = clean_text(&a.text().collect::<String>());
                (!name.is_empty()).then(|| CountryLink {
                    name,
                    id: id.to_string(),
                })
            })
            .collect()
    }

    pub fn parse_leagues(&self, html: &str, page_url: &str) -> Vec<LeagueLink> {
        let Ok(base) = Url::parse(page_url) else {
            return Vec::new();
        };
        let document = Html::parse_fragment(html);

        document
            .select(&self.competition_link)
            .filter_map(|a| {
                let href = a.value().attr("href")?;
                let name = clean_text(&a.text().collect::<String>());
                (!name.is_empty()).then(|| LeagueLink {
                    name,
                    url: resolve_url(&base, href),
                })
            })
            .collect()
    }

    /// Season options as leaves pointing at their results listings.
    pub fn parse_seasons(&self, html: &str, page_url: &str) -> Vec<CategoryNode> {
        let Ok(base) = Url::parse(page_url) else {
            return Vec::new();
        };
        let document = Html::parse_document(html);

        document
            .select(&self.season_option)
            .filter_map(|option| {
                let value = option.value().attr("value")?.trim();
                if value.is_empty() {
                    return None;
                }
                let label = clean_text(&option.text().collect::<String>());
                let url = append_suffix(&resolve_url(&base, value), &self.site.results_suffix);
                (!label.is_empty()).then(|| CategoryNode::leaf(label, url))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex;

    use async_trait::async_trait;

    const BASE: &str = "https://site.example/";

    /// Serves fixed pages and records the headers sent with each request.
    #[derive(Default)]
    struct MapFetcher {
        pages: HashMap<String, String>,
        requests: Mutex<Vec<(String, Vec<(String, String)>)>>,
    }

    impl MapFetcher {
        fn with(pages: HashMap<String, String>) -> Self {
            Self {
                pages,
                ..Self::default()
            }
        }

        fn headers_for(&self, url: &str) -> Option<Vec<(String, String)>> {
            self.requests
                .lock()
                .unwrap()
                .iter()
                .find(|(u, _)| u == url)
                .map(|(_, h)| h.clone())
        }
    }

    #[async_trait]
    impl PageFetcher for MapFetcher {
        async fn fetch(
            &self,
            url: &str,
            headers: &Headers,
            _token: &CancellationToken,
        ) -> Result<String> {
            self.requests
                .lock()
                .unwrap()
                .push((url.to_string(), headers.to_vec()));
            self.pages
                .get(url)
                .cloned()
                .ok_or_else(|| AppError::crawl(url, "HTTP 404"))
        }
    }

    fn site() -> SiteConfig {
        SiteConfig {
            base_url: BASE.to_string(),
            ..SiteConfig::default()
        }
    }

    fn crawler(workers: usize, delay_ms: u64) -> CrawlerConfig {
        CrawlerConfig {
            discovery_workers: workers,
            listing_delay_ms: delay_ms,
            ..CrawlerConfig::default()
        }
    }

    const FRONT_PAGE: &str = r#"<html><body>
        <div class="international"><ul class="countries">
            <li data-id="201"><a href="/international/">World</a></li>
        </ul></div>
        <div class="national"><ul class="countries">
            <li data-id="1"><a href="/country/England/">England</a></li>
            <li data-id="2"><a href="/country/Germany/">Germany</a></li>
            <li data-id="x"><a href="/country/Broken/">Broken</a></li>
        </ul></div>
    </body></html>"#;

    fn season_select(options: &str) -> String {
        format!(
            r#"<div class="desc"><select class="gray2 onchangeurl">{options}</select></div>"#
        )
    }

    fn pages() -> HashMap<String, String> {
        let mut pages = HashMap::new();
        pages.insert(BASE.to_string(), FRONT_PAGE.to_string());
        pages.insert(
            format!("{BASE}ml/subLeagues/?CountryId=201"),
            r#"<ul><li><a href="/international/World-Cup/">World Cup</a></li></ul>"#.to_string(),
        );
        pages.insert(
            format!("{BASE}ml/subLeagues/?CountryId=1"),
            r#"<ul>
                <li><a href="/country/England/league/Premier-League/">Premier League</a></li>
                <li><a href="/country/England/league/Championship/">Championship</a></li>
            </ul>"#
                .to_string(),
        );
        pages.insert(
            format!("{BASE}international/World-Cup/"),
            season_select(r#"<option value="/international/World-Cup/2022/">2022</option>"#),
        );
        pages.insert(
            format!("{BASE}country/England/league/Premier-League/"),
            season_select(
                r#"<option value="/country/England/league/Premier-League/2023-2024/">2023/2024</option>
                   <option value="/country/England/league/Premier-League/2022-2023/">2022/2023</option>
                   <option value="">Choose</option>"#,
            ),
        );
        pages.insert(
            format!("{BASE}country/England/league/Championship/"),
            season_select(
                r#"<option value="/country/England/league/Championship/2023-2024">2023/2024</option>"#,
            ),
        );
        pages
    }

    #[tokio::test]
    async fn test_discover_builds_group_trees() {
        let fetcher = Arc::new(MapFetcher::with(pages()));
        let discovery = CategoryDiscovery::new(fetcher, &site(), &crawler(4, 0)).unwrap();

        let roots = discovery.discover(&CancellationToken::new()).await.unwrap();
        assert_eq!(roots.len(), 2);
        assert_eq!(roots[0].label, "International");
        assert_eq!(roots[0].children[0].label, "World");
        assert_eq!(roots[1].label, "National");

        // Germany's competitions resource is missing, so it has no leagues.
        let national = &roots[1];
        assert_eq!(national.children.len(), 1);
        let england = &national.children[0];
        assert_eq!(england.label, "England");
        assert_eq!(england.children[0].label, "Premier League");
        assert_eq!(england.children[1].label, "Championship");

        let seasons = &england.children[0].children;
        assert_eq!(seasons.len(), 2);
        assert_eq!(seasons[0].label, "2023/2024");
        assert_eq!(
            seasons[0].url.as_deref(),
            Some("https://site.example/country/England/league/Premier-League/2023-2024/results/")
        );
        assert_eq!(
            england.children[1].children[0].url.as_deref(),
            Some("https://site.example/country/England/league/Championship/2023-2024/results/")
        );
        assert_eq!(national.leaf_count(), 3);
    }

    #[tokio::test]
    async fn test_competitions_requests_carry_xhr_header() {
        let fetcher = Arc::new(MapFetcher::with(pages()));
        let discovery = CategoryDiscovery::new(fetcher.clone(), &site(), &crawler(2, 0)).unwrap();
        discovery.discover(&CancellationToken::new()).await.unwrap();

        let xhr = vec![("X-Requested-With".to_string(), "XMLHttpRequest".to_string())];
        assert_eq!(
            fetcher.headers_for(&format!("{BASE}ml/subLeagues/?CountryId=1")),
            Some(xhr)
        );
        assert_eq!(fetcher.headers_for(BASE), Some(Vec::new()));
        assert_eq!(
            fetcher.headers_for(&format!("{BASE}country/England/league/Championship/")),
            Some(Vec::new())
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_every_request_is_followed_by_pause() {
        let fetcher = Arc::new(MapFetcher::with(pages()));
        let discovery = CategoryDiscovery::new(fetcher.clone(), &site(), &crawler(1, 1000)).unwrap();

        let started = tokio::time::Instant::now();
        discovery.discover(&CancellationToken::new()).await.unwrap();

        let requests = fetcher.requests.lock().unwrap().len() as u32;
        assert_eq!(requests, 7);
        assert!(started.elapsed() >= Duration::from_millis(1000) * requests);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_interrupts_pause() {
        let fetcher = Arc::new(MapFetcher::with(pages()));
        let discovery = CategoryDiscovery::new(fetcher, &site(), &crawler(1, 60_000)).unwrap();
        let token = CancellationToken::new();

        let canceller = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(1)).await;
            canceller.cancel();
        });

        let started = tokio::time::Instant::now();
        let result = discovery.discover(&token).await;
        assert!(matches!(result, Err(AppError::Cancelled)));
        assert!(started.elapsed() < Duration::from_secs(60));
    }

    #[tokio::test]
    async fn test_discover_without_countries_fails() {
        let mut pages = HashMap::new();
        pages.insert(BASE.to_string(), "<html></html>".to_string());
        let discovery =
            CategoryDiscovery::new(Arc::new(MapFetcher::with(pages)), &site(), &crawler(4, 0))
                .unwrap();

        let result = discovery.discover(&CancellationToken::new()).await;
        assert!(matches!(result, Err(AppError::Discovery(_))));
    }

    #[test]
    fn test_parse_countries_reads_id_from_link_or_parent() {
        let discovery =
            CategoryDiscovery::new(Arc::new(MapFetcher::default()), &site(), &crawler(1, 0))
                .unwrap();
        let national = Selector::parse("div.national ul.countries > li > a").unwrap();
        let html = FRONT_PAGE.replace(
            r#"<li data-id="2"><a href="/country/Germany/">"#,
            r#"<li><a data-id="2" href="/country/Germany/">"#,
        );

        assert_eq!(
            discovery.parse_countries(&html, &national),
            vec![
                CountryLink {
                    name: "England".into(),
                    id: "1".into()
                },
                CountryLink {
                    name: "Germany".into(),
                    id: "2".into()
                },
            ]
        );
    }
}
