//! Review host adapter (GitHub REST API).
//!
//! The [`ReviewHost`] trait decouples reconciliation from the network. Tests
//! use a scripted host that returns canned snapshots.

use std::sync::LazyLock;

use regex::Regex;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::core::types::{PrDetail, RemotePr, Review, ReviewState};
use crate::io::http::{HttpClient, RemoteError};

pub const DEFAULT_API_BASE: &str = "https://api.github.com";
const API_VERSION: &str = "2022-11-28";
const PAGE_SIZE: usize = 100;
/// The search API serves at most 1000 results per query.
const MAX_SEARCH_PAGES: u32 = 10;
const MAX_REVIEW_PAGES: u32 = 30;

/// Open PRs where the viewer's review is requested (directly or via a team).
pub const REVIEW_REQUESTED_QUERY: &str = "type:pr state:open review-requested:@me";
/// Open PRs authored by the viewer.
pub const AUTHORED_QUERY: &str = "type:pr state:open author:@me";

static REPO_URL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"/repos/([^/]+/[^/]+)/?$").expect("repository url regex"));

/// Read-only view of the review host.
pub trait ReviewHost {
    /// Run a PR search. A failure or a partial result set is an error, never
    /// a short list.
    fn search_open_prs(&self, query: &str) -> Result<Vec<RemotePr>, RemoteError>;
    /// Merge flag and pending review requests for one PR.
    fn pr_detail(&self, repo: &str, number: u64) -> Result<PrDetail, RemoteError>;
    /// Submitted reviews, oldest first.
    fn reviews(&self, repo: &str, number: u64) -> Result<Vec<Review>, RemoteError>;
    /// Login of the authenticated user.
    fn viewer_login(&self) -> Result<String, RemoteError>;
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    total_count: Option<u64>,
    /// Set when the search timed out server-side and `items` is partial.
    #[serde(default)]
    incomplete_results: bool,
    #[serde(default)]
    items: Vec<SearchItem>,
}

#[derive(Debug, Deserialize)]
struct SearchItem {
    html_url: String,
    number: u64,
    title: String,
    user: Option<Account>,
    repository_url: String,
}

#[derive(Debug, Deserialize)]
struct Account {
    login: String,
}

#[derive(Debug, Deserialize)]
struct TeamRef {
    slug: String,
}

#[derive(Debug, Deserialize)]
struct PullResponse {
    #[serde(default)]
    merged: bool,
    #[serde(default)]
    requested_reviewers: Vec<Account>,
    #[serde(default)]
    requested_teams: Vec<TeamRef>,
}

#[derive(Debug, Deserialize)]
struct ReviewItem {
    id: u64,
    user: Option<Account>,
    state: ReviewState,
}

/// GitHub REST client authenticated with a bearer token.
pub struct GitHubClient {
    http: HttpClient,
    api_base: String,
    authorization: String,
}

impl GitHubClient {
    pub fn new(http: HttpClient, api_base: &str, token: &str) -> Self {
        Self {
            http,
            api_base: api_base.trim_end_matches('/').to_string(),
            authorization: format!("Bearer {}", token.trim()),
        }
    }

    fn get<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, &str)],
    ) -> Result<T, RemoteError> {
        let url = format!("{}{}", self.api_base, path);
        let headers = [
            ("Authorization", self.authorization.as_str()),
            ("Accept", "application/vnd.github+json"),
            ("X-GitHub-Api-Version", API_VERSION),
        ];
        self.http.get_json(&url, &headers, query)
    }
}

impl ReviewHost for GitHubClient {
    fn search_open_prs(&self, query: &str) -> Result<Vec<RemotePr>, RemoteError> {
        let per_page = PAGE_SIZE.to_string();
        let items = collect_search_pages("/search/issues", |page| {
            let page = page.to_string();
            self.get(
                "/search/issues",
                &[
                    ("q", query),
                    ("per_page", per_page.as_str()),
                    ("page", page.as_str()),
                ],
            )
        })?;
        let prs = search_items_to_prs(items);
        debug!(query, count = prs.len(), "search complete");
        Ok(prs)
    }

    fn pr_detail(&self, repo: &str, number: u64) -> Result<PrDetail, RemoteError> {
        let response: PullResponse = self.get(&format!("/repos/{repo}/pulls/{number}"), &[])?;
        Ok(pull_to_detail(response))
    }

    fn reviews(&self, repo: &str, number: u64) -> Result<Vec<Review>, RemoteError> {
        let path = format!("/repos/{repo}/pulls/{number}/reviews");
        let per_page = PAGE_SIZE.to_string();
        let items = collect_review_pages(&path, |page| {
            let page = page.to_string();
            self.get(
                &path,
                &[("per_page", per_page.as_str()), ("page", page.as_str())],
            )
        })?;
        Ok(review_items_to_reviews(items))
    }

    fn viewer_login(&self) -> Result<String, RemoteError> {
        let account: Account = self.get("/user", &[])?;
        Ok(account.login)
    }
}

fn incomplete(endpoint: &str, message: String) -> RemoteError {
    RemoteError::Incomplete {
        endpoint: endpoint.to_string(),
        message,
    }
}

/// Fetch search pages until every match is in hand.
///
/// A timed-out search or a result set larger than the pages we can read is
/// an error: callers close tasks for PRs missing from the snapshot.
fn collect_search_pages<F>(endpoint: &str, mut fetch_page: F) -> Result<Vec<SearchItem>, RemoteError>
where
    F: FnMut(u32) -> Result<SearchResponse, RemoteError>,
{
    let mut items = Vec::new();
    for page in 1..=MAX_SEARCH_PAGES {
        let response = fetch_page(page)?;
        if response.incomplete_results {
            return Err(incomplete(endpoint, format!("search timed out on page {page}")));
        }
        let fetched = response.items.len();
        items.extend(response.items);
        let collected = items.len() as u64;
        let reached_total = response.total_count.is_some_and(|total| collected >= total);
        if fetched < PAGE_SIZE || reached_total {
            return match response.total_count {
                Some(total) if collected < total => Err(incomplete(
                    endpoint,
                    format!("received {collected} of {total} results"),
                )),
                _ => Ok(items),
            };
        }
    }
    Err(incomplete(
        endpoint,
        format!("more than {} results", items.len()),
    ))
}

/// Fetch review pages until a short page. The newest review is on the last one.
fn collect_review_pages<F>(endpoint: &str, mut fetch_page: F) -> Result<Vec<ReviewItem>, RemoteError>
where
    F: FnMut(u32) -> Result<Vec<ReviewItem>, RemoteError>,
{
    let mut items = Vec::new();
    for page in 1..=MAX_REVIEW_PAGES {
        let batch = fetch_page(page)?;
        let fetched = batch.len();
        items.extend(batch);
        if fetched < PAGE_SIZE {
            return Ok(items);
        }
    }
    Err(incomplete(
        endpoint,
        format!("more than {} reviews", items.len()),
    ))
}

fn search_items_to_prs(items: Vec<SearchItem>) -> Vec<RemotePr> {
    items
        .into_iter()
        .filter_map(|item| {
            let Some(repo) = repo_from_api_url(&item.repository_url) else {
                warn!(url = %item.html_url, repository_url = %item.repository_url, "unrecognised repository url; skipping");
                return None;
            };
            Some(RemotePr {
                url: item.html_url,
                number: item.number,
                title: item.title,
                author: item.user.map(|u| u.login).unwrap_or_default(),
                repo,
            })
        })
        .collect()
}

fn repo_from_api_url(url: &str) -> Option<String> {
    REPO_URL_RE
        .captures(url)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

fn pull_to_detail(response: PullResponse) -> PrDetail {
    PrDetail {
        merged: response.merged,
        requested_reviewers: response
            .requested_reviewers
            .into_iter()
            .map(|a| a.login)
            .collect(),
        requested_teams: response.requested_teams.into_iter().map(|t| t.slug).collect(),
    }
}

fn review_items_to_reviews(items: Vec<ReviewItem>) -> Vec<Review> {
    let mut reviews: Vec<Review> = items
        .into_iter()
        .map(|item| Review {
            id: item.id,
            author: item
                .user
                .map(|u| u.login)
                .unwrap_or_else(|| "ghost".to_string()),
            state: item.state,
        })
        .collect();
    // Ids are assigned in submission order.
    reviews.sort_by_key(|review| review.id);
    reviews
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn search_items_carry_repo_full_name() {
        let raw = r#"{
            "total_count": 2,
            "incomplete_results": false,
            "items": [
                {
                    "html_url": "https://github.com/acme/api/pull/7",
                    "number": 7,
                    "title": "Add caching",
                    "user": { "login": "alice" },
                    "repository_url": "https://api.github.com/repos/acme/api",
                    "pull_request": {}
                },
                {
                    "html_url": "https://example.com/weird",
                    "number": 8,
                    "title": "Odd",
                    "user": null,
                    "repository_url": "https://example.com/elsewhere"
                }
            ]
        }"#;
        let response: SearchResponse = serde_json::from_str(raw).expect("parse");
        assert_eq!(response.total_count, Some(2));
        assert!(!response.incomplete_results);
        let prs = search_items_to_prs(response.items);
        assert_eq!(
            prs,
            vec![RemotePr {
                url: "https://github.com/acme/api/pull/7".to_string(),
                number: 7,
                title: "Add caching".to_string(),
                author: "alice".to_string(),
                repo: "acme/api".to_string(),
            }]
        );
    }

    #[test]
    fn pull_detail_collects_reviewers_and_teams() {
        let raw = r#"{
            "number": 7,
            "merged": false,
            "requested_reviewers": [{ "login": "me" }, { "login": "bob" }],
            "requested_teams": [{ "slug": "platform", "name": "Platform" }]
        }"#;
        let detail = pull_to_detail(serde_json::from_str(raw).expect("parse"));
        assert!(!detail.merged);
        assert_eq!(detail.requested_reviewers, vec!["me", "bob"]);
        assert_eq!(detail.requested_teams, vec!["platform"]);
    }

    #[test]
    fn reviews_are_ordered_by_id() {
        let raw = r#"[
            { "id": 101, "user": { "login": "carol" }, "state": "CHANGES_REQUESTED" },
            { "id": 100, "user": null, "state": "APPROVED" }
        ]"#;
        let reviews = review_items_to_reviews(serde_json::from_str(raw).expect("parse"));
        assert_eq!(reviews[0].id, 100);
        assert_eq!(reviews[0].author, "ghost");
        assert_eq!(reviews[1].state, ReviewState::ChangesRequested);
    }

    fn search_item(number: u64) -> SearchItem {
        SearchItem {
            html_url: format!("https://github.com/acme/api/pull/{number}"),
            number,
            title: format!("change {number}"),
            user: None,
            repository_url: "https://api.github.com/repos/acme/api".to_string(),
        }
    }

    fn search_page(total: u64, numbers: std::ops::Range<u64>) -> SearchResponse {
        SearchResponse {
            total_count: Some(total),
            incomplete_results: false,
            items: numbers.map(search_item).collect(),
        }
    }

    fn review_item(id: u64) -> ReviewItem {
        ReviewItem {
            id,
            user: None,
            state: ReviewState::Commented,
        }
    }

    #[test]
    fn timed_out_search_is_an_error() {
        let raw = r#"{
            "total_count": 2,
            "incomplete_results": true,
            "items": [{
                "html_url": "https://github.com/acme/api/pull/1",
                "number": 1,
                "title": "One",
                "user": { "login": "alice" },
                "repository_url": "https://api.github.com/repos/acme/api"
            }]
        }"#;
        let mut pages = vec![serde_json::from_str::<SearchResponse>(raw).expect("parse")];
        let err = collect_search_pages("/search/issues", |_| Ok(pages.remove(0))).unwrap_err();
        assert!(matches!(err, RemoteError::Incomplete { .. }), "{err}");
    }

    #[test]
    fn short_page_below_total_count_is_an_error() {
        let err = collect_search_pages("/search/issues", |_| Ok(search_page(2, 1..2))).unwrap_err();
        assert_eq!(
            err.to_string(),
            "/search/issues: incomplete results: received 1 of 2 results"
        );
    }

    #[test]
    fn search_follows_pages_until_total_count() {
        let mut requested = Vec::new();
        let items = collect_search_pages("/search/issues", |page| {
            requested.push(page);
            Ok(match page {
                1 => search_page(150, 1..101),
                _ => search_page(150, 101..151),
            })
        })
        .expect("complete search");
        assert_eq!(requested, vec![1, 2]);
        assert_eq!(items.len(), 150);
        assert_eq!(items.last().map(|item| item.number), Some(150));
    }

    #[test]
    fn search_without_total_count_stops_on_short_page() {
        let items = collect_search_pages("/search/issues", |_| {
            Ok(SearchResponse {
                total_count: None,
                ..search_page(0, 1..4)
            })
        })
        .expect("search");
        assert_eq!(items.len(), 3);
    }

    #[test]
    fn search_beyond_readable_pages_is_an_error() {
        let err = collect_search_pages("/search/issues", |page| {
            let start = u64::from(page - 1) * 100 + 1;
            Ok(search_page(5000, start..start + 100))
        })
        .unwrap_err();
        assert!(matches!(err, RemoteError::Incomplete { .. }));
    }

    #[test]
    fn reviews_are_read_past_the_first_page() {
        let reviews = collect_review_pages("/reviews", |page| {
            Ok(match page {
                1 => (1..101).map(review_item).collect(),
                2 => (101..201).map(review_item).collect(),
                _ => vec![review_item(201)],
            })
        })
        .map(review_items_to_reviews)
        .expect("reviews");
        assert_eq!(reviews.len(), 201);
        assert_eq!(reviews.last().map(|review| review.id), Some(201));
    }

    #[test]
    fn review_page_failure_fails_the_listing() {
        let err = collect_review_pages("/reviews", |page| match page {
            1 => Ok((1..101).map(review_item).collect()),
            _ => Err(RemoteError::Status {
                endpoint: "/reviews".to_string(),
                status: 502,
            }),
        })
        .unwrap_err();
        assert!(matches!(err, RemoteError::Status { status: 502, .. }));
    }

    #[test]
    fn repo_from_api_url_handles_trailing_slash() {
        assert_eq!(
            repo_from_api_url("https://ghe.local/api/v3/repos/org/svc/"),
            Some("org/svc".to_string())
        );
        assert_eq!(repo_from_api_url("https://api.github.com/users/x"), None);
    }
}
