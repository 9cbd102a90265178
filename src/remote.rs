//! Parsing of `relay::` remote URLs
//!
//! Git hands the helper either the full URL (`relay::https://host/orgs/acme/repos/infra`)
//! or the part after the scheme. Any path prefix before `orgs/` is kept as the base
//! path, so `relay::https://host/functions/v1/git/orgs/acme/repos/infra` talks to
//! `https://host/functions/v1/git/orgs/acme/repos/infra/...`.

use std::fmt;

use percent_encoding::percent_decode_str;

/// Separator between the helper scheme and the remote location
const SCHEME_SEPARATOR: &str = "::";

/// A resolved remote: where the service lives and which repository to talk to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteReference {
    /// URL origin, e.g. `https://example.com:8443`. Empty for path-only remotes.
    pub endpoint: String,
    /// Path preceding `orgs/`, without a trailing slash
    pub base_path: String,
    pub org: String,
    pub repo: String,
}

impl RemoteReference {
    /// Scan candidate tokens for the first `scheme::...` token that parses.
    pub fn resolve<I, S>(candidates: I) -> Option<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        candidates
            .into_iter()
            .filter_map(|token| Self::parse(token.as_ref()))
            .next()
    }

    /// Parse a single token containing `::`.
    pub fn parse(token: &str) -> Option<Self> {
        let (_, location) = token.split_once(SCHEME_SEPARATOR)?;
        Self::parse_location(location)
    }

    fn parse_location(location: &str) -> Option<Self> {
        let (endpoint, path) = split_origin(location);

        // The first `orgs/` that is followed by `{org}/repos/{repo}` wins
        let (orgs_at, org, repo) = segment_starts(path, "orgs/")
            .find_map(|at| parse_repo_path(&path[at..]).map(|(org, repo)| (at, org, repo)))?;

        Some(Self {
            endpoint: endpoint.to_string(),
            base_path: path[..orgs_at].trim_end_matches('/').to_string(),
            org,
            repo,
        })
    }

    /// Base URL the HTTP API lives under, or `None` for a path-only remote
    pub fn api_base(&self) -> Option<String> {
        if self.endpoint.is_empty() {
            return None;
        }
        Some(format!("{}{}", self.endpoint, self.base_path))
    }
}

impl fmt::Display for RemoteReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}{}/orgs/{}/repos/{}",
            self.endpoint, self.base_path, self.org, self.repo
        )
    }
}

/// Split `https://host:port/path` into (`https://host:port`, `/path`).
/// Locations without a scheme are treated as a bare path.
fn split_origin(location: &str) -> (&str, &str) {
    let Some(scheme_end) = location.find("://") else {
        return ("", location);
    };
    let authority_start = scheme_end + 3;
    match location[authority_start..].find('/') {
        Some(offset) => location.split_at(authority_start + offset),
        None => (location, ""),
    }
}

/// Positions of `segment` where it starts a path component
fn segment_starts<'a>(path: &'a str, segment: &'a str) -> impl Iterator<Item = usize> + 'a {
    path.match_indices(segment)
        .map(|(idx, _)| idx)
        .filter(move |&idx| idx == 0 || path.as_bytes()[idx - 1] == b'/')
}

/// Parse `orgs/{org}/repos/{repo}[.git][?query|#fragment]`
fn parse_repo_path(rest: &str) -> Option<(String, String)> {
    let mut segments = rest.split('/');
    segments.next(); // "orgs"
    let org = decode_segment(segments.next()?)?;
    if segments.next()? != "repos" {
        return None;
    }
    let repo = segments.next()?;
    let repo = repo.split(['?', '#']).next().unwrap_or(repo);
    let repo = decode_segment(repo.strip_suffix(".git").unwrap_or(repo))?;
    Some((org, repo))
}

fn decode_segment(raw: &str) -> Option<String> {
    let decoded = percent_decode_str(raw).decode_utf8().ok()?;
    if decoded.is_empty() {
        None
    } else {
        Some(decoded.into_owned())
    }
}
