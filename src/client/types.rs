use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::pack::PackPayload;

#[derive(Debug, Clone, Deserialize)]
pub struct RemoteRef {
    pub name: String,
    /// Kept loose: a missing or non-string target is reported as the zero SHA
    #[serde(default)]
    pub target_sha: Option<serde_json::Value>,
}

impl RemoteRef {
    /// The target SHA if it is present and well-formed hex
    pub fn target(&self) -> Option<&str> {
        self.target_sha
            .as_ref()
            .and_then(|v| v.as_str())
            .filter(|sha| !sha.is_empty() && sha.chars().all(|c| c.is_ascii_hexdigit()))
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct HeadRef {
    #[serde(default)]
    pub target: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ListRefsResult {
    #[serde(default)]
    pub refs: Vec<RemoteRef>,
    #[serde(default)]
    pub head: Option<HeadRef>,
}

impl ListRefsResult {
    pub fn head_target(&self) -> Option<&str> {
        self.head
            .as_ref()
            .and_then(|head| head.target.as_deref())
            .filter(|target| !target.is_empty())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FetchRequest {
    pub wants: Vec<String>,
    pub haves: Vec<String>,
    pub shallow: Vec<String>,
    pub depth: Option<u32>,
}

/// Response body of `git/fetch` when it is JSON rather than a raw pack
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct FetchResponseBody {
    #[serde(default)]
    pub pack: Option<String>,
    #[serde(default)]
    pub pack_encoding: Option<String>,
    #[serde(default)]
    pub pack_url: Option<String>,
    #[serde(default)]
    pub pack_headers: Option<BTreeMap<String, String>>,
    #[serde(default)]
    pub keep: Option<String>,
}

pub struct FetchPackResult {
    pub payload: PackPayload,
    pub size_hint: Option<u64>,
    /// Lock message for `index-pack --keep`
    pub keep: Option<String>,
}

/// One ref update requested by git
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PushDirective {
    pub src: String,
    pub dst: String,
    pub force: bool,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PushMetadata<'a> {
    pub updates: &'a [PushDirective],
    pub dry_run: bool,
    pub options: &'a BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RefResult {
    pub status: String,
    #[serde(default)]
    pub message: Option<String>,
}

impl RefResult {
    pub fn is_ok(&self) -> bool {
        self.status == "ok"
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct PushResponseBody {
    #[serde(default)]
    ok: Option<bool>,
    #[serde(default)]
    results: BTreeMap<String, RefResult>,
    #[serde(default)]
    message: Option<String>,
}

impl From<PushResponseBody> for PushPackResult {
    fn from(body: PushResponseBody) -> Self {
        let ok = body
            .ok
            .unwrap_or_else(|| body.results.values().all(RefResult::is_ok));
        Self {
            ok,
            results: body.results,
            message: body.message,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PushPackResult {
    pub ok: bool,
    pub results: BTreeMap<String, RefResult>,
    pub message: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn push_result(json: serde_json::Value) -> PushPackResult {
        serde_json::from_value::<PushResponseBody>(json).unwrap().into()
    }

    #[test]
    fn test_ok_defaults_to_all_refs_ok() {
        let result = push_result(serde_json::json!({
            "results": {"refs/heads/main": {"status": "ok"}}
        }));
        assert!(result.ok);

        let result = push_result(serde_json::json!({
            "results": {
                "refs/heads/main": {"status": "ok"},
                "refs/heads/dev": {"status": "error", "message": "stale"}
            }
        }));
        assert!(!result.ok);
    }

    #[test]
    fn test_explicit_ok_wins() {
        let result = push_result(serde_json::json!({
            "ok": false,
            "results": {"refs/heads/main": {"status": "ok"}},
            "message": "quota exceeded"
        }));
        assert!(!result.ok);
        assert_eq!(result.message.as_deref(), Some("quota exceeded"));
    }

    #[test]
    fn test_ref_target_validation() {
        let refs: ListRefsResult = serde_json::from_value(serde_json::json!({
            "refs": [
                {"name": "refs/heads/main", "target_sha": "deadbeef"},
                {"name": "refs/heads/a", "target_sha": null},
                {"name": "refs/heads/b", "target_sha": 42},
                {"name": "refs/heads/c", "target_sha": "not-a-sha"},
                {"name": "refs/heads/d"}
            ],
            "head": null
        }))
        .unwrap();

        let targets: Vec<Option<&str>> = refs.refs.iter().map(RemoteRef::target).collect();
        assert_eq!(targets, vec![Some("deadbeef"), None, None, None, None]);
        assert_eq!(refs.head_target(), None);
    }
}
