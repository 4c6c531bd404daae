//! Curl-backed `HubSource` against a gitea-style hub API.
//!
//! Endpoints:
//!   GET /api/v1/repos/{group}/{name}/contents/{path}?ref={rev}
//!   GET /api/v1/repos/{group}/{name}/git/trees/{rev}?recursive=true&page=N&per_page=M
//!   GET /api/v1/repos/{group}/{name}/tags/{rev}
//!   GET /api/v1/repos/{group}/{name}/media/{path}?ref={rev}   (download)

use serde::Deserialize;
use std::time::Duration;
use url::Url;

use super::{EntryKind, HubSource, RemoteFileDescriptor, RepoId, TreeEntry, TreePage};
use crate::error::{HubError, Result, TransferError};

const TREE_PAGE_SIZE: u32 = 1000;

/// Hub metadata client. Cheap to clone; holds no connection state.
#[derive(Debug, Clone)]
pub struct HttpHub {
    endpoint: Url,
    token: Option<String>,
}

/// `/contents/` response for a single file.
#[derive(Debug, Deserialize)]
struct FileInfo {
    path: Option<String>,
    #[serde(default)]
    size: u64,
    #[serde(rename = "type")]
    kind: Option<String>,
    #[serde(rename = "Sha256")]
    sha256: Option<String>,
}

/// `/git/trees/` response page.
#[derive(Debug, Deserialize)]
struct TreeResponse {
    #[serde(default)]
    tree: Vec<TreeEntry>,
    #[serde(default)]
    truncated: bool,
}

/// `/tags/` response; only the commit id matters here.
#[derive(Debug, Deserialize)]
struct TagResponse {
    commit: TagCommit,
}

#[derive(Debug, Deserialize)]
struct TagCommit {
    sha: String,
}

impl HttpHub {
    pub fn new(endpoint: &str, token: Option<String>) -> Result<Self> {
        let endpoint = Url::parse(endpoint)
            .map_err(|e| HubError::Metadata(format!("invalid endpoint {endpoint}: {e}")))?;
        if endpoint.cannot_be_a_base() {
            return Err(HubError::Metadata(format!(
                "endpoint {endpoint} cannot be a base URL"
            )));
        }
        Ok(Self { endpoint, token })
    }

    /// Build `<endpoint>/api/v1/repos/<group>/<name>/...`; each segment is
    /// percent-encoded, so a repo-relative path stays one URL segment.
    fn repo_url(&self, repo: &RepoId, tail: &[&str]) -> Url {
        let mut url = self.endpoint.clone();
        {
            // cannot_be_a_base was rejected in new()
            let mut segments = url.path_segments_mut().expect("base URL");
            segments.extend(["api", "v1", "repos", &repo.group, &repo.name]);
            segments.extend(tail);
        }
        url
    }

    /// GET the URL, returning status and body. Transport failures map to
    /// `HubError::Transfer`.
    fn get(&self, url: &Url) -> Result<(u32, Vec<u8>)> {
        let mut body: Vec<u8> = Vec::new();

        let mut easy = curl::easy::Easy::new();
        easy.url(url.as_str()).map_err(TransferError::Curl)?;
        easy.follow_location(true).map_err(TransferError::Curl)?;
        easy.connect_timeout(Duration::from_secs(15))
            .map_err(TransferError::Curl)?;
        easy.timeout(Duration::from_secs(30))
            .map_err(TransferError::Curl)?;

        let mut list = curl::easy::List::new();
        for (k, v) in self.request_headers() {
            list.append(&format!("{}: {}", k, v))
                .map_err(TransferError::Curl)?;
        }
        easy.http_headers(list).map_err(TransferError::Curl)?;

        {
            let mut transfer = easy.transfer();
            transfer
                .write_function(|data| {
                    body.extend_from_slice(data);
                    Ok(data.len())
                })
                .map_err(TransferError::Curl)?;
            transfer.perform().map_err(TransferError::Curl)?;
        }

        let code = easy.response_code().map_err(TransferError::Curl)?;
        Ok((code, body))
    }
}

impl HubSource for HttpHub {
    fn resolve_file(
        &self,
        repo: &RepoId,
        path: &str,
        revision: &str,
    ) -> Result<RemoteFileDescriptor> {
        let mut url = self.repo_url(repo, &["contents", path]);
        if revision != "master" {
            url.query_pairs_mut().append_pair("ref", revision);
        }
        let (code, body) = self.get(&url)?;
        if code == 404 {
            return Err(HubError::NotExist {
                repo: repo.to_string(),
                path: path.to_string(),
            });
        }
        if !(200..300).contains(&code) {
            return Err(HubError::Metadata(format!(
                "contents request for {path} returned HTTP {code}"
            )));
        }
        let info: FileInfo = serde_json::from_slice(&body)
            .map_err(|e| HubError::Metadata(format!("contents response: {e}")))?;
        let info_path = info.path.ok_or_else(|| HubError::NotExist {
            repo: repo.to_string(),
            path: path.to_string(),
        })?;
        let kind = match info.kind.as_deref() {
            Some("dir") | Some("tree") => EntryKind::Tree,
            _ => EntryKind::Blob,
        };
        Ok(RemoteFileDescriptor {
            path: info_path,
            size: info.size,
            sha256: info.sha256,
            kind,
        })
    }

    fn list_tree(&self, repo: &RepoId, revision: &str, page: u32) -> Result<TreePage> {
        let mut url = self.repo_url(repo, &["git", "trees", revision]);
        url.query_pairs_mut()
            .append_pair("recursive", "true")
            .append_pair("page", &page.to_string())
            .append_pair("per_page", &TREE_PAGE_SIZE.to_string());
        let (code, body) = self.get(&url)?;
        if !(200..300).contains(&code) {
            return Err(HubError::NotExist {
                repo: repo.to_string(),
                path: format!("tree@{revision}"),
            });
        }
        let resp: TreeResponse = serde_json::from_slice(&body)
            .map_err(|e| HubError::Metadata(format!("tree response: {e}")))?;
        Ok(TreePage {
            entries: resp.tree,
            truncated: resp.truncated,
        })
    }

    fn resolve_revision(&self, repo: &RepoId, revision: &str) -> Result<String> {
        let url = self.repo_url(repo, &["tags", revision]);
        let (code, body) = self.get(&url)?;
        if (200..300).contains(&code) {
            if let Ok(tag) = serde_json::from_slice::<TagResponse>(&body) {
                return Ok(tag.commit.sha);
            }
        }
        // Not a tag: branch names and commit ids pass through unchanged.
        Ok(revision.to_string())
    }

    fn file_url(&self, repo: &RepoId, path: &str, revision: &str) -> String {
        let mut url = self.repo_url(repo, &["media", path]);
        if revision != "master" {
            url.query_pairs_mut().append_pair("ref", revision);
        }
        url.to_string()
    }

    fn request_headers(&self) -> Vec<(String, String)> {
        let mut headers = vec![
            ("Content-Type".to_string(), "application/json".to_string()),
            (
                "SDK-Version".to_string(),
                env!("CARGO_PKG_VERSION").to_string(),
            ),
        ];
        if let Some(token) = &self.token {
            headers.push(("Authorization".to_string(), format!("token {}", token)));
        }
        headers
    }
}
