//! # GitHub Host Client
//!
//! `GitHubClient` implements [`VcsHost`] on top of the GitHub REST API, plus
//! one GraphQL query for the batched read of the two workspace files.
//!
//! Requests are sent once. A non-success status becomes [`Error::Host`]
//! carrying the status code and the message GitHub returned; a transport
//! failure becomes [`Error::Network`]. Nothing is retried: the CI re-run is
//! the retry mechanism.

use async_trait::async_trait;
use log::debug;
use reqwest::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::json;
use url::Url;

use crate::config::RepoSlug;
use crate::error::{Error, Result};
use crate::host::{
    CommitInfo, Comparison, ComparisonStatus, PullRequest, PullRequestContent, TreeEntry, VcsHost,
    WorkspaceFiles,
};

pub const DEFAULT_API_URL: &str = "https://api.github.com";
pub const DEFAULT_GRAPHQL_URL: &str = "https://api.github.com/graphql";

const USER_AGENT: &str = concat!("overlay-sync/", env!("CARGO_PKG_VERSION"));
const ACCEPT: &str = "application/vnd.github+json";

const FILE_CONTENTS_QUERY: &str = r#"
query GetFileContents($owner: String!, $repo: String!, $pluginsList: String!, $sourceJson: String!) {
  repository(owner: $owner, name: $repo) {
    pluginsList: object(expression: $pluginsList) {
      ... on Blob {
        text
      }
    }
    sourceJson: object(expression: $sourceJson) {
      ... on Blob {
        text
      }
    }
  }
}"#;

/// GitHub client bound to the overlay repository.
pub struct GitHubClient {
    client: Client,
    api_url: Url,
    graphql_url: Url,
    repo: RepoSlug,
}

impl GitHubClient {
    /// Build a client for `repo`. A blank token sends unauthenticated
    /// requests.
    pub fn new(
        token: Option<&str>,
        api_url: &str,
        graphql_url: &str,
        repo: RepoSlug,
    ) -> Result<Self> {
        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert(
            reqwest::header::USER_AGENT,
            reqwest::header::HeaderValue::from_static(USER_AGENT),
        );
        headers.insert(
            reqwest::header::ACCEPT,
            reqwest::header::HeaderValue::from_static(ACCEPT),
        );

        if let Some(token) = token.map(str::trim).filter(|t| !t.is_empty()) {
            let value = reqwest::header::HeaderValue::from_str(&format!("Bearer {}", token))
                .map_err(|e| Error::ConfigParse {
                    message: format!("invalid GitHub token: {}", e),
                    hint: None,
                })?;
            headers.insert(reqwest::header::AUTHORIZATION, value);
        }

        let client = Client::builder()
            .default_headers(headers)
            .build()
            .map_err(|e| Error::Network {
                url: api_url.to_string(),
                message: e.to_string(),
            })?;

        Ok(Self {
            client,
            api_url: Url::parse(api_url)?,
            graphql_url: Url::parse(graphql_url)?,
            repo,
        })
    }

    /// `<api>/repos/<owner>/<name>/<segments...>`
    fn repo_url(&self, repo: &RepoSlug, segments: &[&str]) -> Result<Url> {
        let mut url = self.api_url.clone();
        url.path_segments_mut()
            .map_err(|_| Error::ConfigParse {
                message: format!("API URL {} cannot be used as a base", self.api_url),
                hint: None,
            })?
            .pop_if_empty()
            .extend(["repos", repo.owner.as_str(), repo.name.as_str()])
            .extend(segments);
        Ok(url)
    }

    /// URL of a path under the overlay repository. Branch names keep their
    /// slashes as path separators.
    fn overlay_url(&self, path: &str) -> Result<Url> {
        let segments: Vec<&str> = path.split('/').collect();
        self.repo_url(&self.repo, &segments)
    }

    async fn execute(&self, operation: &str, request: RequestBuilder) -> Result<Response> {
        let request = request.build().map_err(|e| Error::Network {
            url: e.url().map(Url::to_string).unwrap_or_default(),
            message: e.to_string(),
        })?;
        let url = request.url().to_string();
        debug!("{} {} ({})", request.method(), url, operation);

        let response = self.client.execute(request).await.map_err(|e| Error::Network {
            url: url.clone(),
            message: e.to_string(),
        })?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let text = response.text().await.unwrap_or_default();
        Err(Error::Host {
            operation: operation.to_string(),
            status: Some(status.as_u16()),
            message: error_message(&text),
        })
    }

    async fn send<T: DeserializeOwned>(
        &self,
        operation: &str,
        request: RequestBuilder,
    ) -> Result<T> {
        let response = self.execute(operation, request).await?;
        response.json::<T>().await.map_err(|e| Error::Host {
            operation: operation.to_string(),
            status: None,
            message: format!("invalid response: {}", e),
        })
    }
}

/// Extract GitHub's `message` field from an error body, falling back to the
/// raw text.
fn error_message(body: &str) -> String {
    #[derive(Deserialize)]
    struct ErrorBody {
        message: String,
    }

    match serde_json::from_str::<ErrorBody>(body) {
        Ok(parsed) => parsed.message,
        Err(_) => body.trim().to_string(),
    }
}

#[derive(Debug, Deserialize)]
struct GraphQlResponse<T> {
    data: Option<T>,
    #[serde(default)]
    errors: Vec<GraphQlError>,
}

#[derive(Debug, Deserialize)]
struct GraphQlError {
    message: String,
}

#[derive(Debug, Deserialize)]
struct FileContentsData {
    repository: Option<FileContentsRepository>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FileContentsRepository {
    plugins_list: Option<BlobObject>,
    source_json: Option<BlobObject>,
}

#[derive(Debug, Deserialize)]
struct BlobObject {
    text: Option<String>,
}

impl FileContentsRepository {
    fn into_files(self) -> WorkspaceFiles {
        // An existing blob without text (binary content) still counts as present.
        WorkspaceFiles {
            source_json: self.source_json.map(|b| b.text.unwrap_or_default()),
            plugins_list: self.plugins_list.map(|b| b.text.unwrap_or_default()),
        }
    }
}

fn parse_file_contents(
    branch: &str,
    response: GraphQlResponse<FileContentsData>,
) -> Result<WorkspaceFiles> {
    if !response.errors.is_empty() {
        let messages: Vec<&str> = response
            .errors
            .iter()
            .map(|e| e.message.as_str())
            .collect();
        return Err(Error::Host {
            operation: "read workspace files".to_string(),
            status: None,
            message: messages.join("; "),
        });
    }

    response
        .data
        .and_then(|data| data.repository)
        .map(FileContentsRepository::into_files)
        .ok_or_else(|| Error::Host {
            operation: "read workspace files".to_string(),
            status: None,
            message: format!(
                "Empty repository when checking existing content on branch {}",
                branch
            ),
        })
}

#[derive(Debug, Deserialize)]
struct PullRequestResponse {
    number: u64,
    html_url: String,
    head: BranchLabel,
    base: BranchLabel,
}

#[derive(Debug, Deserialize)]
struct BranchLabel {
    #[serde(rename = "ref")]
    name: String,
}

impl From<PullRequestResponse> for PullRequest {
    fn from(pr: PullRequestResponse) -> Self {
        PullRequest {
            number: pr.number,
            html_url: pr.html_url,
            head: pr.head.name,
            base: pr.base.name,
        }
    }
}

#[derive(Debug, Deserialize)]
struct RefResponse {
    object: Sha,
}

#[derive(Debug, Deserialize)]
struct Sha {
    sha: String,
}

#[derive(Debug, Deserialize)]
struct CommitListItem {
    sha: String,
    commit: CommitDetail,
}

#[derive(Debug, Deserialize)]
struct CommitDetail {
    tree: Sha,
}

#[derive(Debug, Deserialize)]
struct CompareResponse {
    status: String,
    html_url: String,
}

#[derive(Debug, Deserialize)]
struct LabelResponse {
    name: String,
}

fn parse_comparison_status(status: &str) -> Result<ComparisonStatus> {
    match status {
        "ahead" => Ok(ComparisonStatus::Ahead),
        "behind" => Ok(ComparisonStatus::Behind),
        "identical" => Ok(ComparisonStatus::Identical),
        "diverged" => Ok(ComparisonStatus::Diverged),
        other => Err(Error::Host {
            operation: "compare commits".to_string(),
            status: None,
            message: format!("unexpected comparison status '{}'", other),
        }),
    }
}

#[async_trait]
impl VcsHost for GitHubClient {
    async fn read_workspace_files(
        &self,
        branch: &str,
        source_json_path: &str,
        plugins_list_path: &str,
    ) -> Result<WorkspaceFiles> {
        let variables = json!({
            "owner": self.repo.owner,
            "repo": self.repo.name,
            "pluginsList": format!("{}:{}", branch, plugins_list_path),
            "sourceJson": format!("{}:{}", branch, source_json_path),
        });
        let request = self
            .client
            .post(self.graphql_url.clone())
            .json(&json!({ "query": FILE_CONTENTS_QUERY, "variables": variables }));

        let response: GraphQlResponse<FileContentsData> =
            self.send("read workspace files", request).await?;
        parse_file_contents(branch, response)
    }

    async fn list_pull_requests(&self, base: &str, head: &str) -> Result<Vec<PullRequest>> {
        let mut url = self.overlay_url("pulls")?;
        url.query_pairs_mut()
            .append_pair("state", "open")
            .append_pair("base", base)
            .append_pair("head", head);

        let prs: Vec<PullRequestResponse> =
            self.send("list pull requests", self.client.get(url)).await?;
        Ok(prs.into_iter().map(PullRequest::from).collect())
    }

    async fn get_branch(&self, branch: &str) -> Result<Option<String>> {
        let url = self.overlay_url(&format!("git/ref/heads/{}", branch))?;
        match self.send::<RefResponse>("get ref", self.client.get(url)).await {
            Ok(reference) => Ok(Some(reference.object.sha)),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn latest_commit(&self, branch: &str) -> Result<CommitInfo> {
        let mut url = self.overlay_url("commits")?;
        url.query_pairs_mut()
            .append_pair("sha", branch)
            .append_pair("per_page", "1");

        let commits: Vec<CommitListItem> = self.send("list commits", self.client.get(url)).await?;
        commits
            .into_iter()
            .next()
            .map(|c| CommitInfo {
                sha: c.sha,
                tree_sha: c.commit.tree.sha,
            })
            .ok_or_else(|| Error::Host {
                operation: "list commits".to_string(),
                status: None,
                message: format!("no commits found on branch {}", branch),
            })
    }

    async fn compare_commits(&self, repo: &RepoSlug, base: &str, head: &str) -> Result<Comparison> {
        let basehead = format!("{}...{}", base, head);
        let url = self.repo_url(repo, &["compare", &basehead])?;
        let comparison: CompareResponse = self.send("compare commits", self.client.get(url)).await?;
        Ok(Comparison {
            status: parse_comparison_status(&comparison.status)?,
            html_url: comparison.html_url,
        })
    }

    async fn create_tree(&self, base_tree: &str, entries: &[TreeEntry]) -> Result<String> {
        let tree: Vec<_> = entries
            .iter()
            .map(|entry| {
                json!({
                    "path": entry.path,
                    "mode": "100644",
                    "type": "blob",
                    "content": entry.content,
                })
            })
            .collect();
        let request = self
            .client
            .post(self.overlay_url("git/trees")?)
            .json(&json!({ "base_tree": base_tree, "tree": tree }));

        let created: Sha = self.send("create tree", request).await?;
        Ok(created.sha)
    }

    async fn create_commit(&self, message: &str, tree: &str, parents: &[String]) -> Result<String> {
        let request = self
            .client
            .post(self.overlay_url("git/commits")?)
            .json(&json!({ "message": message, "tree": tree, "parents": parents }));

        let created: Sha = self.send("create commit", request).await?;
        Ok(created.sha)
    }

    async fn create_ref(&self, branch: &str, sha: &str) -> Result<()> {
        let request = self
            .client
            .post(self.overlay_url("git/refs")?)
            .json(&json!({ "ref": format!("refs/heads/{}", branch), "sha": sha }));
        self.execute("create ref", request).await?;
        Ok(())
    }

    async fn update_ref(&self, branch: &str, sha: &str) -> Result<()> {
        let request = self
            .client
            .patch(self.overlay_url(&format!("git/refs/heads/{}", branch))?)
            .json(&json!({ "sha": sha, "force": false }));
        self.execute("update ref", request).await?;
        Ok(())
    }

    async fn create_pull_request(
        &self,
        head: &str,
        base: &str,
        content: &PullRequestContent,
    ) -> Result<PullRequest> {
        let request = self.client.post(self.overlay_url("pulls")?).json(&json!({
            "head": head,
            "base": base,
            "title": content.title,
            "body": content.body,
        }));
        let pr: PullRequestResponse = self.send("create pull request", request).await?;
        Ok(pr.into())
    }

    async fn update_pull_request(
        &self,
        number: u64,
        base: &str,
        content: &PullRequestContent,
    ) -> Result<PullRequest> {
        let request = self
            .client
            .patch(self.overlay_url(&format!("pulls/{}", number))?)
            .json(&json!({
                "base": base,
                "title": content.title,
                "body": content.body,
            }));
        let pr: PullRequestResponse = self.send("update pull request", request).await?;
        Ok(pr.into())
    }

    async fn list_labels(&self, issue: u64) -> Result<Vec<String>> {
        let url = self.overlay_url(&format!("issues/{}/labels", issue))?;
        let labels: Vec<LabelResponse> = self.send("list labels", self.client.get(url)).await?;
        Ok(labels.into_iter().map(|l| l.name).collect())
    }

    async fn add_labels(&self, issue: u64, labels: &[String]) -> Result<()> {
        let request = self
            .client
            .post(self.overlay_url(&format!("issues/{}/labels", issue))?)
            .json(&json!({ "labels": labels }));
        self.execute("add labels", request).await?;
        Ok(())
    }

    async fn remove_label(&self, issue: u64, label: &str) -> Result<()> {
        let number = issue.to_string();
        let url = self.repo_url(&self.repo, &["issues", &number, "labels", label])?;
        self.execute("remove label", self.client.delete(url)).await?;
        Ok(())
    }

    async fn create_comment(&self, issue: u64, body: &str) -> Result<()> {
        let request = self
            .client
            .post(self.overlay_url(&format!("issues/{}/comments", issue))?)
            .json(&json!({ "body": body }));
        self.execute("create comment", request).await?;
        Ok(())
    }
}
