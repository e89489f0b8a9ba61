//! Push event payload, reduced to the fields the pipeline reads.

use serde::Deserialize;

use crate::domain::{RepoId, UserId};

const ZERO_SHA: &str = "0000000000000000000000000000000000000000";

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PushEvent {
    #[serde(rename = "ref", default)]
    pub git_ref: String,
    #[serde(default)]
    pub before: Option<String>,
    #[serde(default)]
    pub forced: bool,
    #[serde(default)]
    pub commits: Vec<PushCommit>,
    #[serde(default)]
    pub repository: Option<PushRepository>,
    #[serde(default)]
    pub sender: Option<PushSender>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PushRepository {
    pub id: Option<RepoId>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub full_name: Option<String>,
    #[serde(default)]
    pub language: Option<String>,
    #[serde(default)]
    pub default_branch: Option<String>,
    #[serde(default)]
    pub master_branch: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PushCommit {
    pub id: String,
    #[serde(default)]
    pub message: String,
    /// Present only in enriched payloads; push events usually omit it.
    #[serde(default)]
    pub parents: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PushSender {
    pub id: UserId,
    #[serde(default)]
    pub login: Option<String>,
}

impl PushEvent {
    pub fn repo_id(&self) -> Option<RepoId> {
        self.repository.as_ref().and_then(|r| r.id)
    }

    /// `refs/heads/<default branch>`, falling back to `master_branch`, then `master`.
    pub fn accepted_ref(&self) -> String {
        let branch = self
            .repository
            .as_ref()
            .and_then(|r| r.default_branch.as_deref().or(r.master_branch.as_deref()))
            .unwrap_or("master");
        format!("refs/heads/{branch}")
    }

    pub fn is_default_branch(&self) -> bool {
        self.git_ref == self.accepted_ref()
    }

    /// First-parent id of each commit, in push order.
    ///
    /// An explicit `parents[0]` wins. Otherwise each commit after the first
    /// has the commit before it as parent. The first commit's parent is
    /// `before`, unless the branch is new (all-zero id) or the push is forced:
    /// then `before` is the rewritten tip and the parent stays unknown.
    pub fn parent_ids(&self) -> Vec<Option<String>> {
        let mut previous = self
            .before
            .clone()
            .filter(|b| !self.forced && b != ZERO_SHA && !b.is_empty());
        self.commits
            .iter()
            .map(|c| {
                let parent = c.parents.first().cloned().or_else(|| previous.clone());
                previous = Some(c.id.clone());
                parent
            })
            .collect()
    }
}
