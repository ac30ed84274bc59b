//! Hand-off of persisted materials to the hosting platform
//!
//! Building commit trees and opening pull requests happens outside this
//! crate. [`ManifestPublisher`] records everything such tooling needs in a
//! `publish.json` next to the materials.

use crate::error::{Error, Result};
use crate::materials::Materials;
use crate::services::BoxFuture;
use serde::Serialize;
use std::path::{Path, PathBuf};

/// File name of the publication manifest
pub const MANIFEST_FILE: &str = "publish.json";

/// Where and how the signed materials should be proposed
#[derive(Debug, Clone, Serialize)]
pub struct PublishTarget {
    /// Owner of the repository receiving the commit
    pub owner: String,
    /// Repository receiving the commit
    pub repo: String,
    /// Branch the commit branch is created from
    pub base_branch: String,
    /// Branch holding the new commit; derived from the materials id when empty
    pub commit_branch: Option<String>,
    /// Commit message
    pub commit_message: String,
    /// Owner of the repository the pull request targets, defaults to `owner`
    pub merge_repo_owner: Option<String>,
    /// Repository the pull request targets, defaults to `repo`
    pub merge_repo: Option<String>,
    /// Branch the pull request merges into
    pub merge_branch: String,
    /// Pull request title; no pull request is proposed without one
    pub pr_title: Option<String>,
    /// Pull request description
    pub pr_text: String,
    /// Commit author name
    pub author_name: String,
    /// Commit author email
    pub author_email: String,
}

impl PublishTarget {
    /// Target `owner/repo` with the default branches and author
    pub fn new(owner: impl Into<String>, repo: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            repo: repo.into(),
            base_branch: "main".to_string(),
            commit_branch: None,
            commit_message: String::new(),
            merge_repo_owner: None,
            merge_repo: None,
            merge_branch: "main".to_string(),
            pr_title: None,
            pr_text: String::new(),
            author_name: "sigstore".to_string(),
            author_email: "sign@sigstore.dev".to_string(),
        }
    }
}

/// Proposes persisted materials for publication
pub trait Publisher: Send + Sync {
    /// Publish the materials of one sign invocation together with the script
    fn publish<'a>(
        &'a self,
        materials: &'a Materials,
        script: &'a Path,
        target: &'a PublishTarget,
    ) -> BoxFuture<'a, Result<()>>;
}

#[derive(Debug, Serialize)]
struct Manifest<'a> {
    owner: &'a str,
    repo: &'a str,
    base_branch: &'a str,
    commit_branch: String,
    commit_message: String,
    merge_repo_owner: &'a str,
    merge_repo: &'a str,
    merge_branch: &'a str,
    pull_request: Option<PullRequest<'a>>,
    author: Author<'a>,
    files: Vec<PathBuf>,
}

#[derive(Debug, Serialize)]
struct PullRequest<'a> {
    title: &'a str,
    text: &'a str,
}

#[derive(Debug, Serialize)]
struct Author<'a> {
    name: &'a str,
    email: &'a str,
}

fn manifest<'a>(materials: &Materials, script: &Path, target: &'a PublishTarget) -> Manifest<'a> {
    let id = materials.id.to_string();
    Manifest {
        owner: &target.owner,
        repo: &target.repo,
        base_branch: &target.base_branch,
        commit_branch: target
            .commit_branch
            .clone()
            .filter(|b| !b.is_empty())
            .unwrap_or_else(|| id.clone()),
        commit_message: if target.commit_message.is_empty() {
            format!("Add signed materials {}", id)
        } else {
            target.commit_message.clone()
        },
        merge_repo_owner: target.merge_repo_owner.as_deref().unwrap_or(&target.owner),
        merge_repo: target.merge_repo.as_deref().unwrap_or(&target.repo),
        merge_branch: &target.merge_branch,
        pull_request: target
            .pr_title
            .as_deref()
            .filter(|t| !t.is_empty())
            .map(|title| PullRequest {
                title,
                text: &target.pr_text,
            }),
        author: Author {
            name: &target.author_name,
            email: &target.author_email,
        },
        files: vec![
            materials.signature.clone(),
            materials.certificate.clone(),
            script.to_path_buf(),
        ],
    }
}

/// Writes `publish.json` into the materials directory
#[derive(Debug, Default)]
pub struct ManifestPublisher;

impl Publisher for ManifestPublisher {
    fn publish<'a>(
        &'a self,
        materials: &'a Materials,
        script: &'a Path,
        target: &'a PublishTarget,
    ) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            let path = materials.dir.join(MANIFEST_FILE);
            let body = serde_json::to_vec_pretty(&manifest(materials, script, target))
                .map_err(|e| Error::Io(std::io::Error::other(e)))?;
            tokio::fs::write(&path, body).await?;
            tracing::info!(manifest = %path.display(), "publication manifest written");
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::materials::MaterialsId;

    #[test]
    fn test_defaults_follow_target() {
        let materials = Materials::layout(Path::new("store"), MaterialsId::from_nanos(9));
        let target = PublishTarget::new("octo", "scripts");
        let m = manifest(&materials, Path::new("install.sh"), &target);

        assert_eq!(m.commit_branch, "9");
        assert_eq!(m.commit_message, "Add signed materials 9");
        assert_eq!(m.merge_repo_owner, "octo");
        assert_eq!(m.merge_repo, "scripts");
        assert!(m.pull_request.is_none());
        assert_eq!(m.files.len(), 3);
    }

    #[tokio::test]
    async fn test_manifest_written_next_to_materials() {
        let root = tempfile::tempdir().unwrap();
        let materials = Materials::layout(root.path(), MaterialsId::from_nanos(3));
        std::fs::create_dir_all(&materials.dir).unwrap();

        let mut target = PublishTarget::new("octo", "scripts");
        target.pr_title = Some("Sign install.sh".to_string());
        target.merge_repo_owner = Some("upstream".to_string());

        ManifestPublisher
            .publish(&materials, Path::new("install.sh"), &target)
            .await
            .unwrap();

        let written: serde_json::Value = serde_json::from_slice(
            &std::fs::read(materials.dir.join(MANIFEST_FILE)).unwrap(),
        )
        .unwrap();
        assert_eq!(written["pull_request"]["title"], "Sign install.sh");
        assert_eq!(written["merge_repo_owner"], "upstream");
        assert_eq!(written["author"]["email"], "sign@sigstore.dev");
    }
}
