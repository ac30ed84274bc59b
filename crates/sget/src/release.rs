//! Release asset source
//!
//! A release is published as one commit holding three files: the script
//! (`.sh`), its signature container (`.bin`) and the signing certificate
//! (`.pem`). [`GithubReleaseSource`] finds that commit through the GitHub
//! REST API; [`fetch_all`] downloads the three files concurrently.

use crate::error::{Error, Result};
use crate::scope::Scope;
use crate::services::BoxFuture;
use serde::Deserialize;
use sget_oidc::Secret;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::task::JoinSet;

/// Tag that resolves to the most recent release
pub const LATEST: &str = "latest";

/// Which release to install
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReleaseCoordinates {
    /// Repository owner
    pub owner: String,
    /// Repository name
    pub repo: String,
    /// Release tag, or `latest`
    pub tag: String,
}

impl ReleaseCoordinates {
    /// Coordinates of a tagged release
    pub fn new(owner: impl Into<String>, repo: impl Into<String>, tag: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            repo: repo.into(),
            tag: tag.into(),
        }
    }
}

impl std::fmt::Display for ReleaseCoordinates {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}@{}", self.owner, self.repo, self.tag)
    }
}

/// A file in a release, with the URL of its raw content
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReleaseAsset {
    /// File name (possibly with directories)
    pub name: String,
    /// Raw content URL
    pub url: String,
}

impl ReleaseAsset {
    /// Final path component of the name
    pub fn file_name(&self) -> &str {
        self.name.rsplit('/').next().unwrap_or(&self.name)
    }
}

/// Role of a release file, from its extension
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssetKind {
    /// `.pem` signing certificate
    Certificate,
    /// `.bin` signature container
    Signature,
    /// `.sh` script
    Script,
}

impl AssetKind {
    /// Classify a file name; unrelated files yield `None`
    pub fn of(name: &str) -> Option<Self> {
        match Path::new(name).extension()?.to_str()? {
            "pem" => Some(AssetKind::Certificate),
            "bin" => Some(AssetKind::Signature),
            "sh" => Some(AssetKind::Script),
            _ => None,
        }
    }
}

/// Exactly one asset of each kind
#[derive(Debug, Clone)]
pub struct ReleaseAssets {
    pub certificate: ReleaseAsset,
    pub signature: ReleaseAsset,
    pub script: ReleaseAsset,
}

impl ReleaseAssets {
    /// Pick the certificate, signature and script out of a file list
    pub fn classify(assets: Vec<ReleaseAsset>) -> Result<Self> {
        let mut certificate = None;
        let mut signature = None;
        let mut script = None;

        for asset in assets {
            let slot = match AssetKind::of(&asset.name) {
                Some(AssetKind::Certificate) => &mut certificate,
                Some(AssetKind::Signature) => &mut signature,
                Some(AssetKind::Script) => &mut script,
                None => {
                    tracing::debug!(name = %asset.name, "ignoring unrelated release file");
                    continue;
                }
            };
            if let Some(previous) = slot.replace(asset) {
                return Err(Error::AssetFetch(format!(
                    "release holds more than one file like {}",
                    previous.name
                )));
            }
        }

        let missing = |what: &str| Error::AssetFetch(format!("release has no {} file", what));
        Ok(Self {
            certificate: certificate.ok_or_else(|| missing(".pem certificate"))?,
            signature: signature.ok_or_else(|| missing(".bin signature"))?,
            script: script.ok_or_else(|| missing(".sh script"))?,
        })
    }
}

/// Lists and downloads release files
pub trait ReleaseSource: Send + Sync {
    /// Files changed in the release's commit
    fn list_assets<'a>(
        &'a self,
        release: &'a ReleaseCoordinates,
    ) -> BoxFuture<'a, Result<Vec<ReleaseAsset>>>;

    /// Stream one asset into `dest`, returning the number of bytes written
    fn fetch<'a>(&'a self, asset: &'a ReleaseAsset, dest: &'a Path) -> BoxFuture<'a, Result<u64>>;
}

/// Local paths of the downloaded assets
#[derive(Debug, Clone)]
pub struct FetchedAssets {
    pub certificate: PathBuf,
    pub signature: PathBuf,
    pub script: PathBuf,
}

/// Download all three assets into `dir` concurrently
///
/// Each download runs under `per_asset` timeout. The first failure aborts
/// the remaining downloads; verification never sees a partial set.
pub async fn fetch_all(
    source: Arc<dyn ReleaseSource>,
    assets: &ReleaseAssets,
    dir: &Path,
    per_asset: Duration,
    scope: &Scope,
) -> Result<FetchedAssets> {
    let jobs = [
        (AssetKind::Certificate, &assets.certificate),
        (AssetKind::Signature, &assets.signature),
        (AssetKind::Script, &assets.script),
    ];

    let mut set = JoinSet::new();
    for (kind, asset) in jobs {
        let source = Arc::clone(&source);
        let asset = asset.clone();
        let dest = dir.join(asset.file_name());
        set.spawn(async move {
            let written = tokio::time::timeout(per_asset, source.fetch(&asset, &dest))
                .await
                .map_err(|_| {
                    Error::AssetFetch(format!("download of {} timed out", asset.name))
                })??;
            tracing::debug!(name = %asset.name, bytes = written, "asset downloaded");
            Ok::<_, Error>((kind, dest))
        });
    }

    let collected = scope
        .guard(async {
            let mut done = Vec::with_capacity(3);
            while let Some(joined) = set.join_next().await {
                let finished = joined
                    .map_err(|e| Error::AssetFetch(format!("download task failed: {}", e)))??;
                done.push(finished);
            }
            Ok::<_, Error>(done)
        })
        .await;

    // Stops whatever is still running after a failure or cancellation
    set.abort_all();
    let collected = collected?;

    let path_of = |wanted: AssetKind| {
        collected
            .iter()
            .find(|(kind, _)| *kind == wanted)
            .map(|(_, path)| path.clone())
            .ok_or_else(|| Error::AssetFetch("download set incomplete".to_string()))
    };

    Ok(FetchedAssets {
        certificate: path_of(AssetKind::Certificate)?,
        signature: path_of(AssetKind::Signature)?,
        script: path_of(AssetKind::Script)?,
    })
}

#[derive(Debug, Deserialize)]
struct Release {
    tag_name: String,
    target_commitish: String,
}

#[derive(Debug, Deserialize)]
struct Commit {
    #[serde(default)]
    files: Vec<CommitFile>,
}

#[derive(Debug, Deserialize)]
struct CommitFile {
    filename: String,
    raw_url: String,
}

/// Release source backed by the GitHub REST API
pub struct GithubReleaseSource {
    api_url: String,
    token: Option<Secret>,
    client: reqwest::Client,
}

impl GithubReleaseSource {
    /// Talk to the API at `api_url`, e.g. `https://api.github.com`
    pub fn new(api_url: impl Into<String>, token: Option<Secret>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("sget/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| Error::Config(format!("cannot build HTTP client: {}", e)))?;
        Ok(Self {
            api_url: api_url.into().trim_end_matches('/').to_string(),
            token: token.filter(|t| !t.is_empty()),
            client,
        })
    }

    fn release_url(&self, release: &ReleaseCoordinates) -> String {
        if release.tag == LATEST {
            format!(
                "{}/repos/{}/{}/releases/latest",
                self.api_url, release.owner, release.repo
            )
        } else {
            format!(
                "{}/repos/{}/{}/releases/tags/{}",
                self.api_url, release.owner, release.repo, release.tag
            )
        }
    }

    fn commit_url(&self, release: &ReleaseCoordinates, commitish: &str) -> String {
        format!(
            "{}/repos/{}/{}/commits/{}",
            self.api_url, release.owner, release.repo, commitish
        )
    }

    fn get(&self, url: &str) -> reqwest::RequestBuilder {
        let request = self
            .client
            .get(url)
            .header(reqwest::header::ACCEPT, "application/vnd.github+json");
        match &self.token {
            Some(token) => request.bearer_auth(token.expose()),
            None => request,
        }
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, url: &str) -> Result<T> {
        let response = self
            .get(url)
            .send()
            .await
            .map_err(|e| Error::AssetFetch(format!("request to {} failed: {}", url, e)))?;
        if !response.status().is_success() {
            return Err(Error::AssetFetch(format!(
                "{} returned status {}",
                url,
                response.status()
            )));
        }
        response
            .json()
            .await
            .map_err(|e| Error::AssetFetch(format!("unexpected response from {}: {}", url, e)))
    }
}

impl ReleaseSource for GithubReleaseSource {
    fn list_assets<'a>(
        &'a self,
        release: &'a ReleaseCoordinates,
    ) -> BoxFuture<'a, Result<Vec<ReleaseAsset>>> {
        Box::pin(async move {
            let found: Release = self.get_json(&self.release_url(release)).await?;
            tracing::info!(tag = %found.tag_name, commit = %found.target_commitish, "resolved release");

            let commit: Commit = self
                .get_json(&self.commit_url(release, &found.target_commitish))
                .await?;
            Ok(commit
                .files
                .into_iter()
                .map(|f| ReleaseAsset {
                    name: f.filename,
                    url: f.raw_url,
                })
                .collect())
        })
    }

    fn fetch<'a>(&'a self, asset: &'a ReleaseAsset, dest: &'a Path) -> BoxFuture<'a, Result<u64>> {
        Box::pin(async move {
            let mut response = self
                .get(&asset.url)
                .send()
                .await
                .map_err(|e| Error::AssetFetch(format!("download of {} failed: {}", asset.name, e)))?;
            if !response.status().is_success() {
                return Err(Error::AssetFetch(format!(
                    "download of {} returned status {}",
                    asset.name,
                    response.status()
                )));
            }

            let mut file = tokio::fs::File::create(dest).await?;
            let mut written = 0u64;
            while let Some(chunk) = response
                .chunk()
                .await
                .map_err(|e| Error::AssetFetch(format!("download of {} failed: {}", asset.name, e)))?
            {
                file.write_all(&chunk).await?;
                written += chunk.len() as u64;
            }
            file.flush().await?;
            Ok(written)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use tokio_util::sync::CancellationToken;

    fn asset(name: &str) -> ReleaseAsset {
        ReleaseAsset {
            name: name.to_string(),
            url: format!("https://raw.example/{}", name),
        }
    }

    #[rstest]
    #[case("fulcio_cert_1.pem", Some(AssetKind::Certificate))]
    #[case("signature_1.bin", Some(AssetKind::Signature))]
    #[case("scripts/install.sh", Some(AssetKind::Script))]
    #[case("signature_1.sig", None)]
    #[case("README.md", None)]
    #[case("Makefile", None)]
    fn test_asset_kind(#[case] name: &str, #[case] kind: Option<AssetKind>) {
        assert_eq!(AssetKind::of(name), kind);
    }

    #[test]
    fn test_classify_complete_release() {
        let assets = ReleaseAssets::classify(vec![
            asset("README.md"),
            asset(".sigstore/1/fulcio_cert_1.pem"),
            asset(".sigstore/1/signature_1.bin"),
            asset("install.sh"),
        ])
        .unwrap();
        assert_eq!(assets.certificate.file_name(), "fulcio_cert_1.pem");
        assert_eq!(assets.signature.file_name(), "signature_1.bin");
        assert_eq!(assets.script.name, "install.sh");
    }

    #[test]
    fn test_classify_rejects_missing_signature() {
        let result = ReleaseAssets::classify(vec![asset("c.pem"), asset("s.sig"), asset("i.sh")]);
        assert!(matches!(result, Err(Error::AssetFetch(_))));
    }

    #[test]
    fn test_classify_rejects_duplicates() {
        let result = ReleaseAssets::classify(vec![
            asset("c.pem"),
            asset("s.bin"),
            asset("a.sh"),
            asset("b.sh"),
        ]);
        assert!(matches!(result, Err(Error::AssetFetch(_))));
    }

    #[test]
    fn test_github_urls() {
        let source = GithubReleaseSource::new("https://api.github.com/", None).unwrap();
        let latest = ReleaseCoordinates::new("octo", "scripts", LATEST);
        assert_eq!(
            source.release_url(&latest),
            "https://api.github.com/repos/octo/scripts/releases/latest"
        );
        let tagged = ReleaseCoordinates::new("octo", "scripts", "v1.2.0");
        assert_eq!(
            source.release_url(&tagged),
            "https://api.github.com/repos/octo/scripts/releases/tags/v1.2.0"
        );
        assert_eq!(
            source.commit_url(&tagged, "abc123"),
            "https://api.github.com/repos/octo/scripts/commits/abc123"
        );
    }

    #[test]
    fn test_commit_files_parse() {
        let commit: Commit = serde_json::from_str(
            r#"{"sha":"abc","files":[{"filename":"install.sh","raw_url":"https://raw/install.sh","status":"added"}]}"#,
        )
        .unwrap();
        assert_eq!(commit.files[0].filename, "install.sh");
    }

    /// Serves fixed contents; one asset name can be made to hang forever
    struct StubSource {
        hang_on: Option<&'static str>,
    }

    impl ReleaseSource for StubSource {
        fn list_assets<'a>(
            &'a self,
            _release: &'a ReleaseCoordinates,
        ) -> BoxFuture<'a, Result<Vec<ReleaseAsset>>> {
            Box::pin(async { Ok(vec![]) })
        }

        fn fetch<'a>(
            &'a self,
            asset: &'a ReleaseAsset,
            dest: &'a Path,
        ) -> BoxFuture<'a, Result<u64>> {
            Box::pin(async move {
                if self.hang_on == Some(asset.name.as_str()) {
                    std::future::pending::<()>().await;
                }
                tokio::fs::write(dest, asset.name.as_bytes()).await?;
                Ok(asset.name.len() as u64)
            })
        }
    }

    fn three() -> ReleaseAssets {
        ReleaseAssets::classify(vec![asset("c.pem"), asset("s.bin"), asset("i.sh")]).unwrap()
    }

    #[tokio::test]
    async fn test_fetch_all_downloads_every_asset() {
        let dir = tempfile::tempdir().unwrap();
        let scope = Scope::unbounded(CancellationToken::new());
        let fetched = fetch_all(
            Arc::new(StubSource { hang_on: None }),
            &three(),
            dir.path(),
            Duration::from_secs(5),
            &scope,
        )
        .await
        .unwrap();
        assert_eq!(std::fs::read_to_string(fetched.script).unwrap(), "i.sh");
        assert_eq!(std::fs::read_to_string(fetched.signature).unwrap(), "s.bin");
    }

    #[tokio::test]
    async fn test_fetch_all_fails_on_one_slow_asset() {
        let dir = tempfile::tempdir().unwrap();
        let scope = Scope::unbounded(CancellationToken::new());
        let result = fetch_all(
            Arc::new(StubSource {
                hang_on: Some("s.bin"),
            }),
            &three(),
            dir.path(),
            Duration::from_millis(50),
            &scope,
        )
        .await;
        assert!(matches!(result, Err(Error::AssetFetch(_))));
    }

    #[tokio::test]
    async fn test_fetch_all_honours_cancellation() {
        let dir = tempfile::tempdir().unwrap();
        let cancel = CancellationToken::new();
        cancel.cancel();
        let scope = Scope::unbounded(cancel);
        let result = fetch_all(
            Arc::new(StubSource {
                hang_on: Some("i.sh"),
            }),
            &three(),
            dir.path(),
            Duration::from_secs(60),
            &scope,
        )
        .await;
        assert!(matches!(result, Err(Error::Cancelled)));
    }
}
