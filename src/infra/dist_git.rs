//! SRPMs rebuilt from dist-git
//!
//! When the source hub has no build of a package, its spec file is taken
//! from dist-git (src.fedoraproject.org by default), the `Source` files are
//! downloaded and `rpmbuild -bs` produces the SRPM locally.

use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use std::time::Duration;

use regex::Regex;
use tokio::process::Command;

use crate::config::{defaults, urls};
use crate::error::SourceError;
use crate::infra::download::SrpmDownloader;
use crate::infra::process;

/// Spec files and sources from a dist-git server
#[derive(Debug, Clone)]
pub struct DistGit {
    base_url: String,
    lookaside_url: String,
    branch: String,
    rpmbuild: PathBuf,
    client: reqwest::Client,
    downloader: SrpmDownloader,
}

impl DistGit {
    /// Fedora dist-git, reading specs from `branch`
    pub fn new(branch: impl Into<String>) -> Self {
        Self {
            base_url: urls::FEDORA_DIST_GIT.to_string(),
            lookaside_url: urls::FEDORA_LOOKASIDE.to_string(),
            branch: branch.into(),
            rpmbuild: PathBuf::from("rpmbuild"),
            client: reqwest::Client::builder()
                .timeout(Duration::from_secs(30))
                .build()
                .unwrap_or_else(|_| reqwest::Client::new()),
            downloader: SrpmDownloader::new(),
        }
    }

    /// Use another dist-git server and lookaside cache
    #[must_use]
    pub fn with_urls(
        mut self,
        base_url: impl Into<String>,
        lookaside_url: impl Into<String>,
    ) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self.lookaside_url = lookaside_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Use another `rpmbuild` binary
    #[must_use]
    pub fn with_rpmbuild(mut self, rpmbuild: impl Into<PathBuf>) -> Self {
        self.rpmbuild = rpmbuild.into();
        self
    }

    /// Raw spec file URL of `package`
    pub fn spec_url(&self, package: &str) -> String {
        format!(
            "{}/{package}/raw/{}/f/{package}.spec",
            self.base_url, self.branch
        )
    }

    /// Where a `Source` entry of `package` is downloaded from
    pub fn source_url(&self, package: &str, entry: &str) -> String {
        if is_remote(entry) {
            entry.to_string()
        } else {
            format!("{}/{package}/{entry}", self.lookaside_url)
        }
    }

    async fn fetch_spec(&self, package: &str) -> Result<Option<String>, SourceError> {
        let url = self.spec_url(package);
        let unavailable = |reason: String| SourceError::Unavailable {
            package: package.to_string(),
            reason,
        };

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| unavailable(format!("{url}: {e}")))?;
        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !response.status().is_success() {
            return Err(unavailable(format!("{url}: HTTP {}", response.status())));
        }
        let spec = response
            .text()
            .await
            .map_err(|e| unavailable(format!("{url}: {e}")))?;
        Ok(Some(spec))
    }

    /// Build an SRPM of `package` into `dir`
    ///
    /// Returns `Ok(None)` when dist-git has no such package. Sources that
    /// cannot be downloaded are skipped; `rpmbuild` reports them if they
    /// matter.
    pub async fn build_srpm(
        &self,
        package: &str,
        dir: &Path,
    ) -> Result<Option<PathBuf>, SourceError> {
        let Some(spec) = self.fetch_spec(package).await? else {
            tracing::debug!("No spec for {package} on {}", self.branch);
            return Ok(None);
        };

        let work_dir = dir.join("build");
        let sources_dir = work_dir.join("SOURCES");
        let io = |path: &Path, e: std::io::Error| SourceError::IoError {
            path: path.to_path_buf(),
            error: e.to_string(),
        };
        tokio::fs::create_dir_all(&sources_dir)
            .await
            .map_err(|e| io(&sources_dir, e))?;
        let spec_path = work_dir.join(format!("{package}.spec"));
        tokio::fs::write(&spec_path, &spec)
            .await
            .map_err(|e| io(&spec_path, e))?;

        for entry in source_entries(&spec) {
            let url = self.source_url(package, &entry);
            let dest = sources_dir.join(source_file_name(&entry));
            if let Err(e) = self.downloader.fetch_to(&url, &dest, None, None).await {
                tracing::warn!("Source {entry} of {package} not downloaded: {e}");
            }
        }

        tracing::info!("Building SRPM of {package} from dist-git");
        let mut command = Command::new(&self.rpmbuild);
        command
            .arg("-bs")
            .arg("--define")
            .arg(format!("_topdir {}", work_dir.display()))
            .arg("--define")
            .arg(format!("_sourcedir {}", sources_dir.display()))
            .arg("--define")
            .arg(format!("_srcrpmdir {}", dir.display()))
            .arg(&spec_path);
        let display = format!("{} -bs {}", self.rpmbuild.display(), spec_path.display());
        process::run(
            command,
            &display,
            Duration::from_secs(defaults::RPMBUILD_TIMEOUT),
        )
        .await
        .map_err(|e| SourceError::Unavailable {
            package: package.to_string(),
            reason: e.to_string(),
        })?;

        crate::infra::fetch::find_srpm(dir)
            .map(Some)
            .ok_or_else(|| SourceError::Unavailable {
                package: package.to_string(),
                reason: "rpmbuild produced no .src.rpm".to_string(),
            })
    }
}

fn is_remote(entry: &str) -> bool {
    ["http://", "https://", "ftp://"]
        .iter()
        .any(|scheme| entry.starts_with(scheme))
}

/// Values of the `SourceN:` tags of a spec file
pub fn source_entries(spec: &str) -> Vec<String> {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    let pattern =
        PATTERN.get_or_init(|| Regex::new(r"(?mi)^Source\d*:\s*(.+?)\s*$").expect("valid regex"));
    pattern
        .captures_iter(spec)
        .map(|caps| caps[1].to_string())
        .collect()
}

/// Local file name of a `Source` entry
///
/// A `#/name` fragment names the file explicitly.
pub fn source_file_name(entry: &str) -> String {
    if let Some((_, name)) = entry.rsplit_once("#/") {
        return name.to_string();
    }
    let path = entry.split(['?', '#']).next().unwrap_or(entry);
    path.rsplit('/').next().unwrap_or(path).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const SPEC: &str = "\
Name:    foo
Version: 1.0
Release: 1
Source0: foo-1.0.tar.gz
source1: https://example.org/dl/extra.tar.xz#/foo-extra.tar.xz
Patch0:  fix.patch
";

    #[test]
    fn test_source_entries() {
        assert_eq!(
            source_entries(SPEC),
            vec![
                "foo-1.0.tar.gz",
                "https://example.org/dl/extra.tar.xz#/foo-extra.tar.xz"
            ]
        );
        assert!(source_entries("Name: bar\n").is_empty());
    }

    #[test]
    fn test_source_file_name() {
        assert_eq!(source_file_name("foo-1.0.tar.gz"), "foo-1.0.tar.gz");
        assert_eq!(source_file_name("https://h/a/b/bar.zip"), "bar.zip");
        assert_eq!(source_file_name("https://h/archive/v1.tar.gz#/baz-1.tar.gz"), "baz-1.tar.gz");
    }

    #[test]
    fn test_urls() {
        let git = DistGit::new("f40");
        assert_eq!(
            git.spec_url("foo"),
            "https://src.fedoraproject.org/rpms/foo/raw/f40/f/foo.spec"
        );
        assert_eq!(
            git.source_url("foo", "foo-1.0.tar.gz"),
            "https://src.fedoraproject.org/lookaside/pkgs/foo/foo-1.0.tar.gz"
        );
        assert_eq!(git.source_url("foo", "https://h/x.tgz"), "https://h/x.tgz");
    }

    #[tokio::test]
    async fn test_unknown_package_is_none() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let git = DistGit::new("rawhide").with_urls(server.uri(), server.uri());
        assert!(git.build_srpm("ghost", dir.path()).await.unwrap().is_none());
        assert!(!dir.path().join("build").exists());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_build_srpm_downloads_sources_and_runs_rpmbuild() {
        use crate::test_utils::fakes::write_script;

        let server = MockServer::start().await;
        let spec = format!(
            "Name: foo\nSource0: foo-1.0.tar.gz\nSource1: {}/dl/extra.tar.xz\n",
            server.uri()
        );
        Mock::given(method("GET"))
            .and(path("/rpms/foo/raw/rawhide/f/foo.spec"))
            .respond_with(ResponseTemplate::new(200).set_body_string(spec))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/lookaside/foo/foo-1.0.tar.gz"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"tarball".to_vec()))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/dl/extra.tar.xz"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"extra".to_vec()))
            .expect(1)
            .mount(&server)
            .await;

        // -bs --define "_topdir W" --define "_sourcedir S" --define "_srcrpmdir D" SPEC
        let dir = tempfile::tempdir().unwrap();
        let rpmbuild = write_script(
            dir.path(),
            "rpmbuild",
            r#"ls "${5#_sourcedir }" > "${7#_srcrpmdir }/sources.txt"
: > "${7#_srcrpmdir }/foo-1.0-1.src.rpm""#,
        );
        let git = DistGit::new("rawhide")
            .with_urls(format!("{}/rpms", server.uri()), format!("{}/lookaside", server.uri()))
            .with_rpmbuild(rpmbuild);

        let out = dir.path().join("srpms/foo");
        let srpm = git.build_srpm("foo", &out).await.unwrap().unwrap();
        assert_eq!(srpm, out.join("foo-1.0-1.src.rpm"));
        assert!(out.join("build/foo.spec").exists());
        let sources = std::fs::read_to_string(out.join("sources.txt")).unwrap();
        assert_eq!(sources.lines().collect::<Vec<_>>(), vec!["extra.tar.xz", "foo-1.0.tar.gz"]);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_rpmbuild_failure_is_unavailable() {
        use crate::test_utils::fakes::write_script;

        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/rpms/foo/raw/rawhide/f/foo.spec"))
            .respond_with(ResponseTemplate::new(200).set_body_string("Name: foo\n"))
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let rpmbuild = write_script(dir.path(), "rpmbuild", "echo 'bad spec' >&2; exit 1");
        let git = DistGit::new("rawhide")
            .with_urls(format!("{}/rpms", server.uri()), server.uri())
            .with_rpmbuild(rpmbuild);

        let err = git.build_srpm("foo", &dir.path().join("foo")).await.unwrap_err();
        let SourceError::Unavailable { reason, .. } = err else {
            panic!("expected unavailable, got {err:?}");
        };
        assert!(reason.contains("bad spec"));
    }
}
