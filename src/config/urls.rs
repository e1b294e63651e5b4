//! Hub URLs

/// Fedora koji hub, used when nothing else is configured
pub const FEDORA_HUB: &str = "https://koji.fedoraproject.org/kojihub";

/// Fedora koji web interface
pub const FEDORA_WEB: &str = "https://koji.fedoraproject.org/koji";

/// Fedora package sources (dist-git)
pub const FEDORA_DIST_GIT: &str = "https://src.fedoraproject.org/rpms";

/// Fedora lookaside cache for source tarballs
pub const FEDORA_LOOKASIDE: &str = "https://src.fedoraproject.org/lookaside/pkgs";

/// Web page of a task
pub fn task_url(web_url: &str, task_id: u64) -> String {
    format!("{}/taskinfo?taskID={task_id}", web_url.trim_end_matches('/'))
}
