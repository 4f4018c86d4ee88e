#[derive(Debug)]
pub struct VersionInfo {
    pub doc_stress_version: &'static str,
    pub doc_stress_build_date: &'static str,
    pub doc_stress_git_sha: &'static str,
    pub scylla_driver_version: &'static str,
}

mod version_info {
    include!(concat!(env!("OUT_DIR"), "/version_info.rs"));
}

pub fn get_version_info() -> VersionInfo {
    VersionInfo {
        doc_stress_version: version_info::PKG_VERSION,
        doc_stress_build_date: version_info::COMMIT_DATE,
        doc_stress_git_sha: version_info::GIT_SHA,
        scylla_driver_version: version_info::SCYLLA_VERSION,
    }
}

pub fn format_version_info_human() -> String {
    let info = get_version_info();
    format!(
        "doc-stress:\n\
         - Version: {}\n\
         - Build Date: {}\n\
         - Git SHA: {}\n\
         scylla-driver:\n\
         - Version: {}",
        info.doc_stress_version,
        info.doc_stress_build_date,
        info.doc_stress_git_sha,
        info.scylla_driver_version,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_human_format_mentions_versions() {
        let info = get_version_info();
        let s = format_version_info_human();
        assert!(s.contains(info.doc_stress_version));
        assert!(s.contains(info.scylla_driver_version));
    }
}
