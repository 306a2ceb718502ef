use serde::Serialize;

use crate::common::banner::BuildInfo;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Version {
    pub semver: String,
    pub major: u32,
    pub minor: u32,
    pub patch: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pre_release: Option<String>,
}

impl Version {
    /// Parses `major.minor.patch[-pre][+build]`; missing parts are 0.
    pub fn parse(semver: &str) -> Self {
        let without_build = semver.split('+').next().unwrap_or(semver);
        let (core, pre_release) = match without_build.split_once('-') {
            Some((core, pre)) => (core, Some(pre.to_string())),
            None => (without_build, None),
        };
        let mut parts = core.split('.').map(|p| p.parse().unwrap_or(0));
        Self {
            semver: semver.to_string(),
            major: parts.next().unwrap_or(0),
            minor: parts.next().unwrap_or(0),
            patch: parts.next().unwrap_or(0),
            pre_release,
        }
    }
}

/// `GET /v1/info`
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeInfo {
    pub version: Version,
    pub build: BuildInfo,
    pub uptime_ms: u64,
    pub stats: NodeStats,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeStats {
    pub guilds: usize,
    pub playing: usize,
    pub paused: usize,
    pub queued_entries: usize,
    pub voice_connections: usize,
    pub pending_choices: usize,
    pub event_subscribers: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_parsing() {
        let v = Version::parse("0.4.2");
        assert_eq!((v.major, v.minor, v.patch), (0, 4, 2));
        assert_eq!(v.pre_release, None);

        let v = Version::parse("1.2.3-rc.1+abc");
        assert_eq!((v.major, v.minor, v.patch), (1, 2, 3));
        assert_eq!(v.pre_release.as_deref(), Some("rc.1"));

        let v = Version::parse("2.0.0+build");
        assert_eq!((v.major, v.minor, v.patch), (2, 0, 0));
        assert_eq!(v.pre_release, None);

        let v = Version::parse("garbage");
        assert_eq!((v.major, v.minor, v.patch), (0, 0, 0));
    }
}
