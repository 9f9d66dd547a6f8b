//! Per-site credential resolution.
//!
//! A [`SiteTable`] is an ordered list of host suffixes, each optionally paired
//! with a cookie file handed to the extractor. Lookup is first-match-wins in
//! table order, matching either the exact host or any subdomain of it.

use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SiteProfile {
    pub host: String,
    pub credentials: Option<PathBuf>,
}

impl SiteProfile {
    pub fn new(host: impl Into<String>, credentials: Option<PathBuf>) -> Self {
        let host: String = host.into();
        Self {
            host: host.trim().trim_start_matches('.').to_ascii_lowercase(),
            credentials,
        }
    }

    fn matches(&self, host: &str) -> bool {
        host == self.host
            || host
                .strip_suffix(self.host.as_str())
                .is_some_and(|prefix| prefix.ends_with('.'))
    }

    /// Credential file to pass to the extractor, if one is configured and present.
    pub fn credential_file(&self) -> Option<&Path> {
        let path = self.credentials.as_deref()?;
        if path.is_file() {
            Some(path)
        } else {
            tracing::warn!(
                site = %self.host,
                path = %path.display(),
                "credential file configured but missing; continuing without credentials"
            );
            None
        }
    }
}

#[derive(Debug, Clone)]
pub struct SiteTable {
    profiles: Vec<SiteProfile>,
}

impl SiteTable {
    /// Parses `host[=cookie_file]` entries separated by commas.
    pub fn parse(entries: &str) -> anyhow::Result<Self> {
        let mut profiles = Vec::new();
        for entry in entries.split(',').map(str::trim).filter(|e| !e.is_empty()) {
            let (host, credentials) = match entry.split_once('=') {
                Some((host, path)) => {
                    let path = path.trim();
                    (host, (!path.is_empty()).then(|| PathBuf::from(path)))
                }
                None => (entry, None),
            };
            let profile = SiteProfile::new(host, credentials);
            if profile.host.is_empty() {
                anyhow::bail!("site profile entry `{entry}` has an empty host");
            }
            profiles.push(profile);
        }
        Ok(Self { profiles })
    }

    pub fn profiles(&self) -> &[SiteProfile] {
        &self.profiles
    }

    pub fn resolve(&self, url: &str) -> Option<&SiteProfile> {
        let parsed = url::Url::parse(url).ok()?;
        let host = parsed.host_str()?.to_ascii_lowercase();
        let host = host.trim_end_matches('.');
        self.profiles.iter().find(|p| p.matches(host))
    }
}
