use crate::{
    collector::{self, Artifact},
    config::Config,
    error::JobError,
    extractor::Extractor,
    metadata::{self, Metadata},
    packager::{self, EncodedFile, Mode, PackagedResponse},
    sites::{SiteProfile, SiteTable},
    workspace::{Workspace, WorkspaceRoot},
};
use std::sync::Arc;
use tracing::Instrument;
use uuid::Uuid;

/// Runs extraction jobs end to end. Cheap to clone; holds no per-job state.
#[derive(Debug, Clone)]
pub struct JobRunner {
    root: WorkspaceRoot,
    extractor: Extractor,
    sites: Arc<SiteTable>,
    supported_sites_only: bool,
}

impl JobRunner {
    pub fn new(root: WorkspaceRoot, extractor: Extractor, sites: SiteTable, supported_sites_only: bool) -> Self {
        Self {
            root,
            extractor,
            sites: Arc::new(sites),
            supported_sites_only,
        }
    }

    pub fn from_config(config: &Config, root: WorkspaceRoot) -> Self {
        let extractor = Extractor::new(&config.extractor_bin, config.download_timeout, config.fetch_timeout)
            .with_extra_args(config.extractor_extra_args.clone());
        Self::new(root, extractor, config.sites.clone(), config.supported_sites_only)
    }

    pub fn sites(&self) -> &SiteTable {
        &self.sites
    }

    pub fn extractor(&self) -> &Extractor {
        &self.extractor
    }

    pub fn supported_sites_only(&self) -> bool {
        self.supported_sites_only
    }

    fn resolve<'a>(&'a self, url: &'a str) -> Result<(&'a str, Option<&'a SiteProfile>), JobError> {
        let url = url.trim();
        if url.is_empty() {
            return Err(JobError::InvalidInput("url must not be empty".to_string()));
        }
        if url.starts_with('-') {
            return Err(JobError::InvalidInput("url must not start with '-'".to_string()));
        }

        let profile = self.sites.resolve(url);
        if profile.is_none() && self.supported_sites_only {
            return Err(JobError::InvalidInput(format!("unsupported site: {url}")));
        }
        Ok((url, profile))
    }

    /// Metadata only; nothing is written to disk.
    pub async fn fetch(&self, url: &str) -> Result<Metadata, JobError> {
        let (url, profile) = self.resolve(url)?;
        let span = tracing::info_span!("fetch", job_id = %Uuid::new_v4(), url);

        async move {
            tracing::info!(site = profile.map(|p| p.host.as_str()), "fetching metadata");
            let output = self.extractor.run_metadata(url, profile).await?;
            let metadata = metadata::parse(&String::from_utf8_lossy(&output.stdout))?;
            let records = match &metadata {
                Metadata::Single(_) => 1,
                Metadata::List(list) => list.len(),
            };
            tracing::info!(records, "metadata fetched");
            Ok(metadata)
        }
        .instrument(span)
        .await
    }

    pub async fn download(&self, url: &str, mode: Mode) -> Result<PackagedResponse, JobError> {
        let artifacts = self.download_artifacts(url).await?;
        tokio::task::spawn_blocking(move || packager::pack(&artifacts, mode))
            .await
            .map_err(|e| JobError::packaging(format!("packaging task failed: {e}")))?
    }

    pub async fn download_encoded(&self, url: &str) -> Result<Vec<EncodedFile>, JobError> {
        let artifacts = self.download_artifacts(url).await?;
        tokio::task::spawn_blocking(move || packager::encode_all(&artifacts))
            .await
            .map_err(|e| JobError::packaging(format!("encoding task failed: {e}")))
    }

    async fn download_artifacts(&self, url: &str) -> Result<Vec<Artifact>, JobError> {
        let (url, profile) = self.resolve(url)?;
        let workspace = self.root.acquire().await?;
        let span = tracing::info_span!("download", job_id = %workspace.id(), url);

        let result = self
            .download_into(&workspace, url, profile)
            .instrument(span.clone())
            .await;
        workspace.release().instrument(span).await;
        result
    }

    async fn download_into(
        &self,
        workspace: &Workspace,
        url: &str,
        profile: Option<&SiteProfile>,
    ) -> Result<Vec<Artifact>, JobError> {
        tracing::info!(site = profile.map(|p| p.host.as_str()), "downloading");
        self.extractor.run_download(url, workspace.path(), profile).await?;

        let path = workspace.path().to_path_buf();
        let artifacts = tokio::task::spawn_blocking(move || collector::collect(&path))
            .await
            .map_err(|e| JobError::packaging(format!("collect task failed: {e}")))??;

        tracing::info!(
            files = artifacts.len(),
            bytes = artifacts.iter().map(|a| a.data.len()).sum::<usize>(),
            "download complete"
        );
        Ok(artifacts)
    }
}
