//! Art style catalog
//!
//! The site ships its style list in the Next.js page data for `/create`.
//! The data URL embeds the current build id, which is scraped from the
//! `_ssgManifest.js` script on the site root.

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, instrument};
use wombo_core::config::{Endpoints, Timeouts};
use wombo_core::{DreamConfig, DreamError, Result, StyleInfo};

use crate::scrape::extract_build_id;
use crate::transport::{HttpRequest, Transport};

/// Lists the styles the service offers
#[async_trait]
pub trait StyleCatalog: Send + Sync {
    async fn styles(&self) -> Result<Vec<StyleInfo>>;
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PageData {
    page_props: PageProps,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PageProps {
    art_styles: Vec<StyleInfo>,
}

/// Parse a `create.json` page-data document
pub fn parse_styles(body: &[u8]) -> Result<Vec<StyleInfo>> {
    let data: PageData = serde_json::from_slice(body)
        .map_err(|e| DreamError::Parse(format!("malformed style catalog: {}", e)))?;
    Ok(data.page_props.art_styles)
}

/// Style catalog scraped from the live site
#[derive(Debug, Clone)]
pub struct SiteStyleCatalog<T: Transport> {
    transport: T,
    endpoints: Endpoints,
    timeouts: Timeouts,
}

impl<T: Transport> SiteStyleCatalog<T> {
    pub fn new(transport: T, config: &DreamConfig) -> Self {
        Self {
            transport,
            endpoints: config.endpoints.clone(),
            timeouts: config.timeouts.clone(),
        }
    }

    async fn get(&self, url: &str) -> Result<Vec<u8>> {
        let response = self
            .transport
            .execute(HttpRequest::get(url).timeout(self.timeouts.page()))
            .await?;
        if !response.is_success() {
            return Err(DreamError::Network(format!(
                "GET {} returned {}",
                url, response.status
            )));
        }
        Ok(response.body)
    }
}

#[async_trait]
impl<T: Transport> StyleCatalog for SiteStyleCatalog<T> {
    #[instrument(skip(self))]
    async fn styles(&self) -> Result<Vec<StyleInfo>> {
        let root = self.get(&self.endpoints.site_url).await?;
        let build_id = extract_build_id(&String::from_utf8_lossy(&root))?;
        debug!("Site build id {}", build_id);

        let data = self.get(&self.endpoints.styles_url(&build_id)).await?;
        let styles = parse_styles(&data)?;
        debug!("Catalog lists {} styles", styles.len());
        Ok(styles)
    }
}
