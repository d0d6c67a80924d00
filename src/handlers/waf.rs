//! Web application firewall.
//!
//! A service has at most one firewall, and unlike every other block it is
//! updated in place: when both the recorded and the desired configuration
//! carry one, the recorded firewall is patched (or recreated if it vanished
//! from the version).

use super::{AttributeHandler, Block, BlockChanges};
use crate::api::{ServiceApi, ServiceVersion, WafInput, WafRecord};
use crate::model::ServiceConfig;
use crate::observability::metrics;
use anyhow::{Context, Result};
use async_trait::async_trait;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct Waf {
    /// Response object served when a request is blocked
    pub response_object: String,
    /// Condition selecting the requests the firewall inspects
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prefetch_condition: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub waf_id: Option<String>,
}

impl Waf {
    fn input(&self) -> WafInput {
        WafInput {
            response_object: self.response_object.clone(),
            prefetch_condition: self.prefetch_condition.clone(),
        }
    }

    #[must_use]
    pub fn from_record(record: &WafRecord) -> Self {
        Self {
            response_object: record.response_object.clone(),
            prefetch_condition: record.prefetch_condition.clone().filter(|c| !c.is_empty()),
            waf_id: Some(record.id.clone()).filter(|id| !id.is_empty()),
        }
    }
}

impl Block for Waf {
    fn name(&self) -> &str {
        "waf"
    }

    fn normalized(&self) -> Self {
        Self {
            waf_id: None,
            ..self.clone()
        }
    }
}

#[derive(Debug)]
pub struct WafHandler;

impl WafHandler {
    async fn create(api: &dyn ServiceApi, version: &ServiceVersion, waf: &Waf) -> Result<()> {
        debug!("Fastly WAF addition: {:?} on {}", waf.input(), version);
        let created = api
            .create_waf(version, &waf.input())
            .await
            .with_context(|| format!("Failed to create WAF on {version}"))?;
        debug!("Fastly WAF {} created on {}", created.id, version);
        metrics::increment_blocks_created("waf");
        Ok(())
    }
}

#[async_trait]
impl AttributeHandler for WafHandler {
    fn key(&self) -> &'static str {
        "waf"
    }

    fn changes(&self, old: &ServiceConfig, new: &ServiceConfig) -> BlockChanges {
        BlockChanges::between_single(old.waf.as_ref(), new.waf.as_ref())
    }

    async fn process(
        &self,
        api: &dyn ServiceApi,
        version: &ServiceVersion,
        old: &ServiceConfig,
        new: &ServiceConfig,
    ) -> Result<()> {
        match (&old.waf, &new.waf) {
            (Some(recorded), Some(desired)) => {
                let waf_id = desired
                    .waf_id
                    .as_deref()
                    .or(recorded.waf_id.as_deref())
                    .unwrap_or_default();
                let exists = if waf_id.is_empty() {
                    false
                } else {
                    match api.get_waf(version, waf_id).await {
                        Ok(_) => true,
                        Err(e) if e.is_not_found() => false,
                        Err(e) => {
                            return Err(e).with_context(|| {
                                format!("Error looking up WAF {waf_id} on {version}")
                            })
                        }
                    }
                };
                if exists {
                    debug!("Fastly WAF update: {} on {}", waf_id, version);
                    api.update_waf(version, waf_id, &desired.input())
                        .await
                        .with_context(|| format!("Failed to update WAF {waf_id} on {version}"))?;
                } else {
                    warn!("WAF not found on {}, creating it", version);
                    Self::create(api, version, desired).await?;
                }
            }
            (None, Some(desired)) => Self::create(api, version, desired).await?,
            (Some(recorded), None) => {
                let Some(waf_id) = recorded.waf_id.as_deref() else {
                    return Ok(());
                };
                debug!("Fastly WAF removal: {} on {}", waf_id, version);
                match api.delete_waf(version, waf_id).await {
                    Ok(()) => metrics::increment_blocks_deleted("waf"),
                    Err(e) if e.is_not_found() => {}
                    Err(e) => {
                        return Err(e)
                            .with_context(|| format!("Failed to delete WAF {waf_id} on {version}"))
                    }
                }
            }
            (None, None) => {}
        }
        Ok(())
    }

    async fn read(
        &self,
        api: &dyn ServiceApi,
        version: &ServiceVersion,
        config: &mut ServiceConfig,
    ) -> Result<()> {
        let wafs = api.list_wafs(version).await.with_context(|| {
            format!(
                "Error looking up WAFs for ({}), version ({})",
                version.service_id, version.number
            )
        })?;
        config.waf = wafs.first().map(Waf::from_record);
        Ok(())
    }
}
