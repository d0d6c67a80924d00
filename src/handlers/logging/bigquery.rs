//! Google BigQuery log delivery.

use super::from_env;
use crate::api::{Collection, Form, Record, ServiceApi, ServiceVersion};
use crate::handlers::{
    create_block, delete_block, difference, list_blocks, AttributeHandler, Block, BlockChanges,
};
use crate::model::ServiceConfig;
use anyhow::Result;
use async_trait::async_trait;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct BigQueryLogging {
    pub name: String,
    pub project_id: String,
    pub dataset: String,
    pub table: String,
    /// Service account email; defaults to `FASTLY_BQ_EMAIL`
    #[serde(default = "email_from_env")]
    pub email: String,
    /// Service account private key; defaults to `FASTLY_BQ_SECRET_KEY`
    #[serde(default = "secret_key_from_env")]
    pub secret_key: String,
    /// `strftime` suffix for template tables
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub template: Option<String>,
    /// JSON log line format; the API default is used when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_condition: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub placement: Option<String>,
}

fn email_from_env() -> String {
    from_env("FASTLY_BQ_EMAIL")
}

fn secret_key_from_env() -> String {
    from_env("FASTLY_BQ_SECRET_KEY")
}

impl BigQueryLogging {
    #[must_use]
    pub fn to_form(&self) -> Form {
        Form::new()
            .field("name", &self.name)
            .field("project_id", &self.project_id)
            .field("dataset", &self.dataset)
            .field("table", &self.table)
            .field("user", &self.email)
            .secret("secret_key", &self.secret_key)
            .opt("template_suffix", self.template.as_deref())
            .opt("format", self.format.as_deref())
            .opt("response_condition", self.response_condition.as_deref())
            .opt("placement", self.placement.as_deref())
    }

    #[must_use]
    pub fn from_record(record: &Record) -> Self {
        Self {
            name: record.string("name"),
            project_id: record.string("project_id"),
            dataset: record.string("dataset"),
            table: record.string("table"),
            email: record.string("user"),
            secret_key: record.string("secret_key"),
            template: record.opt_string("template_suffix"),
            format: record.opt_string("format"),
            response_condition: record.opt_string("response_condition"),
            placement: record.opt_string("placement"),
        }
    }
}

impl Block for BigQueryLogging {
    fn name(&self) -> &str {
        &self.name
    }
}

#[derive(Debug)]
pub struct BigQueryLoggingHandler;

#[async_trait]
impl AttributeHandler for BigQueryLoggingHandler {
    fn key(&self) -> &'static str {
        "bigquerylogging"
    }

    fn changes(&self, old: &ServiceConfig, new: &ServiceConfig) -> BlockChanges {
        BlockChanges::between(&old.bigquerylogging, &new.bigquerylogging)
    }

    async fn process(
        &self,
        api: &dyn ServiceApi,
        version: &ServiceVersion,
        old: &ServiceConfig,
        new: &ServiceConfig,
    ) -> Result<()> {
        for endpoint in difference(&old.bigquerylogging, &new.bigquerylogging) {
            delete_block(api, version, Collection::BigQueryLogging, &endpoint.name).await?;
        }
        for endpoint in difference(&new.bigquerylogging, &old.bigquerylogging) {
            create_block(
                api,
                version,
                Collection::BigQueryLogging,
                &endpoint.name,
                &endpoint.to_form(),
            )
            .await?;
        }
        Ok(())
    }

    async fn read(
        &self,
        api: &dyn ServiceApi,
        version: &ServiceVersion,
        config: &mut ServiceConfig,
    ) -> Result<()> {
        let records = list_blocks(api, version, Collection::BigQueryLogging).await?;
        config.bigquerylogging = records.iter().map(BigQueryLogging::from_record).collect();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_only_sent_when_set() {
        let mut bq: BigQueryLogging = serde_yaml::from_str(
            "name: bq\nproject_id: p\ndataset: d\ntable: t\nemail: e@x.iam\nsecret_key: k\n",
        )
        .expect("yaml");
        assert_eq!(bq.to_form().get("format"), None);

        bq.format = Some("{\"host\":\"%h\"}".to_string());
        bq.template = Some("%Y%m%d".to_string());
        let form = bq.to_form();
        assert_eq!(form.get("format"), Some("{\"host\":\"%h\"}"));
        assert_eq!(form.get("template_suffix"), Some("%Y%m%d"));
        assert_eq!(form.get("user"), Some("e@x.iam"));
    }
}
