use crate::config::StorageConfig;
use crate::db::models::{SubmissionMeta, SubmissionRecord, SubmissionRef};
use crate::db::SubmissionStore;
use crate::errors::{AppError, Result};
use async_trait::async_trait;
use aws_sdk_dynamodb::error::DisplayErrorContext;
use aws_sdk_dynamodb::operation::query::builders::QueryFluentBuilder;
use aws_sdk_dynamodb::types::AttributeValue;
use aws_sdk_dynamodb::Client;
use aws_types::SdkConfig;
use std::collections::HashMap;
use tracing::{debug, info};

const PARTITION_KEY: &str = "participant_id";
const SORT_KEY: &str = "submission_id";
const OBJECT_KEY_ATTR: &str = "s3_key";

/// DynamoDB implementation of the SubmissionStore trait
#[derive(Clone)]
pub struct DynamoSubmissionStore {
    client: Client,
    table: String,
}

impl DynamoSubmissionStore {
    pub fn new(sdk_config: &SdkConfig, config: &StorageConfig) -> Self {
        info!(table = %config.table, "DynamoDB submission store ready");

        Self {
            client: Client::new(sdk_config),
            table: config.table.clone(),
        }
    }
}

fn string_or_null(value: &Option<String>) -> AttributeValue {
    match value {
        Some(s) => AttributeValue::S(s.clone()),
        None => AttributeValue::Null(true),
    }
}

fn meta_to_attribute(meta: &SubmissionMeta) -> AttributeValue {
    let score = match meta.capture_quality_score {
        Some(score) => AttributeValue::N(score.to_string()),
        None => AttributeValue::Null(true),
    };

    AttributeValue::M(HashMap::from([
        ("device_type".to_string(), string_or_null(&meta.device_type)),
        ("lighting".to_string(), string_or_null(&meta.lighting)),
        ("capture_quality_score".to_string(), score),
    ]))
}

/// Item layout of a submission record
pub(crate) fn record_to_item(record: &SubmissionRecord) -> HashMap<String, AttributeValue> {
    let consent = &record.consent;
    let consent = AttributeValue::M(HashMap::from([
        ("over18".to_string(), AttributeValue::Bool(consent.over18)),
        ("data_storage".to_string(), AttributeValue::Bool(consent.data_storage)),
        ("future_research".to_string(), AttributeValue::Bool(consent.future_research)),
        ("recontact_ok".to_string(), AttributeValue::Bool(consent.recontact_ok)),
        ("consent_version".to_string(), AttributeValue::S(consent.consent_version.clone())),
    ]));

    HashMap::from([
        (PARTITION_KEY.to_string(), AttributeValue::S(record.participant_id.clone())),
        (SORT_KEY.to_string(), AttributeValue::S(record.submission_id.to_string())),
        (OBJECT_KEY_ATTR.to_string(), AttributeValue::S(record.object_key.clone())),
        (
            "self_reports".to_string(),
            AttributeValue::L(record.self_reports.iter().cloned().map(AttributeValue::S).collect()),
        ),
        ("free_text_note".to_string(), AttributeValue::S(record.free_text_note.clone())),
        ("meta".to_string(), meta_to_attribute(&record.meta)),
        ("consent".to_string(), consent),
        ("created_at".to_string(), AttributeValue::S(record.created_at.clone())),
        ("ip_hash".to_string(), string_or_null(&record.ip_hash)),
        ("user_agent".to_string(), AttributeValue::S(record.user_agent.clone())),
    ])
}

fn item_to_ref(participant_id: &str, item: &HashMap<String, AttributeValue>) -> Option<SubmissionRef> {
    let submission_id = item.get(SORT_KEY)?.as_s().ok()?.clone();
    let object_key = item
        .get(OBJECT_KEY_ATTR)
        .and_then(|v| v.as_s().ok())
        .filter(|k| !k.is_empty())
        .cloned();

    Some(SubmissionRef {
        participant_id: participant_id.to_string(),
        submission_id,
        object_key,
    })
}

impl DynamoSubmissionStore {
    /// One page of a participant's partition, keys and object reference only.
    ///
    /// Reads are strongly consistent so a withdrawal sees every record
    /// written before it started.
    fn partition_query(
        &self,
        participant_id: &str,
        start_key: Option<HashMap<String, AttributeValue>>,
    ) -> QueryFluentBuilder {
        self.client
            .query()
            .table_name(&self.table)
            .consistent_read(true)
            .key_condition_expression("#pk = :pid")
            .expression_attribute_names("#pk", PARTITION_KEY)
            .expression_attribute_values(":pid", AttributeValue::S(participant_id.to_string()))
            .projection_expression("#sk, #obj")
            .expression_attribute_names("#sk", SORT_KEY)
            .expression_attribute_names("#obj", OBJECT_KEY_ATTR)
            .set_exclusive_start_key(start_key)
    }
}

/// Continuation key for the next page; absent or empty means the last page
fn next_page(
    last_evaluated_key: Option<HashMap<String, AttributeValue>>,
) -> Option<HashMap<String, AttributeValue>> {
    last_evaluated_key.filter(|key| !key.is_empty())
}

#[async_trait]
impl SubmissionStore for DynamoSubmissionStore {
    async fn put(&self, record: &SubmissionRecord) -> Result<()> {
        self.client
            .put_item()
            .table_name(&self.table)
            .set_item(Some(record_to_item(record)))
            .send()
            .await
            .map_err(|e| AppError::TableStore {
                message: format!("Failed to put submission: {}", DisplayErrorContext(&e)),
            })?;

        debug!(submission_id = %record.submission_id, "Submission item written");
        Ok(())
    }

    async fn list_for_participant(&self, participant_id: &str) -> Result<Vec<SubmissionRef>> {
        let mut refs = Vec::new();
        let mut start_key: Option<HashMap<String, AttributeValue>> = None;

        loop {
            let output = self
                .partition_query(participant_id, start_key.take())
                .send()
                .await
                .map_err(|e| AppError::TableStore {
                    message: format!("Failed to query submissions: {}", DisplayErrorContext(&e)),
                })?;

            refs.extend(
                output
                    .items
                    .unwrap_or_default()
                    .iter()
                    .filter_map(|item| item_to_ref(participant_id, item)),
            );

            match next_page(output.last_evaluated_key) {
                Some(key) => start_key = Some(key),
                None => break,
            }
        }

        debug!(participant_id = %participant_id, count = refs.len(), "Queried submission partition");
        Ok(refs)
    }

    async fn delete(&self, participant_id: &str, submission_id: &str) -> Result<()> {
        self.client
            .delete_item()
            .table_name(&self.table)
            .key(PARTITION_KEY, AttributeValue::S(participant_id.to_string()))
            .key(SORT_KEY, AttributeValue::S(submission_id.to_string()))
            .send()
            .await
            .map_err(|e| AppError::TableStore {
                message: format!("Failed to delete submission {}: {}", submission_id, DisplayErrorContext(&e)),
            })?;

        Ok(())
    }

    async fn ping(&self) -> Result<()> {
        self.client
            .describe_table()
            .table_name(&self.table)
            .send()
            .await
            .map_err(|e| AppError::TableStore {
                message: format!("Table {} unreachable: {}", self.table, DisplayErrorContext(&e)),
            })?;

        Ok(())
    }
}
