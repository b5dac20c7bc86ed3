//! DynamoDB-backed key-value store

use std::collections::HashMap;
use std::fmt::Debug;

use async_trait::async_trait;
use aws_sdk_dynamodb::error::{DisplayErrorContext, ProvideErrorMetadata, SdkError};
use aws_sdk_dynamodb::types::{
    AttributeDefinition, AttributeValue as DynamoValue, BillingMode, KeySchemaElement, KeyType,
    ScalarAttributeType,
};
use aws_sdk_dynamodb::Client as DynamoDbClient;
use tracing::{debug, info};

use crate::domain::storage::{AttributeValue, Item, KeyValueStore, StoreError, UpdateRequest};

/// Connection settings for DynamoDB
#[derive(Debug, Clone, Default)]
pub struct DynamoDbConfig {
    /// AWS region; falls back to the default provider chain
    pub region: Option<String>,
    /// Endpoint override, e.g. `http://localhost:4566` for LocalStack
    pub endpoint_url: Option<String>,
}

impl DynamoDbConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_region(mut self, region: impl Into<String>) -> Self {
        self.region = Some(region.into());
        self
    }

    pub fn with_endpoint_url(mut self, endpoint_url: impl Into<String>) -> Self {
        self.endpoint_url = Some(endpoint_url.into());
        self
    }
}

/// Key-value store backed by a DynamoDB table
///
/// Retries and backoff are left to the SDK client configuration.
pub struct DynamoDbStore {
    client: DynamoDbClient,
}

impl Debug for DynamoDbStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DynamoDbStore").finish_non_exhaustive()
    }
}

impl DynamoDbStore {
    /// Loads the AWS configuration and builds a client
    pub async fn connect(config: &DynamoDbConfig) -> Self {
        let mut loader = aws_config::defaults(aws_config::BehaviorVersion::latest());

        if let Some(region) = &config.region {
            loader = loader.region(aws_config::Region::new(region.clone()));
        }

        if let Some(endpoint_url) = &config.endpoint_url {
            loader = loader.endpoint_url(endpoint_url.clone());
        }

        let sdk_config = loader.load().await;
        Self::with_client(DynamoDbClient::new(&sdk_config))
    }

    /// Wraps an existing client
    pub fn with_client(client: DynamoDbClient) -> Self {
        Self { client }
    }

    /// Creates the table with a string hash key unless it already exists
    pub async fn ensure_table(&self, table: &str, key_attribute: &str) -> Result<(), StoreError> {
        match self.client.describe_table().table_name(table).send().await {
            Ok(_) => {
                debug!(table = %table, "Table already exists");
                return Ok(());
            }
            Err(e)
                if e.as_service_error()
                    .is_some_and(|se| se.is_resource_not_found_exception()) => {}
            Err(e) => return Err(classify(table, e)),
        }

        let definition = AttributeDefinition::builder()
            .attribute_name(key_attribute)
            .attribute_type(ScalarAttributeType::S)
            .build()
            .map_err(|e| StoreError::validation(e.to_string()))?;

        let key_schema = KeySchemaElement::builder()
            .attribute_name(key_attribute)
            .key_type(KeyType::Hash)
            .build()
            .map_err(|e| StoreError::validation(e.to_string()))?;

        self.client
            .create_table()
            .table_name(table)
            .attribute_definitions(definition)
            .key_schema(key_schema)
            .billing_mode(BillingMode::PayPerRequest)
            .send()
            .await
            .map_err(|e| classify(table, e))?;

        info!(table = %table, key = %key_attribute, "Created table");
        Ok(())
    }
}

#[async_trait]
impl KeyValueStore for DynamoDbStore {
    async fn put_item(&self, table: &str, item: Item) -> Result<(), StoreError> {
        self.client
            .put_item()
            .table_name(table)
            .set_item(Some(to_dynamo_item(&item)))
            .send()
            .await
            .map_err(|e| classify(table, e))?;

        Ok(())
    }

    async fn get_item(&self, table: &str, key: &Item) -> Result<Option<Item>, StoreError> {
        let response = self
            .client
            .get_item()
            .table_name(table)
            .set_key(Some(to_dynamo_item(key)))
            .consistent_read(true)
            .send()
            .await
            .map_err(|e| classify(table, e))?;

        response.item().map(from_dynamo_item).transpose()
    }

    async fn update_item(
        &self,
        table: &str,
        key: &Item,
        update: &UpdateRequest,
    ) -> Result<(), StoreError> {
        // The service rejects empty placeholder maps, e.g. for REMOVE-only updates
        let names = (!update.names.is_empty()).then(|| update.names.clone());
        let values = (!update.values.is_empty()).then(|| to_dynamo_item(&update.values));

        self.client
            .update_item()
            .table_name(table)
            .set_key(Some(to_dynamo_item(key)))
            .update_expression(&update.expression)
            .set_expression_attribute_names(names)
            .set_expression_attribute_values(values)
            .send()
            .await
            .map_err(|e| classify(table, e))?;

        Ok(())
    }

    async fn delete_item(&self, table: &str, key: &Item) -> Result<(), StoreError> {
        self.client
            .delete_item()
            .table_name(table)
            .set_key(Some(to_dynamo_item(key)))
            .send()
            .await
            .map_err(|e| classify(table, e))?;

        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "dynamodb"
    }
}

fn classify<E, R>(table: &str, error: SdkError<E, R>) -> StoreError
where
    E: ProvideErrorMetadata + std::error::Error + 'static,
    R: Debug,
{
    let message = DisplayErrorContext(&error).to_string();

    match error.code() {
        Some(
            "ProvisionedThroughputExceededException"
            | "ThrottlingException"
            | "RequestLimitExceeded",
        ) => StoreError::throttled(message),
        Some("ConditionalCheckFailedException") => StoreError::conditional_check_failed(message),
        Some("ValidationException") => StoreError::validation(message),
        Some("ResourceNotFoundException") => StoreError::table_not_found(table),
        _ => StoreError::transport(message),
    }
}

fn to_dynamo_item(item: &Item) -> HashMap<String, DynamoValue> {
    item.iter()
        .map(|(name, value)| (name.clone(), to_dynamo(value)))
        .collect()
}

fn from_dynamo_item(item: &HashMap<String, DynamoValue>) -> Result<Item, StoreError> {
    item.iter()
        .map(|(name, value)| Ok((name.clone(), from_dynamo(value)?)))
        .collect()
}

fn to_dynamo(value: &AttributeValue) -> DynamoValue {
    match value {
        AttributeValue::S(s) => DynamoValue::S(s.clone()),
        AttributeValue::N(n) => DynamoValue::N(n.clone()),
        AttributeValue::Bool(b) => DynamoValue::Bool(*b),
        AttributeValue::Null => DynamoValue::Null(true),
        AttributeValue::L(values) => DynamoValue::L(values.iter().map(to_dynamo).collect()),
        AttributeValue::M(map) => DynamoValue::M(to_dynamo_item(map)),
        AttributeValue::Ss(members) => DynamoValue::Ss(members.clone()),
        AttributeValue::Ns(members) => DynamoValue::Ns(members.clone()),
    }
}

fn from_dynamo(value: &DynamoValue) -> Result<AttributeValue, StoreError> {
    Ok(match value {
        DynamoValue::S(s) => AttributeValue::S(s.clone()),
        DynamoValue::N(n) => AttributeValue::N(n.clone()),
        DynamoValue::Bool(b) => AttributeValue::Bool(*b),
        DynamoValue::Null(_) => AttributeValue::Null,
        DynamoValue::L(values) => {
            AttributeValue::L(values.iter().map(from_dynamo).collect::<Result<_, _>>()?)
        }
        DynamoValue::M(map) => AttributeValue::M(from_dynamo_item(map)?),
        DynamoValue::Ss(members) => AttributeValue::Ss(members.clone()),
        DynamoValue::Ns(members) => AttributeValue::Ns(members.clone()),
        other => {
            return Err(StoreError::validation(format!(
                "unsupported attribute type in response: {:?}",
                other
            )));
        }
    })
}
