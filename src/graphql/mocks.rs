use async_graphql::Value;
use chrono::Utc;

use super::mock_schema::MockRegistry;

/// Mock overrides for fields the API does not resolve yet
pub fn app_mocks() -> MockRegistry {
    MockRegistry::new()
        .with_mock("Date", || Value::from(Utc::now().to_rfc3339()))
        .with_mock("CampaignStats", || {
            Value::from_json(serde_json::json!({
                "sentMessagesCount": 0,
                "receivedMessagesCount": 0,
                "optOutsCount": 0,
            }))
            .unwrap_or(Value::Null)
        })
}
