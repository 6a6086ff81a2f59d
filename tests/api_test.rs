//! HTTP-level tests for the health, superadmin and GraphQL routes

mod common;

use std::future::IntoFuture;

use anyhow::Result;
use axum::http::{header, HeaderName, HeaderValue, StatusCode};
use common::*;
use futures_util::future::join_all;
use sea_orm::{ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter};
use serde_json::{json, Value};
use spoke::auth::{AuthUser, Role};
use spoke::config::{Environment, ServerConfig};
use spoke::database::entities::{job_requests, users};
use spoke::errors::ApiError;
use spoke::graphql::resolvers::queue_filter_landlines;

const FILTER_LANDLINES: &str = r#"
    mutation FilterLandlines($id: String!) {
      filterLandlines(id: $id) { id landlinesFiltered }
    }
"#;

const PENDING_JOBS: &str = r#"
    query PendingJobs($id: String!) {
      campaign(id: $id) {
        id
        pendingJobs(jobTypes: ["filter_landlines"]) { jobType status resultMessage }
      }
    }
"#;

fn superadmin_header() -> (HeaderName, HeaderValue) {
    (
        HeaderName::from_static("x-spoke-superadmin-token"),
        HeaderValue::from_static(SUPERADMIN_TOKEN),
    )
}

#[tokio::test]
async fn test_health_endpoint() -> Result<()> {
    let app = spawn_app(config(Environment::Test)).await?;

    let response = app.server.get("/health").await;
    assert_eq!(response.status_code(), StatusCode::OK);

    let body: Value = response.json();
    assert_eq!(body["service"], "spoke-server");
    assert_eq!(body["status"], "healthy");
    assert!(body["version"].is_string());

    Ok(())
}

#[tokio::test]
async fn test_superadmin_login_requires_token() -> Result<()> {
    let app = spawn_app(config(Environment::Test)).await?;
    let organization = seed_organization(app.db(), "Texters United").await?;
    let payload = json!({ "organizationId": organization.id.to_string() });

    let response = app.server.post("/superadmin-login").json(&payload).await;
    assert_eq!(response.status_code(), StatusCode::FORBIDDEN);

    let response = app
        .server
        .post("/superadmin-login")
        .add_header(
            HeaderName::from_static("x-spoke-superadmin-token"),
            HeaderValue::from_static("wrong"),
        )
        .json(&payload)
        .await;
    assert_eq!(response.status_code(), StatusCode::FORBIDDEN);

    Ok(())
}

#[tokio::test]
async fn test_superadmin_login_without_configured_token() -> Result<()> {
    let app = spawn_app(ServerConfig::default()).await?;
    let (name, value) = superadmin_header();

    let response = app
        .server
        .post("/superadmin-login")
        .add_header(name, value)
        .json(&json!({ "organizationId": "1" }))
        .await;
    assert_eq!(response.status_code(), StatusCode::FORBIDDEN);

    Ok(())
}

#[tokio::test]
async fn test_superadmin_login_validates_organization() -> Result<()> {
    let app = spawn_app(config(Environment::Test)).await?;

    for organization_id in [json!("not-a-number"), json!("999")] {
        let (name, value) = superadmin_header();
        let response = app
            .server
            .post("/superadmin-login")
            .add_header(name, value)
            .json(&json!({ "organizationId": organization_id }))
            .await;

        assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);
        let body: Value = response.json();
        assert!(body["message"].is_string());
    }

    Ok(())
}

#[tokio::test]
async fn test_superadmin_login_creates_session() -> Result<()> {
    let app = spawn_app(config(Environment::Test)).await?;
    let organization = seed_organization(app.db(), "Texters United").await?;
    let (name, value) = superadmin_header();

    let response = app
        .server
        .post("/superadmin-login")
        .add_header(name, value)
        .json(&json!({ "organizationId": organization.id }))
        .await;
    assert_eq!(response.status_code(), StatusCode::OK);

    let cookie = response.header(header::SET_COOKIE);
    assert!(cookie.to_str()?.starts_with("spoke_session="));

    let body: Value = response.json();
    assert_eq!(body["organizationId"], organization.id.to_string());
    let token = body["token"].as_str().expect("token in body").to_string();

    let body = app
        .graphql(
            Some(&token),
            "{ currentUser { email isSuperadmin organizations { id name } } }",
            json!({}),
        )
        .await;
    assert!(body.get("errors").is_none(), "{body}");
    let user = &body["data"]["currentUser"];
    assert_eq!(user["email"], "superadmin@spoke.local");
    assert_eq!(user["isSuperadmin"], true);
    assert_eq!(user["organizations"][0]["name"], "Texters United");

    // The cookie authenticates as well
    let cookie_value = HeaderValue::from_str(&format!("spoke_session={}", token))?;
    let body: Value = app
        .server
        .post("/graphql")
        .add_header(header::COOKIE, cookie_value)
        .json(&json!({ "query": "{ currentUser { email } }" }))
        .await
        .json();
    assert_eq!(body["data"]["currentUser"]["email"], "superadmin@spoke.local");

    Ok(())
}

#[tokio::test]
async fn test_anonymous_current_user_is_null() -> Result<()> {
    let app = spawn_app(config(Environment::Test)).await?;

    let body = app.graphql(None, "{ currentUser { id } }", json!({})).await;
    assert!(body.get("errors").is_none(), "{body}");
    assert_eq!(body["data"]["currentUser"], Value::Null);

    Ok(())
}

#[tokio::test]
async fn test_real_and_mocked_fields_resolve_together() -> Result<()> {
    let app = spawn_app(config(Environment::Development)).await?;
    let organization = seed_organization(app.db(), "Texters United").await?;
    let admin = seed_member(app.db(), &organization, "admin@example.com", Role::Admin).await?;
    let campaign = seed_campaign(app.db(), &organization, "Get out the vote", false).await?;
    let token = app.sign_in(&admin);

    let body = app
        .graphql(
            Some(&token),
            r#"
            query Campaign($id: String!) {
              campaign(id: $id) {
                id
                title
                contactsCount
                stats { sentMessagesCount optOutsCount }
                organization { name textingHoursStart campaigns { title } }
              }
            }
            "#,
            json!({ "id": campaign.id.to_string() }),
        )
        .await;

    assert!(body.get("errors").is_none(), "{body}");
    let data = &body["data"]["campaign"];
    assert_eq!(data["id"], campaign.id.to_string());
    assert_eq!(data["title"], "Get out the vote");
    assert_eq!(data["contactsCount"], 42);
    assert_eq!(data["stats"]["sentMessagesCount"], 0);
    assert_eq!(data["organization"]["name"], "Texters United");
    assert_eq!(data["organization"]["textingHoursStart"], 42);
    assert_eq!(data["organization"]["campaigns"][0]["title"], "Get out the vote");

    Ok(())
}

#[tokio::test]
async fn test_filter_landlines_requires_admin() -> Result<()> {
    let app = spawn_app(config(Environment::Test)).await?;
    let organization = seed_organization(app.db(), "Texters United").await?;
    let texter = seed_member(app.db(), &organization, "texter@example.com", Role::Texter).await?;
    let campaign = seed_campaign(app.db(), &organization, "Canvass", false).await?;
    let variables = json!({ "id": campaign.id.to_string() });

    let body = app.graphql(None, FILTER_LANDLINES, variables.clone()).await;
    assert_eq!(error_code(&body), Some("UNAUTHENTICATED"));

    let token = app.sign_in(&texter);
    let body = app.graphql(Some(&token), FILTER_LANDLINES, variables).await;
    assert_eq!(error_code(&body), Some("FORBIDDEN"));

    Ok(())
}

#[tokio::test]
async fn test_filter_landlines_queues_one_job() -> Result<()> {
    let app = spawn_app(config(Environment::Test)).await?;
    let organization = seed_organization(app.db(), "Texters United").await?;
    let admin = seed_member(app.db(), &organization, "admin@example.com", Role::Admin).await?;
    let campaign = seed_campaign(app.db(), &organization, "Canvass", false).await?;
    let token = app.sign_in(&admin);
    let variables = json!({ "id": campaign.id.to_string() });

    let body = app.graphql(Some(&token), FILTER_LANDLINES, variables.clone()).await;
    assert!(body.get("errors").is_none(), "{body}");
    assert_eq!(body["data"]["filterLandlines"]["id"], campaign.id.to_string());

    let body = app.graphql(Some(&token), PENDING_JOBS, variables.clone()).await;
    assert!(body.get("errors").is_none(), "{body}");
    let jobs = body["data"]["campaign"]["pendingJobs"].as_array().unwrap();
    assert_eq!(jobs.len(), 1);
    assert_eq!(jobs[0]["jobType"], "filter_landlines");
    assert_eq!(jobs[0]["status"], 0);

    let body = app.graphql(Some(&token), FILTER_LANDLINES, variables).await;
    assert_eq!(error_code(&body), Some("CONFLICT"));

    Ok(())
}

#[tokio::test]
async fn test_filter_landlines_rejects_started_campaign() -> Result<()> {
    let app = spawn_app(config(Environment::Test)).await?;
    let organization = seed_organization(app.db(), "Texters United").await?;
    let admin = seed_member(app.db(), &organization, "admin@example.com", Role::Owner).await?;
    let campaign = seed_campaign(app.db(), &organization, "Already running", true).await?;
    let token = app.sign_in(&admin);

    let body = app
        .graphql(
            Some(&token),
            FILTER_LANDLINES,
            json!({ "id": campaign.id.to_string() }),
        )
        .await;
    assert_eq!(error_code(&body), Some("VALIDATION_FAILED"));
    assert_eq!(body["errors"][0]["extensions"]["field"], "id");

    Ok(())
}

#[tokio::test]
async fn test_missing_campaign_is_not_found() -> Result<()> {
    let app = spawn_app(config(Environment::Test)).await?;
    let organization = seed_organization(app.db(), "Texters United").await?;
    let admin = seed_member(app.db(), &organization, "admin@example.com", Role::Admin).await?;
    let token = app.sign_in(&admin);

    let body = app
        .graphql(Some(&token), FILTER_LANDLINES, json!({ "id": "4040" }))
        .await;
    assert_eq!(error_code(&body), Some("NOT_FOUND"));
    assert_eq!(body["errors"][0]["extensions"]["entity"], "Campaign");

    Ok(())
}

/// Break the job table so pendingJobs fails inside the database driver
async fn drop_job_requests(app: &TestApp) -> Result<()> {
    app.db()
        .execute_unprepared("DROP TABLE job_requests")
        .await?;
    Ok(())
}

#[tokio::test]
async fn test_production_redacts_database_errors() -> Result<()> {
    let app = spawn_app(config(Environment::Production)).await?;
    let organization = seed_organization(app.db(), "Texters United").await?;
    let admin = seed_member(app.db(), &organization, "admin@example.com", Role::Admin).await?;
    let campaign = seed_campaign(app.db(), &organization, "Canvass", false).await?;
    drop_job_requests(&app).await?;

    let token = app.sign_in(&admin);
    let body = app
        .graphql(
            Some(&token),
            PENDING_JOBS,
            json!({ "id": campaign.id.to_string() }),
        )
        .await;

    assert_eq!(error_message(&body), Some("Internal server error"));
    assert!(!body.to_string().contains("job_requests"));

    Ok(())
}

#[tokio::test]
async fn test_development_surfaces_database_errors() -> Result<()> {
    let app = spawn_app(config(Environment::Development)).await?;
    let organization = seed_organization(app.db(), "Texters United").await?;
    let admin = seed_member(app.db(), &organization, "admin@example.com", Role::Admin).await?;
    let campaign = seed_campaign(app.db(), &organization, "Canvass", false).await?;
    drop_job_requests(&app).await?;

    let token = app.sign_in(&admin);
    let body = app
        .graphql(
            Some(&token),
            PENDING_JOBS,
            json!({ "id": campaign.id.to_string() }),
        )
        .await;

    let message = error_message(&body).unwrap_or_default();
    assert!(message.contains("job_requests"), "{body}");
    assert_eq!(error_code(&body), Some("DATABASE_ERROR"));

    Ok(())
}

#[tokio::test]
async fn test_production_keeps_non_database_errors() -> Result<()> {
    let app = spawn_app(config(Environment::Production)).await?;

    let body = app
        .graphql(None, r#"{ organization(id: "1") { name } }"#, json!({}))
        .await;
    assert_eq!(error_message(&body), Some("Authentication required"));

    Ok(())
}

#[tokio::test]
async fn test_production_disables_introspection_and_playground() -> Result<()> {
    let app = spawn_app(config(Environment::Production)).await?;

    let body = app
        .graphql(None, "{ __schema { queryType { name } } }", json!({}))
        .await;
    assert!(body["errors"].is_array(), "{body}");

    let response = app
        .server
        .get("/graphql")
        .add_header(header::ACCEPT, HeaderValue::from_static("text/html"))
        .await;
    assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);

    Ok(())
}

#[tokio::test]
async fn test_development_serves_playground() -> Result<()> {
    let app = spawn_app(config(Environment::Development)).await?;

    let response = app
        .server
        .get("/graphql")
        .add_header(header::ACCEPT, HeaderValue::from_static("text/html"))
        .await;
    assert_eq!(response.status_code(), StatusCode::OK);
    assert!(response.text().contains("GraphQL Playground"));

    Ok(())
}

#[tokio::test]
async fn test_get_requests_execute_queries_but_not_mutations() -> Result<()> {
    let app = spawn_app(config(Environment::Test)).await?;

    let response = app
        .server
        .get("/graphql")
        .add_query_param("query", "{ currentUser { id } }")
        .await;
    assert_eq!(response.status_code(), StatusCode::OK);
    let body: Value = response.json();
    assert_eq!(body["data"]["currentUser"], Value::Null);

    let response = app
        .server
        .get("/graphql")
        .add_query_param("query", "mutation { filterLandlines(id: \"1\") { id } }")
        .await;
    assert_eq!(response.status_code(), StatusCode::METHOD_NOT_ALLOWED);

    Ok(())
}

#[tokio::test]
async fn test_batch_requests() -> Result<()> {
    let app = spawn_app(config(Environment::Test)).await?;

    let response = app
        .server
        .post("/graphql")
        .json(&json!([
            { "query": "{ currentUser { id } }" },
            { "query": "{ __typename }" }
        ]))
        .await;
    assert_eq!(response.status_code(), StatusCode::OK);

    let body: Value = response.json();
    let responses = body.as_array().expect("batch response");
    assert_eq!(responses.len(), 2);
    assert_eq!(responses[1]["data"]["__typename"], "Query");

    Ok(())
}

#[tokio::test]
async fn test_malformed_body_is_bad_request() -> Result<()> {
    let app = spawn_app(config(Environment::Test)).await?;

    let response = app
        .server
        .post("/graphql")
        .text("{ not json")
        .content_type("application/json")
        .await;
    assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);

    Ok(())
}

#[tokio::test]
async fn test_cors_preflight() -> Result<()> {
    let app = spawn_app(config(Environment::Test)).await?;

    let response = app.server.method(axum::http::Method::OPTIONS, "/graphql").await;
    assert_eq!(response.status_code(), StatusCode::OK);

    Ok(())
}

#[tokio::test]
async fn test_filter_landlines_rejects_filtered_campaign() -> Result<()> {
    let app = spawn_app(config(Environment::Test)).await?;
    let organization = seed_organization(app.db(), "Texters United").await?;
    let admin = seed_member(app.db(), &organization, "admin@example.com", Role::Admin).await?;
    let campaign = seed_campaign(app.db(), &organization, "Canvass", false).await?;
    let campaign = mark_landlines_filtered(app.db(), campaign).await?;
    let token = app.sign_in(&admin);

    let body = app
        .graphql(
            Some(&token),
            FILTER_LANDLINES,
            json!({ "id": campaign.id.to_string() }),
        )
        .await;
    assert_eq!(error_code(&body), Some("VALIDATION_FAILED"));
    assert_eq!(body["errors"][0]["extensions"]["field"], "id");
    assert!(error_message(&body).unwrap_or_default().contains("already been filtered"));

    let body = app
        .graphql(Some(&token), PENDING_JOBS, json!({ "id": campaign.id.to_string() }))
        .await;
    assert_eq!(body["data"]["campaign"]["pendingJobs"], json!([]));

    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_filter_landlines_queue_a_single_job() -> Result<()> {
    let app = spawn_app(config(Environment::Test)).await?;
    let organization = seed_organization(app.db(), "Texters United").await?;
    let admin = seed_member(app.db(), &organization, "admin@example.com", Role::Admin).await?;
    let campaign = seed_campaign(app.db(), &organization, "Canvass", false).await?;
    let admin = AuthUser::from(&admin);
    let campaign_id = campaign.id;

    let tasks: Vec<_> = (0..8)
        .map(|_| {
            let db = app.db().clone();
            let admin = admin.clone();
            tokio::spawn(async move { queue_filter_landlines(&db, &admin, campaign_id).await })
        })
        .collect();

    let mut queued = 0;
    for task in tasks {
        match task.await? {
            Ok(_) => queued += 1,
            Err(ApiError::Conflict(_)) => {}
            Err(err) => panic!("unexpected error: {err}"),
        }
    }
    assert_eq!(queued, 1);

    let jobs = job_requests::Entity::find_pending(campaign_id)
        .all(app.db())
        .await?;
    assert_eq!(jobs.len(), 1);

    Ok(())
}

#[tokio::test]
async fn test_filter_landlines_form_queries_validate() -> Result<()> {
    let app = spawn_app(config(Environment::Test)).await?;
    let organization = seed_organization(app.db(), "Texters United").await?;
    let admin = seed_member(app.db(), &organization, "admin@example.com", Role::Admin).await?;
    let campaign = seed_campaign(app.db(), &organization, "Canvass", false).await?;
    let token = app.sign_in(&admin);

    let body = app
        .graphql(
            Some(&token),
            r#"
            query getOrganizationDataForEditContacts($organizationId: String!) {
              organization(id: $organizationId) {
                id
                numbersApiKey
              }
            }
            "#,
            json!({ "organizationId": organization.id.to_string() }),
        )
        .await;
    assert!(body.get("errors").is_none(), "{body}");
    assert_eq!(body["data"]["organization"]["id"], organization.id.to_string());
    assert!(body["data"]["organization"]["numbersApiKey"].is_string());

    let body = app
        .graphql(
            Some(&token),
            r#"
            query getCampaignContacts($campaignId: String!) {
              campaign(id: $campaignId) {
                id
                landlinesFiltered
              }
            }
            "#,
            json!({ "campaignId": campaign.id.to_string() }),
        )
        .await;
    assert!(body.get("errors").is_none(), "{body}");
    assert_eq!(body["data"]["campaign"]["landlinesFiltered"], false);

    Ok(())
}

#[tokio::test]
async fn test_concurrent_superadmin_logins_share_one_user() -> Result<()> {
    let app = spawn_app(config(Environment::Test)).await?;
    let organization = seed_organization(app.db(), "Texters United").await?;
    let payload = json!({ "organizationId": organization.id });

    let logins = (0..4).map(|_| {
        let (name, value) = superadmin_header();
        app.server
            .post("/superadmin-login")
            .add_header(name, value)
            .json(&payload)
            .into_future()
    });
    let responses = join_all(logins).await;

    let mut user_ids = Vec::new();
    for response in responses {
        assert_eq!(response.status_code(), StatusCode::OK);
        let body: Value = response.json();
        user_ids.push(body["userId"].clone());
    }
    user_ids.dedup();
    assert_eq!(user_ids.len(), 1);

    let superadmins = users::Entity::find()
        .filter(users::Column::Email.eq("superadmin@spoke.local"))
        .all(app.db())
        .await?;
    assert_eq!(superadmins.len(), 1);

    Ok(())
}
