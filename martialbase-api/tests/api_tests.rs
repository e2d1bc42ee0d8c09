/// End-to-end tests of the HTTP surface
///
/// Requests go through the full router (identity layer, handlers, error
/// mapping) with `tower::ServiceExt::oneshot`.
///
/// Run with: `DATABASE_URL=postgresql://... cargo test -p martialbase-api --test api_tests`

mod common;

use axum::http::{header, StatusCode};
use common::{
    json_body, linked_member, offline_app, organisation, person, request, send, test_app, token,
};
use martialbase_shared::{
    auth::roles::UserRole,
    models::organisation_person::OrganisationPerson,
};
use serde_json::json;
use uuid::Uuid;

// ---------------------------------------------------------------------------
// No database needed
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_missing_token_is_401() {
    let app = offline_app();

    let response = send(&app, request("GET", "/v1/organisations", None, None)).await;

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body = json_body(response).await;
    assert_eq!(body["error"], "unauthorized");
}

#[tokio::test]
async fn test_forged_token_is_401() {
    let app = offline_app();
    let forged = martialbase_shared::auth::jwt::create_token(
        &martialbase_shared::auth::jwt::IdentityClaims::new(Uuid::new_v4(), common::ISSUER),
        "a-completely-different-secret-of-32-bytes",
    )
    .unwrap();

    let response = send(&app, request("GET", "/v1/users/me", Some(&forged), None)).await;

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_non_bearer_header_is_400() {
    let app = offline_app();
    let req = axum::http::Request::builder()
        .uri("/v1/roles")
        .header(header::AUTHORIZATION, "Basic dXNlcjpwYXNz")
        .body(axum::body::Body::empty())
        .unwrap();

    let response = send(&app, req).await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_security_headers_on_rejections() {
    let app = offline_app();

    let response = send(&app, request("GET", "/v1/organisations", None, None)).await;

    let headers = response.headers();
    assert_eq!(headers.get("x-content-type-options").unwrap(), "nosniff");
    assert_eq!(headers.get("x-frame-options").unwrap(), "DENY");
    assert!(headers.get("strict-transport-security").is_none());
}

#[tokio::test]
async fn test_unknown_route_is_404() {
    let app = offline_app();

    let response = send(&app, request("GET", "/nope", None, None)).await;

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

// ---------------------------------------------------------------------------
// Database backed
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_health_reports_connected() {
    let Some((app, _pool)) = test_app().await else {
        return;
    };

    let response = send(&app, request("GET", "/health", None, None)).await;

    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["database"], "connected");
}

#[tokio::test]
async fn test_role_catalogue_is_listed() {
    let Some((app, _pool)) = test_app().await else {
        return;
    };
    let caller = token(Uuid::new_v4(), &[]);

    let response = send(&app, request("GET", "/v1/roles", Some(&caller), None)).await;

    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body.as_array().unwrap().len(), 8);
}

#[tokio::test]
async fn test_add_person_requires_organisation_admin() {
    let Some((app, pool)) = test_app().await else {
        return;
    };
    let org = organisation(&pool, false).await;
    let external_id = Uuid::new_v4();
    linked_member(&pool, org.id, false, external_id).await;
    let newcomer = person(&pool, "Newcomer").await;
    let caller = token(external_id, &[UserRole::OrganisationMember]);

    let uri = format!("/v1/organisations/{}/people/{}?is_admin=false", org.id, newcomer.id);
    let response = send(&app, request("POST", &uri, Some(&caller), None)).await;

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    let body = json_body(response).await;
    assert_eq!(body["code"], "NotOrganisationAdmin");
    assert_eq!(body["organisation_id"], org.id.to_string());

    let stored = OrganisationPerson::find(&pool, org.id, newcomer.id).await.unwrap();
    assert!(stored.is_none());
}

#[tokio::test]
async fn test_admin_adds_existing_person() {
    let Some((app, pool)) = test_app().await else {
        return;
    };
    let org = organisation(&pool, false).await;
    let external_id = Uuid::new_v4();
    linked_member(&pool, org.id, true, external_id).await;
    let newcomer = person(&pool, "Newcomer").await;
    let caller = token(external_id, &[UserRole::OrganisationAdmin]);

    let uri = format!("/v1/organisations/{}/people/{}?is_admin=true", org.id, newcomer.id);
    let response = send(&app, request("POST", &uri, Some(&caller), None)).await;

    assert_eq!(response.status(), StatusCode::CREATED);
    let body = json_body(response).await;
    assert_eq!(body["is_admin"], true);

    let stored = OrganisationPerson::find(&pool, org.id, newcomer.id)
        .await
        .unwrap()
        .unwrap();
    assert!(stored.is_admin);
}

#[tokio::test]
async fn test_unparsable_flag_is_422() {
    let Some((app, pool)) = test_app().await else {
        return;
    };
    let org = organisation(&pool, false).await;
    let external_id = Uuid::new_v4();
    linked_member(&pool, org.id, true, external_id).await;
    let newcomer = person(&pool, "Newcomer").await;
    let caller = token(external_id, &[UserRole::OrganisationAdmin]);

    let uri = format!("/v1/organisations/{}/people/{}?is_admin=maybe", org.id, newcomer.id);
    let response = send(&app, request("POST", &uri, Some(&caller), None)).await;

    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let body = json_body(response).await;
    assert_eq!(body["error"], "validation_error");
}

#[tokio::test]
async fn test_unknown_organisation_is_404_with_message() {
    let Some((app, _pool)) = test_app().await else {
        return;
    };
    let missing = Uuid::new_v4();
    let caller = token(Uuid::new_v4(), &[UserRole::SystemAdmin]);

    let uri = format!("/v1/organisations/{}", missing);
    let response = send(&app, request("GET", &uri, Some(&caller), None)).await;

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let body = json_body(response).await;
    assert_eq!(
        body["message"],
        format!("Organisation ID '{}' not found.", missing)
    );
}

#[tokio::test]
async fn test_unregistered_caller_is_refused() {
    let Some((app, pool)) = test_app().await else {
        return;
    };
    let org = organisation(&pool, true).await;
    let caller = token(Uuid::new_v4(), &[UserRole::OrganisationMember]);

    let uri = format!("/v1/organisations/{}/people", org.id);
    let response = send(&app, request("GET", &uri, Some(&caller), None)).await;

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    let body = json_body(response).await;
    assert_eq!(body["code"], "AzureUserNotRegistered");
}

#[tokio::test]
async fn test_create_organisation_needs_system_admin() {
    let Some((app, pool)) = test_app().await else {
        return;
    };
    let org = organisation(&pool, false).await;
    let external_id = Uuid::new_v4();
    linked_member(&pool, org.id, true, external_id).await;
    let caller = token(external_id, &[UserRole::OrganisationAdmin]);

    let body = json!({ "initials": "NEW", "name": format!("New {}", Uuid::new_v4()) });
    let response = send(&app, request("POST", "/v1/organisations", Some(&caller), Some(body))).await;

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    let body = json_body(response).await;
    assert_eq!(body["code"], "InsufficientUserRole");
}

#[tokio::test]
async fn test_invalid_body_lists_fields() {
    let Some((app, _pool)) = test_app().await else {
        return;
    };
    let caller = token(Uuid::new_v4(), &[UserRole::SystemAdmin]);

    let body = json!({ "initials": "", "name": "" });
    let response = send(&app, request("POST", "/v1/organisations", Some(&caller), Some(body))).await;

    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let body = json_body(response).await;
    let fields: Vec<&str> = body["details"]
        .as_array()
        .unwrap()
        .iter()
        .map(|detail| detail["field"].as_str().unwrap())
        .collect();
    assert_eq!(fields, vec!["initials", "name"]);
}

#[tokio::test]
async fn test_create_organisation_then_claim_admin_invitation() {
    let Some((app, _pool)) = test_app().await else {
        return;
    };
    let system_admin = token(Uuid::new_v4(), &[UserRole::SystemAdmin]);

    let body = json!({
        "initials": "BKA",
        "name": format!("British Karate {}", Uuid::new_v4()),
        "is_public": true,
        "admin": { "first_name": "Ada", "last_name": "Lovelace" }
    });
    let response = send(
        &app,
        request("POST", "/v1/organisations", Some(&system_admin), Some(body)),
    )
    .await;

    assert_eq!(response.status(), StatusCode::CREATED);
    let created = json_body(response).await;
    let organisation_id = created["organisation"]["id"].as_str().unwrap().to_string();
    let code = created["admin"]["invitation_code"].as_str().unwrap().to_string();
    assert_eq!(code.len(), 7);

    // The admin links their identity with the code
    let admin_identity = Uuid::new_v4();
    let admin = token(admin_identity, &[]);
    let response = send(
        &app,
        request(
            "POST",
            "/v1/users/claim",
            Some(&admin),
            Some(json!({ "code": code.to_lowercase() })),
        ),
    )
    .await;

    assert_eq!(response.status(), StatusCode::OK);
    let claimed = json_body(response).await;
    let roles: Vec<&str> = claimed["roles"]
        .as_array()
        .unwrap()
        .iter()
        .map(|role| role.as_str().unwrap())
        .collect();
    assert!(roles.contains(&"organisation_admin"));
    assert!(roles.contains(&"organisation_member"));

    // Stored roles now apply without any token claims
    let response = send(&app, request("GET", "/v1/users/me", Some(&admin), None)).await;
    assert_eq!(response.status(), StatusCode::OK);
    let me = json_body(response).await;
    assert_eq!(me["person"]["first_name"], "Ada");

    let uri = format!("/v1/organisations/{}/people", organisation_id);
    let response = send(&app, request("GET", &uri, Some(&admin), None)).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await.as_array().unwrap().len(), 1);

    // Single use
    let response = send(
        &app,
        request(
            "POST",
            "/v1/users/claim",
            Some(&token(Uuid::new_v4(), &[])),
            Some(json!({ "code": code })),
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_removing_last_membership_is_orphan() {
    let Some((app, pool)) = test_app().await else {
        return;
    };
    let org = organisation(&pool, false).await;
    let external_id = Uuid::new_v4();
    linked_member(&pool, org.id, true, external_id).await;
    let loner = person(&pool, "Loner").await;
    OrganisationPerson::upsert(&pool, org.id, loner.id, false)
        .await
        .unwrap();
    let caller = token(external_id, &[UserRole::OrganisationAdmin]);

    let uri = format!("/v1/organisations/{}/people/{}", org.id, loner.id);
    let response = send(&app, request("DELETE", &uri, Some(&caller), None)).await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = json_body(response).await;
    assert_eq!(body["error"], "orphan_person_entity");

    let stored = OrganisationPerson::find(&pool, org.id, loner.id).await.unwrap();
    assert!(stored.is_some());
}
