//! HTTP server for the multi-instance portal.
//!
//! Exposes instance routing, aggregated document and payslip listings,
//! personal-info sync and conflict resolution sessions as a JSON API.

pub mod config;
pub mod error;
pub mod handler;
pub mod router;
pub mod server;

pub use config::ServerConfig;
pub use error::{ServerError, ServerResult};
pub use handler::AppState;
pub use router::build_router;
pub use server::PortalServer;

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use axum::body::Body;
    use axum::http::{Method, Request, StatusCode};
    use axum::Router;
    use portal_sdk::{Fixture, Instance, Portal, PortalConfig};
    use serde_json::{json, Value};
    use tower::util::ServiceExt;

    fn portal() -> Arc<Portal> {
        Arc::new(Portal::from_fixture(&Fixture::sample().unwrap(), PortalConfig::default()).unwrap())
    }

    fn app() -> Router {
        build_router(AppState::new(portal()))
    }

    /// Sync a new phone number for user-123 and return the conflict ids.
    async fn phone_conflicts(app: &Router) -> Vec<Value> {
        let (status, body) = send(
            app,
            Method::POST,
            "/v1/users/user-123/entities/personalInfo/sync",
            Some(json!({ "candidate": { "contactDetails": { "phone": "087-999-0000" } } })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        body["conflicts"]
            .as_array()
            .unwrap()
            .iter()
            .map(|c| c["id"].clone())
            .collect()
    }

    async fn send(app: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let builder = Request::builder().method(method).uri(uri);
        let request = match body {
            Some(body) => builder
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };
        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, value)
    }

    #[tokio::test]
    async fn health_endpoint() {
        let (status, body) = send(&app(), Method::GET, "/v1/health", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
    }

    #[tokio::test]
    async fn info_endpoint() {
        let (status, body) = send(&app(), Method::GET, "/v1/info", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["users"], 2);
        assert_eq!(body["requestKinds"].as_array().unwrap().len(), 6);
    }

    #[tokio::test]
    async fn route_endpoint() {
        let app = app();
        let (status, body) =
            send(&app, Method::GET, "/v1/users/user-123/route/getPersonalInfo", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["instanceId"], "primary");

        let (status, _) = send(&app, Method::GET, "/v1/users/user-123/route/getSalary", None).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

        let (status, body) = send(&app, Method::GET, "/v1/users/ghost/route/getPayslips", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["status"], 404);
    }

    #[tokio::test]
    async fn active_instance_selection() {
        let app = app();
        let (status, _) = send(
            &app,
            Method::PUT,
            "/v1/users/user-123/active-instance",
            Some(json!({ "instanceId": "post-primary" })),
        )
        .await;
        assert_eq!(status, StatusCode::NO_CONTENT);

        let (status, _) = send(
            &app,
            Method::PUT,
            "/v1/users/user-123/active-instance",
            Some(json!({ "instanceId": "pensioners" })),
        )
        .await;
        assert_eq!(status, StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn payslips_merge_and_filter() {
        let app = app();
        let (status, body) = send(&app, Method::GET, "/v1/users/user-123/payslips", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["items"].as_array().unwrap().len(), 3);

        let (_, body) = send(
            &app,
            Method::GET,
            "/v1/users/user-123/payslips?instance=post-primary",
            None,
        )
        .await;
        assert_eq!(body["items"].as_array().unwrap().len(), 1);

        let (_, body) = send(
            &app,
            Method::GET,
            "/v1/users/user-123/payslips?from=2024-02-01&to=2024-02-29",
            None,
        )
        .await;
        assert_eq!(body["items"][0]["id"], "ps-primary-2024-02");
    }

    #[tokio::test]
    async fn documents_by_type() {
        let app = app();
        let (status, body) =
            send(&app, Method::GET, "/v1/users/user-123/documents?type=contract", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["items"].as_array().unwrap().len(), 1);
        assert_eq!(body["items"][0]["instanceId"], "post-primary");

        let (status, _) =
            send(&app, Method::GET, "/v1/users/user-123/documents?type=memo", None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn instances_status() {
        let (status, body) = send(&app(), Method::GET, "/v1/users/user-123/instances", None).await;
        assert_eq!(status, StatusCode::OK);
        let list = body.as_array().unwrap();
        assert_eq!(list.len(), 4);
        assert_eq!(list[0]["reachable"], true);
        assert_eq!(list[3]["hasAccess"], false);
    }

    #[tokio::test]
    async fn personal_info_read() {
        let (status, body) =
            send(&app(), Method::GET, "/v1/users/user-123/personal-info", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["instance"], "primary");
        assert_eq!(body["value"]["contactDetails"]["phone"], "087-123-4567");
    }

    #[tokio::test]
    async fn personal_info_save_rejects_foreign_body() {
        let app = app();
        let (_, mut body) = send(&app, Method::GET, "/v1/users/user-123/personal-info", None).await;
        let mut info = body["value"].take();
        info["userId"] = json!("user-456");
        let (status, _) =
            send(&app, Method::PUT, "/v1/users/user-123/personal-info", Some(info)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn sync_session_commit_flow() {
        let app = app();
        let (status, body) = send(
            &app,
            Method::POST,
            "/v1/users/user-123/entities/personalInfo/sync",
            Some(json!({
                "candidate": { "contactDetails": { "phone": "087-999-0000" } },
                "openSession": true,
            })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], false);
        assert_eq!(body["conflicts"][0]["instanceId"], "primary");
        assert_eq!(body["conflicts"][0]["field"], "contactDetails.phone");

        let session = body["session"]["id"].as_str().unwrap().to_string();
        let conflict = body["conflicts"][0]["id"].as_str().unwrap().to_string();

        let (status, body) = send(
            &app,
            Method::PUT,
            &format!("/v1/sessions/{session}/conflicts/{conflict}"),
            Some(json!({ "resolution": "new" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["state"], "resolving");

        let commit = format!("/v1/sessions/{session}/commit");
        let (status, body) = send(&app, Method::POST, &commit, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], true);
        assert_eq!(body["resolvedConflicts"], 1);

        let (status, _) = send(&app, Method::POST, &commit, None).await;
        assert_eq!(status, StatusCode::GONE);

        let (_, body) = send(&app, Method::GET, "/v1/users/user-123/personal-info", None).await;
        assert_eq!(body["value"]["contactDetails"]["phone"], "087-999-0000");
    }

    #[tokio::test]
    async fn unknown_session_is_404() {
        let app = app();
        let uri = format!("/v1/sessions/{}", portal_sdk::SessionId::new());
        let (status, _) = send(&app, Method::GET, &uri, None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, _) = send(&app, Method::GET, "/v1/sessions/not-a-uuid", None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn empty_candidate_is_a_noop() {
        let (status, body) = send(
            &app(),
            Method::POST,
            "/v1/users/user-123/entities/personalInfo/sync",
            Some(json!({ "candidate": {} })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], true);
        assert_eq!(body["applied"].as_array().unwrap().len(), 0);
    }

    #[tokio::test]
    async fn open_session_starts_every_conflict_at_current() {
        let app = app();
        let ids = phone_conflicts(&app).await;
        let (status, body) = send(
            &app,
            Method::POST,
            "/v1/users/user-123/sessions",
            Some(json!({ "entity": "personalInfo", "conflictIds": ids })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["conflicts"][0]["resolution"], "current");

        let commit = format!("/v1/sessions/{}/commit", body["id"].as_str().unwrap());
        let (status, body) = send(&app, Method::POST, &commit, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], true);

        let (_, body) = send(&app, Method::GET, "/v1/users/user-123/personal-info", None).await;
        assert_eq!(body["value"]["contactDetails"]["phone"], "087-123-4567");
    }

    #[tokio::test]
    async fn open_session_rejects_unissued_conflicts() {
        let app = app();
        phone_conflicts(&app).await;
        let (status, _) = send(
            &app,
            Method::POST,
            "/v1/users/user-123/sessions",
            Some(json!({
                "entity": "personalInfo",
                "conflictIds": [portal_sdk::ConflictId::new()],
            })),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        // A full conflict body in place of ids is not accepted either.
        let (status, _) = send(
            &app,
            Method::POST,
            "/v1/users/user-123/sessions",
            Some(json!({
                "entity": "personalInfo",
                "conflicts": [{
                    "id": portal_sdk::ConflictId::new(),
                    "instanceId": "pensioners",
                    "field": "civilStatus",
                    "currentValue": "single",
                    "newValue": "forged",
                    "resolution": "new",
                }],
            })),
        )
        .await;
        assert!(status.is_client_error());
    }

    #[tokio::test]
    async fn open_session_rejects_inaccessible_instances() {
        let portal = portal();
        let app = build_router(AppState::new(Arc::clone(&portal)));
        let ids = phone_conflicts(&app).await;

        portal
            .directory()
            .register(
                "user-123".into(),
                vec![
                    Instance::new("primary", "Primary").primary().without_access(),
                    Instance::new("post-primary", "Post Primary"),
                ],
            )
            .unwrap();
        let (status, body) = send(
            &app,
            Method::POST,
            "/v1/users/user-123/sessions",
            Some(json!({ "entity": "personalInfo", "conflictIds": ids })),
        )
        .await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["status"], 403);
    }

    #[tokio::test]
    async fn committed_session_is_gone() {
        let app = app();
        let ids = phone_conflicts(&app).await;
        let (_, body) = send(
            &app,
            Method::POST,
            "/v1/users/user-123/sessions",
            Some(json!({ "entity": "personalInfo", "conflictIds": ids })),
        )
        .await;
        let id = body["id"].as_str().unwrap().to_string();
        send(&app, Method::POST, &format!("/v1/sessions/{id}/commit"), None).await;

        let (status, _) = send(&app, Method::GET, &format!("/v1/sessions/{id}"), None).await;
        assert_eq!(status, StatusCode::GONE);
    }
}
