//! Project lifecycle routes
//!
//! ## Routes
//!
//! - `POST /api/projects` - create a project
//! - `GET /api/projects` - list projects (clientId/freelancerId/status filters)
//! - `GET /api/projects/{id}` - fetch one project
//! - `PUT /api/projects/{id}` - patch descriptive fields / cancel / dispute
//! - `POST /api/projects/{id}/sign-agreement`
//! - `POST /api/projects/{id}/secure-payment`
//! - `PUT /api/projects/{id}/stages/{index}`
//! - `POST /api/projects/{id}/release-payment`
//! - `POST /api/projects/{id}/rating`
//! - `GET|POST /api/projects/{id}/messages`

use bytes::Bytes;
use http_body_util::Full;
use hyper::body::Incoming;
use hyper::{Method, Request, Response, StatusCode};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;

use super::{
    doc_json, docs_json, error_response, json_response, not_found_response, parse_limit,
    parse_query_params, read_json,
};
use crate::db::schemas::{MessageType, Stage, StageStatus};
use crate::lifecycle::{PartyRole, ProjectPatch};
use crate::server::AppState;
use crate::types::Result;

/// Parsed project route components
#[derive(Debug, PartialEq)]
enum ProjectRoute<'a> {
    Collection,
    Project(&'a str),
    Action(&'a str, &'a str),
    Stage(&'a str, usize),
}

impl<'a> ProjectRoute<'a> {
    fn parse(path: &'a str) -> Option<Self> {
        let rest = path.strip_prefix("/api/projects")?;
        if rest.is_empty() {
            return Some(ProjectRoute::Collection);
        }
        let rest = rest.strip_prefix('/')?;

        let mut parts = rest.splitn(3, '/');
        let id = parts.next().filter(|s| !s.is_empty())?;
        match (parts.next(), parts.next()) {
            (None, _) => Some(ProjectRoute::Project(id)),
            (Some("stages"), Some(index)) => {
                Some(ProjectRoute::Stage(id, index.parse().ok()?))
            }
            (Some(action), None) => Some(ProjectRoute::Action(id, action)),
            _ => None,
        }
    }
}

pub async fn handle_projects_request(
    state: Arc<AppState>,
    req: Request<Incoming>,
) -> Response<Full<Bytes>> {
    let method = req.method().clone();
    let path = req.uri().path().to_string();
    let query = req.uri().query().unwrap_or("").to_string();

    let result = match (ProjectRoute::parse(&path), method) {
        (Some(ProjectRoute::Collection), Method::POST) => create_project(&state, req).await,
        (Some(ProjectRoute::Collection), Method::GET) => list_projects(&state, &query).await,
        (Some(ProjectRoute::Project(id)), Method::GET) => {
            let id = id.to_string();
            get_project(&state, &id).await
        }
        (Some(ProjectRoute::Project(id)), Method::PUT) => {
            let id = id.to_string();
            update_project(&state, &id, req).await
        }
        (Some(ProjectRoute::Action(id, "sign-agreement")), Method::POST) => {
            let id = id.to_string();
            sign_agreement(&state, &id, req).await
        }
        (Some(ProjectRoute::Action(id, "secure-payment")), Method::POST) => {
            let id = id.to_string();
            secure_payment(&state, &id, req).await
        }
        (Some(ProjectRoute::Action(id, "release-payment")), Method::POST) => {
            let id = id.to_string();
            release_payment(&state, &id).await
        }
        (Some(ProjectRoute::Action(id, "rating")), Method::POST) => {
            let id = id.to_string();
            submit_rating(&state, &id, req).await
        }
        (Some(ProjectRoute::Action(id, "messages")), Method::GET) => {
            let id = id.to_string();
            list_messages(&state, &id, &query).await
        }
        (Some(ProjectRoute::Action(id, "messages")), Method::POST) => {
            let id = id.to_string();
            send_message(&state, &id, req).await
        }
        (Some(ProjectRoute::Stage(id, index)), Method::PUT) => {
            let id = id.to_string();
            update_stage(&state, &id, index, req).await
        }
        _ => return not_found_response(&path),
    };

    result.unwrap_or_else(|e| error_response(&e))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct StageInput {
    name: String,
    #[serde(default)]
    description: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateProjectBody {
    client_id: String,
    freelancer_id: String,
    title: Option<String>,
    terms: Option<String>,
    stages: Option<Vec<StageInput>>,
}

async fn create_project(
    state: &AppState,
    req: Request<Incoming>,
) -> Result<Response<Full<Bytes>>> {
    let body: CreateProjectBody = read_json(req).await?;
    let stages = body.stages.map(|stages| {
        stages
            .iter()
            .map(|s| Stage::new(&s.name, &s.description))
            .collect()
    });

    let project_id = state
        .lifecycle()?
        .create_project(
            body.client_id,
            body.freelancer_id,
            body.title,
            body.terms,
            stages,
        )
        .await?;

    Ok(json_response(
        StatusCode::OK,
        &json!({
            "success": true,
            "projectId": project_id,
            "message": "Project created successfully",
        }),
    ))
}

async fn list_projects(state: &AppState, query: &str) -> Result<Response<Full<Bytes>>> {
    let params = parse_query_params(query);
    let projects = state
        .lifecycle()?
        .list_projects(
            params.get("clientId").map(String::as_str),
            params.get("freelancerId").map(String::as_str),
            params.get("status").map(String::as_str),
            parse_limit(&params, 50),
        )
        .await?;

    Ok(json_response(
        StatusCode::OK,
        &json!({ "success": true, "projects": docs_json(&projects) }),
    ))
}

async fn get_project(state: &AppState, id: &str) -> Result<Response<Full<Bytes>>> {
    let project = state.lifecycle()?.get_project(id).await?;
    Ok(json_response(
        StatusCode::OK,
        &json!({ "success": true, "project": doc_json(&project) }),
    ))
}

async fn update_project(
    state: &AppState,
    id: &str,
    req: Request<Incoming>,
) -> Result<Response<Full<Bytes>>> {
    let patch: ProjectPatch = read_json(req).await?;
    state.lifecycle()?.update_project(id, patch).await?;

    Ok(json_response(
        StatusCode::OK,
        &json!({ "success": true, "message": "Project updated successfully" }),
    ))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SignBody {
    user_role: PartyRole,
    #[serde(default)]
    user_name: String,
}

async fn sign_agreement(
    state: &AppState,
    id: &str,
    req: Request<Incoming>,
) -> Result<Response<Full<Bytes>>> {
    let body: SignBody = read_json(req).await?;
    let both_agreed = state
        .lifecycle()?
        .sign_agreement(id, body.user_role, &body.user_name)
        .await?;

    Ok(json_response(
        StatusCode::OK,
        &json!({ "success": true, "bothAgreed": both_agreed }),
    ))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SecurePaymentBody {
    escrow_amount: f64,
    payment_method: Option<String>,
    payment_id: Option<String>,
    order_id: Option<String>,
}

async fn secure_payment(
    state: &AppState,
    id: &str,
    req: Request<Incoming>,
) -> Result<Response<Full<Bytes>>> {
    let body: SecurePaymentBody = read_json(req).await?;
    state
        .lifecycle()?
        .secure_payment(
            id,
            body.escrow_amount,
            body.payment_method,
            body.payment_id,
            body.order_id,
        )
        .await?;

    Ok(json_response(
        StatusCode::OK,
        &json!({ "success": true, "message": "Payment secured successfully" }),
    ))
}

#[derive(Deserialize)]
struct StageBody {
    status: StageStatus,
}

async fn update_stage(
    state: &AppState,
    id: &str,
    index: usize,
    req: Request<Incoming>,
) -> Result<Response<Full<Bytes>>> {
    let body: StageBody = read_json(req).await?;
    let (stages, _completed) = state
        .lifecycle()?
        .update_stage(id, index, body.status)
        .await?;

    Ok(json_response(
        StatusCode::OK,
        &json!({ "success": true, "stages": serde_json::to_value(&stages)? }),
    ))
}

async fn release_payment(state: &AppState, id: &str) -> Result<Response<Full<Bytes>>> {
    state.lifecycle()?.release_payment(id).await?;

    Ok(json_response(
        StatusCode::OK,
        &json!({ "success": true, "message": "Payment released successfully" }),
    ))
}

#[derive(Deserialize)]
struct RatingBody {
    stars: i32,
    #[serde(default)]
    feedback: String,
}

async fn submit_rating(
    state: &AppState,
    id: &str,
    req: Request<Incoming>,
) -> Result<Response<Full<Bytes>>> {
    let body: RatingBody = read_json(req).await?;
    state
        .lifecycle()?
        .submit_rating(id, body.stars, body.feedback)
        .await?;

    Ok(json_response(
        StatusCode::OK,
        &json!({ "success": true, "message": "Rating submitted successfully" }),
    ))
}

async fn list_messages(state: &AppState, id: &str, query: &str) -> Result<Response<Full<Bytes>>> {
    let params = parse_query_params(query);
    let messages = state
        .lifecycle()?
        .list_messages(id, parse_limit(&params, 100))
        .await?;

    Ok(json_response(
        StatusCode::OK,
        &json!({ "success": true, "messages": docs_json(&messages) }),
    ))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct MessageBody {
    sender_id: String,
    sender_name: String,
    sender_role: String,
    content: String,
    #[serde(rename = "type", default = "default_message_type")]
    message_type: MessageType,
}

fn default_message_type() -> MessageType {
    MessageType::Text
}

async fn send_message(
    state: &AppState,
    id: &str,
    req: Request<Incoming>,
) -> Result<Response<Full<Bytes>>> {
    let body: MessageBody = read_json(req).await?;
    let (message_id, message) = state
        .lifecycle()?
        .append_message(
            id,
            body.sender_id,
            body.sender_name,
            body.sender_role,
            body.content,
            body.message_type,
        )
        .await?;

    Ok(json_response(
        StatusCode::OK,
        &json!({
            "success": true,
            "messageId": message_id,
            "message": doc_json(&message),
        }),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_route_parsing() {
        assert_eq!(ProjectRoute::parse("/api/projects"), Some(ProjectRoute::Collection));
        assert_eq!(ProjectRoute::parse("/api/projects/abc"), Some(ProjectRoute::Project("abc")));
        assert_eq!(
            ProjectRoute::parse("/api/projects/abc/sign-agreement"),
            Some(ProjectRoute::Action("abc", "sign-agreement"))
        );
        assert_eq!(
            ProjectRoute::parse("/api/projects/abc/stages/2"),
            Some(ProjectRoute::Stage("abc", 2))
        );
        assert_eq!(ProjectRoute::parse("/api/projects/abc/stages/x"), None);
        assert_eq!(ProjectRoute::parse("/api/jobs"), None);
        assert_eq!(ProjectRoute::parse("/api/projects/"), None);
    }

    #[test]
    fn test_sign_body_parses_role() {
        let body: SignBody = serde_json::from_value(serde_json::json!({
            "userRole": "freelancer",
            "userName": "Fiona"
        }))
        .unwrap();
        assert_eq!(body.user_role, PartyRole::Freelancer);
        assert_eq!(body.user_name, "Fiona");
    }

    #[test]
    fn test_invalid_role_rejected() {
        let body = serde_json::from_value::<SignBody>(serde_json::json!({
            "userRole": "admin"
        }));
        assert!(body.is_err());
    }
}
