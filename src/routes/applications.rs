//! Job application routes
//!
//! - `POST /api/applications` - submit an application
//! - `GET /api/applications` - list (jobId/freelancerId/clientId/status filters)
//! - `PUT /api/applications/{id}` - review an application
//! - `POST /api/applications/batch-reject` - reject a job's other pending applications

use bson::{doc, oid::ObjectId};
use bytes::Bytes;
use http_body_util::Full;
use hyper::body::Incoming;
use hyper::{Method, Request, Response, StatusCode};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;

use super::{
    docs_json, error_response, json_response, not_found_response, parse_limit,
    parse_query_params, read_json,
};
use crate::db::mongo::now_rfc3339;
use crate::db::schemas::{ApplicationDoc, ApplicationStatus};
use crate::server::AppState;
use crate::types::{GatewayError, Result};

pub async fn handle_applications_request(
    state: Arc<AppState>,
    req: Request<Incoming>,
) -> Response<Full<Bytes>> {
    let method = req.method().clone();
    let path = req.uri().path().to_string();
    let query = req.uri().query().unwrap_or("").to_string();

    let rest = path.strip_prefix("/api/applications").unwrap_or("");
    let segments: Vec<&str> = rest.trim_start_matches('/').split('/').collect();

    let result = match (&method, segments.as_slice()) {
        (&Method::POST, [""]) => submit_application(&state, req).await,
        (&Method::GET, [""]) => list_applications(&state, &query).await,
        (&Method::POST, ["batch-reject"]) => batch_reject(&state, req).await,
        (&Method::PUT, [id]) => {
            let id = id.to_string();
            review_application(&state, &id, req).await
        }
        _ => return not_found_response(&path),
    };

    result.unwrap_or_else(|e| error_response(&e))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApplicationBody {
    job_id: String,
    freelancer_id: String,
    client_id: String,
    cover_letter: Option<String>,
}

async fn submit_application(
    state: &AppState,
    req: Request<Incoming>,
) -> Result<Response<Full<Bytes>>> {
    let body: ApplicationBody = read_json(req).await?;
    let application = ApplicationDoc::new(
        body.job_id,
        body.freelancer_id,
        body.client_id,
        body.cover_letter,
    );
    let application_id = state.stores()?.applications.insert_one(&application).await?;

    Ok(json_response(
        StatusCode::OK,
        &json!({
            "success": true,
            "applicationId": application_id,
            "message": "Application submitted successfully",
        }),
    ))
}

async fn list_applications(state: &AppState, query: &str) -> Result<Response<Full<Bytes>>> {
    let params = parse_query_params(query);
    let mut filter = doc! {};
    if let Some(job_id) = params.get("jobId") {
        filter.insert("jobId", job_id);
    }
    if let Some(freelancer_id) = params.get("freelancerId") {
        filter.insert("freelancerId", freelancer_id);
    }
    if let Some(client_id) = params.get("clientId") {
        filter.insert("clientId", client_id);
    }
    if let Some(status) = params.get("status") {
        filter.insert("status", status);
    }

    let applications = state
        .stores()?
        .applications
        .find_many(
            filter,
            Some(doc! { "appliedAt": -1 }),
            Some(parse_limit(&params, 50)),
        )
        .await?;

    Ok(json_response(
        StatusCode::OK,
        &json!({ "success": true, "applications": docs_json(&applications) }),
    ))
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct ApplicationPatch {
    status: ApplicationStatus,
}

async fn review_application(
    state: &AppState,
    id: &str,
    req: Request<Incoming>,
) -> Result<Response<Full<Bytes>>> {
    let patch: ApplicationPatch = read_json(req).await?;

    let mut set = doc! { "status": bson::to_bson(&patch.status)? };
    match patch.status {
        ApplicationStatus::Approved => {
            set.insert("approvedAt", now_rfc3339());
        }
        ApplicationStatus::Rejected => {
            set.insert("rejectedAt", now_rfc3339());
        }
        ApplicationStatus::Pending => {}
    }

    let matched = state
        .stores()?
        .applications
        .update_by_id(id, doc! { "$set": set })
        .await?;
    if !matched {
        return Err(GatewayError::NotFound("application"));
    }

    Ok(json_response(
        StatusCode::OK,
        &json!({ "success": true, "message": "Application updated successfully" }),
    ))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct BatchRejectBody {
    job_id: String,
    exclude_application_id: Option<String>,
}

/// Reject every pending application for a job except the approved one
async fn batch_reject(state: &AppState, req: Request<Incoming>) -> Result<Response<Full<Bytes>>> {
    let body: BatchRejectBody = read_json(req).await?;

    let mut filter = doc! { "jobId": &body.job_id, "status": "pending" };
    if let Some(exclude) = body
        .exclude_application_id
        .as_deref()
        .and_then(|id| ObjectId::parse_str(id).ok())
    {
        filter.insert("_id", doc! { "$ne": exclude });
    }

    let count = state
        .stores()?
        .applications
        .update_many(
            filter,
            doc! { "$set": { "status": "rejected", "rejectedAt": now_rfc3339() } },
        )
        .await?;

    Ok(json_response(
        StatusCode::OK,
        &json!({
            "success": true,
            "message": "Other applications rejected",
            "count": count,
        }),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_patch_requires_known_status() {
        assert!(serde_json::from_value::<ApplicationPatch>(
            serde_json::json!({ "status": "maybe" })
        )
        .is_err());
        let patch: ApplicationPatch =
            serde_json::from_value(serde_json::json!({ "status": "approved" })).unwrap();
        assert_eq!(patch.status, ApplicationStatus::Approved);
    }

    #[test]
    fn test_batch_reject_body_exclude_optional() {
        let body: BatchRejectBody =
            serde_json::from_value(serde_json::json!({ "jobId": "j1" })).unwrap();
        assert!(body.exclude_application_id.is_none());
    }
}
