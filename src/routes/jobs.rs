//! Job posting routes
//!
//! - `POST /api/jobs` - post a job
//! - `GET /api/jobs` - list jobs (clientId/status/jobCategory filters)
//! - `GET /api/jobs/{id}` - fetch one job
//! - `PUT /api/jobs/{id}` - patch a job
//! - `POST /api/jobs/{id}/increment-proposals` - bump the proposal counter

use bson::doc;
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
use crate::db::mongo::now_rfc3339;
use crate::db::schemas::JobDoc;
use crate::server::AppState;
use crate::types::{GatewayError, Result};

pub async fn handle_jobs_request(
    state: Arc<AppState>,
    req: Request<Incoming>,
) -> Response<Full<Bytes>> {
    let method = req.method().clone();
    let path = req.uri().path().to_string();
    let query = req.uri().query().unwrap_or("").to_string();

    let rest = path.strip_prefix("/api/jobs").unwrap_or("");
    let segments: Vec<&str> = rest.trim_start_matches('/').split('/').collect();

    let result = match (&method, segments.as_slice()) {
        (&Method::POST, [""]) => create_job(&state, req).await,
        (&Method::GET, [""]) => list_jobs(&state, &query).await,
        (&Method::GET, [id]) => {
            let id = id.to_string();
            get_job(&state, &id).await
        }
        (&Method::PUT, [id]) => {
            let id = id.to_string();
            update_job(&state, &id, req).await
        }
        (&Method::POST, [id, "increment-proposals"]) => {
            let id = id.to_string();
            increment_proposals(&state, &id).await
        }
        _ => return not_found_response(&path),
    };

    result.unwrap_or_else(|e| error_response(&e))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct JobCreateBody {
    client_id: String,
    title: String,
    description: String,
    job_category: Option<String>,
    budget: Option<f64>,
}

async fn create_job(state: &AppState, req: Request<Incoming>) -> Result<Response<Full<Bytes>>> {
    let body: JobCreateBody = read_json(req).await?;
    let job = JobDoc::new(
        body.client_id,
        body.title,
        body.description,
        body.job_category,
        body.budget,
    );
    let job_id = state.stores()?.jobs.insert_one(&job).await?;

    Ok(json_response(
        StatusCode::OK,
        &json!({
            "success": true,
            "jobId": job_id,
            "message": "Job posted successfully",
        }),
    ))
}

async fn list_jobs(state: &AppState, query: &str) -> Result<Response<Full<Bytes>>> {
    let params = parse_query_params(query);
    let mut filter = doc! {};
    if let Some(client_id) = params.get("clientId") {
        filter.insert("clientId", client_id);
    }
    if let Some(status) = params.get("status") {
        filter.insert("status", status);
    }
    if let Some(category) = params.get("jobCategory") {
        filter.insert("jobCategory", category);
    }

    let jobs = state
        .stores()?
        .jobs
        .find_many(
            filter,
            Some(doc! { "createdAt": -1 }),
            Some(parse_limit(&params, 50)),
        )
        .await?;

    Ok(json_response(
        StatusCode::OK,
        &json!({ "success": true, "jobs": docs_json(&jobs) }),
    ))
}

async fn get_job(state: &AppState, id: &str) -> Result<Response<Full<Bytes>>> {
    let job = state
        .stores()?
        .jobs
        .find_by_id(id)
        .await?
        .ok_or(GatewayError::NotFound("job"))?;

    Ok(json_response(
        StatusCode::OK,
        &json!({ "success": true, "job": doc_json(&job) }),
    ))
}

/// Patchable job fields; unknown keys are rejected so clients cannot
/// overwrite the proposal counter or ids
#[derive(Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct JobPatch {
    title: Option<String>,
    description: Option<String>,
    job_category: Option<String>,
    budget: Option<f64>,
    status: Option<String>,
}

async fn update_job(
    state: &AppState,
    id: &str,
    req: Request<Incoming>,
) -> Result<Response<Full<Bytes>>> {
    let patch: JobPatch = read_json(req).await?;

    let mut set = doc! { "updatedAt": now_rfc3339() };
    if let Some(title) = patch.title {
        set.insert("title", title);
    }
    if let Some(description) = patch.description {
        set.insert("description", description);
    }
    if let Some(category) = patch.job_category {
        set.insert("jobCategory", category);
    }
    if let Some(budget) = patch.budget {
        set.insert("budget", budget);
    }
    if let Some(status) = patch.status {
        set.insert("status", status);
    }

    let matched = state
        .stores()?
        .jobs
        .update_by_id(id, doc! { "$set": set })
        .await?;
    if !matched {
        return Err(GatewayError::NotFound("job"));
    }

    Ok(json_response(
        StatusCode::OK,
        &json!({ "success": true, "message": "Job updated successfully" }),
    ))
}

async fn increment_proposals(state: &AppState, id: &str) -> Result<Response<Full<Bytes>>> {
    let matched = state
        .stores()?
        .jobs
        .update_by_id(
            id,
            doc! {
                "$inc": { "proposals": 1 },
                "$set": { "updatedAt": now_rfc3339() },
            },
        )
        .await?;
    if !matched {
        return Err(GatewayError::NotFound("job"));
    }

    let proposals = state
        .stores()?
        .jobs
        .find_by_id(id)
        .await?
        .map(|job| job.proposals)
        .unwrap_or(0);

    Ok(json_response(
        StatusCode::OK,
        &json!({ "success": true, "proposals": proposals }),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_job_patch_rejects_unknown_fields() {
        let patch = serde_json::from_value::<JobPatch>(serde_json::json!({
            "proposals": 999
        }));
        assert!(patch.is_err());
    }

    #[test]
    fn test_job_patch_accepts_partial() {
        let patch: JobPatch =
            serde_json::from_value(serde_json::json!({ "status": "closed" })).unwrap();
        assert_eq!(patch.status.as_deref(), Some("closed"));
        assert!(patch.title.is_none());
    }
}
