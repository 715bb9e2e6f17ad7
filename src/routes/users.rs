//! User profile routes
//!
//! - `GET /api/users/{id}` - fetch a profile
//! - `PUT /api/users/{id}` - patch profile fields
//! - `POST /api/users/{id}/freelancer-profile` - complete a freelancer profile
//! - `POST /api/users/{id}/worker-profile` - complete a worker profile
//!
//! `availableBalance` is deliberately absent from every patch shape here;
//! only the wallet mutates it.

use bson::doc;
use bytes::Bytes;
use http_body_util::Full;
use hyper::body::Incoming;
use hyper::{Method, Request, Response, StatusCode};
use serde::{Deserialize, Deserializer};
use serde_json::json;
use std::sync::Arc;

use super::{doc_json, error_response, json_response, not_found_response, read_json};
use crate::db::mongo::now_rfc3339;
use crate::server::AppState;
use crate::types::{GatewayError, Result};

pub async fn handle_users_request(
    state: Arc<AppState>,
    req: Request<Incoming>,
) -> Response<Full<Bytes>> {
    let method = req.method().clone();
    let path = req.uri().path().to_string();

    let rest = path.strip_prefix("/api/users").unwrap_or("");
    let segments: Vec<&str> = rest.trim_start_matches('/').split('/').collect();

    let result = match (&method, segments.as_slice()) {
        (&Method::GET, [id]) if !id.is_empty() => {
            let id = id.to_string();
            get_user(&state, &id).await
        }
        (&Method::PUT, [id]) if !id.is_empty() => {
            let id = id.to_string();
            update_user(&state, &id, req).await
        }
        (&Method::POST, [id, "freelancer-profile"]) => {
            let id = id.to_string();
            freelancer_profile(&state, &id, req).await
        }
        (&Method::POST, [id, "worker-profile"]) => {
            let id = id.to_string();
            worker_profile(&state, &id, req).await
        }
        _ => return not_found_response(&path),
    };

    result.unwrap_or_else(|e| error_response(&e))
}

async fn get_user(state: &AppState, id: &str) -> Result<Response<Full<Bytes>>> {
    let user = state
        .stores()?
        .users
        .find_one(doc! { "_id": id })
        .await?
        .ok_or(GatewayError::NotFound("user"))?;

    Ok(json_response(
        StatusCode::OK,
        &json!({ "success": true, "user": doc_json(&user) }),
    ))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct UserPatch {
    name: Option<String>,
    email: Option<String>,
    role: Option<String>,
    bio: Option<String>,
    location: Option<String>,
    phone: Option<String>,
}

async fn update_user(
    state: &AppState,
    id: &str,
    req: Request<Incoming>,
) -> Result<Response<Full<Bytes>>> {
    let patch: UserPatch = read_json(req).await?;

    let mut set = doc! { "updatedAt": now_rfc3339() };
    if let Some(name) = patch.name {
        set.insert("name", name);
    }
    if let Some(email) = patch.email {
        set.insert("email", email);
    }
    if let Some(role) = patch.role {
        set.insert("role", role);
    }
    if let Some(bio) = patch.bio {
        set.insert("bio", bio);
    }
    if let Some(location) = patch.location {
        set.insert("location", location);
    }
    if let Some(phone) = patch.phone {
        set.insert("phone", phone);
    }

    state
        .stores()?
        .users
        .upsert_one(doc! { "_id": id }, doc! { "$set": set })
        .await?;

    Ok(json_response(
        StatusCode::OK,
        &json!({ "success": true, "message": "Profile updated successfully" }),
    ))
}

/// Accept skills as either a comma separated string or a JSON array
fn skills_list<'de, D>(deserializer: D) -> std::result::Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum StringOrList {
        One(String),
        Many(Vec<String>),
    }

    Ok(match StringOrList::deserialize(deserializer)? {
        StringOrList::One(s) => s
            .split(',')
            .map(|part| part.trim().to_string())
            .filter(|part| !part.is_empty())
            .collect(),
        StringOrList::Many(list) => list,
    })
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct FreelancerProfileBody {
    #[serde(default)]
    hourly_rate: f64,
    experience: Option<String>,
    response_time: Option<String>,
    #[serde(default, deserialize_with = "skills_list")]
    tech_stack: Vec<String>,
    bio: Option<String>,
    location: Option<String>,
    profession: Option<String>,
}

async fn freelancer_profile(
    state: &AppState,
    id: &str,
    req: Request<Incoming>,
) -> Result<Response<Full<Bytes>>> {
    let body: FreelancerProfileBody = read_json(req).await?;

    let set = doc! {
        "role": "freelancer",
        "hourlyRate": body.hourly_rate,
        "experience": body.experience,
        "responseTime": body.response_time,
        "techStack": body.tech_stack,
        "bio": body.bio,
        "location": body.location,
        "profession": body.profession,
        "profileCompleted": true,
        "updatedAt": now_rfc3339(),
    };

    state
        .stores()?
        .users
        .upsert_one(doc! { "_id": id }, doc! { "$set": set })
        .await?;

    Ok(json_response(
        StatusCode::OK,
        &json!({ "success": true, "message": "Freelancer profile saved" }),
    ))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct WorkerProfileBody {
    #[serde(default, deserialize_with = "skills_list")]
    skills: Vec<String>,
    availability: Option<String>,
    service_area: Option<String>,
    phone: Option<String>,
    experience: Option<String>,
    bio: Option<String>,
}

async fn worker_profile(
    state: &AppState,
    id: &str,
    req: Request<Incoming>,
) -> Result<Response<Full<Bytes>>> {
    let body: WorkerProfileBody = read_json(req).await?;

    let set = doc! {
        "role": "worker",
        "skills": body.skills,
        "availability": body.availability,
        "serviceArea": body.service_area,
        "phone": body.phone,
        "experience": body.experience,
        "bio": body.bio,
        "profileCompleted": true,
        "updatedAt": now_rfc3339(),
    };

    state
        .stores()?
        .users
        .upsert_one(doc! { "_id": id }, doc! { "$set": set })
        .await?;

    Ok(json_response(
        StatusCode::OK,
        &json!({ "success": true, "message": "Worker profile saved" }),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_skills_from_comma_string() {
        let body: WorkerProfileBody = serde_json::from_value(serde_json::json!({
            "skills": "plumbing, wiring , , carpentry"
        }))
        .unwrap();
        assert_eq!(body.skills, vec!["plumbing", "wiring", "carpentry"]);
    }

    #[test]
    fn test_skills_from_array() {
        let body: WorkerProfileBody = serde_json::from_value(serde_json::json!({
            "skills": ["a", "b"]
        }))
        .unwrap();
        assert_eq!(body.skills, vec!["a", "b"]);
    }

    #[test]
    fn test_user_patch_rejects_balance() {
        assert!(serde_json::from_value::<UserPatch>(serde_json::json!({
            "availableBalance": 10000.0
        }))
        .is_err());
    }
}
