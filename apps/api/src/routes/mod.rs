pub mod health;

use axum::{
    routing::{get, post},
    Router,
};

use crate::interview::handlers as interviews;
use crate::knowledge::handlers as resumes;
use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_handler))
        // Resume knowledge
        .route("/api/v1/resumes/upload", post(resumes::handle_upload))
        .route("/api/v1/resumes/:id", get(resumes::handle_get_resume))
        // Interviews
        .route("/api/v1/interviews/start", post(interviews::handle_start))
        .route("/api/v1/sessions", get(interviews::handle_list_sessions))
        .route(
            "/api/v1/sessions/:id",
            get(interviews::handle_get_session).delete(interviews::handle_delete_session),
        )
        .route("/api/v1/sessions/:id/answer", post(interviews::handle_answer))
        .route("/api/v1/sessions/:id/messages", get(interviews::handle_messages))
        .route("/api/v1/sessions/:id/report", get(interviews::handle_report))
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use axum::body::{to_bytes, Body};
    use axum::http::{header, Method, Request, StatusCode};
    use serde_json::{json, Value};
    use tower::ServiceExt;
    use uuid::Uuid;

    use crate::state::Backends;
    use crate::testing::{interview_generator, STAGE_TIMEOUT};

    const BOUNDARY: &str = "interview-test-boundary";

    fn app() -> Router {
        let backends = Backends::in_memory(Arc::new(interview_generator()));
        build_router(AppState::assemble(backends, 3, STAGE_TIMEOUT))
    }

    async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, body)
    }

    fn json_request(method: Method, uri: &str, body: Value) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn get(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    fn upload_request(user_id: Uuid, resume: &str) -> Request<Body> {
        let body = format!(
            "--{BOUNDARY}\r\n\
             Content-Disposition: form-data; name=\"user_id\"\r\n\r\n\
             {user_id}\r\n\
             --{BOUNDARY}\r\n\
             Content-Disposition: form-data; name=\"file\"; filename=\"cv.txt\"\r\n\
             Content-Type: text/plain\r\n\r\n\
             {resume}\r\n\
             --{BOUNDARY}--\r\n"
        );
        Request::builder()
            .method(Method::POST)
            .uri("/api/v1/resumes/upload")
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={BOUNDARY}"),
            )
            .body(Body::from(body))
            .unwrap()
    }

    #[tokio::test]
    async fn test_health() {
        let (status, body) = send(&app(), get("/health")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["service"], "interview-api");
    }

    #[tokio::test]
    async fn test_upload_start_and_answer_flow() {
        let app = app();
        let user_id = Uuid::new_v4();

        let (status, uploaded) = send(
            &app,
            upload_request(user_id, "Analyst.\n\nEXPERIENCE\nAcme 2020 - 2024\n- SQL reporting\n"),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(uploaded["reused"], false);
        let resume_id = uploaded["resume"]["id"].as_str().unwrap().to_string();

        let (status, resume) = send(&app, get(&format!("/api/v1/resumes/{resume_id}"))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(resume["user_id"], user_id.to_string());

        let (status, started) = send(
            &app,
            json_request(
                Method::POST,
                "/api/v1/interviews/start",
                json!({"user_id": user_id, "resume_id": resume_id, "job_role": "Data Analyst"}),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        let session_id = started["session_id"].as_str().unwrap().to_string();
        let answer_uri = format!("/api/v1/sessions/{session_id}/answer");

        let (status, turn) = send(
            &app,
            json_request(Method::POST, &answer_uri, json!({"answer": "maybe"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert!(turn["next_question"].is_null());
        assert_eq!(turn["question_count"], 0);

        let (_, turn) = send(
            &app,
            json_request(Method::POST, &answer_uri, json!({"answer": "yes"})),
        )
        .await;
        assert!(turn["next_question"].is_string());

        let (status, body) = send(&app, get(&format!("/api/v1/sessions/{session_id}/report"))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["code"], "NOT_COMPLETED");

        let (status, sessions) =
            send(&app, get(&format!("/api/v1/sessions?user_id={user_id}"))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(sessions.as_array().map(Vec::len), Some(1));

        let (_, messages) =
            send(&app, get(&format!("/api/v1/sessions/{session_id}/messages"))).await;
        assert_eq!(messages.as_array().map(Vec::len), Some(5));

        let delete = Request::builder()
            .method(Method::DELETE)
            .uri(format!("/api/v1/sessions/{session_id}"))
            .body(Body::empty())
            .unwrap();
        let (status, _) = send(&app, delete).await;
        assert_eq!(status, StatusCode::NO_CONTENT);

        let (status, body) = send(&app, get(&format!("/api/v1/sessions/{session_id}"))).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"]["code"], "NOT_FOUND");
    }

    #[tokio::test]
    async fn test_rejects_bad_input() {
        let app = app();
        let (status, body) = send(
            &app,
            json_request(
                Method::POST,
                &format!("/api/v1/sessions/{}/answer", Uuid::new_v4()),
                json!({"answer": ""}),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["code"], "VALIDATION_ERROR");

        let (status, _) = send(
            &app,
            json_request(
                Method::POST,
                "/api/v1/interviews/start",
                json!({"user_id": Uuid::new_v4(), "resume_id": Uuid::new_v4(), "job_role": "Analyst"}),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}
