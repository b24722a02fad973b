// Query handler - SQL over HTTP
use super::models::{ErrorResponse, HealthResponse, QueryRequest, QueryResponse};
use crate::catalog::Catalog;
use crate::error::DbError;
use actix_web::http::StatusCode;
use actix_web::{get, post, web, HttpRequest, HttpResponse};
use log::{debug, warn};
use std::sync::Arc;
use std::time::Instant;

/// Header carrying the API key
pub const API_KEY_HEADER: &str = "X-API-Key";

/// Shared application state for the query handlers
pub struct AppState {
    pub catalog: Arc<Catalog>,
    /// When set, every query must carry a matching `X-API-Key`
    pub api_key: Option<String>,
    /// Database used when a request omits `db`
    pub default_database: Option<String>,
}

fn error_response(status: StatusCode, error: impl Into<String>) -> HttpResponse {
    HttpResponse::build(status).json(ErrorResponse::new(error))
}

fn db_error_response(err: &DbError) -> HttpResponse {
    let status =
        StatusCode::from_u16(err.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    HttpResponse::build(status).json(ErrorResponse::from(err))
}

fn authorized(req: &HttpRequest, state: &AppState) -> bool {
    let Some(expected) = state.api_key.as_deref() else {
        return true;
    };
    req.headers()
        .get(API_KEY_HEADER)
        .and_then(|v| v.to_str().ok())
        .map_or(false, |given| given == expected)
}

/// Handler for `POST /query`
///
/// ```json
/// {"sql": "SELECT COUNT(*) AS count FROM users", "db": "pesa"}
/// ```
#[post("/query")]
pub async fn query(req: HttpRequest, body: web::Bytes, state: web::Data<AppState>) -> HttpResponse {
    if !authorized(&req, &state) {
        warn!(
            "Rejected query from {}: invalid or missing API key",
            req.peer_addr()
                .map(|a| a.to_string())
                .unwrap_or_else(|| "unknown".into())
        );
        return error_response(
            StatusCode::UNAUTHORIZED,
            "Unauthorized: invalid or missing API key",
        );
    }

    let request: QueryRequest = match serde_json::from_slice(&body) {
        Ok(request) => request,
        Err(e) => {
            let err = DbError::Syntax(format!("Invalid request body: {}", e));
            return db_error_response(&err);
        }
    };

    let sql = request.sql.trim().to_string();
    if sql.is_empty() {
        return db_error_response(&DbError::Syntax("SQL query cannot be empty".into()));
    }

    let Some(db) = request.db.or_else(|| state.default_database.clone()) else {
        return db_error_response(&DbError::InvalidQuery("Missing database name 'db'".into()));
    };

    debug!("Query on '{}': {}", db, sql);
    let start_time = Instant::now();
    let catalog = Arc::clone(&state.catalog);
    let outcome = web::block(move || catalog.execute(&db, &sql)).await;

    match outcome {
        Ok(Ok(result)) => {
            debug!(
                "Query finished in {:?} ({} rows)",
                start_time.elapsed(),
                result.row_count()
            );
            HttpResponse::Ok().json(QueryResponse::from(result))
        }
        Ok(Err(e)) => {
            debug!("Query failed: {}", e);
            db_error_response(&e)
        }
        Err(e) => error_response(
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("InternalError: {}", e),
        ),
    }
}

/// Handler for `GET /health`
#[get("/health")]
pub async fn health() -> HttpResponse {
    HttpResponse::Ok().json(HealthResponse {
        status: "ok".to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use crate::server::models::{AffectedResponse, RowsResponse};
    use actix_web::{test, App};
    use serde_json::json;

    fn state(api_key: Option<&str>) -> web::Data<AppState> {
        web::Data::new(AppState {
            catalog: Arc::new(Catalog::new(EngineConfig::in_memory())),
            api_key: api_key.map(str::to_string),
            default_database: None,
        })
    }

    macro_rules! app {
        ($state:expr) => {
            test::init_service(App::new().app_data($state.clone()).service(query).service(health))
                .await
        };
    }

    #[actix_web::test]
    async fn test_users_scenario() {
        let state = state(None);
        let app = app!(state);

        for sql in [
            "CREATE TABLE users (id STRING PRIMARY KEY, pin_hash STRING)",
            "INSERT INTO users (id, pin_hash) VALUES ('u1','abc')",
        ] {
            let req = test::TestRequest::post()
                .uri("/query")
                .set_json(json!({"sql": sql, "db": "pesa"}))
                .to_request();
            let resp: AffectedResponse = test::call_and_read_body_json(&app, req).await;
            assert!(resp.success);
        }

        let req = test::TestRequest::post()
            .uri("/query")
            .set_json(json!({"sql": "SELECT COUNT(*) as count FROM users", "db": "pesa"}))
            .to_request();
        let resp: RowsResponse = test::call_and_read_body_json(&app, req).await;
        assert!(resp.success);
        assert_eq!(json!(resp.data), json!([{"count": 1}]));
    }

    #[actix_web::test]
    async fn test_error_status_mapping() {
        let state = state(None);
        let app = app!(state);

        let req = test::TestRequest::post()
            .uri("/query")
            .set_json(json!({"sql": "SELECT COUNT(*) FROM categories", "db": "pesa"}))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
        let body: ErrorResponse = test::read_body_json(resp).await;
        assert!(!body.success);
        assert_eq!(body.error, "TableNotFoundError: Table 'categories' does not exist");

        let req = test::TestRequest::post()
            .uri("/query")
            .set_json(json!({"sql": "SELECT COUNT( FROM t", "db": "pesa"}))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let body: ErrorResponse = test::read_body_json(resp).await;
        assert!(body.error.starts_with("SyntaxError: Expected"));

        let req = test::TestRequest::post()
            .uri("/query")
            .set_json(json!({"sql": "   ", "db": "pesa"}))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[actix_web::test]
    async fn test_api_key_required() {
        let state = state(Some("secret"));
        let app = app!(state);

        let req = test::TestRequest::post()
            .uri("/query")
            .set_json(json!({"sql": "SHOW TABLES", "db": "pesa"}))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

        let req = test::TestRequest::post()
            .uri("/query")
            .insert_header((API_KEY_HEADER, "secret"))
            .set_json(json!({"sql": "SHOW TABLES", "db": "pesa"}))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);
    }

    #[actix_web::test]
    async fn test_invalid_body_and_health() {
        let state = state(None);
        let app = app!(state);

        let req = test::TestRequest::post()
            .uri("/query")
            .insert_header(("content-type", "application/json"))
            .set_payload("{not json")
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

        let req = test::TestRequest::get().uri("/health").to_request();
        let body: HealthResponse = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body.status, "ok");
    }
}
