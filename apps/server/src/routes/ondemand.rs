use actix_web::{HttpResponse, post, web};
use probe::{ExecutionMode, Executor, Monitor};
use serde::Deserialize;
use tracing::info;

use crate::error::AppError;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecQuery {
    /// Caller supplied result id, generated when absent
    result_id: Option<String>,
}

/// Execute a monitor definition once and return the full result.
///
/// Network failures are part of the result (`err` set, no `code`), so only a
/// malformed monitor is answered with an error status.
#[post("/ondemand/exec")]
pub async fn exec_route(
    executor: web::Data<Executor>,
    query: web::Query<ExecQuery>,
    monitor: web::Json<Monitor>,
) -> Result<HttpResponse, AppError> {
    let mode = ExecutionMode::OnDemand;
    let result_id = query.into_inner().result_id.unwrap_or_else(|| mode.generate_result_id());

    let result = executor.execute_with_id(&monitor, mode, result_id).await?;
    info!(result_id = %result.id, code = ?result.code, err = %result.err, "On-demand execution finished");

    Ok(HttpResponse::Ok().json(result))
}

#[cfg(test)]
mod tests {
    use actix_web::http::StatusCode;
    use actix_web::{App, test};
    use probe::MonitorResult;
    use serde_json::json;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    use super::*;

    fn executor() -> web::Data<Executor> {
        web::Data::new(Executor::system(Default::default()).unwrap())
    }

    async fn serve_once(response: &'static str) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            if let Ok((mut socket, _)) = listener.accept().await {
                let mut buf = [0u8; 4096];
                let _ = socket.read(&mut buf).await;
                let _ = socket.write_all(response.as_bytes()).await;
                let _ = socket.shutdown().await;
            }
        });
        format!("http://{addr}/")
    }

    #[actix_web::test]
    async fn test_health() {
        let app =
            test::init_service(App::new().app_data(executor()).configure(crate::routes::routes)).await;
        let resp = test::call_service(&app, test::TestRequest::get().uri("/health").to_request()).await;
        assert_eq!(resp.status(), StatusCode::OK);
    }

    #[actix_web::test]
    async fn test_exec_returns_result() {
        let app =
            test::init_service(App::new().app_data(executor()).configure(crate::routes::routes)).await;
        let url = serve_once("HTTP/1.1 204 No Content\r\nconnection: close\r\n\r\n").await;

        let req = test::TestRequest::post()
            .uri("/ondemand/exec?resultId=ondemand-fixed")
            .set_json(json!({ "name": "probe", "url": url }))
            .to_request();
        let result: MonitorResult = test::call_and_read_body_json(&app, req).await;

        assert_eq!(result.id, "ondemand-fixed");
        assert_eq!(result.code, Some(204));
        assert!(result.err.is_empty());
    }

    #[actix_web::test]
    async fn test_exec_unreachable_is_still_ok() {
        let app =
            test::init_service(App::new().app_data(executor()).configure(crate::routes::routes)).await;
        let port = TcpListener::bind("127.0.0.1:0").await.unwrap().local_addr().unwrap().port();

        let req = test::TestRequest::post()
            .uri("/ondemand/exec")
            .set_json(json!({ "name": "probe", "url": format!("http://127.0.0.1:{port}/") }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);

        let result: MonitorResult = test::read_body_json(resp).await;
        assert!(result.id.starts_with("ondemand-"));
        assert_eq!(result.code, None);
        assert!(!result.err.is_empty());
    }

    #[actix_web::test]
    async fn test_exec_rejects_invalid_monitor() {
        let app =
            test::init_service(App::new().app_data(executor()).configure(crate::routes::routes)).await;
        let req = test::TestRequest::post()
            .uri("/ondemand/exec")
            .set_json(json!({ "name": "probe", "url": "ftp://example.com/" }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }
}
