use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use finmodel_core::domain::generation::{GenerationRequest, GenerationResponse};
use finmodel_core::service::FinancialModelService;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const DEFAULT_PORT: u16 = 8000;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let settings = finmodel_core::config::Settings::from_env()?;
    let _sentry_guard = init_sentry(&settings);

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer())
        .with(sentry_tracing::layer())
        .init();

    let service = match FinancialModelService::from_settings(&settings) {
        Ok(service) => Ok(service),
        Err(e) => {
            sentry_anyhow::capture_anyhow(&e);
            tracing::error!(error = %e, "LLM client not configured; starting API in degraded mode");
            Err(e.to_string())
        }
    };

    let app = app(AppState { service });

    let port: u16 = std::env::var("PORT")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(DEFAULT_PORT);
    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], port));

    tracing::info!(%addr, "api listening");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

fn app(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/generate", post(generate))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

async fn healthz() -> &'static str {
    "ok"
}

/// `Err` carries the startup configuration diagnostic.
#[derive(Clone)]
struct AppState {
    service: Result<FinancialModelService, String>,
}

#[derive(Debug)]
struct ApiError {
    status: StatusCode,
    detail: String,
}

impl ApiError {
    fn internal(detail: impl Into<String>) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            detail: detail.into(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (
            self.status,
            Json(serde_json::json!({ "detail": self.detail })),
        )
            .into_response()
    }
}

async fn generate(
    State(state): State<AppState>,
    Json(req): Json<GenerationRequest>,
) -> Result<Json<GenerationResponse>, ApiError> {
    let service = state.service.as_ref().map_err(ApiError::internal)?;

    if req.company_name.trim().is_empty() {
        return Err(ApiError {
            status: StatusCode::UNPROCESSABLE_ENTITY,
            detail: "company_name must not be empty".to_string(),
        });
    }

    let res = service.generate(&req).await.map_err(|e| {
        sentry_anyhow::capture_anyhow(&e);
        tracing::error!(company_name = %req.company_name, error = %e, "financial model generation failed");
        ApiError::internal(format!("{e:#}"))
    })?;

    Ok(Json(res))
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
}

fn init_sentry(settings: &finmodel_core::config::Settings) -> Option<sentry::ClientInitGuard> {
    let dsn = settings.sentry_dsn.as_deref()?;
    Some(sentry::init((
        dsn,
        sentry::ClientOptions {
            release: sentry::release_name!(),
            ..Default::default()
        },
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use finmodel_core::config::Settings;
    use finmodel_core::llm::{Completion, LlmClient, Provider};
    use finmodel_core::prompt::Prompt;
    use serde_json::{json, Value};
    use std::sync::Arc;

    const MODEL_REPLY: &str = "Example Corp's program breaks even in year two.\n\n\
[JSON_START]\n\
{\"financial_model\": {\
\"summary\": \"Revised technology costs\",\
\"total_investment\": 850000.0,\
\"costs\": [{\"category\": \"Technology\", \"year_1\": 350000.0, \"year_2\": 80000.0, \"year_3\": 80000.0,\
\"description\": \"Platform licence\", \"assumptions\": [\"SaaS pricing\"]}],\
\"revenue_uplift\": [],\
\"roi_metrics\": {\"payback_period\": \"20 months\", \"net_present_value\": 1200000.0, \"irr\": 22.0,\
\"benefit_cost_ratio\": 2.1, \"key_assumptions\": []},\
\"sensitivity_analysis\": [],\
\"risk_factors\": [\"Low enrollment\"]}}\n\
[JSON_END]";

    struct CannedLlm(&'static str);

    #[async_trait::async_trait]
    impl LlmClient for CannedLlm {
        fn provider(&self) -> Provider {
            Provider::OpenAI
        }

        async fn complete(&self, prompt: &Prompt) -> anyhow::Result<Completion> {
            anyhow::ensure!(prompt.user.contains("Example Corp"), "company missing from prompt");
            Ok(Completion {
                text: self.0.to_string(),
                finish_reason: Some("stop".to_string()),
            })
        }
    }

    struct DownLlm;

    #[async_trait::async_trait]
    impl LlmClient for DownLlm {
        fn provider(&self) -> Provider {
            Provider::OpenAI
        }

        async fn complete(&self, _prompt: &Prompt) -> anyhow::Result<Completion> {
            anyhow::bail!("OpenAI request failed: connection refused")
        }
    }

    async fn spawn(state: AppState) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app(state)).await.unwrap();
        });
        format!("http://{addr}")
    }

    fn ready(llm: impl LlmClient + 'static) -> AppState {
        AppState {
            service: Ok(FinancialModelService::new(Arc::new(llm))),
        }
    }

    fn example_request() -> Value {
        json!({
            "company_name": "Example Corp",
            "previous_data": {
                "loyalty_program_design": "Tiered points program with partner rewards"
            },
            "current_prompt_data": {
                "existing_generated_output": "Previous financial model output",
                "user_feedback": "Adjust technology cost assumptions"
            },
            "other_input_data": {}
        })
    }

    #[tokio::test]
    async fn generate_returns_narrative_and_structured_model() {
        let base = spawn(ready(CannedLlm(MODEL_REPLY))).await;

        let res = reqwest::Client::new()
            .post(format!("{base}/generate"))
            .json(&example_request())
            .send()
            .await
            .unwrap();
        assert_eq!(res.status(), reqwest::StatusCode::OK);

        let body: GenerationResponse = res.json().await.unwrap();
        assert_eq!(
            body.generated_output,
            "Example Corp's program breaks even in year two."
        );
        let model = body.structured_data.financial_model;
        assert!(!model.costs.is_empty());
        assert_eq!(model.costs[0].category, "Technology");
        assert_eq!(model.total_investment, 850_000.0);
        assert_eq!(model.roi_metrics.payback_period, "20 months");
    }

    #[tokio::test]
    async fn unparseable_reply_still_succeeds_with_defaults() {
        let base = spawn(ready(CannedLlm("Only prose this time."))).await;

        let res = reqwest::Client::new()
            .post(format!("{base}/generate"))
            .json(&json!({"company_name": "Example Corp"}))
            .send()
            .await
            .unwrap();
        assert_eq!(res.status(), reqwest::StatusCode::OK);

        let body: Value = res.json().await.unwrap();
        assert_eq!(body["generated_output"], "Only prose this time.");
        assert_eq!(body["structured_data"]["financial_model"]["costs"], json!([]));
        assert_eq!(body["structured_data"]["financial_model"]["total_investment"], 0.0);
    }

    #[tokio::test]
    async fn upstream_failure_is_a_500_with_detail() {
        let base = spawn(ready(DownLlm)).await;

        let res = reqwest::Client::new()
            .post(format!("{base}/generate"))
            .json(&example_request())
            .send()
            .await
            .unwrap();
        assert_eq!(res.status(), reqwest::StatusCode::INTERNAL_SERVER_ERROR);

        let body: Value = res.json().await.unwrap();
        assert!(body["detail"]
            .as_str()
            .unwrap()
            .contains("connection refused"));
    }

    #[tokio::test]
    async fn missing_api_key_fails_every_request() {
        let err = FinancialModelService::from_settings(&Settings::default())
            .err()
            .unwrap();
        let base = spawn(AppState {
            service: Err(err.to_string()),
        })
        .await;

        let res = reqwest::Client::new()
            .post(format!("{base}/generate"))
            .json(&example_request())
            .send()
            .await
            .unwrap();
        assert_eq!(res.status(), reqwest::StatusCode::INTERNAL_SERVER_ERROR);

        let body: Value = res.json().await.unwrap();
        assert!(body["detail"].as_str().unwrap().contains("OPENAI_API_KEY"));
    }

    #[tokio::test]
    async fn missing_company_name_is_rejected() {
        let base = spawn(ready(CannedLlm(MODEL_REPLY))).await;
        let client = reqwest::Client::new();

        let res = client
            .post(format!("{base}/generate"))
            .json(&json!({"previous_data": {}}))
            .send()
            .await
            .unwrap();
        assert!(res.status().is_client_error());

        let res = client
            .post(format!("{base}/generate"))
            .json(&json!({"company_name": "  "}))
            .send()
            .await
            .unwrap();
        assert_eq!(res.status(), reqwest::StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[tokio::test]
    async fn healthz_is_ok() {
        let base = spawn(AppState {
            service: Err("not configured".to_string()),
        })
        .await;
        let body = reqwest::get(format!("{base}/healthz"))
            .await
            .unwrap()
            .text()
            .await
            .unwrap();
        assert_eq!(body, "ok");
    }
}
