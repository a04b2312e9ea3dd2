#[cfg(feature = "server")]
pub mod http {
    use axum::{
        extract::State,
        http::StatusCode,
        response::{IntoResponse, Json},
        routing::{get, post},
        Router,
    };
    use mast::{
        parse, Backend, Bindings, CompileOptions, DecimalField, EvictionPolicy, Expression,
        ExpressionCache, MastError, RealField,
    };
    use rust_decimal::prelude::FromPrimitive;
    use rust_decimal::Decimal;
    use serde::{Deserialize, Serialize};
    use std::collections::HashMap;
    use std::net::SocketAddr;
    use std::num::NonZeroUsize;
    use std::str::FromStr;
    use std::sync::Arc;
    use tower_http::cors::CorsLayer;
    use tracing::{error, info};

    /// Compiled expressions shared by all requests, one cache per algebra
    pub struct Caches {
        real: ExpressionCache<f64, RealField>,
        decimal: ExpressionCache<Decimal, DecimalField>,
    }

    impl Caches {
        pub fn new(capacity: usize) -> Self {
            let policy = match NonZeroUsize::new(capacity) {
                Some(capacity) => EvictionPolicy::Lru(capacity),
                None => EvictionPolicy::Disabled,
            };
            Self {
                real: ExpressionCache::new(Arc::new(RealField::new()), policy),
                decimal: ExpressionCache::new(Arc::new(DecimalField::new()), policy),
            }
        }
    }

    type SharedCaches = Arc<Caches>;

    #[derive(Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq)]
    #[serde(rename_all = "lowercase")]
    enum AlgebraKind {
        #[default]
        Real,
        Decimal,
    }

    #[derive(Debug, Deserialize)]
    struct EvaluateRequest {
        expression: String,
        #[serde(default)]
        bindings: HashMap<String, serde_json::Value>,
        #[serde(default = "default_backend")]
        backend: Backend,
        #[serde(default)]
        algebra: AlgebraKind,
    }

    fn default_backend() -> Backend {
        Backend::Vm
    }

    #[derive(Debug, Serialize)]
    struct EvaluateResponse {
        value: serde_json::Value,
        backend: Backend,
        algebra: AlgebraKind,
    }

    #[derive(Debug, Serialize)]
    struct ErrorResponse {
        error: String,
    }

    type ApiError = (StatusCode, Json<ErrorResponse>);

    fn bad_request(message: String) -> ApiError {
        (StatusCode::BAD_REQUEST, Json(ErrorResponse { error: message }))
    }

    pub fn router(caches: SharedCaches) -> Router {
        Router::new()
            .route("/health", get(health_check))
            .route("/evaluate", post(evaluate_post))
            .layer(CorsLayer::permissive())
            .with_state(caches)
    }

    pub async fn start_server(host: &str, port: u16, cache_size: usize) -> anyhow::Result<()> {
        let app = router(Arc::new(Caches::new(cache_size)));

        let addr: SocketAddr = format!("{}:{}", host, port).parse()?;
        info!("mast server listening on {}", addr);

        let listener = tokio::net::TcpListener::bind(addr).await?;
        axum::serve(listener, app).await?;

        Ok(())
    }

    async fn health_check() -> impl IntoResponse {
        Json(serde_json::json!({
            "status": "ok",
            "service": "mast",
            "version": env!("CARGO_PKG_VERSION")
        }))
    }

    async fn evaluate_post(
        State(caches): State<SharedCaches>,
        Json(payload): Json<EvaluateRequest>,
    ) -> Result<impl IntoResponse, ApiError> {
        if payload.expression.trim().is_empty() {
            return Err(bad_request("Expression cannot be empty".to_string()));
        }

        let tree = parse(&payload.expression, &CompileOptions::default()).map_err(|e| {
            error!("Failed to parse expression: {}", e);
            bad_request(format!("Failed to parse expression: {}", e))
        })?;

        let value = match payload.algebra {
            AlgebraKind::Real => {
                let bindings = convert_bindings(&payload.bindings, real_value)?;
                let value = caches
                    .real
                    .get_or_compile(&tree, payload.backend)
                    .and_then(|expression| expression.invoke(&bindings))
                    .map_err(evaluation_failed)?;
                serde_json::json!(value)
            }
            AlgebraKind::Decimal => {
                let bindings = convert_bindings(&payload.bindings, decimal_value)?;
                let value = caches
                    .decimal
                    .get_or_compile(&tree, payload.backend)
                    .and_then(|expression| expression.invoke(&bindings))
                    .map_err(evaluation_failed)?;
                serde_json::Value::String(value.to_string())
            }
        };

        info!(
            "Evaluated '{}' on {} backend",
            payload.expression, payload.backend
        );

        Ok(Json(EvaluateResponse {
            value,
            backend: payload.backend,
            algebra: payload.algebra,
        }))
    }

    fn evaluation_failed(e: MastError) -> ApiError {
        error!("Evaluation failed: {}", e);
        bad_request(format!("Evaluation failed: {}", e))
    }

    fn convert_bindings<T>(
        values: &HashMap<String, serde_json::Value>,
        convert: fn(&serde_json::Value) -> Option<T>,
    ) -> Result<Bindings<T>, ApiError> {
        let mut bindings = Bindings::new();
        for (name, value) in values {
            let converted = convert(value)
                .ok_or_else(|| bad_request(format!("Invalid value for '{}': {}", name, value)))?;
            bindings.insert(name.as_str(), converted);
        }
        Ok(bindings)
    }

    fn real_value(value: &serde_json::Value) -> Option<f64> {
        match value {
            serde_json::Value::Number(n) => n.as_f64(),
            serde_json::Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    /// Strings keep their exact digits; JSON numbers go through f64
    fn decimal_value(value: &serde_json::Value) -> Option<Decimal> {
        match value {
            serde_json::Value::String(s) => Decimal::from_str(s.trim()).ok(),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(i) => Some(Decimal::from(i)),
                None => n.as_f64().and_then(Decimal::from_f64),
            },
            _ => None,
        }
    }

}

#[cfg(not(feature = "server"))]
pub mod http {
    pub async fn start_server(_host: &str, _port: u16, _cache_size: usize) -> anyhow::Result<()> {
        anyhow::bail!("Server feature not enabled. Recompile with --features server")
    }
}
