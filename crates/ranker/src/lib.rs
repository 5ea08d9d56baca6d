//! Ollama-backed implementation of the ranking tier.
//!
//! Everything here is best-effort by contract: the probe is advisory, the
//! ranking call runs under a hard timeout that cancels the in-flight request,
//! and warmup is fire-and-forget. No retries anywhere; a failed attempt means
//! the orchestrator's deterministic fallback takes over.

mod parse;
mod prompt;

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, info, warn};

use verdant_core::config::OllamaConfig;
use verdant_core::domain::product::{CatalogProduct, ProductId};
use verdant_core::errors::RankerError;
use verdant_core::ranker::{RankContext, Ranker};

/// Low temperature biases the model toward deterministic, parseable output.
const TEMPERATURE: f64 = 0.1;
/// An id list is short; a tight output cap keeps latency down and rambling out.
const NUM_PREDICT: u32 = 128;
/// Tiny request used only to pull the model into memory.
const WARMUP_PROMPT: &str = "Reply with OK.";

#[derive(Clone)]
pub struct OllamaRanker {
    client: Client,
    base_url: String,
    model: String,
    probe_timeout: Duration,
    request_timeout: Duration,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    response: String,
}

impl OllamaRanker {
    pub fn new(config: &OllamaConfig) -> Self {
        Self {
            client: Client::new(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            probe_timeout: Duration::from_secs(config.probe_timeout_secs),
            request_timeout: Duration::from_secs(config.request_timeout_secs),
        }
    }

    fn generate_url(&self) -> String {
        format!("{}/api/generate", self.base_url)
    }

    async fn generate(&self, prompt: String) -> Result<String, RankerError> {
        let body = json!({
            "model": self.model,
            "prompt": prompt,
            "stream": false,
            "options": { "temperature": TEMPERATURE, "num_predict": NUM_PREDICT },
        });

        let response = self
            .client
            .post(self.generate_url())
            .timeout(self.request_timeout)
            .json(&body)
            .send()
            .await
            .map_err(|error| {
                if error.is_timeout() {
                    RankerError::Timeout
                } else {
                    RankerError::Unavailable(error.to_string())
                }
            })?;

        if !response.status().is_success() {
            return Err(RankerError::Unavailable(format!(
                "generate endpoint returned {}",
                response.status()
            )));
        }

        let payload: GenerateResponse = response.json().await.map_err(|error| {
            if error.is_timeout() {
                RankerError::Timeout
            } else {
                RankerError::MalformedResponse(error.to_string())
            }
        })?;

        Ok(payload.response)
    }
}

#[async_trait]
impl Ranker for OllamaRanker {
    async fn is_available(&self) -> bool {
        match self
            .client
            .get(&self.base_url)
            .timeout(self.probe_timeout)
            .send()
            .await
        {
            Ok(response) => response.status().is_success(),
            Err(error) => {
                debug!(
                    event_name = "ranker.probe_failed",
                    endpoint = %self.base_url,
                    error = %error,
                    "ollama liveness probe failed"
                );
                false
            }
        }
    }

    async fn rank(
        &self,
        context: &RankContext,
        candidates: &[CatalogProduct],
        limit: usize,
    ) -> Result<Vec<ProductId>, RankerError> {
        // With fewer candidates than slots there is nothing to select; skip
        // the call entirely.
        if candidates.len() < limit {
            return Err(RankerError::TooFewCandidates { have: candidates.len(), need: limit });
        }

        let prompt = prompt::build(context, candidates, limit);
        let text = self.generate(prompt).await?;
        let ids = parse::extract_ids(&text, candidates, limit);

        // One lucky integer in an otherwise useless reply is not trusted to
        // stand in for the deterministic fallback.
        let required = limit.min(2);
        if ids.len() < required {
            return Err(RankerError::InsufficientConfidence { parsed: ids.len(), required });
        }

        debug!(
            event_name = "ranker.rank_succeeded",
            parsed = ids.len(),
            limit,
            "model ranking accepted"
        );
        Ok(ids)
    }

    async fn warmup(&self) {
        let ranker = self.clone();
        // Detached on purpose: model loading may take minutes and nobody
        // should wait on it. No timeout for the same reason.
        tokio::spawn(async move {
            let body = json!({
                "model": ranker.model,
                "prompt": WARMUP_PROMPT,
                "stream": false,
                "options": { "temperature": TEMPERATURE, "num_predict": 1 },
            });

            match ranker.client.post(ranker.generate_url()).json(&body).send().await {
                Ok(response) if response.status().is_success() => {
                    info!(
                        event_name = "ranker.warmup_complete",
                        model = %ranker.model,
                        "model warmup finished"
                    );
                }
                Ok(response) => {
                    warn!(
                        event_name = "ranker.warmup_rejected",
                        status = %response.status(),
                        "model warmup request was rejected"
                    );
                }
                Err(error) => {
                    warn!(
                        event_name = "ranker.warmup_failed",
                        error = %error,
                        "model warmup request failed"
                    );
                }
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use std::time::Instant;

    use chrono::Utc;
    use rust_decimal::Decimal;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;
    use uuid::Uuid;

    use verdant_core::domain::order::{Order, OrderId, OrderLine};
    use verdant_core::domain::product::Product;

    use super::*;

    fn config(base_url: &str) -> OllamaConfig {
        OllamaConfig {
            enabled: true,
            base_url: base_url.to_string(),
            model: "llama3.2".to_string(),
            probe_timeout_secs: 1,
            request_timeout_secs: 2,
        }
    }

    fn entry(id: i64) -> CatalogProduct {
        CatalogProduct {
            product: Product {
                id: ProductId(id),
                name: format!("Product {id}"),
                description: Some("demo".to_string()),
                price: Decimal::new(999, 2),
                categories: vec!["botanical".to_string()],
                sustainability_score: 80,
                carbon_footprint_kg: 0.3,
            },
            order_count: 0,
        }
    }

    fn order_context() -> RankContext {
        RankContext::Order(Order {
            id: OrderId(1),
            user_id: Uuid::nil(),
            created_at: Utc::now(),
            lines: vec![OrderLine {
                product_id: ProductId(99),
                quantity: 1,
                name: "Starlight Soap".to_string(),
                unit_price: Decimal::new(725, 2),
                category: "bath".to_string(),
                sustainability_score: 95,
            }],
        })
    }

    /// Minimal one-shot HTTP stub; good enough for a single reqwest exchange.
    async fn spawn_stub(status_line: &'static str, body: String) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind stub listener");
        let addr = listener.local_addr().expect("stub address");

        tokio::spawn(async move {
            while let Ok((mut stream, _)) = listener.accept().await {
                let body = body.clone();
                tokio::spawn(async move {
                    let mut buffer = [0u8; 8192];
                    let _ = stream.read(&mut buffer).await;
                    let response = format!(
                        "HTTP/1.1 {status_line}\r\ncontent-type: application/json\r\n\
                         content-length: {}\r\nconnection: close\r\n\r\n{}",
                        body.len(),
                        body
                    );
                    let _ = stream.write_all(response.as_bytes()).await;
                    let _ = stream.shutdown().await;
                });
            }
        });

        format!("http://{addr}")
    }

    /// Accepts connections and never answers, to exercise timeouts.
    async fn spawn_stalled_stub() -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind stub listener");
        let addr = listener.local_addr().expect("stub address");

        tokio::spawn(async move {
            let mut held = Vec::new();
            while let Ok((stream, _)) = listener.accept().await {
                held.push(stream);
            }
        });

        format!("http://{addr}")
    }

    #[tokio::test]
    async fn too_few_candidates_short_circuits_without_a_call() {
        // Port 1 is closed; reaching the network would surface Unavailable.
        let ranker = OllamaRanker::new(&config("http://127.0.0.1:1"));

        let result = ranker.rank(&order_context(), &[entry(1), entry(2)], 4).await;
        assert_eq!(
            result,
            Err(RankerError::TooFewCandidates { have: 2, need: 4 })
        );
    }

    #[tokio::test]
    async fn probe_is_false_for_refused_connections() {
        let ranker = OllamaRanker::new(&config("http://127.0.0.1:1"));
        assert!(!ranker.is_available().await);
    }

    #[tokio::test]
    async fn probe_times_out_against_a_stalled_endpoint() {
        let base_url = spawn_stalled_stub().await;
        let ranker = OllamaRanker::new(&config(&base_url));

        let started = Instant::now();
        assert!(!ranker.is_available().await);
        // Bounded by the configured probe timeout, not the stall.
        assert!(started.elapsed() < Duration::from_secs(3));
    }

    #[tokio::test]
    async fn rank_times_out_against_a_stalled_endpoint() {
        let base_url = spawn_stalled_stub().await;
        let ranker = OllamaRanker::new(&config(&base_url));
        let pool: Vec<CatalogProduct> = (1..=4).map(entry).collect();

        let started = Instant::now();
        let result = ranker.rank(&order_context(), &pool, 2).await;
        assert_eq!(result, Err(RankerError::Timeout));
        assert!(started.elapsed() < Duration::from_secs(4));
    }

    #[tokio::test]
    async fn rank_parses_a_successful_generation() {
        let body =
            serde_json::json!({ "response": "Recommended product IDs: 3, 1" }).to_string();
        let base_url = spawn_stub("200 OK", body).await;
        let ranker = OllamaRanker::new(&config(&base_url));
        let pool: Vec<CatalogProduct> = (1..=4).map(entry).collect();

        let ids = ranker.rank(&order_context(), &pool, 2).await.expect("rank should succeed");
        assert_eq!(ids, vec![ProductId(3), ProductId(1)]);
    }

    #[tokio::test]
    async fn hallucinated_heavy_reply_is_low_confidence() {
        let body =
            serde_json::json!({ "response": "Recommended product IDs: 777, 888" }).to_string();
        let base_url = spawn_stub("200 OK", body).await;
        let ranker = OllamaRanker::new(&config(&base_url));
        let pool: Vec<CatalogProduct> = (1..=4).map(entry).collect();

        let result = ranker.rank(&order_context(), &pool, 4).await;
        assert_eq!(
            result,
            Err(RankerError::InsufficientConfidence { parsed: 0, required: 2 })
        );
    }

    #[tokio::test]
    async fn non_json_reply_is_malformed() {
        let base_url = spawn_stub("200 OK", "<html>not json</html>".to_string()).await;
        let ranker = OllamaRanker::new(&config(&base_url));
        let pool: Vec<CatalogProduct> = (1..=4).map(entry).collect();

        let result = ranker.rank(&order_context(), &pool, 2).await;
        assert!(matches!(result, Err(RankerError::MalformedResponse(_))));
    }

    #[tokio::test]
    async fn server_error_reply_is_unavailable() {
        let base_url = spawn_stub("500 Internal Server Error", "{}".to_string()).await;
        let ranker = OllamaRanker::new(&config(&base_url));
        let pool: Vec<CatalogProduct> = (1..=4).map(entry).collect();

        let result = ranker.rank(&order_context(), &pool, 2).await;
        assert!(matches!(result, Err(RankerError::Unavailable(_))));
    }

    #[tokio::test]
    async fn warmup_returns_immediately_and_swallows_failures() {
        let ranker = OllamaRanker::new(&config("http://127.0.0.1:1"));

        let started = Instant::now();
        ranker.warmup().await;
        assert!(started.elapsed() < Duration::from_millis(500));
    }
}
