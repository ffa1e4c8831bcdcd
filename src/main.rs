mod config;
mod core;
mod engine;
mod history;
mod intel;
mod llm;
mod proxy;
mod rules;
mod safety;
mod validator;

use anyhow::Result;
use crate::config::config::AppCfg;
use crate::core::types::{AuctionContext, FinalDecision};
use crate::engine::DecisionEngine;
use crate::history::memory::MemHistoryStore;
use crate::history::postgres::PgHistoryStore;
use crate::history::{AuctionResult, HistoryRecorder, HistoryStore, RoundResult};
use crate::intel::MarketIntel;
use crate::llm::{OpenAiReasoner, Reasoner};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncBufReadExt;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

/// Line protocol for the outer poller: one JSON request per line on stdin,
/// one JSON reply per line on stdout.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum Request {
    Decide {
        ctx: AuctionContext,
        #[serde(default)]
        timeout_ms: Option<u64>,
    },
    Outcome {
        ctx: AuctionContext,
        decision: FinalDecision,
        result: AuctionResult,
        final_price: Decimal,
    },
    Round {
        ctx: AuctionContext,
        decision: FinalDecision,
        result: RoundResult,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .json()
        .with_max_level(tracing::Level::INFO)
        .with_current_span(false)
        .init();
    dotenv::dotenv().ok();

    // Prometheus exporter
    let builder = metrics_exporter_prometheus::PrometheusBuilder::new();
    let handle = builder
        .install_recorder()
        .expect("failed to install Prometheus recorder");

    tokio::spawn(async move {
        let app = axum::Router::new().route(
            "/metrics",
            axum::routing::get(move || {
                let handle = handle.clone();
                async move { handle.render() }
            }),
        );
        let listener = tokio::net::TcpListener::bind("0.0.0.0:9000").await.unwrap();
        info!("Metrics endpoint listening on 0.0.0.0:9000/metrics");
        axum::serve(listener, app).await.unwrap();
    });

    metrics::counter!("bidmind_startups_total").increment(1);

    // Process-level metrics collector
    tokio::spawn(async move {
        use sysinfo::{Pid, System};
        let mut sys = System::new_all();
        let pid = Pid::from_u32(std::process::id());
        sys.refresh_process(pid);

        loop {
            tokio::time::sleep(Duration::from_secs(5)).await;
            sys.refresh_process(pid);

            if let Some(process) = sys.process(pid) {
                metrics::gauge!("process_cpu_usage_ratio").set(process.cpu_usage() as f64);
                metrics::gauge!("process_resident_memory_bytes").set(process.memory() as f64);
                metrics::gauge!("process_virtual_memory_bytes")
                    .set(process.virtual_memory() as f64);
            } else {
                error!("Failed to find own process ID for metrics collection");
            }
        }
    });

    let cfg = AppCfg::load("config.yml")?;

    info!("Loading intelligence tables from {}", cfg.intelligence.data_dir);
    let intel = Arc::new(MarketIntel::from_dir(
        Path::new(&cfg.intelligence.data_dir),
        cfg.intelligence.clone(),
    )?);

    // Reasoner credentials come from LLM__API_KEY or the provider-standard
    // variables. Missing credentials downgrade to rules-only, never fail.
    let mut llm_cfg = cfg.llm.clone();
    if llm_cfg.api_key.is_empty() {
        if let Ok(key) =
            std::env::var("OPENROUTER_API_KEY").or_else(|_| std::env::var("OPENAI_API_KEY"))
        {
            llm_cfg.api_key = key;
        }
    }
    let reasoner: Option<Arc<dyn Reasoner>> = if llm_cfg.api_key.is_empty() {
        warn!("No reasoner API key configured; running in rules-only mode");
        None
    } else {
        info!("Reasoner enabled with model {}", llm_cfg.model);
        Some(Arc::new(OpenAiReasoner::new(llm_cfg)))
    };

    let store: Arc<dyn HistoryStore> = match std::env::var("DATABASE_URL") {
        Ok(url) => {
            info!("Initializing history store (Postgres)");
            Arc::new(PgHistoryStore::new(&url).await?)
        }
        Err(_) => {
            warn!("DATABASE_URL not set; auction history will not survive restarts");
            Arc::new(MemHistoryStore::new())
        }
    };

    let engine = DecisionEngine::new(&cfg, intel, reasoner, store.clone());
    let recorder = HistoryRecorder::new(store);
    if engine.rules_only() {
        info!("Engine ready (rules-only)");
    } else {
        info!("Engine ready");
    }

    let shutdown = CancellationToken::new();
    let mut lines = tokio::io::BufReader::new(tokio::io::stdin()).lines();

    loop {
        tokio::select! {
            _ = shutdown.cancelled() => break,
            _ = tokio::signal::ctrl_c() => {
                info!("Ctrl-C received, shutting down");
                shutdown.cancel();
            }
            line = lines.next_line() => {
                match line {
                    Ok(Some(line)) => {
                        if line.trim().is_empty() {
                            continue;
                        }
                        handle_line(&line, &engine, &recorder).await;
                    }
                    Ok(None) => {
                        info!("stdin closed, shutting down");
                        break;
                    }
                    Err(e) => {
                        error!(error = %e, "Failed to read stdin");
                        break;
                    }
                }
            }
        }
    }

    info!("Supervisor exit");
    Ok(())
}

async fn handle_line(line: &str, engine: &DecisionEngine, recorder: &HistoryRecorder) {
    let request: Request = match serde_json::from_str(line) {
        Ok(r) => r,
        Err(e) => {
            error!(error = %e, "Unparseable request line");
            println!(
                "{}",
                serde_json::json!({"ok": false, "error": format!("bad request: {e}")})
            );
            return;
        }
    };

    match request {
        Request::Decide { ctx, timeout_ms } => {
            let deadline =
                timeout_ms.map(|ms| tokio::time::Instant::now() + Duration::from_millis(ms));
            let decision = engine.decide(ctx, deadline).await;
            match serde_json::to_string(&decision) {
                Ok(json) => println!("{json}"),
                Err(e) => error!(error = %e, "Failed to serialize decision"),
            }
        }
        Request::Outcome {
            ctx,
            decision,
            result,
            final_price,
        } => {
            // Best effort: the reply must not wait on the store.
            let recorder = recorder.clone();
            tokio::spawn(async move {
                if let Err(e) = recorder
                    .record_outcome(&ctx, &decision, result, final_price)
                    .await
                {
                    error!(error = %e, "Failed to record auction outcome");
                }
            });
            println!("{}", serde_json::json!({"ok": true, "type": "outcome"}));
        }
        Request::Round {
            ctx,
            decision,
            result,
        } => {
            let recorder = recorder.clone();
            tokio::spawn(async move {
                if let Err(e) = recorder.record_round(&ctx, &decision, result).await {
                    error!(error = %e, "Failed to record auction round");
                }
            });
            println!("{}", serde_json::json!({"ok": true, "type": "round"}));
        }
    }
}
