use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use clap::Parser;
use serde::Deserialize;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use spindle_core::domain::{ExecutorError, PoolError, TaskEnvelope};
use spindle_core::impls::{InProcessExecutorFactory, TaskHandler};
use spindle_core::{Pool, PoolConfig};

/// Drive a pool with synthetic sleep tasks and report what happened.
#[derive(Debug, Parser)]
#[command(name = "spindle", version)]
struct Args {
    /// JSON pool config; flags below override its fields
    #[arg(long, env = "SPINDLE_CONFIG")]
    config: Option<PathBuf>,

    #[arg(long)]
    min_workers: Option<usize>,

    #[arg(long)]
    max_workers: Option<usize>,

    /// 0 disables queueing
    #[arg(long)]
    max_backlog: Option<usize>,

    #[arg(long)]
    concurrency: Option<usize>,

    #[arg(long)]
    idle_timeout_ms: Option<u64>,

    /// How many tasks to submit
    #[arg(long, default_value_t = 20)]
    tasks: usize,

    /// How long each task sleeps
    #[arg(long, default_value_t = 200)]
    task_ms: u64,

    /// Every Nth task fails (0 = never)
    #[arg(long, default_value_t = 0)]
    fail_every: usize,
}

impl Args {
    fn pool_config(&self) -> Result<PoolConfig> {
        let mut cfg = match &self.config {
            Some(path) => {
                let raw = std::fs::read_to_string(path)
                    .with_context(|| format!("failed to read {}", path.display()))?;
                PoolConfig::from_json_str(&raw)?
            }
            None => PoolConfig::default(),
        };
        if let Some(n) = self.min_workers {
            cfg.min_workers = n;
        }
        if let Some(n) = self.max_workers {
            cfg.max_workers = n;
        }
        if let Some(n) = self.max_backlog {
            cfg.max_backlog = Some(n);
        }
        if let Some(n) = self.concurrency {
            cfg.concurrency_per_worker = n;
        }
        if let Some(ms) = self.idle_timeout_ms {
            cfg.idle_timeout_ms = ms;
        }
        Ok(cfg)
    }
}

#[derive(Debug, Deserialize)]
struct SleepPayload {
    n: usize,
    ms: u64,
}

struct SleepHandler {
    fail_every: usize,
}

#[async_trait]
impl TaskHandler for SleepHandler {
    async fn handle(&self, envelope: &TaskEnvelope) -> Result<serde_json::Value, ExecutorError> {
        let p: SleepPayload = serde_json::from_value(envelope.payload().clone())
            .map_err(|e| ExecutorError::Failed(format!("json decode: {e}")))?;

        tokio::time::sleep(Duration::from_millis(p.ms)).await;

        if self.fail_every > 0 && (p.n + 1) % self.fail_every == 0 {
            return Err(ExecutorError::Failed(format!("intentional failure (n={})", p.n)));
        }
        Ok(serde_json::json!({ "n": p.n, "slept_ms": p.ms }))
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "spindle=info,spindle_core=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();
    let config = args.pool_config()?;

    let handler = Arc::new(SleepHandler {
        fail_every: args.fail_every,
    });
    let pool = Pool::builder()
        .config(config)
        .build(Arc::new(InProcessExecutorFactory::new(handler)))
        .await
        .context("failed to build pool")?;

    // (A) submit everything up front; backpressure shows up here
    let mut handles = Vec::with_capacity(args.tasks);
    let mut rejected = 0usize;
    for n in 0..args.tasks {
        match pool
            .submit(serde_json::json!({ "n": n, "ms": args.task_ms }))
            .await
        {
            Ok(handle) => handles.push((n, handle)),
            Err(e) if e.is_backpressure() => {
                tracing::warn!(n, error = %e, "task rejected");
                rejected += 1;
            }
            Err(e) => return Err(e.into()),
        }
    }
    let status = pool.status().await;
    tracing::info!(
        admitted = handles.len(),
        rejected,
        workers = status.worker_count,
        backlog = status.backlog_size,
        "submission done"
    );

    // (B) wait for results, or tear down early on ctrl-c
    let results = async {
        let (mut ok, mut failed, mut terminated) = (0usize, 0usize, 0usize);
        for (n, handle) in handles {
            match handle.await {
                Ok(value) => {
                    tracing::info!(n, %value, "task succeeded");
                    ok += 1;
                }
                Err(PoolError::WorkerTerminated) => terminated += 1,
                Err(e) => {
                    tracing::warn!(n, error = %e, "task failed");
                    failed += 1;
                }
            }
        }
        (ok, failed, terminated)
    };
    tokio::pin!(results);

    let (ok, failed, terminated) = tokio::select! {
        counts = &mut results => counts,
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("interrupted, destroying pool");
            pool.destroy().await;
            results.await
        }
    };

    println!("{}", serde_json::to_string_pretty(&pool.status().await)?);
    pool.destroy().await;
    tracing::info!(ok, failed, terminated, rejected, "done");
    Ok(())
}
