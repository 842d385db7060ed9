// SPDX-License-Identifier: Apache-2.0
//! `cat-gated`: manager bootstrap for the progressive image-pull admission
//! controller.
//!
//! Three concurrent tasks, matching `jitosd`'s daemon + HTTP-API layout and
//! `echo-session-ws-gateway`'s TLS-serving pattern:
//! - the reconciler, driven by `kube::runtime::Controller` over a filtered
//!   trigger stream (C5/C8),
//! - the mutating admission webhook, served over TLS by `axum_server` (C3),
//! - the removal-history compactor, a plain `tokio::time::interval` loop
//!   (C7).
//!
//! `SIGTERM`/`SIGINT` stop all three via a shared `CancellationToken` and
//! `axum_server::Handle::shutdown`.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context as _, Result};
use axum::{routing::post, Router};
use axum_server::{tls_rustls::RustlsConfig, Handle};
use cat_gate_controller::config::{CapacityConfig, ReconcilerConfig};
use cat_gate_controller::{error_policy, reconcile, trigger_stream, Context};
use cat_gate_history::{Compactor, RemovalHistory};
use cat_gate_index::{Index, PodKey};
use clap::Parser;
use futures::StreamExt;
use k8s_openapi::api::core::v1::{Node, Pod};
use kube::runtime::reflector::{self, reflector};
use kube::runtime::{watcher, Controller, WatchStreamExt};
use kube::{Api, Client};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// CLI/env tunables (§6). Every field is also readable from its
/// `SCREAMING_SNAKE_CASE` environment variable via `clap`'s `env` feature.
#[derive(Parser, Debug)]
#[command(author, version, about = "cat-gate progressive image-pull admission controller")]
struct Args {
    /// Multiplier applied to warm-node count to compute capacity.
    #[arg(long, env = "CAT_GATE_SCALE_RATE", default_value_t = 2)]
    scale_rate: u32,
    /// Floor on capacity so the first instance always releases.
    #[arg(long, env = "CAT_GATE_MINIMUM_CAPACITY", default_value_t = 1)]
    minimum_capacity: u32,
    /// Requeue delay, in milliseconds, when capacity is exhausted.
    #[arg(long, env = "CAT_GATE_REQUEUE_INTERVAL_MS", default_value_t = 10_000)]
    requeue_interval_ms: u64,
    /// Cache-lag defer window, in milliseconds, after a gate removal.
    #[arg(long, env = "CAT_GATE_GATE_REMOVAL_DELAY_MS", default_value_t = 10)]
    gate_removal_delay_ms: u64,
    /// Compactor sweep period, in seconds.
    #[arg(long, env = "CAT_GATE_GC_INTERVAL_SECS", default_value_t = 24 * 3600)]
    gc_interval_secs: u64,
    /// Staleness threshold, in seconds, for removal-history entries.
    #[arg(long, env = "CAT_GATE_HISTORY_RETENTION_SECS", default_value_t = 24 * 3600)]
    history_retention_secs: u64,
    /// Bind address for the mutating admission webhook.
    #[arg(long, env = "CAT_GATE_WEBHOOK_ADDR", default_value = "0.0.0.0:8443")]
    webhook_addr: SocketAddr,
    /// Directory holding `tls.crt`/`tls.key` for the webhook listener.
    #[arg(long, env = "CAT_GATE_WEBHOOK_TLS_DIR", default_value = "/etc/cat-gate/tls")]
    webhook_tls_dir: PathBuf,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("info".parse()?))
        .init();

    rustls::crypto::ring::default_provider()
        .install_default()
        .map_err(|_| anyhow::anyhow!("failed to install rustls crypto provider"))?;

    let client = Client::try_default()
        .await
        .context("build default kube client (in-cluster or KUBECONFIG)")?;

    let cancel = CancellationToken::new();
    let (history_shutdown_tx, history_shutdown_rx) = tokio::sync::watch::channel(false);

    let index = Index::new();
    let history = RemovalHistory::new();

    let nodes_api: Api<Node> = Api::all(client.clone());
    let (node_store, node_writer) = reflector::store();
    let node_stream = reflector(node_writer, watcher(nodes_api, watcher::Config::default()).default_backoff());
    let node_cancel = cancel.clone();
    tokio::spawn(async move {
        let mut stream = std::pin::pin!(node_stream.applied_objects());
        loop {
            tokio::select! {
                () = node_cancel.cancelled() => break,
                item = stream.next() => match item {
                    Some(Ok(_)) => {}
                    Some(Err(err)) => warn!(%err, "node watch error"),
                    None => break,
                }
            }
        }
    });

    let pods_api: Api<Pod> = Api::all(client.clone());
    let (pod_store, pod_writer) = reflector::store();
    let pod_events = reflector(pod_writer, watcher(pods_api, watcher::Config::default()).default_backoff());

    let index_for_feed = index.clone();
    let fed_events = pod_events.inspect_ok(move |event| match event {
        watcher::Event::Apply(pod) | watcher::Event::InitApply(pod) => index_for_feed.observe(pod),
        watcher::Event::Delete(pod) => index_for_feed.remove(&PodKey::from_pod(pod)),
        watcher::Event::Init | watcher::Event::InitDone => {}
    });
    let triggers = trigger_stream(fed_events);

    let config = ReconcilerConfig {
        capacity: CapacityConfig {
            scale_rate: args.scale_rate,
            minimum_capacity: args.minimum_capacity,
        },
        requeue_interval: Duration::from_millis(args.requeue_interval_ms),
        gate_removal_delay: Duration::from_millis(args.gate_removal_delay_ms),
    };

    let context = Arc::new(Context {
        client: client.clone(),
        pods: pod_store,
        nodes: node_store,
        index,
        history: history.clone(),
        config,
    });

    let controller_task = tokio::spawn(async move {
        Controller::for_stream(triggers, context.pods.clone())
            .shutdown_on_signal()
            .run(reconcile, error_policy, context)
            .for_each(|res| async move {
                if let Err(err) = res {
                    warn!(%err, "reconcile failed");
                }
            })
            .await;
    });

    let compactor = Compactor::new(
        history,
        Duration::from_secs(args.gc_interval_secs),
        Duration::from_secs(args.history_retention_secs),
    );
    let compactor_task = tokio::spawn(compactor.run(history_shutdown_rx));

    let app = Router::new().route("/mutate--v1-pod", post(cat_gate_webhook::handler));
    let handle = Handle::new();
    let tls = load_tls(args.webhook_tls_dir.clone())
        .await
        .context("load webhook TLS material")?;

    let server_handle = handle.clone();
    let webhook_task = tokio::spawn(async move {
        info!(addr = %args.webhook_addr, "webhook listening");
        axum_server::bind_rustls(args.webhook_addr, tls)
            .handle(server_handle)
            .serve(app.into_make_service())
            .await
    });

    tokio::spawn({
        let handle = handle.clone();
        let cancel = cancel.clone();
        async move {
            tokio::signal::ctrl_c()
                .await
                .expect("failed to install ctrl-c handler");
            info!("shutdown signal received");
            cancel.cancel();
            handle.graceful_shutdown(Some(Duration::from_secs(5)));
            let _ = history_shutdown_tx.send(true);
        }
    });

    let (controller_res, webhook_res, compactor_res) =
        tokio::join!(controller_task, webhook_task, compactor_task);
    controller_res.context("reconciler task panicked")?;
    webhook_res.context("webhook task panicked")?.context("webhook server error")?;
    compactor_res.context("compactor task panicked")?;

    Ok(())
}

async fn load_tls(dir: PathBuf) -> Result<RustlsConfig> {
    let cert = dir.join("tls.crt");
    let key = dir.join("tls.key");
    RustlsConfig::from_pem_file(cert, key)
        .await
        .context("read tls.crt/tls.key")
}
