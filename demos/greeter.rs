//! # Example: TCP greeter
//!
//! A line-based TCP server that answers every line with a greeting, plus a
//! [`DrainBarrier`] collecting fire-and-forget audit writes.
//!
//! ```text
//! $ RUST_LOG=info cargo run --example greeter
//! $ nc 127.0.0.1 7878
//! ada
//! hello, ada
//! ^C (in the server terminal) → listener stops, audit writes finish, process exits
//! ```

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context as _;
use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use runvisor::{BoxError, Context, DrainBarrier, Runner, RunnerError, RunnerRef, Service, Setup};

/// Accepts connections until stopped; each connection is served on its own task.
struct Greeter {
    listener: Mutex<Option<TcpListener>>,
    audit: DrainBarrier,
    stopped: CancellationToken,
}

impl Greeter {
    async fn bind(addr: &str, audit: DrainBarrier) -> anyhow::Result<Self> {
        let listener = TcpListener::bind(addr)
            .await
            .with_context(|| format!("binding greeter listener on {addr}"))?;
        Ok(Self {
            listener: Mutex::new(Some(listener)),
            audit,
            stopped: CancellationToken::new(),
        })
    }
}

#[async_trait]
impl Runner for Greeter {
    fn name(&self) -> &str {
        "greeter"
    }

    async fn start(&self, ctx: Context) -> Result<(), RunnerError> {
        let listener = self
            .listener
            .lock()
            .await
            .take()
            .ok_or_else(|| RunnerError::fail("listener already started"))?;
        tracing::info!(parent: ctx.span(), addr = ?listener.local_addr()?, "listening");

        loop {
            tokio::select! {
                _ = self.stopped.cancelled() => return Ok(()),
                err = ctx.done() => return Err(err.into()),
                accepted = listener.accept() => {
                    let (stream, peer) = accepted?;
                    let ctx = ctx.child();
                    let audit = self.audit.clone();
                    tokio::spawn(async move {
                        if let Err(err) = serve(stream, audit).await {
                            tracing::warn!(
                                parent: ctx.span(),
                                %peer,
                                error = %err,
                                "connection closed"
                            );
                        }
                    });
                }
            }
        }
    }

    async fn stop(&self, ctx: Context) -> Result<(), RunnerError> {
        tracing::info!(parent: ctx.span(), "closing listener");
        self.stopped.cancel();
        Ok(())
    }
}

async fn serve(stream: TcpStream, audit: DrainBarrier) -> std::io::Result<()> {
    let (read, mut write) = stream.into_split();
    let mut lines = BufReader::new(read).lines();

    while let Some(line) = lines.next_line().await? {
        let name = line.trim().to_string();
        write.write_all(format!("hello, {name}\n").as_bytes()).await?;

        audit.submit(async move {
            // Stands in for a slow write to an audit store.
            tokio::time::sleep(Duration::from_millis(500)).await;
            tracing::info!(visitor = %name, "audit record stored");
        });
    }
    Ok(())
}

#[tokio::main]
async fn main() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let result = Service::builder("greeter")
        .with_shutdown_timeout(Duration::from_secs(5))
        .with_timeout(Duration::from_secs(10))
        .build()
        .run(|ctx: Context, svc| async move {
            let audit = DrainBarrier::new();
            let greeter = Greeter::bind("127.0.0.1:7878", audit.clone()).await?;

            svc.on_shutdown(|ctx: Context| async move {
                tracing::info!(parent: ctx.span(), "flushing metrics");
            });

            let greeter: RunnerRef = Arc::new(greeter);
            let audit: RunnerRef = Arc::new(audit);
            Ok::<_, BoxError>(Setup::new([greeter, audit]).with_context(ctx))
        })
        .await;

    if let Err(err) = result {
        tracing::error!(service = "greeter", error = %err, kind = err.as_label(), "greeter failed");
        std::process::exit(1);
    }
}
