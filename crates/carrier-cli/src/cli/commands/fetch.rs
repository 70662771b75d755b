//! `carrier fetch` – push local files through the full transfer pipeline.

use anyhow::{Context, Result};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use carrier_core::config::CarrierConfig;
use carrier_core::controller::{Controller, Submission, SubmitOutcome};

use crate::local::{ConsoleUi, LocalTransport, LogNotifier};

/// Requester id for the local terminal session.
const LOCAL_REQUESTER: i64 = 0;

pub async fn run_fetch(
    mut cfg: CarrierConfig,
    sources: Vec<PathBuf>,
    dest: Option<PathBuf>,
    limit: Option<usize>,
) -> Result<()> {
    if let Some(dest) = dest {
        cfg.download_dir = dest;
    }
    if let Some(limit) = limit {
        cfg.max_concurrent = limit;
    }
    cfg.validate()?;
    tokio::fs::create_dir_all(&cfg.download_dir)
        .await
        .with_context(|| format!("creating {}", cfg.download_dir.display()))?;

    let transport = Arc::new(LocalTransport::new());
    let controller = Controller::new(
        cfg,
        Arc::clone(&transport) as Arc<dyn carrier_core::iface::Transport>,
        Arc::new(ConsoleUi::new()),
        Arc::new(LogNotifier),
    );
    controller.start();

    let mut submitted = 0usize;
    for source in sources {
        let meta = tokio::fs::metadata(&source)
            .await
            .with_context(|| format!("reading {}", source.display()))?;
        let name = source
            .file_name()
            .and_then(|n| n.to_str())
            .map(str::to_string)
            .with_context(|| format!("{} has no usable file name", source.display()))?;

        transport.register(&name, source.clone());
        let outcome = controller
            .submit(Submission {
                name,
                size: meta.len(),
                owner: LOCAL_REQUESTER,
            })
            .await;
        match outcome {
            SubmitOutcome::Started | SubmitOutcome::Queued(_) => submitted += 1,
            other => tracing::debug!(?other, "submission not started"),
        }
    }

    if submitted == 0 {
        controller.stop().await;
        return Ok(());
    }

    // Wait for the pipeline to empty; Ctrl-C triggers the graceful drain.
    let wait = async {
        while controller.is_busy() {
            tokio::time::sleep(Duration::from_millis(200)).await;
        }
    };
    tokio::select! {
        _ = wait => {}
        _ = tokio::signal::ctrl_c() => {
            println!();
            tracing::info!("interrupt received, shutting down");
        }
    }
    controller.stop().await;
    Ok(())
}
