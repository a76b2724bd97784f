use serde::Serialize;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use walld_core::dispatch::{DispatchReport, Dispatcher};
use walld_core::error::WalldError;
use walld_core::ipc::{DaemonStatus, IpcRequest, IpcResponse};
use walld_core::scan::scan_directory;
use walld_core::store::Store;

use super::scheduler::Scheduler;
use super::DaemonCommand;

/// Sole owner of the store. Timer fires and client requests are handled
/// one at a time, so a mutation is either fully applied before a rotation
/// starts or waits until it has been submitted.
pub struct RotationEngine {
    store: Store,
    dispatcher: Dispatcher,
    scheduler: Scheduler,
}

impl RotationEngine {
    pub fn new(store: Store, dispatcher: Dispatcher) -> Self {
        let scheduler = Scheduler::new(store.interval());
        Self {
            store,
            dispatcher,
            scheduler,
        }
    }

    pub async fn run(
        mut self,
        mut cmd_rx: mpsc::Receiver<DaemonCommand>,
        mut shutdown: watch::Receiver<bool>,
    ) {
        self.scheduler.start();

        loop {
            tokio::select! {
                _ = self.scheduler.tick() => {
                    self.rotate().await;
                }
                cmd = cmd_rx.recv() => match cmd {
                    Some(DaemonCommand::Request { request, respond }) => {
                        let (response, quit) = self.handle_request(request).await;
                        let _ = respond.send(response);
                        if quit {
                            info!("quit command received");
                            return;
                        }
                    }
                    Some(DaemonCommand::Rotate) => {
                        self.rotate().await;
                        self.scheduler.rearm();
                    }
                    None => {
                        info!("command channel closed");
                        return;
                    }
                },
                _ = shutdown.changed() => {
                    info!("shutdown signal received");
                    return;
                }
            }
        }
    }

    /// One rotation. The returned handles belong to the launched interface
    /// tasks; the run loop drops them. `None` when the set is empty.
    async fn rotate(&mut self) -> Option<Vec<JoinHandle<DispatchReport>>> {
        self.scheduler.begin_rotation();
        self.rescan().await;

        let handles = match self.store.rotate() {
            Some(rotation) => Some(
                self.dispatcher
                    .submit(&rotation.wallpaper, rotation.commands),
            ),
            None => {
                warn!("no wallpapers available, waiting for files");
                None
            }
        };

        self.scheduler.finish_rotation();
        handles
    }

    async fn rescan(&mut self) {
        let Some((root, recursive)) = self.store.scan_source() else {
            return;
        };
        let scanned =
            tokio::task::spawn_blocking(move || scan_directory(&root, recursive)).await;
        match scanned {
            Ok(Ok(files)) => {
                if self.store.refresh_files(files) {
                    debug!("wallpaper set changed on rescan");
                }
            }
            Ok(Err(e)) => warn!("rescan failed, keeping previous set: {e}"),
            Err(e) => error!("rescan task failed: {e}"),
        }
    }

    /// Apply one request. The flag is set when the daemon should stop.
    async fn handle_request(&mut self, request: IpcRequest) -> (IpcResponse, bool) {
        let response = match request {
            IpcRequest::Status => respond_with(&self.status()),
            IpcRequest::SetSchedule { value, unit } => {
                match self.store.set_schedule(value, &unit) {
                    Ok(interval) => {
                        self.scheduler.set_interval(interval);
                        IpcResponse::ok()
                    }
                    Err(e) => e.into(),
                }
            }
            IpcRequest::SetFiles { paths } => match self.store.set_files(paths) {
                Ok(()) => IpcResponse::ok(),
                Err(e) => e.into(),
            },
            IpcRequest::SetShuffle { enabled } => {
                self.store.set_shuffle(enabled);
                IpcResponse::ok()
            }
            IpcRequest::GetCurrentWallpaper => self.current_wallpaper(),
            IpcRequest::ListInterfaces => respond_with(&self.store.list_interfaces()),
            IpcRequest::ListActive => respond_with(&self.store.list_active()),
            IpcRequest::SetVariable {
                interface,
                variable,
                value,
            } => match self.store.set_variable(&interface, &variable, value) {
                Ok(()) => IpcResponse::ok(),
                Err(e) => e.into(),
            },
            IpcRequest::SetInterfaceEnabled { interface, enabled } => {
                match self.store.set_interface_enabled(&interface, enabled) {
                    Ok(changed) => {
                        IpcResponse::ok_with_data(serde_json::json!({ "changed": changed }))
                    }
                    Err(e) => e.into(),
                }
            }
            IpcRequest::Next => {
                let rotated = self.rotate().await.is_some();
                self.scheduler.rearm();
                // the previous wallpaper stays on screen when nothing rotated
                let current = self
                    .store
                    .current_wallpaper()
                    .ok()
                    .map(|p| p.display().to_string());
                IpcResponse::ok_with_data(
                    serde_json::json!({ "wallpaper": current, "rotated": rotated }),
                )
            }
            IpcRequest::Quit => return (IpcResponse::ok(), true),
        };
        (response, false)
    }

    fn current_wallpaper(&self) -> IpcResponse {
        match self.store.current_wallpaper() {
            Ok(path) => IpcResponse::ok_with_data(
                serde_json::json!({ "wallpaper": path.display().to_string() }),
            ),
            Err(e) => e.into(),
        }
    }

    fn status(&self) -> DaemonStatus {
        DaemonStatus {
            phase: self.scheduler.phase(),
            next_change: self
                .scheduler
                .next_change()
                .map(|d| format!("{}s", d.as_secs())),
            snapshot: self.store.snapshot(),
        }
    }
}

fn respond_with<T: Serialize>(data: &T) -> IpcResponse {
    match serde_json::to_value(data) {
        Ok(value) => IpcResponse::ok_with_data(value),
        Err(e) => WalldError::from(e).into(),
    }
}

#[cfg(test)]
mod tests {
    use std::path::{Path, PathBuf};
    use std::sync::Arc;
    use std::time::Duration;

    use async_trait::async_trait;
    use tokio::sync::oneshot;

    use walld_core::config::Configuration;
    use walld_core::dispatch::{ExitStatus, Launcher};
    use walld_core::ipc::Phase;
    use walld_core::models::Value;

    use super::*;

    fn config_doc(active: &str, daemon_extra: &str) -> String {
        format!(
            r#"
[Daemon]
schedule = 10
units = "s"
shuffle = false
active_interfaces = ["{active}"]
{daemon_extra}

[Interfaces]
other = ["other", "%f"]

[Interfaces.setter]
args = ["setter", "%f", "--mode", "%mode"]

[Interfaces.setter.variables]
mode = {{ current = "fill", options = ["fill", "fit"] }}
"#
        )
    }

    fn default_config() -> String {
        config_doc("setter", "")
    }

    fn with_path(active: &str, root: &Path) -> String {
        config_doc(active, &format!("path = {:?}", root.display().to_string()))
    }

    /// Forwards every argv to the test instead of starting a process.
    struct ChannelLauncher(mpsc::UnboundedSender<Vec<String>>);

    #[async_trait]
    impl Launcher for ChannelLauncher {
        async fn launch(&self, argv: &[String]) -> walld_core::error::Result<ExitStatus> {
            let _ = self.0.send(argv.to_vec());
            Ok(ExitStatus::Success)
        }
    }

    fn engine_with(
        config: &str,
        files: Vec<PathBuf>,
    ) -> (RotationEngine, mpsc::UnboundedReceiver<Vec<String>>) {
        let config = Configuration::from_toml_str(config).unwrap();
        let (tx, rx) = mpsc::unbounded_channel();
        let dispatcher = Dispatcher::new(Arc::new(ChannelLauncher(tx)));
        (RotationEngine::new(Store::new(config, files), dispatcher), rx)
    }

    fn files(n: usize) -> Vec<PathBuf> {
        (0..n).map(|i| PathBuf::from(format!("/w/{i}.png"))).collect()
    }

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    fn error_code(response: &IpcResponse) -> Option<&str> {
        match response {
            IpcResponse::Error { code, .. } => Some(code.as_str()),
            IpcResponse::Ok { .. } => None,
        }
    }

    async fn await_all(handles: Vec<JoinHandle<DispatchReport>>) -> Vec<DispatchReport> {
        let mut reports = Vec::new();
        for h in handles {
            reports.push(h.await.unwrap());
        }
        reports
    }

    #[tokio::test(start_paused = true)]
    async fn test_set_schedule_updates_timer() {
        let (mut engine, _rx) = engine_with(&default_config(), files(2));
        engine.scheduler.start();

        let (resp, quit) = engine
            .handle_request(IpcRequest::SetSchedule {
                value: 5,
                unit: "m".into(),
            })
            .await;
        assert!(matches!(resp, IpcResponse::Ok { .. }));
        assert!(!quit);
        assert_eq!(engine.store.interval(), Duration::from_secs(300));
        assert_eq!(engine.scheduler.interval(), Duration::from_secs(300));
        assert_eq!(engine.scheduler.next_change(), Some(Duration::from_secs(300)));

        let (resp, _) = engine
            .handle_request(IpcRequest::SetSchedule {
                value: 0,
                unit: "m".into(),
            })
            .await;
        assert_eq!(error_code(&resp), Some("invalid_schedule"));

        let (resp, _) = engine
            .handle_request(IpcRequest::SetSchedule {
                value: 5,
                unit: "weeks".into(),
            })
            .await;
        assert_eq!(error_code(&resp), Some("unknown_time_units"));
        assert_eq!(engine.scheduler.interval(), Duration::from_secs(300));

        for unit in ["s", "m", "h"] {
            let (resp, _) = engine
                .handle_request(IpcRequest::SetSchedule {
                    value: i64::MAX,
                    unit: unit.into(),
                })
                .await;
            assert_eq!(error_code(&resp), Some("invalid_schedule"));
        }
        assert_eq!(engine.scheduler.interval(), Duration::from_secs(300));
        assert_eq!(engine.scheduler.next_change(), Some(Duration::from_secs(300)));
    }

    #[tokio::test]
    async fn test_invalid_requests_leave_store_unchanged() {
        let (mut engine, _rx) = engine_with(&default_config(), files(2));
        let before = serde_json::to_value(engine.store.snapshot()).unwrap();

        let requests = vec![
            IpcRequest::SetVariable {
                interface: "setter".into(),
                variable: "mode".into(),
                value: Value::String("stretch".into()),
            },
            IpcRequest::SetVariable {
                interface: "nope".into(),
                variable: "mode".into(),
                value: Value::String("fit".into()),
            },
            IpcRequest::SetInterfaceEnabled {
                interface: "nope".into(),
                enabled: true,
            },
            IpcRequest::SetFiles { paths: Vec::new() },
            IpcRequest::SetFiles {
                paths: vec![PathBuf::from("/definitely/not/here.png")],
            },
        ];
        let expected = [
            "invalid_option",
            "invalid_interface_name",
            "invalid_interface_name",
            "no_files_provided",
            "invalid_file",
        ];
        for (request, code) in requests.into_iter().zip(expected) {
            let (resp, _) = engine.handle_request(request).await;
            assert_eq!(error_code(&resp), Some(code));
        }

        let after = serde_json::to_value(engine.store.snapshot()).unwrap();
        assert_eq!(before, after);
    }

    #[tokio::test]
    async fn test_next_dispatches_resolved_command() {
        let (mut engine, mut rx) = engine_with(&default_config(), files(3));
        engine
            .handle_request(IpcRequest::SetVariable {
                interface: "setter".into(),
                variable: "mode".into(),
                value: Value::String("fit".into()),
            })
            .await;

        let (resp, _) = engine.handle_request(IpcRequest::Next).await;
        match resp {
            IpcResponse::Ok { data: Some(data) } => {
                assert_eq!(data["wallpaper"], "/w/0.png");
                assert_eq!(data["rotated"], true);
            }
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(
            rx.recv().await.unwrap(),
            strings(&["setter", "/w/0.png", "--mode", "fit"])
        );
    }

    #[tokio::test]
    async fn test_next_reports_when_nothing_rotated() {
        let tmp = tempfile::tempdir().unwrap();
        let root = tmp.path().canonicalize().unwrap();
        std::fs::write(root.join("a.png"), b"").unwrap();
        let initial = scan_directory(&root, false).unwrap();
        let (mut engine, _rx) = engine_with(&with_path("setter", &root), initial);

        let (resp, _) = engine.handle_request(IpcRequest::Next).await;
        assert!(matches!(resp, IpcResponse::Ok { data: Some(ref d) } if d["rotated"] == true));

        std::fs::remove_file(root.join("a.png")).unwrap();
        let (resp, _) = engine.handle_request(IpcRequest::Next).await;
        match resp {
            IpcResponse::Ok { data: Some(data) } => {
                assert_eq!(data["rotated"], false);
                assert_eq!(data["wallpaper"], root.join("a.png").to_str().unwrap());
            }
            other => panic!("unexpected {other:?}"),
        }
        assert!(engine.store.snapshot().wallpapers.is_empty());
    }

    #[tokio::test]
    async fn test_enabled_interfaces_dispatch() {
        let (mut engine, mut rx) = engine_with(&default_config(), files(1));
        let (resp, _) = engine
            .handle_request(IpcRequest::SetInterfaceEnabled {
                interface: "other".into(),
                enabled: true,
            })
            .await;
        match resp {
            IpcResponse::Ok { data: Some(data) } => assert_eq!(data["changed"], true),
            other => panic!("unexpected {other:?}"),
        }

        let reports = await_all(engine.rotate().await.unwrap()).await;
        assert_eq!(reports.len(), 2);
        assert!(reports.iter().all(|r| r.outcome.is_success()));

        let mut seen = vec![rx.recv().await.unwrap(), rx.recv().await.unwrap()];
        seen.sort();
        assert_eq!(
            seen,
            vec![
                strings(&["other", "/w/0.png"]),
                strings(&["setter", "/w/0.png", "--mode", "fill"]),
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_empty_set_stays_waiting() {
        let (mut engine, _rx) = engine_with(&default_config(), Vec::new());
        engine.scheduler.start();

        assert!(engine.rotate().await.is_none());
        assert_eq!(engine.scheduler.phase(), Phase::Waiting);

        let (resp, _) = engine.handle_request(IpcRequest::GetCurrentWallpaper).await;
        assert_eq!(error_code(&resp), Some("no_wallpaper_selected"));
    }

    #[tokio::test]
    async fn test_rescan_picks_up_new_files() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(tmp.path().join("a.png"), b"").unwrap();
        let root = tmp.path().canonicalize().unwrap();

        let config = with_path("other", &root);
        let initial = scan_directory(&root, false).unwrap();
        let (mut engine, mut rx) = engine_with(&config, initial);

        await_all(engine.rotate().await.unwrap()).await;
        assert_eq!(
            rx.recv().await.unwrap(),
            strings(&["other", root.join("a.png").to_str().unwrap()])
        );

        std::fs::write(tmp.path().join("b.png"), b"").unwrap();
        await_all(engine.rotate().await.unwrap()).await;
        assert_eq!(
            rx.recv().await.unwrap(),
            strings(&["other", root.join("b.png").to_str().unwrap()])
        );
        assert_eq!(engine.store.snapshot().wallpapers.len(), 2);
    }

    #[tokio::test]
    async fn test_pinned_files_are_not_rescanned() {
        let tmp = tempfile::tempdir().unwrap();
        let root = tmp.path().canonicalize().unwrap();
        std::fs::write(root.join("a.png"), b"").unwrap();
        std::fs::write(root.join("b.png"), b"").unwrap();

        let (mut engine, mut rx) = engine_with(&with_path("setter", &root), Vec::new());
        let (resp, _) = engine
            .handle_request(IpcRequest::SetFiles {
                paths: vec![root.join("b.png")],
            })
            .await;
        assert!(matches!(resp, IpcResponse::Ok { .. }));

        engine.rotate().await;
        engine.rotate().await;
        let b = root.join("b.png").display().to_string();
        for _ in 0..2 {
            assert_eq!(rx.recv().await.unwrap()[1], b);
        }
    }

    #[tokio::test]
    async fn test_shuffle_toggle_between_rotations() {
        let (mut engine, _rx) = engine_with(&default_config(), files(5));
        for round in 0..12 {
            let enabled = round % 3 != 0;
            engine
                .handle_request(IpcRequest::SetShuffle { enabled })
                .await;
            engine.rotate().await;

            let snapshot = engine.store.snapshot();
            assert_eq!(snapshot.shuffle, enabled);
            if enabled {
                assert_eq!(snapshot.rotation.permutation.len(), 5);
            }
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_loop_rotates_on_timer() {
        let (engine, mut rx) = engine_with(&default_config(), files(2));
        let (_cmd_tx, cmd_rx) = mpsc::channel(8);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let handle = tokio::spawn(engine.run(cmd_rx, shutdown_rx));

        let started = tokio::time::Instant::now();
        let argv = rx.recv().await.unwrap();
        assert_eq!(argv[1], "/w/0.png");
        assert!(started.elapsed() >= Duration::from_secs(10));

        let argv = rx.recv().await.unwrap();
        assert_eq!(argv[1], "/w/1.png");
        assert!(started.elapsed() >= Duration::from_secs(20));

        shutdown_tx.send(true).unwrap();
        handle.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_status_and_quit_over_channel() {
        let (engine, _rx) = engine_with(&default_config(), files(2));
        let (cmd_tx, cmd_rx) = mpsc::channel(8);
        let (_shutdown_tx, shutdown_rx) = watch::channel(false);
        let handle = tokio::spawn(engine.run(cmd_rx, shutdown_rx));

        let (tx, rx) = oneshot::channel();
        cmd_tx
            .send(DaemonCommand::Request {
                request: IpcRequest::Status,
                respond: tx,
            })
            .await
            .unwrap();
        let status: DaemonStatus = match rx.await.unwrap() {
            IpcResponse::Ok { data: Some(data) } => serde_json::from_value(data).unwrap(),
            other => panic!("unexpected {other:?}"),
        };
        assert_eq!(status.phase, Phase::Waiting);
        assert_eq!(status.next_change.as_deref(), Some("10s"));
        assert_eq!(status.snapshot.wallpapers.len(), 2);

        let (tx, rx) = oneshot::channel();
        cmd_tx
            .send(DaemonCommand::Request {
                request: IpcRequest::Quit,
                respond: tx,
            })
            .await
            .unwrap();
        assert!(matches!(rx.await.unwrap(), IpcResponse::Ok { .. }));
        handle.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_rotate_command_rearms_timer() {
        let (engine, mut rx) = engine_with(&default_config(), files(3));
        let (cmd_tx, cmd_rx) = mpsc::channel(8);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let handle = tokio::spawn(engine.run(cmd_rx, shutdown_rx));

        tokio::time::sleep(Duration::from_secs(6)).await;
        cmd_tx.send(DaemonCommand::Rotate).await.unwrap();
        assert_eq!(rx.recv().await.unwrap()[1], "/w/0.png");
        let rotated = tokio::time::Instant::now();

        assert_eq!(rx.recv().await.unwrap()[1], "/w/1.png");
        assert!(rotated.elapsed() >= Duration::from_secs(10));

        shutdown_tx.send(true).unwrap();
        handle.await.unwrap();
    }
}
