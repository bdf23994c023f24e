//! Lifecycle of the single local fork node.
//!
//! ```text
//!   Stopped -> Starting -> Running -> Stopping -> Stopped
//!                  |           |
//!                  +-----------+--> Stopped   (child exited on its own)
//! ```
//!
//! `start`/`stop` run on their own task and hold the lifecycle mutex for the
//! whole transition, so a caller that stops waiting does not cut it short. The
//! status snapshot sits behind its own lock which is never held across an
//! `.await`, so `status()` returns immediately even while a transition is in
//! flight.
//!
//! Each spawned child gets a generation number. The waiter task of a child only
//! touches the snapshot when its generation is still the current one.

use std::future::Future;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use serde::Serialize;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::process::{Child, Command};
use tokio::sync::{Mutex, Notify, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{Instant, sleep, sleep_until, timeout};
use tracing::{debug, info, warn};

use crate::config::{ForkConfig, READINESS_MARKER, StartRequest, SupervisorOptions};
use crate::error::SupervisorError;
use crate::log_buffer::LogBuffer;

const PROBE_INTERVAL: Duration = Duration::from_millis(200);
const PROBE_TIMEOUT: Duration = Duration::from_millis(250);
const READER_DRAIN_TIMEOUT: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcessState {
    #[default]
    Stopped,
    Starting,
    Running,
    Stopping,
}

/// Point-in-time view of the fork node. `pid` and `config` are set iff the
/// state is not [`ProcessState::Stopped`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ProcessStatus {
    pub state: ProcessState,
    pub pid: Option<u32>,
    pub config: Option<ForkConfig>,
}

impl ProcessStatus {
    pub fn is_running(&self) -> bool {
        self.state == ProcessState::Running
    }

    /// Loopback RPC endpoint of the fork, only while it is running.
    pub fn local_rpc_url(&self) -> Option<String> {
        match (&self.config, self.is_running()) {
            (Some(config), true) => Some(format!("http://127.0.0.1:{}", config.port)),
            _ => None,
        }
    }
}

#[derive(Debug, Default)]
struct StatusCell {
    generation: u64,
    status: ProcessStatus,
}

type SharedStatus = Arc<RwLock<StatusCell>>;

fn read_status(status: &SharedStatus) -> RwLockReadGuard<'_, StatusCell> {
    match status.read() {
        Ok(g) => g,
        Err(poisoned) => poisoned.into_inner(),
    }
}

fn write_status(status: &SharedStatus) -> RwLockWriteGuard<'_, StatusCell> {
    match status.write() {
        Ok(g) => g,
        Err(poisoned) => poisoned.into_inner(),
    }
}

/// Applies `update` only if `generation` still owns the snapshot.
fn update_status(status: &SharedStatus, generation: u64, update: impl FnOnce(&mut ProcessStatus)) {
    let mut cell = write_status(status);
    if cell.generation == generation {
        update(&mut cell.status);
    }
}

/// Handle to a spawned child, owned by the lifecycle mutex.
#[derive(Debug)]
struct RunningFork {
    generation: u64,
    pid: u32,
    stop_tx: oneshot::Sender<Duration>,
    waiter: JoinHandle<()>,
}

/// What the waiter reports when the child exits without being asked to.
#[derive(Debug)]
struct ExitReport {
    description: String,
    last_line: Option<String>,
}

enum Readiness {
    Ready,
    Exited(ExitReport),
    TimedOut,
}

#[derive(Debug)]
pub struct ForkSupervisor {
    inner: Arc<Supervision>,
}

/// State shared between the supervisor handle and its transition tasks.
#[derive(Debug)]
struct Supervision {
    options: SupervisorOptions,
    logs: Arc<LogBuffer>,
    status: SharedStatus,
    lifecycle: Mutex<Option<RunningFork>>,
}

impl ForkSupervisor {
    pub fn new(options: SupervisorOptions) -> Self {
        let logs = Arc::new(LogBuffer::new(options.log_capacity));
        Self {
            inner: Arc::new(Supervision {
                options,
                logs,
                status: Arc::default(),
                lifecycle: Mutex::new(None),
            }),
        }
    }

    pub fn options(&self) -> &SupervisorOptions {
        &self.inner.options
    }

    pub fn status(&self) -> ProcessStatus {
        self.inner.status()
    }

    pub fn logs(&self) -> Vec<String> {
        self.inner.logs.snapshot()
    }

    /// Spawns the fork node and waits until it is ready.
    ///
    /// Only valid while stopped: a second call during a running or in-flight
    /// transition is rejected with [`SupervisorError::AlreadyRunning`]. Dropping
    /// the returned future does not abandon the transition.
    pub async fn start(&self, request: StartRequest) -> Result<ProcessStatus, SupervisorError> {
        let inner = self.inner.clone();
        run_transition(async move { inner.start(request).await }).await
    }

    /// Stops the fork node. Returns `false` when nothing was running.
    pub async fn stop(&self) -> Result<bool, SupervisorError> {
        let inner = self.inner.clone();
        run_transition(async move { inner.stop().await }).await
    }

    /// Teardown on server exit.
    pub async fn shutdown(&self) -> Result<(), SupervisorError> {
        if self.stop().await? {
            info!("fork node shut down");
        }
        Ok(())
    }
}

/// Drives a lifecycle transition on its own task so it completes even when
/// the caller's future is dropped.
async fn run_transition<T, F>(transition: F) -> Result<T, SupervisorError>
where
    T: Send + 'static,
    F: Future<Output = Result<T, SupervisorError>> + Send + 'static,
{
    tokio::spawn(transition)
        .await
        .map_err(|error| SupervisorError::Task(error.to_string()))?
}

impl Supervision {
    fn status(&self) -> ProcessStatus {
        read_status(&self.status).status.clone()
    }

    async fn start(&self, request: StartRequest) -> Result<ProcessStatus, SupervisorError> {
        let Ok(mut lifecycle) = self.lifecycle.try_lock() else {
            return Err(SupervisorError::AlreadyRunning);
        };
        if let Some(previous) = lifecycle.take() {
            if !previous.waiter.is_finished() {
                *lifecycle = Some(previous);
                return Err(SupervisorError::AlreadyRunning);
            }
            debug!(pid = previous.pid, "reaping exited fork node");
        }

        let fork_url = request.fork_url.trim().to_owned();
        if fork_url.is_empty() {
            return Err(SupervisorError::InvalidRequest(
                "fork_url must not be empty".to_owned(),
            ));
        }
        let port = reserve_port(
            &self.options.host,
            request.port.unwrap_or(self.options.default_port),
        )
        .await?;
        let config = ForkConfig {
            fork_url,
            chain_id: request.chain_id,
            port,
            start_time: unix_now(),
        };

        self.logs.clear();
        let mut child = self.spawn_child(&config)?;
        let Some(pid) = child.id() else {
            return Err(SupervisorError::Startup(
                "process exited before reporting a pid".to_owned(),
            ));
        };

        let generation = {
            let mut cell = write_status(&self.status);
            cell.generation += 1;
            cell.status = ProcessStatus {
                state: ProcessState::Starting,
                pid: Some(pid),
                config: Some(config.clone()),
            };
            cell.generation
        };
        info!(pid, port, fork_url = %config.fork_url, chain_id = ?config.chain_id, "anvil starting");

        let ready = Arc::new(Notify::new());
        let mut readers = Vec::with_capacity(2);
        if let Some(stdout) = child.stdout.take() {
            readers.push(spawn_reader(stdout, self.logs.clone(), ready.clone()));
        }
        if let Some(stderr) = child.stderr.take() {
            readers.push(spawn_reader(stderr, self.logs.clone(), ready.clone()));
        }

        let (stop_tx, stop_rx) = oneshot::channel();
        let (exit_tx, exit_rx) = oneshot::channel();
        let waiter = Waiter {
            child,
            pid,
            generation,
            readers,
            logs: self.logs.clone(),
            status: self.status.clone(),
            exit_tx: Some(exit_tx),
        };
        let waiter = tokio::spawn(waiter.run(stop_rx));
        let fork = RunningFork {
            generation,
            pid,
            stop_tx,
            waiter,
        };

        match self.wait_ready(port, &ready, exit_rx).await {
            Readiness::Ready => {
                update_status(&self.status, generation, |status| {
                    status.state = ProcessState::Running;
                });
                info!(pid, port, "anvil running");
                *lifecycle = Some(fork);
                Ok(self.status())
            }
            Readiness::Exited(report) => {
                let _ = fork.waiter.await;
                warn!(pid, exit = %report.description, "anvil exited during startup");
                Err(SupervisorError::Startup(format!(
                    "process exited ({}){}",
                    report.description,
                    last_output(report.last_line.as_deref())
                )))
            }
            Readiness::TimedOut => {
                let last_line = self.logs.last();
                terminate_fork(fork, Duration::ZERO).await;
                warn!(pid, timeout = ?self.options.startup_timeout, "anvil startup timed out");
                Err(SupervisorError::Startup(format!(
                    "no readiness within {}s{}",
                    self.options.startup_timeout.as_secs(),
                    last_output(last_line.as_deref())
                )))
            }
        }
    }

    async fn stop(&self) -> Result<bool, SupervisorError> {
        let mut lifecycle = self.lifecycle.lock().await;
        let Some(fork) = lifecycle.take() else {
            return Ok(false);
        };
        if fork.waiter.is_finished() {
            debug!(pid = fork.pid, "fork node had already exited");
            return Ok(false);
        }

        let (generation, pid) = (fork.generation, fork.pid);
        update_status(&self.status, generation, |status| {
            status.state = ProcessState::Stopping;
        });
        info!(pid, "stopping anvil");
        terminate_fork(fork, self.options.grace_period).await;
        info!(pid, "anvil stopped");
        Ok(true)
    }

    fn spawn_child(&self, config: &ForkConfig) -> Result<Child, SupervisorError> {
        let mut command = Command::new(&self.options.anvil_bin);
        command
            .arg("--port")
            .arg(config.port.to_string())
            .arg("--fork-url")
            .arg(&config.fork_url);
        if let Some(chain_id) = config.chain_id {
            command.arg("--chain-id").arg(chain_id.to_string());
        }
        command
            .arg("--host")
            .arg(&self.options.host)
            .stdin(std::process::Stdio::null())
            .stdout(std::process::Stdio::piped())
            .stderr(std::process::Stdio::piped())
            .kill_on_drop(true);
        #[cfg(unix)]
        command.process_group(0);

        command.spawn().map_err(|error| {
            let cause = if error.kind() == std::io::ErrorKind::NotFound {
                "executable not found".to_owned()
            } else {
                error.to_string()
            };
            SupervisorError::Spawn {
                bin: self.options.anvil_bin.display().to_string(),
                cause,
            }
        })
    }

    async fn wait_ready(
        &self,
        port: u16,
        ready: &Notify,
        mut exit_rx: oneshot::Receiver<ExitReport>,
    ) -> Readiness {
        let deadline = Instant::now() + self.options.startup_timeout;
        let probe_host = probe_host(&self.options.host);
        loop {
            tokio::select! {
                _ = ready.notified() => return Readiness::Ready,
                report = &mut exit_rx => {
                    return Readiness::Exited(report.unwrap_or(ExitReport {
                        description: "unknown status".to_owned(),
                        last_line: None,
                    }));
                }
                _ = sleep_until(deadline) => return Readiness::TimedOut,
                _ = sleep(PROBE_INTERVAL) => {
                    if port_accepts(probe_host, port).await {
                        return Readiness::Ready;
                    }
                }
            }
        }
    }
}

/// Owns the child for its whole life: either observes an unexpected exit or
/// performs the termination requested through the stop channel.
struct Waiter {
    child: Child,
    pid: u32,
    generation: u64,
    readers: Vec<JoinHandle<()>>,
    logs: Arc<LogBuffer>,
    status: SharedStatus,
    exit_tx: Option<oneshot::Sender<ExitReport>>,
}

enum WaiterEvent {
    Exited(std::io::Result<std::process::ExitStatus>),
    Stop(Duration),
}

impl Waiter {
    async fn run(mut self, mut stop_rx: oneshot::Receiver<Duration>) {
        let event = tokio::select! {
            exit = self.child.wait() => WaiterEvent::Exited(exit),
            // A dropped supervisor counts as a request to kill right away.
            grace = &mut stop_rx => WaiterEvent::Stop(grace.unwrap_or(Duration::ZERO)),
        };
        match event {
            WaiterEvent::Exited(exit) => self.on_unexpected_exit(exit).await,
            WaiterEvent::Stop(grace) => self.terminate(grace).await,
        }
    }

    async fn on_unexpected_exit(mut self, exit: std::io::Result<std::process::ExitStatus>) {
        let description = match exit {
            Ok(status) => status.to_string(),
            Err(error) => format!("wait failed: {error}"),
        };
        // Stragglers in the group would keep the pipes open.
        let _ = signal_group(self.pid, Signal::Kill);
        drain_readers(std::mem::take(&mut self.readers)).await;

        update_status(&self.status, self.generation, |status| {
            *status = ProcessStatus::default();
        });
        warn!(pid = self.pid, exit = %description, "anvil exited unexpectedly");

        let last_line = self.logs.last();
        self.logs
            .append(format!("anvil exited unexpectedly ({description})"));
        if let Some(exit_tx) = self.exit_tx.take() {
            let _ = exit_tx.send(ExitReport {
                description,
                last_line,
            });
        }
    }

    /// Kills the child and clears the snapshot of its generation.
    async fn terminate(mut self, grace: Duration) {
        self.kill(grace).await;
        self.abort_readers();
        update_status(&self.status, self.generation, |status| {
            *status = ProcessStatus::default();
        });
    }

    async fn kill(&mut self, grace: Duration) {
        if !grace.is_zero() {
            if let Err(error) = signal_group(self.pid, Signal::Term) {
                warn!(pid = self.pid, %error, "failed to send SIGTERM");
            }
            match timeout(grace, self.child.wait()).await {
                Ok(exit) => {
                    debug!(pid = self.pid, ?exit, "anvil exited after SIGTERM");
                    let _ = signal_group(self.pid, Signal::Kill);
                    return;
                }
                Err(_) => {
                    warn!(pid = self.pid, ?grace, "anvil ignored SIGTERM, killing");
                }
            }
        }
        if let Err(error) = signal_group(self.pid, Signal::Kill) {
            debug!(pid = self.pid, %error, "failed to kill process group");
        }
        if let Err(error) = self.child.kill().await {
            debug!(pid = self.pid, %error, "failed to kill anvil");
        }
    }

    fn abort_readers(&mut self) {
        for reader in self.readers.drain(..) {
            reader.abort();
        }
    }
}

async fn terminate_fork(fork: RunningFork, grace: Duration) {
    // The waiter may have just observed an exit; it finishes either way.
    let _ = fork.stop_tx.send(grace);
    if let Err(error) = fork.waiter.await {
        warn!(pid = fork.pid, %error, "fork waiter task failed");
    }
}

async fn drain_readers(readers: Vec<JoinHandle<()>>) {
    for reader in readers {
        let abort = reader.abort_handle();
        if timeout(READER_DRAIN_TIMEOUT, reader).await.is_err() {
            abort.abort();
        }
    }
}

fn spawn_reader<R>(stream: R, logs: Arc<LogBuffer>, ready: Arc<Notify>) -> JoinHandle<()>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut reader = BufReader::new(stream);
        let mut buf = Vec::new();
        loop {
            buf.clear();
            match reader.read_until(b'\n', &mut buf).await {
                Ok(0) => break,
                Ok(_) => {
                    let line = String::from_utf8_lossy(&buf);
                    let line = line.trim_end();
                    if line.is_empty() {
                        continue;
                    }
                    logs.append(line);
                    if line.contains(READINESS_MARKER) {
                        ready.notify_one();
                    }
                }
                Err(error) => {
                    debug!(%error, "log reader stopped");
                    break;
                }
            }
        }
    })
}

/// Binds `host:port` to check it is free and returns the bound port, which
/// differs from `port` only when `port` is 0.
async fn reserve_port(host: &str, port: u16) -> Result<u16, SupervisorError> {
    let listener = TcpListener::bind((host, port))
        .await
        .map_err(|error| SupervisorError::PortUnavailable {
            port,
            cause: error.to_string(),
        })?;
    Ok(listener.local_addr()?.port())
}

async fn port_accepts(host: &str, port: u16) -> bool {
    matches!(
        timeout(PROBE_TIMEOUT, TcpStream::connect((host, port))).await,
        Ok(Ok(_))
    )
}

fn probe_host(host: &str) -> &str {
    match host {
        "0.0.0.0" | "" => "127.0.0.1",
        "::" => "::1",
        other => other,
    }
}

fn last_output(line: Option<&str>) -> String {
    line.map(|line| format!(": {line}")).unwrap_or_default()
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_secs())
        .unwrap_or_default()
}

#[derive(Debug, Clone, Copy)]
enum Signal {
    Term,
    Kill,
}

/// Signals the whole process group led by `pid`. A group that is already gone
/// is not an error.
#[cfg(unix)]
fn signal_group(pid: u32, signal: Signal) -> std::io::Result<()> {
    let pgid = libc::pid_t::try_from(pid)
        .map_err(|_| std::io::Error::new(std::io::ErrorKind::InvalidInput, "pid out of range"))?;
    let signal = match signal {
        Signal::Term => libc::SIGTERM,
        Signal::Kill => libc::SIGKILL,
    };
    // SAFETY: killpg only sends a signal; an invalid group yields ESRCH.
    if unsafe { libc::killpg(pgid, signal) } == 0 {
        return Ok(());
    }
    let error = std::io::Error::last_os_error();
    match error.raw_os_error() {
        Some(libc::ESRCH) => Ok(()),
        _ => Err(error),
    }
}

#[cfg(not(unix))]
fn signal_group(_pid: u32, _signal: Signal) -> std::io::Result<()> {
    Ok(())
}
