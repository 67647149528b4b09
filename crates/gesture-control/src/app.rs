use crate::{
    AppResult, BindExecutor, KeyInjector, ServerState,
    config::ConfigStore,
    server,
};

use gesture_control_core::{
    AttributeStore, BindStore, CameraBackend, CommandDispatcher, DetectionEvent,
    DetectionSession, GestureRegistry, Notification,
};

use std::{future::Future, path::Path, sync::Arc, time::Duration};

use tokio::{
    net::TcpListener,
    sync::{broadcast, mpsc, watch},
};
use tracing::{debug, error, info, instrument, trace, warn};

/// File holding the saved gesture binds, under the data directory.
pub const BINDS_FILE: &str = "binds.toml";
/// File holding user-defined gestures, under the data directory.
pub const CUSTOM_GESTURES_FILE: &str = "custom_gestures.toml";

const EVENT_CHANNEL_CAPACITY: usize = 64;
const NOTIFICATION_CAPACITY: usize = 64;
const SHUTDOWN_GRACE: Duration = Duration::from_secs(2);

/// Process-wide context. Every long-lived component is created here and
/// handed to its users explicitly.
pub struct App {
    pub(crate) config: Arc<ConfigStore>,
    pub(crate) binds: Arc<BindStore>,
    pub(crate) session: Arc<DetectionSession>,
    pub(crate) dispatcher: Arc<CommandDispatcher>,
    pub(crate) notifications: broadcast::Sender<Notification>,
    pub(crate) events_rx: mpsc::Receiver<DetectionEvent>,
}

impl App {
    /// Open the stores under `data_dir` and wire the dispatcher.
    #[track_caller]
    #[instrument(skip(config, backend))]
    pub fn build(
        config: ConfigStore,
        data_dir: &Path,
        backend: Arc<dyn CameraBackend>,
    ) -> AppResult<Self> {
        let settings = config.snapshot();
        let config = Arc::new(config);

        let binds = Arc::new(BindStore::open(data_dir.join(BINDS_FILE))?);
        let gestures = Arc::new(GestureRegistry::load(data_dir.join(CUSTOM_GESTURES_FILE))?);

        let (events_tx, events_rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        let session = Arc::new(DetectionSession::new(
            backend,
            events_tx,
            settings.detection.stop_timeout(),
        ));

        let attributes: Arc<dyn AttributeStore> = Arc::clone(&config) as Arc<dyn AttributeStore>;
        let dispatcher = Arc::new(CommandDispatcher::new(
            Arc::clone(&binds),
            gestures,
            Arc::clone(&session),
            attributes,
            settings.detection.operation_timeout(),
        ));

        let (notifications, _) = broadcast::channel(NOTIFICATION_CAPACITY);

        info!(
            bind_count = binds.all().len(),
            listen_address = %settings.listen_address(),
            "Application context ready"
        );

        Ok(Self {
            config,
            binds,
            session,
            dispatcher,
            notifications,
            events_rx,
        })
    }

    /// Route state for the HTTP surface.
    pub fn server_state(&self) -> ServerState {
        ServerState::new(
            Arc::clone(&self.dispatcher),
            Arc::clone(&self.session),
            self.notifications.clone(),
        )
    }

    /// Serve the control channel until `shutdown` resolves, then stop the
    /// session and release every key the executor holds.
    #[instrument(skip_all)]
    pub async fn run(
        self,
        injector: Arc<dyn KeyInjector>,
        shutdown: impl Future<Output = ()> + Send + 'static,
    ) -> AppResult<()> {
        let address = self.config.snapshot().listen_address();
        let listener = TcpListener::bind(&address).await?;
        info!(address = %address, "Control channel listening");

        let state = self.server_state();
        let App {
            binds,
            session,
            notifications,
            events_rx,
            ..
        } = self;

        let (executor_tx, executor_rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let executor = tokio::spawn(BindExecutor::new(binds, injector).run(executor_rx));
        let router = tokio::spawn(route_events(
            events_rx,
            notifications,
            executor_tx,
            shutdown_rx,
        ));

        let served = server::serve(listener, server::router(state), shutdown).await;
        info!("Control channel closed, shutting down");

        match tokio::task::spawn_blocking(move || session.stop()).await {
            Ok(Ok(was_active)) => info!(was_active, "Detection session stopped"),
            Ok(Err(e)) => warn!(error = ?e, "Detection session stopped uncleanly"),
            Err(e) => error!(error = ?e, "Session stop task panicked"),
        }

        let _ = shutdown_tx.send(true);

        for (name, handle) in [("event router", router), ("bind executor", executor)] {
            match tokio::time::timeout(SHUTDOWN_GRACE, handle).await {
                Ok(Ok(())) => debug!(task = name, "Task stopped cleanly"),
                Ok(Err(e)) => error!(task = name, error = ?e, "Task panicked"),
                Err(_) => warn!(task = name, "Task did not stop within timeout"),
            }
        }

        info!("Gesture-Control shut down");

        served
    }
}

/// Fan detection events out to connected clients and the bind executor.
///
/// On shutdown, events already queued are still delivered so the executor
/// sees the final `SessionEnded`.
pub(crate) async fn route_events(
    mut events: mpsc::Receiver<DetectionEvent>,
    notifications: broadcast::Sender<Notification>,
    executor_tx: mpsc::Sender<DetectionEvent>,
    mut shutdown: watch::Receiver<bool>,
) {
    loop {
        tokio::select! {
            event = events.recv() => match event {
                Some(event) => forward(event, &notifications, &executor_tx).await,
                None => break,
            },
            _ = shutdown.changed() => {
                while let Ok(event) = events.try_recv() {
                    forward(event, &notifications, &executor_tx).await;
                }
                break;
            }
        }
    }

    debug!("Event router stopped");
}

async fn forward(
    event: DetectionEvent,
    notifications: &broadcast::Sender<Notification>,
    executor_tx: &mpsc::Sender<DetectionEvent>,
) {
    if let DetectionEvent::GestureDetected { gesture, .. } = &event {
        let notification = Notification::GestureDetected {
            gesture: gesture.clone(),
        };
        if notifications.send(notification).is_err() {
            trace!(gesture = %gesture, "No client connected for gesture notification");
        }
    }

    if let Err(e) = executor_tx.send(event).await {
        warn!(error = %e, "Bind executor is gone, dropping event");
    }
}
