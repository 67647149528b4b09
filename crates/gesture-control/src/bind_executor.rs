//! Turns detection events into key presses according to the saved binds.
//!
//! Hold binds press the key for the bind's duration and release it; a
//! repeat of the same gesture while its hold is running is ignored. Toggle
//! binds flip the key between pressed and released. Held and toggled keys
//! are released when the session ends or the executor stops.

use crate::{AppError, AppResult, KeyHoldGuard, KeyInjector, parse_key};

use gesture_control_core::{BindMode, BindStore, DetectionEvent};

use std::{
    collections::{BTreeMap, HashSet},
    mem,
    panic::Location,
    sync::{Arc, Mutex, MutexGuard},
    time::Duration,
};

use enigo::Key;
use error_location::ErrorLocation;
use tokio::{
    sync::{mpsc, watch},
    task::JoinSet,
};
use tracing::{debug, error, info, instrument, warn};

/// Consumes [`DetectionEvent`]s and drives a [`KeyInjector`].
pub struct BindExecutor {
    binds: Arc<BindStore>,
    injector: Arc<dyn KeyInjector>,
    holds: JoinSet<()>,
    holding: Arc<Mutex<HashSet<String>>>,
    /// Bumped to cut every in-flight hold short.
    hold_release: watch::Sender<u64>,
    toggled: BTreeMap<String, Key>,
}

impl BindExecutor {
    /// Create an executor reading binds from `binds`.
    pub fn new(binds: Arc<BindStore>, injector: Arc<dyn KeyInjector>) -> Self {
        let (hold_release, _) = watch::channel(0);

        Self {
            binds,
            injector,
            holds: JoinSet::new(),
            holding: Arc::new(Mutex::new(HashSet::new())),
            hold_release,
            toggled: BTreeMap::new(),
        }
    }

    /// Process events until the channel closes, then release every key.
    #[instrument(skip_all)]
    pub async fn run(mut self, mut events: mpsc::Receiver<DetectionEvent>) {
        info!("Bind executor started");

        loop {
            tokio::select! {
                event = events.recv() => match event {
                    Some(event) => self.handle(event).await,
                    None => break,
                },
                Some(joined) = self.holds.join_next(), if !self.holds.is_empty() => {
                    if let Err(e) = joined {
                        error!(error = ?e, "Key hold task panicked");
                    }
                }
            }
        }

        self.cut_holds();
        self.release_toggled().await;

        while let Some(joined) = self.holds.join_next().await {
            if let Err(e) = joined {
                error!(error = ?e, "Key hold task panicked");
            }
        }

        info!("Bind executor stopped");
    }

    async fn handle(&mut self, event: DetectionEvent) {
        match event {
            DetectionEvent::GestureDetected {
                session_id,
                gesture,
            } => {
                debug!(session_id = %session_id, gesture = %gesture, "Gesture detected");
                self.on_gesture(&gesture).await;
            }
            DetectionEvent::SessionEnded { session_id } => {
                info!(session_id = %session_id, "Session ended, releasing keys");
                self.cut_holds();
                self.release_toggled().await;
            }
        }
    }

    async fn on_gesture(&mut self, gesture: &str) {
        let Some(bind) = self.binds.get(gesture) else {
            debug!(gesture = %gesture, "No bind for gesture");
            return;
        };

        let Some(key) = parse_key(&bind.key) else {
            warn!(gesture = %gesture, key = %bind.key, "Bind names an unknown key, skipping");
            return;
        };

        match bind.mode {
            BindMode::Hold => {
                self.start_hold(gesture, key, Duration::from_millis(bind.hold_duration_ms))
            }
            BindMode::Toggle => self.toggle(&bind.key, key).await,
        }
    }

    fn start_hold(&mut self, gesture: &str, key: Key, duration: Duration) {
        if !lock(&self.holding).insert(gesture.to_string()) {
            debug!(gesture = %gesture, "Hold already in flight, ignoring repeat");
            return;
        }

        let injector = Arc::clone(&self.injector);
        let holding = Arc::clone(&self.holding);
        let mut cut = self.hold_release.subscribe();
        let gesture = gesture.to_string();

        self.holds.spawn(async move {
            match tokio::task::spawn_blocking(move || KeyHoldGuard::press(injector, key)).await {
                Ok(Ok(guard)) => {
                    tokio::select! {
                        _ = tokio::time::sleep(duration) => {
                            debug!(gesture = %gesture, key = ?key, "Hold completed");
                        }
                        _ = cut.changed() => {
                            debug!(gesture = %gesture, key = ?key, "Hold cut short");
                        }
                    }

                    if let Err(e) = tokio::task::spawn_blocking(move || drop(guard)).await {
                        error!(gesture = %gesture, error = ?e, "Key release task panicked");
                    }
                }
                Ok(Err(e)) => warn!(gesture = %gesture, error = ?e, "Hold failed"),
                Err(e) => error!(gesture = %gesture, error = ?e, "Hold task panicked"),
            }

            lock(&holding).remove(&gesture);
        });
    }

    /// Release every held key now instead of at the end of its hold.
    fn cut_holds(&self) {
        if !self.holds.is_empty() {
            debug!(holds = self.holds.len(), "Cutting holds short");
        }
        self.hold_release.send_modify(|generation| *generation += 1);
    }

    async fn toggle(&mut self, key_name: &str, key: Key) {
        let name = key_name.trim().to_ascii_lowercase();
        let pressed = self.toggled.contains_key(&name);
        let injector = Arc::clone(&self.injector);

        let result = inject(move || {
            if pressed {
                injector.release(key)
            } else {
                injector.press(key)
            }
        })
        .await;

        match result {
            Ok(()) if pressed => {
                self.toggled.remove(&name);
                debug!(key = %name, "Toggle released");
            }
            Ok(()) => {
                self.toggled.insert(name.clone(), key);
                debug!(key = %name, "Toggle pressed");
            }
            Err(e) => warn!(key = %name, error = ?e, "Toggle failed"),
        }
    }

    async fn release_toggled(&mut self) {
        for (name, key) in mem::take(&mut self.toggled) {
            let injector = Arc::clone(&self.injector);
            if let Err(e) = inject(move || injector.release(key)).await {
                warn!(key = %name, error = ?e, "Failed to release toggled key");
            }
        }
    }
}

async fn inject<F>(f: F) -> AppResult<()>
where
    F: FnOnce() -> AppResult<()> + Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| AppError::KeyInjectionFailed {
            reason: format!("Injection task panicked: {}", e),
            location: ErrorLocation::from(Location::caller()),
        })?
}

fn lock(holding: &Mutex<HashSet<String>>) -> MutexGuard<'_, HashSet<String>> {
    holding.lock().unwrap_or_else(|e| {
        error!("Hold registry lock poisoned, recovering: {}", e);
        e.into_inner()
    })
}
