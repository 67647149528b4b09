use crate::{
    BindExecutor, KeyHoldGuard, KeyInjector,
    tests::fakes::{KeyEvent, RecordingInjector, wait_until},
};

use gesture_control_core::{BindMode, BindStore, DetectionEvent};

use std::{sync::Arc, time::Duration};

use enigo::Key;
use tempfile::TempDir;
use tokio::sync::mpsc;
use uuid::Uuid;

#[allow(clippy::unwrap_used)]
fn binds_in(dir: &TempDir) -> Arc<BindStore> {
    let store = BindStore::open(dir.path().join("binds.toml")).unwrap();
    store.save("A", "F1", 40, BindMode::Hold, true).unwrap();
    store.save("L", "space", 0, BindMode::Toggle, true).unwrap();
    store.save("Q", "hyper", 10, BindMode::Hold, true).unwrap();
    store.save("H", "F2", 60_000, BindMode::Hold, true).unwrap();
    Arc::new(store)
}

fn detected(session_id: Uuid, gesture: &str) -> DetectionEvent {
    DetectionEvent::GestureDetected {
        session_id,
        gesture: gesture.to_string(),
    }
}

/// Feed `events` to a fresh executor and wait for it to finish.
#[allow(clippy::unwrap_used)]
async fn run_executor(
    binds: Arc<BindStore>,
    injector: Arc<RecordingInjector>,
    events: Vec<DetectionEvent>,
) {
    let (tx, rx) = mpsc::channel(16);
    let executor = tokio::spawn(BindExecutor::new(binds, injector).run(rx));

    for event in events {
        tx.send(event).await.unwrap();
    }
    drop(tx);

    executor.await.unwrap();
}

/// WHAT: A hold bind presses and releases its key once per hold
/// WHY: Repeats during an in-flight hold must not stack presses
#[tokio::test]
#[allow(clippy::unwrap_used)]
async fn given_hold_bind_when_detected_twice_quickly_then_one_press_release() {
    // Given
    let dir = TempDir::new().unwrap();
    let injector = Arc::new(RecordingInjector::default());
    let session_id = Uuid::new_v4();

    // When: A is detected twice back to back
    run_executor(
        binds_in(&dir),
        Arc::clone(&injector),
        vec![detected(session_id, "A"), detected(session_id, "A")],
    )
    .await;

    // Then: One full press/release of F1
    assert_eq!(
        injector.events(),
        vec![KeyEvent::Press(Key::F1), KeyEvent::Release(Key::F1)]
    );
}

/// WHAT: A toggle bind flips its key each time and session end releases it
/// WHY: A toggled key must never stay down after detection stops
#[tokio::test]
#[allow(clippy::unwrap_used)]
async fn given_toggle_bind_when_detected_then_key_flips_and_session_end_releases() {
    // Given
    let dir = TempDir::new().unwrap();
    let injector = Arc::new(RecordingInjector::default());
    let session_id = Uuid::new_v4();

    // When: L, L, L, then the session ends
    run_executor(
        binds_in(&dir),
        Arc::clone(&injector),
        vec![
            detected(session_id, "L"),
            detected(session_id, "L"),
            detected(session_id, "L"),
            DetectionEvent::SessionEnded { session_id },
        ],
    )
    .await;

    // Then: press, release, press, release
    assert_eq!(
        injector.events(),
        vec![
            KeyEvent::Press(Key::Space),
            KeyEvent::Release(Key::Space),
            KeyEvent::Press(Key::Space),
            KeyEvent::Release(Key::Space),
        ]
    );
}

/// WHAT: Stopping the executor releases keys left toggled
/// WHY: Shutdown must leave the keyboard clean
#[tokio::test]
#[allow(clippy::unwrap_used)]
async fn given_toggled_key_when_executor_stops_then_key_released() {
    // Given
    let dir = TempDir::new().unwrap();
    let injector = Arc::new(RecordingInjector::default());

    // When: L once, then the channel closes
    run_executor(
        binds_in(&dir),
        Arc::clone(&injector),
        vec![detected(Uuid::new_v4(), "L")],
    )
    .await;

    // Then
    assert_eq!(
        injector.events(),
        vec![KeyEvent::Press(Key::Space), KeyEvent::Release(Key::Space)]
    );
}

/// WHAT: Unbound gestures and unknown key names inject nothing
/// WHY: Missing or bad binds must be skipped, not crash the executor
#[tokio::test]
#[allow(clippy::unwrap_used)]
async fn given_unbound_or_unknown_key_when_detected_then_nothing_injected() {
    // Given
    let dir = TempDir::new().unwrap();
    let injector = Arc::new(RecordingInjector::default());
    let session_id = Uuid::new_v4();

    // When
    run_executor(
        binds_in(&dir),
        Arc::clone(&injector),
        vec![detected(session_id, "Z"), detected(session_id, "Q")],
    )
    .await;

    // Then
    assert!(injector.events().is_empty());
}

/// WHAT: A failed press leaves no key to release and the executor keeps going
/// WHY: Injection failures are logged, not fatal
#[tokio::test]
#[allow(clippy::unwrap_used)]
async fn given_failing_injector_when_detected_then_no_events_and_executor_finishes() {
    // Given
    let dir = TempDir::new().unwrap();
    let injector = Arc::new(RecordingInjector::failing());
    let session_id = Uuid::new_v4();

    // When
    run_executor(
        binds_in(&dir),
        Arc::clone(&injector),
        vec![detected(session_id, "A"), detected(session_id, "L")],
    )
    .await;

    // Then: Nothing was pressed, so nothing was released
    assert!(injector.events().is_empty());
}

/// WHAT: KeyHoldGuard releases its key on drop
/// WHY: RAII release is what prevents stuck keys
#[test]
#[allow(clippy::unwrap_used)]
fn given_hold_guard_when_dropped_then_key_released() {
    // Given
    let injector = Arc::new(RecordingInjector::default());

    // When
    {
        let _guard = KeyHoldGuard::press(
            Arc::clone(&injector) as Arc<dyn KeyInjector>,
            Key::Shift,
        )
        .unwrap();
    }

    // Then
    assert_eq!(
        injector.events(),
        vec![KeyEvent::Press(Key::Shift), KeyEvent::Release(Key::Shift)]
    );
}

/// WHAT: A failed press produces no guard and no release
/// WHY: Releasing a key that was never pressed would confuse the OS key state
#[test]
fn given_failing_press_when_guarding_then_error_and_no_release() {
    // Given
    let injector = Arc::new(RecordingInjector::failing());

    // When
    let result = KeyHoldGuard::press(
        Arc::clone(&injector) as Arc<dyn KeyInjector>,
        Key::Shift,
    );

    // Then
    assert!(result.is_err());
    assert!(injector.events().is_empty());
}

/// WHAT: Session end releases a key in the middle of a long hold
/// WHY: Stopping detection must not leave a key held for the rest of the hold
#[tokio::test]
#[allow(clippy::unwrap_used)]
async fn given_long_hold_when_session_ends_then_key_released_early() {
    // Given: A running executor holding F2 for a minute
    let dir = TempDir::new().unwrap();
    let injector = Arc::new(RecordingInjector::default());
    let session_id = Uuid::new_v4();
    let (tx, rx) = mpsc::channel(16);
    let executor =
        tokio::spawn(BindExecutor::new(binds_in(&dir), Arc::clone(&injector) as Arc<dyn KeyInjector>).run(rx));
    tx.send(detected(session_id, "H")).await.unwrap();
    let pressed = {
        let injector = Arc::clone(&injector);
        wait_until(Duration::from_secs(2), move || !injector.events().is_empty()).await
    };

    // When: The session ends while the executor keeps running
    tx.send(DetectionEvent::SessionEnded { session_id })
        .await
        .unwrap();
    let released = {
        let injector = Arc::clone(&injector);
        wait_until(Duration::from_secs(2), move || injector.events().len() == 2).await
    };

    // Then
    assert!(pressed);
    assert!(released);
    assert_eq!(
        injector.events(),
        vec![KeyEvent::Press(Key::F2), KeyEvent::Release(Key::F2)]
    );

    drop(tx);
    tokio::time::timeout(Duration::from_secs(2), executor)
        .await
        .unwrap()
        .unwrap();
}

/// WHAT: Stopping the executor mid-hold releases the key and returns promptly
/// WHY: Shutdown must not wait out a long hold or leave the key down
#[tokio::test]
#[allow(clippy::unwrap_used)]
async fn given_long_hold_when_executor_stops_then_released_and_stops_promptly() {
    // Given: F2 held for a minute
    let dir = TempDir::new().unwrap();
    let injector = Arc::new(RecordingInjector::default());
    let (tx, rx) = mpsc::channel(16);
    let executor =
        tokio::spawn(BindExecutor::new(binds_in(&dir), Arc::clone(&injector) as Arc<dyn KeyInjector>).run(rx));
    tx.send(detected(Uuid::new_v4(), "H")).await.unwrap();
    let pressed = {
        let injector = Arc::clone(&injector);
        wait_until(Duration::from_secs(2), move || !injector.events().is_empty()).await
    };

    // When: The event channel closes, as on shutdown
    drop(tx);
    let stopped = tokio::time::timeout(Duration::from_secs(3), executor).await;

    // Then
    assert!(pressed);
    assert!(matches!(stopped, Ok(Ok(()))));
    assert_eq!(
        injector.events(),
        vec![KeyEvent::Press(Key::F2), KeyEvent::Release(Key::F2)]
    );
}
