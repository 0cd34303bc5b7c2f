//! Integration tests driving the controller against an in-process mock of
//! the desk backend.
//!
//! The mock simulates the device: a desk advances toward its target by a
//! fixed step each time its status is read, so the controller's poll loop
//! observes realistic movement.

use axum::{
    extract::{Form, Path, State},
    http::{HeaderMap, StatusCode},
    routing::{get, post},
    Json, Router,
};
use crossbeam_channel::Receiver;
use ergodesk_agent::{
    backend::{BackendClient, BackendConfig},
    config::Config,
    controller::DeskController,
    core::RecommendationState,
    events::{self, StatusBanner, StatusLevel, UiEvent, OVERLAY_MOVING, OVERLAY_SENDING},
};
use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

const CSRF: &str = "test-csrf";

#[derive(Debug, Clone, Copy)]
struct MockDesk {
    height: i64,
    target: i64,
    step: i64,
    moving: bool,
    paired: bool,
    /// Motor never advances and reports not-moving (stall scenario)
    motor_fault: bool,
    /// Move commands are refused with a logical failure
    locked: bool,
    occupied_by: Option<&'static str>,
}

impl Default for MockDesk {
    fn default() -> Self {
        Self {
            height: 70,
            target: 70,
            step: 15,
            moving: false,
            paired: false,
            motor_fault: false,
            locked: false,
            occupied_by: None,
        }
    }
}

#[derive(Clone)]
struct MockBackend {
    desks: Arc<Mutex<HashMap<String, MockDesk>>>,
}

async fn user_status(
    State(state): State<MockBackend>,
    Path(desk_id): Path<String>,
) -> Json<Value> {
    let mut desks = state.desks.lock().unwrap();
    let Some(desk) = desks.get_mut(&desk_id) else {
        return Json(json!({ "is_paired": false }));
    };

    // one motor step per status read
    if desk.moving && !desk.motor_fault {
        let delta = (desk.target - desk.height).clamp(-desk.step, desk.step);
        desk.height += delta;
        if desk.height == desk.target {
            desk.moving = false;
        }
    }

    if !desk.paired {
        return Json(json!({ "is_paired": false }));
    }
    Json(json!({
        "is_paired": true,
        "current_height": desk.height,
        "is_moving": desk.moving && !desk.motor_fault,
    }))
}

fn check_csrf(headers: &HeaderMap) -> Result<(), (StatusCode, String)> {
    match headers.get("X-CSRFToken") {
        Some(token) if token == CSRF => Ok(()),
        _ => Err((
            StatusCode::FORBIDDEN,
            "CSRF verification failed".to_string(),
        )),
    }
}

#[derive(Deserialize)]
struct PairForm {
    desk_id: String,
}

async fn pair_desk(
    State(state): State<MockBackend>,
    headers: HeaderMap,
    Form(form): Form<PairForm>,
) -> Result<Json<Value>, (StatusCode, String)> {
    check_csrf(&headers)?;
    let mut desks = state.desks.lock().unwrap();
    let Some(desk) = desks.get_mut(&form.desk_id) else {
        return Ok(Json(
            json!({ "success": false, "message": "No desk selected" }),
        ));
    };
    if let Some(occupant) = desk.occupied_by {
        return Ok(Json(json!({
            "success": false,
            "message": format!("Desk already occupied by {occupant}"),
        })));
    }
    desk.paired = true;
    Ok(Json(json!({
        "success": true,
        "message": format!("Paired with desk {}", form.desk_id),
    })))
}

async fn unpair_desk(
    State(state): State<MockBackend>,
    headers: HeaderMap,
) -> Result<Json<Value>, (StatusCode, String)> {
    check_csrf(&headers)?;
    let mut desks = state.desks.lock().unwrap();
    let mut any = false;
    for desk in desks.values_mut() {
        if desk.paired {
            desk.paired = false;
            any = true;
        }
    }
    if any {
        Ok(Json(
            json!({ "success": true, "message": "Unpaired from desk" }),
        ))
    } else {
        Ok(Json(
            json!({ "success": false, "message": "No active desk to unpair" }),
        ))
    }
}

#[derive(Deserialize)]
struct MoveForm {
    desk_id: String,
    height: i64,
}

async fn set_desk_height(
    State(state): State<MockBackend>,
    headers: HeaderMap,
    Form(form): Form<MoveForm>,
) -> Result<Json<Value>, (StatusCode, String)> {
    check_csrf(&headers)?;
    let mut desks = state.desks.lock().unwrap();
    let Some(desk) = desks.get_mut(&form.desk_id) else {
        return Ok(Json(json!({ "success": false, "message": "Unknown desk" })));
    };
    if desk.locked {
        return Ok(Json(json!({ "success": false, "message": "Desk is locked" })));
    }
    if !desk.paired {
        return Ok(Json(json!({
            "success": false,
            "message": "Not paired with this desk",
        })));
    }
    desk.target = form.height;
    desk.moving = true;
    Ok(Json(
        json!({ "success": true, "message": "Command accepted" }),
    ))
}

async fn load_view(Path(view): Path<String>) -> String {
    format!("<div class=\"room-wrapper\" id=\"room-1\" data-view=\"{view}\"></div>")
}

async fn desks_status(State(state): State<MockBackend>) -> Json<Value> {
    let desks = state.desks.lock().unwrap();
    let mut map = serde_json::Map::new();
    for (desk_id, desk) in desks.iter() {
        if let Some(occupant) = desk.occupied_by {
            map.insert(desk_id.clone(), json!({ "user": occupant }));
        }
    }
    Json(Value::Object(map))
}

async fn spawn_backend(desks: HashMap<String, MockDesk>) -> SocketAddr {
    let state = MockBackend {
        desks: Arc::new(Mutex::new(desks)),
    };
    let app = Router::new()
        .route("/api/user-status/:desk_id/", get(user_status))
        .route("/pair_desk/", post(pair_desk))
        .route("/unpair_desk/", post(unpair_desk))
        .route("/api/set_desk_height/", post(set_desk_height))
        .route("/api/desks_status/", get(desks_status))
        .route("/load_view/:view/", get(load_view))
        .with_state(state);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind mock backend");
    let addr = listener.local_addr().expect("Failed to read local addr");
    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("Mock backend died");
    });
    addr
}

fn test_controller(
    addr: SocketAddr,
    tweak: impl FnOnce(&mut Config),
) -> (DeskController, Receiver<UiEvent>) {
    let mut config = Config {
        backend_url: format!("http://{addr}"),
        csrf_token: CSRF.to_string(),
        ..Config::default()
    };
    tweak(&mut config);

    let (tx, rx) = events::channel();
    let backend = BackendClient::new(BackendConfig::new(&config.backend_url, &config.csrf_token));
    (DeskController::new(backend, &config, tx), rx)
}

/// Collect events until one matches the predicate, or time runs out.
/// Returns everything collected (match included, last).
async fn wait_for(
    rx: &Receiver<UiEvent>,
    timeout: Duration,
    matches: impl Fn(&UiEvent) -> bool,
) -> Vec<UiEvent> {
    let deadline = tokio::time::Instant::now() + timeout;
    let mut collected = Vec::new();
    loop {
        for event in rx.try_iter() {
            let hit = matches(&event);
            collected.push(event);
            if hit {
                return collected;
            }
        }
        if tokio::time::Instant::now() >= deadline {
            return collected;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
}

fn last_banner(events: &[UiEvent]) -> Option<&StatusBanner> {
    events.iter().rev().find_map(|e| match e {
        UiEvent::Status(banner) => Some(banner),
        _ => None,
    })
}

#[tokio::test]
async fn test_pair_and_move_reaches_target() {
    let addr = spawn_backend(HashMap::from([(
        "desk-1".to_string(),
        MockDesk::default(),
    )]))
    .await;
    let (controller, rx) = test_controller(addr, |_| {});

    controller.select_desk("desk-1").await;
    controller.pair().await;

    let events = wait_for(&rx, Duration::from_secs(2), |e| {
        matches!(e, UiEvent::Status(_))
    })
    .await;
    let banner = last_banner(&events).expect("pair should produce a banner");
    assert_eq!(banner.level, StatusLevel::Success);
    assert_eq!(banner.message, "Paired with desk desk-1");
    assert!(controller.is_paired("desk-1").await);

    // user drags to 100 and confirms; the mock advances 15cm per poll
    controller.height_changed(100).await;
    assert!(controller.pending_move().await.is_some());
    controller.confirm_move().await;

    let events = wait_for(&rx, Duration::from_secs(10), |e| {
        matches!(e, UiEvent::Status(_))
    })
    .await;
    let banner = last_banner(&events).expect("move should produce a banner");
    assert_eq!(banner.level, StatusLevel::Success);
    assert_eq!(banner.message, "Desk reached 100cm");
    assert!(events.iter().any(|e| matches!(
        e,
        UiEvent::OverlayShown {
            text: OVERLAY_SENDING
        }
    )));
    assert!(events.iter().any(|e| matches!(
        e,
        UiEvent::OverlayShown {
            text: OVERLAY_MOVING
        }
    )));

    // the display syncs to the reported final height
    let events = wait_for(&rx, Duration::from_secs(2), |e| {
        matches!(e, UiEvent::HeightSynced { .. })
    })
    .await;
    assert!(events
        .iter()
        .any(|e| matches!(e, UiEvent::HeightSynced { height_cm: 100 })));
    assert_eq!(controller.displayed_height().await, Some(100));
}

#[tokio::test]
async fn test_stall_detected_after_grace_polls() {
    let addr = spawn_backend(HashMap::from([(
        "desk-2".to_string(),
        MockDesk {
            paired: true,
            motor_fault: true,
            ..MockDesk::default()
        },
    )]))
    .await;
    let (controller, rx) = test_controller(addr, |_| {});

    controller.select_desk("desk-2").await;
    controller.height_changed(100).await;
    controller.confirm_move().await;

    // "not moving" is reported from the first poll, but the stall verdict
    // must wait out the two-poll startup grace
    let events = wait_for(&rx, Duration::from_secs(10), |e| {
        matches!(e, UiEvent::Status(_))
    })
    .await;
    let banner = last_banner(&events).expect("stall should produce a banner");
    assert_eq!(banner.level, StatusLevel::Warning);
    assert_eq!(banner.message, "Desk stopped at 70cm");
    assert_eq!(controller.displayed_height().await, Some(70));
}

#[tokio::test]
async fn test_rejected_command_surfaces_backend_message() {
    let addr = spawn_backend(HashMap::from([(
        "desk-3".to_string(),
        MockDesk {
            paired: true,
            locked: true,
            ..MockDesk::default()
        },
    )]))
    .await;
    let (controller, rx) = test_controller(addr, |_| {});

    controller.select_desk("desk-3").await;
    controller.height_changed(90).await;
    controller.confirm_move().await;

    let events = wait_for(&rx, Duration::from_secs(5), |e| {
        matches!(e, UiEvent::Status(_))
    })
    .await;
    let banner = last_banner(&events).expect("rejection should produce a banner");
    assert_eq!(banner.level, StatusLevel::Error);
    assert_eq!(banner.message, "Desk is locked");
    // the rejection short-circuits before polling starts
    assert!(!events.iter().any(|e| matches!(
        e,
        UiEvent::OverlayShown {
            text: OVERLAY_MOVING
        }
    )));
}

#[tokio::test]
async fn test_pairing_occupied_desk_fails_verbatim() {
    let addr = spawn_backend(HashMap::from([(
        "desk-4".to_string(),
        MockDesk {
            occupied_by: Some("bob"),
            ..MockDesk::default()
        },
    )]))
    .await;
    let (controller, rx) = test_controller(addr, |_| {});

    controller.select_desk("desk-4").await;
    controller.pair().await;

    let events = wait_for(&rx, Duration::from_secs(2), |e| {
        matches!(e, UiEvent::Status(_))
    })
    .await;
    let banner = last_banner(&events).expect("failed pair should produce a banner");
    assert_eq!(banner.level, StatusLevel::Error);
    assert_eq!(banner.message, "Desk already occupied by bob");
    assert!(!controller.is_paired("desk-4").await);
}

#[tokio::test]
async fn test_unpair_round_trip() {
    let addr = spawn_backend(HashMap::from([(
        "desk-5".to_string(),
        MockDesk::default(),
    )]))
    .await;
    let (controller, rx) = test_controller(addr, |_| {});

    controller.select_desk("desk-5").await;
    controller.pair().await;
    assert!(controller.is_paired("desk-5").await);

    controller.unpair().await;
    assert!(!controller.is_paired("desk-5").await);

    let events = wait_for(&rx, Duration::from_secs(2), |e| {
        matches!(e, UiEvent::PairingChanged { paired: false, .. })
    })
    .await;
    assert!(events
        .iter()
        .any(|e| matches!(e, UiEvent::PairingChanged { paired: false, .. })));
}

#[tokio::test]
async fn test_network_failure_is_nonfatal() {
    // nothing listens here; every call fails at the transport
    let (controller, rx) = test_controller("127.0.0.1:9".parse().unwrap(), |_| {});

    controller.select_desk("desk-1").await;
    controller.pair().await;

    let events = wait_for(&rx, Duration::from_secs(15), |e| {
        matches!(e, UiEvent::Status(_))
    })
    .await;
    let banner = last_banner(&events).expect("transport failure should produce a banner");
    assert_eq!(banner.level, StatusLevel::Error);
    assert_eq!(banner.message, "Pair request failed.");
}

#[tokio::test]
async fn test_sitting_reminder_fires_and_routes_to_standing() {
    let addr = spawn_backend(HashMap::from([(
        "desk-6".to_string(),
        MockDesk {
            paired: true,
            height: 71,
            target: 71,
            ..MockDesk::default()
        },
    )]))
    .await;
    let (controller, rx) = test_controller(addr, |config| {
        config.sitting_alert_secs = 2;
    });

    controller.select_desk("desk-6").await;
    controller.start_sitting_ticker().await;

    // good sitting height arms the timer; the paired desk also gets a move
    // request, which we discard
    controller.height_changed(71).await;
    controller.cancel_move().await;
    let popup = controller.current_popup().await.expect("popup should show");
    assert_eq!(popup.state, RecommendationState::GoodSitting);

    let events = wait_for(&rx, Duration::from_secs(6), |e| {
        matches!(
            e,
            UiEvent::PopupShown(rec) if rec.state == RecommendationState::SittingReminder
        )
    })
    .await;
    assert!(
        events.iter().any(|e| matches!(
            e,
            UiEvent::PopupShown(rec) if rec.state == RecommendationState::SittingReminder
        )),
        "reminder should fire after the configured threshold"
    );

    // "Stand up" routes through the accept handler to the standing target
    controller.accept_popup().await;
    let pending = controller
        .pending_move()
        .await
        .expect("stand up should request a move");
    assert_eq!(
        pending.target_height_cm,
        controller.targets().standing_height_cm
    );

    controller.shutdown().await;
}

#[tokio::test]
async fn test_bulk_desk_status() {
    let addr = spawn_backend(HashMap::from([
        (
            "desk-7".to_string(),
            MockDesk {
                occupied_by: Some("alice"),
                ..MockDesk::default()
            },
        ),
        ("desk-8".to_string(), MockDesk::default()),
    ]))
    .await;

    let client = BackendClient::new(BackendConfig::new(format!("http://{addr}"), CSRF));
    let map = client.desks_status().await.expect("bulk status");
    assert_eq!(map.len(), 1);
    assert_eq!(map["desk-7"].user, "alice");
}

#[tokio::test]
async fn test_load_view_returns_fragment() {
    let addr = spawn_backend(HashMap::new()).await;
    let client = BackendClient::new(BackendConfig::new(format!("http://{addr}"), CSRF));

    let html = client
        .load_view("desks", Some("1"))
        .await
        .expect("view fragment");
    assert!(html.contains("room-wrapper"));
    assert!(html.contains("data-view=\"desks\""));
}

#[tokio::test]
async fn test_new_move_supersedes_polling_loop() {
    // slow desk so the first move is still polling when the second arrives
    let addr = spawn_backend(HashMap::from([(
        "desk-9".to_string(),
        MockDesk {
            paired: true,
            height: 70,
            step: 2,
            ..MockDesk::default()
        },
    )]))
    .await;
    let (controller, rx) = test_controller(addr, |_| {});

    controller.select_desk("desk-9").await;
    controller.height_changed(120).await;
    controller.confirm_move().await;

    // let the first loop get a couple of polls in, then supersede it with
    // a target the desk is about to reach
    tokio::time::sleep(Duration::from_millis(2500)).await;
    controller.height_changed(80).await;
    controller.confirm_move().await;

    let events = wait_for(&rx, Duration::from_secs(15), |e| {
        matches!(e, UiEvent::Status(s) if s.level == StatusLevel::Success)
    })
    .await;
    let banner = last_banner(&events).expect("second move should complete");
    assert_eq!(banner.message, "Desk reached 80cm");

    // the retired first loop must stay silent; no further banners may land
    tokio::time::sleep(Duration::from_secs(3)).await;
    let extra: Vec<UiEvent> = rx.try_iter().collect();
    assert!(
        !extra.iter().any(|e| matches!(e, UiEvent::Status(_))),
        "superseded poll loop produced a banner: {extra:?}"
    );

    controller.shutdown().await;
}
