use std::path::PathBuf;
use std::sync::Arc;

use slotbook::engine::Engine;
use slotbook::model::{BookingRequest, BookingStatus, CreateOutcome, Event, SlotKey, SlotPatch};
use slotbook::notify::NotifyHub;

// ── Test infrastructure ──────────────────────────────────────

fn wal_path(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("slotbook_int_test_{}", std::process::id()));
    std::fs::create_dir_all(&dir).unwrap();
    let path = dir.join(name);
    let _ = std::fs::remove_file(&path);
    path
}

fn open(name: &str) -> (Arc<NotifyHub>, Engine) {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
    let notify = Arc::new(NotifyHub::new());
    let engine = Engine::open(wal_path(name), notify.clone()).unwrap();
    (notify, engine)
}

fn request(email: &str, slot_id: u32) -> BookingRequest {
    BookingRequest {
        name: email.split('@').next().unwrap().to_string(),
        email: email.to_string(),
        phone: "0700000000".into(),
        service: Some("Standard appointment".into()),
        slot_id,
        date: "2026-08-10".into(),
        notes: None,
        source: Some("integration".into()),
        priority: None,
        phone_verified: None,
    }
}

// ── End-to-end lifecycle with notifications ──────────────────

#[tokio::test]
async fn lifecycle_events_reach_subscribers() {
    let (notify, engine) = open("lifecycle.wal");
    engine.seed_defaults().await.unwrap();
    engine
        .update_slot(1, SlotPatch { capacity: Some(1), ..Default::default() })
        .await
        .unwrap();

    let key = SlotKey::new("2026-08-10", 1);
    let mut rx = notify.subscribe(key.clone());

    // Admission lands as BookingCreated.
    let booking = match engine.create_booking(request("ada@example.com", 1)).await.unwrap() {
        CreateOutcome::Booked(b) => b,
        CreateOutcome::Waitlisted(_) => panic!("slot has a free place"),
    };
    match rx.recv().await.unwrap() {
        Event::BookingCreated { booking: b } => assert_eq!(b.id, booking.id),
        other => panic!("expected BookingCreated, got {other:?}"),
    }

    // The slot is now full: the next request joins the waitlist.
    let entry = match engine.create_booking(request("bob@example.com", 1)).await.unwrap() {
        CreateOutcome::Waitlisted(e) => e,
        CreateOutcome::Booked(_) => panic!("slot should be full"),
    };
    match rx.recv().await.unwrap() {
        Event::WaitlistJoined { entry: e } => assert_eq!(e.id, entry.id),
        other => panic!("expected WaitlistJoined, got {other:?}"),
    }

    // Approval and cancellation each broadcast the transition.
    engine.approve_booking(booking.id).await.unwrap();
    match rx.recv().await.unwrap() {
        Event::BookingTransitioned { id, status, .. } => {
            assert_eq!(id, booking.id);
            assert_eq!(status, BookingStatus::Confirmed);
        }
        other => panic!("expected BookingTransitioned, got {other:?}"),
    }

    let outcome = engine.cancel_booking(booking.id, "customer request").await.unwrap();
    assert_eq!(outcome.promotion_candidate.as_ref().map(|e| e.id), Some(entry.id));
    match rx.recv().await.unwrap() {
        Event::BookingTransitioned { status, .. } => assert_eq!(status, BookingStatus::Cancelled),
        other => panic!("expected BookingTransitioned, got {other:?}"),
    }

    // Explicit promotion converts the entry: WaitlistLeft, then
    // BookingCreated for the new pending booking.
    let promoted = engine.promote_from_waitlist(entry.id).await.unwrap();
    assert_eq!(promoted.status, BookingStatus::Pending);
    match rx.recv().await.unwrap() {
        Event::WaitlistLeft { id, .. } => assert_eq!(id, entry.id),
        other => panic!("expected WaitlistLeft, got {other:?}"),
    }
    match rx.recv().await.unwrap() {
        Event::BookingCreated { booking: b } => assert_eq!(b.email, "bob@example.com"),
        other => panic!("expected BookingCreated, got {other:?}"),
    }
}

// ── Restart persistence through the public API ───────────────

#[tokio::test]
async fn state_survives_restart() {
    let path = wal_path("restart.wal");
    {
        let engine = Engine::open(path.clone(), Arc::new(NotifyHub::new())).unwrap();
        engine.seed_defaults().await.unwrap();

        let booking = engine
            .create_booking(request("ada@example.com", 2))
            .await
            .unwrap()
            .booking()
            .unwrap()
            .clone();
        engine.approve_booking(booking.id).await.unwrap();
        engine.update_template("booking_accepted", "See you, {{name}}!").await.unwrap();
        // Drop the engine; only the WAL file remains.
    }

    let engine = Engine::open(path, Arc::new(NotifyHub::new())).unwrap();

    let bookings = engine.list_bookings().await;
    assert_eq!(bookings.len(), 1);
    assert_eq!(bookings[0].status, BookingStatus::Confirmed);
    assert_eq!(bookings[0].history.len(), 2);

    let status = engine.slot_status(2, "2026-08-10").await.unwrap();
    assert_eq!(status.occupied, 1);

    // Peripheral state came back too: audit trail and templates.
    let actions: Vec<String> = engine.audit_logs().await.into_iter().map(|r| r.action).collect();
    assert!(actions.contains(&"BOOKING_CREATE".to_string()));
    assert!(actions.contains(&"BOOKING_UPDATE".to_string()));

    let message = engine
        .render_template("booking_accepted", &[("name", bookings[0].name.as_str())])
        .await
        .unwrap();
    assert_eq!(message, "See you, ada!");
}

// ── Customer messaging off live booking data ─────────────────

#[tokio::test]
async fn rejection_message_renders_from_booking() {
    let (_notify, engine) = open("messaging.wal");
    engine.seed_defaults().await.unwrap();

    let booking = engine
        .create_booking(request("ada@example.com", 1))
        .await
        .unwrap()
        .booking()
        .unwrap()
        .clone();
    let outcome = engine.reject_booking(booking.id, "fully booked this week").await.unwrap();

    let message = engine
        .render_template(
            "booking_rejected",
            &[
                ("name", outcome.booking.name.as_str()),
                ("date", outcome.booking.date.as_str()),
                ("reason", outcome.booking.rejection_reason.as_deref().unwrap()),
            ],
        )
        .await
        .unwrap();

    assert!(message.contains("ada"));
    assert!(message.contains("2026-08-10"));
    assert!(message.contains("Reason: fully booked this week"));
}
