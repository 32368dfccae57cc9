use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use async_trait::async_trait;

use roomkeeper::api::RoomApi;
use roomkeeper::booking::{self, BookingError, BookingPolicy};
use roomkeeper::clock::{self, HOUR, MINUTE};
use roomkeeper::model::*;
use roomkeeper::service::BookingService;
use roomkeeper::session::{Role, Session, SessionContext};

const ROOMS: usize = 50;
const BOOKINGS_PER_ROOM: usize = 2000;

fn percentile(sorted: &[Duration], p: f64) -> Duration {
    if sorted.is_empty() {
        return Duration::ZERO;
    }
    let idx = ((sorted.len() as f64) * p / 100.0) as usize;
    sorted[idx.min(sorted.len() - 1)]
}

fn print_latency(label: &str, latencies: &mut [Duration]) {
    if latencies.is_empty() {
        println!("  {label}: no samples");
        return;
    }
    latencies.sort();
    let total: Duration = latencies.iter().sum();
    let avg = total / latencies.len() as u32;
    println!("  {label}:");
    println!(
        "    n={}, avg={:.3}ms, p50={:.3}ms, p95={:.3}ms, p99={:.3}ms, max={:.3}ms",
        latencies.len(),
        avg.as_secs_f64() * 1000.0,
        percentile(latencies, 50.0).as_secs_f64() * 1000.0,
        percentile(latencies, 95.0).as_secs_f64() * 1000.0,
        percentile(latencies, 99.0).as_secs_f64() * 1000.0,
        latencies[latencies.len() - 1].as_secs_f64() * 1000.0,
    );
}

fn rooms() -> Vec<Room> {
    (0..ROOMS)
        .map(|i| Room {
            id: RoomId::new(format!("r{i}")),
            name: format!("Room {i}"),
            status: if i % 10 == 9 {
                RoomStatus::Unavailable
            } else {
                RoomStatus::Available
            },
            image: None,
        })
        .collect()
}

/// Back-to-back one-hour bookings per room, starting `origin`.
fn bookings(origin: Ms) -> Vec<Booking> {
    let mut out = Vec::with_capacity(ROOMS * BOOKINGS_PER_ROOM);
    for r in 0..ROOMS {
        for j in 0..BOOKINGS_PER_ROOM {
            let start = origin + j as Ms * HOUR;
            out.push(Booking {
                id: BookingId::new(format!("b{r}-{j}")),
                room: RoomId::new(format!("r{r}")),
                user: UserRef::default(),
                span: Span::new(start, start + HOUR),
                created_at: None,
            });
        }
    }
    out
}

fn phase1_validate(existing: &[Booking], origin: Ms) {
    let n = 2000;
    let mut latencies = Vec::with_capacity(n);
    let mut rejected = 0;
    for i in 0..n {
        let start = origin + (i as Ms % BOOKINGS_PER_ROOM as Ms) * HOUR + 30 * MINUTE;
        let request = BookingRequest::new(RoomId::new(format!("r{}", i % ROOMS)), start, start + HOUR);
        let t = Instant::now();
        if booking::validate(&request, existing, RoomStatus::Available).is_err() {
            rejected += 1;
        }
        latencies.push(t.elapsed());
    }
    println!("  {n} checks against {} bookings, {rejected} rejected", existing.len());
    print_latency("validate latency", &mut latencies);
}

fn phase2_reconcile(rooms: &[Room], existing: &[Booking], origin: Ms) {
    let n = 50;
    let mut latencies = Vec::with_capacity(n);
    for i in 0..n {
        let now = origin + i as Ms * 17 * MINUTE;
        let t = Instant::now();
        let views = booking::reconcile(rooms, existing, now);
        latencies.push(t.elapsed());
        assert_eq!(views.len(), rooms.len());
    }
    print_latency("reconcile latency", &mut latencies);

    let policy = BookingPolicy::office_hours();
    let mut latencies = Vec::with_capacity(n);
    for i in 0..n {
        let t = Instant::now();
        let _ = booking::free_windows(&rooms[i % rooms.len()], existing, origin, &policy);
        latencies.push(t.elapsed());
    }
    print_latency("free_windows latency", &mut latencies);
}

fn phase3_sweep(existing: &[Booking], origin: Ms) {
    let mut latencies = Vec::new();
    let mut selected = 0;
    for k in 0..20 {
        let now = origin + k as Ms * 100 * HOUR;
        let t = Instant::now();
        selected = booking::sweep(existing, now).len();
        latencies.push(t.elapsed());
    }
    println!("  last sweep selected {selected} of {}", existing.len());
    print_latency("sweep selection latency", &mut latencies);
}

/// Accepts everything instantly; isolates the service overhead.
#[derive(Default)]
struct NullApi {
    next_id: AtomicU64,
}

#[async_trait]
impl RoomApi for NullApi {
    async fn list_rooms(&self, _token: &str) -> Result<Vec<Room>, BookingError> {
        Ok(rooms())
    }

    async fn list_bookings(&self, _token: &str) -> Result<Vec<Booking>, BookingError> {
        Ok(Vec::new())
    }

    async fn booking(&self, _token: &str, id: &BookingId) -> Result<Booking, BookingError> {
        Err(BookingError::NotFound(format!("booking {id}")))
    }

    async fn create_booking(&self, _token: &str, room: &Room, span: Span) -> Result<Booking, BookingError> {
        let n = self.next_id.fetch_add(1, Ordering::Relaxed);
        Ok(Booking {
            id: BookingId::new(format!("srv-{n}")),
            room: RoomId::new(room.name.clone()),
            user: UserRef::default(),
            span,
            created_at: None,
        })
    }

    async fn cancel_booking(&self, _token: &str, _id: &BookingId) -> Result<(), BookingError> {
        Ok(())
    }

    async fn set_room_status(&self, _token: &str, _id: &RoomId, _status: RoomStatus) -> Result<Room, BookingError> {
        Err(BookingError::NotPermitted("read-only"))
    }
}

async fn phase4_service(origin: Ms) {
    let session = SessionContext::with_session(Session {
        token: "bench".into(),
        role: Role::Admin,
        actor: None,
    });
    let svc = Arc::new(BookingService::new(
        Arc::new(NullApi::default()),
        session,
        BookingPolicy::unrestricted(),
        Duration::from_secs(5),
    ));
    if let Err(e) = svc.refresh().await {
        println!("  refresh failed: {e}");
        return;
    }

    let n_tasks = 10;
    let n_per_task = 200;
    let start = Instant::now();
    let mut handles = Vec::new();
    for i in 0..n_tasks {
        let svc = svc.clone();
        handles.push(tokio::spawn(async move {
            let room = RoomId::new(format!("r{i}"));
            let mut ok = 0;
            for j in 0..n_per_task {
                let s = origin + j as Ms * HOUR;
                if svc.submit(BookingRequest::new(room.clone(), s, s + HOUR)).await.is_ok() {
                    ok += 1;
                }
            }
            ok
        }));
    }
    let mut ok = 0;
    for h in handles {
        ok += h.await.unwrap_or(0);
    }
    let elapsed = start.elapsed();
    let total = n_tasks * n_per_task;
    println!(
        "  {n_tasks} tasks x {n_per_task} submits = {ok}/{total} accepted in {:.2}s = {:.0} ops/sec",
        elapsed.as_secs_f64(),
        total as f64 / elapsed.as_secs_f64()
    );

    let t = Instant::now();
    let report = svc.sweep_once(origin + n_per_task as Ms * HOUR).await;
    match report {
        Ok(r) => println!("  swept {} bookings in {:.2}ms", r.cancelled.len(), t.elapsed().as_secs_f64() * 1000.0),
        Err(e) => println!("  sweep failed: {e}"),
    }
}

#[tokio::main]
async fn main() {
    let origin = clock::day_start(clock::now_ms());
    println!("=== roomkeeper stress benchmark ===");

    println!("\n[setup]");
    let rooms = rooms();
    let existing = bookings(origin);
    println!("  {} rooms, {} bookings", rooms.len(), existing.len());

    println!("\n[phase 1] validation");
    phase1_validate(&existing, origin);

    println!("\n[phase 2] reconciliation");
    phase2_reconcile(&rooms, &existing, origin);

    println!("\n[phase 3] expiry selection");
    phase3_sweep(&existing, origin);

    println!("\n[phase 4] service submit + sweep");
    phase4_service(origin).await;

    println!("\n=== benchmark complete ===");
}
