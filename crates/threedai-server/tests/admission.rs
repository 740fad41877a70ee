use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use threedai_server::admission::AdmissionGate;

#[test]
fn unbounded_gate_admits_everyone() {
    let gate = AdmissionGate::unbounded();
    assert_eq!(None, gate.limit());
    let permits: Vec<_> = (0..16).map(|_| gate.acquire()).collect();
    assert_eq!(16, gate.active());
    drop(permits);
    assert_eq!(0, gate.active());
}

#[test]
fn bounded_gate_caps_concurrency() {
    let gate = Arc::new(AdmissionGate::new(2));
    let running = Arc::new(AtomicUsize::new(0));
    let peak = Arc::new(AtomicUsize::new(0));

    let workers: Vec<_> = (0..6)
        .map(|_| {
            let gate = Arc::clone(&gate);
            let running = Arc::clone(&running);
            let peak = Arc::clone(&peak);
            std::thread::spawn(move || {
                let _permit = gate.acquire();
                let now = running.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
                std::thread::sleep(Duration::from_millis(20));
                running.fetch_sub(1, Ordering::SeqCst);
            })
        })
        .collect();
    for worker in workers {
        worker.join().unwrap();
    }

    assert_eq!(Some(2), gate.limit());
    assert!(peak.load(Ordering::SeqCst) <= 2);
    assert_eq!(0, gate.active());
}
