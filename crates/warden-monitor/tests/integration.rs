//! Monitor integration: concurrent recording and window statistics.

use std::sync::Arc;
use std::thread;

use warden_engine::{AttackCategory, DetectionResult, PatternHit, ThreatLevel};
use warden_monitor::{DetectionEvent, DetectionMonitor};

fn result_with_category(score: f64, level: ThreatLevel, category: AttackCategory) -> DetectionResult {
    let mut result = DetectionResult::safe();
    result.risk_score = score;
    result.threat_level = level;
    result.detected_patterns = vec![PatternHit {
        category,
        label: "test_rule".to_string(),
        span: (0, 4),
    }];
    result
}

#[test]
fn test_concurrent_recording_loses_nothing() {
    let monitor = Arc::new(DetectionMonitor::new(10_000).unwrap());
    let mut handles = Vec::new();
    for t in 0..8 {
        let monitor = Arc::clone(&monitor);
        handles.push(thread::spawn(move || {
            for i in 0..100 {
                let result = result_with_category(
                    f64::from(i),
                    ThreatLevel::Low,
                    AttackCategory::Jailbreak,
                );
                let event =
                    DetectionEvent::from_result("payload", &result, Some(format!("s-{t}")));
                monitor.record(event);
            }
        }));
    }
    for handle in handles {
        handle.join().unwrap();
    }
    let stats = monitor.stats();
    assert_eq!(stats.total_recorded, 800);
    assert_eq!(stats.retained, 800);
    assert_eq!(stats.evicted, 0);
}

#[test]
fn test_stats_over_window_only() {
    let monitor = DetectionMonitor::new(3).unwrap();
    // These three will be evicted by the three that follow.
    for _ in 0..3 {
        let result = result_with_category(100.0, ThreatLevel::Critical, AttackCategory::Jailbreak);
        monitor.record(DetectionEvent::from_result("old", &result, None));
    }
    for _ in 0..3 {
        let result =
            result_with_category(10.0, ThreatLevel::Low, AttackCategory::PromptLeakage);
        monitor.record(DetectionEvent::from_result("new", &result, None));
    }
    let stats = monitor.stats();
    assert_eq!(stats.retained, 3);
    assert_eq!(stats.evicted, 3);
    assert!((stats.mean_risk_score - 10.0).abs() < 1e-9);
    assert_eq!(stats.count_at(ThreatLevel::Critical), 0);
    assert_eq!(stats.top_category, Some(AttackCategory::PromptLeakage));
}

#[test]
fn test_top_category_tie_breaks_by_priority() {
    let monitor = DetectionMonitor::new(10).unwrap();
    let jail = result_with_category(50.0, ThreatLevel::High, AttackCategory::Jailbreak);
    let leak = result_with_category(50.0, ThreatLevel::High, AttackCategory::PromptLeakage);
    monitor.record(DetectionEvent::from_result("a", &jail, None));
    monitor.record(DetectionEvent::from_result("b", &leak, None));
    // one of each: jailbreak has the higher priority
    assert_eq!(monitor.stats().top_category, Some(AttackCategory::Jailbreak));
}

#[test]
fn test_event_serializes() {
    let result = result_with_category(42.0, ThreatLevel::Medium, AttackCategory::Obfuscation);
    let event = DetectionEvent::from_result("prompt text", &result, Some("session".to_string()));
    let json = serde_json::to_string(&event).unwrap();
    assert!(json.contains("\"MEDIUM\""));
    assert!(json.contains("\"obfuscation\""));
    assert!(!json.contains("prompt text"), "raw prompt must never be stored");
}
