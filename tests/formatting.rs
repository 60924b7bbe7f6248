use proptest::prelude::*;
use scripthub::metrics::{format_cpu_time, format_elapsed, render_line};
use scripthub::MetricsSnapshot;

proptest! {
    #[test]
    fn elapsed_always_has_three_padded_fields(seconds in 0.0f64..400_000.0) {
        let text = format_elapsed(seconds);
        let parts: Vec<&str> = text.split(':').collect();
        prop_assert_eq!(parts.len(), 3);
        prop_assert!(parts.iter().all(|p| p.len() >= 2 && p.chars().all(|c| c.is_ascii_digit())));

        let hours: u64 = parts[0].parse().unwrap();
        let minutes: u64 = parts[1].parse().unwrap();
        let secs: u64 = parts[2].parse().unwrap();
        prop_assert!(minutes < 60 && secs < 60);
        prop_assert_eq!(hours * 3600 + minutes * 60 + secs, seconds as u64);
    }

    #[test]
    fn cpu_time_round_trips_to_a_tenth(seconds in 0.0f64..200_000.0) {
        let text = format_cpu_time(seconds);
        let (hours, rest) = text.split_once(':').unwrap();
        let (minutes, rest) = rest.split_once(':').unwrap();
        let (secs, tenth) = rest.split_once('.').unwrap();
        prop_assert_eq!(minutes.len(), 2);
        prop_assert_eq!(secs.len(), 2);
        prop_assert_eq!(tenth.len(), 1);

        let total = hours.parse::<f64>().unwrap() * 3600.0
            + minutes.parse::<f64>().unwrap() * 60.0
            + secs.parse::<f64>().unwrap()
            + tenth.parse::<f64>().unwrap() / 10.0;
        prop_assert!((total - seconds).abs() <= 0.05 + 1e-6);
    }

    #[test]
    fn negative_durations_render_as_zero(seconds in -1.0e9f64..0.0) {
        prop_assert_eq!(format_elapsed(seconds), "00:00:00");
        prop_assert_eq!(format_cpu_time(seconds), "0:00:00.0");
    }
}

#[test]
fn known_values() {
    assert_eq!(format_elapsed(3725.9), "01:02:05");
    assert_eq!(format_cpu_time(3725.4), "1:02:05.4");
    assert_eq!(format_cpu_time(0.0), "0:00:00.0");
}

#[test]
fn render_line_mentions_every_metric() {
    let snapshot = MetricsSnapshot {
        cpu_percent: 12.0,
        elapsed_seconds: 61.0,
        num_threads: 4,
        ..MetricsSnapshot::default()
    };
    let line = render_line(&snapshot);
    assert!(line.contains("CPU 12.0%"));
    assert!(line.contains("Elapsed 00:01:01"));
    assert!(line.contains("Threads 4"));
}
