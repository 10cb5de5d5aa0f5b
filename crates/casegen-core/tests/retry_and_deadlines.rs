//! Retry, backoff, timeout and run-ceiling behaviour on a paused clock.

mod common;

use std::time::Duration;

use casegen_core::fakes::ScriptedGenerator;
use casegen_core::{GeneratorError, PipelineConfig, PipelineError, PipelineEvent, RetryPolicy};
use common::*;
use tokio::time::Instant;

#[tokio::test(start_paused = true)]
async fn generator_failures_back_off_exponentially() {
    let generator = ScriptedGenerator::new()
        .then_err(GeneratorError::Status {
            status: 503,
            body: "overloaded".into(),
        })
        .then_err(GeneratorError::Http("connection reset".into()))
        .then_ok(outline())
        .then_ok(case_json(6, vec![]));
    let config = PipelineConfig {
        case_thresholds: casegen_core::CaseThresholds {
            min_files: 0,
            ..Default::default()
        },
        ..PipelineConfig::default()
    };
    let h = harness(generator, config);

    let started = Instant::now();
    let report = h.orchestrator.run(request("bp-backoff")).await.unwrap();

    // 1s after the first failure, 2s after the second
    assert!(started.elapsed() >= Duration::from_millis(3_000));
    assert!(started.elapsed() < Duration::from_millis(4_000));
    assert_eq!(report.generator_calls, 4);

    let delays: Vec<u64> = h
        .observer
        .events()
        .into_iter()
        .filter_map(|e| match e {
            PipelineEvent::BackoffScheduled { delay_ms, .. } => Some(delay_ms),
            _ => None,
        })
        .collect();
    assert_eq!(delays, vec![1_000, 2_000]);
}

#[tokio::test(start_paused = true)]
async fn persistent_generator_failure_is_bounded() {
    let generator = ScriptedGenerator::new();
    let h = harness(generator, PipelineConfig::default());

    let err = h.orchestrator.run(request("bp-down")).await.unwrap_err();

    assert_eq!(err.code(), "generator_failure");
    assert!(matches!(
        err,
        PipelineError::Generator {
            attempts: 3,
            source: GeneratorError::EmptyResponse,
            ..
        }
    ));
    assert_eq!(h.generator.call_count(), 3);
}

#[tokio::test(start_paused = true)]
async fn unparseable_output_is_retried_then_reported() {
    let generator = ScriptedGenerator::new().otherwise("I cannot help with that {request");
    let config = PipelineConfig {
        retry: RetryPolicy::immediate(2),
        parse_attempts: 2,
        ..PipelineConfig::default()
    };
    let h = harness(generator, config);

    let err = h.orchestrator.run(request("bp-garbage")).await.unwrap_err();

    assert_eq!(err.code(), "structural_parse_failure");
    assert_eq!(h.generator.call_count(), 2);
    let response = err.to_response();
    assert_eq!(
        response.raw_preview.as_deref(),
        Some("I cannot help with that {request")
    );
    assert!(response.error_offset.is_some());
    assert!(response.context.is_some());
}

#[tokio::test(start_paused = true)]
async fn slow_generator_hits_call_timeout() {
    let generator = ScriptedGenerator::new()
        .with_delay(Duration::from_secs(600))
        .otherwise(outline());
    let config = PipelineConfig {
        retry: RetryPolicy::immediate(2),
        call_timeout_ms: 10_000,
        ..PipelineConfig::default()
    };
    let h = harness(generator, config);

    let started = Instant::now();
    let err = h.orchestrator.run(request("bp-slow")).await.unwrap_err();

    assert!(matches!(
        err,
        PipelineError::Generator {
            source: GeneratorError::Timeout(10_000),
            ..
        }
    ));
    assert!(started.elapsed() >= Duration::from_secs(20));
    assert!(started.elapsed() < Duration::from_secs(21));
}

#[tokio::test(start_paused = true)]
async fn run_ceiling_aborts_before_persistence() {
    let generator = ScriptedGenerator::new()
        .with_delay(Duration::from_secs(3))
        .then_ok(outline())
        .then_ok(case_json(6, pending_files()));
    let config = PipelineConfig {
        retry: RetryPolicy::immediate(3),
        run_ceiling_ms: Some(5_000),
        ..PipelineConfig::default()
    };
    let h = harness(generator, config);

    let err = h.orchestrator.run(request("bp-ceiling")).await.unwrap_err();

    assert_eq!(err.code(), "deadline_exceeded");
    assert_eq!(h.store.case_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn run_ceiling_during_assets_skips_remaining_files() {
    let generator = ScriptedGenerator::new()
        .with_delay(Duration::from_secs(1))
        .then_ok(outline())
        .then_ok(case_json(6, pending_files()))
        .then_ok(deck(12))
        .then_ok(csv(17))
        .then_ok(memo());
    let config = PipelineConfig {
        retry: RetryPolicy::immediate(3),
        run_ceiling_ms: Some(3_500),
        ..PipelineConfig::default()
    };
    let h = harness(generator, config);

    let report = h.orchestrator.run(request("bp-partial")).await.unwrap();

    assert_eq!(h.store.case_count(), 1);
    assert_eq!(report.assets.len(), 3);
    assert!(report.assets[0].success);
    for skipped in &report.assets[1..] {
        assert!(!skipped.success);
        assert!(skipped.error.as_deref().unwrap().contains("run ceiling"));
    }
}
