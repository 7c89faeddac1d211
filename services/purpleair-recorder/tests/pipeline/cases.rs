use axum::http::StatusCode;
use purpleair_recorder::{
    ApiGeneration, InfluxSink, IngestPipeline, Outcome, PipelineSettings, Point, RetryPolicy,
};
use std::time::Duration;

use crate::support::{
    DATA_BODY, RecordingSink, SHOW_BODY, Script, Upstream, V1_BODY, settings, spawn_upstream,
    summary,
};

const FOUR_POINTS: [(&str, f64); 4] = [
    ("pm10_0_atm", 5.0),
    ("pm2_5_atm", 3.2),
    ("pm1_0_atm", 1.1),
    ("aqi", 38.0),
];

async fn spawn_default() -> Upstream {
    spawn_upstream(Script::ok(SHOW_BODY), Script::ok(DATA_BODY), Script::ok(V1_BODY)).await
}

fn recording(upstream: &Upstream, cfg: PipelineSettings) -> IngestPipeline<RecordingSink> {
    IngestPipeline::new(
        upstream.client(Duration::from_secs(2)),
        RecordingSink::default(),
        cfg,
    )
}

fn success_points(outcome: Outcome) -> (Vec<Point>, bool) {
    match outcome {
        Outcome::Success { points, written } => (points, written),
        Outcome::Failure { reason } => panic!("cycle failed: {reason}"),
    }
}

#[tokio::test]
async fn legacy_show_with_aqi_sample_writes_four_points() {
    let upstream = spawn_default().await;
    let mut cfg = settings(ApiGeneration::LegacyShow);
    cfg.legacy_key = Some("LEGACYKEY".into());
    let pipeline = recording(&upstream, cfg);

    let (points, written) = success_points(pipeline.run().await);

    assert!(written);
    assert_eq!(summary(&points), FOUR_POINTS.to_vec());
    for p in &points {
        assert_eq!(p.tags.get("id").map(String::as_str), Some("42"));
        assert_eq!(p.timestamp, 1_700_000_000);
    }
    assert_eq!(pipeline.sink().writes(), vec![points]);
    assert_eq!(upstream.show.queries(), vec!["show=42".to_string()]);
    assert_eq!(
        upstream.data.queries(),
        vec!["key=LEGACYKEY&fetch=true&show=42&fields=pm_1".to_string()]
    );
    assert_eq!(upstream.v1.hits(), 0);
}

#[tokio::test]
async fn dry_run_computes_points_without_writing() {
    let upstream = spawn_default().await;
    let mut cfg = settings(ApiGeneration::LegacyShow);
    cfg.legacy_key = Some("LEGACYKEY".into());
    cfg.dry_run = true;
    let pipeline = recording(&upstream, cfg);

    let (points, written) = success_points(pipeline.run().await);

    assert!(!written);
    assert_eq!(summary(&points), FOUR_POINTS.to_vec());
    assert!(pipeline.sink().writes().is_empty());
}

#[tokio::test]
async fn legacy_show_without_key_skips_aqi() {
    let upstream = spawn_default().await;
    let pipeline = recording(&upstream, settings(ApiGeneration::LegacyShow));

    let (points, _) = success_points(pipeline.run().await);

    assert_eq!(summary(&points), FOUR_POINTS[..3].to_vec());
    assert_eq!(upstream.data.hits(), 0);
}

#[tokio::test]
async fn malformed_sample_payload_is_repaired() {
    let malformed = r#"{"fields":["ID","pm_1"],"data":[],],"count":0,"data_time_stamp":1700000030}"#;
    let upstream =
        spawn_upstream(Script::ok(SHOW_BODY), Script::ok(malformed), Script::ok(V1_BODY)).await;
    let mut cfg = settings(ApiGeneration::LegacyShow);
    cfg.legacy_key = Some("LEGACYKEY".into());
    let pipeline = recording(&upstream, cfg);

    let (points, written) = success_points(pipeline.run().await);

    assert!(written);
    assert_eq!(summary(&points), FOUR_POINTS[..3].to_vec());
    assert_eq!(upstream.data.hits(), 1);
}

#[tokio::test]
async fn corrupt_payload_fails_the_cycle_without_retry() {
    let upstream = spawn_upstream(
        Script::ok(r#"{"results": [{"ID": 42,}"#),
        Script::ok(DATA_BODY),
        Script::ok(V1_BODY),
    )
    .await;
    let pipeline = recording(&upstream, settings(ApiGeneration::LegacyShow));

    let outcome = pipeline.run().await;

    assert!(
        matches!(outcome, Outcome::Failure { ref reason } if reason.contains("malformed JSON"))
    );
    assert_eq!(upstream.show.hits(), 1);
    assert!(pipeline.sink().writes().is_empty());
}

#[tokio::test]
async fn transient_gateway_faults_are_retried() {
    let upstream = spawn_upstream(
        Script::after_failures(SHOW_BODY, StatusCode::BAD_GATEWAY, 2),
        Script::ok(DATA_BODY),
        Script::ok(V1_BODY),
    )
    .await;
    let pipeline = recording(&upstream, settings(ApiGeneration::LegacyShow));

    assert!(pipeline.run().await.is_success());
    assert_eq!(upstream.show.hits(), 3);
    assert_eq!(pipeline.sink().writes().len(), 1);
}

#[tokio::test]
async fn exhausted_retries_fail_the_cycle() {
    let upstream = spawn_upstream(
        Script::always(StatusCode::GATEWAY_TIMEOUT, "gateway timeout"),
        Script::ok(DATA_BODY),
        Script::ok(V1_BODY),
    )
    .await;
    let mut cfg = settings(ApiGeneration::LegacyShow);
    cfg.primary_retry = RetryPolicy::default().with_max_retries(2);
    let pipeline = recording(&upstream, cfg);

    let outcome = pipeline.run().await;

    assert!(matches!(outcome, Outcome::Failure { ref reason } if reason.contains("504")));
    assert_eq!(upstream.show.hits(), 3);
    assert!(pipeline.sink().writes().is_empty());
}

#[tokio::test]
async fn non_transient_status_is_not_retried() {
    let upstream = spawn_upstream(
        Script::always(StatusCode::NOT_FOUND, "no such sensor"),
        Script::ok(DATA_BODY),
        Script::ok(V1_BODY),
    )
    .await;
    let pipeline = recording(&upstream, settings(ApiGeneration::LegacyShow));

    assert!(!pipeline.run().await.is_success());
    assert_eq!(upstream.show.hits(), 1);
}

#[tokio::test]
async fn rate_limited_sample_endpoint_is_retried_with_backoff() {
    let upstream = spawn_upstream(
        Script::ok(SHOW_BODY),
        Script::after_failures(DATA_BODY, StatusCode::TOO_MANY_REQUESTS, 2),
        Script::ok(V1_BODY),
    )
    .await;
    let mut cfg = settings(ApiGeneration::LegacyShow);
    cfg.legacy_key = Some("LEGACYKEY".into());
    let pipeline = recording(&upstream, cfg);

    let (points, _) = success_points(pipeline.run().await);

    assert_eq!(summary(&points), FOUR_POINTS.to_vec());
    assert_eq!(upstream.show.hits(), 1);
    assert_eq!(upstream.data.hits(), 3);
}

#[tokio::test]
async fn rate_limiting_on_primary_endpoint_is_not_retried() {
    let upstream = spawn_upstream(
        Script::after_failures(SHOW_BODY, StatusCode::TOO_MANY_REQUESTS, 1),
        Script::ok(DATA_BODY),
        Script::ok(V1_BODY),
    )
    .await;
    let pipeline = recording(&upstream, settings(ApiGeneration::LegacyShow));

    assert!(!pipeline.run().await.is_success());
    assert_eq!(upstream.show.hits(), 1);
}

#[tokio::test]
async fn request_timeout_is_retried() {
    let upstream = spawn_upstream(
        Script::slow(SHOW_BODY, 1, Duration::from_secs(2)),
        Script::ok(DATA_BODY),
        Script::ok(V1_BODY),
    )
    .await;
    let pipeline = IngestPipeline::new(
        upstream.client(Duration::from_millis(200)),
        RecordingSink::default(),
        settings(ApiGeneration::LegacyShow),
    );

    assert!(pipeline.run().await.is_success());
    assert_eq!(upstream.show.hits(), 2);
}

#[tokio::test]
async fn api_v1_sends_read_key_and_uses_ten_minute_sample() {
    let upstream = spawn_default().await;
    let mut cfg = settings(ApiGeneration::ApiV1);
    cfg.read_key = Some("READKEY".into());
    cfg.legacy_key = Some("LEGACYKEY".into());
    let pipeline = recording(&upstream, cfg);

    let (points, _) = success_points(pipeline.run().await);

    assert_eq!(summary(&points), FOUR_POINTS.to_vec());
    assert_eq!(upstream.v1.api_keys(), vec![Some("READKEY".to_string())]);
    assert_eq!(upstream.show.hits(), 0);
    assert_eq!(upstream.data.hits(), 0);
}

#[tokio::test]
async fn legacy_data_json_alone_emits_only_aqi() {
    let upstream = spawn_default().await;
    let mut cfg = settings(ApiGeneration::LegacyDataJson);
    cfg.legacy_key = Some("LEGACYKEY".into());
    let pipeline = recording(&upstream, cfg);

    let (points, _) = success_points(pipeline.run().await);

    assert_eq!(summary(&points), vec![("aqi", 38.0)]);
    assert_eq!(points[0].timestamp, 1_700_000_030);
}

#[tokio::test]
async fn sample_without_rows_keeps_concentration_points() {
    let upstream = spawn_upstream(
        Script::ok(SHOW_BODY),
        Script::ok(r#"{"fields":["ID","pm_1"],"count":0}"#),
        Script::ok(V1_BODY),
    )
    .await;
    let mut cfg = settings(ApiGeneration::LegacyShow);
    cfg.legacy_key = Some("LEGACYKEY".into());
    let pipeline = recording(&upstream, cfg);

    let (points, written) = success_points(pipeline.run().await);

    assert!(written);
    assert_eq!(summary(&points), FOUR_POINTS[..3].to_vec());
    assert_eq!(upstream.data.hits(), 1);
    assert_eq!(pipeline.sink().writes().len(), 1);
}

#[tokio::test]
async fn reading_without_points_skips_the_write() {
    let upstream = spawn_upstream(
        Script::ok(SHOW_BODY),
        Script::ok(r#"{"fields":["ID","pm_1"],"data":[],"data_time_stamp":1700000030}"#),
        Script::ok(V1_BODY),
    )
    .await;
    let mut cfg = settings(ApiGeneration::LegacyDataJson);
    cfg.legacy_key = Some("LEGACYKEY".into());
    let pipeline = recording(&upstream, cfg);

    let (points, written) = success_points(pipeline.run().await);

    assert!(points.is_empty());
    assert!(!written);
    assert!(pipeline.sink().writes().is_empty());
}

#[tokio::test]
async fn missing_timestamp_fails_normalization() {
    let upstream = spawn_upstream(
        Script::ok(r#"{"results":[{"ID":42,"pm2_5_atm":"3.2"}]}"#),
        Script::ok(DATA_BODY),
        Script::ok(V1_BODY),
    )
    .await;
    let pipeline = recording(&upstream, settings(ApiGeneration::LegacyShow));

    let outcome = pipeline.run().await;

    assert!(matches!(outcome, Outcome::Failure { ref reason } if reason.contains("LastSeen")));
    assert!(pipeline.sink().writes().is_empty());
}

#[tokio::test]
async fn sink_rejection_is_a_handled_failure() {
    let upstream = spawn_default().await;
    let pipeline = IngestPipeline::new(
        upstream.client(Duration::from_secs(2)),
        RecordingSink::rejecting(),
        settings(ApiGeneration::LegacyShow),
    );

    let outcome = pipeline.run().await;

    assert!(
        matches!(outcome, Outcome::Failure { ref reason } if reason.contains("sink write failed"))
    );
}

#[tokio::test]
async fn influx_sink_posts_line_protocol() {
    let upstream = spawn_default().await;
    let sink = InfluxSink::new(&upstream.base_url, "purpleair", Duration::from_secs(2)).unwrap();
    let mut cfg = settings(ApiGeneration::LegacyShow);
    cfg.legacy_key = Some("LEGACYKEY".into());
    let pipeline = IngestPipeline::new(upstream.client(Duration::from_secs(2)), sink, cfg);

    assert!(pipeline.run().await.is_success());
    assert_eq!(
        upstream.influx.queries(),
        vec!["db=purpleair&precision=s".to_string()]
    );
    assert_eq!(
        upstream.influx.bodies(),
        vec![
            "pm10_0_atm,id=42 value=5 1700000000\n\
             pm2_5_atm,id=42 value=3.2 1700000000\n\
             pm1_0_atm,id=42 value=1.1 1700000000\n\
             aqi,id=42 value=38 1700000000\n"
                .to_string()
        ]
    );
}
