use super::*;
use crate::compliance::domain::{QueryFailure, Row, Scalar};
use crate::ports::outbound::{ControlRecord, QueryResult};
use crate::shared::error::AuditError;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

// Mock implementations for testing

struct MockControlSource {
    records: Vec<ControlRecord>,
}

impl MockControlSource {
    fn from_yaml(yaml: &str) -> Self {
        Self {
            records: serde_yaml_ng::from_str(yaml).unwrap(),
        }
    }
}

impl ControlSource for MockControlSource {
    fn read_controls(&self) -> Result<Vec<ControlRecord>> {
        Ok(self.records.clone())
    }

    fn describe(&self) -> String {
        "mock catalog".to_string()
    }
}

#[derive(Default)]
struct MockState {
    rows: HashMap<String, QueryResult<Vec<Row>>>,
    values: HashMap<String, Scalar>,
    delays: HashMap<String, Duration>,
    concurrent: bool,
    cancel_on_query: Option<(usize, CancellationSignal)>,
    open_delay: Option<Duration>,
    queries: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    closed: AtomicBool,
}

impl MockState {
    fn with_rows(mut self, expression: &str, rows: Vec<Row>) -> Self {
        self.rows.insert(expression.to_string(), Ok(rows));
        self
    }

    fn with_failure(mut self, expression: &str, failure: QueryFailure) -> Self {
        self.rows.insert(expression.to_string(), Err(failure));
        self
    }

    fn with_value(mut self, path: &str, value: Scalar) -> Self {
        self.values.insert(path.to_string(), value);
        self
    }

    fn with_delay(mut self, expression: &str, delay: Duration) -> Self {
        self.delays.insert(expression.to_string(), delay);
        self
    }
}

struct MockSession {
    state: Arc<MockState>,
}

#[async_trait]
impl TargetSession for MockSession {
    async fn query(&self, expression: &str, _timeout: Duration) -> QueryResult<Vec<Row>> {
        if expression == "PANIC" {
            panic!("driver exploded");
        }
        let count = self.state.queries.fetch_add(1, Ordering::SeqCst) + 1;
        let in_flight = self.state.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.state.max_in_flight.fetch_max(in_flight, Ordering::SeqCst);

        if let Some(delay) = self.state.delays.get(expression) {
            tokio::time::sleep(*delay).await;
        }
        if let Some((after, signal)) = &self.state.cancel_on_query {
            if count == *after {
                signal.cancel();
            }
        }

        self.state.in_flight.fetch_sub(1, Ordering::SeqCst);
        self.state
            .rows
            .get(expression)
            .cloned()
            .unwrap_or_else(|| Err(QueryFailure::Rejected(format!("unknown query {}", expression))))
    }

    async fn lookup(&self, path: &str, _timeout: Duration) -> QueryResult<Option<Scalar>> {
        Ok(self.state.values.get(path).cloned())
    }

    fn supports_concurrent_reads(&self) -> bool {
        self.state.concurrent
    }

    async fn close(&self) -> Result<()> {
        self.state.closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}

struct MockConnector {
    state: Arc<MockState>,
    fail_open: bool,
    opened: Arc<AtomicUsize>,
}

#[async_trait]
impl TargetConnector for MockConnector {
    type Session = MockSession;

    fn describe(&self) -> String {
        "mock target".to_string()
    }

    async fn open(&self) -> Result<MockSession> {
        self.opened.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.state.open_delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail_open {
            return Err(AuditError::Connection {
                target: "mock target".to_string(),
                details: "connection refused".to_string(),
            }
            .into());
        }
        Ok(MockSession {
            state: Arc::clone(&self.state),
        })
    }
}

#[derive(Default, Clone)]
struct RecordingReporter {
    messages: Arc<Mutex<Vec<String>>>,
}

impl RecordingReporter {
    fn contains(&self, needle: &str) -> bool {
        self.messages.lock().unwrap().iter().any(|m| m.contains(needle))
    }
}

impl ProgressReporter for RecordingReporter {
    fn report(&self, message: &str) {
        self.messages.lock().unwrap().push(message.to_string());
    }

    fn report_progress(&self, current: usize, total: usize, _message: Option<&str>) {
        self.messages
            .lock()
            .unwrap()
            .push(format!("progress {}/{}", current, total));
    }

    fn report_status(&self, control_id: &str, status: Status) {
        self.messages
            .lock()
            .unwrap()
            .push(format!("{} {}", control_id, status));
    }

    fn report_error(&self, message: &str) {
        self.messages.lock().unwrap().push(message.to_string());
    }

    fn report_completion(&self, message: &str) {
        self.messages.lock().unwrap().push(message.to_string());
    }
}

struct Harness {
    use_case: RunControlsUseCase<MockControlSource, MockConnector, RecordingReporter>,
    state: Arc<MockState>,
    opened: Arc<AtomicUsize>,
    reporter: RecordingReporter,
}

fn harness(catalog: &str, state: MockState, fail_open: bool) -> Harness {
    let state = Arc::new(state);
    let opened = Arc::new(AtomicUsize::new(0));
    let reporter = RecordingReporter::default();
    let use_case = RunControlsUseCase::new(
        MockControlSource::from_yaml(catalog),
        MockConnector {
            state: Arc::clone(&state),
            fail_open,
            opened: Arc::clone(&opened),
        },
        reporter.clone(),
    );
    Harness {
        use_case,
        state,
        opened,
        reporter,
    }
}

fn control(id: &str, body: &str) -> String {
    format!(
        "- id: {}\n  title: Control {}\n  impact: 0.5\n  check_text: check\n  fix_text: fix\n{}",
        id, id, body
    )
}

fn fips_control() -> String {
    control(
        "V-67871",
        "  verify:\n    check: single_value\n    path: fips/enabled\n    expected: 1\n",
    )
}

fn audit_permissions_control() -> String {
    control(
        "V-67767",
        "  verify:\n    check: set_membership\n    query: PERMS\n    column: result\n    allowed:\n      input: allowed_audit_permissions\n",
    )
}

fn manual_control(id: &str) -> String {
    control(id, "  manual: true\n  instructions: Interview the DBA about shared accounts\n")
}

fn query_control(id: &str, query: &str) -> String {
    control(
        id,
        &format!(
            "  verify:\n    check: single_value\n    query: {}\n    column: value\n    expected: 1\n",
            query
        ),
    )
}

fn audit_inputs() -> crate::compliance::domain::Inputs {
    crate::compliance::domain::Inputs::new().with(
        "allowed_audit_permissions",
        crate::compliance::domain::InputValue::List(vec![Scalar::text("ALTER ANY SERVER AUDIT")]),
    )
}

fn request() -> RunRequest {
    RunRequest::builder().inputs(audit_inputs()).build().unwrap()
}

fn statuses(report: &RunReport) -> Vec<Status> {
    report.entries().iter().map(|e| e.outcome.status()).collect()
}

async fn run_report(h: &Harness) -> RunReport {
    h.use_case.execute(request()).await.unwrap().report.unwrap()
}

#[tokio::test]
async fn test_single_value_pass() {
    let h = harness(
        &fips_control(),
        MockState::default().with_value("fips/enabled", Scalar::Integer(1)),
        false,
    );
    let report = run_report(&h).await;
    let outcome = report.get("V-67871").unwrap();
    assert_eq!(outcome.status(), Status::Pass);
    assert_eq!(outcome.evidence(), &[Scalar::Integer(1)]);
    assert!(h.state.closed.load(Ordering::SeqCst));
}

#[tokio::test]
async fn test_single_value_fail() {
    let h = harness(
        &fips_control(),
        MockState::default().with_value("fips/enabled", Scalar::Integer(0)),
        false,
    );
    let report = run_report(&h).await;
    let outcome = report.get("V-67871").unwrap();
    assert_eq!(outcome.status(), Status::Fail);
    assert_eq!(outcome.evidence(), &[Scalar::Integer(0)]);
}

#[tokio::test]
async fn test_single_value_absent_is_missing_target_data() {
    let h = harness(&fips_control(), MockState::default(), false);
    let report = run_report(&h).await;
    let outcome = report.get("V-67871").unwrap();
    assert_eq!(outcome.status(), Status::Error);
    assert!(matches!(
        outcome.failure(),
        Some(CheckFailure::MissingTargetData { .. })
    ));
}

#[tokio::test]
async fn test_set_membership_scenarios() {
    let cases = vec![
        (vec!["ALTER ANY SERVER AUDIT"], Status::Pass, vec![]),
        (
            vec!["CONTROL SERVER"],
            Status::Fail,
            vec![Scalar::text("CONTROL SERVER")],
        ),
        (vec![], Status::NotApplicable, vec![]),
    ];

    for (granted, expected_status, expected_evidence) in cases {
        let rows = granted
            .iter()
            .map(|g| Row::new().with("result", *g))
            .collect();
        let h = harness(
            &audit_permissions_control(),
            MockState::default().with_rows("PERMS", rows),
            false,
        );
        let report = run_report(&h).await;
        let outcome = report.get("V-67767").unwrap();
        assert_eq!(outcome.status(), expected_status, "granted: {:?}", granted);
        if expected_status == Status::Fail {
            assert_eq!(outcome.evidence(), expected_evidence.as_slice());
        }
    }
}

#[tokio::test]
async fn test_set_membership_rows_without_column_value_are_missing_data() {
    let cases = vec![
        vec![Row::new().with("reslt", "CONTROL SERVER")],
        vec![Row::new().with_null("result"), Row::new().with_null("result")],
    ];

    for rows in cases {
        let h = harness(
            &audit_permissions_control(),
            MockState::default().with_rows("PERMS", rows),
            false,
        );
        let report = run_report(&h).await;
        let outcome = report.get("V-67767").unwrap();
        assert_eq!(outcome.status(), Status::Error);
        assert!(matches!(
            outcome.failure(),
            Some(CheckFailure::MissingTargetData { .. })
        ));
    }
}

#[tokio::test]
async fn test_manual_only_never_touches_connector() {
    let h = harness(&manual_control("V-67763"), MockState::default(), true);
    let report = run_report(&h).await;

    let outcome = report.get("V-67763").unwrap();
    assert_eq!(outcome.status(), Status::SkippedManual);
    assert_eq!(
        outcome.reason(),
        Some("Interview the DBA about shared accounts")
    );
    assert_eq!(h.opened.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_open_failure_is_fatal_by_default() {
    let catalog = format!("{}{}", fips_control(), manual_control("V-67763"));
    let h = harness(&catalog, MockState::default(), true);

    let err = h.use_case.execute(request()).await.unwrap_err();
    assert!(matches!(
        err.downcast_ref::<AuditError>(),
        Some(AuditError::Connection { .. })
    ));
}

#[tokio::test]
async fn test_continue_without_target() {
    let catalog = format!("{}{}", fips_control(), manual_control("V-67763"));
    let h = harness(&catalog, MockState::default(), true);
    let request = RunRequest::builder()
        .continue_without_target(true)
        .build()
        .unwrap();

    let report = h.use_case.execute(request).await.unwrap().report.unwrap();
    assert_eq!(statuses(&report), vec![Status::Error, Status::SkippedManual]);
    assert!(matches!(
        report.get("V-67871").unwrap().failure(),
        Some(CheckFailure::TargetUnavailable { .. })
    ));
    assert!(h.reporter.contains("Continuing without a target"));
}

#[tokio::test]
async fn test_query_error_is_local_to_control() {
    let catalog = format!("{}{}", query_control("V-1", "BROKEN"), query_control("V-2", "GOOD"));
    let state = MockState::default()
        .with_failure("BROKEN", QueryFailure::Malformed("syntax error".to_string()))
        .with_rows("GOOD", vec![Row::new().with("value", 1i64)]);
    let h = harness(&catalog, state, false);

    let report = run_report(&h).await;
    assert_eq!(statuses(&report), vec![Status::Error, Status::Pass]);
    match report.get("V-1").unwrap().failure() {
        Some(CheckFailure::Query { reason, .. }) => {
            assert_eq!(reason, &QueryFailure::Malformed("syntax error".to_string()))
        }
        other => panic!("unexpected failure: {:?}", other),
    }
}

#[tokio::test]
async fn test_query_timeout_becomes_error() {
    let state = MockState::default()
        .with_rows("SLOW", vec![Row::new().with("value", 1i64)])
        .with_delay("SLOW", Duration::from_secs(10));
    let h = harness(&query_control("V-1", "SLOW"), state, false);
    let request = RunRequest::builder()
        .query_timeout(Duration::from_millis(50))
        .build()
        .unwrap();

    let report = h.use_case.execute(request).await.unwrap().report.unwrap();
    match report.get("V-1").unwrap().failure() {
        Some(CheckFailure::Query { reason, .. }) => {
            assert_eq!(reason, &QueryFailure::Timeout(Duration::from_millis(50)))
        }
        other => panic!("unexpected failure: {:?}", other),
    }
}

#[tokio::test]
async fn test_panic_in_evaluation_becomes_error() {
    let catalog = format!("{}{}", query_control("V-1", "PANIC"), query_control("V-2", "GOOD"));
    let state = MockState::default().with_rows("GOOD", vec![Row::new().with("value", 1i64)]);
    let h = harness(&catalog, state, false);

    let report = run_report(&h).await;
    assert_eq!(statuses(&report), vec![Status::Error, Status::Pass]);
    match report.get("V-1").unwrap().failure() {
        Some(CheckFailure::Unexpected { details }) => assert!(details.contains("driver exploded")),
        other => panic!("unexpected failure: {:?}", other),
    }
}

#[tokio::test]
async fn test_cancellation_while_session_is_opening() {
    let signal = CancellationSignal::new();
    let catalog = format!("{}{}", fips_control(), manual_control("V-67763"));
    let state = MockState {
        open_delay: Some(Duration::from_secs(60)),
        ..MockState::default()
    };
    let h = harness(&catalog, state, false);
    let use_case = h.use_case.with_cancellation(signal.clone());

    let canceller = tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(20)).await;
        signal.cancel();
    });
    let response = tokio::time::timeout(Duration::from_secs(5), use_case.execute(request()))
        .await
        .expect("cancellation should interrupt the session open")
        .unwrap();
    canceller.await.unwrap();

    let report = response.report.as_ref().unwrap();
    assert_eq!(statuses(report), vec![Status::Cancelled, Status::Cancelled]);
    assert!(report.was_cancelled());
    assert_eq!(response.exit_code(), crate::shared::error::ExitCode::Cancelled);
    assert_eq!(h.opened.load(Ordering::SeqCst), 1);
    assert!(!h.state.closed.load(Ordering::SeqCst));
}

#[tokio::test]
async fn test_cancellation_after_three_controls() {
    let signal = CancellationSignal::new();
    let catalog: String = (1..=5)
        .map(|i| query_control(&format!("V-{}", i), "GOOD"))
        .collect();
    let state = MockState {
        cancel_on_query: Some((3, signal.clone())),
        ..MockState::default()
    }
    .with_rows("GOOD", vec![Row::new().with("value", 1i64)]);

    let h = harness(&catalog, state, false);
    let use_case = h.use_case.with_cancellation(signal);
    let response = use_case.execute(request()).await.unwrap();
    let report = response.report.as_ref().unwrap();

    assert_eq!(
        statuses(report),
        vec![
            Status::Pass,
            Status::Pass,
            Status::Pass,
            Status::Cancelled,
            Status::Cancelled
        ]
    );
    assert_eq!(h.state.queries.load(Ordering::SeqCst), 3);
    assert!(h.state.closed.load(Ordering::SeqCst));
    assert_eq!(response.exit_code(), crate::shared::error::ExitCode::Cancelled);
}

#[tokio::test]
async fn test_concurrent_session_preserves_order() {
    let catalog: String = (1..=6)
        .map(|i| query_control(&format!("V-{}", i), &format!("Q{}", i)))
        .collect();
    let mut state = MockState {
        concurrent: true,
        ..MockState::default()
    };
    for i in 1..=6u64 {
        let expression = format!("Q{}", i);
        let value: i64 = if i % 2 == 0 { 1 } else { 0 };
        state = state
            .with_rows(&expression, vec![Row::new().with("value", value)])
            .with_delay(&expression, Duration::from_millis(60 - i * 10));
    }
    let h = harness(&catalog, state, false);
    let request = RunRequest::builder().max_concurrency(4).build().unwrap();

    let report = h.use_case.execute(request).await.unwrap().report.unwrap();
    let ids: Vec<&str> = report.entries().iter().map(|e| e.id.as_str()).collect();
    assert_eq!(ids, vec!["V-1", "V-2", "V-3", "V-4", "V-5", "V-6"]);
    assert_eq!(
        statuses(&report),
        vec![
            Status::Fail,
            Status::Pass,
            Status::Fail,
            Status::Pass,
            Status::Fail,
            Status::Pass
        ]
    );
    assert!(h.state.max_in_flight.load(Ordering::SeqCst) > 1);
    assert!(h.state.max_in_flight.load(Ordering::SeqCst) <= 4);
}

#[tokio::test]
async fn test_sequential_session_runs_one_at_a_time() {
    let catalog: String = (1..=3)
        .map(|i| query_control(&format!("V-{}", i), "GOOD"))
        .collect();
    let state = MockState::default()
        .with_rows("GOOD", vec![Row::new().with("value", 1i64)])
        .with_delay("GOOD", Duration::from_millis(5));
    let h = harness(&catalog, state, false);
    let request = RunRequest::builder().max_concurrency(8).build().unwrap();

    h.use_case.execute(request).await.unwrap();
    assert_eq!(h.state.max_in_flight.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_repeated_runs_are_idempotent() {
    let catalog = format!(
        "{}{}{}",
        fips_control(),
        audit_permissions_control(),
        manual_control("V-67763")
    );
    let state = MockState::default()
        .with_value("fips/enabled", Scalar::Integer(1))
        .with_rows("PERMS", vec![Row::new().with("result", "CONTROL SERVER")]);
    let h = harness(&catalog, state, false);

    let first = run_report(&h).await;
    let second = run_report(&h).await;
    assert_eq!(statuses(&first), statuses(&second));
    assert_ne!(first.metadata().run_id(), second.metadata().run_id());
}

#[tokio::test]
async fn test_duplicate_ids_fail_execution() {
    let catalog = format!("{}{}", manual_control("V-1"), manual_control("V-1"));
    let h = harness(&catalog, MockState::default(), false);

    let err = h.use_case.execute(request()).await.unwrap_err();
    assert!(matches!(
        err.downcast_ref::<AuditError>(),
        Some(AuditError::DuplicateOrMissingIdentifier { .. })
    ));
    assert_eq!(h.opened.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_filters_and_unmatched_pattern_warning() {
    let catalog = format!(
        "{}{}{}",
        fips_control(),
        audit_permissions_control(),
        manual_control("V-67763")
    );
    let h = harness(&catalog, MockState::default(), true);
    let request = RunRequest::builder()
        .include_patterns(vec!["V-6776*".to_string(), "V-9*".to_string()])
        .exclude_patterns(vec!["V-67767".to_string()])
        .build()
        .unwrap();

    let response = h.use_case.execute(request).await.unwrap();
    let report = response.report.unwrap();
    assert_eq!(report.entries().len(), 1);
    assert_eq!(report.entries()[0].id.as_str(), "V-67763");
    assert!(h.reporter.contains("Pattern 'V-9*' did not match"));
    assert!(h.reporter.contains("Skipped 2 control(s)"));
}

#[tokio::test]
async fn test_dry_run_does_not_open_session() {
    let h = harness(&fips_control(), MockState::default(), true);
    let request = RunRequest::builder().dry_run(true).build().unwrap();

    let response = h.use_case.execute(request).await.unwrap();
    assert!(response.report.is_none());
    assert_eq!(response.controls.len(), 1);
    assert_eq!(h.opened.load(Ordering::SeqCst), 0);
    assert!(h.reporter.contains("1 control(s) validated"));
}

#[tokio::test]
async fn test_follow_up_note_is_appended() {
    let catalog = control(
        "V-67757",
        "  follow_up: Review each trigger's logic\n  verify:\n    check: existence\n    query: TRIGGERS\n    column: name\n",
    );
    let state = MockState::default().with_rows(
        "TRIGGERS",
        vec![Row::new().with_null("name"), Row::new().with("name", "audit_logon")],
    );
    let h = harness(&catalog, state, false);

    let report = run_report(&h).await;
    let outcome = report.get("V-67757").unwrap();
    assert_eq!(outcome.status(), Status::Pass);
    assert_eq!(outcome.evidence(), &[Scalar::text("audit_logon")]);
    assert_eq!(outcome.reason(), Some("Review each trigger's logic"));
}

#[tokio::test]
async fn test_progress_is_reported_per_control() {
    let catalog = format!("{}{}", manual_control("V-1"), manual_control("V-2"));
    let h = harness(&catalog, MockState::default(), false);
    run_report(&h).await;

    assert!(h.reporter.contains("V-1 skipped-manual"));
    assert!(h.reporter.contains("progress 2/2"));
    assert!(h.reporter.contains("Evaluated 2 control(s): 2 skipped-manual"));
}
