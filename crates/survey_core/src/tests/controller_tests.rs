use super::*;
use async_trait::async_trait;
use chrono::DateTime;
use futures::future::join_all;
use shared::{
    domain::{NasaTlx, SubmissionStatus, TlxCondition},
    protocol::{NasaTlxEdit, NoticeLevel, SubmissionPayload},
};
use std::{
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
    time::Duration,
};
use submission_gateway::{SinkError, SubmissionSink};
use tokio::sync::Notify;

#[derive(Default)]
struct RecordingSink {
    calls: AtomicUsize,
    fail: bool,
    payloads: Mutex<Vec<SubmissionPayload>>,
}

#[async_trait]
impl SubmissionSink for RecordingSink {
    fn name(&self) -> &'static str {
        "recording"
    }

    async fn deliver(&self, payload: &SubmissionPayload) -> Result<(), SinkError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.payloads.lock().await.push(payload.clone());
        tokio::task::yield_now().await;
        if self.fail {
            return Err(SinkError::UnexpectedResponse("relay offline".into()));
        }
        Ok(())
    }
}

/// Holds every delivery until released.
#[derive(Default)]
struct GatedSink {
    calls: AtomicUsize,
    fail: bool,
    entered: Notify,
    release: Notify,
}

#[async_trait]
impl SubmissionSink for GatedSink {
    fn name(&self) -> &'static str {
        "gated"
    }

    async fn deliver(&self, _payload: &SubmissionPayload) -> Result<(), SinkError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.entered.notify_one();
        self.release.notified().await;
        if self.fail {
            return Err(SinkError::UnexpectedResponse("relay offline".into()));
        }
        Ok(())
    }
}

fn controller_with(sink: Arc<dyn SubmissionSink>, variant: SurveyVariant) -> SessionController {
    SessionController::new(variant, SubmissionGateway::new(sink))
}

async fn settled_status(controller: &SessionController) -> SubmissionStatus {
    tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            let status = controller.snapshot().await.submission_status();
            if status != SubmissionStatus::InFlight {
                return status;
            }
            tokio::task::yield_now().await;
        }
    })
    .await
    .expect("submission settled")
}

async fn walk_to_last_section(controller: &SessionController) {
    loop {
        if controller.advance().await.is_err() {
            break;
        }
    }
}

#[tokio::test]
async fn view_reflects_navigation() {
    let controller = controller_with(Arc::new(RecordingSink::default()), SurveyVariant::DepthGuide);

    let view = controller.view().await;
    assert_eq!(view.current_step, 0);
    assert_eq!(view.section_count, 4);
    assert!(view.can_advance);
    assert!(!view.can_retreat);
    assert!(!view.can_submit);
    assert_eq!(view.sections[3].section, SectionId::DepthGuide);
    assert_eq!(view.sections[3].title, "Depth Guide");

    let view = controller.advance().await.expect("advance");
    assert_eq!(view.active_section, Some(SectionId::Sus));
    let view = controller.retreat().await.expect("retreat");
    assert_eq!(view.current_step, 0);
    assert_eq!(controller.retreat().await.unwrap_err(), SessionError::AtFirstSection);
}

#[tokio::test]
async fn submit_off_last_section_never_reaches_sink() {
    let sink = Arc::new(RecordingSink::default());
    let controller = controller_with(sink.clone(), SurveyVariant::GeneralFeedback);

    let err = controller.submit().await.unwrap_err();
    assert!(matches!(err, SessionError::NotOnLastSection { step: 0, .. }));
    assert_eq!(sink.calls.load(Ordering::SeqCst), 0);
    assert_eq!(
        controller.snapshot().await.submission_status(),
        SubmissionStatus::NotSubmitted
    );
}

#[tokio::test]
async fn successful_submit_completes_with_notice_and_verbatim_payload() {
    let sink = Arc::new(RecordingSink::default());
    let controller = controller_with(sink.clone(), SurveyVariant::DepthGuide);

    let nasa = NasaTlx {
        with_depth_guide: [3, 0, 0, 0, 0, 0],
        without_depth_guide: [0, 1, 2, 3, 4, 5],
    };
    controller
        .update_section(SectionId::NasaTlx, SectionDraft::NasaTlx(nasa.clone()))
        .await
        .expect("update");
    walk_to_last_section(&controller).await;
    let before = controller.snapshot().await;
    assert_eq!(before.current_step(), 3);

    let outcome = controller.submit().await.expect("submit");

    assert!(outcome.delivered);
    assert!(outcome.view.completed);
    assert_eq!(outcome.view.current_step, 4);
    assert_eq!(outcome.view.submission_status, SubmissionStatus::Succeeded);
    let notice = outcome.view.notice.expect("notice");
    assert_eq!(notice.level, NoticeLevel::Success);
    assert_eq!(notice.message, SUBMIT_SUCCESS_MESSAGE);

    let payloads = sink.payloads.lock().await;
    assert_eq!(payloads.len(), 1);
    assert_eq!(payloads[0].sections, before.drafts().to_vec());
    assert_eq!(
        payloads[0].section(SectionId::NasaTlx),
        Some(&SectionDraft::NasaTlx(nasa))
    );
    let json = payloads[0].to_json().expect("json");
    let timestamp = json["timestamp"].as_str().expect("timestamp");
    assert!(DateTime::parse_from_rfc3339(timestamp).is_ok());
    assert!(timestamp.ends_with('Z'));
    assert_eq!(json["nasaTlx"]["withDepthGuide"][0], 3);
}

#[tokio::test]
async fn failed_submit_keeps_step_and_allows_retry() {
    let sink = Arc::new(RecordingSink {
        fail: true,
        ..RecordingSink::default()
    });
    let controller = controller_with(sink.clone(), SurveyVariant::GeneralFeedback);
    walk_to_last_section(&controller).await;

    let outcome = controller.submit().await.expect("submit");
    assert!(!outcome.delivered);
    assert_eq!(outcome.view.current_step, 3);
    assert_eq!(outcome.view.submission_status, SubmissionStatus::Failed);
    assert!(outcome.view.can_submit);
    let notice = outcome.view.notice.expect("notice");
    assert_eq!(notice.level, NoticeLevel::Error);
    assert_eq!(notice.message, SUBMIT_FAILURE_MESSAGE);

    let retry = controller.submit().await.expect("retry");
    assert!(!retry.delivered);
    assert_eq!(sink.calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn concurrent_submits_make_exactly_one_sink_call() {
    let sink = Arc::new(RecordingSink::default());
    let controller = controller_with(sink.clone(), SurveyVariant::GeneralFeedback);
    walk_to_last_section(&controller).await;

    let results = join_all((0..8).map(|_| controller.submit())).await;

    let delivered = results.iter().filter(|r| r.is_ok()).count();
    assert_eq!(delivered, 1);
    assert!(results.iter().filter_map(|r| r.as_ref().err()).all(|err| matches!(
        err,
        SessionError::SubmissionInFlight | SessionError::Completed
    )));
    assert_eq!(sink.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn second_submit_while_in_flight_is_rejected() {
    let sink = Arc::new(GatedSink::default());
    let controller = Arc::new(controller_with(sink.clone(), SurveyVariant::DepthGuide));
    walk_to_last_section(&controller).await;

    let first = tokio::spawn({
        let controller = controller.clone();
        async move { controller.submit().await }
    });
    sink.entered.notified().await;

    assert_eq!(
        controller.view().await.submission_status,
        SubmissionStatus::InFlight
    );
    assert_eq!(controller.submit().await.unwrap_err(), SessionError::SubmissionInFlight);
    assert_eq!(controller.retreat().await.unwrap_err(), SessionError::SubmissionInFlight);

    sink.release.notify_one();
    let outcome = first.await.expect("join").expect("submit");
    assert!(outcome.delivered);
    assert_eq!(sink.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn dropped_submit_still_records_failure_and_allows_retry() {
    let sink = Arc::new(GatedSink {
        fail: true,
        ..GatedSink::default()
    });
    let controller = Arc::new(controller_with(sink.clone(), SurveyVariant::GeneralFeedback));
    walk_to_last_section(&controller).await;

    let caller = tokio::spawn({
        let controller = controller.clone();
        async move { controller.submit().await }
    });
    sink.entered.notified().await;
    caller.abort();
    assert!(caller.await.expect_err("aborted").is_cancelled());

    sink.release.notify_one();
    assert_eq!(settled_status(&controller).await, SubmissionStatus::Failed);
    assert_eq!(controller.snapshot().await.current_step(), 3);
    assert!(controller.view().await.can_submit);
    controller.retreat().await.expect("retreat after failure");
    assert_eq!(sink.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn dropped_submit_still_completes_delivery() {
    let sink = Arc::new(GatedSink::default());
    let controller = Arc::new(controller_with(sink.clone(), SurveyVariant::DepthGuide));
    walk_to_last_section(&controller).await;

    let caller = tokio::spawn({
        let controller = controller.clone();
        async move { controller.submit().await }
    });
    sink.entered.notified().await;
    caller.abort();
    let _ = caller.await;

    sink.release.notify_one();
    assert_eq!(settled_status(&controller).await, SubmissionStatus::Succeeded);
    assert!(controller.snapshot().await.is_completed());
    assert_eq!(controller.submit().await.unwrap_err(), SessionError::Completed);
}

#[tokio::test]
async fn edits_route_through_editors() {
    let controller = controller_with(Arc::new(RecordingSink::default()), SurveyVariant::DepthGuide);

    let view = controller
        .apply_edit(
            SectionId::NasaTlx,
            SectionEdit::NasaTlx(NasaTlxEdit {
                condition: TlxCondition::WithoutDepthGuide,
                dimension: 2,
                value: 25,
            }),
        )
        .await
        .expect("edit");
    let entry = view
        .sections
        .iter()
        .find(|entry| entry.section == SectionId::NasaTlx)
        .expect("entry");
    let SectionDraft::NasaTlx(scores) = &entry.draft else {
        panic!("expected nasa tlx draft");
    };
    assert_eq!(scores.without_depth_guide, [0, 0, 20, 0, 0, 0]);

    let err = controller
        .apply_edit(
            SectionId::GeneralFeedback,
            SectionEdit::from_json(SectionId::GeneralFeedback, serde_json::json!({
                "field": "overallFeedback",
                "value": "great"
            }))
            .expect("decode"),
        )
        .await
        .unwrap_err();
    assert_eq!(err, SessionError::SectionNotInLayout(SectionId::GeneralFeedback));
}

#[tokio::test]
async fn completed_session_rejects_further_changes() {
    let controller = controller_with(Arc::new(RecordingSink::default()), SurveyVariant::GeneralFeedback);
    walk_to_last_section(&controller).await;
    controller.submit().await.expect("submit");

    assert_eq!(controller.submit().await.unwrap_err(), SessionError::Completed);
    assert_eq!(controller.advance().await.unwrap_err(), SessionError::Completed);
    assert_eq!(
        controller
            .update_section(SectionId::Sus, SectionDraft::empty(SectionId::Sus))
            .await
            .unwrap_err(),
        SessionError::Completed
    );
}
