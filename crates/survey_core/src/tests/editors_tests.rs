use super::*;
use shared::domain::LIKERT_MAX;

#[test]
fn every_mutation_reports_full_draft() {
    let mut reports = Vec::new();
    let snapshot = Demographics::default();
    {
        let mut editor = DemographicsEditor::new(&snapshot, |d| reports.push(d));
        editor.set_initials("JD");
        editor.set_specialty("Radiology");
        editor.set_experience("minimal");
    }
    assert_eq!(reports.len(), 3);
    assert_eq!(reports[0].initials, "JD");
    assert_eq!(reports[2].initials, "JD");
    assert_eq!(reports[2].specialty, "Radiology");
    assert_eq!(reports[2].experience, "minimal");
    assert_eq!(snapshot, Demographics::default());
}

#[test]
fn other_specialty_is_cleared_when_specialty_changes_away_from_other() {
    let mut last = None;
    {
        let mut editor = DemographicsEditor::new(&Demographics::default(), |d| last = Some(d));
        editor.set_specialty(choices::OTHER);
        editor.set_other_specialty("Pulmonology");
        assert_eq!(editor.draft().other_specialty, "Pulmonology");
        editor.set_specialty("Cardiology");
    }
    let last = last.expect("reported");
    assert_eq!(last.specialty, "Cardiology");
    assert!(last.other_specialty.is_empty());
}

#[test]
fn other_fields_are_ignored_unless_other_is_selected() {
    let mut last = None;
    {
        let mut editor = DemographicsEditor::new(&Demographics::default(), |d| last = Some(d));
        editor.set_training_status("Resident");
        editor.set_other_training_status("Fellow");
        editor.set_other_specialty("Pulmonology");
    }
    let last = last.expect("reported");
    assert!(last.other_training_status.is_empty());
    assert!(last.other_specialty.is_empty());
}

#[test]
fn other_training_status_is_cleared_on_change() {
    let mut last = None;
    {
        let mut editor = DemographicsEditor::new(&Demographics::default(), |d| last = Some(d));
        editor.set_training_status(choices::OTHER);
        editor.set_other_training_status("Visiting scholar");
        editor.set_training_status("Attending");
    }
    let last = last.expect("reported");
    assert!(last.other_training_status.is_empty());
}

#[test]
fn slicer_familiarity_follows_used_3d_slicer() {
    let mut last = None;
    {
        let mut editor = DemographicsEditor::new(&Demographics::default(), |d| last = Some(d));
        editor.set_slicer_familiarity_position(2).expect("position");
        assert_eq!(editor.draft().slicer_familiarity, None);

        editor.set_used_3d_slicer(choices::YES);
        editor.set_slicer_familiarity_position(2).expect("position");
        assert_eq!(
            editor.draft().slicer_familiarity,
            Some(Likert::new(3).expect("likert"))
        );

        editor.set_used_3d_slicer(choices::NO);
    }
    let last = last.expect("reported");
    assert_eq!(last.used_3d_slicer, choices::NO);
    assert_eq!(last.slicer_familiarity, None);
}

#[test]
fn slider_positions_map_to_one_based_ratings() {
    let mut last = None;
    {
        let mut editor =
            DepthGuideEditor::new(&DepthGuideFeedback::default(), |d| last = Some(d));
        editor.set_usefulness_position(0).expect("min");
        assert_eq!(editor.draft().usefulness.map(Likert::value), Some(1));
        editor.set_usefulness_position(LIKERT_MAX - 1).expect("max");
    }
    let last = last.expect("reported");
    assert_eq!(last.usefulness.map(Likert::value), Some(LIKERT_MAX));
    assert_eq!(last.usefulness.map(Likert::slider_position), Some(LIKERT_MAX - 1));
}

#[test]
fn out_of_range_slider_is_rejected_without_report() {
    let mut calls = 0;
    let result = {
        let mut editor = DepthGuideEditor::new(&DepthGuideFeedback::default(), |_| calls += 1);
        editor.set_usefulness_position(LIKERT_MAX)
    };
    assert!(matches!(result, Err(EditError::Rating(_))));
    assert_eq!(calls, 0);
}

#[test]
fn sus_answers_validate_question_and_rating() {
    let mut last = None;
    {
        let mut editor = SusEditor::new(&SusResponses::default(), |d| last = Some(d));
        editor.set_answer(1, 5).expect("answer");
        editor.set_answer(10, 1).expect("answer");
        assert_eq!(editor.set_answer(0, 3), Err(EditError::QuestionOutOfRange(0)));
        assert_eq!(editor.set_answer(11, 3), Err(EditError::QuestionOutOfRange(11)));
        assert!(matches!(editor.set_answer(4, 0), Err(EditError::Rating(_))));
    }
    let last = last.expect("reported");
    assert_eq!(last.get(1).map(Likert::value), Some(5));
    assert_eq!(last.get(10).map(Likert::value), Some(1));
    assert_eq!(last.answered(), 2);
}

#[test]
fn nasa_tlx_scores_clamp_to_workload_max() {
    let mut last = None;
    {
        let mut editor = NasaTlxEditor::new(&NasaTlx::default(), |d| last = Some(d));
        editor
            .set_score(TlxCondition::WithDepthGuide, 0, 3)
            .expect("score");
        editor
            .set_score(TlxCondition::WithoutDepthGuide, 5, 40)
            .expect("score");
        assert_eq!(
            editor.set_score(TlxCondition::WithDepthGuide, 6, 1),
            Err(EditError::DimensionOutOfRange(6))
        );
    }
    let last = last.expect("reported");
    assert_eq!(last.with_depth_guide, [3, 0, 0, 0, 0, 0]);
    assert_eq!(last.without_depth_guide, [0, 0, 0, 0, 0, WORKLOAD_MAX]);
}

#[test]
fn general_feedback_edits_apply_through_wire_enum() {
    let mut last = None;
    {
        let mut editor = GeneralFeedbackEditor::new(&GeneralFeedback::default(), |d| last = Some(d));
        editor
            .apply(GeneralFeedbackEdit::Responsiveness(4))
            .expect("edit");
        editor
            .apply(GeneralFeedbackEdit::ShortcutsHelp("faster".into()))
            .expect("edit");
    }
    let last = last.expect("reported");
    assert_eq!(last.responsiveness.map(Likert::value), Some(5));
    assert_eq!(last.shortcuts_help, "faster");
    assert_eq!(last.icons_layout_clarity, None);
}

#[test]
fn apply_edit_dispatches_and_leaves_snapshot_untouched() {
    let snapshot = SectionDraft::empty(SectionId::NasaTlx);
    let updated = apply_edit(
        &snapshot,
        SectionEdit::NasaTlx(NasaTlxEdit {
            condition: TlxCondition::WithDepthGuide,
            dimension: 0,
            value: 3,
        }),
    )
    .expect("edit");

    let SectionDraft::NasaTlx(scores) = updated else {
        panic!("expected nasa tlx draft");
    };
    assert_eq!(scores.with_depth_guide, [3, 0, 0, 0, 0, 0]);
    assert_eq!(snapshot, SectionDraft::empty(SectionId::NasaTlx));
}

#[test]
fn apply_edit_rejects_mismatched_section() {
    let snapshot = SectionDraft::empty(SectionId::Sus);
    let err = apply_edit(
        &snapshot,
        SectionEdit::Demographics(DemographicsEdit::Initials("AB".into())),
    )
    .expect_err("mismatch");
    assert_eq!(
        err,
        EditError::SectionMismatch {
            section: SectionId::Sus,
            edit: SectionId::Demographics,
        }
    );
}
