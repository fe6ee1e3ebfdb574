//! Integration tests for problems and validation batches

use cellvm_foundation::{ParamValue, Problem, ProblemFamily, ProblemId, SourcePosition, ValidationCollector};

// =============================================================================
// Problem Construction
// =============================================================================

#[test]
fn problem_ids_are_stable_codes() {
    assert_eq!(ProblemId::MODULE_NOT_FOUND.family(), ProblemFamily::User);
    assert_eq!(ProblemId::DUPLICATE_OPCODES.family(), ProblemFamily::Implementation);
    assert_eq!(ProblemId::NON_EVALUATED_VALUE.family(), ProblemFamily::Vm);
    assert_ne!(ProblemId::MODULE_NOT_FOUND.code(), ProblemId::CONST_NOT_FOUND.code());
}

#[test]
fn problem_display_names_its_parameters() {
    let problem = Problem::new(ProblemId::CONST_NOT_FOUND, Some(SourcePosition::new("m", 3, 7)))
        .with("module", "m")
        .with("constant", "nope");
    let msg = format!("{problem}");
    assert!(msg.starts_with("CONST_NOT_FOUND"));
    assert!(msg.contains("m:3:7"));
    assert!(msg.contains("nope"));
}

// =============================================================================
// Augmentation
// =============================================================================

#[test]
fn augmentation_never_overwrites_origin_fields() {
    let problem = Problem::new(ProblemId::TYPE_MISMATCH, None)
        .with("module", "inner")
        .augment("module", "outer")
        .augment("constant", "c");
    assert_eq!(problem.param_str("module"), Some("inner"));
    assert_eq!(problem.param_str("constant"), Some("c"));
}

#[test]
fn numeric_parameters() {
    let problem = Problem::new(ProblemId::ARGUMENT_COUNT, None).with("expected", 2_usize);
    assert_eq!(problem.param_num("expected"), Some(2.0));
    assert_eq!(problem.param("expected"), Some(&ParamValue::from(2_usize)));
    assert_eq!(problem.param_str("expected"), None);
}

// =============================================================================
// Batches
// =============================================================================

#[test]
fn collector_batches_everything() {
    let mut collector = ValidationCollector::new();
    collector
        .push(Problem::new(ProblemId::DUPLICATE_OPCODES, None))
        .add(None)
        .add(Some(Problem::new(ProblemId::MISSING_NATIVE_TYPE, None)));
    assert!(collector.is_err());

    let problems = collector.finish(()).unwrap_err();
    assert_eq!(problems.len(), 2);
    assert!(problems.contains(ProblemId::DUPLICATE_OPCODES));
    assert!(problems.contains(ProblemId::MISSING_NATIVE_TYPE));
}

#[test]
fn runtime_error_keeps_the_first_and_counts_the_rest() {
    let mut collector = ValidationCollector::new();
    collector.extend([
        Problem::new(ProblemId::ARGUMENT_VALUE, None).with("index", 0_usize),
        Problem::new(ProblemId::ARGUMENT_TYPE, None),
        Problem::new(ProblemId::ARGUMENT_REF, None),
    ]);
    let error = collector.into_runtime_error().unwrap();
    assert_eq!(error.id, ProblemId::ARGUMENT_VALUE);
    assert_eq!(error.param_num("index"), Some(0.0));
    assert_eq!(error.param_num("additional_errors"), Some(2.0));

    assert!(ValidationCollector::new().into_runtime_error().is_none());
}
