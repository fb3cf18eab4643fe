mod common;

use mosaic_core::cadence::{CadenceResolver, TimeStepRequest};
use mosaic_core::error::MosaicError;

use common::uniform_stamp;

// ---------------------------------------------------------------------------
// TimeStepRequest parsing
// ---------------------------------------------------------------------------

#[test]
fn test_parse_keywords() {
    assert_eq!("first".parse::<TimeStepRequest>().unwrap(), TimeStepRequest::First);
    assert_eq!("LAST".parse::<TimeStepRequest>().unwrap(), TimeStepRequest::Last);
    assert_eq!("all".parse::<TimeStepRequest>().unwrap(), TimeStepRequest::All);
    assert_eq!("".parse::<TimeStepRequest>().unwrap(), TimeStepRequest::All);
}

#[test]
fn test_parse_single_and_range() {
    assert_eq!(
        "3051".parse::<TimeStepRequest>().unwrap(),
        TimeStepRequest::Single(3051)
    );
    assert_eq!(
        "100..200".parse::<TimeStepRequest>().unwrap(),
        TimeStepRequest::Range { start: 100, end: 200 }
    );
}

#[test]
fn test_parse_rejects_reversed_range() {
    let err = "200..100".parse::<TimeStepRequest>().unwrap_err();
    assert!(matches!(err, MosaicError::InvalidRequest(_)));
}

#[test]
fn test_parse_rejects_garbage() {
    assert!("cadence".parse::<TimeStepRequest>().is_err());
    assert!("1..x".parse::<TimeStepRequest>().is_err());
}

#[test]
fn test_request_display_round_trips() {
    for text in ["first", "last", "all", "42", "5..9"] {
        let request: TimeStepRequest = text.parse().unwrap();
        assert_eq!(request.to_string(), text);
    }
}

// ---------------------------------------------------------------------------
// Resolution
// ---------------------------------------------------------------------------

#[test]
fn test_union_of_gapped_stamps() {
    let stamps = vec![
        uniform_stamp(0, 0, 2, 2, &[1, 2, 4], 1.0),
        uniform_stamp(4, 4, 2, 2, &[2, 3], 2.0),
    ];
    let resolver = CadenceResolver::new(&stamps, u32::MAX).unwrap();
    assert_eq!(resolver.union(), &[1, 2, 3, 4]);
    assert_eq!(
        resolver.resolve(&TimeStepRequest::All, 1).unwrap(),
        vec![1, 2, 3, 4]
    );
}

#[test]
fn test_first_and_last() {
    let stamps = vec![
        uniform_stamp(0, 0, 2, 2, &[5, 9], 1.0),
        uniform_stamp(0, 0, 2, 2, &[3, 7], 1.0),
    ];
    let resolver = CadenceResolver::new(&stamps, u32::MAX).unwrap();
    assert_eq!(resolver.resolve(&TimeStepRequest::First, 1).unwrap(), vec![3]);
    assert_eq!(resolver.resolve(&TimeStepRequest::Last, 1).unwrap(), vec![9]);
}

#[test]
fn test_single_missing_is_unknown_time_step() {
    let stamps = vec![uniform_stamp(0, 0, 2, 2, &[1, 2, 4], 1.0)];
    let resolver = CadenceResolver::new(&stamps, u32::MAX).unwrap();
    let err = resolver
        .resolve(&TimeStepRequest::Single(3), 1)
        .unwrap_err();
    assert!(matches!(err, MosaicError::UnknownTimeStep(3)));
}

#[test]
fn test_range_endpoint_must_exist() {
    let stamps = vec![uniform_stamp(0, 0, 2, 2, &[1, 2, 4], 1.0)];
    let resolver = CadenceResolver::new(&stamps, u32::MAX).unwrap();
    let err = resolver
        .resolve(&TimeStepRequest::Range { start: 1, end: 3 }, 1)
        .unwrap_err();
    assert!(matches!(err, MosaicError::UnknownTimeStep(3)));
}

#[test]
fn test_range_with_step() {
    let steps: Vec<i64> = (10..=20).collect();
    let stamps = vec![uniform_stamp(0, 0, 2, 2, &steps, 1.0)];
    let resolver = CadenceResolver::new(&stamps, u32::MAX).unwrap();
    let resolved = resolver
        .resolve(&TimeStepRequest::Range { start: 12, end: 18 }, 3)
        .unwrap();
    assert_eq!(resolved, vec![12, 15, 18]);
}

#[test]
fn test_step_zero_is_invalid() {
    let stamps = vec![uniform_stamp(0, 0, 2, 2, &[1], 1.0)];
    let resolver = CadenceResolver::new(&stamps, u32::MAX).unwrap();
    assert!(matches!(
        resolver.resolve(&TimeStepRequest::All, 0),
        Err(MosaicError::InvalidRequest(_))
    ));
}

#[test]
fn test_no_stamps_is_empty_sequence() {
    assert!(matches!(
        CadenceResolver::new(&[], u32::MAX),
        Err(MosaicError::EmptySequence)
    ));
}

// ---------------------------------------------------------------------------
// Per-stamp rows
// ---------------------------------------------------------------------------

#[test]
fn test_rows_are_matched_by_identifier_not_position() {
    let stamps = vec![
        uniform_stamp(0, 0, 2, 2, &[1, 2, 4], 1.0),
        uniform_stamp(0, 0, 2, 2, &[2, 3], 1.0),
    ];
    let resolver = CadenceResolver::new(&stamps, u32::MAX).unwrap();
    assert_eq!(resolver.rows_for(2), vec![Some(1), Some(0)]);
    assert_eq!(resolver.rows_for(3), vec![None, Some(1)]);
    assert_eq!(resolver.rows_for(4), vec![Some(2), None]);
}

#[test]
fn test_quality_flags_suppress_a_sample() {
    let flagged = uniform_stamp(0, 0, 2, 2, &[1, 2], 1.0)
        .with_quality_flags(vec![0, 0b100])
        .unwrap();
    let stamps = vec![flagged];

    let resolver = CadenceResolver::new(&stamps, u32::MAX).unwrap();
    assert_eq!(resolver.rows_for(1), vec![Some(0)]);
    assert_eq!(resolver.rows_for(2), vec![None]);
    assert!(resolver.contributions(2).is_empty());

    // A mask that ignores that bit keeps the sample.
    let lenient = CadenceResolver::new(&stamps, 0b001).unwrap();
    assert_eq!(lenient.rows_for(2), vec![Some(1)]);
}
