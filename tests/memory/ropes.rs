//! Integration tests for the persistent rope

use std::ops::ControlFlow;

use cellvm_foundation::ProblemId;
use cellvm_memory::{EvaluatedValue, IterRange, IterableValue, MemoryValue, SpliceNode};
use proptest::prelude::*;

use crate::{int_type, loose, str_type, text};

fn letters(items: &[&str]) -> Vec<MemoryValue> {
    items.iter().map(|s| loose(*s, str_type())).collect()
}

fn abcde() -> SpliceNode {
    SpliceNode::from_values(letters(&["a", "b"])).append(&SpliceNode::from_values(letters(&["c", "d", "e"])))
}

// =============================================================================
// Ranges
// =============================================================================

#[test]
fn appended_slice_marks_first_and_last() {
    let rope = abcde();
    let mut seen = Vec::new();
    rope.for_each_in(IterRange::new(1, 4), &mut |v, ctx| {
        seen.push((text(v).to_string(), ctx.index, ctx.first, ctx.last));
        ControlFlow::Continue(())
    });
    assert_eq!(
        seen,
        vec![
            ("b".to_string(), 1, true, false),
            ("c".to_string(), 2, false, false),
            ("d".to_string(), 3, false, true),
        ]
    );
    for (_, index, _, _) in &seen {
        let got = rope.get(*index).unwrap();
        let expected = rope.to_vec()[*index].clone();
        assert!(got.ptr_eq(&expected));
    }
}

#[test]
fn sub_ropes_share_elements() {
    let rope = abcde();
    let sub = rope.sub(1, 4).unwrap();
    let texts: Vec<String> = sub.to_vec().iter().map(|v| text(v).to_string()).collect();
    assert_eq!(texts, vec!["b", "c", "d"]);
    assert!(sub.get(0).unwrap().ptr_eq(&rope.get(1).unwrap()));
    assert_eq!(rope.len(), 5);
}

#[test]
fn negative_ends_count_back() {
    let rope = abcde();
    let mut count = 0;
    rope.for_each_in(IterRange::new(1, -1), &mut |_, _| {
        count += 1;
        ControlFlow::Continue(())
    });
    assert_eq!(count, 3);
}

#[test]
fn out_of_range_sub_is_an_error_value() {
    let err = abcde().sub(3, 9).unwrap_err();
    assert_eq!(err.id, ProblemId::INDEX_OUT_OF_RANGE);
    assert_eq!(err.param_num("size"), Some(5.0));
}

#[test]
fn visitors_can_stop_early() {
    let mut visited = 0;
    abcde().for_each(&mut |_, _| {
        visited += 1;
        if visited == 2 {
            ControlFlow::Break(())
        } else {
            ControlFlow::Continue(())
        }
    });
    assert_eq!(visited, 2);
}

// =============================================================================
// Agreement with Vec
// =============================================================================

fn ints_of(rope: &SpliceNode) -> Vec<i64> {
    rope.to_vec()
        .iter()
        .filter_map(|v| v.value().and_then(EvaluatedValue::as_int))
        .collect()
}

proptest! {
    #[test]
    fn appends_and_slices_agree_with_vec(
        chunks in prop::collection::vec(prop::collection::vec(any::<i64>(), 0..6), 1..6),
        a in 0_usize..40,
        b in 0_usize..40,
    ) {
        let mut rope = SpliceNode::empty();
        let mut model = Vec::new();
        for chunk in &chunks {
            let values = chunk.iter().map(|&i| loose(i, int_type())).collect();
            rope = rope.append(&SpliceNode::from_values(values));
            model.extend_from_slice(chunk);
        }
        prop_assert_eq!(ints_of(&rope), model.clone());

        let (start, end) = (a.min(b).min(model.len()), a.max(b).min(model.len()));
        let sub = rope.sub(start, end).unwrap();
        prop_assert_eq!(ints_of(&sub), model[start..end].to_vec());
        for i in 0..sub.len() {
            let got = sub.get(i).and_then(|v| v.value().and_then(EvaluatedValue::as_int));
            prop_assert_eq!(got, Some(model[start + i]));
        }
    }
}
