use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use pretty_assertions::assert_eq;
use rust_mda::axis::{AxisIndex, CounterAxis, Prefix};
use rust_mda::prelude::*;
use rust_mda::sequence::Combination;

fn index_maps(seq: &MdaSequence, options: &IterOptions) -> Vec<Vec<(String, usize)>> {
    seq.iter_axes_with(options)
        .map(|c| {
            c.unwrap()
                .prefix
                .indices()
                .into_iter()
                .collect::<Vec<_>>()
        })
        .collect()
}

fn pairs(entries: &[(&str, usize)]) -> Vec<(String, usize)> {
    entries.iter().map(|(k, i)| (k.to_string(), *i)).collect()
}

fn tcz() -> MdaSequence {
    MdaSequence::builder()
        .values("t", [0, 1])
        .values("c", ["red", "green", "blue"])
        .values("z", [0.1, 0.3])
        .axis_order(["t", "c", "z"])
        .build()
        .unwrap()
}

#[test]
fn test_tcz_example() {
    let maps = index_maps(&tcz(), &IterOptions::default());
    assert_eq!(maps.len(), 12);
    assert_eq!(maps[0], pairs(&[("t", 0), ("c", 0), ("z", 0)]));
    assert_eq!(maps[1], pairs(&[("t", 0), ("c", 0), ("z", 1)]));
    assert_eq!(maps[2], pairs(&[("t", 0), ("c", 1), ("z", 0)]));
    assert_eq!(maps[11], pairs(&[("t", 1), ("c", 2), ("z", 1)]));
}

#[test]
fn test_count_is_product_of_lengths() {
    let seq = MdaSequence::builder()
        .values("a", [1, 2, 3])
        .values("b", [1, 2, 3, 4])
        .values("c", ["x", "y"])
        .build()
        .unwrap();
    let expected: usize = seq.sizes().unwrap().values().product();
    assert_eq!(expected, 24);
    assert_eq!(seq.iter_axes().count(), expected);
    assert_eq!(seq.iter_events().count(), expected);
}

#[test]
fn test_axis_order_only_changes_emission_order() {
    let seq = MdaSequence::builder()
        .values("t", [0, 1])
        .channels([Channel::new("DAPI"), Channel::new("FITC").with_exposure(5.0)])
        .z(ZPlan::absolute(vec![1.0, 2.0, 3.0]))
        .build()
        .unwrap();

    let rendered = |order: &str| -> Vec<String> {
        let options = IterOptions::default().with_axis_order(order.chars().map(String::from));
        let mut events: Vec<String> = seq
            .iter_events_with(&options)
            .map(|e| {
                let mut event = e.unwrap();
                event.reset_event_timer = false;
                let index: BTreeMap<String, usize> =
                    std::mem::take(&mut event.index).into_iter().collect();
                format!("{index:?} {}", serde_json::to_string(&event).unwrap())
            })
            .collect();
        events.sort();
        events
    };

    let reference = rendered("tcz");
    assert_eq!(reference.len(), 12);
    for order in ["zct", "ctz", "tzc"] {
        assert_eq!(rendered(order), reference, "order {order}");
    }
}

#[test]
fn test_override_replaces_axes_for_one_branch() {
    let nested = MdaSequence::builder()
        .values("c", ["x", "y", "w"])
        .values("z", [9.0])
        .value(1)
        .build()
        .unwrap();
    let seq = MdaSequence::builder()
        .values("t", [AxisItem::from(0), AxisItem::from(nested)])
        .values("c", ["red", "green"])
        .values("z", [0.1, 0.3])
        .build()
        .unwrap();

    let combos: Vec<Combination> = seq.iter_axes().collect::<AppResult<_>>().unwrap();
    assert_eq!(combos.len(), 2 * 2 + 3);

    let value = |prefix: &Prefix, key: &str| prefix.get(key).unwrap().value.clone();
    for combo in &combos[..4] {
        assert_eq!(value(&combo.prefix, "t"), AxisValue::from(0));
        assert!(["red", "green"].map(AxisValue::from).contains(&value(&combo.prefix, "c")));
        assert_eq!(combo.context.len(), 1);
    }
    let branch: Vec<AxisValue> = combos[4..]
        .iter()
        .map(|combo| {
            assert_eq!(value(&combo.prefix, "t"), AxisValue::from(1));
            assert_eq!(value(&combo.prefix, "z"), AxisValue::from(9.0));
            assert_eq!(combo.context.len(), 2);
            value(&combo.prefix, "c")
        })
        .collect();
    assert_eq!(branch, ["x", "y", "w"].map(AxisValue::from));
}

#[test]
fn test_override_can_add_axes() {
    let nested = MdaSequence::builder()
        .values("q", [0, 1])
        .value(1)
        .build()
        .unwrap();
    let seq = MdaSequence::builder()
        .values("t", [AxisItem::from(0), AxisItem::from(nested)])
        .values("c", ["red", "green"])
        .build()
        .unwrap();

    let maps = index_maps(&seq, &IterOptions::default());
    assert_eq!(maps.len(), 2 + 4);
    assert_eq!(maps[2], pairs(&[("t", 1), ("c", 0), ("q", 0)]));
    assert_eq!(maps[3], pairs(&[("t", 1), ("c", 0), ("q", 1)]));
}

#[test]
fn test_nested_sequence_order_falls_back_to_caller_order() {
    let nested = MdaSequence::builder()
        .values("a", [0])
        .values("b", [0])
        .value(0)
        .build()
        .unwrap();
    let seq = MdaSequence::builder()
        .values("t", [nested])
        .build()
        .unwrap();

    let keys = |options: &IterOptions| -> Vec<String> {
        index_maps(&seq, options)[0].iter().map(|(k, _)| k.clone()).collect()
    };
    assert_eq!(keys(&IterOptions::default()), ["t", "a", "b"]);
    let options = IterOptions::default().with_axis_order(["t", "b", "a"]);
    assert_eq!(keys(&options), ["t", "b", "a"]);
}

/// Vetoes `v = 1` whenever `c` sits at index 0.
#[derive(Debug)]
struct Veto;

impl AxisIterable for Veto {
    fn axis_key(&self) -> &str {
        "v"
    }

    fn iter(&self) -> Box<dyn Iterator<Item = AxisItem>> {
        Box::new((0..3).map(AxisItem::from))
    }

    fn length(&self) -> Option<usize> {
        Some(3)
    }

    fn should_skip(&self, prefix: &Prefix) -> bool {
        prefix.index_of("v") == Some(1) && prefix.index_of("c") == Some(0)
    }
}

#[test]
fn test_skip_is_a_pure_veto() {
    let seq = MdaSequence::builder()
        .custom_axis(Veto)
        .values("c", ["a", "b"])
        .build()
        .unwrap();

    let maps = index_maps(&seq, &IterOptions::default());
    assert_eq!(maps.len(), 3 * 2 - 1);
    assert!(!maps.contains(&pairs(&[("v", 1), ("c", 0)])));
    assert!(maps.contains(&pairs(&[("v", 1), ("c", 1)])));
    assert!(maps.iter().all(|m| m.len() == 2));
}

#[test]
fn test_windowed_enumeration_matches_eager_product() {
    let seq = MdaSequence::builder()
        .custom_axis(CounterAxis::new("n"))
        .values("b", [0, 1, 2, 3, 4])
        .build()
        .unwrap();
    let expected: Vec<_> = (0..37).map(|i| pairs(&[("n", i / 5), ("b", i % 5)])).collect();

    for window in [1, 5, 1000] {
        let options = IterOptions::default().with_window_size(window);
        let got: Vec<_> = seq
            .iter_axes_with(&options)
            .take(37)
            .map(|c| c.unwrap().prefix.indices().into_iter().collect::<Vec<_>>())
            .collect();
        assert_eq!(got, expected, "window size {window}");
    }
}

#[test]
fn test_windowed_values_keep_absolute_indices() {
    let seq = MdaSequence::builder()
        .values("b", [0, 1])
        .custom_axis(CounterAxis::new("n"))
        .build()
        .unwrap();
    let options = IterOptions::default().with_window_size(3);
    let got: Vec<(usize, AxisValue)> = seq
        .iter_axes_with(&options)
        .take(9)
        .map(|c| {
            let c = c.unwrap();
            let n = c.prefix.get("n").unwrap();
            (n.index, n.value.clone())
        })
        .collect();
    // window 0..3 for b=0, b=1, then window 3..6 for b=0
    let expected: Vec<(usize, AxisValue)> = [0, 1, 2, 0, 1, 2, 3, 4, 5]
        .into_iter()
        .map(|i| (i, AxisValue::Integer(i as i64)))
        .collect();
    assert_eq!(got, expected);
}

#[test]
fn test_unbounded_axis_inside_override_is_lazy() {
    let nested = MdaSequence::builder()
        .custom_axis(CounterAxis::new("n"))
        .value(1)
        .build()
        .unwrap();
    let seq = MdaSequence::builder()
        .values("t", [AxisItem::from(0), AxisItem::from(nested)])
        .build()
        .unwrap();

    let maps = index_maps_limited(&seq, 4);
    assert_eq!(maps[0], pairs(&[("t", 0)]));
    assert_eq!(maps[1], pairs(&[("t", 1), ("n", 0)]));
    assert_eq!(maps[3], pairs(&[("t", 1), ("n", 2)]));
}

#[test]
fn test_override_with_unbounded_axis_is_windowed() {
    let nested = MdaSequence::builder()
        .values("c", [0, 1])
        .custom_axis(CounterAxis::new("n"))
        .value(0)
        .build()
        .unwrap();
    let seq = MdaSequence::builder()
        .values("t", [nested])
        .build()
        .unwrap();

    let options = IterOptions::default().with_window_size(3);
    let got: Vec<(usize, usize)> = seq
        .iter_axes_with(&options)
        .take(9)
        .map(|c| {
            let c = c.unwrap();
            (c.prefix.index_of("c").unwrap(), c.prefix.index_of("n").unwrap())
        })
        .collect();
    assert_eq!(
        got,
        vec![
            (0, 0),
            (0, 1),
            (0, 2),
            (1, 0),
            (1, 1),
            (1, 2),
            (0, 3),
            (0, 4),
            (0, 5),
        ]
    );
}

#[test]
fn test_unbounded_axis_with_empty_axis_ends() {
    let seq = MdaSequence::builder()
        .custom_axis(CounterAxis::new("n"))
        .values("b", Vec::<i32>::new())
        .build()
        .unwrap();
    let options = IterOptions::default().with_window_size(10);
    assert_eq!(seq.iter_axes_with(&options).count(), 0);

    let empty_branch = MdaSequence::builder()
        .values("b", Vec::<i32>::new())
        .value(1)
        .build()
        .unwrap();
    let seq = MdaSequence::builder()
        .custom_axis(CounterAxis::new("n"))
        .values("t", [empty_branch])
        .build()
        .unwrap();
    assert_eq!(seq.iter_axes_with(&options).count(), 0);

    let nested = MdaSequence::builder()
        .custom_axis(CounterAxis::new("n"))
        .values("b", Vec::<i32>::new())
        .value(1)
        .build()
        .unwrap();
    let seq = MdaSequence::builder()
        .values("t", [AxisItem::from(0), AxisItem::from(nested)])
        .build()
        .unwrap();
    assert_eq!(index_maps(&seq, &options), vec![pairs(&[("t", 0)])]);
}

fn index_maps_limited(seq: &MdaSequence, limit: usize) -> Vec<Vec<(String, usize)>> {
    seq.iter_events()
        .take(limit)
        .map(|e| e.unwrap().index.into_iter().collect())
        .collect()
}

/// Axis whose value list grows by one every time it is iterated.
///
/// Re-iterating it is not idempotent.
#[derive(Debug, Default)]
struct Growing {
    values: Mutex<Vec<i64>>,
}

impl AxisIterable for Growing {
    fn axis_key(&self) -> &str {
        "g"
    }

    fn iter(&self) -> Box<dyn Iterator<Item = AxisItem>> {
        let mut values = self.values.lock().unwrap();
        let snapshot = values.clone();
        values.push(snapshot.len() as i64);
        Box::new(snapshot.into_iter().map(AxisItem::from))
    }

    fn length(&self) -> Option<usize> {
        Some(self.values.lock().unwrap().len())
    }
}

#[test]
fn test_stateful_axis_grows_between_enumerations() {
    let growing = Arc::new(Axis::custom(Growing {
        values: Mutex::new(vec![0]),
    }));
    let seq = MdaSequence::builder()
        .shared_axis(Arc::clone(&growing))
        .values("b", [0, 1])
        .build()
        .unwrap();

    assert_eq!(seq.iter_axes().count(), 2);
    assert_eq!(seq.iter_axes().count(), 4);
    assert_eq!(growing.length(), Some(3));
}

#[test]
fn test_empty_sequence_yields_one_empty_event() {
    let events: Vec<MdaEvent> = MdaSequence::default()
        .iter_events()
        .collect::<AppResult<_>>()
        .unwrap();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].index, AxisIndex::new());
}

#[test]
fn test_iteration_is_restartable() {
    let seq = tcz();
    let first: Vec<MdaEvent> = seq.iter_events().collect::<AppResult<_>>().unwrap();
    let second: Vec<MdaEvent> = seq.iter_events().collect::<AppResult<_>>().unwrap();
    assert_eq!(first, second);
}

#[test]
fn test_sizes_fail_for_unbounded_sequence() {
    let seq = MdaSequence::builder()
        .values("c", ["a"])
        .custom_axis(CounterAxis::new("n"))
        .build()
        .unwrap();
    assert!(matches!(
        seq.sizes(),
        Err(SequenceError::Unbounded { ref axis, .. }) if axis == "n"
    ));

    let bounded = MdaSequence::builder()
        .values("c", ["a"])
        .custom_axis(CounterAxis::new("n").with_stop(3))
        .build()
        .unwrap();
    assert_eq!(bounded.shape().unwrap(), vec![1, 3]);
}
