use std::time::Duration;

use pretty_assertions::assert_eq;
use rust_mda::prelude::*;

fn events(seq: &MdaSequence) -> Vec<MdaEvent> {
    seq.iter_events().collect::<AppResult<_>>().unwrap()
}

fn channel_names(events: &[MdaEvent]) -> Vec<String> {
    events
        .iter()
        .map(|e| e.channel.as_ref().map_or_else(String::new, |c| c.config.clone()))
        .collect()
}

fn sub(builder: rust_mda::sequence::SequenceBuilder, at: Position) -> AxisItem {
    AxisItem::from(builder.value(at).build().unwrap())
}

#[test]
fn test_channel_acquired_every_other_time_point() {
    let seq = MdaSequence::builder()
        .time(TimePlan::interval_loops(Duration::from_secs(1), 3))
        .channels([Channel::new("DAPI"), Channel::new("FITC").with_acquire_every(2)])
        .build()
        .unwrap();

    let events = events(&seq);
    assert_eq!(events.len(), 5);
    assert_eq!(
        channel_names(&events),
        ["DAPI", "FITC", "DAPI", "DAPI", "FITC"]
    );
    assert_eq!(events[2].index_of("t"), Some(1));
}

#[test]
fn test_channel_without_stack_uses_middle_plane() {
    let seq = MdaSequence::builder()
        .channels([Channel::new("A"), Channel::new("B").with_do_stack(false)])
        .z(ZPlan::absolute(vec![0.0, 1.0, 2.0, 3.0, 4.0]))
        .axis_order(["c", "z"])
        .build()
        .unwrap();

    let events = events(&seq);
    assert_eq!(events.len(), 6);
    assert_eq!(events[5].channel.as_ref().map(|c| c.config.as_str()), Some("B"));
    assert_eq!(events[5].index_of("z"), Some(2));
    assert_eq!(events[5].z_pos, Some(2.0));
}

#[test]
fn test_empty_sub_sequence_keeps_first_channel_only() {
    let seq = MdaSequence::builder()
        .stage_positions(StagePositions::new([
            AxisItem::from(Position::xy(0.0, 0.0)),
            sub(MdaSequence::builder(), Position::xy(10.0, 0.0)),
        ]))
        .channels([Channel::new("A"), Channel::new("B")])
        .axis_order(["p", "c"])
        .build()
        .unwrap();

    let events = events(&seq);
    assert_eq!(channel_names(&events), ["A", "B", "A"]);
    assert_eq!(events[2].x_pos, Some(10.0));
}

#[test]
fn test_sub_sequence_with_autofocus_keeps_parent_channels() {
    let seq = MdaSequence::builder()
        .stage_positions(StagePositions::new([
            AxisItem::from(Position::xy(0.0, 0.0)),
            sub(
                MdaSequence::builder().autofocus(AxesBasedAf::new(["p"])),
                Position::xy(10.0, 0.0),
            ),
        ]))
        .channels([Channel::new("A"), Channel::new("B")])
        .axis_order(["p", "c"])
        .build()
        .unwrap();

    let events = events(&seq);
    let acquisitions: Vec<&MdaEvent> =
        events.iter().filter(|e| e.action.is_acquire_image()).collect();
    assert_eq!(acquisitions.len(), 4);
    assert_eq!(events.len(), 5);
    assert!(matches!(events[2].action, Action::HardwareAutofocus { .. }));
    assert_eq!(events[2].x_pos, Some(10.0));
}

#[test]
fn test_sub_sequence_z_plan_keeps_parent_channels() {
    let seq = MdaSequence::builder()
        .stage_positions(StagePositions::new([
            AxisItem::from(Position::xy(0.0, 0.0)),
            sub(
                MdaSequence::builder().z(ZPlan::relative(vec![0.0, 1.0])),
                Position::xyz(10.0, 0.0, 50.0),
            ),
        ]))
        .channels([Channel::new("A"), Channel::new("B")])
        .axis_order(["p", "c"])
        .build()
        .unwrap();

    let events = events(&seq);
    assert_eq!(channel_names(&events), ["A", "B", "A", "A", "B", "B"]);
    let z: Vec<Option<f64>> = events[2..].iter().map(|e| e.z_pos).collect();
    assert_eq!(z, vec![Some(50.0), Some(51.0), Some(50.0), Some(51.0)]);
}

#[test]
fn test_sub_sequence_replaces_inner_parent_z() {
    let seq = MdaSequence::builder()
        .stage_positions(StagePositions::new([
            AxisItem::from(Position::xy(0.0, 0.0)),
            sub(
                MdaSequence::builder().z(ZPlan::relative(vec![0.0, 1.0])),
                Position::xyz(10.0, 0.0, 50.0),
            ),
        ]))
        .z(ZPlan::absolute(vec![0.0, 1.0, 2.0]))
        .axis_order(["p", "z"])
        .build()
        .unwrap();

    let z: Vec<Option<f64>> = events(&seq).iter().map(|e| e.z_pos).collect();
    assert_eq!(
        z,
        vec![Some(0.0), Some(1.0), Some(2.0), Some(50.0), Some(51.0)]
    );
}

#[test]
fn test_sub_sequence_z_plan_runs_once_under_outer_parent_z() {
    let seq = MdaSequence::builder()
        .z(ZPlan::absolute(vec![0.0, 1.0, 2.0]))
        .stage_positions(StagePositions::new([
            AxisItem::from(Position::xy(0.0, 0.0)),
            sub(
                MdaSequence::builder().z(ZPlan::relative(vec![0.0, 1.0])),
                Position::xyz(10.0, 0.0, 50.0),
            ),
        ]))
        .axis_order(["z", "p"])
        .build()
        .unwrap();

    let summary: Vec<(Option<f64>, Option<f64>)> =
        events(&seq).iter().map(|e| (e.x_pos, e.z_pos)).collect();
    assert_eq!(
        summary,
        vec![
            (Some(0.0), Some(0.0)),
            (Some(10.0), Some(50.0)),
            (Some(10.0), Some(51.0)),
            (Some(0.0), Some(1.0)),
            (Some(0.0), Some(2.0)),
        ]
    );
}

#[test]
fn test_sub_sequence_channels_with_plan_skip_outer_parent_channels() {
    let seq = MdaSequence::builder()
        .channels([Channel::new("A"), Channel::new("B")])
        .stage_positions(StagePositions::new([
            AxisItem::from(Position::xy(0.0, 0.0)),
            sub(
                MdaSequence::builder()
                    .channels([Channel::new("X")])
                    .z(ZPlan::relative(vec![0.0])),
                Position::xy(10.0, 0.0),
            ),
        ]))
        .axis_order(["c", "p"])
        .build()
        .unwrap();

    assert_eq!(channel_names(&events(&seq)), ["A", "X", "B"]);
}
