use encore_domain_timeline::{instrument_hint, normalize, TimeContext};
use pretty_assertions::assert_eq;
use serde_json::{json, Value};

fn keys(outcome_events: &[encore_domain_timeline::NoteEvent]) -> Vec<(f64, Vec<u8>)> {
    outcome_events
        .iter()
        .map(|e| (e.time, e.notes.iter().map(|p| p.key()).collect()))
        .collect()
}

fn run(raw: Value) -> encore_domain_timeline::NormalizeOutcome {
    normalize(&raw, &TimeContext::default())
}

#[test]
fn reference_scenario_defaults_velocity() {
    let outcome = run(json!([
        {"time": 0, "notes": ["C4"], "duration": 1, "velocity": 0.8},
        {"time": 1, "notes": ["E4"], "duration": 1}
    ]));

    let events = outcome.timeline.events();
    assert_eq!(events.len(), 2);
    assert_eq!(keys(events), vec![(0.0, vec![60]), (1.0, vec![64])]);
    assert_eq!(events[0].velocity.get(), 0.8);
    assert_eq!(events[1].velocity.get(), 0.8);
    assert_eq!(events[1].duration, 1.0);
}

#[test]
fn output_is_sorted_and_every_event_has_a_pitch() {
    let outcome = run(json!([
        {"time": 3, "note": "G4"},
        {"time": 1, "note": "nope"},
        {"time": 0.5, "notes": []},
        {"time": "0:0:2", "note": "E4"},
        {"time": 2, "notes": ["C4", "E4", "G4"]},
        {"time": 0, "note": 60}
    ]));

    let events = outcome.timeline.events();
    assert_eq!(outcome.kept, 4);
    assert_eq!(outcome.dropped, 2);
    assert!(events.windows(2).all(|w| w[0].time <= w[1].time));
    assert!(events.iter().all(|e| !e.notes.is_empty()));
    assert_eq!(events[1].time, 0.25);
}

#[test]
fn ties_keep_input_order() {
    let outcome = run(json!([
        {"time": 1, "note": "E4"},
        {"time": 0, "note": "D4"},
        {"time": 1, "note": "C4"},
        {"time": 1, "note": "G4"}
    ]));

    assert_eq!(
        keys(outcome.timeline.events()),
        vec![(0.0, vec![62]), (1.0, vec![64]), (1.0, vec![60]), (1.0, vec![67])]
    );
}

#[test]
fn wrapped_payloads_are_unwrapped() {
    let array = json!([{"time": "4n", "note": "A4", "duration": "8n"}]);

    let wrapped = run(json!({"notes": array.clone(), "instruments": "Piano"}));
    let encoded = run(json!({"notes": array.to_string(), "instruments": "Piano"}));
    let fenced = run(json!({"notes": format!("```json\n{}\n```", array)}));

    for outcome in [&wrapped, &encoded, &fenced] {
        let events = outcome.timeline.events();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].time, 0.5);
        assert_eq!(events[0].duration, 0.25);
        assert_eq!(events[0].notes[0].key(), 69);
    }
}

#[test]
fn non_sequences_yield_empty_timeline() {
    for raw in [
        json!(null),
        json!(42),
        json!("not json"),
        json!({"something": []}),
        json!({"notes": 7}),
        json!({"notes": "{\"broken\": "}),
    ] {
        let outcome = run(raw);
        assert!(outcome.timeline.is_empty());
        assert_eq!(outcome.kept, 0);
    }
}

#[test]
fn entirely_invalid_entries_yield_empty_timeline() {
    let outcome = run(json!([1, "C4", {"time": -1, "note": "C4"}, {"time": "whenever", "note": "D4"}]));
    assert!(outcome.timeline.is_empty());
    assert_eq!(outcome.dropped, 4);
}

#[test]
fn missing_fields_take_defaults() {
    let outcome = run(json!([{"note": "C4"}, {"time": 1, "note": "D4", "duration": 0}]));
    let events = outcome.timeline.events();
    assert_eq!(events[0].time, 0.0);
    assert_eq!(events[0].duration, 1.0);
    assert_eq!(events[1].duration, 1.0);
}

#[test]
fn part_style_pairs_are_accepted() {
    let outcome = run(json!([
        ["0:1:0", "E4"],
        [0, {"note": ["C4", "G4"], "velocity": 0.5}]
    ]));
    assert_eq!(
        keys(outcome.timeline.events()),
        vec![(0.0, vec![60, 67]), (0.5, vec![64])]
    );
    assert_eq!(outcome.timeline.events()[0].velocity.get(), 0.5);
}

#[test]
fn symbolic_times_follow_supplied_tempo() {
    let raw = json!([{"time": "1m", "note": "C4", "duration": "4n"}]);
    let outcome = normalize(&raw, &TimeContext::new(60.0, 4));
    assert_eq!(outcome.timeline.events()[0].time, 4.0);
    assert_eq!(outcome.timeline.events()[0].duration, 1.0);
}

#[test]
fn instrument_hint_is_lowercased() {
    assert_eq!(instrument_hint(&json!({"notes": [], "instruments": " Violin "})), "violin");
    assert_eq!(instrument_hint(&json!({"notes": []})), "unknown");
    assert_eq!(instrument_hint(&json!({"notes": [], "instruments": 3})), "unknown");
    assert_eq!(instrument_hint(&json!([])), "unknown");
}

#[test]
fn huge_octave_is_dropped_without_losing_neighbours() {
    let outcome = run(json!([
        {"time": 0, "note": "C300000000"},
        {"time": 0, "note": "C4"},
        {"time": 1, "notes": ["G-2147483648", "E4"]}
    ]));
    assert_eq!(
        keys(outcome.timeline.events()),
        vec![(0.0, vec![60]), (1.0, vec![64])]
    );
    assert_eq!(outcome.dropped, 1);
}

#[test]
fn overflowing_duration_falls_back_to_one_second() {
    let outcome = run(json!([
        {"time": 0, "note": "C4", "duration": "1e308m"},
        {"time": 1, "note": "E4", "duration": "1e308:0:0"}
    ]));
    let events = outcome.timeline.events();
    assert_eq!(events.len(), 2);
    assert_eq!(events[0].duration, 1.0);
    assert_eq!(events[1].duration, 1.0);
}
