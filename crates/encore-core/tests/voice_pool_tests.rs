mod common;

use common::{pitch, Call, FakeLoader};
use encore_core::VoicePool;
use encore_ports::instrument::LoadError;
use encore_ports::types::Velocity;
use pretty_assertions::assert_eq;
use std::sync::Arc;

#[tokio::test]
async fn concurrent_callers_share_one_load() {
    let loader = Arc::new(FakeLoader::default());
    let release = loader.gate();
    let pool = VoicePool::new(loader.clone());

    let open_gate = async {
        tokio::task::yield_now().await;
        release.send(()).unwrap();
    };
    let (first, second, ()) = tokio::join!(pool.ensure_loaded(), pool.ensure_loaded(), open_gate);

    assert_eq!(first, Ok(()));
    assert_eq!(second, Ok(()));
    assert_eq!(loader.loads(), 1);
    assert!(pool.is_loaded());

    pool.ensure_loaded().await.unwrap();
    assert_eq!(loader.loads(), 1);
}

#[tokio::test]
async fn failed_load_is_not_cached() {
    let loader = Arc::new(FakeLoader::failing(1));
    let pool = VoicePool::new(loader.clone());

    let first = pool.ensure_loaded().await;
    assert!(matches!(first, Err(LoadError::Unreachable(_))));
    assert!(!pool.is_loaded());

    pool.ensure_loaded().await.unwrap();
    assert!(pool.is_loaded());
    assert_eq!(loader.loads(), 2);
}

#[tokio::test]
async fn triggers_before_load_are_dropped() {
    let loader = Arc::new(FakeLoader::default());
    let pool = VoicePool::new(loader.clone());

    pool.trigger_notes(&[pitch(60)], 1.0, 0.0, Velocity::DEFAULT);

    assert!(pool.sounding().is_empty());
    assert!(loader.instrument.calls().is_empty());
}

#[tokio::test]
async fn chord_notes_release_together() {
    let loader = Arc::new(FakeLoader::default());
    let pool = VoicePool::new(loader.clone());
    pool.ensure_loaded().await.unwrap();
    loader.instrument.clear();

    pool.trigger_notes(&[pitch(60), pitch(64), pitch(67)], 2.0, 0.0, Velocity::new(0.5));
    assert_eq!(pool.sounding().len(), 3);

    pool.advance(1.9);
    assert_eq!(pool.sounding().len(), 3);

    pool.advance(2.0);
    assert!(pool.sounding().is_empty());
    assert_eq!(
        loader.instrument.calls(),
        vec![
            Call::On(60, 0.5),
            Call::On(64, 0.5),
            Call::On(67, 0.5),
            Call::Off(60),
            Call::Off(64),
            Call::Off(67),
        ]
    );
}

#[tokio::test]
async fn retrigger_replaces_the_sounding_note() {
    let loader = Arc::new(FakeLoader::default());
    let pool = VoicePool::new(loader.clone());
    pool.ensure_loaded().await.unwrap();
    loader.instrument.clear();

    pool.trigger_notes(&[pitch(62)], 2.0, 0.0, Velocity::DEFAULT);
    pool.trigger_notes(&[pitch(62)], 2.0, 1.0, Velocity::DEFAULT);

    // The first note's release time has passed, but the retriggered note holds.
    pool.advance(2.5);
    let sounding = pool.sounding();
    assert_eq!(sounding.len(), 1);
    assert_eq!(sounding[0].release_at, 3.0);
    assert_eq!(
        loader.instrument.calls(),
        vec![Call::On(62, 0.8), Call::Off(62), Call::On(62, 0.8)]
    );
}

#[tokio::test]
async fn release_all_silences_everything() {
    let loader = Arc::new(FakeLoader::default());
    let pool = VoicePool::new(loader.clone());
    pool.ensure_loaded().await.unwrap();

    pool.trigger_notes(&[pitch(48), pitch(55)], 10.0, 0.0, Velocity::DEFAULT);
    pool.release_all();

    assert!(pool.sounding().is_empty());
    assert_eq!(loader.instrument.calls().last(), Some(&Call::AllOff));
}

#[tokio::test]
async fn program_is_applied_on_load_and_on_change() {
    let loader = Arc::new(FakeLoader::default());
    let pool = VoicePool::new(loader.clone());

    pool.select_program(73);
    pool.ensure_loaded().await.unwrap();
    assert_eq!(loader.instrument.calls(), vec![Call::Program(73)]);

    pool.select_program(73);
    pool.select_program(40);
    assert_eq!(
        loader.instrument.calls(),
        vec![Call::Program(73), Call::Program(40)]
    );
    assert_eq!(pool.program(), 40);
}
