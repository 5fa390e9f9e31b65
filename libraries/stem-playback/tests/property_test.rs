//! Property-based tests for stem playback
//!
//! Uses proptest to verify transport and mix invariants across many random
//! inputs and arrival orders.

use proptest::prelude::*;
use stem_playback::memory::{HostCommand, MemoryHost};
use stem_playback::{PlaybackConfig, SessionLifecycle, TrackId, TrackSet, TransportState};

// ===== Helpers =====

/// Non-empty subset of stems, in a random order
fn arbitrary_stems() -> impl Strategy<Value = Vec<TrackId>> {
    Just(TrackId::ALL.to_vec())
        .prop_shuffle()
        .prop_flat_map(|stems| (1..=stems.len()).prop_map(move |n| stems[..n].to_vec()))
}

fn started(stems: &[TrackId]) -> (MemoryHost, SessionLifecycle) {
    let host = MemoryHost::new();
    let mut session = SessionLifecycle::new(host.clone(), PlaybackConfig::default());
    let set: TrackSet = stems
        .iter()
        .map(|id| (*id, format!("{id}.wav")))
        .collect();
    session.start(set).unwrap();
    (host, session)
}

// ===== Property Tests =====

proptest! {
    /// Property: Ready is entered exactly once, on the first duration reported
    #[test]
    fn ready_exactly_once_for_any_arrival_order(
        stems in arbitrary_stems(),
        durations in prop::collection::vec(1.0f64..600.0, 4),
    ) {
        let (host, mut session) = started(&stems);
        prop_assert_eq!(session.state(), TransportState::Loading);
        session.drain_events();

        for (id, duration) in stems.iter().zip(&durations) {
            host.element(*id).unwrap().report_duration(*duration);
            session.pump();
        }

        let ready = session
            .drain_events()
            .into_iter()
            .filter(|e| *e == stem_playback::PlaybackEvent::StateChanged { state: TransportState::Ready })
            .count();
        prop_assert_eq!(ready, 1);
        prop_assert_eq!(session.snapshot().duration, Some(durations[0]));
    }

    /// Property: Toggle is a strict toggle and never re-forwards play
    #[test]
    fn toggle_twice_restores_play_status(stems in arbitrary_stems(), toggles in 1usize..20) {
        let (host, mut session) = started(&stems);
        host.element(stems[0]).unwrap().report_duration(100.0);
        session.pump();

        for i in 0..toggles {
            let playing = session.toggle_play_pause();
            prop_assert_eq!(playing, i % 2 == 0);
        }

        let expected_plays = (toggles + 1) / 2;
        for id in &stems {
            let plays = host
                .element(*id)
                .unwrap()
                .commands()
                .iter()
                .filter(|c| **c == HostCommand::Play)
                .count();
            prop_assert_eq!(plays, expected_plays);
        }
    }

    /// Property: Every stem ends up at the clamped seek position
    #[test]
    fn seek_is_clamped_on_every_stem(
        stems in arbitrary_stems(),
        duration in 1.0f64..600.0,
        target in -1000.0f64..2000.0,
    ) {
        let (host, mut session) = started(&stems);
        host.element(stems[0]).unwrap().report_duration(duration);
        session.pump();

        let applied = session.seek(target).unwrap();
        let expected = target.clamp(0.0, duration);
        prop_assert_eq!(applied, expected);
        for id in &stems {
            prop_assert_eq!(host.element(*id).unwrap().last_seek(), Some(expected));
        }
    }

    /// Property: Effective volume is the stored volume unmuted, zero muted
    #[test]
    fn mute_round_trip_restores_effective_volume(
        stems in arbitrary_stems(),
        volume in 0.0f32..=1.0,
    ) {
        let (host, mut session) = started(&stems);
        let id = stems[0];

        session.set_volume(id, volume).unwrap();
        prop_assert_eq!(session.effective_volume(id).unwrap(), volume);

        session.toggle_mute(id).unwrap();
        prop_assert_eq!(session.effective_volume(id).unwrap(), 0.0);
        prop_assert_eq!(host.element(id).unwrap().volume(), 0.0);

        session.toggle_mute(id).unwrap();
        prop_assert_eq!(session.effective_volume(id).unwrap(), volume);
        prop_assert_eq!(host.element(id).unwrap().volume(), volume);
    }

    /// Property: Volume stays within [0, 1] for any input
    #[test]
    fn volume_is_always_clamped(volume in -10.0f32..10.0) {
        let (host, mut session) = started(&[TrackId::Bass]);
        session.set_volume(TrackId::Bass, volume).unwrap();

        let applied = host.element(TrackId::Bass).unwrap().volume();
        prop_assert!((0.0..=1.0).contains(&applied));
    }
}
