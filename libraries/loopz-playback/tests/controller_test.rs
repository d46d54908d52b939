//! End-to-end tests for PlaybackController
//!
//! Drives the controller the way a browser host would: actions from the UI,
//! native media events from the two elements, and recommendation fetches
//! through a scripted gateway.


use loopz_playback::{
    FetchPurpose, LoadOptions, MediaErrorKind, MediaEvent, MediaEventKind, PlaybackError,
    PlaybackState, PlayerConfig, PlayerEvent, Transition, FIRST_CHANNEL, SECOND_CHANNEL,
};
use test_helpers::{track, tracks, url_of, Harness, ScriptedGateway, SharedStorage};

fn ids(h: &Harness) -> Vec<String> {
    h.player
        .active_queue()
        .into_iter()
        .map(|t| t.id.clone())
        .collect()
}

fn no_prefetch() -> PlayerConfig {
    PlayerConfig {
        prefetch_recommendations: false,
        ..PlayerConfig::default()
    }
}

// ============================================================================
// Loading
// ============================================================================

#[test]
fn load_starts_requested_track() {
    let mut h = Harness::new();
    h.load(5, LoadOptions::new("album-1").starting_at(2));

    assert_eq!(h.player.current_index(), Some(2));
    assert_eq!(h.current_id().as_deref(), Some("t2"));
    assert_eq!(h.player.state(), PlaybackState::Loading);
    assert_eq!(h.player.source_id(), Some("album-1"));

    h.ready();
    assert_eq!(h.player.state(), PlaybackState::Playing);
    assert!(h.player.is_playing());
}

#[test]
fn unplayable_tracks_are_dropped_and_start_follows_its_track() {
    let mut h = Harness::new();
    let mut list = tracks(4);
    list[0].audio_url = "ftp://nowhere/t0.mp3".to_string();
    list[1].title = "   ".to_string();

    h.player
        .load_queue_and_start(list, LoadOptions::new("album-1").starting_at(3))
        .unwrap();

    assert_eq!(ids(&h), vec!["t2", "t3"]);
    assert_eq!(h.current_id().as_deref(), Some("t3"));
}

#[test]
fn loading_an_empty_list_leaves_player_empty() {
    let mut h = Harness::new();
    h.player
        .load_queue_and_start(Vec::new(), LoadOptions::new("album-1"))
        .unwrap();

    assert_eq!(h.player.state(), PlaybackState::Empty);
    assert!(h.player.current_track().is_none());
}

#[test]
fn same_source_does_not_restart() {
    let mut h = Harness::new();
    h.load(3, LoadOptions::new("album-9"));
    h.ready();
    let _ = h.primary_event(MediaEventKind::TimeUpdate(37.0));

    h.player
        .load_queue_and_start(tracks(3), LoadOptions::new("album-9"))
        .unwrap();

    assert_eq!(h.player.state(), PlaybackState::Playing);
    assert_eq!(h.player.current_index(), Some(0));
    assert_eq!(h.player.elapsed(), 37.0);
    assert_eq!(h.loads_of(&url_of("t0")), 1);
    assert_eq!(h.primary_log().borrow().positions, vec![0.0]);
}

#[test]
fn same_source_resumes_when_paused() {
    let mut h = Harness::new();
    h.load(3, LoadOptions::new("album-9"));
    h.ready();
    h.player.pause();

    h.player
        .load_queue_and_start(tracks(3), LoadOptions::new("album-9"))
        .unwrap();

    assert_eq!(h.player.state(), PlaybackState::Playing);
    assert_eq!(h.loads_of(&url_of("t0")), 1);
}

#[test]
fn clicking_another_track_of_same_source_moves_there() {
    let mut h = Harness::new();
    h.load(3, LoadOptions::new("album-9"));
    h.ready();

    h.player
        .load_queue_and_start(tracks(3), LoadOptions::new("album-9").clicked(2))
        .unwrap();

    assert_eq!(h.current_id().as_deref(), Some("t2"));
}

#[test]
fn different_source_resets_to_start_index() {
    let mut h = Harness::new();
    h.load(3, LoadOptions::new("album-9").starting_at(1));
    h.ready();

    h.player
        .load_queue_and_start(tracks(3), LoadOptions::new("playlist-2").starting_at(2))
        .unwrap();

    assert_eq!(h.player.current_index(), Some(2));
    assert_eq!(h.player.source_id(), Some("playlist-2"));
    assert_eq!(h.player.state(), PlaybackState::Loading);
}

// ============================================================================
// Shuffle & Loop
// ============================================================================

#[test]
fn shuffle_toggle_keeps_current_track() {
    let mut h = Harness::new();
    h.load(6, LoadOptions::new("album-1").starting_at(3));

    h.player.toggle_shuffle();
    assert!(h.player.is_shuffled());
    assert_eq!(h.current_id().as_deref(), Some("t3"));

    h.player.toggle_shuffle();
    assert!(!h.player.is_shuffled());
    assert_eq!(h.player.current_index(), Some(3));
    assert_eq!(h.current_id().as_deref(), Some("t3"));
}

#[test]
fn direct_click_under_shuffle_pins_track_first() {
    let storage = SharedStorage::with_items(&[("shuffle_enabled", "true")]);
    let mut h = Harness::with_storage(storage);
    assert!(h.player.is_shuffled());

    h.load(8, LoadOptions::new("playlist-3").clicked(5));

    assert_eq!(h.player.current_index(), Some(0));
    assert_eq!(h.current_id().as_deref(), Some("t5"));
    assert_eq!(ids(&h)[0], "t5");
}

#[test]
fn looping_queue_wraps_to_top() {
    let mut h = Harness::new();
    h.load(3, LoadOptions::new("album-1"));
    h.player.toggle_loop();
    h.player.play_queue_index(2).unwrap();

    let t = h.player.begin_next();

    assert_eq!(t, Transition::Complete);
    assert_eq!(h.player.current_index(), Some(0));
    assert_ne!(h.player.state(), PlaybackState::Empty);
    // t0 on load, then buffered again by the preload before the wrap
    assert_eq!(h.loads_of(&url_of("t0")), 2);
}

#[test]
fn previous_wraps_to_end_when_looping() {
    let mut h = Harness::new();
    h.load(4, LoadOptions::new("album-1"));
    h.player.toggle_loop();

    h.player.previous().unwrap();
    assert_eq!(h.player.current_index(), Some(3));
}

#[test]
fn previous_at_start_restarts_current_track() {
    let mut h = Harness::new();
    h.load(3, LoadOptions::new("album-1"));
    let _ = h.primary_event(MediaEventKind::DurationChange(180.0));
    let _ = h.primary_event(MediaEventKind::TimeUpdate(42.0));
    assert_eq!(h.player.elapsed(), 42.0);

    h.player.previous().unwrap();

    assert_eq!(h.player.current_index(), Some(0));
    assert_eq!(h.player.elapsed(), 0.0);
    assert_eq!(h.primary_log().borrow().positions.last(), Some(&0.0));
}

#[test]
fn previous_moves_back_one() {
    let mut h = Harness::new();
    h.load(3, LoadOptions::new("album-1").starting_at(2));

    h.player.previous().unwrap();
    assert_eq!(h.current_id().as_deref(), Some("t1"));
}

// ============================================================================
// Running out of tracks
// ============================================================================

#[tokio::test]
async fn non_looping_queue_runs_out() {
    let mut h = Harness::new();
    h.load(4, LoadOptions::new("album-1"));

    for expected in 1..4 {
        h.player.next().await;
        assert_eq!(h.player.current_index(), Some(expected));
        assert_ne!(h.player.state(), PlaybackState::Empty);
    }

    h.player.next().await;

    assert_eq!(h.player.state(), PlaybackState::Empty);
    assert!(h.player.current_track().is_none());
    assert_eq!(h.gateway.calls(), 1);
    let events = h.player.drain_events();
    assert!(events.iter().any(|e| matches!(e, PlayerEvent::QueueExhausted)));
}

#[tokio::test]
async fn prefetched_recommendations_extend_the_queue() {
    let gateway = ScriptedGateway::new().answer("t2", vec![track("r1"), track("r2")]);
    let mut h = Harness::with_gateway(gateway);
    h.load(3, LoadOptions::new("album-1").starting_at(2));

    let request = h.player.take_recommendation_request();
    assert_eq!(
        request.as_ref().map(|r| (r.track_id.as_str(), r.purpose)),
        Some(("t2", FetchPurpose::Prefetch))
    );
    let request = request.unwrap();
    let result = request.run(h.gateway.as_ref()).await;
    let t = h.player.receive_recommendations(request, result);
    assert_eq!(t, Transition::Complete);
    assert_eq!(h.player.recommendations().len(), 2);
    assert_eq!(h.player.preloaded_track_id(), Some("r1"));

    h.ready();
    let t = h.end_current();

    assert_eq!(t, Transition::Complete);
    assert_eq!(h.current_id().as_deref(), Some("r1"));
    assert_eq!(h.player.current_index(), Some(3));
    assert_eq!(ids(&h), vec!["t0", "t1", "t2", "r1", "r2"]);
    assert_ne!(h.player.state(), PlaybackState::Empty);
    assert_eq!(h.loads_of(&url_of("r1")), 1);
    assert!(h.player.recommendations().is_empty());

    let events = h.player.drain_events();
    assert!(events
        .iter()
        .any(|e| matches!(e, PlayerEvent::QueueExtended { added: 2 })));
}

#[tokio::test]
async fn exhausted_queue_fetches_on_demand() {
    let gateway = ScriptedGateway::new().answer("t1", vec![track("r1")]);
    let mut h = Harness::build(SharedStorage::default(), gateway, no_prefetch());
    h.load(2, LoadOptions::new("album-1"));
    h.player.play_queue_index(1).unwrap();
    assert!(h.player.take_recommendation_request().is_none());

    let Transition::NeedsRecommendations(request) = h.player.begin_next() else {
        panic!("expected a recommendation fetch");
    };
    assert_eq!(request.track_id, "t1");
    assert_eq!(request.purpose, FetchPurpose::Advance);

    let result = request.run(h.gateway.as_ref()).await;
    let t = h.player.receive_recommendations(request, result);

    assert_eq!(t, Transition::Complete);
    assert_eq!(h.current_id().as_deref(), Some("r1"));
    assert_eq!(h.player.state(), PlaybackState::Loading);
}

#[tokio::test]
async fn on_demand_result_ignored_after_listener_moves() {
    let gateway = ScriptedGateway::new().answer("t1", vec![track("r1")]);
    let mut h = Harness::build(SharedStorage::default(), gateway, no_prefetch());
    h.load(2, LoadOptions::new("album-1"));
    h.player.play_queue_index(1).unwrap();

    let Transition::NeedsRecommendations(request) = h.player.begin_next() else {
        panic!("expected a recommendation fetch");
    };
    h.player.play_queue_index(0).unwrap();

    let result = request.run(h.gateway.as_ref()).await;
    let t = h.player.receive_recommendations(request, result);

    assert_eq!(t, Transition::Complete);
    assert_eq!(h.current_id().as_deref(), Some("t0"));
    assert_eq!(h.player.recommendations().len(), 1);
}

#[tokio::test]
async fn pause_during_on_demand_fetch_cues_next_track() {
    let gateway = ScriptedGateway::new().answer("t0", vec![track("r1")]);
    let mut h = Harness::build(SharedStorage::default(), gateway, no_prefetch());
    h.load(1, LoadOptions::new("single-1"));
    h.ready();

    let Transition::NeedsRecommendations(request) = h.end_current() else {
        panic!("expected a recommendation fetch");
    };
    h.player.pause();
    assert_eq!(h.player.state(), PlaybackState::Paused);
    let plays_before = h.primary_log().borrow().plays;

    let result = request.run(h.gateway.as_ref()).await;
    let t = h.player.receive_recommendations(request, result);

    assert_eq!(t, Transition::Complete);
    assert_eq!(h.player.state(), PlaybackState::Paused);
    assert!(!h.player.is_playing());
    assert_eq!(h.current_id().as_deref(), Some("r1"));
    assert_eq!(ids(&h), vec!["t0", "r1"]);
    assert_eq!(h.primary_log().borrow().plays, plays_before);
    assert_eq!(h.loads_of(&url_of("r1")), 1);

    // A late ready event must not start it either
    h.ready();
    assert_eq!(h.player.state(), PlaybackState::Paused);

    h.player.play().unwrap();
    assert_eq!(h.primary_log().borrow().plays, plays_before + 1);
}

#[tokio::test]
async fn next_while_paused_still_plays_fetched_track() {
    let gateway = ScriptedGateway::new().answer("t0", vec![track("r1")]);
    let mut h = Harness::build(SharedStorage::default(), gateway, no_prefetch());
    h.load(1, LoadOptions::new("single-1"));
    h.player.pause();

    let Transition::NeedsRecommendations(request) = h.player.begin_next() else {
        panic!("expected a recommendation fetch");
    };
    assert_eq!(h.player.state(), PlaybackState::Loading);

    let result = request.run(h.gateway.as_ref()).await;
    h.player.receive_recommendations(request, result);

    assert_eq!(h.current_id().as_deref(), Some("r1"));
    assert_eq!(h.player.state(), PlaybackState::Loading);
}

#[tokio::test]
async fn results_for_a_replaced_queue_are_dropped() {
    let gateway = ScriptedGateway::new().answer("t0", vec![track("r1")]);
    let mut h = Harness::with_gateway(gateway);
    h.load(1, LoadOptions::new("single-1"));
    let request = h.player.take_recommendation_request().unwrap();

    h.load(3, LoadOptions::new("album-2"));
    let result = request.run(h.gateway.as_ref()).await;
    let t = h.player.receive_recommendations(request, result);

    assert_eq!(t, Transition::Complete);
    assert!(h.player.recommendations().is_empty());
    assert_eq!(ids(&h), vec!["t0", "t1", "t2"]);
}

#[tokio::test]
async fn failed_fetch_degrades_silently() {
    let gateway = ScriptedGateway::new().fail_for("t1");
    let mut h = Harness::with_gateway(gateway);
    h.load(2, LoadOptions::new("album-1"));
    h.player.play_queue_index(1).unwrap();
    h.player.drain_events();

    h.player.next().await;

    assert_eq!(h.player.state(), PlaybackState::Empty);
    assert!(h.player.last_error().is_none());
    let events = h.player.drain_events();
    assert!(!events.iter().any(|e| matches!(e, PlayerEvent::Error { .. })));
    assert!(events.iter().any(|e| matches!(e, PlayerEvent::QueueExhausted)));
}

#[tokio::test]
async fn background_fetch_then_track_end_needs_no_second_fetch() {
    let mut h = Harness::new();
    h.load(2, LoadOptions::new("album-1").starting_at(1));

    h.player.fetch_pending_recommendations().await;
    assert_eq!(h.gateway.calls(), 1);

    h.ready();
    let t = h.end_current();

    assert_eq!(t, Transition::Complete);
    assert_eq!(h.player.state(), PlaybackState::Empty);
    assert_eq!(h.gateway.calls(), 1);
}

#[tokio::test]
async fn shuffled_extension_keeps_played_order() {
    let storage = SharedStorage::with_items(&[("shuffle_enabled", "true")]);
    let gateway =
        ScriptedGateway::new().answer("t3", vec![track("r1"), track("r2"), track("r3")]);
    let mut h = Harness::build(storage, gateway, PlayerConfig::default());
    h.load(4, LoadOptions::new("album-1"));
    h.player.play_queue_index(3).unwrap();
    let played = ids(&h);

    h.player.fetch_pending_recommendations().await;
    assert_eq!(h.player.preloaded_track_id(), None);

    h.player.next().await;

    let order = ids(&h);
    assert_eq!(order.len(), 7);
    assert_eq!(&order[..4], &played[..]);
    assert_eq!(h.player.current_index(), Some(4));
    assert!(h.current_id().unwrap().starts_with('r'));
}

// ============================================================================
// Channels
// ============================================================================

#[test]
fn preloaded_track_is_swapped_in() {
    let mut h = Harness::new();
    h.load(3, LoadOptions::new("album-1"));
    assert_eq!(h.player.preloaded_track_id(), Some("t1"));
    assert_eq!(h.second.borrow().sources, vec![url_of("t1")]);
    assert_eq!(h.second.borrow().volume, Some(0.0));

    h.ready();
    let t = h.end_current();

    assert_eq!(t, Transition::Complete);
    assert_eq!(h.current_id().as_deref(), Some("t1"));
    assert_eq!(h.player.primary_channel(), SECOND_CHANNEL);
    assert_eq!(h.loads_of(&url_of("t1")), 1);
    assert_eq!(h.first.borrow().clears, 1);
    assert_eq!(h.first.borrow().sources, vec![url_of("t0"), url_of("t2")]);
    assert_eq!(h.player.preloaded_track_id(), Some("t2"));
}

#[test]
fn stale_events_from_previous_source_are_ignored() {
    let mut h = Harness::new();
    h.load(3, LoadOptions::new("album-1"));
    h.ready();
    let _ = h.end_current();
    assert_eq!(h.current_id().as_deref(), Some("t1"));

    // Late `ended` from the element that used to play t0
    let t = h.player.handle_media_event(
        FIRST_CHANNEL,
        MediaEvent::new(url_of("t0"), MediaEventKind::Ended),
    );

    assert_eq!(t, Transition::Complete);
    assert_eq!(h.current_id().as_deref(), Some("t1"));
}

#[test]
fn preload_failure_falls_back_to_cold_load() {
    let mut h = Harness::new();
    h.load(3, LoadOptions::new("album-1"));
    let preload = h.other_channel();

    let _ = h.player.handle_media_event(
        preload,
        MediaEvent::new(url_of("t1"), MediaEventKind::Error { code: 2 }),
    );
    assert_eq!(h.player.preloaded_track_id(), None);
    assert!(h.player.last_error().is_none());

    h.ready();
    let _ = h.end_current();

    assert_eq!(h.current_id().as_deref(), Some("t1"));
    assert_eq!(h.player.primary_channel(), FIRST_CHANNEL);
    assert_eq!(h.loads_of(&url_of("t1")), 2);
}

#[test]
fn media_error_pauses_and_keeps_position() {
    let mut h = Harness::new();
    h.load(3, LoadOptions::new("album-1").starting_at(1));
    h.ready();
    h.player.drain_events();

    let _ = h.primary_event(MediaEventKind::Error { code: 3 });

    assert_eq!(h.player.state(), PlaybackState::Paused);
    assert_eq!(h.player.current_index(), Some(1));
    assert_eq!(
        h.player.last_error(),
        Some(MediaErrorKind::DecodeFailure.user_message())
    );
    let events = h.player.drain_events();
    assert!(events.iter().any(|e| matches!(e, PlayerEvent::Error { .. })));

    h.player.clear_error();
    assert!(h.player.last_error().is_none());
    assert_eq!(h.player.drain_events(), vec![PlayerEvent::ErrorCleared]);
}

#[test]
fn rejected_play_pauses_with_message() {
    let mut h = Harness::new();
    h.first.borrow_mut().reject_plays = true;

    let result = h
        .player
        .load_queue_and_start(tracks(2), LoadOptions::new("album-1"));

    assert!(matches!(result, Err(PlaybackError::PlaybackRejected(_))));
    assert_eq!(h.player.state(), PlaybackState::Paused);
    assert!(h.player.last_error().is_some());
    assert_eq!(h.player.current_index(), Some(0));

    h.first.borrow_mut().reject_plays = false;
    h.player.play().unwrap();
    assert_eq!(h.player.state(), PlaybackState::Loading);
}

#[test]
fn asynchronous_rejection_pauses() {
    let mut h = Harness::new();
    h.load(2, LoadOptions::new("album-1"));

    let _ = h.primary_event(MediaEventKind::PlayRejected {
        reason: "NotAllowedError".to_string(),
    });

    assert_eq!(h.player.state(), PlaybackState::Paused);
    assert!(h.player.last_error().is_some());
}

#[test]
fn buffering_shows_loading_while_playing() {
    let mut h = Harness::new();
    h.load(2, LoadOptions::new("album-1"));
    h.ready();

    let _ = h.primary_event(MediaEventKind::Waiting);
    assert_eq!(h.player.state(), PlaybackState::Loading);

    let _ = h.primary_event(MediaEventKind::Playing);
    assert_eq!(h.player.state(), PlaybackState::Playing);
}

// ============================================================================
// Seek & Volume
// ============================================================================

#[test]
fn seek_waits_for_duration_and_clamps() {
    let mut h = Harness::new();
    h.load(1, LoadOptions::new("single-1"));

    assert_eq!(h.player.seek(30.0), None);

    let _ = h.primary_event(MediaEventKind::DurationChange(100.0));
    assert_eq!(h.player.seek(250.0), Some(100.0));
    assert_eq!(h.player.seek(-3.0), Some(0.0));
    assert_eq!(h.player.seek(12.5), Some(12.5));
    assert_eq!(h.player.elapsed(), 12.5);
}

#[test]
fn volume_and_mute_reach_primary_only() {
    let mut h = Harness::new();
    h.load(2, LoadOptions::new("album-1"));

    h.player.set_volume(0.8);
    assert_eq!(h.primary_log().borrow().volume, Some(0.8));

    h.player.mute();
    assert!(h.player.is_muted());
    assert_eq!(h.primary_log().borrow().volume, Some(0.0));
    assert_eq!(h.player.volume(), 0.8);

    h.player.unmute();
    assert_eq!(h.primary_log().borrow().volume, Some(0.8));
    assert_eq!(h.second.borrow().volume, Some(0.0));
}

// ============================================================================
// Persistence
// ============================================================================

#[test]
fn settings_are_written_and_restored() {
    let mut h = Harness::new();
    h.player.set_volume(0.3);
    h.player.toggle_shuffle();
    h.player.toggle_loop();
    h.load(3, LoadOptions::new("album-1"));
    let index = h.player.current_index().unwrap();

    assert_eq!(h.storage.get("volume").as_deref(), Some("0.3"));
    assert_eq!(h.storage.get("shuffle_enabled").as_deref(), Some("true"));
    assert_eq!(h.storage.get("loop_enabled").as_deref(), Some("true"));
    assert_eq!(
        h.storage.get("last_current_index"),
        Some(index.to_string())
    );

    let restored = Harness::with_storage(h.storage.clone());
    assert_eq!(restored.player.volume(), 0.3);
    assert!(restored.player.is_shuffled());
    assert!(restored.player.is_looping());
}

#[test]
fn garbage_settings_fall_back_to_defaults() {
    let storage = SharedStorage::with_items(&[
        ("volume", "loud"),
        ("shuffle_enabled", "maybe"),
        ("loop_enabled", ""),
        ("last_current_index", "-7"),
    ]);
    let h = Harness::with_storage(storage);

    assert_eq!(h.player.volume(), 0.5);
    assert!(!h.player.is_shuffled());
    assert!(!h.player.is_looping());
}

#[test]
fn cued_queue_restores_last_index() {
    let storage = SharedStorage::with_items(&[("last_current_index", "2")]);
    let mut h = Harness::with_storage(storage);

    h.player.load_queue(tracks(4), LoadOptions::new("album-1"));

    assert_eq!(h.player.current_index(), Some(2));
    assert_eq!(h.player.state(), PlaybackState::Paused);
    assert_eq!(h.primary_log().borrow().plays, 0);

    h.player.play().unwrap();
    assert_eq!(h.current_id().as_deref(), Some("t2"));
    assert_eq!(h.player.state(), PlaybackState::Loading);
}

#[test]
fn exhaustion_clears_persisted_index() {
    let mut h = Harness::build(
        SharedStorage::default(),
        ScriptedGateway::new(),
        no_prefetch(),
    );
    h.load(1, LoadOptions::new("single-1"));

    let Transition::NeedsRecommendations(request) = h.player.begin_next() else {
        panic!("expected a recommendation fetch");
    };
    let _ = h.player.receive_recommendations(request, Ok(Vec::new()));

    assert_eq!(h.player.state(), PlaybackState::Empty);
    assert_eq!(h.storage.get("last_current_index").as_deref(), Some("-1"));
}

// ============================================================================
// Read model
// ============================================================================

#[test]
fn snapshot_serializes_for_the_ui() {
    let mut h = Harness::new();
    h.load(2, LoadOptions::new("album-1"));
    h.ready();

    let json = serde_json::to_value(h.player.snapshot()).unwrap();

    assert_eq!(json["state"], "playing");
    assert_eq!(json["isPlaying"], true);
    assert_eq!(json["currentIndex"], 0);
    assert_eq!(json["currentTrack"]["id"], "t0");
    assert_eq!(json["queue"].as_array().map(Vec::len), Some(2));
}

#[test]
fn track_change_events_name_both_tracks() {
    let mut h = Harness::new();
    h.load(2, LoadOptions::new("album-1"));
    h.player.drain_events();

    h.player.play_queue_index(1).unwrap();

    let events = h.player.drain_events();
    assert!(events.contains(&PlayerEvent::TrackChanged {
        track_id: "t1".to_string(),
        previous_track_id: Some("t0".to_string()),
    }));
}
