//! Integration tests for a mounted player session driven by a scripted widget

use lessonsync::adapter::scripted::{ScriptedFactory, ScriptedHandle, ScriptedHost, WidgetCall};
use lessonsync::{
    Availability, BootstrapGate, Capabilities, Error, LessonDescriptor, LessonMedia, PlaybackState,
    PlayerConfig, PlayerEnvironment, PlayerSession, RangeSegment, ResolutionOption, SessionHooks,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

const VIDEO: &str = "https://www.youtube.com/watch?v=dQw4w9WgXcQ";

struct Harness {
    session: PlayerSession,
    factory: Arc<ScriptedFactory>,
    completes: Arc<AtomicUsize>,
    times: Arc<Mutex<Vec<f64>>>,
    segments: Arc<Mutex<Vec<Option<String>>>>,
}

impl Harness {
    fn widget(&self) -> ScriptedHandle {
        self.factory.last_handle().expect("widget was created")
    }

    fn completes(&self) -> usize {
        self.completes.load(Ordering::SeqCst)
    }

    fn time_updates(&self) -> usize {
        self.times.lock().unwrap().len()
    }
}

/// Let spawned tasks and queued widget events run without moving the clock.
async fn flush() {
    for _ in 0..32 {
        tokio::task::yield_now().await;
    }
}

async fn sleep_ms(ms: u64) {
    tokio::time::sleep(Duration::from_millis(ms)).await;
}

fn mount_lesson(lesson: LessonDescriptor, factory: ScriptedFactory, media: LessonMedia) -> Harness {
    let factory = Arc::new(factory);
    let env = PlayerEnvironment::new(Arc::new(ScriptedHost::ready()), factory.clone())
        .with_gate(Arc::new(BootstrapGate::new()));

    let completes = Arc::new(AtomicUsize::new(0));
    let times = Arc::new(Mutex::new(Vec::new()));
    let segments = Arc::new(Mutex::new(Vec::new()));
    let hooks = {
        let completes = completes.clone();
        let times = times.clone();
        let segments = segments.clone();
        SessionHooks::new()
            .on_complete(move || {
                completes.fetch_add(1, Ordering::SeqCst);
            })
            .on_time_update(move |t| times.lock().unwrap().push(t))
            .on_active_segment(move |s| {
                segments.lock().unwrap().push(s.map(|s| s.id.clone()));
            })
    };

    let session = PlayerSession::mount(lesson, media, env, PlayerConfig::default(), hooks);
    Harness {
        session,
        factory,
        completes,
        times,
        segments,
    }
}

fn mount(factory: ScriptedFactory, media: LessonMedia) -> Harness {
    mount_lesson(LessonDescriptor::new("lesson-1", "Pointers", VIDEO), factory, media)
}

fn resolutions() -> Vec<ResolutionOption> {
    vec![
        ResolutionOption::new("720p", "720p", 1280, 720, "https://cdn.test/720.mp4"),
        ResolutionOption::new("1080p", "1080p", 1920, 1080, "https://cdn.test/1080.mp4"),
    ]
}

#[tokio::test(start_paused = true)]
async fn widget_becomes_live_after_ready() {
    let h = mount(ScriptedFactory::new(600.0), LessonMedia::default());
    assert!(h.session.status().is_loading);

    flush().await;
    let status = h.session.status();
    assert_eq!(status.availability, Availability::Live);
    assert!(!status.is_loading);
    assert_eq!(status.duration, 600.0);
    assert_eq!(status.state, PlaybackState::Unstarted);
    assert!(status.show_controls);
}

#[tokio::test(start_paused = true)]
async fn commands_before_ready_are_dropped() {
    let h = mount(ScriptedFactory::new(600.0).without_auto_ready(), LessonMedia::default());
    flush().await;

    h.session.play();
    h.session.seek_to(30.0);
    flush().await;
    let widget = h.widget();
    assert!(widget.calls().is_empty());
    assert_eq!(h.session.current_time(), 0.0);
    assert!(h.session.status().is_loading);

    widget.emit(lessonsync::WidgetEvent::Ready);
    flush().await;
    assert_eq!(h.session.status().availability, Availability::Live);
    h.session.play();
    flush().await;
    assert_eq!(widget.calls(), vec![WidgetCall::Play]);
    assert!(h.session.status().is_playing);
}

#[tokio::test(start_paused = true)]
async fn time_updates_only_while_playing() {
    let h = mount(ScriptedFactory::new(600.0), LessonMedia::default());
    flush().await;

    sleep_ms(2_000).await;
    assert_eq!(h.time_updates(), 0);

    h.session.play();
    flush().await;
    sleep_ms(2_010).await;
    assert_eq!(h.time_updates(), 4);
    let times = h.times.lock().unwrap().clone();
    assert!(times.windows(2).all(|w| w[0] < w[1]));
    assert!((h.session.current_time() - 2.0).abs() < 1e-6);

    h.session.pause();
    flush().await;
    sleep_ms(3_000).await;
    assert_eq!(h.time_updates(), 4);
    assert_eq!(h.session.state(), PlaybackState::Paused);
}

#[tokio::test(start_paused = true)]
async fn buffering_while_playing_does_not_duplicate_side_effects() {
    let h = mount(ScriptedFactory::new(600.0), LessonMedia::default());
    flush().await;
    h.session.play();
    flush().await;

    let widget = h.widget();
    widget.emit_state(PlaybackState::Buffering);
    flush().await;
    assert!(h.session.status().is_loading);

    widget.emit_state(PlaybackState::Playing);
    widget.emit_state(PlaybackState::Playing);
    flush().await;
    sleep_ms(510).await;
    assert_eq!(h.time_updates(), 1);
    assert_eq!(h.completes(), 0);
}

#[tokio::test(start_paused = true)]
async fn completion_fires_once_for_duplicate_end_signals() {
    let h = mount(ScriptedFactory::new(100.0), LessonMedia::default());
    flush().await;
    h.session.play();
    flush().await;

    let widget = h.widget();
    widget.emit_state(PlaybackState::Ended);
    widget.emit_state(PlaybackState::Ended);
    flush().await;
    assert_eq!(h.completes(), 1);
    assert_eq!(h.session.state(), PlaybackState::Ended);
    assert!(h.session.status().completed);
    assert!(h.session.status().show_controls);

    // replay and cross the epsilon threshold again
    h.session.replay();
    flush().await;
    assert_eq!(h.session.state(), PlaybackState::Playing);
    widget.set_current_time(99.8);
    sleep_ms(600).await;
    widget.emit_state(PlaybackState::Ended);
    flush().await;
    assert_eq!(h.completes(), 1);
}

#[tokio::test(start_paused = true)]
async fn epsilon_guard_completes_without_end_signal() {
    let h = mount(ScriptedFactory::new(100.0), LessonMedia::default());
    flush().await;
    h.session.play();
    flush().await;

    h.widget().set_current_time(99.2);
    sleep_ms(510).await;
    assert_eq!(h.completes(), 1);

    h.widget().emit_state(PlaybackState::Ended);
    flush().await;
    assert_eq!(h.completes(), 1);
}

#[tokio::test(start_paused = true)]
async fn play_after_end_replays_from_start() {
    let h = mount(ScriptedFactory::new(100.0), LessonMedia::default());
    flush().await;
    h.session.play();
    flush().await;
    h.widget().emit_state(PlaybackState::Ended);
    flush().await;

    // the widget cannot move the machine out of Ended by itself
    h.widget().emit_state(PlaybackState::Playing);
    flush().await;
    assert_eq!(h.session.state(), PlaybackState::Ended);

    h.widget().clear_calls();
    h.session.play();
    flush().await;
    assert_eq!(h.widget().calls(), vec![WidgetCall::Seek(0.0), WidgetCall::Play]);
    assert_eq!(h.session.state(), PlaybackState::Playing);
    assert_eq!(h.completes(), 1);
}

#[tokio::test(start_paused = true)]
async fn seeking_out_of_the_end_keeps_the_new_position() {
    let h = mount(ScriptedFactory::new(100.0), LessonMedia::default());
    flush().await;
    h.session.play();
    flush().await;
    h.widget().emit_state(PlaybackState::Ended);
    flush().await;

    h.session.seek_to(30.0);
    h.session.play();
    flush().await;
    assert_eq!(h.session.state(), PlaybackState::Playing);
    assert!((h.widget().position() - 30.0).abs() < 1e-6);
}

#[tokio::test(start_paused = true)]
async fn quality_switch_preserves_position_and_resumes() {
    let media = LessonMedia::new().with_resolutions(resolutions());
    let h = mount(ScriptedFactory::new(600.0), media);
    h.session.set_quality("720p").unwrap();
    flush().await;

    let request = h.factory.last_request().unwrap();
    assert_eq!(request.initial_source_url.as_deref(), Some("https://cdn.test/720.mp4"));

    h.session.seek_to(120.5);
    h.session.play();
    flush().await;
    assert!(h.session.status().is_playing);

    h.session.set_quality("1080p").unwrap();
    flush().await;

    let widget = h.widget();
    let status = h.session.status();
    assert_eq!(widget.loaded_source().as_deref(), Some("https://cdn.test/1080.mp4"));
    assert_eq!(status.current_resolution_id.as_deref(), Some("1080p"));
    assert!(status.is_playing);
    assert!((status.current_time - 120.5).abs() < 1e-6);
    assert!((widget.position() - 120.5).abs() < 1e-6);

    sleep_ms(500).await;
    let drift = (h.session.current_time() - 120.5).abs();
    assert!(drift <= 0.5 + 1e-6, "drift {drift}");
}

#[tokio::test(start_paused = true)]
async fn commands_during_a_switch_are_deferred_in_order() {
    let media = LessonMedia::new().with_resolutions(resolutions());
    let h = mount(ScriptedFactory::new(600.0).with_manual_source_load(), media);
    h.session.set_quality("720p").unwrap();
    flush().await;
    h.session.seek_to(120.5);
    h.session.play();
    flush().await;

    h.session.set_quality("1080p").unwrap();
    flush().await;
    let widget = h.widget();
    widget.clear_calls();
    assert_eq!(h.session.state(), PlaybackState::Buffering);
    assert!(h.session.status().is_loading);

    h.session.pause();
    h.session.seek_to(30.0);
    h.session.play();
    flush().await;
    sleep_ms(1_000).await;
    assert!(widget.calls().is_empty());
    assert_eq!(h.session.current_time(), 120.5);
    assert_eq!(h.time_updates(), 0);

    widget.finish_source_load();
    flush().await;
    assert_eq!(
        widget.calls(),
        vec![
            WidgetCall::Seek(120.5),
            WidgetCall::Play,
            WidgetCall::Pause,
            WidgetCall::Seek(30.0),
            WidgetCall::Play,
        ]
    );
    assert_eq!(h.session.current_time(), 30.0);
    assert!(h.session.status().is_playing);
}

#[tokio::test(start_paused = true)]
async fn paused_switch_stays_paused() {
    let media = LessonMedia::new().with_resolutions(resolutions());
    let h = mount(ScriptedFactory::new(600.0), media);
    flush().await;
    assert_eq!(h.session.status().current_resolution_id.as_deref(), Some("1080p"));

    h.session.seek_to(64.0);
    flush().await;
    h.session.set_quality("720p").unwrap();
    flush().await;

    let status = h.session.status();
    assert!(!status.is_playing);
    assert!(!status.is_loading);
    assert_eq!(status.current_time, 64.0);
    assert!(!h.widget().is_playing());
}

#[tokio::test(start_paused = true)]
async fn hint_only_widget_gets_a_quality_hint() {
    let caps = Capabilities {
        load_source: false,
        ..Capabilities::all()
    };
    let media = LessonMedia::new().with_resolutions(resolutions());
    let h = mount(ScriptedFactory::new(600.0).with_capabilities(caps), media);
    flush().await;
    h.session.play();
    flush().await;
    h.widget().clear_calls();

    h.session.set_quality("720p").unwrap();
    flush().await;
    assert_eq!(h.widget().calls(), vec![WidgetCall::QualityHint("hd720".into())]);
    assert!(h.session.status().is_playing);
}

#[tokio::test(start_paused = true)]
async fn auto_quality_hands_selection_back_to_the_widget() {
    let caps = Capabilities {
        load_source: false,
        ..Capabilities::all()
    };
    let media = LessonMedia::new().with_resolutions(resolutions());
    let h = mount(ScriptedFactory::new(600.0).with_capabilities(caps), media);
    flush().await;
    h.session.set_quality("720p").unwrap();
    flush().await;
    h.widget().clear_calls();

    h.session.set_auto_quality();
    h.session.set_auto_quality();
    flush().await;
    assert_eq!(h.widget().calls(), vec![WidgetCall::QualityHint("default".into())]);
    assert_eq!(h.session.status().current_resolution_id, None);

    h.session.set_quality("1080p").unwrap();
    flush().await;
    assert_eq!(h.widget().calls()[1], WidgetCall::QualityHint("hd1080".into()));
    assert_eq!(h.session.status().current_resolution_id.as_deref(), Some("1080p"));
}

/// Ends playback on a 100s lesson, then starts a swap to 720p that stays
/// pending until the test finishes the source load.
async fn ended_with_pending_switch() -> Harness {
    let media = LessonMedia::new().with_resolutions(resolutions());
    let h = mount(ScriptedFactory::new(100.0).with_manual_source_load(), media);
    flush().await;
    h.session.play();
    flush().await;
    let widget = h.widget();
    widget.set_current_time(100.0);
    widget.emit_state(PlaybackState::Ended);
    flush().await;
    assert_eq!(h.session.state(), PlaybackState::Ended);
    assert_eq!(h.completes(), 1);

    h.session.set_quality("720p").unwrap();
    flush().await;
    assert_eq!(h.session.state(), PlaybackState::Ended);
    h
}

#[tokio::test(start_paused = true)]
async fn play_after_end_during_a_switch_restarts() {
    let h = ended_with_pending_switch().await;
    let widget = h.widget();

    h.session.play();
    flush().await;
    assert!(!widget.is_playing());
    widget.clear_calls();

    widget.finish_source_load();
    flush().await;
    assert_eq!(
        widget.calls(),
        vec![
            WidgetCall::Seek(100.0),
            WidgetCall::Pause,
            WidgetCall::Seek(0.0),
            WidgetCall::Play,
        ]
    );
    assert!(widget.is_playing());
    assert_eq!(h.session.state(), PlaybackState::Playing);

    sleep_ms(2_000).await;
    assert!(h.time_updates() > 0);
    assert!(h.session.current_time() > 1.0);
    assert_eq!(h.completes(), 1);
}

#[tokio::test(start_paused = true)]
async fn replay_during_a_switch_is_not_lost() {
    let h = ended_with_pending_switch().await;
    let widget = h.widget();

    h.session.replay();
    flush().await;
    assert!(!widget.is_playing());

    widget.finish_source_load();
    flush().await;
    assert!(widget.is_playing());
    assert_eq!(h.session.state(), PlaybackState::Playing);
    assert!(h.session.status().is_playing);
}

#[tokio::test(start_paused = true)]
async fn deferred_seek_out_of_the_end_then_play_continues_there() {
    let h = ended_with_pending_switch().await;
    let widget = h.widget();

    h.session.seek_to(40.0);
    h.session.play();
    widget.finish_source_load();
    flush().await;
    assert_eq!(h.session.state(), PlaybackState::Playing);
    assert!((widget.position() - 40.0).abs() < 1e-6);
}

#[tokio::test(start_paused = true)]
async fn deferred_nan_seek_lands_at_the_start() {
    let media = LessonMedia::new().with_resolutions(resolutions());
    let h = mount(ScriptedFactory::new(600.0).with_manual_source_load(), media);
    flush().await;
    h.session.seek_to(50.0);
    h.session.set_quality("720p").unwrap();
    flush().await;

    h.session.seek_to(f64::NAN);
    h.widget().finish_source_load();
    flush().await;
    let t = h.session.current_time();
    assert_eq!(t, 0.0);
    assert_eq!(h.session.status().current_time, 0.0);
}

#[tokio::test(start_paused = true)]
async fn quality_errors() {
    let h = mount(ScriptedFactory::new(600.0), LessonMedia::default());
    flush().await;
    assert!(matches!(h.session.set_quality("720p"), Err(Error::QualityUnavailable)));

    let media = LessonMedia::new().with_resolutions(resolutions());
    let h = mount(ScriptedFactory::new(600.0), media);
    flush().await;
    assert!(matches!(h.session.set_quality("4k"), Err(Error::UnknownResolution(_))));
    assert!(h.session.set_quality("1080p").is_ok());
}

#[tokio::test(start_paused = true)]
async fn controls_hide_after_inactivity_while_playing() {
    let h = mount(ScriptedFactory::new(600.0), LessonMedia::default());
    flush().await;
    h.session.play();
    flush().await;

    sleep_ms(2_999).await;
    assert!(h.session.status().show_controls);
    h.session.pointer_moved();

    sleep_ms(2).await;
    assert!(h.session.status().show_controls);
    sleep_ms(2_996).await;
    assert!(h.session.status().show_controls);
    sleep_ms(4).await;
    assert!(!h.session.status().show_controls);

    h.session.pointer_moved();
    assert!(h.session.status().show_controls);

    h.session.pause();
    flush().await;
    sleep_ms(10_000).await;
    assert!(h.session.status().show_controls);
}

#[tokio::test(start_paused = true)]
async fn controls_stay_visible_when_not_playing() {
    let h = mount(ScriptedFactory::new(600.0), LessonMedia::default());
    flush().await;
    h.session.pointer_moved();
    sleep_ms(5_000).await;
    assert!(h.session.status().show_controls);
}

#[tokio::test(start_paused = true)]
async fn zero_duration_progress_is_zero() {
    let h = mount(ScriptedFactory::new(0.0), LessonMedia::default());
    flush().await;
    h.session.play();
    flush().await;
    sleep_ms(1_010).await;

    let progress = h.session.progress();
    assert_eq!(progress.played_percent, 0.0);
    assert_eq!(progress.buffered_percent, 0.0);
    assert!(h.session.current_time() > 0.0);
    assert_eq!(h.completes(), 0);
}

#[tokio::test(start_paused = true)]
async fn transcript_scenario() {
    let segments = vec![
        RangeSegment::new("s1", 0.0, 10.5, "Welcome"),
        RangeSegment::new("s2", 10.6, 18.2, "What a pointer is"),
        RangeSegment::new("s3", 18.3, 28.1, "Dereferencing"),
    ];
    let h = mount(
        ScriptedFactory::new(1245.0),
        LessonMedia::new().with_segments(segments),
    );
    flush().await;
    assert_eq!(h.session.status().duration, 1245.0);

    h.session.seek_to(15.0);
    assert_eq!(h.session.current_time(), 15.0);
    assert_eq!(h.session.active_segment().map(|s| s.id), Some("s2".to_string()));

    h.session.seek_to(16.0);
    h.session.seek_to(50.0);
    assert_eq!(h.session.active_segment(), None);

    let seen = h.segments.lock().unwrap().clone();
    assert_eq!(
        seen,
        vec![Some("s1".to_string()), Some("s2".to_string()), None]
    );
}

#[tokio::test(start_paused = true)]
async fn active_segment_follows_playback() {
    let segments = vec![
        RangeSegment::new("s1", 0.0, 0.9, "intro"),
        RangeSegment::new("s2", 1.0, 10.0, "body"),
    ];
    let h = mount(ScriptedFactory::new(60.0), LessonMedia::new().with_segments(segments));
    flush().await;
    h.session.play();
    flush().await;
    sleep_ms(3_010).await;

    // six ticks, but only one identity change after the initial segment
    let seen = h.segments.lock().unwrap().clone();
    assert_eq!(seen, vec![Some("s1".to_string()), Some("s2".to_string())]);
}

#[tokio::test(start_paused = true)]
async fn invalid_transcript_degrades_to_none() {
    let segments = vec![
        RangeSegment::new("a", 0.0, 6.0, ""),
        RangeSegment::new("b", 5.0, 9.0, ""),
    ];
    let h = mount(ScriptedFactory::new(60.0), LessonMedia::new().with_segments(segments));
    flush().await;
    assert!(h.session.transcript().is_empty());
    assert_eq!(h.session.status().availability, Availability::Live);
}

#[tokio::test(start_paused = true)]
async fn seek_to_note_and_segment() {
    use lessonsync::{NoteBook, NoteDraft};

    let h = mount(ScriptedFactory::new(600.0), LessonMedia::default());
    flush().await;

    let mut notes = NoteBook::new();
    let pinned = notes.add(NoteDraft::new("look here").at(42.0)).unwrap().clone();
    let general = notes.add(NoteDraft::new("overall remark")).unwrap().clone();

    assert!(h.session.seek_to_note(&pinned));
    assert_eq!(h.session.current_time(), 42.0);
    assert!(!h.session.seek_to_note(&general));
    assert_eq!(h.session.current_time(), 42.0);

    h.session.seek_to_segment(&RangeSegment::new("s", 90.0, 95.0, ""));
    assert_eq!(h.session.current_time(), 90.0);
    assert_eq!(h.time_updates(), 0);
}

#[tokio::test(start_paused = true)]
async fn volume_mute_and_rate() {
    let h = mount(ScriptedFactory::new(600.0), LessonMedia::default());
    flush().await;
    let widget = h.widget();

    h.session.set_volume(0);
    assert!(h.session.status().muted);
    h.session.set_volume(40);
    let status = h.session.status();
    assert!(!status.muted);
    assert_eq!(status.volume, 40);
    assert_eq!(
        widget.calls(),
        vec![
            WidgetCall::Volume(0),
            WidgetCall::Mute,
            WidgetCall::Volume(40),
            WidgetCall::Unmute,
        ]
    );

    h.session.toggle_mute();
    assert!(h.session.status().muted);
    h.session.toggle_mute();
    assert!(!h.session.status().muted);

    assert!(matches!(h.session.set_playback_rate(3.0), Err(Error::InvalidPlaybackRate(_))));
    assert!(h.session.set_playback_rate(f64::NAN).is_err());
    h.session.set_playback_rate(1.5).unwrap();
    assert_eq!(h.session.status().playback_rate, 1.5);
    assert_eq!(widget.calls().last(), Some(&WidgetCall::Rate(1.5)));
}

#[tokio::test(start_paused = true)]
async fn toggle_play_flips_state() {
    let h = mount(ScriptedFactory::new(600.0), LessonMedia::default());
    flush().await;
    h.session.toggle_play();
    flush().await;
    assert!(h.session.status().is_playing);
    h.session.toggle_play();
    flush().await;
    assert_eq!(h.session.state(), PlaybackState::Paused);
}

#[tokio::test(start_paused = true)]
async fn resume_position_is_sought_on_ready() {
    let lesson = LessonDescriptor::new("lesson-1", "Pointers", VIDEO).with_resume_from(42.0);
    let h = mount_lesson(lesson, ScriptedFactory::new(600.0), LessonMedia::default());
    flush().await;
    assert_eq!(h.factory.last_request().unwrap().start_seconds, 42.0);
    assert_eq!(h.session.current_time(), 42.0);
    assert!(h.widget().calls().contains(&WidgetCall::Seek(42.0)));
}

#[tokio::test(start_paused = true)]
async fn unmount_stops_timers_and_releases_widget() {
    let h = mount(ScriptedFactory::new(600.0), LessonMedia::default());
    flush().await;
    h.session.play();
    flush().await;
    sleep_ms(1_010).await;
    let ticks = h.time_updates();
    assert_eq!(ticks, 2);

    h.session.unmount();
    let widget = h.widget();
    assert!(widget.is_destroyed());

    sleep_ms(5_000).await;
    assert_eq!(h.time_updates(), ticks);

    h.session.play();
    h.session.seek_to(10.0);
    h.session.unmount();
    assert_eq!(widget.calls().last(), Some(&WidgetCall::Destroy));
}

#[tokio::test(start_paused = true)]
async fn dropping_the_session_releases_widget() {
    let h = mount(ScriptedFactory::new(600.0), LessonMedia::default());
    flush().await;
    let widget = h.widget();
    let times = h.times.clone();
    h.session.play();
    flush().await;

    drop(h);
    assert!(widget.is_destroyed());
    sleep_ms(2_000).await;
    assert!(times.lock().unwrap().is_empty());
}

#[tokio::test(start_paused = true)]
async fn change_lesson_rebuilds_widget_and_resets_latch() {
    let h = mount(ScriptedFactory::new(100.0), LessonMedia::default());
    flush().await;
    h.session.play();
    flush().await;
    let first = h.widget();
    first.emit_state(PlaybackState::Ended);
    flush().await;
    assert!(h.session.status().completed);

    // same lesson id, different video: the latch survives
    h.session.change_lesson(
        LessonDescriptor::new("lesson-1", "Pointers", "https://youtu.be/aaaaaaaaaaa"),
        LessonMedia::default(),
    );
    flush().await;
    assert!(first.is_destroyed());
    assert_eq!(h.factory.created(), 2);
    assert!(h.session.status().completed);
    assert_eq!(h.session.state(), PlaybackState::Unstarted);

    // events from the released widget are ignored
    first.emit_state(PlaybackState::Playing);
    flush().await;
    assert_eq!(h.session.state(), PlaybackState::Unstarted);

    h.session.change_lesson(
        LessonDescriptor::new("lesson-2", "References", "https://youtu.be/bbbbbbbbbbb"),
        LessonMedia::default(),
    );
    flush().await;
    assert_eq!(h.factory.created(), 3);
    assert!(!h.session.status().completed);

    h.session.play();
    flush().await;
    h.widget().emit_state(PlaybackState::Ended);
    flush().await;
    assert_eq!(h.completes(), 2);
}
