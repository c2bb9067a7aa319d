//! Integration tests for the stream session manager.
//!
//! Covers open/close, every branch of channel switching, the busy guard,
//! stream I/O and per-channel settings.
//!
//! Tests CAN use `.unwrap()` and `.expect()`.

use std::sync::Arc;

use pvr_addon::testing::MockBackend;
use pvr_addon::{
    AddonDescriptor, CollectingNotifier, MemoryAddonSource, MemoryIdentityStore,
    MemorySettingsStore,
};
use pvr_core::{
    AddonId, BackendError, Capabilities, Channel, ClientId, PvrError, Recording, SeekWhence,
    SignalStatus, VideoSettings,
};
use pvrd::{ClientEvent, ClientsConfig, Collaborators, PvrClients, SettingsAction, StreamKind, SwitchOutcome};

// ============================================================================
// Test Helpers
// ============================================================================

const A: ClientId = ClientId::new(1);
const B: ClientId = ClientId::new(2);

struct Fixture {
    clients: Arc<PvrClients>,
    source: Arc<MemoryAddonSource>,
    settings: Arc<MemorySettingsStore>,
    a: Arc<MockBackend>,
    b: Arc<MockBackend>,
}

async fn fixture_with(a: MockBackend, b: MockBackend) -> Fixture {
    let a = Arc::new(a);
    let b = Arc::new(b);
    let source = Arc::new(MemoryAddonSource::with_addons(vec![
        AddonDescriptor::new("pvr.a", "A", a.clone()),
        AddonDescriptor::new("pvr.b", "B", b.clone()),
    ]));
    let settings = Arc::new(MemorySettingsStore::new());

    let clients = Arc::new(PvrClients::new(
        ClientsConfig::default(),
        Collaborators {
            addons: source.clone(),
            identities: Arc::new(MemoryIdentityStore::new()),
            settings: settings.clone(),
            notifier: Arc::new(CollectingNotifier::new()),
        },
    ));
    clients.update_and_initialise_clients(false).await;

    Fixture {
        clients,
        source,
        settings,
        a,
        b,
    }
}

async fn fixture() -> Fixture {
    fixture_with(MockBackend::new("Backend A"), MockBackend::new("Backend B")).await
}

fn tv(uid: u32, client: ClientId) -> Channel {
    Channel::new(uid, client, format!("TV {uid}"))
}

// ============================================================================
// Open / Close Tests
// ============================================================================

#[tokio::test]
async fn test_idle_accessors() {
    let f = fixture().await;
    let stream = f.clients.stream();

    assert!(!stream.is_playing());
    assert!(!stream.is_playing_live());
    assert!(!stream.is_playing_recording());
    assert!(!stream.is_playing_tv());
    assert!(!stream.is_playing_radio());
    assert!(!stream.is_encrypted());
    assert!(!stream.can_record_instantly());
    assert_eq!(stream.current_client_id(), ClientId::INVALID);
    assert_eq!(stream.playing_client_name(), None);
    assert_eq!(stream.current_input_format(), "");
}

#[tokio::test]
async fn test_open_live_and_close() {
    let f = fixture().await;
    let stream = f.clients.stream();
    let mut rx = f.clients.subscribe();

    let mut channel = tv(1, A);
    channel.input_format = "video/mp2t".into();
    channel.can_record = true;
    stream.open_live(&channel).await.unwrap();

    assert!(stream.is_playing_live());
    assert!(stream.is_playing_tv());
    assert_eq!(stream.current_client_id(), A);
    assert_eq!(stream.playing_client_name().as_deref(), Some("Backend A"));
    assert_eq!(stream.current_input_format(), "video/mp2t");
    assert!(stream.can_record_instantly());
    assert_eq!(f.a.playing_channel(), Some(channel.clone()));

    stream.close_stream().await;
    assert!(!stream.is_playing());
    assert_eq!(f.a.call_count("close_stream"), 1);

    assert_eq!(
        rx.try_recv().unwrap(),
        ClientEvent::StreamOpened {
            client_id: A,
            kind: StreamKind::LiveTv,
        }
    );
    assert_eq!(rx.try_recv().unwrap(), ClientEvent::StreamClosed { client_id: A });
}

#[tokio::test]
async fn test_open_recording_replaces_live_stream() {
    let f = fixture().await;
    let stream = f.clients.stream();

    stream.open_live(&tv(1, A)).await.unwrap();
    let recording = Recording::new("r1", B, "Evening News");
    stream.open_recording(&recording).await.unwrap();

    assert_eq!(f.a.call_count("close_stream"), 1);
    assert!(stream.is_playing_recording());
    assert!(!stream.is_playing_tv());
    assert_eq!(stream.current_client_id(), B);
    assert_eq!(stream.playing_recording(), Some(recording));
    assert_eq!(stream.playing_channel(), None);
}

#[tokio::test]
async fn test_failed_open_leaves_idle() {
    let f = fixture().await;
    let stream = f.clients.stream();
    f.b.fail("open_live_stream", BackendError::ServerError);

    stream.open_live(&tv(1, A)).await.unwrap();
    let result = stream.open_live(&tv(2, B)).await;

    assert!(matches!(result, Err(PvrError::Backend { client: B, .. })));
    assert!(!stream.is_playing());
}

#[tokio::test]
async fn test_open_on_unknown_client() {
    let f = fixture().await;
    let unknown = ClientId::new(9);
    assert_eq!(
        f.clients.stream().open_live(&tv(1, unknown)).await,
        Err(PvrError::NotFound(unknown))
    );
}

#[tokio::test]
async fn test_close_is_unconditional() {
    let f = fixture().await;
    let stream = f.clients.stream();
    f.a.fail("close_stream", BackendError::Failed);

    stream.open_live(&tv(1, A)).await.unwrap();
    stream.close_stream().await;

    assert!(!stream.is_playing());
}

#[tokio::test]
async fn test_virtual_channel_display_name() {
    let f = fixture().await;
    let stream = f.clients.stream();

    let mut channel = tv(1, A);
    channel.is_virtual = true;
    stream.open_live(&channel).await.unwrap();

    assert_eq!(stream.playing_client_name().as_deref(), Some("Unknown"));
}

// ============================================================================
// Switch Tests
// ============================================================================

#[tokio::test]
async fn test_switch_same_client_in_place() {
    let f = fixture().await;
    let stream = f.clients.stream();
    stream.open_live(&tv(1, A)).await.unwrap();

    let outcome = stream.switch_channel(&tv(2, A)).await.unwrap();

    assert_eq!(outcome, SwitchOutcome::Switched);
    assert_eq!(f.a.call_count("switch_channel"), 1);
    assert_eq!(f.a.call_count("close_stream"), 0);
    assert_eq!(stream.playing_channel(), Some(tv(2, A)));
    assert!(!f.clients.registry().is_switching());
}

#[tokio::test]
async fn test_switch_to_playing_channel_is_noop() {
    let f = fixture().await;
    let stream = f.clients.stream();
    stream.open_live(&tv(1, A)).await.unwrap();
    f.a.clear_calls();

    let outcome = stream.switch_channel(&tv(1, A)).await.unwrap();

    assert_eq!(outcome, SwitchOutcome::Unchanged);
    assert!(f.a.calls().is_empty());
}

#[tokio::test]
async fn test_switch_across_clients_reopens() {
    let f = fixture().await;
    let stream = f.clients.stream();
    stream.open_live(&tv(1, A)).await.unwrap();

    let outcome = stream.switch_channel(&tv(5, B)).await.unwrap();

    assert_eq!(outcome, SwitchOutcome::Reopened);
    assert_eq!(f.a.call_count("close_stream"), 1);
    assert_eq!(f.b.call_count("open_live_stream"), 1);
    assert_eq!(f.b.call_count("switch_channel"), 0);
    assert_eq!(stream.current_client_id(), B);
}

#[tokio::test]
async fn test_switch_tv_to_radio_reopens() {
    let f = fixture().await;
    let stream = f.clients.stream();
    stream.open_live(&tv(1, A)).await.unwrap();

    let radio = Channel::new(2, A, "Radio").radio();
    let outcome = stream.switch_channel(&radio).await.unwrap();

    assert_eq!(outcome, SwitchOutcome::Reopened);
    assert_eq!(f.a.call_count("switch_channel"), 0);
    assert!(stream.is_playing_radio());
}

#[tokio::test]
async fn test_switch_while_idle_opens() {
    let f = fixture().await;
    let outcome = f.clients.stream().switch_channel(&tv(1, A)).await.unwrap();
    assert_eq!(outcome, SwitchOutcome::Reopened);
    assert!(f.clients.stream().is_playing_live());
}

#[tokio::test]
async fn test_switch_to_external_url_hands_back_url() {
    let f = fixture().await;
    let stream = f.clients.stream();
    stream.open_live(&tv(1, A)).await.unwrap();

    let iptv = tv(2, A).with_stream_url("http://iptv.example/2.ts");
    let outcome = stream.switch_channel(&iptv).await.unwrap();

    assert_eq!(
        outcome,
        SwitchOutcome::External("http://iptv.example/2.ts".to_string())
    );
    assert!(!stream.is_playing());
    assert_eq!(f.a.call_count("switch_channel"), 0);
}

#[tokio::test]
async fn test_switch_from_external_url_reopens() {
    let f = fixture().await;
    let stream = f.clients.stream();
    let iptv = tv(2, A).with_stream_url("http://iptv.example/2.ts");
    stream.open_live(&iptv).await.unwrap();
    f.a.clear_calls();

    let outcome = stream.switch_channel(&tv(3, A)).await.unwrap();

    assert_eq!(outcome, SwitchOutcome::Reopened);
    assert_eq!(f.a.call_count("close_stream"), 1);
    assert_eq!(f.a.call_count("open_live_stream"), 1);
    assert_eq!(f.a.call_count("switch_channel"), 0);
    assert_eq!(stream.playing_channel(), Some(tv(3, A)));
}

#[tokio::test]
async fn test_failed_in_place_switch_keeps_session() {
    let f = fixture().await;
    let stream = f.clients.stream();
    stream.open_live(&tv(1, A)).await.unwrap();
    f.a.fail("switch_channel", BackendError::ServerTimeout);

    let result = stream.switch_channel(&tv(2, A)).await;

    assert!(matches!(
        result,
        Err(PvrError::Backend {
            source: BackendError::ServerTimeout,
            ..
        })
    ));
    assert_eq!(stream.playing_channel(), Some(tv(1, A)));
    assert!(!f.clients.registry().is_switching());
}

#[tokio::test]
async fn test_concurrent_switch_is_busy() {
    let f = fixture().await;
    f.clients.stream().open_live(&tv(1, A)).await.unwrap();
    let block = f.a.block("switch_channel");

    let clients = Arc::clone(&f.clients);
    let first = tokio::spawn(async move { clients.stream().switch_channel(&tv(2, A)).await });

    block.entered.notified().await;
    assert!(f.clients.registry().is_switching());

    let second = f.clients.stream().switch_channel(&tv(3, A)).await;
    assert_eq!(second, Err(PvrError::SwitchBusy));

    block.release.notify_one();
    assert_eq!(first.await.unwrap(), Ok(SwitchOutcome::Switched));
    assert!(!f.clients.registry().is_switching());
    assert_eq!(f.a.call_count("switch_channel"), 1);
}

#[tokio::test]
async fn test_cancelled_switch_clears_guard() {
    let f = fixture().await;
    f.clients.stream().open_live(&tv(1, A)).await.unwrap();
    let block = f.a.block("switch_channel");

    let clients = Arc::clone(&f.clients);
    let task = tokio::spawn(async move { clients.stream().switch_channel(&tv(2, A)).await });

    block.entered.notified().await;
    task.abort();
    assert!(task.await.unwrap_err().is_cancelled());

    assert!(!f.clients.registry().is_switching());
    f.a.unblock("switch_channel");
    assert_eq!(
        f.clients.stream().switch_channel(&tv(2, A)).await,
        Ok(SwitchOutcome::Switched)
    );
}

// ============================================================================
// Stream I/O Tests
// ============================================================================

#[tokio::test]
async fn test_stream_io_requires_active_stream() {
    let f = fixture().await;
    let stream = f.clients.stream();
    let mut buf = [0u8; 8];

    assert_eq!(stream.read_stream(&mut buf).await, Err(PvrError::NoActiveStream));
    assert_eq!(stream.stream_length().await, Err(PvrError::NoActiveStream));
    assert_eq!(stream.stream_position().await, Err(PvrError::NoActiveStream));
    assert_eq!(
        stream.seek_stream(0, SeekWhence::Set).await,
        Err(PvrError::NoActiveStream)
    );
    assert!(stream.stream_properties().await.is_err());
}

#[tokio::test]
async fn test_stream_io_on_playing_client() {
    let f = fixture_with(
        MockBackend::new("Backend A").with_stream_data(b"0123456789".to_vec()),
        MockBackend::new("Backend B"),
    )
    .await;
    let stream = f.clients.stream();
    stream.open_live(&tv(1, A)).await.unwrap();

    let mut buf = [0u8; 4];
    assert_eq!(stream.read_stream(&mut buf).await, Ok(4));
    assert_eq!(&buf, b"0123");
    assert_eq!(stream.stream_length().await, Ok(10));
    assert_eq!(stream.seek_stream(2, SeekWhence::Current).await, Ok(6));
    assert_eq!(stream.stream_position().await, Ok(6));
    assert_eq!(f.b.call_count("read_stream"), 0);
}

// ============================================================================
// Signal Status Tests
// ============================================================================

#[tokio::test]
async fn test_supervisor_refreshes_signal_of_live_stream() {
    let signal = SignalStatus {
        adapter_name: "DVB-T #0".into(),
        snr: 80,
        signal: 65,
        ..SignalStatus::default()
    };
    let f = fixture_with(
        MockBackend::new("Backend A").with_signal(signal.clone()),
        MockBackend::new("Backend B"),
    )
    .await;
    let stream = f.clients.stream();
    stream.open_live(&tv(1, A)).await.unwrap();
    assert_eq!(stream.signal_status(), None);

    f.clients.update_and_initialise_clients(false).await;
    assert_eq!(stream.signal_status(), Some(signal));

    stream.close_stream().await;
    assert_eq!(stream.signal_status(), None);
}

// ============================================================================
// Channel Settings Tests
// ============================================================================

#[tokio::test]
async fn test_settings_skipped_until_loaded() {
    let f = fixture().await;
    let stream = f.clients.stream();
    let tweaked = VideoSettings {
        brightness: 70.0,
        ..VideoSettings::default()
    };

    assert_eq!(stream.save_channel_settings(&tweaked), Ok(SettingsAction::Skipped));

    stream.open_live(&tv(1, A)).await.unwrap();
    assert_eq!(stream.save_channel_settings(&tweaked), Ok(SettingsAction::Skipped));
    assert!(f.settings.is_empty());
}

#[tokio::test]
async fn test_settings_saved_then_deleted() {
    let f = fixture().await;
    let stream = f.clients.stream();
    stream.open_live(&tv(1, A)).await.unwrap();

    assert_eq!(stream.load_channel_settings().unwrap(), VideoSettings::default());

    let tweaked = VideoSettings {
        brightness: 70.0,
        ..VideoSettings::default()
    };
    assert_eq!(stream.save_channel_settings(&tweaked), Ok(SettingsAction::Saved));
    assert_eq!(f.settings.len(), 1);
    assert_eq!(stream.load_channel_settings().unwrap(), tweaked);

    assert_eq!(
        stream.save_channel_settings(&VideoSettings::default()),
        Ok(SettingsAction::Deleted)
    );
    assert!(f.settings.is_empty());
}

#[tokio::test]
async fn test_switch_invalidates_settings() {
    let f = fixture().await;
    let stream = f.clients.stream();
    stream.open_live(&tv(1, A)).await.unwrap();
    stream.load_channel_settings().unwrap();

    stream.switch_channel(&tv(2, A)).await.unwrap();

    let tweaked = VideoSettings {
        contrast: 10.0,
        ..VideoSettings::default()
    };
    assert_eq!(stream.save_channel_settings(&tweaked), Ok(SettingsAction::Skipped));
}

#[tokio::test]
async fn test_load_settings_requires_live_channel() {
    let f = fixture().await;
    assert_eq!(
        f.clients.stream().load_channel_settings(),
        Err(PvrError::NoActiveStream)
    );
}

// ============================================================================
// Client Departure Tests
// ============================================================================

#[tokio::test]
async fn test_uninstalling_playing_client_resets_session() {
    let f = fixture().await;
    let stream = f.clients.stream();
    stream.open_live(&tv(1, B)).await.unwrap();

    f.source.uninstall(&AddonId::new("pvr.b"));
    let pass = f.clients.update_and_initialise_clients(false).await;

    assert_eq!(pass.removed, 1);
    assert!(!stream.is_playing());
    assert_eq!(stream.current_client_id(), ClientId::INVALID);
}

#[tokio::test]
async fn test_record_instantly_needs_timer_capability() {
    let f = fixture_with(
        MockBackend::new("Backend A").with_capabilities(Capabilities {
            timers: false,
            ..Capabilities::full()
        }),
        MockBackend::new("Backend B"),
    )
    .await;
    let stream = f.clients.stream();

    let mut channel = tv(1, A);
    channel.can_record = true;
    stream.open_live(&channel).await.unwrap();

    assert!(!stream.can_record_instantly());
}
