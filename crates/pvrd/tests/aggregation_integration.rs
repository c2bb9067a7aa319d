//! Integration tests for fan-out and single-client data operations.
//!
//! Tests CAN use `.unwrap()` and `.expect()`.

use std::sync::Arc;

use chrono::{Duration as ChronoDuration, TimeZone, Utc};
use pvr_addon::testing::MockBackend;
use pvr_addon::{
    AddonDescriptor, CollectingNotifier, MemoryAddonSource, MemoryIdentityStore,
    MemorySettingsStore,
};
use pvr_core::{
    BackendError, Capabilities, Channel, ChannelGroup, ClientId, EpgEntry, GroupMember, MenuHook,
    MenuHookCategory, PvrError, Recording, Timer, TimerState,
};
use pvrd::{ClientsConfig, Collaborators, PvrClients};

// ============================================================================
// Test Helpers
// ============================================================================

const A: ClientId = ClientId::new(1);
const B: ClientId = ClientId::new(2);
const C: ClientId = ClientId::new(3);

/// Builds the engine over `mocks` and brings every client online.
/// Identities follow the order of `mocks`, starting at 1.
async fn connected(mocks: &[(&str, Arc<MockBackend>)]) -> PvrClients {
    let addons = mocks
        .iter()
        .map(|(id, mock)| AddonDescriptor::new(*id, id.to_uppercase(), mock.clone()))
        .collect();

    let clients = PvrClients::new(
        ClientsConfig::default(),
        Collaborators {
            addons: Arc::new(MemoryAddonSource::with_addons(addons)),
            identities: Arc::new(MemoryIdentityStore::new()),
            settings: Arc::new(MemorySettingsStore::new()),
            notifier: Arc::new(CollectingNotifier::new()),
        },
    );
    clients.update_and_initialise_clients(false).await;
    clients
}

fn timer(index: u32, client: ClientId, title: &str) -> Timer {
    let start = Utc.with_ymd_and_hms(2024, 3, 1, 20, 0, 0).unwrap();
    Timer::new(index, client, 1, title, start, start + ChronoDuration::hours(1))
}

// ============================================================================
// Fan-out Tests
// ============================================================================

#[tokio::test]
async fn test_no_clients_yields_empty_success() {
    let clients = connected(&[]).await;

    let timers = clients.data().get_timers().await;
    assert!(timers.is_ok());
    assert!(timers.is_empty());
    assert_eq!(clients.data().recording_count().await, 0);
}

#[tokio::test]
async fn test_timers_merged_across_clients() {
    let a = Arc::new(MockBackend::new("a").with_timers(vec![timer(1, A, "News"), timer(2, A, "Film")]));
    let b = Arc::new(MockBackend::new("b").with_timers(vec![timer(1, B, "Match")]));
    let clients = connected(&[("pvr.a", a), ("pvr.b", b)]).await;

    let timers = clients.data().get_timers().await.into_result().unwrap();
    let titles: Vec<&str> = timers.iter().map(|t| t.title.as_str()).collect();
    assert_eq!(titles, vec!["News", "Film", "Match"]);
    assert_eq!(timers[2].client_id, B);
}

#[tokio::test]
async fn test_failing_client_keeps_partial_data() {
    let a = Arc::new(MockBackend::new("a").with_recordings(vec![Recording::new("r1", A, "Doc")]));
    let b = Arc::new(MockBackend::new("b").with_recordings(vec![Recording::new("r2", B, "Show")]));
    b.fail("get_recordings", BackendError::ServerTimeout);
    let clients = connected(&[("pvr.a", a), ("pvr.b", b)]).await;

    let recordings = clients.data().get_recordings().await;
    assert_eq!(recordings.len(), 1);
    assert_eq!(recordings.items[0].title, "Doc");
    assert_eq!(
        recordings.error,
        Some(PvrError::Backend {
            client: B,
            operation: "get_recordings",
            source: BackendError::ServerTimeout,
        })
    );
}

#[tokio::test]
async fn test_one_of_three_not_supported() {
    let a = Arc::new(MockBackend::new("a").with_timers(vec![timer(1, A, "News")]));
    let b = Arc::new(MockBackend::new("b").with_timers(vec![timer(1, B, "Hidden")]));
    let c = Arc::new(MockBackend::new("c").with_timers(vec![timer(1, C, "Match")]));
    b.fail("get_timers", BackendError::NotImplemented);
    let clients = connected(&[("pvr.a", a), ("pvr.b", b.clone()), ("pvr.c", c)]).await;

    let timers = clients.data().get_timers().await;

    assert!(timers.is_ok());
    let owners: Vec<ClientId> = timers.items.iter().map(|t| t.client_id).collect();
    assert_eq!(owners, vec![A, C]);
    assert_eq!(b.call_count("get_timers"), 1);
}

#[tokio::test]
async fn test_one_of_three_fails() {
    let a = Arc::new(MockBackend::new("a").with_timers(vec![timer(1, A, "News")]));
    let b = Arc::new(MockBackend::new("b").with_timers(vec![timer(1, B, "Lost")]));
    let c = Arc::new(MockBackend::new("c").with_timers(vec![timer(1, C, "Match")]));
    b.fail("get_timers", BackendError::ServerError);
    let clients = connected(&[("pvr.a", a), ("pvr.b", b), ("pvr.c", c.clone())]).await;

    let timers = clients.data().get_timers().await;

    let owners: Vec<ClientId> = timers.items.iter().map(|t| t.client_id).collect();
    assert_eq!(owners, vec![A, C]);
    assert_eq!(c.call_count("get_timers"), 1);
    assert_eq!(
        timers.error,
        Some(PvrError::Backend {
            client: B,
            operation: "get_timers",
            source: BackendError::ServerError,
        })
    );
}

#[tokio::test]
async fn test_missing_capability_is_skipped() {
    let a = Arc::new(MockBackend::new("a").with_timers(vec![timer(1, A, "News")]));
    let b = Arc::new(
        MockBackend::new("b")
            .with_capabilities(Capabilities {
                timers: false,
                ..Capabilities::full()
            })
            .with_timers(vec![timer(1, B, "Hidden")]),
    );
    let clients = connected(&[("pvr.a", a), ("pvr.b", b.clone())]).await;

    let timers = clients.data().get_timers().await;
    assert!(timers.is_ok());
    assert_eq!(timers.len(), 1);
    assert_eq!(b.call_count("get_timers"), 0);
}

#[tokio::test]
async fn test_offline_client_is_not_asked() {
    let a = Arc::new(MockBackend::new("a").with_timers(vec![timer(1, A, "News")]));
    let b = Arc::new(MockBackend::new("b").with_timers(vec![timer(1, B, "Match")]));
    let clients = connected(&[("pvr.a", a), ("pvr.b", b.clone())]).await;

    b.set_ready(false);
    assert_eq!(clients.data().timer_count().await, 1);
    assert_eq!(b.call_count("get_timers"), 0);
}

#[tokio::test]
async fn test_channels_and_groups() {
    let a = Arc::new(
        MockBackend::new("a")
            .with_channels(vec![
                Channel::new(1, A, "TV One"),
                Channel::new(2, A, "Radio One").radio(),
            ])
            .with_groups(
                vec![ChannelGroup::new("News", false, A)],
                vec![GroupMember {
                    group_name: "News".into(),
                    channel_uid: 1,
                    channel_number: 1,
                    client_id: A,
                }],
            ),
    );
    let b = Arc::new(
        MockBackend::new("b")
            .with_channels(vec![Channel::new(9, B, "TV Nine")])
            .with_groups(
                vec![ChannelGroup::new("News", false, B)],
                vec![GroupMember {
                    group_name: "News".into(),
                    channel_uid: 9,
                    channel_number: 4,
                    client_id: B,
                }],
            ),
    );
    let clients = connected(&[("pvr.a", a), ("pvr.b", b)]).await;

    let tv = clients.data().get_channels(false).await.into_result().unwrap();
    assert_eq!(tv.len(), 2);
    let radio = clients.data().get_channels(true).await.into_result().unwrap();
    assert_eq!(radio.len(), 1);
    assert!(radio[0].is_radio);

    let groups = clients.data().get_channel_groups(false).await.into_result().unwrap();
    assert_eq!(groups.len(), 2);

    let members = clients
        .data()
        .get_channel_group_members(&groups[0])
        .await
        .into_result()
        .unwrap();
    let uids: Vec<u32> = members.iter().map(|m| m.channel_uid).collect();
    assert_eq!(uids, vec![1, 9]);
}

// ============================================================================
// Single-Target Tests
// ============================================================================

#[tokio::test]
async fn test_add_timer_goes_to_owner_only() {
    let a = Arc::new(MockBackend::new("a"));
    let b = Arc::new(MockBackend::new("b"));
    let clients = connected(&[("pvr.a", a.clone()), ("pvr.b", b.clone())]).await;

    clients.data().add_timer(&timer(5, B, "New")).await.unwrap();

    assert_eq!(b.timers().len(), 1);
    assert_eq!(a.call_count("add_timer"), 0);

    let duplicate = clients.data().add_timer(&timer(5, B, "New")).await;
    assert_eq!(
        duplicate,
        Err(PvrError::Backend {
            client: B,
            operation: "add_timer",
            source: BackendError::AlreadyPresent,
        })
    );
}

#[tokio::test]
async fn test_unknown_and_offline_owner() {
    let a = Arc::new(MockBackend::new("a"));
    let clients = connected(&[("pvr.a", a.clone())]).await;

    let unknown = ClientId::new(42);
    assert_eq!(
        clients.data().add_timer(&timer(1, unknown, "x")).await,
        Err(PvrError::NotFound(unknown))
    );

    a.set_ready(false);
    assert_eq!(
        clients.data().add_timer(&timer(1, A, "x")).await,
        Err(PvrError::ClientUnavailable(A))
    );
    assert_eq!(a.call_count("add_timer"), 0);
}

#[tokio::test]
async fn test_delete_running_timer_needs_force() {
    let mut running = timer(3, A, "Live match");
    running.state = TimerState::Recording;
    let a = Arc::new(MockBackend::new("a").with_timers(vec![running.clone()]));
    let clients = connected(&[("pvr.a", a.clone())]).await;

    let refused = clients.data().delete_timer(&running, false).await;
    assert!(matches!(
        refused,
        Err(PvrError::Backend {
            source: BackendError::RecordingRunning,
            ..
        })
    ));
    assert_eq!(a.timers().len(), 1);

    clients.data().delete_timer(&running, true).await.unwrap();
    assert!(a.timers().is_empty());
}

#[tokio::test]
async fn test_update_and_rename_timer() {
    let a = Arc::new(MockBackend::new("a").with_timers(vec![timer(1, A, "Old")]));
    let clients = connected(&[("pvr.a", a.clone())]).await;

    clients.data().rename_timer(&timer(1, A, "Old"), "Renamed").await.unwrap();
    assert_eq!(a.timers()[0].title, "Renamed");

    let mut moved = timer(1, A, "Renamed");
    moved.channel_uid = 7;
    clients.data().update_timer(&moved).await.unwrap();
    assert_eq!(a.timers()[0].channel_uid, 7);
}

#[tokio::test]
async fn test_recording_operations() {
    let a = Arc::new(MockBackend::new("a").with_recordings(vec![Recording::new("r1", A, "Doc")]));
    let clients = connected(&[("pvr.a", a.clone())]).await;

    let mut renamed = Recording::new("r1", A, "Documentary");
    clients.data().rename_recording(&renamed).await.unwrap();
    assert_eq!(a.recordings()[0].title, "Documentary");

    clients.data().set_recording_play_count(&renamed, 3).await.unwrap();
    clients
        .data()
        .set_recording_last_played_position(&renamed, 120)
        .await
        .unwrap();
    assert_eq!(
        clients.data().get_recording_last_played_position(&renamed).await,
        Ok(120)
    );
    assert_eq!(a.recordings()[0].play_count, 3);

    renamed.recording_id = "missing".into();
    assert!(clients.data().delete_recording(&renamed).await.is_err());
    clients
        .data()
        .delete_recording(&Recording::new("r1", A, "Documentary"))
        .await
        .unwrap();
    assert!(a.recordings().is_empty());
}

#[tokio::test]
async fn test_play_count_requires_capability() {
    let a = Arc::new(
        MockBackend::new("a")
            .with_capabilities(Capabilities {
                recording_play_count: false,
                last_played_position: false,
                ..Capabilities::full()
            })
            .with_recordings(vec![Recording::new("r1", A, "Doc")]),
    );
    let clients = connected(&[("pvr.a", a.clone())]).await;
    let recording = Recording::new("r1", A, "Doc");

    assert_eq!(
        clients.data().set_recording_play_count(&recording, 1).await,
        Err(PvrError::ClientUnavailable(A))
    );
    assert_eq!(
        clients.data().get_recording_last_played_position(&recording).await,
        Err(PvrError::ClientUnavailable(A))
    );
    assert_eq!(a.call_count("set_recording_play_count"), 0);
}

#[tokio::test]
async fn test_single_target_without_capability_is_unavailable() {
    let a = Arc::new(
        MockBackend::new("a")
            .with_capabilities(Capabilities {
                timers: false,
                recordings: false,
                epg: false,
                ..Capabilities::full()
            })
            .with_timers(vec![timer(1, A, "News")])
            .with_recordings(vec![Recording::new("r1", A, "Doc")]),
    );
    let clients = connected(&[("pvr.a", a.clone())]).await;
    let data = clients.data();
    let news = timer(1, A, "News");
    let doc = Recording::new("r1", A, "Doc");
    let start = Utc.with_ymd_and_hms(2024, 3, 1, 18, 0, 0).unwrap();
    let channel = Channel::new(1, A, "One");

    assert_eq!(data.add_timer(&news).await, Err(PvrError::ClientUnavailable(A)));
    assert_eq!(data.update_timer(&news).await, Err(PvrError::ClientUnavailable(A)));
    assert_eq!(data.delete_timer(&news, true).await, Err(PvrError::ClientUnavailable(A)));
    assert_eq!(
        data.rename_timer(&news, "x").await,
        Err(PvrError::ClientUnavailable(A))
    );
    assert_eq!(data.rename_recording(&doc).await, Err(PvrError::ClientUnavailable(A)));
    assert_eq!(data.delete_recording(&doc).await, Err(PvrError::ClientUnavailable(A)));
    assert_eq!(
        data.get_epg_for_channel(&channel, start, start + ChronoDuration::hours(2))
            .await,
        Err(PvrError::ClientUnavailable(A))
    );
    assert!(a.calls().iter().all(|call| *call == "create"));
}

#[tokio::test]
async fn test_epg_for_channel_window() {
    let start = Utc.with_ymd_and_hms(2024, 3, 1, 18, 0, 0).unwrap();
    let entry = |id: u32, offset_hours: i64| EpgEntry {
        broadcast_id: id,
        channel_uid: 1,
        title: format!("Show {id}"),
        plot: String::new(),
        start: start + ChronoDuration::hours(offset_hours),
        end: start + ChronoDuration::hours(offset_hours + 1),
        genre: None,
    };
    let a = Arc::new(MockBackend::new("a").with_epg(vec![entry(1, 0), entry(2, 1), entry(3, 5)]));
    let clients = connected(&[("pvr.a", a)]).await;

    let guide = clients
        .data()
        .get_epg_for_channel(&Channel::new(1, A, "One"), start, start + ChronoDuration::hours(2))
        .await
        .unwrap();
    let ids: Vec<u32> = guide.iter().map(|e| e.broadcast_id).collect();
    assert_eq!(ids, vec![1, 2]);
}

#[tokio::test]
async fn test_live_stream_url() {
    let a = Arc::new(MockBackend::new("a"));
    let clients = connected(&[("pvr.a", a.clone())]).await;

    let external = Channel::new(1, A, "IPTV").with_stream_url("http://iptv.example/1.ts");
    assert_eq!(
        clients.data().live_stream_url(&external).await.unwrap(),
        "http://iptv.example/1.ts"
    );
    assert_eq!(a.call_count("live_stream_url"), 0);

    let plain = Channel::new(2, A, "Plain");
    assert!(matches!(
        clients.data().live_stream_url(&plain).await,
        Err(PvrError::NotSupported { client: A, .. })
    ));
}

// ============================================================================
// Menu Hook Tests
// ============================================================================

#[tokio::test]
async fn test_menu_hooks_default_to_playing_client() {
    let hook = MenuHook {
        hook_id: 4,
        label: "Rescan".into(),
        category: MenuHookCategory::Setting,
    };
    let a = Arc::new(MockBackend::new("a").with_menu_hooks(vec![hook.clone()]));
    let clients = connected(&[("pvr.a", a.clone())]).await;

    assert_eq!(clients.data().menu_hooks(None), Err(PvrError::NoActiveStream));
    assert!(!clients.data().has_menu_hooks(None));
    assert!(clients.data().has_menu_hooks(Some(A)));

    clients.stream().open_live(&Channel::new(1, A, "One")).await.unwrap();
    assert_eq!(clients.data().menu_hooks(None).unwrap(), vec![hook.clone()]);
    clients.data().call_menu_hook(None, &hook).await.unwrap();
    assert_eq!(a.call_count("call_menu_hook"), 1);
}
