use std::fs;
use std::sync::Arc;

use bank_notification_bridge::config::DEFAULT_LISTENER_COMPONENT;
use bank_notification_bridge::notification::event::fields;
use bank_notification_bridge::{
    BridgeConfig, BridgeError, EventOrigin, FileHost, HostSignal, MemorySink,
    NotificationListenerPlugin, RawEvent,
};
use chrono::Utc;
use tempfile::{tempdir, TempDir};
use tokio::sync::mpsc;

fn setup() -> (NotificationListenerPlugin, Arc<FileHost>, Arc<MemorySink>, TempDir) {
    let temp = tempdir().unwrap();
    let config = BridgeConfig {
        data_dir: Some(temp.path().join("data")),
        settle_delay_ms: 0,
        ..Default::default()
    };
    let host = Arc::new(FileHost::new(temp.path().join("host")));
    host.set_enabled_listeners(&format!("com.other/.Listener:{}", DEFAULT_LISTENER_COMPONENT))
        .unwrap();
    let sink = Arc::new(MemorySink::new());
    let plugin = NotificationListenerPlugin::new(config, host.clone(), sink.clone());
    (plugin, host, sink, temp)
}

fn bank_event(source: &str, key: &str, text: &str) -> RawEvent {
    RawEvent::new(source, key, Utc::now().timestamp_millis())
        .with_field(fields::TITLE, "Movimento")
        .with_field(fields::TEXT, text)
}

#[tokio::test]
async fn test_live_and_queue_delivery() {
    let (plugin, _host, sink, _temp) = setup();
    assert!(plugin.is_enabled().await);
    assert!(plugin.start_listening().unwrap());

    // 1. 启动桥接和监听服务
    let bridge = plugin.load();
    let (tx, rx) = mpsc::channel(16);
    let listener = plugin.create_listener().spawn(rx);

    // 2. 投递银行通知和非银行通知
    tx.send(HostSignal::Connected).await.unwrap();
    tx.send(HostSignal::Posted(
        RawEvent::new("it.poste.postepay", "k1", 1_700_000_000_000)
            .with_field(fields::BIG_TEXT, "")
            .with_field(fields::TEXT, "Pagamento di 42,00€"),
    ))
    .await
    .unwrap();
    tx.send(HostSignal::Posted(bank_event("com.whatsapp", "k2", "ciao")))
        .await
        .unwrap();
    tx.send(HostSignal::Posted(bank_event("com.unknownbank.app", "k3", "Addebito 10€")))
        .await
        .unwrap();
    tx.send(HostSignal::Destroyed).await.unwrap();
    listener.await.unwrap();
    assert!(!plugin.registry().is_available());

    // 3. 队列里有同样的两条
    let pending = plugin.get_pending_notifications().unwrap();
    assert_eq!(pending.len(), 2);
    assert!(pending.iter().all(|e| e.origin == EventOrigin::Queued));
    assert_eq!(pending[0].label, "postepay");
    assert_eq!(pending[0].text, "Pagamento di 42,00€");
    assert_eq!(pending[1].label, "app");
    assert!(plugin.get_pending_notifications().unwrap().is_empty());

    // 4. 释放发送端后桥接结束
    drop(plugin);
    assert_eq!(bridge.await.unwrap(), 2);
    let live = sink.events();
    assert_eq!(live.len(), 2);
    assert!(live.iter().all(|e| e.origin == EventOrigin::Live));
}

#[test]
fn test_missed_then_reprocess() {
    let (plugin, host, sink, _temp) = setup();
    let old = RawEvent::new("com.revolut.revolut", "k-old", 1).with_field(fields::TEXT, "Hai speso 3€");
    host.set_active(&[
        bank_event("it.poste.postepay", "k1", "Pagamento di 42,00€"),
        bank_event("com.whatsapp", "k2", "ciao"),
        old,
    ])
    .unwrap();
    let _listener = plugin.create_listener();

    let missed = plugin.check_missed_notifications();
    assert_eq!(missed.len(), 1);
    assert_eq!(missed[0].key.as_deref(), Some("k1"));
    assert!(plugin.check_missed_notifications().is_empty());

    let summary = plugin.reprocess_active_notifications().unwrap();
    assert_eq!(summary.reprocessed, 2);
    assert_eq!(summary.total, 3);
    assert_eq!(sink.len(), 2);
    assert!(sink.events().iter().all(|e| e.origin == EventOrigin::Reprocessed));
}

#[test]
fn test_malformed_queue_record() {
    let (plugin, _host, _sink, temp) = setup();
    let queue_path = temp.path().join("data").join("pending_notifications.json");
    fs::create_dir_all(queue_path.parent().unwrap()).unwrap();
    fs::write(
        &queue_path,
        r#"[
            {"packageName": "com.revolut.revolut", "appName": "revolut", "title": "Revolut", "text": "Hai speso 3€", "timestamp": 1700000000000},
            "{not json",
            {"sourceId": "it.poste.postepay", "label": "postepay", "text": "Pagamento", "timestampMillis": 5}
        ]"#,
    )
    .unwrap();

    let pending = plugin.get_pending_notifications().unwrap();
    assert_eq!(pending.len(), 2);
    assert_eq!(pending[0].source_id, "com.revolut.revolut");
    assert_eq!(pending[0].timestamp_millis, 1_700_000_000_000);
    assert_eq!(pending[1].label, "postepay");

    assert_eq!(fs::read_to_string(&queue_path).unwrap(), "[]");
    assert!(plugin.get_pending_notifications().unwrap().is_empty());
}

#[test]
fn test_permission_denied_paths() {
    let (plugin, host, _sink, _temp) = setup();
    host.set_enabled_listeners("com.other/.Listener").unwrap();
    host.set_active(&[bank_event("it.poste.postepay", "k1", "Pagamento")]).unwrap();
    let _listener = plugin.create_listener();

    assert!(matches!(plugin.start_listening(), Err(BridgeError::PermissionDenied)));
    assert!(plugin.check_missed_notifications().is_empty());
    assert!(matches!(
        plugin.reprocess_active_notifications(),
        Err(BridgeError::PermissionDenied)
    ));
    assert!(matches!(
        plugin.get_all_active_notifications(),
        Err(BridgeError::PermissionDenied)
    ));
    assert!(!plugin.request_permission());
}

#[test]
fn test_active_dump_lists_every_source() {
    let (plugin, host, _sink, _temp) = setup();
    host.set_active(&[
        bank_event("it.poste.postepay", "k1", "Pagamento"),
        bank_event("com.whatsapp", "k2", "ciao"),
    ])
    .unwrap();

    assert!(matches!(
        plugin.get_all_active_notifications(),
        Err(BridgeError::ServiceUnavailable)
    ));

    let _listener = plugin.create_listener();
    let active = plugin.get_all_active_notifications().unwrap();
    assert_eq!(active.len(), 2);
    assert_eq!(active[1].source_id, "com.whatsapp");
    assert_eq!(active[1].text, "ciao");
}
