use rekon_engine::config::{ExistenceProbeConfig, ResolverConfig, WaitConfig};
use rekon_engine::{MapStore, ObjectResolver, ResolveError, Session, SnapshotEngine};
use std::time::Duration;

const SNAPSHOT: &str = r#"
windows:
  - id: 1
    domain: JAVA
    class: javax.swing.JFrame
    properties: { title: Report }
    children:
      - { id: 2, class: javax.swing.JLabel, properties: { name: status, text: Working } }
"#;

const MAPS: &str = r#"
app:
  Report:
    recognition: 'Type=Window;Caption=Report'
    children:
      Status: 'Type=Label;Name=status'
"#;

fn session(poll_interval_ms: u64) -> Session {
    Session::new(ResolverConfig {
        existence_probe: ExistenceProbeConfig {
            timeout_ms: 0,
            interval_ms: 1,
        },
        wait: WaitConfig {
            poll_interval_ms,
            ignore_cache_every: 1,
        },
        ..Default::default()
    })
}

fn fixture() -> (SnapshotEngine, MapStore) {
    (
        SnapshotEngine::from_yaml_str(SNAPSHOT).unwrap(),
        MapStore::from_yaml_str(MAPS).unwrap(),
    )
}

#[tokio::test]
async fn waits_for_a_window_to_appear() {
    let (engine, store) = fixture();
    engine.close(1);
    let resolver = ObjectResolver::new(&engine, &store);
    let mut session = session(10);

    let wait = resolver.wait_for_object(
        &mut session,
        "app",
        "Report",
        None,
        Duration::from_secs(2),
    );
    let open = async {
        tokio::time::sleep(Duration::from_millis(40)).await;
        engine.reopen(1);
    };
    let (found, ()) = tokio::join!(wait, open);
    assert_eq!(found.unwrap().map(|h| h.id), Some(1));
}

#[tokio::test]
async fn wait_gives_up_at_the_deadline() {
    let (engine, store) = fixture();
    engine.close(1);
    let resolver = ObjectResolver::new(&engine, &store);
    let mut session = session(10);

    let found = resolver
        .wait_for_object(
            &mut session,
            "app",
            "Report",
            Some("Status"),
            Duration::from_millis(50),
        )
        .await
        .unwrap();
    assert!(found.is_none());
}

#[tokio::test]
async fn waits_for_a_property_value() {
    let (engine, store) = fixture();
    let resolver = ObjectResolver::new(&engine, &store);
    let mut session = session(10);

    let wait = resolver.wait_for_property(
        &mut session,
        "app",
        "Report",
        Some("Status"),
        "text",
        "Done",
        Duration::from_secs(2),
    );
    let finish = async {
        tokio::time::sleep(Duration::from_millis(40)).await;
        engine.set_property(2, "text", "Done");
    };
    let (matched, ()) = tokio::join!(wait, finish);
    assert!(matched.unwrap());
}

#[tokio::test]
async fn property_wait_uses_probed_attributes() {
    let (engine, store) = fixture();
    let resolver = ObjectResolver::new(&engine, &store);
    let mut session = session(10);

    // No raw "Caption" property exists; the caption probe reads "title".
    let matched = resolver
        .wait_for_property(
            &mut session,
            "app",
            "Report",
            None,
            "caption",
            "Report",
            Duration::from_millis(50),
        )
        .await
        .unwrap();
    assert!(matched);

    let matched = resolver
        .wait_for_property(
            &mut session,
            "app",
            "Report",
            Some("Status"),
            "text",
            "Done",
            Duration::from_millis(50),
        )
        .await
        .unwrap();
    assert!(!matched);
}

#[tokio::test]
async fn zero_poll_interval_is_a_configuration_fault() {
    let (engine, store) = fixture();
    let resolver = ObjectResolver::new(&engine, &store);
    let mut session = session(0);

    let result = resolver
        .wait_for_object(&mut session, "app", "Report", None, Duration::from_millis(50))
        .await;
    assert!(matches!(result, Err(ResolveError::Config(_))));
}
