use rekon_engine::config::{ExistenceProbeConfig, ResolverConfig};
use rekon_engine::{MapStore, ObjectResolver, Session, SnapshotEngine};
use rekon_common::DomainName;

fn session() -> Session {
    Session::new(ResolverConfig {
        existence_probe: ExistenceProbeConfig {
            timeout_ms: 0,
            interval_ms: 1,
        },
        ..Default::default()
    })
}

async fn resolve(snapshot: &str, maps: &str, window: &str) -> (Option<u64>, Session) {
    let engine = SnapshotEngine::from_yaml_str(snapshot).unwrap();
    let store = MapStore::from_yaml_str(maps).unwrap();
    let resolver = ObjectResolver::new(&engine, &store);
    let mut session = session();
    let found = resolver
        .resolve_window(&mut session, "app", window, false)
        .await
        .unwrap();
    (found.map(|h| h.id), session)
}

#[tokio::test]
async fn specific_domain_report_wins_over_native_one() {
    let snapshot = r##"
windows:
  - { id: 20, domain: WIN, class: "#32770", hwnd: 500, pid: 3, properties: { Caption: Settings } }
  - { id: 10, domain: NET, class: System.Windows.Forms.Form, hwnd: 500, pid: 3, properties: { Text: Settings } }
"##;
    let maps = r##"
app:
  Settings:
    recognition: 'Type=Window;Caption=Settings'
"##;
    let (found, session) = resolve(snapshot, maps, "Settings").await;
    assert_eq!(found, Some(10));
    assert!(session.is_banned(DomainName::Win, "hwnd:500"));
    assert!(!session.is_banned(DomainName::Net, "hwnd:500"));
}

#[tokio::test]
async fn owned_windows_from_another_context_are_ignored() {
    let snapshot = r##"
windows:
  - id: 1
    domain: JAVA
    class: javax.swing.JFrame
    context: agent-a
    properties: { title: Main }
    owned:
      - { id: 3, class: javax.swing.JDialog, context: agent-b, properties: { title: Confirm } }
      - { id: 4, class: javax.swing.JDialog, properties: { title: Save } }
"##;
    let maps = r##"
app:
  Confirm:
    recognition: 'Type=Window;Caption=Confirm'
  Save:
    recognition: 'Type=Window;Caption=Save'
"##;
    let (confirm, _) = resolve(snapshot, maps, "Confirm").await;
    assert_eq!(confirm, None);
    let (save, _) = resolve(snapshot, maps, "Save").await;
    assert_eq!(save, Some(4));
}

#[tokio::test]
async fn failing_domain_does_not_abort_enumeration() {
    let snapshot = r##"
domains: [NET, JAVA]
failing_domains: [NET]
windows:
  - { id: 1, domain: JAVA, class: javax.swing.JFrame, properties: { title: Main } }
"##;
    let maps = r##"
app:
  Main:
    recognition: 'Type=Window;Caption=Main'
"##;
    let (found, _) = resolve(snapshot, maps, "Main").await;
    assert_eq!(found, Some(1));
}

#[tokio::test]
async fn hidden_surfaces_are_activated_once_and_searched_again() {
    let snapshot = r##"
capabilities: { surface_activation: true }
domains: [JAVA]
hidden_domains: [WIN]
windows:
  - { id: 1, domain: JAVA, class: javax.swing.JFrame, properties: { title: Main } }
  - { id: 2, domain: WIN, class: "#32770", properties: { Caption: Tool } }
"##;
    let maps = r##"
app:
  Tool:
    recognition: 'Type=Window;Caption=Tool'
  JavaOnly:
    recognition: 'Domain=JAVA;Type=Window;Caption=Tool'
"##;
    let (found, _) = resolve(snapshot, maps, "Tool").await;
    assert_eq!(found, Some(2));

    // An explicit non-hiding domain never triggers activation.
    let (found, _) = resolve(snapshot, maps, "JavaOnly").await;
    assert_eq!(found, None);
}

#[tokio::test]
async fn domain_and_process_restrict_top_level_candidates() {
    let snapshot = r##"
windows:
  - { id: 1, domain: JAVA, class: javax.swing.JFrame, process: java.exe, properties: { title: Main } }
  - { id: 2, domain: NET, class: System.Windows.Forms.Form, process: tool.exe, properties: { Text: Main } }
"##;
    let maps = r##"
app:
  NetMain:
    recognition: 'Domain=NET;Type=Window;Caption=Main'
  PrefixedMain:
    recognition: 'Type=DotNetWindow;Caption=Main'
  ToolMain:
    recognition: 'Process=TOOL.EXE;Type=Window;Caption=Main'
  AnyMain:
    recognition: 'Type=Window;Caption=Main'
"##;
    for (window, expected) in [
        ("NetMain", Some(2)),
        ("PrefixedMain", Some(2)),
        ("ToolMain", Some(2)),
        ("AnyMain", Some(1)),
    ] {
        let (found, _) = resolve(snapshot, maps, window).await;
        assert_eq!(found, expected, "{}", window);
    }
}
