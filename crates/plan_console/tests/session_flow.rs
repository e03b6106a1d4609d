use std::time::Duration;

use serde_json::json;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use plan_console::provider::{ChatMessage, Provider, ScriptStep, ScriptedProvider};
use plan_console::session::SessionStore;
use plan_console::ui::terminal::app::TerminalApp;
use plan_console::ui::terminal::screen::Screen;
use plan_console::ui::terminal::streaming::controller::{StreamController, StreamOutcome};

fn input(chunks: &[&[u8]]) -> mpsc::UnboundedReceiver<Vec<u8>> {
    let (tx, rx) = mpsc::unbounded_channel();
    for chunk in chunks {
        tx.send(chunk.to_vec()).unwrap();
    }
    rx
}

#[tokio::test]
async fn full_session_round_trip() {
    let provider = ScriptedProvider::new(vec![
        vec![
            ScriptStep::text("Looking "),
            ScriptStep::text("around.\n"),
            ScriptStep::tool("list_files", json!({"path": "."})),
            ScriptStep::tool("read_file", json!({"path": "README.md"})),
            ScriptStep::text("# Plan\n- [ ] write **tests**\n"),
        ],
        vec![ScriptStep::text("Second answer\n")],
    ]);
    let (screen, capture) = Screen::capture(Some(100));
    let mut app = TerminalApp::new(screen, Box::new(provider), None).unwrap();

    let mut rx = input(&[b"plan the\\\r", b"release\r", b"and then?\r"]);
    app.run(&mut rx).await;

    assert_eq!(
        app.history(),
        &[
            ChatMessage::user("plan the\nrelease"),
            ChatMessage::assistant("Looking around.\n# Plan\n- [ ] write **tests**\n"),
            ChatMessage::user("and then?"),
            ChatMessage::assistant("Second answer\n"),
        ]
    );

    let lines = capture.visible_lines();
    let find = |needle: &str| {
        lines
            .iter()
            .position(|line| line == needle)
            .unwrap_or_else(|| panic!("{needle:?} not found in {lines:#?}"))
    };
    let intro = find("◆ Looking around.");
    let first_tool = find("  ▸ list_files path=. ✓");
    let second_tool = find("  ▸ read_file path=README.md ✓");
    assert_eq!(lines[intro + 1], "");
    assert_eq!(first_tool, intro + 2);
    assert_eq!(second_tool, first_tool + 1);
    assert_eq!(lines[second_tool + 1], "◆ Plan");
    assert_eq!(lines[second_tool + 2], "☐ write tests");
    find("◆ Second answer");

    let dir = tempfile::tempdir().unwrap();
    let store = SessionStore::new(dir.path());
    let session = app.into_session();
    assert_eq!(session.label, "plan the release");
    store.save(&session).unwrap();
    assert_eq!(store.load().unwrap().unwrap().messages.len(), 4);
}

#[tokio::test]
async fn listeners_never_accumulate_across_outcomes() {
    let provider = ScriptedProvider::new(Vec::new());
    let (screen, _capture) = Screen::capture(Some(80));
    let mut controller = StreamController::new(screen);

    for round in 0..5 {
        provider.push_turn(vec![ScriptStep::text(format!("ok {round}\n"))]);
        provider.push_turn(vec![ScriptStep::Fail("down".into())]);
        provider.push_turn(vec![ScriptStep::Pause(Duration::from_secs(30))]);

        let done = controller
            .run(&provider, "a", &[], &CancellationToken::new())
            .await;
        assert!(matches!(done, StreamOutcome::Completed { .. }));
        assert_eq!(provider.events().listener_count(), 0);

        let failed = controller
            .run(&provider, "b", &[], &CancellationToken::new())
            .await;
        assert!(matches!(failed, StreamOutcome::Failed { .. }));
        assert_eq!(provider.events().listener_count(), 0);

        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            trigger.cancel();
        });
        let cancelled = controller.run(&provider, "c", &[], &cancel).await;
        assert_eq!(cancelled, StreamOutcome::Cancelled);
        assert_eq!(provider.events().listener_count(), 0);
    }
}

#[cfg(unix)]
#[tokio::test]
async fn subprocess_provider_streams_through_controller() {
    use plan_console::provider::CommandProvider;

    let script = r#"read -r _req
printf '%s\n' '{"type":"text","text":"Checking.\n"}'
printf '%s\n' '{"type":"tool_call","name":"grep","args":{"pattern":"TODO"}}'
printf '%s\n' '{"type":"text","text":"Found **none**.\n"}'
printf '%s\n' '{"type":"done"}'"#;
    let provider = CommandProvider::new("sh", script);
    let (screen, capture) = Screen::capture(Some(80));
    let mut controller = StreamController::new(screen);

    let outcome = controller
        .run(&provider, "scan", &[], &CancellationToken::new())
        .await;
    assert_eq!(
        outcome,
        StreamOutcome::Completed {
            text: "Checking.\nFound **none**.\n".to_string()
        }
    );
    let lines: Vec<String> = capture
        .visible_lines()
        .into_iter()
        .filter(|line| !line.is_empty())
        .collect();
    assert_eq!(
        lines,
        vec!["◆ Checking.", "  ▸ grep pattern=TODO ✓", "◆ Found none."]
    );
}
