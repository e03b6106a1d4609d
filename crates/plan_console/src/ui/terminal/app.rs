use std::collections::VecDeque;

use anyhow::{Context, Result};
use chrono::Utc;
use tokio::sync::mpsc::UnboundedReceiver;
use tracing::{debug, info};

use super::escape::EscapeNormalizer;
use super::line_editor::{EditorEvent, LineEditor, PROMPT};
use super::output_gate::OutputGate;
use super::screen::{Screen, NEWLINE};
use super::select_menu::{MenuOutcome, SelectMenu};
use super::session_context::{InterruptAction, SessionContext};
use super::streaming::controller::{StreamController, StreamOutcome};
use super::style;
use super::tui;
use super::welcome_banner::welcome_banner_lines;
use crate::config::Config;
use crate::provider::{ChatMessage, CommandProvider, Provider, ScriptedProvider};
use crate::session::{derive_label, Session, SessionStore};

/// What the input loop should do after handling a chunk of input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flow {
    Continue,
    Shutdown,
}

/// Entry point for the interactive terminal.
pub async fn run(config: Config) -> Result<()> {
    let mut providers = build_providers(&config);
    let screen = Screen::stdout();
    tui::init().context("failed to enable raw mode")?;
    let mut input = match tui::spawn_input_reader() {
        Ok(input) => input,
        Err(err) => {
            let _ = tui::restore();
            return Err(err).context("failed to start input reader");
        }
    };

    let result = run_session(screen, &mut input, &mut providers, config.label.clone()).await;

    if let Err(err) = tui::restore() {
        tracing::warn!("failed to restore terminal: {err}");
    }
    let saved = match result? {
        Some(session) => {
            let path = SessionStore::new(&config.session_dir).save(&session)?;
            Some((session.label, path))
        }
        None => None,
    };
    // Dropping the receiver stops the reader thread on its next read.
    drop(input);

    if let Some((label, path)) = saved {
        println!("Session \"{label}\" saved to {}", path.display());
    }
    Ok(())
}

async fn run_session(
    screen: Screen,
    input: &mut UnboundedReceiver<Vec<u8>>,
    providers: &mut Vec<Box<dyn Provider>>,
    label: Option<String>,
) -> Result<Option<Session>> {
    let gate = OutputGate::new(screen.clone());
    let Some(provider) = choose_provider(&screen, &gate, input, providers).await else {
        return Ok(None);
    };

    let mut app = TerminalApp::with_gate(screen, gate, provider, label)?;
    app.run(input).await;
    Ok(Some(app.into_session()))
}

fn build_providers(config: &Config) -> Vec<Box<dyn Provider>> {
    let mut providers: Vec<Box<dyn Provider>> = config
        .providers
        .iter()
        .map(|spec| {
            Box::new(CommandProvider::new(&spec.name, &spec.command).with_grace(config.grace))
                as Box<dyn Provider>
        })
        .collect();
    if config.demo {
        providers.push(Box::new(ScriptedProvider::demo()));
    }
    providers
}

async fn choose_provider(
    screen: &Screen,
    gate: &OutputGate,
    input: &mut UnboundedReceiver<Vec<u8>>,
    providers: &mut Vec<Box<dyn Provider>>,
) -> Option<Box<dyn Provider>> {
    if providers.len() <= 1 {
        return providers.pop();
    }
    let names = providers.iter().map(|p| p.name().to_string()).collect();
    match SelectMenu::new("Provider", names).run(screen, gate, input).await {
        MenuOutcome::Selected(index) => Some(providers.swap_remove(index)),
        MenuOutcome::Dismissed | MenuOutcome::Interrupted => None,
    }
}

/// Interactive session: line editor, continuation handling, message queue
/// and the stream controller, all on one task.
pub struct TerminalApp {
    screen: Screen,
    gate: OutputGate,
    editor: LineEditor<OutputGate>,
    normalizer: EscapeNormalizer,
    context: SessionContext,
    controller: StreamController,
    provider: Box<dyn Provider>,
    history: Vec<ChatMessage>,
    queued: VecDeque<String>,
    label: Option<String>,
}

impl TerminalApp {
    pub fn new(screen: Screen, provider: Box<dyn Provider>, label: Option<String>) -> Result<Self> {
        let gate = OutputGate::new(screen.clone());
        Self::with_gate(screen, gate, provider, label)
    }

    fn with_gate(
        screen: Screen,
        gate: OutputGate,
        provider: Box<dyn Provider>,
        label: Option<String>,
    ) -> Result<Self> {
        let normalizer = EscapeNormalizer::new().context("failed to build input normalizer")?;
        Ok(Self {
            editor: LineEditor::new(gate.clone()),
            controller: StreamController::new(screen.clone()),
            screen,
            gate,
            normalizer,
            context: SessionContext::new(),
            provider,
            history: Vec::new(),
            queued: VecDeque::new(),
            label,
        })
    }

    pub fn history(&self) -> &[ChatMessage] {
        &self.history
    }

    /// Read input until the user quits or input closes.
    pub async fn run(&mut self, input: &mut UnboundedReceiver<Vec<u8>>) {
        info!(provider = self.provider.name(), "session started");
        for line in welcome_banner_lines(self.provider.name()) {
            self.screen.write_str(&line);
            self.screen.newline();
        }
        self.editor.redraw();

        while let Some(bytes) = input.recv().await {
            if self.handle_input(&bytes) == Flow::Shutdown {
                break;
            }
            if self.drain_queue(input).await == Flow::Shutdown {
                break;
            }
        }

        self.screen.newline();
        info!(messages = self.history.len(), "session ended");
    }

    pub fn into_session(self) -> Session {
        Session {
            label: derive_label(self.label.as_deref(), &self.history),
            saved_at: Utc::now(),
            provider: self.provider.name().to_string(),
            messages: self.history,
        }
    }

    fn handle_input(&mut self, bytes: &[u8]) -> Flow {
        let normalized = self.normalizer.normalize(bytes);
        for event in self.editor.feed(&normalized) {
            match event {
                EditorEvent::Submit(line) => {
                    match self.context.submit_line(&line) {
                        Some(message) if !message.trim().is_empty() => {
                            self.queued.push_back(message);
                        }
                        _ => self.show_prompt(),
                    }
                }
                EditorEvent::Interrupt => match self.context.on_interrupt() {
                    InterruptAction::AbortContinuation => {
                        self.screen.write_str(&style::dim("^C"));
                        self.screen.newline();
                        self.editor.clear();
                        self.show_prompt();
                    }
                    InterruptAction::CancelStream => {}
                    InterruptAction::Shutdown => return Flow::Shutdown,
                },
                EditorEvent::Eof => return Flow::Shutdown,
            }
        }
        Flow::Continue
    }

    async fn drain_queue(&mut self, input: &mut UnboundedReceiver<Vec<u8>>) -> Flow {
        let mut echo = false;
        while let Some(message) = self.queued.pop_front() {
            if echo {
                // Typed while streaming; the editor's own echo was muted.
                self.screen
                    .replace_line(&format!("{PROMPT}{}", message.replace('\n', NEWLINE)));
                self.screen.newline();
            }
            if self.dispatch(message, input).await == Flow::Shutdown {
                return Flow::Shutdown;
            }
            echo = true;
        }
        Flow::Continue
    }

    /// Run one message through the provider while still reading keystrokes.
    async fn dispatch(&mut self, message: String, input: &mut UnboundedReceiver<Vec<u8>>) -> Flow {
        debug!(chars = message.len(), "dispatching message");
        self.gate.mute();
        let token = self.context.begin_stream();
        let mut input_open = true;
        let mut flow = Flow::Continue;

        let outcome = {
            let run = self
                .controller
                .run(self.provider.as_ref(), &message, &self.history, &token);
            tokio::pin!(run);
            loop {
                tokio::select! {
                    biased;
                    outcome = &mut run => break outcome,
                    bytes = input.recv(), if input_open => match bytes {
                        Some(bytes) => {
                            let typed = type_ahead(
                                &mut self.editor,
                                &self.normalizer,
                                &mut self.context,
                                &mut self.queued,
                                &bytes,
                            );
                            if typed == Flow::Shutdown {
                                flow = Flow::Shutdown;
                            }
                        }
                        // Let the stream finish; the main loop sees the close next.
                        None => input_open = false,
                    },
                }
            }
        };

        self.context.end_stream();
        if let StreamOutcome::Completed { text } = outcome {
            self.history.push(ChatMessage::user(message));
            self.history.push(ChatMessage::assistant(text));
        }
        self.gate.unmute();
        self.show_prompt();
        flow
    }

    fn show_prompt(&mut self) {
        self.editor.set_prompt(self.context.prompt());
        self.editor.redraw();
    }
}

/// Input received while a stream is running. The gate is muted, so edits
/// land in the buffer silently; completed messages wait in the queue.
fn type_ahead(
    editor: &mut LineEditor<OutputGate>,
    normalizer: &EscapeNormalizer,
    context: &mut SessionContext,
    queued: &mut VecDeque<String>,
    bytes: &[u8],
) -> Flow {
    let normalized = normalizer.normalize(bytes);
    for event in editor.feed(&normalized) {
        match event {
            EditorEvent::Submit(line) => {
                if let Some(message) = context.submit_line(&line) {
                    if !message.trim().is_empty() {
                        debug!("message queued while streaming");
                        queued.push_back(message);
                    }
                }
                editor.set_prompt(context.prompt());
            }
            EditorEvent::Interrupt => {
                if context.on_interrupt() == InterruptAction::Shutdown {
                    return Flow::Shutdown;
                }
            }
            EditorEvent::Eof => debug!("ignoring Ctrl-D while streaming"),
        }
    }
    Flow::Continue
}
