//! Debounced translation pipeline.
//!
//! The controller owns the session and is the only thing that mutates it. It
//! runs a single event loop over three sources: commands from the UI, finished
//! provider requests, and the debounce deadline. Every change ends with a new
//! snapshot on the `watch` channel.

use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio::time::{sleep_until, Instant};

use crate::clipboard::{ClipboardWriter, SystemClipboard};
use crate::config::Config;
use crate::languages;
use crate::speech::{Speaker, SystemSpeaker};
use crate::translator::{MyMemory, Provider, TranslateError, TranslationRequest};

pub const LOADING_PLACEHOLDER: &str = "Translating...";
pub const FAILURE_MESSAGE: &str = "Translation failed. Please try again.";

#[derive(Debug)]
pub enum Command {
    SetInput(String),
    SetSourceLang(String),
    SetTargetLang(String),
    Copy,
    ReadAloud,
    DismissNotice,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Debouncing,
    InFlight,
    Success,
    Failed,
}

/// Something the user has to acknowledge before the window accepts input again.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Notice {
    Copied,
}

impl Notice {
    pub fn message(self) -> &'static str {
        match self {
            Self::Copied => "Copied to clipboard!",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Session {
    pub input_text: String,
    pub output_text: String,
    pub is_loading: bool,
    pub input_lang: String,
    pub output_lang: String,
    pub phase: Phase,
    pub notice: Option<Notice>,
}

impl Session {
    pub fn new(input_lang: &str, output_lang: &str) -> Self {
        Self {
            input_text: String::new(),
            output_text: String::new(),
            is_loading: false,
            input_lang: input_lang.to_string(),
            output_lang: output_lang.to_string(),
            phase: Phase::Idle,
            notice: None,
        }
    }

    /// What the output area shows.
    pub fn display_output(&self) -> &str {
        if self.is_loading {
            LOADING_PLACEHOLDER
        } else {
            &self.output_text
        }
    }
}

struct Completion {
    seq: u64,
    result: Result<String, TranslateError>,
}

pub struct Controller<P, C, S> {
    provider: Arc<P>,
    clipboard: C,
    speaker: S,
    debounce: Duration,
    session: Session,
    deadline: Option<Instant>,
    last_seq: u64,
    // sequence number whose response may still be applied
    awaiting: Option<u64>,
    settled: Phase,
    completions_tx: mpsc::UnboundedSender<Completion>,
    completions_rx: mpsc::UnboundedReceiver<Completion>,
}

impl<P, C, S> Controller<P, C, S>
where
    P: Provider,
    C: ClipboardWriter,
    S: Speaker,
{
    pub fn new(provider: Arc<P>, clipboard: C, speaker: S, debounce: Duration, session: Session) -> Self {
        let (completions_tx, completions_rx) = mpsc::unbounded_channel();
        Self {
            provider,
            clipboard,
            speaker,
            debounce,
            session,
            deadline: None,
            last_seq: 0,
            awaiting: None,
            settled: Phase::Idle,
            completions_tx,
            completions_rx,
        }
    }

    /// Runs until the command sender is dropped. `notify` is called after
    /// every published snapshot.
    pub async fn run<N>(
        mut self,
        mut commands: mpsc::UnboundedReceiver<Command>,
        view: watch::Sender<Session>,
        notify: N,
    ) where
        N: Fn(),
    {
        view.send_replace(self.session.clone());
        notify();

        loop {
            let deadline = self.deadline;
            tokio::select! {
                cmd = commands.recv() => match cmd {
                    Some(cmd) => self.handle(cmd),
                    None => break,
                },
                Some(done) = self.completions_rx.recv() => self.complete(done),
                _ = sleep_until(deadline.unwrap_or_else(Instant::now)), if deadline.is_some() => {
                    self.dispatch();
                }
            }

            self.session.phase = self.phase();
            view.send_replace(self.session.clone());
            notify();
        }

        if self.deadline.take().is_some() {
            tracing::debug!("Dropped pending translation on shutdown");
        }
        tracing::info!("Controller stopped");
    }

    fn phase(&self) -> Phase {
        if self.deadline.is_some() {
            Phase::Debouncing
        } else if self.awaiting.is_some() {
            Phase::InFlight
        } else {
            self.settled
        }
    }

    fn handle(&mut self, cmd: Command) {
        match cmd {
            Command::SetInput(text) => {
                if text != self.session.input_text {
                    self.session.input_text = text;
                    self.on_change();
                }
            }
            Command::SetSourceLang(code) => self.set_language(code, false),
            Command::SetTargetLang(code) => self.set_language(code, true),
            Command::Copy => self.copy_output(),
            Command::ReadAloud => self.read_aloud(),
            Command::DismissNotice => self.session.notice = None,
        }
    }

    fn set_language(&mut self, code: String, target: bool) {
        if !languages::is_supported(&code) {
            tracing::warn!("Ignoring unsupported language {:?}", code);
            return;
        }
        let slot = if target {
            &mut self.session.output_lang
        } else {
            &mut self.session.input_lang
        };
        if *slot == code {
            return;
        }
        tracing::info!(
            "{} language changed to: {}",
            if target { "Target" } else { "Source" },
            languages::display_name(&code)
        );
        *slot = code;
        self.on_change();
    }

    fn on_change(&mut self) {
        if self.session.input_text.is_empty() {
            self.deadline = None;
            self.awaiting = None;
            self.session.output_text.clear();
            self.session.is_loading = false;
            self.settled = Phase::Idle;
        } else {
            self.deadline = Some(Instant::now() + self.debounce);
        }
    }

    fn dispatch(&mut self) {
        self.deadline = None;
        self.last_seq += 1;
        let seq = self.last_seq;
        self.awaiting = Some(seq);
        self.session.is_loading = true;

        let request = TranslationRequest {
            text: self.session.input_text.clone(),
            source: self.session.input_lang.clone(),
            target: self.session.output_lang.clone(),
        };
        let preview: String = request.text.chars().take(50).collect();
        tracing::info!(seq, "Translating {}|{}: \"{}\"", request.source, request.target, preview);

        let provider = Arc::clone(&self.provider);
        let tx = self.completions_tx.clone();
        tokio::spawn(async move {
            let result = provider.translate(&request).await;
            let _ = tx.send(Completion { seq, result });
        });
    }

    fn complete(&mut self, done: Completion) {
        if let Err(e) = &done.result {
            tracing::error!(seq = done.seq, "Translation failed: {}", e);
        }

        if self.awaiting != Some(done.seq) {
            tracing::debug!(seq = done.seq, "Discarding stale response");
            return;
        }
        self.awaiting = None;
        self.session.is_loading = false;

        match done.result {
            Ok(text) => {
                let preview: String = text.chars().take(40).collect();
                tracing::info!(seq = done.seq, "Translation complete: \"{}\"", preview);
                self.session.output_text = text;
                self.settled = Phase::Success;
            }
            Err(_) => {
                self.session.output_text = FAILURE_MESSAGE.to_string();
                self.settled = Phase::Failed;
            }
        }
    }

    fn copy_output(&mut self) {
        match self.clipboard.write_text(&self.session.output_text) {
            Ok(()) => self.session.notice = Some(Notice::Copied),
            Err(e) => tracing::error!("Could not copy text: {:#}", e),
        }
    }

    fn read_aloud(&mut self) {
        if self.session.output_text.is_empty() {
            tracing::debug!("Nothing to read aloud");
            return;
        }
        if let Err(e) = self
            .speaker
            .speak(&self.session.output_text, &self.session.output_lang)
        {
            tracing::warn!("Read aloud failed: {:#}", e);
        }
    }
}

/// Starts the controller on its own thread with a current-thread runtime.
/// The thread exits once every `Command` sender is gone.
pub fn spawn_controller_thread<N>(
    config: Config,
    commands: mpsc::UnboundedReceiver<Command>,
    view: watch::Sender<Session>,
    notify: N,
) -> std::io::Result<JoinHandle<()>>
where
    N: Fn() + Send + 'static,
{
    std::thread::Builder::new()
        .name("controller".into())
        .spawn(move || {
            let rt = match tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
            {
                Ok(rt) => rt,
                Err(e) => {
                    tracing::error!("Failed to build tokio runtime: {}", e);
                    return;
                }
            };

            rt.block_on(async move {
                let provider = match MyMemory::new(&config) {
                    Ok(p) => p,
                    Err(e) => {
                        tracing::error!("{:#}", e);
                        return;
                    }
                };
                let session = Session::new(&config.source_lang, &config.target_lang);
                let controller = Controller::new(
                    Arc::new(provider),
                    SystemClipboard::default(),
                    SystemSpeaker::detect(),
                    config.debounce(),
                    session,
                );
                controller.run(commands, view, notify).await;
            });
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    #[derive(Clone, Copy)]
    enum Reply {
        Text(&'static str),
        Fail(u16, &'static str),
        Echo,
    }

    #[derive(Clone, Default)]
    struct FakeProvider {
        calls: Arc<Mutex<Vec<TranslationRequest>>>,
        script: Arc<Mutex<VecDeque<(u64, Reply)>>>,
    }

    impl FakeProvider {
        fn then(self, delay_ms: u64, reply: Reply) -> Self {
            self.script.lock().unwrap().push_back((delay_ms, reply));
            self
        }

        fn calls(&self) -> Vec<TranslationRequest> {
            self.calls.lock().unwrap().clone()
        }
    }

    impl Provider for FakeProvider {
        async fn translate(&self, request: &TranslationRequest) -> Result<String, TranslateError> {
            self.calls.lock().unwrap().push(request.clone());
            let next = self.script.lock().unwrap().pop_front();
            let (delay_ms, reply) = next.unwrap_or((0, Reply::Echo));
            tokio::time::sleep(Duration::from_millis(delay_ms)).await;
            match reply {
                Reply::Text(t) => Ok(t.to_string()),
                Reply::Fail(status, details) => Err(TranslateError::Provider {
                    status,
                    details: details.to_string(),
                }),
                Reply::Echo => Ok(format!(
                    "{}>{}:{}",
                    request.source, request.target, request.text
                )),
            }
        }
    }

    #[derive(Clone, Default)]
    struct FakeClipboard {
        written: Arc<Mutex<Vec<String>>>,
        fail: bool,
    }

    impl ClipboardWriter for FakeClipboard {
        fn write_text(&mut self, text: &str) -> anyhow::Result<()> {
            if self.fail {
                anyhow::bail!("clipboard denied");
            }
            self.written.lock().unwrap().push(text.to_string());
            Ok(())
        }
    }

    #[derive(Clone, Default)]
    struct FakeSpeaker {
        spoken: Arc<Mutex<Vec<(String, String)>>>,
    }

    impl Speaker for FakeSpeaker {
        fn speak(&mut self, text: &str, lang: &str) -> anyhow::Result<()> {
            self.spoken
                .lock()
                .unwrap()
                .push((text.to_string(), lang.to_string()));
            Ok(())
        }
    }

    struct Harness {
        tx: mpsc::UnboundedSender<Command>,
        view: watch::Receiver<Session>,
        provider: FakeProvider,
        clipboard: FakeClipboard,
        speaker: FakeSpeaker,
        task: tokio::task::JoinHandle<()>,
    }

    impl Harness {
        fn start(provider: FakeProvider) -> Self {
            Self::with_clipboard(provider, FakeClipboard::default())
        }

        fn with_clipboard(provider: FakeProvider, clipboard: FakeClipboard) -> Self {
            let speaker = FakeSpeaker::default();
            let (tx, rx) = mpsc::unbounded_channel();
            let (view_tx, view) = watch::channel(Session::new("en", "hi"));
            let controller = Controller::new(
                Arc::new(provider.clone()),
                clipboard.clone(),
                speaker.clone(),
                Duration::from_millis(500),
                Session::new("en", "hi"),
            );
            let task = tokio::spawn(controller.run(rx, view_tx, || {}));
            Self {
                tx,
                view,
                provider,
                clipboard,
                speaker,
                task,
            }
        }

        fn send(&self, cmd: Command) {
            self.tx.send(cmd).unwrap();
        }

        fn input(&self, text: &str) {
            self.send(Command::SetInput(text.to_string()));
        }

        fn session(&self) -> Session {
            self.view.borrow().clone()
        }
    }

    async fn wait_ms(ms: u64) {
        tokio::time::sleep(Duration::from_millis(ms)).await;
    }

    fn req(text: &str, source: &str, target: &str) -> TranslationRequest {
        TranslationRequest {
            text: text.into(),
            source: source.into(),
            target: target.into(),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn translates_after_quiet_period() {
        let h = Harness::start(FakeProvider::default().then(0, Reply::Text("नमस्ते")));

        h.input("hello");
        wait_ms(100).await;
        assert_eq!(h.session().phase, Phase::Debouncing);
        assert!(h.provider.calls().is_empty());

        wait_ms(500).await;
        assert_eq!(h.provider.calls(), vec![req("hello", "en", "hi")]);
        let s = h.session();
        assert_eq!(s.output_text, "नमस्ते");
        assert_eq!(s.display_output(), "नमस्ते");
        assert!(!s.is_loading);
        assert_eq!(s.phase, Phase::Success);
    }

    #[tokio::test(start_paused = true)]
    async fn provider_error_shows_failure_message() {
        let h = Harness::start(FakeProvider::default().then(0, Reply::Fail(403, "quota exceeded")));

        h.input("hello");
        wait_ms(600).await;
        let s = h.session();
        assert_eq!(s.output_text, FAILURE_MESSAGE);
        assert!(!s.is_loading);
        assert_eq!(s.phase, Phase::Failed);
    }

    #[tokio::test(start_paused = true)]
    async fn empty_input_never_requests() {
        let h = Harness::start(FakeProvider::default());

        h.input("a");
        h.input("");
        wait_ms(1000).await;
        assert!(h.provider.calls().is_empty());
        assert_eq!(h.session().output_text, "");
        assert_eq!(h.session().phase, Phase::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn rapid_edits_issue_only_the_last_request() {
        let h = Harness::start(FakeProvider::default());

        h.input("h");
        wait_ms(200).await;
        h.input("he");
        wait_ms(200).await;
        h.input("hel");
        wait_ms(600).await;

        assert_eq!(h.provider.calls(), vec![req("hel", "en", "hi")]);
        assert_eq!(h.session().output_text, "en>hi:hel");
    }

    #[tokio::test(start_paused = true)]
    async fn loading_placeholder_while_in_flight() {
        let h = Harness::start(FakeProvider::default().then(300, Reply::Text("ok")));

        h.input("hello");
        wait_ms(600).await;
        let s = h.session();
        assert!(s.is_loading);
        assert_eq!(s.phase, Phase::InFlight);
        assert_eq!(s.display_output(), LOADING_PLACEHOLDER);

        wait_ms(300).await;
        assert_eq!(h.session().display_output(), "ok");
    }

    #[tokio::test(start_paused = true)]
    async fn clearing_input_discards_late_response() {
        let h = Harness::start(FakeProvider::default().then(300, Reply::Text("late")));

        h.input("hello");
        wait_ms(600).await;
        assert!(h.session().is_loading);

        h.input("");
        wait_ms(1).await;
        let s = h.session();
        assert_eq!(s.output_text, "");
        assert!(!s.is_loading);

        wait_ms(500).await;
        let s = h.session();
        assert_eq!(s.output_text, "");
        assert_eq!(s.phase, Phase::Idle);
        assert_eq!(h.provider.calls().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn slow_earlier_response_cannot_overwrite_newer_one() {
        let h = Harness::start(
            FakeProvider::default()
                .then(1000, Reply::Text("first"))
                .then(0, Reply::Text("second")),
        );

        h.input("a");
        wait_ms(600).await;
        h.input("ab");
        wait_ms(600).await;
        assert_eq!(h.session().output_text, "second");

        wait_ms(500).await;
        let s = h.session();
        assert_eq!(s.output_text, "second");
        assert!(!s.is_loading);
        assert_eq!(
            h.provider.calls(),
            vec![req("a", "en", "hi"), req("ab", "en", "hi")]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn language_change_retranslates() {
        let h = Harness::start(FakeProvider::default());

        h.input("hello");
        wait_ms(600).await;
        h.send(Command::SetTargetLang("fr".into()));
        wait_ms(600).await;
        assert_eq!(h.session().output_text, "en>fr:hello");

        // same value and unknown codes are not changes
        h.send(Command::SetTargetLang("fr".into()));
        h.send(Command::SetSourceLang("xx".into()));
        wait_ms(600).await;

        let calls = h.provider.calls();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[1], req("hello", "en", "fr"));
        assert_eq!(h.session().input_lang, "en");
    }

    #[tokio::test(start_paused = true)]
    async fn language_change_without_input_is_silent() {
        let h = Harness::start(FakeProvider::default());

        h.send(Command::SetSourceLang("de".into()));
        wait_ms(1000).await;
        assert!(h.provider.calls().is_empty());
        assert_eq!(h.session().input_lang, "de");
    }

    #[tokio::test(start_paused = true)]
    async fn resubmitting_same_tuple_is_idempotent() {
        let h = Harness::start(FakeProvider::default());

        h.input("hello");
        wait_ms(600).await;
        let first = h.session().output_text;

        h.input("hell");
        h.input("hello");
        wait_ms(600).await;

        let calls = h.provider.calls();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0], calls[1]);
        assert_eq!(h.session().output_text, first);
    }

    #[tokio::test(start_paused = true)]
    async fn copy_writes_output_and_asks_for_acknowledgement() {
        let h = Harness::start(FakeProvider::default().then(0, Reply::Text("bonjour")));

        h.input("hello");
        wait_ms(600).await;
        h.send(Command::Copy);
        wait_ms(1).await;
        assert_eq!(*h.clipboard.written.lock().unwrap(), vec!["bonjour".to_string()]);
        assert_eq!(h.session().notice, Some(Notice::Copied));

        h.send(Command::DismissNotice);
        wait_ms(1).await;
        assert_eq!(h.session().notice, None);
    }

    #[tokio::test(start_paused = true)]
    async fn copy_failure_is_silent() {
        let clipboard = FakeClipboard {
            fail: true,
            ..FakeClipboard::default()
        };
        let h = Harness::with_clipboard(FakeProvider::default(), clipboard);

        h.input("hello");
        wait_ms(600).await;
        h.send(Command::Copy);
        wait_ms(1).await;
        assert_eq!(h.session().notice, None);
        assert_eq!(h.session().output_text, "en>hi:hello");
    }

    #[tokio::test(start_paused = true)]
    async fn read_aloud_uses_target_language() {
        let h = Harness::start(FakeProvider::default().then(0, Reply::Text("bonjour")));

        h.send(Command::SetTargetLang("fr".into()));
        h.send(Command::ReadAloud);
        h.input("hello");
        wait_ms(600).await;
        h.send(Command::ReadAloud);
        wait_ms(1).await;

        assert_eq!(
            *h.speaker.spoken.lock().unwrap(),
            vec![("bonjour".to_string(), "fr".to_string())]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn dropping_the_sender_cancels_pending_debounce() {
        let Harness { tx, provider, task, .. } = Harness::start(FakeProvider::default());

        tx.send(Command::SetInput("hello".into())).unwrap();
        drop(tx);
        wait_ms(1000).await;

        assert!(task.is_finished());
        assert!(provider.calls().is_empty());
    }
}
