use std::ffi::OsString;
use std::path::PathBuf;
use std::process::{Command, Stdio};

use anyhow::{Context, Result};

#[cfg(target_os = "windows")]
use std::os::windows::process::CommandExt;

#[cfg(target_os = "windows")]
const CREATE_NO_WINDOW: u32 = 0x0800_0000;

// Text and language are passed through the environment so no quoting is needed.
const POWERSHELL_SCRIPT: &str = "Add-Type -AssemblyName System.Speech; \
$s = New-Object System.Speech.Synthesis.SpeechSynthesizer; \
try { $s.SelectVoiceByHints('NotSet', 'NotSet', 0, [Globalization.CultureInfo]::GetCultureInfo($env:QT_SPEAK_LANG)) } catch {}; \
$s.Speak($env:QT_SPEAK_TEXT)";

pub trait Speaker {
    /// Start speaking `text` in `lang` and return without waiting for it.
    fn speak(&mut self, text: &str, lang: &str) -> Result<()>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Engine {
    Say,
    SpdSay,
    Espeak,
    PowerShell,
}

impl Engine {
    fn candidates() -> &'static [(Engine, &'static str)] {
        if cfg!(target_os = "windows") {
            &[(Engine::PowerShell, "powershell")]
        } else if cfg!(target_os = "macos") {
            &[(Engine::Say, "say")]
        } else {
            &[
                (Engine::SpdSay, "spd-say"),
                (Engine::Espeak, "espeak-ng"),
                (Engine::Espeak, "espeak"),
            ]
        }
    }

    fn args(self, text: &str, lang: &str) -> Vec<OsString> {
        match self {
            // `say` picks the voice from the system locale
            Engine::Say => vec![text.into()],
            Engine::SpdSay => vec!["-l".into(), lang.into(), text.into()],
            Engine::Espeak => vec!["-v".into(), lang.into(), text.into()],
            Engine::PowerShell => vec![
                "-NoProfile".into(),
                "-NonInteractive".into(),
                "-Command".into(),
                POWERSHELL_SCRIPT.into(),
            ],
        }
    }
}

/// Read-aloud through whatever speech program the platform ships.
pub struct SystemSpeaker {
    engine: Option<(Engine, PathBuf)>,
}

impl SystemSpeaker {
    pub fn detect() -> Self {
        let engine = Engine::candidates()
            .iter()
            .find_map(|&(engine, program)| which::which(program).ok().map(|p| (engine, p)));
        match &engine {
            Some((_, path)) => tracing::info!("Speech program: {}", path.display()),
            None => tracing::warn!("No speech program found, read aloud is unavailable"),
        }
        Self { engine }
    }
}

impl Speaker for SystemSpeaker {
    fn speak(&mut self, text: &str, lang: &str) -> Result<()> {
        let (engine, path) = self
            .engine
            .as_ref()
            .context("No speech program available")?;

        let mut cmd = Command::new(path);
        cmd.args(engine.args(text, lang))
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null());
        if *engine == Engine::PowerShell {
            cmd.env("QT_SPEAK_TEXT", text).env("QT_SPEAK_LANG", lang);
        }
        #[cfg(target_os = "windows")]
        cmd.creation_flags(CREATE_NO_WINDOW);

        let mut child = cmd
            .spawn()
            .with_context(|| format!("Failed to start {}", path.display()))?;

        // reap in the background so the child never lingers as a zombie
        std::thread::spawn(move || match child.wait() {
            Ok(status) => tracing::debug!("Speech finished: {}", status),
            Err(e) => tracing::debug!("Speech wait failed: {}", e),
        });
        Ok(())
    }
}
