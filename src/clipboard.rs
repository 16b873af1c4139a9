use anyhow::{Context, Result};

pub trait ClipboardWriter {
    fn write_text(&mut self, text: &str) -> Result<()>;
}

/// System clipboard via arboard.
///
/// The handle is opened on first use and kept alive afterwards: on X11 the
/// copied text is only served while the owning `Clipboard` exists.
#[derive(Default)]
pub struct SystemClipboard {
    inner: Option<arboard::Clipboard>,
}

impl ClipboardWriter for SystemClipboard {
    fn write_text(&mut self, text: &str) -> Result<()> {
        if self.inner.is_none() {
            self.inner = Some(arboard::Clipboard::new().context("Failed to open clipboard")?);
        }
        if let Some(clip) = self.inner.as_mut() {
            clip.set_text(text.to_owned())
                .context("Failed to write clipboard")?;
        }
        Ok(())
    }
}
