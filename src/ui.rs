use std::path::Path;

use anyhow::{Context, Result};
use eframe::{egui, App, Frame};
use tokio::sync::{mpsc, watch};

use crate::controller::{Command, Phase, Session};
use crate::languages;

pub struct TranslateApp {
    commands: mpsc::UnboundedSender<Command>,
    view: watch::Receiver<Session>,
    input: String,
    source_lang: String,
    target_lang: String,
}

impl TranslateApp {
    pub fn new(commands: mpsc::UnboundedSender<Command>, view: watch::Receiver<Session>) -> Self {
        let (source_lang, target_lang) = {
            let session = view.borrow();
            (session.input_lang.clone(), session.output_lang.clone())
        };
        Self {
            commands,
            view,
            input: String::new(),
            source_lang,
            target_lang,
        }
    }

    fn send(&self, cmd: Command) {
        if self.commands.send(cmd).is_err() {
            tracing::warn!("Controller is gone, dropping command");
        }
    }

    fn render_main(&mut self, ui: &mut egui::Ui, session: &Session) {
        let input = ui.add(
            egui::TextEdit::multiline(&mut self.input)
                .hint_text("Enter text here...")
                .desired_width(f32::INFINITY)
                .desired_rows(6),
        );
        if input.changed() {
            self.send(Command::SetInput(self.input.clone()));
        }

        if language_selector(ui, "source_lang", &mut self.source_lang) {
            self.send(Command::SetSourceLang(self.source_lang.clone()));
        }

        ui.add_space(10.0);
        ui.vertical_centered(|ui| {
            ui.horizontal(|ui| {
                ui.label("Translation ↓");
                if matches!(session.phase, Phase::Debouncing | Phase::InFlight) {
                    ui.spinner();
                }
            });
        });
        ui.add_space(10.0);

        let mut output = session.display_output();
        ui.add(
            egui::TextEdit::multiline(&mut output)
                .hint_text("Translated text will appear here...")
                .desired_width(f32::INFINITY)
                .desired_rows(6),
        );

        ui.horizontal(|ui| {
            if language_selector(ui, "target_lang", &mut self.target_lang) {
                self.send(Command::SetTargetLang(self.target_lang.clone()));
            }
            if ui
                .button("Copy")
                .on_hover_text("Copy to clipboard")
                .clicked()
            {
                self.send(Command::Copy);
            }
            if ui.button("Read aloud").on_hover_text("Read aloud").clicked() {
                self.send(Command::ReadAloud);
            }
        });
    }
}

impl App for TranslateApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut Frame) {
        let session = self.view.borrow().clone();
        let blocked = session.notice.is_some();

        egui::CentralPanel::default().show(ctx, |ui| {
            ui.add_enabled_ui(!blocked, |ui| self.render_main(ui, &session));
        });

        if let Some(notice) = session.notice {
            egui::Window::new("Quick Translate")
                .collapsible(false)
                .resizable(false)
                .anchor(egui::Align2::CENTER_CENTER, egui::Vec2::ZERO)
                .show(ctx, |ui| {
                    ui.label(notice.message());
                    if ui.button("OK").clicked() {
                        self.send(Command::DismissNotice);
                    }
                });
        }
    }
}

/// Returns true when the user picked a different language.
fn language_selector(ui: &mut egui::Ui, id: &str, selected: &mut String) -> bool {
    let before = selected.clone();
    egui::ComboBox::from_id_source(id)
        .selected_text(languages::display_name(&before))
        .show_ui(ui, |ui| {
            for lang in languages::list() {
                ui.selectable_value(selected, lang.code.to_string(), lang.name);
            }
        });
    *selected != before
}

/// Registers an extra font as the last fallback of both families.
pub fn install_font(ctx: &egui::Context, path: &Path) -> Result<()> {
    let bytes = std::fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
    let mut fonts = egui::FontDefinitions::default();
    fonts
        .font_data
        .insert("fallback".to_owned(), egui::FontData::from_owned(bytes));
    for family in [egui::FontFamily::Proportional, egui::FontFamily::Monospace] {
        fonts
            .families
            .entry(family)
            .or_default()
            .push("fallback".to_owned());
    }
    ctx.set_fonts(fonts);
    tracing::info!("Loaded fallback font {}", path.display());
    Ok(())
}
