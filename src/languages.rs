#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Language {
    pub code: &'static str,
    pub name: &'static str,
}

const fn lang(code: &'static str, name: &'static str) -> Language {
    Language { code, name }
}

static LANGUAGES: [Language; 15] = [
    lang("en", "English"),
    lang("hi", "Hindi"),
    lang("es", "Spanish"),
    lang("fr", "French"),
    lang("de", "German"),
    lang("zh", "Chinese"),
    lang("ja", "Japanese"),
    lang("ko", "Korean"),
    lang("ru", "Russian"),
    lang("it", "Italian"),
    lang("pt", "Portuguese"),
    lang("ar", "Arabic"),
    lang("bn", "Bengali"),
    lang("pa", "Punjabi"),
    lang("vi", "Vietnamese"),
];

/// Every language offered by both selectors, in display order.
pub fn list() -> &'static [Language] {
    &LANGUAGES
}

pub fn find(code: &str) -> Option<&'static Language> {
    LANGUAGES.iter().find(|l| l.code == code)
}

pub fn is_supported(code: &str) -> bool {
    find(code).is_some()
}

pub fn display_name(code: &str) -> &str {
    find(code).map(|l| l.name).unwrap_or(code)
}
