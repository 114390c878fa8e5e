use owo_colors::Style;
use std::sync::OnceLock;

static THEME: OnceLock<Theme> = OnceLock::new();

/// Styles for store output. Every style is empty when stdout is not a
/// colour terminal.
#[derive(Debug, Clone)]
pub struct Theme {
    pub header: Style,
    pub success: Style,
    pub error: Style,
    pub warn: Style,
    /// Field labels in `info` lines
    pub label: Style,
    pub muted: Style,
    pub anchor: Style,
    pub relation: Style,
    pub quantity: Style,
}

impl Theme {
    fn new(colored: bool) -> Self {
        let pick = |style: Style| if colored { style } else { Style::new() };
        Self {
            header: pick(Style::new().cyan().bold()),
            success: pick(Style::new().green().bold()),
            error: pick(Style::new().red().bold()),
            warn: pick(Style::new().yellow().bold()),
            label: pick(Style::new().magenta()),
            muted: pick(Style::new().bright_black()),
            anchor: pick(Style::new().bold()),
            relation: pick(Style::new().blue().bold()),
            quantity: pick(Style::new().yellow()),
        }
    }
}

pub fn theme() -> &'static Theme {
    THEME.get_or_init(|| Theme::new(console::colors_enabled() && console::Term::stdout().is_term()))
}
