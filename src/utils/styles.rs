//! Used to color the non-tabular bits of output. Styling is deliberately
//! sparse: tables stay plain so they can be piped through grep and diff.
use nu_ansi_term::{Color, Style};

pub trait Styling {
    /// Titles that introduce one report, e.g. "Section headers".
    fn report_title(self) -> String;
    fn table_header(self) -> String;
    fn table_sep(self) -> String;
    fn explain_title(self) -> String;
    fn explain_text(self) -> String;
    fn warn(self) -> String;
}

impl Styling for &str {
    fn report_title(self) -> String {
        Style::new().fg(Color::Blue).bold().paint(self).to_string()
    }

    fn table_header(self) -> String {
        Style::new().bold().paint(self).to_string()
    }

    fn table_sep(self) -> String {
        Style::new().dimmed().paint(self).to_string()
    }

    fn explain_title(self) -> String {
        Style::new().fg(Color::Cyan).paint(self).to_string()
    }

    fn explain_text(self) -> String {
        Style::new().dimmed().paint(self).to_string()
    }

    fn warn(self) -> String {
        Style::new().fg(Color::Yellow).paint(self).to_string()
    }
}

impl Styling for String {
    fn report_title(self) -> String {
        self.as_str().report_title()
    }

    fn table_header(self) -> String {
        self.as_str().table_header()
    }

    fn table_sep(self) -> String {
        self.as_str().table_sep()
    }

    fn explain_title(self) -> String {
        self.as_str().explain_title()
    }

    fn explain_text(self) -> String {
        self.as_str().explain_text()
    }

    fn warn(self) -> String {
        self.as_str().warn()
    }
}
