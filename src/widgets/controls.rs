use ratatui::{
    buffer::Buffer,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Style, Stylize},
    widgets::{Paragraph, Widget},
};

const CONTROLS: [(&str, &str); 5] = [
    ("j/k", "Section"),
    ("PgUp/PgDn", "Scroll"),
    ("e", "Export charts"),
    ("d", "Download"),
    ("q", "Quit"),
];

#[derive(Default)]
pub struct Controls {
    pub status: Option<String>,
    pub dimmed: bool,
    /// Greys out the download key when the page offers none.
    pub download_available: bool,
}

impl Controls {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_status(mut self, status: Option<String>) -> Self {
        self.status = status;
        self
    }

    pub fn with_dimmed(mut self, dimmed: bool) -> Self {
        self.dimmed = dimmed;
        self
    }

    pub fn with_download_available(mut self, available: bool) -> Self {
        self.download_available = available;
        self
    }
}

impl Widget for &Controls {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let mut constraints = CONTROLS.iter().fold(vec![], |mut acc, (key, action)| {
            acc.push(Constraint::Length(key.chars().count() as u16 + 2));
            acc.push(Constraint::Length(action.chars().count() as u16 + 1));
            acc
        });
        constraints.push(Constraint::Fill(1));

        let layout = Layout::new(Direction::Horizontal, constraints).split(area);
        let color = Color::DarkGray;

        let base_style = if self.dimmed {
            Style::default().fg(Color::DarkGray)
        } else {
            Style::default()
        };

        for (i, (key, action)) in CONTROLS.iter().enumerate() {
            let j = i * 2;
            let style = if *key == "d" && !self.download_available {
                Style::default().fg(Color::DarkGray)
            } else {
                base_style
            };
            Paragraph::new(*key)
                .style(style.bold())
                .centered()
                .render(layout[j], buf);
            Paragraph::new(*action)
                .style(style.bg(color))
                .render(layout[j + 1], buf);
        }

        let status = self.status.as_deref().unwrap_or("");
        Paragraph::new(status)
            .style(base_style.bg(color).fg(Color::White))
            .right_aligned()
            .render(layout[CONTROLS.len() * 2], buf);
    }
}
