//! Render model of the page. Each region is replaced wholesale by a single
//! render call; nothing appends to a region incrementally.
use std::fmt::Write as _;

pub const RESULTS_HEADING: &str = "Scan Results:";
pub const LINE_CLASS: &str = "text-light";
pub const ERROR_CLASS: &str = "text-danger";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectOption {
    pub value: String,
    pub label: String,
}

/// The serial port dropdown.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PortSelect {
    options: Vec<SelectOption>,
}

impl PortSelect {
    /// One option per port, value and label both the port name, in order.
    pub fn render(&mut self, ports: &[String]) {
        self.options = ports
            .iter()
            .map(|p| SelectOption {
                value: p.clone(),
                label: p.clone(),
            })
            .collect();
    }

    pub fn options(&self) -> &[SelectOption] {
        &self.options
    }

    /// Value a form would submit with the default selection.
    pub fn selected(&self) -> Option<&str> {
        self.options.first().map(|o| o.value.as_str())
    }
}

/// A paragraph in the results region.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Line {
    pub text: String,
    pub class: &'static str,
}

/// What the results region should show.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResultsContent {
    Lines(Vec<String>),
    Error(String),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResultsRegion {
    heading: Option<&'static str>,
    lines: Vec<Line>,
}

impl ResultsRegion {
    pub fn render(&mut self, content: ResultsContent) {
        *self = match content {
            ResultsContent::Lines(lines) => ResultsRegion {
                heading: Some(RESULTS_HEADING),
                lines: lines
                    .into_iter()
                    .map(|text| Line {
                        text,
                        class: LINE_CLASS,
                    })
                    .collect(),
            },
            ResultsContent::Error(message) => ResultsRegion {
                heading: None,
                lines: vec![Line {
                    text: message,
                    class: ERROR_CLASS,
                }],
            },
        };
    }

    pub fn heading(&self) -> Option<&str> {
        self.heading
    }

    pub fn lines(&self) -> &[Line] {
        &self.lines
    }

    pub fn texts(&self) -> Vec<&str> {
        self.lines.iter().map(|l| l.text.as_str()).collect()
    }

    pub fn error(&self) -> Option<&str> {
        self.lines
            .iter()
            .find(|l| l.class == ERROR_CLASS)
            .map(|l| l.text.as_str())
    }

    /// Plain-text rendering for a terminal.
    pub fn to_text(&self) -> String {
        let mut out = String::new();
        if let Some(h) = self.heading {
            let _ = writeln!(out, "{h}");
        }
        for line in &self.lines {
            if line.class == ERROR_CLASS {
                let _ = writeln!(out, "error: {}", line.text);
            } else {
                let _ = writeln!(out, "{}", line.text);
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn select_mirrors_port_order() {
        let mut select = PortSelect::default();
        select.render(&["COM1".to_string(), "COM3".to_string()]);
        let opts = select.options();
        assert_eq!(opts.len(), 2);
        assert_eq!((opts[0].value.as_str(), opts[0].label.as_str()), ("COM1", "COM1"));
        assert_eq!((opts[1].value.as_str(), opts[1].label.as_str()), ("COM3", "COM3"));
        assert_eq!(select.selected(), Some("COM1"));
    }

    #[test]
    fn results_replace_previous_content() {
        let mut region = ResultsRegion::default();
        region.render(ResultsContent::Lines(vec!["Register 9: 1".into()]));
        region.render(ResultsContent::Lines(vec![
            "Register 0: 123".into(),
            "Register 1: 456".into(),
        ]));
        assert_eq!(region.heading(), Some(RESULTS_HEADING));
        assert_eq!(region.texts(), vec!["Register 0: 123", "Register 1: 456"]);
        assert!(region.lines().iter().all(|l| l.class == LINE_CLASS));
    }

    #[test]
    fn error_clears_results() {
        let mut region = ResultsRegion::default();
        region.render(ResultsContent::Lines(vec!["Register 0: 1".into()]));
        region.render(ResultsContent::Error("device did not answer".into()));
        assert_eq!(region.heading(), None);
        assert_eq!(region.error(), Some("device did not answer"));
        assert_eq!(region.to_text(), "error: device did not answer\n");
    }

    #[test]
    fn text_rendering_has_heading() {
        let mut region = ResultsRegion::default();
        region.render(ResultsContent::Lines(vec!["Register 0: 5".into()]));
        assert_eq!(region.to_text(), "Scan Results:\nRegister 0: 5\n");
    }
}
