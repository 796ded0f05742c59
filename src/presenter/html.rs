use std::fs::File;
use std::io::{self, Write};
use std::path::Path;
use std::sync::Mutex;

use crate::batch::TickerOutcome;
use crate::presenter::{Presenter, SharedWriter, emit, labeled_fields};

const TITLE: &str = "Stock Analysis";

/// Static HTML report with one panel per ticker.
///
/// Panels are collected while the batch runs and the page is written in one
/// piece when the batch ends, so an interrupted batch still leaves a
/// complete document.
pub struct HtmlPresenter {
    out: SharedWriter,
    precision: usize,
    body: Mutex<String>,
}

impl HtmlPresenter {
    /// Report written to the file at `path`, truncating it.
    pub fn create(path: &Path, precision: usize) -> io::Result<Self> {
        let file = File::create(path)?;
        Ok(Self::with_writer(Box::new(file), precision))
    }

    pub fn with_writer(out: Box<dyn Write + Send>, precision: usize) -> Self {
        Self {
            out: Mutex::new(out),
            precision,
            body: Mutex::new(String::new()),
        }
    }

    fn append(&self, fragment: &str) {
        match self.body.lock() {
            Ok(mut body) => body.push_str(fragment),
            Err(_) => tracing::warn!("html report buffer lock poisoned"),
        }
    }

    fn document(&self) -> String {
        let body = self
            .body
            .lock()
            .map(|mut b| std::mem::take(&mut *b))
            .unwrap_or_default();
        format!(
            "<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n<meta charset=\"utf-8\">\n\
             <title>{TITLE}</title>\n</head>\n<body>\n<h1>{TITLE}</h1>\n\
             <div id=\"results\">\n{body}</div>\n</body>\n</html>\n"
        )
    }
}

/// Escape text for an HTML element body.
fn escape(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            c => escaped.push(c),
        }
    }
    escaped
}

impl Presenter for HtmlPresenter {
    fn batch_started(&self, tickers: usize) {
        tracing::info!(tickers, "building html report");
    }

    fn ticker(&self, outcome: &TickerOutcome) {
        let panel = match &outcome.result {
            Ok(result) => {
                let mut panel = format!(
                    "<div class=\"ticker\">\n<h2>{}</h2>\n<p class=\"as-of\">As of {}</p>\n",
                    escape(result.ticker.as_str()),
                    result.as_of
                );
                for (label, value) in labeled_fields(result, self.precision) {
                    panel.push_str(&format!("<p>{label}: {}</p>\n", escape(&value)));
                }
                panel.push_str("</div>\n");
                panel
            }
            Err(failure) => {
                let heading = if outcome.ticker.is_empty() {
                    String::new()
                } else {
                    format!("<h2>{}</h2>\n", escape(&outcome.ticker))
                };
                format!(
                    "<div class=\"ticker error\">\n{heading}<p class=\"error\">{}</p>\n</div>\n",
                    escape(&failure.message)
                )
            }
        };
        self.append(&panel);
    }

    fn batch_aborted(&self, message: &str) {
        self.append(&format!("<p class=\"error\">{}</p>\n", escape(message)));
    }

    fn batch_ended(&self) {
        emit(&self.out, &self.document());
        tracing::info!("html report written");
    }
}
