//! Port Lister and Scan Submitter over any [`ScannerApi`].
//!
//! Overlapping submissions are ordered by a generation counter: each
//! submission takes the next ticket, and its response is rendered only if no
//! newer submission has started since. A stale response is dropped whole,
//! so lines from two scans never mix.
use std::sync::{Mutex, MutexGuard};

use tracing::{debug, warn};

use crate::client::ScannerApi;
use crate::form::ScanForm;
use crate::view::{PortSelect, ResultsContent, ResultsRegion};

#[derive(Debug, Default)]
struct PageState {
    select: PortSelect,
    results: ResultsRegion,
    generation: u64,
}

/// What happened to one submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Submission {
    pub ticket: u64,
    /// `false` when a newer submission superseded this one.
    pub rendered: bool,
}

pub struct ScanPage<A> {
    api: A,
    state: Mutex<PageState>,
}

impl<A: ScannerApi> ScanPage<A> {
    pub fn new(api: A) -> Self {
        Self {
            api,
            state: Mutex::new(PageState::default()),
        }
    }

    pub fn api(&self) -> &A {
        &self.api
    }

    fn state(&self) -> MutexGuard<'_, PageState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Fetch the port list once and render it into the dropdown. On failure
    /// the dropdown stays empty and the error goes to the results region.
    pub async fn load_ports(&self) -> bool {
        match self.api.list_ports().await {
            Ok(ports) => {
                debug!(count = ports.len(), "loaded serial ports");
                self.state().select.render(&ports);
                true
            }
            Err(e) => {
                warn!("port listing failed: {e}");
                let mut state = self.state();
                state.select.render(&[]);
                state
                    .results
                    .render(ResultsContent::Error(format!("Could not load ports: {e}")));
                false
            }
        }
    }

    /// Submit the form: build a config, send it, render the outcome unless a
    /// newer submission has started in the meantime.
    pub async fn submit(&self, form: &ScanForm) -> Submission {
        let ticket = {
            let mut state = self.state();
            state.generation += 1;
            state.generation
        };

        let content = match form.to_config() {
            Ok(config) => match self.api.scan(&config).await {
                Ok(lines) => ResultsContent::Lines(lines),
                Err(e) => {
                    warn!(ticket, "scan failed: {e}");
                    ResultsContent::Error(format!("Scan failed: {e}"))
                }
            },
            Err(e) => ResultsContent::Error(e.to_string()),
        };

        let mut state = self.state();
        let rendered = state.generation == ticket;
        if rendered {
            state.results.render(content);
        } else {
            debug!(ticket, latest = state.generation, "dropping stale scan response");
        }
        Submission { ticket, rendered }
    }

    pub fn port_select(&self) -> PortSelect {
        self.state().select.clone()
    }

    pub fn results(&self) -> ResultsRegion {
        self.state().results.clone()
    }
}
