use crate::controller::{RefreshController, ScanOutcome, Trigger};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerOutcome {
    Rescanned(ScanOutcome),
    /// No engine is attached to the page; the host should reload it so the
    /// engine gets injected again.
    ReloadRequested,
}

/// Entry point for the toolbar button.
pub fn on_action_clicked(engine: Option<&RefreshController>) -> TriggerOutcome {
    match engine {
        Some(controller) => TriggerOutcome::Rescanned(controller.handle(&[Trigger::Manual])),
        None => {
            log::warn!("counter engine not loaded on this page, requesting reload");
            TriggerOutcome::ReloadRequested
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineSettings;
    use crate::controller::SkipReason;
    use crate::dom::Page;

    #[test]
    fn test_missing_engine_requests_reload() {
        assert_eq!(on_action_clicked(None), TriggerOutcome::ReloadRequested);
    }

    #[test]
    fn test_attached_engine_rescans() {
        let page = Page::parse(
            r#"<html><body><div id="search"><div id="rso">
                <div class="g"><div class="yuRUbf"><a href="https://a.example/"><h3>Alpha title</h3></a></div></div>
            </div></div></body></html>"#,
            "https://www.google.com/search?q=rust",
        )
        .unwrap();
        let controller = RefreshController::new(page, EngineSettings::default()).unwrap();

        match on_action_clicked(Some(&controller)) {
            TriggerOutcome::Rescanned(ScanOutcome::Completed(report)) => assert_eq!(report.added, 1),
            other => panic!("unexpected outcome {other:?}"),
        }

        let _busy = controller.try_begin_scan().unwrap();
        assert_eq!(
            on_action_clicked(Some(&controller)),
            TriggerOutcome::Rescanned(ScanOutcome::Skipped(SkipReason::Busy))
        );
    }
}
