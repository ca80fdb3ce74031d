use anyhow::{bail, Result};
use a2i_contracts::events::EventWriter;
use a2i_contracts::gallery::{GalleryEntry, GalleryImage};
use serde_json::json;

use crate::account::AccountService;
use crate::http::error_chain_text;
use crate::session::Session;
use crate::wizard::map_object;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GalleryMount {
    /// No one is logged in; send the user back to the wizard.
    Redirect,
    Loaded,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct GalleryDetail {
    index: usize,
    image: GalleryImage,
}

/// The personal gallery view: one fetch per visit, then purely local
/// browsing of the returned cards.
pub struct GalleryPage {
    session: Session,
    events: EventWriter,
    loading: bool,
    error: Option<String>,
    entries: Vec<GalleryEntry>,
    detail: Option<GalleryDetail>,
}

impl GalleryPage {
    pub fn new(session: Session, events: EventWriter) -> Self {
        Self {
            session,
            events,
            loading: false,
            error: None,
            entries: Vec::new(),
            detail: None,
        }
    }

    pub fn mount(&mut self, account: &dyn AccountService) -> GalleryMount {
        self.detail = None;
        self.entries.clear();
        self.error = None;
        let Some(user_id) = self.session.user_id() else {
            return GalleryMount::Redirect;
        };

        self.loading = true;
        let fetched = account.list_gallery(&user_id);
        self.loading = false;
        match fetched {
            Ok(entries) => {
                let _ = self.events.emit(
                    "gallery_loaded",
                    map_object(json!({ "count": entries.len() })),
                );
                self.entries = entries;
            }
            Err(err) => {
                let message = error_chain_text(&err, 512);
                let _ = self.events.emit(
                    "request_failed",
                    map_object(json!({ "action": "list_gallery", "error": message })),
                );
                self.error = Some(message);
            }
        }
        GalleryMount::Loaded
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn cards(&self) -> &[GalleryEntry] {
        &self.entries
    }

    pub fn open(&mut self, index: usize) -> Result<()> {
        if index >= self.entries.len() {
            bail!("No gallery entry #{}.", index + 1);
        }
        self.detail = Some(GalleryDetail {
            index,
            image: GalleryImage::default(),
        });
        Ok(())
    }

    pub fn detail(&self) -> Option<(&GalleryEntry, GalleryImage)> {
        let detail = self.detail?;
        self.entries
            .get(detail.index)
            .map(|entry| (entry, detail.image))
    }

    /// Image shown in the open detail view.
    pub fn detail_image(&self) -> Option<&str> {
        self.detail().map(|(entry, which)| entry.image(which))
    }

    /// final -> original -> masked -> final
    pub fn cycle_image(&mut self) -> Option<GalleryImage> {
        let detail = self.detail.as_mut()?;
        detail.image = detail.image.next();
        Some(detail.image)
    }

    pub fn close(&mut self) {
        self.detail = None;
    }
}

#[cfg(test)]
mod tests {
    use a2i_contracts::events::{read_event_types, EventWriter};
    use a2i_contracts::gallery::{GalleryEntry, GalleryImage};

    use super::{GalleryMount, GalleryPage};
    use crate::session::Session;
    use crate::test_support::FakeAccountService;

    fn entry(name: &str) -> GalleryEntry {
        GalleryEntry {
            art_name: name.to_string(),
            final_image_url: format!("final-{name}"),
            original_image_url: format!("original-{name}"),
            masked_image_url: format!("masked-{name}"),
            ..GalleryEntry::default()
        }
    }

    fn logged_in(account: &FakeAccountService) -> anyhow::Result<Session> {
        let session = Session::new();
        session.login(account, "me@example.com", "secret")?;
        Ok(session)
    }

    #[test]
    fn anonymous_visit_redirects_without_fetching() {
        let account = FakeAccountService::default();
        let mut page = GalleryPage::new(Session::new(), EventWriter::disabled("a2i-test"));
        assert_eq!(page.mount(&account), GalleryMount::Redirect);
        assert_eq!(account.list_calls(), 0);
        assert!(page.cards().is_empty());
    }

    #[test]
    fn loads_cards_once_per_visit() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let events_path = dir.path().join("events.jsonl");
        let account = FakeAccountService::default();
        account.set_gallery(vec![entry("a"), entry("b")]);
        let mut page = GalleryPage::new(logged_in(&account)?, EventWriter::new(&events_path, "a2i-test"));

        assert_eq!(page.mount(&account), GalleryMount::Loaded);
        assert_eq!(account.list_calls(), 1);
        assert!(!page.is_loading());
        assert_eq!(page.error(), None);
        assert_eq!(page.cards().len(), 2);
        assert_eq!(read_event_types(&events_path)?, vec!["gallery_loaded"]);
        Ok(())
    }

    #[test]
    fn empty_gallery_has_no_error() -> anyhow::Result<()> {
        let account = FakeAccountService::default();
        let mut page = GalleryPage::new(logged_in(&account)?, EventWriter::disabled("a2i-test"));
        page.mount(&account);
        assert!(page.cards().is_empty());
        assert_eq!(page.error(), None);
        Ok(())
    }

    #[test]
    fn fetch_failure_lands_in_error_slot() -> anyhow::Result<()> {
        let account = FakeAccountService::default();
        let session = logged_in(&account)?;
        account.fail_with("Failed to fetch gallery");
        let mut page = GalleryPage::new(session, EventWriter::disabled("a2i-test"));

        assert_eq!(page.mount(&account), GalleryMount::Loaded);
        assert_eq!(page.error(), Some("Failed to fetch gallery"));
        assert!(page.cards().is_empty());
        assert!(!page.is_loading());
        Ok(())
    }

    #[test]
    fn detail_cycles_final_original_masked() -> anyhow::Result<()> {
        let account = FakeAccountService::default();
        account.set_gallery(vec![entry("a"), entry("b")]);
        let mut page = GalleryPage::new(logged_in(&account)?, EventWriter::disabled("a2i-test"));
        page.mount(&account);

        assert!(page.open(2).is_err());
        assert_eq!(page.cycle_image(), None);

        page.open(1)?;
        assert_eq!(page.detail_image(), Some("final-b"));
        assert_eq!(page.cycle_image(), Some(GalleryImage::Original));
        assert_eq!(page.detail_image(), Some("original-b"));
        assert_eq!(page.cycle_image(), Some(GalleryImage::Masked));
        assert_eq!(page.detail_image(), Some("masked-b"));
        assert_eq!(page.cycle_image(), Some(GalleryImage::Final));
        assert_eq!(page.detail_image(), Some("final-b"));

        page.close();
        assert_eq!(page.detail(), None);
        assert_eq!(account.list_calls(), 1);
        Ok(())
    }
}
