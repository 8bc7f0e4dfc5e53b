//! Delivery orchestration.
//!
//! Composes the progression engine with the messenger and content
//! capabilities to produce one delivery. Cursors and markers advance only
//! after the send succeeded: an un-sent delivery never consumes a cursor
//! step. Completion announcements go out synchronously inside the same
//! call that detected the wrap.

use chrono::NaiveDate;
use std::sync::Arc;
use tracing::{info, warn};

use crate::content::{fallback_ayah, page_image_url, ContentInfoProvider, PageInfo};
use crate::error::Result;
use crate::progression::{advance_page, advance_part, normalize_page, normalize_part, KHATMA_PARTS, MUSHAF_PAGES};
use crate::store::StateStore;
use crate::telegram::{MediaPair, Messenger};

const MUSHAF_COMPLETE_TEXT: &str =
    "🎉 تم بحمد الله إتمام المصحف كاملاً!\n🔄 نبدأ من الصفحة الأولى من جديد.";

const KHATMA_COMPLETE_TEXT: &str =
    "🎉 تهانينا! أتممت ختمة كاملة 🌟\nاللهم اجعل القرآن ربيع قلوبنا.";

/// Produces and sends one delivery per call.
pub struct Deliverer {
    store: Arc<StateStore>,
    messenger: Arc<dyn Messenger>,
    content: Arc<dyn ContentInfoProvider>,
}

impl Deliverer {
    pub fn new(
        store: Arc<StateStore>,
        messenger: Arc<dyn Messenger>,
        content: Arc<dyn ContentInfoProvider>,
    ) -> Self {
        Self {
            store,
            messenger,
            content,
        }
    }

    /// Send the next two mushaf pages to `chat_id` and advance the page
    /// cursor, recording `marker` for idempotency.
    pub async fn deliver_pages(&self, chat_id: &str, marker: &str) -> Result<()> {
        let Some(destination) = self.store.get(chat_id) else {
            return Ok(());
        };

        let page = normalize_page(destination.page_cursor);
        // The last page has no partner and goes out alone.
        let second = (page < MUSHAF_PAGES).then(|| page + 1);

        let page_info = match self.content.page_info(page).await {
            Ok(info) => info,
            Err(e) => {
                warn!("page info lookup failed for page {page}, using placeholder: {e}");
                PageInfo::placeholder()
            }
        };

        let pair = MediaPair {
            first_url: page_image_url(page),
            caption: page_caption(page, second, &page_info),
            second_url: second.map(page_image_url),
        };
        self.messenger.send_page_pair(chat_id, &pair).await?;

        let advance = advance_page(destination.page_cursor);
        self.store.upsert(chat_id, |d| {
            d.page_cursor = advance.next;
            d.last_pages_marker = Some(marker.to_owned());
        })?;
        match second {
            Some(second) => info!("sent pages {page}-{second} to chat {chat_id}"),
            None => info!("sent page {page} to chat {chat_id}"),
        }

        if advance.wrapped {
            // Best-effort: the pages themselves already went out.
            if let Err(e) = self.messenger.send_text(chat_id, MUSHAF_COMPLETE_TEXT).await {
                warn!("mushaf completion announcement failed for chat {chat_id}: {e}");
            }
        }
        Ok(())
    }

    /// Send the khatma reading reminder for the current part and advance
    /// the part cursor, recording `marker` for idempotency.
    pub async fn deliver_reminder(&self, chat_id: &str, marker: &str, today: NaiveDate) -> Result<()> {
        let Some(destination) = self.store.get(chat_id) else {
            return Ok(());
        };

        let part = normalize_part(destination.part_cursor);
        let ayah = match self.content.random_ayah().await {
            Ok(ayah) => ayah,
            Err(e) => {
                warn!("random ayah lookup failed, using fallback: {e}");
                fallback_ayah()
            }
        };

        let text = reminder_text(part, destination.completed_khatmas, today, &ayah);
        self.messenger.send_text(chat_id, &text).await?;

        let advance = advance_part(destination.part_cursor);
        self.store.upsert(chat_id, |d| {
            d.part_cursor = advance.next;
            d.last_reminder_marker = Some(marker.to_owned());
            if advance.completed {
                d.completed_khatmas += 1;
            }
        })?;
        info!("sent khatma reminder (part {part}/{KHATMA_PARTS}) to chat {chat_id}");

        if advance.completed {
            if let Err(e) = self.messenger.send_text(chat_id, KHATMA_COMPLETE_TEXT).await {
                warn!("khatma congratulation failed for chat {chat_id}: {e}");
            }
        }
        Ok(())
    }
}

fn page_caption(page: u16, second: Option<u16>, info: &PageInfo) -> String {
    let juz = info
        .juz
        .map(|j| j.to_string())
        .unwrap_or_else(|| "؟".to_owned());
    let pages = match second {
        Some(second) => format!("الصفحتان {page}-{second}"),
        None => format!("الصفحة {page}"),
    };
    format!("📖 {pages}\n🕋 سورة: {}\n📚 الجزء: {juz}", info.surah_name)
}

fn reminder_text(part: u8, completed_khatmas: u32, today: NaiveDate, ayah: &str) -> String {
    let mut text = format!(
        "📘 تذكير الختمة اليومية\n📅 التاريخ: {}\n📖 الجزء: {part} من {KHATMA_PARTS}",
        today.format("%d/%m/%Y")
    );
    if completed_khatmas > 0 {
        text.push_str(&format!("\n🏁 ختمات مكتملة: {completed_khatmas}"));
    }
    text.push_str(&format!("\n✨ آية اليوم:\n{ayah}"));
    text
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;
    use crate::test_utils::{RecordingMessenger, SendFailure, StubContent};

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 6, 14).unwrap()
    }

    fn harness(
        content: StubContent,
    ) -> (
        tempfile::TempDir,
        Arc<StateStore>,
        Arc<RecordingMessenger>,
        Deliverer,
    ) {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(StateStore::load(dir.path().join("state.json")).unwrap());
        let messenger = Arc::new(RecordingMessenger::new());
        let deliverer = Deliverer::new(
            Arc::clone(&store),
            Arc::clone(&messenger) as Arc<dyn Messenger>,
            Arc::new(content),
        );
        (dir, store, messenger, deliverer)
    }

    #[tokio::test]
    async fn pages_delivery_advances_cursor_and_records_marker() {
        let (_dir, store, messenger, deliverer) = harness(StubContent::working());
        store.register("10").unwrap();

        deliverer.deliver_pages("10", "11:00").await.unwrap();

        let dest = store.get("10").unwrap();
        assert_eq!(dest.page_cursor, 3);
        assert_eq!(dest.last_pages_marker.as_deref(), Some("11:00"));

        let pairs = messenger.sent_pairs();
        assert_eq!(pairs.len(), 1);
        assert!(pairs[0].1.first_url.ends_with("/1.png"));
        assert!(pairs[0].1.second_url.as_deref().unwrap().ends_with("/2.png"));
        assert!(pairs[0].1.caption.contains("الصفحتان 1-2"));
        assert!(pairs[0].1.caption.contains("سُورَةُ الكَهۡفِ"));
        assert!(messenger.sent_texts().is_empty());
    }

    #[tokio::test]
    async fn wrap_at_last_pages_sends_completion_announcement() {
        let (_dir, store, messenger, deliverer) = harness(StubContent::working());
        store.register("10").unwrap();
        store.upsert("10", |d| d.page_cursor = 603).unwrap();

        deliverer.deliver_pages("10", "11:00").await.unwrap();

        let dest = store.get("10").unwrap();
        assert_eq!(dest.page_cursor, 1);
        assert_eq!(dest.last_pages_marker.as_deref(), Some("11:00"));

        let texts = messenger.sent_texts();
        assert_eq!(texts.len(), 1);
        assert_eq!(texts[0].1, MUSHAF_COMPLETE_TEXT);
    }

    #[tokio::test]
    async fn last_page_goes_out_alone() {
        let (_dir, store, messenger, deliverer) = harness(StubContent::working());
        store.register("10").unwrap();
        store.upsert("10", |d| d.page_cursor = 604).unwrap();

        deliverer.deliver_pages("10", "11:00").await.unwrap();

        let pairs = messenger.sent_pairs();
        assert_eq!(pairs.len(), 1);
        assert!(pairs[0].1.first_url.ends_with("/604.png"));
        assert_eq!(pairs[0].1.second_url, None);
        assert!(pairs[0].1.caption.contains("الصفحة 604"));
        assert!(!pairs[0].1.caption.contains("604-604"));

        let dest = store.get("10").unwrap();
        assert_eq!(dest.page_cursor, 1);
        assert_eq!(messenger.sent_texts()[0].1, MUSHAF_COMPLETE_TEXT);
    }

    #[tokio::test]
    async fn failed_send_leaves_cursor_and_marker_untouched() {
        let (_dir, store, messenger, deliverer) = harness(StubContent::working());
        store.register("10").unwrap();
        messenger.fail_sends_with(SendFailure::Transient);

        let err = deliverer.deliver_pages("10", "11:00").await.unwrap_err();
        assert!(matches!(err, crate::WirdError::Transient(_)));

        let dest = store.get("10").unwrap();
        assert_eq!(dest.page_cursor, 1);
        assert_eq!(dest.last_pages_marker, None);
    }

    #[tokio::test]
    async fn content_failure_degrades_to_placeholder_caption() {
        let (_dir, store, messenger, deliverer) = harness(StubContent::failing());
        store.register("10").unwrap();

        deliverer.deliver_pages("10", "11:00").await.unwrap();

        let pairs = messenger.sent_pairs();
        assert!(pairs[0].1.caption.contains("غير معروف"));
        assert!(pairs[0].1.caption.contains("؟"));
        assert_eq!(store.get("10").unwrap().page_cursor, 3);
    }

    #[tokio::test]
    async fn corrupted_cursor_self_heals_on_delivery() {
        let (_dir, store, _messenger, deliverer) = harness(StubContent::working());
        store.register("10").unwrap();
        store.upsert("10", |d| d.page_cursor = 700).unwrap();

        deliverer.deliver_pages("10", "11:00").await.unwrap();
        assert_eq!(store.get("10").unwrap().page_cursor, 3);
    }

    #[tokio::test]
    async fn unknown_destination_is_a_quiet_no_op() {
        let (_dir, _store, messenger, deliverer) = harness(StubContent::working());
        deliverer.deliver_pages("ghost", "11:00").await.unwrap();
        deliverer
            .deliver_reminder("ghost", "11:00", today())
            .await
            .unwrap();
        assert!(messenger.sent_pairs().is_empty());
        assert!(messenger.sent_texts().is_empty());
    }

    #[tokio::test]
    async fn reminder_mentions_part_and_ayah() {
        let (_dir, store, messenger, deliverer) = harness(StubContent::working());
        store.register("10").unwrap();
        store.upsert("10", |d| d.part_cursor = 5).unwrap();

        deliverer.deliver_reminder("10", "14:00", today()).await.unwrap();

        let texts = messenger.sent_texts();
        assert_eq!(texts.len(), 1);
        assert!(texts[0].1.contains("الجزء: 5 من 30"));
        assert!(texts[0].1.contains("إِنَّ مَعَ الْعُسْرِ يُسْرًا"));
        assert!(texts[0].1.contains("14/06/2025"));

        let dest = store.get("10").unwrap();
        assert_eq!(dest.part_cursor, 6);
        assert_eq!(dest.last_reminder_marker.as_deref(), Some("14:00"));
        assert_eq!(dest.completed_khatmas, 0);
    }

    #[tokio::test]
    async fn reminder_content_failure_uses_fallback_ayah() {
        let (_dir, store, messenger, deliverer) = harness(StubContent::failing());
        store.register("10").unwrap();

        deliverer.deliver_reminder("10", "14:00", today()).await.unwrap();

        let texts = messenger.sent_texts();
        assert!(texts[0].1.contains("آية اليوم"));
        assert_eq!(store.get("10").unwrap().part_cursor, 2);
    }

    #[tokio::test]
    async fn thirtieth_reminder_completes_a_khatma() {
        let (_dir, store, messenger, deliverer) = harness(StubContent::working());
        store.register("10").unwrap();
        store.upsert("10", |d| d.part_cursor = 30).unwrap();

        deliverer.deliver_reminder("10", "14:00", today()).await.unwrap();

        let dest = store.get("10").unwrap();
        assert_eq!(dest.part_cursor, 1);
        assert_eq!(dest.completed_khatmas, 1);

        let texts = messenger.sent_texts();
        assert_eq!(texts.len(), 2);
        assert_eq!(texts[1].1, KHATMA_COMPLETE_TEXT);
    }

    #[tokio::test]
    async fn thirty_reminders_complete_exactly_one_cycle() {
        let (_dir, store, _messenger, deliverer) = harness(StubContent::working());
        store.register("10").unwrap();

        for i in 0..30 {
            let marker = format!("m{i}");
            deliverer
                .deliver_reminder("10", &marker, today())
                .await
                .unwrap();
        }

        let dest = store.get("10").unwrap();
        assert_eq!(dest.part_cursor, 1);
        assert_eq!(dest.completed_khatmas, 1);
    }

    #[tokio::test]
    async fn failed_reminder_send_does_not_advance_part() {
        let (_dir, store, messenger, deliverer) = harness(StubContent::working());
        store.register("10").unwrap();
        messenger.fail_sends_with(SendFailure::Unreachable);

        let err = deliverer
            .deliver_reminder("10", "14:00", today())
            .await
            .unwrap_err();
        assert!(matches!(err, crate::WirdError::Unreachable(_)));

        let dest = store.get("10").unwrap();
        assert_eq!(dest.part_cursor, 1);
        assert_eq!(dest.last_reminder_marker, None);
    }

    #[test]
    fn completed_khatmas_only_shown_once_nonzero() {
        let text = reminder_text(3, 0, today(), "ayah");
        assert!(!text.contains("ختمات مكتملة"));
        let text = reminder_text(3, 2, today(), "ayah");
        assert!(text.contains("ختمات مكتملة: 2"));
    }
}
