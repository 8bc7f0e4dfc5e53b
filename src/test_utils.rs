//! Shared test doubles used across delivery, scheduler, and command tests.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use async_trait::async_trait;
use std::sync::Mutex;

use crate::content::{ContentInfoProvider, PageInfo};
use crate::error::{Result, WirdError};
use crate::telegram::{MediaPair, Messenger};

/// How the recording messenger should fail subsequent sends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SendFailure {
    #[default]
    None,
    Transient,
    Unreachable,
}

/// In-memory [`Messenger`] that records everything it is asked to send.
pub struct RecordingMessenger {
    failure: Mutex<SendFailure>,
    fail_only_chat: Mutex<Option<String>>,
    admin: Mutex<bool>,
    texts: Mutex<Vec<(String, String)>>,
    pairs: Mutex<Vec<(String, MediaPair)>>,
}

impl RecordingMessenger {
    pub fn new() -> Self {
        Self {
            failure: Mutex::new(SendFailure::None),
            fail_only_chat: Mutex::new(None),
            admin: Mutex::new(true),
            texts: Mutex::new(Vec::new()),
            pairs: Mutex::new(Vec::new()),
        }
    }

    pub fn fail_sends_with(&self, failure: SendFailure) {
        *self.failure.lock().unwrap() = failure;
    }

    /// Restrict the configured failure to a single chat id.
    pub fn fail_only_chat(&self, chat_id: &str) {
        *self.fail_only_chat.lock().unwrap() = Some(chat_id.to_owned());
    }

    pub fn set_admin(&self, admin: bool) {
        *self.admin.lock().unwrap() = admin;
    }

    pub fn sent_texts(&self) -> Vec<(String, String)> {
        self.texts.lock().unwrap().clone()
    }

    pub fn sent_pairs(&self) -> Vec<(String, MediaPair)> {
        self.pairs.lock().unwrap().clone()
    }

    fn check_failure(&self, chat_id: &str) -> Result<()> {
        if let Some(only) = self.fail_only_chat.lock().unwrap().as_deref() {
            if only != chat_id {
                return Ok(());
            }
        }
        match *self.failure.lock().unwrap() {
            SendFailure::None => Ok(()),
            SendFailure::Transient => Err(WirdError::Transient("stubbed network error".to_owned())),
            SendFailure::Unreachable => {
                Err(WirdError::Unreachable("stubbed kicked bot".to_owned()))
            }
        }
    }
}

impl Default for RecordingMessenger {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Messenger for RecordingMessenger {
    async fn send_text(&self, chat_id: &str, text: &str) -> Result<()> {
        self.check_failure(chat_id)?;
        self.texts
            .lock()
            .unwrap()
            .push((chat_id.to_owned(), text.to_owned()));
        Ok(())
    }

    async fn send_page_pair(&self, chat_id: &str, pair: &MediaPair) -> Result<()> {
        self.check_failure(chat_id)?;
        self.pairs
            .lock()
            .unwrap()
            .push((chat_id.to_owned(), pair.clone()));
        Ok(())
    }

    async fn is_administrator(&self, _chat_id: &str, _user_id: &str) -> Result<bool> {
        Ok(*self.admin.lock().unwrap())
    }
}

/// In-memory [`ContentInfoProvider`] with canned answers; `None` fails.
pub struct StubContent {
    pub info: Option<PageInfo>,
    pub ayah: Option<String>,
}

impl StubContent {
    pub fn working() -> Self {
        Self {
            info: Some(PageInfo {
                surah_name: "سُورَةُ الكَهۡفِ".to_owned(),
                juz: Some(15),
            }),
            ayah: Some("إِنَّ مَعَ الْعُسْرِ يُسْرًا".to_owned()),
        }
    }

    pub fn failing() -> Self {
        Self {
            info: None,
            ayah: None,
        }
    }
}

#[async_trait]
impl ContentInfoProvider for StubContent {
    async fn page_info(&self, _page: u16) -> Result<PageInfo> {
        self.info
            .clone()
            .ok_or_else(|| WirdError::Content("stubbed lookup failure".to_owned()))
    }

    async fn random_ayah(&self) -> Result<String> {
        self.ayah
            .clone()
            .ok_or_else(|| WirdError::Content("stubbed lookup failure".to_owned()))
    }
}
