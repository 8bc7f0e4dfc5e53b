//! Administrative command surface.
//!
//! Commands arrive as chat messages, mutate destination configuration
//! through the state store, and get a synchronous reply. Everything except
//! `/start` is gated on the sender being an administrator of the chat.

use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::info;

use crate::error::Result;
use crate::progression::{KHATMA_PARTS, MUSHAF_PAGES};
use crate::store::{Destination, StateStore};
use crate::telegram::Messenger;
use crate::trigger::TimeOfDay;

const WELCOME_TEXT: &str =
    "👋 أهلاً بك! سأقوم بإرسال صفحتين من القرآن وتذكير بالختمة يومياً.\n\
     استخدم /set_page_time و /set_reminder_time لاختيار الأوقات.";

const ADMIN_ONLY_TEXT: &str = "⛔ هذا الأمر متاح لمشرفي المجموعة فقط.";

const NOT_REGISTERED_TEXT: &str = "أرسل /start أولاً لتفعيل البوت في هذه المحادثة.";

/// A recognised bot command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Start,
    SetPageTimes(BTreeSet<TimeOfDay>),
    SetReminderTimes(BTreeSet<TimeOfDay>),
    SetPage(u16),
    SetPart(u8),
    SetPagesActive(bool),
    SetReminderActive(bool),
    Status,
}

impl Command {
    /// Parse a message text.
    ///
    /// `None` when the text is not a command we know (plain chatter and
    /// other bots' commands are ignored); `Some(Err(usage))` when a known
    /// command carries bad arguments. Arguments are rejected, never
    /// silently clamped.
    pub fn parse(text: &str) -> Option<std::result::Result<Self, String>> {
        let mut words = text.split_whitespace();
        let head = words.next()?;
        if !head.starts_with('/') {
            return None;
        }
        // Group chats address commands as `/cmd@BotName`.
        let name = head.split('@').next().unwrap_or(head);
        let args: Vec<&str> = words.collect();

        let parsed = match name {
            "/start" => Ok(Self::Start),
            "/status" => Ok(Self::Status),
            "/set_page_time" => parse_times(&args).map(Self::SetPageTimes).map_err(|()| {
                "⏰ اختر وقتاً واحداً أو أكثر، مثال:\n/set_page_time 05:00 18:30".to_owned()
            }),
            "/set_reminder_time" => {
                parse_times(&args).map(Self::SetReminderTimes).map_err(|()| {
                    "⏰ اختر وقتاً واحداً أو أكثر، مثال:\n/set_reminder_time 14:00".to_owned()
                })
            }
            "/set_page" => parse_number(&args, 1, u32::from(MUSHAF_PAGES))
                .map(|n| Self::SetPage(n as u16))
                .map_err(|()| format!("📖 اختر صفحة بين 1 و {MUSHAF_PAGES}، مثال:\n/set_page 101")),
            "/set_part" => parse_number(&args, 1, u32::from(KHATMA_PARTS))
                .map(|n| Self::SetPart(n as u8))
                .map_err(|()| format!("📘 اختر جزءاً بين 1 و {KHATMA_PARTS}، مثال:\n/set_part 5")),
            "/pages" => parse_switch(&args)
                .map(Self::SetPagesActive)
                .map_err(|()| "الاستعمال: /pages on أو /pages off".to_owned()),
            "/reminder" => parse_switch(&args)
                .map(Self::SetReminderActive)
                .map_err(|()| "الاستعمال: /reminder on أو /reminder off".to_owned()),
            _ => return None,
        };
        Some(parsed)
    }
}

fn parse_times(args: &[&str]) -> std::result::Result<BTreeSet<TimeOfDay>, ()> {
    if args.is_empty() {
        return Err(());
    }
    args.iter().map(|a| a.parse().map_err(|_| ())).collect()
}

fn parse_number(args: &[&str], min: u32, max: u32) -> std::result::Result<u32, ()> {
    let [arg] = args else { return Err(()) };
    let n: u32 = arg.parse().map_err(|_| ())?;
    if (min..=max).contains(&n) {
        Ok(n)
    } else {
        Err(())
    }
}

fn parse_switch(args: &[&str]) -> std::result::Result<bool, ()> {
    match args {
        ["on"] => Ok(true),
        ["off"] => Ok(false),
        _ => Err(()),
    }
}

/// Handle one inbound message. Unrecognised texts are ignored.
pub async fn handle(
    store: &Arc<StateStore>,
    messenger: &dyn Messenger,
    chat_id: &str,
    sender_id: &str,
    text: &str,
) -> Result<()> {
    let Some(parsed) = Command::parse(text) else {
        return Ok(());
    };

    let command = match parsed {
        Ok(command) => command,
        Err(usage) => return messenger.send_text(chat_id, &usage).await,
    };

    if let Command::Start = command {
        let created = store.register(chat_id)?;
        info!("chat {chat_id} registered (new: {created})");
        return messenger.send_text(chat_id, WELCOME_TEXT).await;
    }

    if !messenger.is_administrator(chat_id, sender_id).await? {
        return messenger.send_text(chat_id, ADMIN_ONLY_TEXT).await;
    }

    let reply = match command {
        Command::Start => unreachable!("handled above"),
        Command::SetPageTimes(times) => {
            let summary = format_times(&times);
            apply(store, chat_id, move |d| d.page_times = times)?
                .map(|()| format!("✅ تم تعيين أوقات إرسال الصفحات: {summary}"))
        }
        Command::SetReminderTimes(times) => {
            let summary = format_times(&times);
            apply(store, chat_id, move |d| d.reminder_times = times)?
                .map(|()| format!("✅ تم تعيين أوقات التذكير: {summary}"))
        }
        Command::SetPage(page) => apply(store, chat_id, move |d| {
            d.page_cursor = page;
            d.last_pages_marker = None;
        })?
        .map(|()| format!("✅ سنبدأ من الصفحة {page}")),
        Command::SetPart(part) => apply(store, chat_id, move |d| {
            d.part_cursor = part;
            d.last_reminder_marker = None;
        })?
        .map(|()| format!("✅ سنبدأ من الجزء {part}")),
        Command::SetPagesActive(active) => {
            apply(store, chat_id, move |d| d.pages_active = active)?.map(|()| {
                if active {
                    "✅ تم تفعيل إرسال الصفحات".to_owned()
                } else {
                    "⏸ تم إيقاف إرسال الصفحات".to_owned()
                }
            })
        }
        Command::SetReminderActive(active) => {
            apply(store, chat_id, move |d| d.reminder_active = active)?.map(|()| {
                if active {
                    "✅ تم تفعيل تذكير الختمة".to_owned()
                } else {
                    "⏸ تم إيقاف تذكير الختمة".to_owned()
                }
            })
        }
        Command::Status => store.get(chat_id).map(|d| status_text(&d)),
    };

    let reply = reply.unwrap_or_else(|| NOT_REGISTERED_TEXT.to_owned());
    messenger.send_text(chat_id, &reply).await
}

/// Run a mutation against a registered chat. `None` when unregistered.
fn apply<F>(store: &Arc<StateStore>, chat_id: &str, mutate: F) -> Result<Option<()>>
where
    F: FnOnce(&mut Destination),
{
    Ok(store.upsert(chat_id, mutate)?.then_some(()))
}

fn format_times(times: &BTreeSet<TimeOfDay>) -> String {
    times
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("، ")
}

fn status_text(destination: &Destination) -> String {
    let switch = |active: bool| if active { "مفعل" } else { "موقف" };
    format!(
        "📊 حالة المحادثة\n\
         📖 الصفحة التالية: {} من {MUSHAF_PAGES} ({}, الأوقات: {})\n\
         📘 الجزء التالي: {} من {KHATMA_PARTS} ({}, الأوقات: {})\n\
         🏁 ختمات مكتملة: {}",
        destination.page_cursor,
        switch(destination.pages_active),
        format_times(&destination.page_times),
        destination.part_cursor,
        switch(destination.reminder_active),
        format_times(&destination.reminder_times),
        destination.completed_khatmas,
    )
}
