use crate::{
    compose::{ComposeLimits, MessageComposer},
    history::{DeliveryHistory, DeliveryRecord, SendReceipt},
    record::{GameImage, GameRecord},
    tags::TagSets,
    telegram::{DeliveryError, Messenger, SentMessage},
};
use time::{macros::format_description, OffsetDateTime};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryOutcome {
    Sent {
        message_ids: Vec<i64>,
        message_link: Option<String>,
    },
    Edited { message_ids: Vec<i64> },
    Replaced {
        previous_ids: Vec<i64>,
        message_ids: Vec<i64>,
        message_link: Option<String>,
    },
}

impl DeliveryOutcome {
    #[cfg(test)]
    pub fn message_ids(&self) -> &[i64] {
        match self {
            DeliveryOutcome::Sent { message_ids, .. }
            | DeliveryOutcome::Edited { message_ids }
            | DeliveryOutcome::Replaced { message_ids, .. } => message_ids,
        }
    }
}

/// Composes, sends and records announcements. History only changes after
/// every remote call of a delivery succeeded.
pub struct Publisher {
    messenger: Box<dyn Messenger>,
    composer: MessageComposer,
}

impl Publisher {
    pub fn new(messenger: Box<dyn Messenger>, limits: ComposeLimits) -> Self {
        Self {
            messenger,
            composer: MessageComposer::new(limits),
        }
    }

    pub fn deliver(
        &self,
        history: &mut DeliveryHistory,
        record: &GameRecord,
        available: &TagSets,
        existing: Option<&[i64]>,
    ) -> Result<DeliveryOutcome, DeliveryError> {
        let caption = self.composer.compose(record);
        let Some(ids) = existing.filter(|ids| !ids.is_empty()) else {
            return self.send_new(history, record, available, &caption);
        };

        let unchanged = record.images.is_empty()
            || history
                .find(ids)
                .is_some_and(|entry| same_images(&entry.record.images, &record.images));
        if unchanged {
            // The caption lives on the first message of a media group.
            let first = ids.iter().copied().min().unwrap_or_default();
            self.messenger.edit_caption(first, &caption)?;
            if history.update(ids, record.clone(), available.clone()).is_none() {
                log::debug!("edited {ids:?} without a history entry");
            }
            log::info!("edited announcement {ids:?}");
            return Ok(DeliveryOutcome::Edited {
                message_ids: ids.to_vec(),
            });
        }

        for id in ids {
            self.messenger.delete_message(*id)?;
        }
        let sent = self.messenger.send_media(&record.images, &caption)?;
        let receipt = receipt(&sent);
        let message_ids = receipt.message_ids.clone();
        let message_link = receipt.message_link.clone();
        history.delete(ids);
        history.add(record.clone(), available.clone(), receipt);
        log::info!("replaced announcement {ids:?} with {message_ids:?}");
        Ok(DeliveryOutcome::Replaced {
            previous_ids: ids.to_vec(),
            message_ids,
            message_link,
        })
    }

    pub fn delete(
        &self,
        history: &mut DeliveryHistory,
        ids: &[i64],
    ) -> Result<Option<DeliveryRecord>, DeliveryError> {
        for id in ids {
            self.messenger.delete_message(*id)?;
        }
        Ok(history.delete(ids))
    }

    fn send_new(
        &self,
        history: &mut DeliveryHistory,
        record: &GameRecord,
        available: &TagSets,
        caption: &str,
    ) -> Result<DeliveryOutcome, DeliveryError> {
        if record.images.is_empty() {
            return Err(DeliveryError::NoImages);
        }
        let sent = self.messenger.send_media(&record.images, caption)?;
        let receipt = receipt(&sent);
        let message_ids = receipt.message_ids.clone();
        let message_link = receipt.message_link.clone();
        history.add(record.clone(), available.clone(), receipt);
        log::info!("sent {} as {message_ids:?}", record.display_name());
        Ok(DeliveryOutcome::Sent {
            message_ids,
            message_link,
        })
    }
}

fn receipt(sent: &[SentMessage]) -> SendReceipt {
    let first = sent.first();
    SendReceipt {
        message_ids: sent.iter().map(|message| message.message_id).collect(),
        sent_at: format_timestamp(first.map(|message| message.date)),
        message_link: first.and_then(SentMessage::link),
    }
}

/// `YYYY-MM-DD HH:MM` in UTC; falls back to now for missing dates.
pub fn format_timestamp(unix: Option<i64>) -> String {
    let moment = unix
        .filter(|seconds| *seconds > 0)
        .and_then(|seconds| OffsetDateTime::from_unix_timestamp(seconds).ok())
        .unwrap_or_else(OffsetDateTime::now_utc);
    moment
        .format(format_description!("[year]-[month]-[day] [hour]:[minute]"))
        .unwrap_or_default()
}

fn same_images(previous: &[GameImage], next: &[GameImage]) -> bool {
    previous.len() == next.len()
        && previous.iter().zip(next).all(|(old, new)| {
            !new.is_upload() && old.url == new.url && old.has_spoiler == new.has_spoiler
        })
}
