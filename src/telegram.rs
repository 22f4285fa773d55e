use crate::{config::AppConfig, record::GameImage, search::is_relayed};
use anyhow::{bail, Result};
use serde::{de::DeserializeOwned, Deserialize};
use serde_json::{json, Value};
use std::{io::Read, time::Duration};
use thiserror::Error;

const TELEGRAM_API: &str = "https://api.telegram.org";
const USER_AGENT: &str = "galpost";
const PARSE_MODE: &str = "MarkdownV2";

#[derive(Debug, Error)]
pub enum DeliveryError {
    #[error("an announcement needs at least one image")]
    NoImages,
    #[error("request failed: {0}")]
    Transport(String),
    #[error("telegram error {code}: {description}")]
    Api { code: i64, description: String },
    #[error("image {url} unavailable: {reason}")]
    Image { url: String, reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentMessage {
    pub message_id: i64,
    pub date: i64,
    pub chat_username: Option<String>,
}

impl SentMessage {
    pub fn link(&self) -> Option<String> {
        self.chat_username
            .as_deref()
            .filter(|name| !name.is_empty())
            .map(|name| format!("https://t.me/{name}/{}", self.message_id))
    }
}

pub trait Messenger {
    /// Sends the images with `caption` on the first one. Returns the sent
    /// messages in order.
    fn send_media(&self, images: &[GameImage], caption: &str) -> Result<Vec<SentMessage>, DeliveryError>;
    fn delete_message(&self, message_id: i64) -> Result<(), DeliveryError>;
    fn edit_caption(&self, message_id: i64, caption: &str) -> Result<(), DeliveryError>;
}

#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    #[serde(default)]
    ok: bool,
    #[serde(default)]
    error_code: Option<i64>,
    #[serde(default)]
    description: Option<String>,
    result: Option<T>,
}

impl<T> ApiResponse<T> {
    fn into_result(self) -> Result<T, DeliveryError> {
        if !self.ok {
            return Err(DeliveryError::Api {
                code: self.error_code.unwrap_or_default(),
                description: self.description.unwrap_or_default(),
            });
        }
        self.result
            .ok_or_else(|| DeliveryError::Transport("response carried no result".to_string()))
    }
}

#[derive(Debug, Deserialize)]
struct Message {
    message_id: i64,
    #[serde(default)]
    date: i64,
    #[serde(default)]
    chat: Chat,
}

#[derive(Debug, Default, Deserialize)]
struct Chat {
    #[serde(default)]
    username: Option<String>,
}

impl From<Message> for SentMessage {
    fn from(message: Message) -> Self {
        SentMessage {
            message_id: message.message_id,
            date: message.date,
            chat_username: message.chat.username,
        }
    }
}

pub struct TelegramClient {
    agent: ureq::Agent,
    endpoint: String,
    chat_id: String,
    api_url: String,
}

impl TelegramClient {
    pub fn new(config: &AppConfig) -> Result<Self> {
        if !config.has_messenger() {
            bail!("bot-token and chat-id must be configured first");
        }
        let agent = ureq::AgentBuilder::new()
            .timeout_connect(Duration::from_secs(5))
            .timeout_read(Duration::from_secs(60))
            .timeout_write(Duration::from_secs(60))
            .build();
        Ok(Self {
            agent,
            endpoint: format!("{TELEGRAM_API}/bot{}", config.bot_token),
            chat_id: config.chat_id.clone(),
            api_url: config.api_url.clone(),
        })
    }

    fn call_json<T: DeserializeOwned>(&self, method: &str, body: Value) -> Result<T, DeliveryError> {
        log::debug!("telegram {method}");
        let response = self
            .agent
            .post(&format!("{}/{method}", self.endpoint))
            .set("User-Agent", USER_AGENT)
            .send_json(body);
        read_response(response)
    }

    fn call_multipart<T: DeserializeOwned>(&self, method: &str, form: Multipart) -> Result<T, DeliveryError> {
        log::debug!("telegram {method} (multipart)");
        let (content_type, body) = form.finish();
        let response = self
            .agent
            .post(&format!("{}/{method}", self.endpoint))
            .set("User-Agent", USER_AGENT)
            .set("Content-Type", &content_type)
            .send_bytes(&body);
        read_response(response)
    }

    /// Bytes to upload for `image`, or `None` when Telegram can fetch the URL itself.
    fn upload_bytes(&self, image: &GameImage) -> Result<Option<Vec<u8>>, DeliveryError> {
        if let Some(bytes) = &image.bytes {
            return Ok(Some(bytes.clone()));
        }
        if !is_relayed(&self.api_url, &image.url) {
            return Ok(None);
        }
        let image_error = |reason: String| DeliveryError::Image {
            url: image.url.clone(),
            reason,
        };
        let response = self
            .agent
            .get(&image.url)
            .set("User-Agent", USER_AGENT)
            .call()
            .map_err(|err| image_error(err.to_string()))?;
        let mut bytes = Vec::new();
        response
            .into_reader()
            .read_to_end(&mut bytes)
            .map_err(|err| image_error(err.to_string()))?;
        Ok(Some(bytes))
    }
}

impl Messenger for TelegramClient {
    fn send_media(&self, images: &[GameImage], caption: &str) -> Result<Vec<SentMessage>, DeliveryError> {
        let uploads = images
            .iter()
            .map(|image| self.upload_bytes(image))
            .collect::<Result<Vec<_>, _>>()?;

        match (images, uploads.as_slice()) {
            ([], _) => Err(DeliveryError::NoImages),
            ([image], [Some(bytes)]) => {
                let mut form = Multipart::new(caption, images);
                form.text("chat_id", &self.chat_id);
                form.file("photo", "image0", bytes);
                form.text("caption", caption);
                form.text("parse_mode", PARSE_MODE);
                form.text("has_spoiler", if image.has_spoiler { "true" } else { "false" });
                let message: Message = self.call_multipart("sendPhoto", form)?;
                Ok(vec![message.into()])
            }
            ([image], _) => {
                let body = json!({
                    "chat_id": self.chat_id,
                    "photo": image.url,
                    "caption": caption,
                    "parse_mode": PARSE_MODE,
                    "has_spoiler": image.has_spoiler,
                });
                let message: Message = self.call_json("sendPhoto", body)?;
                Ok(vec![message.into()])
            }
            _ => {
                let attached: Vec<bool> = uploads.iter().map(Option::is_some).collect();
                let media = media_items(images, &attached, caption);
                let messages: Vec<Message> = if attached.contains(&true) {
                    let mut form = Multipart::new(caption, images);
                    form.text("chat_id", &self.chat_id);
                    form.text("media", &Value::Array(media).to_string());
                    for (index, bytes) in uploads.iter().enumerate() {
                        if let Some(bytes) = bytes {
                            form.file(&format!("image{index}"), &format!("image{index}"), bytes);
                        }
                    }
                    self.call_multipart("sendMediaGroup", form)?
                } else {
                    self.call_json(
                        "sendMediaGroup",
                        json!({ "chat_id": self.chat_id, "media": media }),
                    )?
                };
                Ok(messages.into_iter().map(SentMessage::from).collect())
            }
        }
    }

    fn delete_message(&self, message_id: i64) -> Result<(), DeliveryError> {
        let _: bool = self.call_json(
            "deleteMessage",
            json!({ "chat_id": self.chat_id, "message_id": message_id }),
        )?;
        Ok(())
    }

    fn edit_caption(&self, message_id: i64, caption: &str) -> Result<(), DeliveryError> {
        let _: Value = self.call_json(
            "editMessageCaption",
            json!({
                "chat_id": self.chat_id,
                "message_id": message_id,
                "caption": caption,
                "parse_mode": PARSE_MODE,
            }),
        )?;
        Ok(())
    }
}

fn read_response<T: DeserializeOwned>(
    response: std::result::Result<ureq::Response, ureq::Error>,
) -> Result<T, DeliveryError> {
    // Telegram reports API errors as 4xx with a JSON body.
    let response = match response {
        Ok(response) => response,
        Err(ureq::Error::Status(_, response)) => response,
        Err(err) => return Err(DeliveryError::Transport(err.to_string())),
    };
    let body: ApiResponse<T> = response
        .into_json()
        .map_err(|err| DeliveryError::Transport(err.to_string()))?;
    body.into_result()
}

fn media_items(images: &[GameImage], attached: &[bool], caption: &str) -> Vec<Value> {
    images
        .iter()
        .enumerate()
        .map(|(index, image)| {
            let media = if attached.get(index).copied().unwrap_or(false) {
                format!("attach://image{index}")
            } else {
                image.url.clone()
            };
            let mut item = json!({
                "type": "photo",
                "media": media,
                "has_spoiler": image.has_spoiler,
            });
            if index == 0 {
                item["caption"] = Value::from(caption);
                item["parse_mode"] = Value::from(PARSE_MODE);
            }
            item
        })
        .collect()
}

struct Multipart {
    boundary: String,
    body: Vec<u8>,
}

impl Multipart {
    fn new(caption: &str, images: &[GameImage]) -> Self {
        let mut hasher = blake3::Hasher::new();
        hasher.update(caption.as_bytes());
        for image in images {
            hasher.update(image.url.as_bytes());
            if let Some(bytes) = &image.bytes {
                hasher.update(bytes);
            }
        }
        let hex = hasher.finalize().to_hex();
        Self {
            boundary: format!("galpost-{}", &hex[..32]),
            body: Vec::new(),
        }
    }

    fn text(&mut self, name: &str, value: &str) {
        self.part_header(name, None);
        self.body.extend_from_slice(value.as_bytes());
        self.body.extend_from_slice(b"\r\n");
    }

    fn file(&mut self, name: &str, filename: &str, bytes: &[u8]) {
        self.part_header(name, Some(filename));
        self.body.extend_from_slice(bytes);
        self.body.extend_from_slice(b"\r\n");
    }

    fn part_header(&mut self, name: &str, filename: Option<&str>) {
        let mut header = format!("--{}\r\nContent-Disposition: form-data; name=\"{name}\"", self.boundary);
        if let Some(filename) = filename {
            header.push_str(&format!(
                "; filename=\"{filename}\"\r\nContent-Type: application/octet-stream"
            ));
        }
        header.push_str("\r\n\r\n");
        self.body.extend_from_slice(header.as_bytes());
    }

    fn finish(mut self) -> (String, Vec<u8>) {
        self.body
            .extend_from_slice(format!("--{}--\r\n", self.boundary).as_bytes());
        (
            format!("multipart/form-data; boundary={}", self.boundary),
            self.body,
        )
    }
}
