use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[repr(i16)]
pub enum MessageType {
    Text = 1,
    Attachment = 2,
}

impl MessageType {
    #[must_use]
    pub const fn code(self) -> i16 {
        self as i16
    }
}

impl TryFrom<i16> for MessageType {
    type Error = ();

    fn try_from(value: i16) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(Self::Text),
            2 => Ok(Self::Attachment),
            _ => Err(()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AttachmentMeta {
    pub url: String,
    #[serde(rename = "mimeType")]
    pub mime_type: String,
    #[serde(rename = "originalName")]
    pub original_name: String,
    #[serde(rename = "sizeBytes")]
    pub size_bytes: i64,
}

#[derive(Debug, Clone)]
pub struct Message {
    pub id: Uuid,
    pub conversation_id: Uuid,
    pub sender_id: Uuid,
    pub content: String,
    pub message_type: MessageType,
    pub attachment: Option<AttachmentMeta>,
    pub read_by: Vec<Uuid>,
    pub created_at: OffsetDateTime,
}

impl Message {
    #[must_use]
    pub fn is_read_by(&self, user_id: Uuid) -> bool {
        self.read_by.contains(&user_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn message_type_codes_round_trip() {
        assert_eq!(MessageType::try_from(MessageType::Text.code()), Ok(MessageType::Text));
        assert_eq!(MessageType::try_from(MessageType::Attachment.code()), Ok(MessageType::Attachment));
        assert_eq!(MessageType::try_from(0), Err(()));
    }
}
