use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChatLog {
    pub room_id: String,
    pub messages: Vec<ChatMessage>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub message_id: String,
    pub player_id: String,
    pub player_name: String,
    pub content: String,
    pub timestamp: DateTime<Utc>,
    pub message_type: ChatMessageType,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ChatMessageType {
    Public,    // 全体チャット
    Faction,   // マフィアチャット（夜）
    Narrative, // システムによる進行アナウンス
}

impl ChatLog {
    pub fn new(room_id: String) -> Self {
        ChatLog {
            room_id,
            messages: Vec::new(),
        }
    }

    pub fn add_message(&mut self, message: ChatMessage) {
        self.messages.push(message);
    }

    pub fn add_narrative_message(&mut self, content: String) -> ChatMessage {
        let narrative = ChatMessage::new(
            "system".to_string(),
            "System".to_string(),
            content,
            ChatMessageType::Narrative,
        );
        self.add_message(narrative.clone());
        narrative
    }

    pub fn get_messages_by_type(&self, message_type: ChatMessageType) -> Vec<&ChatMessage> {
        self.messages
            .iter()
            .filter(|m| m.message_type == message_type)
            .collect()
    }
}

impl ChatMessage {
    pub fn new(
        player_id: String,
        player_name: String,
        content: String,
        message_type: ChatMessageType,
    ) -> Self {
        ChatMessage {
            message_id: uuid::Uuid::new_v4().to_string(),
            player_id,
            player_name,
            content,
            timestamp: Utc::now(),
            message_type,
        }
    }
}
