use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
};

use tokio::sync::broadcast;

use crate::models::delivery::Envelope;

const CHANNEL_CAPACITY: usize = 1000;

/// 試合から外部への配信口。呼び出し側をブロックしてはならない
pub trait Delivery: Send + Sync {
    fn deliver(&self, room_id: &str, envelope: Envelope);

    /// 試合の破棄時に呼ばれる
    fn close(&self, _room_id: &str) {}
}

/// ルームごとのbroadcastチャネルで配信する。宛先の絞り込みは購読側で行う
#[derive(Default)]
pub struct BroadcastDelivery {
    channels: Mutex<HashMap<String, broadcast::Sender<Arc<Envelope>>>>,
}

impl BroadcastDelivery {
    pub fn new() -> Self {
        Self::default()
    }

    fn get_or_create_room_channel(&self, room_id: &str) -> broadcast::Sender<Arc<Envelope>> {
        let mut channels = self.channels.lock().unwrap_or_else(|e| e.into_inner());
        channels
            .entry(room_id.to_string())
            .or_insert_with(|| broadcast::channel(CHANNEL_CAPACITY).0)
            .clone()
    }

    pub fn subscribe(&self, room_id: &str) -> broadcast::Receiver<Arc<Envelope>> {
        self.get_or_create_room_channel(room_id).subscribe()
    }
}

impl Delivery for BroadcastDelivery {
    fn deliver(&self, room_id: &str, envelope: Envelope) {
        let tx = self.get_or_create_room_channel(room_id);
        // 購読者がいない場合は破棄
        if tx.send(Arc::new(envelope)).is_err() {
            log::trace!("room {}: no subscribers, envelope dropped", room_id);
        }
    }

    fn close(&self, room_id: &str) {
        let mut channels = self.channels.lock().unwrap_or_else(|e| e.into_inner());
        channels.remove(room_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{delivery::Payload, player::PublicPlayer};

    #[tokio::test]
    async fn test_subscriber_receives_envelopes() {
        let delivery = BroadcastDelivery::new();
        let mut rx = delivery.subscribe("room");

        delivery.deliver("room", Envelope::everyone(Payload::Players(vec![])));
        delivery.deliver(
            "other",
            Envelope::everyone(Payload::Players(vec![PublicPlayer {
                id: "1".to_string(),
                name: "A".to_string(),
                is_alive: true,
            }])),
        );

        let envelope = rx.recv().await.unwrap();
        assert!(matches!(&envelope.payload, Payload::Players(p) if p.is_empty()));
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_close_drops_channel() {
        let delivery = BroadcastDelivery::new();
        let mut rx = delivery.subscribe("room");
        delivery.close("room");
        assert!(rx.recv().await.is_err());
    }
}
