use std::collections::{HashMap, HashSet};

use tokio::sync::Mutex;
use tracing::{debug, info};

use runeward_game::objects::Guid;
use runeward_protocol::world::{
    channel_notify_member, channel_notify_plain, channel_notify_you, server_chat_message,
    ChannelNotifyType, ChatMessageType, ClientChatMessage, OpCode,
};

/// Channels with these name prefixes are client-internal and carry a
/// fixed id; everything else is user-defined (id 0).
const INTERNAL_NAME_PREFIXES: [(&str, u32); 3] =
    [("General - ", 1), ("Trade - ", 2), ("LocalDefense - ", 3)];

#[derive(Debug)]
pub struct Channel {
    pub name: String,
    pub password: String,
    pub internal_id: u32,
    members: HashSet<Guid>,
}

impl Channel {
    fn new(name: &str, password: &str) -> Self {
        Self {
            name: name.to_string(),
            password: password.to_string(),
            internal_id: internal_channel_id(name),
            members: HashSet::new(),
        }
    }
}

fn internal_channel_id(name: &str) -> u32 {
    INTERNAL_NAME_PREFIXES
        .iter()
        .find(|(prefix, _)| name.starts_with(prefix))
        .map(|&(_, id)| id)
        .unwrap_or(0)
}

/// Who a produced packet goes to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Recipients {
    /// Every session in the IN_WORLD state.
    World,
    /// The sessions owning these players, if in world.
    Guids(Vec<Guid>),
}

/// A packet the chat manager wants sent; the world pushes it down the
/// common session send path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outgoing {
    pub recipients: Recipients,
    pub opcode: OpCode,
    pub body: Vec<u8>,
}

/// The named channel set with membership, join/leave notifications and
/// message routing. The channel-set lock is a leaf: nothing else is
/// locked while it is held.
#[derive(Debug, Default)]
pub struct ChatManager {
    channels: Mutex<HashMap<String, Channel>>,
}

impl ChatManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a channel. Returns 1 when the name is already present.
    pub async fn create_channel(&self, name: &str, password: &str) -> u8 {
        let mut channels = self.channels.lock().await;
        if channels.contains_key(name) {
            return 1;
        }
        channels.insert(name.to_string(), Channel::new(name, password));
        0
    }

    /// Join a channel, creating it on first join (adopting `password`).
    /// Returns 0 and the notification packets on success, 1 on a wrong
    /// password (collecting the channel again if it is still empty).
    pub async fn join_channel(
        &self,
        player_guid: Guid,
        player_name: &str,
        name: &str,
        password: &str,
    ) -> (u8, Vec<Outgoing>) {
        let mut channels = self.channels.lock().await;
        if !channels.contains_key(name) {
            channels.insert(name.to_string(), Channel::new(name, password));
        }

        let rejected = channels
            .get(name)
            .map(|channel| (channel.password != password, channel.members.is_empty()));
        if let Some((true, empty)) = rejected {
            if empty {
                channels.remove(name);
            }
            return (
                1,
                vec![Outgoing {
                    recipients: Recipients::Guids(vec![player_guid]),
                    opcode: OpCode::SmsgChannelNotify,
                    body: channel_notify_plain(ChannelNotifyType::WrongPassword, name),
                }],
            );
        }

        let channel = match channels.get_mut(name) {
            Some(channel) => channel,
            None => return (1, Vec::new()),
        };

        info!("{player_name} joins channel '{name}'");
        channel.members.insert(player_guid);

        // The joiner is removed from the JOINED recipient set; they get
        // their own YOU_JOINED confirmation instead.
        let mut others: Vec<Guid> = channel.members.iter().copied().collect();
        others.retain(|&guid| guid != player_guid);

        let packets = vec![
            Outgoing {
                recipients: Recipients::Guids(others),
                opcode: OpCode::SmsgChannelNotify,
                body: channel_notify_member(ChannelNotifyType::Joined, name, player_guid),
            },
            Outgoing {
                recipients: Recipients::Guids(vec![player_guid]),
                opcode: OpCode::SmsgChannelNotify,
                body: channel_notify_you(ChannelNotifyType::YouJoined, name, channel.internal_id),
            },
        ];
        (0, packets)
    }

    /// Leave a channel. Returns 0 on success, 1 when the player was not a
    /// member, 2 when the channel does not exist.
    pub async fn leave_channel(
        &self,
        player_guid: Guid,
        player_name: &str,
        name: &str,
    ) -> (u8, Vec<Outgoing>) {
        let mut channels = self.channels.lock().await;
        let channel = match channels.get_mut(name) {
            Some(channel) => channel,
            None => return (2, Vec::new()),
        };

        if !channel.members.remove(&player_guid) {
            return (1, Vec::new());
        }
        info!("{player_name} leaves channel '{name}'");

        // Unlike the join path the leaver is not explicitly removed from
        // the recipient set; membership removal above already took them
        // out of it.
        let members: Vec<Guid> = channel.members.iter().copied().collect();
        let internal_id = channel.internal_id;

        let packets = vec![
            Outgoing {
                recipients: Recipients::Guids(members),
                opcode: OpCode::SmsgChannelNotify,
                body: channel_notify_member(ChannelNotifyType::Left, name, player_guid),
            },
            Outgoing {
                recipients: Recipients::Guids(vec![player_guid]),
                opcode: OpCode::SmsgChannelNotify,
                body: channel_notify_you(ChannelNotifyType::YouLeft, name, internal_id),
            },
        ];
        (0, packets)
    }

    /// Route a chat message from `sender`. Returns:
    /// 0 success, 1 not on the channel, 2 no such channel,
    /// 3 unhandled message type.
    pub async fn receive_message(
        &self,
        sender: Guid,
        message: &ClientChatMessage,
    ) -> (u8, Vec<Outgoing>) {
        match message.message_type {
            ChatMessageType::Channel => {
                let channel_name = match &message.channel_name {
                    Some(name) => name,
                    None => return (2, Vec::new()),
                };
                let channels = self.channels.lock().await;
                let channel = match channels.get(channel_name) {
                    Some(channel) => channel,
                    None => return (2, Vec::new()),
                };
                if !channel.members.contains(&sender) {
                    return (1, Vec::new());
                }

                let body = server_chat_message(
                    ChatMessageType::Channel,
                    message.language,
                    Some(channel_name),
                    sender,
                    &message.text,
                );
                (
                    0,
                    vec![Outgoing {
                        recipients: Recipients::Guids(
                            channel.members.iter().copied().collect(),
                        ),
                        opcode: OpCode::SmsgMessageChat,
                        body,
                    }],
                )
            }
            ChatMessageType::Say | ChatMessageType::Yell | ChatMessageType::Emote => {
                let body = server_chat_message(
                    message.message_type,
                    message.language,
                    None,
                    sender,
                    &message.text,
                );
                (
                    0,
                    vec![Outgoing {
                        recipients: Recipients::World,
                        opcode: OpCode::SmsgMessageChat,
                        body,
                    }],
                )
            }
            _ => (3, Vec::new()),
        }
    }

    /// Remove all empty channels, or only `name` when given.
    pub async fn clean(&self, name: Option<&str>) {
        let mut channels = self.channels.lock().await;
        match name {
            Some(name) => {
                if channels.get(name).is_some_and(|c| c.members.is_empty()) {
                    debug!("collecting empty channel '{name}'");
                    channels.remove(name);
                }
            }
            None => channels.retain(|name, channel| {
                let keep = !channel.members.is_empty();
                if !keep {
                    debug!("collecting empty channel '{name}'");
                }
                keep
            }),
        }
    }

    /// Remove the player from every channel they are on, as on
    /// disconnect. Returns the notifications for the remaining members.
    pub async fn purge_member(&self, player_guid: Guid) -> Vec<Outgoing> {
        let mut channels = self.channels.lock().await;
        let mut packets = Vec::new();
        for channel in channels.values_mut() {
            if channel.members.remove(&player_guid) {
                packets.push(Outgoing {
                    recipients: Recipients::Guids(channel.members.iter().copied().collect()),
                    opcode: OpCode::SmsgChannelNotify,
                    body: channel_notify_member(
                        ChannelNotifyType::Left,
                        &channel.name,
                        player_guid,
                    ),
                });
            }
        }
        packets
    }

    #[cfg(test)]
    pub(crate) async fn members(&self, name: &str) -> Option<Vec<Guid>> {
        self.channels
            .lock()
            .await
            .get(name)
            .map(|channel| channel.members.iter().copied().collect())
    }

    #[cfg(test)]
    pub(crate) async fn channel_id(&self, name: &str) -> Option<u32> {
        self.channels.lock().await.get(name).map(|c| c.internal_id)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    const A: Guid = Guid(0x0000_0004_0000_0001);
    const B: Guid = Guid(0x0000_0004_0000_0002);

    #[tokio::test]
    async fn first_join_creates_the_channel() {
        let chat = ChatManager::new();

        let (code, packets) = chat.join_channel(A, "Alda", "General - Elwynn", "").await;
        assert_eq!(code, 0);
        assert_eq!(chat.channel_id("General - Elwynn").await, Some(1));
        assert_eq!(chat.members("General - Elwynn").await.unwrap(), vec![A]);

        // JOINED goes to zero other members, YOU_JOINED to the joiner.
        assert_eq!(packets.len(), 2);
        assert_eq!(packets[0].recipients, Recipients::Guids(vec![]));
        assert_eq!(packets[1].recipients, Recipients::Guids(vec![A]));
        assert_eq!(packets[1].body[0], 0x02);

        let (code, packets) = chat.join_channel(B, "Born", "General - Elwynn", "").await;
        assert_eq!(code, 0);
        // A (and only A) hears about B's join.
        assert_eq!(packets[0].recipients, Recipients::Guids(vec![A]));
        assert_eq!(packets[0].body[0], 0x00);
        let guid_offset = packets[0].body.len() - 8;
        assert_eq!(&packets[0].body[guid_offset..], &B.0.to_le_bytes());
    }

    #[tokio::test]
    async fn internal_ids_come_from_the_prefix_map() {
        let chat = ChatManager::new();
        chat.join_channel(A, "Alda", "Trade - City", "").await;
        chat.join_channel(A, "Alda", "LocalDefense - Elwynn", "").await;
        chat.join_channel(A, "Alda", "knitting", "").await;
        assert_eq!(chat.channel_id("Trade - City").await, Some(2));
        assert_eq!(chat.channel_id("LocalDefense - Elwynn").await, Some(3));
        assert_eq!(chat.channel_id("knitting").await, Some(0));
    }

    #[tokio::test]
    async fn wrong_password_is_rejected_and_empty_channel_collected() {
        let chat = ChatManager::new();
        assert_eq!(chat.create_channel("secret", "x").await, 0);
        assert_eq!(chat.create_channel("secret", "y").await, 1);

        // Nobody inside yet: the failed join collects the channel.
        let (code, packets) = chat.join_channel(A, "Alda", "secret", "y").await;
        assert_eq!(code, 1);
        assert_eq!(packets.len(), 1);
        assert_eq!(packets[0].body[0], 0x04);
        assert!(chat.members("secret").await.is_none());

        // Recreate with a member; a failed join must retain it.
        chat.join_channel(A, "Alda", "secret", "x").await;
        let (code, _) = chat.join_channel(B, "Born", "secret", "y").await;
        assert_eq!(code, 1);
        assert_eq!(chat.members("secret").await.unwrap(), vec![A]);
    }

    #[tokio::test]
    async fn leave_codes_and_notifications() {
        let chat = ChatManager::new();
        assert_eq!(chat.leave_channel(A, "Alda", "nowhere").await.0, 2);

        chat.join_channel(A, "Alda", "secret", "").await;
        assert_eq!(chat.leave_channel(B, "Born", "secret").await.0, 1);

        chat.join_channel(B, "Born", "secret", "").await;
        let (code, packets) = chat.leave_channel(A, "Alda", "secret").await;
        assert_eq!(code, 0);
        assert_eq!(packets[0].recipients, Recipients::Guids(vec![B]));
        assert_eq!(packets[0].body[0], 0x01);
        assert_eq!(chat.members("secret").await.unwrap(), vec![B]);
    }

    #[tokio::test]
    async fn channel_messages_require_membership() {
        let chat = ChatManager::new();
        chat.join_channel(A, "Alda", "secret", "").await;

        let message = ClientChatMessage {
            message_type: ChatMessageType::Channel,
            language: 7,
            channel_name: Some("secret".to_string()),
            text: "psst".to_string(),
        };

        let (code, packets) = chat.receive_message(A, &message).await;
        assert_eq!(code, 0);
        assert_eq!(packets[0].recipients, Recipients::Guids(vec![A]));

        let (code, packets) = chat.receive_message(B, &message).await;
        assert_eq!(code, 1);
        assert!(packets.is_empty());

        let missing = ClientChatMessage {
            channel_name: Some("nowhere".to_string()),
            ..message
        };
        assert_eq!(chat.receive_message(A, &missing).await.0, 2);
    }

    #[tokio::test]
    async fn say_broadcasts_to_the_world() {
        let chat = ChatManager::new();
        let message = ClientChatMessage {
            message_type: ChatMessageType::Say,
            language: 7,
            channel_name: None,
            text: "hello".to_string(),
        };
        let (code, packets) = chat.receive_message(A, &message).await;
        assert_eq!(code, 0);
        assert_eq!(packets[0].recipients, Recipients::World);

        let whisper = ClientChatMessage {
            message_type: ChatMessageType::Whisper,
            ..message
        };
        assert_eq!(chat.receive_message(A, &whisper).await.0, 3);
    }

    #[tokio::test]
    async fn clean_removes_only_empty_channels() {
        let chat = ChatManager::new();
        chat.create_channel("empty", "").await;
        chat.join_channel(A, "Alda", "busy", "").await;

        chat.clean(None).await;
        assert!(chat.members("empty").await.is_none());
        assert!(chat.members("busy").await.is_some());
    }

    #[tokio::test]
    async fn purge_member_leaves_everything() {
        let chat = ChatManager::new();
        chat.join_channel(A, "Alda", "one", "").await;
        chat.join_channel(A, "Alda", "two", "").await;
        chat.join_channel(B, "Born", "two", "").await;

        let packets = chat.purge_member(A).await;
        assert_eq!(packets.len(), 2);
        assert!(chat.members("one").await.unwrap().is_empty());
        assert_eq!(chat.members("two").await.unwrap(), vec![B]);
    }
}
