use bytes::{Buf, BufMut};
use num_enum::{IntoPrimitive, TryFromPrimitive};
use sha1::{Digest, Sha1};

use runeward_game::{
    characters::CharacterData,
    objects::{Guid, Movement, ObjectUpdate, Speeds},
};
use runeward_srp::SessionKey;

use crate::{ensure_remaining, read_cstring, PacketParseError};

/// Result codes of SMSG_AUTH_RESPONSE.
#[repr(u8)]
#[derive(IntoPrimitive, TryFromPrimitive, Debug, PartialEq, Eq, Clone, Copy)]
pub enum ResponseCode {
    AuthOk = 0x0C,
    AuthFailed = 0x0D,
    AuthReject = 0x0E,
    AuthBadServerProof = 0x0F,
    AuthUnavailable = 0x10,
    AuthSystemError = 0x11,
}

/// Result codes of SMSG_CHAR_CREATE.
#[repr(u8)]
#[derive(IntoPrimitive, Debug, PartialEq, Eq, Clone, Copy)]
pub enum CharCreateCode {
    Success = 0x28,
    Error = 0x29,
    Failed = 0x2A,
    NameInUse = 0x2B,
}

/// Result codes of SMSG_CHAR_DELETE.
#[repr(u8)]
#[derive(IntoPrimitive, Debug, PartialEq, Eq, Clone, Copy)]
pub enum CharDeleteCode {
    Success = 0x36,
    Failed = 0x37,
}

/// Chat message kinds carried by CMSG/SMSG_MESSAGECHAT.
#[repr(u32)]
#[derive(TryFromPrimitive, IntoPrimitive, Debug, PartialEq, Eq, Clone, Copy)]
pub enum ChatMessageType {
    Say = 0x00,
    Party = 0x01,
    Guild = 0x03,
    Yell = 0x05,
    Whisper = 0x06,
    Emote = 0x08,
    Channel = 0x0E,
}

/// SMSG_CHANNEL_NOTIFY notification kinds.
#[repr(u8)]
#[derive(IntoPrimitive, Debug, PartialEq, Eq, Clone, Copy)]
pub enum ChannelNotifyType {
    Joined = 0x00,
    Left = 0x01,
    YouJoined = 0x02,
    YouLeft = 0x03,
    WrongPassword = 0x04,
    NotMember = 0x05,
    Muted = 0x11,
    InvalidName = 0x1B,
}

/// SMSG_AUTH_CHALLENGE body: the server's 4-byte seed.
pub fn auth_challenge(server_seed: u32) -> Vec<u8> {
    server_seed.to_le_bytes().to_vec()
}

/// CMSG_AUTH_SESSION body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthSession {
    pub build: u32,
    pub server_id: u32,
    pub username: String,
    pub client_seed: u32,
    pub digest: [u8; 20],
}

impl AuthSession {
    pub fn read(mut data: &[u8]) -> Result<Self, PacketParseError> {
        ensure_remaining(data, 8)?;
        let build = data.get_u32_le();
        let server_id = data.get_u32_le();
        let username = read_cstring(&mut data)?;
        ensure_remaining(data, 24)?;
        let client_seed = data.get_u32_le();
        let mut digest = [0u8; 20];
        data.copy_to_slice(&mut digest);
        Ok(Self {
            build,
            server_id,
            username,
            client_seed,
            digest,
        })
    }

    /// The digest the client is expected to send:
    /// `SHA-1(name || 0u32 || client_seed || server_seed || K)`.
    pub fn expected_digest(
        username: &str,
        client_seed: u32,
        server_seed: u32,
        session_key: &SessionKey,
    ) -> [u8; 20] {
        let mut sha = Sha1::new();
        sha.update(username.as_bytes());
        sha.update(0u32.to_le_bytes());
        sha.update(client_seed.to_le_bytes());
        sha.update(server_seed.to_le_bytes());
        sha.update(session_key);
        sha.finalize().into()
    }
}

/// SMSG_AUTH_RESPONSE body. Success carries the (zeroed) billing block.
pub fn auth_response(code: ResponseCode) -> Vec<u8> {
    let mut out = Vec::with_capacity(10);
    out.put_u8(code.into());
    if code == ResponseCode::AuthOk {
        out.put_u32_le(0); // billing time remaining
        out.put_u8(0); // billing flags
        out.put_u32_le(0); // billing time rested
    }
    out
}

/// CMSG_CHAR_CREATE body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CharCreate {
    pub name: String,
    pub race: u8,
    pub class: u8,
    pub gender: u8,
    pub skin: u8,
    pub face: u8,
    pub hair_style: u8,
    pub hair_color: u8,
    pub facial_hair: u8,
    pub outfit: u8,
}

impl CharCreate {
    pub fn read(mut data: &[u8]) -> Result<Self, PacketParseError> {
        let name = read_cstring(&mut data)?;
        ensure_remaining(data, 9)?;
        Ok(Self {
            name,
            race: data.get_u8(),
            class: data.get_u8(),
            gender: data.get_u8(),
            skin: data.get_u8(),
            face: data.get_u8(),
            hair_style: data.get_u8(),
            hair_color: data.get_u8(),
            facial_hair: data.get_u8(),
            outfit: data.get_u8(),
        })
    }
}

/// Read the single u64 GUID body shared by CMSG_CHAR_DELETE,
/// CMSG_PLAYER_LOGIN and CMSG_NAME_QUERY.
pub fn read_guid(mut data: &[u8]) -> Result<u64, PacketParseError> {
    ensure_remaining(data, 8)?;
    Ok(data.get_u64_le())
}

/// Equipment slots advertised per character in the enum screen.
const CHAR_ENUM_EQUIPMENT_SLOTS: usize = 20;

/// SMSG_CHAR_ENUM body from the stored character list.
pub fn char_enum(characters: &[CharacterData]) -> Vec<u8> {
    let mut out = Vec::new();
    out.put_u8(characters.len() as u8);
    for data in characters {
        out.put_u64_le(u64::from(data.guid.0));
        out.put_slice(data.name.as_bytes());
        out.put_u8(0);
        out.put_u8(data.race.into());
        out.put_u8(data.class.into());
        out.put_u8(data.gender.into());
        out.put_u8(data.features.skin);
        out.put_u8(data.features.face);
        out.put_u8(data.features.hair_style);
        out.put_u8(data.features.hair_color);
        out.put_u8(data.features.facial_hair);
        out.put_u8(data.stats.level as u8);
        out.put_u32_le(data.position.zone);
        out.put_u32_le(data.position.map);
        out.put_f32_le(data.position.x);
        out.put_f32_le(data.position.y);
        out.put_f32_le(data.position.z);
        out.put_u32_le(0); // guild
        out.put_u32_le(0); // character flags
        out.put_u8(0); // first login
        out.put_u32_le(0); // pet display
        out.put_u32_le(0); // pet level
        out.put_u32_le(0); // pet family
        for _ in 0..CHAR_ENUM_EQUIPMENT_SLOTS {
            out.put_u32_le(0); // item display
            out.put_u8(0); // inventory type
        }
    }
    out
}

/// SMSG_CHAR_CREATE / SMSG_CHAR_DELETE bodies are a single result byte.
pub fn result_byte(code: impl Into<u8>) -> Vec<u8> {
    vec![code.into()]
}

/// SMSG_LOGIN_VERIFY_WORLD body.
pub fn login_verify_world(map: u32, x: f32, y: f32, z: f32, orientation: f32) -> Vec<u8> {
    let mut out = Vec::with_capacity(20);
    out.put_u32_le(map);
    out.put_f32_le(x);
    out.put_f32_le(y);
    out.put_f32_le(z);
    out.put_f32_le(orientation);
    out
}

/// SMSG_NAME_QUERY_RESPONSE body: guid, name, race, gender, class as
/// 32-bit words.
pub fn name_query_response(guid: Guid, name: &str, race: u32, gender: u32, class: u32) -> Vec<u8> {
    let mut out = Vec::with_capacity(8 + name.len() + 1 + 12);
    out.put_u64_le(guid.0);
    out.put_slice(name.as_bytes());
    out.put_u8(0);
    out.put_u32_le(race);
    out.put_u32_le(gender);
    out.put_u32_le(class);
    out
}

/// CMSG_MESSAGECHAT body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientChatMessage {
    pub message_type: ChatMessageType,
    pub language: u32,
    /// Present only for channel messages.
    pub channel_name: Option<String>,
    pub text: String,
}

impl ClientChatMessage {
    pub fn read(mut data: &[u8]) -> Result<Self, PacketParseError> {
        ensure_remaining(data, 8)?;
        let raw_type = data.get_u32_le();
        let message_type = ChatMessageType::try_from(raw_type)
            .map_err(|_| PacketParseError::BadValue("message_type", raw_type))?;
        let language = data.get_u32_le();
        let channel_name = if message_type == ChatMessageType::Channel {
            Some(read_cstring(&mut data)?)
        } else {
            None
        };
        let text = read_cstring(&mut data)?;
        Ok(Self {
            message_type,
            language,
            channel_name,
            text,
        })
    }
}

/// SMSG_MESSAGECHAT body: type, language, optional channel, sender guid,
/// length-prefixed nul-terminated text, chat tag.
pub fn server_chat_message(
    message_type: ChatMessageType,
    language: u32,
    channel_name: Option<&str>,
    sender: Guid,
    text: &str,
) -> Vec<u8> {
    let mut out = Vec::new();
    out.put_u8(u32::from(message_type) as u8);
    out.put_u32_le(language);
    if let Some(channel) = channel_name {
        out.put_slice(channel.as_bytes());
        out.put_u8(0);
    }
    out.put_u64_le(sender.0);
    out.put_u32_le(text.len() as u32 + 1);
    out.put_slice(text.as_bytes());
    out.put_u8(0);
    out.put_u8(0); // chat tag
    out
}

/// CMSG_JOIN_CHANNEL body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinChannel {
    pub channel_name: String,
    pub password: String,
}

impl JoinChannel {
    pub fn read(mut data: &[u8]) -> Result<Self, PacketParseError> {
        let channel_name = read_cstring(&mut data)?;
        let password = read_cstring(&mut data)?;
        Ok(Self {
            channel_name,
            password,
        })
    }
}

/// CMSG_LEAVE_CHANNEL body.
pub fn read_leave_channel(mut data: &[u8]) -> Result<String, PacketParseError> {
    read_cstring(&mut data)
}

/// SMSG_CHANNEL_NOTIFY for JOINED / LEFT, sent to the other members.
pub fn channel_notify_member(notify: ChannelNotifyType, channel_name: &str, guid: Guid) -> Vec<u8> {
    let mut out = Vec::new();
    out.put_u8(notify.into());
    out.put_slice(channel_name.as_bytes());
    out.put_u8(0);
    out.put_u64_le(guid.0);
    out
}

/// SMSG_CHANNEL_NOTIFY for YOU_JOINED / YOU_LEFT, sent to the actor.
/// User channels (internal id 0) carry one extra zero byte.
pub fn channel_notify_you(notify: ChannelNotifyType, channel_name: &str, channel_id: u32) -> Vec<u8> {
    let mut out = Vec::new();
    out.put_u8(notify.into());
    out.put_slice(channel_name.as_bytes());
    out.put_u8(0);
    out.put_u32_le(channel_id);
    if channel_id == 0 {
        out.put_u8(0);
    }
    out
}

/// SMSG_CHANNEL_NOTIFY carrying only the notification and channel name
/// (wrong password, not a member, invalid name).
pub fn channel_notify_plain(notify: ChannelNotifyType, channel_name: &str) -> Vec<u8> {
    let mut out = Vec::new();
    out.put_u8(notify.into());
    out.put_slice(channel_name.as_bytes());
    out.put_u8(0);
    out
}

/// A movement body as the client sends it. The pitch word is only
/// present while swimming; trailing fall data is tolerated and ignored.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MovementInfo {
    pub flags: u32,
    pub time: u32,
    pub x: f32,
    pub y: f32,
    pub z: f32,
    pub orientation: f32,
    pub pitch: f32,
    pub fall_time: u32,
}

impl MovementInfo {
    pub fn read(mut data: &[u8]) -> Result<Self, PacketParseError> {
        ensure_remaining(data, 24)?;
        let flags = data.get_u32_le();
        let time = data.get_u32_le();
        let x = data.get_f32_le();
        let y = data.get_f32_le();
        let z = data.get_f32_le();
        let orientation = data.get_f32_le();

        let pitch = if flags & runeward_game::objects::movement_flags::IS_SWIMMING != 0 {
            ensure_remaining(data, 4)?;
            data.get_f32_le()
        } else {
            0.0
        };
        let fall_time = if data.remaining() >= 4 {
            data.get_u32_le()
        } else {
            0
        };

        Ok(Self {
            flags,
            time,
            x,
            y,
            z,
            orientation,
            pitch,
            fall_time,
        })
    }

    pub fn write(&self, out: &mut Vec<u8>) {
        out.put_u32_le(self.flags);
        out.put_u32_le(self.time);
        out.put_f32_le(self.x);
        out.put_f32_le(self.y);
        out.put_f32_le(self.z);
        out.put_f32_le(self.orientation);
        if self.flags & runeward_game::objects::movement_flags::IS_SWIMMING != 0 {
            out.put_f32_le(self.pitch);
        }
        out.put_u32_le(self.fall_time);
    }

    pub fn apply_to(&self, movement: &mut Movement) {
        movement.flags = self.flags;
        movement.time = self.time;
        movement.x = self.x;
        movement.y = self.y;
        movement.z = self.z;
        movement.orientation = self.orientation;
        movement.pitch = self.pitch;
        movement.fall_time = self.fall_time;
    }
}

/// Movement forwarded to other players: the mover's guid then the body.
pub fn movement_forward(guid: Guid, body: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(8 + body.len());
    out.put_u64_le(guid.0);
    out.put_slice(body);
    out
}

const UPDATE_TYPE_PARTIAL: u8 = 0;
const UPDATE_TYPE_CREATE: u8 = 2;

/// SMSG_UPDATE_OBJECT carrying one partial (field-diff) block.
pub fn update_object_partial(guid: Guid, update: &ObjectUpdate) -> Vec<u8> {
    let mut out = Vec::new();
    out.put_u32_le(1); // block count
    out.put_u8(0); // no transport
    out.put_u8(UPDATE_TYPE_PARTIAL);
    out.put_u64_le(guid.0);
    out.put_slice(&update.to_bytes());
    out
}

/// SMSG_UPDATE_OBJECT carrying one create block: object type and a full
/// movement record ahead of the packed non-default fields.
pub fn update_object_create(
    guid: Guid,
    object_type: u8,
    movement: &Movement,
    speeds: &Speeds,
    update: &ObjectUpdate,
) -> Vec<u8> {
    let mut out = Vec::new();
    out.put_u32_le(1);
    out.put_u8(0);
    out.put_u8(UPDATE_TYPE_CREATE);
    out.put_u64_le(guid.0);
    out.put_u8(object_type);

    out.put_u32_le(movement.flags);
    out.put_u32_le(movement.time);
    out.put_f32_le(movement.x);
    out.put_f32_le(movement.y);
    out.put_f32_le(movement.z);
    out.put_f32_le(movement.orientation);
    out.put_f32_le(movement.pitch);
    out.put_u32_le(movement.fall_time);

    out.put_f32_le(speeds.walk);
    out.put_f32_le(speeds.run);
    out.put_f32_le(speeds.run_backward);
    out.put_f32_le(speeds.swim);
    out.put_f32_le(speeds.swim_backward);
    out.put_f32_le(speeds.turn);

    out.put_slice(&update.to_bytes());
    out
}

/// SMSG_DESTROY_OBJECT body.
pub fn destroy_object(guid: Guid) -> Vec<u8> {
    guid.0.to_le_bytes().to_vec()
}

/// CMSG_PING body: sequence then latency.
pub fn read_ping(mut data: &[u8]) -> Result<(u32, u32), PacketParseError> {
    ensure_remaining(data, 8)?;
    Ok((data.get_u32_le(), data.get_u32_le()))
}

/// SMSG_PONG body echoes the sequence.
pub fn pong(sequence: u32) -> Vec<u8> {
    sequence.to_le_bytes().to_vec()
}
