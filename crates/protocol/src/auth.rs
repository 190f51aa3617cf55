//! The login-port wire format: a three-packet challenge/proof exchange
//! followed by the realm list. All multi-byte integers little-endian
//! unless noted.

use bytes::{Buf, BufMut};
use num_enum::{IntoPrimitive, TryFromPrimitive};

use runeward_game::realms::Realm;
use runeward_srp::Salt;

use crate::{ensure_remaining, read_cstring, PacketParseError};

/// Opcodes on the login port, one byte each.
#[repr(u8)]
#[derive(TryFromPrimitive, IntoPrimitive, Debug, PartialEq, Eq, Clone, Copy)]
pub enum AuthCommand {
    LoginChallenge = 0x00,
    LoginProof = 0x01,
    RealmList = 0x10,
}

/// Result codes shared by all login responses.
#[repr(u8)]
#[derive(IntoPrimitive, TryFromPrimitive, Debug, PartialEq, Eq, Clone, Copy)]
pub enum LoginResult {
    Success = 0x00,
    Failed = 0x01,
    Failed2 = 0x02,
    Banned = 0x03,
    UnknownAccount = 0x04,
    IncorrectPassword = 0x05,
    AlreadyOnline = 0x06,
    NoTime = 0x07,
    DbBusy = 0x08,
    VersionInvalid = 0x09,
    VersionUpdate = 0x0A,
    InvalidServer = 0x0B,
    Suspended = 0x0C,
    NoAccess = 0x0D,
}

/// CMSG body of LOGIN_CHALLENGE: client version info, locale and the
/// length-prefixed account name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectRequest {
    pub error: u8,
    pub size: u16,
    pub game_name: [u8; 4],
    pub version: [u8; 3],
    pub build: u16,
    pub platform: [u8; 4],
    pub os: [u8; 4],
    pub locale: [u8; 4],
    pub timezone_bias: u32,
    pub ip: [u8; 4],
    pub username: String,
}

impl ConnectRequest {
    /// Parse the payload following the opcode byte.
    pub fn read(mut data: &[u8]) -> Result<Self, PacketParseError> {
        ensure_remaining(data, 33)?;
        let error = data.get_u8();
        let size = data.get_u16_le();

        let mut game_name = [0u8; 4];
        data.copy_to_slice(&mut game_name);
        let version = [data.get_u8(), data.get_u8(), data.get_u8()];
        let build = data.get_u16_le();

        let mut platform = [0u8; 4];
        data.copy_to_slice(&mut platform);
        let mut os = [0u8; 4];
        data.copy_to_slice(&mut os);
        let mut locale = [0u8; 4];
        data.copy_to_slice(&mut locale);

        let timezone_bias = data.get_u32_le();
        let mut ip = [0u8; 4];
        data.copy_to_slice(&mut ip);

        let name_len = usize::from(data.get_u8());
        ensure_remaining(data, name_len)?;
        let username = std::str::from_utf8(&data[..name_len])
            .map_err(|_| PacketParseError::BadString)?
            .to_string();

        Ok(Self {
            error,
            size,
            game_name,
            version,
            build,
            platform,
            os,
            locale,
            timezone_bias,
            ip,
            username,
        })
    }
}

/// SMSG body of a successful LOGIN_CHALLENGE: the SRP public parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectChallenge {
    pub b_pub: [u8; 32],
    pub g: Vec<u8>,
    pub n: Vec<u8>,
    pub salt: Salt,
    /// Unused by this era's handshake; echoed verbatim.
    pub pad: [u8; 16],
}

impl ConnectChallenge {
    /// The full response packet:
    /// opcode, 0, result, B, g-len, g, N-len, N, salt, pad, 0.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(119);
        out.put_u8(AuthCommand::LoginChallenge.into());
        out.put_u8(0);
        out.put_u8(LoginResult::Success.into());
        out.put_slice(&self.b_pub);
        out.put_u8(self.g.len() as u8);
        out.put_slice(&self.g);
        out.put_u8(self.n.len() as u8);
        out.put_slice(&self.n);
        out.put_slice(&self.salt.0);
        out.put_slice(&self.pad);
        out.put_u8(0);
        out
    }
}

/// A terminal challenge response: opcode, unknown, result.
pub fn challenge_failure(result: LoginResult) -> Vec<u8> {
    vec![AuthCommand::LoginChallenge.into(), 0, result.into()]
}

/// CMSG body of LOGIN_PROOF.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectProof {
    pub a_pub: [u8; 32],
    pub client_proof: [u8; 20],
    pub crc_hash: [u8; 20],
    pub key_count: u8,
}

impl ConnectProof {
    pub fn read(mut data: &[u8]) -> Result<Self, PacketParseError> {
        ensure_remaining(data, 73)?;
        let mut a_pub = [0u8; 32];
        data.copy_to_slice(&mut a_pub);
        let mut client_proof = [0u8; 20];
        data.copy_to_slice(&mut client_proof);
        let mut crc_hash = [0u8; 20];
        data.copy_to_slice(&mut crc_hash);
        let key_count = data.get_u8();
        Ok(Self {
            a_pub,
            client_proof,
            crc_hash,
            key_count,
        })
    }
}

/// Successful proof response: opcode, result, M2, 4 zero bytes of
/// account flags.
pub fn proof_success(server_proof: &[u8; 20]) -> Vec<u8> {
    let mut out = Vec::with_capacity(26);
    out.put_u8(AuthCommand::LoginProof.into());
    out.put_u8(LoginResult::Success.into());
    out.put_slice(server_proof);
    out.put_u32_le(0);
    out
}

/// Failed proof response: opcode, result.
pub fn proof_failure(result: LoginResult) -> Vec<u8> {
    vec![AuthCommand::LoginProof.into(), result.into()]
}

/// The realm list response: opcode, size, 4 reserved bytes, count, then
/// one record per realm.
pub fn realm_list_response(realms: &[Realm]) -> Vec<u8> {
    let mut body = Vec::new();
    body.put_u32_le(0);
    body.put_u8(realms.len() as u8);
    for realm in realms {
        body.put_u32_le(u32::from(u8::from(realm.realm_type)));
        body.put_u8(realm.flags);
        body.put_slice(realm.name.as_bytes());
        body.put_u8(0);
        body.put_slice(realm.socket().as_bytes());
        body.put_u8(0);
        body.put_f32_le(realm.population);
        body.put_u8(0); // character count, filled per-account elsewhere
        body.put_u8(realm.timezone);
        body.put_u8(0);
    }

    let mut out = Vec::with_capacity(3 + body.len());
    out.put_u8(AuthCommand::RealmList.into());
    out.put_u16_le(body.len() as u16);
    out.put_slice(&body);
    out
}

#[cfg(test)]
mod test {
    use runeward_game::realms::{RealmId, RealmType};
    use test_case::test_case;

    use super::*;

    fn request_bytes(username: &str) -> Vec<u8> {
        let mut out = Vec::new();
        out.put_u8(0); // error
        out.put_u16_le(30 + username.len() as u16);
        out.put_slice(b"WoW\0");
        out.put_slice(&[1, 1, 2]);
        out.put_u16_le(4125);
        out.put_slice(b"68x\0");
        out.put_slice(b"niW\0");
        out.put_slice(b"SUne");
        out.put_u32_le(60);
        out.put_slice(&[127, 0, 0, 1]);
        out.put_u8(username.len() as u8);
        out.put_slice(username.as_bytes());
        out
    }

    #[test_case("TEST" ; "short name")]
    #[test_case("TWELVECHARSX" ; "longer name")]
    fn connect_request_round_trip(username: &str) {
        let parsed = ConnectRequest::read(&request_bytes(username)).unwrap();
        assert_eq!(parsed.username, username);
        assert_eq!(parsed.build, 4125);
        assert_eq!(parsed.version, [1, 1, 2]);
        assert_eq!(parsed.ip, [127, 0, 0, 1]);
    }

    #[test]
    fn connect_request_rejects_truncation() {
        let bytes = request_bytes("TEST");
        assert_eq!(
            ConnectRequest::read(&bytes[..10]),
            Err(PacketParseError::Truncated)
        );
        // Name length promising more bytes than present.
        let mut bytes = request_bytes("TEST");
        let len_index = bytes.len() - 5;
        bytes[len_index] = 16;
        assert_eq!(
            ConnectRequest::read(&bytes),
            Err(PacketParseError::Truncated)
        );
    }

    #[test]
    fn challenge_layout() {
        let challenge = ConnectChallenge {
            b_pub: [0x11; 32],
            g: vec![7],
            n: vec![0xB7; 32],
            salt: Salt([0xAA; 32]),
            pad: [0xCC; 16],
        };
        let bytes = challenge.to_bytes();

        assert_eq!(bytes.len(), 119);
        assert_eq!(&bytes[..3], &[0x00, 0x00, 0x00]);
        assert_eq!(&bytes[3..35], &[0x11; 32]);
        assert_eq!(bytes[35], 1);
        assert_eq!(bytes[36], 7);
        assert_eq!(bytes[37], 32);
        assert_eq!(&bytes[38..70], &[0xB7; 32]);
        assert_eq!(&bytes[70..102], &[0xAA; 32]);
        assert_eq!(&bytes[102..118], &[0xCC; 16]);
        assert_eq!(bytes[118], 0);
    }

    #[test]
    fn challenge_failure_unknown_account() {
        assert_eq!(
            challenge_failure(LoginResult::UnknownAccount),
            vec![0x00, 0x00, 0x04]
        );
    }

    #[test]
    fn proof_round_trip_and_responses() {
        let mut bytes = Vec::new();
        bytes.put_slice(&[0x07; 32]);
        bytes.put_slice(&[0x22; 20]);
        bytes.put_slice(&[0x33; 20]);
        bytes.put_u8(0);

        let proof = ConnectProof::read(&bytes).unwrap();
        assert_eq!(proof.a_pub, [0x07; 32]);
        assert_eq!(proof.client_proof, [0x22; 20]);
        assert_eq!(proof.key_count, 0);

        let success = proof_success(&[0x44; 20]);
        assert_eq!(success.len(), 26);
        assert_eq!(&success[..2], &[0x01, 0x00]);
        assert_eq!(&success[2..22], &[0x44; 20]);
        assert_eq!(&success[22..], &[0, 0, 0, 0]);

        assert_eq!(proof_failure(LoginResult::Failed), vec![0x01, 0x01]);
    }

    #[test]
    fn realm_list_layout() {
        let realm = Realm {
            id: RealmId(1),
            name: "Blackrock".to_string(),
            realm_type: RealmType::Pvp,
            external_address: "127.0.0.1".to_string(),
            port: 8085,
            flags: 0,
            timezone: 8,
            population: 0.0,
        };
        let bytes = realm_list_response(std::slice::from_ref(&realm));

        assert_eq!(bytes[0], 0x10);
        let size = u16::from_le_bytes([bytes[1], bytes[2]]) as usize;
        assert_eq!(size, bytes.len() - 3);
        // reserved + count
        assert_eq!(&bytes[3..7], &[0, 0, 0, 0]);
        assert_eq!(bytes[7], 1);
        // realm type then flags
        assert_eq!(&bytes[8..12], &1u32.to_le_bytes());
        assert_eq!(bytes[12], 0);
        let name_end = 13 + "Blackrock".len();
        assert_eq!(&bytes[13..name_end], b"Blackrock");
        assert_eq!(bytes[name_end], 0);

        let empty = realm_list_response(&[]);
        assert_eq!(empty.len(), 8);
        assert_eq!(empty[7], 0);
    }
}
