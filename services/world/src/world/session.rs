use std::sync::{
    atomic::{AtomicU32, Ordering},
    Arc,
};

use anyhow::{Context, Result};
use tokio::{
    net::tcp::OwnedWriteHalf,
    io::AsyncWriteExt,
    sync::{Mutex, RwLock},
};
use tracing::trace;

use runeward_game::{accounts::Account, objects::Player};
use runeward_protocol::world::{
    decode_client_header, server_frame, HeaderCrypto, OpCode, CLIENT_HEADER_LEN,
};
use runeward_srp::SessionKey;

use crate::client::ClientId;

/// Connection lifecycle states and the opcodes they admit (§ dispatch in
/// `World::handle_packet`). Closed is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorldState {
    Init,
    AuthChallenge,
    AuthSession,
    CharList,
    InWorld,
    Closed,
}

/// Transient per-handler state; the set of keys is closed and known.
#[derive(Debug, Default, Clone, Copy)]
pub struct SessionFlags {
    /// Set when the server has teleported the player and expects
    /// MSG_MOVE_WORLDPORT_ACK back.
    pub worldport_ack_pending: bool,
}

/// An active world-port connection: the write half of the socket, the
/// header cipher once the session key is installed, and everything the
/// handlers track per connection. The session owns its player; the
/// object registry only holds a lookup entry.
pub struct Session {
    pub client_id: ClientId,
    /// The seed sent in SMSG_AUTH_CHALLENGE.
    pub server_seed: u32,
    stream: Mutex<OwnedWriteHalf>,
    crypto: Mutex<Option<HeaderCrypto>>,
    state: RwLock<WorldState>,
    account: RwLock<Option<Account>>,
    player: RwLock<Option<Arc<Mutex<Player>>>>,
    flags: Mutex<SessionFlags>,
    latency: AtomicU32,
}

impl Session {
    pub fn new(client_id: ClientId, stream: OwnedWriteHalf, server_seed: u32) -> Self {
        Self {
            client_id,
            server_seed,
            stream: Mutex::new(stream),
            crypto: Mutex::new(None),
            state: RwLock::new(WorldState::Init),
            account: RwLock::new(None),
            player: RwLock::new(None),
            flags: Mutex::new(SessionFlags::default()),
            latency: AtomicU32::new(0),
        }
    }

    pub async fn state(&self) -> WorldState {
        *self.state.read().await
    }

    pub async fn set_state(&self, state: WorldState) {
        *self.state.write().await = state;
    }

    pub async fn account(&self) -> Option<Account> {
        self.account.read().await.clone()
    }

    pub async fn set_account(&self, account: Account) {
        *self.account.write().await = Some(account);
    }

    pub async fn player(&self) -> Option<Arc<Mutex<Player>>> {
        self.player.read().await.clone()
    }

    pub async fn set_player(&self, player: Arc<Mutex<Player>>) {
        *self.player.write().await = Some(player);
    }

    pub async fn clear_player(&self) -> Option<Arc<Mutex<Player>>> {
        self.player.write().await.take()
    }

    pub async fn flags(&self) -> SessionFlags {
        *self.flags.lock().await
    }

    pub async fn set_worldport_ack_pending(&self, pending: bool) {
        self.flags.lock().await.worldport_ack_pending = pending;
    }

    pub fn set_latency(&self, latency: u32) {
        self.latency.store(latency, Ordering::Relaxed)
    }

    /// Install the session key: every header after this point is
    /// obfuscated in both directions.
    pub async fn install_session_key(&self, key: SessionKey) {
        *self.crypto.lock().await = Some(HeaderCrypto::new(key));
    }

    /// Clarify and decode an inbound header with this session's receive
    /// cipher state.
    pub async fn decode_header(
        &self,
        header: &mut [u8; CLIENT_HEADER_LEN],
    ) -> Result<(u32, usize)> {
        let mut crypto = self.crypto.lock().await;
        decode_client_header(header, crypto.as_mut()).context("bad inbound header")
    }

    /// Frame, obfuscate and write one packet. Writes are serialised by
    /// the stream lock, so broadcasts interleave whole packets only.
    pub async fn send(&self, opcode: OpCode, body: &[u8]) -> Result<()> {
        let frame = {
            let mut crypto = self.crypto.lock().await;
            server_frame(opcode, body, crypto.as_mut())
        };

        trace!("sending {opcode:?} ({} bytes) to {:?}", frame.len(), self.client_id);
        let mut stream = self.stream.lock().await;
        stream
            .write_all(&frame)
            .await
            .context("could not write packet")
    }
}
