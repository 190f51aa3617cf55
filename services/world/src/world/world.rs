use std::{collections::HashMap, convert::TryFrom, sync::Arc};

use anyhow::{bail, Result};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use runeward_game::{
    accounts::AccountService,
    characters::{
        CharacterCreate, CharacterCreateError, CharacterFeatures, CharacterId, CharacterService,
        Class, Gender, Race,
    },
    objects::{Guid, ObjectManager, Player},
};
use runeward_protocol::world::{
    auth_challenge, auth_response, char_enum, destroy_object, login_verify_world,
    movement_forward, name_query_response, pong, read_guid, read_ping, read_leave_channel,
    result_byte, update_object_create, update_object_partial, AuthSession, CharCreate,
    CharCreateCode, CharDeleteCode, ClientChatMessage, JoinChannel, MovementInfo, OpCode,
    ResponseCode,
};

use crate::client::ClientId;

use super::chat::{ChatManager, Outgoing, Recipients};
use super::session::{Session, WorldState};

/// The shared world: the object registry, the chat channels, the live
/// session set, and the opcode dispatch that drives all of them.
pub struct World<A, C> {
    accounts: A,
    characters: C,
    pub objects: ObjectManager,
    pub chat: ChatManager,
    sessions: RwLock<HashMap<ClientId, Arc<Session>>>,
    sessions_by_guid: RwLock<HashMap<Guid, ClientId>>,
}

impl<A: AccountService, C: CharacterService> World<A, C> {
    pub fn new(accounts: A, characters: C) -> Self {
        Self {
            accounts,
            characters,
            objects: ObjectManager::new(),
            chat: ChatManager::new(),
            sessions: RwLock::new(HashMap::new()),
            sessions_by_guid: RwLock::new(HashMap::new()),
        }
    }

    pub async fn add_session(&self, session: Arc<Session>) {
        self.sessions
            .write()
            .await
            .insert(session.client_id, session);
    }

    /// First packet on every connection: the server's auth seed, sent in
    /// clear before any key is installed.
    pub async fn send_auth_challenge(&self, session: &Session) -> Result<()> {
        session
            .send(OpCode::SmsgAuthChallenge, &auth_challenge(session.server_seed))
            .await?;
        session.set_state(WorldState::AuthChallenge).await;
        Ok(())
    }

    /// Dispatch one inbound packet according to the session state table.
    /// An `Err` is fatal to the connection.
    pub async fn handle_packet(
        &self,
        session: &Arc<Session>,
        raw_opcode: u32,
        body: &[u8],
    ) -> Result<()> {
        let state = session.state().await;

        let opcode = u16::try_from(raw_opcode)
            .ok()
            .and_then(|raw| OpCode::try_from(raw).ok());
        let opcode = match opcode {
            Some(opcode) => opcode,
            None if state == WorldState::InWorld => {
                debug!("ignoring unknown opcode {raw_opcode:#06x}");
                return Ok(());
            }
            None => bail!("unknown opcode {raw_opcode:#06x} in state {state:?}"),
        };

        use OpCode::*;
        match (state, opcode) {
            (WorldState::AuthChallenge, CmsgAuthSession) => {
                self.handle_auth_session(session, body).await
            }

            (WorldState::AuthSession | WorldState::CharList, CmsgCharEnum) => {
                self.handle_char_enum(session).await
            }
            (WorldState::AuthSession | WorldState::CharList, CmsgCharCreate) => {
                self.handle_char_create(session, body).await
            }
            (WorldState::AuthSession | WorldState::CharList, CmsgCharDelete) => {
                self.handle_char_delete(session, body).await
            }
            (WorldState::CharList, CmsgPlayerLogin) => {
                self.handle_player_login(session, body).await
            }

            (
                WorldState::AuthSession | WorldState::CharList | WorldState::InWorld,
                CmsgPing,
            ) => self.handle_ping(session, body).await,

            (WorldState::InWorld, opcode) if opcode.is_movement() => {
                self.handle_movement(session, opcode, body).await
            }
            (WorldState::InWorld, CmsgNameQuery) => self.handle_name_query(session, body).await,
            (WorldState::InWorld, CmsgMessageChat) => {
                self.handle_message_chat(session, body).await
            }
            (WorldState::InWorld, CmsgJoinChannel) => {
                self.handle_join_channel(session, body).await
            }
            (WorldState::InWorld, CmsgLeaveChannel) => {
                self.handle_leave_channel(session, body).await
            }
            (WorldState::InWorld, MsgMoveWorldportAck) => {
                self.handle_worldport_ack(session).await
            }
            (WorldState::InWorld, CmsgLogoutRequest) => self.handle_logout(session).await,

            (WorldState::InWorld, opcode) => {
                debug!("ignoring {opcode:?} in world");
                Ok(())
            }
            (state, opcode) => bail!("{opcode:?} not permitted in state {state:?}"),
        }
    }

    /// CMSG_AUTH_SESSION: check the client digest against the session
    /// key the login server stored, then install the header cipher.
    async fn handle_auth_session(&self, session: &Arc<Session>, body: &[u8]) -> Result<()> {
        let auth = AuthSession::read(body).map_err(|e| anyhow::anyhow!("bad auth session: {e}"))?;

        let account = match self.accounts.account_by_name(&auth.username).await {
            Ok(Some(account)) => account,
            Ok(None) => {
                warn!("auth session for unknown account {}", auth.username);
                session
                    .send(OpCode::SmsgAuthResponse, &auth_response(ResponseCode::AuthFailed))
                    .await?;
                session.set_state(WorldState::Closed).await;
                return Ok(());
            }
            Err(e) => {
                // Store trouble aborts the handler, not the connection.
                warn!("could not look up {}: {e}", auth.username);
                return Ok(());
            }
        };

        let session_key = match account.session_key {
            Some(key) => key,
            None => {
                warn!("{} has no session key on record", auth.username);
                session
                    .send(OpCode::SmsgAuthResponse, &auth_response(ResponseCode::AuthFailed))
                    .await?;
                session.set_state(WorldState::Closed).await;
                return Ok(());
            }
        };

        let expected = AuthSession::expected_digest(
            &auth.username,
            auth.client_seed,
            session.server_seed,
            &session_key,
        );
        if expected != auth.digest {
            warn!("bad auth digest for {}", auth.username);
            session
                .send(OpCode::SmsgAuthResponse, &auth_response(ResponseCode::AuthReject))
                .await?;
            session.set_state(WorldState::Closed).await;
            return Ok(());
        }

        info!("world session authenticated for {}", auth.username);
        session.set_account(account).await;
        session.install_session_key(session_key).await;
        session
            .send(OpCode::SmsgAuthResponse, &auth_response(ResponseCode::AuthOk))
            .await?;
        session.set_state(WorldState::AuthSession).await;
        Ok(())
    }

    async fn handle_char_enum(&self, session: &Arc<Session>) -> Result<()> {
        let account = match session.account().await {
            Some(account) => account,
            None => bail!("char enum without an account"),
        };

        let characters = match self.characters.characters_by_account(account.id).await {
            Ok(characters) => characters,
            Err(e) => {
                warn!("could not list characters for {}: {e}", account.username);
                return Ok(());
            }
        };

        session
            .send(OpCode::SmsgCharEnum, &char_enum(&characters))
            .await?;
        session.set_state(WorldState::CharList).await;
        Ok(())
    }

    async fn handle_char_create(&self, session: &Arc<Session>, body: &[u8]) -> Result<()> {
        let account = match session.account().await {
            Some(account) => account,
            None => bail!("char create without an account"),
        };
        let request =
            CharCreate::read(body).map_err(|e| anyhow::anyhow!("bad char create: {e}"))?;

        let (race, class, gender) = match (
            Race::try_from(request.race),
            Class::try_from(request.class),
            Gender::try_from(request.gender),
        ) {
            (Ok(race), Ok(class), Ok(gender)) => (race, class, gender),
            _ => {
                return session
                    .send(
                        OpCode::SmsgCharCreate,
                        &result_byte(CharCreateCode::Error),
                    )
                    .await;
            }
        };

        if request.name.len() < 2 {
            return session
                .send(OpCode::SmsgCharCreate, &result_byte(CharCreateCode::Error))
                .await;
        }

        let create = CharacterCreate {
            name: request.name,
            race,
            class,
            gender,
            features: CharacterFeatures {
                skin: request.skin,
                face: request.face,
                hair_style: request.hair_style,
                hair_color: request.hair_color,
                facial_hair: request.facial_hair,
            },
        };

        let code = match self.characters.create_character(account.id, create).await {
            Ok(data) => {
                info!("character {} created for {}", data.name, account.username);
                CharCreateCode::Success
            }
            Err(CharacterCreateError::NameInUse) => CharCreateCode::NameInUse,
            Err(CharacterCreateError::UnsupportedCombination) => CharCreateCode::Error,
            Err(CharacterCreateError::Failed) => CharCreateCode::Failed,
        };
        session
            .send(OpCode::SmsgCharCreate, &result_byte(code))
            .await
    }

    async fn handle_char_delete(&self, session: &Arc<Session>, body: &[u8]) -> Result<()> {
        let guid = read_guid(body).map_err(|e| anyhow::anyhow!("bad char delete: {e}"))?;

        let code = match self
            .characters
            .delete_character(CharacterId(guid as u32))
            .await
        {
            Ok(true) => CharDeleteCode::Success,
            Ok(false) => CharDeleteCode::Failed,
            Err(e) => {
                warn!("could not delete character {guid:#x}: {e}");
                CharDeleteCode::Failed
            }
        };
        session
            .send(OpCode::SmsgCharDelete, &result_byte(code))
            .await
    }

    /// CMSG_PLAYER_LOGIN: load the character, spawn the player into the
    /// registry and exchange create blocks with everyone nearby.
    async fn handle_player_login(&self, session: &Arc<Session>, body: &[u8]) -> Result<()> {
        let account = match session.account().await {
            Some(account) => account,
            None => bail!("player login without an account"),
        };
        let guid = read_guid(body).map_err(|e| anyhow::anyhow!("bad player login: {e}"))?;

        let data = match self.characters.character_by_guid(CharacterId(guid as u32)).await {
            Ok(Some(data)) => data,
            Ok(None) => bail!("login to unknown character {guid:#x}"),
            Err(e) => {
                warn!("could not load character {guid:#x}: {e}");
                return Ok(());
            }
        };
        if data.account != account.id {
            bail!("{} tried to log into someone else's character", account.username);
        }

        let mut player = Player::from_character(account.id, &data);
        player.import_skills(self.characters.skills_for(data.guid).await.unwrap_or_default());
        player.import_spells(self.characters.spells_for(data.guid).await.unwrap_or_default());

        let entry = self.objects.register(player).await;
        let (player_guid, position, create_packet) = {
            let mut player = entry.lock().await;
            let guid = player.guid();
            player.track(guid);
            let position = player.unit.object.position;
            let update = player.unit.object.full_update();
            let packet = update_object_create(
                guid,
                player.unit.object.object_type().into(),
                &player.unit.movement,
                &player.unit.speeds,
                &update,
            );
            (guid, position, packet)
        };

        session.set_player(entry.clone()).await;
        self.sessions_by_guid
            .write()
            .await
            .insert(player_guid, session.client_id);
        session.set_state(WorldState::InWorld).await;
        session.set_worldport_ack_pending(true).await;
        info!("{} entered the world as {}", account.username, data.name);

        session
            .send(
                OpCode::SmsgLoginVerifyWorld,
                &login_verify_world(
                    position.map,
                    position.x,
                    position.y,
                    position.z,
                    position.orientation,
                ),
            )
            .await?;
        session.send(OpCode::SmsgUpdateObject, &create_packet).await?;

        // Show the newcomer to everyone nearby, and everyone nearby to
        // the newcomer.
        let nearby = self.objects.players_in_map(position.map, position.zone).await;
        for other in nearby {
            let (other_guid, other_packet) = {
                let other = other.lock().await;
                if other.guid() == player_guid {
                    continue;
                }
                let view = other.unit.object.create_view();
                (
                    other.guid(),
                    update_object_create(
                        other.guid(),
                        other.unit.object.object_type().into(),
                        &other.unit.movement,
                        &other.unit.speeds,
                        &view,
                    ),
                )
            };

            session.send(OpCode::SmsgUpdateObject, &other_packet).await?;
            entry.lock().await.track(other_guid);

            if let Some(other_session) = self.session_by_guid(other_guid).await {
                if other_session.send(OpCode::SmsgUpdateObject, &create_packet).await.is_ok() {
                    other.lock().await.track(player_guid);
                }
            }
        }

        Ok(())
    }

    async fn handle_movement(
        &self,
        session: &Arc<Session>,
        opcode: OpCode,
        body: &[u8],
    ) -> Result<()> {
        let info = MovementInfo::read(body).map_err(|e| anyhow::anyhow!("bad movement: {e}"))?;
        let entry = match session.player().await {
            Some(entry) => entry,
            None => bail!("movement without a player"),
        };

        let (guid, map, zone) = {
            let mut player = entry.lock().await;
            info.apply_to(&mut player.unit.movement);
            let position = &mut player.unit.object.position;
            position.x = info.x;
            position.y = info.y;
            position.z = info.z;
            position.orientation = info.orientation;
            let (map, zone) = (position.map, position.zone);
            (player.guid(), map, zone)
        };

        let forward = movement_forward(guid, body);
        for other in self.objects.players_in_map(map, zone).await {
            let other_guid = other.lock().await.guid();
            if other_guid == guid {
                continue;
            }
            if let Some(other_session) = self.session_by_guid(other_guid).await {
                let _ = other_session.send(opcode, &forward).await;
            }
        }
        Ok(())
    }

    async fn handle_name_query(&self, session: &Arc<Session>, body: &[u8]) -> Result<()> {
        let guid = read_guid(body).map_err(|e| anyhow::anyhow!("bad name query: {e}"))?;

        let target = match self.objects.get_player(Guid(guid)).await {
            Some(target) => target,
            None => {
                warn!("name query for unknown player {guid:#x}");
                return Ok(());
            }
        };

        let response = {
            let target = target.lock().await;
            name_query_response(
                target.guid(),
                &target.name,
                target.unit.race(),
                target.unit.gender(),
                target.unit.class(),
            )
        };
        session.send(OpCode::SmsgNameQueryResponse, &response).await
    }

    async fn handle_message_chat(&self, session: &Arc<Session>, body: &[u8]) -> Result<()> {
        let message =
            ClientChatMessage::read(body).map_err(|e| anyhow::anyhow!("bad chat message: {e}"))?;
        let guid = self.require_player_guid(session).await?;

        let (code, packets) = self.chat.receive_message(guid, &message).await;
        if code != 0 {
            debug!("chat message from {guid} rejected with code {code}");
        }
        self.deliver_all(packets).await;
        Ok(())
    }

    async fn handle_join_channel(&self, session: &Arc<Session>, body: &[u8]) -> Result<()> {
        let join = JoinChannel::read(body).map_err(|e| anyhow::anyhow!("bad join channel: {e}"))?;
        let (guid, name) = self.require_player_identity(session).await?;

        let (code, packets) = self
            .chat
            .join_channel(guid, &name, &join.channel_name, &join.password)
            .await;
        if code != 0 {
            debug!("{name} failed to join '{}' with code {code}", join.channel_name);
        }
        self.deliver_all(packets).await;
        Ok(())
    }

    async fn handle_leave_channel(&self, session: &Arc<Session>, body: &[u8]) -> Result<()> {
        let channel =
            read_leave_channel(body).map_err(|e| anyhow::anyhow!("bad leave channel: {e}"))?;
        let (guid, name) = self.require_player_identity(session).await?;

        let (code, packets) = self.chat.leave_channel(guid, &name, &channel).await;
        if code != 0 {
            debug!("{name} failed to leave '{channel}' with code {code}");
        }
        self.deliver_all(packets).await;
        Ok(())
    }

    /// MSG_MOVE_WORLDPORT_ACK is only legal while a teleport is pending;
    /// an unexpected one is a protocol state error.
    async fn handle_worldport_ack(&self, session: &Arc<Session>) -> Result<()> {
        if !session.flags().await.worldport_ack_pending {
            bail!("unexpected MSG_MOVE_WORLDPORT_ACK");
        }
        debug!("worldport acknowledged");
        session.set_worldport_ack_pending(false).await;
        Ok(())
    }

    async fn handle_ping(&self, session: &Arc<Session>, body: &[u8]) -> Result<()> {
        let (sequence, latency) = read_ping(body).map_err(|e| anyhow::anyhow!("bad ping: {e}"))?;
        session.set_latency(latency);
        session.send(OpCode::SmsgPong, &pong(sequence)).await
    }

    async fn handle_logout(&self, session: &Arc<Session>) -> Result<()> {
        session.send(OpCode::SmsgLogoutComplete, &[]).await?;
        self.despawn_player(session).await;
        session.set_state(WorldState::CharList).await;
        Ok(())
    }

    /// The periodic replication tick: serialise every dirty object's
    /// field diff and fan it out to the players subscribed to it. The
    /// owner always receives their own updates.
    pub async fn update_tick(&self) {
        for entry in self.objects.players().await {
            let (guid, map, zone, update) = {
                let mut player = entry.lock().await;
                let position = player.unit.object.position;
                (
                    player.guid(),
                    position.map,
                    position.zone,
                    player.unit.object.take_update(),
                )
            };

            let update = match update {
                Some(update) => update,
                None => continue,
            };
            let packet = update_object_partial(guid, &update);

            for subscriber in self.objects.players_in_map(map, zone).await {
                let subscriber_guid = subscriber.lock().await.guid();
                if let Some(subscriber_session) = self.session_by_guid(subscriber_guid).await {
                    let _ = subscriber_session
                        .send(OpCode::SmsgUpdateObject, &packet)
                        .await;
                }
            }
        }
    }

    /// Socket teardown: remove the player from the world and drop the
    /// session from the registry.
    pub async fn teardown(&self, session: &Arc<Session>) {
        self.despawn_player(session).await;
        session.set_state(WorldState::Closed).await;
        self.sessions.write().await.remove(&session.client_id);
        debug!("session {:?} closed", session.client_id);
    }

    /// Take the player out of the shared world: destroy broadcasts to
    /// everyone who tracked it, channel membership purged, registry entry
    /// removed.
    async fn despawn_player(&self, session: &Arc<Session>) {
        let entry = match session.clear_player().await {
            Some(entry) => entry,
            None => return,
        };

        let (guid, map, zone) = {
            let player = entry.lock().await;
            let position = player.unit.object.position;
            (player.guid(), position.map, position.zone)
        };

        self.sessions_by_guid.write().await.remove(&guid);
        self.objects.unregister(guid).await;

        let destroy = destroy_object(guid);
        for other in self.objects.players_in_map(map, zone).await {
            let (other_guid, tracked) = {
                let mut other = other.lock().await;
                (other.guid(), other.untrack(guid))
            };
            if !tracked {
                continue;
            }
            if let Some(other_session) = self.session_by_guid(other_guid).await {
                let _ = other_session
                    .send(OpCode::SmsgDestroyObject, &destroy)
                    .await;
            }
        }

        let farewells = self.chat.purge_member(guid).await;
        self.deliver_all(farewells).await;
    }

    async fn session_by_guid(&self, guid: Guid) -> Option<Arc<Session>> {
        let client_id = *self.sessions_by_guid.read().await.get(&guid)?;
        self.sessions.read().await.get(&client_id).cloned()
    }

    async fn require_player_guid(&self, session: &Arc<Session>) -> Result<Guid> {
        match session.player().await {
            Some(entry) => Ok(entry.lock().await.guid()),
            None => bail!("no player on this session"),
        }
    }

    /// Read guid and name into locals under the player lock (leaf use).
    async fn require_player_identity(&self, session: &Arc<Session>) -> Result<(Guid, String)> {
        match session.player().await {
            Some(entry) => {
                let player = entry.lock().await;
                Ok((player.guid(), player.name.clone()))
            }
            None => bail!("no player on this session"),
        }
    }

    async fn deliver_all(&self, packets: Vec<Outgoing>) {
        for packet in packets {
            self.deliver(packet).await;
        }
    }

    /// Push one produced packet down the common send path. Recipients
    /// not in the IN_WORLD state are skipped.
    pub async fn deliver(&self, packet: Outgoing) {
        match packet.recipients {
            Recipients::World => {
                let sessions: Vec<_> = self.sessions.read().await.values().cloned().collect();
                for session in sessions {
                    if session.state().await == WorldState::InWorld {
                        let _ = session.send(packet.opcode, &packet.body).await;
                    }
                }
            }
            Recipients::Guids(guids) => {
                for guid in guids {
                    if let Some(session) = self.session_by_guid(guid).await {
                        if session.state().await == WorldState::InWorld {
                            let _ = session.send(packet.opcode, &packet.body).await;
                        }
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod test {
    use std::collections::HashMap;

    use async_trait::async_trait;
    use tokio::{
        io::AsyncReadExt,
        net::{TcpListener, TcpStream},
        sync::RwLock,
    };

    use runeward_game::{
        accounts::{Account, AccountId, AccountOpError},
        characters::{CharacterData, CharacterOpError, Skill, Spell},
        defaults::{new_character_stats, race_defaults},
    };
    use runeward_srp::{Salt, SessionKey, Verifier};

    use super::*;

    struct MemoryAccounts;

    #[async_trait]
    impl AccountService for MemoryAccounts {
        async fn account_by_name(&self, _: &str) -> Result<Option<Account>, AccountOpError> {
            Ok(None)
        }
        async fn create_account(
            &self,
            _: &str,
            _: Salt,
            _: Verifier,
        ) -> Result<AccountId, AccountOpError> {
            Ok(AccountId(1))
        }
        async fn set_session_key(&self, _: &str, _: &SessionKey) -> Result<(), AccountOpError> {
            Ok(())
        }
        async fn session_key(&self, _: &str) -> Result<Option<SessionKey>, AccountOpError> {
            Ok(None)
        }
    }

    struct MemoryCharacters {
        characters: RwLock<HashMap<u32, CharacterData>>,
    }

    impl MemoryCharacters {
        fn with(characters: Vec<CharacterData>) -> Self {
            Self {
                characters: RwLock::new(
                    characters.into_iter().map(|c| (c.guid.0, c)).collect(),
                ),
            }
        }
    }

    #[async_trait]
    impl CharacterService for MemoryCharacters {
        async fn character_by_guid(
            &self,
            guid: CharacterId,
        ) -> Result<Option<CharacterData>, CharacterOpError> {
            Ok(self.characters.read().await.get(&guid.0).cloned())
        }
        async fn character_exists_by_name(&self, name: &str) -> Result<bool, CharacterOpError> {
            Ok(self
                .characters
                .read()
                .await
                .values()
                .any(|c| c.name == name))
        }
        async fn characters_by_account(
            &self,
            account: AccountId,
        ) -> Result<Vec<CharacterData>, CharacterOpError> {
            Ok(self
                .characters
                .read()
                .await
                .values()
                .filter(|c| c.account == account)
                .cloned()
                .collect())
        }
        async fn create_character(
            &self,
            _: AccountId,
            _: CharacterCreate,
        ) -> Result<CharacterData, CharacterCreateError> {
            Err(CharacterCreateError::Failed)
        }
        async fn delete_character(&self, guid: CharacterId) -> Result<bool, CharacterOpError> {
            Ok(self.characters.write().await.remove(&guid.0).is_some())
        }
        async fn skills_for(&self, _: CharacterId) -> Result<Vec<Skill>, CharacterOpError> {
            Ok(vec![])
        }
        async fn spells_for(&self, _: CharacterId) -> Result<Vec<Spell>, CharacterOpError> {
            Ok(vec![])
        }
    }

    fn op(opcode: OpCode) -> u32 {
        u32::from(u16::from(opcode))
    }

    fn account() -> Account {
        Account {
            id: AccountId(1),
            username: "TEST".to_string(),
            salt: Salt([0; 32]),
            verifier: Verifier([0; 32]),
            session_key: Some([1; 40]),
        }
    }

    fn bob() -> CharacterData {
        let race = Race::Human;
        let class = Class::Warrior;
        CharacterData {
            guid: CharacterId(0x42),
            account: AccountId(1),
            name: "Bob".to_string(),
            race,
            class,
            gender: Gender::Male,
            features: CharacterFeatures::default(),
            stats: new_character_stats(race, class, Gender::Male),
            position: race_defaults(race).start,
        }
    }

    /// A session backed by a real localhost socket; the returned stream
    /// is the client end.
    async fn test_session(client_id: u64) -> (Arc<Session>, TcpStream) {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let addr = listener.local_addr().expect("addr");
        let (client, accepted) =
            tokio::join!(TcpStream::connect(addr), listener.accept());
        let (server, _) = accepted.expect("accept");
        let (_read, write) = server.into_split();
        let session = Arc::new(Session::new(ClientId(client_id), write, 0x5EED));
        (session, client.expect("connect"))
    }

    async fn read_frame(client: &mut TcpStream) -> (u16, Vec<u8>) {
        let mut header = [0u8; 4];
        client.read_exact(&mut header).await.expect("header");
        let size = u16::from_be_bytes([header[0], header[1]]) as usize;
        let opcode = u16::from_le_bytes([header[2], header[3]]);
        let mut body = vec![0u8; size - 2];
        client.read_exact(&mut body).await.expect("body");
        (opcode, body)
    }

    async fn world_with_bob() -> World<MemoryAccounts, MemoryCharacters> {
        World::new(MemoryAccounts, MemoryCharacters::with(vec![bob()]))
    }

    async fn login(
        world: &World<MemoryAccounts, MemoryCharacters>,
        client_id: u64,
    ) -> (Arc<Session>, TcpStream) {
        let (session, mut client) = test_session(client_id).await;
        world.add_session(session.clone()).await;
        session.set_account(account()).await;
        session.set_state(WorldState::CharList).await;

        world
            .handle_packet(&session, op(OpCode::CmsgPlayerLogin), &0x42u64.to_le_bytes())
            .await
            .expect("login");

        let (opcode, body) = read_frame(&mut client).await;
        assert_eq!(opcode, u16::from(OpCode::SmsgLoginVerifyWorld));
        assert_eq!(&body[..4], &0u32.to_le_bytes());

        let (opcode, _) = read_frame(&mut client).await;
        assert_eq!(opcode, u16::from(OpCode::SmsgUpdateObject));

        (session, client)
    }

    #[tokio::test]
    async fn player_login_enters_the_world() {
        let world = world_with_bob().await;
        let (session, _client) = login(&world, 1).await;

        assert_eq!(session.state().await, WorldState::InWorld);
        assert!(session.flags().await.worldport_ack_pending);
        let entry = session.player().await.expect("player set");
        assert_eq!(entry.lock().await.name, "Bob");
    }

    #[tokio::test]
    async fn name_query_reports_identity() {
        let world = world_with_bob().await;
        let (session, mut client) = login(&world, 1).await;
        let guid = session.player().await.unwrap().lock().await.guid();

        world
            .handle_packet(&session, op(OpCode::CmsgNameQuery), &guid.0.to_le_bytes())
            .await
            .expect("name query");

        let (opcode, body) = read_frame(&mut client).await;
        assert_eq!(opcode, u16::from(OpCode::SmsgNameQueryResponse));

        let mut expected = guid.0.to_le_bytes().to_vec();
        expected.extend(b"Bob\0");
        expected.extend([1, 0, 0, 0]);
        expected.extend([0, 0, 0, 0]);
        expected.extend([1, 0, 0, 0]);
        assert_eq!(body, expected);
    }

    #[tokio::test]
    async fn worldport_ack_is_single_shot() {
        let world = world_with_bob().await;
        let (session, _client) = login(&world, 1).await;

        world
            .handle_packet(&session, op(OpCode::MsgMoveWorldportAck), &[])
            .await
            .expect("expected ack accepted");
        assert!(!session.flags().await.worldport_ack_pending);

        // A second ack has nothing pending and is a protocol error.
        assert!(world
            .handle_packet(&session, op(OpCode::MsgMoveWorldportAck), &[])
            .await
            .is_err());
    }

    #[tokio::test]
    async fn update_tick_replicates_dirty_fields_to_owner() {
        let world = world_with_bob().await;
        let (session, mut client) = login(&world, 1).await;

        let entry = session.player().await.unwrap();
        {
            let mut player = entry.lock().await;
            let health = player.unit.object.get(runeward_game::objects::UnitField::Health);
            player
                .unit
                .object
                .set(runeward_game::objects::UnitField::Health, health.unwrap() - 10);
        }

        world.update_tick().await;
        let (opcode, body) = read_frame(&mut client).await;
        assert_eq!(opcode, u16::from(OpCode::SmsgUpdateObject));
        // One partial block for our own guid.
        assert_eq!(&body[..4], &1u32.to_le_bytes());
        assert_eq!(body[5], 0);

        // Nothing dirty any more: the next tick sends nothing, which we
        // verify by pushing a ping through the same socket.
        world.update_tick().await;
        world
            .handle_packet(&session, op(OpCode::CmsgPing), &[1, 0, 0, 0, 5, 0, 0, 0])
            .await
            .expect("ping");
        let (opcode, _) = read_frame(&mut client).await;
        assert_eq!(opcode, u16::from(OpCode::SmsgPong));
    }

    #[tokio::test]
    async fn say_reaches_every_session_in_world() {
        let world = world_with_bob().await;
        let (session, mut client) = login(&world, 1).await;

        let mut body = Vec::new();
        body.extend(0u32.to_le_bytes()); // say
        body.extend(7u32.to_le_bytes());
        body.extend(b"hello\0");

        world
            .handle_packet(&session, op(OpCode::CmsgMessageChat), &body)
            .await
            .expect("chat");

        let (opcode, body) = read_frame(&mut client).await;
        assert_eq!(opcode, u16::from(OpCode::SmsgMessageChat));
        assert_eq!(body[0], 0);
    }

    #[tokio::test]
    async fn unknown_opcodes_are_fatal_before_world_only() {
        let world = world_with_bob().await;

        let (session, _client) = test_session(7).await;
        world.add_session(session.clone()).await;
        session.set_state(WorldState::AuthSession).await;
        assert!(world.handle_packet(&session, 0xDEAD, &[]).await.is_err());

        let (session, _client) = login(&world, 8).await;
        assert!(world.handle_packet(&session, 0xDEAD, &[]).await.is_ok());
        assert_eq!(session.state().await, WorldState::InWorld);
    }
}
