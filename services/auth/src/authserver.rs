use std::convert::TryFrom;
use std::net::Ipv4Addr;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    net::{TcpListener, TcpStream},
};
use tracing::{debug, event, instrument, Level};

use runeward_game::{accounts::AccountService, realms::RealmList};
use runeward_protocol::auth::{AuthCommand, ConnectProof, ConnectRequest};

use crate::connection::{LoginConnection, LoginState};

/// The login listener: one dispatch task per accepted connection, packets
/// processed strictly in arrival order.
pub struct AuthServer<A, R> {
    pub accounts: A,
    pub realms: R,
}

impl<A: AccountService + 'static, R: RealmList + 'static> AuthServer<A, R> {
    #[instrument(skip(self))]
    pub async fn start(self: Arc<Self>, host: Ipv4Addr, port: u16) -> Result<()> {
        let listener = TcpListener::bind((host, port))
            .await
            .with_context(|| format!("could not bind login port {port}"))?;
        event!(Level::INFO, "listening on {host}:{port}");

        loop {
            let (stream, peer) = listener.accept().await?;
            let server = self.clone();
            tokio::spawn(async move {
                if let Err(e) = server.connect_loop(stream).await {
                    debug!("connection from {peer} ended: {e}");
                }
            });
        }
    }

    /// A connection carries at most one handshake: challenge, proof, then
    /// realm list requests until the socket closes.
    #[instrument(skip(self, stream))]
    async fn connect_loop(&self, mut stream: TcpStream) -> Result<()> {
        let mut connection = LoginConnection::new();

        while connection.state() != LoginState::Closed {
            let opcode = match stream.read_u8().await {
                Ok(opcode) => opcode,
                // The peer hanging up between packets is a normal end.
                Err(_) => break,
            };

            let command = match AuthCommand::try_from(opcode) {
                Ok(command) => command,
                Err(_) => {
                    connection.close();
                    bail!("unknown login opcode {opcode:#x}");
                }
            };
            if !connection.accepts(command) {
                connection.close();
                bail!("{command:?} not permitted in {:?}", connection.state());
            }

            let response = match command {
                AuthCommand::LoginChallenge => {
                    let mut payload = vec![0u8; 33];
                    stream.read_exact(&mut payload).await?;
                    let name_len = usize::from(payload[32]);
                    let mut name = vec![0u8; name_len];
                    stream.read_exact(&mut name).await?;
                    payload.extend_from_slice(&name);

                    let request = ConnectRequest::read(&payload)
                        .map_err(|e| anyhow::anyhow!("bad challenge packet: {e}"))?;
                    connection.handle_challenge(request, &self.accounts).await
                }
                AuthCommand::LoginProof => {
                    let mut payload = [0u8; 73];
                    stream.read_exact(&mut payload).await?;
                    let proof = ConnectProof::read(&payload)
                        .map_err(|e| anyhow::anyhow!("bad proof packet: {e}"))?;
                    connection.handle_proof(proof, &self.accounts).await
                }
                AuthCommand::RealmList => {
                    let mut reserved = [0u8; 4];
                    stream.read_exact(&mut reserved).await?;
                    connection.handle_realmlist(&self.realms).await
                }
            };

            stream.write_all(&response).await?;
            stream.flush().await?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod test {
    use std::collections::HashMap;
    use std::convert::TryInto;

    use async_trait::async_trait;
    use num_bigint::BigUint;
    use sha1::{Digest, Sha1};
    use test_case::test_case;
    use tokio::sync::RwLock;

    use runeward_game::accounts::{Account, AccountId, AccountOpError};
    use runeward_game::realms::{Realm, RealmId, RealmType};
    use runeward_srp::{register, Salt, SessionKey, Verifier};

    use super::*;

    struct MemoryAccounts {
        accounts: RwLock<HashMap<String, Account>>,
    }

    impl MemoryAccounts {
        fn with_account(username: &str, password: &str) -> Self {
            let (verifier, salt) = register(username, password);
            let account = Account {
                id: AccountId(1),
                username: username.to_uppercase(),
                salt,
                verifier,
                session_key: None,
            };
            Self {
                accounts: RwLock::new(HashMap::from([(account.username.clone(), account)])),
            }
        }
    }

    #[async_trait]
    impl AccountService for MemoryAccounts {
        async fn account_by_name(
            &self,
            username: &str,
        ) -> Result<Option<Account>, AccountOpError> {
            Ok(self.accounts.read().await.get(&username.to_uppercase()).cloned())
        }

        async fn create_account(
            &self,
            username: &str,
            salt: Salt,
            verifier: Verifier,
        ) -> Result<AccountId, AccountOpError> {
            let mut accounts = self.accounts.write().await;
            let id = AccountId(accounts.len() as u32 + 1);
            accounts.insert(
                username.to_uppercase(),
                Account {
                    id,
                    username: username.to_uppercase(),
                    salt,
                    verifier,
                    session_key: None,
                },
            );
            Ok(id)
        }

        async fn set_session_key(
            &self,
            username: &str,
            key: &SessionKey,
        ) -> Result<(), AccountOpError> {
            self.accounts
                .write()
                .await
                .get_mut(&username.to_uppercase())
                .map(|account| account.session_key = Some(*key))
                .ok_or_else(|| AccountOpError::PersistError("no such account".into()))
        }

        async fn session_key(
            &self,
            username: &str,
        ) -> Result<Option<SessionKey>, AccountOpError> {
            Ok(self
                .accounts
                .read()
                .await
                .get(&username.to_uppercase())
                .and_then(|account| account.session_key))
        }
    }

    struct StaticRealms(Vec<Realm>);

    #[async_trait]
    impl RealmList for StaticRealms {
        async fn realms(&self) -> Vec<Realm> {
            self.0.clone()
        }
    }

    fn request(username: &str, build: u16) -> ConnectRequest {
        ConnectRequest {
            error: 0,
            size: 30 + username.len() as u16,
            game_name: *b"WoW\0",
            version: [1, 1, 2],
            build,
            platform: *b"68x\0",
            os: *b"niW\0",
            locale: *b"SUne",
            timezone_bias: 60,
            ip: [127, 0, 0, 1],
            username: username.to_string(),
        }
    }

    /// Client-side SRP math, independent of the server crate.
    struct TestClient {
        n: BigUint,
        g: BigUint,
        a: BigUint,
        a_pub: [u8; 32],
        x: BigUint,
    }

    impl TestClient {
        fn new(username: &str, password: &str, salt: &[u8; 32]) -> Self {
            let n = BigUint::from_bytes_be(&[
                0x89, 0x4B, 0x64, 0x5E, 0x89, 0xE1, 0x53, 0x5B, 0xBD, 0xAD, 0x5B, 0x8B, 0x29,
                0x06, 0x50, 0x53, 0x08, 0x01, 0xB1, 0x8E, 0xBF, 0xBF, 0x5E, 0x8F, 0xAB, 0x3C,
                0x82, 0x87, 0x2A, 0x3E, 0x9B, 0xB7,
            ]);
            let g = BigUint::from(7u8);

            let inner = Sha1::digest(format!("{username}:{password}").to_uppercase().as_bytes());
            let mut d = Sha1::new();
            d.update(salt);
            d.update(inner);
            let x = BigUint::from_bytes_le(&d.finalize());

            // a = 1, so A = g.
            let a = BigUint::from(1u8);
            let mut a_pub = [0u8; 32];
            a_pub[0] = 7;

            Self { n, g, a, a_pub, x }
        }

        fn proof(
            &self,
            username: &str,
            salt: &[u8; 32],
            b_pub: &[u8; 32],
        ) -> ([u8; 40], [u8; 20]) {
            let mut d = Sha1::new();
            d.update(self.a_pub);
            d.update(b_pub);
            let u = BigUint::from_bytes_le(&d.finalize());

            let b_num = BigUint::from_bytes_le(b_pub);
            let k = BigUint::from(3u8);
            let g_x = self.g.modpow(&self.x, &self.n);
            let base = (b_num + &self.n - (k * g_x) % &self.n) % &self.n;
            let secret = base.modpow(&(&self.a + &u * &self.x), &self.n);

            let mut s = secret.to_bytes_le();
            s.resize(32, 0);
            let mut even = [0u8; 16];
            let mut odd = [0u8; 16];
            for i in 0..16 {
                even[i] = s[2 * i];
                odd[i] = s[2 * i + 1];
            }
            let he = Sha1::digest(&even);
            let ho = Sha1::digest(&odd);
            let mut key = [0u8; 40];
            for i in 0..20 {
                key[2 * i] = he[i];
                key[2 * i + 1] = ho[i];
            }

            let n_bytes = {
                let mut b = self.n.to_bytes_le();
                b.resize(32, 0);
                b
            };
            let hn_xor_hg: Vec<u8> = Sha1::digest(&n_bytes)
                .iter()
                .zip(Sha1::digest(&self.g.to_bytes_le()))
                .map(|(n, g)| n ^ g)
                .collect();

            let mut d = Sha1::new();
            d.update(&hn_xor_hg);
            d.update(Sha1::digest(username.to_uppercase().as_bytes()));
            d.update(salt);
            d.update(self.a_pub);
            d.update(b_pub);
            d.update(key);
            (key, d.finalize().try_into().unwrap())
        }
    }

    #[tokio::test]
    async fn full_handshake_derives_matching_keys() {
        let accounts = MemoryAccounts::with_account("TEST", "PASSWORD");
        let mut connection = LoginConnection::new();

        let challenge = connection
            .handle_challenge(request("TEST", 4125), &accounts)
            .await;
        assert_eq!(&challenge[..3], &[0x00, 0x00, 0x00]);
        assert_eq!(connection.state(), LoginState::SentChallenge);

        let b_pub: [u8; 32] = challenge[3..35].try_into().unwrap();
        let salt: [u8; 32] = challenge[70..102].try_into().unwrap();

        let client = TestClient::new("TEST", "PASSWORD", &salt);
        let (client_key, m1) = client.proof("TEST", &salt, &b_pub);

        let response = connection
            .handle_proof(
                ConnectProof {
                    a_pub: client.a_pub,
                    client_proof: m1,
                    crc_hash: [0; 20],
                    key_count: 0,
                },
                &accounts,
            )
            .await;

        assert_eq!(&response[..2], &[0x01, 0x00]);
        assert_eq!(connection.state(), LoginState::SentProof);

        // Both sides agree on K; the world server will read it from the
        // store to check the auth-session digest.
        let stored = accounts.session_key("TEST").await.unwrap().unwrap();
        assert_eq!(stored, client_key);

        // M2 = H(A || M1 || K), from the client's view.
        let mut d = Sha1::new();
        d.update(client.a_pub);
        d.update(m1);
        d.update(client_key);
        let m2: [u8; 20] = d.finalize().try_into().unwrap();
        assert_eq!(&response[2..22], &m2);
    }

    #[tokio::test]
    async fn unknown_account_closes_with_result_code() {
        let accounts = MemoryAccounts::with_account("TEST", "PASSWORD");
        let mut connection = LoginConnection::new();

        let response = connection
            .handle_challenge(request("NOBODY", 4125), &accounts)
            .await;
        assert_eq!(response, vec![0x00, 0x00, 0x04]);
        assert_eq!(connection.state(), LoginState::Closed);
    }

    #[tokio::test]
    async fn wrong_build_is_rejected() {
        let accounts = MemoryAccounts::with_account("TEST", "PASSWORD");
        let mut connection = LoginConnection::new();

        let response = connection
            .handle_challenge(request("TEST", 9999), &accounts)
            .await;
        assert_eq!(response, vec![0x00, 0x00, 0x09]);
        assert_eq!(connection.state(), LoginState::Closed);
    }

    #[tokio::test]
    async fn wrong_proof_closes_the_connection() {
        let accounts = MemoryAccounts::with_account("TEST", "PASSWORD");
        let mut connection = LoginConnection::new();
        connection
            .handle_challenge(request("TEST", 4125), &accounts)
            .await;

        let response = connection
            .handle_proof(
                ConnectProof {
                    a_pub: [7; 32],
                    client_proof: [0; 20],
                    crc_hash: [0; 20],
                    key_count: 0,
                },
                &accounts,
            )
            .await;
        assert_eq!(response, vec![0x01, 0x01]);
        assert_eq!(connection.state(), LoginState::Closed);
        assert!(accounts.session_key("TEST").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn realmlist_reports_configured_realms() {
        let realms = StaticRealms(vec![Realm {
            id: RealmId(1),
            name: "Runeward".to_string(),
            realm_type: RealmType::Normal,
            external_address: "127.0.0.1".to_string(),
            port: 8085,
            flags: 0,
            timezone: 1,
            population: 0.0,
        }]);

        let connection = LoginConnection::new();
        let response = connection.handle_realmlist(&realms).await;
        assert_eq!(response[0], 0x10);
        assert_eq!(response[7], 1);
    }

    #[test_case(LoginState::Init, AuthCommand::LoginChallenge, true)]
    #[test_case(LoginState::Init, AuthCommand::LoginProof, false)]
    #[test_case(LoginState::Init, AuthCommand::RealmList, false)]
    #[test_case(LoginState::SentChallenge, AuthCommand::LoginProof, true)]
    #[test_case(LoginState::SentChallenge, AuthCommand::LoginChallenge, false)]
    #[test_case(LoginState::SentProof, AuthCommand::RealmList, true)]
    #[test_case(LoginState::SentProof, AuthCommand::LoginChallenge, false)]
    fn state_gates_opcodes(state: LoginState, command: AuthCommand, expected: bool) {
        let mut connection = LoginConnection::new();
        connection.force_state(state);
        assert_eq!(connection.accepts(command), expected);
    }
}
