use rand::Rng;
use tracing::{debug, warn};

use runeward_game::{accounts::AccountService, realms::RealmList};
use runeward_protocol::auth::{
    challenge_failure, proof_failure, proof_success, realm_list_response, AuthCommand,
    ConnectChallenge, ConnectProof, ConnectRequest, LoginResult,
};
use runeward_srp::SrpServer;

/// The client build this realm accepts.
pub const EXPECTED_BUILD: u16 = 4125;

/// Login handshake states. Closed is terminal; the read loop stops
/// consuming bytes once it is reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoginState {
    Init,
    SentChallenge,
    SentProof,
    Closed,
}

/// One in-flight login handshake: the current state, the account under
/// negotiation once the challenge is accepted, and the SRP context.
pub struct LoginConnection {
    state: LoginState,
    username: Option<String>,
    srp: Option<SrpServer>,
}

impl LoginConnection {
    pub fn new() -> Self {
        Self {
            state: LoginState::Init,
            username: None,
            srp: None,
        }
    }

    pub fn state(&self) -> LoginState {
        self.state
    }

    pub fn close(&mut self) {
        self.state = LoginState::Closed;
    }

    #[cfg(test)]
    pub(crate) fn force_state(&mut self, state: LoginState) {
        self.state = state;
    }

    /// Whether `command` may arrive in the current state. Anything else
    /// is a protocol state error and fatal on this port.
    pub fn accepts(&self, command: AuthCommand) -> bool {
        matches!(
            (self.state, command),
            (LoginState::Init, AuthCommand::LoginChallenge)
                | (LoginState::SentChallenge, AuthCommand::LoginProof)
                | (LoginState::SentProof, AuthCommand::RealmList)
        )
    }

    /// LOGIN_CHALLENGE: look up the account and answer with the SRP
    /// public parameters.
    pub async fn handle_challenge(
        &mut self,
        request: ConnectRequest,
        accounts: &dyn AccountService,
    ) -> Vec<u8> {
        debug!("auth challenge for {}", request.username);

        if request.build != EXPECTED_BUILD {
            warn!(
                "{} connected with unsupported build {}",
                request.username, request.build
            );
            self.state = LoginState::Closed;
            return challenge_failure(LoginResult::VersionInvalid);
        }

        let account = match accounts.account_by_name(&request.username).await {
            Ok(Some(account)) => account,
            Ok(None) => {
                self.state = LoginState::Closed;
                return challenge_failure(LoginResult::UnknownAccount);
            }
            Err(e) => {
                // Store trouble aborts the handler but not the handshake.
                warn!("could not look up {}: {e}", request.username);
                return challenge_failure(LoginResult::DbBusy);
            }
        };

        let srp = SrpServer::new(&account.username, account.salt, account.verifier);
        let response = ConnectChallenge {
            b_pub: *srp.b_pub(),
            g: srp.g_bytes(),
            n: srp.n_bytes(),
            salt: *srp.salt(),
            pad: rand::thread_rng().gen(),
        }
        .to_bytes();

        self.username = Some(account.username);
        self.srp = Some(srp);
        self.state = LoginState::SentChallenge;
        response
    }

    /// LOGIN_PROOF: derive the session key, compare proofs byte-wise and
    /// answer with the server proof on a match.
    pub async fn handle_proof(
        &mut self,
        proof: ConnectProof,
        accounts: &dyn AccountService,
    ) -> Vec<u8> {
        let (srp, username) = match (&self.srp, &self.username) {
            (Some(srp), Some(username)) => (srp, username),
            _ => {
                self.state = LoginState::Closed;
                return proof_failure(LoginResult::Failed);
            }
        };

        match srp.verify_proof(&proof.a_pub, &proof.client_proof) {
            Some((session_key, server_proof)) => {
                if let Err(e) = accounts.set_session_key(username, &session_key).await {
                    warn!("could not persist session key for {username}: {e}");
                    return proof_failure(LoginResult::DbBusy);
                }
                debug!("{username} authenticated");
                self.state = LoginState::SentProof;
                proof_success(&server_proof)
            }
            None => {
                warn!("wrong proof for {username}");
                self.state = LoginState::Closed;
                proof_failure(LoginResult::Failed)
            }
        }
    }

    /// REALMLIST: emit the configured realms. Does not change state.
    pub async fn handle_realmlist(&self, realms: &dyn RealmList) -> Vec<u8> {
        realm_list_response(&realms.realms().await)
    }
}

impl Default for LoginConnection {
    fn default() -> Self {
        Self::new()
    }
}
