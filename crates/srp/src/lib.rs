//! runeward-srp
//!
//! Server side of the SRP-6 variant spoken by the vanilla-era login
//! protocol: 256-bit safe prime, `g = 7`, `k = 3`, SHA-1 throughout, and
//! every big integer little-endian on the wire.
//!
//! The engine is pure; it performs no I/O and touches no globals beyond
//! the protocol constants.

#![deny(
    missing_docs,
    missing_debug_implementations,
    trivial_casts,
    trivial_numeric_casts,
    unsafe_code,
    unused_import_braces,
    unused_qualifications
)]

use std::convert::TryInto;

use lazy_static::lazy_static;
use num_bigint::BigUint;
use rand::Rng;
use serde::Serialize;
use sha1::{Digest, Sha1};

lazy_static! {
    static ref G: BigUint = BigUint::from(7u8);
    static ref K: BigUint = BigUint::from(3u8);
    static ref N: BigUint = BigUint::from_bytes_be(&[
        0x89, 0x4B, 0x64, 0x5E, 0x89, 0xE1, 0x53, 0x5B, 0xBD, 0xAD, 0x5B, 0x8B, 0x29, 0x06, 0x50,
        0x53, 0x08, 0x01, 0xB1, 0x8E, 0xBF, 0xBF, 0x5E, 0x8F, 0xAB, 0x3C, 0x82, 0x87, 0x2A, 0x3E,
        0x9B, 0xB7,
    ]);
}

/// Byte length of the server's private ephemeral `b`.
const PRIVATE_EPHEMERAL_LEN: usize = 19;

/// The 40-byte shared secret derived from a completed handshake. It seeds
/// the world-protocol header cipher and the auth-session digest.
pub type SessionKey = [u8; 40];

/// A per-account random salt, fixed at account creation.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Salt(pub [u8; 32]);

impl Salt {
    /// Draw a fresh random salt.
    pub fn random() -> Self {
        Self(rand::thread_rng().gen())
    }
}

/// The password verifier `v = g^x mod N`, stored in place of the password.
/// Little-endian, padded to 32 bytes.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Verifier(pub [u8; 32]);

impl From<&Verifier> for BigUint {
    fn from(v: &Verifier) -> Self {
        Self::from_bytes_le(&v.0)
    }
}

impl Verifier {
    /// Derive a verifier from credentials and a salt.
    ///
    /// `x = H(salt || H(upper(name) || ":" || upper(password)))`, read
    /// little-endian, then `v = g^x mod N`.
    pub fn from_credentials(username: &str, password: &str, salt: &Salt) -> Self {
        let inner = {
            let mut d = Sha1::new();
            d.update(username.to_uppercase().as_bytes());
            d.update(b":");
            d.update(password.to_uppercase().as_bytes());
            d.finalize()
        };

        let x = {
            let mut d = Sha1::new();
            d.update(salt.0);
            d.update(inner);
            BigUint::from_bytes_le(&d.finalize())
        };

        Self(pad_le(&G.modpow(&x, &N), 32).try_into().expect("32 bytes"))
    }

    /// Wrap raw verifier bytes loaded from the store.
    pub fn from_raw(data: [u8; 32]) -> Self {
        Self(data)
    }
}

/// Compute a fresh `(verifier, salt)` pair for account creation.
pub fn register(username: &str, password: &str) -> (Verifier, Salt) {
    let salt = Salt::random();
    (Verifier::from_credentials(username, password, &salt), salt)
}

/// One server-side handshake: holds the account's salt and verifier plus
/// the ephemeral key pair for this login attempt.
#[derive(Clone, Debug, PartialEq)]
pub struct SrpServer {
    salt: Salt,
    verifier: Verifier,
    identity_hash: [u8; 20],
    b: BigUint,
    b_pub: [u8; 32],
}

impl SrpServer {
    /// Begin a handshake with a random private ephemeral.
    pub fn new(username: &str, salt: Salt, verifier: Verifier) -> Self {
        let mut rng = rand::thread_rng();
        loop {
            let mut b = [0u8; PRIVATE_EPHEMERAL_LEN];
            rng.fill(&mut b[..]);
            if let Some(server) = Self::with_private_key(username, salt, verifier, &b) {
                return server;
            }
        }
    }

    /// Begin a handshake with a caller-supplied private ephemeral.
    ///
    /// Returns `None` when the resulting public ephemeral is zero, in which
    /// case the caller must pick a different `b`.
    pub fn with_private_key(
        username: &str,
        salt: Salt,
        verifier: Verifier,
        b: &[u8],
    ) -> Option<Self> {
        let b = BigUint::from_bytes_le(b);
        let b_pub = (&*K * BigUint::from(&verifier) + G.modpow(&b, &N)) % &*N;
        if b_pub == BigUint::from(0u8) {
            return None;
        }

        Some(Self {
            salt,
            verifier,
            identity_hash: Sha1::digest(username.to_uppercase().as_bytes())
                .try_into()
                .expect("sha1 digests are 20 bytes"),
            b,
            b_pub: pad_le(&b_pub, 32).try_into().expect("32 bytes"),
        })
    }

    /// The generator, little-endian, minimal length.
    pub fn g_bytes(&self) -> Vec<u8> {
        G.to_bytes_le()
    }

    /// The prime modulus, little-endian.
    pub fn n_bytes(&self) -> Vec<u8> {
        N.to_bytes_le()
    }

    /// The salt this handshake was started with.
    pub fn salt(&self) -> &Salt {
        &self.salt
    }

    /// The server's public ephemeral `B`.
    pub fn b_pub(&self) -> &[u8; 32] {
        &self.b_pub
    }

    /// Check the client's proof `M1` against the client public ephemeral.
    ///
    /// On success returns the 40-byte session key and the server proof
    /// `M2 = H(A || M1 || K)`. Returns `None` for a zero `A mod N` or a
    /// proof mismatch; both are terminal for the login attempt.
    pub fn verify_proof(
        &self,
        a_pub: &[u8; 32],
        client_proof: &[u8; 20],
    ) -> Option<(SessionKey, [u8; 20])> {
        let a = BigUint::from_bytes_le(a_pub);
        if (&a % &*N) == BigUint::from(0u8) {
            return None;
        }

        let u = {
            let mut d = Sha1::new();
            d.update(a_pub);
            d.update(self.b_pub);
            BigUint::from_bytes_le(&d.finalize())
        };

        let verifier = BigUint::from(&self.verifier);
        let secret = (a * verifier.modpow(&u, &N)).modpow(&self.b, &N);
        let session_key = interleave(&pad_le(&secret, 32).try_into().expect("32 bytes"));

        let expected = self.client_proof(a_pub, &session_key);
        if &expected != client_proof {
            return None;
        }

        let server_proof = {
            let mut d = Sha1::new();
            d.update(a_pub);
            d.update(expected);
            d.update(session_key);
            d.finalize().try_into().expect("sha1 digests are 20 bytes")
        };

        Some((session_key, server_proof))
    }

    /// `M1 = H(H(N) XOR H(g) || H(upper(name)) || salt || A || B || K)`.
    fn client_proof(&self, a_pub: &[u8; 32], session_key: &SessionKey) -> [u8; 20] {
        let hn_xor_hg: Vec<u8> = Sha1::digest(&N.to_bytes_le())
            .iter()
            .zip(Sha1::digest(&G.to_bytes_le()))
            .map(|(n, g)| n ^ g)
            .collect();

        let mut d = Sha1::new();
        d.update(&hn_xor_hg);
        d.update(self.identity_hash);
        d.update(self.salt.0);
        d.update(a_pub);
        d.update(self.b_pub);
        d.update(session_key);
        d.finalize().try_into().expect("sha1 digests are 20 bytes")
    }
}

/// Derive the session key from the premaster secret by interleaved SHA-1:
/// even and odd indexed bytes are hashed separately and the two digests
/// are woven back together.
fn interleave(secret: &[u8; 32]) -> SessionKey {
    let mut even = [0u8; 16];
    let mut odd = [0u8; 16];
    for (i, pair) in secret.chunks(2).enumerate() {
        even[i] = pair[0];
        odd[i] = pair[1];
    }

    let even = Sha1::digest(&even);
    let odd = Sha1::digest(&odd);

    let mut key = [0u8; 40];
    for (i, pair) in key.chunks_mut(2).enumerate() {
        pair[0] = even[i];
        pair[1] = odd[i];
    }
    key
}

/// Little-endian encoding zero-padded to `len` bytes.
fn pad_le(value: &BigUint, len: usize) -> Vec<u8> {
    let mut bytes = value.to_bytes_le();
    debug_assert!(bytes.len() <= len);
    bytes.resize(len, 0);
    bytes
}
