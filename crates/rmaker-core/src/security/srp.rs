//! SRP6a over the RFC 5054 3072-bit group with SHA-512.
//!
//! Constructions (all hashes SHA-512, `PAD` left-pads to the byte length of
//! `N`, integers are serialized big-endian without leading zeros):
//!
//! ```text
//! k  = H(N | PAD(g))
//! x  = H(s | H(I ":" P))
//! v  = g^x mod N
//! A  = g^a mod N                     B = (k*v + g^b) mod N
//! u  = H(PAD(A) | PAD(B))
//! S  = (B - k*v)^(a + u*x) mod N     S = (A * v^u)^b mod N
//! K  = H(S)
//! M1 = H(H(N) xor H(PAD(g)) | H(I) | s | A | B | K)
//! M2 = H(A | M1 | K)
//! ```
//!
//! Both halves live here: [`SrpClient`] is used by the provisioning session,
//! [`SrpVerifier`] backs the device responder used in loopback tests.

use std::sync::OnceLock;

use num_bigint::BigUint;
use sha2::{Digest, Sha512};
use thiserror::Error;
use zeroize::Zeroizing;

/// Byte length of the private ephemerals `a` and `b`.
const EPHEMERAL_LEN: usize = 32;

/// Generator for the 3072-bit group.
const GENERATOR: u32 = 5;

/// RFC 5054 / RFC 3526 3072-bit safe prime.
#[rustfmt::skip]
const PRIME_3072: [u8; 384] = [
    0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xc9, 0x0f, 0xda, 0xa2,
    0x21, 0x68, 0xc2, 0x34, 0xc4, 0xc6, 0x62, 0x8b, 0x80, 0xdc, 0x1c, 0xd1,
    0x29, 0x02, 0x4e, 0x08, 0x8a, 0x67, 0xcc, 0x74, 0x02, 0x0b, 0xbe, 0xa6,
    0x3b, 0x13, 0x9b, 0x22, 0x51, 0x4a, 0x08, 0x79, 0x8e, 0x34, 0x04, 0xdd,
    0xef, 0x95, 0x19, 0xb3, 0xcd, 0x3a, 0x43, 0x1b, 0x30, 0x2b, 0x0a, 0x6d,
    0xf2, 0x5f, 0x14, 0x37, 0x4f, 0xe1, 0x35, 0x6d, 0x6d, 0x51, 0xc2, 0x45,
    0xe4, 0x85, 0xb5, 0x76, 0x62, 0x5e, 0x7e, 0xc6, 0xf4, 0x4c, 0x42, 0xe9,
    0xa6, 0x37, 0xed, 0x6b, 0x0b, 0xff, 0x5c, 0xb6, 0xf4, 0x06, 0xb7, 0xed,
    0xee, 0x38, 0x6b, 0xfb, 0x5a, 0x89, 0x9f, 0xa5, 0xae, 0x9f, 0x24, 0x11,
    0x7c, 0x4b, 0x1f, 0xe6, 0x49, 0x28, 0x66, 0x51, 0xec, 0xe4, 0x5b, 0x3d,
    0xc2, 0x00, 0x7c, 0xb8, 0xa1, 0x63, 0xbf, 0x05, 0x98, 0xda, 0x48, 0x36,
    0x1c, 0x55, 0xd3, 0x9a, 0x69, 0x16, 0x3f, 0xa8, 0xfd, 0x24, 0xcf, 0x5f,
    0x83, 0x65, 0x5d, 0x23, 0xdc, 0xa3, 0xad, 0x96, 0x1c, 0x62, 0xf3, 0x56,
    0x20, 0x85, 0x52, 0xbb, 0x9e, 0xd5, 0x29, 0x07, 0x70, 0x96, 0x96, 0x6d,
    0x67, 0x0c, 0x35, 0x4e, 0x4a, 0xbc, 0x98, 0x04, 0xf1, 0x74, 0x6c, 0x08,
    0xca, 0x18, 0x21, 0x7c, 0x32, 0x90, 0x5e, 0x46, 0x2e, 0x36, 0xce, 0x3b,
    0xe3, 0x9e, 0x77, 0x2c, 0x18, 0x0e, 0x86, 0x03, 0x9b, 0x27, 0x83, 0xa2,
    0xec, 0x07, 0xa2, 0x8f, 0xb5, 0xc5, 0x5d, 0xf0, 0x6f, 0x4c, 0x52, 0xc9,
    0xde, 0x2b, 0xcb, 0xf6, 0x95, 0x58, 0x17, 0x18, 0x39, 0x95, 0x49, 0x7c,
    0xea, 0x95, 0x6a, 0xe5, 0x15, 0xd2, 0x26, 0x18, 0x98, 0xfa, 0x05, 0x10,
    0x15, 0x72, 0x8e, 0x5a, 0x8a, 0xaa, 0xc4, 0x2d, 0xad, 0x33, 0x17, 0x0d,
    0x04, 0x50, 0x7a, 0x33, 0xa8, 0x55, 0x21, 0xab, 0xdf, 0x1c, 0xba, 0x64,
    0xec, 0xfb, 0x85, 0x04, 0x58, 0xdb, 0xef, 0x0a, 0x8a, 0xea, 0x71, 0x57,
    0x5d, 0x06, 0x0c, 0x7d, 0xb3, 0x97, 0x0f, 0x85, 0xa6, 0xe1, 0xe4, 0xc7,
    0xab, 0xf5, 0xae, 0x8c, 0xdb, 0x09, 0x33, 0xd7, 0x1e, 0x8c, 0x94, 0xe0,
    0x4a, 0x25, 0x61, 0x9d, 0xce, 0xe3, 0xd2, 0x26, 0x1a, 0xd2, 0xee, 0x6b,
    0xf1, 0x2f, 0xfa, 0x06, 0xd9, 0x8a, 0x08, 0x64, 0xd8, 0x76, 0x02, 0x73,
    0x3e, 0xc8, 0x6a, 0x64, 0x52, 0x1f, 0x2b, 0x18, 0x17, 0x7b, 0x20, 0x0c,
    0xbb, 0xe1, 0x17, 0x57, 0x7a, 0x61, 0x5d, 0x6c, 0x77, 0x09, 0x88, 0xc0,
    0xba, 0xd9, 0x46, 0xe2, 0x08, 0xe2, 0x4f, 0xa0, 0x74, 0xe5, 0xab, 0x31,
    0x43, 0xdb, 0x5b, 0xfc, 0xe0, 0xfd, 0x10, 0x8e, 0x4b, 0x82, 0xd1, 0x20,
    0xa9, 0x3a, 0xd2, 0xca, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff,
];

/// Errors from the SRP arithmetic.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SrpError {
    /// The peer's public ephemeral is zero modulo `N` (or `u` is zero).
    #[error("peer public key is invalid")]
    InvalidPublicKey,
    /// The client proof `M1` did not match.
    #[error("client proof mismatch")]
    BadClientProof,
}

// ── Group parameters ──────────────────────────────────────────────────────────

struct Group {
    n: BigUint,
    g: BigUint,
    k: BigUint,
    /// `H(N) xor H(PAD(g))`
    hn_xor_hg: Vec<u8>,
}

fn group() -> &'static Group {
    static GROUP: OnceLock<Group> = OnceLock::new();
    GROUP.get_or_init(|| {
        let n = BigUint::from_bytes_be(&PRIME_3072);
        let g = BigUint::from(GENERATOR);
        let padded_g = pad(&g);
        let k = BigUint::from_bytes_be(&hash(&[&PRIME_3072, &padded_g]));
        let hn = hash(&[&PRIME_3072]);
        let hg = hash(&[&padded_g]);
        let hn_xor_hg = hn.iter().zip(hg.iter()).map(|(a, b)| a ^ b).collect();
        Group { n, g, k, hn_xor_hg }
    })
}

fn hash(parts: &[&[u8]]) -> Vec<u8> {
    let mut h = Sha512::new();
    for part in parts {
        h.update(part);
    }
    h.finalize().to_vec()
}

fn pad(value: &BigUint) -> Vec<u8> {
    let bytes = value.to_bytes_be();
    let mut out = vec![0u8; PRIME_3072.len().saturating_sub(bytes.len())];
    out.extend_from_slice(&bytes);
    out
}

/// Strips leading zero bytes by round-tripping through an integer.
fn normalize(bytes: &[u8]) -> Vec<u8> {
    BigUint::from_bytes_be(bytes).to_bytes_be()
}

fn random_ephemeral() -> BigUint {
    let bytes: [u8; EPHEMERAL_LEN] = rand::random();
    BigUint::from_bytes_be(&bytes)
}

fn compute_x(salt: &[u8], username: &str, password: &str) -> BigUint {
    let inner = hash(&[username.as_bytes(), b":", password.as_bytes()]);
    BigUint::from_bytes_be(&hash(&[&normalize(salt), &normalize(&inner)]))
}

fn compute_u(a_pub: &BigUint, b_pub: &BigUint) -> BigUint {
    BigUint::from_bytes_be(&hash(&[&pad(a_pub), &pad(b_pub)]))
}

fn compute_m1(
    username: &str,
    salt: &[u8],
    a_pub: &BigUint,
    b_pub: &BigUint,
    key: &[u8],
) -> Vec<u8> {
    let hi = hash(&[username.as_bytes()]);
    hash(&[
        &group().hn_xor_hg,
        &hi,
        &normalize(salt),
        &a_pub.to_bytes_be(),
        &b_pub.to_bytes_be(),
        key,
    ])
}

fn compute_m2(a_pub: &BigUint, m1: &[u8], key: &[u8]) -> Vec<u8> {
    hash(&[&a_pub.to_bytes_be(), m1, key])
}

/// Computes the password verifier `v` stored on the device.
pub fn compute_verifier(salt: &[u8], username: &str, password: &str) -> Vec<u8> {
    let grp = group();
    grp.g
        .modpow(&compute_x(salt, username, password), &grp.n)
        .to_bytes_be()
}

// ── Client ────────────────────────────────────────────────────────────────────

/// Output of a successful client-side challenge computation.
pub struct ClientProof {
    /// `M1`, sent to the device.
    pub proof: Vec<u8>,
    /// `M2` the device must answer with.
    pub expected_device_proof: Vec<u8>,
    /// Shared session key `K` (64 bytes).
    pub session_key: Zeroizing<Vec<u8>>,
}

/// Client half of the exchange.
pub struct SrpClient {
    username: String,
    password: Zeroizing<String>,
    a: BigUint,
    a_pub: BigUint,
}

impl SrpClient {
    pub fn new(username: &str, password: &str) -> Self {
        let grp = group();
        let a = random_ephemeral();
        let a_pub = grp.g.modpow(&a, &grp.n);
        Self {
            username: username.to_string(),
            password: Zeroizing::new(password.to_string()),
            a,
            a_pub,
        }
    }

    /// Public ephemeral `A`.
    pub fn public_key(&self) -> Vec<u8> {
        self.a_pub.to_bytes_be()
    }

    /// Derives `K`, `M1` and the expected `M2` from the device's salt and `B`.
    ///
    /// # Errors
    ///
    /// Returns [`SrpError::InvalidPublicKey`] when `B mod N == 0` or `u == 0`.
    pub fn process_challenge(&self, salt: &[u8], b_bytes: &[u8]) -> Result<ClientProof, SrpError> {
        let grp = group();
        let b_pub = BigUint::from_bytes_be(b_bytes);
        let b_mod = &b_pub % &grp.n;
        if b_mod == BigUint::from(0u32) {
            return Err(SrpError::InvalidPublicKey);
        }
        let u = compute_u(&self.a_pub, &b_pub);
        if u == BigUint::from(0u32) {
            return Err(SrpError::InvalidPublicKey);
        }
        let x = compute_x(salt, &self.username, &self.password);
        let kv = (&grp.k * grp.g.modpow(&x, &grp.n)) % &grp.n;
        let base = (b_mod + &grp.n - kv) % &grp.n;
        let exponent = &self.a + &u * &x;
        let s = base.modpow(&exponent, &grp.n);

        let session_key = Zeroizing::new(hash(&[&s.to_bytes_be()]));
        let proof = compute_m1(&self.username, salt, &self.a_pub, &b_pub, &session_key);
        let expected_device_proof = compute_m2(&self.a_pub, &proof, &session_key);
        Ok(ClientProof {
            proof,
            expected_device_proof,
            session_key,
        })
    }
}

// ── Device ────────────────────────────────────────────────────────────────────

/// Output of a successful device-side proof check.
pub struct DeviceProof {
    /// `M2`, returned to the client.
    pub proof: Vec<u8>,
    pub session_key: Zeroizing<Vec<u8>>,
}

/// Device half of the exchange, holding the stored verifier.
pub struct SrpVerifier {
    username: String,
    salt: Vec<u8>,
    v: BigUint,
    b: BigUint,
    b_pub: BigUint,
}

impl SrpVerifier {
    pub fn new(username: &str, salt: &[u8], verifier: &[u8]) -> Self {
        let grp = group();
        let v = BigUint::from_bytes_be(verifier);
        let b = random_ephemeral();
        let b_pub = (&grp.k * &v + grp.g.modpow(&b, &grp.n)) % &grp.n;
        Self {
            username: username.to_string(),
            salt: salt.to_vec(),
            v,
            b,
            b_pub,
        }
    }

    /// Public ephemeral `B`.
    pub fn public_key(&self) -> Vec<u8> {
        self.b_pub.to_bytes_be()
    }

    /// Checks the client's `M1` and produces `M2` and `K`.
    ///
    /// # Errors
    ///
    /// Returns [`SrpError::InvalidPublicKey`] for a degenerate `A` and
    /// [`SrpError::BadClientProof`] when `M1` does not match.
    pub fn verify_client(&self, a_bytes: &[u8], client_proof: &[u8]) -> Result<DeviceProof, SrpError> {
        let grp = group();
        let a_pub = BigUint::from_bytes_be(a_bytes);
        if &a_pub % &grp.n == BigUint::from(0u32) {
            return Err(SrpError::InvalidPublicKey);
        }
        let u = compute_u(&a_pub, &self.b_pub);
        let s = ((&a_pub * self.v.modpow(&u, &grp.n)) % &grp.n).modpow(&self.b, &grp.n);
        let session_key = Zeroizing::new(hash(&[&s.to_bytes_be()]));
        let expected = compute_m1(&self.username, &self.salt, &a_pub, &self.b_pub, &session_key);
        if expected != client_proof {
            return Err(SrpError::BadClientProof);
        }
        Ok(DeviceProof {
            proof: compute_m2(&a_pub, client_proof, &session_key),
            session_key,
        })
    }
}
