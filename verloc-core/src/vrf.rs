//! ECVRF-EDWARDS25519-SHA512-ELL2, draft-irtf-cfrg-vrf-03, suite `0x04`.
//!
//! Elligator2 hash-to-curve, RFC 8032 nonce generation, 16-byte challenge.
//! Proofs are 80 bytes (`Gamma || c || s`), hash outputs 64 bytes.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use curve25519_dalek::{
    edwards::{CompressedEdwardsY, EdwardsPoint},
    scalar::Scalar,
};
use num_bigint::BigUint;
use num_traits::{One, Zero};
use rand::{CryptoRng, RngCore};
use sha2::{Digest, Sha512};

use crate::error::{Error, Result};

const SUITE: u8 = 0x04;
const MONTGOMERY_A: u32 = 486_662;

pub const SECRET_KEY_LEN: usize = 32;
pub const PUBLIC_KEY_LEN: usize = 32;
pub const PROOF_LEN: usize = 80;
pub const HASH_LEN: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Proof(pub [u8; PROOF_LEN]);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VrfHash(pub [u8; HASH_LEN]);

impl Proof {
    pub fn to_base64(&self) -> String {
        BASE64.encode(self.0)
    }

    pub fn from_base64(s: &str) -> Result<Self> {
        let bytes = BASE64
            .decode(s)
            .map_err(|e| Error::CryptoInvalid(format!("proof is not base64: {e}")))?;
        let arr: [u8; PROOF_LEN] = bytes
            .try_into()
            .map_err(|_| Error::CryptoInvalid("proof must be 80 bytes".into()))?;
        Ok(Self(arr))
    }
}

impl VrfHash {
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn to_base64(&self) -> String {
        BASE64.encode(self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VrfOutput {
    pub proof: Proof,
    pub hash: VrfHash,
}

pub struct VrfKeypair {
    secret: [u8; SECRET_KEY_LEN],
    scalar: Scalar,
    nonce_prefix: [u8; 32],
    public: [u8; PUBLIC_KEY_LEN],
}

impl VrfKeypair {
    pub fn from_secret(secret: &[u8; SECRET_KEY_LEN]) -> Self {
        let digest = Sha512::digest(secret);
        let mut scalar_bytes = [0u8; 32];
        scalar_bytes.copy_from_slice(&digest[..32]);
        scalar_bytes[0] &= 248;
        scalar_bytes[31] &= 127;
        scalar_bytes[31] |= 64;
        let mut nonce_prefix = [0u8; 32];
        nonce_prefix.copy_from_slice(&digest[32..]);

        let scalar = Scalar::from_bytes_mod_order(scalar_bytes);
        let public = EdwardsPoint::mul_base(&scalar).compress().to_bytes();
        Self {
            secret: *secret,
            scalar,
            nonce_prefix,
            public,
        }
    }

    pub fn generate<R: RngCore + CryptoRng>(rng: &mut R) -> Self {
        let mut secret = [0u8; SECRET_KEY_LEN];
        rng.fill_bytes(&mut secret);
        Self::from_secret(&secret)
    }

    pub fn public_key(&self) -> [u8; PUBLIC_KEY_LEN] {
        self.public
    }

    pub fn secret_key(&self) -> &[u8; SECRET_KEY_LEN] {
        &self.secret
    }

    pub fn prove(&self, alpha: &[u8]) -> Result<Proof> {
        let h = hash_to_curve(&self.public, alpha)?;
        let h_bytes = h.compress().to_bytes();
        let gamma = h * self.scalar;

        let mut hasher = Sha512::new();
        hasher.update(self.nonce_prefix);
        hasher.update(h_bytes);
        let k = Scalar::from_bytes_mod_order_wide(&hasher.finalize().into());

        let c = challenge(&h, &gamma, &EdwardsPoint::mul_base(&k), &(h * k));
        let s = k + challenge_scalar(&c) * self.scalar;

        let mut pi = [0u8; PROOF_LEN];
        pi[..32].copy_from_slice(gamma.compress().as_bytes());
        pi[32..48].copy_from_slice(&c);
        pi[48..].copy_from_slice(s.as_bytes());
        Ok(Proof(pi))
    }

    pub fn evaluate(&self, alpha: &[u8]) -> Result<VrfOutput> {
        let proof = self.prove(alpha)?;
        let hash = proof_to_hash(&proof)?;
        Ok(VrfOutput { proof, hash })
    }
}

pub fn prove(secret_key: &[u8; SECRET_KEY_LEN], message: &[u8]) -> Result<Proof> {
    VrfKeypair::from_secret(secret_key).prove(message)
}

pub fn public_key(secret_key: &[u8; SECRET_KEY_LEN]) -> [u8; PUBLIC_KEY_LEN] {
    VrfKeypair::from_secret(secret_key).public_key()
}

pub fn proof_to_hash(proof: &Proof) -> Result<VrfHash> {
    let (gamma, _, _) = decode_proof(proof)?;
    let mut hasher = Sha512::new();
    hasher.update([SUITE, 0x03]);
    hasher.update(gamma.mul_by_cofactor().compress().as_bytes());
    Ok(VrfHash(hasher.finalize().into()))
}

pub fn verify(public_key: &[u8; PUBLIC_KEY_LEN], proof: &Proof, message: &[u8]) -> Result<VrfHash> {
    let y = decode_point(public_key, "public key")?;
    let (gamma, c, s) = decode_proof(proof)?;
    let h = hash_to_curve(public_key, message)?;

    let c_scalar = challenge_scalar(&c);
    let u = EdwardsPoint::mul_base(&s) - y * c_scalar;
    let v = h * s - gamma * c_scalar;

    if challenge(&h, &gamma, &u, &v) != c {
        return Err(Error::CryptoInvalid("VRF verification failed: challenge mismatch".into()));
    }
    proof_to_hash(proof)
}

fn decode_point(bytes: &[u8; 32], what: &str) -> Result<EdwardsPoint> {
    CompressedEdwardsY(*bytes)
        .decompress()
        .ok_or_else(|| Error::CryptoInvalid(format!("{what} is not a curve point")))
}

fn decode_proof(proof: &Proof) -> Result<(EdwardsPoint, [u8; 16], Scalar)> {
    let mut gamma_bytes = [0u8; 32];
    gamma_bytes.copy_from_slice(&proof.0[..32]);
    let gamma = decode_point(&gamma_bytes, "gamma")?;

    let mut c = [0u8; 16];
    c.copy_from_slice(&proof.0[32..48]);

    let mut s_bytes = [0u8; 32];
    s_bytes.copy_from_slice(&proof.0[48..]);
    let s = Option::<Scalar>::from(Scalar::from_canonical_bytes(s_bytes))
        .ok_or_else(|| Error::CryptoInvalid("proof scalar is not canonical".into()))?;
    Ok((gamma, c, s))
}

fn challenge(
    h: &EdwardsPoint,
    gamma: &EdwardsPoint,
    u: &EdwardsPoint,
    v: &EdwardsPoint,
) -> [u8; 16] {
    let mut hasher = Sha512::new();
    hasher.update([SUITE, 0x02]);
    for p in [h, gamma, u, v] {
        hasher.update(p.compress().as_bytes());
    }
    let digest = hasher.finalize();
    let mut c = [0u8; 16];
    c.copy_from_slice(&digest[..16]);
    c
}

fn challenge_scalar(c: &[u8; 16]) -> Scalar {
    let mut wide = [0u8; 32];
    wide[..16].copy_from_slice(c);
    Scalar::from_bytes_mod_order(wide)
}

fn field_prime() -> BigUint {
    (BigUint::one() << 255u32) - BigUint::from(19u32)
}

fn field_inv(x: &BigUint, p: &BigUint) -> BigUint {
    x.modpow(&(p - BigUint::from(2u32)), p)
}

fn hash_to_curve(public_key: &[u8; 32], alpha: &[u8]) -> Result<EdwardsPoint> {
    let mut hasher = Sha512::new();
    hasher.update([SUITE, 0x01]);
    hasher.update(public_key);
    hasher.update(alpha);
    let digest = hasher.finalize();

    let mut truncated = [0u8; 32];
    truncated.copy_from_slice(&digest[..32]);
    truncated[31] &= 0x7f;

    let p = field_prime();
    let a = BigUint::from(MONTGOMERY_A);
    let r = BigUint::from_bytes_le(&truncated);

    let denom = (BigUint::one() + BigUint::from(2u32) * &r * &r) % &p;
    let u = ((&p - &a) * field_inv(&denom, &p)) % &p;
    let w = (&u * ((&u * &u + &a * &u + BigUint::one()) % &p)) % &p;
    let e = w.modpow(&((&p - BigUint::one()) >> 1u32), &p);

    let final_u = if e == &p - BigUint::one() {
        (BigUint::from(2u32) * &p - &u - &a) % &p
    } else if e.is_zero() {
        let half_a = (&a * field_inv(&BigUint::from(2u32), &p)) % &p;
        (&p - half_a) % &p
    } else {
        u
    };

    let denominator = field_inv(&((&final_u + BigUint::one()) % &p), &p);
    let y = ((&final_u + &p - BigUint::one()) * denominator) % &p;
    let mut y_bytes = [0u8; 32];
    let le = y.to_bytes_le();
    y_bytes[..le.len()].copy_from_slice(&le);

    let prelim = decode_point(&y_bytes, "hash-to-curve output")?;
    let h = prelim.mul_by_cofactor();
    if h == EdwardsPoint::default() {
        return Err(Error::CryptoInvalid("hash-to-curve produced the identity".into()));
    }
    Ok(h)
}
