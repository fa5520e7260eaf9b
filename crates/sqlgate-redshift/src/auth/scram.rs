//! SCRAM-SHA-256 client (RFC 5802 / RFC 7677), without channel binding.

use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64};
use hmac::{Hmac, Mac};
use rand::{Rng, distributions::Alphanumeric, thread_rng};
use sha2::{Digest, Sha256};
use sqlgate_core::Error;

use super::{auth_error, protocol_error};

type HmacSha256 = Hmac<Sha256>;

/// SASL mechanism name advertised by the server.
pub const MECHANISM: &str = "SCRAM-SHA-256";

/// State of one SCRAM exchange.
pub struct ScramClient {
    username: String,
    password: String,
    client_nonce: String,
    // Set once the server-first message has been processed.
    salted_password: Option<[u8; 32]>,
    auth_message: Option<String>,
}

impl ScramClient {
    pub fn new(username: &str, password: &str) -> Self {
        let nonce: String = thread_rng()
            .sample_iter(&Alphanumeric)
            .take(24)
            .map(char::from)
            .collect();
        Self::with_nonce(username, password, nonce)
    }

    fn with_nonce(username: &str, password: &str, client_nonce: String) -> Self {
        Self {
            username: username.to_string(),
            password: password.to_string(),
            client_nonce,
            salted_password: None,
            auth_message: None,
        }
    }

    fn client_first_bare(&self) -> String {
        format!("n={},r={}", self.username, self.client_nonce)
    }

    /// `client-first-message`: gs2 header `n,,` plus the bare message.
    pub fn client_first(&self) -> Vec<u8> {
        format!("n,,{}", self.client_first_bare()).into_bytes()
    }

    /// Consume `server-first-message` and produce `client-final-message`.
    #[allow(clippy::result_large_err)]
    pub fn process_server_first(&mut self, data: &[u8]) -> Result<Vec<u8>, Error> {
        let server_first = std::str::from_utf8(data)
            .map_err(|e| protocol_error(format!("invalid UTF-8 in SASL continue: {e}")))?;

        let mut nonce = None;
        let mut salt = None;
        let mut iterations = None;
        for attr in server_first.split(',') {
            if let Some(v) = attr.strip_prefix("r=") {
                nonce = Some(v);
            } else if let Some(v) = attr.strip_prefix("s=") {
                salt = Some(
                    BASE64
                        .decode(v)
                        .map_err(|e| protocol_error(format!("invalid SCRAM salt: {e}")))?,
                );
            } else if let Some(v) = attr.strip_prefix("i=") {
                iterations = Some(
                    v.parse::<u32>()
                        .map_err(|e| protocol_error(format!("invalid SCRAM iteration count: {e}")))?,
                );
            }
        }

        let nonce = nonce.ok_or_else(|| protocol_error("SCRAM server-first missing nonce"))?;
        let salt = salt.ok_or_else(|| protocol_error("SCRAM server-first missing salt"))?;
        let iterations =
            iterations.ok_or_else(|| protocol_error("SCRAM server-first missing iterations"))?;

        if !nonce.starts_with(&self.client_nonce) || nonce.len() == self.client_nonce.len() {
            return Err(auth_error("SCRAM server nonce does not extend client nonce"));
        }

        let mut salted_password = [0u8; 32];
        pbkdf2::pbkdf2::<HmacSha256>(
            self.password.as_bytes(),
            &salt,
            iterations,
            &mut salted_password,
        )
        .map_err(|e| protocol_error(format!("PBKDF2 failed: {e}")))?;

        // "biws" is base64("n,,")
        let without_proof = format!("c=biws,r={nonce}");
        let auth_message = format!(
            "{},{server_first},{without_proof}",
            self.client_first_bare()
        );

        let client_key = hmac_sha256(&salted_password, b"Client Key")?;
        let stored_key: [u8; 32] = Sha256::digest(client_key).into();
        let client_signature = hmac_sha256(&stored_key, auth_message.as_bytes())?;
        let proof: Vec<u8> = client_key
            .iter()
            .zip(client_signature.iter())
            .map(|(k, s)| k ^ s)
            .collect();

        self.salted_password = Some(salted_password);
        self.auth_message = Some(auth_message);

        Ok(format!("{without_proof},p={}", BASE64.encode(proof)).into_bytes())
    }

    /// Check the server signature carried by `server-final-message`.
    #[allow(clippy::result_large_err)]
    pub fn verify_server_final(&self, data: &[u8]) -> Result<(), Error> {
        let server_final = std::str::from_utf8(data)
            .map_err(|e| protocol_error(format!("invalid UTF-8 in SASL final: {e}")))?;

        if let Some(err) = server_final.strip_prefix("e=") {
            return Err(auth_error(format!("SCRAM authentication rejected: {err}")));
        }
        let signature = server_final
            .split(',')
            .find_map(|attr| attr.strip_prefix("v="))
            .ok_or_else(|| protocol_error("SCRAM server-final missing verifier"))?;
        let signature = BASE64
            .decode(signature)
            .map_err(|e| protocol_error(format!("invalid SCRAM server signature: {e}")))?;

        let (Some(salted_password), Some(auth_message)) =
            (self.salted_password.as_ref(), self.auth_message.as_ref())
        else {
            return Err(protocol_error("SCRAM server-final received before server-first"));
        };

        let server_key = hmac_sha256(salted_password, b"Server Key")?;
        let mut mac = HmacSha256::new_from_slice(&server_key)
            .map_err(|e| protocol_error(format!("HMAC init failed: {e}")))?;
        mac.update(auth_message.as_bytes());
        mac.verify_slice(&signature)
            .map_err(|_| auth_error("SCRAM server signature mismatch"))
    }
}

#[allow(clippy::result_large_err)]
fn hmac_sha256(key: &[u8], data: &[u8]) -> Result<[u8; 32], Error> {
    let mut mac = HmacSha256::new_from_slice(key)
        .map_err(|e| protocol_error(format!("HMAC init failed: {e}")))?;
    mac.update(data);
    Ok(mac.finalize().into_bytes().into())
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Plays the server side of the exchange for a known password.
    struct FakeServer {
        salted_password: [u8; 32],
    }

    impl FakeServer {
        fn new(password: &str, salt: &[u8], iterations: u32) -> Self {
            let mut salted_password = [0u8; 32];
            pbkdf2::pbkdf2::<HmacSha256>(password.as_bytes(), salt, iterations, &mut salted_password)
                .unwrap();
            Self { salted_password }
        }

        fn check_proof(&self, auth_message: &str, proof_b64: &str) -> bool {
            let client_key = hmac_sha256(&self.salted_password, b"Client Key").unwrap();
            let stored_key: [u8; 32] = Sha256::digest(client_key).into();
            let signature = hmac_sha256(&stored_key, auth_message.as_bytes()).unwrap();
            let proof = BASE64.decode(proof_b64).unwrap();
            let recovered: Vec<u8> = proof.iter().zip(signature.iter()).map(|(p, s)| p ^ s).collect();
            let recovered_stored: [u8; 32] = Sha256::digest(&recovered).into();
            recovered_stored == stored_key
        }

        fn server_final(&self, auth_message: &str) -> Vec<u8> {
            let server_key = hmac_sha256(&self.salted_password, b"Server Key").unwrap();
            let sig = hmac_sha256(&server_key, auth_message.as_bytes()).unwrap();
            format!("v={}", BASE64.encode(sig)).into_bytes()
        }
    }

    #[test]
    fn test_full_exchange_against_fake_server() {
        let salt = b"redshift-salt";
        let server = FakeServer::new("s3cret", salt, 4096);
        let mut client = ScramClient::with_nonce("awsuser", "s3cret", "clientnonce".into());

        assert_eq!(client.client_first(), b"n,,n=awsuser,r=clientnonce");

        let server_first = format!("r=clientnonceSERVER,s={},i=4096", BASE64.encode(salt));
        let client_final =
            String::from_utf8(client.process_server_first(server_first.as_bytes()).unwrap())
                .unwrap();

        let (without_proof, proof) = client_final.rsplit_once(",p=").unwrap();
        assert_eq!(without_proof, "c=biws,r=clientnonceSERVER");

        let auth_message = format!("n=awsuser,r=clientnonce,{server_first},{without_proof}");
        assert!(server.check_proof(&auth_message, proof));

        client
            .verify_server_final(&server.server_final(&auth_message))
            .unwrap();
    }

    #[test]
    fn test_wrong_password_fails_server_verification() {
        let salt = b"salt";
        let server = FakeServer::new("right", salt, 16);
        let mut client = ScramClient::with_nonce("u", "wrong", "abc".into());

        let server_first = format!("r=abcdef,s={},i=16", BASE64.encode(salt));
        client.process_server_first(server_first.as_bytes()).unwrap();
        let auth_message = format!("n=u,r=abc,{server_first},c=biws,r=abcdef");

        assert!(
            client
                .verify_server_final(&server.server_final(&auth_message))
                .is_err()
        );
    }

    #[test]
    fn test_rejects_foreign_nonce_and_missing_fields() {
        let mut client = ScramClient::with_nonce("u", "p", "abc".into());
        assert!(client.process_server_first(b"r=zzz,s=c2FsdA==,i=1").is_err());
        assert!(client.process_server_first(b"r=abc,s=c2FsdA==,i=1").is_err());
        assert!(client.process_server_first(b"r=abcd,i=1").is_err());
        assert!(client.verify_server_final(b"v=AAAA").is_err());
        assert!(client.verify_server_final(b"e=invalid-proof").is_err());
    }

    #[test]
    fn test_random_nonce_is_alphanumeric() {
        let client = ScramClient::new("u", "p");
        let first = String::from_utf8(client.client_first()).unwrap();
        let nonce = first.strip_prefix("n,,n=u,r=").unwrap();
        assert_eq!(nonce.len(), 24);
        assert!(nonce.chars().all(|c| c.is_ascii_alphanumeric()));
    }
}
