//! HS256 bearer token signer.

use dpp_ports::{TokenClaims, TokenError, TokenSigner};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};

pub struct HmacTokenSigner {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
}

impl HmacTokenSigner {
    pub fn new(secret: &str) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
        }
    }
}

impl TokenSigner for HmacTokenSigner {
    fn sign(&self, claims: &TokenClaims) -> Result<String, TokenError> {
        encode(&Header::new(Algorithm::HS256), claims, &self.encoding_key).map_err(|e| {
            TokenError::Invalid {
                reason: e.to_string(),
            }
        })
    }

    fn verify(&self, token: &str) -> Result<TokenClaims, TokenError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = true;
        validation.leeway = 0;

        let data = decode::<TokenClaims>(token, &self.decoding_key, &validation).map_err(|e| {
            match e.kind() {
                jsonwebtoken::errors::ErrorKind::ExpiredSignature => TokenError::Expired,
                _ => TokenError::Invalid {
                    reason: e.to_string(),
                },
            }
        })?;
        Ok(data.claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn claims(exp_offset_secs: i64) -> TokenClaims {
        let now = chrono::Utc::now().timestamp();
        TokenClaims {
            agent_id: "agent-1".to_string(),
            verified_at: now,
            expires_in: 3600,
            stages_passed: vec![1, 2, 3, 4],
            iat: now,
            exp: now + exp_offset_secs,
        }
    }

    #[test]
    fn signs_and_verifies_a_fresh_token() {
        let signer = HmacTokenSigner::new("test-secret");
        let token = signer.sign(&claims(3600)).unwrap();
        let verified = signer.verify(&token).unwrap();
        assert_eq!(verified.agent_id, "agent-1");
        assert_eq!(verified.stages_passed, vec![1, 2, 3, 4]);
    }

    #[test]
    fn rejects_an_expired_token() {
        let signer = HmacTokenSigner::new("test-secret");
        let token = signer.sign(&claims(-10)).unwrap();
        let err = signer.verify(&token).unwrap_err();
        assert_eq!(err, TokenError::Expired);
    }

    #[test]
    fn rejects_a_token_signed_with_a_different_secret() {
        let signer_a = HmacTokenSigner::new("secret-a");
        let signer_b = HmacTokenSigner::new("secret-b");
        let token = signer_a.sign(&claims(3600)).unwrap();
        assert!(signer_b.verify(&token).is_err());
    }
}
