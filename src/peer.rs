use crate::error::{Error, Result};
use iroh::SecretKey;
use rand::rngs::OsRng;
use rand::RngCore;
use std::fmt;
use std::fs;
use std::io::ErrorKind;
use std::path::Path;

/// Identity of a network participant: the iroh node id, an ed25519 public key.
///
/// Its text form is what the rpc layer sees in place of a `host:port`.
pub use iroh::NodeId as PeerId;

/// Decodes the text form of a peer id, as found in an rpc target address.
pub fn parse_peer_id(addr: &str) -> Result<PeerId> {
    addr.parse::<PeerId>()
        .map_err(|e| Error::invalid_peer_address(addr, e))
}

/// Secret key material of the local participant.
#[derive(Clone)]
pub struct Keypair {
    secret: SecretKey,
}

impl Keypair {
    pub fn generate() -> Self {
        let mut raw = [0u8; 32];
        OsRng.fill_bytes(&mut raw);
        Self {
            secret: SecretKey::from_bytes(&raw),
        }
    }

    pub fn from_hex(s: &str) -> Result<Self> {
        let bytes = hex::decode(s.trim()).map_err(|e| Error::InvalidKey(e.to_string()))?;
        let raw: [u8; 32] = bytes
            .as_slice()
            .try_into()
            .map_err(|_| Error::InvalidKey("secret key must be 32 bytes".into()))?;
        Ok(Self {
            secret: SecretKey::from_bytes(&raw),
        })
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.secret.to_bytes())
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::from_hex(&fs::read_to_string(path)?)
    }

    /// Loads the key at `path`, creating and persisting a fresh one if the file
    /// does not exist yet.
    pub fn load_or_generate<P: AsRef<Path>>(path: P) -> Result<Self> {
        match Self::load(path.as_ref()) {
            Err(Error::Io(e)) if e.kind() == ErrorKind::NotFound => {
                let key = Self::generate();
                key.save(path)?;
                log::debug!("generated new key {}", key.public().fmt_short());
                Ok(key)
            }
            r => r,
        }
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        fs::write(path, format!("{}\n", self.to_hex()))?;
        Ok(())
    }

    pub fn public(&self) -> PeerId {
        self.secret.public()
    }

    pub(crate) fn secret(&self) -> &SecretKey {
        &self.secret
    }
}

impl fmt::Debug for Keypair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Keypair")
            .field("public", &self.public())
            .finish_non_exhaustive()
    }
}
