use anyhow::{bail, Result};
use md5::Md5;
use sha1::Sha1;
use sha2::{Digest, Sha256};

/// A digest value from a Release hash table.
#[derive(PartialEq, Eq, Clone, Debug)]
pub enum Checksum {
    Md5(Vec<u8>),
    Sha1(Vec<u8>),
    Sha256(Vec<u8>),
}

pub enum ChecksumValidator {
    Md5((Vec<u8>, Md5)),
    Sha1((Vec<u8>, Sha1)),
    Sha256((Vec<u8>, Sha256)),
}

impl ChecksumValidator {
    pub fn update(&mut self, data: impl AsRef<[u8]>) {
        match self {
            ChecksumValidator::Md5((_, v)) => v.update(data),
            ChecksumValidator::Sha1((_, v)) => v.update(data),
            ChecksumValidator::Sha256((_, v)) => v.update(data),
        }
    }

    pub fn finish(self) -> bool {
        match self {
            ChecksumValidator::Md5((c, v)) => c == v.finalize().to_vec(),
            ChecksumValidator::Sha1((c, v)) => c == v.finalize().to_vec(),
            ChecksumValidator::Sha256((c, v)) => c == v.finalize().to_vec(),
        }
    }
}

impl Checksum {
    pub fn from_str(kind: &str, hex_str: &str) -> Result<Self> {
        let expected_len = match kind {
            "md5" => 32,
            "sha1" => 40,
            "sha256" => 64,
            _ => bail!("Unsupported hash type {kind}"),
        };
        if hex_str.len() != expected_len {
            bail!("Malformed {kind} string: bad length");
        }
        let bytes = hex::decode(hex_str)?;
        Ok(match kind {
            "md5" => Checksum::Md5(bytes),
            "sha1" => Checksum::Sha1(bytes),
            _ => Checksum::Sha256(bytes),
        })
    }

    pub fn get_validator(&self) -> ChecksumValidator {
        match self {
            Checksum::Md5(c) => ChecksumValidator::Md5((c.clone(), Md5::new())),
            Checksum::Sha1(c) => ChecksumValidator::Sha1((c.clone(), Sha1::new())),
            Checksum::Sha256(c) => ChecksumValidator::Sha256((c.clone(), Sha256::new())),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn validate_sha256() {
        // sha256 of "test"
        let c = Checksum::from_str(
            "sha256",
            "9f86d081884c7d659a2feaa0c55ad015a3bf4f1b2b0b822cd15d6c15b0f00a08",
        )
        .unwrap();
        let mut v = c.get_validator();
        v.update(b"te");
        v.update(b"st");
        assert!(v.finish());

        let mut v = c.get_validator();
        v.update(b"best");
        assert!(!v.finish());
    }

    #[test]
    fn reject_bad_length() {
        assert!(Checksum::from_str("md5", "abcd").is_err());
        assert!(Checksum::from_str("sha512", &"0".repeat(128)).is_err());
    }
}
