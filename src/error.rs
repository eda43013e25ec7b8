use thiserror::Error;

#[derive(Error, Debug)]
pub enum EjsonError {
    #[error("invalid json: {0}")]
    InvalidJson(String),

    #[error("{0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid boxed message: {0}")]
    InvalidBoxedMessage(String),

    #[error("public key not present in EJSON file")]
    PublicKeyMissing,

    #[error("public key has invalid format")]
    PublicKeyInvalid,

    #[error("invalid public key")]
    InvalidPublicKey,

    #[error("invalid private key")]
    InvalidPrivateKey,

    #[error("invalid private key retrieved from keydir")]
    InvalidKeydirKey,

    #[error("couldn't read key file ({0})")]
    KeyFileRead(String),

    #[error("couldn't decrypt message")]
    Decryption,

    #[error("couldn't encrypt message: {0}")]
    Encryption(String),

    #[error("key generation failed: {0}")]
    KeyGeneration(String),

    #[error("environment is not set in ejson")]
    EnvironmentMissing,

    #[error("environment is not a map")]
    EnvironmentNotMap,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, EjsonError>;
