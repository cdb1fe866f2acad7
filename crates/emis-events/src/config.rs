//! Kafka configuration management.

use crate::error::EventError;
use std::env;
use std::str::FromStr;

/// Security protocol for Kafka connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SecurityProtocol {
    /// Plaintext connection (no encryption or auth).
    Plaintext,
    /// SSL encryption without SASL auth.
    Ssl,
    /// SASL authentication without encryption.
    SaslPlaintext,
    /// SASL authentication with SSL encryption.
    SaslSsl,
}

impl FromStr for SecurityProtocol {
    type Err = EventError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "PLAINTEXT" => Ok(Self::Plaintext),
            "SSL" => Ok(Self::Ssl),
            "SASL_PLAINTEXT" => Ok(Self::SaslPlaintext),
            "SASL_SSL" => Ok(Self::SaslSsl),
            _ => Err(EventError::ConfigInvalid {
                var: "KAFKA_SECURITY_PROTOCOL".to_string(),
                reason: format!("Unknown protocol: {s}"),
            }),
        }
    }
}

impl SecurityProtocol {
    /// Convert to rdkafka string value.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Plaintext => "PLAINTEXT",
            Self::Ssl => "SSL",
            Self::SaslPlaintext => "SASL_PLAINTEXT",
            Self::SaslSsl => "SASL_SSL",
        }
    }
}

/// SASL mechanism for authentication.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SaslMechanism {
    Plain,
    ScramSha256,
    ScramSha512,
}

impl FromStr for SaslMechanism {
    type Err = EventError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().replace('-', "_").as_str() {
            "PLAIN" => Ok(Self::Plain),
            "SCRAM_SHA_256" => Ok(Self::ScramSha256),
            "SCRAM_SHA_512" => Ok(Self::ScramSha512),
            _ => Err(EventError::ConfigInvalid {
                var: "KAFKA_SASL_MECHANISM".to_string(),
                reason: format!("Unknown mechanism: {s}"),
            }),
        }
    }
}

impl SaslMechanism {
    /// Convert to rdkafka string value.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Plain => "PLAIN",
            Self::ScramSha256 => "SCRAM-SHA-256",
            Self::ScramSha512 => "SCRAM-SHA-512",
        }
    }
}

/// SASL credentials for authentication.
#[derive(Debug, Clone)]
pub struct SaslCredentials {
    pub mechanism: SaslMechanism,
    pub username: String,
    pub password: String,
}

/// Required acknowledgement level for produced records.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Acks {
    /// Fire-and-forget: no broker acknowledgement.
    None,
    /// Leader has written the record.
    Leader,
    /// All in-sync replicas have written the record.
    All,
}

impl FromStr for Acks {
    type Err = EventError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "0" | "none" => Ok(Self::None),
            "1" | "leader" => Ok(Self::Leader),
            "all" | "-1" => Ok(Self::All),
            _ => Err(EventError::ConfigInvalid {
                var: "KAFKA_ACKS".to_string(),
                reason: format!("Unknown acks value: {s}"),
            }),
        }
    }
}

impl Acks {
    /// Convert to rdkafka string value.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::None => "0",
            Self::Leader => "1",
            Self::All => "all",
        }
    }
}

/// Compression algorithm for produced records.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Compression {
    None,
    Gzip,
    Snappy,
    Lz4,
    Zstd,
}

impl FromStr for Compression {
    type Err = EventError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "none" => Ok(Self::None),
            "gzip" => Ok(Self::Gzip),
            "snappy" => Ok(Self::Snappy),
            "lz4" => Ok(Self::Lz4),
            "zstd" => Ok(Self::Zstd),
            _ => Err(EventError::ConfigInvalid {
                var: "KAFKA_COMPRESSION".to_string(),
                reason: format!("Unknown compression type: {s}"),
            }),
        }
    }
}

impl Compression {
    /// Convert to rdkafka string value.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Gzip => "gzip",
            Self::Snappy => "snappy",
            Self::Lz4 => "lz4",
            Self::Zstd => "zstd",
        }
    }
}

/// Where the consumer starts when the group has no committed offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AutoOffsetReset {
    Earliest,
    Latest,
}

impl FromStr for AutoOffsetReset {
    type Err = EventError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "earliest" => Ok(Self::Earliest),
            "latest" => Ok(Self::Latest),
            _ => Err(EventError::ConfigInvalid {
                var: "KAFKA_AUTO_OFFSET_RESET".to_string(),
                reason: format!("Unknown offset reset policy: {s}"),
            }),
        }
    }
}

impl AutoOffsetReset {
    /// Convert to rdkafka string value.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Earliest => "earliest",
            Self::Latest => "latest",
        }
    }
}

/// Kafka connection configuration shared by the producer and consumer.
#[derive(Debug, Clone)]
pub struct KafkaConfig {
    /// Comma-separated list of broker addresses.
    pub bootstrap_servers: String,
    /// Client identifier.
    pub client_id: String,
    /// Security protocol.
    pub security_protocol: SecurityProtocol,
    /// SASL credentials (required if using SASL).
    pub sasl: Option<SaslCredentials>,

    // Producer settings
    /// Required acknowledgement level.
    pub acks: Acks,
    /// Number of client-side retries for a failed produce.
    pub message_send_max_retries: u32,
    /// Idempotent-producer mode. Requires `acks: All`.
    pub enable_idempotence: bool,
    /// Compression algorithm for produced records.
    pub compression: Compression,
    /// Broker request timeout in milliseconds.
    pub request_timeout_ms: u32,
    /// Total time budget for a single produce, including retries.
    pub message_timeout_ms: u32,

    // Consumer settings
    /// Consumer group id.
    pub group_id: String,
    /// Offset reset policy when the group has no committed offset.
    pub auto_offset_reset: AutoOffsetReset,
    /// Broker-side auto commit. Defaults to false: the consumer runtime
    /// commits explicitly after successful processing.
    pub enable_auto_commit: bool,
    /// Consumer group session timeout in milliseconds.
    pub session_timeout_ms: u32,
    /// Socket timeout in milliseconds.
    pub socket_timeout_ms: u32,
}

impl KafkaConfig {
    /// Load configuration from environment variables.
    ///
    /// Required:
    /// - `KAFKA_BOOTSTRAP_SERVERS`: Comma-separated broker list
    ///
    /// Optional:
    /// - `KAFKA_CLIENT_ID`: Client identifier (default: "emis-service")
    /// - `KAFKA_GROUP_ID`: Consumer group (default: "emis-event-bus")
    /// - `KAFKA_SECURITY_PROTOCOL`: PLAINTEXT (default), SSL, `SASL_PLAINTEXT`, `SASL_SSL`
    /// - `KAFKA_SASL_MECHANISM`: PLAIN, SCRAM-SHA-256, SCRAM-SHA-512 (required if SASL)
    /// - `KAFKA_SASL_USERNAME`: SASL username (required if SASL)
    /// - `KAFKA_SASL_PASSWORD`: SASL password (required if SASL)
    /// - `KAFKA_ACKS`: none, leader, all (default: all)
    /// - `KAFKA_COMPRESSION`: none, gzip, snappy, lz4 (default), zstd
    /// - `KAFKA_AUTO_OFFSET_RESET`: earliest (default), latest
    /// - `KAFKA_ENABLE_IDEMPOTENCE`: true (default), false
    pub fn from_env() -> Result<Self, EventError> {
        let bootstrap_servers =
            env::var("KAFKA_BOOTSTRAP_SERVERS").map_err(|_| EventError::ConfigMissing {
                var: "KAFKA_BOOTSTRAP_SERVERS".to_string(),
            })?;

        let mut builder = KafkaConfig::builder().bootstrap_servers(bootstrap_servers);

        if let Ok(v) = env::var("KAFKA_CLIENT_ID") {
            builder = builder.client_id(v);
        }
        if let Ok(v) = env::var("KAFKA_GROUP_ID") {
            builder = builder.group_id(v);
        }
        if let Ok(v) = env::var("KAFKA_SECURITY_PROTOCOL") {
            builder = builder.security_protocol(SecurityProtocol::from_str(&v)?);
        }
        if let Ok(v) = env::var("KAFKA_ACKS") {
            builder = builder.acks(Acks::from_str(&v)?);
        }
        if let Ok(v) = env::var("KAFKA_COMPRESSION") {
            builder = builder.compression(Compression::from_str(&v)?);
        }
        if let Ok(v) = env::var("KAFKA_AUTO_OFFSET_RESET") {
            builder = builder.auto_offset_reset(AutoOffsetReset::from_str(&v)?);
        }
        if let Ok(v) = env::var("KAFKA_ENABLE_IDEMPOTENCE") {
            let enabled = v.parse::<bool>().map_err(|_| EventError::ConfigInvalid {
                var: "KAFKA_ENABLE_IDEMPOTENCE".to_string(),
                reason: format!("Expected true or false, got: {v}"),
            })?;
            builder = builder.enable_idempotence(enabled);
        }

        let needs_sasl = matches!(
            builder.security_protocol,
            Some(SecurityProtocol::SaslPlaintext) | Some(SecurityProtocol::SaslSsl)
        );

        if needs_sasl {
            let mechanism_str =
                env::var("KAFKA_SASL_MECHANISM").map_err(|_| EventError::ConfigMissing {
                    var: "KAFKA_SASL_MECHANISM".to_string(),
                })?;

            let username =
                env::var("KAFKA_SASL_USERNAME").map_err(|_| EventError::ConfigMissing {
                    var: "KAFKA_SASL_USERNAME".to_string(),
                })?;

            let password =
                env::var("KAFKA_SASL_PASSWORD").map_err(|_| EventError::ConfigMissing {
                    var: "KAFKA_SASL_PASSWORD".to_string(),
                })?;

            builder = builder.sasl(SaslMechanism::from_str(&mechanism_str)?, username, password);
        }

        builder.build()
    }

    /// Create a new configuration builder.
    #[must_use]
    pub fn builder() -> KafkaConfigBuilder {
        KafkaConfigBuilder::new()
    }
}

/// Builder for `KafkaConfig`.
#[derive(Debug, Default)]
pub struct KafkaConfigBuilder {
    bootstrap_servers: Option<String>,
    client_id: Option<String>,
    security_protocol: Option<SecurityProtocol>,
    sasl: Option<SaslCredentials>,
    acks: Option<Acks>,
    message_send_max_retries: Option<u32>,
    enable_idempotence: Option<bool>,
    compression: Option<Compression>,
    request_timeout_ms: Option<u32>,
    message_timeout_ms: Option<u32>,
    group_id: Option<String>,
    auto_offset_reset: Option<AutoOffsetReset>,
    enable_auto_commit: Option<bool>,
    session_timeout_ms: Option<u32>,
    socket_timeout_ms: Option<u32>,
}

impl KafkaConfigBuilder {
    /// Create a new builder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set bootstrap servers.
    pub fn bootstrap_servers(mut self, servers: impl Into<String>) -> Self {
        self.bootstrap_servers = Some(servers.into());
        self
    }

    /// Set client ID.
    pub fn client_id(mut self, id: impl Into<String>) -> Self {
        self.client_id = Some(id.into());
        self
    }

    /// Set security protocol.
    #[must_use]
    pub fn security_protocol(mut self, protocol: SecurityProtocol) -> Self {
        self.security_protocol = Some(protocol);
        self
    }

    /// Set SASL credentials.
    #[must_use]
    pub fn sasl(mut self, mechanism: SaslMechanism, username: String, password: String) -> Self {
        self.sasl = Some(SaslCredentials {
            mechanism,
            username,
            password,
        });
        self
    }

    /// Set the required acknowledgement level.
    #[must_use]
    pub fn acks(mut self, acks: Acks) -> Self {
        self.acks = Some(acks);
        self
    }

    /// Set the number of client-side produce retries.
    #[must_use]
    pub fn message_send_max_retries(mut self, retries: u32) -> Self {
        self.message_send_max_retries = Some(retries);
        self
    }

    /// Toggle idempotent-producer mode.
    #[must_use]
    pub fn enable_idempotence(mut self, enabled: bool) -> Self {
        self.enable_idempotence = Some(enabled);
        self
    }

    /// Set the compression algorithm.
    #[must_use]
    pub fn compression(mut self, compression: Compression) -> Self {
        self.compression = Some(compression);
        self
    }

    /// Set the broker request timeout.
    #[must_use]
    pub fn request_timeout_ms(mut self, ms: u32) -> Self {
        self.request_timeout_ms = Some(ms);
        self
    }

    /// Set the total produce time budget.
    #[must_use]
    pub fn message_timeout_ms(mut self, ms: u32) -> Self {
        self.message_timeout_ms = Some(ms);
        self
    }

    /// Set the consumer group id.
    pub fn group_id(mut self, group: impl Into<String>) -> Self {
        self.group_id = Some(group.into());
        self
    }

    /// Set the offset reset policy.
    #[must_use]
    pub fn auto_offset_reset(mut self, policy: AutoOffsetReset) -> Self {
        self.auto_offset_reset = Some(policy);
        self
    }

    /// Toggle broker-side auto commit.
    #[must_use]
    pub fn enable_auto_commit(mut self, enabled: bool) -> Self {
        self.enable_auto_commit = Some(enabled);
        self
    }

    /// Set the consumer session timeout.
    #[must_use]
    pub fn session_timeout_ms(mut self, ms: u32) -> Self {
        self.session_timeout_ms = Some(ms);
        self
    }

    /// Set the socket timeout.
    #[must_use]
    pub fn socket_timeout_ms(mut self, ms: u32) -> Self {
        self.socket_timeout_ms = Some(ms);
        self
    }

    /// Build the configuration.
    pub fn build(self) -> Result<KafkaConfig, EventError> {
        let bootstrap_servers = self.bootstrap_servers.ok_or(EventError::ConfigMissing {
            var: "bootstrap_servers".to_string(),
        })?;

        let security_protocol = self
            .security_protocol
            .unwrap_or(SecurityProtocol::Plaintext);

        // Validate SASL is provided if required
        if matches!(
            security_protocol,
            SecurityProtocol::SaslPlaintext | SecurityProtocol::SaslSsl
        ) && self.sasl.is_none()
        {
            return Err(EventError::ConfigMissing {
                var: "sasl_credentials".to_string(),
            });
        }

        let acks = self.acks.unwrap_or(Acks::All);
        let enable_idempotence = self.enable_idempotence.unwrap_or(true);

        // The broker rejects an idempotent producer with weaker acks
        if enable_idempotence && acks != Acks::All {
            return Err(EventError::ConfigInvalid {
                var: "acks".to_string(),
                reason: "idempotent producer requires acks=all".to_string(),
            });
        }

        Ok(KafkaConfig {
            bootstrap_servers,
            client_id: self.client_id.unwrap_or_else(|| "emis-service".to_string()),
            security_protocol,
            sasl: self.sasl,
            acks,
            message_send_max_retries: self.message_send_max_retries.unwrap_or(3),
            enable_idempotence,
            compression: self.compression.unwrap_or(Compression::Lz4),
            request_timeout_ms: self.request_timeout_ms.unwrap_or(30_000),
            message_timeout_ms: self.message_timeout_ms.unwrap_or(5_000),
            group_id: self.group_id.unwrap_or_else(|| "emis-event-bus".to_string()),
            auto_offset_reset: self.auto_offset_reset.unwrap_or(AutoOffsetReset::Earliest),
            enable_auto_commit: self.enable_auto_commit.unwrap_or(false),
            session_timeout_ms: self.session_timeout_ms.unwrap_or(30_000),
            socket_timeout_ms: self.socket_timeout_ms.unwrap_or(10_000),
        })
    }
}
