//! The closed registry key set (§6) and the typed value shapes each key holds (§3).

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RegistryKey {
    DataProviderIp,
    ThresholdingIp,
    GatewayIp,
    PixelClassificationWorkerIps,
    CacheIp,
    MessageBrokerIp,
    PcFeatures,
    PcRandomForest,
    ThresholdValue,
    ThresholdChannel,
    ThresholdSigmas,
    Blocksize,
    Log,
}

impl RegistryKey {
    pub const ALL: &'static [RegistryKey] = &[
        RegistryKey::DataProviderIp,
        RegistryKey::ThresholdingIp,
        RegistryKey::GatewayIp,
        RegistryKey::PixelClassificationWorkerIps,
        RegistryKey::CacheIp,
        RegistryKey::MessageBrokerIp,
        RegistryKey::PcFeatures,
        RegistryKey::PcRandomForest,
        RegistryKey::ThresholdValue,
        RegistryKey::ThresholdChannel,
        RegistryKey::ThresholdSigmas,
        RegistryKey::Blocksize,
        RegistryKey::Log,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            RegistryKey::DataProviderIp => "DATA_PROVIDER_IP",
            RegistryKey::ThresholdingIp => "THRESHOLDING_IP",
            RegistryKey::GatewayIp => "GATEWAY_IP",
            RegistryKey::PixelClassificationWorkerIps => "PIXEL_CLASSIFICATION_WORKER_IPS",
            RegistryKey::CacheIp => "CACHE_IP",
            RegistryKey::MessageBrokerIp => "MESSAGE_BROKER_IP",
            RegistryKey::PcFeatures => "PC_FEATURES",
            RegistryKey::PcRandomForest => "PC_RANDOM_FOREST",
            RegistryKey::ThresholdValue => "THRESHOLD_VALUE",
            RegistryKey::ThresholdChannel => "THRESHOLD_CHANNEL",
            RegistryKey::ThresholdSigmas => "THRESHOLD_SIGMAS",
            RegistryKey::Blocksize => "BLOCKSIZE",
            RegistryKey::Log => "LOG",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|k| k.as_str() == s)
    }

    /// Only this key is list-valued; every other key replaces on `set`.
    pub fn is_list_valued(self) -> bool {
        matches!(self, RegistryKey::PixelClassificationWorkerIps | RegistryKey::Log)
    }
}

/// The value carried by a registry entry. `set` on a scalar key replaces;
/// `set` on a list key appends. `remove` is only accepted for the
/// worker-IP list (§4.9).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RegistryValue {
    Scalar(String),
    List(Vec<String>),
    Bytes(Vec<u8>),
}

impl RegistryValue {
    pub fn as_scalar(&self) -> Option<&str> {
        match self {
            RegistryValue::Scalar(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[String]> {
        match self {
            RegistryValue::List(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            RegistryValue::Bytes(b) => Some(b),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_key_round_trips_through_its_wire_name() {
        for k in RegistryKey::ALL {
            assert_eq!(RegistryKey::parse(k.as_str()), Some(*k));
        }
    }

    #[test]
    fn only_worker_ips_and_log_are_list_valued() {
        for k in RegistryKey::ALL {
            let expected = matches!(
                k,
                RegistryKey::PixelClassificationWorkerIps | RegistryKey::Log
            );
            assert_eq!(k.is_list_valued(), expected, "{k:?}");
        }
    }

    #[test]
    fn unknown_key_does_not_parse() {
        assert!(RegistryKey::parse("NOT_A_KEY").is_none());
    }
}
