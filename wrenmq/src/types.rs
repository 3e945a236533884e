use crate::{BrokerError, Result};

pub type ClientId = bytestring::ByteString;
pub type UserName = bytestring::ByteString;
pub type Password = bytes::Bytes;

pub type TopicName = bytestring::ByteString;
///Topic filter as supplied in SUBSCRIBE/UNSUBSCRIBE, may contain wildcards
pub type TopicFilter = bytestring::ByteString;

pub type DashMap<K, V> = dashmap::DashMap<K, V, ahash::RandomState>;

///Quality of service levels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u8)]
pub enum QoS {
    AtMostOnce = 0,
    AtLeastOnce = 1,
    ExactlyOnce = 2,
}

impl QoS {
    #[inline]
    pub fn value(&self) -> u8 {
        *self as u8
    }
}

impl TryFrom<u8> for QoS {
    type Error = BrokerError;
    #[inline]
    fn try_from(v: u8) -> Result<Self, Self::Error> {
        match v {
            0 => Ok(QoS::AtMostOnce),
            1 => Ok(QoS::AtLeastOnce),
            2 => Ok(QoS::ExactlyOnce),
            _ => Err(BrokerError::Msg(format!("invalid qos value, {v}"))),
        }
    }
}

///A client's subscription to a topic filter, as persisted in the session
///store and recovered into the registry at startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Subscription {
    pub client_id: ClientId,
    pub topic_filter: TopicFilter,
    pub qos: QoS,
}

impl Subscription {
    #[inline]
    pub fn new(client_id: ClientId, topic_filter: TopicFilter, qos: QoS) -> Self {
        Self { client_id, topic_filter, qos }
    }
}

///Will message announced in CONNECT
#[derive(Debug, Clone)]
pub struct LastWill {
    pub topic: TopicName,
    pub message: bytes::Bytes,
    pub qos: QoS,
    pub retain: bool,
}

#[cfg(test)]
mod tests {
    use super::QoS;

    #[test]
    fn qos_from_u8() {
        assert_eq!(QoS::try_from(0).unwrap(), QoS::AtMostOnce);
        assert_eq!(QoS::try_from(1).unwrap(), QoS::AtLeastOnce);
        assert_eq!(QoS::try_from(2).unwrap(), QoS::ExactlyOnce);
        assert!(QoS::try_from(3).is_err());
        assert_eq!(QoS::ExactlyOnce.value(), 2);
    }
}
