use bytes::Bytes;

use crate::types::{ClientId, LastWill, QoS, TopicFilter, TopicName, UserName};

///Immutable snapshot of a CONNECT, taken when the protocol engine accepts the
///connection. Carries values only, never references into live session state,
///so it stays valid while observers consume it in the background.
#[derive(Debug, Clone)]
pub struct ConnectEvent {
    pub client_id: ClientId,
    pub username: Option<UserName>,
    pub clean_session: bool,
    pub keep_alive: u16,
    pub protocol_version: u8,
    pub will: Option<LastWill>,
}

#[derive(Debug, Clone)]
pub struct DisconnectEvent {
    pub client_id: ClientId,
}

#[derive(Debug, Clone)]
pub struct PublishEvent {
    pub client_id: ClientId,
    pub topic: TopicName,
    pub payload: Bytes,
    pub qos: QoS,
    pub retain: bool,
}

#[derive(Debug, Clone)]
pub struct SubscribeEvent {
    pub client_id: ClientId,
    pub topic_filter: TopicFilter,
    pub qos: QoS,
}

#[derive(Debug, Clone)]
pub struct UnsubscribeEvent {
    pub client_id: ClientId,
    pub topic_filter: TopicFilter,
}
