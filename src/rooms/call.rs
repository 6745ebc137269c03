//! Call notices and point-to-point forwarding of call setup payloads.
//! Media never passes through here.

use crate::RelayResult;

use super::{
    events::{AnswerPayload, ConnectionId, Delivery, IceCandidatePayload, OfferPayload, ServerEvent},
    msg::NewMessage,
    store::RoomStore,
};

pub(crate) async fn join_call(
    store: &dyn RoomStore,
    from: ConnectionId,
    room_id: &str,
    username: &str,
) -> RelayResult<Vec<Delivery>> {
    let notice = store.append(room_id, NewMessage::call_notification(username)).await?;
    Ok(vec![
        Delivery::room(room_id, ServerEvent::CallNotification(notice)),
        Delivery::room_except(
            room_id,
            from,
            ServerEvent::UserJoinedCall {
                connection_id: from,
                username: username.to_owned(),
            },
        ),
    ])
}

pub(crate) async fn leave_call(
    store: &dyn RoomStore,
    from: ConnectionId,
    room_id: &str,
    username: &str,
) -> RelayResult<Vec<Delivery>> {
    let notice = store.append(room_id, NewMessage::call_ended(username)).await?;
    Ok(vec![
        Delivery::room(room_id, ServerEvent::CallEndedNotification(notice)),
        Delivery::room_except(room_id, from, ServerEvent::UserLeftCall { connection_id: from }),
    ])
}

pub(crate) fn forward_offer(from: ConnectionId, OfferPayload { to, offer, username }: OfferPayload) -> Delivery {
    Delivery::to(to, ServerEvent::Offer { from, offer, username })
}

pub(crate) fn forward_answer(from: ConnectionId, AnswerPayload { to, answer, username }: AnswerPayload) -> Delivery {
    Delivery::to(to, ServerEvent::Answer { from, answer, username })
}

pub(crate) fn forward_ice_candidate(
    from: ConnectionId,
    IceCandidatePayload { to, candidate }: IceCandidatePayload,
) -> Delivery {
    Delivery::to(to, ServerEvent::IceCandidate { from, candidate })
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::rooms::{events::Target, msg::MessageType, store::testing::MemoryRoomStore};

    #[tokio::test]
    async fn join_call_persists_a_system_notice() {
        let store = MemoryRoomStore::default();
        let bob = ConnectionId::new();
        let deliveries = join_call(&store, bob, "r2", "bob").await.unwrap();

        let ServerEvent::CallNotification(notice) = &deliveries[0].event else {
            panic!("unexpected event {:?}", deliveries[0].event);
        };
        assert_eq!(deliveries[0].target, Target::Room("r2".to_owned()));
        assert_eq!(notice.username, "System");
        assert_eq!(notice.kind, MessageType::CallNotification);
        assert_eq!(notice.call_initiator.as_deref(), Some("bob"));
        assert_eq!(store.messages_sync("r2"), vec![notice.clone()]);

        assert_eq!(
            deliveries[1],
            Delivery::room_except(
                "r2",
                bob,
                ServerEvent::UserJoinedCall { connection_id: bob, username: "bob".to_owned() }
            )
        );
    }

    #[tokio::test]
    async fn leave_call_persists_call_ended() {
        let store = MemoryRoomStore::default();
        let bob = ConnectionId::new();
        let deliveries = leave_call(&store, bob, "r2", "bob").await.unwrap();

        let ServerEvent::CallEndedNotification(notice) = &deliveries[0].event else {
            panic!("unexpected event {:?}", deliveries[0].event);
        };
        assert_eq!(notice.kind, MessageType::CallEnded);
        assert_eq!(
            deliveries[1],
            Delivery::room_except("r2", bob, ServerEvent::UserLeftCall { connection_id: bob })
        );
    }

    #[tokio::test]
    async fn failed_persist_produces_no_notice() {
        let store = MemoryRoomStore::failing();
        assert!(join_call(&store, ConnectionId::new(), "r2", "bob").await.is_err());
    }

    #[test]
    fn forwards_are_unicast_and_stamped_with_the_sender() {
        let (alice, bob) = (ConnectionId::new(), ConnectionId::new());

        let delivery = forward_offer(
            alice,
            OfferPayload { to: bob, offer: json!({ "sdp": "o" }), username: Some("alice".to_owned()) },
        );
        assert_eq!(delivery.target, Target::Connection(bob));
        assert_eq!(
            delivery.event,
            ServerEvent::Offer { from: alice, offer: json!({ "sdp": "o" }), username: Some("alice".to_owned()) }
        );

        let delivery = forward_answer(bob, AnswerPayload { to: alice, answer: json!("a"), username: None });
        assert_eq!(delivery.target, Target::Connection(alice));

        let delivery = forward_ice_candidate(alice, IceCandidatePayload { to: bob, candidate: json!({}) });
        assert_eq!(
            delivery,
            Delivery::to(bob, ServerEvent::IceCandidate { from: alice, candidate: json!({}) })
        );
    }
}
