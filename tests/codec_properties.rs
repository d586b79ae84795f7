//! Property tests for the frame codec and stream reassembly.

use pinwire_client::protocol::{decode, FrameBuffer, FrameCodec, MessageIds, MsgType};
use pinwire_client::ProtocolError;
use proptest::prelude::*;

const MAX_BODY: usize = 1024;

fn token() -> impl Strategy<Value = String> {
    "[a-zA-Z0-9 .#-]{1,12}"
}

fn body_type() -> impl Strategy<Value = MsgType> {
    prop_oneof![
        Just(MsgType::Login),
        Just(MsgType::Hardware),
        Just(MsgType::Bridge),
        Just(MsgType::Internal),
        Just(MsgType::Property),
        Just(MsgType::Notify),
        Just(MsgType::EventLog),
    ]
}

proptest! {
    #[test]
    fn prop_encoded_frames_decode_to_same_tokens(
        msg_type in body_type(),
        msg_id in 1u16..,
        tokens in prop::collection::vec(token(), 1..8),
    ) {
        let frame = FrameCodec::new().encode(msg_type, Some(msg_id), &tokens).unwrap();
        let msg = decode(&frame, MAX_BODY).unwrap();

        prop_assert_eq!(msg.msg_type, msg_type);
        prop_assert_eq!(msg.msg_id, msg_id);
        prop_assert_eq!(usize::from(msg.length), frame.len() - 5);
        prop_assert_eq!(msg.tokens, tokens);
    }

    #[test]
    fn prop_generated_ids_are_never_zero(start in any::<u16>(), steps in 1usize..200) {
        let mut ids = MessageIds::starting_after(start);
        let mut previous = start;
        for _ in 0..steps {
            let id = ids.next_id();
            prop_assert_ne!(id, 0);
            let expected = if previous == u16::MAX { 1 } else { previous + 1 };
            prop_assert_eq!(id, expected);
            previous = id;
        }
    }

    #[test]
    fn prop_zero_id_rejected(msg_type in body_type(), tokens in prop::collection::vec(token(), 1..4)) {
        let mut frame = FrameCodec::new().encode(msg_type, Some(1), &tokens).unwrap().to_vec();
        frame[1] = 0;
        frame[2] = 0;

        prop_assert_eq!(decode(&frame, MAX_BODY), Err(ProtocolError::InvalidId));
    }

    #[test]
    fn prop_oversized_length_rejected(msg_id in 1u16.., length in (MAX_BODY as u16)..) {
        let mut frame = vec![MsgType::Hardware.as_u8()];
        frame.extend_from_slice(&msg_id.to_be_bytes());
        frame.extend_from_slice(&length.to_be_bytes());

        let rejected = matches!(
            decode(&frame, MAX_BODY),
            Err(ProtocolError::BodyTooLong { .. })
        );
        prop_assert!(rejected);
    }

    #[test]
    fn prop_chunking_does_not_change_messages(
        frames in prop::collection::vec(prop::collection::vec(token(), 1..5), 1..6),
        cuts in prop::collection::vec(any::<prop::sample::Index>(), 0..10),
    ) {
        let mut codec = FrameCodec::new();
        let mut stream = Vec::new();
        for tokens in &frames {
            stream.extend_from_slice(&codec.encode(MsgType::Hardware, None, tokens).unwrap());
        }

        let mut points: Vec<usize> = cuts.iter().map(|i| i.index(stream.len())).collect();
        points.push(stream.len());
        points.sort_unstable();

        let mut buffer = FrameBuffer::with_max_body(MAX_BODY);
        let mut decoded = Vec::new();
        let mut start = 0;
        for end in points {
            decoded.extend(buffer.push(&stream[start..end]).unwrap());
            start = end;
        }

        prop_assert!(buffer.is_empty());
        let tokens: Vec<Vec<String>> = decoded.into_iter().map(|m| m.tokens).collect();
        prop_assert_eq!(tokens, frames);
    }
}
