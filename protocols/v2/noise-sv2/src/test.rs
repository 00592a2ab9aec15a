use crate::{
    handshake::HandshakeOp, initiator::Initiator, responder::Responder, NoiseCodec,
    INITIATOR_EXPECTED_HANDSHAKE_MESSAGE_SIZE,
};
use quickcheck::TestResult;

fn handshake() -> (NoiseCodec, NoiseCodec) {
    let authority = Responder::generate_key();
    let static_key = Responder::generate_key();

    let mut initiator = Initiator::new(authority.x_only_public_key().0);
    let mut responder = Responder::new(authority, static_key, 31449600);
    let first_message = initiator.step_0().unwrap();
    let (second_message, codec_responder) = responder.step_1(first_message).unwrap();
    let codec_initiator = initiator.step_2(second_message).unwrap();
    (codec_initiator, codec_responder)
}

#[test]
fn full_handshake_and_transport() {
    let (mut initiator, mut responder) = handshake();

    let mut message = "ciao".as_bytes().to_vec();
    initiator.encrypt(&mut message).unwrap();
    assert_ne!(message, "ciao".as_bytes().to_vec());
    responder.decrypt(&mut message).unwrap();
    assert_eq!(message, "ciao".as_bytes().to_vec());

    // And the other direction.
    let mut message = "hola".as_bytes().to_vec();
    responder.encrypt(&mut message).unwrap();
    initiator.decrypt(&mut message).unwrap();
    assert_eq!(message, "hola".as_bytes().to_vec());
}

#[test]
fn es_message_is_234_bytes() {
    assert_eq!(INITIATOR_EXPECTED_HANDSHAKE_MESSAGE_SIZE, 234);
}

#[test]
fn certificate_from_unknown_authority_is_rejected() {
    let authority = Responder::generate_key();
    let static_key = Responder::generate_key();
    let other_authority = Responder::generate_key();

    let mut initiator = Initiator::new(other_authority.x_only_public_key().0);
    let mut responder = Responder::new(authority, static_key, 31449600);
    let first_message = initiator.step_0().unwrap();
    let (second_message, _) = responder.step_1(first_message).unwrap();
    assert!(initiator.step_2(second_message).is_err());
}

#[test]
fn expired_certificate_is_rejected() {
    let authority = Responder::generate_key();
    let static_key = Responder::generate_key();

    let mut initiator = Initiator::new(authority.x_only_public_key().0);
    let mut responder = Responder::new(authority, static_key, 10);
    let first_message = initiator.step_0().unwrap();
    let (second_message, _) = responder
        .step_1_with_now_rng(first_message, 1000, &mut rand::thread_rng())
        .unwrap();
    // Window is [1000, 1010]; step well past it.
    assert!(initiator.step_2_with_now(second_message, 2000).is_err());
}

#[test]
fn tampered_ciphertext_fails_decryption() {
    let (mut initiator, mut responder) = handshake();

    let mut message = vec![42u8; 100];
    initiator.encrypt(&mut message).unwrap();
    message[50] ^= 1;
    assert!(responder.decrypt(&mut message).is_err());
}

#[test]
fn chunking_boundaries() {
    let (mut initiator, mut responder) = handshake();

    // Exactly one chunk.
    let plaintext = vec![1u8; 65535];
    let mut wire = Vec::new();
    initiator.encrypt_message(&plaintext, &mut wire).unwrap();
    assert_eq!(wire.len(), 65535 + 16);
    assert_eq!(wire.len(), NoiseCodec::encrypted_message_size(65535));
    let mut out = Vec::new();
    responder.decrypt_message(&wire, &mut out).unwrap();
    assert_eq!(out, plaintext);

    // One byte over: two chunks, the second carrying a single byte.
    let plaintext = vec![2u8; 65536];
    let mut wire = Vec::new();
    initiator.encrypt_message(&plaintext, &mut wire).unwrap();
    assert_eq!(wire.len(), 65536 + 32);
    assert_eq!(wire.len(), NoiseCodec::encrypted_message_size(65536));
    let mut out = Vec::new();
    responder.decrypt_message(&wire, &mut out).unwrap();
    assert_eq!(out, plaintext);
}

#[test]
fn nonces_advance_in_lockstep() {
    let (mut initiator, mut responder) = handshake();

    for i in 0..10u8 {
        let mut message = vec![i; 8];
        initiator.encrypt(&mut message).unwrap();
        responder.decrypt(&mut message).unwrap();
        assert_eq!(message, vec![i; 8]);
    }
}

#[quickcheck_macros::quickcheck]
fn prop_chunked_wire_length(data: Vec<u8>) -> TestResult {
    if data.is_empty() || data.len() > 200_000 {
        return TestResult::discard();
    }
    let (mut initiator, mut responder) = handshake();
    let mut wire = Vec::new();
    initiator.encrypt_message(&data, &mut wire).unwrap();
    let expected = data.len() + 16 * data.len().div_ceil(65535);
    if wire.len() != expected {
        return TestResult::failed();
    }
    let mut out = Vec::new();
    responder.decrypt_message(&wire, &mut out).unwrap();
    TestResult::from_bool(out == data)
}
