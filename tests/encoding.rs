
use generator::MessageGenerator;
use zkif::*;

fn assert_roundtrip(message: &Message) {
    let bytes = message.encode();
    let decoded = Message::decode(&bytes).expect("failed to decode");

    assert_eq!(&decoded, message);
}

#[test]
fn encode_generated_messages() {
    let mut generator = MessageGenerator::new(0x8437);

    for _ in 0..200 {
        assert_roundtrip(&generator.gen_message());
    }
}

#[test]
fn encode_generated_headers_with_values() {
    let mut generator = MessageGenerator::new(0x1f2e);

    for _ in 0..50 {
        let header = generator.gen_header(true);

        header.validate().expect("generated header must validate");
        assert_roundtrip(&Message::CircuitHeader(header));
    }
}

#[test]
fn encode_narrow_field_elements() {
    let mut generator = MessageGenerator::with_width(0x77, 4);

    for _ in 0..50 {
        assert_roundtrip(&Message::Witness(generator.gen_witness()));
    }
}

#[test]
fn header_roundtrip_preserves_every_field() {
    // instance ids [1, 2], no values, allocation boundary at 3, field
    // maximum of 32 canonical bytes
    let header = CircuitHeader::new(
        Variables::unassigned(vec![1, 2]).unwrap(),
        3,
        vec![0xff; 32],
        vec![KeyValue::text("strategy", "pedersen")],
    );

    let bytes = Message::CircuitHeader(header.clone()).encode();

    match Message::decode(&bytes).unwrap() {
        Message::CircuitHeader(decoded) => {
            assert_eq!(decoded.instance_variables.ids(), &[1, 2]);
            assert!(!decoded.instance_variables.is_assigned());
            assert_eq!(decoded.free_variable_id, 3);
            assert_eq!(decoded.field_maximum, vec![0xff; 32]);
            assert_eq!(decoded, header);
        }
        other => panic!("unexpected message: {:?}", other),
    }
}

#[test]
fn command_encoding_is_byte_exact() {
    let bytes =
        Message::Command(Command::new(true, false, Vec::new())).encode();

    // magic, union tag, then one record per flag
    assert_eq!(
        hex::encode(&bytes),
        "7a6b696604010100000001020100000000"
    );
}

#[test]
fn uneven_witness_values_fail_validation() {
    // 3 ids, 7 value bytes: structurally decodable, semantically broken
    let payload = raw_witness_payload(&[1, 2, 3], &[0xab; 7]);

    let witness = match Message::decode(&payload).unwrap() {
        Message::Witness(w) => w,
        other => panic!("unexpected message: {:?}", other),
    };

    match witness.validate().unwrap_err() {
        Error::InconsistentValueLength { ids, bytes } => {
            assert_eq!(ids, 3);
            assert_eq!(bytes, 7);
        }
        other => panic!("unexpected error: {:?}", other),
    }
}

#[test]
fn duplicate_ids_fail_validation() {
    let payload = raw_witness_payload(&[4, 4], &[0x01, 0x02]);

    let witness = match Message::decode(&payload).unwrap() {
        Message::Witness(w) => w,
        other => panic!("unexpected message: {:?}", other),
    };

    match witness.validate().unwrap_err() {
        Error::DuplicateVariableId { id } => assert_eq!(id, 4),
        other => panic!("unexpected error: {:?}", other),
    }
}

#[test]
fn unknown_fields_are_skipped() {
    let mut payload = Vec::new();

    payload.extend_from_slice(&MAGIC);
    payload.push(1); // circuit header tag

    // unrecognized record, to be ignored by the decoder
    put_record(&mut payload, 250, &[0xde, 0xad, 0xbe, 0xef]);
    // free_variable_id = 9
    put_record(&mut payload, 2, &9u64.to_le_bytes());

    match Message::decode(&payload).unwrap() {
        Message::CircuitHeader(header) => {
            assert_eq!(header.free_variable_id, 9);
            assert!(header.instance_variables.is_empty());
        }
        other => panic!("unexpected message: {:?}", other),
    }
}

#[test]
fn record_overrunning_the_payload_is_malformed() {
    let mut payload = Vec::new();

    payload.extend_from_slice(&MAGIC);
    payload.push(1);
    payload.push(2); // free_variable_id record
    payload.extend_from_slice(&16u32.to_le_bytes()); // but only 8 bytes follow
    payload.extend_from_slice(&9u64.to_le_bytes());

    let err = Message::decode(&payload).unwrap_err();

    assert_eq!(err.kind(), ErrorKind::MalformedMessage);
}

#[test]
fn truncated_field_elements_compare_equal_after_padding() {
    let wide = Variables::from_assignments([(1u64, {
        let mut v = vec![0u8; 32];
        v[0] = 0x2a;
        v
    })])
    .unwrap();

    let narrow = Variables::from_assignments([(1u64, vec![0x2au8])]).unwrap();

    assert_eq!(
        narrow.value_of_padded(1, 32),
        wide.value_of_padded(1, 32),
    );
    assert_eq!(
        narrow.value_of_padded(1, 32),
        wide.value_of(1).map(|v| v.to_vec()),
    );
}

fn raw_witness_payload(ids: &[u64], values: &[u8]) -> Vec<u8> {
    let mut variables = Vec::new();

    let mut id_run = Vec::new();
    for id in ids {
        id_run.extend_from_slice(&id.to_le_bytes());
    }

    put_record(&mut variables, 1, &id_run);
    put_record(&mut variables, 2, values);

    let mut payload = Vec::new();

    payload.extend_from_slice(&MAGIC);
    payload.push(3); // witness tag
    put_record(&mut payload, 1, &variables);

    payload
}

fn put_record(buf: &mut Vec<u8>, id: u8, body: &[u8]) {
    buf.push(id);
    buf.extend_from_slice(&(body.len() as u32).to_le_bytes());
    buf.extend_from_slice(body);
}
