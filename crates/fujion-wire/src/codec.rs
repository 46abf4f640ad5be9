use serde_json::Value;

use crate::{ClientInvocation, WireError, WireResult};

const INITIAL_PREAMBLE_CAPACITY: usize = 256;

pub fn encode_invocation(invocation: &ClientInvocation) -> String {
    Value::Object(invocation.to_map()).to_string()
}

/// Encodes invocations as `[inv1,inv2,...]`. An empty batch encodes to
/// nothing so callers send no frame at all.
pub fn encode_batch<'a, I>(invocations: I) -> Option<String>
where
    I: IntoIterator<Item = &'a ClientInvocation>,
{
    let mut payload = String::new();
    let mut count = 0usize;
    for invocation in invocations {
        payload.push(if count == 0 { '[' } else { ',' });
        payload.push_str(&encode_invocation(invocation));
        count += 1;
    }
    if count == 0 {
        return None;
    }
    payload.push(']');
    Some(payload)
}

/// Splits a binary message at the first `\n`. The preamble is collected byte
/// by byte and may not exceed `max_preamble` bytes.
pub fn split_preamble(bytes: &[u8], max_preamble: usize) -> WireResult<(Vec<u8>, &[u8])> {
    let mut preamble = Vec::with_capacity(INITIAL_PREAMBLE_CAPACITY.min(bytes.len()));
    let mut position = 0usize;
    while position < bytes.len() {
        let byte = bytes[position];
        position += 1;
        if byte == b'\n' {
            break;
        }
        if preamble.len() == max_preamble {
            return Err(WireError::PreambleTooLarge(max_preamble));
        }
        preamble.push(byte);
    }
    Ok((preamble, &bytes[position..]))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn empty_batch_encodes_to_nothing() {
        assert_eq!(encode_batch(Vec::<&ClientInvocation>::new()), None);
    }

    #[test]
    fn batch_is_comma_joined_array_in_order() {
        let first = ClientInvocation::global("a", vec![json!(1)]);
        let second = ClientInvocation::new("b", Some("t".into()), vec![]);
        let payload = encode_batch([&first, &second]).expect("non-empty batch");
        assert!(payload.starts_with('[') && payload.ends_with(']'));
        let parsed: Value = serde_json::from_str(&payload).expect("valid json");
        assert_eq!(
            parsed,
            json!([{"fcn": "a", "arg": [1]}, {"fcn": "b", "tgt": "t", "arg": []}])
        );
    }

    #[test]
    fn preamble_longer_than_initial_capacity_is_collected() {
        let header = format!("{{\"pid\":\"{}\",\"type\":\"x\"}}", "p".repeat(5000));
        let mut frame = header.clone().into_bytes();
        frame.push(b'\n');
        frame.extend_from_slice(b"tail");
        let (preamble, rest) = split_preamble(&frame, 10_000).expect("split");
        assert_eq!(preamble, header.as_bytes());
        assert_eq!(rest, b"tail");
    }

    #[test]
    fn oversized_preamble_is_rejected() {
        let frame = vec![b'x'; 33];
        assert!(matches!(
            split_preamble(&frame, 32),
            Err(WireError::PreambleTooLarge(32))
        ));
        let (preamble, rest) = split_preamble(&frame[..32], 32).expect("exactly at limit");
        assert_eq!(preamble.len(), 32);
        assert!(rest.is_empty());
    }
}
