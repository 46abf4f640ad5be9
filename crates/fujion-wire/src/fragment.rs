use crate::{WireError, WireResult};

/// A slice type that can be buffered across websocket fragments.
pub trait Fragment {
    type Owned: Default;

    fn byte_len(&self) -> usize;
    fn append_to(&self, buffer: &mut Self::Owned);
    fn to_owned_payload(&self) -> Self::Owned;
}

impl Fragment for str {
    type Owned = String;

    fn byte_len(&self) -> usize {
        self.len()
    }

    fn append_to(&self, buffer: &mut String) {
        buffer.push_str(self);
    }

    fn to_owned_payload(&self) -> String {
        self.to_owned()
    }
}

impl Fragment for [u8] {
    type Owned = Vec<u8>;

    fn byte_len(&self) -> usize {
        self.len()
    }

    fn append_to(&self, buffer: &mut Vec<u8>) {
        buffer.extend_from_slice(self);
    }

    fn to_owned_payload(&self) -> Vec<u8> {
        self.to_vec()
    }
}

/// Concatenates fragments in arrival order until the last one arrives.
#[derive(Debug)]
pub struct FragmentAssembler<F: Fragment + ?Sized> {
    pending: Option<F::Owned>,
    pending_bytes: usize,
    fragments: usize,
    max_bytes: usize,
}

pub type TextAssembler = FragmentAssembler<str>;
pub type BinaryAssembler = FragmentAssembler<[u8]>;

impl<F: Fragment + ?Sized> FragmentAssembler<F> {
    pub fn new(max_bytes: usize) -> Self {
        Self {
            pending: None,
            pending_bytes: 0,
            fragments: 0,
            max_bytes,
        }
    }

    /// Adds a fragment. Returns the complete message once `is_last` is seen.
    /// Exceeding the size bound discards everything buffered so far.
    pub fn push(&mut self, fragment: &F, is_last: bool) -> WireResult<Option<F::Owned>> {
        let total = self.pending_bytes.saturating_add(fragment.byte_len());
        if total > self.max_bytes {
            self.reset();
            return Err(WireError::MessageTooLarge {
                limit: self.max_bytes,
            });
        }

        if is_last && self.pending.is_none() {
            return Ok(Some(fragment.to_owned_payload()));
        }

        let buffer = self.pending.get_or_insert_with(F::Owned::default);
        fragment.append_to(buffer);
        self.pending_bytes = total;
        self.fragments += 1;

        if is_last {
            let complete = self.pending.take();
            self.reset();
            Ok(complete)
        } else {
            Ok(None)
        }
    }

    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    pub fn buffered_fragments(&self) -> usize {
        self.fragments
    }

    pub fn reset(&mut self) {
        self.pending = None;
        self.pending_bytes = 0;
        self.fragments = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn split_text(message: &str, parts: usize) -> Vec<&str> {
        let step = (message.len() / parts).max(1);
        let mut pieces = Vec::new();
        let mut start = 0;
        while pieces.len() + 1 < parts && start + step < message.len() {
            pieces.push(&message[start..start + step]);
            start += step;
        }
        pieces.push(&message[start..]);
        pieces
    }

    #[test]
    fn text_fragments_reassemble_identically() {
        let message = format!(
            "{{\"pid\":\"p\",\"type\":\"event\",\"data\":{{\"text\":\"{}\"}}}}",
            "abcdefghij".repeat(40)
        );
        for parts in 1..=120 {
            let pieces = split_text(&message, parts);
            let mut assembler = TextAssembler::new(1 << 20);
            let last = pieces.len() - 1;
            let mut complete = None;
            for (index, piece) in pieces.iter().enumerate() {
                let result = assembler.push(piece, index == last).expect("push");
                if index < last {
                    assert!(result.is_none());
                } else {
                    complete = result;
                }
            }
            assert_eq!(complete.as_deref(), Some(message.as_str()), "parts={parts}");
            assert!(!assembler.is_pending());
        }
    }

    #[test]
    fn binary_fragments_reassemble_identically() {
        let message: Vec<u8> = (0..4096u32).map(|i| (i % 251) as u8).collect();
        for parts in [1usize, 2, 3, 7, 64, 4096] {
            let chunk = message.len().div_ceil(parts);
            let chunks: Vec<&[u8]> = message.chunks(chunk).collect();
            let mut assembler = BinaryAssembler::new(1 << 20);
            let mut complete = None;
            for (index, piece) in chunks.iter().enumerate() {
                complete = assembler
                    .push(piece, index + 1 == chunks.len())
                    .expect("push");
            }
            assert_eq!(complete.as_deref(), Some(message.as_slice()));
        }
    }

    #[test]
    fn oversized_message_resets_buffer() {
        let mut assembler = TextAssembler::new(8);
        assert!(assembler.push("abcd", false).expect("first").is_none());
        assert_eq!(assembler.buffered_fragments(), 1);
        assert!(matches!(
            assembler.push("efghi", false),
            Err(WireError::MessageTooLarge { limit: 8 })
        ));
        assert!(!assembler.is_pending());
        assert_eq!(assembler.push("ok", true).expect("fresh").as_deref(), Some("ok"));
    }
}
