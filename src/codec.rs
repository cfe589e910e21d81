//! Wire format for arguments and return values.
//!
//! Arguments travel as a length-prefixed frame:
//!
//! ```text
//! u32 count | u32 len | len bytes of JSON | u32 len | ...
//! ```
//!
//! All integers are big-endian. Entries are never scanned for delimiters, so
//! any JSON content (including embedded separators) survives intact. Return
//! values are the bare JSON of the value, with no framing.

use bytes::{Buf, BufMut, Bytes, BytesMut};
use serde::{de::DeserializeOwned, Serialize};
use thiserror::Error;

pub const CONTENT_TYPE: &str = "application/json";

const PREFIX_LEN: usize = 4;

#[derive(Debug, Error)]
pub enum CodecError {
    #[error("Parameter count mismatch: expected {expected}, got {actual}")]
    ArgumentCount { expected: usize, actual: usize },

    /// `reason` is kept for logging; the message stays generic on purpose so
    /// that serde internals never reach the caller.
    #[error("Parameter type mismatch at position {index}")]
    ParameterType { index: usize, reason: String },

    #[error("argument frame truncated")]
    Truncated,

    #[error("argument frame has {0} trailing bytes")]
    TrailingBytes(usize),

    #[error("{0} does not fit a u32 length prefix")]
    Oversized(usize),

    #[error("failed to encode value: {0}")]
    Encode(#[source] serde_json::Error),

    #[error("failed to decode return value: {0}")]
    Return(#[source] serde_json::Error),
}

/// Ordered, already-serialized call arguments on the sending side.
#[derive(Debug, Default, Clone)]
pub struct ArgList {
    entries: Vec<Bytes>,
}

impl ArgList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push<T>(&mut self, value: &T) -> Result<(), CodecError>
    where
        T: Serialize + ?Sized,
    {
        let json = serde_json::to_vec(value).map_err(CodecError::Encode)?;
        self.entries.push(Bytes::from(json));
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn encode(&self) -> Result<Bytes, CodecError> {
        let size = PREFIX_LEN + self.entries.iter().map(|e| PREFIX_LEN + e.len()).sum::<usize>();
        let mut buf = BytesMut::with_capacity(size);
        buf.put_u32(prefix(self.entries.len())?);
        for entry in &self.entries {
            buf.put_u32(prefix(entry.len())?);
            buf.put_slice(entry);
        }
        Ok(buf.freeze())
    }
}

fn prefix(len: usize) -> Result<u32, CodecError> {
    u32::try_from(len).map_err(|_| CodecError::Oversized(len))
}

/// Decoded argument frame on the receiving side.
///
/// Entries are handed out in order by [`ArgFrame::next`], each deserialized
/// into the parameter type the caller asks for.
#[derive(Debug)]
pub struct ArgFrame {
    entries: Vec<Bytes>,
    cursor: usize,
}

impl ArgFrame {
    /// Splits `payload` into entries, checking the declared count against
    /// `arity` before reading any entry. An empty payload is a frame of zero
    /// arguments.
    pub fn decode(mut payload: Bytes, arity: usize) -> Result<Self, CodecError> {
        if payload.is_empty() {
            return match arity {
                0 => Ok(Self::empty()),
                expected => Err(CodecError::ArgumentCount { expected, actual: 0 }),
            };
        }

        if payload.len() < PREFIX_LEN {
            return Err(CodecError::Truncated);
        }
        let count = payload.get_u32() as usize;
        if count != arity {
            return Err(CodecError::ArgumentCount {
                expected: arity,
                actual: count,
            });
        }

        let mut entries = Vec::with_capacity(count);
        for _ in 0..count {
            if payload.remaining() < PREFIX_LEN {
                return Err(CodecError::Truncated);
            }
            let len = payload.get_u32() as usize;
            if payload.remaining() < len {
                return Err(CodecError::Truncated);
            }
            entries.push(payload.split_to(len));
        }

        if payload.has_remaining() {
            return Err(CodecError::TrailingBytes(payload.remaining()));
        }

        Ok(Self { entries, cursor: 0 })
    }

    pub fn empty() -> Self {
        Self {
            entries: Vec::new(),
            cursor: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Deserializes the next argument as `T`.
    pub fn next<T: DeserializeOwned>(&mut self) -> Result<T, CodecError> {
        let index = self.cursor;
        let entry = self.entries.get(index).ok_or(CodecError::ArgumentCount {
            expected: index + 1,
            actual: self.entries.len(),
        })?;
        let value = serde_json::from_slice(entry).map_err(|e| CodecError::ParameterType {
            index,
            reason: e.to_string(),
        })?;
        self.cursor += 1;
        Ok(value)
    }
}

pub fn encode_return<T>(value: &T) -> Result<Bytes, CodecError>
where
    T: Serialize + ?Sized,
{
    serde_json::to_vec(value)
        .map(Bytes::from)
        .map_err(CodecError::Encode)
}

pub fn decode_return<T: DeserializeOwned>(body: &[u8]) -> Result<T, CodecError> {
    serde_json::from_slice(body).map_err(CodecError::Return)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{distributions::Alphanumeric, Rng};
    use serde::Deserialize;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Person {
        name: String,
        age: i32,
        tags: Vec<String>,
    }

    #[test]
    fn mixed_arguments_survive_the_frame() {
        let person = Person {
            name: "Jörg".into(),
            age: 41,
            tags: vec!["a,b".into(), "]\"[".into()],
        };
        let mut args = ArgList::new();
        args.push("hello").unwrap();
        args.push(&-7i64).unwrap();
        args.push(&person).unwrap();

        let mut frame = ArgFrame::decode(args.encode().unwrap(), 3).unwrap();
        assert_eq!(frame.next::<String>().unwrap(), "hello");
        assert_eq!(frame.next::<i64>().unwrap(), -7);
        assert_eq!(frame.next::<Person>().unwrap(), person);
    }

    #[test]
    fn random_payloads_are_not_split_on_content() {
        let mut rng = rand::thread_rng();
        let strings: Vec<String> = (0..16)
            .map(|_| {
                let len = rng.gen_range(0..64);
                let mut s: String = (&mut rng)
                    .sample_iter(&Alphanumeric)
                    .take(len)
                    .map(char::from)
                    .collect();
                // Bytes that would confuse a delimiter-scanning decoder.
                s.push_str("\0,\n]\u{4}");
                s
            })
            .collect();

        let mut args = ArgList::new();
        for s in &strings {
            args.push(s).unwrap();
        }
        let mut frame = ArgFrame::decode(args.encode().unwrap(), strings.len()).unwrap();
        for s in &strings {
            assert_eq!(&frame.next::<String>().unwrap(), s);
        }
    }

    #[test]
    fn count_must_match_arity() {
        let mut args = ArgList::new();
        args.push(&1).unwrap();
        args.push(&2).unwrap();

        let err = ArgFrame::decode(args.encode().unwrap(), 3).unwrap_err();
        assert!(matches!(
            err,
            CodecError::ArgumentCount {
                expected: 3,
                actual: 2
            }
        ));
    }

    #[test]
    fn empty_payload_means_no_arguments() {
        assert!(ArgFrame::decode(Bytes::new(), 0).unwrap().is_empty());
        assert!(matches!(
            ArgFrame::decode(Bytes::new(), 1),
            Err(CodecError::ArgumentCount {
                expected: 1,
                actual: 0
            })
        ));
    }

    #[test]
    fn wrong_type_is_a_parameter_type_mismatch() {
        let mut args = ArgList::new();
        args.push("not a number").unwrap();
        let mut frame = ArgFrame::decode(args.encode().unwrap(), 1).unwrap();

        let err = frame.next::<i32>().unwrap_err();
        assert!(matches!(err, CodecError::ParameterType { index: 0, .. }));
        assert_eq!(err.to_string(), "Parameter type mismatch at position 0");
    }

    #[test]
    fn malformed_frames_are_rejected() {
        assert!(matches!(
            ArgFrame::decode(Bytes::from_static(&[0, 0]), 0),
            Err(CodecError::Truncated)
        ));

        // count = 1, len = 10, but only 2 bytes follow
        let short = Bytes::from_static(&[0, 0, 0, 1, 0, 0, 0, 10, b'1', b'2']);
        assert!(matches!(
            ArgFrame::decode(short, 1),
            Err(CodecError::Truncated)
        ));

        let mut args = ArgList::new();
        args.push(&true).unwrap();
        let mut padded = BytesMut::from(&args.encode().unwrap()[..]);
        padded.put_u8(0xff);
        assert!(matches!(
            ArgFrame::decode(padded.freeze(), 1),
            Err(CodecError::TrailingBytes(1))
        ));
    }

    #[test]
    fn return_values_are_bare_json() {
        let body = encode_return(&Person {
            name: "x".into(),
            age: 1,
            tags: vec![],
        })
        .unwrap();
        assert_eq!(&body[..], br#"{"name":"x","age":1,"tags":[]}"#);
        assert!(decode_return::<Person>(b"[1,2]").is_err());
    }

    #[test]
    #[cfg(target_pointer_width = "64")]
    fn lengths_past_u32_are_refused() {
        assert_eq!(prefix(u32::MAX as usize).unwrap(), u32::MAX);

        let len = u32::MAX as usize + 1;
        let err = prefix(len).unwrap_err();
        assert!(matches!(err, CodecError::Oversized(n) if n == len));
    }
}
