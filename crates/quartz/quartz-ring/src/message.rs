/// An immutable byte payload moved through both rings.
///
/// A `Message` is owned by exactly one ring slot at a time. It is dropped when
/// the slot is overwritten or the ring itself is dropped, so there is no shared
/// ownership and no reference counting.
#[derive(Clone, PartialEq, Eq)]
pub struct Message {
    payload: Box<[u8]>,
}

impl Message {
    pub fn new(payload: impl Into<Box<[u8]>>) -> Self {
        Self {
            payload: payload.into(),
        }
    }

    #[inline]
    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.payload.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.payload.is_empty()
    }
}

impl From<Vec<u8>> for Message {
    fn from(v: Vec<u8>) -> Self {
        Self::new(v)
    }
}

impl From<&[u8]> for Message {
    fn from(v: &[u8]) -> Self {
        Self::new(v)
    }
}

impl From<String> for Message {
    fn from(s: String) -> Self {
        Self::new(s.into_bytes())
    }
}

impl From<&str> for Message {
    fn from(s: &str) -> Self {
        Self::new(s.as_bytes())
    }
}

impl std::fmt::Debug for Message {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match std::str::from_utf8(&self.payload) {
            Ok(text) => f.debug_tuple("Message").field(&text).finish(),
            Err(_) => f.debug_tuple("Message").field(&self.payload.len()).finish(),
        }
    }
}
