use crate::error::ArqError;

pub const CALLSIGN_BYTES: usize = 10;

/// An operator callsign: ASCII, at most 10 bytes, zero-padded on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Callsign([u8; CALLSIGN_BYTES]);

impl Callsign {
    pub fn new(raw: &str) -> Result<Self, ArqError> {
        if !raw.is_ascii() {
            return Err(ArqError::InvalidCallsignCharacters);
        }
        if raw.len() > CALLSIGN_BYTES {
            return Err(ArqError::CallsignTooLong(raw.len()));
        }
        let mut bytes = [0u8; CALLSIGN_BYTES];
        bytes[0..raw.len()].copy_from_slice(raw.as_bytes());
        Ok(Self(bytes))
    }

    /// Build from a zero-padded 10-byte wire field, as found in a received frame header.
    pub fn from_padded_bytes(bytes: [u8; CALLSIGN_BYTES]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; CALLSIGN_BYTES] {
        &self.0
    }

    /// Render as text, trimming the zero padding. Non-ASCII bytes cannot occur because
    /// construction only ever accepts ASCII, so this never needs to be fallible.
    pub fn as_str(&self) -> String {
        let end = self.0.iter().position(|b| *b == 0).unwrap_or(self.0.len());
        String::from_utf8_lossy(&self.0[0..end]).into_owned()
    }
}

impl std::fmt::Display for Callsign {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pads_short_callsign() {
        let cs = Callsign::new("KO4VMI").unwrap();
        assert_eq!(cs.as_bytes(), b"KO4VMI\0\0\0\0");
        assert_eq!(cs.as_str(), "KO4VMI");
    }

    #[test]
    fn rejects_too_long() {
        assert!(matches!(
            Callsign::new("TOOLONGCALLSIGN"),
            Err(ArqError::CallsignTooLong(15))
        ));
    }

    #[test]
    fn rejects_non_ascii() {
        assert!(matches!(
            Callsign::new("KO4VMI\u{1F4E1}"),
            Err(ArqError::InvalidCallsignCharacters)
        ));
    }

    #[test]
    fn exact_length_fits() {
        let cs = Callsign::new("ABCDEFGHIJ").unwrap();
        assert_eq!(cs.as_bytes(), b"ABCDEFGHIJ");
    }
}
