use std::fmt;

use bytes::BytesMut;
use postgres_types::{FromSql, ToSql, Type};
use serde::{Deserialize, Serialize};

use crate::util::{BASE64_DIGITS, base64_decode};


/// Number of base64 digits needed to encode a `u64`.
pub(crate) const KEY_BASE64_LEN: usize = 11;

/// Primary key of any row in our database.
///
/// All our tables use `bigint generated always as identity` primary keys. In
/// Rust we wrap it in this type so that keys cannot be confused with other
/// numbers like quantities or sort orders. The API never sees the number
/// directly, it only ever sees the base64 encoding as part of an `Id`.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub(crate) struct Key(pub(crate) u64);

impl Key {
    /// Decodes exactly 11 base64 digits. Returns `None` for any other input,
    /// including encodings of numbers larger than `u64::MAX`.
    pub(crate) fn from_base64(s: &str) -> Option<Self> {
        let digits: [u8; KEY_BASE64_LEN] = s.as_bytes().try_into().ok()?;

        // `u64::MAX` is `P__________`. Anything with a higher first digit
        // would overflow.
        if !(b'A'..=b'P').contains(&digits[0]) {
            return None;
        }

        digits.iter().try_fold(0u64, |acc, &d| {
            base64_decode(d).map(|v| (acc << 6) | v as u64)
        }).map(Key)
    }

    /// Writes the base64 encoding into `out` and returns it as `&str`.
    pub(crate) fn to_base64<'a>(&self, out: &'a mut [u8; KEY_BASE64_LEN]) -> &'a str {
        let mut n = self.0;
        for digit in out.iter_mut().rev() {
            *digit = BASE64_DIGITS[(n & 0b11_1111) as usize];
            n >>= 6;
        }

        // Only digits from `BASE64_DIGITS` were written, so this is ASCII.
        std::str::from_utf8(out).unwrap_or_else(|_| unreachable!())
    }
}

impl ToSql for Key {
    fn to_sql(
        &self,
        ty: &Type,
        out: &mut BytesMut,
    ) -> Result<postgres_types::IsNull, Box<dyn std::error::Error + Sync + Send>> {
        (self.0 as i64).to_sql(ty, out)
    }

    fn accepts(ty: &Type) -> bool {
        <i64 as ToSql>::accepts(ty)
    }

    postgres_types::to_sql_checked!();
}

impl<'a> FromSql<'a> for Key {
    fn from_sql(
        ty: &Type,
        raw: &'a [u8],
    ) -> Result<Self, Box<dyn std::error::Error + Sync + Send>> {
        i64::from_sql(ty, raw).map(|i| Key(i as u64))
    }

    fn accepts(ty: &Type) -> bool {
        <i64 as FromSql>::accepts(ty)
    }
}

impl fmt::Debug for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Key({})", self.0 as i64)
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        (self.0 as i64).fmt(f)
    }
}


#[cfg(test)]
mod tests {
    use super::{Key, KEY_BASE64_LEN};

    fn encode(n: u64) -> String {
        let mut buf = [0; KEY_BASE64_LEN];
        Key(n).to_base64(&mut buf).to_owned()
    }

    #[test]
    fn known_encodings() {
        assert_eq!(encode(0), "AAAAAAAAAAA");
        assert_eq!(encode(1), "AAAAAAAAAAB");
        assert_eq!(encode(63), "AAAAAAAAAA_");
        assert_eq!(encode(64), "AAAAAAAAABA");
        assert_eq!(encode(u64::MAX), "P__________");
    }

    #[test]
    fn decode_inverts_encode() {
        for n in [0, 1, 2, 63, 64, 4095, 4096, 1 << 40, u64::MAX - 1, u64::MAX] {
            assert_eq!(Key::from_base64(&encode(n)), Some(Key(n)));
        }
    }

    #[test]
    fn decode_rejects_garbage() {
        assert_eq!(Key::from_base64(""), None);
        assert_eq!(Key::from_base64("AAAAAAAAAA"), None);
        assert_eq!(Key::from_base64("AAAAAAAAAAAA"), None);
        assert_eq!(Key::from_base64("AAAAAAAAAA*"), None);
        assert_eq!(Key::from_base64("QAAAAAAAAAA"), None);
        assert_eq!(Key::from_base64("___________"), None);
    }
}
