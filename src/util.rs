use rand::{CryptoRng, Rng, RngCore};
use secrecy::SecretBox;


/// The URL-safe base64 alphabet used for database keys and cursors.
pub(crate) const BASE64_DIGITS: &[u8; 64] =
    b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789-_";

pub(crate) fn base64_decode(ascii: u8) -> Option<u8> {
    /// The offset from the ASCII value to the index in the table above.
    const LUT: [u8; 128] = {
        let mut lut = [u8::MAX; 128];
        let mut i = 0;
        while i < 64 {
            lut[BASE64_DIGITS[i] as usize] = i as u8;
            i += 1;
        }
        lut
    };

    LUT.get(ascii as usize).copied().filter(|&d| d != u8::MAX)
}

/// Generate random bytes with a crypotgraphically secure RNG.
pub(crate) fn gen_random_bytes_crypto<const N: usize>() -> SecretBox<[u8; N]> {
    // The `CryptoRng` bound makes sure that swapping the RNG for a
    // non-cryptographic one after a `rand` update fails to compile.
    fn imp<const N: usize>(mut rng: impl RngCore + CryptoRng) -> [u8; N] {
        let mut bytes = [0; N];
        rng.fill_bytes(&mut bytes);
        bytes
    }

    SecretBox::new(Box::new(imp(rand::rng())))
}

/// Random string of uppercase letters and digits, e.g. a voucher code.
pub(crate) fn random_code(len: usize) -> String {
    const ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

    let mut rng = rand::rng();
    (0..len).map(|_| ALPHABET[rng.random_range(0..ALPHABET.len())] as char).collect()
}


#[cfg(test)]
mod tests {
    use super::{BASE64_DIGITS, base64_decode, random_code};

    #[test]
    fn decode_inverts_table() {
        for (i, &d) in BASE64_DIGITS.iter().enumerate() {
            assert_eq!(base64_decode(d), Some(i as u8));
        }
    }

    #[test]
    fn decode_rejects_others() {
        for c in [b'+', b'/', b'=', b' ', b'*', 0, 127, 200] {
            assert_eq!(base64_decode(c), None);
        }
    }

    #[test]
    fn codes() {
        let code = random_code(12);
        assert_eq!(code.len(), 12);
        assert!(code.bytes().all(|b| b.is_ascii_uppercase() || b.is_ascii_digit()));
        assert_ne!(random_code(12), code);
    }
}
