use bincode::de::Decoder;
use bincode::enc::Encoder;
use bincode::error::{DecodeError, EncodeError};
use bincode::{Decode, Encode};

/// Opaque fixed-width index key, compared bytewise. The width is part of the
/// type, so a page's entry layout is fixed per instantiation; 4, 8, 16, 32
/// and 64 byte keys are the usual sizes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct GenericKey<const N: usize> {
    bytes: [u8; N],
}

impl<const N: usize> GenericKey<N> {
    pub fn new(bytes: [u8; N]) -> GenericKey<N> {
        GenericKey { bytes }
    }

    /// Builds a key whose byte order matches the numeric order of `value`:
    /// a big-endian fill, truncated to the key width.
    pub fn from_u64(value: u64) -> GenericKey<N> {
        let mut bytes = [0; N];
        let source = value.to_be_bytes();
        let width = N.min(source.len());
        bytes[..width].copy_from_slice(&source[source.len() - width..]);
        GenericKey { bytes }
    }

    pub fn as_bytes(&self) -> &[u8; N] {
        &self.bytes
    }
}

impl<const N: usize> Default for GenericKey<N> {
    fn default() -> GenericKey<N> {
        GenericKey { bytes: [0; N] }
    }
}

impl<const N: usize> Encode for GenericKey<N> {
    fn encode<E: Encoder>(&self, encoder: &mut E) -> Result<(), EncodeError> {
        self.bytes.encode(encoder)
    }
}

impl<Context, const N: usize> Decode<Context> for GenericKey<N> {
    fn decode<D: Decoder<Context = Context>>(decoder: &mut D) -> Result<GenericKey<N>, DecodeError> {
        Ok(GenericKey {
            bytes: <[u8; N] as Decode<Context>>::decode(decoder)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::GenericKey;

    #[test]
    fn numeric_order_is_preserved() {
        assert!(GenericKey::<8>::from_u64(9) < GenericKey::<8>::from_u64(10));
        assert!(GenericKey::<8>::from_u64(255) < GenericKey::<8>::from_u64(256));
        assert!(GenericKey::<4>::from_u64(1) < GenericKey::<4>::from_u64(2));
        assert!(GenericKey::<32>::from_u64(70_000) < GenericKey::<32>::from_u64(70_001));
    }

    #[test]
    fn default_is_all_zeroes() {
        assert_eq!(GenericKey::<16>::default(), GenericKey::<16>::from_u64(0));
        assert_eq!(GenericKey::<64>::default().as_bytes(), &[0u8; 64]);
    }

    #[test]
    fn wide_keys_keep_the_value_in_the_prefix() {
        let key = GenericKey::<16>::from_u64(0x0102_0304);
        assert_eq!(&key.as_bytes()[..8], &[0, 0, 0, 0, 1, 2, 3, 4]);
        assert_eq!(&key.as_bytes()[8..], &[0u8; 8]);
    }
}
