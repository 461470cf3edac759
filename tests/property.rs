use bitcoin::secp256k1::SecretKey;
use blockio_signer::crypto::passphrase::{decrypt, encrypt, stretch, CipherKind, EncryptionKey};
use blockio_signer::script::{decode_var_int, encode_var_int};
use blockio_signer::KeyMaterial;
use proptest::prelude::*;

fn any_secret() -> impl Strategy<Value = [u8; 32]> {
    prop::array::uniform32(any::<u8>()).prop_filter("valid secp256k1 scalar", |bytes| {
        SecretKey::from_slice(bytes).is_ok()
    })
}

fn any_cipher() -> impl Strategy<Value = CipherKind> {
    prop_oneof![
        Just(CipherKind::Aes256Ecb),
        Just(CipherKind::Aes256Cbc),
        Just(CipherKind::Aes256Gcm),
    ]
}

fn decode_opt(value: &Option<String>) -> Option<Vec<u8>> {
    value.as_ref().map(|v| hex::decode(v).expect("hex from encrypt"))
}

proptest! {
    #[test]
    fn cipher_roundtrip(
        key in prop::array::uniform32(any::<u8>()),
        plaintext in prop::collection::vec(any::<u8>(), 0..200),
        aad in prop::collection::vec(any::<u8>(), 0..32),
        cipher in any_cipher(),
    ) {
        let key = EncryptionKey::from_bytes(&key).unwrap();
        let out = encrypt(&plaintext, &key, cipher, None, &aad).unwrap();

        let iv = decode_opt(&out.iv_hex);
        let tag = decode_opt(&out.auth_tag_hex);
        let decrypted = decrypt(&out.ciphertext, &key, cipher, iv.as_deref(), tag.as_deref(), &aad).unwrap();
        prop_assert_eq!(decrypted.as_slice(), plaintext.as_slice());
    }

    #[test]
    fn passphrase_keys_are_deterministic(passphrase in prop::collection::vec(any::<u8>(), 0..64)) {
        let a = KeyMaterial::from_passphrase(&passphrase).unwrap();
        let b = KeyMaterial::from_passphrase(&passphrase).unwrap();
        prop_assert_eq!(a.public_key_hex(), b.public_key_hex());
        prop_assert_eq!(a.public_key_hex().len(), 66);
    }

    #[test]
    fn signatures_are_deterministic_and_low_r(
        secret in any_secret(),
        digest in prop::array::uniform32(any::<u8>()),
    ) {
        let key = KeyMaterial::from_raw_secret(&secret).unwrap();
        let first = key.sign(&digest).unwrap();
        let second = key.sign(&digest).unwrap();
        prop_assert_eq!(&first, &second);

        prop_assert_eq!(first[0], 0x30);
        prop_assert_eq!(first[2], 0x02);
        prop_assert_eq!(first[3], 0x20);
        prop_assert!(first[4] < 0x80);
    }

    #[test]
    fn var_int_roundtrip(n in any::<u64>()) {
        let encoded = encode_var_int(n);
        let (decoded, consumed) = decode_var_int(&encoded).unwrap();
        prop_assert_eq!(decoded, n);
        prop_assert_eq!(consumed, encoded.len());
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(8))]

    #[test]
    fn stretched_pin_roundtrip(
        pin in "[0-9]{4,12}",
        salt in "[a-f0-9]{0,16}",
        iterations in 1u32..64,
        cipher in any_cipher(),
    ) {
        let key = stretch(&pin, &salt, iterations).unwrap();
        let message = b"I'm a little tea pot short and stout";
        let out = encrypt(message, &key, cipher, None, &[]).unwrap();

        let again = stretch(&pin, &salt, iterations).unwrap();
        let iv = decode_opt(&out.iv_hex);
        let tag = decode_opt(&out.auth_tag_hex);
        let decrypted = decrypt(&out.ciphertext, &again, cipher, iv.as_deref(), tag.as_deref(), &[]).unwrap();
        prop_assert_eq!(decrypted.as_slice(), &message[..]);
    }
}

#[test]
fn var_int_boundaries() {
    let cases: [(u64, &str); 7] = [
        (0, "00"),
        (0xfc, "fc"),
        (0xfd, "fdfd00"),
        (0xffff, "fdffff"),
        (0x10000, "fe00000100"),
        (0xffff_ffff, "feffffffff"),
        (0x1_0000_0000, "ff0000000001000000"),
    ];
    for (n, expected) in cases {
        assert_eq!(hex::encode(encode_var_int(n)), expected, "{}", n);
        assert_eq!(decode_var_int(&encode_var_int(n)).unwrap().0, n);
    }
}
