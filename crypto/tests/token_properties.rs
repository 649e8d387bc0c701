// SPDX-License-Identifier: Apache-2.0 OR MIT
// Property tests: token issuance and verification.
//
// Issued tokens always verify for their own subject and never for another;
// arbitrary input never makes verification panic.

use codgate_crypto::TokenCodec;
use proptest::prelude::*;

// Subjects the codec accepts: 6..=64 chars without the field separator.
fn subject() -> impl Strategy<Value = String> {
    "[a-zA-Z0-9_-]{6,64}"
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    #[test]
    fn issued_tokens_verify(
        secret in proptest::collection::vec(any::<u8>(), 1..64),
        subj in subject(),
        issued_at in 0i64..4_000_000_000_000,
    ) {
        let codec = TokenCodec::new(&secret);
        let token = codec.issue_at(&subj, issued_at).unwrap();
        prop_assert!(codec.verify_at(&token, &subj, issued_at));
    }

    #[test]
    fn tokens_are_bound_to_their_subject(
        subj in subject(),
        other in subject(),
    ) {
        prop_assume!(subj != other);
        let codec = TokenCodec::new(b"property-secret-0123456789abcdef");
        let token = codec.issue(&subj).unwrap();
        prop_assert!(!codec.verify(&token, &other));
    }

    #[test]
    fn single_byte_corruption_fails(
        subj in subject(),
        idx in any::<prop::sample::Index>(),
        replacement in any::<char>(),
    ) {
        let codec = TokenCodec::new(b"property-secret-0123456789abcdef");
        let token = codec.issue(&subj).unwrap();

        let chars: Vec<char> = token.chars().collect();
        let i = idx.index(chars.len());
        prop_assume!(chars[i] != replacement);

        let mut corrupted = chars.clone();
        corrupted[i] = replacement;
        let corrupted: String = corrupted.into_iter().collect();

        prop_assert!(!codec.verify(&corrupted, &subj));
    }

    #[test]
    fn arbitrary_input_never_panics(
        token in ".{0,200}",
        subj in ".{0,40}",
    ) {
        let codec = TokenCodec::new(b"property-secret-0123456789abcdef");
        let _ = codec.verify(&token, &subj);
    }
}
