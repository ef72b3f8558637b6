use thiserror::Error;

pub const COUNTRY_CODE: &str = "RO";
pub const IBAN_LENGTH: usize = 24;

/// Digits folded into the running remainder per step. The remainder is at most
/// two digits, so every intermediate value stays below 10^9.
const CHUNK_DIGITS: usize = 7;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum IbanError {
    #[error("empty identifier")]
    Empty,
    #[error("country code is not RO")]
    WrongCountry,
    #[error("expected 24 characters, found {0}")]
    WrongLength(usize),
    #[error("unexpected character {found:?} at position {position}")]
    Malformed { position: usize, found: char },
    #[error("checksum mismatch (remainder {0})")]
    Checksum(u32),
}

/// Strips every whitespace character and upper-cases ASCII letters.
pub fn normalize(candidate: &str) -> String {
    candidate
        .chars()
        .filter(|c| !c.is_whitespace())
        .map(|c| c.to_ascii_uppercase())
        .collect()
}

/// Returns `true` when `candidate` is a structurally valid Romanian IBAN with a
/// passing ISO 7064 MOD-97-10 checksum.
pub fn validate(candidate: &str) -> bool {
    check(candidate).is_ok()
}

/// `None` stands in for an absent identifier and is always invalid.
pub fn validate_opt(candidate: Option<&str>) -> bool {
    candidate.is_some_and(validate)
}

/// Same as [`validate`], but reports the first rule the identifier breaks.
pub fn check(candidate: &str) -> Result<(), IbanError> {
    let normalized = normalize(candidate);
    if normalized.is_empty() {
        return Err(IbanError::Empty);
    }
    if !normalized.starts_with(COUNTRY_CODE) {
        return Err(IbanError::WrongCountry);
    }

    let length = normalized.chars().count();
    if length != IBAN_LENGTH {
        return Err(IbanError::WrongLength(length));
    }

    check_structure(&normalized)?;

    match mod97(&expand_digits(&normalized)) {
        1 => Ok(()),
        remainder => Err(IbanError::Checksum(remainder)),
    }
}

// RO | 2 check digits | 4-letter bank code | 16 alphanumeric account chars
fn check_structure(normalized: &str) -> Result<(), IbanError> {
    for (position, found) in normalized.chars().enumerate() {
        let allowed = match position {
            0..=1 => found.is_ascii_uppercase(),
            2..=3 => found.is_ascii_digit(),
            4..=7 => found.is_ascii_uppercase(),
            _ => found.is_ascii_digit() || found.is_ascii_uppercase(),
        };
        if !allowed {
            return Err(IbanError::Malformed { position, found });
        }
    }
    Ok(())
}

/// Moves the country code and check digits to the end, then spells every
/// letter as its two-digit value (A=10 .. Z=35). Input must already have passed
/// [`check_structure`].
fn expand_digits(normalized: &str) -> Vec<u8> {
    let (head, rest) = normalized.split_at(4);
    let mut digits = Vec::with_capacity(IBAN_LENGTH * 2);

    for byte in rest.bytes().chain(head.bytes()) {
        if byte.is_ascii_digit() {
            digits.push(byte - b'0');
        } else {
            let value = byte - b'A' + 10;
            digits.push(value / 10);
            digits.push(value % 10);
        }
    }
    digits
}

fn mod97(digits: &[u8]) -> u32 {
    let remainder = digits.chunks(CHUNK_DIGITS).fold(0u64, |remainder, chunk| {
        chunk
            .iter()
            .fold(remainder, |acc, digit| acc * 10 + u64::from(*digit))
            % 97
    });
    // Always < 97.
    remainder as u32
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const VALID: &str = "RO49AAAA1B31007593840000";

    #[test]
    fn accepts_known_valid_ibans() {
        assert!(validate(VALID));
        assert!(validate("RO09BCYP0000001234567890"));
        assert!(validate("RO66BACX0000001234567890"));
        assert!(validate("RO86RNCB0082044987650001"));
    }

    #[test]
    fn normalizes_case_and_whitespace() {
        assert!(validate("ro49 aaaa 1b31 0075 9384 0000"));
        assert!(validate("  RO49AAAA1B3100\t7593840000\n"));
        assert_eq!(normalize("ro49 aaaa\t1b31"), "RO49AAAA1B31");
    }

    #[test]
    fn rejects_empty_and_truncated_input() {
        assert!(!validate(""));
        assert!(!validate("   \t\n"));
        assert!(!validate("RO"));
        assert!(!validate_opt(None));
        assert_eq!(check(" "), Err(IbanError::Empty));
        assert_eq!(check("RO"), Err(IbanError::WrongLength(2)));
    }

    #[test]
    fn rejects_other_countries() {
        assert_eq!(check("DE89370400440532013000"), Err(IbanError::WrongCountry));
        assert_eq!(check("GB82WEST12345698765432"), Err(IbanError::WrongCountry));
    }

    #[test]
    fn rejects_wrong_length() {
        assert_eq!(check(&format!("{VALID}0")), Err(IbanError::WrongLength(25)));
        assert_eq!(check(&VALID[..23]), Err(IbanError::WrongLength(23)));
    }

    #[test]
    fn rejects_structural_deviations_before_checksum() {
        assert_eq!(
            check("RO4XAAAA1B31007593840000"),
            Err(IbanError::Malformed {
                position: 3,
                found: 'X'
            })
        );
        assert_eq!(
            check("RO49AA1A1B31007593840000"),
            Err(IbanError::Malformed {
                position: 6,
                found: '1'
            })
        );
        assert_eq!(
            check("RO49AAAA1B3100759384-000"),
            Err(IbanError::Malformed {
                position: 20,
                found: '-'
            })
        );
        assert_eq!(
            check("RO49AAAA1B310075938400é0"),
            Err(IbanError::Malformed {
                position: 22,
                found: 'é'
            })
        );
    }

    #[test]
    fn every_check_digit_substitution_is_caught() {
        for position in 2..4 {
            for digit in b'0'..=b'9' {
                let mut bytes = VALID.as_bytes().to_vec();
                if bytes[position] == digit {
                    continue;
                }
                bytes[position] = digit;
                let mutated = String::from_utf8(bytes).unwrap();
                assert!(!validate(&mutated), "{mutated} should fail the checksum");
            }
        }
    }

    #[test]
    fn adjacent_transposition_is_caught() {
        assert!(matches!(
            check("RO49AAAA1B13007593840000"),
            Err(IbanError::Checksum(_))
        ));
    }

    #[test]
    fn chunked_remainder_matches_full_numeral() {
        // 3214282912345698765432161182 mod 97 == 1 (ISO 13616 worked example)
        let digits: Vec<u8> = "3214282912345698765432161182"
            .bytes()
            .map(|b| b - b'0')
            .collect();
        assert_eq!(mod97(&digits), 1);
        assert_eq!(mod97(&[9, 7]), 0);
        assert_eq!(mod97(&[]), 0);
    }

    proptest! {
        #[test]
        fn validate_is_total(s in any::<String>()) {
            let _ = validate(&s);
        }

        #[test]
        fn validate_is_invariant_under_normalization(s in "[ a-zA-Z0-9\t]{0,30}") {
            prop_assert_eq!(validate(&s), validate(&normalize(&s)));
        }

        #[test]
        fn non_ro_prefix_is_invalid(prefix in "[A-Z]{2}", rest in "[0-9A-Z]{22}") {
            prop_assume!(prefix != COUNTRY_CODE);
            let candidate = format!("{prefix}{rest}");
            prop_assert!(!validate(&candidate));
        }

        #[test]
        fn wrong_length_is_invalid(rest in "[0-9A-Z]{0,40}") {
            prop_assume!(rest.len() + 2 != IBAN_LENGTH);
            let candidate = format!("RO{rest}");
            prop_assert!(!validate(&candidate));
        }
    }
}
