use super::*;

#[test]
fn accepts_positive_decimal_amounts() {
    assert_eq!(parse_amount("50").expect("amount"), 50);
    assert_eq!(parse_amount("  7 ").expect("amount"), 7);
    assert_eq!(parse_amount("007").expect("amount"), 7);
}

#[test]
fn rejects_non_positive_and_non_numeric_amounts() {
    for input in ["", "   ", "0", "000", "-5", "+5", "abc", "1.5", "1e3", "12abc", "0x10"] {
        let err = parse_amount(input).expect_err(input);
        assert_eq!(err, ValidationError::invalid_amount(input), "input {input:?}");
    }
}

#[test]
fn rejects_amounts_beyond_u128() {
    let too_big = "340282366920938463463374607431768211456";
    assert!(matches!(
        parse_amount(too_big),
        Err(ValidationError::InvalidAmount { .. })
    ));
    assert_eq!(
        parse_amount("340282366920938463463374607431768211455").expect("max"),
        u128::MAX
    );
}

#[test]
fn recipient_must_not_be_blank() {
    assert_eq!(
        parse_recipient("   ", false),
        Err(ValidationError::EmptyRecipient)
    );
}

#[test]
fn lenient_recipient_is_passed_through_trimmed() {
    assert_eq!(
        parse_recipient(" not-an-address ", false).expect("recipient"),
        Account::new("not-an-address")
    );
}

#[test]
fn strict_recipient_requires_hex_felt() {
    assert_eq!(
        parse_recipient("0xabc", true).expect("recipient"),
        Account::new("0xabc")
    );
    assert!(matches!(
        parse_recipient("abc", true),
        Err(ValidationError::MalformedRecipient { .. })
    ));
    assert!(matches!(
        parse_recipient("0x", true),
        Err(ValidationError::MalformedRecipient { .. })
    ));
    let too_long = format!("0x{}", "f".repeat(65));
    assert!(matches!(
        parse_recipient(&too_long, true),
        Err(ValidationError::MalformedRecipient { .. })
    ));
}

#[test]
fn transfer_call_checks_recipient_before_amount() {
    assert_eq!(
        transfer_call("", "0", false),
        Err(ValidationError::EmptyRecipient)
    );
    assert_eq!(
        transfer_call("0xabc", "10", false).expect("call"),
        ContractCall::TransferValue {
            recipient: Account::new("0xabc"),
            amount: 10,
        }
    );
}

#[test]
fn decodes_decimal_and_hex_felts() {
    assert_eq!(decode_felt_u128("42"), Some(42));
    assert_eq!(decode_felt_u128("0x2a"), Some(42));
    assert_eq!(decode_felt_u128("0x"), None);
    assert_eq!(decode_felt_u128("forty-two"), None);
}
