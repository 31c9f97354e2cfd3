use super::*;

#[test]
fn marbles_prefix_matches_sha512_of_family_name() {
    let namespace = Namespace::marbles();
    assert_eq!(namespace.prefix(), "b98f57");
    assert_eq!(namespace.family_name(), "marbles");
    assert_eq!(namespace.family_version(), "1.0");
}

#[test]
fn address_is_prefix_followed_by_name_digest() {
    let namespace = Namespace::marbles();
    let address = namespace.address_for("alice_marble").expect("address");
    assert_eq!(
        address,
        "b98f57411650f6535b0465e4e339151582a8d8e9217941054cdc9177d9ff1db869b3d3"
    );
    assert_eq!(address.len(), ADDRESS_LEN);
}

#[test]
fn address_is_stable_across_calls_and_instances() {
    let first = Namespace::marbles().address_for("blue-42").expect("address");
    let second = Namespace::default().address_for("blue-42").expect("address");
    assert_eq!(first, second);
    assert_ne!(
        first,
        Namespace::marbles().address_for("blue-43").expect("address")
    );
}

#[test]
fn empty_name_has_no_address() {
    assert_eq!(
        Namespace::marbles().address_for(""),
        Err(AddressError::EmptyName)
    );
}

#[test]
fn contains_checks_prefix_and_shape() {
    let namespace = Namespace::marbles();
    let address = namespace.address_for("alice_marble").expect("address");
    assert!(namespace.contains(&address));

    let foreign = Namespace::new("intkey", "1.0")
        .address_for("alice_marble")
        .expect("address");
    assert!(!namespace.contains(&foreign));
    assert!(!namespace.contains(&address[..ADDRESS_LEN - 1]));
    assert!(!namespace.contains(&address.to_uppercase()));
}

#[test]
fn validate_address_rejects_non_hex() {
    let bad = "z".repeat(ADDRESS_LEN);
    assert!(matches!(
        validate_address(&bad),
        Err(AddressError::Malformed(_))
    ));
}
